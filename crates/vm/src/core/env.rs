use std::collections::HashMap;

use alloy::primitives::{Address, U256};

use super::contract::Contract;

/// The world state shared by every frame of one execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Env {
    /// Every account known to this execution, keyed by address.
    pub contracts: HashMap<Address, Contract>,

    /// Pre-images discovered through SHA3: hash word to hashed bytes.
    /// Useful for recovering mapping keys when inspecting storage.
    pub sha3_crack: hashbrown::HashMap<U256, Vec<u8>>,

    /// The externally-owned account that originated the transaction.
    pub origin: Address,
}

/// The block context the execution runs in. Values are fixed for the whole
/// execution; no block-hash history is available.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// The address receiving the block reward.
    pub coinbase: Address,

    /// The block's timestamp, in seconds.
    pub timestamp: U256,

    /// The block number.
    pub number: U256,

    /// The block's difficulty.
    pub difficulty: U256,

    /// The block's gas limit.
    pub gaslimit: U256,
}
