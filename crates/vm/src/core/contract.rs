use std::collections::HashMap;

use alloy::primitives::{keccak256, U256};

use super::opcodes::{mk_code_ops, mk_op_ix_map, Op};

/// A single account in the interpreter's world state.
///
/// Besides the externally visible fields (code, storage, balance, nonce),
/// the decoded operation vector and the per-byte operation index map are
/// precomputed here, since jump validation consults them on every JUMP.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contract {
    /// The account's runtime bytecode (or its init code while a creation
    /// frame for it is executing).
    pub bytecode: Vec<u8>,

    /// Storage slots. Zero-valued keys are never stored; absent keys read
    /// as zero.
    pub storage: HashMap<U256, U256>,

    /// The account's balance in wei.
    pub balance: U256,

    /// The account's nonce; incremented on each CREATE it performs.
    pub nonce: U256,

    /// keccak-256 of the bytecode, or zero for codeless accounts.
    pub codehash: U256,

    /// Length of the bytecode in bytes.
    pub codesize: usize,

    /// For each code byte, the index of the operation that owns it.
    pub op_ix_map: Vec<usize>,

    /// The decoded operation sequence.
    pub code_ops: Vec<Op>,
}

impl Contract {
    /// Creates a fresh account holding `bytecode`, with zero balance, zero
    /// nonce, and empty storage.
    pub fn new(bytecode: Vec<u8>) -> Contract {
        let codehash = if bytecode.is_empty() {
            U256::ZERO
        } else {
            U256::from_be_bytes(keccak256(&bytecode).0)
        };

        Contract {
            codesize: bytecode.len(),
            codehash,
            op_ix_map: mk_op_ix_map(&bytecode),
            code_ops: mk_code_ops(&bytecode),
            storage: HashMap::new(),
            balance: U256::ZERO,
            nonce: U256::ZERO,
            bytecode,
        }
    }

    /// Read a storage slot; absent keys read as zero.
    pub fn storage_at(&self, key: U256) -> U256 {
        self.storage.get(&key).copied().unwrap_or(U256::ZERO)
    }

    /// Write a storage slot. Writing zero deletes the key, keeping the
    /// zero-absent invariant.
    pub fn set_storage(&mut self, key: U256, value: U256) {
        if value.is_zero() {
            self.storage.remove(&key);
        } else {
            self.storage.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_codeless_account() {
        let contract = Contract::new(Vec::new());
        assert_eq!(contract.codehash, U256::ZERO);
        assert_eq!(contract.codesize, 0);
        assert!(contract.code_ops.is_empty());
    }

    #[test]
    fn test_new_hashes_code() {
        let contract = Contract::new(vec![0x60, 0x05, 0x00]);
        assert_eq!(
            contract.codehash,
            U256::from_be_bytes(keccak256([0x60, 0x05, 0x00]).0)
        );
        assert_eq!(contract.codesize, 3);
        assert_eq!(contract.op_ix_map, vec![0, 0, 1]);
    }

    #[test]
    fn test_storage_zero_absent() {
        let mut contract = Contract::new(Vec::new());
        contract.set_storage(U256::from(1), U256::from(0x2a));
        assert_eq!(contract.storage_at(U256::from(1)), U256::from(0x2a));

        contract.set_storage(U256::from(1), U256::ZERO);
        assert!(!contract.storage.contains_key(&U256::from(1)));
        assert_eq!(contract.storage_at(U256::from(1)), U256::ZERO);
    }
}
