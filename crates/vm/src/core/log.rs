use alloy::primitives::{Address, U256};

/// The [`Log`] struct represents a log emitted by a `LOG0`-`LOG4` opcode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Log {
    /// The account whose code emitted the log.
    pub address: Address,

    /// The log topics (up to 4 for LOG0-LOG4).
    pub topics: Vec<U256>,

    /// The raw data carried by the log.
    pub data: Vec<u8>,
}

impl Log {
    /// Creates a new [`Log`] with the given emitter, topics, and data.
    pub fn new(address: Address, topics: Vec<U256>, data: &[u8]) -> Log {
        Log { address, topics, data: data.to_vec() }
    }
}
