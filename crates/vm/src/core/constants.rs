use alloy::primitives::U256;
use std::str::FromStr;

use lazy_static::lazy_static;

/// Capacity reserved for a fresh stack; the EVM's nominal depth limit.
/// Exceeding it is not enforced by this interpreter.
pub const STACK_CAPACITY: usize = 1024;

lazy_static! {
    /// The word pushed by the GAS opcode.
    ///
    /// Execution is not metered, so GAS always reports this fixed,
    /// deliberately oversized amount.
    pub static ref GAS_PLACEHOLDER: U256 =
        U256::from_str("0xffffffffffffffffff").expect("failed to parse gas placeholder");
}
