use alloy::primitives::Address;
use thiserror::Error;

/// Everything that can go wrong inside a frame.
///
/// Errors are plain values, not exceptions: a surfacing error unwinds exactly
/// one frame (restoring the caller's world snapshot and pushing 0), and only
/// becomes the VM's terminal result once no frames remain.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VmError {
    /// A value transfer exceeded the sender's balance.
    #[error("insufficient balance for transfer")]
    BalanceTooLow,

    /// An opcode byte outside the supported instruction set was executed.
    #[error("unrecognized opcode 0x{0:02x}")]
    UnrecognizedOpcode(u8),

    /// The executing contract ran SELFDESTRUCT.
    #[error("contract destroyed itself")]
    SelfDestruction,

    /// An operation needed more stack items than were present.
    #[error("stack underrun")]
    StackUnderrun,

    /// A jump target was out of range, not a JUMPDEST, or inside push data.
    #[error("bad jump destination")]
    BadJumpDestination,

    /// The REVERT opcode was executed.
    #[error("execution reverted")]
    Revert,

    /// A call targeted an address with no account.
    #[error("no contract at address {0}")]
    NoSuchContract(Address),
}
