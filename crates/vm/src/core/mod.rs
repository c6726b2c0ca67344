/// Constants used throughout the VM implementation
pub mod constants;

/// The account model: bytecode, storage, balance, nonce, code maps
pub mod contract;

/// World state and block context
pub mod env;

/// The VM error taxonomy
pub mod errors;

/// Log records emitted by the LOG opcodes
pub mod log;

/// Memory implementation for VM memory management
pub mod memory;

/// Opcode decoding and per-byte operation indexing
pub mod opcodes;

/// Stack implementation for the VM
pub mod stack;

/// The call-context trace recorded during execution
pub mod trace;

/// Core virtual machine implementation
pub mod vm;
