//! Stepwise EVM interpreter core.
//!
//! This crate provides a deterministic, single-threaded Ethereum Virtual
//! Machine interpreter built for symbolic debugging and test execution rather
//! than consensus: one call to [`core::vm::VM::step`] advances the machine by
//! exactly one opcode, nested calls and creations are tracked frame by frame,
//! and the whole world state (accounts, storage, balances, logs) lives inside
//! the [`core::vm::VM`] value itself. Gas is not metered.

/// Core VM implementation, including memory, stack, opcodes, the account
/// model, and the step function.
pub mod core;
