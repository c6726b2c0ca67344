//! Opcode decoding and per-byte operation indexing.
//!
//! Bytecode is decoded into the symbolic [`Op`] form once per contract, and
//! [`mk_op_ix_map`] labels every code byte with the index of the operation
//! that owns it. The label is what distinguishes a real `JUMPDEST` byte from
//! a `0x5b` sitting inside push-immediate data.

use std::fmt;

use alloy::primitives::U256;

/// A single decoded EVM operation.
///
/// The `PUSHn` family carries its immediate value; `DUPn`, `SWAPn` and `LOGn`
/// carry their family parameter. Bytes outside the supported instruction set
/// decode to [`Op::Unknown`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Op {
    Stop,
    Add,
    Mul,
    Sub,
    Div,
    Sdiv,
    Mod,
    Smod,
    Addmod,
    Mulmod,
    Exp,
    Signextend,
    Lt,
    Gt,
    Slt,
    Sgt,
    Eq,
    Iszero,
    And,
    Or,
    Xor,
    Not,
    Byte,
    Sha3,
    Address,
    Balance,
    Origin,
    Caller,
    Callvalue,
    Calldataload,
    Calldatasize,
    Calldatacopy,
    Codesize,
    Codecopy,
    Gasprice,
    Extcodesize,
    Extcodecopy,
    Blockhash,
    Coinbase,
    Timestamp,
    Number,
    Difficulty,
    Gaslimit,
    Pop,
    Mload,
    Mstore,
    Mstore8,
    Sload,
    Sstore,
    Jump,
    Jumpi,
    Pc,
    Msize,
    Gas,
    Jumpdest,
    /// PUSH1..PUSH32 with the big-endian immediate value.
    Push(U256),
    /// DUP1..DUP16.
    Dup(u8),
    /// SWAP1..SWAP16.
    Swap(u8),
    /// LOG0..LOG4.
    Log(u8),
    Create,
    Call,
    Callcode,
    Return,
    Delegatecall,
    Selfdestruct,
    Revert,
    /// A byte outside the supported instruction set.
    Unknown(u8),
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Push(value) => write!(f, "PUSH {value:#x}"),
            Op::Dup(n) => write!(f, "DUP{n}"),
            Op::Swap(n) => write!(f, "SWAP{n}"),
            Op::Log(n) => write!(f, "LOG{n}"),
            Op::Unknown(byte) => write!(f, "UNKNOWN {byte:#04x}"),
            other => f.write_str(match other {
                Op::Stop => "STOP",
                Op::Add => "ADD",
                Op::Mul => "MUL",
                Op::Sub => "SUB",
                Op::Div => "DIV",
                Op::Sdiv => "SDIV",
                Op::Mod => "MOD",
                Op::Smod => "SMOD",
                Op::Addmod => "ADDMOD",
                Op::Mulmod => "MULMOD",
                Op::Exp => "EXP",
                Op::Signextend => "SIGNEXTEND",
                Op::Lt => "LT",
                Op::Gt => "GT",
                Op::Slt => "SLT",
                Op::Sgt => "SGT",
                Op::Eq => "EQ",
                Op::Iszero => "ISZERO",
                Op::And => "AND",
                Op::Or => "OR",
                Op::Xor => "XOR",
                Op::Not => "NOT",
                Op::Byte => "BYTE",
                Op::Sha3 => "SHA3",
                Op::Address => "ADDRESS",
                Op::Balance => "BALANCE",
                Op::Origin => "ORIGIN",
                Op::Caller => "CALLER",
                Op::Callvalue => "CALLVALUE",
                Op::Calldataload => "CALLDATALOAD",
                Op::Calldatasize => "CALLDATASIZE",
                Op::Calldatacopy => "CALLDATACOPY",
                Op::Codesize => "CODESIZE",
                Op::Codecopy => "CODECOPY",
                Op::Gasprice => "GASPRICE",
                Op::Extcodesize => "EXTCODESIZE",
                Op::Extcodecopy => "EXTCODECOPY",
                Op::Blockhash => "BLOCKHASH",
                Op::Coinbase => "COINBASE",
                Op::Timestamp => "TIMESTAMP",
                Op::Number => "NUMBER",
                Op::Difficulty => "DIFFICULTY",
                Op::Gaslimit => "GASLIMIT",
                Op::Pop => "POP",
                Op::Mload => "MLOAD",
                Op::Mstore => "MSTORE",
                Op::Mstore8 => "MSTORE8",
                Op::Sload => "SLOAD",
                Op::Sstore => "SSTORE",
                Op::Jump => "JUMP",
                Op::Jumpi => "JUMPI",
                Op::Pc => "PC",
                Op::Msize => "MSIZE",
                Op::Gas => "GAS",
                Op::Jumpdest => "JUMPDEST",
                Op::Create => "CREATE",
                Op::Call => "CALL",
                Op::Callcode => "CALLCODE",
                Op::Return => "RETURN",
                Op::Delegatecall => "DELEGATECALL",
                Op::Selfdestruct => "SELFDESTRUCT",
                Op::Revert => "REVERT",
                _ => unreachable!(),
            }),
        }
    }
}

/// The number of code bytes the given opcode byte spans: a `PUSHn` spans its
/// opcode byte plus n immediate bytes, every other opcode spans one byte.
pub fn op_size(opcode: u8) -> usize {
    match opcode {
        0x60..=0x7f => 2 + (opcode - 0x60) as usize,
        _ => 1,
    }
}

/// Decode one opcode byte into its symbolic [`Op`].
///
/// `tail` is the code immediately following the opcode byte; `PUSHn` reads
/// its n immediate bytes from there, with bytes past the end of the code
/// reading as zero.
pub fn read_op(opcode: u8, tail: &[u8]) -> Op {
    match opcode {
        0x00 => Op::Stop,
        0x01 => Op::Add,
        0x02 => Op::Mul,
        0x03 => Op::Sub,
        0x04 => Op::Div,
        0x05 => Op::Sdiv,
        0x06 => Op::Mod,
        0x07 => Op::Smod,
        0x08 => Op::Addmod,
        0x09 => Op::Mulmod,
        0x0a => Op::Exp,
        0x0b => Op::Signextend,
        0x10 => Op::Lt,
        0x11 => Op::Gt,
        0x12 => Op::Slt,
        0x13 => Op::Sgt,
        0x14 => Op::Eq,
        0x15 => Op::Iszero,
        0x16 => Op::And,
        0x17 => Op::Or,
        0x18 => Op::Xor,
        0x19 => Op::Not,
        0x1a => Op::Byte,
        0x20 => Op::Sha3,
        0x30 => Op::Address,
        0x31 => Op::Balance,
        0x32 => Op::Origin,
        0x33 => Op::Caller,
        0x34 => Op::Callvalue,
        0x35 => Op::Calldataload,
        0x36 => Op::Calldatasize,
        0x37 => Op::Calldatacopy,
        0x38 => Op::Codesize,
        0x39 => Op::Codecopy,
        0x3a => Op::Gasprice,
        0x3b => Op::Extcodesize,
        0x3c => Op::Extcodecopy,
        0x40 => Op::Blockhash,
        0x41 => Op::Coinbase,
        0x42 => Op::Timestamp,
        0x43 => Op::Number,
        0x44 => Op::Difficulty,
        0x45 => Op::Gaslimit,
        0x50 => Op::Pop,
        0x51 => Op::Mload,
        0x52 => Op::Mstore,
        0x53 => Op::Mstore8,
        0x54 => Op::Sload,
        0x55 => Op::Sstore,
        0x56 => Op::Jump,
        0x57 => Op::Jumpi,
        0x58 => Op::Pc,
        0x59 => Op::Msize,
        0x5a => Op::Gas,
        0x5b => Op::Jumpdest,
        0x60..=0x7f => {
            let n = (opcode - 0x5f) as usize;
            let mut word = [0u8; 32];
            for i in 0..n {
                word[32 - n + i] = tail.get(i).copied().unwrap_or(0u8);
            }
            Op::Push(U256::from_be_bytes(word))
        }
        0x80..=0x8f => Op::Dup(opcode - 0x7f),
        0x90..=0x9f => Op::Swap(opcode - 0x8f),
        0xa0..=0xa4 => Op::Log(opcode - 0xa0),
        0xf0 => Op::Create,
        0xf1 => Op::Call,
        0xf2 => Op::Callcode,
        0xf3 => Op::Return,
        0xf4 => Op::Delegatecall,
        0xfd => Op::Revert,
        0xff => Op::Selfdestruct,
        _ => Op::Unknown(opcode),
    }
}

/// The display name of an opcode byte, without decoding immediates.
pub fn opcode_name(opcode: u8) -> &'static str {
    match opcode {
        0x00 => "STOP",
        0x01 => "ADD",
        0x02 => "MUL",
        0x03 => "SUB",
        0x04 => "DIV",
        0x05 => "SDIV",
        0x06 => "MOD",
        0x07 => "SMOD",
        0x08 => "ADDMOD",
        0x09 => "MULMOD",
        0x0a => "EXP",
        0x0b => "SIGNEXTEND",
        0x10 => "LT",
        0x11 => "GT",
        0x12 => "SLT",
        0x13 => "SGT",
        0x14 => "EQ",
        0x15 => "ISZERO",
        0x16 => "AND",
        0x17 => "OR",
        0x18 => "XOR",
        0x19 => "NOT",
        0x1a => "BYTE",
        0x20 => "SHA3",
        0x30 => "ADDRESS",
        0x31 => "BALANCE",
        0x32 => "ORIGIN",
        0x33 => "CALLER",
        0x34 => "CALLVALUE",
        0x35 => "CALLDATALOAD",
        0x36 => "CALLDATASIZE",
        0x37 => "CALLDATACOPY",
        0x38 => "CODESIZE",
        0x39 => "CODECOPY",
        0x3a => "GASPRICE",
        0x3b => "EXTCODESIZE",
        0x3c => "EXTCODECOPY",
        0x40 => "BLOCKHASH",
        0x41 => "COINBASE",
        0x42 => "TIMESTAMP",
        0x43 => "NUMBER",
        0x44 => "DIFFICULTY",
        0x45 => "GASLIMIT",
        0x50 => "POP",
        0x51 => "MLOAD",
        0x52 => "MSTORE",
        0x53 => "MSTORE8",
        0x54 => "SLOAD",
        0x55 => "SSTORE",
        0x56 => "JUMP",
        0x57 => "JUMPI",
        0x58 => "PC",
        0x59 => "MSIZE",
        0x5a => "GAS",
        0x5b => "JUMPDEST",
        0x60 => "PUSH1",
        0x61 => "PUSH2",
        0x62 => "PUSH3",
        0x63 => "PUSH4",
        0x64 => "PUSH5",
        0x65 => "PUSH6",
        0x66 => "PUSH7",
        0x67 => "PUSH8",
        0x68 => "PUSH9",
        0x69 => "PUSH10",
        0x6a => "PUSH11",
        0x6b => "PUSH12",
        0x6c => "PUSH13",
        0x6d => "PUSH14",
        0x6e => "PUSH15",
        0x6f => "PUSH16",
        0x70 => "PUSH17",
        0x71 => "PUSH18",
        0x72 => "PUSH19",
        0x73 => "PUSH20",
        0x74 => "PUSH21",
        0x75 => "PUSH22",
        0x76 => "PUSH23",
        0x77 => "PUSH24",
        0x78 => "PUSH25",
        0x79 => "PUSH26",
        0x7a => "PUSH27",
        0x7b => "PUSH28",
        0x7c => "PUSH29",
        0x7d => "PUSH30",
        0x7e => "PUSH31",
        0x7f => "PUSH32",
        0x80 => "DUP1",
        0x81 => "DUP2",
        0x82 => "DUP3",
        0x83 => "DUP4",
        0x84 => "DUP5",
        0x85 => "DUP6",
        0x86 => "DUP7",
        0x87 => "DUP8",
        0x88 => "DUP9",
        0x89 => "DUP10",
        0x8a => "DUP11",
        0x8b => "DUP12",
        0x8c => "DUP13",
        0x8d => "DUP14",
        0x8e => "DUP15",
        0x8f => "DUP16",
        0x90 => "SWAP1",
        0x91 => "SWAP2",
        0x92 => "SWAP3",
        0x93 => "SWAP4",
        0x94 => "SWAP5",
        0x95 => "SWAP6",
        0x96 => "SWAP7",
        0x97 => "SWAP8",
        0x98 => "SWAP9",
        0x99 => "SWAP10",
        0x9a => "SWAP11",
        0x9b => "SWAP12",
        0x9c => "SWAP13",
        0x9d => "SWAP14",
        0x9e => "SWAP15",
        0x9f => "SWAP16",
        0xa0 => "LOG0",
        0xa1 => "LOG1",
        0xa2 => "LOG2",
        0xa3 => "LOG3",
        0xa4 => "LOG4",
        0xf0 => "CREATE",
        0xf1 => "CALL",
        0xf2 => "CALLCODE",
        0xf3 => "RETURN",
        0xf4 => "DELEGATECALL",
        0xfd => "REVERT",
        0xff => "SELFDESTRUCT",
        _ => "unknown",
    }
}

/// For each byte of `code`, the index of the operation whose byte range
/// contains it. Push-immediate bytes share the index of their PUSH opcode.
pub fn mk_op_ix_map(code: &[u8]) -> Vec<usize> {
    let mut map = Vec::with_capacity(code.len());
    let mut op_ix = 0;
    let mut i = 0;
    while i < code.len() {
        let size = op_size(code[i]);
        // a PUSH at the end of the code may own fewer bytes than it spans
        for _ in 0..size.min(code.len() - i) {
            map.push(op_ix);
        }
        i += size;
        op_ix += 1;
    }
    map
}

/// Decode `code` into its flat sequence of operations.
pub fn mk_code_ops(code: &[u8]) -> Vec<Op> {
    let mut ops = Vec::new();
    let mut i = 0;
    while i < code.len() {
        ops.push(read_op(code[i], &code[i + 1..]));
        i += op_size(code[i]);
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_size() {
        assert_eq!(op_size(0x01), 1);
        assert_eq!(op_size(0x60), 2);
        assert_eq!(op_size(0x7f), 33);
        assert_eq!(op_size(0xff), 1);
    }

    #[test]
    fn test_read_op_push() {
        assert_eq!(read_op(0x60, &[0x2a]), Op::Push(U256::from(0x2a)));
        assert_eq!(read_op(0x61, &[0x01, 0x02]), Op::Push(U256::from(0x0102)));
    }

    #[test]
    fn test_read_op_push_truncated() {
        // missing immediate bytes read as zero
        assert_eq!(read_op(0x61, &[0x01]), Op::Push(U256::from(0x0100)));
        assert_eq!(read_op(0x60, &[]), Op::Push(U256::ZERO));
    }

    #[test]
    fn test_read_op_families() {
        assert_eq!(read_op(0x80, &[]), Op::Dup(1));
        assert_eq!(read_op(0x8f, &[]), Op::Dup(16));
        assert_eq!(read_op(0x90, &[]), Op::Swap(1));
        assert_eq!(read_op(0x9f, &[]), Op::Swap(16));
        assert_eq!(read_op(0xa0, &[]), Op::Log(0));
        assert_eq!(read_op(0xa4, &[]), Op::Log(4));
    }

    #[test]
    fn test_read_op_unknown() {
        assert_eq!(read_op(0x0c, &[]), Op::Unknown(0x0c));
        assert_eq!(read_op(0xfe, &[]), Op::Unknown(0xfe));
    }

    #[test]
    fn test_mk_op_ix_map_labels_push_immediates() {
        // PUSH1 0x05, PUSH1 0x03, ADD
        let code = [0x60, 0x05, 0x60, 0x03, 0x01];
        assert_eq!(mk_op_ix_map(&code), vec![0, 0, 1, 1, 2]);
    }

    #[test]
    fn test_mk_op_ix_map_truncated_push() {
        // PUSH2 with only one immediate byte present
        let code = [0x61, 0x05];
        assert_eq!(mk_op_ix_map(&code), vec![0, 0]);
    }

    #[test]
    fn test_mk_code_ops() {
        let code = [0x60, 0x05, 0x60, 0x03, 0x01, 0x00];
        assert_eq!(
            mk_code_ops(&code),
            vec![Op::Push(U256::from(5)), Op::Push(U256::from(3)), Op::Add, Op::Stop]
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(read_op(0x60, &[0x2a]).to_string(), "PUSH 0x2a");
        assert_eq!(read_op(0x91, &[]).to_string(), "SWAP2");
        assert_eq!(read_op(0x01, &[]).to_string(), "ADD");
    }
}
