use std::collections::HashMap;

use alloy::primitives::{keccak256, Address, B256, U256};
use tracing::{debug, trace};

use sevm_common::utils::strings::sign_uint;

use super::{
    constants::GAS_PLACEHOLDER,
    contract::Contract,
    env::{Block, Env},
    errors::VmError,
    log::Log,
    memory::Memory,
    opcodes::{op_size, opcode_name, read_op, Op},
    stack::Stack,
    trace::ContextTrace,
};

/// Construction parameters for a [`VM`]: one seed contract plus the
/// transaction and block context it runs under.
#[derive(Clone, Debug)]
pub struct VmOpts {
    /// Runtime bytecode of the seed contract.
    pub code: Vec<u8>,
    /// Input data for the outermost call.
    pub calldata: Vec<u8>,
    /// Value sent with the outermost call (in wei).
    pub value: U256,
    /// Address the seed contract is installed at.
    pub address: Address,
    /// Direct caller of the outermost call.
    pub caller: Address,
    /// Externally-owned account that originated the transaction.
    pub origin: Address,
    /// Block number.
    pub number: U256,
    /// Block timestamp, in seconds.
    pub timestamp: U256,
    /// Block reward recipient.
    pub coinbase: Address,
    /// Block difficulty.
    pub difficulty: U256,
    /// Block gas limit.
    pub gaslimit: U256,
}

/// The register set of one execution frame.
#[derive(Clone, Debug)]
pub struct FrameState {
    /// The executing account: receiver of SLOAD/SSTORE and value transfers.
    pub contract: Address,

    /// The account whose code is running. Differs from `contract` under
    /// DELEGATECALL.
    pub code_contract: Address,

    /// The running bytecode.
    pub code: Vec<u8>,

    /// The program counter, as a byte offset into `code`.
    pub pc: usize,

    /// The frame's word stack.
    pub stack: Stack,

    /// The frame's memory.
    pub memory: Memory,

    /// High-water mark of memory touched by this frame, in 32-byte words.
    /// This is what MSIZE reports, independent of the physical buffer.
    pub memory_size: u64,

    /// Input data of the call that entered this frame.
    pub calldata: Vec<u8>,

    /// Value sent with the call that entered this frame.
    pub callvalue: U256,

    /// Direct caller of this frame.
    pub caller: Address,
}

/// What kind of nested frame is executing, and what is needed to unwind it.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameContext {
    /// A CREATE frame running initialization code.
    Creation {
        /// keccak-256 of the initialization code.
        codehash: U256,
    },

    /// A CALL or DELEGATECALL frame.
    Call {
        /// Where in the caller's memory the return data is copied.
        out_offset: usize,
        /// Cap on how many returned bytes are copied back.
        out_size: usize,
        /// keccak-256 of the callee's code.
        codehash: U256,
        /// The 4-byte selector of the call's calldata, when present.
        abi: Option<U256>,
        /// Snapshot of every account as of call entry, restored on revert.
        reversion: HashMap<Address, Contract>,
    },
}

/// A suspended caller: its saved registers paired with the context of the
/// callee that suspended it.
#[derive(Clone, Debug)]
pub struct Frame {
    /// The context of the nested invocation.
    pub context: FrameContext,
    /// The caller's registers, restored when the callee finishes.
    pub saved_state: FrameState,
}

/// The terminal outcome of an execution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VmResult {
    /// The outermost frame returned, with its return data.
    Success(Vec<u8>),
    /// The outermost frame failed or reverted.
    Failure(VmError),
}

/// The [`VM`] struct is a self-contained EVM instance: the live frame
/// registers, the stack of suspended callers, and the whole world state.
///
/// One call to [`VM::step`] advances execution by exactly one opcode (or
/// terminates the machine). All state is plain data; checkpointing an
/// execution is a `clone()`.
#[derive(Clone, Debug)]
pub struct VM {
    /// The terminal result, once the outermost frame has finished.
    pub result: Option<VmResult>,

    /// The registers of the frame currently executing.
    pub state: FrameState,

    /// Suspended callers, innermost last.
    pub frames: Vec<Frame>,

    /// The world state: accounts, hash pre-images, transaction origin.
    pub env: Env,

    /// The block context.
    pub block: Block,

    /// Addresses that ran SELFDESTRUCT, in execution order.
    pub selfdestructs: Vec<Address>,

    /// Every log emitted, in execution order.
    pub logs: Vec<Log>,

    /// The call-context trace recording nesting and logs.
    pub trace: ContextTrace,
}

fn word_to_address(value: U256) -> Address {
    Address::from_word(B256::from(value))
}

fn address_to_word(address: Address) -> U256 {
    U256::from_be_bytes(address.into_word().0)
}

fn to_usize(value: U256) -> usize {
    value.try_into().unwrap_or(usize::MAX)
}

impl VM {
    /// Creates a new [`VM`] whose world contains exactly one contract,
    /// installed at `opts.address` with the given code.
    pub fn new(opts: VmOpts) -> VM {
        let contract = Contract::new(opts.code.clone());
        let mut contracts = HashMap::new();
        contracts.insert(opts.address, contract);

        VM {
            result: None,
            state: FrameState {
                contract: opts.address,
                code_contract: opts.address,
                code: opts.code,
                pc: 0,
                stack: Stack::new(),
                memory: Memory::new(),
                memory_size: 0,
                calldata: opts.calldata,
                callvalue: opts.value,
                caller: opts.caller,
            },
            frames: Vec::new(),
            env: Env {
                contracts,
                sha3_crack: hashbrown::HashMap::new(),
                origin: opts.origin,
            },
            block: Block {
                coinbase: opts.coinbase,
                timestamp: opts.timestamp,
                number: opts.number,
                difficulty: opts.difficulty,
                gaslimit: opts.gaslimit,
            },
            selfdestructs: Vec::new(),
            logs: Vec::new(),
            trace: ContextTrace::new(),
        }
    }

    /// Advances the machine by exactly one opcode, or terminates it.
    ///
    /// Errors never propagate to the caller of `step`: a surfacing error
    /// unwinds one frame exactly like REVERT does, and only becomes the
    /// terminal [`VmResult::Failure`] once no frames remain. Stepping a
    /// finished machine is a no-op.
    pub fn step(&mut self) {
        if self.result.is_some() {
            return;
        }
        if let Err(error) = self.exec1() {
            self.unwind_frame(error);
        }
    }

    /// Runs the machine to completion and returns its result.
    ///
    /// Diverging bytecode (an unconditional loop) will spin forever; callers
    /// that need a bound should drive [`VM::step`] themselves.
    pub fn execute(&mut self) -> VmResult {
        while self.result.is_none() {
            self.step();
        }
        self.result.clone().expect("loop exits only once result is set")
    }

    /// The account whose code is currently running, if it still exists.
    pub fn current_contract(&self) -> Option<&Contract> {
        self.env.contracts.get(&self.state.code_contract)
    }

    /// Decode the operation at the current program counter.
    pub fn current_op(&self) -> Option<Op> {
        let pc = self.state.pc;
        if pc < self.state.code.len() {
            Some(read_op(self.state.code[pc], &self.state.code[pc + 1..]))
        } else {
            None
        }
    }

    /// The operation index (position in the decoded op sequence) at the
    /// current program counter.
    pub fn current_op_ix(&self) -> Option<usize> {
        self.current_contract()?.op_ix_map.get(self.state.pc).copied()
    }

    /// Named parameters of the operation about to execute, read off the
    /// stack without popping. Intended for inspection UIs; operations not
    /// listed produce an empty map.
    pub fn op_params(&self) -> HashMap<&'static str, U256> {
        let names: &[&'static str] = match self.current_op() {
            Some(Op::Create) => &["value", "offset", "size"],
            Some(Op::Call) => {
                &["gas", "to", "value", "in-offset", "in-size", "out-offset", "out-size"]
            }
            Some(Op::Sstore) => &["index", "value"],
            Some(Op::Codecopy) => &["mem-offset", "code-offset", "code-size"],
            Some(Op::Sha3) => &["offset", "size"],
            Some(Op::Calldatacopy) => &["to", "from", "size"],
            Some(Op::Extcodecopy) => &["account", "mem-offset", "code-offset", "code-size"],
            Some(Op::Return) => &["offset", "size"],
            Some(Op::Jumpi) => &["destination", "condition"],
            _ => &[],
        };
        names.iter().enumerate().map(|(i, name)| (*name, self.state.stack.peek(i))).collect()
    }

    fn this_contract(&self) -> &Contract {
        self.env.contracts.get(&self.state.contract).expect("executing account must exist")
    }

    fn this_contract_mut(&mut self) -> &mut Contract {
        self.env.contracts.get_mut(&self.state.contract).expect("executing account must exist")
    }

    /// Fetch the account at `address`, materializing a default-empty one if
    /// the world has no entry for it yet.
    fn touch_account(&mut self, address: Address) -> &mut Contract {
        self.env.contracts.entry(address).or_insert_with(|| Contract::new(Vec::new()))
    }

    /// Raise the frame's memory high-water mark to cover `[offset,
    /// offset+len)`. A zero-length access never expands, regardless of
    /// offset.
    fn access_memory_range(&mut self, offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        let words = (offset.saturating_add(len).saturating_add(31) / 32) as u64;
        self.state.memory_size = self.state.memory_size.max(words);
    }

    fn push_bool(&mut self, condition: bool) {
        self.state.stack.push(if condition { U256::from(1u8) } else { U256::ZERO });
    }

    /// Validate and take a jump: the destination must be in range, must be a
    /// JUMPDEST byte, and must not sit inside push-immediate data.
    fn check_jump(&mut self, destination: U256) -> Result<(), VmError> {
        let dst: usize = destination.try_into().map_err(|_| VmError::BadJumpDestination)?;
        if dst >= self.state.code.len() || self.state.code[dst] != 0x5b {
            return Err(VmError::BadJumpDestination);
        }
        let op_ix_map = &self
            .env
            .contracts
            .get(&self.state.code_contract)
            .expect("executing account must exist")
            .op_ix_map;
        if dst > 0 && op_ix_map[dst] == op_ix_map[dst - 1] {
            return Err(VmError::BadJumpDestination);
        }
        self.state.pc = dst;
        Ok(())
    }

    /// Finish the current frame as an implicit or explicit STOP: the caller
    /// resumes with 1 pushed, or the machine succeeds with empty return
    /// data.
    fn stop_frame(&mut self) {
        match self.frames.pop() {
            None => {
                debug!("vm halted");
                self.result = Some(VmResult::Success(Vec::new()));
            }
            Some(frame) => {
                debug!(depth = self.frames.len(), "frame stopped");
                self.trace.leave();
                self.state = frame.saved_state;
                self.state.stack.push(U256::from(1u8));
            }
        }
    }

    /// Finish the current frame through RETURN with the given data.
    ///
    /// For a creation frame the data becomes the new contract's code and the
    /// created address is pushed; for a call frame the data is copied into
    /// the caller's memory (truncated to the requested output size) and 1 is
    /// pushed.
    fn return_frame(&mut self, data: Vec<u8>) {
        match self.frames.pop() {
            None => {
                debug!(returndata_len = data.len(), "vm returned");
                self.result = Some(VmResult::Success(data));
            }
            Some(frame) => {
                debug!(depth = self.frames.len(), "frame returned");
                self.trace.leave();
                let callee = self.state.contract;
                self.state = frame.saved_state;
                match frame.context {
                    FrameContext::Creation { .. } => {
                        self.perform_creation(callee, data);
                        self.state.stack.push(address_to_word(callee));
                    }
                    FrameContext::Call { out_offset, out_size, .. } => {
                        let n = data.len().min(out_size);
                        self.state.memory.write_range(&data, n, 0, out_offset);
                        self.state.stack.push(U256::from(1u8));
                    }
                }
            }
        }
    }

    /// Unwind one frame after an error or REVERT: a call frame restores the
    /// world from its reversion snapshot, a creation frame deletes the
    /// half-made account, and the caller resumes with 0 pushed. With no
    /// caller left, the error becomes the machine's terminal result.
    fn unwind_frame(&mut self, error: VmError) {
        match self.frames.pop() {
            None => {
                debug!(%error, "vm failed");
                self.result = Some(VmResult::Failure(error));
            }
            Some(frame) => {
                debug!(%error, depth = self.frames.len(), "frame unwound");
                self.trace.leave();
                let callee = self.state.contract;
                self.state = frame.saved_state;
                match frame.context {
                    FrameContext::Call { reversion, .. } => {
                        self.env.contracts = reversion;
                    }
                    FrameContext::Creation { .. } => {
                        self.env.contracts.remove(&callee);
                    }
                }
                self.state.stack.push(U256::ZERO);
            }
        }
    }

    /// Install the runtime code a creation frame returned.
    ///
    /// Empty code removes the account entirely; otherwise the account keeps
    /// its storage and balance and gets the new code, hash, and op maps.
    fn perform_creation(&mut self, address: Address, code: Vec<u8>) {
        if code.is_empty() {
            self.env.contracts.remove(&address);
            return;
        }
        let mut created = Contract::new(code);
        if let Some(existing) = self.env.contracts.get(&address) {
            created.storage = existing.storage.clone();
            created.balance = existing.balance;
        }
        self.env.contracts.insert(address, created);
    }

    /// Execute one opcode. Any returned error is absorbed by the caller
    /// ([`VM::step`]) through the one-frame unwind.
    fn exec1(&mut self) -> Result<(), VmError> {
        // running off the end of the code is an implicit STOP
        if self.state.pc >= self.state.code.len() {
            self.stop_frame();
            return Ok(());
        }

        let pc = self.state.pc;
        let opcode = self.state.code[pc];
        self.state.pc += op_size(opcode);

        trace!(pc, opcode = opcode_name(opcode), "executing opcode");

        match opcode {
            // STOP
            0x00 => self.stop_frame(),

            // ADD
            0x01 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                self.state.stack.push(a.wrapping_add(b));
            }

            // MUL
            0x02 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                self.state.stack.push(a.wrapping_mul(b));
            }

            // SUB
            0x03 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                self.state.stack.push(a.wrapping_sub(b));
            }

            // DIV
            0x04 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                self.state.stack.push(if b.is_zero() { U256::ZERO } else { a / b });
            }

            // SDIV
            0x05 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                // checked_div covers both rules: zero divisor => 0, and
                // MIN / -1 overflows back to MIN (the raw dividend)
                let result = if b.is_zero() {
                    U256::ZERO
                } else {
                    sign_uint(a).checked_div(sign_uint(b)).map(|q| q.into_raw()).unwrap_or(a)
                };
                self.state.stack.push(result);
            }

            // MOD
            0x06 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                self.state.stack.push(if b.is_zero() { U256::ZERO } else { a % b });
            }

            // SMOD
            0x07 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                // remainder takes the dividend's sign; MIN % -1 is 0
                let result = if b.is_zero() {
                    U256::ZERO
                } else {
                    sign_uint(a)
                        .checked_rem(sign_uint(b))
                        .map(|r| r.into_raw())
                        .unwrap_or(U256::ZERO)
                };
                self.state.stack.push(result);
            }

            // ADDMOD
            0x08 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                let modulus = self.state.stack.pop()?;
                self.state.stack.push(a.add_mod(b, modulus));
            }

            // MULMOD
            0x09 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                let modulus = self.state.stack.pop()?;
                self.state.stack.push(a.mul_mod(b, modulus));
            }

            // EXP
            0x0a => {
                let a = self.state.stack.pop()?;
                let exponent = self.state.stack.pop()?;
                self.state.stack.push(a.overflowing_pow(exponent).0);
            }

            // SIGNEXTEND
            0x0b => {
                let b = self.state.stack.pop()?;
                let x = self.state.stack.pop()?;
                let result = if b >= U256::from(32u8) {
                    x
                } else {
                    let bit = 8 * to_usize(b) + 7;
                    let mask = if bit == 255 {
                        U256::MAX
                    } else {
                        (U256::from(1u8) << (bit + 1)) - U256::from(1u8)
                    };
                    if x.bit(bit) {
                        x | !mask
                    } else {
                        x & mask
                    }
                };
                self.state.stack.push(result);
            }

            // LT
            0x10 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                self.push_bool(a < b);
            }

            // GT
            0x11 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                self.push_bool(a > b);
            }

            // SLT
            0x12 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                self.push_bool(sign_uint(a) < sign_uint(b));
            }

            // SGT
            0x13 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                self.push_bool(sign_uint(a) > sign_uint(b));
            }

            // EQ
            0x14 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                self.push_bool(a == b);
            }

            // ISZERO
            0x15 => {
                let a = self.state.stack.pop()?;
                self.push_bool(a.is_zero());
            }

            // AND
            0x16 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                self.state.stack.push(a & b);
            }

            // OR
            0x17 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                self.state.stack.push(a | b);
            }

            // XOR
            0x18 => {
                let a = self.state.stack.pop()?;
                let b = self.state.stack.pop()?;
                self.state.stack.push(a ^ b);
            }

            // NOT
            0x19 => {
                let a = self.state.stack.pop()?;
                self.state.stack.push(!a);
            }

            // BYTE
            0x1a => {
                let n = self.state.stack.pop()?;
                let x = self.state.stack.pop()?;
                let result = if n >= U256::from(32u8) {
                    U256::ZERO
                } else {
                    U256::from(x.to_be_bytes::<32>()[to_usize(n)])
                };
                self.state.stack.push(result);
            }

            // SHA3
            0x20 => {
                let offset = to_usize(self.state.stack.pop()?);
                let size = to_usize(self.state.stack.pop()?);
                self.access_memory_range(offset, size);
                let data = self.state.memory.read(offset, size);
                let hash = U256::from_be_bytes(keccak256(&data).0);
                self.env.sha3_crack.insert(hash, data);
                self.state.stack.push(hash);
            }

            // ADDRESS
            0x30 => {
                let address = self.state.contract;
                self.state.stack.push(address_to_word(address));
            }

            // BALANCE
            0x31 => {
                let address = word_to_address(self.state.stack.pop()?);
                let balance = self.touch_account(address).balance;
                self.state.stack.push(balance);
            }

            // ORIGIN
            0x32 => {
                let origin = self.env.origin;
                self.state.stack.push(address_to_word(origin));
            }

            // CALLER
            0x33 => {
                let caller = self.state.caller;
                self.state.stack.push(address_to_word(caller));
            }

            // CALLVALUE
            0x34 => {
                let callvalue = self.state.callvalue;
                self.state.stack.push(callvalue);
            }

            // CALLDATALOAD
            0x35 => {
                let i = to_usize(self.state.stack.pop()?);
                let mut word = [0u8; 32];
                if i < self.state.calldata.len() {
                    let end = self.state.calldata.len().min(i + 32);
                    word[..end - i].copy_from_slice(&self.state.calldata[i..end]);
                }
                self.state.stack.push(U256::from_be_bytes(word));
            }

            // CALLDATASIZE
            0x36 => {
                let size = self.state.calldata.len();
                self.state.stack.push(U256::from(size));
            }

            // CALLDATACOPY
            0x37 => {
                let dst_offset = to_usize(self.state.stack.pop()?);
                let offset = to_usize(self.state.stack.pop()?);
                let size = to_usize(self.state.stack.pop()?);
                self.access_memory_range(dst_offset, size);
                self.state.memory.write_range(&self.state.calldata, size, offset, dst_offset);
            }

            // CODESIZE
            0x38 => {
                let size = self.state.code.len();
                self.state.stack.push(U256::from(size));
            }

            // CODECOPY
            0x39 => {
                let dst_offset = to_usize(self.state.stack.pop()?);
                let offset = to_usize(self.state.stack.pop()?);
                let size = to_usize(self.state.stack.pop()?);
                self.access_memory_range(dst_offset, size);
                self.state.memory.write_range(&self.state.code, size, offset, dst_offset);
            }

            // GASPRICE
            0x3a => {
                self.state.stack.push(U256::ZERO);
            }

            // EXTCODESIZE
            0x3b => {
                let address = word_to_address(self.state.stack.pop()?);
                let size = self.touch_account(address).codesize;
                self.state.stack.push(U256::from(size));
            }

            // EXTCODECOPY
            0x3c => {
                let address = word_to_address(self.state.stack.pop()?);
                let dst_offset = to_usize(self.state.stack.pop()?);
                let offset = to_usize(self.state.stack.pop()?);
                let size = to_usize(self.state.stack.pop()?);
                let code = self.touch_account(address).bytecode.clone();
                self.access_memory_range(dst_offset, size);
                self.state.memory.write_range(&code, size, offset, dst_offset);
            }

            // BLOCKHASH
            0x40 => {
                // no block-hash history is available
                self.state.stack.pop()?;
                self.state.stack.push(U256::ZERO);
            }

            // COINBASE
            0x41 => {
                let coinbase = self.block.coinbase;
                self.state.stack.push(address_to_word(coinbase));
            }

            // TIMESTAMP
            0x42 => {
                let timestamp = self.block.timestamp;
                self.state.stack.push(timestamp);
            }

            // NUMBER
            0x43 => {
                let number = self.block.number;
                self.state.stack.push(number);
            }

            // DIFFICULTY
            0x44 => {
                let difficulty = self.block.difficulty;
                self.state.stack.push(difficulty);
            }

            // GASLIMIT
            0x45 => {
                let gaslimit = self.block.gaslimit;
                self.state.stack.push(gaslimit);
            }

            // POP
            0x50 => {
                self.state.stack.pop()?;
            }

            // MLOAD
            0x51 => {
                let offset = to_usize(self.state.stack.pop()?);
                self.access_memory_range(offset, 32);
                let word = self.state.memory.read_word(offset);
                self.state.stack.push(word);
            }

            // MSTORE
            0x52 => {
                let offset = to_usize(self.state.stack.pop()?);
                let value = self.state.stack.pop()?;
                self.access_memory_range(offset, 32);
                self.state.memory.write_word(offset, value);
            }

            // MSTORE8
            0x53 => {
                let offset = to_usize(self.state.stack.pop()?);
                let value = self.state.stack.pop()?;
                self.access_memory_range(offset, 1);
                self.state.memory.write_byte(offset, value.to_be_bytes::<32>()[31]);
            }

            // SLOAD
            0x54 => {
                let key = self.state.stack.pop()?;
                let value = self.this_contract().storage_at(key);
                self.state.stack.push(value);
            }

            // SSTORE
            0x55 => {
                let key = self.state.stack.pop()?;
                let value = self.state.stack.pop()?;
                self.this_contract_mut().set_storage(key, value);
            }

            // JUMP
            0x56 => {
                let destination = self.state.stack.pop()?;
                self.check_jump(destination)?;
            }

            // JUMPI
            0x57 => {
                let destination = self.state.stack.pop()?;
                let condition = self.state.stack.pop()?;
                if !condition.is_zero() {
                    self.check_jump(destination)?;
                }
            }

            // PC
            0x58 => {
                self.state.stack.push(U256::from(pc));
            }

            // MSIZE
            0x59 => {
                let size = U256::from(self.state.memory_size) * U256::from(32u8);
                self.state.stack.push(size);
            }

            // GAS
            0x5a => {
                self.state.stack.push(*GAS_PLACEHOLDER);
            }

            // JUMPDEST
            0x5b => {}

            // PUSH1 -> PUSH32
            0x60..=0x7f => {
                let n = (opcode - 0x5f) as usize;
                let mut word = [0u8; 32];
                for i in 0..n {
                    word[32 - n + i] = self.state.code.get(pc + 1 + i).copied().unwrap_or(0u8);
                }
                self.state.stack.push(U256::from_be_bytes(word));
            }

            // DUP1 -> DUP16
            0x80..=0x8f => {
                let n = (opcode - 0x7f) as usize;
                if !self.state.stack.dup(n) {
                    return Err(VmError::StackUnderrun);
                }
            }

            // SWAP1 -> SWAP16
            0x90..=0x9f => {
                let n = (opcode - 0x8f) as usize;
                if !self.state.stack.swap(n) {
                    return Err(VmError::StackUnderrun);
                }
            }

            // LOG0 -> LOG4
            0xa0..=0xa4 => {
                let topic_count = (opcode - 0xa0) as usize;
                let offset = to_usize(self.state.stack.pop()?);
                let size = to_usize(self.state.stack.pop()?);
                let topics = self.state.stack.pop_n(topic_count)?;
                self.access_memory_range(offset, size);
                let data = self.state.memory.read(offset, size);
                let log = Log::new(self.state.contract, topics, &data);
                self.logs.push(log.clone());
                self.trace.record_log(log);
            }

            // CREATE
            0xf0 => {
                let value = self.state.stack.pop()?;
                let offset = to_usize(self.state.stack.pop()?);
                let size = to_usize(self.state.stack.pop()?);

                self.access_memory_range(offset, size);
                let init_code = self.state.memory.read(offset, size);

                let this = self.this_contract();
                if value > this.balance {
                    return Err(VmError::BalanceTooLow);
                }
                let nonce: u64 = this.nonce.try_into().unwrap_or(u64::MAX);
                let new_address = self.state.contract.create(nonce);

                {
                    let this = self.this_contract_mut();
                    this.nonce = this.nonce.wrapping_add(U256::from(1u8));
                    this.balance = this.balance.wrapping_sub(value);
                }
                self.env.contracts.insert(new_address, Contract::new(init_code.clone()));

                debug!(address = %new_address, "entering creation frame");
                let context = FrameContext::Creation {
                    codehash: U256::from_be_bytes(keccak256(&init_code).0),
                };
                self.trace.enter(context.clone());

                let caller = self.state.contract;
                let callee_state = FrameState {
                    contract: new_address,
                    code_contract: new_address,
                    code: init_code,
                    pc: 0,
                    stack: Stack::new(),
                    memory: Memory::new(),
                    memory_size: 0,
                    calldata: Vec::new(),
                    callvalue: value,
                    caller,
                };
                let saved_state = std::mem::replace(&mut self.state, callee_state);
                self.frames.push(Frame { context, saved_state });
            }

            // CALL
            0xf1 => {
                let _gas = self.state.stack.pop()?;
                let to = self.state.stack.pop()?;
                let value = self.state.stack.pop()?;
                let in_offset = to_usize(self.state.stack.pop()?);
                let in_size = to_usize(self.state.stack.pop()?);
                let out_offset = to_usize(self.state.stack.pop()?);
                let out_size = to_usize(self.state.stack.pop()?);

                if value > self.this_contract().balance {
                    return Err(VmError::BalanceTooLow);
                }
                let to_address = word_to_address(to);
                let (code, codehash) = match self.env.contracts.get(&to_address) {
                    Some(callee) => (callee.bytecode.clone(), callee.codehash),
                    None => return Err(VmError::NoSuchContract(to_address)),
                };

                self.access_memory_range(in_offset, in_size);
                self.access_memory_range(out_offset, out_size);
                let calldata = self.state.memory.read(in_offset, in_size);
                let abi = if calldata.len() >= 4 {
                    Some(U256::from_be_slice(&calldata[..4]))
                } else {
                    None
                };

                let reversion = self.env.contracts.clone();
                let caller = self.state.contract;
                {
                    let this = self.this_contract_mut();
                    this.balance = this.balance.wrapping_sub(value);
                }
                {
                    let callee =
                        self.env.contracts.get_mut(&to_address).expect("callee fetched above");
                    callee.balance = callee.balance.wrapping_add(value);
                }

                debug!(to = %to_address, "entering call frame");
                let context =
                    FrameContext::Call { out_offset, out_size, codehash, abi, reversion };
                self.trace.enter(context.clone());

                let callee_state = FrameState {
                    contract: to_address,
                    code_contract: to_address,
                    code,
                    pc: 0,
                    stack: Stack::new(),
                    memory: Memory::new(),
                    memory_size: 0,
                    calldata,
                    callvalue: value,
                    caller,
                };
                let saved_state = std::mem::replace(&mut self.state, callee_state);
                self.frames.push(Frame { context, saved_state });
            }

            // CALLCODE
            0xf2 => {
                panic!("CALLCODE (0xf2) is unsupported");
            }

            // RETURN
            0xf3 => {
                let offset = to_usize(self.state.stack.pop()?);
                let size = to_usize(self.state.stack.pop()?);
                self.access_memory_range(offset, size);
                let data = self.state.memory.read(offset, size);
                self.return_frame(data);
            }

            // DELEGATECALL
            0xf4 => {
                let _gas = self.state.stack.pop()?;
                let to = self.state.stack.pop()?;
                let in_offset = to_usize(self.state.stack.pop()?);
                let in_size = to_usize(self.state.stack.pop()?);
                let out_offset = to_usize(self.state.stack.pop()?);
                let out_size = to_usize(self.state.stack.pop()?);

                let to_address = word_to_address(to);
                let (code, codehash) = match self.env.contracts.get(&to_address) {
                    Some(target) => (target.bytecode.clone(), target.codehash),
                    None => return Err(VmError::NoSuchContract(to_address)),
                };

                self.access_memory_range(in_offset, in_size);
                self.access_memory_range(out_offset, out_size);
                let calldata = self.state.memory.read(in_offset, in_size);
                let abi = if calldata.len() >= 4 {
                    Some(U256::from_be_slice(&calldata[..4]))
                } else {
                    None
                };

                debug!(code_from = %to_address, "entering delegatecall frame");
                let context = FrameContext::Call {
                    out_offset,
                    out_size,
                    codehash,
                    abi,
                    reversion: self.env.contracts.clone(),
                };
                self.trace.enter(context.clone());

                // the executing account, caller, and callvalue carry over;
                // only the code comes from the target
                let callee_state = FrameState {
                    contract: self.state.contract,
                    code_contract: to_address,
                    code,
                    pc: 0,
                    stack: Stack::new(),
                    memory: Memory::new(),
                    memory_size: 0,
                    calldata,
                    callvalue: self.state.callvalue,
                    caller: self.state.caller,
                };
                let saved_state = std::mem::replace(&mut self.state, callee_state);
                self.frames.push(Frame { context, saved_state });
            }

            // REVERT
            0xfd => {
                let _offset = self.state.stack.pop()?;
                let _size = self.state.stack.pop()?;
                // revert return data is not carried
                return Err(VmError::Revert);
            }

            // SELFDESTRUCT
            0xff => {
                let beneficiary = word_to_address(self.state.stack.pop()?);
                let address = self.state.contract;
                self.selfdestructs.push(address);

                let balance = self.this_contract().balance;
                {
                    let account = self.touch_account(beneficiary);
                    account.balance = account.balance.wrapping_add(balance);
                }
                self.this_contract_mut().balance = U256::ZERO;

                debug!(%address, %beneficiary, "contract selfdestructed");
                return Err(VmError::SelfDestruction);
            }

            _ => return Err(VmError::UnrecognizedOpcode(opcode)),
        }

        Ok(())
    }
}
