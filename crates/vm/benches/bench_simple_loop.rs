//! Benchmark stepping a tight countdown loop through the interpreter.

use alloy::primitives::{Address, U256};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use sevm_common::utils::strings::decode_hex;
use sevm_vm::core::vm::{VmOpts, VmResult, VM};

/// PUSH1 100; JUMPDEST; PUSH1 1; SWAP1; SUB; DUP1; PUSH1 2; JUMPI; STOP
const COUNTDOWN: &str = "0x60645b600190038060025700";

fn bench_countdown(c: &mut Criterion) {
    let mut group = c.benchmark_group("sevm_vm");

    group.sample_size(500);
    group.bench_function(BenchmarkId::from_parameter("countdown"), |b| {
        b.iter(|| {
            let mut vm = VM::new(VmOpts {
                code: decode_hex(COUNTDOWN).expect("invalid bytecode"),
                calldata: Vec::new(),
                value: U256::ZERO,
                address: Address::ZERO,
                caller: Address::ZERO,
                origin: Address::ZERO,
                number: U256::from(1),
                timestamp: U256::from(1),
                coinbase: Address::ZERO,
                difficulty: U256::ZERO,
                gaslimit: U256::from(30_000_000u64),
            });
            assert_eq!(vm.execute(), VmResult::Success(Vec::new()));
        });
    });

    group.finish();
}

criterion_group!(benches, bench_countdown);
criterion_main!(benches);
