//! Verification-time benchmarks
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use bpf_absint::analysis::cfg::Cfg;
use bpf_absint::core::insn::{BinOp, Instruction, MemAccess};
use bpf_absint::core::program::{ContextDescriptor, ProgramInfo};
use bpf_absint::core::types::{CondOp, Condition, Imm, Reg, Value};
use bpf_absint::verifier::{abs_validate, VerifierOptions};

fn mov_imm(dst: u8, imm: u64) -> Instruction {
    Instruction::Bin {
        op: BinOp::Mov,
        dst: Reg(dst),
        v: Value::Imm(Imm(imm)),
    }
}

/// A straight-line block of `n` ALU instructions followed by exit.
fn linear_program(n: usize) -> Cfg {
    let mut insts = vec![mov_imm(0, 0)];
    for i in 0..n {
        insts.push(Instruction::Bin {
            op: if i % 2 == 0 { BinOp::Add } else { BinOp::Sub },
            dst: Reg(0),
            v: Value::Imm(Imm(1)),
        });
    }
    insts.push(Instruction::Exit);
    let mut cfg = Cfg::new();
    cfg.add_block(0, insts);
    cfg
}

/// A chain of `n` diamonds, each joining two guarded arms.
fn diamond_program(n: usize) -> Cfg {
    let mut cfg = Cfg::new();
    cfg.add_block(0, vec![mov_imm(0, 0), mov_imm(2, 1)]);
    let mut label = 0;
    for _ in 0..n {
        let (then_l, else_l, join_l) = (label + 1, label + 2, label + 3);
        cfg.add_block(
            then_l,
            vec![Instruction::Assume {
                cond: Condition {
                    op: CondOp::Eq,
                    left: Reg(2),
                    right: Value::Imm(Imm(0)),
                },
            }],
        );
        cfg.add_block(
            else_l,
            vec![Instruction::Assume {
                cond: Condition {
                    op: CondOp::Ne,
                    left: Reg(2),
                    right: Value::Imm(Imm(0)),
                },
            }],
        );
        cfg.add_block(join_l, vec![mov_imm(3, 7)]);
        cfg.add_edge(label, then_l);
        cfg.add_edge(label, else_l);
        cfg.add_edge(then_l, join_l);
        cfg.add_edge(else_l, join_l);
        label = join_l;
    }
    let exit_l = label + 1;
    cfg.add_block(exit_l, vec![Instruction::Exit]);
    cfg.add_edge(label, exit_l);
    cfg
}

/// The checked packet-access idiom.
fn packet_program() -> Cfg {
    let load = |dst: u8, off: i64| Instruction::Mem {
        access: MemAccess {
            basereg: Reg(1),
            offset: off,
            width: 4,
        },
        value: Value::Reg(Reg(dst)),
        is_load: true,
    };
    let mut cfg = Cfg::new();
    cfg.add_block(
        0,
        vec![
            load(2, 0),
            load(4, 4),
            Instruction::Bin {
                op: BinOp::Mov,
                dst: Reg(3),
                v: Value::Reg(Reg(2)),
            },
            Instruction::Bin {
                op: BinOp::Add,
                dst: Reg(3),
                v: Value::Imm(Imm(4)),
            },
        ],
    );
    cfg.add_block(
        1,
        vec![
            Instruction::Assume {
                cond: Condition {
                    op: CondOp::Le,
                    left: Reg(3),
                    right: Value::Reg(Reg(4)),
                },
            },
            Instruction::Mem {
                access: MemAccess {
                    basereg: Reg(2),
                    offset: 0,
                    width: 4,
                },
                value: Value::Reg(Reg(6)),
                is_load: true,
            },
            mov_imm(0, 0),
            Instruction::Exit,
        ],
    );
    cfg.add_block(
        2,
        vec![
            Instruction::Assume {
                cond: Condition {
                    op: CondOp::Gt,
                    left: Reg(3),
                    right: Value::Reg(Reg(4)),
                },
            },
            mov_imm(0, 0),
            Instruction::Exit,
        ],
    );
    cfg.add_edge(0, 1);
    cfg.add_edge(0, 2);
    cfg
}

fn xdp_info() -> ProgramInfo {
    ProgramInfo {
        descriptor: ContextDescriptor::xdp(),
        ..Default::default()
    }
}

fn bench_linear(c: &mut Criterion) {
    let info = xdp_info();
    let mut group = c.benchmark_group("linear");
    for size in [16usize, 64, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.iter(|| {
                let mut cfg = linear_program(size);
                let opts = VerifierOptions::default();
                black_box(abs_validate(&mut cfg, &info, &opts).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_diamonds(c: &mut Criterion) {
    let info = xdp_info();
    let mut group = c.benchmark_group("diamonds");
    for depth in [4usize, 16, 64] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter(|| {
                let mut cfg = diamond_program(depth);
                let opts = VerifierOptions::default();
                black_box(abs_validate(&mut cfg, &info, &opts).unwrap())
            });
        });
    }
    group.finish();
}

fn bench_packet(c: &mut Criterion) {
    let info = xdp_info();
    c.bench_function("packet_checked_access", |b| {
        b.iter(|| {
            let mut cfg = packet_program();
            let opts = VerifierOptions::default();
            black_box(abs_validate(&mut cfg, &info, &opts).unwrap())
        });
    });
}

criterion_group!(benches, bench_linear, bench_diamonds, bench_packet);
criterion_main!(benches);
