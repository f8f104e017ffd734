// SPDX-License-Identifier: GPL-2.0
//! Lattice properties of the RCP value domain and machine boundary cases.

use bpf_absint::bounds::domset::{NumSet, CARDINALITY_CAP};
use bpf_absint::core::insn::{Instruction, MemAccess};
use bpf_absint::core::program::{ContextDescriptor, ProgramInfo};
use bpf_absint::core::types::{CondOp, Reg, TypeSet, Value};
use bpf_absint::state::machine::Machine;
use bpf_absint::state::rcp::RcpValue;

fn xdp_info() -> ProgramInfo {
    ProgramInfo {
        descriptor: ContextDescriptor::xdp(),
        ..Default::default()
    }
}

#[test]
fn test_constructor_projection_roundtrip() {
    let cases: &[(RcpValue, fn(&RcpValue) -> NumSet)] = &[
        (RcpValue::with_num(7), |v| v.nums()),
        (RcpValue::with_ctx(7), |v| v.ctx_offsets()),
        (RcpValue::with_stack(7), |v| v.stack_offsets()),
        (RcpValue::with_packet(7), |v| v.packet_offsets()),
    ];
    for (value, project) in cases {
        assert_eq!(project(value), NumSet::single(7));
        // Every other projection is bottom.
        let projections = [
            value.nums(),
            value.ctx_offsets(),
            value.stack_offsets(),
            value.packet_offsets(),
        ];
        assert_eq!(projections.iter().filter(|p| !p.is_bot()).count(), 1);
    }
    let fd = RcpValue::with_fd(3);
    assert_eq!(fd.fd, 1 << 3);
    assert!(fd.nums().is_bot());

    let map = RcpValue::with_map(2, 5);
    assert_eq!(map.maps.get(2), NumSet::single(5));
    assert!(map.maps.get(1).is_bot());
}

#[test]
fn test_offset_set_cap_collapses_to_top() {
    let mut acc = RcpValue::with_packet(0);
    for i in 1..=(CARDINALITY_CAP as i64) {
        acc.join(&RcpValue::with_packet(i));
    }
    assert!(acc.packet_offsets().is_top());
}

#[test]
fn test_join_is_upper_bound() {
    let mut a = RcpValue::with_packet(4);
    let b = RcpValue::with_num(0);
    a.join(&b);
    // Both operands' possibilities survive the join.
    assert_eq!(a.packet_offsets(), NumSet::single(4));
    assert_eq!(a.nums(), NumSet::single(0));
}

#[test]
fn test_meet_after_join_restores_component() {
    let mut joined = RcpValue::with_map(0, 0);
    joined.join(&RcpValue::with_num(0));
    let mut met = joined.clone();
    met.meet(&RcpValue::with_map(0, 0));
    assert!(met.nums().is_bot());
    assert_eq!(met.maps.get(0), NumSet::single(0));
}

#[test]
fn test_satisfaction_monotone_in_refinement() {
    // If a constraint holds for a value it holds for every refinement of
    // that value (smaller sets, fewer regions).
    let loose = {
        let mut v = RcpValue::with_packet(0);
        v.join(&RcpValue::with_packet(4));
        v
    };
    let tight = RcpValue::with_packet(0);
    let bound = RcpValue::with_packet(4);
    let when = TypeSet::packet();
    assert!(RcpValue::satisfied_cmp(&loose, CondOp::Le, &bound, &when));
    assert!(RcpValue::satisfied_cmp(&tight, CondOp::Le, &bound, &when));
}

#[test]
fn test_transfer_monotone_for_add() {
    // s ⊑ s' implies transfer(s) ⊑ transfer(s') for pointer arithmetic.
    let small = RcpValue::with_packet(0);
    let mut large = RcpValue::with_packet(0);
    large.join(&RcpValue::with_packet(8));
    let delta = RcpValue::with_num(4);

    let small_after = small.add(&delta).unwrap();
    let large_after = large.add(&delta).unwrap();

    let mut joined = small_after.clone();
    joined.join(&large_after);
    assert_eq!(joined, large_after);
}

#[test]
fn test_ctx_load_at_imprecise_offset_havocs() {
    let info = xdp_info();
    let mut m = Machine::entry(&info);
    // r2 may point at two different context offsets.
    let mut imprecise = RcpValue::with_ctx(0);
    imprecise.join(&RcpValue::with_ctx(8));
    m.regs.assign(Reg(2), imprecise);
    m.transfer(
        &Instruction::Mem {
            access: MemAccess {
                basereg: Reg(2),
                offset: 0,
                width: 4,
            },
            value: Value::Reg(Reg(3)),
            is_load: true,
        },
        0,
    )
    .unwrap();
    let r3 = m.regs.at(Reg(3)).unwrap();
    assert_eq!(r3, &RcpValue::top());
}

#[test]
fn test_ctx_load_of_plain_field_is_number() {
    let info = xdp_info();
    let mut m = Machine::entry(&info);
    // Offset 12 maps to none of data/data_end/meta in the XDP layout.
    m.transfer(
        &Instruction::Mem {
            access: MemAccess {
                basereg: Reg(1),
                offset: 12,
                width: 4,
            },
            value: Value::Reg(Reg(3)),
            is_load: true,
        },
        0,
    )
    .unwrap();
    let r3 = m.regs.at(Reg(3)).unwrap();
    assert!(r3.must_be_num());
    assert!(r3.nums().is_top());
}

#[test]
fn test_packet_end_le_refines_by_minimum_offset() {
    let info = xdp_info();
    let mut m = Machine::entry(&info);
    let mut offsets = RcpValue::with_packet(4);
    offsets.join(&RcpValue::with_packet(12));
    m.regs.assign(Reg(3), offsets);
    m.regs.assign(Reg(4), RcpValue::with_packet_end());
    m.transfer(
        &Instruction::Assume {
            cond: bpf_absint::core::types::Condition {
                op: CondOp::Le,
                left: Reg(3),
                right: Value::Reg(Reg(4)),
            },
        },
        0,
    )
    .unwrap();
    // Only the smallest offset is a sound bound for every possible value.
    assert_eq!(m.packet_bound.size, 4);
}
