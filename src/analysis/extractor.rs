// SPDX-License-Identifier: GPL-2.0

//! Syntax-directed assertion extraction.
//!
//! Each instruction is rewritten into the typed preconditions it relies on,
//! inserted immediately before it: exits return numbers, helper arguments
//! have the right types and widths, memory accesses stay inside their
//! regions, arithmetic preserves the type discipline. The fixpoint then
//! only ever has to discharge explicit assertions.
//!
//! In privileged mode the pointer-leak obligations (numbers-only stores to
//! shared memory, number-only comparisons) are suppressed.

use alloc::vec::Vec;

use crate::analysis::cfg::Cfg;
use crate::core::insn::{
    ArgPairKind, ArgSingleKind, Assert, Assertion, BinOp, InPacket, Instruction, LinearConstraint,
    TypeConstraint, TypedReg,
};
use crate::core::program::{ProgramInfo, STACK_SIZE};
use crate::core::types::{CondOp, Condition, Imm, Reg, TypeSet, Value};

/// Extracts the precondition list of each instruction.
pub struct AssertionExtractor<'a> {
    info: &'a ProgramInfo,
    privileged: bool,
}

impl<'a> AssertionExtractor<'a> {
    /// An unprivileged extractor (full pointer-leak discipline).
    pub fn new(info: &'a ProgramInfo) -> Self {
        AssertionExtractor {
            info,
            privileged: false,
        }
    }

    /// Toggle privileged mode.
    pub fn privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    fn nmaps(&self) -> usize {
        self.info.nmaps()
    }

    /// Every single-region set, map regions first.
    fn single_types(&self) -> Vec<TypeSet> {
        let mut out: Vec<TypeSet> = (0..self.nmaps()).map(TypeSet::map).collect();
        out.push(TypeSet::ctx());
        out.push(TypeSet::stack());
        out.push(TypeSet::packet());
        out.push(TypeSet::num());
        out.push(TypeSet::fd());
        out
    }

    fn type_of(reg: Reg, types: TypeSet) -> Assertion {
        Assertion::Type(TypeConstraint {
            then: TypedReg { reg, types },
            given: None,
        })
    }

    /// Bounds obligations for an access of `width` bytes at `reg+offset`,
    /// once per region the pointer may be in: non-negative offset, and an
    /// upper bound given by the region's extent (discharged against the
    /// packet bound for packet pointers).
    fn check_access(&self, out: &mut Vec<Assertion>, t: TypeSet, reg: Reg, offset: i64, width: Value) {
        out.push(Assertion::Linear(LinearConstraint {
            op: CondOp::Ge,
            reg,
            offset,
            v: Value::Imm(Imm(0)),
            width: Value::Imm(Imm(0)),
            when_types: t,
        }));
        for single in self.single_types() {
            if t.intersect(single).is_empty() {
                continue;
            }
            if single == TypeSet::num() || single == TypeSet::fd() {
                continue;
            }
            if single == TypeSet::packet() {
                out.push(Assertion::InPacket(InPacket { reg, offset, width }));
                continue;
            }
            let end = if let Some(i) = single.map_indices().next() {
                Imm(self.info.map_defs[i].value_size as u64)
            } else if single == TypeSet::stack() {
                Imm(STACK_SIZE as u64)
            } else {
                Imm(self.info.descriptor.size as u64)
            };
            out.push(Assertion::Linear(LinearConstraint {
                op: CondOp::Le,
                reg,
                offset,
                v: Value::Imm(end),
                width,
                when_types: single,
            }));
        }
    }

    /// For every region in `ts`, require that `r1` is in it whenever `r2`
    /// may be.
    fn same_type(&self, out: &mut Vec<Assertion>, ts: TypeSet, r1: Reg, r2: Reg) {
        for single in self.single_types() {
            if !ts.intersect(single).is_empty() {
                out.push(Assertion::Type(TypeConstraint {
                    then: TypedReg {
                        reg: r1,
                        types: single,
                    },
                    given: Some(TypedReg {
                        reg: r2,
                        types: single,
                    }),
                }));
            }
        }
    }

    fn explicate_cond(&self, cond: &Condition) -> Vec<Assertion> {
        if self.privileged {
            return Vec::new();
        }
        let mut out = Vec::new();
        match cond.right {
            Value::Imm(imm) => {
                if imm.0 != 0 {
                    out.push(Self::type_of(cond.left, TypeSet::num()));
                }
                // Anything may be compared against zero; a file
                // descriptor is just another opaque pointer there.
            }
            Value::Reg(right) => {
                if cond.op != CondOp::Eq && cond.op != CondOp::Ne {
                    out.push(Self::type_of(cond.left, TypeSet::nonfd(self.nmaps())));
                }
                self.same_type(&mut out, TypeSet::all(self.nmaps()), cond.left, right);
            }
        }
        out
    }

    /// The preconditions of one instruction.
    pub fn extract(&self, ins: &Instruction) -> Vec<Assertion> {
        let nmaps = self.nmaps();
        match ins {
            Instruction::Exit => alloc::vec![Self::type_of(Reg(0), TypeSet::num())],
            Instruction::Jmp { cond: Some(cond) } | Instruction::Assume { cond } => {
                self.explicate_cond(cond)
            }
            Instruction::Call { singles, pairs, .. } => {
                let mut out = Vec::new();
                for arg in singles {
                    match arg.kind {
                        ArgSingleKind::Anything => {
                            if !self.privileged {
                                out.push(Self::type_of(arg.reg, TypeSet::num()));
                            }
                        }
                        ArgSingleKind::MapFd => {
                            out.push(Self::type_of(arg.reg, TypeSet::fd()));
                        }
                        ArgSingleKind::PtrToMapKey | ArgSingleKind::PtrToMapValue => {
                            out.push(Self::type_of(
                                arg.reg,
                                TypeSet::stack() | TypeSet::packet(),
                            ));
                        }
                        ArgSingleKind::PtrToCtx => {
                            out.push(Self::type_of(arg.reg, TypeSet::ctx()));
                        }
                    }
                }
                for arg in pairs {
                    match arg.kind {
                        ArgPairKind::PtrToMemOrNull => {
                            out.push(Self::type_of(
                                arg.mem,
                                TypeSet::mem(nmaps) | TypeSet::num(),
                            ));
                            // If it is a number, it must be null.
                            out.push(Assertion::Linear(LinearConstraint {
                                op: CondOp::Eq,
                                reg: arg.mem,
                                offset: 0,
                                v: Value::Imm(Imm(0)),
                                width: Value::Imm(Imm(0)),
                                when_types: TypeSet::num(),
                            }));
                        }
                        ArgPairKind::PtrToMem | ArgPairKind::PtrToUninitMem => {
                            out.push(Self::type_of(arg.mem, TypeSet::mem(nmaps)));
                        }
                    }
                    let op = if arg.can_be_zero {
                        CondOp::Ge
                    } else {
                        CondOp::Gt
                    };
                    out.push(Self::type_of(arg.size, TypeSet::num()));
                    out.push(Assertion::Linear(LinearConstraint {
                        op,
                        reg: arg.size,
                        offset: 0,
                        v: Value::Imm(Imm(0)),
                        width: Value::Imm(Imm(0)),
                        when_types: TypeSet::num(),
                    }));
                    self.check_access(
                        &mut out,
                        TypeSet::mem(nmaps),
                        arg.mem,
                        0,
                        Value::Reg(arg.size),
                    );
                }
                out
            }
            Instruction::Mem {
                access,
                value,
                is_load,
            } => {
                let mut out = Vec::new();
                let width = Value::Imm(Imm(access.width as u64));
                if access.basereg == Reg(10) {
                    self.check_access(&mut out, TypeSet::stack(), access.basereg, access.offset, width);
                } else {
                    out.push(Self::type_of(access.basereg, TypeSet::ptr(nmaps)));
                    self.check_access(&mut out, TypeSet::ptr(nmaps), access.basereg, access.offset, width);
                    if !self.privileged && !*is_load {
                        if let Value::Reg(stored) = value {
                            // Stored pointers must not leak into memory an
                            // unprivileged reader can see.
                            for shared in [
                                TypeSet::all_maps(nmaps),
                                TypeSet::ctx(),
                                TypeSet::packet(),
                            ] {
                                out.push(Assertion::Type(TypeConstraint {
                                    then: TypedReg {
                                        reg: *stored,
                                        types: TypeSet::num(),
                                    },
                                    given: Some(TypedReg {
                                        reg: access.basereg,
                                        types: shared,
                                    }),
                                }));
                            }
                        }
                    }
                }
                out
            }
            Instruction::LockAdd { access } => {
                let mut out = Vec::new();
                let maps = TypeSet::all_maps(nmaps);
                out.push(Self::type_of(access.basereg, maps));
                self.check_access(
                    &mut out,
                    maps,
                    access.basereg,
                    access.offset,
                    Value::Imm(Imm(access.width as u64)),
                );
                out
            }
            Instruction::Bin { op, dst, v } => match op {
                BinOp::Mov => Vec::new(),
                BinOp::Add => match v {
                    Value::Reg(src) => alloc::vec![
                        Assertion::Type(TypeConstraint {
                            then: TypedReg {
                                reg: *src,
                                types: TypeSet::num(),
                            },
                            given: Some(TypedReg {
                                reg: *dst,
                                types: TypeSet::ptr(nmaps),
                            }),
                        }),
                        Assertion::Type(TypeConstraint {
                            then: TypedReg {
                                reg: *dst,
                                types: TypeSet::num(),
                            },
                            given: Some(TypedReg {
                                reg: *src,
                                types: TypeSet::ptr(nmaps),
                            }),
                        }),
                    ],
                    Value::Imm(_) => Vec::new(),
                },
                BinOp::Sub => match v {
                    Value::Reg(src) => {
                        let mut out = Vec::new();
                        out.push(Self::type_of(*dst, TypeSet::nonfd(nmaps)));
                        // Region-tagged operands must agree, so the
                        // difference is a number of one region.
                        self.same_type(&mut out, TypeSet::ptr(nmaps), *src, *dst);
                        out.push(Self::type_of(*src, TypeSet::nonfd(nmaps)));
                        out
                    }
                    Value::Imm(_) => Vec::new(),
                },
                _ => alloc::vec![Self::type_of(*dst, TypeSet::num())],
            },
            _ => Vec::new(),
        }
    }

    /// Rewrite every block of `cfg`, inserting each instruction's
    /// preconditions in front of it. Blocks that already contain
    /// assertions are left untouched, which makes the pass idempotent.
    pub fn explicate(&self, cfg: &mut Cfg) {
        let labels: Vec<_> = cfg.keys().collect();
        for label in labels {
            let Ok(block) = cfg.block_mut(label) else {
                continue;
            };
            if block.insts.iter().any(Instruction::is_assert) {
                continue;
            }
            let mut rewritten = Vec::with_capacity(block.insts.len());
            for ins in block.insts.drain(..) {
                for a in self.extract(&ins) {
                    rewritten.push(Instruction::Assert(Assert::new(a)));
                }
                rewritten.push(ins);
            }
            block.insts = rewritten;
        }
    }
}

/// Rewrite the CFG in place, inserting the typed preconditions of every
/// instruction (unprivileged discipline).
pub fn explicate_assertions(cfg: &mut Cfg, info: &ProgramInfo) {
    AssertionExtractor::new(info).explicate(cfg);
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn no_map_info() -> ProgramInfo {
        ProgramInfo::default()
    }

    #[test]
    fn test_exit_requires_num_result() {
        let info = no_map_info();
        let ex = AssertionExtractor::new(&info);
        let asserts = ex.extract(&Instruction::Exit);
        assert_eq!(asserts, vec![AssertionExtractor::type_of(Reg(0), TypeSet::num())]);
    }

    #[test]
    fn test_mov_has_no_preconditions() {
        let info = no_map_info();
        let ex = AssertionExtractor::new(&info);
        assert!(ex
            .extract(&Instruction::Bin {
                op: BinOp::Mov,
                dst: Reg(0),
                v: Value::Imm(Imm(0)),
            })
            .is_empty());
    }

    #[test]
    fn test_compare_with_nonzero_imm_requires_num() {
        let info = no_map_info();
        let ex = AssertionExtractor::new(&info);
        let nonzero = ex.extract(&Instruction::Assume {
            cond: Condition {
                op: CondOp::Ge,
                left: Reg(5),
                right: Value::Imm(Imm(4)),
            },
        });
        assert_eq!(nonzero, vec![AssertionExtractor::type_of(Reg(5), TypeSet::num())]);

        let zero = ex.extract(&Instruction::Assume {
            cond: Condition {
                op: CondOp::Ne,
                left: Reg(0),
                right: Value::Imm(Imm(0)),
            },
        });
        assert!(zero.is_empty());
    }

    #[test]
    fn test_register_compare_requires_shared_region() {
        let info = no_map_info();
        let ex = AssertionExtractor::new(&info);
        let asserts = ex.extract(&Instruction::Assume {
            cond: Condition {
                op: CondOp::Le,
                left: Reg(3),
                right: Value::Reg(Reg(4)),
            },
        });
        // An ordered comparison forbids file descriptors on the left and
        // demands region agreement per single region (5 fixed regions
        // with no maps defined).
        assert_eq!(asserts.len(), 1 + 5);
        assert_eq!(
            asserts[0],
            AssertionExtractor::type_of(Reg(3), TypeSet::nonfd(0))
        );
    }

    #[test]
    fn test_privileged_suppresses_cond_obligations() {
        let info = no_map_info();
        let ex = AssertionExtractor::new(&info).privileged(true);
        let asserts = ex.extract(&Instruction::Assume {
            cond: Condition {
                op: CondOp::Le,
                left: Reg(3),
                right: Value::Reg(Reg(4)),
            },
        });
        assert!(asserts.is_empty());
    }

    #[test]
    fn test_stack_access_checks_stack_only() {
        let info = no_map_info();
        let ex = AssertionExtractor::new(&info);
        let asserts = ex.extract(&Instruction::Mem {
            access: crate::core::insn::MemAccess {
                basereg: Reg(10),
                offset: -8,
                width: 8,
            },
            value: Value::Reg(Reg(1)),
            is_load: false,
        });
        // Lower bound plus the stack upper bound; no pointer obligation
        // and no leak checks for the stack.
        assert_eq!(asserts.len(), 2);
        assert!(matches!(
            &asserts[1],
            Assertion::Linear(LinearConstraint { op: CondOp::Le, when_types, .. })
                if *when_types == TypeSet::stack()
        ));
    }

    #[test]
    fn test_non_stack_store_forbids_pointer_leak() {
        let info = no_map_info();
        let ex = AssertionExtractor::new(&info);
        let asserts = ex.extract(&Instruction::Mem {
            access: crate::core::insn::MemAccess {
                basereg: Reg(2),
                offset: 0,
                width: 4,
            },
            value: Value::Reg(Reg(7)),
            is_load: false,
        });
        let leaks = asserts
            .iter()
            .filter(|a| {
                matches!(a, Assertion::Type(tc)
                    if tc.then.reg == Reg(7) && tc.then.types == TypeSet::num())
            })
            .count();
        assert_eq!(leaks, 3);
    }

    #[test]
    fn test_explicate_is_idempotent() {
        let info = no_map_info();
        let mut cfg = Cfg::new();
        cfg.add_block(
            0,
            vec![
                Instruction::Bin {
                    op: BinOp::Mov,
                    dst: Reg(0),
                    v: Value::Imm(Imm(0)),
                },
                Instruction::Exit,
            ],
        );
        explicate_assertions(&mut cfg, &info);
        let once = cfg.clone();
        explicate_assertions(&mut cfg, &info);
        assert_eq!(cfg, once);
        // mov, assert r0:num, exit
        assert_eq!(once.at(0).unwrap().insts.len(), 3);
    }
}
