// SPDX-License-Identifier: GPL-2.0

//! The abstract machine: register file, stack memory, packet bound.
//!
//! One machine models the set of concrete states reaching a program point.
//! The transfer function interprets each instruction over the machine;
//! assertions are both checked against it (entailment, see
//! [`Machine::satisfied`]) and folded into it as assumptions (refinement).
//!
//! Reading an uninitialised register in ordinary data flow is a contract
//! violation and aborts the analysis; inside assumptions and entailment
//! checks it degrades gracefully (no refinement, not satisfied), since the
//! extractor emits exactly such assertions for ill-initialised programs.

use core::fmt;

use crate::analysis::cfg::Label;
use crate::bounds::domset::NumSet;
use crate::bounds::minsize::MinSize;
use crate::core::error::{Result, VerifierError};
use crate::core::insn::{
    ArgPairKind, Assertion, BinOp, InPacket, Instruction, LinearConstraint, TypeConstraint,
};
use crate::core::program::ProgramInfo;
use crate::core::types::{CondOp, Condition, Reg, TypeSet, Value};
use crate::mem::stack_mem::StackMem;
use crate::state::rcp::RcpValue;
use crate::state::regs::RegFile;

/// Abstract machine state at one program point.
#[derive(Debug, Clone)]
pub struct Machine<'a> {
    /// Register file.
    pub regs: RegFile,
    /// Stack memory.
    pub stack: StackMem,
    /// Proven packet size bound.
    pub packet_bound: MinSize,
    info: &'a ProgramInfo,
}

impl PartialEq for Machine<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.regs == other.regs
            && self.stack == other.stack
            && self.packet_bound == other.packet_bound
    }
}

impl<'a> Machine<'a> {
    /// The not-yet-reached state: bottom registers, unreachable stack,
    /// optimistic packet bound. Joining any real state into it yields
    /// that state.
    pub fn bottom(info: &'a ProgramInfo) -> Self {
        Machine {
            regs: RegFile::default(),
            stack: StackMem::default(),
            packet_bound: MinSize::default(),
            info,
        }
    }

    /// The program entry state.
    pub fn entry(info: &'a ProgramInfo) -> Self {
        Machine {
            regs: RegFile::entry(),
            stack: StackMem::init(),
            packet_bound: MinSize::unproven(),
            info,
        }
    }

    /// True when this state is unreachable.
    pub fn is_bot(&self) -> bool {
        self.regs.is_bot() || self.stack.is_bot()
    }

    /// Pointwise join.
    pub fn join(&mut self, other: &Machine<'a>) {
        self.regs.join(&other.regs);
        self.stack.join(&other.stack);
        self.packet_bound.join(&other.packet_bound);
    }

    /// Pointwise meet.
    pub fn meet(&mut self, other: &Machine<'a>) {
        self.regs.meet(&other.regs);
        self.stack.meet(&other.stack);
        self.packet_bound.meet(&other.packet_bound);
    }

    fn all_types(&self) -> TypeSet {
        TypeSet::all(self.info.nmaps())
    }

    /// Evaluate an operand; uninitialised registers are an error.
    pub fn eval(&self, v: Value) -> Result<RcpValue> {
        match v {
            Value::Imm(imm) => Ok(RcpValue::with_num(imm.0 as i64)),
            Value::Reg(r) => Ok(self.regs.at(r)?.clone()),
        }
    }

    /// Evaluate an operand; uninitialised registers yield `None`.
    fn try_eval(&self, v: Value) -> Result<Option<RcpValue>> {
        match v {
            Value::Imm(imm) => Ok(Some(RcpValue::with_num(imm.0 as i64))),
            Value::Reg(r) => Ok(self.regs.try_at(r)?.cloned()),
        }
    }

    /// Interpret one instruction over this state.
    pub fn transfer(&mut self, ins: &Instruction, label: Label) -> Result<()> {
        match ins {
            Instruction::Undefined => Err(VerifierError::UndefinedInstruction(label)),
            Instruction::LoadMapFd { dst, mapfd } => {
                if *mapfd >= self.info.nmaps() || *mapfd >= crate::core::types::MAX_MAPS {
                    return Err(VerifierError::InvalidMapIndex(*mapfd));
                }
                self.regs.assign(*dst, RcpValue::with_fd(*mapfd));
                Ok(())
            }
            Instruction::Un { .. } => Ok(()),
            Instruction::Bin { op, dst, v } => self.transfer_bin(*op, *dst, *v),
            Instruction::Jmp { .. } | Instruction::Exit | Instruction::LockAdd { .. } => Ok(()),
            Instruction::Assume { cond } => self.assume_condition(cond),
            Instruction::Assert(a) => self.assume_assertion(&a.body),
            Instruction::Call {
                singles: _,
                pairs,
                returns_map,
            } => {
                for pair in pairs {
                    let mut written = RcpValue::num_top();
                    if pair.kind == ArgPairKind::PtrToMemOrNull {
                        let mem = self.regs.at(pair.mem)?;
                        if mem.must_be_num() {
                            continue;
                        }
                        if !mem.nums().is_bot() {
                            // The helper may or may not have written.
                            written.havoc();
                        }
                    }
                    let addr = self.regs.at(pair.mem)?.clone();
                    let widths = self.regs.at(pair.size)?.nums();
                    self.store(&addr, &widths, &written);
                }
                let r0 = if *returns_map {
                    self.regs.at(Reg(1))?.map_lookup(self.info.nmaps())
                } else {
                    RcpValue::num_top()
                };
                self.regs.assign(Reg(0), r0);
                self.regs.scratch_caller_saved();
                Ok(())
            }
            Instruction::Packet { .. } => {
                self.regs.assign(Reg(0), RcpValue::num_top());
                self.regs.scratch_caller_saved();
                Ok(())
            }
            Instruction::Mem {
                access,
                value,
                is_load,
            } => {
                let addr = self
                    .regs
                    .at(access.basereg)?
                    .add(&RcpValue::with_num(access.offset))?;
                if *is_load {
                    let dst = match value {
                        Value::Reg(r) => *r,
                        Value::Imm(_) => return Err(VerifierError::UndefinedInstruction(label)),
                    };
                    let loaded = self.load(&addr, access.width as i64);
                    self.regs.assign(dst, loaded);
                } else {
                    let stored = self.eval(*value)?;
                    self.store(&addr, &NumSet::single(access.width as i64), &stored);
                }
                Ok(())
            }
        }
    }

    fn transfer_bin(&mut self, op: BinOp, dst: Reg, v: Value) -> Result<()> {
        match op {
            BinOp::Mov => {
                let val = self.eval(v)?;
                self.regs.assign(dst, val);
            }
            BinOp::Add => {
                let rhs = self.eval(v)?;
                let sum = self.regs.at(dst)?.add(&rhs)?;
                self.regs.assign(dst, sum);
            }
            BinOp::Sub => {
                let rhs = self.eval(v)?;
                let diff = self.regs.at(dst)?.sub(&rhs)?;
                self.regs.assign(dst, diff);
            }
            _ => {
                let rhs = self.eval(v)?;
                let result = self.regs.at(dst)?.exec(op, &rhs);
                self.regs.assign(dst, result);
            }
        }
        Ok(())
    }

    /// Refine the state under a branch condition.
    fn assume_condition(&mut self, cond: &Condition) -> Result<()> {
        let Some(right) = self.try_eval(cond.right)? else {
            return Ok(());
        };
        if right.is_packet_end_marker() {
            // `ptr <= data_end` proves the packet extends past ptr's
            // offsets.
            if cond.op == CondOp::Le {
                if let Some(left) = self.regs.try_at(cond.left)? {
                    let offs = left.packet_offsets();
                    self.packet_bound.assume_larger_than(&offs);
                }
            }
            return Ok(());
        }
        let Some(left) = self.regs.try_at(cond.left)?.cloned() else {
            return Ok(());
        };
        if left.is_packet_length() && right.must_be_num() {
            // `(data_end - p) >= k` proves the packet extends at least k
            // bytes past p's offsets.
            let extra = match cond.op {
                CondOp::Ge | CondOp::Sge => NumSet::single(0),
                CondOp::Gt | CondOp::Sgt => NumSet::single(1),
                _ => return Ok(()),
            };
            let lens = right.nums().add(&left.packet_offsets())?.add(&extra)?;
            self.packet_bound.assume_larger_than(&lens);
            return Ok(());
        }
        let when = self.all_types();
        if let Some(left) = self.regs.try_at_mut(cond.left)? {
            RcpValue::assume_cmp(left, cond.op, &right, &when);
        }
        Ok(())
    }

    /// The right-hand value of a linear constraint: the register realigned
    /// to its region bases, shifted by `v - width - offset`.
    fn linear_rhs(&self, lc: &LinearConstraint, left: &RcpValue) -> Result<Option<RcpValue>> {
        let Some(v) = self.try_eval(lc.v)? else {
            return Ok(None);
        };
        let Some(width) = self.try_eval(lc.width)? else {
            return Ok(None);
        };
        let shift = v.sub(&width)?.sub(&RcpValue::with_num(lc.offset))?;
        Ok(Some(left.zero().add(&shift)?))
    }

    /// Fold an assertion into the state as an assumption.
    pub fn assume_assertion(&mut self, body: &Assertion) -> Result<()> {
        match body {
            Assertion::Linear(lc) => {
                let Some(left) = self.regs.try_at(lc.reg)?.cloned() else {
                    return Ok(());
                };
                let Some(right) = self.linear_rhs(lc, &left)? else {
                    return Ok(());
                };
                if let Some(left) = self.regs.try_at_mut(lc.reg)? {
                    RcpValue::assume_cmp(left, lc.op, &right, &lc.when_types);
                }
                Ok(())
            }
            Assertion::Type(tc) => {
                let all = self.all_types();
                match &tc.given {
                    Some(given) => {
                        let Some(right) = self.regs.try_at(given.reg)?.cloned() else {
                            return Ok(());
                        };
                        if let Some(left) = self.regs.try_at_mut(tc.then.reg)? {
                            RcpValue::assume_given(left, &tc.then.types, &right, &given.types, &all);
                        }
                    }
                    None => {
                        if let Some(left) = self.regs.try_at_mut(tc.then.reg)? {
                            left.assume_types(&tc.then.types);
                        }
                    }
                }
                Ok(())
            }
            Assertion::InPacket(ip) => {
                let Some(ub) = self.in_packet_bound(ip)? else {
                    return Ok(());
                };
                self.packet_bound.assume_larger_than(&ub);
                Ok(())
            }
        }
    }

    fn in_packet_bound(&self, ip: &InPacket) -> Result<Option<NumSet>> {
        let Some(reg) = self.regs.try_at(ip.reg)?.cloned() else {
            return Ok(None);
        };
        let Some(width) = self.try_eval(ip.width)? else {
            return Ok(None);
        };
        let end = reg.add(&RcpValue::with_num(ip.offset))?.add(&width)?;
        Ok(Some(end.packet_offsets()))
    }

    /// True iff the invariant in this state implies the assertion.
    pub fn satisfied(&self, body: &Assertion) -> Result<bool> {
        match body {
            Assertion::Linear(lc) => {
                let Some(left) = self.regs.try_at(lc.reg)?.cloned() else {
                    return Ok(false);
                };
                let Some(right) = self.linear_rhs(lc, &left)? else {
                    return Ok(false);
                };
                Ok(RcpValue::satisfied_cmp(
                    &left,
                    lc.op,
                    &right,
                    &lc.when_types,
                ))
            }
            Assertion::Type(tc) => self.satisfied_type(tc),
            Assertion::InPacket(ip) => {
                let Some(ub) = self.in_packet_bound(ip)? else {
                    return Ok(false);
                };
                Ok(self.packet_bound.in_bounds(&ub))
            }
        }
    }

    fn satisfied_type(&self, tc: &TypeConstraint) -> Result<bool> {
        let Some(left) = self.regs.try_at(tc.then.reg)? else {
            return Ok(false);
        };
        match &tc.given {
            Some(given) => {
                let Some(right) = self.regs.try_at(given.reg)? else {
                    return Ok(false);
                };
                Ok(RcpValue::satisfied_given(
                    left,
                    &tc.then.types,
                    right,
                    &given.types,
                ))
            }
            None => Ok(left.satisfied_types(&tc.then.types)),
        }
    }

    /// Store through an abstract address. Only the stack is mutable
    /// analyser-side state; stores into other regions leave the machine
    /// unchanged (their safety is checked by assertions).
    pub fn store(&mut self, addr: &RcpValue, widths: &NumSet, value: &RcpValue) {
        let as_stack = addr.stack_offsets();
        if as_stack.is_bot() {
            return;
        }
        // If the address may also be something other than a stack
        // pointer, the write lands who-knows-where on the stack.
        let purely_stack = {
            let mut without = addr.clone();
            without.stack = NumSet::Bot;
            without.is_bot()
        };
        let offsets = if purely_stack { as_stack } else { NumSet::Top };
        match widths.as_single() {
            Some(w) => self.stack.store(&offsets, w, value),
            None => self.stack.store_dynamic(&offsets, widths, value),
        }
    }

    fn load_stack(&self, offsets: &NumSet, width: i64) -> RcpValue {
        if offsets.is_bot() {
            return RcpValue::bot();
        }
        self.stack.load(offsets, width)
    }

    fn load_ctx(&self, offsets: &NumSet) -> RcpValue {
        if offsets.is_bot() {
            return RcpValue::bot();
        }
        match offsets.as_single() {
            Some(off) => {
                let d = &self.info.descriptor;
                if d.data >= 0 && off == d.data {
                    RcpValue::with_packet(0)
                } else if d.end >= 0 && off == d.end {
                    RcpValue::with_packet_end()
                } else if d.meta >= 0 && off == d.meta {
                    RcpValue::with_packet(0)
                } else {
                    RcpValue::num_top()
                }
            }
            // A load from an imprecise context offset could alias the
            // packet pointer fields; give up on the result entirely.
            None => RcpValue::top(),
        }
    }

    fn load_other(&self, addr: &RcpValue) -> RcpValue {
        if addr.maybe_packet() || addr.maybe_map() {
            RcpValue::num_top()
        } else {
            RcpValue::bot()
        }
    }

    /// Load through an abstract address: the join over every region the
    /// address may point into.
    pub fn load(&self, addr: &RcpValue, width: i64) -> RcpValue {
        let mut out = self.load_stack(&addr.stack_offsets(), width);
        out.join(&self.load_ctx(&addr.ctx_offsets()));
        out.join(&self.load_other(addr));
        out
    }
}

impl fmt::Display for Machine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} minsize:{}",
            self.regs, self.stack, self.packet_bound
        )
    }
}
