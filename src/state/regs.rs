// SPDX-License-Identifier: GPL-2.0

//! Abstract register file.
//!
//! Eleven general-purpose slots (r10 is the stack pointer) plus the two
//! implicit slots carrying the packet-end and packet-meta values. A slot is
//! either uninitialised or holds an [`RcpValue`]; slots that disagree on
//! initialisation across a join become uninitialised.

use core::fmt;

use crate::core::error::{Result, VerifierError};
use crate::core::program::{DATA_END_REG, META_REG, NUM_REG_SLOTS, STACK_SIZE};
use crate::core::types::Reg;
use crate::state::rcp::RcpValue;

/// The register file.
#[derive(Debug, Clone, PartialEq)]
pub struct RegFile {
    slots: [Option<RcpValue>; NUM_REG_SLOTS],
}

impl Default for RegFile {
    fn default() -> Self {
        // Fresh (not-yet-reached) states hold the bottom value in every
        // slot so a join with a real predecessor state is the identity.
        Self {
            slots: core::array::from_fn(|_| Some(RcpValue::bot())),
        }
    }
}

impl RegFile {
    /// The entry-state register file: r1 points at the context, r10 at the
    /// end of the stack, the implicit slots hold unknown numbers, and
    /// everything else is uninitialised.
    pub fn entry() -> Self {
        let mut regs = Self {
            slots: core::array::from_fn(|_| None),
        };
        regs.slots[1] = Some(RcpValue::with_ctx(0));
        regs.slots[10] = Some(RcpValue::with_stack(STACK_SIZE));
        regs.slots[DATA_END_REG.0 as usize] = Some(RcpValue::num_top());
        regs.slots[META_REG.0 as usize] = Some(RcpValue::num_top());
        regs
    }

    fn slot(&self, r: Reg) -> Result<&Option<RcpValue>> {
        self.slots
            .get(r.0 as usize)
            .ok_or(VerifierError::InvalidRegister(r.0))
    }

    /// Read a register; uninitialised reads are a contract violation.
    pub fn at(&self, r: Reg) -> Result<&RcpValue> {
        self.slot(r)?
            .as_ref()
            .ok_or(VerifierError::UninitializedRegister(r.0))
    }

    /// Read a register if it has been written.
    pub fn try_at(&self, r: Reg) -> Result<Option<&RcpValue>> {
        Ok(self.slot(r)?.as_ref())
    }

    /// Mutable read; uninitialised reads are a contract violation.
    pub fn at_mut(&mut self, r: Reg) -> Result<&mut RcpValue> {
        self.slots
            .get_mut(r.0 as usize)
            .ok_or(VerifierError::InvalidRegister(r.0))?
            .as_mut()
            .ok_or(VerifierError::UninitializedRegister(r.0))
    }

    /// Mutable read of an initialised register, skipping uninitialised
    /// slots without error (used by assumption refinement).
    pub fn try_at_mut(&mut self, r: Reg) -> Result<Option<&mut RcpValue>> {
        Ok(self
            .slots
            .get_mut(r.0 as usize)
            .ok_or(VerifierError::InvalidRegister(r.0))?
            .as_mut())
    }

    /// Overwrite a register.
    pub fn assign(&mut self, r: Reg, v: RcpValue) {
        if let Some(slot) = self.slots.get_mut(r.0 as usize) {
            *slot = Some(v);
        }
    }

    /// Forget a register.
    pub fn to_uninit(&mut self, r: Reg) {
        if let Some(slot) = self.slots.get_mut(r.0 as usize) {
            *slot = None;
        }
    }

    /// Clobber the caller-saved argument registers r1..r5.
    pub fn scratch_caller_saved(&mut self) {
        for i in 1..6 {
            self.slots[i] = None;
        }
    }

    /// True when some general-purpose register holds the impossible value.
    pub fn is_bot(&self) -> bool {
        self.slots[..10]
            .iter()
            .any(|s| s.as_ref().is_some_and(|v| v.is_bot()))
    }

    /// Pointwise join; slots initialised on only one side become
    /// uninitialised.
    pub fn join(&mut self, other: &RegFile) {
        for i in 0..NUM_REG_SLOTS {
            match (&mut self.slots[i], &other.slots[i]) {
                (Some(a), Some(b)) => a.join(b),
                (slot, _) => *slot = None,
            }
        }
    }

    /// Pointwise meet; slots initialised on only one side become
    /// uninitialised.
    pub fn meet(&mut self, other: &RegFile) {
        for i in 0..NUM_REG_SLOTS {
            match (&mut self.slots[i], &other.slots[i]) {
                (Some(a), Some(b)) => a.meet(b),
                (slot, _) => *slot = None,
            }
        }
    }
}

impl fmt::Display for RegFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<<")?;
        for i in 0..=10 {
            if i > 0 {
                f.write_str(", ")?;
            }
            match &self.slots[i] {
                Some(v) => write!(f, "r{}: {}", i, v)?,
                None => write!(f, "r{}: *", i)?,
            }
        }
        f.write_str(">>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_layout() {
        let regs = RegFile::entry();
        assert!(regs.at(Reg(0)).is_err());
        assert_eq!(regs.at(Reg(1)).unwrap(), &RcpValue::with_ctx(0));
        assert_eq!(regs.at(Reg(10)).unwrap(), &RcpValue::with_stack(STACK_SIZE));
        assert!(regs.at(DATA_END_REG).unwrap().nums().is_top());
    }

    #[test]
    fn test_join_loses_one_sided_slots() {
        let mut a = RegFile::entry();
        a.assign(Reg(0), RcpValue::with_num(0));
        let b = RegFile::entry();
        a.join(&b);
        assert!(a.at(Reg(0)).is_err());
        assert!(a.at(Reg(1)).is_ok());
    }

    #[test]
    fn test_fresh_state_is_join_identity() {
        let mut fresh = RegFile::default();
        let mut real = RegFile::entry();
        real.assign(Reg(0), RcpValue::with_num(7));
        fresh.join(&real);
        assert_eq!(fresh.at(Reg(0)).unwrap(), &RcpValue::with_num(7));
        // Slots uninitialised in the real state stay uninitialised.
        assert!(fresh.at(Reg(2)).is_err());
    }

    #[test]
    fn test_scratch_clobbers_args() {
        let mut regs = RegFile::entry();
        regs.scratch_caller_saved();
        assert!(regs.at(Reg(1)).is_err());
        assert!(regs.at(Reg(5)).is_err());
        assert!(regs.at(Reg(10)).is_ok());
    }
}
