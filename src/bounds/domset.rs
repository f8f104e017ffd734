// SPDX-License-Identifier: GPL-2.0

//! Finite-set abstraction of 64-bit values.
//!
//! A [`NumSet`] is either bottom (no value possible), top (any value), or a
//! small sorted set of concrete values. The same lattice abstracts plain
//! numbers and per-region byte offsets. Sets that grow past
//! [`CARDINALITY_CAP`] widen to top, which keeps the lattice finite-height.

use alloc::vec::Vec;
use core::fmt;

use crate::bounds::safeint;
use crate::core::error::Result;
use crate::core::types::CondOp;

/// Maximum number of elements tracked before widening to top.
pub const CARDINALITY_CAP: usize = 8;

/// An abstract set of signed 64-bit values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NumSet {
    /// No value is possible.
    Bot,
    /// Any value is possible.
    Top,
    /// Exactly these values are possible. Sorted, deduplicated, non-empty,
    /// at most [`CARDINALITY_CAP`] elements.
    Fin(Vec<i64>),
}

impl NumSet {
    /// The set containing a single value.
    pub fn single(v: i64) -> NumSet {
        NumSet::Fin(alloc::vec![v])
    }

    /// Build a set from arbitrary elements, normalising to the
    /// representation invariants.
    pub fn from_elems(elems: impl IntoIterator<Item = i64>) -> NumSet {
        let mut v: Vec<i64> = elems.into_iter().collect();
        v.sort_unstable();
        v.dedup();
        if v.is_empty() {
            NumSet::Bot
        } else if v.len() > CARDINALITY_CAP {
            NumSet::Top
        } else {
            NumSet::Fin(v)
        }
    }

    /// True for bottom.
    pub fn is_bot(&self) -> bool {
        matches!(self, NumSet::Bot)
    }

    /// True for top.
    pub fn is_top(&self) -> bool {
        matches!(self, NumSet::Top)
    }

    /// True for a singleton set.
    pub fn is_single(&self) -> bool {
        matches!(self, NumSet::Fin(v) if v.len() == 1)
    }

    /// The value of a singleton set.
    pub fn as_single(&self) -> Option<i64> {
        match self {
            NumSet::Fin(v) if v.len() == 1 => Some(v[0]),
            _ => None,
        }
    }

    /// True if `x` may be in the set.
    pub fn contains(&self, x: i64) -> bool {
        match self {
            NumSet::Bot => false,
            NumSet::Top => true,
            NumSet::Fin(v) => v.binary_search(&x).is_ok(),
        }
    }

    /// Smallest element of a finite set.
    pub fn min(&self) -> Option<i64> {
        match self {
            NumSet::Fin(v) => v.first().copied(),
            _ => None,
        }
    }

    /// Largest element of a finite set.
    pub fn max(&self) -> Option<i64> {
        match self {
            NumSet::Fin(v) => v.last().copied(),
            _ => None,
        }
    }

    /// Iterate the elements of a finite set.
    pub fn elems(&self) -> &[i64] {
        match self {
            NumSet::Fin(v) => v,
            _ => &[],
        }
    }

    /// Least upper bound.
    pub fn join(&self, other: &NumSet) -> NumSet {
        match (self, other) {
            (NumSet::Bot, _) => other.clone(),
            (_, NumSet::Bot) => self.clone(),
            (NumSet::Top, _) | (_, NumSet::Top) => NumSet::Top,
            (NumSet::Fin(a), NumSet::Fin(b)) => {
                NumSet::from_elems(a.iter().chain(b.iter()).copied())
            }
        }
    }

    /// Greatest lower bound.
    pub fn meet(&self, other: &NumSet) -> NumSet {
        match (self, other) {
            (NumSet::Bot, _) | (_, NumSet::Bot) => NumSet::Bot,
            (NumSet::Top, _) => other.clone(),
            (_, NumSet::Top) => self.clone(),
            (NumSet::Fin(a), NumSet::Fin(b)) => {
                NumSet::from_elems(a.iter().copied().filter(|x| b.binary_search(x).is_ok()))
            }
        }
    }

    fn pointwise(
        &self,
        other: &NumSet,
        f: impl Fn(i64, i64) -> Result<i64>,
    ) -> Result<NumSet> {
        match (self, other) {
            (NumSet::Bot, _) | (_, NumSet::Bot) => Ok(NumSet::Bot),
            (NumSet::Top, _) | (_, NumSet::Top) => Ok(NumSet::Top),
            (NumSet::Fin(a), NumSet::Fin(b)) => {
                let mut out = Vec::with_capacity(a.len() * b.len());
                for &x in a {
                    for &y in b {
                        out.push(f(x, y)?);
                    }
                }
                Ok(NumSet::from_elems(out))
            }
        }
    }

    /// Pointwise checked addition.
    pub fn add(&self, other: &NumSet) -> Result<NumSet> {
        self.pointwise(other, safeint::add)
    }

    /// Pointwise checked subtraction.
    pub fn sub(&self, other: &NumSet) -> Result<NumSet> {
        self.pointwise(other, safeint::sub)
    }

    /// Pointwise checked negation.
    pub fn neg(&self) -> Result<NumSet> {
        match self {
            NumSet::Fin(v) => {
                let mut out = Vec::with_capacity(v.len());
                for &x in v {
                    out.push(safeint::neg(x)?);
                }
                Ok(NumSet::from_elems(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Program-level ALU semantics for the remaining binary operations.
    ///
    /// Unlike offset arithmetic, the analysed program may legitimately wrap
    /// or shift; imprecision widens to top instead of erroring.
    pub fn exec(&self, op: crate::core::insn::BinOp, other: &NumSet) -> NumSet {
        use crate::core::insn::BinOp;
        match (self, other) {
            (NumSet::Bot, _) | (_, NumSet::Bot) => NumSet::Bot,
            (NumSet::Top, _) | (_, NumSet::Top) => NumSet::Top,
            (NumSet::Fin(a), NumSet::Fin(b)) => {
                let mut out = Vec::with_capacity(a.len() * b.len());
                for &x in a {
                    for &y in b {
                        let (xu, yu) = (x as u64, y as u64);
                        let r = match op {
                            BinOp::Mov | BinOp::Add | BinOp::Sub => return NumSet::Top,
                            BinOp::Mul => xu.wrapping_mul(yu),
                            BinOp::Div => {
                                if yu == 0 {
                                    return NumSet::Top;
                                }
                                xu / yu
                            }
                            BinOp::Mod => {
                                if yu == 0 {
                                    return NumSet::Top;
                                }
                                xu % yu
                            }
                            BinOp::Or => xu | yu,
                            BinOp::And => xu & yu,
                            BinOp::Xor => xu ^ yu,
                            BinOp::Lsh => xu.wrapping_shl((yu & 63) as u32),
                            BinOp::Rsh => xu.wrapping_shr((yu & 63) as u32),
                            BinOp::Arsh => (x >> (yu & 63)) as u64,
                        };
                        out.push(r as i64);
                    }
                }
                NumSet::from_elems(out)
            }
        }
    }

    /// Refine to the elements that may satisfy `self op right`.
    ///
    /// Returns the refined set; a bottom or top `right` carries no
    /// information and leaves the set unchanged, as does a top `self`
    /// (top cannot be enumerated).
    pub fn assumed(&self, op: CondOp, right: &NumSet) -> NumSet {
        if right.is_bot() {
            return self.clone();
        }
        if op == CondOp::Eq {
            // Equality refines even a top left-hand side.
            return self.meet(right);
        }
        let elems = match self {
            NumSet::Fin(v) => v,
            _ => return self.clone(),
        };
        match (op, right) {
            (CondOp::Ne, NumSet::Fin(r)) if r.len() == 1 => {
                NumSet::from_elems(elems.iter().copied().filter(|x| *x != r[0]))
            }
            (CondOp::Ne, _) | (CondOp::Set, _) => self.clone(),
            (_, NumSet::Top) => self.clone(),
            (_, NumSet::Fin(r)) => {
                // An element survives if some element of `right` witnesses
                // the comparison. Elements are signed offsets; the
                // unsigned/signed distinction of the jump encoding is not
                // modelled at this precision.
                let keep = |x: &i64| {
                    r.iter().any(|y| match op {
                        CondOp::Lt | CondOp::Slt => x < y,
                        CondOp::Le | CondOp::Sle => x <= y,
                        CondOp::Gt | CondOp::Sgt => x > y,
                        CondOp::Ge | CondOp::Sge => x >= y,
                        CondOp::Eq | CondOp::Ne | CondOp::Set => unreachable!(),
                    })
                };
                NumSet::from_elems(elems.iter().copied().filter(keep))
            }
            (_, NumSet::Bot) => self.clone(),
        }
    }

    /// True iff `self op right` is already implied: refining by the
    /// comparison would not change the set.
    pub fn satisfies(&self, op: CondOp, right: &NumSet) -> bool {
        self.assumed(op, right) == *self
    }
}

impl fmt::Display for NumSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NumSet::Bot => f.write_str("bot"),
            NumSet::Top => f.write_str("top"),
            NumSet::Fin(v) => {
                f.write_str("{")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", x)?;
                }
                f.write_str("}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::insn::BinOp;

    #[test]
    fn test_normalisation() {
        assert_eq!(NumSet::from_elems([3, 1, 3, 2]), NumSet::Fin(alloc::vec![1, 2, 3]));
        assert_eq!(NumSet::from_elems([]), NumSet::Bot);
    }

    #[test]
    fn test_cap_widens_to_top() {
        let s = NumSet::from_elems(0..(CARDINALITY_CAP as i64 + 1));
        assert!(s.is_top());
        let s = NumSet::from_elems(0..(CARDINALITY_CAP as i64));
        assert!(!s.is_top());
    }

    #[test]
    fn test_join_meet() {
        let a = NumSet::from_elems([1, 2]);
        let b = NumSet::from_elems([2, 3]);
        assert_eq!(a.join(&b), NumSet::from_elems([1, 2, 3]));
        assert_eq!(a.meet(&b), NumSet::single(2));
        assert_eq!(a.join(&NumSet::Bot), a);
        assert_eq!(a.meet(&NumSet::Top), a);
    }

    #[test]
    fn test_add_shifts_elements() {
        let a = NumSet::from_elems([0, 8]);
        let b = NumSet::single(4);
        assert_eq!(a.add(&b).unwrap(), NumSet::from_elems([4, 12]));
    }

    #[test]
    fn test_add_overflow_errors() {
        let a = NumSet::single(i64::MAX);
        assert!(a.add(&NumSet::single(1)).is_err());
    }

    #[test]
    fn test_exec_concrete() {
        let a = NumSet::single(0xF0);
        let b = NumSet::single(0x0F);
        assert_eq!(a.exec(BinOp::Or, &b), NumSet::single(0xFF));
        assert_eq!(a.exec(BinOp::And, &b), NumSet::single(0));
    }

    #[test]
    fn test_exec_div_by_zero_is_top() {
        let a = NumSet::single(10);
        assert!(a.exec(BinOp::Div, &NumSet::single(0)).is_top());
    }

    #[test]
    fn test_assume_ordered() {
        let a = NumSet::from_elems([1, 5, 9]);
        assert_eq!(a.assumed(CondOp::Lt, &NumSet::single(5)), NumSet::from_elems([1]));
        assert_eq!(a.assumed(CondOp::Ge, &NumSet::single(5)), NumSet::from_elems([5, 9]));
    }

    #[test]
    fn test_assume_eq_refines_top() {
        assert_eq!(NumSet::Top.assumed(CondOp::Eq, &NumSet::single(7)), NumSet::single(7));
    }

    #[test]
    fn test_assume_ne_removes_singleton() {
        let a = NumSet::from_elems([0, 4]);
        assert_eq!(a.assumed(CondOp::Ne, &NumSet::single(0)), NumSet::single(4));
        assert_eq!(NumSet::single(0).assumed(CondOp::Ne, &NumSet::single(0)), NumSet::Bot);
    }

    #[test]
    fn test_satisfies() {
        let a = NumSet::from_elems([504]);
        assert!(a.satisfies(CondOp::Le, &NumSet::single(504)));
        assert!(!a.satisfies(CondOp::Lt, &NumSet::single(504)));
        assert!(NumSet::Bot.satisfies(CondOp::Lt, &NumSet::single(0)));
    }

    #[test]
    fn test_negative_offsets_compare_signed() {
        let a = NumSet::single(-1);
        assert!(!a.satisfies(CondOp::Gt, &NumSet::single(1)));
        assert!(a.satisfies(CondOp::Lt, &NumSet::single(0)));
    }
}
