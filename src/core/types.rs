// SPDX-License-Identifier: GPL-2.0

//! Core value and region types shared across the analyser.
//!
//! A register operand is a plain index; an immediate is a 64-bit constant.
//! `TypeSet` selects a set of memory regions: per-map value regions (one bit
//! per map definition index) plus the fixed kinds (context, stack, packet,
//! number, file descriptor).

use bitflags::bitflags;
use core::fmt;

/// Maximum number of map definitions a program may carry.
///
/// Map value regions and file descriptors are tracked with one bit per map
/// definition index, so the index must fit into a 64-bit mask.
pub const MAX_MAPS: usize = 64;

/// A register operand (index into the register file).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reg(pub u8);

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A 64-bit immediate operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Imm(pub u64);

/// An instruction operand: either an immediate or a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    /// Immediate constant.
    Imm(Imm),
    /// Register.
    Reg(Reg),
}

impl From<Reg> for Value {
    fn from(r: Reg) -> Self {
        Value::Reg(r)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Imm(Imm(v))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Imm(imm) => write!(f, "{}", imm.0),
            Value::Reg(r) => write!(f, "{}", r),
        }
    }
}

/// Comparison operator of a branch condition or linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CondOp {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Bit test (`left & right != 0`).
    Set,
    /// Unsigned less-than.
    Lt,
    /// Unsigned less-or-equal.
    Le,
    /// Unsigned greater-than.
    Gt,
    /// Unsigned greater-or-equal.
    Ge,
    /// Signed less-than.
    Slt,
    /// Signed less-or-equal.
    Sle,
    /// Signed greater-than.
    Sgt,
    /// Signed greater-or-equal.
    Sge,
}

impl CondOp {
    /// True for the ordered comparisons (everything except EQ/NE/SET).
    pub fn is_ordered(self) -> bool {
        !matches!(self, CondOp::Eq | CondOp::Ne | CondOp::Set)
    }
}

impl fmt::Display for CondOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CondOp::Eq => "==",
            CondOp::Ne => "!=",
            CondOp::Set => "&",
            CondOp::Lt => "<",
            CondOp::Le => "<=",
            CondOp::Gt => ">",
            CondOp::Ge => ">=",
            CondOp::Slt => "s<",
            CondOp::Sle => "s<=",
            CondOp::Sgt => "s>",
            CondOp::Sge => "s>=",
        };
        f.write_str(s)
    }
}

/// A branch condition `left op right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Condition {
    /// Comparison operator.
    pub op: CondOp,
    /// Left-hand register.
    pub left: Reg,
    /// Right-hand operand.
    pub right: Value,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.left, self.op, self.right)
    }
}

bitflags! {
    /// The fixed (non-map) region kinds of a `TypeSet`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RegionKind: u8 {
        /// Context structure.
        const CTX = 1 << 0;
        /// Stack scratch area.
        const STACK = 1 << 1;
        /// Packet payload.
        const PACKET = 1 << 2;
        /// Plain number.
        const NUM = 1 << 3;
        /// Map file descriptor.
        const FD = 1 << 4;
    }
}

/// A set of memory regions: a bitmask over map definition indices plus the
/// fixed `RegionKind` bits.
///
/// Constructors that cover "all maps" take the number of map definitions of
/// the program under analysis, since the map region population is
/// per-program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeSet {
    /// One bit per map definition index.
    pub maps: u64,
    /// Fixed region kinds.
    pub kinds: RegionKind,
}

impl TypeSet {
    /// The empty set.
    pub const EMPTY: TypeSet = TypeSet {
        maps: 0,
        kinds: RegionKind::empty(),
    };

    /// Only the number region.
    pub fn num() -> TypeSet {
        TypeSet {
            maps: 0,
            kinds: RegionKind::NUM,
        }
    }

    /// Only the file-descriptor region.
    pub fn fd() -> TypeSet {
        TypeSet {
            maps: 0,
            kinds: RegionKind::FD,
        }
    }

    /// Only the context region.
    pub fn ctx() -> TypeSet {
        TypeSet {
            maps: 0,
            kinds: RegionKind::CTX,
        }
    }

    /// Only the stack region.
    pub fn stack() -> TypeSet {
        TypeSet {
            maps: 0,
            kinds: RegionKind::STACK,
        }
    }

    /// Only the packet region.
    pub fn packet() -> TypeSet {
        TypeSet {
            maps: 0,
            kinds: RegionKind::PACKET,
        }
    }

    /// A single map value region.
    pub fn map(index: usize) -> TypeSet {
        debug_assert!(index < MAX_MAPS);
        TypeSet {
            maps: 1u64 << index,
            kinds: RegionKind::empty(),
        }
    }

    /// Every map value region of a program with `nmaps` map definitions.
    pub fn all_maps(nmaps: usize) -> TypeSet {
        let maps = if nmaps >= MAX_MAPS {
            u64::MAX
        } else {
            (1u64 << nmaps) - 1
        };
        TypeSet {
            maps,
            kinds: RegionKind::empty(),
        }
    }

    /// Pointer-to-memory regions: stack, packet, and every map value region.
    pub fn mem(nmaps: usize) -> TypeSet {
        Self::all_maps(nmaps) | Self::stack() | Self::packet()
    }

    /// Every pointer region: memory regions plus the context.
    pub fn ptr(nmaps: usize) -> TypeSet {
        Self::mem(nmaps) | Self::ctx()
    }

    /// Everything except file descriptors.
    pub fn nonfd(nmaps: usize) -> TypeSet {
        Self::ptr(nmaps) | Self::num()
    }

    /// Every region.
    pub fn all(nmaps: usize) -> TypeSet {
        Self::nonfd(nmaps) | Self::fd()
    }

    /// True if no region is selected.
    pub fn is_empty(&self) -> bool {
        self.maps == 0 && self.kinds.is_empty()
    }

    /// True if map value region `index` is selected.
    pub fn contains_map(&self, index: usize) -> bool {
        index < MAX_MAPS && self.maps & (1u64 << index) != 0
    }

    /// True if the fixed kind is selected.
    pub fn contains(&self, kind: RegionKind) -> bool {
        self.kinds.contains(kind)
    }

    /// Set intersection.
    pub fn intersect(&self, other: TypeSet) -> TypeSet {
        TypeSet {
            maps: self.maps & other.maps,
            kinds: self.kinds & other.kinds,
        }
    }

    /// Set difference.
    pub fn minus(&self, other: TypeSet) -> TypeSet {
        TypeSet {
            maps: self.maps & !other.maps,
            kinds: self.kinds.difference(other.kinds),
        }
    }

    /// Iterate the selected map indices.
    pub fn map_indices(&self) -> impl Iterator<Item = usize> + '_ {
        let maps = self.maps;
        (0..MAX_MAPS).filter(move |i| maps & (1u64 << i) != 0)
    }
}

impl core::ops::BitOr for TypeSet {
    type Output = TypeSet;

    fn bitor(self, rhs: TypeSet) -> TypeSet {
        TypeSet {
            maps: self.maps | rhs.maps,
            kinds: self.kinds | rhs.kinds,
        }
    }
}

impl core::ops::BitOrAssign for TypeSet {
    fn bitor_assign(&mut self, rhs: TypeSet) {
        self.maps |= rhs.maps;
        self.kinds |= rhs.kinds;
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        if self.kinds.contains(RegionKind::NUM) {
            f.write_str("num")?;
            first = false;
        }
        for (kind, name) in [
            (RegionKind::CTX, "ctx"),
            (RegionKind::STACK, "stack"),
            (RegionKind::PACKET, "packet"),
            (RegionKind::FD, "fd"),
        ] {
            if self.kinds.contains(kind) {
                if !first {
                    f.write_str("|")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        for i in self.map_indices() {
            if !first {
                f.write_str("|")?;
            }
            write!(f, "map{}", i)?;
            first = false;
        }
        if first {
            f.write_str("none")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typeset_composition() {
        let t = TypeSet::mem(2);
        assert!(t.contains(RegionKind::STACK));
        assert!(t.contains(RegionKind::PACKET));
        assert!(t.contains_map(0));
        assert!(t.contains_map(1));
        assert!(!t.contains_map(2));
        assert!(!t.contains(RegionKind::CTX));
        assert!(!t.contains(RegionKind::NUM));
    }

    #[test]
    fn test_typeset_intersect() {
        let a = TypeSet::ptr(1);
        let b = TypeSet::num() | TypeSet::ctx();
        let i = a.intersect(b);
        assert!(i.contains(RegionKind::CTX));
        assert!(!i.contains(RegionKind::NUM));
        assert!(!i.contains_map(0));
    }

    #[test]
    fn test_typeset_all_maps_full() {
        let t = TypeSet::all_maps(MAX_MAPS);
        assert_eq!(t.maps, u64::MAX);
    }
}
