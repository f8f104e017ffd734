// SPDX-License-Identifier: GPL-2.0

//! Reduced cartesian product of per-region abstract values.
//!
//! An [`RcpValue`] records, independently for every region, what a runtime
//! value may be: a plain number, an offset into the context / stack /
//! packet, the packet-end sentinel, an offset into some map's value region,
//! or a map file descriptor. A component that is bottom means "certainly
//! not this region"; the value as a whole is bottom when every component
//! is.
//!
//! Pointer arithmetic is componentwise: number+number stays a number,
//! pointer±number shifts the pointer's offset set, pointer-pointer of the
//! same region yields a number. Subtracting a packet pointer from the
//! packet-end sentinel yields a *packet length*: a number that keeps the
//! end flag and the subtrahend's offsets as provenance, so a later branch
//! on it can strengthen the proven packet bound.

use alloc::collections::BTreeMap;
use core::fmt;

use crate::bounds::domset::NumSet;
use crate::core::error::Result;
use crate::core::insn::BinOp;
use crate::core::types::{CondOp, RegionKind, TypeSet, MAX_MAPS};

/// Per-map-index offset sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapOffsets {
    /// Any offset into any map's value region.
    Top,
    /// Offsets per map definition index; absent indices are bottom.
    Fin(BTreeMap<usize, NumSet>),
}

impl MapOffsets {
    /// The bottom element.
    pub fn bot() -> MapOffsets {
        MapOffsets::Fin(BTreeMap::new())
    }

    /// Offset `off` into the value region of map `index`.
    pub fn single(index: usize, off: i64) -> MapOffsets {
        let mut m = BTreeMap::new();
        m.insert(index, NumSet::single(off));
        MapOffsets::Fin(m)
    }

    /// True if no map region is possible.
    pub fn is_bot(&self) -> bool {
        matches!(self, MapOffsets::Fin(m) if m.is_empty())
    }

    /// The offset set for map `index`.
    pub fn get(&self, index: usize) -> NumSet {
        match self {
            MapOffsets::Top => NumSet::Top,
            MapOffsets::Fin(m) => m.get(&index).cloned().unwrap_or(NumSet::Bot),
        }
    }

    /// Insert or replace the offset set for map `index`.
    pub fn set(&mut self, index: usize, offs: NumSet) {
        if let MapOffsets::Fin(m) = self {
            if offs.is_bot() {
                m.remove(&index);
            } else {
                m.insert(index, offs);
            }
        }
    }

    /// Least upper bound.
    pub fn join(&self, other: &MapOffsets) -> MapOffsets {
        match (self, other) {
            (MapOffsets::Top, _) | (_, MapOffsets::Top) => MapOffsets::Top,
            (MapOffsets::Fin(a), MapOffsets::Fin(b)) => {
                let mut out = a.clone();
                for (i, offs) in b {
                    let joined = out.get(i).map_or_else(|| offs.clone(), |x| x.join(offs));
                    out.insert(*i, joined);
                }
                MapOffsets::Fin(out)
            }
        }
    }

    /// Greatest lower bound.
    pub fn meet(&self, other: &MapOffsets) -> MapOffsets {
        match (self, other) {
            (MapOffsets::Top, _) => other.clone(),
            (_, MapOffsets::Top) => self.clone(),
            (MapOffsets::Fin(a), MapOffsets::Fin(b)) => {
                let mut out = BTreeMap::new();
                for (i, offs) in a {
                    if let Some(bo) = b.get(i) {
                        let met = offs.meet(bo);
                        if !met.is_bot() {
                            out.insert(*i, met);
                        }
                    }
                }
                MapOffsets::Fin(out)
            }
        }
    }

    /// Shift every offset set by `by`.
    pub fn shift(&self, by: &NumSet) -> Result<MapOffsets> {
        if by.is_bot() {
            return Ok(MapOffsets::bot());
        }
        match self {
            MapOffsets::Top => Ok(MapOffsets::Top),
            MapOffsets::Fin(m) => {
                let mut out = BTreeMap::new();
                for (i, offs) in m {
                    let shifted = offs.add(by)?;
                    if !shifted.is_bot() {
                        out.insert(*i, shifted);
                    }
                }
                Ok(MapOffsets::Fin(out))
            }
        }
    }

    /// Keep only the indices selected by `mask`.
    pub fn restrict(&self, mask: u64) -> MapOffsets {
        match self {
            MapOffsets::Top => {
                if mask == u64::MAX {
                    MapOffsets::Top
                } else {
                    let mut out = BTreeMap::new();
                    for i in 0..MAX_MAPS {
                        if mask & (1u64 << i) != 0 {
                            out.insert(i, NumSet::Top);
                        }
                    }
                    MapOffsets::Fin(out)
                }
            }
            MapOffsets::Fin(m) => MapOffsets::Fin(
                m.iter()
                    .filter(|(i, _)| **i < MAX_MAPS && mask & (1u64 << **i) != 0)
                    .map(|(i, o)| (*i, o.clone()))
                    .collect(),
            ),
        }
    }

    /// Replace every offset set with `{0}` (realignment to region base).
    pub fn zeroed(&self) -> MapOffsets {
        match self {
            MapOffsets::Top => MapOffsets::Top,
            MapOffsets::Fin(m) => {
                MapOffsets::Fin(m.keys().map(|i| (*i, NumSet::single(0))).collect())
            }
        }
    }

    fn indices(&self) -> alloc::vec::Vec<usize> {
        match self {
            MapOffsets::Top => alloc::vec::Vec::new(),
            MapOffsets::Fin(m) => m.keys().copied().collect(),
        }
    }
}

/// A reduced-cartesian-product abstract value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcpValue {
    /// Plain number component.
    pub num: NumSet,
    /// Offset into the context structure.
    pub ctx: NumSet,
    /// Offset into the stack (0..STACK_SIZE, counted from the bottom).
    pub stack: NumSet,
    /// Offset into the packet payload.
    pub packet: NumSet,
    /// Whether the value may be the packet-end sentinel.
    pub packet_end: bool,
    /// Offsets into map value regions, per map definition index.
    pub maps: MapOffsets,
    /// Map file descriptors the value may be, one bit per index.
    pub fd: u64,
}

impl RcpValue {
    /// The bottom value: certainly nothing.
    pub fn bot() -> RcpValue {
        RcpValue {
            num: NumSet::Bot,
            ctx: NumSet::Bot,
            stack: NumSet::Bot,
            packet: NumSet::Bot,
            packet_end: false,
            maps: MapOffsets::bot(),
            fd: 0,
        }
    }

    /// The top value: could be anything.
    pub fn top() -> RcpValue {
        RcpValue {
            num: NumSet::Top,
            ctx: NumSet::Top,
            stack: NumSet::Top,
            packet: NumSet::Top,
            packet_end: true,
            maps: MapOffsets::Top,
            fd: u64::MAX,
        }
    }

    /// A known number.
    pub fn with_num(v: i64) -> RcpValue {
        RcpValue {
            num: NumSet::single(v),
            ..Self::bot()
        }
    }

    /// An unknown number.
    pub fn num_top() -> RcpValue {
        RcpValue {
            num: NumSet::Top,
            ..Self::bot()
        }
    }

    /// A context pointer at `off`.
    pub fn with_ctx(off: i64) -> RcpValue {
        RcpValue {
            ctx: NumSet::single(off),
            ..Self::bot()
        }
    }

    /// A stack pointer at `off`.
    pub fn with_stack(off: i64) -> RcpValue {
        RcpValue {
            stack: NumSet::single(off),
            ..Self::bot()
        }
    }

    /// A packet pointer at `off`.
    pub fn with_packet(off: i64) -> RcpValue {
        RcpValue {
            packet: NumSet::single(off),
            ..Self::bot()
        }
    }

    /// The packet-end sentinel.
    pub fn with_packet_end() -> RcpValue {
        RcpValue {
            packet_end: true,
            ..Self::bot()
        }
    }

    /// A pointer at `off` into the value region of map `index`.
    pub fn with_map(index: usize, off: i64) -> RcpValue {
        RcpValue {
            maps: MapOffsets::single(index, off),
            ..Self::bot()
        }
    }

    /// The file descriptor of map `index`.
    pub fn with_fd(index: usize) -> RcpValue {
        debug_assert!(index < MAX_MAPS);
        RcpValue {
            fd: 1u64 << index,
            ..Self::bot()
        }
    }

    /// True when no component is possible.
    pub fn is_bot(&self) -> bool {
        self.num.is_bot()
            && self.ctx.is_bot()
            && self.stack.is_bot()
            && self.packet.is_bot()
            && !self.packet_end
            && self.maps.is_bot()
            && self.fd == 0
    }

    /// True when the value is certainly a runtime number: either a plain
    /// number (every pointer component bottom) or a packet length (a
    /// number carrying end-relative provenance).
    pub fn must_be_num(&self) -> bool {
        if self.num.is_bot() {
            return false;
        }
        if self.is_packet_length() {
            return true;
        }
        self.ctx.is_bot()
            && self.stack.is_bot()
            && self.packet.is_bot()
            && !self.packet_end
            && self.maps.is_bot()
            && self.fd == 0
    }

    /// True for the result of `packet_end - packet_ptr`: a number whose
    /// end flag and packet offsets record which pointer it was measured
    /// against.
    pub fn is_packet_length(&self) -> bool {
        self.packet_end
            && !self.num.is_bot()
            && !self.packet.is_bot()
            && self.ctx.is_bot()
            && self.stack.is_bot()
            && self.maps.is_bot()
            && self.fd == 0
    }

    /// True for the pure packet-end sentinel.
    pub fn is_packet_end_marker(&self) -> bool {
        self.packet_end
            && self.num.is_bot()
            && self.ctx.is_bot()
            && self.stack.is_bot()
            && self.packet.is_bot()
            && self.maps.is_bot()
            && self.fd == 0
    }

    /// True if the value may point into the packet.
    pub fn maybe_packet(&self) -> bool {
        !self.packet.is_bot() || self.packet_end
    }

    /// True if the value may point into some map's value region.
    pub fn maybe_map(&self) -> bool {
        !self.maps.is_bot()
    }

    /// The packet offset component.
    pub fn packet_offsets(&self) -> NumSet {
        self.packet.clone()
    }

    /// The context offset component.
    pub fn ctx_offsets(&self) -> NumSet {
        self.ctx.clone()
    }

    /// The stack offset component.
    pub fn stack_offsets(&self) -> NumSet {
        self.stack.clone()
    }

    /// The number component.
    pub fn nums(&self) -> NumSet {
        self.num.clone()
    }

    /// Collapse to top.
    pub fn havoc(&mut self) {
        *self = Self::top();
    }

    /// Least upper bound, in place.
    pub fn join(&mut self, other: &RcpValue) {
        self.num = self.num.join(&other.num);
        self.ctx = self.ctx.join(&other.ctx);
        self.stack = self.stack.join(&other.stack);
        self.packet = self.packet.join(&other.packet);
        self.packet_end |= other.packet_end;
        self.maps = self.maps.join(&other.maps);
        self.fd |= other.fd;
    }

    /// Greatest lower bound, in place.
    pub fn meet(&mut self, other: &RcpValue) {
        self.num = self.num.meet(&other.num);
        self.ctx = self.ctx.meet(&other.ctx);
        self.stack = self.stack.meet(&other.stack);
        self.packet = self.packet.meet(&other.packet);
        self.packet_end &= other.packet_end;
        self.maps = self.maps.meet(&other.maps);
        self.fd &= other.fd;
    }

    /// Realign to region bases: every non-bottom component becomes its
    /// zero element. Linear constraints are stated relative to a pointer's
    /// base, so the right-hand side starts from this value.
    pub fn zero(&self) -> RcpValue {
        let z = |s: &NumSet| {
            if s.is_bot() {
                NumSet::Bot
            } else {
                NumSet::single(0)
            }
        };
        RcpValue {
            num: z(&self.num),
            ctx: z(&self.ctx),
            stack: z(&self.stack),
            packet: z(&self.packet),
            packet_end: self.packet_end,
            maps: self.maps.zeroed(),
            fd: self.fd,
        }
    }

    /// Drop packet-length provenance, leaving the plain number.
    fn as_plain(&self) -> RcpValue {
        if self.is_packet_length() {
            RcpValue {
                num: self.num.clone(),
                ..Self::bot()
            }
        } else {
            self.clone()
        }
    }

    /// Pointer addition: `number+number` is a number, `ptr+number` shifts
    /// the pointer. Adding two pointers contributes nothing (bottom).
    pub fn add(&self, other: &RcpValue) -> Result<RcpValue> {
        let a = self.as_plain();
        let b = other.as_plain();
        let mut out = Self::bot();
        out.num = a.num.add(&b.num)?;
        out.ctx = a.ctx.add(&b.num)?.join(&a.num.add(&b.ctx)?);
        out.stack = a.stack.add(&b.num)?.join(&a.num.add(&b.stack)?);
        out.packet = a.packet.add(&b.num)?.join(&a.num.add(&b.packet)?);
        out.maps = a.maps.shift(&b.num)?.join(&b.maps.shift(&a.num)?);
        Ok(out)
    }

    /// Pointer subtraction: `ptr-number` shifts the pointer, `ptr-ptr` of
    /// matching regions is a number. `packet_end - packet` is a packet
    /// length (see [`RcpValue::is_packet_length`]).
    pub fn sub(&self, other: &RcpValue) -> Result<RcpValue> {
        let a = self.as_plain();
        let b = other.as_plain();
        let mut out = Self::bot();
        out.num = a.num.sub(&b.num)?;
        // Matching-region differences are numbers.
        out.num = out.num.join(&a.ctx.sub(&b.ctx)?);
        out.num = out.num.join(&a.stack.sub(&b.stack)?);
        out.num = out.num.join(&a.packet.sub(&b.packet)?);
        for i in a.maps.indices() {
            let bi = b.maps.get(i);
            if !bi.is_bot() {
                out.num = out.num.join(&a.maps.get(i).sub(&bi)?);
            }
        }
        // Pointer minus number keeps the region.
        if !b.num.is_bot() {
            out.ctx = a.ctx.sub(&b.num)?;
            out.stack = a.stack.sub(&b.num)?;
            out.packet = a.packet.sub(&b.num)?;
            out.maps = a.maps.shift(&b.num.neg()?)?;
        }
        if a.packet_end && !b.packet.is_bot() {
            // The measured distance to the end of the packet. The exact
            // number is unknowable here; keep the subtrahend's offsets as
            // provenance for the packet-bound refinement on branches.
            out.num = NumSet::Top;
            out.packet_end = true;
            out.packet = b.packet.clone();
        } else if a.packet_end && b.packet_end {
            out.num = out.num.join(&NumSet::Top);
        }
        Ok(out)
    }

    /// Remaining ALU operations: precise only when both operands are
    /// certainly numbers, otherwise the result is an unknown number.
    pub fn exec(&self, op: BinOp, other: &RcpValue) -> RcpValue {
        if self.must_be_num() && other.must_be_num() {
            RcpValue {
                num: self.num.exec(op, &other.num),
                ..Self::bot()
            }
        } else {
            Self::num_top()
        }
    }

    /// Restrict to the regions in `ts`. Packet-length provenance counts
    /// as part of the number region.
    pub fn restrict(&self, ts: &TypeSet) -> RcpValue {
        let keep_num = ts.contains(RegionKind::NUM);
        let keep_packet = ts.contains(RegionKind::PACKET);
        let keep_length = keep_num && self.is_packet_length();
        RcpValue {
            num: if keep_num {
                self.num.clone()
            } else {
                NumSet::Bot
            },
            ctx: if ts.contains(RegionKind::CTX) {
                self.ctx.clone()
            } else {
                NumSet::Bot
            },
            stack: if ts.contains(RegionKind::STACK) {
                self.stack.clone()
            } else {
                NumSet::Bot
            },
            packet: if keep_packet || keep_length {
                self.packet.clone()
            } else {
                NumSet::Bot
            },
            packet_end: (keep_packet || keep_length) && self.packet_end,
            maps: self.maps.restrict(ts.maps),
            fd: if ts.contains(RegionKind::FD) {
                self.fd
            } else {
                0
            },
        }
    }

    /// Refine to the regions in `ts`.
    pub fn assume_types(&mut self, ts: &TypeSet) {
        *self = self.restrict(ts);
    }

    /// True iff the value certainly lies within the regions in `ts`.
    pub fn satisfied_types(&self, ts: &TypeSet) -> bool {
        self.restrict(ts) == *self
    }

    /// Type-overlap refinement: when `right` certainly lies within
    /// `given` (judged against `all`, the full region set of the
    /// program), restrict `left` to `t`.
    pub fn assume_given(
        left: &mut RcpValue,
        t: &TypeSet,
        right: &RcpValue,
        given: &TypeSet,
        all: &TypeSet,
    ) {
        if right.restrict(given).is_bot() {
            return;
        }
        if right.restrict(&all.minus(*given)).is_bot() {
            left.assume_types(t);
        }
    }

    /// Conditional type entailment: vacuous when `right` cannot lie in
    /// `given`, otherwise `left` must certainly lie within `t`.
    pub fn satisfied_given(
        left: &RcpValue,
        t: &TypeSet,
        right: &RcpValue,
        given: &TypeSet,
    ) -> bool {
        if right.restrict(given).is_bot() {
            return true;
        }
        left.satisfied_types(t)
    }

    /// Refine `left` under the hypothesis `left op right`, region by
    /// region over `when`. Regions where `right` is bottom carry no
    /// information and stay untouched.
    pub fn assume_cmp(left: &mut RcpValue, op: CondOp, right: &RcpValue, when: &TypeSet) {
        if when.contains(RegionKind::NUM) {
            left.num = left.num.assumed(op, &right.num);
        }
        if when.contains(RegionKind::CTX) {
            left.ctx = left.ctx.assumed(op, &right.ctx);
        }
        if when.contains(RegionKind::STACK) {
            left.stack = left.stack.assumed(op, &right.stack);
        }
        if when.contains(RegionKind::PACKET) {
            left.packet = left.packet.assumed(op, &right.packet);
        }
        let indices = left.maps.indices();
        for i in indices {
            if when.contains_map(i) {
                let refined = left.maps.get(i).assumed(op, &right.maps.get(i));
                left.maps.set(i, refined);
            }
        }
    }

    /// True iff `left op right` is already implied, region by region
    /// over `when`.
    pub fn satisfied_cmp(left: &RcpValue, op: CondOp, right: &RcpValue, when: &TypeSet) -> bool {
        if when.contains(RegionKind::NUM) && !left.num.satisfies(op, &right.num) {
            return false;
        }
        if when.contains(RegionKind::CTX) && !left.ctx.satisfies(op, &right.ctx) {
            return false;
        }
        if when.contains(RegionKind::STACK) && !left.stack.satisfies(op, &right.stack) {
            return false;
        }
        if when.contains(RegionKind::PACKET) && !left.packet.satisfies(op, &right.packet) {
            return false;
        }
        for i in left.maps.indices() {
            if when.contains_map(i) && !left.maps.get(i).satisfies(op, &right.maps.get(i)) {
                return false;
            }
        }
        true
    }

    /// The result of a map lookup through this file descriptor: null or a
    /// pointer to the start of the value region of any map the descriptor
    /// may refer to.
    pub fn map_lookup(&self, nmaps: usize) -> RcpValue {
        let mut out = Self::with_num(0);
        for i in 0..nmaps.min(MAX_MAPS) {
            if self.fd & (1u64 << i) != 0 {
                out.maps.set(i, NumSet::single(0));
            }
        }
        out
    }
}

impl fmt::Display for RcpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bot() {
            return f.write_str("bot");
        }
        let mut first = true;
        let sep = |f: &mut fmt::Formatter<'_>, first: &mut bool| -> fmt::Result {
            if !*first {
                f.write_str("; ")?;
            }
            *first = false;
            Ok(())
        };
        f.write_str("{")?;
        if !self.num.is_bot() {
            sep(f, &mut first)?;
            write!(f, "num:{}", self.num)?;
        }
        if !self.ctx.is_bot() {
            sep(f, &mut first)?;
            write!(f, "ctx:{}", self.ctx)?;
        }
        if !self.stack.is_bot() {
            sep(f, &mut first)?;
            write!(f, "stack:{}", self.stack)?;
        }
        if !self.packet.is_bot() {
            sep(f, &mut first)?;
            write!(f, "pkt:{}", self.packet)?;
        }
        if self.packet_end {
            sep(f, &mut first)?;
            f.write_str("pkt_end")?;
        }
        match &self.maps {
            MapOffsets::Top => {
                sep(f, &mut first)?;
                f.write_str("map:top")?;
            }
            MapOffsets::Fin(m) => {
                for (i, offs) in m {
                    sep(f, &mut first)?;
                    write!(f, "map{}:{}", i, offs)?;
                }
            }
        }
        if self.fd != 0 {
            sep(f, &mut first)?;
            write!(f, "fd:{:#x}", self.fd)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::TypeSet;

    #[test]
    fn test_with_constructors_project_back() {
        let v = RcpValue::with_packet(3);
        assert_eq!(v.packet_offsets(), NumSet::single(3));
        assert!(v.nums().is_bot());
        assert!(v.ctx_offsets().is_bot());
        assert!(v.stack_offsets().is_bot());
        assert!(!v.maybe_map());

        let v = RcpValue::with_stack(504);
        assert_eq!(v.stack_offsets(), NumSet::single(504));
        assert!(v.packet_offsets().is_bot());
    }

    #[test]
    fn test_num_plus_num() {
        let a = RcpValue::with_num(40);
        let b = RcpValue::with_num(2);
        let c = a.add(&b).unwrap();
        assert!(c.must_be_num());
        assert_eq!(c.nums(), NumSet::single(42));
    }

    #[test]
    fn test_ptr_plus_num_shifts() {
        let p = RcpValue::with_packet(0);
        let n = RcpValue::with_num(4);
        let q = p.add(&n).unwrap();
        assert_eq!(q.packet_offsets(), NumSet::single(4));
        assert!(q.nums().is_bot());
    }

    #[test]
    fn test_ptr_minus_ptr_same_region_is_num() {
        let a = RcpValue::with_stack(512);
        let b = RcpValue::with_stack(504);
        let d = a.sub(&b).unwrap();
        assert!(d.must_be_num());
        assert_eq!(d.nums(), NumSet::single(8));
    }

    #[test]
    fn test_end_minus_packet_is_length() {
        let end = RcpValue::with_packet_end();
        let data = RcpValue::with_packet(0);
        let len = end.sub(&data).unwrap();
        assert!(len.is_packet_length());
        assert!(len.must_be_num());
        assert!(len.nums().is_top());
    }

    #[test]
    fn test_length_arithmetic_drops_provenance() {
        let len = RcpValue::with_packet_end()
            .sub(&RcpValue::with_packet(0))
            .unwrap();
        let shifted = len.sub(&RcpValue::with_num(4)).unwrap();
        assert!(!shifted.is_packet_length());
        assert!(shifted.must_be_num());
    }

    #[test]
    fn test_join_accumulates_regions() {
        let mut v = RcpValue::with_num(0);
        v.join(&RcpValue::with_map(0, 0));
        assert!(v.maybe_map());
        assert!(!v.must_be_num());
        assert_eq!(v.nums(), NumSet::single(0));
    }

    #[test]
    fn test_restrict_to_num() {
        let mut v = RcpValue::with_num(0);
        v.join(&RcpValue::with_map(0, 0));
        let r = v.restrict(&TypeSet::num());
        assert!(r.must_be_num());
        assert!(!r.maybe_map());
        assert!(!v.satisfied_types(&TypeSet::num()));
        assert!(v.satisfied_types(&(TypeSet::num() | TypeSet::map(0))));
    }

    #[test]
    fn test_exec_collapses_pointers() {
        let p = RcpValue::with_packet(0);
        let n = RcpValue::with_num(1);
        let r = p.exec(BinOp::And, &n);
        assert!(r.nums().is_top());
        assert!(!r.maybe_packet());
    }

    #[test]
    fn test_assume_cmp_ne_null() {
        let fd = RcpValue::with_fd(0);
        let mut r0 = fd.map_lookup(1);
        assert!(!r0.nums().is_bot());
        RcpValue::assume_cmp(&mut r0, CondOp::Ne, &RcpValue::with_num(0), &TypeSet::all(1));
        assert!(r0.nums().is_bot());
        assert_eq!(r0.maps.get(0), NumSet::single(0));
    }

    #[test]
    fn test_satisfied_monotone_under_refinement() {
        // A refined (smaller) value satisfies at least the constraints the
        // original did.
        let loose = RcpValue {
            num: NumSet::from_elems([0, 4]),
            ..RcpValue::bot()
        };
        let tight = RcpValue {
            num: NumSet::single(0),
            ..RcpValue::bot()
        };
        let bound = RcpValue::with_num(4);
        let when = TypeSet::num();
        assert!(RcpValue::satisfied_cmp(&loose, CondOp::Le, &bound, &when));
        assert!(RcpValue::satisfied_cmp(&tight, CondOp::Le, &bound, &when));
    }

    #[test]
    fn test_zero_realigns() {
        let v = RcpValue::with_stack(504);
        let z = v.zero();
        assert_eq!(z.stack_offsets(), NumSet::single(0));
        assert!(z.nums().is_bot());
    }

    #[test]
    fn test_havoc_fails_type_checks() {
        let mut v = RcpValue::with_num(0);
        v.havoc();
        assert!(!v.satisfied_types(&TypeSet::ptr(1)));
        assert!(!v.must_be_num());
    }
}
