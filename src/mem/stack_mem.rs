// SPDX-License-Identifier: GPL-2.0

//! Abstract stack memory.
//!
//! The stack is a sparse map from byte ranges to typed cells. A store to a
//! single known offset is a strong update: it claims its range outright and
//! invalidates every cell it touches. A store through an imprecise offset
//! set is weak: cells that exactly match one of the candidate ranges absorb
//! the stored value by join, everything else it may touch is invalidated.
//! Bytes with no cell read back as unknown.

use alloc::collections::BTreeMap;
use core::fmt;

use crate::bounds::domset::NumSet;
use crate::state::rcp::RcpValue;

/// A stored cell: a value with a known width.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Width of the cell in bytes.
    pub width: i64,
    /// The stored abstract value.
    pub value: RcpValue,
}

/// Abstract stack memory.
#[derive(Debug, Clone, PartialEq)]
pub struct StackMem {
    /// Distinguishes the unreachable state from the empty initial state.
    pub bot: bool,
    /// Cells keyed by start offset. Ranges never overlap.
    cells: BTreeMap<i64, Cell>,
}

impl Default for StackMem {
    fn default() -> Self {
        StackMem {
            bot: true,
            cells: BTreeMap::new(),
        }
    }
}

impl StackMem {
    /// The reachable, empty stack of the entry state.
    pub fn init() -> Self {
        StackMem {
            bot: false,
            cells: BTreeMap::new(),
        }
    }

    /// True for the unreachable state.
    pub fn is_bot(&self) -> bool {
        self.bot
    }

    /// Number of live cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when no cell is live.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    fn overlaps(start: i64, width: i64, other_start: i64, other_width: i64) -> bool {
        start < other_start + other_width && other_start < start + width
    }

    /// Remove every cell overlapping `[start, start+width)`.
    fn invalidate(&mut self, start: i64, width: i64) {
        let doomed: alloc::vec::Vec<i64> = self
            .cells
            .iter()
            .filter(|(s, c)| Self::overlaps(start, width, **s, c.width))
            .map(|(s, _)| *s)
            .collect();
        for s in doomed {
            self.cells.remove(&s);
        }
    }

    /// Store `value` of `width` bytes at the given abstract offsets.
    pub fn store(&mut self, offsets: &NumSet, width: i64, value: &RcpValue) {
        match offsets {
            NumSet::Bot => {}
            NumSet::Fin(elems) if elems.len() == 1 => {
                // Strong update: the written range is known exactly.
                let start = elems[0];
                self.invalidate(start, width);
                self.cells.insert(
                    start,
                    Cell {
                        width,
                        value: value.clone(),
                    },
                );
            }
            _ => self.weak_update(offsets, width, value),
        }
    }

    fn weak_update(&mut self, offsets: &NumSet, width: i64, value: &RcpValue) {
        let candidates: alloc::vec::Vec<i64> = self
            .cells
            .iter()
            .filter(|(s, c)| match offsets {
                NumSet::Top => true,
                NumSet::Fin(elems) => elems
                    .iter()
                    .any(|o| Self::overlaps(*o, width, **s, c.width)),
                NumSet::Bot => false,
            })
            .map(|(s, _)| *s)
            .collect();
        for s in candidates {
            let exact = match offsets {
                NumSet::Top => false,
                NumSet::Fin(elems) => elems.contains(&s) && self.cells[&s].width == width,
                NumSet::Bot => false,
            };
            if exact {
                if let Some(cell) = self.cells.get_mut(&s) {
                    cell.value.join(value);
                }
            } else {
                self.cells.remove(&s);
            }
        }
    }

    /// Store with an abstract width: weak-update every (offset, width)
    /// combination. An unknown width invalidates everything it may reach.
    pub fn store_dynamic(&mut self, offsets: &NumSet, widths: &NumSet, value: &RcpValue) {
        match widths {
            NumSet::Bot => {}
            NumSet::Fin(ws) => {
                if ws.len() == 1 && offsets.is_single() {
                    self.store(offsets, ws[0], value);
                    return;
                }
                for &w in ws {
                    self.weak_update(offsets, w, value);
                }
            }
            NumSet::Top => {
                match offsets.min() {
                    // The write starts no earlier than the smallest offset
                    // but may extend arbitrarily far.
                    Some(lo) => self.invalidate(lo, i64::MAX - lo),
                    None => self.cells.clear(),
                }
            }
        }
    }

    /// Load `width` bytes from the given abstract offsets.
    pub fn load(&self, offsets: &NumSet, width: i64) -> RcpValue {
        match offsets {
            NumSet::Bot => RcpValue::bot(),
            NumSet::Top => RcpValue::top(),
            NumSet::Fin(elems) => {
                if let [o] = elems.as_slice() {
                    return match self.cells.get(o) {
                        Some(cell) if cell.width == width => cell.value.clone(),
                        _ => RcpValue::top(),
                    };
                }
                let mut out: Option<RcpValue> = None;
                for (s, cell) in &self.cells {
                    if elems.iter().any(|o| Self::overlaps(*o, width, *s, cell.width)) {
                        match &mut out {
                            Some(v) => v.join(&cell.value),
                            None => out = Some(cell.value.clone()),
                        }
                    }
                }
                out.unwrap_or_else(RcpValue::top)
            }
        }
    }

    /// Pointwise join; cells present on only one side are dropped (their
    /// bytes become unknown).
    pub fn join(&mut self, other: &StackMem) {
        if other.bot {
            return;
        }
        if self.bot {
            *self = other.clone();
            return;
        }
        let keys: alloc::vec::Vec<i64> = self.cells.keys().copied().collect();
        for s in keys {
            let keep = match other.cells.get(&s) {
                Some(oc) if oc.width == self.cells[&s].width => Some(oc.value.clone()),
                _ => None,
            };
            match keep {
                Some(ov) => {
                    if let Some(cell) = self.cells.get_mut(&s) {
                        cell.value.join(&ov);
                    }
                }
                None => {
                    self.cells.remove(&s);
                }
            }
        }
    }

    /// Pointwise meet; cells present on only one side are kept.
    pub fn meet(&mut self, other: &StackMem) {
        if self.bot {
            return;
        }
        if other.bot {
            *self = StackMem::default();
            return;
        }
        for (s, oc) in &other.cells {
            match self.cells.get_mut(s) {
                Some(cell) if cell.width == oc.width => cell.value.meet(&oc.value),
                Some(_) => {}
                None => {
                    self.cells.insert(*s, oc.clone());
                }
            }
        }
    }
}

impl fmt::Display for StackMem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bot {
            return f.write_str("stack:bot");
        }
        f.write_str("stack:[")?;
        for (i, (s, cell)) in self.cells.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}..{}: {}", s, s + cell.width, cell.value)?;
        }
        f.write_str("]")
    }
}
