// SPDX-License-Identifier: GPL-2.0

//! Control-flow graph interface.
//!
//! The CFG is produced upstream (from the linear instruction stream,
//! optionally non-determinised so each branch target starts with an
//! `Assume`). The analyser consumes this shape: labels in topological
//! order, one basic block per label with explicit predecessor and
//! successor lists. The builder methods exist so embedders and tests can
//! assemble graphs directly.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::core::error::{Result, VerifierError};
use crate::core::insn::Instruction;

/// A basic block label. Labels are assigned in topological order: every
/// edge goes from a smaller label to a strictly larger one.
pub type Label = usize;

/// A basic block: an instruction sequence with explicit CFG edges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BasicBlock {
    /// Instructions, in order.
    pub insts: Vec<Instruction>,
    /// Predecessor labels.
    pub prevlist: Vec<Label>,
    /// Successor labels.
    pub nextlist: Vec<Label>,
}

/// A control-flow graph over basic blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cfg {
    blocks: BTreeMap<Label, BasicBlock>,
}

impl Cfg {
    /// An empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a block with the given instructions. Edges are added
    /// separately with [`Cfg::add_edge`].
    pub fn add_block(&mut self, label: Label, insts: Vec<Instruction>) {
        self.blocks.insert(
            label,
            BasicBlock {
                insts,
                ..Default::default()
            },
        );
    }

    /// Add an edge, maintaining both adjacency lists.
    pub fn add_edge(&mut self, from: Label, to: Label) {
        if let Some(b) = self.blocks.get_mut(&from) {
            b.nextlist.push(to);
        }
        if let Some(b) = self.blocks.get_mut(&to) {
            b.prevlist.push(from);
        }
    }

    /// Labels in topological (ascending) order.
    pub fn keys(&self) -> impl Iterator<Item = Label> + '_ {
        self.blocks.keys().copied()
    }

    /// The entry label.
    pub fn entry(&self) -> Result<Label> {
        self.blocks
            .keys()
            .next()
            .copied()
            .ok_or(VerifierError::EmptyCfg)
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// True when the graph has no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// The block at `label`.
    pub fn at(&self, label: Label) -> Result<&BasicBlock> {
        self.blocks
            .get(&label)
            .ok_or(VerifierError::MissingBlock(label))
    }

    /// The block at `label`, mutable.
    pub fn block_mut(&mut self, label: Label) -> Result<&mut BasicBlock> {
        self.blocks
            .get_mut(&label)
            .ok_or(VerifierError::MissingBlock(label))
    }

    /// Verify the topological labelling: every edge must lead to a
    /// strictly larger label, otherwise the graph has a back-edge (or a
    /// self-loop) and the fixpoint engine cannot handle it.
    pub fn check_acyclic(&self) -> Result<()> {
        for (label, block) in &self.blocks {
            for &next in &block.nextlist {
                if next <= *label {
                    return Err(VerifierError::BackEdgeDetected {
                        from: *label,
                        to: next,
                    });
                }
                if !self.blocks.contains_key(&next) {
                    return Err(VerifierError::MissingBlock(next));
                }
            }
            for &prev in &block.prevlist {
                if !self.blocks.contains_key(&prev) {
                    return Err(VerifierError::MissingBlock(prev));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_edges_maintain_both_lists() {
        let mut cfg = Cfg::new();
        cfg.add_block(0, vec![]);
        cfg.add_block(1, vec![]);
        cfg.add_block(2, vec![]);
        cfg.add_edge(0, 1);
        cfg.add_edge(0, 2);
        cfg.add_edge(1, 2);
        assert_eq!(cfg.at(0).unwrap().nextlist, vec![1, 2]);
        assert_eq!(cfg.at(2).unwrap().prevlist, vec![0, 1]);
        assert!(cfg.check_acyclic().is_ok());
    }

    #[test]
    fn test_back_edge_detected() {
        let mut cfg = Cfg::new();
        cfg.add_block(0, vec![]);
        cfg.add_block(1, vec![]);
        cfg.add_edge(1, 0);
        assert_eq!(
            cfg.check_acyclic(),
            Err(VerifierError::BackEdgeDetected { from: 1, to: 0 })
        );
    }

    #[test]
    fn test_empty_cfg_has_no_entry() {
        let cfg = Cfg::new();
        assert_eq!(cfg.entry(), Err(VerifierError::EmptyCfg));
    }
}
