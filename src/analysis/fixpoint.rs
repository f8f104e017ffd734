// SPDX-License-Identifier: GPL-2.0

//! Worklist fixpoint and assertion discharge.
//!
//! The driver keeps one machine state before (`pre`) and after (`post`)
//! every block. A block is re-evaluated when a predecessor's post state
//! changed; since the CFG is acyclic and every join grows monotonically in
//! a finite-height lattice, the loop terminates. After the fixpoint, a
//! linear replay walks each block from its `pre` state and marks every
//! assertion the invariant implies.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::analysis::cfg::{Cfg, Label};
use crate::core::error::Result;
use crate::core::insn::Instruction;
use crate::core::log::{AnalysisLog, LogLevel};
use crate::core::program::ProgramInfo;
use crate::state::machine::Machine;

/// An assertion the fixpoint invariant could not discharge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAssertion {
    /// Block label.
    pub label: Label,
    /// Instruction index within the block.
    pub index: usize,
    /// Rendered assertion body.
    pub assertion: String,
}

/// Pre/post machine states per CFG block.
pub struct Analyzer<'a> {
    /// State on entry to each block.
    pub pre: BTreeMap<Label, Machine<'a>>,
    /// State on exit of each block.
    pub post: BTreeMap<Label, Machine<'a>>,
}

impl<'a> Analyzer<'a> {
    /// Set up bottom states everywhere and the entry state at the entry
    /// label.
    pub fn new(cfg: &Cfg, info: &'a ProgramInfo) -> Result<Self> {
        let mut pre = BTreeMap::new();
        let mut post = BTreeMap::new();
        for label in cfg.keys() {
            pre.insert(label, Machine::bottom(info));
            post.insert(label, Machine::bottom(info));
        }
        let entry = cfg.entry()?;
        pre.insert(entry, Machine::entry(info));
        Ok(Analyzer { pre, post })
    }

    /// Fold the predecessors' post states into a block's pre state.
    fn join_predecessors(&mut self, cfg: &Cfg, label: Label) -> Result<()> {
        let block = cfg.at(label)?;
        let mut new_pre = self.pre[&label].clone();
        for prev in &block.prevlist {
            new_pre.join(&self.post[prev]);
        }
        self.pre.insert(label, new_pre);
        Ok(())
    }

    /// Re-run the transfer function over a block. True when the post
    /// state changed.
    fn recompute(&mut self, cfg: &Cfg, label: Label) -> Result<bool> {
        let mut dom = self.pre[&label].clone();
        for ins in &cfg.at(label)?.insts {
            dom.transfer(ins, label)?;
        }
        let changed = self.post[&label] != dom;
        self.post.insert(label, dom);
        Ok(changed)
    }

    /// Run the worklist to a fixpoint.
    pub fn run(&mut self, cfg: &Cfg) -> Result<()> {
        cfg.check_acyclic()?;
        let mut worklist: VecDeque<Label> = VecDeque::new();
        worklist.push_back(cfg.entry()?);
        let mut visits: BTreeMap<Label, usize> = cfg.keys().map(|l| (l, 0)).collect();
        while let Some(label) = worklist.pop_front() {
            self.join_predecessors(cfg, label)?;
            if self.recompute(cfg, label)? {
                for &next in &cfg.at(label)?.nextlist {
                    let count = visits.entry(next).or_insert(0);
                    *count += 1;
                    // A join point is queued once every predecessor has
                    // reported in.
                    if *count >= cfg.at(next)?.prevlist.len() {
                        worklist.push_back(next);
                    }
                }
                dedup_consecutive(&mut worklist);
            }
        }
        Ok(())
    }
}

fn dedup_consecutive(queue: &mut VecDeque<Label>) {
    let mut deduped = VecDeque::with_capacity(queue.len());
    for label in queue.drain(..) {
        if deduped.back() != Some(&label) {
            deduped.push_back(label);
        }
    }
    *queue = deduped;
}

/// Replay the fixpoint linearly, marking every assertion the invariant at
/// its point implies. Returns the assertions that stayed unsatisfied.
pub fn discharge(
    analyzer: &mut Analyzer<'_>,
    cfg: &mut Cfg,
    log: &mut AnalysisLog,
) -> Result<Vec<FailedAssertion>> {
    let mut failures = Vec::new();
    let labels: Vec<Label> = cfg.keys().collect();
    for label in labels {
        let mut dom = analyzer.pre[&label].clone();
        let block = cfg.block_mut(label)?;
        for (index, ins) in block.insts.iter_mut().enumerate() {
            if let Instruction::Assert(a) = ins {
                if !a.satisfied {
                    a.satisfied = dom.satisfied(&a.body)?;
                    if !a.satisfied {
                        let failed = FailedAssertion {
                            label,
                            index,
                            assertion: a.body.to_string(),
                        };
                        log.error(&format!(
                            "{}:{}: unsatisfied assertion: {}",
                            failed.label, failed.index, failed.assertion
                        ));
                        failures.push(failed);
                    }
                }
            }
            if log.enabled(LogLevel::Trace) {
                log.trace(&format!("{}:{}: {} |- {}", label, index, dom, ins));
            }
            dom.transfer(ins, label)?;
            if log.enabled(LogLevel::Trace) {
                log.trace(&format!("{}:{}: -> {}", label, index, dom));
            }
        }
    }
    Ok(failures)
}

/// Run the fixpoint and then the discharger, mutating the `satisfied`
/// flags of the assertions in `cfg`.
pub fn analyze_rcp(
    cfg: &mut Cfg,
    info: &ProgramInfo,
    log: &mut AnalysisLog,
) -> Result<Vec<FailedAssertion>> {
    let mut analyzer = Analyzer::new(cfg, info)?;
    analyzer.run(cfg)?;
    discharge(&mut analyzer, cfg, log)
}
