// SPDX-License-Identifier: GPL-2.0

//! Top-level verification entry points.
//!
//! [`abs_validate`] is the convenience wrapper: extract assertions (if not
//! already done), run the fixpoint and the discharger, and report whether
//! every assertion was satisfied, together with the elapsed time.
//! Diagnostics are controlled by explicit options, not process-wide state.

use alloc::vec::Vec;

use crate::analysis::cfg::Cfg;
use crate::analysis::extractor::explicate_assertions;
use crate::analysis::fixpoint::{analyze_rcp, FailedAssertion};
use crate::core::error::Result;
use crate::core::insn::Instruction;
use crate::core::log::{AnalysisLog, LogLevel};
use crate::core::program::ProgramInfo;

/// Diagnostics switches, passed explicitly into the analyser.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifierOptions {
    /// Record the `(label, invariant, instruction, invariant')` trace of
    /// the discharge replay.
    pub print_invariants: bool,
    /// Record one diagnostic per unsatisfied assertion.
    pub print_failures: bool,
}

impl VerifierOptions {
    fn log_level(&self) -> LogLevel {
        if self.print_invariants {
            LogLevel::Trace
        } else if self.print_failures {
            LogLevel::Error
        } else {
            LogLevel::Off
        }
    }
}

/// Outcome of a verification run.
#[derive(Debug)]
pub struct VerificationResult {
    /// Total number of assertions in the rewritten CFG.
    pub assertions: usize,
    /// Assertions the invariant did not imply.
    pub failures: Vec<FailedAssertion>,
    /// Collected diagnostics (per [`VerifierOptions`]).
    pub log: AnalysisLog,
    /// Wall-clock seconds spent in fixpoint and discharge.
    pub seconds: f64,
}

impl VerificationResult {
    /// True iff every assertion was discharged.
    pub fn verified(&self) -> bool {
        self.failures.is_empty()
    }
}

fn count_assertions(cfg: &Cfg) -> usize {
    cfg.keys()
        .filter_map(|l| cfg.at(l).ok())
        .map(|b| b.insts.iter().filter(|i| i.is_assert()).count())
        .sum()
}

/// Verify a program: insert assertions, run the abstract interpretation,
/// and discharge. Mutates `cfg` (assertion instructions and their
/// `satisfied` flags).
pub fn validate(
    cfg: &mut Cfg,
    info: &ProgramInfo,
    opts: &VerifierOptions,
) -> Result<VerificationResult> {
    explicate_assertions(cfg, info);
    let mut log = AnalysisLog::new(opts.log_level());
    let start = now();
    let failures = analyze_rcp(cfg, info, &mut log)?;
    let seconds = elapsed_seconds(start);
    Ok(VerificationResult {
        assertions: count_assertions(cfg),
        failures,
        log,
        seconds,
    })
}

/// Convenience wrapper: true iff every assertion is satisfied, plus the
/// elapsed seconds.
pub fn abs_validate(cfg: &mut Cfg, info: &ProgramInfo, opts: &VerifierOptions) -> Result<(bool, f64)> {
    let result = validate(cfg, info, opts)?;
    Ok((result.verified(), result.seconds))
}

/// True when the CFG still contains an unsatisfied assertion.
pub fn has_unsatisfied(cfg: &Cfg) -> bool {
    cfg.keys().filter_map(|l| cfg.at(l).ok()).any(|b| {
        b.insts.iter().any(|i| match i {
            Instruction::Assert(a) => !a.satisfied,
            _ => false,
        })
    })
}

#[cfg(feature = "std")]
fn now() -> std::time::Instant {
    std::time::Instant::now()
}

#[cfg(feature = "std")]
fn elapsed_seconds(start: std::time::Instant) -> f64 {
    start.elapsed().as_secs_f64()
}

#[cfg(not(feature = "std"))]
fn now() {}

#[cfg(not(feature = "std"))]
fn elapsed_seconds(_start: ()) -> f64 {
    0.0
}
