//! # BPF Abstract Interpretation
//!
//! A static verifier for eBPF bytecode built as an abstract interpretation
//! over a reduced cartesian product of per-region value domains.
//!
//! Given a control-flow graph of structured instructions and the program's
//! metadata (type, map definitions, context layout), the analyser decides
//! whether the program is safe: every memory access in bounds for its
//! region, every register used as a pointer of a known region type, every
//! helper argument well-typed, and pointer arithmetic confined to the
//! shapes that preserve the type discipline.
//!
//! ## Pipeline
//!
//! 1. **Assertion extraction** ([`analysis::extractor`]) rewrites each
//!    instruction into its typed preconditions followed by the original
//!    instruction.
//! 2. **Fixpoint** ([`analysis::fixpoint`]) runs a worklist over the
//!    acyclic CFG, joining predecessor states and re-evaluating blocks
//!    until the per-block invariants stabilise.
//! 3. **Discharge** replays each block linearly and marks every assertion
//!    the invariant at its point implies.
//!
//! ## Quick Start
//!
//! ```rust
//! use bpf_absint::analysis::cfg::Cfg;
//! use bpf_absint::core::insn::{BinOp, Instruction};
//! use bpf_absint::core::program::ProgramInfo;
//! use bpf_absint::core::types::{Imm, Reg, Value};
//! use bpf_absint::verifier::{abs_validate, VerifierOptions};
//!
//! // r0 = 0; exit
//! let mut cfg = Cfg::new();
//! cfg.add_block(
//!     0,
//!     vec![
//!         Instruction::Bin {
//!             op: BinOp::Mov,
//!             dst: Reg(0),
//!             v: Value::Imm(Imm(0)),
//!         },
//!         Instruction::Exit,
//!     ],
//! );
//!
//! let info = ProgramInfo::default();
//! let (ok, _seconds) = abs_validate(&mut cfg, &info, &VerifierOptions::default()).unwrap();
//! assert!(ok);
//! ```
//!
//! ## Module Structure
//!
//! - [`core`]: instruction syntax, region sets, program metadata, errors,
//!   diagnostics log
//! - [`bounds`]: finite value sets, the packet bound, checked offset
//!   arithmetic
//! - [`state`]: the RCP value domain, register file, and machine state
//! - [`mem`]: abstract stack memory
//! - [`analysis`]: CFG interface, assertion extraction, worklist fixpoint
//!   and discharge
//! - [`verifier`]: entry points and options
//!
//! ## no_std Support
//!
//! The crate is `no_std`-capable (it relies on `alloc` only). Disable the
//! default `std` feature for kernel-adjacent environments; elapsed-time
//! reporting then returns zero.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

extern crate alloc;

/// Core types, error definitions, and diagnostics
pub mod core;

/// Numeric lattices
pub mod bounds;

/// Value and machine state
pub mod state;

/// Abstract memory
pub mod mem;

/// Analysis passes
pub mod analysis;

/// Verification entry points
pub mod verifier;

/// Commonly used types and functions
pub mod prelude {
    pub use crate::analysis::cfg::{BasicBlock, Cfg, Label};
    pub use crate::analysis::extractor::explicate_assertions;
    pub use crate::analysis::fixpoint::{analyze_rcp, Analyzer, FailedAssertion};
    pub use crate::core::error::{Result, VerifierError};
    pub use crate::core::insn::Instruction;
    pub use crate::core::program::{ContextDescriptor, MapDef, ProgType, ProgramInfo};
    pub use crate::core::types::{CondOp, Condition, Imm, Reg, TypeSet, Value};
    pub use crate::state::machine::Machine;
    pub use crate::state::rcp::RcpValue;
    pub use crate::verifier::{abs_validate, validate, VerificationResult, VerifierOptions};
}

pub use crate::core::error::{Result, VerifierError};
