// SPDX-License-Identifier: GPL-2.0

//! Error types for the analyser

use core::fmt;

use crate::analysis::cfg::Label;

/// Result type alias for analyser operations
pub type Result<T> = core::result::Result<T, VerifierError>;

/// Internal-invariant failures that abort an analysis.
///
/// A program that merely fails verification is not an error: it is reported
/// through the `satisfied` flags of its assertions. The variants here mean
/// that the input violated the analyser's contract (a malformed CFG, an
/// undecoded instruction, offset metadata that overflows 64-bit signed
/// arithmetic).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifierError {
    /// The CFG has no blocks.
    EmptyCfg,
    /// An edge refers to a label with no block.
    MissingBlock(Label),
    /// A back-edge was found; the fixpoint engine handles acyclic CFGs only.
    BackEdgeDetected {
        /// Source label of the edge.
        from: Label,
        /// Target label of the edge.
        to: Label,
    },
    /// A register was read before being written.
    UninitializedRegister(u8),
    /// A register index outside the tracked slots.
    InvalidRegister(u8),
    /// An `Undefined` instruction reached the transfer function.
    UndefinedInstruction(Label),
    /// Offset arithmetic overflowed 64-bit signed range.
    OffsetOverflow(&'static str),
    /// A map definition index outside the program's map table.
    InvalidMapIndex(usize),
}

impl fmt::Display for VerifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifierError::EmptyCfg => write!(f, "empty control-flow graph"),
            VerifierError::MissingBlock(l) => write!(f, "no basic block at label {}", l),
            VerifierError::BackEdgeDetected { from, to } => {
                write!(f, "back-edge {} -> {}, loops not supported", from, to)
            }
            VerifierError::UninitializedRegister(r) => {
                write!(f, "register r{} not initialized", r)
            }
            VerifierError::InvalidRegister(r) => write!(f, "invalid register r{}", r),
            VerifierError::UndefinedInstruction(l) => {
                write!(f, "undefined instruction in block {}", l)
            }
            VerifierError::OffsetOverflow(op) => {
                write!(f, "integer overflow during {}", op)
            }
            VerifierError::InvalidMapIndex(i) => write!(f, "invalid map index {}", i),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for VerifierError {}
