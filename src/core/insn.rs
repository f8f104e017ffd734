// SPDX-License-Identifier: GPL-2.0

//! Structured instruction representation.
//!
//! The analyser works on a structured instruction stream rather than raw
//! bytecode; unmarshalling and CFG construction happen upstream. The one
//! variant owned by this crate is [`Instruction::Assert`]: the assertion
//! extractor inserts assertions in front of each instruction, and the
//! discharger flips their `satisfied` flags.

use alloc::vec::Vec;
use core::fmt;

use crate::core::types::{CondOp, Condition, Reg, TypeSet, Value};

/// Binary ALU operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    /// Move.
    Mov,
    /// Addition.
    Add,
    /// Subtraction.
    Sub,
    /// Multiplication.
    Mul,
    /// Unsigned division.
    Div,
    /// Unsigned modulo.
    Mod,
    /// Bitwise or.
    Or,
    /// Bitwise and.
    And,
    /// Left shift.
    Lsh,
    /// Logical right shift.
    Rsh,
    /// Arithmetic right shift.
    Arsh,
    /// Bitwise xor.
    Xor,
}

/// Unary operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnOp {
    /// Arithmetic negation.
    Neg,
    /// Convert to little-endian, 16 bits.
    Le16,
    /// Convert to little-endian, 32 bits.
    Le32,
    /// Convert to little-endian, 64 bits.
    Le64,
    /// Convert to big-endian, 16 bits.
    Be16,
    /// Convert to big-endian, 32 bits.
    Be32,
    /// Convert to big-endian, 64 bits.
    Be64,
}

/// A memory operand: `[basereg + offset]` with an access width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemAccess {
    /// Base register.
    pub basereg: Reg,
    /// Constant byte offset from the base.
    pub offset: i64,
    /// Access width in bytes (1, 2, 4 or 8).
    pub width: u8,
}

/// Kind of a single-register helper argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgSingleKind {
    /// Any value; must be a number when pointer leaks are forbidden.
    Anything,
    /// Map file descriptor.
    MapFd,
    /// Pointer to a map key (stack or packet memory).
    PtrToMapKey,
    /// Pointer to a map value (stack or packet memory).
    PtrToMapValue,
    /// Pointer to the context.
    PtrToCtx,
}

/// A single-register helper argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgSingle {
    /// Argument kind.
    pub kind: ArgSingleKind,
    /// Register carrying the argument.
    pub reg: Reg,
}

/// Kind of a (pointer, size) helper argument pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgPairKind {
    /// Pointer to readable memory.
    PtrToMem,
    /// Pointer to readable memory, or null.
    PtrToMemOrNull,
    /// Pointer to write-only memory; the helper fills it.
    PtrToUninitMem,
}

/// A (pointer, size) helper argument pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgPair {
    /// Argument kind.
    pub kind: ArgPairKind,
    /// Register carrying the memory pointer.
    pub mem: Reg,
    /// Register carrying the size in bytes.
    pub size: Reg,
    /// Whether a zero size is acceptable.
    pub can_be_zero: bool,
}

/// A linear constraint: for each region in `when_types`, the offset of
/// `reg` plus `offset` must stand in relation `op` to the evaluation of
/// `v - width - offset` relative to the region base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConstraint {
    /// Comparison operator.
    pub op: CondOp,
    /// Constrained register.
    pub reg: Reg,
    /// Constant offset added to the register.
    pub offset: i64,
    /// Bound operand.
    pub v: Value,
    /// Access width operand.
    pub width: Value,
    /// Regions the constraint applies to.
    pub when_types: TypeSet,
}

/// A register together with a region set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypedReg {
    /// The register.
    pub reg: Reg,
    /// The regions it must (or is assumed to) lie within.
    pub types: TypeSet,
}

/// A type constraint: `then.reg` lies within `then.types`, either
/// unconditionally or under the hypothesis that `given.reg` lies within
/// `given.types`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeConstraint {
    /// The obligation.
    pub then: TypedReg,
    /// Optional hypothesis.
    pub given: Option<TypedReg>,
}

/// The range `reg + offset .. reg + offset + width` stays inside the
/// proven packet extent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InPacket {
    /// Packet pointer register.
    pub reg: Reg,
    /// Constant byte offset.
    pub offset: i64,
    /// Access width operand.
    pub width: Value,
}

/// An assertion body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assertion {
    /// Linear offset constraint.
    Linear(LinearConstraint),
    /// Region membership constraint.
    Type(TypeConstraint),
    /// Packet bound constraint.
    InPacket(InPacket),
}

/// An assertion instruction: a body plus the discharge flag the discharger
/// sets once the fixpoint invariant implies the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assert {
    /// The asserted precondition.
    pub body: Assertion,
    /// Whether the invariant at this point implies the body.
    pub satisfied: bool,
}

impl Assert {
    /// A fresh, undischarged assertion.
    pub fn new(body: Assertion) -> Self {
        Assert {
            body,
            satisfied: false,
        }
    }
}

/// A structured instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Placeholder for an instruction the unmarshaller could not decode.
    /// Reaching one during transfer is an internal invariant violation.
    Undefined,
    /// Load the file descriptor of map definition `mapfd` into `dst`.
    LoadMapFd {
        /// Destination register.
        dst: Reg,
        /// Map definition index.
        mapfd: usize,
    },
    /// Unary operation on `dst`.
    Un {
        /// Operation.
        op: UnOp,
        /// Destination register.
        dst: Reg,
    },
    /// Binary operation `dst := dst op v` (or `dst := v` for MOV).
    Bin {
        /// Operation.
        op: BinOp,
        /// Destination register.
        dst: Reg,
        /// Source operand.
        v: Value,
    },
    /// Jump, optionally conditional. Control flow is carried by the CFG
    /// edges; the condition is kept for extraction of type obligations.
    Jmp {
        /// Branch condition, if any.
        cond: Option<Condition>,
    },
    /// Assume a condition holds on this path (produced by CFG
    /// non-determinisation of conditional jumps).
    Assume {
        /// The assumed condition.
        cond: Condition,
    },
    /// Program exit.
    Exit,
    /// Helper function call.
    Call {
        /// Single-register arguments.
        singles: Vec<ArgSingle>,
        /// (pointer, size) argument pairs.
        pairs: Vec<ArgPair>,
        /// Whether the helper returns a pointer into a map value (the
        /// map lookup family).
        returns_map: bool,
    },
    /// Legacy packet access (LD_ABS / LD_IND); behaves as a call that
    /// returns a number.
    Packet {
        /// Access width in bytes.
        width: u8,
    },
    /// Memory load or store.
    Mem {
        /// Address operand.
        access: MemAccess,
        /// Loaded-into register (loads) or stored operand (stores).
        value: Value,
        /// True for loads.
        is_load: bool,
    },
    /// Atomic add to a map value.
    LockAdd {
        /// Address operand.
        access: MemAccess,
    },
    /// Inserted assertion.
    Assert(Assert),
}

impl Instruction {
    /// True for assertion instructions.
    pub fn is_assert(&self) -> bool {
        matches!(self, Instruction::Assert(_))
    }
}

impl fmt::Display for LinearConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{:+} {} {} - {} - {} when {}",
            self.reg, self.offset, self.op, self.v, self.width, self.offset, self.when_types
        )
    }
}

impl fmt::Display for TypeConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} : {}", self.then.reg, self.then.types)?;
        if let Some(given) = &self.given {
            write!(f, " given {} : {}", given.reg, given.types)?;
        }
        Ok(())
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assertion::Linear(lc) => write!(f, "{}", lc),
            Assertion::Type(tc) => write!(f, "{}", tc),
            Assertion::InPacket(ip) => {
                write!(f, "{}{:+}+{} in packet", ip.reg, ip.offset, ip.width)
            }
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Undefined => write!(f, "undefined"),
            Instruction::LoadMapFd { dst, mapfd } => write!(f, "{} = map_fd({})", dst, mapfd),
            Instruction::Un { op, dst } => write!(f, "{} = {:?}({})", dst, op, dst),
            Instruction::Bin { op, dst, v } => match op {
                BinOp::Mov => write!(f, "{} = {}", dst, v),
                _ => write!(f, "{} {:?}= {}", dst, op, v),
            },
            Instruction::Jmp { cond: None } => write!(f, "goto"),
            Instruction::Jmp { cond: Some(c) } => write!(f, "if {} goto", c),
            Instruction::Assume { cond } => write!(f, "assume {}", cond),
            Instruction::Exit => write!(f, "exit"),
            Instruction::Call { returns_map, .. } => {
                write!(f, "call{}", if *returns_map { " (map lookup)" } else { "" })
            }
            Instruction::Packet { width } => write!(f, "r0 = packet[{}]", width),
            Instruction::Mem {
                access,
                value,
                is_load,
            } => {
                if *is_load {
                    write!(
                        f,
                        "{} = *({}b) ({}{:+})",
                        value, access.width, access.basereg, access.offset
                    )
                } else {
                    write!(
                        f,
                        "*({}b) ({}{:+}) = {}",
                        access.width, access.basereg, access.offset, value
                    )
                }
            }
            Instruction::LockAdd { access } => {
                write!(
                    f,
                    "lock *({}b) ({}{:+}) += ...",
                    access.width, access.basereg, access.offset
                )
            }
            Instruction::Assert(a) => write!(f, "assert {}", a.body),
        }
    }
}
