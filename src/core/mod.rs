// SPDX-License-Identifier: GPL-2.0

//! Core types, error definitions, and diagnostics.

pub mod error;
pub mod insn;
pub mod log;
pub mod program;
pub mod types;
