// SPDX-License-Identifier: GPL-2.0

//! Program analysis passes: CFG interface, assertion extraction, and the
//! worklist fixpoint with its discharger.

pub mod cfg;
pub mod extractor;
pub mod fixpoint;
