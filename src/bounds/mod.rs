// SPDX-License-Identifier: GPL-2.0

//! Numeric lattices: finite value sets, the packet bound, and checked
//! offset arithmetic.

pub mod domset;
pub mod minsize;
pub mod safeint;
