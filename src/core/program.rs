// SPDX-License-Identifier: GPL-2.0

//! Program metadata consumed by the analyser.
//!
//! The loader hands the analyser a read-only description of the program:
//! its type, the map definitions referenced by `LoadMapFd`, and the layout
//! of the context structure for this program type.

use alloc::vec::Vec;

use crate::core::types::Reg;

/// Size of the per-program stack scratch area, in bytes.
pub const STACK_SIZE: i64 = 512;

/// Register slot holding the implicit packet-end value.
pub const DATA_END_REG: Reg = Reg(13);

/// Register slot holding the implicit packet-meta value.
pub const META_REG: Reg = Reg(14);

/// Number of register slots tracked by the machine (r0..r10 plus the
/// implicit slots).
pub const NUM_REG_SLOTS: usize = 16;

/// BPF program type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProgType {
    /// Unknown or unspecified type.
    #[default]
    Unspec,
    /// Socket filter.
    SocketFilter,
    /// XDP (express data path).
    Xdp,
    /// Traffic-control classifier.
    SchedCls,
    /// Traffic-control action.
    SchedAct,
    /// Kprobe.
    Kprobe,
    /// Tracepoint.
    Tracepoint,
    /// Cgroup socket buffer.
    CgroupSkb,
}

/// Kind of a map definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapType {
    /// Unknown kind.
    #[default]
    Unspec,
    /// Hash table.
    Hash,
    /// Array.
    Array,
    /// Program array (tail calls).
    ProgArray,
    /// Per-CPU perf event array.
    PerfEventArray,
}

/// A single map definition, identified by its index in
/// [`ProgramInfo::map_defs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MapDef {
    /// Kind of the map.
    pub map_type: MapType,
    /// Key size in bytes.
    pub key_size: u32,
    /// Value size in bytes; the extent of the map value region.
    pub value_size: u32,
}

/// Layout of the context structure for a program type.
///
/// Each field is a byte offset within the context, or -1 when the program
/// type has no such field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextDescriptor {
    /// Total size of the context structure in bytes.
    pub size: i64,
    /// Offset of the packet data pointer field.
    pub data: i64,
    /// Offset of the packet data-end pointer field.
    pub end: i64,
    /// Offset of the packet metadata pointer field.
    pub meta: i64,
}

impl Default for ContextDescriptor {
    fn default() -> Self {
        ContextDescriptor {
            size: 0,
            data: -1,
            end: -1,
            meta: -1,
        }
    }
}

impl ContextDescriptor {
    /// Descriptor for `struct sk_buff`-backed program types.
    pub fn sk_buff() -> Self {
        ContextDescriptor {
            size: 192,
            data: 76,
            end: 80,
            meta: -1,
        }
    }

    /// Descriptor for `struct xdp_md`.
    pub fn xdp() -> Self {
        ContextDescriptor {
            size: 20,
            data: 0,
            end: 4,
            meta: 8,
        }
    }

    /// Descriptor for context structures without packet access.
    pub fn opaque(size: i64) -> Self {
        ContextDescriptor {
            size,
            ..Default::default()
        }
    }
}

/// Read-only program metadata.
#[derive(Debug, Clone, Default)]
pub struct ProgramInfo {
    /// Program type.
    pub program_type: ProgType,
    /// Map definitions, in file-descriptor order.
    pub map_defs: Vec<MapDef>,
    /// Context structure layout.
    pub descriptor: ContextDescriptor,
}

impl ProgramInfo {
    /// Number of map definitions.
    pub fn nmaps(&self) -> usize {
        self.map_defs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_descriptor_has_no_packet_fields() {
        let d = ContextDescriptor::default();
        assert_eq!(d.data, -1);
        assert_eq!(d.end, -1);
        assert_eq!(d.meta, -1);
    }

    #[test]
    fn test_xdp_descriptor() {
        let d = ContextDescriptor::xdp();
        assert_eq!(d.data, 0);
        assert_eq!(d.end, 4);
        assert!(d.size > d.meta);
    }
}
