//! Dense state and pattern tables backing a loaded automaton.
//!
//! States live in one flat arena indexed by a dense state-id -> byte-offset
//! table, for cache locality during scanning. Pattern ids are likewise
//! stored in flat arrays indexed by rank.

use crate::error::{PacketMatchError, Result};
use crate::format::{try_read_slice, try_read_struct, AutomatonHeader, StateNode};

/// A loaded, validated automaton: header plus the backing buffer (owned
/// `Vec<u8>` or `memmap2::Mmap`, see `crate::mmap`).
pub struct StateTable<'a> {
    buffer: &'a [u8],
    header: AutomatonHeader,
}

impl<'a> StateTable<'a> {
    /// Validate the header and construct a table view over `buffer`.
    pub fn from_buffer(buffer: &'a [u8]) -> Result<Self> {
        let header: AutomatonHeader = try_read_struct(buffer, 0)
            .ok_or_else(|| PacketMatchError::Format("buffer too small for header".into()))?;
        header
            .validate()
            .map_err(PacketMatchError::Format)?;
        if header.total_size as usize > buffer.len() {
            return Err(PacketMatchError::Format(format!(
                "header claims total_size {} but buffer is {} bytes",
                header.total_size,
                buffer.len()
            )));
        }
        let table = StateTable { buffer, header };
        table.get(0)?; // root must exist and be in bounds
        Ok(table)
    }

    pub fn header(&self) -> &AutomatonHeader {
        &self.header
    }

    /// Raw backing buffer, for the engine's variable-length node decoding.
    pub(crate) fn raw_buffer(&self) -> &'a [u8] {
        self.buffer
    }

    pub fn state_count(&self) -> u32 {
        self.header.state_count
    }

    /// Whether this automaton is homogeneous Simple-LE — no root fast
    /// path (root is decoded through the same per-encoding dispatch as
    /// every other state). The bounce-at-root forward-progress rule still
    /// applies regardless; it is a property of root, not of the fast path.
    pub fn is_simple(&self) -> bool {
        self.header.flags & crate::format::HEADER_FLAG_SIMPLE != 0
    }

    /// Fetch a state by id, bounds-checked.
    #[inline]
    pub fn get(&self, id: u32) -> Result<StateNode> {
        if id >= self.header.state_count {
            return Err(PacketMatchError::Validation(format!(
                "state id {} out of range (state_count = {})",
                id, self.header.state_count
            )));
        }
        let offset =
            self.header.states_offset as usize + id as usize * std::mem::size_of::<StateNode>();
        try_read_struct(self.buffer, offset)
            .ok_or_else(|| PacketMatchError::Validation(format!("state {} out of buffer bounds", id)))
    }

    pub fn root(&self) -> StateNode {
        self.get(0).expect("root validated in from_buffer")
    }

    /// Root fast-path lookup: the 256-entry first-level table short-circuits
    /// root -> child transitions without walking the root node's own
    /// encoding. Returns `None` if this byte has no root
    /// transition (the caller stays at root, consuming one byte — the
    /// bounce-at-root rule).
    pub fn first_level(&self, byte: u8) -> Option<u32> {
        let table: &[u32] =
            try_read_slice(self.buffer, self.header.first_level_offset as usize, 256)?;
        let id = table[byte as usize];
        if id == crate::format::NONE_ID {
            None
        } else {
            Some(id)
        }
    }

    /// Resolve every pattern id completing at rank `rank` within `node`'s
    /// pattern row — the direct match plus any suffix-linked matches
    /// inherited through the failure chain, in the order the compiler
    /// stored them (direct match first). `rank` is the accept-bitmap rank
    /// (popcount of set bits strictly below the triggering byte), not a
    /// row index: the row is a sequence of `PATTERN_GROUP_END`-terminated
    /// groups, one per set bit, and this walks past `rank` of them first.
    pub fn pattern_ids_at(&self, node: &StateNode, rank: u32) -> Result<Vec<u32>> {
        if node.pattern_count == 0 {
            return Err(PacketMatchError::Validation("node has no pattern row".into()));
        }
        let row: &[u16] = try_read_slice(
            self.buffer,
            node.patterns_offset as usize,
            node.pattern_count as usize,
        )
        .ok_or_else(|| PacketMatchError::Validation("pattern row out of bounds".into()))?;

        let mut group = 0u32;
        let mut i = 0usize;
        while group < rank {
            if i >= row.len() {
                return Err(PacketMatchError::Validation(format!(
                    "pattern rank {} not present in row",
                    rank
                )));
            }
            if row[i] == crate::format::PATTERN_GROUP_END {
                group += 1;
            }
            i += 1;
        }
        let mut ids = Vec::new();
        while i < row.len() && row[i] != crate::format::PATTERN_GROUP_END {
            ids.push(node.pattern_id(row[i]));
            i += 1;
        }
        if ids.is_empty() {
            return Err(PacketMatchError::Validation(format!(
                "pattern rank {} resolved to an empty group",
                rank
            )));
        }
        Ok(ids)
    }

    /// Look up a pattern's original bytes in the string pool by id. Ids are
    /// assigned in insertion order by the compiler; the pool stores
    /// length-prefixed (`u16` length + bytes) entries back to back.
    pub fn pattern_bytes(&self, pattern_id: u32) -> Result<&'a [u8]> {
        let pool_start = self.header.pattern_strings_offset as usize;
        let pool_end = pool_start + self.header.pattern_strings_size as usize;
        let pool = self
            .buffer
            .get(pool_start..pool_end)
            .ok_or_else(|| PacketMatchError::Format("pattern string pool out of bounds".into()))?;

        let mut cursor = 0usize;
        let mut id = 0u32;
        while cursor + 2 <= pool.len() {
            let len = u16::from_le_bytes([pool[cursor], pool[cursor + 1]]) as usize;
            cursor += 2;
            let bytes = pool
                .get(cursor..cursor + len)
                .ok_or_else(|| PacketMatchError::Format("pattern string pool truncated".into()))?;
            if id == pattern_id {
                return Ok(bytes);
            }
            cursor += len;
            id += 1;
        }
        Err(PacketMatchError::Validation(format!(
            "pattern id {} not found in string pool",
            pattern_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::AutomatonBuilder;

    #[test]
    fn loads_and_resolves_root() {
        let built = AutomatonBuilder::new()
            .add_pattern(b"he")
            .add_pattern(b"she")
            .build()
            .unwrap();
        let table = StateTable::from_buffer(&built.buffer).unwrap();
        assert!(table.state_count() >= 2);
        let root = table.root();
        assert_eq!(root.state_id, 0);
        assert_eq!(root.failure_id, 0);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = vec![0u8; 64];
        buf[0..8].copy_from_slice(b"NOTRIGHT");
        assert!(StateTable::from_buffer(&buf).is_err());
    }
}
