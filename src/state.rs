//! Per-encoding transition logic ("State Representations").
//!
//! Each of the four on-disk node encodings (plus the homogeneous
//! simple-linear variant) gets its own function operating on the
//! fixed-size [`StateNode`] header plus a bounds-checked slice of its
//! variant-specific trailing data, dispatched on a small tag byte rather
//! than hand-unrolled byte arithmetic over an untyped blob — a sum type
//! over concrete node shapes sharing one header view.

use crate::error::{PacketMatchError, Result};
use crate::format::{
    node_flags, try_read_slice, try_read_struct, EncodingTag, LinearEdge, StateNode, NONE_ID,
};

/// Outcome of stepping one [`StateNode`] on one input byte: a next state
/// id, whether the cursor advanced, whether a match fired, and — if so —
/// the rank used to look up the matched pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// State to move to.
    pub next_state_id: u32,
    /// Did the input cursor advance? `false` means this was a failure
    /// transition (goto absent for this byte).
    pub advanced: bool,
    /// Did this transition complete a pattern?
    pub is_match: bool,
    /// Rank of the triggering byte within the *current* state's accept
    /// bitmap (valid only when `is_match`): the popcount of set bits with
    /// index strictly less than the triggering byte.
    pub pattern_rank: u32,
    /// Number of additional input bytes consumed beyond the first, for
    /// encodings (only `PathCompressed`) that can advance the cursor by
    /// more than one byte in a single step. Always 0 for the other four
    /// encodings, which are strictly one-byte-per-step.
    pub extra_advance: u32,
}

impl Transition {
    fn failure(failure_id: u32) -> Self {
        Transition {
            next_state_id: failure_id,
            advanced: false,
            is_match: false,
            pattern_rank: 0,
            extra_advance: 0,
        }
    }

    fn goto_plain(next_state_id: u32, node: &StateNode, byte: u8) -> Self {
        let is_match = node.accepts(byte);
        let pattern_rank = if is_match { node.accept_rank(byte) } else { 0 };
        Transition {
            next_state_id,
            advanced: true,
            is_match,
            pattern_rank,
            extra_advance: 0,
        }
    }
}

/// Step a [`StateNode`] on one input byte, dispatching by encoding tag.
///
/// `remaining_input` is the input slice starting at the byte about to be
/// consumed (`remaining_input[0] == byte`); it is only needed by
/// `PathCompressed`, which may look ahead along its collapsed chain.
pub fn step(
    buffer: &[u8],
    node: &StateNode,
    byte: u8,
    remaining_input: &[u8],
) -> Result<Transition> {
    let tag = EncodingTag::from_u8(node.encoding)
        .ok_or_else(|| PacketMatchError::Validation(format!("bad encoding tag {}", node.encoding)))?;
    match tag {
        EncodingTag::LookupTable => step_lookup_table(buffer, node, byte),
        EncodingTag::BitmapEncoded => step_bitmap(buffer, node, byte),
        EncodingTag::LinearEncoded | EncodingTag::SimpleLinearEncoded => {
            step_linear(buffer, node, byte)
        }
        EncodingTag::PathCompressed => step_path_compressed(buffer, node, remaining_input),
    }
}

/// **Lookup-table next.** Dense 256-entry array of `u32` next-state ids;
/// `NONE_ID` means "no goto for this byte".
fn step_lookup_table(buffer: &[u8], node: &StateNode, byte: u8) -> Result<Transition> {
    let table: &[u32] = try_read_slice(buffer, node.edges_offset as usize, 256)
        .ok_or_else(|| PacketMatchError::Validation("lookup table out of bounds".into()))?;
    let target = table[byte as usize];
    if target == NONE_ID {
        Ok(Transition::failure(node.failure_id))
    } else {
        Ok(Transition::goto_plain(target, node, byte))
    }
}

/// **Bitmap next.** 256-bit presence bitmap plus a packed next-id array
/// indexed by popcount of present bits below the queried byte.
fn step_bitmap(buffer: &[u8], node: &StateNode, byte: u8) -> Result<Transition> {
    let presence: [u64; 4] = try_read_struct(buffer, node.edges_offset as usize)
        .ok_or_else(|| PacketMatchError::Validation("bitmap presence out of bounds".into()))?;
    let present = (presence[byte as usize / 64] >> (byte as usize % 64)) & 1 != 0;
    if !present {
        return Ok(Transition::failure(node.failure_id));
    }
    let rank = presence_rank(&presence, byte);
    let packed_offset = node.edges_offset as usize + std::mem::size_of::<[u64; 4]>();
    let packed: &[u32] = try_read_slice(buffer, packed_offset, node.edge_count as usize)
        .ok_or_else(|| PacketMatchError::Validation("bitmap packed array out of bounds".into()))?;
    let target = *packed
        .get(rank as usize)
        .ok_or_else(|| PacketMatchError::Validation("bitmap rank out of range".into()))?;
    Ok(Transition::goto_plain(target, node, byte))
}

/// Rank of `b` (count of set bits with index `< b`) within a 256-bit
/// presence bitmap, using hardware popcount (`u64::count_ones`).
fn presence_rank(bitmap: &[u64; 4], b: u8) -> u32 {
    let b = b as u32;
    let mut rank = 0u32;
    for (word, bits) in bitmap.iter().enumerate() {
        let word_start = (word as u32) * 64;
        if word_start >= b {
            break;
        }
        rank += if word_start + 64 <= b {
            bits.count_ones()
        } else {
            let mask = (1u64 << (b - word_start)) - 1;
            (bits & mask).count_ones()
        };
    }
    rank
}

/// **Linear next.** Sorted `(byte, next_state_id)` list, binary search
/// (also serves `SimpleLinearEncoded`, which differs only in how the
/// engine drives it — see `crate::engine`).
fn step_linear(buffer: &[u8], node: &StateNode, byte: u8) -> Result<Transition> {
    let edges: &[LinearEdge] =
        try_read_slice(buffer, node.edges_offset as usize, node.edge_count as usize)
            .ok_or_else(|| PacketMatchError::Validation("linear edge list out of bounds".into()))?;
    match edges.binary_search_by_key(&byte, |e| e.byte) {
        Ok(i) => Ok(Transition::goto_plain(edges[i].target_id, node, byte)),
        Err(_) => Ok(Transition::failure(node.failure_id)),
    }
}

/// **Path-compressed next.** Walks the node's collapsed chain as far as
/// `remaining_input` agrees with the stored bytes.
///
/// The whole chain is consumed atomically: a full match advances the
/// cursor by the chain length and transitions to `pc_tail_id`, emitting a
/// match only if the node's own accept bit (always keyed to the chain's
/// *last* byte) is set. Any mismatch — even on the very first chain byte —
/// advances the cursor by zero and transitions via the shared
/// `failure_id`, exactly as a single-byte failure would.
fn step_path_compressed(buffer: &[u8], node: &StateNode, remaining_input: &[u8]) -> Result<Transition> {
    let chain_len = node.edge_count as usize;
    let chain: &[u8] = try_read_slice(buffer, node.edges_offset as usize, chain_len)
        .ok_or_else(|| PacketMatchError::Validation("path-compressed chain out of bounds".into()))?;

    if remaining_input.len() < chain_len || &remaining_input[..chain_len] != chain {
        return Ok(Transition::failure(node.failure_id));
    }

    let last_byte = *chain
        .last()
        .expect("compiler never emits a zero-length path-compressed chain");
    let is_match = node.accepts(last_byte);
    let pattern_rank = if is_match {
        node.accept_rank(last_byte)
    } else {
        0
    };
    Ok(Transition {
        next_state_id: node.pc_tail_id,
        advanced: true,
        is_match,
        pattern_rank,
        extra_advance: (chain_len - 1) as u32,
    })
}

/// Whether this node's header marks it as able to match at all — the
/// "accepts-any-pattern" bit.
pub fn accepts_any(node: &StateNode) -> bool {
    node.flags & node_flags::ACCEPTS_ANY != 0
}
