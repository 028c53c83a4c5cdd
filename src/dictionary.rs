//! Rolling hash + Bloom-fronted dictionary.
//!
//! Two distinct hashers, each picked for its own job: `rustc_hash::FxHasher`
//! drives the rolling window that gates the Bloom filter (fast, in-memory,
//! not required to be stable across builds), while `xxhash_rust::xxh64` is
//! the confirming hash recorded in `crate::format::DictEntryRecord::chunk_hash`
//! and re-derived at lookup time for the `memcmp`-equivalent verification
//! needed before trusting a bucket hit.

use crate::error::{PacketMatchError, Result};
use crate::format::{
    try_read_slice, try_read_struct, DictEntryRecord, DictionaryHeader, InnerMatch,
    DICTIONARY_MAGIC, DICTIONARY_VERSION, NONE_ID,
};
use std::mem;

/// A fixed-window rolling hash over dictionary chunk width `W`.
///
/// Not a true polynomial rolling hash (no O(1) `roll`) — chunk width `W`
/// is small enough in practice (tens to low hundreds of bytes) that
/// `FxHasher` over the whole window is not the bottleneck Bloom-filter
/// gating is protecting against. `roll` still exposes an incremental
/// `roll` contract for future callers who might swap in a true polynomial
/// hash without touching `Scanner`/`Dictionary` call sites.
pub struct RollingHash {
    width: usize,
    window: Vec<u8>,
}

impl RollingHash {
    pub fn new(width: usize) -> Self {
        RollingHash {
            width,
            window: Vec::with_capacity(width),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Reset to an empty window.
    pub fn reset(&mut self) {
        self.window.clear();
    }

    /// Initialize the window from the first `width` bytes of `data`.
    /// Returns `None` if fewer than `width` bytes are available.
    pub fn init(&mut self, data: &[u8]) -> Option<u64> {
        if data.len() < self.width {
            return None;
        }
        self.window.clear();
        self.window.extend_from_slice(&data[..self.width]);
        Some(self.current_hash())
    }

    /// Slide the window forward by one byte: drop `c_out` (must equal the
    /// window's current first byte — checked only in debug builds, since
    /// callers always pass the byte this window itself reported), push
    /// `c_in`.
    pub fn roll(&mut self, c_out: u8, c_in: u8) -> u64 {
        debug_assert_eq!(self.window.first().copied(), Some(c_out));
        self.window.remove(0);
        self.window.push(c_in);
        self.current_hash()
    }

    fn current_hash(&self) -> u64 {
        use rustc_hash::FxHasher;
        use std::hash::Hasher;
        let mut hasher = FxHasher::default();
        hasher.write(&self.window);
        hasher.finish()
    }

    pub fn window(&self) -> &[u8] {
        &self.window
    }
}

/// Confirming hash stored in a dictionary entry — stable across builds
/// and platforms, unlike `FxHasher` (whose exact output is an
/// implementation detail of the in-memory data structure it gates).
pub fn confirming_hash(chunk: &[u8]) -> u64 {
    xxhash_rust::xxh64::xxh64(chunk, 0)
}

/// A loaded, validated dictionary: Bloom filter + bucket chains over a
/// `PKTMDICT` buffer.
pub struct Dictionary<'a> {
    buffer: &'a [u8],
    header: DictionaryHeader,
}

/// Outcome of a dictionary lookup that the scanner can act on.
pub struct SkipHit<'a> {
    /// State to resume scanning from, after skipping the chunk.
    pub exit_state_id: u32,
    /// Matches that fire strictly inside the skipped chunk, already
    /// resolved to pattern ids and chunk-relative end offsets.
    pub inner_matches: &'a [InnerMatch],
}

impl<'a> Dictionary<'a> {
    pub fn from_buffer(buffer: &'a [u8]) -> Result<Self> {
        let header: DictionaryHeader = try_read_struct(buffer, 0)
            .ok_or_else(|| PacketMatchError::Format("buffer too small for dictionary header".into()))?;
        header.validate().map_err(PacketMatchError::Format)?;
        if header.total_size as usize > buffer.len() {
            return Err(PacketMatchError::Format(format!(
                "dictionary header claims total_size {} but buffer is {} bytes",
                header.total_size,
                buffer.len()
            )));
        }
        Ok(Dictionary { buffer, header })
    }

    pub fn chunk_width(&self) -> usize {
        self.header.chunk_width as usize
    }

    /// Bloom-test a rolling hash; `true` means "maybe present", `false`
    /// means "definitely absent". A Bloom filter of
    /// `bloom_bits` bits / `bloom_hashes` hash functions, each derived
    /// from the rolling hash by a distinct odd multiplier (double
    /// hashing), matching the construction `crate::dict_builder` uses.
    fn bloom_maybe_present(&self, rolling_hash: u64) -> Result<bool> {
        if self.header.bloom_bits == 0 {
            return Ok(true); // no Bloom filter fitted: always probe
        }
        let bits: &[u8] = try_read_slice(
            self.buffer,
            self.header.bloom_offset as usize,
            (self.header.bloom_bits as usize).div_ceil(8),
        )
        .ok_or_else(|| PacketMatchError::Format("bloom filter out of bounds".into()))?;
        for i in 0..self.header.bloom_hashes {
            let h = bloom_slot(rolling_hash, i, self.header.bloom_bits);
            if bits[(h / 8) as usize] & (1 << (h % 8)) == 0 {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Full lookup: Bloom-test, then probe the bucket chain and `memcmp`
    /// candidate chunk bytes, then check the recorded entry state against
    /// the scanner's current state. Returns
    /// `None` on a miss, a mismatched entry state, or a Bloom negative —
    /// dictionary membership is always advisory; it is always safe for a
    /// caller to ignore a hit and fall back to a byte-by-byte scan.
    pub fn lookup(
        &self,
        rolling_hash: u64,
        chunk: &[u8],
        current_state_id: u32,
    ) -> Result<Option<SkipHit<'a>>> {
        if !self.bloom_maybe_present(rolling_hash)? {
            return Ok(None);
        }
        if self.header.bucket_count == 0 {
            return Ok(None);
        }
        let bucket = (rolling_hash % self.header.bucket_count as u64) as usize;
        let buckets: &[u32] =
            try_read_slice(self.buffer, self.header.buckets_offset as usize, self.header.bucket_count as usize)
                .ok_or_else(|| PacketMatchError::Format("bucket table out of bounds".into()))?;

        let confirm = confirming_hash(chunk);
        let mut entry_idx = buckets[bucket];
        while entry_idx != NONE_ID {
            let entry: DictEntryRecord = try_read_struct(
                self.buffer,
                self.header.entries_offset as usize
                    + entry_idx as usize * mem::size_of::<DictEntryRecord>(),
            )
            .ok_or_else(|| PacketMatchError::Format("dictionary entry out of bounds".into()))?;

            if entry.chunk_hash == confirm {
                let stored: &[u8] = try_read_slice(
                    self.buffer,
                    entry.chunk_bytes_offset as usize,
                    self.header.chunk_width as usize,
                )
                .ok_or_else(|| PacketMatchError::Format("chunk bytes out of bounds".into()))?;
                if stored == chunk && entry.entry_state_id == current_state_id {
                    let inner_matches: &[InnerMatch] = try_read_slice(
                        self.buffer,
                        entry.inner_matches_offset as usize,
                        entry.inner_match_count as usize,
                    )
                    .ok_or_else(|| PacketMatchError::Format("inner match records out of bounds".into()))?;
                    return Ok(Some(SkipHit {
                        exit_state_id: entry.exit_state_id,
                        inner_matches,
                    }));
                }
            }
            entry_idx = entry.next_in_bucket;
        }
        Ok(None)
    }
}

/// Derive Bloom filter bit index `i` (of `hash_count`) from a 64-bit
/// rolling hash via double hashing (`h1 + i*h2`), the standard technique
/// for deriving many hash functions from one strong hash without `k`
/// independent hashers.
fn bloom_slot(hash: u64, i: u32, bloom_bits: u32) -> u64 {
    let h1 = hash;
    let h2 = hash.rotate_left(32) | 1; // force odd so it's coprime to any power-of-two bit count
    (h1.wrapping_add((i as u64).wrapping_mul(h2))) % bloom_bits as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_hash_matches_fresh_window_after_roll() {
        let data = b"abcdefgh";
        let mut a = RollingHash::new(4);
        let h0 = a.init(data).unwrap();

        let mut b = RollingHash::new(4);
        let h_fresh = b.init(&data[1..5]).unwrap();

        let h_rolled = a.roll(data[0], data[4]);
        assert_eq!(h_rolled, h_fresh);
        assert_ne!(h0, h_rolled);
    }

    #[test]
    fn init_rejects_short_input() {
        let mut h = RollingHash::new(8);
        assert!(h.init(b"short").is_none());
    }

    #[test]
    fn confirming_hash_is_stable() {
        assert_eq!(confirming_hash(b"abcd"), confirming_hash(b"abcd"));
        assert_ne!(confirming_hash(b"abcd"), confirming_hash(b"abce"));
    }
}
