//! Reference dictionary builder.
//!
//! Like `crate::compiler`, this is a stand-in for an external offline
//! compiler step (the dictionary is produced alongside the automaton).
//! This module is the minimal builder tests, benches, and the CLI
//! `build --dict` flag need to produce a `PKTMDICT` buffer
//! `crate::dictionary::Dictionary` can load.
//!
//! Bucket table sized to keep load factor near 1.25. Bloom bits and bucket
//! placement are both keyed on the same `RollingHash` (FxHash-based) the
//! scanner probes with at lookup time; `rayon` computes that hash and the
//! stored XXH64 confirming hash over every entry in parallel before the
//! bucket chains are laid out.

use crate::dictionary::{confirming_hash, RollingHash};
use crate::error::{PacketMatchError, Result};
use crate::format::{
    DictEntryRecord, DictionaryHeader, InnerMatch, DICTIONARY_MAGIC, DICTIONARY_VERSION, NONE_ID,
};
use rayon::prelude::*;
use std::mem;

/// One dictionary entry as supplied by the caller, before layout.
pub struct DictEntrySpec {
    pub chunk: Vec<u8>,
    pub entry_state_id: u32,
    pub exit_state_id: u32,
    pub inner_matches: Vec<InnerMatch>,
}

/// Builds a `PKTMDICT` buffer from a flat entry list.
pub struct DictionaryBuilder {
    chunk_width: usize,
    entries: Vec<DictEntrySpec>,
    bloom_bits_per_entry: u32,
    bloom_hashes: u32,
}

impl DictionaryBuilder {
    pub fn new(chunk_width: usize) -> Self {
        DictionaryBuilder {
            chunk_width,
            entries: Vec::new(),
            bloom_bits_per_entry: 10,
            bloom_hashes: 4,
        }
    }

    pub fn add_entry(mut self, entry: DictEntrySpec) -> Result<Self> {
        if entry.chunk.len() != self.chunk_width {
            return Err(PacketMatchError::Configuration(format!(
                "chunk length {} does not match dictionary width {}",
                entry.chunk.len(),
                self.chunk_width
            )));
        }
        self.entries.push(entry);
        Ok(self)
    }

    pub fn build(self) -> Result<Vec<u8>> {
        if self.entries.is_empty() {
            return Err(PacketMatchError::Configuration(
                "dictionary must have at least one entry".into(),
            ));
        }

        // `confirming` (stable XXH64) is stored per entry and re-derived by
        // `Dictionary::lookup` to confirm a candidate chunk byte-for-byte.
        // Bloom/bucket placement instead must use the same FxHash-based
        // rolling-window hash the scanner actually probes with — these are
        // two different 64-bit hashes over the same bytes, and building the
        // index on one while probing with the other makes every lookup miss.
        let confirming: Vec<u64> = self
            .entries
            .par_iter()
            .map(|e| confirming_hash(&e.chunk))
            .collect();
        let placement: Vec<u64> = self
            .entries
            .par_iter()
            .map(|e| {
                RollingHash::new(self.chunk_width)
                    .init(&e.chunk)
                    .expect("add_entry enforces chunk.len() == chunk_width")
            })
            .collect();

        let bucket_count = (self.entries.len() as u32 * 2).max(1);
        let bloom_bits = (self.entries.len() as u32 * self.bloom_bits_per_entry).max(64);

        let mut buffer = vec![0u8; mem::size_of::<DictionaryHeader>()];

        let bloom_offset = buffer.len() as u32;
        let bloom_bytes = (bloom_bits as usize).div_ceil(8);
        buffer.resize(buffer.len() + bloom_bytes, 0u8);
        for &hash in &placement {
            set_bloom_bits(&mut buffer[bloom_offset as usize..], hash, self.bloom_hashes, bloom_bits);
        }

        let buckets_offset = buffer.len() as u32;
        let mut bucket_heads = vec![NONE_ID; bucket_count as usize];
        // Built in reverse so bucket chains end up in insertion order when
        // walked head-first (each new head points at the previous head).
        let mut next_in_bucket = vec![NONE_ID; self.entries.len()];
        for (idx, &hash) in placement.iter().enumerate().rev() {
            let bucket = (hash % bucket_count as u64) as usize;
            next_in_bucket[idx] = bucket_heads[bucket];
            bucket_heads[bucket] = idx as u32;
        }
        for head in &bucket_heads {
            buffer.extend_from_slice(&head.to_le_bytes());
        }

        let entries_offset = buffer.len() as u32;
        buffer.resize(
            buffer.len() + self.entries.len() * mem::size_of::<DictEntryRecord>(),
            0u8,
        );

        let chunk_bytes_offset = buffer.len() as u32;
        for e in &self.entries {
            buffer.extend_from_slice(&e.chunk);
        }

        let inner_matches_offset = buffer.len() as u32;
        let mut records = Vec::with_capacity(self.entries.len());
        for (idx, e) in self.entries.iter().enumerate() {
            let this_offset = buffer.len() as u32;
            for m in &e.inner_matches {
                write(&mut buffer, m);
            }
            records.push(DictEntryRecord {
                chunk_hash: confirming[idx],
                chunk_bytes_offset: chunk_bytes_offset + idx as u32 * self.chunk_width as u32,
                entry_state_id: e.entry_state_id,
                exit_state_id: e.exit_state_id,
                inner_matches_offset: this_offset,
                inner_match_count: e.inner_matches.len() as u32,
                next_in_bucket: next_in_bucket[idx],
                _pad: 0,
            });
        }

        for (idx, record) in records.into_iter().enumerate() {
            let offset = entries_offset as usize + idx * mem::size_of::<DictEntryRecord>();
            write_at(&mut buffer, offset, &record);
        }

        let total_size = buffer.len() as u32;
        let header = DictionaryHeader {
            magic: *DICTIONARY_MAGIC,
            version: DICTIONARY_VERSION,
            chunk_width: self.chunk_width as u32,
            entry_count: self.entries.len() as u32,
            bloom_bits,
            bloom_hashes: self.bloom_hashes,
            bloom_offset,
            buckets_offset,
            bucket_count,
            entries_offset,
            chunk_bytes_offset,
            inner_matches_offset,
            total_size,
            reserved: [0; 2],
        };
        write_at(&mut buffer, 0, &header);

        Ok(buffer)
    }
}

fn set_bloom_bits(bits: &mut [u8], hash: u64, hash_count: u32, bloom_bits: u32) {
    for i in 0..hash_count {
        let h1 = hash;
        let h2 = hash.rotate_left(32) | 1;
        let slot = (h1.wrapping_add((i as u64).wrapping_mul(h2))) % bloom_bits as u64;
        bits[(slot / 8) as usize] |= 1 << (slot % 8);
    }
}

fn write(buffer: &mut Vec<u8>, m: &InnerMatch) {
    buffer.extend_from_slice(&m.pattern_id.to_le_bytes());
    buffer.extend_from_slice(&m.inner_offset.to_le_bytes());
}

fn write_at<T: Copy>(buffer: &mut [u8], offset: usize, value: &T) {
    debug_assert!(offset + mem::size_of::<T>() <= buffer.len());
    // SAFETY: every call site writes into a region already sized to fit;
    // T is always one of this module's repr(C) POD structs.
    unsafe {
        let ptr = buffer.as_mut_ptr().add(offset) as *mut T;
        ptr.write_unaligned(*value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{Dictionary, RollingHash};

    #[test]
    fn builds_and_hits_on_exact_chunk() {
        let chunk = b"abcd".to_vec();
        let spec = DictEntrySpec {
            chunk: chunk.clone(),
            entry_state_id: 0,
            exit_state_id: 0,
            inner_matches: vec![InnerMatch {
                pattern_id: 7,
                inner_offset: 2,
            }],
        };
        let buf = DictionaryBuilder::new(4).add_entry(spec).unwrap().build().unwrap();
        let dict = Dictionary::from_buffer(&buf).unwrap();

        let mut rh = RollingHash::new(4);
        let h = rh.init(&chunk).unwrap();
        let hit = dict.lookup(h, &chunk, 0).unwrap().expect("should hit");
        assert_eq!(hit.exit_state_id, 0);
        assert_eq!(hit.inner_matches.len(), 1);
        assert_eq!(hit.inner_matches[0].pattern_id, 7);
    }

    #[test]
    fn mismatched_entry_state_is_a_miss() {
        let chunk = b"abcd".to_vec();
        let spec = DictEntrySpec {
            chunk: chunk.clone(),
            entry_state_id: 5,
            exit_state_id: 9,
            inner_matches: vec![],
        };
        let buf = DictionaryBuilder::new(4).add_entry(spec).unwrap().build().unwrap();
        let dict = Dictionary::from_buffer(&buf).unwrap();

        let mut rh = RollingHash::new(4);
        let h = rh.init(&chunk).unwrap();
        assert!(dict.lookup(h, &chunk, 0).unwrap().is_none());
        assert!(dict.lookup(h, &chunk, 5).unwrap().is_some());
    }

    #[test]
    fn every_entry_is_found_at_realistic_scale() {
        // Regression test for placing bucket/Bloom entries with one hash
        // while probing with another: at toy sizes a lucky coincidence can
        // mask the bug, so this uses enough entries that luck isn't
        // plausible (matches the scale `benches/dictionary_bench.rs` uses).
        let mut builder = DictionaryBuilder::new(8);
        let mut chunks = Vec::new();
        for i in 0..2000u32 {
            let chunk = format!("{:08}", i).into_bytes();
            chunks.push(chunk.clone());
            builder = builder
                .add_entry(DictEntrySpec {
                    chunk,
                    entry_state_id: i,
                    exit_state_id: i + 1,
                    inner_matches: vec![],
                })
                .unwrap();
        }
        let buf = builder.build().unwrap();
        let dict = Dictionary::from_buffer(&buf).unwrap();

        for (i, chunk) in chunks.iter().enumerate() {
            let mut rh = RollingHash::new(8);
            let h = rh.init(chunk).unwrap();
            let hit = dict
                .lookup(h, chunk, i as u32)
                .unwrap()
                .unwrap_or_else(|| panic!("entry {} should have hit", i));
            assert_eq!(hit.exit_state_id, i as u32 + 1);
        }
    }

    #[test]
    fn different_chunk_with_colliding_bucket_is_a_miss() {
        let chunk_a = b"aaaa".to_vec();
        let spec = DictEntrySpec {
            chunk: chunk_a.clone(),
            entry_state_id: 0,
            exit_state_id: 0,
            inner_matches: vec![],
        };
        let buf = DictionaryBuilder::new(4).add_entry(spec).unwrap().build().unwrap();
        let dict = Dictionary::from_buffer(&buf).unwrap();

        let mut rh = RollingHash::new(4);
        let h = rh.init(b"zzzz").unwrap();
        assert!(dict.lookup(h, b"zzzz", 0).unwrap().is_none());
    }
}
