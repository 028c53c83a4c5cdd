//! Scanner worker: drains a packet queue, drives the matching engine, and
//! optionally consults a dictionary to skip re-scanning.
//!
//! Each worker owns its mutable state (current automaton cursor, rolling
//! hash, accumulated stats) and runs a loop draining its channel, merging
//! its stats into the caller's total once the channel closes.

use crate::capture::Packet;
use crate::dictionary::{Dictionary, RollingHash};
use crate::engine::{self, Match};
use crate::error::Result;
use crate::state_table::StateTable;
use crossbeam_channel::Receiver;

/// Per-scanner diagnostic counters — diagnostics only, never consulted by
/// matching semantics — merged by the caller once every worker thread
/// has joined.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScannerStats {
    pub packets_scanned: u64,
    pub bytes_scanned: u64,
    pub matches_found: u64,
    pub dictionary_skipped_bytes: u64,
    pub dictionary_hits: u64,
    pub dictionary_bloom_negatives: u64,
}

impl ScannerStats {
    pub fn merge(&mut self, other: &ScannerStats) {
        self.packets_scanned += other.packets_scanned;
        self.bytes_scanned += other.bytes_scanned;
        self.matches_found += other.matches_found;
        self.dictionary_skipped_bytes += other.dictionary_skipped_bytes;
        self.dictionary_hits += other.dictionary_hits;
        self.dictionary_bloom_negatives += other.dictionary_bloom_negatives;
    }
}

/// One reported match, tagged with the packet it came from so callers
/// driving multiple scanners can reconstruct the full
/// `(packet_index, offset, pattern)` multiset regardless of how packets
/// were distributed across workers.
#[derive(Debug, Clone)]
pub struct PacketMatch {
    pub packet_index: u64,
    pub pattern_id: u32,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// A scanner worker: owns a reference to the shared immutable automaton,
/// an optional per-scanner dictionary, and its own rolling-hash state.
/// Dictionaries and rolling-hash state are never shared across scanners —
/// each worker keeps its own so no locking is needed on the hot path.
pub struct Scanner<'a> {
    table: &'a StateTable<'a>,
    dictionary: Option<&'a Dictionary<'a>>,
    rolling_hash: Option<RollingHash>,
    stats: ScannerStats,
    verbose: bool,
}

impl<'a> Scanner<'a> {
    /// Construct a scanner. Dictionary use is restricted to table-encoded
    /// (i.e. non-Simple) machines; this is a configuration error, not a
    /// load error, since it is a flag-compatibility problem detectable
    /// before any scanning starts.
    pub fn new(
        table: &'a StateTable<'a>,
        dictionary: Option<&'a Dictionary<'a>>,
        verbose: bool,
    ) -> Result<Self> {
        if dictionary.is_some() && table.is_simple() {
            return Err(crate::error::PacketMatchError::Configuration(
                "dictionary skipping is only compatible with table-encoded machines, not a \
                 homogeneous Simple-LE automaton"
                    .into(),
            ));
        }
        let rolling_hash = dictionary.map(|d| RollingHash::new(d.chunk_width()));
        Ok(Scanner {
            table,
            dictionary,
            rolling_hash,
            stats: ScannerStats::default(),
            verbose,
        })
    }

    pub fn stats(&self) -> ScannerStats {
        self.stats
    }

    /// Run until `queue` is drained and closed (the producer dropping its
    /// sender signals end-of-input). There is no separate `free` step —
    /// Rust's ownership model drops the scanner when it goes out of scope.
    ///
    /// `on_match` is called for every reported match, in discovery order
    /// within each packet.
    pub fn run(
        &mut self,
        queue: &Receiver<(u64, Packet)>,
        mut on_match: impl FnMut(PacketMatch),
    ) -> Result<()> {
        while let Ok((packet_index, packet)) = queue.recv() {
            self.scan_packet(packet_index, &packet.payload, &mut on_match)?;
        }
        Ok(())
    }

    /// Scan one packet end-to-end: reset rolling hash and matching state
    /// to root, interleave dictionary skip checks, release the buffer on
    /// completion.
    fn scan_packet(
        &mut self,
        packet_index: u64,
        payload: &[u8],
        on_match: &mut impl FnMut(PacketMatch),
    ) -> Result<()> {
        self.stats.packets_scanned += 1;
        self.stats.bytes_scanned += payload.len() as u64;

        if let (Some(dict), Some(rolling_hash)) = (self.dictionary, self.rolling_hash.as_mut()) {
            rolling_hash.reset();
            self.scan_with_dictionary(packet_index, payload, dict, on_match)?;
        } else {
            let matches = engine::scan(self.table, payload)?;
            self.emit(packet_index, matches, on_match);
        }
        Ok(())
    }

    /// Dictionary-aware scan: walk the payload, checking for a
    /// chunk-width lookahead hit every byte. On a hit, skip the chunk and
    /// jump to its recorded exit state; on a miss, fall back to a plain
    /// one-byte `engine` step. Produces exactly the matches a
    /// dictionary-free scan would, because a hit is only trusted when the
    /// recorded entry state equals the scanner's actual current state.
    fn scan_with_dictionary(
        &mut self,
        packet_index: u64,
        payload: &[u8],
        dict: &Dictionary,
        on_match: &mut impl FnMut(PacketMatch),
    ) -> Result<()> {
        let width = dict.chunk_width();
        let mut cursor = 0usize;
        let mut current_state = 0u32;
        // Cursor the rolling hash's window currently covers, so we know
        // whether a one-byte `roll` is valid or a fresh `init` is needed
        // (a dictionary skip or a path-compressed multi-byte step both
        // move the cursor by more than one, invalidating an incremental
        // roll).
        let mut window_at: Option<usize> = None;

        while cursor < payload.len() {
            // Dictionary lookahead happens once per distinct cursor
            // position, using whatever state scanning this byte would
            // start from — not once per failure hop taken while
            // resolving it.
            if payload.len() - cursor >= width {
                let chunk = &payload[cursor..cursor + width];
                let rolling_hash = self.rolling_hash.as_mut().unwrap();
                let hash = match window_at {
                    Some(prev) if prev + 1 == cursor => {
                        rolling_hash.roll(payload[prev], payload[cursor + width - 1])
                    }
                    _ => rolling_hash.init(chunk).unwrap(),
                };
                window_at = Some(cursor);

                if let Some(hit) = dict.lookup(hash, chunk, current_state)? {
                    self.stats.dictionary_hits += 1;
                    self.stats.dictionary_skipped_bytes += width as u64;
                    for inner in hit.inner_matches {
                        let pattern_len = self.table.pattern_bytes(inner.pattern_id)?.len();
                        let end_offset = cursor + inner.inner_offset as usize;
                        self.stats.matches_found += 1;
                        if self.verbose {
                            self.log_match(inner.pattern_id)?;
                        }
                        on_match(PacketMatch {
                            packet_index,
                            pattern_id: inner.pattern_id,
                            start_offset: end_offset - pattern_len,
                            end_offset,
                        });
                    }
                    current_state = hit.exit_state_id;
                    cursor += width;
                    window_at = None; // next window starts fresh after the jump
                    continue;
                }
                self.stats.dictionary_bloom_negatives += 1;
            }

            // No skip: consume exactly this byte, taking as many failure
            // hops as the engine needs, without re-checking the
            // dictionary for each hop.
            loop {
                let step = engine::scan_one_step(self.table, current_state, &payload[cursor..])?;
                current_state = step.next_state_id;
                for pattern_id in &step.matches {
                    let pattern_len = self.table.pattern_bytes(*pattern_id)?.len();
                    let end_offset = cursor + step.consumed;
                    self.stats.matches_found += 1;
                    if self.verbose {
                        self.log_match(*pattern_id)?;
                    }
                    on_match(PacketMatch {
                        packet_index,
                        pattern_id: *pattern_id,
                        start_offset: end_offset - pattern_len,
                        end_offset,
                    });
                }
                if step.consumed > 0 {
                    cursor += step.consumed;
                    if step.consumed > 1 {
                        window_at = None; // multi-byte (path-compressed) jump
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    fn emit(&mut self, packet_index: u64, matches: Vec<Match>, on_match: &mut impl FnMut(PacketMatch)) {
        for m in matches {
            self.stats.matches_found += 1;
            if self.verbose {
                let _ = self.log_match(m.pattern_id);
            }
            on_match(PacketMatch {
                packet_index,
                pattern_id: m.pattern_id,
                start_offset: m.start_offset,
                end_offset: m.end_offset,
            });
        }
    }

    /// `--verbose` match line. This crate has no tracing/log dependency
    /// (see DESIGN.md), so verbose output goes straight to stderr.
    fn log_match(&self, pattern_id: u32) -> Result<()> {
        let bytes = self.table.pattern_bytes(pattern_id)?;
        eprintln!("[MATCH] {}", String::from_utf8_lossy(bytes));
        Ok(())
    }
}
