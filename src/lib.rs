//! packetmatch - High-throughput multi-pattern string matching over packet payloads
//!
//! packetmatch loads a compiled Aho-Corasick-style automaton whose states use
//! whichever of five encodings best fits their fan-out (a dense lookup table,
//! a bitmap, a short linear list, a collapsed path-compressed chain, or a
//! homogeneous simple-linear form), drives packet payloads through it one
//! byte at a time, and reports every pattern occurrence. An optional
//! rolling-hash dictionary lets a scanner recognize previously-seen payload
//! chunks and jump straight to their recorded end state instead of
//! re-scanning them.
//!
//! # Quick Start
//!
//! ```rust
//! use packetmatch::compiler::AutomatonBuilder;
//! use packetmatch::engine;
//! use packetmatch::state_table::StateTable;
//!
//! let built = AutomatonBuilder::new()
//!     .add_pattern(b"he")
//!     .add_pattern(b"she")
//!     .add_pattern(b"his")
//!     .add_pattern(b"hers")
//!     .build()?;
//! let table = StateTable::from_buffer(&built.buffer)?;
//!
//! let matches = engine::scan(&table, b"ushers")?;
//! for m in &matches {
//!     let pattern = table.pattern_bytes(m.pattern_id)?;
//!     println!("{:?} at offset {}", String::from_utf8_lossy(pattern), m.start_offset);
//! }
//! # Ok::<(), packetmatch::error::PacketMatchError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! capture file -> packet reader (pipeline)  -> per-worker FIFO queue
//!              -> scanner worker            -> [dictionary skip?]
//!              -> matching engine            -> state table
//!              -> heterogeneous state encodings -> match events
//! ```
//!
//! The automaton and pattern table are compiled externally (see
//! [`compiler`] for a reference builder used by this crate's own tests)
//! and loaded once per process; every scanner thread shares that table
//! read-only. Dictionaries and rolling-hash state, by contrast, are
//! strictly per-scanner.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::needless_lifetimes)]

/// Capture file reading: the length-delimited packet source this crate's
/// pipeline and tests use in place of a real PCAP parser.
pub mod capture;
/// Reference automaton builder — not the out-of-scope offline compiler
/// itself, but the thing this crate's tests, benches, and CLI use to
/// produce something the engine can load.
pub mod compiler;
/// Reference dictionary builder, the `PKTMDICT`-producing counterpart to
/// [`compiler`].
pub mod dict_builder;
/// Rolling hash and Bloom-fronted dictionary.
pub mod dictionary;
/// Error types for packetmatch operations.
pub mod error;
/// Matching drivers: iterative (production), recursive (reference), and
/// the root-fast-path / bounce-at-root rules they share.
pub mod engine;
/// Offset-based binary layout for automaton and dictionary files.
pub mod format;
/// Memory-mapped loading of automaton and dictionary files.
pub mod mmap;
/// Packet reader + bounded per-worker queues.
pub mod pipeline;
/// Scanner worker: drains a packet queue, drives the engine, optionally
/// consults a dictionary.
pub mod scanner;
/// Per-encoding transition logic: lookup-table, bitmap, linear,
/// path-compressed, simple-linear.
pub mod state;
/// Dense state and pattern tables backing a loaded automaton.
pub mod state_table;

pub use crate::engine::Match;
pub use crate::error::{PacketMatchError, Result};
pub use crate::scanner::{PacketMatch, Scanner, ScannerStats};
pub use crate::state_table::StateTable;

/// Library version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
