//! Capture file reading.
//!
//! A minimal stand-in for a real packet capture parser: a length-delimited
//! record reader, not a PCAP/PCAPNG parser, covering any sequential source
//! of byte payloads rather than a specific link-layer format.
//!
//! Gzip files are auto-detected by a `.gz` extension check and decoded
//! transparently via `flate2::GzDecoder`.

use crate::error::{PacketMatchError, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Buffer size for capture file reading.
const BUFFER_SIZE: usize = 128 * 1024;

/// One packet payload plus a "with-headers" size used solely for
/// throughput reporting (payload length is implicit in `payload.len()`).
#[derive(Debug, Clone)]
pub struct Packet {
    pub payload: Vec<u8>,
    pub with_headers_len: usize,
}

/// Fixed overhead this reader assumes per record for throughput display,
/// standing in for the link/IP/transport headers a real PCAP parser would
/// report.
const ASSUMED_HEADER_BYTES: usize = 54; // Ethernet + IPv4 + TCP, the common case

/// A single producer over one capture file: each record is
/// `[u32 length little-endian][payload bytes]`.
pub struct CaptureReader {
    reader: Box<dyn Read + Send>,
}

/// Aggregates the reader accumulates across the whole file: total payload
/// bytes and total bytes including assumed link/IP headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct CaptureTotals {
    pub payload_bytes: u64,
    pub with_headers_bytes: u64,
    pub packet_count: u64,
}

impl CaptureReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.to_str() == Some("-") {
            return Ok(CaptureReader {
                reader: Box::new(BufReader::with_capacity(BUFFER_SIZE, io::stdin())),
            });
        }
        let file = File::open(path)
            .map_err(|e| PacketMatchError::Io(format!("opening {}: {}", path.display(), e)))?;
        let is_gzip = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("gz"))
            .unwrap_or(false);
        let reader: Box<dyn Read + Send> = if is_gzip {
            Box::new(BufReader::with_capacity(BUFFER_SIZE, GzDecoder::new(file)))
        } else {
            Box::new(BufReader::with_capacity(BUFFER_SIZE, file))
        };
        Ok(CaptureReader { reader })
    }

    /// Read the next packet, or `None` at clean end-of-file.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        let mut len_buf = [0u8; 4];
        match self.reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(PacketMatchError::Format(format!("reading length: {}", e))),
        }
        let len = u32::from_le_bytes(len_buf) as usize;
        let mut payload = vec![0u8; len];
        self.reader
            .read_exact(&mut payload)
            .map_err(|e| PacketMatchError::Format(format!("reading payload ({} bytes): {}", len, e)))?;
        Ok(Some(Packet {
            with_headers_len: payload.len() + ASSUMED_HEADER_BYTES,
            payload,
        }))
    }
}
