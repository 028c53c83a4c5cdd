//! Packet reader + bounded per-worker queues.
//!
//! A reader thread feeds one bounded `crossbeam_channel` queue per scanner
//! worker; a full queue blocks the reader, giving the pipeline natural
//! backpressure with no unbounded buffering. Worker count defaults to
//! `std::thread::available_parallelism` when not pinned by the caller.

use crate::capture::{CaptureReader, CaptureTotals, Packet};
use crate::error::Result;
use crossbeam_channel::{bounded, Receiver, Sender};
use std::path::Path;
use std::thread::JoinHandle;

/// Per-worker queue depth. Small enough that a slow scanner applies
/// backpressure to the reader quickly, large enough to absorb bursts
/// between packets.
const QUEUE_DEPTH: usize = 256;

/// One producer thread feeding `N` bounded FIFO queues, one per scanner
/// worker. Distribution is round-robin: only exactly-once delivery to
/// some queue matters, not any particular assignment, and round-robin
/// needs no per-packet state beyond a counter.
pub struct Pipeline {
    pub receivers: Vec<Receiver<(u64, Packet)>>,
    reader_handle: JoinHandle<Result<CaptureTotals>>,
}

impl Pipeline {
    /// Open `capture_path` and start the producer thread immediately,
    /// round-robining packets across `worker_count` bounded queues.
    pub fn start<P: AsRef<Path> + Send + 'static>(capture_path: P, worker_count: usize) -> Result<Self> {
        assert!(worker_count > 0, "pipeline needs at least one worker queue");
        let mut senders: Vec<Sender<(u64, Packet)>> = Vec::with_capacity(worker_count);
        let mut receivers = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let (tx, rx) = bounded(QUEUE_DEPTH);
            senders.push(tx);
            receivers.push(rx);
        }

        let reader_handle = std::thread::spawn(move || -> Result<CaptureTotals> {
            let mut reader = CaptureReader::open(capture_path)?;
            let mut totals = CaptureTotals::default();
            let mut next_packet_index = 0u64;
            let mut next_worker = 0usize;
            while let Some(packet) = reader.next_packet()? {
                totals.packet_count += 1;
                totals.payload_bytes += packet.payload.len() as u64;
                totals.with_headers_bytes += packet.with_headers_len as u64;

                // A closed receiver means that worker's thread already
                // exited (e.g. it hit an unrecoverable error); dropping
                // the packet rather than panicking keeps the other
                // workers' queues draining normally.
                let _ = senders[next_worker].send((next_packet_index, packet));
                next_packet_index += 1;
                next_worker = (next_worker + 1) % senders.len();
            }
            // Dropping `senders` here (end of closure) signals
            // end-of-input on every queue.
            Ok(totals)
        });

        Ok(Pipeline {
            receivers,
            reader_handle,
        })
    }

    /// Pick a worker count from `--threads` (`None` or `0` means
    /// auto-detect via `available_parallelism`, falling back to 4 if
    /// that cannot be determined).
    pub fn resolve_worker_count(requested: Option<usize>) -> usize {
        match requested {
            Some(0) | None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            Some(n) => n,
        }
    }

    /// Block until the producer has finished reading the capture file,
    /// returning its reported aggregates (total payload bytes and total
    /// bytes including assumed link/IP headers).
    pub fn join(self) -> Result<CaptureTotals> {
        self.reader_handle
            .join()
            .unwrap_or_else(|_| Err(crate::error::PacketMatchError::Resource(
                "capture reader thread panicked".into(),
            )))
    }
}
