use anyhow::{Context, Result};
use packetmatch::dictionary::Dictionary;
use packetmatch::mmap::{MappedAutomaton, MappedDictionary};
use packetmatch::pipeline::Pipeline;
use packetmatch::scanner::{Scanner, ScannerStats};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// `--format` choices for reporting matches to stdout: a running total
/// only, or one line per match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Count,
    Verbose,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "count" => Ok(OutputFormat::Count),
            "verbose" => Ok(OutputFormat::Verbose),
            other => Err(format!("unknown --format {:?} (expected count or verbose)", other)),
        }
    }
}

/// `packetmatch match <automaton> <capture> [--dict ...] [--dict-width N]
/// [--threads N] [--format count|verbose] [--verbose] [--timing]`.
/// One producer thread (`packetmatch::pipeline::Pipeline`) feeds `N`
/// scanner threads, each an independent `Scanner` over the shared,
/// read-only mapped automaton.
#[allow(clippy::too_many_arguments)]
pub fn cmd_match(
    automaton_path: PathBuf,
    capture_path: PathBuf,
    dict_path: Option<PathBuf>,
    dict_width: Option<usize>,
    threads: Option<usize>,
    format: OutputFormat,
    verbose: bool,
    timing: bool,
) -> Result<()> {
    let automaton = MappedAutomaton::open(&automaton_path)
        .with_context(|| format!("loading automaton {}", automaton_path.display()))?;

    let dictionary = match &dict_path {
        Some(path) => {
            if dict_width.is_none() {
                anyhow::bail!("--dict requires --dict-width");
            }
            Some(
                MappedDictionary::open(path)
                    .with_context(|| format!("loading dictionary {}", path.display()))?,
            )
        }
        None => None,
    };
    let dictionary_view: Option<Dictionary> = dictionary.as_ref().map(|d| d.dictionary());

    let worker_count = Pipeline::resolve_worker_count(threads).max(1);
    let table = automaton.table();

    let start = Instant::now();
    let pipeline = Pipeline::start(capture_path.clone(), worker_count)
        .with_context(|| format!("opening capture file {}", capture_path.display()))?;

    let mut total_stats = ScannerStats::default();
    let match_count = AtomicU64::new(0);

    std::thread::scope(|scope| -> Result<()> {
        let mut handles = Vec::with_capacity(worker_count);
        for receiver in pipeline.receivers.iter() {
            let table = &table;
            let dictionary_view = dictionary_view.as_ref();
            let match_count = &match_count;
            handles.push(scope.spawn(move || -> Result<ScannerStats> {
                let mut scanner = Scanner::new(table, dictionary_view, verbose)
                    .context("configuring scanner")?;
                scanner
                    .run(receiver, |m| {
                        match_count.fetch_add(1, Ordering::Relaxed);
                        if format == OutputFormat::Verbose {
                            println!(
                                "packet={} offset={} pattern={}",
                                m.packet_index, m.start_offset, m.pattern_id
                            );
                        }
                    })
                    .context("scanning packets")?;
                Ok(scanner.stats())
            }));
        }

        for handle in handles {
            let stats = handle.join().expect("scanner thread panicked")?;
            total_stats.merge(&stats);
        }
        Ok(())
    })?;

    if format == OutputFormat::Count {
        println!("{}", match_count.load(Ordering::Relaxed));
    }

    let totals = pipeline
        .join()
        .map_err(|e| anyhow::anyhow!("reading capture file: {}", e))?;

    if timing {
        let elapsed = start.elapsed();
        let mbps = if elapsed.as_secs_f64() > 0.0 {
            (totals.with_headers_bytes as f64 / 1_000_000.0) / elapsed.as_secs_f64()
        } else {
            0.0
        };
        eprintln!(
            "[TIMING] {} packets, {} payload bytes, {} with-headers bytes in {:.3}s ({:.2} MB/s)",
            totals.packet_count,
            totals.payload_bytes,
            totals.with_headers_bytes,
            elapsed.as_secs_f64(),
            mbps
        );
        eprintln!(
            "[STATS] {} matches across {} packets ({} bytes scanned); dictionary: {} hits, {} skipped bytes, {} bloom negatives",
            total_stats.matches_found,
            total_stats.packets_scanned,
            total_stats.bytes_scanned,
            total_stats.dictionary_hits,
            total_stats.dictionary_skipped_bytes,
            total_stats.dictionary_bloom_negatives,
        );
    }

    Ok(())
}
