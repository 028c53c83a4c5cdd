mod commands;

use clap::{Parser, Subcommand};
use packetmatch::error::PacketMatchError;
use std::path::PathBuf;
use std::process::ExitCode;

use commands::match_cmd::OutputFormat;
use commands::{cmd_build, cmd_inspect, cmd_match};

#[derive(Parser)]
#[command(name = "packetmatch")]
#[command(
    about = "Multi-pattern string matching over packet payload streams",
    long_about = "packetmatch - high-throughput multi-pattern string matching over packet \
    payload streams, driven by a compiled Aho-Corasick-style automaton whose states use \
    whichever of five encodings best fits their fan-out, with an optional rolling-hash \
    dictionary to skip re-scanning previously-seen payload chunks.\n\n\
    Examples:\n\
      packetmatch build patterns.txt -o rules.pktm\n\
      packetmatch match rules.pktm capture.bin --threads auto\n\
      packetmatch match rules.pktm capture.bin --dict seen.pktd --dict-width 64\n\
      packetmatch inspect rules.pktm --verbose"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a capture file for pattern matches
    Match {
        /// Compiled automaton file (`PKTMATCH` format)
        #[arg(value_name = "AUTOMATON")]
        automaton: PathBuf,

        /// Capture file to scan (length-delimited records; `.gz` is
        /// auto-detected; `-` reads stdin)
        #[arg(value_name = "CAPTURE")]
        capture: PathBuf,

        /// Rolling-hash skip-scan dictionary file (`PKTMDICT` format)
        #[arg(long, value_name = "FILE")]
        dict: Option<PathBuf>,

        /// Dictionary chunk width in bytes; required with --dict
        #[arg(long, value_name = "BYTES")]
        dict_width: Option<usize>,

        /// Number of scanner worker threads (0 or omitted: auto-detect)
        #[arg(short = 'j', long, value_name = "N")]
        threads: Option<usize>,

        /// How to report matches on stdout: a running total, or one line per match
        #[arg(long, default_value = "count")]
        format: OutputFormat,

        /// Print each match to stderr as it is found (diagnostic, independent of --format)
        #[arg(short, long)]
        verbose: bool,

        /// Print throughput and diagnostic counters to stderr when done
        #[arg(long)]
        timing: bool,
    },

    /// Build a `PKTMATCH` automaton file from a flat pattern list
    Build {
        /// Input file: one pattern per line, '#' comments and blank lines skipped
        #[arg(value_name = "INPUT")]
        input: PathBuf,

        /// Output automaton file
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Force the homogeneous Simple-LE encoding for every state
        #[arg(long)]
        simple: bool,

        /// Disable path compression of single-successor chains
        #[arg(long)]
        no_path_compress: bool,

        /// Print a summary once built
        #[arg(short, long)]
        verbose: bool,
    },

    /// Inspect a `PKTMATCH` automaton file's header and state encodings
    Inspect {
        /// Automaton file to inspect
        #[arg(value_name = "AUTOMATON")]
        automaton: PathBuf,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,

        /// Show every encoding row, including zero counts
        #[arg(short, long)]
        verbose: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Match {
            automaton,
            capture,
            dict,
            dict_width,
            threads,
            format,
            verbose,
            timing,
        } => cmd_match(automaton, capture, dict, dict_width, threads, format, verbose, timing),
        Commands::Build {
            input,
            output,
            simple,
            no_path_compress,
            verbose,
        } => cmd_build(input, output, simple, no_path_compress, verbose),
        Commands::Inspect {
            automaton,
            json,
            verbose,
        } => cmd_inspect(automaton, json, verbose),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(exit_code_for(&err))
        }
    }
}

/// Map a failure to an exit code: `1` for invalid input (configuration,
/// load, or format/validation problems detected before or during loading)
/// and `2` for everything else (resource exhaustion, or any failure this
/// crate didn't anticipate well enough to classify, which is treated as
/// the more severe code).
fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<PacketMatchError>() {
        Some(PacketMatchError::Configuration(_))
        | Some(PacketMatchError::Io(_))
        | Some(PacketMatchError::Mmap(_))
        | Some(PacketMatchError::Format(_))
        | Some(PacketMatchError::Validation(_)) => 1,
        Some(PacketMatchError::Resource(_)) | Some(PacketMatchError::Other(_)) => 2,
        None => 1,
    }
}
