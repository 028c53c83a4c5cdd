use anyhow::{Context, Result};
use packetmatch::format::EncodingTag;
use packetmatch::mmap::MappedAutomaton;
use serde_json::json;
use std::path::PathBuf;

/// `packetmatch inspect <automaton-file> [--json] [--verbose]` — a
/// read-only summary of a `PKTMATCH` file's header and per-encoding state
/// histogram, in plain text or `--json` for machine consumption.
pub fn cmd_inspect(automaton_path: PathBuf, json_output: bool, verbose: bool) -> Result<()> {
    let mapped = MappedAutomaton::open(&automaton_path)
        .with_context(|| format!("loading automaton {}", automaton_path.display()))?;
    let table = mapped.table();
    let header = table.header();

    let mut counts = [0u64; 5];
    let mut accepting_states = 0u64;
    for id in 0..table.state_count() {
        let node = table.get(id).with_context(|| format!("reading state {}", id))?;
        if let Some(tag) = EncodingTag::from_u8(node.encoding) {
            counts[tag as usize] += 1;
        }
        if node.pattern_count > 0 {
            accepting_states += 1;
        }
    }
    let labels = [
        "LinearEncoded",
        "BitmapEncoded",
        "LookupTable",
        "PathCompressed",
        "SimpleLinearEncoded",
    ];

    if json_output {
        let mut encodings = json!({});
        for (label, count) in labels.iter().zip(counts.iter()) {
            encodings[label] = json!(count);
        }
        let output = json!({
            "file": automaton_path.display().to_string(),
            "version": header.version,
            "state_count": header.state_count,
            "simple": table.is_simple(),
            "accepting_states": accepting_states,
            "encodings": encodings,
            "pattern_strings_size": header.pattern_strings_size,
            "total_size": header.total_size,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Automaton: {}", automaton_path.display());
        println!("Version:         {}", header.version);
        println!("States:          {}", header.state_count);
        println!("Accepting:       {}", accepting_states);
        println!("Simple (LE-only): {}", if table.is_simple() { "yes" } else { "no" });
        println!("Pattern pool:    {} bytes", header.pattern_strings_size);
        println!("Total size:      {} bytes", header.total_size);
        println!();
        println!("State encodings:");
        for (label, count) in labels.iter().zip(counts.iter()) {
            if *count > 0 || verbose {
                println!("  {:<20} {}", label, count);
            }
        }
    }

    Ok(())
}
