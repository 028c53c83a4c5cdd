use anyhow::{Context, Result};
use packetmatch::compiler::AutomatonBuilder;
use std::fs;
use std::path::PathBuf;

/// Build a `PKTMATCH` automaton file from a flat pattern list.
///
/// The real automaton compiler is a separate, external tool; this
/// subcommand is explicitly the crate's own reference builder
/// (`packetmatch::compiler::AutomatonBuilder`), useful for exercising
/// `match`/`inspect` against something this crate produced itself — not a
/// replacement for whatever production compiler a deployment actually uses.
pub fn cmd_build(
    input: PathBuf,
    output: PathBuf,
    simple: bool,
    no_path_compress: bool,
    verbose: bool,
) -> Result<()> {
    let text = fs::read_to_string(&input)
        .with_context(|| format!("reading pattern list {}", input.display()))?;

    let mut builder = AutomatonBuilder::new()
        .simple(simple)
        .path_compress(!no_path_compress);

    let mut pattern_count = 0usize;
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        builder = builder.add_pattern(line.as_bytes());
        pattern_count += 1;
    }
    if pattern_count == 0 {
        anyhow::bail!("{} contains no patterns", input.display());
    }

    let built = builder
        .build()
        .with_context(|| "building automaton".to_string())?;

    fs::write(&output, &built.buffer)
        .with_context(|| format!("writing {}", output.display()))?;

    if verbose {
        eprintln!(
            "[INFO] built {} patterns ({} bytes) -> {}",
            pattern_count,
            built.buffer.len(),
            output.display()
        );
    }
    Ok(())
}
