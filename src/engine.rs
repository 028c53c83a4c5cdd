//! Matching drivers.
//!
//! An iterative driver (root fast path, bounce-at-root forward-progress
//! rule, per-encoding dispatch via `crate::state::step`) and an
//! independently-written recursive equivalent kept around so property
//! tests can cross-check the two agree on every input. Both follow the
//! same hot-path shape: bounds-checked, `Result`-returning, `#[inline]`
//! on the per-byte call.

use crate::error::Result;
use crate::format::StateNode;
use crate::state;
use crate::state_table::StateTable;

/// A completed pattern match. `start_offset`/`end_offset` are byte offsets
/// into the scanned input (`end_offset - start_offset == pattern length`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub pattern_id: u32,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// Scan `input` against `table`, returning every match in the order its
/// completing byte was consumed.
///
/// This is the production driver: iterative, root-fast-pathed when the
/// table is not homogeneous Simple-LE, and guaranteed to terminate in at
/// most `2 * input.len() + 1` state transitions — the bounce-at-root
/// invariant means a non-matching byte at root consumes itself rather
/// than looping.
pub fn scan(table: &StateTable, input: &[u8]) -> Result<Vec<Match>> {
    let mut matches = Vec::new();
    let mut current = table.root();
    let mut cursor = 0usize;
    let use_fast_path = !table.is_simple();

    while cursor < input.len() {
        let byte = input[cursor];
        let transition = if use_fast_path && current.state_id == 0 {
            root_step(table, &current, byte)?
        } else {
            let raw = state::step(table_buffer(table), &current, byte, &input[cursor..])?;
            bounce_at_root(&current, raw)
        };

        if transition.is_match {
            push_matches(table, &current, &transition, cursor, &mut matches)?;
        }

        if transition.advanced {
            cursor += 1 + transition.extra_advance as usize;
        }
        current = table.get(transition.next_state_id)?;
    }

    Ok(matches)
}

/// Outcome of a single [`scan_one_step`] call: how far the cursor moved,
/// which state to resume from, and every pattern id completed by this
/// step (a step can complete more than one pattern at once, when shorter
/// patterns are suffixes of a longer one sharing the same accepting
/// state). All matches from one step end at the same
/// relative offset (`consumed` bytes past the step's start), since a step
/// is either a one-byte advance or one atomic path-compressed chain.
pub struct StepResult {
    pub next_state_id: u32,
    pub consumed: usize,
    pub matches: Vec<u32>,
}

/// Single-step driver used by `crate::scanner::Scanner` to interleave
/// dictionary skip checks between bytes: a miss or mismatched entry state
/// falls back to calling this once per byte. Semantically one
/// iteration of [`scan`]'s loop body, exposed so the caller can resync
/// `current_state_id` after a dictionary chunk skip.
pub fn scan_one_step(table: &StateTable, current_state_id: u32, remaining_input: &[u8]) -> Result<StepResult> {
    let current = table.get(current_state_id)?;
    let byte = remaining_input[0];
    let use_fast_path = !table.is_simple() && current.state_id == 0;
    let transition = if use_fast_path {
        root_step(table, &current, byte)?
    } else {
        let raw = state::step(table_buffer(table), &current, byte, remaining_input)?;
        bounce_at_root(&current, raw)
    };

    let consumed = if transition.advanced {
        1 + transition.extra_advance as usize
    } else {
        0
    };
    let matches = if transition.is_match {
        table.pattern_ids_at(&current, transition.pattern_rank)?
    } else {
        Vec::new()
    };
    Ok(StepResult {
        next_state_id: transition.next_state_id,
        consumed,
        matches,
    })
}

/// Emit every pattern that completes on `transition`, in the compiler's
/// stored group order (direct match before suffix-inherited ones).
fn push_matches(
    table: &StateTable,
    source: &StateNode,
    transition: &state::Transition,
    cursor: usize,
    matches: &mut Vec<Match>,
) -> Result<()> {
    let end_offset = cursor + 1 + transition.extra_advance as usize;
    for pattern_id in table.pattern_ids_at(source, transition.pattern_rank)? {
        let pattern_len = table.pattern_bytes(pattern_id)?.len();
        matches.push(Match {
            pattern_id,
            start_offset: end_offset - pattern_len,
            end_offset,
        });
    }
    Ok(())
}

/// Root-only fast path: resolve the target state via the precomputed
/// 256-entry first-level table rather than decoding root's own encoding,
/// while still testing root's own accept bitmap for the byte — the accept
/// check always belongs to the *source* state, not the target, so a
/// pattern table lookup always indexes through the state being left.
fn root_step(table: &StateTable, root: &StateNode, byte: u8) -> Result<state::Transition> {
    match table.first_level(byte) {
        Some(target) => {
            let is_match = root.accepts(byte);
            let pattern_rank = if is_match { root.accept_rank(byte) } else { 0 };
            Ok(state::Transition {
                next_state_id: target,
                advanced: true,
                is_match,
                pattern_rank,
                extra_advance: 0,
            })
        }
        // Bounce at root: no goto for this byte, so root transitions to
        // itself while still consuming the byte. Without this the driver
        // would stall forever on an unmatched byte.
        None => Ok(state::Transition {
            next_state_id: root.state_id,
            advanced: true,
            is_match: false,
            pattern_rank: 0,
            extra_advance: 0,
        }),
    }
}

/// Force forward progress at root regardless of which path produced
/// `transition`: a non-advancing failure at any other state means "take
/// the failure link and retry this byte" (handled by the caller via
/// `next_state_id`), but root's own failure link is root itself, so a
/// non-advancing transition there would never consume a byte. Applies
/// unconditionally — including when the root fast path is skipped
/// entirely (homogeneous Simple-LE machines) — since the bounce rule and
/// the first-level-table lookup shortcut are independent concerns.
fn bounce_at_root(current: &StateNode, transition: state::Transition) -> state::Transition {
    if current.state_id == 0 && !transition.advanced {
        state::Transition {
            next_state_id: current.state_id,
            advanced: true,
            is_match: false,
            pattern_rank: 0,
            extra_advance: 0,
        }
    } else {
        transition
    }
}

/// Recursive equivalent of [`scan`]: one stack frame per byte consumed.
/// Used by property tests to confirm
/// the iterative driver never diverges from this simpler, more obviously
/// correct (if less efficient) reference.
pub fn scan_recursive(table: &StateTable, input: &[u8]) -> Result<Vec<Match>> {
    let mut matches = Vec::new();
    recurse(table, table.root(), input, 0, &mut matches)?;
    Ok(matches)
}

fn recurse(
    table: &StateTable,
    current: StateNode,
    input: &[u8],
    cursor: usize,
    matches: &mut Vec<Match>,
) -> Result<()> {
    if cursor >= input.len() {
        return Ok(());
    }
    let byte = input[cursor];
    let use_fast_path = !table.is_simple() && current.state_id == 0;
    let transition = if use_fast_path {
        root_step(table, &current, byte)?
    } else {
        let raw = state::step(table_buffer(table), &current, byte, &input[cursor..])?;
        bounce_at_root(&current, raw)
    };

    if transition.is_match {
        push_matches(table, &current, &transition, cursor, matches)?;
    }

    let next = table.get(transition.next_state_id)?;
    let next_cursor = if transition.advanced {
        cursor + 1 + transition.extra_advance as usize
    } else {
        cursor
    };
    recurse(table, next, input, next_cursor, matches)
}

/// `StateTable` hides its buffer; `step` needs raw byte access for
/// variable-length encodings. This indirection keeps that one accessor
/// private to the engine rather than exposed on the public table API.
#[inline]
fn table_buffer<'a>(table: &StateTable<'a>) -> &'a [u8] {
    table.raw_buffer()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::AutomatonBuilder;

    fn run(patterns: &[&[u8]], input: &[u8]) -> Vec<(usize, String)> {
        let mut builder = AutomatonBuilder::new();
        for p in patterns {
            builder = builder.add_pattern(p);
        }
        let built = builder.build().unwrap();
        let table = StateTable::from_buffer(&built.buffer).unwrap();
        let matches = scan(&table, input).unwrap();
        matches
            .into_iter()
            .map(|m| {
                (
                    m.start_offset,
                    String::from_utf8(table.pattern_bytes(m.pattern_id).unwrap().to_vec()).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn scenario_he_she_his_hers_over_ushers() {
        let got = run(&[b"he", b"she", b"his", b"hers"], b"ushers");
        assert_eq!(
            got,
            vec![
                (1, "she".to_string()),
                (2, "he".to_string()),
                (2, "hers".to_string()),
            ]
        );
    }

    #[test]
    fn scenario_single_byte_pattern_repeats() {
        let got = run(&[b"a"], b"aaaa");
        assert_eq!(
            got,
            vec![
                (0, "a".to_string()),
                (1, "a".to_string()),
                (2, "a".to_string()),
                (3, "a".to_string()),
            ]
        );
    }

    #[test]
    fn scenario_bounce_at_root_with_leading_noise() {
        let got = run(&[b"abc"], b"zzzzabczz");
        assert_eq!(got, vec![(4, "abc".to_string())]);
    }

    #[test]
    fn scenario_overlapping_suffix_patterns() {
        let got = run(&[b"ab", b"bc", b"bca", b"c", b"caa", b"aa"], b"abcaa");
        assert_eq!(
            got,
            vec![
                (0, "ab".to_string()),
                (1, "bc".to_string()),
                (1, "bca".to_string()),
                (2, "c".to_string()),
                (2, "caa".to_string()),
                (3, "aa".to_string()),
            ]
        );
    }

    #[test]
    fn iterative_and_recursive_drivers_agree() {
        let mut builder = AutomatonBuilder::new();
        for p in [b"he".as_slice(), b"she", b"his", b"hers"] {
            builder = builder.add_pattern(p);
        }
        let built = builder.build().unwrap();
        let table = StateTable::from_buffer(&built.buffer).unwrap();
        let input = b"ushershishershe";
        let a = scan(&table, input).unwrap();
        let b = scan_recursive(&table, input).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn no_match_terminates() {
        let got = run(&[b"xyz"], b"aaaaaaaaaa");
        assert!(got.is_empty());
    }

    #[test]
    fn simple_machine_bounces_at_root_instead_of_hanging() {
        let built = AutomatonBuilder::new()
            .add_pattern(b"abc")
            .simple(true)
            .build()
            .unwrap();
        let table = StateTable::from_buffer(&built.buffer).unwrap();
        assert!(table.is_simple());
        let input = b"zzzzabczz";
        let matches = scan(&table, input).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].start_offset, 4);
        assert_eq!(matches[0].end_offset, 7);
    }

    #[test]
    fn simple_machine_iterative_and_recursive_drivers_agree() {
        let built = AutomatonBuilder::new()
            .add_pattern(b"he")
            .add_pattern(b"she")
            .add_pattern(b"his")
            .add_pattern(b"hers")
            .simple(true)
            .build()
            .unwrap();
        let table = StateTable::from_buffer(&built.buffer).unwrap();
        let input = b"ushershishershe";
        let a = scan(&table, input).unwrap();
        let b = scan_recursive(&table, input).unwrap();
        assert_eq!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn simple_machine_scan_one_step_bounces_at_root() {
        let built = AutomatonBuilder::new()
            .add_pattern(b"abc")
            .simple(true)
            .build()
            .unwrap();
        let table = StateTable::from_buffer(&built.buffer).unwrap();
        let input = b"zabc";
        let mut state_id = 0u32;
        let mut cursor = 0usize;
        let mut found = Vec::new();
        while cursor < input.len() {
            let step = scan_one_step(&table, state_id, &input[cursor..]).unwrap();
            assert!(step.consumed > 0, "must always make forward progress");
            found.extend(step.matches);
            state_id = step.next_state_id;
            cursor += step.consumed;
        }
        assert_eq!(found, vec![0]);
    }
}
