//! Property-based tests covering forward progress, encoding equivalence,
//! and dictionary transparency.

use packetmatch::compiler::AutomatonBuilder;
use packetmatch::dict_builder::{DictEntrySpec, DictionaryBuilder};
use packetmatch::dictionary::Dictionary;
use packetmatch::engine;
use packetmatch::format::InnerMatch;
use packetmatch::state_table::StateTable;
use proptest::prelude::*;
use std::collections::BTreeSet;

fn patterns_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(prop::collection::vec(b'a'..=b'c', 1..5), 1..6)
}

fn input_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(b'a'..=b'c', 0..40)
}

fn match_set(table: &StateTable, input: &[u8]) -> BTreeSet<(usize, u32)> {
    engine::scan(table, input)
        .unwrap()
        .into_iter()
        .map(|m| (m.start_offset, m.pattern_id))
        .collect()
}

proptest! {
    /// The iterative driver never takes more than `2L + 1`
    /// state transitions for an input of length `L`. We
    /// can't observe the transition count directly from `engine::scan`'s
    /// public surface, so this test exercises the weaker but directly
    /// checkable consequence: the driver always terminates (no infinite
    /// loop / stack overflow) and never reports a match extending past
    /// the end of the input.
    #[test]
    fn forward_progress_terminates_and_matches_stay_in_bounds(
        patterns in patterns_strategy(),
        input in input_strategy(),
    ) {
        let mut builder = AutomatonBuilder::new();
        for p in &patterns {
            builder = builder.add_pattern(p);
        }
        let built = builder.build().unwrap();
        let table = StateTable::from_buffer(&built.buffer).unwrap();
        let matches = engine::scan(&table, &input).unwrap();
        for m in &matches {
            prop_assert!(m.end_offset <= input.len());
            prop_assert!(m.start_offset < m.end_offset);
        }
    }

    /// Invariant 4: encoding equivalence. The same pattern set, compiled
    /// with path compression on vs. off (two different subsets of the
    /// five encodings in play), must produce identical `(offset,
    /// pattern_id)` match sets for any input.
    #[test]
    fn encoding_equivalence_across_path_compression(
        patterns in patterns_strategy(),
        input in input_strategy(),
    ) {
        let mut compressed = AutomatonBuilder::new().path_compress(true);
        let mut uncompressed = AutomatonBuilder::new().path_compress(false);
        for p in &patterns {
            compressed = compressed.add_pattern(p);
            uncompressed = uncompressed.add_pattern(p);
        }
        let compressed = compressed.build().unwrap();
        let uncompressed = uncompressed.build().unwrap();
        let compressed_table = StateTable::from_buffer(&compressed.buffer).unwrap();
        let uncompressed_table = StateTable::from_buffer(&uncompressed.buffer).unwrap();

        prop_assert_eq!(
            match_set(&compressed_table, &input),
            match_set(&uncompressed_table, &input)
        );
    }

    /// Invariant 5: dictionary transparency. A dictionary entry whose
    /// recorded entry/exit states and inner matches are actually
    /// consistent with the machine must not change what a scanner reports
    /// for an input containing that chunk, regardless of what surrounds it.
    #[test]
    fn dictionary_transparency_for_a_consistent_entry(
        prefix in prop::collection::vec(b'x'..=b'z', 0..6),
        suffix in prop::collection::vec(b'x'..=b'z', 0..6),
    ) {
        use crossbeam_channel::unbounded;
        use packetmatch::capture::Packet;
        use packetmatch::scanner::Scanner;

        let built = AutomatonBuilder::new().add_pattern(b"bc").build().unwrap();
        let table = StateTable::from_buffer(&built.buffer).unwrap();

        let dict_buf = DictionaryBuilder::new(4)
            .add_entry(DictEntrySpec {
                chunk: b"abcd".to_vec(),
                entry_state_id: 0,
                exit_state_id: 0,
                inner_matches: vec![InnerMatch { pattern_id: 0, inner_offset: 3 }],
            })
            .unwrap()
            .build()
            .unwrap();
        let dict = Dictionary::from_buffer(&dict_buf).unwrap();

        let mut input = prefix.clone();
        input.extend_from_slice(b"abcd");
        input.extend_from_slice(&suffix);

        let run = |dictionary: Option<&Dictionary>| -> BTreeSet<(usize, u32)> {
            let mut scanner = Scanner::new(&table, dictionary, false).unwrap();
            let (tx, rx) = unbounded();
            tx.send((0u64, Packet { payload: input.clone(), with_headers_len: 0 }))
                .unwrap();
            drop(tx);
            let mut found = BTreeSet::new();
            scanner
                .run(&rx, |m| {
                    found.insert((m.start_offset, m.pattern_id));
                })
                .unwrap();
            found
        };

        prop_assert_eq!(run(None), run(Some(&dict)));
    }
}
