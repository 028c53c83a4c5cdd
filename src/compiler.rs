//! Reference automaton builder.
//!
//! The real offline compiler that produces automaton and dictionary files
//! for production use is a separate, external tool. Tests, benches, and
//! the CLI `build` subcommand still need *some* way to turn a pattern
//! list into a binary this crate can load, so this module provides a
//! minimal in-process builder: classic trie construction plus a BFS
//! failure-link pass and suffix-output merging, picking among all five
//! on-disk encodings by fan-out, and optionally collapsing long
//! single-child runs into `PathCompressed` nodes.

use crate::error::{PacketMatchError, Result};
use crate::format::{
    node_flags, AutomatonHeader, EncodingTag, LinearEdge, StateNode, AUTOMATON_MAGIC,
    AUTOMATON_VERSION, HEADER_FLAG_SIMPLE, NONE_ID, PATTERN_GROUP_END,
};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::mem;

/// Below this fan-out a state is encoded `LinearEncoded` (binary-searched
/// sorted edge list); above it, `BitmapEncoded`; above
/// `DENSE_THRESHOLD`, `LookupTable`.
const SPARSE_THRESHOLD: usize = 8;
const DENSE_THRESHOLD: usize = 32;

/// Minimum run length (number of collapsed states) before the builder
/// bothers emitting a `PathCompressed` node instead of a chain of
/// ordinary single-edge `LinearEncoded` nodes. Short runs aren't worth the
/// extra node type.
const MIN_COMPRESSED_RUN: usize = 3;

struct BuilderState {
    transitions: BTreeMap<u8, u32>,
    failure: u32,
    direct_outputs: Vec<u32>,
    merged_outputs: Vec<u32>,
    depth: u32,
}

impl BuilderState {
    fn new(depth: u32) -> Self {
        BuilderState {
            transitions: BTreeMap::new(),
            failure: 0,
            direct_outputs: Vec::new(),
            merged_outputs: Vec::new(),
            depth,
        }
    }
}

/// Everything needed to serialize one state id, computed up front so the
/// write pass never has to re-derive layout decisions.
struct NodePlan {
    tag: EncodingTag,
    accept_bitmap: [u64; 4],
    /// `(byte, pattern ids)` rows in byte order, for LT/BM/LE nodes.
    pattern_rows: Vec<(u8, Vec<u32>)>,
    /// Path-compressed chain bytes plus tail state id, if this node is a
    /// compressed run head.
    compressed: Option<(Vec<u8>, u32)>,
}

/// The compiled product of an [`AutomatonBuilder`]: a ready-to-load
/// `PKTMATCH` buffer plus the original pattern bytes (handy for tests that
/// build dictionary entries against the same automaton).
pub struct BuiltAutomaton {
    pub buffer: Vec<u8>,
    pub patterns: Vec<Vec<u8>>,
}

/// Builds a `PKTMATCH` automaton buffer from a flat pattern list.
///
/// Not streaming, not incremental, and not meant to be fast — this is a
/// reference implementation of the (out-of-scope) compiler's contract,
/// only as complete as the engine's test suite and the CLI `build`
/// subcommand need.
pub struct AutomatonBuilder {
    patterns: Vec<Vec<u8>>,
    simple: bool,
    path_compress: bool,
}

impl Default for AutomatonBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AutomatonBuilder {
    pub fn new() -> Self {
        AutomatonBuilder {
            patterns: Vec::new(),
            simple: false,
            path_compress: true,
        }
    }

    pub fn add_pattern(mut self, pattern: &[u8]) -> Self {
        self.patterns.push(pattern.to_vec());
        self
    }

    /// Build a homogeneous Simple-LE machine: no root fast path,
    /// `SimpleLinearEncoded` for every state. This encoding is never
    /// mixed with the other four in one automaton.
    pub fn simple(mut self, simple: bool) -> Self {
        self.simple = simple;
        self
    }

    /// Disable automatic path compression (useful for tests that want to
    /// pin down a specific non-PC encoding for a long chain).
    pub fn path_compress(mut self, enabled: bool) -> Self {
        self.path_compress = enabled;
        self
    }

    pub fn build(self) -> Result<BuiltAutomaton> {
        if self.patterns.is_empty() {
            return Err(PacketMatchError::Configuration(
                "automaton must have at least one pattern".into(),
            ));
        }

        let mut states = vec![BuilderState::new(0)];
        for (id, pattern) in self.patterns.iter().enumerate() {
            if pattern.is_empty() {
                return Err(PacketMatchError::Configuration(
                    "empty patterns are not supported".into(),
                ));
            }
            let mut current = 0u32;
            let mut depth = 0u32;
            for &byte in pattern.iter() {
                depth += 1;
                current = match states[current as usize].transitions.get(&byte) {
                    Some(&next) => next,
                    None => {
                        let new_id = states.len() as u32;
                        states.push(BuilderState::new(depth));
                        states[current as usize].transitions.insert(byte, new_id);
                        new_id
                    }
                };
            }
            states[current as usize].direct_outputs.push(id as u32);
        }

        build_failure_links(&mut states);
        merge_outputs(&mut states);

        let run_heads = if self.path_compress && !self.simple {
            find_compressible_runs(&states)
        } else {
            BTreeMap::new()
        };
        let run_members = interior_run_members(&states, &run_heads);

        let plans = plan_nodes(&states, &run_heads, &run_members, self.simple);
        let buffer = serialize(&states, &self.patterns, &plans, &run_members, self.simple)?;
        Ok(BuiltAutomaton {
            buffer,
            patterns: self.patterns,
        })
    }
}

/// Classic Aho-Corasick BFS: depth-1 states fail to root; every other
/// state's failure link is found by walking its parent's failure chain
/// looking for a state with a transition on the same byte.
fn build_failure_links(states: &mut [BuilderState]) {
    let mut queue = VecDeque::new();
    let root_children: Vec<u32> = states[0].transitions.values().copied().collect();
    for &child in &root_children {
        states[child as usize].failure = 0;
        queue.push_back(child);
    }

    while let Some(state_id) = queue.pop_front() {
        let transitions: Vec<(u8, u32)> = states[state_id as usize]
            .transitions
            .iter()
            .map(|(&b, &s)| (b, s))
            .collect();
        for (byte, next_state) in transitions {
            queue.push_back(next_state);

            let mut fail = states[state_id as usize].failure;
            let mut found = None;
            loop {
                if let Some(&target) = states[fail as usize].transitions.get(&byte) {
                    if target != next_state {
                        found = Some(target);
                    }
                    break;
                }
                if fail == 0 {
                    break;
                }
                fail = states[fail as usize].failure;
            }
            states[next_state as usize].failure = found.unwrap_or(0);
        }
    }
}

/// Each state's merged output set is its own direct outputs plus whatever
/// its failure state carries. Because failure links strictly decrease
/// depth and we process states in non-decreasing depth order, a state's
/// failure target's `merged_outputs` is already fully resolved
/// (transitively, through its own failure chain) by the time we get here —
/// a single-level extend is sufficient and, unlike walking the whole
/// failure chain by hand, does not double-count.
fn merge_outputs(states: &mut [BuilderState]) {
    let mut order: Vec<u32> = (0..states.len() as u32).collect();
    order.sort_by_key(|&id| states[id as usize].depth);
    for id in order {
        let failure = states[id as usize].failure;
        let mut merged = states[id as usize].direct_outputs.clone();
        if id != 0 {
            merged.extend(states[failure as usize].merged_outputs.iter().copied());
        }
        states[id as usize].merged_outputs = merged;
    }
}

/// Identify maximal runs of states suitable for `PathCompressed`
/// collapsing: each non-tail member has exactly one outgoing transition,
/// no direct or inherited match, and — critically — is never the target
/// of any *other* state's failure link (collapsing would otherwise strand
/// a failure reference mid-chain). Returns a map from run-head state id to
/// `(chain bytes, tail state id)`.
fn find_compressible_runs(states: &[BuilderState]) -> BTreeMap<u32, (Vec<u8>, u32)> {
    let mut failure_targets: HashSet<u32> = HashSet::new();
    for (id, s) in states.iter().enumerate() {
        if id != 0 {
            failure_targets.insert(s.failure);
        }
    }

    let is_chainable = |id: u32| -> bool {
        id != 0
            && states[id as usize].transitions.len() == 1
            && states[id as usize].merged_outputs.is_empty()
    };
    // A chainable state that is itself the sole successor of another
    // chainable state is a mid-run member, not a valid run start.
    let mut is_mid_run = vec![false; states.len()];
    for (id, s) in states.iter().enumerate() {
        if is_chainable(id as u32) {
            let successor = *s.transitions.values().next().unwrap();
            if is_chainable(successor) {
                is_mid_run[successor as usize] = true;
            }
        }
    }

    let mut runs = BTreeMap::new();
    for id in 0..states.len() as u32 {
        if is_mid_run[id as usize] || !is_chainable(id) {
            continue;
        }
        let mut chain = Vec::new();
        let mut cur = id;
        while is_chainable(cur) && (cur == id || !failure_targets.contains(&cur)) {
            let (&byte, &next) = states[cur as usize].transitions.iter().next().unwrap();
            chain.push(byte);
            cur = next;
        }
        if chain.len() >= MIN_COMPRESSED_RUN {
            runs.insert(id, (chain, cur));
        }
    }
    runs
}

/// State ids that are interior (non-head) members of a compressed run and
/// therefore must not be serialized as their own node.
fn interior_run_members(
    states: &[BuilderState],
    run_heads: &BTreeMap<u32, (Vec<u8>, u32)>,
) -> HashSet<u32> {
    let mut members = HashSet::new();
    for (&head, (chain, _tail)) in run_heads.iter() {
        let mut cur = head;
        for _ in 0..chain.len() {
            if cur != head {
                members.insert(cur);
            }
            cur = *states[cur as usize].transitions.values().next().unwrap();
        }
    }
    members
}

fn classify(edge_count: usize, simple: bool) -> EncodingTag {
    if simple {
        return EncodingTag::SimpleLinearEncoded;
    }
    if edge_count > DENSE_THRESHOLD {
        EncodingTag::LookupTable
    } else if edge_count > SPARSE_THRESHOLD {
        EncodingTag::BitmapEncoded
    } else {
        EncodingTag::LinearEncoded
    }
}

fn plan_nodes(
    states: &[BuilderState],
    run_heads: &BTreeMap<u32, (Vec<u8>, u32)>,
    run_members: &HashSet<u32>,
    simple: bool,
) -> BTreeMap<u32, NodePlan> {
    let mut plans = BTreeMap::new();
    for (id, state) in states.iter().enumerate() {
        let id = id as u32;
        if run_members.contains(&id) {
            continue;
        }
        if let Some((chain, tail)) = run_heads.get(&id) {
            let tail_outputs = &states[*tail as usize].merged_outputs;
            let last_byte = *chain.last().expect("compressed run is never empty");
            let mut accept_bitmap = [0u64; 4];
            let mut pattern_rows = Vec::new();
            if !tail_outputs.is_empty() {
                accept_bitmap[last_byte as usize / 64] |= 1u64 << (last_byte as usize % 64);
                pattern_rows.push((last_byte, tail_outputs.clone()));
            }
            plans.insert(
                id,
                NodePlan {
                    tag: EncodingTag::PathCompressed,
                    accept_bitmap,
                    pattern_rows,
                    compressed: Some((chain.clone(), *tail)),
                },
            );
            continue;
        }

        let edges: Vec<(u8, u32)> = state.transitions.iter().map(|(&b, &s)| (b, s)).collect();
        let tag = classify(edges.len(), simple);
        let mut accept_bitmap = [0u64; 4];
        let mut pattern_rows = Vec::new();
        for &(byte, target) in &edges {
            let outs = &states[target as usize].merged_outputs;
            if !outs.is_empty() {
                accept_bitmap[byte as usize / 64] |= 1u64 << (byte as usize % 64);
                pattern_rows.push((byte, outs.clone()));
            }
        }
        pattern_rows.sort_by_key(|&(b, _)| b);
        plans.insert(
            id,
            NodePlan {
                tag,
                accept_bitmap,
                pattern_rows,
                compressed: None,
            },
        );
    }
    plans
}

fn serialize(
    states: &[BuilderState],
    patterns: &[Vec<u8>],
    plans: &BTreeMap<u32, NodePlan>,
    run_members: &HashSet<u32>,
    simple: bool,
) -> Result<Vec<u8>> {
    let mut buffer = vec![0u8; mem::size_of::<AutomatonHeader>()];

    let states_offset = buffer.len() as u32;
    buffer.resize(
        buffer.len() + states.len() * mem::size_of::<StateNode>(),
        0u8,
    );

    let pattern_strings_offset = buffer.len() as u32;
    for p in patterns {
        buffer.extend_from_slice(&(p.len() as u16).to_le_bytes());
        buffer.extend_from_slice(p);
    }
    let pattern_strings_size = buffer.len() as u32 - pattern_strings_offset;

    // Layout: for each live node, write its variable-length sections
    // (edge table / bitmap / chain bytes, then pattern row), then its
    // fixed-size StateNode header, all in one pass — every offset used by
    // the header is known the moment we reach it.
    for (id, state) in states.iter().enumerate() {
        let id = id as u32;
        if run_members.contains(&id) {
            continue;
        }
        let plan = &plans[&id];

        let (edges_offset, edge_count, pc_tail_id) = match (&plan.compressed, plan.tag) {
            (Some((chain, tail)), _) => {
                let offset = buffer.len() as u32;
                buffer.extend_from_slice(chain);
                (offset, chain.len() as u32, *tail)
            }
            (None, EncodingTag::LookupTable) => {
                let offset = buffer.len() as u32;
                let mut table = vec![NONE_ID; 256];
                for (&b, &s) in &state.transitions {
                    table[b as usize] = s;
                }
                for v in table {
                    buffer.extend_from_slice(&v.to_le_bytes());
                }
                (offset, 0, 0)
            }
            (None, EncodingTag::BitmapEncoded) => {
                let offset = buffer.len() as u32;
                let mut presence = [0u64; 4];
                for &b in state.transitions.keys() {
                    presence[b as usize / 64] |= 1u64 << (b as usize % 64);
                }
                for word in presence {
                    buffer.extend_from_slice(&word.to_le_bytes());
                }
                for &s in state.transitions.values() {
                    buffer.extend_from_slice(&s.to_le_bytes());
                }
                (offset, state.transitions.len() as u32, 0)
            }
            (None, EncodingTag::LinearEncoded) | (None, EncodingTag::SimpleLinearEncoded) => {
                let offset = buffer.len() as u32;
                for (&b, &s) in &state.transitions {
                    let edge = LinearEdge::new(b, s);
                    buffer.extend_from_slice(&edge.byte.to_le_bytes());
                    buffer.extend_from_slice(&edge._pad);
                    buffer.extend_from_slice(&edge.target_id.to_le_bytes());
                }
                (offset, state.transitions.len() as u32, 0)
            }
            (None, EncodingTag::PathCompressed) => unreachable!("handled via plan.compressed"),
        };

        let patterns_offset_and_count = if plan.pattern_rows.is_empty() {
            (0u32, 0u32)
        } else {
            let offset = buffer.len() as u32;
            let mut count = 0u32;
            for (_, outs) in &plan.pattern_rows {
                for &pid in outs {
                    buffer.extend_from_slice(&(pid as u16).to_le_bytes());
                    count += 1;
                }
                buffer.extend_from_slice(&PATTERN_GROUP_END.to_le_bytes());
                count += 1;
            }
            (offset, count)
        };

        let flags = if plan.accept_bitmap != [0u64; 4] {
            node_flags::ACCEPTS_ANY
        } else {
            0
        };
        let node = StateNode {
            state_id: id,
            failure_id: state.failure,
            encoding: plan.tag as u8,
            flags,
            _pad: 0,
            accept_bitmap: plan.accept_bitmap,
            edges_offset,
            edge_count,
            patterns_offset: patterns_offset_and_count.0,
            pattern_count: patterns_offset_and_count.1,
            pc_tail_id,
        };
        let offset = states_offset as usize + id as usize * mem::size_of::<StateNode>();
        write_node(&mut buffer, offset, &node);
    }

    let first_level_offset = buffer.len() as u32;
    let mut table = vec![NONE_ID; 256];
    for (&b, &s) in &states[0].transitions {
        table[b as usize] = s;
    }
    for v in table {
        buffer.extend_from_slice(&v.to_le_bytes());
    }

    let total_size = buffer.len() as u32;
    let header = AutomatonHeader {
        magic: *AUTOMATON_MAGIC,
        version: AUTOMATON_VERSION,
        state_count: states.len() as u32,
        states_offset,
        pattern_strings_offset,
        pattern_strings_size,
        first_level_offset,
        flags: if simple { HEADER_FLAG_SIMPLE } else { 0 },
        total_size,
        reserved: [0; 6],
    };
    write_node(&mut buffer, 0, &header);

    Ok(buffer)
}

fn write_node<T: Copy>(buffer: &mut [u8], offset: usize, value: &T) {
    debug_assert!(offset + mem::size_of::<T>() <= buffer.len());
    // SAFETY: offset + size_of::<T>() <= buffer.len() by the caller's
    // construction (every call site writes into a region already grown to
    // fit), and every T here is a repr(C) POD struct.
    unsafe {
        let ptr = buffer.as_mut_ptr().add(offset) as *mut T;
        ptr.write_unaligned(*value);
    }
}
