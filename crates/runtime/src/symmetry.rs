//! Symmetry reduction over scalarset-typed state components (§4.G,
//! §5.D, GLOSSARY "canonical form").
//!
//! A scalarset's only defined operation is equality, so any
//! permutation of its labels that is applied consistently everywhere
//! the type appears in a state produces an equivalent state for
//! exploration purposes. Canonicalization picks the lexicographically
//! least byte image reachable by any such permutation: every
//! permutation of a group's `cardinality` labels is applied to the
//! group's value slots (stored scalarset values get relabeled) and its
//! index blocks (array positions indexed by the scalarset get
//! reordered), and the smallest resulting state is kept. Distinct
//! groups are independent — their slots never overlap — so each is
//! minimized on its own and the combination is the global minimum.
//!
//! Permutations are enumerated in Heap's-algorithm order, exactly the
//! scheme this was originally generated from (see
//! `unroll-heaps-algorithm.py` in the upstream resources): small
//! cardinalities (`<= MAX_TABLED`) build their permutation table once
//! and cache it, mirroring the unrolled per-count switch a C build
//! would specialize for fixed small `n`; anything larger falls back to
//! generating permutations one at a time with the same algorithm
//! instead of paying to store `n!` of them.

use crate::state::State;
use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

/// Cardinalities at or below this use a cached, fully-materialized
/// permutation table. Above it, permutations are generated lazily by
/// the same algorithm. Scalarsets this large are rare in practice (the
/// search is factorial in `n` regardless), so this only bounds memory,
/// not correctness.
const MAX_TABLED: u32 = 6;

/// One scalarset type's symmetry information. `value_slots` are bit
/// slots that store a value of this type directly; `index_blocks` are
/// `(base_offset, element_width)` pairs for arrays indexed by this
/// type, each contributing `cardinality` consecutive element-width
/// blocks starting at `base_offset`.
pub struct ScalarsetGroup {
    pub cardinality: u32,
    pub value_slots: Vec<(u32, u32)>,
    pub index_blocks: Vec<(u32, u32)>,
}

/// Returns a new state with every group in `groups` rewritten to the
/// lexicographically smallest byte image reachable by permuting that
/// group's labels.
pub fn canonicalize(state: &State, groups: &[ScalarsetGroup]) -> State {
    let mut out = state.clone();
    for group in groups {
        out = canonicalize_group(&out, group);
    }
    out
}

fn canonicalize_group(state: &State, group: &ScalarsetGroup) -> State {
    if group.cardinality <= 1 || (group.value_slots.is_empty() && group.index_blocks.is_empty()) {
        return state.clone();
    }

    let mut best: Option<State> = None;
    for_each_permutation(group.cardinality, |perm| {
        let candidate = apply_permutation(state, group, perm);
        let is_smaller = match &best {
            None => true,
            Some(b) => candidate.as_bytes() < b.as_bytes(),
        };
        if is_smaller {
            best = Some(candidate);
        }
    });
    best.unwrap_or_else(|| state.clone())
}

/// Rewrites `state` under one permutation: value slots get their
/// stored label mapped through `perm`; index blocks get their
/// `cardinality` element-width chunks moved so the block at position
/// `i` lands at position `perm[i]`.
fn apply_permutation(state: &State, group: &ScalarsetGroup, perm: &[u32]) -> State {
    let mut out = state.clone();
    for &(offset, width) in &group.value_slots {
        let value = state.read_bits(offset, width);
        if let Some(&label) = perm.get(value as usize) {
            out.write_bits(offset, width, label as u64);
        }
        // An out-of-range value is an undefined-sentinel encoding and
        // is left untouched.
    }
    for &(base_offset, element_width) in &group.index_blocks {
        for (i, &dst) in perm.iter().enumerate() {
            let src_offset = base_offset + (i as u32) * element_width;
            let dst_offset = base_offset + dst * element_width;
            out.blit(dst_offset, state, src_offset, element_width);
        }
    }
    out
}

/// Calls `f` with every permutation of `0..n`, in Heap's-algorithm
/// order, using a cached table for `n <= MAX_TABLED` and live
/// generation otherwise.
fn for_each_permutation(n: u32, mut f: impl FnMut(&[u32])) {
    if n <= MAX_TABLED {
        let table = tabled_permutations(n);
        for perm in table.iter() {
            f(perm);
        }
    } else {
        heaps_algorithm(n, &mut f);
    }
}

type PermTable = std::sync::Arc<Vec<Vec<u32>>>;

fn tabled_permutations(n: u32) -> PermTable {
    static TABLES: OnceLock<Mutex<HashMap<u32, PermTable>>> = OnceLock::new();
    let cache = TABLES.get_or_init(|| Mutex::new(HashMap::new()));
    let mut cache = cache.lock().expect("permutation table cache poisoned");
    cache
        .entry(n)
        .or_insert_with(|| {
            let mut table = Vec::with_capacity(factorial(n));
            heaps_algorithm(n, &mut |perm: &[u32]| table.push(perm.to_vec()));
            std::sync::Arc::new(table)
        })
        .clone()
}

fn factorial(n: u32) -> usize {
    (1..=n as usize).product::<usize>().max(1)
}

/// Iterative Heap's Algorithm, matching the generator in
/// `unroll-heaps-algorithm.py`'s `heap()`: starts from the identity
/// permutation and repeatedly swaps one pair of positions to produce
/// the next, visiting every permutation of `0..n` exactly once.
fn heaps_algorithm(n: u32, f: &mut impl FnMut(&[u32])) {
    let n = n as usize;
    let mut permutation: Vec<u32> = (0..n as u32).collect();
    let mut stack = vec![0usize; n];
    f(&permutation);

    let mut i = 0;
    while i < n {
        if stack[i] < i {
            if i % 2 == 0 {
                permutation.swap(0, i);
            } else {
                permutation.swap(stack[i], i);
            }
            f(&permutation);
            stack[i] += 1;
            i = 0;
        } else {
            stack[i] = 0;
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with_values(values: &[u32], width: u32) -> State {
        let mut s = State::new(((values.len() as u32 * width).div_ceil(8)) as usize);
        for (i, v) in values.iter().enumerate() {
            s.write_bits(i as u32 * width, width, *v as u64);
        }
        s
    }

    fn value_group(cardinality: u32, slots: Vec<(u32, u32)>) -> ScalarsetGroup {
        ScalarsetGroup { cardinality, value_slots: slots, index_blocks: vec![] }
    }

    #[test]
    fn heaps_algorithm_visits_every_permutation_of_three_exactly_once() {
        let mut seen = Vec::new();
        heaps_algorithm(3, &mut |perm| seen.push(perm.to_vec()));
        assert_eq!(seen.len(), 6);
        let mut sorted = seen.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 6);
    }

    #[test]
    fn permuted_scalarset_values_canonicalize_identically() {
        let slots = vec![(0, 2), (2, 2), (4, 2)];
        let a = state_with_values(&[0, 1, 2], 2);
        let b = state_with_values(&[2, 0, 1], 2);
        let canon_a = canonicalize(&a, &[value_group(3, slots.clone())]);
        let canon_b = canonicalize(&b, &[value_group(3, slots)]);
        assert_eq!(canon_a.as_bytes(), canon_b.as_bytes());
    }

    #[test]
    fn canonical_form_is_the_lexicographically_smallest_labeling() {
        let slots = vec![(0, 2), (2, 2), (4, 2)];
        let a = state_with_values(&[2, 0, 1], 2);
        let canon = canonicalize(&a, &[value_group(3, slots)]);
        // The smallest achievable labeling for any permutation of
        // {0,1,2} walked in this fixed slot order is the identity
        // assignment 0,1,2.
        assert_eq!(canon.read_bits(0, 2), 0);
        assert_eq!(canon.read_bits(2, 2), 1);
        assert_eq!(canon.read_bits(4, 2), 2);
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let slots = vec![(0, 2), (2, 2), (4, 2)];
        let a = state_with_values(&[2, 0, 1], 2);
        let once = canonicalize(&a, &[value_group(3, slots.clone())]);
        let twice = canonicalize(&once, &[value_group(3, slots)]);
        assert_eq!(once.as_bytes(), twice.as_bytes());
    }

    #[test]
    fn distinct_groups_are_canonicalized_independently() {
        let groups = vec![value_group(2, vec![(0, 1)]), value_group(2, vec![(1, 1)])];
        let a = state_with_values(&[1, 0], 1);
        let canon = canonicalize(&a, &groups);
        assert_eq!(canon.read_bits(0, 1), 0);
        assert_eq!(canon.read_bits(1, 1), 0);
    }

    #[test]
    fn array_indexed_by_a_scalarset_is_canonicalized_by_permuting_positions() {
        // `var a: array[t] of boolean` with `t: scalarset(3)` — no
        // value slot stores a `t`, only an index block does.
        let group = ScalarsetGroup { cardinality: 3, value_slots: vec![], index_blocks: vec![(0, 1)] };
        let a = state_with_values(&[1, 0, 0], 1);
        let b = state_with_values(&[0, 1, 0], 1);
        // both are the same set ({true at one of three symmetric
        // positions}) up to relabeling the index type, so they must
        // canonicalize identically
        let canon_a = canonicalize(&a, &[group]);
        let group2 = ScalarsetGroup { cardinality: 3, value_slots: vec![], index_blocks: vec![(0, 1)] };
        let canon_b = canonicalize(&b, &[group2]);
        assert_eq!(canon_a.as_bytes(), canon_b.as_bytes());
    }

    #[test]
    fn array_with_no_true_positions_is_unaffected_by_permutation() {
        let group = ScalarsetGroup { cardinality: 3, value_slots: vec![], index_blocks: vec![(0, 1)] };
        let a = state_with_values(&[0, 0, 0], 1);
        let canon = canonicalize(&a, &[group]);
        assert_eq!(canon.as_bytes(), a.as_bytes());
    }

    #[test]
    fn a_large_cardinality_group_falls_back_to_live_generation_and_still_minimizes() {
        // MAX_TABLED is 6; 7 exercises the dynamic-fallback path.
        let slots: Vec<(u32, u32)> = (0..7).map(|i| (i * 3, 3)).collect();
        let values: Vec<u32> = vec![6, 5, 4, 3, 2, 1, 0];
        let a = state_with_values(&values, 3);
        let canon = canonicalize(&a, &[value_group(7, slots)]);
        for i in 0..7u32 {
            assert_eq!(canon.read_bits(i * 3, 3), i as u64);
        }
    }
}
