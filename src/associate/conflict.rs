//! Conflict resolution shared between the basic (C3) and advanced (C4)
//! associators: one-to-many, many-to-many and many-to-one resolution,
//! identity forking with full history duplication, and `related` updates.

use crate::frame::{ReferenceFrame, ReferenceRow, Row, RunningFrame};

/// Mints fresh, dense identities continuing from the current maximum across
/// both frames.
pub struct IdentityAllocator {
    next: i64,
}

impl IdentityAllocator {
    pub fn new(running: &RunningFrame, reference: &ReferenceFrame) -> Self {
        let next = running.max_source().max(reference.max_source()) + 1;
        Self { next }
    }

    pub fn alloc(&mut self) -> i64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Fork `old_source` into `new_source`: duplicate every historical running
/// frame row bearing `old_source` under `new_source`, add the relation to
/// both sides, and seed a reference row for the new identity from the old
/// one (the next aggregator pass will recompute it properly).
pub fn fork_identity(
    running: &mut RunningFrame,
    reference: &mut ReferenceFrame,
    old_source: i64,
    new_source: i64,
) {
    let historical: Vec<Row> = running
        .rows
        .iter()
        .filter(|r| r.source == old_source)
        .cloned()
        .collect();
    for mut row in historical {
        row.source = new_source;
        row.related.insert(old_source);
        row.is_duplicate_fork = true;
        running.rows.push(row);
    }
    for row in running.rows.iter_mut().filter(|r| r.source == old_source) {
        row.related.insert(new_source);
    }
    if let Some(old_ref) = reference.get(old_source).cloned() {
        reference.push(ReferenceRow {
            source: new_source,
            ..old_ref
        });
    }
}

/// Resolve one-to-many conflicts: group `rows` (not yet appended to
/// `running`) by their currently assigned `source`, keep the row minimizing
/// `rank_of` per group, and fork the rest onto fresh identities.
///
/// Used identically by C3 (ranked by `d2d`) and C4 (ranked by `d2d` or
/// `dr` depending on method).
pub fn resolve_one_to_many(
    rows: &mut [Row],
    running: &mut RunningFrame,
    reference: &mut ReferenceFrame,
    allocator: &mut IdentityAllocator,
    rank_of: impl Fn(&Row) -> f64,
) {
    let mut by_source: std::collections::HashMap<i64, Vec<usize>> = std::collections::HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        if row.source >= 1 {
            by_source.entry(row.source).or_default().push(i);
        }
    }
    for (old_source, mut indices) in by_source {
        if indices.len() < 2 {
            continue;
        }
        indices.sort_by(|&a, &b| rank_of(&rows[a]).partial_cmp(&rank_of(&rows[b])).unwrap());
        let winner = indices[0];
        for &loser in &indices[1..] {
            let new_source = allocator.alloc();
            fork_identity(running, reference, old_source, new_source);
            rows[loser].source = new_source;
            rows[loser].related.insert(old_source);
            rows[winner].related.insert(new_source);
        }
    }
}

/// A candidate match between a reference identity and a new-batch row,
/// produced by an all-neighbours search (C4 step 1-2).
#[derive(Debug, Clone, Copy)]
pub struct Candidate {
    pub ref_source: i64,
    pub new_idx: usize,
    pub d2d: f64,
    pub dr: f64,
}

/// C4 step 3: drop all but the minimum-rank pair within each new-index group
/// that is many-to-many (both its new-index and its reference identity are
/// each claimed by more than one candidate pair).
pub fn resolve_many_to_many(
    mut candidates: Vec<Candidate>,
    rank_of: impl Fn(&Candidate) -> f64,
) -> Vec<Candidate> {
    use std::collections::HashMap;

    let mut by_new: HashMap<usize, usize> = HashMap::new();
    let mut by_ref: HashMap<i64, usize> = HashMap::new();
    for c in &candidates {
        *by_new.entry(c.new_idx).or_default() += 1;
        *by_ref.entry(c.ref_source).or_default() += 1;
    }

    let mut many_to_many_groups: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, c) in candidates.iter().enumerate() {
        if by_new[&c.new_idx] > 1 && by_ref[&c.ref_source] > 1 {
            many_to_many_groups.entry(c.new_idx).or_default().push(i);
        }
    }

    let mut drop = vec![false; candidates.len()];
    for (_, idxs) in many_to_many_groups {
        let winner = *idxs
            .iter()
            .min_by(|&&a, &&b| {
                rank_of(&candidates[a])
                    .partial_cmp(&rank_of(&candidates[b]))
                    .unwrap()
            })
            .unwrap();
        for i in idxs {
            if i != winner {
                drop[i] = true;
            }
        }
    }

    let mut kept = Vec::with_capacity(candidates.len());
    for (i, c) in candidates.drain(..).enumerate() {
        if !drop[i] {
            kept.push(c);
        }
    }
    kept
}

/// C4 step 4: if the remaining pair set lists the same reference identity
/// against >= 2 distinct new rows, keep the minimum-rank pair at the
/// original identity and fork the others onto fresh identities, mirroring
/// the `related` updates and historical duplication of `resolve_one_to_many`.
///
/// Returns the updated candidates (losers' `ref_source` replaced by their
/// fork) plus, per new-index, the extra `related` entries the eventual row
/// must carry (the winner/loser relation, which a `Candidate` has nowhere
/// else to live until the final row is materialised).
pub fn resolve_one_to_many_candidates(
    mut candidates: Vec<Candidate>,
    running: &mut RunningFrame,
    reference: &mut ReferenceFrame,
    allocator: &mut IdentityAllocator,
    rank_of: impl Fn(&Candidate) -> f64,
) -> (Vec<Candidate>, std::collections::HashMap<usize, Vec<i64>>) {
    use std::collections::HashMap;

    let mut extra_related: HashMap<usize, Vec<i64>> = HashMap::new();

    let mut by_ref: HashMap<i64, Vec<usize>> = HashMap::new();
    for (i, c) in candidates.iter().enumerate() {
        by_ref.entry(c.ref_source).or_default().push(i);
    }

    for (old_source, mut idxs) in by_ref {
        let distinct_new: std::collections::HashSet<usize> =
            idxs.iter().map(|&i| candidates[i].new_idx).collect();
        if distinct_new.len() < 2 {
            continue;
        }
        idxs.sort_by(|&a, &b| {
            rank_of(&candidates[a])
                .partial_cmp(&rank_of(&candidates[b]))
                .unwrap()
        });
        let winner = idxs[0];
        let winner_new_idx = candidates[winner].new_idx;
        for &loser in &idxs[1..] {
            let new_source = allocator.alloc();
            fork_identity(running, reference, old_source, new_source);
            let loser_new_idx = candidates[loser].new_idx;
            candidates[loser].ref_source = new_source;
            extra_related.entry(loser_new_idx).or_default().push(old_source);
            extra_related.entry(winner_new_idx).or_default().push(new_source);
        }
    }

    (candidates, extra_related)
}

/// C4 step 5: for every new-index matched by more than one surviving
/// identity (many-to-one), duplicate the new row across each matching
/// identity and have their `related` sets absorb each other. No identity is
/// minted.
///
/// Returns, per surviving candidate (in input order), the duplicated row to
/// append to the running frame.
pub fn resolve_many_to_one(candidates: &[Candidate], new_rows: &[Row]) -> Vec<Row> {
    use std::collections::HashMap;

    let mut by_new: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, c) in candidates.iter().enumerate() {
        by_new.entry(c.new_idx).or_default().push(i);
    }

    let mut out = Vec::with_capacity(candidates.len());
    for (i, c) in candidates.iter().enumerate() {
        let siblings = &by_new[&c.new_idx];
        let mut row = new_rows[c.new_idx].clone();
        row.source = c.ref_source;
        row.d2d = c.d2d;
        row.dr = c.dr;
        for &sibling_i in siblings {
            if sibling_i != i {
                row.related.insert(candidates[sibling_i].ref_source);
            }
        }
        out.push(row);
    }
    out
}
