//! The running aggregator (C5): recomputes the per-identity weighted-mean
//! position after each epoch.

use std::collections::HashMap;

use crate::frame::{ReferenceFrame, RunningFrame, UNASSIGNED};

/// RA-wrap correction used before weighting: an RA sitting just past the
/// 0/360 boundary is shifted up a full turn so that a mean across the seam
/// doesn't average towards 180°.
fn ra_wrap(ra_deg: f64) -> f64 {
    if ra_deg <= 0.1 {
        ra_deg + 360.0
    } else {
        ra_deg
    }
}

/// Recompute every live identity's weighted-mean RA/Dec/uncertainty from the
/// running frame's rows, overwriting `reference` in place (`spec.md` §4.5).
/// Restricted to rows with `source != -1`.
pub fn aggregate(running: &RunningFrame, reference: &mut ReferenceFrame) {
    struct Accum {
        sum_interim_ew: f64,
        sum_weight_ew: f64,
        sum_dec_weight_ns: f64,
        sum_weight_ns: f64,
    }

    let mut by_source: HashMap<i64, Accum> = HashMap::new();
    for row in &running.rows {
        if row.source == UNASSIGNED {
            continue;
        }
        let acc = by_source.entry(row.source).or_insert(Accum {
            sum_interim_ew: 0.0,
            sum_weight_ew: 0.0,
            sum_dec_weight_ns: 0.0,
            sum_weight_ns: 0.0,
        });
        let ra_wrapped = ra_wrap(row.measurement.ra_deg);
        acc.sum_interim_ew += ra_wrapped * row.weight_ew;
        acc.sum_weight_ew += row.weight_ew;
        acc.sum_dec_weight_ns += row.measurement.dec_deg * row.weight_ns;
        acc.sum_weight_ns += row.weight_ns;
    }

    for (source, acc) in by_source {
        let wavg_ra = (acc.sum_interim_ew / acc.sum_weight_ew).rem_euclid(360.0);
        let wavg_dec = acc.sum_dec_weight_ns / acc.sum_weight_ns;
        let uncertainty_ew = 1.0 / acc.sum_weight_ew.sqrt();
        let uncertainty_ns = 1.0 / acc.sum_weight_ns.sqrt();

        if let Some(reference_row) = reference.get_mut(source) {
            reference_row.ra_deg = wavg_ra;
            reference_row.dec_deg = wavg_dec;
            reference_row.uncertainty_ew_deg = uncertainty_ew;
            reference_row.uncertainty_ns_deg = uncertainty_ns;
        }
    }
}
