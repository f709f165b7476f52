//! The advanced associator (C4): radius-bounded all-neighbours association
//! with optional de Ruiter cut and full conflict resolution.

use crate::config::{AssociationMethod, Config};
use crate::frame::{ReferenceFrame, ReferenceRow, Row, RunningFrame, UNASSIGNED};
use crate::geometry::{de_ruiter, search_around};

use super::conflict::{
    resolve_many_to_many, resolve_many_to_one, resolve_one_to_many_candidates, Candidate,
    IdentityAllocator,
};

/// Associate a new epoch's batch against the current reference frame using
/// the `advanced` or `deruiter` method (`spec.md` §4.4).
///
/// `beam_bmaj_max_deg` is the largest restoring-beam major semi-axis among
/// the images contributing `new_rows`; it is only consulted for `deruiter`.
pub fn associate_advanced(
    reference: &mut ReferenceFrame,
    running: &mut RunningFrame,
    mut new_rows: Vec<Row>,
    config: &Config,
    beam_bmaj_max_deg: f64,
) {
    let is_deruiter = config.association_method == AssociationMethod::Deruiter;
    let bw_max = if is_deruiter {
        config.association_beamwidth_limit * (beam_bmaj_max_deg * 3600.0 / 2.0)
    } else {
        config.association_radius
    };

    let reference_coords = reference.coords();
    let new_coords: Vec<_> = new_rows.iter().map(Row::radec).collect();
    let pairs = search_around(&reference_coords, &new_coords, bw_max);

    let mut candidates: Vec<Candidate> = Vec::with_capacity(pairs.len());
    for (ref_idx, new_idx, d2d) in pairs {
        let ref_row = &reference.rows[ref_idx];
        let dr = if is_deruiter {
            let new_row = &new_rows[new_idx];
            de_ruiter(
                &ref_row.radec(),
                ref_row.uncertainty_ew_deg,
                ref_row.uncertainty_ns_deg,
                &new_row.radec(),
                new_row.weight_ew.sqrt().recip(),
                new_row.weight_ns.sqrt().recip(),
            )
        } else {
            0.0
        };
        if is_deruiter && dr > config.association_de_ruiter_radius {
            continue;
        }
        candidates.push(Candidate {
            ref_source: ref_row.source,
            new_idx,
            d2d,
            dr,
        });
    }

    let candidates =
        resolve_many_to_many(candidates, |c| if is_deruiter { c.dr } else { c.d2d });

    let mut allocator = IdentityAllocator::new(running, reference);
    let (candidates, extra_related) = resolve_one_to_many_candidates(
        candidates,
        running,
        reference,
        &mut allocator,
        |c| if is_deruiter { c.dr } else { c.d2d },
    );

    let matched_new_idx: std::collections::HashSet<usize> =
        candidates.iter().map(|c| c.new_idx).collect();

    let mut final_rows = resolve_many_to_one(&candidates, &new_rows);
    for (row, c) in final_rows.iter_mut().zip(candidates.iter()) {
        if let Some(extra) = extra_related.get(&c.new_idx) {
            row.related.extend(extra.iter().copied());
        }
    }

    for (idx, row) in new_rows.into_iter().enumerate() {
        if matched_new_idx.contains(&idx) {
            continue;
        }
        let mut row = row;
        if row.source == UNASSIGNED {
            let new_source = allocator.alloc();
            row.source = new_source;
            reference.push(ReferenceRow {
                source: new_source,
                ra_deg: row.measurement.ra_deg,
                dec_deg: row.measurement.dec_deg,
                uncertainty_ew_deg: row.weight_ew.sqrt().recip(),
                uncertainty_ns_deg: row.weight_ns.sqrt().recip(),
            });
        }
        final_rows.push(row);
    }

    running.rows.extend(final_rows);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Measurement;
    use hifitime::Epoch;

    fn config(method: AssociationMethod) -> Config {
        Config {
            association_method: method,
            association_radius: 5.0,
            association_de_ruiter_radius: 5.68,
            association_beamwidth_limit: 1.5,
            astrometric_uncertainty_ra: 0.0,
            astrometric_uncertainty_dec: 0.0,
            flux_perc_error: 0.0,
            duplicate_limit: 2.5,
            min_new_source_sigma: 5.0,
        }
    }

    fn measurement(id: &str, ra: f64, dec: f64, image: &str, epoch: i64) -> Measurement {
        Measurement {
            id: id.to_string(),
            ra_deg: ra,
            dec_deg: dec,
            uncertainty_ew_deg: 0.5 / 3600.0,
            uncertainty_ns_deg: 0.5 / 3600.0,
            flux_int: 10.0,
            flux_int_err: 0.1,
            flux_peak: 10.0,
            flux_peak_err: 0.1,
            forced: false,
            has_siblings: false,
            compactness: 1.0,
            snr: 100.0,
            image: image.to_string(),
            datetime: Epoch::from_gregorian_utc_at_midnight(2024, 1, 1),
            epoch,
        }
    }

    /// S5: many-to-many — epoch 1 `{A,B}` at 4" separation; epoch 2 `{C,D}`
    /// such that all four cross-pairs are within the beamwidth window. Only
    /// the two minimum-rank pairs survive, forming two identities.
    #[test]
    fn test_s5_many_to_many() {
        let config = config(AssociationMethod::Advanced);
        let four_arcsec_deg = 4.0 / 3600.0;
        let a = Row::from_measurement(measurement("A", 10.0, -30.0, "img0", 0), &config).unwrap();
        let b = Row::from_measurement(
            measurement("B", 10.0, -30.0 + four_arcsec_deg, "img0", 0),
            &config,
        )
        .unwrap();
        let mut a_ref = a.clone();
        a_ref.source = 1;
        let mut b_ref = b.clone();
        b_ref.source = 2;
        let mut reference = ReferenceFrame::from_initial_batch(&[a_ref.clone(), b_ref.clone()]);
        // from_initial_batch assigns sources 1,2 already matching above.
        let mut running = RunningFrame::new();
        running.rows.push(a_ref);
        running.rows.push(b_ref);

        let one_arcsec_deg = 1.0 / 3600.0;
        let c = Row::from_measurement(
            measurement("C", 10.0, -30.0 + one_arcsec_deg, "img1", 1),
            &config,
        )
        .unwrap();
        let d = Row::from_measurement(
            measurement("D", 10.0, -30.0 + 3.0 * one_arcsec_deg, "img1", 1),
            &config,
        )
        .unwrap();

        associate_advanced(&mut reference, &mut running, vec![c, d], &config, 0.01);

        let c_row = running.rows.iter().find(|r| r.measurement.id == "C").unwrap();
        let d_row = running.rows.iter().find(|r| r.measurement.id == "D").unwrap();
        assert_ne!(c_row.source, d_row.source);
        assert!(c_row.source == 1 || c_row.source == 2);
        assert!(d_row.source == 1 || d_row.source == 2);
    }

    /// S4 wiring check: a `deruiter` cut at a tight `dr_limit` rejects the
    /// match and mints a new identity instead.
    #[test]
    fn test_s4_deruiter_cut_rejects() {
        let mut config = config(AssociationMethod::Deruiter);
        config.association_de_ruiter_radius = 5.68;
        let sigma_deg = (0.5 / 2.0_f64.sqrt()) / 3600.0;

        let mut a = Row::from_measurement(measurement("A", 10.0, -30.0, "img0", 0), &config)
            .unwrap();
        a.weight_ew = 1.0 / (sigma_deg * sigma_deg);
        a.weight_ns = 1.0 / (sigma_deg * sigma_deg);
        a.source = 1;
        let mut reference = ReferenceFrame::from_initial_batch(std::slice::from_ref(&a));
        reference.rows[0].uncertainty_ew_deg = sigma_deg;
        reference.rows[0].uncertainty_ns_deg = sigma_deg;
        let mut running = RunningFrame::new();
        running.rows.push(a);

        let three_arcsec_deg = 3.0 / 3600.0;
        let mut b = Row::from_measurement(
            measurement("B", 10.0, -30.0 + three_arcsec_deg, "img1", 1),
            &config,
        )
        .unwrap();
        b.weight_ew = 1.0 / (sigma_deg * sigma_deg);
        b.weight_ns = 1.0 / (sigma_deg * sigma_deg);

        associate_advanced(&mut reference, &mut running, vec![b], &config, 1.0);

        let b_row = running.rows.iter().find(|r| r.measurement.id == "B").unwrap();
        assert_ne!(b_row.source, 1);
    }
}
