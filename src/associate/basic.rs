//! The basic associator (C3): nearest-neighbour association under a fixed
//! angular radius.

use crate::frame::{ReferenceFrame, ReferenceRow, Row, RunningFrame, UNASSIGNED};
use crate::geometry::match_nearest;

use super::conflict::{resolve_one_to_many, IdentityAllocator};

/// Associate a new epoch's batch against the current reference frame,
/// mutating `running` and `reference` in place (`spec.md` §4.3).
pub fn associate_basic(
    reference: &mut ReferenceFrame,
    running: &mut RunningFrame,
    mut new_rows: Vec<Row>,
    radius_arcsec: f64,
) {
    let reference_coords = reference.coords();
    let new_coords: Vec<_> = new_rows.iter().map(Row::radec).collect();
    let matches = match_nearest(&reference_coords, &new_coords);

    for (row, m) in new_rows.iter_mut().zip(matches) {
        if let Some((ref_idx, d2d)) = m {
            if d2d <= radius_arcsec {
                row.source = reference.rows[ref_idx].source;
                row.d2d = d2d;
            }
        }
    }

    let mut allocator = IdentityAllocator::new(running, reference);
    resolve_one_to_many(&mut new_rows, running, reference, &mut allocator, |r| r.d2d);

    for row in new_rows.iter_mut() {
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
    }

    running.rows.extend(new_rows);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AssociationMethod, Config};
    use crate::frame::Measurement;
    use hifitime::Epoch;

    fn config() -> Config {
        Config {
            association_method: AssociationMethod::Basic,
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
            uncertainty_ew_deg: 1.0 / 3600.0,
            uncertainty_ns_deg: 1.0 / 3600.0,
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

    /// S1: two epochs, one measurement each at the same position, radius 5" →
    /// one source.
    #[test]
    fn test_s1_single_match() {
        let config = config();
        let epoch0 = Row::from_measurement(measurement("A", 10.0, -30.0, "img0", 0), &config)
            .unwrap();
        let mut running = RunningFrame::new();
        let mut reference = ReferenceFrame::from_initial_batch(std::slice::from_ref(&{
            let mut r = epoch0.clone();
            r.source = 1;
            r
        }));
        {
            let mut r = epoch0;
            r.source = 1;
            running.rows.push(r);
        }

        let epoch1 =
            Row::from_measurement(measurement("B", 10.0, -30.0, "img1", 1), &config).unwrap();
        associate_basic(&mut reference, &mut running, vec![epoch1], 5.0);

        assert_eq!(running.rows.len(), 2);
        assert_eq!(running.rows[0].source, running.rows[1].source);
        assert_eq!(reference.rows.len(), 1);
    }

    /// S2: one-to-many — B keeps A's identity, C forks with a new identity.
    #[test]
    fn test_s2_one_to_many() {
        let config = config();
        let a = Row::from_measurement(measurement("A", 10.0, -30.0, "img0", 0), &config).unwrap();
        let mut initial = a.clone();
        initial.source = 1;
        let mut reference = ReferenceFrame::from_initial_batch(std::slice::from_ref(&initial));
        let mut running = RunningFrame::new();
        running.rows.push(initial);

        let b =
            Row::from_measurement(measurement("B", 10.0001, -30.0, "img1", 1), &config).unwrap();
        let c =
            Row::from_measurement(measurement("C", 10.0002, -30.0, "img1", 1), &config).unwrap();
        associate_basic(&mut reference, &mut running, vec![b, c], 5.0);

        let b_row = running.rows.iter().find(|r| r.measurement.id == "B").unwrap();
        let c_row = running.rows.iter().find(|r| r.measurement.id == "C").unwrap();
        assert_eq!(b_row.source, 1);
        assert_ne!(c_row.source, 1);
        assert!(b_row.related.contains(&c_row.source));
        assert!(c_row.related.contains(&1));
    }

    /// S3: RA wrap, single identity across the 0/360 boundary.
    #[test]
    fn test_s3_ra_wrap() {
        let config = config();
        let a =
            Row::from_measurement(measurement("A", 359.9999, 0.0, "img0", 0), &config).unwrap();
        let mut initial = a.clone();
        initial.source = 1;
        let mut reference = ReferenceFrame::from_initial_batch(std::slice::from_ref(&initial));
        let mut running = RunningFrame::new();
        running.rows.push(initial);

        let b = Row::from_measurement(measurement("B", 0.0001, 0.0, "img1", 1), &config).unwrap();
        associate_basic(&mut reference, &mut running, vec![b], 5.0);

        assert_eq!(running.rows[0].source, running.rows[1].source);
    }
}
