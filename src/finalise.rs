//! The source finaliser (C6): per-identity statistics and source records.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::frame::{ReferenceFrame, RunningFrame, UNASSIGNED};
use crate::geometry::{dec_to_dms, ra_to_hms};

/// One emitted source record, per identity (`spec.md` §3).
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub source: i64,
    pub name: String,
    pub wavg_ra: f64,
    pub wavg_dec: f64,
    pub wavg_uncertainty_ew: f64,
    pub wavg_uncertainty_ns: f64,
    pub avg_flux_int: f64,
    pub avg_flux_peak: f64,
    pub max_flux_peak: f64,
    pub v_int: f64,
    pub v_peak: f64,
    pub eta_int: f64,
    pub eta_peak: f64,
    pub new: bool,
    pub n_meas: usize,
    pub related: Vec<i64>,
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn coefficient_of_variation(xs: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let m = mean(xs);
    let variance = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    let v = variance.sqrt() / m;
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Weighted reduced chi-squared of a flux series relative to its weighted
/// mean (`spec.md` §4.6); 0 for a singleton.
fn eta_metric(fluxes: &[f64], errs: &[f64]) -> f64 {
    let n = fluxes.len();
    if n < 2 {
        return 0.0;
    }
    let weights: Vec<f64> = errs.iter().map(|e| 1.0 / (e * e)).collect();
    let sum_w: f64 = weights.iter().sum();
    let mean_w = sum_w / n as f64;
    let mean_wf: f64 = fluxes.iter().zip(&weights).map(|(f, w)| w * f).sum::<f64>() / n as f64;
    let mean_wf2: f64 = fluxes
        .iter()
        .zip(&weights)
        .map(|(f, w)| w * f * f)
        .sum::<f64>()
        / n as f64;
    let eta = (n as f64 / (n as f64 - 1.0)) * (mean_wf2 - mean_wf * mean_wf / mean_w);
    if eta.is_finite() {
        eta
    } else {
        0.0
    }
}

/// Finalise every live identity in `running`/`reference` into a source
/// record. `initial_epoch_images` names the images making up epoch 0; an
/// identity with no row from one of those images is marked `new`.
pub fn finalise(
    running: &RunningFrame,
    reference: &ReferenceFrame,
    initial_epoch_images: &HashSet<String>,
) -> Result<Vec<SourceRecord>, FinaliseError> {
    let mut rows_by_source: HashMap<i64, Vec<usize>> = HashMap::new();
    for (i, row) in running.rows.iter().enumerate() {
        if row.source == UNASSIGNED {
            continue;
        }
        rows_by_source.entry(row.source).or_default().push(i);
    }

    let mut records = Vec::with_capacity(reference.rows.len());
    for reference_row in &reference.rows {
        let indices = match rows_by_source.get(&reference_row.source) {
            Some(v) => v,
            None => {
                return Err(FinaliseError::OrphanIdentity(reference_row.source));
            }
        };

        let flux_int: Vec<f64> = indices.iter().map(|&i| running.rows[i].measurement.flux_int).collect();
        let flux_int_err: Vec<f64> = indices
            .iter()
            .map(|&i| running.rows[i].measurement.flux_int_err)
            .collect();
        let flux_peak: Vec<f64> = indices
            .iter()
            .map(|&i| running.rows[i].measurement.flux_peak)
            .collect();
        let flux_peak_err: Vec<f64> = indices
            .iter()
            .map(|&i| running.rows[i].measurement.flux_peak_err)
            .collect();

        // Rows duplicated onto this identity by a fork (`is_duplicate_fork`)
        // carry the winner's history for `d2d`/`dr` bookkeeping, not a
        // genuine detection of this identity at that epoch; they are
        // ignored here so a freshly forked identity can still be `new`.
        let genuine_indices: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&i| !running.rows[i].is_duplicate_fork)
            .collect();
        let new = genuine_indices
            .iter()
            .all(|&i| !initial_epoch_images.contains(&running.rows[i].measurement.image));

        let mut related: Vec<i64> = indices
            .iter()
            .flat_map(|&i| running.rows[i].related.iter().copied())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();
        related.retain(|r| *r != reference_row.source);

        records.push(SourceRecord {
            source: reference_row.source,
            name: format!(
                "src_{}{}",
                ra_to_hms(reference_row.ra_deg),
                dec_to_dms(reference_row.dec_deg)
            ),
            wavg_ra: reference_row.ra_deg,
            wavg_dec: reference_row.dec_deg,
            wavg_uncertainty_ew: reference_row.uncertainty_ew_deg,
            wavg_uncertainty_ns: reference_row.uncertainty_ns_deg,
            avg_flux_int: mean(&flux_int),
            avg_flux_peak: mean(&flux_peak),
            max_flux_peak: flux_peak.iter().cloned().fold(f64::MIN, f64::max),
            v_int: coefficient_of_variation(&flux_int),
            v_peak: coefficient_of_variation(&flux_peak),
            eta_int: eta_metric(&flux_int, &flux_int_err),
            eta_peak: eta_metric(&flux_peak, &flux_peak_err),
            new,
            n_meas: indices.len(),
            related,
        });
    }

    Ok(records)
}

#[derive(Error, Debug)]
pub enum FinaliseError {
    #[error("identity {0} is present in the reference frame but has no running-frame rows")]
    OrphanIdentity(i64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AssociationMethod, Config};
    use crate::frame::{Measurement, ReferenceRow, Row};
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

    fn measurement(id: &str, image: &str, epoch: i64, flux: f64) -> Measurement {
        Measurement {
            id: id.to_string(),
            ra_deg: 10.0,
            dec_deg: -30.0,
            uncertainty_ew_deg: 1.0 / 3600.0,
            uncertainty_ns_deg: 1.0 / 3600.0,
            flux_int: flux,
            flux_int_err: 0.1,
            flux_peak: flux,
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

    /// S1: n_meas = 2, new = false.
    #[test]
    fn test_s1_finalise() {
        let config = config();
        let mut a = Row::from_measurement(measurement("A", "img0", 0, 10.0), &config).unwrap();
        a.source = 1;
        let mut b = Row::from_measurement(measurement("B", "img1", 1, 12.0), &config).unwrap();
        b.source = 1;
        let running = RunningFrame { rows: vec![a, b] };
        let reference = ReferenceFrame {
            rows: vec![ReferenceRow {
                source: 1,
                ra_deg: 10.0,
                dec_deg: -30.0,
                uncertainty_ew_deg: 1.0 / 3600.0,
                uncertainty_ns_deg: 1.0 / 3600.0,
            }],
        };
        let initial_epoch_images: HashSet<String> = ["img0".to_string()].into_iter().collect();

        let records = finalise(&running, &reference, &initial_epoch_images).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].n_meas, 2);
        assert!(!records[0].new);
    }

    /// S6: a detection with no neighbour in earlier epochs is marked new.
    #[test]
    fn test_s6_new_source() {
        let config = config();
        let mut a = Row::from_measurement(measurement("A", "img2", 2, 10.0), &config).unwrap();
        a.source = 1;
        let running = RunningFrame { rows: vec![a] };
        let reference = ReferenceFrame {
            rows: vec![ReferenceRow {
                source: 1,
                ra_deg: 10.0,
                dec_deg: -30.0,
                uncertainty_ew_deg: 1.0 / 3600.0,
                uncertainty_ns_deg: 1.0 / 3600.0,
            }],
        };
        let initial_epoch_images: HashSet<String> = ["img0".to_string()].into_iter().collect();

        let records = finalise(&running, &reference, &initial_epoch_images).unwrap();
        assert!(records[0].new);
    }

    #[test]
    fn test_singleton_v_and_eta_are_zero() {
        let config = config();
        let mut a = Row::from_measurement(measurement("A", "img0", 0, 10.0), &config).unwrap();
        a.source = 1;
        let running = RunningFrame { rows: vec![a] };
        let reference = ReferenceFrame {
            rows: vec![ReferenceRow {
                source: 1,
                ra_deg: 10.0,
                dec_deg: -30.0,
                uncertainty_ew_deg: 1.0 / 3600.0,
                uncertainty_ns_deg: 1.0 / 3600.0,
            }],
        };
        let initial_epoch_images: HashSet<String> = ["img0".to_string()].into_iter().collect();

        let records = finalise(&running, &reference, &initial_epoch_images).unwrap();
        assert_eq!(records[0].v_int, 0.0);
        assert_eq!(records[0].eta_int, 0.0);
    }
}
