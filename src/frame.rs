//! The measurement frame (C2): typed, row-oriented holders of per-image
//! measurements with derived weights and the `source`/`related`/`d2d`/`dr`
//! columns the associators mutate.

use hifitime::Epoch;
use indexmap::IndexSet;
use thiserror::Error;

use crate::{
    config::Config,
    geometry::{search_around, RADec},
};

/// Sentinel identity meaning "unassigned".
pub const UNASSIGNED: i64 = -1;

/// A single point-source detection in one image. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Stable external key.
    pub id: String,
    pub ra_deg: f64,
    pub dec_deg: f64,
    /// EW (RA-direction) positional uncertainty, degrees, as reported by the
    /// fitter (before the astrometric term and flux-error floor are folded
    /// in by [`Row::from_measurement`]).
    pub uncertainty_ew_deg: f64,
    pub uncertainty_ns_deg: f64,
    pub flux_int: f64,
    pub flux_int_err: f64,
    pub flux_peak: f64,
    pub flux_peak_err: f64,
    pub forced: bool,
    pub has_siblings: bool,
    pub compactness: f64,
    pub snr: f64,
    pub image: String,
    pub datetime: Epoch,
    pub epoch: i64,
}

impl Measurement {
    pub fn radec(&self) -> RADec {
        RADec::new_degrees(self.ra_deg, self.dec_deg)
    }
}

/// One row of a running frame: a measurement plus the columns the
/// associators and aggregator maintain.
#[derive(Debug, Clone)]
pub struct Row {
    pub measurement: Measurement,
    /// Identity, `>= 1`, or [`UNASSIGNED`].
    pub source: i64,
    /// Peer identities arising from conflict resolution.
    pub related: IndexSet<i64>,
    /// Angular separation to the reference row at match time, arcsec.
    pub d2d: f64,
    /// De Ruiter distance at match time, or 0 if not computed.
    pub dr: f64,
    /// `1 / uncertainty_ew^2`, uncertainty in degrees.
    pub weight_ew: f64,
    /// `1 / uncertainty_ns^2`, uncertainty in degrees.
    pub weight_ns: f64,
    /// `ra_deg * weight_ew`.
    pub interim_ew: f64,
    /// `dec_deg * weight_ns`.
    pub interim_ns: f64,
    /// Set on the copies [`crate::associate::conflict::fork_identity`] makes
    /// when duplicating a winner's history onto a fork. The finaliser (C6)
    /// excludes these from the `new` determination: a fork's inherited past
    /// is bookkeeping for `d2d`/`dr` consistency, not a genuine detection at
    /// that epoch.
    pub is_duplicate_fork: bool,
}

impl Row {
    /// Build a fresh row from a measurement, folding the astrometric
    /// uncertainty and the `FLUX_PERC_ERROR` floor into the EW/NS
    /// uncertainties used for weighting.
    pub fn from_measurement(m: Measurement, config: &Config) -> Result<Self, InputError> {
        if !m.ra_deg.is_finite() || !m.dec_deg.is_finite() {
            return Err(InputError::NonFiniteCoordinate {
                id: m.id.clone(),
                ra: m.ra_deg,
                dec: m.dec_deg,
            });
        }

        let flux_floor_ew = config.flux_perc_error * m.flux_int.abs();
        let uncertainty_ew = m
            .uncertainty_ew_deg
            .max(flux_floor_ew)
            .hypot(config.astrometric_uncertainty_ra / 3600.0);
        let uncertainty_ns = m
            .uncertainty_ns_deg
            .max(flux_floor_ew)
            .hypot(config.astrometric_uncertainty_dec / 3600.0);

        let weight_ew = 1.0 / (uncertainty_ew * uncertainty_ew);
        let weight_ns = 1.0 / (uncertainty_ns * uncertainty_ns);
        let ra_deg = m.ra_deg;
        let dec_deg = m.dec_deg;

        Ok(Self {
            measurement: m,
            source: UNASSIGNED,
            related: IndexSet::new(),
            d2d: 0.0,
            dr: 0.0,
            weight_ew,
            weight_ns,
            interim_ew: ra_deg * weight_ew,
            interim_ns: dec_deg * weight_ns,
            is_duplicate_fork: false,
        })
    }

    /// The original, never-mutated RA/Dec this row's measurement reported
    /// (`ra_source`/`dec_source` in `spec.md` §4.5). Since `measurement` is
    /// itself never mutated after construction, these are simply its own
    /// fields; no separate columns are kept.
    pub fn ra_source(&self) -> f64 {
        self.measurement.ra_deg
    }

    pub fn dec_source(&self) -> f64 {
        self.measurement.dec_deg
    }

    pub fn radec(&self) -> RADec {
        self.measurement.radec()
    }
}

/// One row per currently live identity: the running weighted mean and its
/// uncertainty. Grows monotonically as new identities are minted.
#[derive(Debug, Clone)]
pub struct ReferenceRow {
    pub source: i64,
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub uncertainty_ew_deg: f64,
    pub uncertainty_ns_deg: f64,
}

impl ReferenceRow {
    pub fn radec(&self) -> RADec {
        RADec::new_degrees(self.ra_deg, self.dec_deg)
    }
}

/// An ordered sequence of measurement rows for one sky-region group,
/// accumulated across epochs.
#[derive(Debug, Clone, Default)]
pub struct RunningFrame {
    pub rows: Vec<Row>,
}

impl RunningFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_source(&self) -> i64 {
        self.rows.iter().map(|r| r.source).max().unwrap_or(0)
    }

    /// Coordinates of every row, in row order.
    pub fn coords(&self) -> Vec<RADec> {
        self.rows.iter().map(Row::radec).collect()
    }

    /// Indices (into `rows`) of rows belonging to the given image.
    pub fn rows_for_image<'a>(&'a self, image: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.rows
            .iter()
            .enumerate()
            .filter(move |(_, r)| r.measurement.image == image)
            .map(|(i, _)| i)
    }
}

/// One row per currently live identity.
#[derive(Debug, Clone, Default)]
pub struct ReferenceFrame {
    pub rows: Vec<ReferenceRow>,
}

impl ReferenceFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the initial reference frame for a group: a copy of the first
    /// epoch's batch with identities assigned `1..=N`.
    pub fn from_initial_batch(rows: &[Row]) -> Self {
        let reference_rows = rows
            .iter()
            .enumerate()
            .map(|(i, row)| ReferenceRow {
                source: (i + 1) as i64,
                ra_deg: row.measurement.ra_deg,
                dec_deg: row.measurement.dec_deg,
                uncertainty_ew_deg: row.weight_ew.sqrt().recip(),
                uncertainty_ns_deg: row.weight_ns.sqrt().recip(),
            })
            .collect();
        Self { rows: reference_rows }
    }

    pub fn coords(&self) -> Vec<RADec> {
        self.rows.iter().map(ReferenceRow::radec).collect()
    }

    pub fn max_source(&self) -> i64 {
        self.rows.iter().map(|r| r.source).max().unwrap_or(0)
    }

    pub fn get(&self, source: i64) -> Option<&ReferenceRow> {
        self.rows.iter().find(|r| r.source == source)
    }

    pub fn get_mut(&mut self, source: i64) -> Option<&mut ReferenceRow> {
        self.rows.iter_mut().find(|r| r.source == source)
    }

    pub fn push(&mut self, row: ReferenceRow) {
        self.rows.push(row);
    }
}

/// Prune within-batch near-coincident rows (`DUPLICATE_LIMIT`), keeping the
/// first occurrence of each coincident cluster.
pub fn deduplicate(mut rows: Vec<Row>, duplicate_limit_arcsec: f64) -> Vec<Row> {
    if rows.is_empty() || duplicate_limit_arcsec <= 0.0 {
        return rows;
    }
    let coords = rows.iter().map(Row::radec).collect::<Vec<_>>();
    let pairs = search_around(&coords, &coords, duplicate_limit_arcsec);
    let mut drop = vec![false; rows.len()];
    for (i, j, _) in pairs {
        if i < j && !drop[i] {
            drop[j] = true;
        }
    }
    let mut kept = Vec::with_capacity(rows.len());
    for (idx, row) in rows.drain(..).enumerate() {
        if !drop[idx] {
            kept.push(row);
        }
    }
    kept
}

#[derive(Error, Debug)]
pub enum InputError {
    #[error("measurement {id} has non-finite coordinates (ra={ra}, dec={dec})")]
    NonFiniteCoordinate { id: String, ra: f64, dec: f64 },

    #[error("measurement table is missing required column {0}")]
    MissingColumn(String),
}
