//! `search_around` and `match_nearest`: the two spatial primitives the
//! associators are built on.
//!
//! Correctness only requires that declared-in-range pairs have true
//! great-circle separation within the radius (`spec.md` §4.1); we get there
//! with a coarse equal-angle grid over RA/Dec (a cheap stand-in for a
//! k-d/ball tree) that prunes the candidate set before the exact haversine
//! check decides membership.
//!
//! Dec cells are equal-angle, but RA cells of a fixed degree width cover a
//! shrinking great-circle arc as `|dec| -> 90`: near the poles a raw-RA
//! window of a few tenths of a degree can correspond to many arcseconds of
//! true angular extent. The candidate lookup therefore widens its RA
//! neighbourhood by `1/cos(dec)` so the search stays exact at any
//! declination instead of being correct only away from the poles.

use std::collections::HashMap;

use super::radec::RADec;

/// Degrees per grid cell. Chosen so that association radii of a few tens of
/// arcsec to a few arcmin fall comfortably inside a handful of neighbouring
/// cells; callers working at much coarser radii still get correct (if less
/// efficient) results because we always check the full latitude-scaled RA
/// neighbourhood.
const CELL_SIZE_DEG: f64 = 0.25;

fn cell_of(p: &RADec) -> (i64, i64) {
    let ra_deg = p.ra_degrees().rem_euclid(360.0);
    let dec_deg = p.dec_degrees();
    (
        (ra_deg / CELL_SIZE_DEG).floor() as i64,
        (dec_deg / CELL_SIZE_DEG).floor() as i64,
    )
}

struct Grid<'a> {
    points: &'a [RADec],
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl<'a> Grid<'a> {
    fn build(points: &'a [RADec]) -> Self {
        let mut cells: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (i, p) in points.iter().enumerate() {
            cells.entry(cell_of(p)).or_default().push(i);
        }
        Self { points, cells }
    }

    /// Indices of all points whose cell is within one cell (in dec) and a
    /// `1/cos(dec)`-widened window (in RA) of `p`'s cell, including RA
    /// wrap-around at the 0/360 boundary.
    ///
    /// The RA half-width grows as `p` approaches the pole so that the fixed
    /// `CELL_SIZE_DEG` dec band always maps to at least one full
    /// `CELL_SIZE_DEG` of true angular extent in RA; at `|dec|` close enough
    /// to 90 that the window would need to wrap the whole circle, it does.
    fn candidates(&self, p: &RADec) -> Vec<usize> {
        let (cx, cy) = cell_of(p);
        let ra_cells = (360.0 / CELL_SIZE_DEG).round() as i64;
        let cos_dec = p.dec_degrees().to_radians().cos().abs().max(1e-6);
        let ra_half_width = (1.0 / cos_dec).ceil() as i64;
        let ra_half_width = ra_half_width.clamp(1, ra_cells.max(1) / 2);
        let mut out = Vec::new();
        for dx in -ra_half_width..=ra_half_width {
            for dy in -1..=1 {
                let wrapped_x = (cx + dx).rem_euclid(ra_cells.max(1));
                if let Some(idxs) = self.cells.get(&(wrapped_x, cy + dy)) {
                    out.extend_from_slice(idxs);
                }
            }
        }
        out
    }
}

/// All pairs `(i, j)` with `a[i]` to `b[j]` separation <= `radius_arcsec`,
/// together with that separation.
pub fn search_around(a: &[RADec], b: &[RADec], radius_arcsec: f64) -> Vec<(usize, usize, f64)> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let grid = Grid::build(a);
    let mut out = Vec::new();
    for (j, pb) in b.iter().enumerate() {
        for &i in &grid.candidates(pb) {
            let d2d = grid.points[i].separation_arcsec(pb);
            if d2d <= radius_arcsec {
                out.push((i, j, d2d));
            }
        }
    }
    out
}

/// For each point in `b`, the index of the nearest point in `a` and the
/// separation (arcsec), or `None` if `a` is empty.
pub fn match_nearest(a: &[RADec], b: &[RADec]) -> Vec<Option<(usize, f64)>> {
    if a.is_empty() {
        return vec![None; b.len()];
    }
    let grid = Grid::build(a);
    b.iter()
        .map(|pb| {
            let mut best: Option<(usize, f64)> = None;
            let mut candidates = grid.candidates(pb);
            if candidates.is_empty() {
                // The point sits in a cell with nothing nearby within one
                // cell radius; fall back to a full scan so we never miss a
                // match just because the grid is coarse relative to `a`'s
                // density.
                candidates = (0..a.len()).collect();
            }
            for i in candidates {
                let d2d = grid.points[i].separation_arcsec(pb);
                if best.map_or(true, |(_, bd)| d2d < bd) {
                    best = Some((i, d2d));
                }
            }
            best
        })
        .collect()
}
