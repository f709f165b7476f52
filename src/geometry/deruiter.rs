//! The de Ruiter radius: a unitless, error-normalised angular separation
//! used by the advanced associator's `deruiter` method.

use super::radec::RADec;

/// Shift an RA (degrees) to defuse wrap-around before a de Ruiter
/// calculation, per the reference pipeline's `calc_de_ruiter`: each RA in
/// the pair is shifted independently, not relative to the other.
fn unwrap_ra_deg(ra_deg: f64) -> f64 {
    if ra_deg > 270.0 {
        ra_deg - 180.0
    } else if ra_deg < 90.0 {
        ra_deg + 180.0
    } else {
        ra_deg
    }
}

/// The de Ruiter distance between two positions with independent EW/NS
/// uncertainties (all uncertainties in degrees).
///
/// ```text
/// dr² = [(ra1 - ra2) * cos((dec1+dec2)/2)]² / (ew1² + ew2²)
///     + (dec1 - dec2)² / (ns1² + ns2²)
/// ```
pub fn de_ruiter(
    a: &RADec,
    a_uncertainty_ew_deg: f64,
    a_uncertainty_ns_deg: f64,
    b: &RADec,
    b_uncertainty_ew_deg: f64,
    b_uncertainty_ns_deg: f64,
) -> f64 {
    let ra1 = unwrap_ra_deg(a.ra_degrees()).to_radians();
    let ra2 = unwrap_ra_deg(b.ra_degrees()).to_radians();
    let dec1 = a.dec;
    let dec2 = b.dec;

    let ew1 = a_uncertainty_ew_deg.to_radians();
    let ew2 = b_uncertainty_ew_deg.to_radians();
    let ns1 = a_uncertainty_ns_deg.to_radians();
    let ns2 = b_uncertainty_ns_deg.to_radians();

    let dr1 = (ra1 - ra2).powi(2) * ((dec1 + dec2) / 2.0).cos().powi(2) / (ew1 * ew1 + ew2 * ew2);
    let dr2 = (dec1 - dec2).powi(2) / (ns1 * ns1 + ns2 * ns2);

    (dr1 + dr2).sqrt()
}
