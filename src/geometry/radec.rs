//! Spherical coordinates and the great-circle distance between them.

/// A position on the sky. Internally stored in radians, as the sine and
/// cosine of these coordinates are used often by the matching code that
/// consumes this type.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RADec {
    /// Right ascension \[radians\]
    pub ra: f64,
    /// Declination \[radians\]
    pub dec: f64,
}

impl RADec {
    /// Make a new `RADec` from values in radians.
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }

    /// Make a new `RADec` from values in degrees.
    pub fn new_degrees(ra: f64, dec: f64) -> Self {
        Self::new(ra.to_radians(), dec.to_radians())
    }

    pub fn ra_degrees(&self) -> f64 {
        self.ra.to_degrees()
    }

    pub fn dec_degrees(&self) -> f64 {
        self.dec.to_degrees()
    }

    /// Great-circle separation to another position, in arcseconds.
    ///
    /// Uses the haversine formula, which stays well-conditioned for both
    /// very small and near-antipodal separations on the unit sphere.
    pub fn separation_arcsec(&self, other: &Self) -> f64 {
        let d_ra = self.ra - other.ra;
        let d_dec = self.dec - other.dec;
        let a = (d_dec / 2.0).sin().powi(2)
            + self.dec.cos() * other.dec.cos() * (d_ra / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        c.to_degrees() * 3600.0
    }
}

impl std::fmt::Display for RADec {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "({}°, {}°)", self.ra_degrees(), self.dec_degrees())
    }
}

/// Format a right ascension (degrees) as sexagesimal HMS, e.g. `09h34m12.30s`.
pub fn ra_to_hms(ra_deg: f64) -> String {
    let ra_deg = ra_deg.rem_euclid(360.0);
    let total_hours = ra_deg / 15.0;
    let h = total_hours.floor();
    let rem_min = (total_hours - h) * 60.0;
    let m = rem_min.floor();
    let s = (rem_min - m) * 60.0;
    format!("{:02.0}h{:02.0}m{:05.2}s", h, m, s)
}

/// Format a declination (degrees) as sexagesimal DMS, e.g. `-27d30m00.10s`.
pub fn dec_to_dms(dec_deg: f64) -> String {
    let sign = if dec_deg < 0.0 { "-" } else { "+" };
    let dec_abs = dec_deg.abs();
    let d = dec_abs.floor();
    let rem_min = (dec_abs - d) * 60.0;
    let m = rem_min.floor();
    let s = (rem_min - m) * 60.0;
    format!("{sign}{:02.0}d{:02.0}m{:05.2}s", d, m, s)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_separation_zero() {
        let a = RADec::new_degrees(10.0, -30.0);
        assert_abs_diff_eq!(a.separation_arcsec(&a), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_separation_one_arcsec() {
        // 1 arcsec in dec at dec=0 should be ~1 arcsec separation.
        let a = RADec::new_degrees(0.0, 0.0);
        let b = RADec::new_degrees(0.0, 1.0 / 3600.0);
        assert_abs_diff_eq!(a.separation_arcsec(&b), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_separation_wrap() {
        // Two points either side of the RA=0/360 boundary should be close.
        let a = RADec::new_degrees(359.9999, 0.0);
        let b = RADec::new_degrees(0.0001, 0.0);
        // 0.0002 degrees = 0.72 arcsec
        assert_abs_diff_eq!(a.separation_arcsec(&b), 0.72, epsilon = 1e-2);
    }

    #[test]
    fn test_hms_dms() {
        assert_eq!(ra_to_hms(0.0), "00h00m00.00s");
        assert_eq!(dec_to_dms(-27.5), "-27d30m00.00s");
    }
}
