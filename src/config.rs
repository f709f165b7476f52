//! The configuration the core consumes (`spec.md` §6). Loading a TOML file is
//! a convenience; construction from literal values is equally supported.

use serde::Deserialize;
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Which associator flavour to run per epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AssociationMethod {
    /// C3: nearest-neighbour association under a fixed angular radius.
    Basic,
    /// C4: radius-bounded all-neighbours association, ranked by `d2d`.
    Advanced,
    /// C4: radius-bounded all-neighbours association, ranked by `dr` with a
    /// de Ruiter cut.
    Deruiter,
}

/// All configuration the core consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub association_method: AssociationMethod,
    /// Radius for `basic`, arcsec.
    pub association_radius: f64,
    /// `dr_limit` for `deruiter`, unitless.
    pub association_de_ruiter_radius: f64,
    /// Scales beam half-major-axis for the `deruiter`/`advanced` window.
    pub association_beamwidth_limit: f64,
    /// Added in quadrature to fit sigma, arcsec.
    pub astrometric_uncertainty_ra: f64,
    pub astrometric_uncertainty_dec: f64,
    /// Floor on per-measurement flux error, as a fraction of flux.
    pub flux_perc_error: f64,
    /// Within-batch dedup radius, arcsec.
    pub duplicate_limit: f64,
    /// Used downstream by new-source significance scoring, not by the core.
    pub min_new_source_sigma: f64,
}

impl Default for Config {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            association_method: AssociationMethod::Advanced,
            association_radius: DEFAULT_ASSOCIATION_RADIUS_ARCSEC,
            association_de_ruiter_radius: DEFAULT_DE_RUITER_RADIUS,
            association_beamwidth_limit: DEFAULT_BEAMWIDTH_LIMIT,
            astrometric_uncertainty_ra: DEFAULT_ASTROMETRIC_UNCERTAINTY_ARCSEC,
            astrometric_uncertainty_dec: DEFAULT_ASTROMETRIC_UNCERTAINTY_ARCSEC,
            flux_perc_error: DEFAULT_FLUX_PERC_ERROR,
            duplicate_limit: DEFAULT_DUPLICATE_LIMIT_ARCSEC,
            min_new_source_sigma: DEFAULT_MIN_NEW_SOURCE_SIGMA,
        }
    }
}

impl Config {
    /// Load a configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file on disk.
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&s)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("ASSOCIATION_RADIUS", self.association_radius),
            (
                "ASSOCIATION_DE_RUITER_RADIUS",
                self.association_de_ruiter_radius,
            ),
            (
                "ASSOCIATION_BEAMWIDTH_LIMIT",
                self.association_beamwidth_limit,
            ),
            ("ASTROMETRIC_UNCERTAINTY_RA", self.astrometric_uncertainty_ra),
            (
                "ASTROMETRIC_UNCERTAINTY_DEC",
                self.astrometric_uncertainty_dec,
            ),
            ("FLUX_PERC_ERROR", self.flux_perc_error),
            ("DUPLICATE_LIMIT", self.duplicate_limit),
            ("MIN_NEW_SOURCE_SIGMA", self.min_new_source_sigma),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(ConfigError::NegativeOrNonFinite {
                    key: name.to_string(),
                    value,
                });
            }
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("{key} must be a non-negative, finite number, got {value}")]
    NegativeOrNonFinite { key: String, value: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"
        association_method = "advanced"
        association_radius = 5.0
        association_de_ruiter_radius = 5.68
        association_beamwidth_limit = 1.5
        astrometric_uncertainty_ra = 0.1
        astrometric_uncertainty_dec = 0.1
        flux_perc_error = 0.05
        duplicate_limit = 2.5
        min_new_source_sigma = 5.0
    "#;

    #[test]
    fn test_parse_valid() {
        let config = Config::from_toml_str(EXAMPLE).unwrap();
        assert_eq!(config.association_method, AssociationMethod::Advanced);
        assert_eq!(config.association_radius, 5.0);
    }

    #[test]
    fn test_parse_unknown_method() {
        let bad = EXAMPLE.replace("advanced", "nonsense");
        assert!(Config::from_toml_str(&bad).is_err());
    }

    #[test]
    fn test_parse_negative_radius() {
        let bad = EXAMPLE.replace("association_radius = 5.0", "association_radius = -5.0");
        let err = Config::from_toml_str(&bad).unwrap_err();
        assert!(matches!(err, ConfigError::NegativeOrNonFinite { .. }));
    }

    #[test]
    fn test_from_toml_file() {
        use std::io::Write;

        let mut tmp_file = tempfile::NamedTempFile::new().expect("couldn't make tmp file");
        tmp_file
            .write_all(EXAMPLE.as_bytes())
            .expect("couldn't write tmp file");

        let config = Config::from_toml_file(tmp_file.path()).unwrap();
        assert_eq!(config.association_method, AssociationMethod::Advanced);
    }
}
