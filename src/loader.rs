//! The loader boundary (`spec.md` §6): the core's only contract with image
//! ingestion, which is an external collaborator.

use hifitime::Epoch;

use crate::frame::Measurement;

/// An image's metadata, as handed to the core by the external catalogue.
#[derive(Debug, Clone)]
pub struct ImageDescriptor {
    pub image_id: String,
    pub name: String,
    pub epoch: i64,
    /// Restoring beam major semi-axis, degrees.
    pub beam_bmaj_deg: f64,
    pub skyreg_group: i64,
    pub measurements_path: String,
    pub datetime: Epoch,
}

/// Loads a measurement table for an image. Must be side-effect free and
/// deterministic; the core does not retry a failure from this trait.
pub trait MeasurementLoader: Send + Sync {
    fn load(&self, path: &str) -> Result<Vec<Measurement>, Box<dyn std::error::Error + Send + Sync>>;
}
