// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Source-association core for a radio-astronomy transient-detection
//! pipeline: groups point-source measurements across epochs into sources,
//! producing weighted-mean positions and variability statistics.

pub mod aggregate;
pub mod associate;
pub(crate) mod constants;
pub mod config;
pub(crate) mod error;
pub mod finalise;
pub mod frame;
pub mod geometry;
pub mod loader;
pub mod shard;

// Re-exports.
pub use config::{AssociationMethod, Config, ConfigError};
pub use error::AssocError;
pub use finalise::SourceRecord;
pub use frame::{Measurement, ReferenceFrame, ReferenceRow, Row, RunningFrame};
pub use geometry::RADec;
pub use loader::{ImageDescriptor, MeasurementLoader};
pub use shard::{run_group, run_sharded, GroupResult};
