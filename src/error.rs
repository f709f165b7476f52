//! Error type for all source-association errors. This should be the *only*
//! error enum that is publicly visible.

use thiserror::Error;

use crate::{config::ConfigError, finalise::FinaliseError, frame::InputError};

/// The *only* publicly visible error from this crate.
#[derive(Error, Debug)]
pub enum AssocError {
    /// An error in the supplied configuration (unknown method, negative
    /// radius, and so on). Fatal for the enclosing group; raised before any
    /// association work starts.
    #[error("configuration error: {0}")]
    Config(String),

    /// An error in the measurement input (missing column, non-finite
    /// coordinate). Fatal for the enclosing group.
    #[error("input error: {0}")]
    Input(String),

    /// An error finalising source records.
    #[error("finalisation error: {0}")]
    Finalise(String),

    /// A sky-region group failed during sharded, parallel association.
    #[error("sky-region group {group} failed: {source}")]
    Shard {
        group: i64,
        #[source]
        source: Box<AssocError>,
    },

    /// An internal consistency check failed after a merge. This is a
    /// programmer error, not a data error, and should abort the run.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// An error surfaced by the caller-supplied measurement loader. The core
    /// does not retry these; it reports them untouched.
    #[error("loader error: {0}")]
    Loader(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<ConfigError> for AssocError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<InputError> for AssocError {
    fn from(e: InputError) -> Self {
        Self::Input(e.to_string())
    }
}

impl From<FinaliseError> for AssocError {
    fn from(e: FinaliseError) -> Self {
        Self::Finalise(e.to_string())
    }
}
