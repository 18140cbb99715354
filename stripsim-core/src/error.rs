//! Error types for stripsim-core.

use thiserror::Error;

/// Result type alias for stripsim operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Calibration loading and validation errors.
///
/// These are raised once, when a run's constants are loaded, and never while
/// hits are being digitized.
#[derive(Error, Debug)]
pub enum CalibrationError {
    /// A required constant is absent from the source.
    #[error("missing calibration constant: {0}")]
    MissingField(&'static str),

    /// A constant is present but outside its physical range.
    #[error("invalid calibration constant {field} = {value}: {reason}")]
    InvalidValue {
        field: &'static str,
        value: f64,
        reason: &'static str,
    },

    /// The requested variation is not known to the loader.
    #[error("unknown calibration variation: {0}")]
    UnknownVariation(String),

    /// No entry of the variation covers the requested run.
    #[error("no calibration for run {run} in variation '{variation}'")]
    NoEntryForRun { run: i32, variation: String },

    /// Malformed calibration document.
    #[error("calibration parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Core error types for stripsim operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Calibration could not be loaded.
    #[error("calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    /// A hit was handed to a digitizer that has not seen a run number yet.
    #[error("digitizer '{0}' used before initialization with a run number")]
    NotInitialized(&'static str),

    /// A required identifier field is absent from the hit identity.
    #[error("identifier '{0}' not found in hit identity")]
    MissingIdentifier(&'static str),

    /// The geometry handle has no placement for the requested layer.
    #[error("unknown layer {0}")]
    UnknownLayer(i32),

    /// Geometry description error.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// No digitizer is registered under the given detector type.
    #[error("no digitizer registered for hit type '{0}'")]
    UnknownHitType(String),
}
