//! stripsim-core: Core types for strip sensor digitization.
//!
//! This crate provides the data model shared by all digitizers: simulated
//! hits and their identifiers, per-run calibration records and their
//! loaders, the read-only sensor geometry capability, readout channel
//! identifiers and the analog pulse-shape model.
//!

pub mod calibration;
pub mod channel;
pub mod error;
pub mod geometry;
pub mod hit;
pub mod pulse;

pub use calibration::{
    CalibrationLoader, CalibrationRecord, FixedCalibration, JsonCalibrationLoader, RawConstants,
};
pub use channel::{ChannelContribution, ChannelId, StripHalf};
pub use error::{CalibrationError, Error, Result};
pub use geometry::{LayerPlacement, SensorGeometry, StripPlaneGeometry};
pub use hit::{Hit, Identifier, Identity, Position, Step, TrueInfo};
pub use pulse::{dgauss, pulse_features, summed_voltage, Deposit, PulseFeatures, PulseShape};
