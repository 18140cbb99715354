//! stripsim-digitizers: Hit-to-channel digitization for strip sensors.
//!
//! This crate provides:
//! - **Charge sharing** - diffusion-weighted strip finder
//! - **Mapping** - strip index to composite channel identifier
//! - **Digitizers** - the per-detector contract and its `bst`/`ftm` families
//! - **Registry** - hit type to digitizer factory table
//!
#![warn(missing_docs)]

pub mod bst;
pub mod digitizer;
pub mod ftm;
pub mod mapping;
mod processing;
pub mod registry;
pub mod sharing;

pub use bst::{Bst, BstDigitizer};
pub use digitizer::{
    ChargeSample, ChargeTime, DetectorFamily, Digitizer, DigitizerConfig, IntegratedDigi,
    StripDigi, StripDigitizer, NO_STRIP,
};
pub use ftm::{Ftm, FtmDigitizer};
pub use mapping::StripMapping;
pub use processing::{
    digitize_event, digitize_events, integrate_hits, multi_dgt_hits, DigitizedEvent,
};
pub use registry::{DigitizerFactory, DigitizerRegistry};
pub use sharing::{gaussian_fraction, StripFinder, NEGLIGIBLE_FRACTION};

// Re-export core types for convenience
pub use stripsim_core::{CalibrationLoader, CalibrationRecord, Hit, Identity, Step};
