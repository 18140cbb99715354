//! Per-run calibration and geometry constants.
//!
//! A [`CalibrationRecord`] is produced once per run transition by a
//! [`CalibrationLoader`], validated at that point, and then shared read-only
//! by every hit digitized under that run.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CalibrationError;
use crate::pulse::PulseShape;

/// Immutable bundle of the constants governing one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRecord {
    /// Run number the constants were loaded for.
    pub run: i32,
    /// Calibration variation tag.
    pub variation: String,
    /// Inner radius of the active area (mm).
    pub rmin: f64,
    /// Outer radius of the active area (mm).
    pub rmax: f64,
    /// Strip pitch (mm).
    pub pitch: f64,
    /// Number of strips per layer.
    pub nstrips: u32,
    /// Half-width of the candidate window around the closest strip (strips).
    pub nb_sigma: u32,
    /// Transverse diffusion coefficient (mm per sqrt(mm) of drift).
    pub sigma_0: f64,
    /// Cap on the transverse diffusion width (mm).
    pub sigma_td_max: f64,
    /// Mean ionization energy per electron (MeV).
    pub w_i: f64,
    /// Readout pulse shape.
    pub pulse: PulseShape,
}

impl CalibrationRecord {
    /// Checks every constant, returning the record when all are sane.
    pub fn validated(self) -> Result<Self, CalibrationError> {
        let finite = [
            ("rmin", self.rmin),
            ("rmax", self.rmax),
            ("pitch", self.pitch),
            ("sigma_0", self.sigma_0),
            ("sigma_td_max", self.sigma_td_max),
            ("w_i", self.w_i),
            ("pulse.delay", self.pulse.delay),
            ("pulse.rise", self.pulse.rise),
            ("pulse.fall", self.pulse.fall),
            ("pulse.amplitude_scale", self.pulse.amplitude_scale),
        ];
        for (field, value) in finite {
            if !value.is_finite() {
                return Err(CalibrationError::InvalidValue {
                    field,
                    value,
                    reason: "must be finite",
                });
            }
        }

        let positive = [
            ("pitch", self.pitch),
            ("sigma_0", self.sigma_0),
            ("sigma_td_max", self.sigma_td_max),
            ("w_i", self.w_i),
            ("pulse.rise", self.pulse.rise),
            ("pulse.fall", self.pulse.fall),
        ];
        for (field, value) in positive {
            if value <= 0.0 {
                return Err(CalibrationError::InvalidValue {
                    field,
                    value,
                    reason: "must be positive",
                });
            }
        }

        if self.nstrips == 0 {
            return Err(CalibrationError::InvalidValue {
                field: "nstrips",
                value: 0.0,
                reason: "must be positive",
            });
        }
        if self.rmin < 0.0 {
            return Err(CalibrationError::InvalidValue {
                field: "rmin",
                value: self.rmin,
                reason: "must not be negative",
            });
        }
        if self.rmin >= self.rmax {
            return Err(CalibrationError::InvalidValue {
                field: "rmin",
                value: self.rmin,
                reason: "must be below rmax",
            });
        }

        Ok(self)
    }

    /// Total width covered by the strips of one layer (mm).
    #[inline]
    #[must_use]
    pub fn active_width(&self) -> f64 {
        f64::from(self.nstrips) * self.pitch
    }

    /// Number of ionization electrons produced by `edep` MeV.
    #[inline]
    #[must_use]
    pub fn electrons(&self, edep: f64) -> f64 {
        edep / self.w_i
    }
}

/// Constants as they appear in a calibration source, before validation.
///
/// Every field is optional so that an absent constant is reported by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConstants {
    pub rmin: Option<f64>,
    pub rmax: Option<f64>,
    pub pitch: Option<f64>,
    pub nstrips: Option<i64>,
    pub nb_sigma: Option<i64>,
    pub sigma_0: Option<f64>,
    pub sigma_td_max: Option<f64>,
    pub w_i: Option<f64>,
    /// `[delay, rise, fall, amplitude_scale]`.
    pub pulse: Option<[f64; 4]>,
}

impl RawConstants {
    /// Builds and validates the record for `run` / `variation`.
    pub fn build(&self, run: i32, variation: &str) -> Result<CalibrationRecord, CalibrationError> {
        fn count(field: &'static str, value: i64) -> Result<u32, CalibrationError> {
            u32::try_from(value).map_err(|_| CalibrationError::InvalidValue {
                field,
                value: value as f64,
                reason: "must be a non-negative 32-bit count",
            })
        }

        let record = CalibrationRecord {
            run,
            variation: variation.to_string(),
            rmin: self.rmin.ok_or(CalibrationError::MissingField("rmin"))?,
            rmax: self.rmax.ok_or(CalibrationError::MissingField("rmax"))?,
            pitch: self.pitch.ok_or(CalibrationError::MissingField("pitch"))?,
            nstrips: count(
                "nstrips",
                self.nstrips.ok_or(CalibrationError::MissingField("nstrips"))?,
            )?,
            nb_sigma: count(
                "nb_sigma",
                self.nb_sigma
                    .ok_or(CalibrationError::MissingField("nb_sigma"))?,
            )?,
            sigma_0: self.sigma_0.ok_or(CalibrationError::MissingField("sigma_0"))?,
            sigma_td_max: self
                .sigma_td_max
                .ok_or(CalibrationError::MissingField("sigma_td_max"))?,
            w_i: self.w_i.ok_or(CalibrationError::MissingField("w_i"))?,
            pulse: PulseShape::from_array(
                self.pulse.ok_or(CalibrationError::MissingField("pulse"))?,
            ),
        };
        record.validated()
    }
}

/// Source of per-run calibration records.
///
/// Loading may block on I/O and must complete before any hit of the run is
/// digitized.
pub trait CalibrationLoader: Send + Sync {
    /// Loads the constants valid for `run` in `variation`.
    fn load(&self, run: i32, variation: &str) -> Result<CalibrationRecord, CalibrationError>;
}

/// Loader returning the same constants for every run and variation.
#[derive(Debug, Clone)]
pub struct FixedCalibration {
    constants: RawConstants,
}

impl FixedCalibration {
    /// Creates a loader serving `constants`.
    #[must_use]
    pub fn new(constants: RawConstants) -> Self {
        Self { constants }
    }

    /// Creates a loader serving the constants of an existing record.
    #[must_use]
    pub fn from_record(record: &CalibrationRecord) -> Self {
        Self::new(RawConstants {
            rmin: Some(record.rmin),
            rmax: Some(record.rmax),
            pitch: Some(record.pitch),
            nstrips: Some(i64::from(record.nstrips)),
            nb_sigma: Some(i64::from(record.nb_sigma)),
            sigma_0: Some(record.sigma_0),
            sigma_td_max: Some(record.sigma_td_max),
            w_i: Some(record.w_i),
            pulse: Some([
                record.pulse.delay,
                record.pulse.rise,
                record.pulse.fall,
                record.pulse.amplitude_scale,
            ]),
        })
    }
}

impl CalibrationLoader for FixedCalibration {
    fn load(&self, run: i32, variation: &str) -> Result<CalibrationRecord, CalibrationError> {
        self.constants.build(run, variation)
    }
}

/// One run range of a calibration table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunRangeEntry {
    /// Inclusive `[first, last]` run range.
    runs: [i32; 2],
    constants: RawConstants,
}

#[derive(Deserialize)]
struct JsonCalibration {
    variations: BTreeMap<String, Vec<RunRangeEntry>>,
}

/// Run-range keyed calibration table with named variations, read from JSON.
///
/// ```json
/// {
///   "variations": {
///     "default": [
///       { "runs": [1, 9999], "constants": { "pitch": 0.5, "nstrips": 100, "...": 0 } }
///     ]
///   }
/// }
/// ```
///
/// Entries are searched in file order; the first range containing the run
/// wins.
#[derive(Debug, Clone)]
pub struct JsonCalibrationLoader {
    variations: BTreeMap<String, Vec<RunRangeEntry>>,
}

impl JsonCalibrationLoader {
    /// Load a calibration table from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CalibrationError> {
        let file = File::open(path)?;
        let json: JsonCalibration = serde_json::from_reader(BufReader::new(file))?;
        Ok(Self {
            variations: json.variations,
        })
    }

    /// Load a calibration table from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, CalibrationError> {
        let json: JsonCalibration = serde_json::from_str(json)?;
        Ok(Self {
            variations: json.variations,
        })
    }

    /// Names of the variations in the table.
    pub fn variations(&self) -> impl Iterator<Item = &str> {
        self.variations.keys().map(String::as_str)
    }
}

impl CalibrationLoader for JsonCalibrationLoader {
    fn load(&self, run: i32, variation: &str) -> Result<CalibrationRecord, CalibrationError> {
        let entries = self
            .variations
            .get(variation)
            .ok_or_else(|| CalibrationError::UnknownVariation(variation.to_string()))?;

        let entry = entries
            .iter()
            .find(|e| e.runs[0] <= run && run <= e.runs[1])
            .ok_or_else(|| CalibrationError::NoEntryForRun {
                run,
                variation: variation.to_string(),
            })?;

        log::debug!(
            "loading calibration for run {run} from range {:?} of variation '{variation}'",
            entry.runs
        );
        entry.constants.build(run, variation)
    }
}
