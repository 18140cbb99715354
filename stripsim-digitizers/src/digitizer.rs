//! Digitizer contract and the strip readout shared by all detector families.
#![allow(clippy::cast_possible_wrap, clippy::missing_errors_doc)]

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stripsim_core::calibration::{CalibrationLoader, CalibrationRecord};
use stripsim_core::channel::{ChannelContribution, ChannelId, StripHalf};
use stripsim_core::error::{Error, Result};
use stripsim_core::geometry::{LayerPlacement, SensorGeometry};
use stripsim_core::hit::{Hit, Identity, Step};
use stripsim_core::pulse::{dgauss, pulse_features, Deposit};

use crate::mapping::StripMapping;
use crate::sharing::StripFinder;

/// Strip identifier value given to a step that no strip collected.
pub const NO_STRIP: i32 = -1;

/// Digitization settings that are not calibration constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigitizerConfig {
    /// Calibration variation requested from the loader.
    pub variation: String,
    /// Waveform sampling step when scanning pulses (ns).
    pub sample_step_ns: f64,
    /// Leading-edge threshold as a fraction of the pulse peak.
    pub threshold_fraction: f64,
}

impl Default for DigitizerConfig {
    fn default() -> Self {
        Self {
            variation: "default".to_string(),
            sample_step_ns: 0.5,
            threshold_fraction: 0.5,
        }
    }
}

impl DigitizerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the calibration variation.
    #[must_use]
    pub fn with_variation(mut self, variation: impl Into<String>) -> Self {
        self.variation = variation.into();
        self
    }

    /// Sets the waveform sampling step.
    #[must_use]
    pub fn with_sample_step(mut self, step_ns: f64) -> Self {
        self.sample_step_ns = step_ns;
        self
    }

    /// Sets the leading-edge threshold fraction.
    #[must_use]
    pub fn with_threshold_fraction(mut self, fraction: f64) -> Self {
        self.threshold_fraction = fraction;
        self
    }
}

/// Charge reaching a channel at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChargeSample {
    /// Collected charge (electrons).
    pub charge: f64,
    /// Arrival time (ns).
    pub time: f64,
}

/// Per-channel charge arrivals of one hit, each list ordered by time.
pub type ChargeTime = BTreeMap<ChannelId, Vec<ChargeSample>>;

/// Integrated digitized record of one hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegratedDigi {
    /// Identity of the hit.
    pub identity: Identity,
    /// Channel that collected the most charge.
    pub leading: Option<ChannelId>,
    /// Number of channels that collected charge.
    pub n_channels: usize,
    /// Total collected charge (electrons).
    pub charge: f64,
    /// Height of the summed pulse (mV, positive).
    pub amplitude: f64,
    /// Time of the summed pulse peak (ns).
    pub peak_time: f64,
    /// Leading-edge threshold crossing of the summed pulse (ns).
    pub time: f64,
}

/// Digitized record of one channel of a hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StripDigi {
    /// Channel the record belongs to.
    pub channel: ChannelId,
    /// Collected charge (electrons).
    pub charge: f64,
    /// Pulse height (mV, positive).
    pub amplitude: f64,
    /// Pulse peak time (ns).
    pub peak_time: f64,
    /// Leading-edge threshold crossing (ns).
    pub time: f64,
}

/// Trait for detector digitizers.
///
/// A digitizer is constructed without arguments, initialized with a run
/// number (which loads that run's calibration) and then asked to digitize the
/// hits of every event of the run. Per-hit operations take `&self`, so one
/// initialized digitizer can serve several worker threads.
pub trait Digitizer: Send + Sync {
    /// Hit type this digitizer is registered under.
    fn name(&self) -> &'static str;

    /// Identifier names carried by hits of this detector, outermost first.
    fn identifiers(&self) -> &'static [&'static str];

    /// Loads the constants of `run`. Calling it again with the same run is a
    /// no-op; a new run replaces the constants.
    fn init_with_run_number(&mut self, run: i32, loader: &dyn CalibrationLoader) -> Result<()>;

    /// Constants of the current run, if initialized.
    fn calibration(&self) -> Option<&Arc<CalibrationRecord>>;

    /// Current run number, if initialized.
    fn run_number(&self) -> Option<i32> {
        self.calibration().map(|c| c.run)
    }

    /// Refines the identity of a step with charge-sharing information.
    ///
    /// Returns one identity per strip collecting charge, with the strip
    /// identifier filled and `sharing` set to the strip's fraction. A step
    /// that no strip collects keeps a single identity with strip
    /// [`NO_STRIP`].
    fn process_id(
        &self,
        identity: &Identity,
        step: &Step,
        geometry: &dyn SensorGeometry,
    ) -> Result<Vec<Identity>>;

    /// Per-channel (charge, time) arrivals over all steps of `hit`.
    fn charge_time(&self, hit: &Hit) -> Result<ChargeTime>;

    /// One integrated record for `hit`.
    fn integrate_dgt(&self, hit: &Hit) -> Result<IntegratedDigi>;

    /// One record per channel touched by `hit`, ordered by channel.
    fn multi_dgt(&self, hit: &Hit) -> Result<Vec<StripDigi>>;

    /// Hits produced by the electronics alone.
    fn electronic_noise(&self) -> Vec<Hit> {
        Vec::new()
    }

    /// Voltage at `for_time` of the pulse started by an energy-equivalent
    /// `charge` (MeV) arriving at `time`.
    fn voltage(&self, charge: f64, time: f64, for_time: f64) -> Result<f64>;
}

/// Constants distinguishing one strip detector family from another.
pub trait DetectorFamily: Send + Sync + 'static {
    /// Hit type the family is registered under.
    const NAME: &'static str;
    /// Identifier names carried by hits, outermost first.
    const IDENTIFIERS: &'static [&'static str];
    /// Offset between strip indices and strip identifier values.
    const STRIP_ID_BASE: i32 = 1;
    /// Whether strips crossing the central hole are read out as halves.
    const SPLIT_HALF_STRIPS: bool = false;
    /// Whether the sensor is a disk whose sensitive area is the annulus
    /// `rmin <= r <= rmax`.
    const ANNULAR: bool = false;
}

/// Identifier value of a strip half.
#[must_use]
pub fn half_code(half: StripHalf) -> i32 {
    match half {
        StripHalf::Full => 0,
        StripHalf::Low => 1,
        StripHalf::High => 2,
    }
}

/// Strip readout digitizer for detector family `F`.
pub struct StripDigitizer<F: DetectorFamily> {
    config: DigitizerConfig,
    calibration: Option<Arc<CalibrationRecord>>,
    family: PhantomData<F>,
}

impl<F: DetectorFamily> fmt::Debug for StripDigitizer<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StripDigitizer")
            .field("family", &F::NAME)
            .field("config", &self.config)
            .field("run", &self.run_number())
            .finish()
    }
}

impl<F: DetectorFamily> Default for StripDigitizer<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// A step's contribution to one channel.
struct ChannelShare {
    channel: ChannelId,
    contribution: ChannelContribution,
}

impl<F: DetectorFamily> StripDigitizer<F> {
    /// Create with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DigitizerConfig::default())
    }

    /// Create with custom configuration.
    #[must_use]
    pub fn with_config(config: DigitizerConfig) -> Self {
        Self {
            config,
            calibration: None,
            family: PhantomData,
        }
    }

    /// Use already loaded constants instead of a loader.
    #[must_use]
    pub fn with_calibration(mut self, calibration: Arc<CalibrationRecord>) -> Self {
        self.calibration = Some(calibration);
        self
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &DigitizerConfig {
        &self.config
    }

    fn record(&self) -> Result<&CalibrationRecord> {
        self.calibration
            .as_deref()
            .ok_or(Error::NotInitialized(F::NAME))
    }

    fn mapping(calibration: &CalibrationRecord) -> StripMapping {
        if F::SPLIT_HALF_STRIPS {
            StripMapping::split_at_hole(calibration.rmin)
        } else {
            StripMapping::full_strips()
        }
    }

    fn layer_of(identity: &Identity) -> Result<i32> {
        identity.get("layer").ok_or(Error::MissingIdentifier("layer"))
    }

    fn share_step(
        calibration: &CalibrationRecord,
        sector: i32,
        layer: i32,
        placement: &LayerPlacement,
        step: &Step,
    ) -> Vec<ChannelShare> {
        let finder = StripFinder::new(calibration).with_annulus(F::ANNULAR);
        let mapping = Self::mapping(calibration);
        let (_, v) = placement.to_strip_frame(step.local);

        finder
            .find_strips(step.local, step.edep, step.time, placement)
            .into_iter()
            .map(|contribution| {
                let edges = finder.strip_edges(i64::from(contribution.strip), placement);
                ChannelShare {
                    channel: mapping.channel(sector, layer, contribution.strip, edges, v),
                    contribution,
                }
            })
            .collect()
    }

    fn deposits(calibration: &CalibrationRecord, samples: &[ChargeSample]) -> Vec<Deposit> {
        samples
            .iter()
            .map(|s| Deposit::new(s.charge * calibration.w_i, s.time))
            .collect()
    }
}

impl<F: DetectorFamily> Digitizer for StripDigitizer<F> {
    fn name(&self) -> &'static str {
        F::NAME
    }

    fn identifiers(&self) -> &'static [&'static str] {
        F::IDENTIFIERS
    }

    fn init_with_run_number(&mut self, run: i32, loader: &dyn CalibrationLoader) -> Result<()> {
        if let Some(current) = &self.calibration {
            if current.run == run && current.variation == self.config.variation {
                log::debug!("{}: constants for run {run} already loaded", F::NAME);
                return Ok(());
            }
        }

        let record = loader.load(run, &self.config.variation)?;
        log::info!(
            "{}: loaded '{}' constants for run {run}: pitch {} mm, {} strips, sigma_0 {}",
            F::NAME,
            record.variation,
            record.pitch,
            record.nstrips,
            record.sigma_0
        );
        self.calibration = Some(Arc::new(record));
        Ok(())
    }

    fn calibration(&self) -> Option<&Arc<CalibrationRecord>> {
        self.calibration.as_ref()
    }

    fn process_id(
        &self,
        identity: &Identity,
        step: &Step,
        geometry: &dyn SensorGeometry,
    ) -> Result<Vec<Identity>> {
        let calibration = self.record()?;
        let layer = Self::layer_of(identity)?;
        let sector = identity.get("sector").unwrap_or(0);
        let placement = geometry.require_layer(layer)?;

        let shares = Self::share_step(calibration, sector, layer, &placement, step);
        if shares.is_empty() {
            let mut unshared = identity.clone().with("strip", NO_STRIP);
            unshared.sharing = 1.0;
            return Ok(vec![unshared]);
        }

        Ok(shares
            .iter()
            .map(|share| {
                let mut refined = identity
                    .clone()
                    .with("strip", share.contribution.strip as i32 + F::STRIP_ID_BASE);
                if F::SPLIT_HALF_STRIPS {
                    refined.set("half", half_code(share.channel.half));
                }
                refined.sharing = share.contribution.fraction;
                refined
            })
            .collect())
    }

    fn charge_time(&self, hit: &Hit) -> Result<ChargeTime> {
        let calibration = self.record()?;
        let layer = Self::layer_of(&hit.identity)?;
        let sector = hit.identity.get("sector").unwrap_or(0);
        let placement = hit.geometry.require_layer(layer)?;

        let mut charge_time = ChargeTime::new();
        for step in &hit.steps {
            for share in Self::share_step(calibration, sector, layer, &placement, step) {
                charge_time
                    .entry(share.channel)
                    .or_default()
                    .push(ChargeSample {
                        charge: share.contribution.electrons,
                        time: share.contribution.time,
                    });
            }
        }
        for samples in charge_time.values_mut() {
            samples.sort_by(|a, b| a.time.total_cmp(&b.time));
        }
        Ok(charge_time)
    }

    fn integrate_dgt(&self, hit: &Hit) -> Result<IntegratedDigi> {
        let calibration = self.record()?;
        let charge_time = self.charge_time(hit)?;
        let info = hit.true_info();
        if charge_time.is_empty() && info.e_tot > 0.0 {
            log::warn!(
                "{}: {} deposited {:.4} MeV outside every strip",
                F::NAME,
                hit.identity,
                info.e_tot
            );
        }

        let mut leading: Option<(ChannelId, f64)> = None;
        let mut charge = 0.0;
        let mut deposits = Vec::new();
        for (channel, samples) in &charge_time {
            let channel_charge: f64 = samples.iter().map(|s| s.charge).sum();
            charge += channel_charge;
            let better = match leading {
                Some((_, best)) => channel_charge > best,
                None => true,
            };
            if better {
                leading = Some((*channel, channel_charge));
            }
            deposits.extend(Self::deposits(calibration, samples));
        }

        let features = pulse_features(
            &calibration.pulse,
            &deposits,
            self.config.sample_step_ns,
            self.config.threshold_fraction,
        );

        let digi = IntegratedDigi {
            identity: hit.identity.clone(),
            leading: leading.map(|(channel, _)| channel),
            n_channels: charge_time.len(),
            charge,
            amplitude: features.map_or(0.0, |f| -f.peak_voltage),
            peak_time: features.map_or(info.time, |f| f.peak_time),
            time: features.map_or(info.time, |f| f.leading_time),
        };
        log::debug!(
            "{}: {} -> {} channel(s), {:.1} electrons, {:.3} mV at {:.2} ns",
            F::NAME,
            hit.identity,
            digi.n_channels,
            digi.charge,
            digi.amplitude,
            digi.time
        );
        Ok(digi)
    }

    fn multi_dgt(&self, hit: &Hit) -> Result<Vec<StripDigi>> {
        let calibration = self.record()?;
        let charge_time = self.charge_time(hit)?;

        Ok(charge_time
            .iter()
            .map(|(channel, samples)| {
                let deposits = Self::deposits(calibration, samples);
                let features = pulse_features(
                    &calibration.pulse,
                    &deposits,
                    self.config.sample_step_ns,
                    self.config.threshold_fraction,
                );
                let first_time = samples.first().map_or(0.0, |s| s.time);
                StripDigi {
                    channel: *channel,
                    charge: samples.iter().map(|s| s.charge).sum(),
                    amplitude: features.map_or(0.0, |f| -f.peak_voltage),
                    peak_time: features.map_or(first_time, |f| f.peak_time),
                    time: features.map_or(first_time, |f| f.leading_time),
                }
            })
            .collect())
    }

    fn voltage(&self, charge: f64, time: f64, for_time: f64) -> Result<f64> {
        let calibration = self.record()?;
        Ok(dgauss(for_time, &calibration.pulse, charge, time))
    }
}
