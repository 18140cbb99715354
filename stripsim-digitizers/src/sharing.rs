//! Diffusion-weighted strip finder.
//!
//! Charge created at a step drifts to the readout plane and spreads
//! transversally as a Gaussian cloud whose width grows with the square root
//! of the drift distance. Each strip in a window around the closest one
//! collects the part of the cloud falling over its extent.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::cast_possible_wrap
)]

use std::f64::consts::SQRT_2;

use statrs::function::erf::{erf, erfc};
use stripsim_core::calibration::CalibrationRecord;
use stripsim_core::channel::ChannelContribution;
use stripsim_core::geometry::LayerPlacement;
use stripsim_core::hit::Position;

/// Fractions below this are dropped before renormalization.
pub const NEGLIGIBLE_FRACTION: f64 = 1e-6;

/// Fraction of a Gaussian of mean `mean` and width `sigma` lying in `[a, b)`.
///
/// Uses `erfc` on the tails, where a plain `erf` difference would cancel.
#[must_use]
pub fn gaussian_fraction(a: f64, b: f64, mean: f64, sigma: f64) -> f64 {
    let za = (a - mean) / (sigma * SQRT_2);
    let zb = (b - mean) / (sigma * SQRT_2);
    let fraction = if za >= 0.0 {
        0.5 * (erfc(za) - erfc(zb))
    } else if zb <= 0.0 {
        0.5 * (erfc(-zb) - erfc(-za))
    } else {
        0.5 * (erf(zb) - erf(za))
    };
    fraction.max(0.0)
}

/// Strip finder bound to one run's calibration.
#[derive(Debug, Clone, Copy)]
pub struct StripFinder<'a> {
    calibration: &'a CalibrationRecord,
    annulus: bool,
}

impl<'a> StripFinder<'a> {
    /// Creates a strip finder for `calibration`.
    #[must_use]
    pub fn new(calibration: &'a CalibrationRecord) -> Self {
        Self {
            calibration,
            annulus: false,
        }
    }

    /// Only accept deposits whose radius lies in `[rmin, rmax]`, for sensors
    /// shaped as a disk with a central hole.
    #[must_use]
    pub fn with_annulus(mut self, annulus: bool) -> Self {
        self.annulus = annulus;
        self
    }

    /// Whether a deposit at strip-frame `(u, v)` lies on the sensitive area.
    #[must_use]
    pub fn accepts(&self, u: f64, v: f64) -> bool {
        if !self.annulus {
            return true;
        }
        let r = u.hypot(v);
        r >= self.calibration.rmin && r <= self.calibration.rmax
    }

    /// Measured coordinate of the lower edge of strip 0.
    #[inline]
    #[must_use]
    pub fn strip_origin(&self, placement: &LayerPlacement) -> f64 {
        -0.5 * self.calibration.active_width() + placement.offset
    }

    /// Index of the strip containing `u`, unclipped.
    ///
    /// A coordinate on a boundary belongs to the higher-index strip.
    #[inline]
    #[must_use]
    pub fn closest_strip(&self, u: f64, placement: &LayerPlacement) -> i64 {
        ((u - self.strip_origin(placement)) / self.calibration.pitch).floor() as i64
    }

    /// `[start, end)` extent of `strip` along the measured coordinate.
    #[inline]
    #[must_use]
    pub fn strip_edges(&self, strip: i64, placement: &LayerPlacement) -> (f64, f64) {
        let start = self.strip_origin(placement) + strip as f64 * self.calibration.pitch;
        (start, start + self.calibration.pitch)
    }

    /// Part of `[start, end)` lying inside the sensor radius `rmax`.
    /// Empty extents come back with `end <= start`.
    #[inline]
    #[must_use]
    pub fn clip_to_sensor(&self, edges: (f64, f64)) -> (f64, f64) {
        let rmax = self.calibration.rmax;
        (edges.0.max(-rmax), edges.1.min(rmax))
    }

    /// Whether `strip` is a physical strip of the layer.
    #[inline]
    #[must_use]
    pub fn in_range(&self, strip: i64) -> bool {
        (0..i64::from(self.calibration.nstrips)).contains(&strip)
    }

    /// Transverse diffusion width after drifting `drift` mm.
    #[inline]
    #[must_use]
    pub fn sigma_td(&self, drift: f64) -> f64 {
        (self.calibration.sigma_0 * drift.max(0.0).sqrt()).min(self.calibration.sigma_td_max)
    }

    /// Shares a charge cloud centered at `u` with width `sigma_td` among the
    /// strips of a layer.
    ///
    /// Returns `(strip, fraction)` pairs ordered by strip. Fractions are
    /// normalized over the whole candidate window, then strips outside the
    /// layer and the parts of strips beyond `rmax` are dropped, so near an
    /// edge the returned fractions sum to less than one.
    #[must_use]
    pub fn share(&self, u: f64, sigma_td: f64, placement: &LayerPlacement) -> Vec<(u32, f64)> {
        if !u.is_finite() {
            return Vec::new();
        }
        let closest = self.closest_strip(u, placement);
        let nb_sigma = i64::from(self.calibration.nb_sigma);
        let nstrips = i64::from(self.calibration.nstrips);
        if closest < -nb_sigma || closest >= nstrips + nb_sigma {
            return Vec::new();
        }

        if sigma_td.is_nan() || sigma_td <= 0.0 {
            return self.point_deposit(u, closest);
        }

        // (strip, fraction over the whole strip, fraction over its active part)
        let window: Vec<(i64, f64, f64)> = ((closest - nb_sigma)..=(closest + nb_sigma))
            .filter_map(|strip| {
                let edges = self.strip_edges(strip, placement);
                let fraction = gaussian_fraction(edges.0, edges.1, u, sigma_td);
                if fraction < NEGLIGIBLE_FRACTION {
                    return None;
                }
                let (start, end) = self.clip_to_sensor(edges);
                let active = if end > start {
                    gaussian_fraction(start, end, u, sigma_td)
                } else {
                    0.0
                };
                Some((strip, fraction, active))
            })
            .collect();

        let total: f64 = window.iter().map(|&(_, fraction, _)| fraction).sum();
        if total <= 0.0 {
            return self.point_deposit(u, closest);
        }

        window
            .into_iter()
            .filter(|&(strip, _, active)| self.in_range(strip) && active > 0.0)
            .map(|(strip, _, active)| (strip as u32, active / total))
            .collect()
    }

    fn point_deposit(&self, u: f64, closest: i64) -> Vec<(u32, f64)> {
        let rmax = self.calibration.rmax;
        if self.in_range(closest) && (-rmax..rmax).contains(&u) {
            vec![(closest as u32, 1.0)]
        } else {
            Vec::new()
        }
    }

    /// Finds the strips collecting the charge of a step.
    ///
    /// `pos` is the step's local position, `edep` its deposited energy (MeV)
    /// and `time` its time (ns), which every contribution carries unchanged.
    /// A step without energy, or outside the annulus when one is set, yields
    /// no contribution.
    #[must_use]
    pub fn find_strips(
        &self,
        pos: Position,
        edep: f64,
        time: f64,
        placement: &LayerPlacement,
    ) -> Vec<ChannelContribution> {
        if edep.is_nan() || edep <= 0.0 {
            return Vec::new();
        }

        let (u, v) = placement.to_strip_frame(pos);
        if !self.accepts(u, v) {
            log::trace!("u={u:.4} v={v:.4} outside the sensitive annulus");
            return Vec::new();
        }
        let sigma_td = self.sigma_td(placement.drift_distance(pos));
        let electrons = self.calibration.electrons(edep);

        let contributions: Vec<ChannelContribution> = self
            .share(u, sigma_td, placement)
            .into_iter()
            .map(|(strip, fraction)| ChannelContribution {
                strip,
                fraction,
                electrons: fraction * electrons,
                time,
            })
            .collect();

        log::trace!(
            "u={u:.4} sigma_td={sigma_td:.4} -> {} strip(s) from {electrons:.1} electrons",
            contributions.len()
        );
        contributions
    }
}
