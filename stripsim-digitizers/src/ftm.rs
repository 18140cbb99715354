//! Forward tagger micromegas digitizer.
//!
//! Disks with a central beam hole carry two orthogonal strip layers. Strips
//! crossing the hole are cut in two and each half is read out on its own
//! channel; the strip identifier is shared and a `half` identifier tells the
//! halves apart. Deposits in the hole or beyond the outer radius are not
//! collected. Ionization electrons drift across the conversion gap and
//! spread transversally on the way.

use crate::digitizer::{DetectorFamily, StripDigitizer};

/// Forward tagger micromegas family.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ftm;

impl DetectorFamily for Ftm {
    const NAME: &'static str = "ftm";
    const IDENTIFIERS: &'static [&'static str] = &["sector", "layer", "strip", "half"];
    const SPLIT_HALF_STRIPS: bool = true;
    const ANNULAR: bool = true;
}

/// Digitizer for forward tagger micromegas hits.
pub type FtmDigitizer = StripDigitizer<Ftm>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digitizer::{half_code, Digitizer};
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;
    use std::sync::Arc;
    use stripsim_core::calibration::CalibrationRecord;
    use stripsim_core::channel::StripHalf;
    use stripsim_core::geometry::{LayerPlacement, StripPlaneGeometry};
    use stripsim_core::hit::{Hit, Identity, Position, Step};
    use stripsim_core::pulse::PulseShape;

    fn calibration() -> Arc<CalibrationRecord> {
        Arc::new(CalibrationRecord {
            run: 3,
            variation: "default".to_string(),
            rmin: 4.0,
            rmax: 25.0,
            pitch: 0.5,
            nstrips: 100,
            nb_sigma: 3,
            sigma_0: 0.2,
            sigma_td_max: 0.6,
            w_i: 2.6e-5,
            pulse: PulseShape::new(20.0, 30.0, 90.0, 5.0),
        })
    }

    fn geometry() -> Arc<StripPlaneGeometry> {
        Arc::new(
            StripPlaneGeometry::new()
                .with_layer(1, LayerPlacement::new(0.0, 0.0, -1.0))
                .with_layer(2, LayerPlacement::new(FRAC_PI_2, 0.0, -1.0)),
        )
    }

    #[test]
    fn test_half_strips_in_hole_band() {
        let digitizer = FtmDigitizer::new().with_calibration(calibration());
        let identity = Identity::from_pairs([("sector", 1), ("layer", 1)]);

        let below = Step::new(Position::new(0.25, -10.0, 0.0), 0.01, 1.0);
        let ids = digitizer.process_id(&identity, &below, geometry().as_ref()).unwrap();
        assert!(ids.len() >= 3);
        assert!(ids
            .iter()
            .all(|id| id.get("half") == Some(half_code(StripHalf::Low))));

        let above = Step::new(Position::new(0.25, 10.0, 0.0), 0.01, 1.0);
        let ids = digitizer.process_id(&identity, &above, geometry().as_ref()).unwrap();
        assert!(ids
            .iter()
            .all(|id| id.get("half") == Some(half_code(StripHalf::High))));
    }

    #[test]
    fn test_full_strips_outside_hole_band() {
        let digitizer = FtmDigitizer::new().with_calibration(calibration());
        let identity = Identity::from_pairs([("sector", 1), ("layer", 1)]);
        let step = Step::new(Position::new(15.25, 3.0, 0.0), 0.01, 1.0);

        let ids = digitizer.process_id(&identity, &step, geometry().as_ref()).unwrap();
        assert!(ids
            .iter()
            .all(|id| id.get("half") == Some(half_code(StripHalf::Full))));
        let total: f64 = ids.iter().map(|id| id.sharing).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_rotated_layer_measures_y() {
        let digitizer = FtmDigitizer::new().with_calibration(calibration());
        let hit = Hit::new(
            Identity::from_pairs([("sector", 1), ("layer", 2)]),
            vec![Step::new(Position::new(-12.0, 15.25, -1.0), 0.02, 4.0)],
            geometry(),
        );

        let strips = digitizer.multi_dgt(&hit).unwrap();
        assert_eq!(strips.len(), 1);
        // y = 15.25 is the center of strip 80; no drift, no spread.
        assert_eq!(strips[0].channel.strip, 80);
        assert_eq!(strips[0].channel.layer, 2);
        assert_eq!(strips[0].channel.half, StripHalf::Full);
        assert_relative_eq!(strips[0].charge, 0.02 / 2.6e-5, max_relative = 1e-12);
    }
}
