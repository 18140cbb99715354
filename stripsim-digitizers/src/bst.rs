//! Barrel silicon tracker digitizer.
//!
//! Each module carries two strip layers read out whole. The strips of the
//! second layer are tilted by the stereo angle of the geometry; drift happens
//! across the sensor thickness towards the strip side.

use crate::digitizer::{DetectorFamily, StripDigitizer};

/// Barrel silicon tracker family.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bst;

impl DetectorFamily for Bst {
    const NAME: &'static str = "bst";
    const IDENTIFIERS: &'static [&'static str] = &["sector", "layer", "module", "strip"];
}

/// Digitizer for barrel silicon tracker hits.
pub type BstDigitizer = StripDigitizer<Bst>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digitizer::{Digitizer, NO_STRIP};
    use approx::assert_relative_eq;
    use std::sync::Arc;
    use stripsim_core::calibration::CalibrationRecord;
    use stripsim_core::geometry::{LayerPlacement, StripPlaneGeometry};
    use stripsim_core::hit::{Identity, Position, Step};
    use stripsim_core::pulse::PulseShape;

    fn calibration() -> Arc<CalibrationRecord> {
        Arc::new(CalibrationRecord {
            run: 11,
            variation: "default".to_string(),
            rmin: 0.0,
            rmax: 20.0,
            pitch: 0.156,
            nstrips: 256,
            nb_sigma: 2,
            sigma_0: 0.01,
            sigma_td_max: 0.02,
            w_i: 3.6e-6,
            pulse: PulseShape::new(10.0, 6.0, 24.0, 100.0),
        })
    }

    fn geometry() -> StripPlaneGeometry {
        StripPlaneGeometry::new()
            .with_layer(1, LayerPlacement::new(0.0, 0.0, -0.16))
            .with_layer(2, LayerPlacement::new(3f64.to_radians(), 0.0, 0.16))
    }

    #[test]
    fn test_process_id_refines_strip() {
        let digitizer = BstDigitizer::new().with_calibration(calibration());
        let identity = Identity::from_pairs([("sector", 4), ("layer", 1), ("module", 2)]);
        // Center of strip index 128 with almost no diffusion.
        let step = Step::new(Position::new(0.078, 5.0, -0.16), 0.1, 3.0);

        let ids = digitizer.process_id(&identity, &step, &geometry()).unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].get("strip"), Some(129));
        assert_eq!(ids[0].get("module"), Some(2));
        assert_relative_eq!(ids[0].sharing, 1.0);
        assert_eq!(ids[0].get("half"), None);
    }

    #[test]
    fn test_process_id_shares_between_neighbours() {
        let digitizer = BstDigitizer::new().with_calibration(calibration());
        let identity = Identity::from_pairs([("sector", 4), ("layer", 1), ("module", 2)]);
        // On the boundary between strips 127 and 128, full diffusion.
        let step = Step::new(Position::new(0.0, 5.0, 0.16), 0.1, 3.0);

        let ids = digitizer.process_id(&identity, &step, &geometry()).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].get("strip"), Some(128));
        assert_eq!(ids[1].get("strip"), Some(129));
        assert_relative_eq!(ids[0].sharing, 0.5, epsilon = 1e-9);
        assert_relative_eq!(ids[0].sharing + ids[1].sharing, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_process_id_outside_sensor() {
        let digitizer = BstDigitizer::new().with_calibration(calibration());
        let identity = Identity::from_pairs([("sector", 1), ("layer", 1), ("module", 1)]);
        let step = Step::new(Position::new(40.0, 0.0, -0.16), 0.1, 3.0);

        let ids = digitizer.process_id(&identity, &step, &geometry()).unwrap();
        assert_eq!(ids.len(), 1);
        assert_eq!(ids[0].get("strip"), Some(NO_STRIP));
    }

    #[test]
    fn test_identifiers() {
        let digitizer = BstDigitizer::new();
        assert_eq!(digitizer.name(), "bst");
        assert_eq!(digitizer.identifiers().last(), Some(&"strip"));
    }
}
