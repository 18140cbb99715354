#![allow(clippy::float_cmp)]
use std::sync::Arc;

use approx::assert_relative_eq;
use stripsim_core::calibration::CalibrationRecord;
use stripsim_core::geometry::{LayerPlacement, StripPlaneGeometry};
use stripsim_core::hit::{Hit, Identity, Position, Step};
use stripsim_core::pulse::PulseShape;
use stripsim_digitizers::{Digitizer, FtmDigitizer, NO_STRIP};

const W_I: f64 = 3.6e-5;

// Disk of radius 25 mm with a 5 mm hole; strips span the full diameter.
fn digitizer() -> FtmDigitizer {
    FtmDigitizer::new().with_calibration(Arc::new(CalibrationRecord {
        run: 2,
        variation: "default".to_string(),
        rmin: 5.0,
        rmax: 25.0,
        pitch: 0.5,
        nstrips: 100,
        nb_sigma: 3,
        sigma_0: 0.2,
        sigma_td_max: 1.0,
        w_i: W_I,
        pulse: PulseShape::new(20.0, 30.0, 90.0, 5.0),
    }))
}

fn geometry() -> Arc<StripPlaneGeometry> {
    Arc::new(StripPlaneGeometry::new().with_layer(1, LayerPlacement::new(0.0, 0.0, -1.0)))
}

fn identity() -> Identity {
    Identity::from_pairs([("sector", 1), ("layer", 1)])
}

fn hit_at(x: f64, y: f64) -> Hit {
    Hit::new(
        identity(),
        vec![Step::new(Position::new(x, y, 0.0), 0.01, 1.0)],
        geometry(),
    )
}

#[test]
fn test_deposit_in_hole_is_not_collected() {
    let digitizer = digitizer();
    let hit = hit_at(0.25, 0.0);

    let ids = digitizer
        .process_id(&identity(), &hit.steps[0], geometry().as_ref())
        .unwrap();
    assert_eq!(ids.len(), 1);
    assert_eq!(ids[0].get("strip"), Some(NO_STRIP));

    assert!(digitizer.charge_time(&hit).unwrap().is_empty());
    assert!(digitizer.multi_dgt(&hit).unwrap().is_empty());
    assert_eq!(digitizer.integrate_dgt(&hit).unwrap().charge, 0.0);
}

#[test]
fn test_deposit_beyond_outer_radius_is_not_collected() {
    let digitizer = digitizer();
    // Inside the strip span across, far outside the disk along the strip.
    let hit = hit_at(0.25, 500.0);

    assert!(digitizer.charge_time(&hit).unwrap().is_empty());
    let digi = digitizer.integrate_dgt(&hit).unwrap();
    assert!(digi.leading.is_none());
    assert_eq!(digi.charge, 0.0);
}

#[test]
fn test_deposit_on_annulus_is_collected() {
    let digitizer = digitizer();
    let hit = hit_at(0.25, 10.0);

    let digi = digitizer.integrate_dgt(&hit).unwrap();
    assert_eq!(digi.leading.unwrap().strip, 50);
    assert_relative_eq!(digi.charge, 0.01 / W_I, max_relative = 1e-6);
}

#[test]
fn test_outer_rim_loses_charge() {
    let digitizer = digitizer();
    // r = 24.82 mm, on the last strip.
    let hit = hit_at(24.75, 1.8);

    let charge = digitizer.integrate_dgt(&hit).unwrap().charge;
    let full = 0.01 / W_I;
    assert!(charge < 0.95 * full, "{charge} of {full}");
    assert!(charge > 0.85 * full, "{charge} of {full}");
}

#[test]
fn test_identifiers_include_half() {
    let digitizer = digitizer();
    assert_eq!(digitizer.identifiers(), &["sector", "layer", "strip", "half"]);

    let step = Step::new(Position::new(0.25, 10.0, 0.0), 0.01, 1.0);
    let ids = digitizer
        .process_id(&identity(), &step, geometry().as_ref())
        .unwrap();
    for id in &ids {
        let names: Vec<&str> = id.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, digitizer.identifiers());
    }
}
