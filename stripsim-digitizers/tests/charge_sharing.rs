#![allow(clippy::float_cmp, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
use approx::assert_relative_eq;
use stripsim_core::calibration::CalibrationRecord;
use stripsim_core::geometry::LayerPlacement;
use stripsim_core::hit::Position;
use stripsim_core::pulse::PulseShape;
use stripsim_digitizers::{gaussian_fraction, StripFinder};

// pitch 0.5 mm, 100 strips covering [-25, 25), window of 3 strips each side.
fn calibration() -> CalibrationRecord {
    CalibrationRecord {
        run: 1,
        variation: "default".to_string(),
        rmin: 5.0,
        rmax: 25.0,
        pitch: 0.5,
        nstrips: 100,
        nb_sigma: 3,
        sigma_0: 0.2,
        sigma_td_max: 2.0,
        w_i: 3.6e-5,
        pulse: PulseShape::new(50.0, 12.0, 45.0, 10.0),
    }
}

fn layer() -> LayerPlacement {
    LayerPlacement::new(0.0, 0.0, 0.0)
}

fn total(shares: &[(u32, f64)]) -> f64 {
    shares.iter().map(|s| s.1).sum()
}

#[test]
fn test_worked_example_center_of_strip_50() {
    let cal = calibration();
    let finder = StripFinder::new(&cal);
    let shares = finder.share(0.25, 0.2, &layer());

    let fraction = |strip: u32| {
        shares
            .iter()
            .find(|s| s.0 == strip)
            .map_or(0.0, |s| s.1)
    };

    let largest = shares
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap();
    assert_eq!(largest.0, 50);
    assert!(fraction(50) > 0.6, "central fraction {}", fraction(50));
    assert_relative_eq!(fraction(49), fraction(51), epsilon = 1e-12);
    assert!(fraction(49) + fraction(50) + fraction(51) > 0.99);
    assert_relative_eq!(total(&shares), 1.0, epsilon = 1e-6);
}

#[test]
fn test_charge_conservation_inside_active_area() {
    let cal = calibration();
    let finder = StripFinder::new(&cal);

    for u in [-10.3, -0.01, 0.0, 0.17, 7.49, 20.0] {
        for sigma in [0.05, 0.2, 0.4, 1.0] {
            let shares = finder.share(u, sigma, &layer());
            assert_relative_eq!(total(&shares), 1.0, epsilon = 1e-6);
        }
    }
}

#[test]
fn test_electron_count_matches_deposit() {
    let cal = calibration();
    let finder = StripFinder::new(&cal);
    let placement = LayerPlacement::new(0.0, 0.0, -2.0);

    let edep = 0.003;
    let contributions = finder.find_strips(Position::new(3.1, -4.0, 0.5), edep, 12.0, &placement);
    let electrons: f64 = contributions.iter().map(|c| c.electrons).sum();
    assert_relative_eq!(electrons, edep / cal.w_i, max_relative = 1e-6);
}

#[test]
fn test_monotonic_diffusion() {
    let cal = calibration();
    let finder = StripFinder::new(&cal);

    let mut previous = 0;
    for sigma in [0.01, 0.05, 0.1, 0.2, 0.4, 0.8, 1.6] {
        let count = finder.share(0.1, sigma, &layer()).len();
        assert!(
            count >= previous,
            "sigma {sigma}: {count} strips after {previous}"
        );
        assert!(count <= 2 * cal.nb_sigma as usize + 1);
        previous = count;
    }
    assert_eq!(previous, 7);
}

#[test]
fn test_boundary_determinism() {
    let cal = calibration();
    let finder = StripFinder::new(&cal);

    // -24.5 and 0.0 are exact boundaries: strips 0|1 and 49|50.
    for (u, expected) in [(-24.5, 1), (0.0, 50)] {
        for _ in 0..10 {
            assert_eq!(finder.closest_strip(u, &layer()), expected);
            assert_eq!(finder.share(u, 0.0, &layer()), vec![(expected as u32, 1.0)]);
        }
    }

    let first = finder.share(0.0, 0.2, &layer());
    for _ in 0..10 {
        assert_eq!(finder.share(0.0, 0.2, &layer()), first);
    }
}

#[test]
fn test_edge_truncation() {
    let cal = calibration();
    let finder = StripFinder::new(&cal);
    let sigma = 0.2;

    // Center of the last strip: the cloud tail beyond rmax is lost.
    let u = cal.rmax - cal.pitch / 2.0;
    let shares = finder.share(u, sigma, &layer());
    let lost = gaussian_fraction(cal.rmax, cal.rmax + 1e3, u, sigma);

    assert!(total(&shares) < 1.0);
    assert_relative_eq!(total(&shares), 1.0 - lost, epsilon = 1e-6);
    assert!(shares.iter().all(|s| s.0 < cal.nstrips));
    assert_eq!(shares.last().unwrap().0, 99);

    // Same on the low side.
    let shares = finder.share(-u, sigma, &layer());
    assert_relative_eq!(total(&shares), 1.0 - lost, epsilon = 1e-6);
    assert_eq!(shares.first().unwrap().0, 0);
}

#[test]
fn test_edge_truncation_at_sensor_radius() {
    // Strips span [-25, 25) but the sensor stops at 20 mm.
    let mut cal = calibration();
    cal.rmax = 20.0;
    let finder = StripFinder::new(&cal);
    let sigma = 0.2;

    let u = cal.rmax - cal.pitch / 2.0;
    let shares = finder.share(u, sigma, &layer());
    let lost = gaussian_fraction(cal.rmax, cal.rmax + 1e3, u, sigma);
    assert!(total(&shares) < 1.0);
    assert_relative_eq!(total(&shares), 1.0 - lost, epsilon = 1e-6);
    assert_eq!(shares.last().unwrap().0, 89);

    // Strip 89 ends on rmax; strip 90 lies wholly outside the sensor.
    let shares = finder.share(20.1, sigma, &layer());
    assert!(shares.iter().all(|s| s.0 <= 89));
    assert_relative_eq!(
        total(&shares),
        gaussian_fraction(19.0, 20.0, 20.1, sigma),
        epsilon = 1e-6
    );

    assert!(finder.share(21.0, sigma, &layer()).is_empty());
    assert!(finder.share(-22.0, 0.0, &layer()).is_empty());
    assert_eq!(finder.share(19.9, 0.0, &layer()), vec![(89, 1.0)]);
}

#[test]
fn test_huge_coordinate_yields_nothing() {
    let cal = calibration();
    let finder = StripFinder::new(&cal);
    assert!(finder.share(1e30, 0.2, &layer()).is_empty());
    assert!(finder.share(-1e30, 0.2, &layer()).is_empty());
}

#[test]
fn test_outside_every_window() {
    let cal = calibration();
    let finder = StripFinder::new(&cal);
    assert!(finder.share(100.0, 0.2, &layer()).is_empty());
    assert!(finder.share(-100.0, 0.0, &layer()).is_empty());
    assert!(finder.share(f64::NAN, 0.2, &layer()).is_empty());
}

#[test]
fn test_zero_energy_no_op() {
    let cal = calibration();
    let finder = StripFinder::new(&cal);
    let contributions = finder.find_strips(Position::new(0.25, 0.0, 1.0), 0.0, 3.0, &layer());
    assert!(contributions.is_empty());
}

#[test]
fn test_diffusion_follows_drift_distance() {
    let cal = calibration();
    let finder = StripFinder::new(&cal);
    let placement = LayerPlacement::new(0.0, 0.0, -3.0);

    // On the readout plane: point deposit.
    let near = finder.find_strips(Position::new(0.25, 0.0, -3.0), 0.001, 0.0, &placement);
    assert_eq!(near.len(), 1);
    assert_eq!(near[0].fraction, 1.0);

    // Far from it: shared.
    let far = finder.find_strips(Position::new(0.25, 0.0, 3.0), 0.001, 0.0, &placement);
    assert!(far.len() > 1);
}
