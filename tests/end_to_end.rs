// tests/end_to_end.rs

use approx::{assert_abs_diff_eq, assert_relative_eq};
use pothole_localizer::estimation::{
    contact_point, CamIntrinsics, GroundProjector, MountHeight, PitchFuser, ProjectionLimits,
};
use pothole_localizer::types::{BoundingBox, PixelPoint, TrackedBox};
use pothole_localizer::{Config, EstimatorError, FrameInput, FrameOrchestrator};

fn default_projector() -> GroundProjector {
    let config = Config::default();
    let mut projector = GroundProjector::new(
        CamIntrinsics::from_config(&config.camera).unwrap(),
        MountHeight::new(config.camera.height_m).unwrap(),
        ProjectionLimits::default(),
    );
    projector.update_theta_cache(15f64.to_radians());
    projector
}

fn expected_distance(v: f64) -> f64 {
    let theta = 15f64.to_radians();
    let yn = (v - 240.0) / 600.0;
    1.5 * theta.cos() / (theta.sin() + yn * theta.cos())
}

#[test]
fn test_ideal_straight_ahead() {
    let g = default_projector()
        .distance_from_pixel(PixelPoint::new(320.0, 400.0))
        .unwrap();
    assert_relative_eq!(g.distance_m, expected_distance(400.0), epsilon = 1e-12);
    assert_eq!(g.lateral_m, 0.0);
}

#[test]
fn test_lateral_offset() {
    let p = default_projector();
    let center = p.distance_from_pixel(PixelPoint::new(320.0, 400.0)).unwrap();
    let g = p.distance_from_pixel(PixelPoint::new(500.0, 400.0)).unwrap();
    assert_eq!(g.distance_m, center.distance_m);
    assert_relative_eq!(g.lateral_m, g.distance_m * 180.0 / 600.0, epsilon = 1e-12);
    assert_relative_eq!(g.lateral_m, 0.8417, epsilon = 1e-3);
}

#[test]
fn test_near_horizon() {
    let p = default_projector();
    let g = p.distance_from_pixel(PixelPoint::new(320.0, 100.0)).unwrap();
    assert_relative_eq!(g.distance_m, 43.33, epsilon = 0.05);

    let v_h = 240.0 - 600.0 * 15f64.to_radians().tan();
    assert_abs_diff_eq!(v_h, 79.2, epsilon = 0.1);
    assert!(matches!(
        p.distance_from_pixel(PixelPoint::new(320.0, v_h)),
        Err(EstimatorError::GeometryInvalid { .. })
    ));
}

#[test]
fn test_fuser_propagation_and_vision_blend() {
    let mut f = PitchFuser::new(0.985).unwrap();
    f.initialize(0.2618);
    for _ in 0..10 {
        f.propagate(0.1, 0.01);
    }
    assert_abs_diff_eq!(f.theta().unwrap(), 0.2718, epsilon = 1e-14);

    let mut f = PitchFuser::new(0.985).unwrap();
    f.initialize(0.2618);
    f.vision_update(0.30, 0.5);
    assert_relative_eq!(f.theta().unwrap(), 0.26209, epsilon = 1e-5);

    // Full confidence leaves θ untouched.
    f.vision_update(1.0, 1.0);
    assert_relative_eq!(f.theta().unwrap(), 0.26209, epsilon = 1e-5);
}

#[test]
fn test_full_orchestrated_frame() {
    let bbox = BoundingBox::new(300, 380, 40, 30);
    assert_eq!(contact_point(&bbox, 480, 2.0), PixelPoint::new(320.0, 411.0));

    let mut orchestrator = FrameOrchestrator::new(&Config::default()).unwrap();
    let tracks = [TrackedBox {
        id: 17,
        x1: 300.0,
        y1: 380.0,
        x2: 340.0,
        y2: 410.0,
    }];
    let out = orchestrator.process_frame(&FrameInput {
        frame: 250,
        timestamp_s: 8.3,
        timestamp_ms: 1_700_000_008_300,
        image_height: 480,
        tracks: &tracks,
        imu: None,
        vision: None,
    });

    assert_eq!(out.detections.len(), 1);
    let det = &out.detections[0];
    assert_eq!(det.track_id, 17);
    assert_eq!(det.frame, 250);
    assert_eq!(det.timestamp_ms, 1_700_000_008_300);
    assert_relative_eq!(det.distance_m, expected_distance(411.0), epsilon = 1e-9);
    assert_eq!(det.lateral_m, 0.0);
    assert_relative_eq!(det.theta_deg, 15.0, epsilon = 1e-9);
}

#[test]
fn test_clamps_hold_across_image() {
    let p = default_projector();
    let limits = *p.limits();
    for v in (0..480).step_by(7) {
        for u in (-2000..2640).step_by(97) {
            if let Ok(g) = p.distance_from_pixel(PixelPoint::new(u as f64, v as f64)) {
                assert!(g.distance_m >= limits.min_distance_m);
                assert!(g.distance_m <= limits.max_distance_m);
                assert!(g.lateral_m.abs() <= limits.max_lateral_m);
            }
        }
    }
}
