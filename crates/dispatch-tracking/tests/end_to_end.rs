//! Drives a sequenced route through the live tracking coordinator the way
//! the surrounding dispatch service would: plan, optimize, assign, stream
//! fixes, complete.

use chrono::{DateTime, TimeZone, Utc};

use dispatch_core::{
    Coordinate, PredictedEta, Route, RouteId, RouteStatus, Stop, StopId, VehicleId,
    VehiclePosition,
};
use dispatch_eta::{parse_eta_minutes, PredictorConfig};
use dispatch_tracking::Coordinator;

fn stop(id: &str, lat: f64, lng: f64) -> Stop {
    Stop::new(StopId::new(id), Coordinate::new(lat, lng).unwrap())
}

fn ts(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 14, hour, minute, 0).unwrap()
}

fn fix(lat: f64, lng: f64, at: DateTime<Utc>) -> VehiclePosition {
    VehiclePosition {
        vehicle_id: VehicleId::new("van-7"),
        coordinate: Coordinate::new(lat, lng).unwrap(),
        speed_kmh: 80.0,
        recorded_at: at,
    }
}

#[test]
fn a_delivery_run_from_planning_to_delivered() {
    // Stops arrive unordered; the greedy walk from Belgrade picks Novi Sad
    // before Ljubljana.
    let mut route = Route::new(
        RouteId::new("balkan-run"),
        vec![
            stop("belgrade", 44.8176, 20.4633),
            stop("ljubljana", 46.0569, 14.5058),
            stop("novi-sad", 45.2671, 19.8335),
        ],
    );
    dispatch_sequencer::optimize(&mut route).unwrap();
    assert_eq!(route.status(), RouteStatus::Assigned);
    let ordered: Vec<&str> = route.stops().iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ordered, vec!["belgrade", "novi-sad", "ljubljana"]);
    assert!((route.total_distance_km() - 493.5).abs() < 3.0);

    // Deterministic predictions: no noise, weather never adverse.
    let config = PredictorConfig {
        noise_minutes: 0.0,
        adverse_weather_threshold: 2.0,
        ..PredictorConfig::default()
    };
    let coordinator = Coordinator::new(config, 2024);
    let vehicle = VehicleId::new("van-7");
    let route_id = RouteId::new("balkan-run");
    coordinator.assign(vehicle.clone(), route).unwrap();

    // Departure fix on the first stop: two stops and both legs remain.
    coordinator
        .report_position(fix(44.8176, 20.4633, ts(10, 0)))
        .unwrap();
    coordinator.sync(&vehicle).unwrap();
    let at_belgrade = coordinator.latest_eta(&route_id).unwrap();
    assert_eq!(at_belgrade.time, "12h 30m");

    // Reaching Novi Sad sheds the first leg and one dwell.
    coordinator
        .report_position(fix(45.2671, 19.8335, ts(11, 30)))
        .unwrap();
    coordinator.sync(&vehicle).unwrap();
    let at_novi_sad = coordinator.latest_eta(&route_id).unwrap();
    assert_eq!(at_novi_sad.time, "10h 40m");

    // Final stop served: nothing remains.
    coordinator
        .report_position(fix(46.0569, 14.5058, ts(20, 15)))
        .unwrap();
    coordinator.sync(&vehicle).unwrap();
    let at_ljubljana = coordinator.latest_eta(&route_id).unwrap();
    assert_eq!(at_ljubljana.time, "0m");

    let remaining: Vec<u32> = [&at_belgrade, &at_novi_sad, &at_ljubljana]
        .iter()
        .map(|eta| parse_eta_minutes(&eta.time).unwrap())
        .collect();
    assert!(remaining[0] > remaining[1] && remaining[1] > remaining[2]);
    assert!(at_belgrade.confidence <= at_novi_sad.confidence);
    assert!(at_novi_sad.confidence <= at_ljubljana.confidence);

    coordinator.complete(&vehicle).unwrap();
    assert_eq!(
        coordinator.latest_eta(&route_id).unwrap(),
        PredictedEta::delivered()
    );
}
