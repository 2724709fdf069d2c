use dispatch_core::{geo, CoreError, Route, RouteStatus, Stop};
use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Average driving speed assumed by the duration model.
pub const AVERAGE_SPEED_KMH: f64 = 40.0;

/// Fixed dwell time per stop (parking, handover, signature).
pub const STOP_DWELL_MINUTES: f64 = 5.0;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SequenceError {
    #[error("route is not plannable: {0}")]
    Route(#[from] CoreError),
}

/// Result of sequencing one route's stops. This is the shape handed to the
/// surrounding service once per optimization, so it serializes as-is.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SequencedRoute {
    pub stops: Vec<Stop>,
    pub total_distance_km: f64,
    pub estimated_duration_minutes: f64,
}

/// Orders stops with a nearest-neighbor heuristic, starting from the first
/// stop in the input. Two or fewer stops are returned in input order: there
/// is nothing to gain from reordering them.
///
/// Ties are broken by input order, so the result is deterministic. The tour
/// is a greedy approximation, not an optimum; the duration model downstream
/// is calibrated against its typical length.
pub fn sequence(stops: &[Stop]) -> SequencedRoute {
    let ordered = if stops.len() <= 2 {
        stops.to_vec()
    } else {
        nearest_neighbor_order(stops)
    };

    let total_distance_km = tour_length_km(&ordered);
    let estimated_duration_minutes = estimate_duration_minutes(total_distance_km, ordered.len());

    let stops = ordered
        .into_iter()
        .enumerate()
        .map(|(i, mut stop)| {
            stop.sequence_index = Some(i as u32);
            stop
        })
        .collect();

    SequencedRoute {
        stops,
        total_distance_km,
        estimated_duration_minutes,
    }
}

/// Drives a route through `Planned -> Optimizing -> Assigned`, installing
/// the sequenced order and metrics exactly once. Re-invoking for a route
/// already past `Planned` is an error; the result is write-once for the
/// route's lifetime.
pub fn optimize(route: &mut Route) -> Result<(), SequenceError> {
    route.transition_to(RouteStatus::Optimizing)?;

    let sequenced = sequence(route.stops());
    info!(
        "route {} sequenced: {} stops, {:.1} km, {:.0} min",
        route.id.as_str(),
        sequenced.stops.len(),
        sequenced.total_distance_km,
        sequenced.estimated_duration_minutes
    );
    route.set_sequence(
        sequenced.stops,
        sequenced.total_distance_km,
        sequenced.estimated_duration_minutes,
    )?;
    route.transition_to(RouteStatus::Assigned)?;
    Ok(())
}

fn nearest_neighbor_order(stops: &[Stop]) -> Vec<Stop> {
    let mut remaining: Vec<usize> = (1..stops.len()).collect();
    let mut ordered = Vec::with_capacity(stops.len());
    ordered.push(stops[0].clone());

    while !remaining.is_empty() {
        let last = ordered.last().unwrap().coordinate;
        let mut best_pos = 0;
        let mut best_dist = f64::INFINITY;
        for (pos, &idx) in remaining.iter().enumerate() {
            let d = geo::distance_km(last, stops[idx].coordinate);
            // Strict comparison keeps the earliest input index on ties.
            if d < best_dist {
                best_dist = d;
                best_pos = pos;
            }
        }
        let idx = remaining.remove(best_pos);
        ordered.push(stops[idx].clone());
    }

    ordered
}

fn tour_length_km(ordered: &[Stop]) -> f64 {
    ordered
        .windows(2)
        .map(|pair| geo::distance_km(pair[0].coordinate, pair[1].coordinate))
        .sum()
}

/// Linear travel-plus-dwell model. Does not account for traffic, road
/// topology, or delivery time windows.
pub fn estimate_duration_minutes(distance_km: f64, stop_count: usize) -> f64 {
    (distance_km / AVERAGE_SPEED_KMH) * 60.0 + stop_count as f64 * STOP_DWELL_MINUTES
}
