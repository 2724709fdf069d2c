use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StopId(String);

impl StopId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VehicleId(String);

impl VehicleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RouteId(String);

impl RouteId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A geocoded point. Only constructible through [`Coordinate::new`], which
/// rejects out-of-range latitudes/longitudes before they can reach any
/// distance math.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoreError> {
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return Err(CoreError::InvalidCoordinate { lat, lng });
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub id: StopId,
    pub coordinate: Coordinate,
    /// Assigned by the sequencer; `None` until the owning route has been
    /// optimized.
    pub sequence_index: Option<u32>,
}

impl Stop {
    pub fn new(id: StopId, coordinate: Coordinate) -> Self {
        Self {
            id,
            coordinate,
            sequence_index: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteStatus {
    Planned,
    Optimizing,
    Assigned,
    InProgress,
    Completed,
}

impl RouteStatus {
    /// One-directional chain; `Optimizing` is only reachable from `Planned`.
    fn next(self) -> Option<RouteStatus> {
        match self {
            RouteStatus::Planned => Some(RouteStatus::Optimizing),
            RouteStatus::Optimizing => Some(RouteStatus::Assigned),
            RouteStatus::Assigned => Some(RouteStatus::InProgress),
            RouteStatus::InProgress => Some(RouteStatus::Completed),
            RouteStatus::Completed => None,
        }
    }
}

/// A delivery route. The stop list is mutable only while `Planned`; the
/// sequencer writes the final order and metrics exactly once, on the way
/// from `Optimizing` to `Assigned`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    stops: Vec<Stop>,
    total_distance_km: f64,
    estimated_duration_minutes: f64,
    status: RouteStatus,
}

impl Route {
    pub fn new(id: RouteId, stops: Vec<Stop>) -> Self {
        Self {
            id,
            stops,
            total_distance_km: 0.0,
            estimated_duration_minutes: 0.0,
            status: RouteStatus::Planned,
        }
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn total_distance_km(&self) -> f64 {
        self.total_distance_km
    }

    pub fn estimated_duration_minutes(&self) -> f64 {
        self.estimated_duration_minutes
    }

    pub fn status(&self) -> RouteStatus {
        self.status
    }

    pub fn add_stop(&mut self, stop: Stop) -> Result<(), CoreError> {
        if self.status != RouteStatus::Planned {
            return Err(CoreError::RouteFrozen {
                status: self.status,
            });
        }
        self.stops.push(stop);
        Ok(())
    }

    pub fn remove_stop(&mut self, id: &StopId) -> Result<Option<Stop>, CoreError> {
        if self.status != RouteStatus::Planned {
            return Err(CoreError::RouteFrozen {
                status: self.status,
            });
        }
        match self.stops.iter().position(|s| &s.id == id) {
            Some(idx) => Ok(Some(self.stops.remove(idx))),
            None => Ok(None),
        }
    }

    pub fn transition_to(&mut self, to: RouteStatus) -> Result<(), CoreError> {
        if self.status.next() != Some(to) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Installs the sequenced stop order and aggregate metrics. Only legal
    /// while `Optimizing`, which the status machine makes reachable once.
    pub fn set_sequence(
        &mut self,
        ordered: Vec<Stop>,
        total_distance_km: f64,
        estimated_duration_minutes: f64,
    ) -> Result<(), CoreError> {
        if self.status != RouteStatus::Optimizing {
            return Err(CoreError::RouteFrozen {
                status: self.status,
            });
        }
        self.stops = ordered;
        self.total_distance_km = total_distance_km;
        self.estimated_duration_minutes = estimated_duration_minutes;
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehiclePosition {
    pub vehicle_id: VehicleId,
    pub coordinate: Coordinate,
    pub speed_kmh: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// An out-of-band occurrence (delay, deviation, breakdown) reported against
/// a vehicle. Accumulates for the life of the active route.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogisticsEvent {
    pub vehicle_id: VehicleId,
    pub severity: Severity,
    pub impact_minutes: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// The published prediction. `confidence` is a self-assessed reliability
/// score in [50, 100], not a probability; 50 doubles as the sentinel for
/// "input not understood".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictedEta {
    pub time: String,
    pub confidence: u8,
}

impl PredictedEta {
    pub const MIN_CONFIDENCE: u8 = 50;
    pub const MAX_CONFIDENCE: u8 = 100;

    /// Clamps an intermediate score into the legal band.
    pub fn clamped(time: String, confidence: i32) -> Self {
        let confidence = confidence
            .clamp(Self::MIN_CONFIDENCE as i32, Self::MAX_CONFIDENCE as i32)
            as u8;
        Self { time, confidence }
    }

    pub fn delivered() -> Self {
        Self {
            time: "Delivered".to_string(),
            confidence: Self::MAX_CONFIDENCE,
        }
    }
}
