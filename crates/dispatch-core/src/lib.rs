mod error;
pub mod geo;
mod models;

pub use error::CoreError;
pub use models::{
    Coordinate, LogisticsEvent, PredictedEta, Route, RouteId, RouteStatus, Severity, Stop, StopId,
    VehicleId, VehiclePosition,
};
