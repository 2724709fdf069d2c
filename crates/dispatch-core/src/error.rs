use thiserror::Error;

use crate::models::RouteStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    #[error("coordinate out of range: lat {lat}, lng {lng}")]
    InvalidCoordinate { lat: f64, lng: f64 },

    #[error("invalid route status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: RouteStatus, to: RouteStatus },

    #[error("route stop list is frozen in status {status:?}")]
    RouteFrozen { status: RouteStatus },
}
