use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender};
use log::{debug, warn};
use rand_xoshiro::Xoshiro256PlusPlus;

use dispatch_core::{
    geo, LogisticsEvent, Route, RouteStatus, Severity, VehicleId, VehiclePosition,
};
use dispatch_eta::{format_eta_minutes, AnomalySignal, Predictor};
use dispatch_sequencer::estimate_duration_minutes;

use crate::board::EtaBoard;

/// A vehicle within this distance of its next stop is considered to have
/// served it.
pub const ARRIVAL_RADIUS_KM: f64 = 0.2;

pub(crate) enum Command {
    Position(VehiclePosition),
    Event(LogisticsEvent),
    Complete,
    /// Barrier: acknowledged once every command queued before it has been
    /// processed.
    Sync(Sender<()>),
}

/// Single writer for one vehicle's mutable state. Only this worker ever
/// touches the held position, the anomaly log, or the route's live status,
/// so no locking is needed beyond the mailbox itself.
pub(crate) struct VehicleWorker {
    vehicle_id: VehicleId,
    route: Route,
    /// Index into the sequenced stop list; everything before it is served.
    next_stop: usize,
    last_position: Option<VehiclePosition>,
    events: Vec<LogisticsEvent>,
    predictor: Predictor,
    rng: Xoshiro256PlusPlus,
    board: Arc<EtaBoard>,
}

impl VehicleWorker {
    pub(crate) fn new(
        vehicle_id: VehicleId,
        route: Route,
        predictor: Predictor,
        rng: Xoshiro256PlusPlus,
        board: Arc<EtaBoard>,
    ) -> Self {
        Self {
            vehicle_id,
            route,
            next_stop: 0,
            last_position: None,
            events: Vec::new(),
            predictor,
            rng,
            board,
        }
    }

    /// Drains the mailbox until the route completes or every sender is
    /// gone (coordinator shutdown). In-flight commands always finish.
    pub(crate) fn run(mut self, mailbox: Receiver<Command>) {
        for command in mailbox {
            match command {
                Command::Position(pos) => self.on_position(pos),
                Command::Event(event) => self.on_event(event),
                Command::Sync(ack) => {
                    let _ = ack.send(());
                }
                Command::Complete => {
                    self.on_complete();
                    break;
                }
            }
        }
    }

    fn on_position(&mut self, pos: VehiclePosition) {
        if let Some(held) = &self.last_position {
            // Last-write-wins by recording time; an out-of-order arrival
            // never rolls the state back.
            if pos.recorded_at <= held.recorded_at {
                debug!(
                    "vehicle {}: stale position ({} <= {}), dropped",
                    self.vehicle_id.as_str(),
                    pos.recorded_at,
                    held.recorded_at
                );
                return;
            }
        }
        let recorded_at = pos.recorded_at;
        self.last_position = Some(pos);
        self.advance_past_served_stops();
        self.republish(recorded_at);
    }

    fn on_event(&mut self, event: LogisticsEvent) {
        let severity = event.severity;
        let created_at = event.created_at;
        self.events.push(event);
        if severity == Severity::Critical {
            warn!(
                "vehicle {}: critical anomaly, recomputing without position",
                self.vehicle_id.as_str()
            );
            self.republish(created_at);
        }
    }

    fn on_complete(&mut self) {
        if let Err(err) = self.route.transition_to(RouteStatus::Completed) {
            warn!(
                "vehicle {}: completion rejected: {err}",
                self.vehicle_id.as_str()
            );
            return;
        }
        // Anomalies live only as long as the active route.
        self.events.clear();
        self.board
            .publish(self.route.id.clone(), dispatch_core::PredictedEta::delivered());
    }

    fn advance_past_served_stops(&mut self) {
        let Some(pos) = &self.last_position else {
            return;
        };
        let stops = self.route.stops();
        while self.next_stop < stops.len()
            && geo::distance_km(pos.coordinate, stops[self.next_stop].coordinate)
                <= ARRIVAL_RADIUS_KM
        {
            debug!(
                "vehicle {}: reached stop {}",
                self.vehicle_id.as_str(),
                stops[self.next_stop].id.as_str()
            );
            self.next_stop += 1;
        }
    }

    /// Remaining distance: current position to the next unserved stop, plus
    /// the untraveled planned legs after it.
    fn remaining_km(&self) -> f64 {
        let stops = self.route.stops();
        let Some(pos) = &self.last_position else {
            return self.route.total_distance_km();
        };
        if self.next_stop >= stops.len() {
            return 0.0;
        }
        let mut km = geo::distance_km(pos.coordinate, stops[self.next_stop].coordinate);
        km += stops[self.next_stop..]
            .windows(2)
            .map(|pair| geo::distance_km(pair[0].coordinate, pair[1].coordinate))
            .sum::<f64>();
        km
    }

    fn republish(&mut self, now: DateTime<Utc>) {
        let nominal_minutes = match &self.last_position {
            Some(_) => {
                let remaining_stops = self.route.stops().len() - self.next_stop;
                estimate_duration_minutes(self.remaining_km(), remaining_stops)
            }
            // A critical anomaly can arrive before the first fix; fall back
            // to the planned duration.
            None => self.route.estimated_duration_minutes(),
        };
        let nominal = format_eta_minutes(nominal_minutes.round() as u32);
        let signal = AnomalySignal::from_events(&self.events);
        let eta = self.predictor.predict(
            self.route.status(),
            &nominal,
            now.naive_utc(),
            &signal,
            &mut self.rng,
        );
        self.board.publish(self.route.id.clone(), eta);
    }
}
