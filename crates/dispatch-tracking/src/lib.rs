mod board;
mod worker;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, unbounded, Sender};
use log::info;
use rand_xoshiro::rand_core::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use thiserror::Error;

use dispatch_core::{
    LogisticsEvent, PredictedEta, Route, RouteId, RouteStatus, VehicleId, VehiclePosition,
};
use dispatch_eta::{Predictor, PredictorConfig};

pub use board::EtaBoard;
pub use worker::ARRIVAL_RADIUS_KM;

use worker::{Command, VehicleWorker};

#[derive(Error, Debug)]
pub enum TrackingError {
    #[error("no active route for vehicle {0:?}")]
    UnknownVehicle(VehicleId),

    #[error("vehicle {0:?} already has an active route")]
    AlreadyAssigned(VehicleId),

    #[error("route {route:?} cannot start tracking from status {status:?}")]
    NotAssignable { route: RouteId, status: RouteStatus },

    #[error("coordinator is shut down")]
    ShutDown,

    #[error("failed to spawn worker for vehicle {vehicle:?}: {source}")]
    Spawn {
        vehicle: VehicleId,
        source: std::io::Error,
    },
}

struct VehicleHandle {
    sender: Sender<Command>,
    join: JoinHandle<()>,
}

struct Registry {
    vehicles: HashMap<VehicleId, VehicleHandle>,
    /// Master generator; each worker takes a clone and the master jumps to
    /// the next independent stream.
    rng: Xoshiro256PlusPlus,
    shut_down: bool,
}

/// Orchestrates live tracking for many vehicles at once.
///
/// Each assigned vehicle gets its own worker thread fed over a channel, so
/// updates for one vehicle are strictly serialized while different vehicles
/// never block each other. The coordinator itself holds no per-vehicle
/// mutable state; it only routes commands and reads the published board.
pub struct Coordinator {
    board: Arc<EtaBoard>,
    predictor: Predictor,
    registry: Mutex<Registry>,
}

impl Coordinator {
    /// `seed` drives every stochastic effect in the predictions; the same
    /// seed, configuration, and command sequence reproduce the same output.
    pub fn new(config: PredictorConfig, seed: u64) -> Self {
        Self {
            board: Arc::new(EtaBoard::default()),
            predictor: Predictor::new(config),
            registry: Mutex::new(Registry {
                vehicles: HashMap::new(),
                rng: Xoshiro256PlusPlus::seed_from_u64(seed),
                shut_down: false,
            }),
        }
    }

    /// Starts tracking `route` (which must already be sequenced, i.e. in
    /// `Assigned`) for `vehicle_id`, moving it to `InProgress`.
    pub fn assign(&self, vehicle_id: VehicleId, mut route: Route) -> Result<(), TrackingError> {
        let mut registry = self.lock_registry()?;
        if registry.vehicles.contains_key(&vehicle_id) {
            return Err(TrackingError::AlreadyAssigned(vehicle_id));
        }
        if route.transition_to(RouteStatus::InProgress).is_err() {
            return Err(TrackingError::NotAssignable {
                route: route.id.clone(),
                status: route.status(),
            });
        }

        let rng = registry.rng.clone();
        registry.rng.jump();

        let (sender, mailbox) = unbounded();
        let worker = VehicleWorker::new(
            vehicle_id.clone(),
            route,
            self.predictor.clone(),
            rng,
            Arc::clone(&self.board),
        );
        let join = std::thread::Builder::new()
            .name(format!("vehicle-{}", vehicle_id.as_str()))
            .spawn(move || worker.run(mailbox))
            .map_err(|source| TrackingError::Spawn {
                vehicle: vehicle_id.clone(),
                source,
            })?;

        info!("vehicle {} assigned, tracking started", vehicle_id.as_str());
        registry
            .vehicles
            .insert(vehicle_id, VehicleHandle { sender, join });
        Ok(())
    }

    /// Forwards a position fix to the vehicle's worker. Stale fixes are
    /// dropped by the worker, silently from the caller's perspective.
    pub fn report_position(&self, position: VehiclePosition) -> Result<(), TrackingError> {
        let vehicle_id = position.vehicle_id.clone();
        self.send(&vehicle_id, Command::Position(position))
    }

    /// Records an anomaly against the vehicle's active route. A critical
    /// anomaly triggers an immediate republish even without a fresh fix.
    pub fn report_event(&self, event: LogisticsEvent) -> Result<(), TrackingError> {
        let vehicle_id = event.vehicle_id.clone();
        self.send(&vehicle_id, Command::Event(event))
    }

    /// Marks the vehicle's route delivered, clears its anomaly log, and
    /// retires the worker.
    pub fn complete(&self, vehicle_id: &VehicleId) -> Result<(), TrackingError> {
        let handle = {
            let mut registry = self.lock_registry()?;
            registry
                .vehicles
                .remove(vehicle_id)
                .ok_or_else(|| TrackingError::UnknownVehicle(vehicle_id.clone()))?
        };
        // The worker exits after processing Complete; joining here gives
        // completion read-your-writes semantics.
        let _ = handle.sender.send(Command::Complete);
        drop(handle.sender);
        let _ = handle.join.join();
        Ok(())
    }

    /// Latest published prediction for a route. Atomic snapshot; never a
    /// torn value. Stays readable after completion and shutdown.
    pub fn latest_eta(&self, route_id: &RouteId) -> Option<PredictedEta> {
        self.board.latest(route_id)
    }

    /// Barrier: returns once every update submitted for this vehicle before
    /// the call has been processed.
    pub fn sync(&self, vehicle_id: &VehicleId) -> Result<(), TrackingError> {
        let (ack, done) = bounded(0);
        self.send(vehicle_id, Command::Sync(ack))?;
        let _ = done.recv();
        Ok(())
    }

    /// Stops accepting updates and joins every worker. In-flight commands
    /// are processed, never killed mid-update; the board stays readable.
    pub fn shutdown(&self) {
        let handles: Vec<VehicleHandle> = {
            let mut registry = self
                .registry
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            registry.shut_down = true;
            registry.vehicles.drain().map(|(_, h)| h).collect()
        };
        for handle in handles {
            // Dropping the sender ends the worker's mailbox loop after it
            // drains what was already queued.
            drop(handle.sender);
            let _ = handle.join.join();
        }
        info!("coordinator shut down");
    }

    fn send(&self, vehicle_id: &VehicleId, command: Command) -> Result<(), TrackingError> {
        let registry = self.lock_registry()?;
        let handle = registry
            .vehicles
            .get(vehicle_id)
            .ok_or_else(|| TrackingError::UnknownVehicle(vehicle_id.clone()))?;
        handle
            .sender
            .send(command)
            .map_err(|_| TrackingError::UnknownVehicle(vehicle_id.clone()))
    }

    fn lock_registry(&self) -> Result<std::sync::MutexGuard<'_, Registry>, TrackingError> {
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        if registry.shut_down {
            return Err(TrackingError::ShutDown);
        }
        Ok(registry)
    }
}
