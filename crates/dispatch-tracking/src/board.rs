use std::collections::HashMap;
use std::sync::RwLock;

use dispatch_core::{PredictedEta, RouteId};

/// The published view of every tracked route's freshest prediction.
///
/// Writers replace the whole `PredictedEta` under the lock, so readers get
/// either the previous or the new value, never a torn mix.
#[derive(Debug, Default)]
pub struct EtaBoard {
    inner: RwLock<HashMap<RouteId, PredictedEta>>,
}

impl EtaBoard {
    pub fn latest(&self, route_id: &RouteId) -> Option<PredictedEta> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        guard.get(route_id).cloned()
    }

    pub(crate) fn publish(&self, route_id: RouteId, eta: PredictedEta) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(route_id, eta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_replaces_whole_value() {
        let board = EtaBoard::default();
        let id = RouteId::new("r1");
        assert_eq!(board.latest(&id), None);

        board.publish(id.clone(), PredictedEta::clamped("1h 5m".into(), 90));
        board.publish(id.clone(), PredictedEta::clamped("55m".into(), 88));
        let eta = board.latest(&id).unwrap();
        assert_eq!(eta.time, "55m");
        assert_eq!(eta.confidence, 88);
    }
}
