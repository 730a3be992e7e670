//! `symbol -> broker -> BrokerState` routing, plus the published-snapshot
//! pointer swap (spec §3, §4.1, §5).
//!
//! Each `BrokerState` is wrapped in its own `parking_lot::Mutex` so that
//! ingestion on one broker never blocks ingestion on another; the outer map
//! uses a `parking_lot::RwLock` taken for write only when a new
//! `(symbol, broker)` pair is first seen, matching the teacher's "fast
//! synchronization primitives" choice throughout `main.rs`.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, RwLock};

use crate::broker_state::BrokerState;
use crate::clock;
use crate::snapshot::AnalysisSnapshot;

pub type SharedBrokerState = Arc<Mutex<BrokerState>>;

#[derive(Default)]
pub struct StateRegistry {
    symbols: RwLock<HashMap<String, HashMap<String, SharedBrokerState>>>,
    published: ArcSwap<AnalysisSnapshot>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self {
            symbols: RwLock::new(HashMap::new()),
            published: ArcSwap::from_pointee(AnalysisSnapshot::empty()),
        }
    }

    /// Returns the `BrokerState` for `(symbol, broker)`, creating it on
    /// first sighting. The returned handle is stable for the process
    /// lifetime: entries are never removed, only their ring buffers evict.
    pub fn route(&self, symbol: &str, broker: &str) -> SharedBrokerState {
        if let Some(existing) = self
            .symbols
            .read()
            .get(symbol)
            .and_then(|brokers| brokers.get(broker))
        {
            return existing.clone();
        }

        let mut symbols = self.symbols.write();
        let brokers = symbols.entry(symbol.to_string()).or_default();
        brokers
            .entry(broker.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(BrokerState::new(
                    broker.to_string(),
                    symbol.to_string(),
                    clock::now_seconds(),
                )))
            })
            .clone()
    }

    /// Snapshot view used by the analysis pass: one clone of the
    /// `Arc<Mutex<..>>` handles per symbol, taken under the read lock.
    pub fn enumerate_by_symbol(&self) -> HashMap<String, Vec<SharedBrokerState>> {
        self.symbols
            .read()
            .iter()
            .map(|(symbol, brokers)| (symbol.clone(), brokers.values().cloned().collect()))
            .collect()
    }

    pub fn publish_snapshot(&self, snapshot: AnalysisSnapshot) {
        self.published.store(Arc::new(snapshot));
    }

    pub fn read_snapshot(&self) -> Arc<AnalysisSnapshot> {
        self.published.load_full()
    }
}
