//! Transport-agnostic public API (spec §6): `IngestTick`, `IngestSlippage`,
//! `IngestLatency`, `Snapshot`. This is the only surface a transport layer
//! (HTTP, WebSocket, or anything else) is meant to call.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::clock;
use crate::error::IngestOutcome;
use crate::model::{self, OrderType};
use crate::registry::StateRegistry;
use crate::snapshot::AnalysisSnapshot;

pub struct Engine {
    registry: Arc<StateRegistry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickAck {
    pub symbol: String,
    pub broker: String,
    pub current_spread: f64,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(StateRegistry::new()),
        }
    }

    pub fn registry(&self) -> Arc<StateRegistry> {
        self.registry.clone()
    }

    /// Ingests a `(bid, ask)` quote for `(broker, symbol_raw)`. Applies the
    /// normalization rules in spec §4.1 before routing.
    pub fn ingest_tick(&self, broker: &str, symbol_raw: &str, bid_raw: &str, ask_raw: &str) -> IngestOutcome<TickAck> {
        let bid = match parse_decimal(bid_raw) {
            Some(v) => v,
            None => return IngestOutcome::InvalidFormat,
        };
        let ask = match parse_decimal(ask_raw) {
            Some(v) => v,
            None => return IngestOutcome::InvalidFormat,
        };

        let symbol = model::normalize_symbol(symbol_raw);
        let state = self.registry.route(&symbol, broker);
        let current_spread = state.lock().add_tick(bid, ask, clock::now_seconds());

        IngestOutcome::ok(TickAck {
            symbol,
            broker: broker.to_string(),
            current_spread,
        })
    }

    /// Records a simulated order's slippage. A no-op (reported as `ok`) if
    /// the `(symbol, broker)` pair has never seen a tick, matching
    /// `add_simulated_slippage`'s no-op-on-empty-ticks rule.
    pub fn ingest_slippage(
        &self,
        broker: &str,
        symbol_raw: &str,
        order_type: OrderType,
        price_raw: &str,
    ) -> IngestOutcome<()> {
        let price = match parse_decimal(price_raw) {
            Some(v) => v,
            None => return IngestOutcome::InvalidFormat,
        };
        let symbol = model::normalize_symbol(symbol_raw);
        let state = self.registry.route(&symbol, broker);
        state.lock().add_simulated_slippage(order_type, price);
        IngestOutcome::ok(())
    }

    /// Computes `latency = server_now_ms - client_send_time_ms` and records
    /// it if it falls in `0 < latency < 5000`.
    pub fn ingest_latency(&self, broker: &str, symbol_raw: &str, client_send_time_ms: f64) -> IngestOutcome<()> {
        let latency_ms = clock::now_millis() - client_send_time_ms;
        let symbol = model::normalize_symbol(symbol_raw);
        let state = self.registry.route(&symbol, broker);
        state.lock().add_latency_sample(latency_ms);
        IngestOutcome::ok(())
    }

    pub fn snapshot(&self) -> Arc<AnalysisSnapshot> {
        self.registry.read_snapshot()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    model::sanitize_numeric(raw).parse().ok()
}
