//! Periodic driver: runs `AnalysisEngine` then `ScoringEngine` over every
//! symbol on a fixed cadence and publishes the result (spec §4.7).
//!
//! Mirrors the teacher's periodic-task shape in `main.rs` (a
//! `tokio::time::interval` loop spawned alongside the axum server) and its
//! rule that a single symbol's failure must not kill the loop — here
//! enforced with `std::panic::catch_unwind` around each symbol's pass,
//! matching spec §7's "Analysis-loop exception: logged ... loop continues".

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::analysis;
use crate::clock;
use crate::config;
use crate::registry::StateRegistry;
use crate::scoring;
use crate::snapshot::AnalysisSnapshot;

/// Runs the orchestrator loop until `shutdown` resolves. Intended to be
/// spawned as its own task; cancellation is only observed at the 1s sleep
/// boundary, per spec §5.
pub async fn run(registry: Arc<StateRegistry>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(Duration::from_secs(config::ANALYSIS_INTERVAL_SECS));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_pass(&registry);
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

/// One end-to-end pass: analysis -> decay -> scoring -> publish. Exposed
/// separately from `run` so tests can drive a single pass deterministically.
pub fn run_pass(registry: &StateRegistry) {
    let now = clock::now_seconds();
    let by_symbol = registry.enumerate_by_symbol();

    let mut snapshot = AnalysisSnapshot::empty();

    for (symbol, brokers) in by_symbol {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            analysis::analyze_symbol(&brokers, now);
            for b in &brokers {
                b.lock().apply_penalty_decay(now);
            }
            scoring::score_symbol(&brokers, now)
        }));

        match result {
            Ok(kpis) => {
                snapshot.symbols.insert(symbol, kpis);
            }
            Err(panic) => {
                let msg = panic
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("<non-string panic payload>");
                error!(symbol = %symbol, error = msg, "analysis pass failed for symbol, skipping");
            }
        }
    }

    registry.publish_snapshot(snapshot);
}

/// Logged once at startup so operators can see the cadence without reading
/// source.
pub fn log_startup() {
    info!(
        interval_s = config::ANALYSIS_INTERVAL_SECS,
        "orchestrator starting"
    );
}
