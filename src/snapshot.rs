//! The published analysis result: an immutable value built off to the side
//! and swapped in atomically (spec §3, §5, §9 "Published-snapshot
//! coherence"). Readers never walk live `BrokerState`s.

use std::collections::HashMap;

use serde::Serialize;

use crate::model::VerifiedGlitch;

#[derive(Debug, Clone, Serialize)]
pub struct BrokerKpis {
    pub broker_name: String,
    pub is_leader: bool,
    pub is_frozen: bool,

    pub feed_stability_score: f64,
    pub tps: usize,
    pub avg_latency_ms: f64,

    pub avg_spread: f64,
    pub spread_std_dev: f64,
    pub max_spread: f64,

    pub uniqueness_ratio: f64,
    pub correlation_with_leader: f64,
    pub tick_distribution_p_value: f64,
    pub asymmetric_slippage_ratio: f64,

    pub data_integrity_score: f64,

    pub score_authenticity: f64,
    pub score_integrity: f64,
    pub score_execution: f64,
    pub score_spread_level: f64,
    pub score_spread_stability: f64,
    pub score_feed_stability: f64,
    pub score_quote_freeze: f64,
    pub score_tps: f64,

    pub quality_score: f64,
    pub timeframe_averages: HashMap<String, f64>,
    pub score_history: Vec<f64>,
    pub verified_glitches_log: Vec<VerifiedGlitch>,
}

/// `symbol -> broker -> KPIs`, the complete output of one orchestrator pass.
#[derive(Debug, Clone, Serialize, Default)]
pub struct AnalysisSnapshot {
    pub symbols: HashMap<String, HashMap<String, BrokerKpis>>,
}

impl AnalysisSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }
}
