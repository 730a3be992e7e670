//! Central configuration: named constants and env-driven server settings.
//!
//! Mirrors the teacher's `models::Config::from_env` pattern (dotenv +
//! `std::env::var` with parsed fallbacks) for the handful of settings that
//! are legitimately runtime-configurable, while the analytics thresholds
//! from spec §6 stay compile-time constants the way `config.py` in the
//! original implementation keeps them.

use std::env;

/// Cadence of the orchestrator's analysis pass.
pub const ANALYSIS_INTERVAL_SECS: u64 = 1;

/// A broker with no update in this many seconds is considered frozen.
pub const FEED_FREEZE_THRESHOLD_SECS: f64 = 10.0;

/// Window, centered on a potential glitch's timestamp, used to pull leader
/// ticks for verification.
pub const LEADER_FOLLOWER_WINDOW_MS: f64 = 750.0;

/// Minimum deviation from the leader's average price, in pips, for a
/// potential glitch to be confirmed.
pub const GLITCH_VERIFICATION_THRESHOLD_PIPS: f64 = 10.0;

/// Standard-deviation multiple a price change must exceed to be flagged as
/// a potential glitch.
pub const DYNAMIC_THRESHOLD_STD_FACTOR: f64 = 3.5;

/// Number of most-recent ticks examined by the quote-freeze KPI.
pub const QUOTE_FREEZE_TICKS_WINDOW: usize = 50;

/// Minimum unique-price ratio over the quote-freeze window before a feed is
/// considered frozen on price.
pub const QUOTE_FREEZE_UNIQUENESS_RATIO: f64 = 0.1;

/// Bound on each broker's ring buffers.
pub const TICK_BUFFER_SIZE: usize = 500;
pub const SPREAD_BUFFER_SIZE: usize = 200;
pub const TICK_INTERVAL_BUFFER_SIZE: usize = 200;
pub const SLIPPAGE_BUFFER_SIZE: usize = 200;
pub const LATENCY_BUFFER_SIZE: usize = 100;
pub const VERIFIED_GLITCH_BUFFER_SIZE: usize = 100;

/// 8h of history at the 1s analysis cadence.
pub const SCORE_HISTORY_BUFFER_SIZE: usize = 8 * 3600;

/// Multiplicative penalty decay applied once per elapsed second.
pub const PENALTY_DECAY_RATE: f64 = 0.995;
pub const PENALTY_DECAY_INTERVAL_SECS: f64 = 1.0;

/// Minimum number of tick-intervals before the Jarque-Bera test runs.
pub const TICK_DISTRIBUTION_MIN_SAMPLES: usize = 50;

/// Minimum number of slippage samples before the execution KPI is computed
/// (strictly greater than this many samples, per spec §4.5/§8).
pub const EXECUTION_MIN_SAMPLES: usize = 10;

/// Scoring weights (spec §4.6). Must sum to 1.0 exactly.
pub struct Weights;

impl Weights {
    pub const AUTHENTICITY: f64 = 0.30;
    pub const INTEGRITY: f64 = 0.25;
    pub const EXECUTION: f64 = 0.15;
    pub const SPREAD_LEVEL: f64 = 0.05;
    pub const SPREAD_STABILITY: f64 = 0.05;
    pub const FEED_STABILITY: f64 = 0.10;
    pub const QUOTE_FREEZE: f64 = 0.05;
    pub const TPS: f64 = 0.05;
}

/// Named timeframes for score-history averaging (spec §4.6).
pub const TIMEFRAMES_SECS: &[(&str, f64)] = &[
    ("15m", 15.0 * 60.0),
    ("30m", 30.0 * 60.0),
    ("1h", 60.0 * 60.0),
    ("4h", 4.0 * 60.0 * 60.0),
    ("8h", 8.0 * 60.0 * 60.0),
];

/// Number of most-recent score-history points returned for sparklines.
pub const SPARKLINE_LEN: usize = 30;

/// Number of most-recent verified glitches returned in a snapshot.
pub const VERIFIED_GLITCHES_LOG_LEN: usize = 5;

/// Server-level configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        let host = env::var("GRIFFIN_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("GRIFFIN_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5000);

        Ok(Self { host, port })
    }
}
