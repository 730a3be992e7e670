//! Normalizes KPIs into sub-scores, applies weights, and produces the final
//! `quality_score` plus historical averages (spec §4.6).

use std::collections::HashMap;

use crate::broker_state::BrokerState;
use crate::config::{self, Weights};
use crate::kpi;
use crate::registry::SharedBrokerState;
use crate::snapshot::BrokerKpis;

/// Scores every broker on one symbol. Callers pass the same `brokers` slice
/// that was just run through `analysis::analyze_symbol`, so `is_leader` and
/// `correlation_with_leader` are already current.
pub fn score_symbol(brokers: &[SharedBrokerState], now: f64) -> HashMap<String, BrokerKpis> {
    struct Intermediate {
        broker_name: String,
        is_leader: bool,
        base: kpi::BaseKpis,
        spread: kpi::SpreadKpis,
        freeze: kpi::QuoteFreezeKpi,
        auth: kpi::AuthenticityKpis,
        exec_kpi: kpi::ExecutionKpis,
        data_integrity_score: f64,
        verified_glitches_log: Vec<crate::model::VerifiedGlitch>,
    }

    let intermediates: Vec<Intermediate> = brokers
        .iter()
        .map(|b| {
            let state = b.lock();
            Intermediate {
                broker_name: state.broker_name.clone(),
                is_leader: state.is_leader,
                base: kpi::base_kpis(&state, now),
                spread: kpi::advanced_spread_kpis(&state),
                freeze: kpi::quote_freeze_kpi(&state),
                auth: kpi::authenticity_kpis(&state),
                exec_kpi: kpi::execution_kpis(&state),
                data_integrity_score: 100.0 - state.penalty_score,
                verified_glitches_log: state
                    .verified_glitches
                    .iter()
                    .take(config::VERIFIED_GLITCHES_LOG_LEN)
                    .cloned()
                    .collect(),
            }
        })
        .collect();

    // Cross-broker spread comparison: best (lowest) avg_spread / min std dev
    // among active (non-frozen) brokers with a positive value. If active
    // brokers exist but none has a positive value, the original falls back
    // to a default of 1 rather than leaving the comparison undefined
    // (`min(..., default=1)` in scoring_engine.py) — that default then still
    // lets a frozen broker with a leftover positive avg_spread/std_dev from
    // before it went stale get a non-zero score_spread_level/stability, since
    // those scores are computed for every broker, not just active ones.
    let active: Vec<&Intermediate> = intermediates.iter().filter(|i| !i.base.is_frozen).collect();
    let best_spread: Option<f64> = if active.is_empty() {
        None
    } else {
        let min_positive = active
            .iter()
            .map(|i| i.spread.avg_spread)
            .filter(|&s| s > 0.0)
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.min(s))));
        Some(min_positive.unwrap_or(1.0))
    };
    let min_std_dev: Option<f64> = if active.is_empty() {
        None
    } else {
        let min_positive = active
            .iter()
            .map(|i| i.spread.spread_std_dev)
            .filter(|&s| s > 0.0)
            .fold(None, |acc: Option<f64>, s| Some(acc.map_or(s, |a| a.min(s))));
        Some(min_positive.unwrap_or(1.0))
    };

    let mut out = HashMap::with_capacity(intermediates.len());
    for i in intermediates {
        let score_spread_level = match best_spread {
            Some(best) if i.spread.avg_spread > 0.0 => (best / i.spread.avg_spread) * 100.0,
            _ => 0.0,
        };
        let score_spread_stability = match min_std_dev {
            Some(min_std) if i.spread.spread_std_dev > 0.0 => (min_std / i.spread.spread_std_dev) * 100.0,
            _ => 0.0,
        };

        let correlation_bonus = if i.auth.correlation_with_leader > 0.95 {
            ((i.auth.correlation_with_leader - 0.95) / 0.05).clamp(0.0, 1.0) * 50.0
        } else {
            0.0
        };
        let distribution_bonus = i.auth.tick_distribution_p_value * 50.0;
        let score_authenticity = (correlation_bonus + distribution_bonus).clamp(0.0, 100.0);

        let score_integrity = i.data_integrity_score.clamp(0.0, 100.0);

        let score_execution =
            ((1.0 - (1.0 - i.exec_kpi.asymmetric_slippage_ratio).abs().min(2.0) / 2.0) * 100.0).clamp(0.0, 100.0);

        let score_feed_stability = i.base.feed_stability_score.clamp(0.0, 100.0);
        let score_quote_freeze = if i.freeze.uniqueness_ratio > config::QUOTE_FREEZE_UNIQUENESS_RATIO {
            100.0
        } else {
            0.0
        };
        let score_tps = ((i.base.tps as f64 / 25.0) * 100.0).min(100.0);

        let quality_score = (score_authenticity * Weights::AUTHENTICITY
            + score_integrity * Weights::INTEGRITY
            + score_execution * Weights::EXECUTION
            + score_spread_level * Weights::SPREAD_LEVEL
            + score_spread_stability * Weights::SPREAD_STABILITY
            + score_feed_stability * Weights::FEED_STABILITY
            + score_quote_freeze * Weights::QUOTE_FREEZE
            + score_tps * Weights::TPS)
            .clamp(0.0, 100.0);

        out.insert(
            i.broker_name.clone(),
            BrokerKpis {
                broker_name: i.broker_name,
                is_leader: i.is_leader,
                is_frozen: i.base.is_frozen,
                feed_stability_score: i.base.feed_stability_score,
                tps: i.base.tps,
                avg_latency_ms: i.base.avg_latency_ms,
                avg_spread: i.spread.avg_spread,
                spread_std_dev: i.spread.spread_std_dev,
                max_spread: i.spread.max_spread,
                uniqueness_ratio: i.freeze.uniqueness_ratio,
                correlation_with_leader: i.auth.correlation_with_leader,
                tick_distribution_p_value: i.auth.tick_distribution_p_value,
                asymmetric_slippage_ratio: i.exec_kpi.asymmetric_slippage_ratio,
                data_integrity_score: i.data_integrity_score,
                score_authenticity,
                score_integrity,
                score_execution,
                score_spread_level,
                score_spread_stability,
                score_feed_stability,
                score_quote_freeze,
                score_tps,
                quality_score,
                timeframe_averages: HashMap::new(), // filled in below, once we can write history
                score_history: Vec::new(),
                verified_glitches_log: i.verified_glitches_log,
            },
        );
    }

    // Append to history and fill timeframe averages/sparkline now that the
    // quality_score is final — requires the broker's lock again, briefly.
    for b in brokers {
        let mut state = b.lock();
        let name = state.broker_name.clone();
        if let Some(kpis) = out.get_mut(&name) {
            state.add_score_to_history(kpis.quality_score, now);
            kpis.timeframe_averages = timeframe_averages(&state, now);
            kpis.score_history = state
                .quality_score_history
                .last_n(config::SPARKLINE_LEN)
                .into_iter()
                .map(|e| e.quality_score)
                .collect();
        }
    }

    out
}

fn timeframe_averages(state: &BrokerState, now: f64) -> HashMap<String, f64> {
    let history = state.quality_score_history.to_vec();
    config::TIMEFRAMES_SECS
        .iter()
        .map(|(name, window)| {
            let relevant: Vec<f64> = history
                .iter()
                .filter(|e| now - e.timestamp <= *window)
                .map(|e| e.quality_score)
                .collect();
            let avg = if relevant.is_empty() {
                0.0
            } else {
                crate::stats::mean(&relevant)
            };
            (name.to_string(), avg)
        })
        .collect()
}
