//! Pure KPI extractors: each takes a `BrokerState` snapshot (already behind
//! its mutex when called) and computes one facet of feed quality. None of
//! these mutate state (spec §4.5).

use crate::broker_state::BrokerState;
use crate::config;
use crate::stats;

#[derive(Debug, Clone, Copy)]
pub struct BaseKpis {
    pub feed_stability_score: f64,
    pub is_frozen: bool,
    pub tps: usize,
    pub avg_latency_ms: f64,
}

pub fn base_kpis(state: &BrokerState, now: f64) -> BaseKpis {
    let seconds_since_last_tick = now - state.last_update_time;
    let feed_stability_score = (100.0 - seconds_since_last_tick * 5.0).max(0.0);
    let is_frozen = seconds_since_last_tick > config::FEED_FREEZE_THRESHOLD_SECS;
    let tps = state.ticks.iter().filter(|t| t.timestamp > now - 1.0).count();
    let latencies = state.latency_samples.to_vec();
    let avg_latency_ms = if latencies.is_empty() { 0.0 } else { stats::mean(&latencies) };

    BaseKpis {
        feed_stability_score,
        is_frozen,
        tps,
        avg_latency_ms,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SpreadKpis {
    pub avg_spread: f64,
    pub spread_std_dev: f64,
    pub max_spread: f64,
}

pub fn advanced_spread_kpis(state: &BrokerState) -> SpreadKpis {
    let spreads = state.spread_samples.to_vec();
    if spreads.is_empty() {
        return SpreadKpis {
            avg_spread: 0.0,
            spread_std_dev: 0.0,
            max_spread: 0.0,
        };
    }
    SpreadKpis {
        avg_spread: stats::mean(&spreads),
        spread_std_dev: stats::population_std(&spreads),
        max_spread: spreads.iter().cloned().fold(f64::MIN, f64::max),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QuoteFreezeKpi {
    pub uniqueness_ratio: f64,
}

pub fn quote_freeze_kpi(state: &BrokerState) -> QuoteFreezeKpi {
    let window = state.ticks.last_n(config::QUOTE_FREEZE_TICKS_WINDOW);
    if window.len() < config::QUOTE_FREEZE_TICKS_WINDOW / 2 {
        return QuoteFreezeKpi { uniqueness_ratio: 1.0 };
    }
    let mut unique_bids: Vec<rust_decimal::Decimal> = window.iter().map(|t| t.bid).collect();
    unique_bids.sort();
    unique_bids.dedup();
    QuoteFreezeKpi {
        uniqueness_ratio: unique_bids.len() as f64 / window.len() as f64,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AuthenticityKpis {
    pub correlation_with_leader: f64,
    pub tick_distribution_p_value: f64,
}

pub fn authenticity_kpis(state: &BrokerState) -> AuthenticityKpis {
    let intervals = state.tick_intervals.last_n(200);
    let tick_distribution_p_value = if intervals.len() >= config::TICK_DISTRIBUTION_MIN_SAMPLES {
        let xs: Vec<f64> = intervals.into_iter().copied().collect();
        stats::jarque_bera_p_value(&xs)
    } else {
        0.5
    };

    AuthenticityKpis {
        correlation_with_leader: state.correlation_with_leader,
        tick_distribution_p_value,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExecutionKpis {
    pub asymmetric_slippage_ratio: f64,
}

pub fn execution_kpis(state: &BrokerState) -> ExecutionKpis {
    let samples = state.slippage_samples.to_vec();
    if samples.len() <= config::EXECUTION_MIN_SAMPLES {
        return ExecutionKpis {
            asymmetric_slippage_ratio: 1.0,
        };
    }

    let positive_client: Vec<f64> = samples
        .iter()
        .map(|s| s.slippage_pips)
        .filter(|&p| p < -1e-9)
        .collect();
    let negative_client: Vec<f64> = samples
        .iter()
        .map(|s| s.slippage_pips)
        .filter(|&p| p > 1e-9)
        .collect();

    let avg_pos = if positive_client.is_empty() {
        0.0
    } else {
        stats::mean(&positive_client).abs()
    };
    let avg_neg = if negative_client.is_empty() {
        0.0
    } else {
        stats::mean(&negative_client).abs()
    };

    let asymmetric_slippage_ratio = if avg_pos > 1e-9 {
        avg_neg / avg_pos
    } else if avg_neg > 1e-9 {
        100.0
    } else {
        1.0
    };

    ExecutionKpis {
        asymmetric_slippage_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker_state::BrokerState;
    use rust_decimal_macros::dec;

    #[test]
    fn quote_freeze_detects_identical_bids() {
        let mut s = BrokerState::new("B".into(), "EURUSD".into(), 0.0);
        for i in 0..60 {
            s.add_tick(dec!(1.10000), dec!(1.10010), i as f64);
        }
        let kpi = quote_freeze_kpi(&s);
        assert!((kpi.uniqueness_ratio - (1.0 / 50.0)).abs() < 1e-9);
    }

    #[test]
    fn execution_kpi_defaults_at_boundary() {
        let mut s = BrokerState::new("B".into(), "EURUSD".into(), 0.0);
        s.add_tick(dec!(1.10000), dec!(1.10010), 0.0);
        for _ in 0..10 {
            s.add_simulated_slippage(crate::model::OrderType::Buy, dec!(1.10008));
        }
        assert_eq!(s.slippage_samples.len(), 10);
        let kpi = execution_kpis(&s);
        assert_eq!(kpi.asymmetric_slippage_ratio, 1.0);
    }

    #[test]
    fn asymmetric_slippage_ratio_matches_scenario() {
        let mut s = BrokerState::new("B".into(), "EURUSD".into(), 0.0);
        s.add_tick(dec!(1.10000), dec!(1.10010), 0.0);
        for _ in 0..10 {
            // ask = 1.10010, requested 1.10008 -> slippage = +2 pips (broker-favorable)
            s.add_simulated_slippage(crate::model::OrderType::Buy, dec!(1.10008));
        }
        // ask = 1.10010, requested 1.10011 -> slippage = -1 pip (client-favorable)
        s.add_simulated_slippage(crate::model::OrderType::Buy, dec!(1.10011));
        let kpi = execution_kpis(&s);
        assert!((kpi.asymmetric_slippage_ratio - 2.0).abs() < 1e-6);
    }
}
