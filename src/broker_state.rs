//! Per-(symbol, broker) aggregator: ingests ticks, maintains bounded sample
//! windows, tracks penalty score and current spread, and flags potential
//! glitches for cross-broker verification (spec §3, §4.3).

use chrono::{TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::config;
use crate::model::{OrderType, PotentialGlitch, ScoreHistoryEntry, SlippageSample, Tick, VerifiedGlitch};
use crate::ring_buffer::RingBuffer;
use crate::stats;

const PIPS_SCALE: i64 = 100_000;

pub struct BrokerState {
    pub broker_name: String,
    pub symbol: String,

    pub last_update_time: f64,
    pub last_tick_time: Option<f64>,

    pub ticks: RingBuffer<Tick>,
    pub spread_samples: RingBuffer<f64>,
    pub tick_intervals: RingBuffer<f64>,
    pub slippage_samples: RingBuffer<SlippageSample>,
    pub latency_samples: RingBuffer<f64>,
    pub verified_glitches: RingBuffer<VerifiedGlitch>,
    pub quality_score_history: RingBuffer<ScoreHistoryEntry>,

    pub penalty_score: f64,
    pub last_penalty_decay_time: f64,
    pub is_leader: bool,
    pub correlation_with_leader: f64,
    pub current_spread: f64,

    pub potential_glitches: Vec<PotentialGlitch>,
}

impl BrokerState {
    pub fn new(broker_name: String, symbol: String, now: f64) -> Self {
        Self {
            broker_name,
            symbol,
            last_update_time: now,
            last_tick_time: None,
            ticks: RingBuffer::new(config::TICK_BUFFER_SIZE),
            spread_samples: RingBuffer::new(config::SPREAD_BUFFER_SIZE),
            tick_intervals: RingBuffer::new(config::TICK_INTERVAL_BUFFER_SIZE),
            slippage_samples: RingBuffer::new(config::SLIPPAGE_BUFFER_SIZE),
            latency_samples: RingBuffer::new(config::LATENCY_BUFFER_SIZE),
            verified_glitches: RingBuffer::new(config::VERIFIED_GLITCH_BUFFER_SIZE),
            quality_score_history: RingBuffer::new(config::SCORE_HISTORY_BUFFER_SIZE),
            penalty_score: 0.0,
            last_penalty_decay_time: now,
            is_leader: false,
            correlation_with_leader: 0.5,
            current_spread: 0.0,
            potential_glitches: Vec::new(),
        }
    }

    /// Ingests one `(bid, ask)` quote. Always updates liveness and
    /// tick-interval statistics; only stores the tick and advances spread
    /// state when `ask > bid`. Returns the post-update current spread.
    pub fn add_tick(&mut self, bid: Decimal, ask: Decimal, recv_time: f64) -> f64 {
        self.last_update_time = recv_time;
        if let Some(last_tick_time) = self.last_tick_time {
            self.tick_intervals.push(recv_time - last_tick_time);
        }
        self.last_tick_time = Some(recv_time);

        if ask > bid {
            let spread_pips = (ask - bid) * Decimal::from(PIPS_SCALE);
            let spread_f64 = spread_pips.to_f64().unwrap_or(0.0);
            self.current_spread = spread_f64;

            let price_change_pips = match self.ticks.last() {
                Some(prev) => (bid - prev.bid).abs() * Decimal::from(PIPS_SCALE),
                None => Decimal::ZERO,
            };
            let price_change_f64 = price_change_pips.to_f64().unwrap_or(0.0);

            self.ticks.push(Tick {
                bid,
                ask,
                spread_pips,
                timestamp: recv_time,
                price_change_pips,
            });
            self.spread_samples.push(spread_f64);

            if self.ticks.len() > config::QUOTE_FREEZE_TICKS_WINDOW {
                let recent_changes: Vec<f64> = self
                    .ticks
                    .last_n(50)
                    .iter()
                    .map(|t| t.price_change_pips.to_f64().unwrap_or(0.0))
                    .collect();
                let mean = stats::mean(&recent_changes);
                let std_dev = stats::population_std(&recent_changes);
                if std_dev > 1e-9 && price_change_f64 > mean + config::DYNAMIC_THRESHOLD_STD_FACTOR * std_dev {
                    self.potential_glitches.push(PotentialGlitch {
                        bid,
                        timestamp: recv_time,
                    });
                }
            }
        }

        self.current_spread
    }

    /// Records a simulated order's slippage relative to the last tick.
    /// No-op if no ticks have been observed yet.
    pub fn add_simulated_slippage(&mut self, order_type: OrderType, requested_price: Decimal) {
        let Some(last) = self.ticks.last().copied() else {
            return;
        };
        let slippage_pips = match order_type {
            OrderType::Buy => (last.ask - requested_price) * Decimal::from(PIPS_SCALE),
            OrderType::Sell => (requested_price - last.bid) * Decimal::from(PIPS_SCALE),
        };
        self.slippage_samples.push(SlippageSample {
            order_type,
            slippage_pips: slippage_pips.to_f64().unwrap_or(0.0),
        });
    }

    /// Records a latency sample, discarding out-of-range values silently.
    pub fn add_latency_sample(&mut self, latency_ms: f64) {
        if latency_ms > 0.0 && latency_ms < 5000.0 {
            self.latency_samples.push(latency_ms);
        }
    }

    /// Applies multiplicative decay for every whole second elapsed since the
    /// last decay. Strictly non-increasing; a no-op if less than a second
    /// has elapsed.
    pub fn apply_penalty_decay(&mut self, now: f64) {
        let elapsed = now - self.last_penalty_decay_time;
        if elapsed >= config::PENALTY_DECAY_INTERVAL_SECS {
            let cycles = (elapsed / config::PENALTY_DECAY_INTERVAL_SECS).floor();
            self.penalty_score *= config::PENALTY_DECAY_RATE.powf(cycles);
            if self.penalty_score < 1e-5 {
                self.penalty_score = 0.0;
            }
            self.last_penalty_decay_time = now;
        }
    }

    /// Confirms a potential glitch, adding it to the glitch log and raising
    /// the penalty score (clamped to 100).
    pub fn add_verified_glitch(&mut self, glitch: PotentialGlitch, severity: f64) {
        let severity = severity.clamp(0.0, 25.0);
        let time_str = Utc
            .timestamp_opt(glitch.timestamp as i64, 0)
            .single()
            .map(|dt| dt.format("%H:%M:%S").to_string())
            .unwrap_or_default();

        self.verified_glitches.push_front(VerifiedGlitch {
            bid: glitch.bid,
            timestamp: glitch.timestamp,
            severity,
            time_str,
        });
        self.penalty_score = (self.penalty_score + severity).min(100.0);
    }

    pub fn add_score_to_history(&mut self, score: f64, timestamp: f64) {
        self.quality_score_history.push(ScoreHistoryEntry {
            timestamp,
            quality_score: score,
        });
    }

    pub fn is_frozen(&self, now: f64) -> bool {
        (now - self.last_update_time) > config::FEED_FREEZE_THRESHOLD_SECS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn state() -> BrokerState {
        BrokerState::new("IC Markets".to_string(), "EURUSD".to_string(), 1000.0)
    }

    #[test]
    fn invalid_tick_updates_liveness_but_not_buffer() {
        let mut s = state();
        s.add_tick(dec!(1.1000), dec!(1.0990), 1001.0);
        assert_eq!(s.ticks.len(), 0);
        assert_eq!(s.tick_intervals.len(), 0);
        assert_eq!(s.last_update_time, 1001.0);
        assert_eq!(s.last_tick_time, Some(1001.0));
    }

    #[test]
    fn tick_intervals_advance_regardless_of_validity() {
        let mut s = state();
        s.add_tick(dec!(1.1000), dec!(1.1001), 1000.5);
        s.add_tick(dec!(1.1000), dec!(1.0999), 1001.0); // invalid
        assert_eq!(s.tick_intervals.to_vec(), vec![0.5]);
    }

    #[test]
    fn valid_tick_updates_spread_and_buffer() {
        let mut s = state();
        let spread = s.add_tick(dec!(1.10000), dec!(1.10010), 1000.0);
        assert!((spread - 10.0).abs() < 1e-9);
        assert_eq!(s.ticks.len(), 1);
        assert_eq!(s.spread_samples.len(), 1);
    }

    #[test]
    fn exactly_fifty_ticks_do_not_trigger_glitch_flagging() {
        let mut s = state();
        for i in 0..50 {
            s.add_tick(dec!(1.10000), dec!(1.10010), 1000.0 + i as f64);
        }
        assert_eq!(s.ticks.len(), 50);
        assert!(s.potential_glitches.is_empty());
    }

    #[test]
    fn penalty_decay_is_idempotent_within_the_same_second() {
        let mut s = state();
        s.penalty_score = 50.0;
        s.last_penalty_decay_time = 1000.0;
        s.apply_penalty_decay(1000.4);
        assert_eq!(s.penalty_score, 50.0);
        s.apply_penalty_decay(1000.9);
        assert_eq!(s.penalty_score, 50.0);
    }

    #[test]
    fn penalty_decay_over_one_hundred_seconds() {
        let mut s = state();
        s.penalty_score = 50.0;
        s.last_penalty_decay_time = 0.0;
        s.apply_penalty_decay(100.0);
        assert!((s.penalty_score - 30.3).abs() < 0.1, "got {}", s.penalty_score);
    }

    #[test]
    fn verified_glitch_raises_penalty_and_clamps_at_one_hundred() {
        let mut s = state();
        s.penalty_score = 95.0;
        s.add_verified_glitch(PotentialGlitch { bid: dec!(1.1), timestamp: 1000.0 }, 15.0);
        assert_eq!(s.penalty_score, 100.0);
        assert_eq!(s.verified_glitches.len(), 1);
    }
}
