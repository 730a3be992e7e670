//! Cross-broker analysis pass: liveness filter, leader election, series
//! alignment/correlation, and glitch verification (spec §4.4).
//!
//! Series alignment is implemented as a merge-walk over two sorted
//! `(timestamp, price)` sequences with forward-fill then backward-fill, per
//! SPEC_FULL.md/spec §9 — deliberately avoiding a DataFrame dependency.

use rust_decimal::prelude::ToPrimitive;

use crate::config;
use crate::model::PotentialGlitch;
use crate::registry::SharedBrokerState;
use crate::stats;

/// Runs one analysis pass for every broker on a single symbol. Brokers must
/// be locked one at a time (never two at once) to avoid deadlock; this
/// function acquires each broker's lock independently rather than holding
/// two simultaneously.
pub fn analyze_symbol(brokers: &[SharedBrokerState], now: f64) {
    for b in brokers {
        b.lock().is_leader = false;
    }

    let active: Vec<&SharedBrokerState> = brokers.iter().filter(|b| !b.lock().is_frozen(now)).collect();

    if active.len() < 2 {
        for b in &active {
            b.lock().correlation_with_leader = 0.5;
        }
        return;
    }

    // Leader = most ticks buffered, ties broken by first-encountered order
    // (Iterator::max_by_key keeps the *last* max on ties, so this walks
    // manually and only replaces on a strictly greater count).
    let mut leader_idx = 0;
    let mut leader_len = active[0].lock().ticks.len();
    for (i, b) in active.iter().enumerate().skip(1) {
        let len = b.lock().ticks.len();
        if len > leader_len {
            leader_len = len;
            leader_idx = i;
        }
    }
    let leader = active[leader_idx];
    leader.lock().is_leader = true;

    let leader_series: Vec<(f64, f64)> = {
        let leader_state = leader.lock();
        leader_state
            .ticks
            .iter()
            .map(|t| (t.timestamp, t.bid.to_f64().unwrap_or(0.0)))
            .collect()
    };
    if leader_series.is_empty() {
        return;
    }

    for (idx, follower) in active.iter().enumerate() {
        if idx == leader_idx {
            follower.lock().correlation_with_leader = 1.0;
            continue;
        }
        verify_follower(follower, &leader_series, now);
    }
}

fn verify_follower(follower: &SharedBrokerState, leader_series: &[(f64, f64)], _now: f64) {
    let (follower_series, pending_glitches) = {
        let state = follower.lock();
        let series: Vec<(f64, f64)> = state
            .ticks
            .iter()
            .map(|t| (t.timestamp, t.bid.to_f64().unwrap_or(0.0)))
            .collect();
        (series, state.potential_glitches.clone())
    };

    if follower_series.is_empty() {
        let mut state = follower.lock();
        state.correlation_with_leader = 0.0;
        state.potential_glitches.clear();
        return;
    }

    let (leader_aligned, follower_aligned) = align_ffill_bfill(leader_series, &follower_series);
    let skip_verification = leader_aligned.len() < 10 || leader_aligned == follower_aligned;

    let correlation = if skip_verification {
        1.0
    } else {
        let c = stats::pearson_correlation(&leader_aligned, &follower_aligned);
        if c.is_nan() {
            0.0
        } else {
            c
        }
    };
    follower.lock().correlation_with_leader = correlation;

    // Glitch verification against the leader's concurrent window — skipped
    // entirely when the aligned series is too short or pointwise identical
    // to the leader's (spec §4.4 step 5.b-d), the same condition that forces
    // `correlation_with_leader` to 1.0 above.
    let mut verified: Vec<(PotentialGlitch, f64)> = Vec::new();
    if !skip_verification {
        for glitch in &pending_glitches {
            let window: Vec<f64> = leader_series
                .iter()
                .filter(|(ts, _)| (ts - glitch.timestamp).abs() * 1000.0 <= config::LEADER_FOLLOWER_WINDOW_MS)
                .map(|(_, price)| *price)
                .collect();
            if window.is_empty() {
                continue;
            }
            let avg_leader_price = stats::mean(&window);
            let glitch_bid = glitch.bid.to_f64().unwrap_or(0.0);
            let deviation_pips = (glitch_bid - avg_leader_price).abs() * 100_000.0;
            if deviation_pips > config::GLITCH_VERIFICATION_THRESHOLD_PIPS {
                let severity = (deviation_pips / 5.0).min(25.0);
                verified.push((*glitch, severity));
            }
        }
    }

    let mut state = follower.lock();
    state.potential_glitches.clear();
    for (glitch, severity) in verified {
        state.add_verified_glitch(glitch, severity);
    }
}

/// Aligns two `(timestamp, price)` series on the union of timestamps using
/// forward-fill then backward-fill (no interpolation). Returns the two
/// aligned price columns in timestamp order.
fn align_ffill_bfill(a: &[(f64, f64)], b: &[(f64, f64)]) -> (Vec<f64>, Vec<f64>) {
    let mut timestamps: Vec<f64> = a.iter().map(|(t, _)| *t).chain(b.iter().map(|(t, _)| *t)).collect();
    timestamps.sort_by(|x, y| x.partial_cmp(y).unwrap());
    timestamps.dedup();

    let col_a = ffill_bfill(&timestamps, a);
    let col_b = ffill_bfill(&timestamps, b);
    (col_a, col_b)
}

fn ffill_bfill(timestamps: &[f64], series: &[(f64, f64)]) -> Vec<f64> {
    let mut out = vec![f64::NAN; timestamps.len()];
    let mut series_idx = 0;
    let mut last_value: Option<f64> = None;

    for (i, ts) in timestamps.iter().enumerate() {
        while series_idx < series.len() && series[series_idx].0 <= *ts {
            last_value = Some(series[series_idx].1);
            series_idx += 1;
        }
        out[i] = last_value.unwrap_or(f64::NAN);
    }

    // Backward-fill any leading NaNs (prefix with no prior value).
    let mut next_value: Option<f64> = None;
    for i in (0..out.len()).rev() {
        if out[i].is_nan() {
            if let Some(v) = next_value {
                out[i] = v;
            }
        } else {
            next_value = Some(out[i]);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker_state::BrokerState;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn shared(name: &str) -> SharedBrokerState {
        Arc::new(Mutex::new(BrokerState::new(name.to_string(), "EURUSD".to_string(), 0.0)))
    }

    #[test]
    fn single_active_broker_gets_default_correlation() {
        let a = shared("A");
        analyze_symbol(std::slice::from_ref(&a), 0.0);
        assert_eq!(a.lock().correlation_with_leader, 0.5);
        assert!(!a.lock().is_leader);
    }

    #[test]
    fn leader_elected_by_tick_buffer_length() {
        let a = shared("A");
        let b = shared("B");
        for i in 0..400 {
            a.lock().add_tick(dec!(1.1000), dec!(1.1001), i as f64 * 0.01);
        }
        for i in 0..200 {
            b.lock().add_tick(dec!(1.1000), dec!(1.1001), i as f64 * 0.01);
        }
        analyze_symbol(&[a.clone(), b.clone()], 4.0);
        assert!(a.lock().is_leader);
        assert!(!b.lock().is_leader);
        assert_eq!(a.lock().correlation_with_leader, 1.0);
    }

    #[test]
    fn glitch_verified_against_leader_window() {
        let a = shared("A"); // leader
        let b = shared("B"); // follower with injected glitch

        for i in 0..400 {
            let t = i as f64 * 0.05;
            a.lock().add_tick(dec!(1.10000), dec!(1.10010), t);
        }
        for i in 0..200 {
            let t = i as f64 * 0.05;
            b.lock().add_tick(dec!(1.10000), dec!(1.10010), t);
        }
        // Inject a 15-pip glitch into B, 15 pips = 0.00015 above 1.10000.
        b.lock().add_tick(dec!(1.10015), dec!(1.10025), 9.5);

        analyze_symbol(&[a.clone(), b.clone()], 10.0);

        let b_state = b.lock();
        assert_eq!(b_state.verified_glitches.len(), 1);
        let glitch = b_state.verified_glitches.iter().next().unwrap();
        assert!((glitch.severity - 3.0).abs() < 0.2, "severity = {}", glitch.severity);
    }

    #[test]
    fn skip_verification_when_aligned_series_too_short() {
        let leader = shared("L");
        let follower = shared("F");
        for i in 0..3 {
            leader.lock().add_tick(dec!(1.10000), dec!(1.10010), i as f64);
            follower.lock().add_tick(dec!(1.10000), dec!(1.10010), i as f64);
        }
        // A pending glitch that would verify if the check weren't skipped.
        follower.lock().potential_glitches.push(PotentialGlitch {
            bid: dec!(1.20000),
            timestamp: 1.0,
        });

        let leader_series: Vec<(f64, f64)> = leader
            .lock()
            .ticks
            .iter()
            .map(|t| (t.timestamp, t.bid.to_f64().unwrap()))
            .collect();
        verify_follower(&follower, &leader_series, 0.0);

        assert_eq!(follower.lock().correlation_with_leader, 1.0);
        assert!(follower.lock().verified_glitches.is_empty());
        assert!(follower.lock().potential_glitches.is_empty());
    }
}
