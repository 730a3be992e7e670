//! End-to-end scenarios exercising the registry, analysis pass, and scoring
//! pass together, the way a real ingest-then-publish cycle runs them.

use griffin_engine::analysis::analyze_symbol;
use griffin_engine::registry::StateRegistry;
use griffin_engine::scoring::score_symbol;
use rust_decimal_macros::dec;

/// S3 — a broker idle past the freeze threshold is excluded from leader
/// election, flagged frozen, and its correlation is left at its last value.
#[test]
fn stale_broker_is_excluded_and_flagged_frozen() {
    let registry = StateRegistry::new();
    let a = registry.route("EURUSD", "A");
    let b = registry.route("EURUSD", "B");
    let c = registry.route("EURUSD", "C");

    for i in 0..400 {
        a.lock().add_tick(dec!(1.10000), dec!(1.10010), i as f64 * 0.05);
    }
    for i in 0..200 {
        b.lock().add_tick(dec!(1.10000), dec!(1.10010), i as f64 * 0.05);
        c.lock().add_tick(dec!(1.10000), dec!(1.10010), i as f64 * 0.05);
    }

    let brokers = registry.enumerate_by_symbol().remove("EURUSD").unwrap();
    analyze_symbol(&brokers, 10.0);
    let correlation_before_stall = c.lock().correlation_with_leader;
    assert!(a.lock().is_leader);

    // C goes silent for 11s; A and B keep ticking.
    let now = 10.0 + 11.0;
    for i in 0..20 {
        a.lock().add_tick(dec!(1.10000), dec!(1.10010), 20.0 + i as f64 * 0.05);
        b.lock().add_tick(dec!(1.10000), dec!(1.10010), 20.0 + i as f64 * 0.05);
    }
    analyze_symbol(&brokers, now);

    assert!(c.lock().is_frozen(now));
    assert!(a.lock().is_leader);
    assert_eq!(c.lock().correlation_with_leader, correlation_before_stall);

    // feed_stability_score follows `max(0, 100 - 5*seconds_since_last_tick)`
    // uncapped by is_frozen (the original implementation never special-cases
    // it), so it only reaches exactly 0 once the gap hits 20s.
    let scored = score_symbol(&brokers, now);
    assert!(scored.get("C").unwrap().feed_stability_score < 50.0);
    assert!(scored.get("C").unwrap().is_frozen);
}

/// S5 — asymmetric slippage: 10 samples favor the client by 2 pips, 1 sample
/// costs the client 1 pip. ratio = avg_neg / avg_pos = 2, so
/// `score_execution = (1 - min(1, 2)/2) * 100 = 50`.
#[test]
fn asymmetric_slippage_scores_fifty() {
    use griffin_engine::model::OrderType;

    let registry = StateRegistry::new();
    let state = registry.route("EURUSD", "A");
    state.lock().add_tick(dec!(1.10000), dec!(1.10010), 0.0);

    for _ in 0..10 {
        // ask = 1.10010, requested 1.10008 -> slippage = +2 pips (costs the client).
        state.lock().add_simulated_slippage(OrderType::Buy, dec!(1.10008));
    }
    // ask = 1.10010, requested 1.10011 -> slippage = -1 pip (client-favorable).
    state.lock().add_simulated_slippage(OrderType::Buy, dec!(1.10011));

    let brokers = vec![state.clone()];
    let scored = score_symbol(&brokers, 1.0);
    let kpis = scored.get("A").unwrap();
    assert!((kpis.score_execution - 50.0).abs() < 1.0, "got {}", kpis.score_execution);
}

/// S6 — penalty decay: `0.995^100 ≈ 0.606`, so a penalty of 50 decays to
/// roughly 30.3 after 100 seconds with no new glitches.
#[test]
fn penalty_decays_over_one_hundred_seconds_end_to_end() {
    let registry = StateRegistry::new();
    let state = registry.route("EURUSD", "A");
    state.lock().penalty_score = 50.0;
    state.lock().last_penalty_decay_time = 0.0;
    state.lock().add_tick(dec!(1.10000), dec!(1.10010), 0.0);

    state.lock().apply_penalty_decay(100.0);
    assert!((state.lock().penalty_score - 30.3).abs() < 0.2);

    let scored = score_symbol(std::slice::from_ref(&state), 100.0);
    let kpis = scored.get("A").unwrap();
    assert!((kpis.data_integrity_score - 69.7).abs() < 0.2);
}

/// Invariant 7 — after an analysis pass, every active broker's
/// `potential_glitches` buffer is drained, whether or not a glitch verified.
#[test]
fn analysis_pass_drains_potential_glitches() {
    let registry = StateRegistry::new();
    let a = registry.route("EURUSD", "A");
    let b = registry.route("EURUSD", "B");

    for i in 0..400 {
        a.lock().add_tick(dec!(1.10000), dec!(1.10010), i as f64 * 0.05);
    }
    for i in 0..200 {
        b.lock().add_tick(dec!(1.10000), dec!(1.10010), i as f64 * 0.05);
    }
    // Injected glitch, well beyond the dynamic threshold.
    b.lock().add_tick(dec!(1.10200), dec!(1.10210), 10.0);
    assert!(!b.lock().potential_glitches.is_empty());

    let brokers = registry.enumerate_by_symbol().remove("EURUSD").unwrap();
    analyze_symbol(&brokers, 20.0);

    assert!(a.lock().potential_glitches.is_empty());
    assert!(b.lock().potential_glitches.is_empty());
}

/// Idempotence — ingesting the same valid tick twice appends two entries and
/// both count toward `tps`.
#[test]
fn duplicate_tick_ingestion_counts_both() {
    let registry = StateRegistry::new();
    let state = registry.route("EURUSD", "A");
    state.lock().add_tick(dec!(1.10000), dec!(1.10010), 0.0);
    state.lock().add_tick(dec!(1.10000), dec!(1.10010), 0.0);

    assert_eq!(state.lock().ticks.len(), 2);
    let scored = score_symbol(&[state], 0.0);
    assert_eq!(scored.get("A").unwrap().tps, 2);
}
