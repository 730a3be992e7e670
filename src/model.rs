//! Core data types: ticks, glitches, samples, and the symbol/price
//! normalization rules applied at ingress (spec §3, §4.1).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An immutable, valid `(bid, ask)` quote observed at server-side arrival
/// time `timestamp`. Only ever constructed for `ask > bid`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub bid: Decimal,
    pub ask: Decimal,
    pub spread_pips: Decimal,
    pub timestamp: f64,
    pub price_change_pips: Decimal,
}

/// A tick flagged by the dynamic-threshold detector, awaiting cross-broker
/// verification. Cleared every analysis pass regardless of outcome.
#[derive(Debug, Clone, Copy)]
pub struct PotentialGlitch {
    pub bid: Decimal,
    pub timestamp: f64,
}

/// A potential glitch confirmed against the leader's concurrent price.
#[derive(Debug, Clone, Serialize)]
pub struct VerifiedGlitch {
    pub bid: Decimal,
    pub timestamp: f64,
    pub severity: f64,
    pub time_str: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Buy,
    Sell,
}

/// A simulated order's slippage relative to the last observed tick.
/// Positive means the broker moved price against the client.
#[derive(Debug, Clone, Copy)]
pub struct SlippageSample {
    pub order_type: OrderType,
    pub slippage_pips: f64,
}

/// One entry in a broker's quality-score history.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScoreHistoryEntry {
    pub timestamp: f64,
    pub quality_score: f64,
}

/// Uppercase, first `[A-Z]{6}` run if present, else strip all non-
/// alphanumerics. Matches `normalize_symbol` in the reference implementation.
pub fn normalize_symbol(raw: &str) -> String {
    let upper = raw.to_uppercase();
    let letters: String = upper.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if letters.len() >= 6 {
        letters[..6].to_string()
    } else {
        upper.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
    }
}

/// Strip every character not in `[0-9.]`; empty result parses to `0.0`.
pub fn sanitize_numeric(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect();
    if cleaned.is_empty() {
        "0.0".to_string()
    } else {
        cleaned
    }
}
