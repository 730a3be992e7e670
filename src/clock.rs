//! Wall-clock access as seconds/milliseconds since epoch, isolated to one
//! module so tests can exercise the engine against fabricated timestamps
//! without touching the system clock.

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

pub fn now_millis() -> f64 {
    now_seconds() * 1000.0
}
