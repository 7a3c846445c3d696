//! Traffic-split decision rule.
//!
//! One uniform draw `r` in `[0, 1)` per request; `current` serves when
//! `r < p`, `next` otherwise. `p` is clamped into `[0, 1]` before comparing,
//! so `p >= 1` always picks `current` and `p <= 0` always picks `next`.

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// The two model slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotName {
    /// Production model.
    Current,
    /// Candidate model.
    Next,
}

impl SlotName {
    /// Lowercase label used on the wire and in metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Next => "next",
        }
    }
}

impl fmt::Display for SlotName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp a canary probability into `[0, 1]`.
///
/// NaN never reaches the router through the public API; if it does, it is
/// read as `1.0` so all traffic stays on `current`.
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        1.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Pick a slot for a draw in `[0, 1)`.
pub fn choose_slot(draw: f64, canary_probability: f64) -> SlotName {
    if draw < clamp_probability(canary_probability) {
        SlotName::Current
    } else {
        SlotName::Next
    }
}

/// Uniform draw in `[0, 1)`.
pub fn draw() -> f64 {
    rand::thread_rng().gen::<f64>()
}
