//! Timed status effects keyed by target seat.
//!
//! Presentation reads these to blur a field or swap key handling; the match
//! rules never look at them. Re-applying an effect that is still running keeps
//! whichever expiry lies further in the future.

use crate::rules::Seat;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Upper bound on a single effect's duration.
pub const MAX_EFFECT_SECONDS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EffectCategory {
    /// Hides part of the target's field
    VisionBlock,
    /// Reverses the target's typed input
    InputReverse,
}

impl EffectCategory {
    /// Wire flag used in `TOAST <flag> <msg>` lines.
    pub fn as_flag(self) -> &'static str {
        match self {
            EffectCategory::VisionBlock => "BLIND",
            EffectCategory::InputReverse => "REVERSE",
        }
    }

    pub fn from_flag(flag: &str) -> Option<EffectCategory> {
        match flag {
            "BLIND" => Some(EffectCategory::VisionBlock),
            "REVERSE" => Some(EffectCategory::InputReverse),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct TemporaryEffectRegistry {
    expiries: HashMap<(Seat, EffectCategory), Instant>,
}

impl TemporaryEffectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, target: Seat, category: EffectCategory, duration_seconds: i64) {
        self.apply_at(target, category, duration_seconds, Instant::now());
    }

    /// Sets or extends an effect relative to `now`. Non-positive durations
    /// leave the registry untouched; longer ones are capped at a day.
    pub fn apply_at(
        &mut self,
        target: Seat,
        category: EffectCategory,
        duration_seconds: i64,
        now: Instant,
    ) {
        if duration_seconds <= 0 {
            return;
        }

        let duration = Duration::from_secs(duration_seconds.min(MAX_EFFECT_SECONDS) as u64);
        let Some(expires_at) = now.checked_add(duration) else {
            return;
        };
        self.expiries
            .entry((target, category))
            .and_modify(|existing| *existing = (*existing).max(expires_at))
            .or_insert(expires_at);
    }

    pub fn remaining_seconds(&self, target: Seat, category: EffectCategory) -> u64 {
        self.remaining_seconds_at(target, category, Instant::now())
    }

    /// Whole seconds left, rounded up; zero when absent or expired.
    pub fn remaining_seconds_at(&self, target: Seat, category: EffectCategory, now: Instant) -> u64 {
        match self.expiries.get(&(target, category)) {
            Some(&expires_at) if expires_at > now => {
                let nanos = (expires_at - now).as_nanos();
                nanos.div_ceil(1_000_000_000) as u64
            }
            _ => 0,
        }
    }

    pub fn is_active(&self, target: Seat, category: EffectCategory) -> bool {
        self.remaining_seconds(target, category) > 0
    }

    pub fn is_active_at(&self, target: Seat, category: EffectCategory, now: Instant) -> bool {
        self.remaining_seconds_at(target, category, now) > 0
    }

    /// Effects still running on `target`, with their remaining seconds.
    pub fn active_at(&self, target: Seat, now: Instant) -> Vec<(EffectCategory, u64)> {
        let mut active: Vec<(EffectCategory, u64)> = [
            EffectCategory::VisionBlock,
            EffectCategory::InputReverse,
        ]
        .into_iter()
        .map(|category| (category, self.remaining_seconds_at(target, category, now)))
        .filter(|(_, remaining)| *remaining > 0)
        .collect();
        active.sort_by_key(|(_, remaining)| std::cmp::Reverse(*remaining));
        active
    }
}
