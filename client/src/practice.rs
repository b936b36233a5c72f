//! Offline single-player practice.
//!
//! Runs the same rules the server uses in single mode, with the local
//! [`WordField`] deciding whether a typed line popped a balloon.

use crate::field::{PopResult, WordField};
use log::{debug, info};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::{interval, MissedTickBehavior};
use versus_shared::{MatchRules, MatchSummary, Seat, INITIAL_TIME_SECONDS, SCORE_PER_POP};

#[derive(Debug, Clone)]
pub struct PracticeConfig {
    pub initial_time_seconds: u32,
    pub tick_interval: Duration,
    pub score_per_pop: u32,
}

impl Default for PracticeConfig {
    fn default() -> Self {
        Self {
            initial_time_seconds: INITIAL_TIME_SECONDS,
            tick_interval: Duration::from_secs(1),
            score_per_pop: SCORE_PER_POP,
        }
    }
}

/// Plays until the field is cleared or the clock runs out. Each input line
/// is one typed word. Once input ends the clock keeps running.
pub async fn run_practice<R>(input: R, mut field: WordField, config: PracticeConfig) -> MatchSummary
where
    R: AsyncBufRead + Unpin,
{
    let mut rules = MatchRules::single(config.initial_time_seconds);
    let mut lines = input.lines();
    let mut input_open = true;

    let mut ticker = interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await;

    info!(
        "Practice started: {} words, {}s on the clock",
        field.remaining().len(),
        config.initial_time_seconds
    );

    while !rules.is_concluded() {
        tokio::select! {
            _ = ticker.tick() => rules.on_tick(),
            line = lines.next_line(), if input_open => match line {
                Ok(Some(line)) => submit(&mut rules, &mut field, line.trim(), config.score_per_pop),
                Ok(None) => input_open = false,
                Err(e) => {
                    debug!("Input failed: {}", e);
                    input_open = false;
                }
            },
        }
    }

    let summary = rules.summary();
    info!(
        "Practice over: {:?}, score {}",
        summary.winner, summary.p1.score
    );
    summary
}

fn submit(rules: &mut MatchRules, field: &mut WordField, word: &str, score_per_pop: u32) {
    if word.is_empty() {
        return;
    }
    match field.try_pop(word) {
        PopResult::Popped { cleared } => {
            debug!("Popped {}", word);
            rules.on_pop(Seat::P1, score_per_pop, cleared);
        }
        PopResult::Miss => {
            debug!("Missed {}", word);
            rules.on_miss(Seat::P1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use versus_shared::Winner;

    fn config(initial_time_seconds: u32) -> PracticeConfig {
        PracticeConfig {
            initial_time_seconds,
            ..PracticeConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_the_field_wins() {
        let input: &[u8] = b"cat\n\ndog\n";
        let summary = run_practice(input, WordField::new(["cat", "dog"]), config(5)).await;

        assert_eq!(summary.winner, Winner::P1);
        assert_eq!(summary.p1.score, 2 * SCORE_PER_POP);
        assert!(summary.p1.cleared);
        assert_approx_eq!(summary.p1.accuracy(), 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_out_of_time_loses() {
        let input: &[u8] = b"cat\nnope\n";
        let summary = run_practice(input, WordField::new(["cat", "dog"]), config(3)).await;

        assert_eq!(summary.winner, Winner::P2);
        assert!(summary.p1.dead);
        assert_eq!(summary.p1.time_left_seconds, 0);
        assert_eq!(summary.p1.score, SCORE_PER_POP);
        assert_eq!((summary.p1.typed_correct, summary.p1.typed_total), (1, 2));
        assert_approx_eq!(summary.p1.accuracy(), 0.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_input_times_out() {
        let input: &[u8] = b"";
        let summary = run_practice(input, WordField::new(["sky"]), config(2)).await;

        assert_eq!(summary.winner, Winner::P2);
        assert_eq!(summary.p1.typed_total, 0);
    }
}
