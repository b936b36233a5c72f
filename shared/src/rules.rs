//! Authoritative match rules for the typing race.
//!
//! [`MatchRules`] owns both seats' [`PlayerState`] and the write-once
//! [`Winner`]. Every mutating operation re-evaluates the winner before
//! returning, and once the match has concluded every further mutation is a
//! silent no-op. The type performs no locking of its own; the room that owns
//! it serializes access so that "mutate then resolve" stays atomic.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// One of the two fixed logical player slots of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Seat {
    P1,
    P2,
}

impl Seat {
    pub const BOTH: [Seat; 2] = [Seat::P1, Seat::P2];

    pub fn index(self) -> usize {
        match self {
            Seat::P1 => 0,
            Seat::P2 => 1,
        }
    }

    pub fn opponent(self) -> Seat {
        match self {
            Seat::P1 => Seat::P2,
            Seat::P2 => Seat::P1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Seat::P1 => "P1",
            Seat::P2 => "P2",
        }
    }

    /// Parses a wire token; keywords are case-sensitive.
    pub fn from_token(token: &str) -> Option<Seat> {
        match token {
            "P1" => Some(Seat::P1),
            "P2" => Some(Seat::P2),
            _ => None,
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Match winner. `None` is the only non-terminal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Winner {
    None,
    P1,
    P2,
    Draw,
}

impl Winner {
    pub fn is_concluded(self) -> bool {
        self != Winner::None
    }
}

impl From<Seat> for Winner {
    fn from(seat: Seat) -> Self {
        match seat {
            Seat::P1 => Winner::P1,
            Seat::P2 => Winner::P2,
        }
    }
}

/// Terminal result as seen from one seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    Win,
    Lose,
    Draw,
}

impl Outcome {
    /// Translates a concluded winner into the outcome for `seat`.
    /// Returns `None` while the match is still in progress.
    pub fn for_seat(winner: Winner, seat: Seat) -> Option<Outcome> {
        match winner {
            Winner::None => None,
            Winner::Draw => Some(Outcome::Draw),
            w if w == Winner::from(seat) => Some(Outcome::Win),
            _ => Some(Outcome::Lose),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Win => "WIN",
            Outcome::Lose => "LOSE",
            Outcome::Draw => "DRAW",
        }
    }

    pub fn from_token(token: &str) -> Option<Outcome> {
        match token {
            "WIN" => Some(Outcome::Win),
            "LOSE" => Some(Outcome::Lose),
            "DRAW" => Some(Outcome::Draw),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which rule set a [`MatchRules`] instance evaluates.
///
/// In `Single` play only P1 is in play. P1 wins by clearing the field; running
/// out of time concludes the match in favour of the vacant P2 seat, which is a
/// loss for the lone player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameMode {
    Single,
    Versus,
}

/// Per-seat bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    pub score: u32,
    pub time_left_seconds: u32,
    /// Set once every balloon in this player's field is popped
    pub cleared: bool,
    /// Set once time ran out without clearing
    pub dead: bool,
    pub typed_total: u32,
    pub typed_correct: u32,
}

impl PlayerState {
    pub fn new(initial_time_seconds: u32) -> Self {
        Self {
            score: 0,
            time_left_seconds: initial_time_seconds,
            cleared: false,
            dead: false,
            typed_total: 0,
            typed_correct: 0,
        }
    }

    /// Fraction of correct submissions; `1.0` before anything was typed.
    pub fn accuracy(&self) -> f64 {
        if self.typed_total == 0 {
            1.0
        } else {
            self.typed_correct as f64 / self.typed_total as f64
        }
    }

    pub fn is_out(&self) -> bool {
        self.dead || self.time_left_seconds == 0
    }

    // Exact accuracy as (numerator, denominator) so ties compare without float error.
    fn accuracy_ratio(&self) -> (u64, u64) {
        if self.typed_total == 0 {
            (1, 1)
        } else {
            (self.typed_correct as u64, self.typed_total as u64)
        }
    }

    fn compare_accuracy(&self, other: &PlayerState) -> Ordering {
        let (n1, d1) = self.accuracy_ratio();
        let (n2, d2) = other.accuracy_ratio();
        (n1 * d2).cmp(&(n2 * d1))
    }
}

/// Terminal result handed to collaborators (score persistence, result screens).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub winner: Winner,
    pub p1: PlayerState,
    pub p2: PlayerState,
}

impl MatchSummary {
    pub fn player(&self, seat: Seat) -> &PlayerState {
        match seat {
            Seat::P1 => &self.p1,
            Seat::P2 => &self.p2,
        }
    }
}

/// The match state machine: `IN_PROGRESS` while the winner is `None`,
/// `CONCLUDED` afterwards.
#[derive(Debug, Clone)]
pub struct MatchRules {
    mode: GameMode,
    players: [PlayerState; 2],
    winner: Winner,
}

impl MatchRules {
    pub fn new(mode: GameMode, initial_time_seconds: u32) -> Self {
        Self {
            mode,
            players: [
                PlayerState::new(initial_time_seconds),
                PlayerState::new(initial_time_seconds),
            ],
            winner: Winner::None,
        }
    }

    pub fn versus(initial_time_seconds: u32) -> Self {
        Self::new(GameMode::Versus, initial_time_seconds)
    }

    pub fn single(initial_time_seconds: u32) -> Self {
        Self::new(GameMode::Single, initial_time_seconds)
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    pub fn winner(&self) -> Winner {
        self.winner
    }

    pub fn is_concluded(&self) -> bool {
        self.winner.is_concluded()
    }

    pub fn p1(&self) -> &PlayerState {
        &self.players[0]
    }

    pub fn p2(&self) -> &PlayerState {
        &self.players[1]
    }

    pub fn player(&self, seat: Seat) -> &PlayerState {
        &self.players[seat.index()]
    }

    pub fn summary(&self) -> MatchSummary {
        MatchSummary {
            winner: self.winner,
            p1: self.players[0].clone(),
            p2: self.players[1].clone(),
        }
    }

    /// Advances one second for every seat still racing.
    pub fn on_tick(&mut self) {
        if self.is_concluded() {
            return;
        }

        for seat in Seat::BOTH {
            if !self.in_play(seat) {
                continue;
            }
            let player = &mut self.players[seat.index()];
            if player.dead || player.cleared {
                continue;
            }
            player.time_left_seconds = player.time_left_seconds.saturating_sub(1);
            if player.time_left_seconds == 0 {
                player.dead = true;
            }
        }

        self.settle();
    }

    /// Records a correctly typed word for `seat`.
    pub fn on_pop(&mut self, seat: Seat, score_delta: u32, all_cleared: bool) {
        let Some(player) = self.acting_player(seat) else {
            return;
        };

        player.typed_total = player.typed_total.saturating_add(1);
        player.typed_correct = player.typed_correct.saturating_add(1);
        player.score = player.score.saturating_add(score_delta);
        if all_cleared {
            player.cleared = true;
        }

        self.settle();
    }

    /// Records a wrong submission; costs accuracy, never score.
    pub fn on_miss(&mut self, seat: Seat) {
        let Some(player) = self.acting_player(seat) else {
            return;
        };

        player.typed_total = player.typed_total.saturating_add(1);

        self.settle();
    }

    /// Marks `seat` as having cleared its field without counting a keystroke.
    pub fn on_finish(&mut self, seat: Seat) {
        let Some(player) = self.acting_player(seat) else {
            return;
        };

        if player.cleared {
            return;
        }
        player.cleared = true;

        self.settle();
    }

    /// Concludes the match in favour of the other seat (e.g. on disconnect).
    pub fn forfeit(&mut self, seat: Seat) {
        if self.is_concluded() {
            return;
        }
        self.winner = Winner::from(seat.opponent());
    }

    fn in_play(&self, seat: Seat) -> bool {
        match self.mode {
            GameMode::Versus => true,
            GameMode::Single => seat == Seat::P1,
        }
    }

    fn acting_player(&mut self, seat: Seat) -> Option<&mut PlayerState> {
        if self.is_concluded() || !self.in_play(seat) {
            return None;
        }
        let player = &mut self.players[seat.index()];
        if player.dead {
            return None;
        }
        Some(player)
    }

    fn settle(&mut self) {
        if self.winner == Winner::None {
            self.winner = self.resolve();
        }
    }

    fn resolve(&self) -> Winner {
        let [p1, p2] = &self.players;

        match self.mode {
            GameMode::Single => {
                if p1.cleared {
                    Winner::P1
                } else if p1.is_out() {
                    Winner::P2
                } else {
                    Winner::None
                }
            }
            GameMode::Versus => {
                // A clear beats any time-based outcome.
                match (p1.cleared, p2.cleared) {
                    (true, true) => return Winner::Draw,
                    (true, false) => return Winner::P1,
                    (false, true) => return Winner::P2,
                    (false, false) => {}
                }

                match (p1.is_out(), p2.is_out()) {
                    (false, false) => Winner::None,
                    (true, false) => Winner::P2,
                    (false, true) => Winner::P1,
                    (true, true) => {
                        match p1
                            .score
                            .cmp(&p2.score)
                            .then_with(|| p1.compare_accuracy(p2))
                        {
                            Ordering::Greater => Winner::P1,
                            Ordering::Less => Winner::P2,
                            Ordering::Equal => Winner::Draw,
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use proptest::prelude::*;

    fn tick_n(rules: &mut MatchRules, n: u32) {
        for _ in 0..n {
            rules.on_tick();
        }
    }

    #[test]
    fn test_new_match_is_in_progress() {
        let rules = MatchRules::versus(60);
        assert_eq!(rules.winner(), Winner::None);
        assert_eq!(rules.p1().time_left_seconds, 60);
        assert_eq!(rules.p2().score, 0);
        assert_approx_eq!(rules.p1().accuracy(), 1.0, 1e-9);
    }

    #[test]
    fn test_tick_decrements_and_marks_dead() {
        let mut rules = MatchRules::versus(2);
        rules.on_tick();
        assert_eq!(rules.p1().time_left_seconds, 1);
        assert!(!rules.p1().dead);

        rules.on_tick();
        assert_eq!(rules.p1().time_left_seconds, 0);
        assert!(rules.p1().dead);
        assert!(rules.p2().dead);
    }

    #[test]
    fn test_pop_updates_score_and_accuracy() {
        let mut rules = MatchRules::versus(60);
        rules.on_pop(Seat::P1, 10, false);
        rules.on_pop(Seat::P1, 10, false);
        rules.on_miss(Seat::P1);

        let p1 = rules.p1();
        assert_eq!(p1.score, 20);
        assert_eq!(p1.typed_total, 3);
        assert_eq!(p1.typed_correct, 2);
        assert_approx_eq!(p1.accuracy(), 2.0 / 3.0, 1e-9);
        assert_eq!(rules.winner(), Winner::None);
    }

    #[test]
    fn test_miss_does_not_score() {
        let mut rules = MatchRules::versus(60);
        rules.on_pop(Seat::P2, 10, false);
        for _ in 0..5 {
            rules.on_miss(Seat::P2);
            assert_eq!(rules.p2().score, 10);
        }
        assert_eq!(rules.p2().typed_total, 6);
    }

    #[test]
    fn test_clear_beats_time_and_score() {
        let mut rules = MatchRules::versus(60);
        for _ in 0..20 {
            rules.on_pop(Seat::P2, 10, false);
        }
        tick_n(&mut rules, 30);
        rules.on_pop(Seat::P1, 10, true);

        assert!(rules.p2().score > rules.p1().score);
        assert_eq!(rules.winner(), Winner::P1);
    }

    #[test]
    fn test_scenario_b_clear_concludes_immediately() {
        let mut rules = MatchRules::versus(60);
        tick_n(&mut rules, 30);
        assert_eq!(rules.p2().time_left_seconds, 30);

        rules.on_pop(Seat::P1, 10, true);
        assert_eq!(rules.winner(), Winner::P1);
        assert!(!rules.p2().cleared);
        assert_eq!(rules.p2().time_left_seconds, 30);
    }

    #[test]
    fn test_finish_marks_cleared() {
        let mut rules = MatchRules::versus(60);
        rules.on_pop(Seat::P2, 10, false);
        rules.on_finish(Seat::P2);

        assert!(rules.p2().cleared);
        assert_eq!(rules.p2().typed_total, 1);
        assert_eq!(rules.winner(), Winner::P2);
    }

    #[test]
    fn test_double_clear_is_draw() {
        // Resolution only sees one clear at a time through the public API,
        // so a double clear needs both flags set before the first check.
        let mut rules = MatchRules::versus(60);
        rules.players[0].cleared = true;
        rules.players[1].cleared = true;
        rules.settle();
        assert_eq!(rules.winner(), Winner::Draw);

        let mut rules = MatchRules::versus(60);
        rules.players[1].cleared = true;
        rules.on_pop(Seat::P1, 10, true);
        assert_eq!(rules.winner(), Winner::Draw);
    }

    #[test]
    fn test_scenario_a_score_decides_simultaneous_timeout() {
        let mut rules = MatchRules::versus(60);
        for _ in 0..5 {
            rules.on_pop(Seat::P1, 10, false);
        }
        assert_eq!(rules.p1().score, 50);
        assert_eq!(rules.p1().typed_total, 5);
        assert_eq!(rules.p1().typed_correct, 5);

        tick_n(&mut rules, 59);
        assert_eq!(rules.winner(), Winner::None);

        rules.on_tick();
        assert!(rules.p1().dead);
        assert!(rules.p2().dead);
        assert_eq!(rules.winner(), Winner::P1);
    }

    #[test]
    fn test_accuracy_breaks_score_tie() {
        let mut rules = MatchRules::versus(3);
        for _ in 0..9 {
            rules.on_pop(Seat::P1, 10, false);
            rules.on_pop(Seat::P2, 10, false);
            rules.on_miss(Seat::P2);
        }
        rules.on_miss(Seat::P1);

        assert_eq!(rules.p1().score, rules.p2().score);
        assert_approx_eq!(rules.p1().accuracy(), 0.9, 1e-9);
        assert_approx_eq!(rules.p2().accuracy(), 0.5, 1e-9);

        tick_n(&mut rules, 3);
        assert_eq!(rules.winner(), Winner::P1);
    }

    #[test]
    fn test_full_tie_is_draw() {
        let mut rules = MatchRules::versus(3);
        rules.on_pop(Seat::P1, 10, false);
        rules.on_miss(Seat::P1);
        rules.on_pop(Seat::P2, 10, false);
        rules.on_miss(Seat::P2);

        tick_n(&mut rules, 3);
        assert_eq!(rules.winner(), Winner::Draw);
    }

    #[test]
    fn test_no_op_after_conclusion() {
        let mut rules = MatchRules::versus(60);
        rules.on_pop(Seat::P1, 10, true);
        let before = rules.summary();

        rules.on_tick();
        rules.on_pop(Seat::P2, 10, true);
        rules.on_pop(Seat::P1, 10, false);
        rules.on_miss(Seat::P2);
        rules.on_finish(Seat::P2);
        rules.forfeit(Seat::P1);

        assert_eq!(rules.summary(), before);
    }

    #[test]
    fn test_pop_after_death_is_ignored() {
        // A tick marked P1 dead but the winner check has not run yet.
        let mut rules = MatchRules::versus(60);
        rules.players[0].dead = true;

        rules.on_pop(Seat::P1, 10, false);
        rules.on_miss(Seat::P1);
        assert_eq!(rules.p1().score, 0);
        assert_eq!(rules.p1().typed_total, 0);
    }

    #[test]
    fn test_forfeit_awards_opponent() {
        let mut rules = MatchRules::versus(60);
        rules.on_pop(Seat::P2, 10, false);
        rules.forfeit(Seat::P2);
        assert_eq!(rules.winner(), Winner::P1);
        assert_eq!(Outcome::for_seat(rules.winner(), Seat::P1), Some(Outcome::Win));
    }

    #[test]
    fn test_single_mode() {
        let mut rules = MatchRules::single(2);
        rules.on_pop(Seat::P2, 10, true);
        assert_eq!(rules.p2().score, 0);
        assert_eq!(rules.winner(), Winner::None);

        tick_n(&mut rules, 2);
        assert_eq!(rules.p2().time_left_seconds, 2);
        assert_eq!(rules.winner(), Winner::P2);
        assert_eq!(Outcome::for_seat(rules.winner(), Seat::P1), Some(Outcome::Lose));

        let mut rules = MatchRules::single(60);
        rules.on_pop(Seat::P1, 10, true);
        assert_eq!(rules.winner(), Winner::P1);
    }

    #[test]
    fn test_outcome_for_seat() {
        assert_eq!(Outcome::for_seat(Winner::None, Seat::P1), None);
        assert_eq!(Outcome::for_seat(Winner::P2, Seat::P2), Some(Outcome::Win));
        assert_eq!(Outcome::for_seat(Winner::P2, Seat::P1), Some(Outcome::Lose));
        assert_eq!(Outcome::for_seat(Winner::Draw, Seat::P1), Some(Outcome::Draw));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Tick,
        Pop(Seat, bool),
        Miss(Seat),
        Finish(Seat),
        Forfeit(Seat),
    }

    fn seat_strategy() -> impl Strategy<Value = Seat> {
        prop_oneof![Just(Seat::P1), Just(Seat::P2)]
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            6 => Just(Op::Tick),
            8 => (seat_strategy(), proptest::bool::weighted(0.05))
                .prop_map(|(seat, cleared)| Op::Pop(seat, cleared)),
            4 => seat_strategy().prop_map(Op::Miss),
            1 => seat_strategy().prop_map(Op::Finish),
            1 => seat_strategy().prop_map(Op::Forfeit),
        ]
    }

    fn run_op(rules: &mut MatchRules, op: &Op) {
        match *op {
            Op::Tick => rules.on_tick(),
            Op::Pop(seat, cleared) => rules.on_pop(seat, 10, cleared),
            Op::Miss(seat) => rules.on_miss(seat),
            Op::Finish(seat) => rules.on_finish(seat),
            Op::Forfeit(seat) => rules.forfeit(seat),
        }
    }

    proptest! {
        /// Counters stay consistent, and once a winner exists nothing about
        /// the match changes again.
        #[test]
        fn test_random_sequences_keep_invariants(
            single in any::<bool>(),
            initial_time in 1u32..8,
            ops in prop::collection::vec(op_strategy(), 0..150),
        ) {
            let mut rules = if single {
                MatchRules::single(initial_time)
            } else {
                MatchRules::versus(initial_time)
            };
            let mut frozen: Option<MatchSummary> = None;

            for op in &ops {
                run_op(&mut rules, op);

                for p in [rules.p1(), rules.p2()] {
                    prop_assert!(p.typed_correct <= p.typed_total);
                    prop_assert!((0.0..=1.0).contains(&p.accuracy()));
                    prop_assert!(p.time_left_seconds <= initial_time);
                    prop_assert_eq!(p.dead, p.time_left_seconds == 0);
                }

                match &frozen {
                    Some(summary) => prop_assert_eq!(&rules.summary(), summary),
                    None if rules.is_concluded() => frozen = Some(rules.summary()),
                    None => {}
                }
            }
        }
    }
}
