//! Client-side view of a versus match.
//!
//! [`VersusSession`] turns server messages into presentation events and keeps
//! the bits of state a game screen needs: our seat, whether the race started,
//! pop counts for both sides, effects aimed at us, and the final outcome.

use std::fmt;
use std::time::Instant;
use versus_shared::{
    EffectCategory, Outcome, Seat, ServerMessage, TemporaryEffectRegistry,
    EFFECT_DURATION_SECONDS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Assigned(Seat),
    Started,
    WordPopped { seat: Seat, word: String, mine: bool },
    EffectApplied { category: EffectCategory, seconds: i64 },
    Toast { flag: String, message: String },
    Finished(Outcome),
    /// The server closed the stream without sending a result
    Aborted,
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::Assigned(seat) => write!(f, "You are {}", seat),
            SessionEvent::Started => f.write_str("Go!"),
            SessionEvent::WordPopped { word, mine: true, .. } => write!(f, "You popped {}", word),
            SessionEvent::WordPopped { seat, word, .. } => write!(f, "{} popped {}", seat, word),
            SessionEvent::EffectApplied { category, seconds } => {
                write!(f, "Hit by {:?} for {}s", category, seconds)
            }
            SessionEvent::Toast { flag, message } => write!(f, "[{}] {}", flag, message),
            SessionEvent::Finished(Outcome::Win) => f.write_str("You win!"),
            SessionEvent::Finished(Outcome::Lose) => f.write_str("You lose."),
            SessionEvent::Finished(Outcome::Draw) => f.write_str("Draw."),
            SessionEvent::Aborted => f.write_str("Match aborted: connection closed"),
        }
    }
}

#[derive(Debug, Default)]
pub struct VersusSession {
    seat: Option<Seat>,
    started: bool,
    my_pops: u32,
    opponent_pops: u32,
    outcome: Option<Outcome>,
    aborted: bool,
    effects: TemporaryEffectRegistry,
}

impl VersusSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seat(&self) -> Option<Seat> {
        self.seat
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn my_pops(&self) -> u32 {
        self.my_pops
    }

    pub fn opponent_pops(&self) -> u32 {
        self.opponent_pops
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn effects(&self) -> &TemporaryEffectRegistry {
        &self.effects
    }

    pub fn is_over(&self) -> bool {
        self.outcome.is_some() || self.aborted
    }

    pub fn apply(&mut self, message: ServerMessage) -> Option<SessionEvent> {
        self.apply_at(message, Instant::now())
    }

    /// Folds one server message into the session. Returns `None` for messages
    /// that change nothing, such as anything arriving after the result.
    pub fn apply_at(&mut self, message: ServerMessage, now: Instant) -> Option<SessionEvent> {
        if self.is_over() {
            return None;
        }

        match message {
            ServerMessage::Role(seat) => {
                self.seat = Some(seat);
                Some(SessionEvent::Assigned(seat))
            }
            ServerMessage::Start => {
                if self.started {
                    return None;
                }
                self.started = true;
                Some(SessionEvent::Started)
            }
            ServerMessage::Pop { seat, word } => {
                let mine = self.seat == Some(seat);
                if mine {
                    self.my_pops += 1;
                } else {
                    self.opponent_pops += 1;
                }
                Some(SessionEvent::WordPopped { seat, word, mine })
            }
            ServerMessage::Toast { flag, message } => {
                match (EffectCategory::from_flag(&flag), self.seat) {
                    (Some(category), Some(seat)) => {
                        self.effects
                            .apply_at(seat, category, EFFECT_DURATION_SECONDS, now);
                        Some(SessionEvent::EffectApplied {
                            category,
                            seconds: EFFECT_DURATION_SECONDS,
                        })
                    }
                    _ => Some(SessionEvent::Toast { flag, message }),
                }
            }
            ServerMessage::Result(outcome) => {
                self.outcome = Some(outcome);
                Some(SessionEvent::Finished(outcome))
            }
        }
    }

    /// Call when the server stream ends. A close before any RESULT means the
    /// match was aborted.
    pub fn on_closed(&mut self) -> Option<SessionEvent> {
        if self.is_over() {
            return None;
        }
        self.aborted = true;
        Some(SessionEvent::Aborted)
    }
}
