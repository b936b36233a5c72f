//! # Versus Shared Library
//!
//! Types and logic shared by the match server and the game clients of the
//! two-player typing race.
//!
//! ## Module Organization
//!
//! ### Rules Module (`rules`)
//! The authoritative match state machine: per-seat score, remaining time,
//! clear/death flags, accuracy counters, and the winner resolution used by
//! both versus and single play. Pure logic, no I/O.
//!
//! ### Effects Module (`effects`)
//! Timed status effects (vision block, input reverse) keyed by target seat.
//! Advisory state for presentation only; never consulted by the rules.
//!
//! ### Protocol Module (`protocol`)
//! Parsing and formatting of the newline-delimited text protocol spoken
//! between clients and the server.
//!
//! ### Connection Module (`connection`)
//! A line-oriented wrapper around any reliable bidirectional byte stream,
//! with serialized writes and an idempotent close.
//!
//! ## Wire Summary
//!
//! ```text
//! client -> server   JOIN <nickname> | POP <word> | MISS | FINISH | RETRY
//!                    TOAST <flag> <msg>
//! server -> client   ROLE P1|P2 | START | POP <seat> <word> | TOAST <flag> <msg>
//!                    RESULT WIN|LOSE|DRAW
//! ```

pub mod connection;
pub mod effects;
pub mod protocol;
pub mod rules;

pub use connection::{Connection, ConnectionError, MAX_LINE_BYTES};
pub use effects::{EffectCategory, TemporaryEffectRegistry, MAX_EFFECT_SECONDS};
pub use protocol::{ClientMessage, ProtocolError, ServerMessage};
pub use rules::{GameMode, MatchRules, MatchSummary, Outcome, PlayerState, Seat, Winner};

/// Default TCP port of the match server.
pub const DEFAULT_PORT: u16 = 5555;
/// Time budget each seat starts a match with.
pub const INITIAL_TIME_SECONDS: u32 = 60;
/// Score awarded for every accepted POP.
pub const SCORE_PER_POP: u32 = 10;
/// How long a relayed effect toast stays active on the receiving side.
pub const EFFECT_DURATION_SECONDS: i64 = 5;
