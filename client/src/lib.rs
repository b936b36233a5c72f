//! # Versus Client Library
//!
//! Client-side pieces of the typing race: the protocol client that talks to
//! the match server, the session state built from what the server says, the
//! local word field, and an offline practice mode.
//!
//! ## Architecture Overview
//!
//! The server is authoritative for scores, clocks, and the winner. The client
//! only reports what the player typed and whether their field is clear, then
//! renders whatever the server echoes back. Status effects received through
//! TOAST live purely on the client and never influence the result.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! [`MatchClient`] sends JOIN on connect and exposes one method per client
//! command. Reads and writes are independent, so a receive task can run next
//! to the input loop.
//!
//! ### Session Module (`session`)
//! [`VersusSession`] folds server messages into presentation events: seat
//! assignment, start, echoed pops, effects, and the final outcome.
//!
//! ### Field Module (`field`)
//! [`WordField`] tracks which balloons are still floating and reports when
//! the last one is popped.
//!
//! ### Practice Module (`practice`)
//! Single-player mode driven by the shared rules, no server required.

pub mod field;
pub mod network;
pub mod practice;
pub mod session;

pub use field::{PopResult, WordField};
pub use network::{ClientError, MatchClient};
pub use practice::{run_practice, PracticeConfig};
pub use session::{SessionEvent, VersusSession};
