//! # Versus Match Server Library
//!
//! The authoritative side of the two-player typing race. The server accepts
//! TCP connections, pairs them strictly in arrival order, and runs one
//! [`room::MatchRoom`] per pair until a winner is known or a player leaves.
//!
//! ## Core Responsibilities
//!
//! ### Pairing
//! The 1st and 2nd accepted connections become P1 and P2 of room 1, the 3rd
//! and 4th of room 2, and so on. Each connection's `JOIN <nickname>` line is
//! read before seats are assigned; a missing or malformed JOIN only costs the
//! player their display name. If one of the pair hangs up before JOIN, the
//! other goes back into the queue for the next arrival.
//!
//! ### Authoritative Rules
//! Every room owns its own `MatchRules` instance. Clients report what they
//! typed; the room decides what counts, advances the clock once per tick, and
//! announces the result. Nothing is shared between rooms.
//!
//! ### Failure Isolation
//! A dropped connection ends only its own room: the remaining player is
//! awarded the match, both connections are closed, and the room's tasks stop.
//! A player who stops reading is dropped after the room's write timeout and
//! loses by forfeit. The accept loop keeps pairing new arrivals regardless.
//!
//! ## Module Organization
//!
//! ### Pairing Module (`pairing`)
//! Arrival-order pairing queue and room id assignment.
//!
//! ### Room Module (`room`)
//! The per-match coordinator: seat assignment, START, the tick task, the
//! receive loops, and the single RESULT broadcast.
//!
//! ### Server Module (`server`)
//! Listener setup, the accept loop, and the JOIN handshake.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use versus_server::server::{MatchServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = MatchServer::bind("0.0.0.0:5555", ServerConfig::default()).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod pairing;
pub mod room;
pub mod server;

pub use room::{MatchRoom, RoomConfig, RoomEnd, RoomReport};
pub use server::{MatchServer, ServerConfig};
