//! Line protocol between match clients and the match server.
//!
//! Each message is one line of space-separated tokens with a case-sensitive
//! leading keyword. Formatting through `Display` produces the line without
//! its trailing newline; [`crate::Connection`] appends that.

use crate::rules::{Outcome, Seat};
use std::fmt;
use thiserror::Error;

/// Lines a client sends to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Join { nickname: String },
    Pop { word: String },
    /// A submission that matched no balloon; costs accuracy only
    Miss,
    Finish,
    Retry,
    Toast { flag: String, message: String },
}

/// Lines the server sends to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Role(Seat),
    Start,
    Pop { seat: Seat, word: String },
    Toast { flag: String, message: String },
    Result(Outcome),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("empty line")]
    Empty,

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("{command} is missing its {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("{command} has an invalid argument: {value}")]
    InvalidArgument { command: &'static str, value: String },
}

// Splits off the keyword; the remainder keeps interior spacing but loses the
// separating whitespace.
fn split_keyword(line: &str) -> Result<(&str, &str), ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(match line.split_once(char::is_whitespace) {
        Some((keyword, rest)) => (keyword, rest.trim_start()),
        None => (line, ""),
    })
}

fn first_token<'a>(
    rest: &'a str,
    command: &'static str,
    argument: &'static str,
) -> Result<&'a str, ProtocolError> {
    rest.split_whitespace()
        .next()
        .ok_or(ProtocolError::MissingArgument { command, argument })
}

fn parse_toast(rest: &str) -> Result<(String, String), ProtocolError> {
    let flag = first_token(rest, "TOAST", "flag")?;
    let message = rest[flag.len()..].trim().to_string();
    Ok((flag.to_string(), message))
}

impl ClientMessage {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let (keyword, rest) = split_keyword(line)?;
        match keyword {
            "JOIN" => {
                if rest.is_empty() {
                    return Err(ProtocolError::MissingArgument {
                        command: "JOIN",
                        argument: "nickname",
                    });
                }
                Ok(ClientMessage::Join {
                    nickname: rest.to_string(),
                })
            }
            "POP" => Ok(ClientMessage::Pop {
                word: first_token(rest, "POP", "word")?.to_string(),
            }),
            "MISS" => Ok(ClientMessage::Miss),
            "FINISH" => Ok(ClientMessage::Finish),
            "RETRY" => Ok(ClientMessage::Retry),
            "TOAST" => {
                let (flag, message) = parse_toast(rest)?;
                Ok(ClientMessage::Toast { flag, message })
            }
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

impl ServerMessage {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let (keyword, rest) = split_keyword(line)?;
        match keyword {
            "ROLE" => {
                let token = first_token(rest, "ROLE", "seat")?;
                Seat::from_token(token)
                    .map(ServerMessage::Role)
                    .ok_or_else(|| ProtocolError::InvalidArgument {
                        command: "ROLE",
                        value: token.to_string(),
                    })
            }
            "START" => Ok(ServerMessage::Start),
            "POP" => {
                let mut tokens = rest.split_whitespace();
                let seat_token = tokens.next().ok_or(ProtocolError::MissingArgument {
                    command: "POP",
                    argument: "seat",
                })?;
                let seat =
                    Seat::from_token(seat_token).ok_or_else(|| ProtocolError::InvalidArgument {
                        command: "POP",
                        value: seat_token.to_string(),
                    })?;
                let word = tokens.next().ok_or(ProtocolError::MissingArgument {
                    command: "POP",
                    argument: "word",
                })?;
                Ok(ServerMessage::Pop {
                    seat,
                    word: word.to_string(),
                })
            }
            "TOAST" => {
                let (flag, message) = parse_toast(rest)?;
                Ok(ServerMessage::Toast { flag, message })
            }
            "RESULT" => {
                let token = first_token(rest, "RESULT", "outcome")?;
                Outcome::from_token(token)
                    .map(ServerMessage::Result)
                    .ok_or_else(|| ProtocolError::InvalidArgument {
                        command: "RESULT",
                        value: token.to_string(),
                    })
            }
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

fn write_toast(f: &mut fmt::Formatter<'_>, flag: &str, message: &str) -> fmt::Result {
    if message.is_empty() {
        write!(f, "TOAST {}", flag)
    } else {
        write!(f, "TOAST {} {}", flag, message)
    }
}

impl fmt::Display for ClientMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientMessage::Join { nickname } => write!(f, "JOIN {}", nickname),
            ClientMessage::Pop { word } => write!(f, "POP {}", word),
            ClientMessage::Miss => f.write_str("MISS"),
            ClientMessage::Finish => f.write_str("FINISH"),
            ClientMessage::Retry => f.write_str("RETRY"),
            ClientMessage::Toast { flag, message } => write_toast(f, flag, message),
        }
    }
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Role(seat) => write!(f, "ROLE {}", seat),
            ServerMessage::Start => f.write_str("START"),
            ServerMessage::Pop { seat, word } => write!(f, "POP {} {}", seat, word),
            ServerMessage::Toast { flag, message } => write_toast(f, flag, message),
            ServerMessage::Result(outcome) => write!(f, "RESULT {}", outcome),
        }
    }
}
