//! Client side of the match protocol.
//!
//! [`MatchClient`] is a thin sender/receiver: it introduces itself with JOIN
//! on connect, then forwards gameplay events as protocol lines and hands
//! server lines back to the caller's receive loop. All methods take `&self`,
//! so one task can send while another blocks on [`MatchClient::next_message`].

use log::debug;
use thiserror::Error;
use tokio::net::TcpStream;
use versus_shared::{ClientMessage, Connection, ConnectionError, ServerMessage};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("a word must be a single non-empty token, got {0:?}")]
    InvalidWord(String),

    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

pub struct MatchClient {
    conn: Connection,
    nickname: String,
}

impl MatchClient {
    pub async fn connect(addr: &str, nickname: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        Self::join(Connection::from_tcp(stream), nickname).await
    }

    /// Sends JOIN over an already open connection.
    pub async fn join(conn: Connection, nickname: &str) -> Result<Self, ClientError> {
        let nickname = normalize_nickname(nickname);
        conn.send(&ClientMessage::Join {
            nickname: nickname.clone(),
        })
        .await?;
        debug!("Joined {} as {}", conn.peer(), nickname);

        Ok(Self { conn, nickname })
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub async fn send_pop(&self, word: &str) -> Result<(), ClientError> {
        if word.is_empty() || word.contains(char::is_whitespace) {
            return Err(ClientError::InvalidWord(word.to_string()));
        }
        self.send(ClientMessage::Pop {
            word: word.to_string(),
        })
        .await
    }

    /// Reports a typed word that matched nothing.
    pub async fn send_miss(&self) -> Result<(), ClientError> {
        self.send(ClientMessage::Miss).await
    }

    pub async fn send_finish(&self) -> Result<(), ClientError> {
        self.send(ClientMessage::Finish).await
    }

    pub async fn send_retry(&self) -> Result<(), ClientError> {
        self.send(ClientMessage::Retry).await
    }

    pub async fn send_toast(&self, flag: &str, message: &str) -> Result<(), ClientError> {
        if flag.is_empty() || flag.contains(char::is_whitespace) {
            return Err(ClientError::InvalidWord(flag.to_string()));
        }
        self.send(ClientMessage::Toast {
            flag: flag.to_string(),
            message: message.to_string(),
        })
        .await
    }

    async fn send(&self, message: ClientMessage) -> Result<(), ClientError> {
        self.conn.send(&message).await?;
        Ok(())
    }

    /// Raw next line from the server; `None` once the server closed the stream.
    pub async fn read_line(&self) -> Result<Option<String>, ClientError> {
        Ok(self.conn.read_line().await?)
    }

    /// Next recognized server message. Unrecognized lines are skipped.
    pub async fn next_message(&self) -> Result<Option<ServerMessage>, ClientError> {
        loop {
            let Some(line) = self.read_line().await? else {
                return Ok(None);
            };
            match ServerMessage::parse(&line) {
                Ok(message) => return Ok(Some(message)),
                Err(e) => debug!("Skipping server line {:?}: {}", line, e),
            }
        }
    }

    pub async fn close(&self) {
        self.conn.close().await;
    }
}

// Collapses whitespace runs; an empty result becomes "player".
fn normalize_nickname(nickname: &str) -> String {
    let joined = nickname.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        "player".to_string()
    } else {
        joined
    }
}
