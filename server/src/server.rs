//! TCP front door: accepts connections, pairs them, and launches rooms.

use crate::pairing::{Pairing, PairingQueue};
use crate::room::{MatchRoom, RoomConfig};
use log::{error, info, warn};
use rand::Rng;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use versus_shared::{ClientMessage, Connection};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub room: RoomConfig,
    /// How long a paired connection may take to send its JOIN line
    pub join_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            room: RoomConfig::default(),
            join_timeout: Duration::from_secs(10),
        }
    }
}

pub struct MatchServer {
    listener: TcpListener,
    config: ServerConfig,
}

impl MatchServer {
    pub async fn bind(addr: &str, config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Match server listening on {}", listener.local_addr()?);
        Ok(Self { listener, config })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections forever, starting one room task per pair.
    pub async fn run(self) {
        let mut pairing = PairingQueue::new();
        let (requeue_tx, mut requeue_rx) = mpsc::unbounded_channel();

        loop {
            let arrival = tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        info!("Accepted connection from {}", addr);
                        Arrival::new(Connection::from_tcp(stream))
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        sleep(Duration::from_millis(100)).await;
                        continue;
                    }
                },
                Some(arrival) = requeue_rx.recv() => arrival,
            };

            if let Some(pair) = pairing.push(arrival) {
                tokio::spawn(launch_room(pair, self.config.clone(), requeue_tx.clone()));
            }
        }
    }
}

/// A connection waiting for a room, with its nickname once JOIN was read.
#[derive(Debug)]
pub(crate) struct Arrival {
    conn: Connection,
    nickname: Option<String>,
}

impl Arrival {
    fn new(conn: Connection) -> Self {
        Self {
            conn,
            nickname: None,
        }
    }

    /// Reads JOIN unless an earlier pairing already did.
    async fn introduce(&mut self, join_timeout: Duration) -> bool {
        if self.nickname.is_none() {
            self.nickname = read_join(&self.conn, join_timeout).await;
        }
        self.nickname.is_some()
    }
}

/// Handshakes both arrivals and runs their room. When one of them is gone
/// before JOIN, the other goes back into the pairing queue.
pub(crate) async fn launch_room(
    pair: Pairing<Arrival>,
    config: ServerConfig,
    requeue: mpsc::UnboundedSender<Arrival>,
) {
    let Pairing {
        room_id,
        mut first,
        mut second,
    } = pair;

    let (first_ok, second_ok) = tokio::join!(
        first.introduce(config.join_timeout),
        second.introduce(config.join_timeout)
    );

    match (first_ok, second_ok) {
        (true, true) => {}
        (false, false) => {
            warn!("Room {}: both players left before joining", room_id);
            first.conn.close().await;
            second.conn.close().await;
            return;
        }
        (left, _) => {
            let (gone, survivor) = if left { (second, first) } else { (first, second) };
            warn!(
                "Room {}: {} left before joining, requeueing {}",
                room_id,
                gone.conn.peer(),
                survivor.conn.peer()
            );
            gone.conn.close().await;
            if let Err(e) = requeue.send(survivor) {
                e.0.conn.close().await;
            }
            return;
        }
    }

    let nicknames = [
        first.nickname.unwrap_or_default(),
        second.nickname.unwrap_or_default(),
    ];
    let room = MatchRoom::new(room_id, config.room, [first.conn, second.conn], nicknames);
    let report = room.run().await;
    info!(
        "Room {} closed: {:?} {:?}",
        report.room_id, report.summary.winner, report.ended_by
    );
}

/// Reads the JOIN handshake. A missing or malformed JOIN falls back to a
/// placeholder name; `None` means the connection ended before saying anything.
pub(crate) async fn read_join(conn: &Connection, join_timeout: Duration) -> Option<String> {
    let line = match timeout(join_timeout, conn.read_line()).await {
        Ok(Ok(Some(line))) => line,
        Ok(Ok(None)) => return None,
        Ok(Err(e)) => {
            warn!("Lost {} before JOIN: {}", conn.peer(), e);
            return None;
        }
        Err(_) => {
            warn!("No JOIN from {} within {:?}", conn.peer(), join_timeout);
            return Some(placeholder_nickname());
        }
    };

    match ClientMessage::parse(&line) {
        Ok(ClientMessage::Join { nickname }) => Some(nickname),
        Ok(other) => {
            warn!("Expected JOIN from {}, got {:?}", conn.peer(), other);
            Some(placeholder_nickname())
        }
        Err(e) => {
            warn!("Malformed JOIN from {}: {}", conn.peer(), e);
            Some(placeholder_nickname())
        }
    }
}

fn placeholder_nickname() -> String {
    format!("guest-{:04x}", rand::thread_rng().gen::<u16>())
}
