//! One authoritative versus match between two connections.
//!
//! A room runs its tasks against one shared [`MatchRules`]: a once-per-tick
//! timer, a blocking receive loop per seat, and a writer per seat. State
//! changes happen under the room lock, which only ever queues outgoing lines;
//! the writers do the socket I/O. RESULT is queued under the lock right
//! before the queues are closed, so exactly one path ends the match and
//! nothing is sent after RESULT. A peer that stops reading stalls only its
//! own writer, which gives up after `write_timeout`.

use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{watch, Mutex};
use tokio::time::{interval, timeout, MissedTickBehavior};
use versus_shared::{
    ClientMessage, Connection, MatchRules, MatchSummary, Outcome, Seat, ServerMessage,
    INITIAL_TIME_SECONDS, SCORE_PER_POP,
};

/// Lines queued per seat before a slow reader starts losing them.
const OUTBOX_CAPACITY: usize = 256;

/// Per-room tunables.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    pub initial_time_seconds: u32,
    pub tick_interval: Duration,
    pub score_per_pop: u32,
    /// How long one line may take to reach a peer before the seat is dropped
    pub write_timeout: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            initial_time_seconds: INITIAL_TIME_SECONDS,
            tick_interval: Duration::from_secs(1),
            score_per_pop: SCORE_PER_POP,
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// How a room came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEnd {
    /// The rules produced a winner
    Resolved,
    /// A seat disconnected and the other seat was awarded the win
    Forfeit { leaver: Seat },
    /// The room's tasks stopped without a result
    Abandoned,
}

#[derive(Debug, Clone)]
pub struct RoomReport {
    pub room_id: u64,
    pub nicknames: [String; 2],
    pub summary: MatchSummary,
    pub ended_by: RoomEnd,
}

struct RoomState {
    rules: MatchRules,
    ended_by: Option<RoomEnd>,
    // Installed when the room opens and dropped when it ends; the writers
    // drain what is left and close their connections.
    outboxes: Option<[mpsc::Sender<ServerMessage>; 2]>,
}

impl RoomState {
    fn is_finished(&self) -> bool {
        self.ended_by.is_some()
    }

    /// Queues `message` for `seat` without waiting.
    fn enqueue(&self, room_id: u64, seat: Seat, message: ServerMessage) {
        let Some(outboxes) = &self.outboxes else {
            return;
        };
        match outboxes[seat.index()].try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(message)) => {
                warn!("Room {}: {} is not reading, dropping {}", room_id, seat, message);
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Room {}: writer for {} already stopped", room_id, seat);
            }
        }
    }

    fn broadcast(&self, room_id: u64, message: ServerMessage) {
        self.enqueue(room_id, Seat::P1, message.clone());
        self.enqueue(room_id, Seat::P2, message);
    }
}

pub struct MatchRoom {
    id: u64,
    config: RoomConfig,
    seats: [Arc<Connection>; 2],
    nicknames: [String; 2],
    state: Mutex<RoomState>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl MatchRoom {
    /// `connections[0]` becomes P1 and `connections[1]` becomes P2.
    pub fn new(
        id: u64,
        config: RoomConfig,
        connections: [Connection; 2],
        nicknames: [String; 2],
    ) -> Self {
        let rules = MatchRules::versus(config.initial_time_seconds);
        let [first, second] = connections;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Self {
            id,
            config,
            seats: [Arc::new(first), Arc::new(second)],
            nicknames,
            state: Mutex::new(RoomState {
                rules,
                ended_by: None,
                outboxes: None,
            }),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Plays the match to completion and returns its final state.
    pub async fn run(self) -> RoomReport {
        let room = Arc::new(self);
        info!(
            "Room {}: {} (P1) vs {} (P2)",
            room.id, room.nicknames[0], room.nicknames[1]
        );

        let [p1_rx, p2_rx] = room.open().await;

        let writers = [
            ("P1 writer", tokio::spawn(Arc::clone(&room).write_loop(Seat::P1, p1_rx))),
            ("P2 writer", tokio::spawn(Arc::clone(&room).write_loop(Seat::P2, p2_rx))),
        ];
        let tasks = [
            ("ticker", tokio::spawn(Arc::clone(&room).tick_loop())),
            ("P1 receiver", tokio::spawn(Arc::clone(&room).receive_loop(Seat::P1))),
            ("P2 receiver", tokio::spawn(Arc::clone(&room).receive_loop(Seat::P2))),
        ];
        for (name, task) in tasks {
            if let Err(e) = task.await {
                error!("Room {}: {} task failed: {}", room.id, name, e);
            }
        }

        room.abandon_if_unfinished().await;
        for (name, task) in writers {
            if let Err(e) = task.await {
                error!("Room {}: {} task failed: {}", room.id, name, e);
            }
        }

        room.report().await
    }

    fn conn(&self, seat: Seat) -> &Arc<Connection> {
        &self.seats[seat.index()]
    }

    /// Assigns seats and starts both clients. Returns the receiving ends of
    /// the per-seat outboxes for the writers.
    async fn open(&self) -> [mpsc::Receiver<ServerMessage>; 2] {
        let (p1_tx, p1_rx) = mpsc::channel(OUTBOX_CAPACITY);
        let (p2_tx, p2_rx) = mpsc::channel(OUTBOX_CAPACITY);

        let mut state = self.state.lock().await;
        state.outboxes = Some([p1_tx, p2_tx]);
        for seat in Seat::BOTH {
            state.enqueue(self.id, seat, ServerMessage::Role(seat));
        }
        state.broadcast(self.id, ServerMessage::Start);
        debug!("Room {}: started", self.id);
        [p1_rx, p2_rx]
    }

    /// Delivers queued lines to one seat. A failed or stalled write closes
    /// the connection, which the seat's receive loop reports as a disconnect.
    async fn write_loop(self: Arc<Self>, seat: Seat, mut inbox: mpsc::Receiver<ServerMessage>) {
        let conn = Arc::clone(self.conn(seat));

        while let Some(message) = inbox.recv().await {
            match timeout(self.config.write_timeout, conn.send(&message)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!("Room {}: send to {} failed: {}", self.id, seat, e);
                    break;
                }
                Err(_) => {
                    warn!(
                        "Room {}: {} did not take {} within {:?}",
                        self.id, seat, message, self.config.write_timeout
                    );
                    break;
                }
            }
        }

        conn.close().await;
        debug!("Room {}: writer for {} stopped", self.id, seat);
    }

    async fn tick_loop(self: Arc<Self>) {
        let mut shutdown_rx = self.shutdown_rx.clone();
        let period = self.config.tick_interval.max(Duration::from_millis(1));
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // Skip the first tick since it fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => {
                    let mut state = self.state.lock().await;
                    if state.is_finished() {
                        break;
                    }
                    state.rules.on_tick();
                    if state.rules.is_concluded() {
                        self.finish(&mut state, RoomEnd::Resolved);
                        break;
                    }
                }
            }
        }

        debug!("Room {}: ticker stopped", self.id);
    }

    async fn receive_loop(self: Arc<Self>, seat: Seat) {
        let conn = Arc::clone(self.conn(seat));
        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            let read = tokio::select! {
                _ = shutdown_rx.changed() => break,
                read = conn.read_line() => read,
            };
            match read {
                Ok(Some(line)) => self.handle_line(seat, &line).await,
                Ok(None) => {
                    debug!("Room {}: {} reached end of stream", self.id, seat);
                    break;
                }
                Err(e) => {
                    info!("Room {}: {} transport error: {}", self.id, seat, e);
                    break;
                }
            }
        }

        self.disconnect(seat).await;
    }

    async fn handle_line(&self, seat: Seat, line: &str) {
        let message = match ClientMessage::parse(line) {
            Ok(message) => message,
            Err(e) => {
                warn!("Room {}: ignoring line from {} ({}): {:?}", self.id, seat, e, line);
                return;
            }
        };

        let mut state = self.state.lock().await;
        if state.is_finished() {
            return;
        }

        match message {
            ClientMessage::Pop { word } => {
                let before = state.rules.player(seat).typed_correct;
                state.rules.on_pop(seat, self.config.score_per_pop, false);

                if state.rules.player(seat).typed_correct != before {
                    state.broadcast(self.id, ServerMessage::Pop { seat, word });
                } else {
                    debug!("Room {}: POP from {} not accepted", self.id, seat);
                }
            }
            ClientMessage::Miss => {
                debug!("Room {}: {} missed", self.id, seat);
                state.rules.on_miss(seat);
            }
            ClientMessage::Finish => {
                info!("Room {}: {} reports a cleared field", self.id, seat);
                state.rules.on_finish(seat);
            }
            ClientMessage::Toast { flag, message } => {
                state.enqueue(self.id, seat.opponent(), ServerMessage::Toast { flag, message });
            }
            ClientMessage::Retry => {
                info!(
                    "Room {}: {} asked for a rematch; rematches need a new pairing",
                    self.id, seat
                );
            }
            ClientMessage::Join { nickname } => {
                debug!("Room {}: ignoring repeated JOIN {} from {}", self.id, nickname, seat);
            }
        }

        if state.rules.is_concluded() {
            self.finish(&mut state, RoomEnd::Resolved);
        }
    }

    /// Treats the loss of `seat` as a forfeit unless the match already ended.
    async fn disconnect(&self, seat: Seat) {
        let mut state = self.state.lock().await;
        if state.is_finished() {
            return;
        }

        info!("Room {}: {} left, awarding the match to {}", self.id, seat, seat.opponent());
        state.rules.forfeit(seat);
        self.finish(&mut state, RoomEnd::Forfeit { leaver: seat });
    }

    // Runs exactly once per room, with the room lock held by the caller.
    fn finish(&self, state: &mut RoomState, ended_by: RoomEnd) {
        state.ended_by = Some(ended_by);
        let winner = state.rules.winner();

        for seat in Seat::BOTH {
            if let Some(outcome) = Outcome::for_seat(winner, seat) {
                state.enqueue(self.id, seat, ServerMessage::Result(outcome));
            }
        }

        self.shutdown(state);
        info!("Room {}: finished with {:?} ({:?})", self.id, winner, ended_by);
    }

    fn shutdown(&self, state: &mut RoomState) {
        state.outboxes = None;
        let _ = self.shutdown_tx.send(true);
    }

    async fn abandon_if_unfinished(&self) {
        let mut state = self.state.lock().await;
        if state.is_finished() {
            return;
        }
        warn!("Room {}: tasks stopped without a result", self.id);
        state.ended_by = Some(RoomEnd::Abandoned);
        self.shutdown(&mut state);
    }

    async fn report(&self) -> RoomReport {
        let state = self.state.lock().await;
        let summary = state.rules.summary();

        match serde_json::to_string(&summary) {
            Ok(json) => info!("Room {}: summary {}", self.id, json),
            Err(e) => warn!("Room {}: could not serialize summary: {}", self.id, e),
        }

        RoomReport {
            room_id: self.id,
            nicknames: self.nicknames.clone(),
            summary,
            ended_by: state.ended_by.unwrap_or(RoomEnd::Abandoned),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use versus_shared::Winner;

    struct Harness {
        room: JoinHandle<RoomReport>,
        p1: Connection,
        p2: Connection,
    }

    fn start_room(config: RoomConfig) -> Harness {
        let (server_a, client_a) = duplex(4096);
        let (server_b, client_b) = duplex(4096);
        let room = MatchRoom::new(
            7,
            config,
            [Connection::new(server_a, "a"), Connection::new(server_b, "b")],
            ["alice".to_string(), "bob".to_string()],
        );

        Harness {
            room: tokio::spawn(room.run()),
            p1: Connection::new(client_a, "client a"),
            p2: Connection::new(client_b, "client b"),
        }
    }

    fn slow_config() -> RoomConfig {
        RoomConfig {
            tick_interval: Duration::from_secs(60),
            ..RoomConfig::default()
        }
    }

    async fn next(conn: &Connection) -> Option<String> {
        timeout(Duration::from_secs(5), conn.read_line())
            .await
            .expect("timed out waiting for a line")
            .unwrap()
    }

    async fn expect_start(h: &Harness) {
        assert_eq!(next(&h.p1).await.as_deref(), Some("ROLE P1"));
        assert_eq!(next(&h.p1).await.as_deref(), Some("START"));
        assert_eq!(next(&h.p2).await.as_deref(), Some("ROLE P2"));
        assert_eq!(next(&h.p2).await.as_deref(), Some("START"));
    }

    #[tokio::test]
    async fn test_pop_is_echoed_to_both_seats() {
        let h = start_room(slow_config());
        expect_start(&h).await;

        h.p1.send_line("POP hello").await.unwrap();
        assert_eq!(next(&h.p1).await.as_deref(), Some("POP P1 hello"));
        assert_eq!(next(&h.p2).await.as_deref(), Some("POP P1 hello"));

        h.p2.send_line("POP world").await.unwrap();
        assert_eq!(next(&h.p1).await.as_deref(), Some("POP P2 world"));
        assert_eq!(next(&h.p2).await.as_deref(), Some("POP P2 world"));

        h.p1.close().await;
        let report = h.room.await.unwrap();
        assert_eq!(report.summary.p1.score, SCORE_PER_POP);
        assert_eq!(report.summary.p2.score, SCORE_PER_POP);
    }

    #[tokio::test]
    async fn test_finish_sends_results_and_closes() {
        let h = start_room(slow_config());
        expect_start(&h).await;

        h.p2.send_line("FINISH").await.unwrap();
        assert_eq!(next(&h.p1).await.as_deref(), Some("RESULT LOSE"));
        assert_eq!(next(&h.p2).await.as_deref(), Some("RESULT WIN"));
        assert_eq!(next(&h.p1).await, None);
        assert_eq!(next(&h.p2).await, None);

        let report = h.room.await.unwrap();
        assert_eq!(report.ended_by, RoomEnd::Resolved);
        assert_eq!(report.summary.winner, Winner::P2);
        assert!(report.summary.p2.cleared);
    }

    #[tokio::test]
    async fn test_malformed_lines_are_ignored() {
        let h = start_room(slow_config());
        expect_start(&h).await;

        h.p1.send_line("DANCE").await.unwrap();
        h.p1.send_line("POP").await.unwrap();
        h.p1.send_line("").await.unwrap();
        h.p1.send_line("RETRY").await.unwrap();
        h.p1.send_line("POP ok").await.unwrap();

        assert_eq!(next(&h.p2).await.as_deref(), Some("POP P1 ok"));
        assert_eq!(next(&h.p1).await.as_deref(), Some("POP P1 ok"));
        h.p2.close().await;
        h.room.await.unwrap();
    }

    #[tokio::test]
    async fn test_toast_is_relayed_to_opponent_only() {
        let h = start_room(slow_config());
        expect_start(&h).await;

        h.p1.send_line("TOAST BLIND boo").await.unwrap();
        h.p1.send_line("POP marker").await.unwrap();

        assert_eq!(next(&h.p2).await.as_deref(), Some("TOAST BLIND boo"));
        assert_eq!(next(&h.p2).await.as_deref(), Some("POP P1 marker"));
        assert_eq!(next(&h.p1).await.as_deref(), Some("POP P1 marker"));
        h.p1.close().await;
        h.room.await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_is_a_forfeit() {
        let h = start_room(slow_config());
        expect_start(&h).await;

        h.p2.send_line("POP first").await.unwrap();
        assert_eq!(next(&h.p1).await.as_deref(), Some("POP P2 first"));
        h.p2.close().await;

        assert_eq!(next(&h.p1).await.as_deref(), Some("RESULT WIN"));
        assert_eq!(next(&h.p1).await, None);

        let report = h.room.await.unwrap();
        assert_eq!(report.ended_by, RoomEnd::Forfeit { leaver: Seat::P2 });
        assert_eq!(report.summary.winner, Winner::P1);
        assert_eq!(report.nicknames, ["alice".to_string(), "bob".to_string()]);
    }

    #[tokio::test]
    async fn test_timeout_with_equal_play_is_a_draw() {
        let h = start_room(RoomConfig {
            initial_time_seconds: 2,
            tick_interval: Duration::from_millis(10),
            ..RoomConfig::default()
        });
        expect_start(&h).await;

        assert_eq!(next(&h.p1).await.as_deref(), Some("RESULT DRAW"));
        assert_eq!(next(&h.p2).await.as_deref(), Some("RESULT DRAW"));

        let report = h.room.await.unwrap();
        assert_eq!(report.ended_by, RoomEnd::Resolved);
        assert!(report.summary.p1.dead && report.summary.p2.dead);
        assert_eq!(report.summary.p1.time_left_seconds, 0);
    }

    async fn drain(conn: &Connection) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = next(conn).await {
            lines.push(line);
        }
        lines
    }

    fn results(lines: &[String]) -> usize {
        lines.iter().filter(|line| line.starts_with("RESULT")).count()
    }

    #[tokio::test]
    async fn test_miss_costs_accuracy_without_echo() {
        let h = start_room(slow_config());
        expect_start(&h).await;

        h.p1.send_line("MISS").await.unwrap();
        h.p1.send_line("POP right").await.unwrap();
        assert_eq!(next(&h.p2).await.as_deref(), Some("POP P1 right"));
        assert_eq!(next(&h.p1).await.as_deref(), Some("POP P1 right"));

        h.p2.close().await;
        let report = h.room.await.unwrap();
        assert_eq!(report.summary.p1.typed_total, 2);
        assert_eq!(report.summary.p1.typed_correct, 1);
    }

    #[tokio::test]
    async fn test_peer_that_stops_reading_cannot_stall_the_room() {
        let (server_a, client_a) = duplex(4096);
        // The P2 end is kept alive but never read, so its buffer fills up.
        let (server_b, _unread) = duplex(64);
        let room = MatchRoom::new(
            3,
            RoomConfig {
                initial_time_seconds: 2,
                tick_interval: Duration::from_millis(50),
                write_timeout: Duration::from_millis(200),
                ..RoomConfig::default()
            },
            [Connection::new(server_a, "a"), Connection::new(server_b, "b")],
            ["alice".to_string(), "bob".to_string()],
        );
        let room = tokio::spawn(room.run());
        let p1 = Connection::new(client_a, "client a");

        assert_eq!(next(&p1).await.as_deref(), Some("ROLE P1"));
        assert_eq!(next(&p1).await.as_deref(), Some("START"));
        for i in 0..20 {
            p1.send_line(&format!("POP word{}", i)).await.unwrap();
        }

        let lines = drain(&p1).await;
        assert_eq!(results(&lines), 1, "{:?}", lines);
        assert_eq!(lines.last().map(String::as_str), Some("RESULT WIN"));

        let report = timeout(Duration::from_secs(5), room)
            .await
            .expect("room kept running")
            .unwrap();
        assert_eq!(report.summary.winner, Winner::P1);
    }

    #[tokio::test]
    async fn test_racing_conclusions_send_one_result_each() {
        for _ in 0..20 {
            let h = start_room(RoomConfig {
                initial_time_seconds: 1,
                tick_interval: Duration::from_millis(5),
                ..RoomConfig::default()
            });
            expect_start(&h).await;

            // Both clears race each other and the deadline tick.
            let _ = tokio::join!(h.p1.send_line("FINISH"), h.p2.send_line("FINISH"));

            let (p1_lines, p2_lines) = tokio::join!(drain(&h.p1), drain(&h.p2));
            for lines in [&p1_lines, &p2_lines] {
                assert_eq!(results(lines), 1, "{:?}", lines);
                assert!(lines.last().is_some_and(|line| line.starts_with("RESULT")));
            }
            assert_eq!(h.room.await.unwrap().ended_by, RoomEnd::Resolved);
        }
    }

    #[tokio::test]
    async fn test_finish_racing_a_disconnect_sends_one_result() {
        for _ in 0..20 {
            let h = start_room(slow_config());
            expect_start(&h).await;

            let _ = tokio::join!(h.p1.send_line("FINISH"), h.p2.close());

            let lines = drain(&h.p1).await;
            assert_eq!(lines, ["RESULT WIN"]);
            let report = h.room.await.unwrap();
            assert_eq!(report.summary.winner, Winner::P1);
        }
    }
}
