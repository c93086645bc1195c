use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use trivia_core::net::messages::{JoinResponseMsg, RoomUpdateMsg, ServerMessage};
use trivia_core::net::protocol::{ProtocolError, encode_server_message};
use trivia_core::player::{Player, PlayerId};
use trivia_core::question::Question;
use trivia_core::room::RoomStatus;

use crate::config::GameConfig;
use crate::error::{GameError, JoinError};
use crate::session::{
    SessionBroadcast, SessionCommand, SessionConfig, spawn_session,
};
use crate::state::SharedRoomManager;

/// Per-player sender for outbound WebSocket binary messages.
/// Bounded to prevent memory exhaustion from slow clients. Uses `Bytes`
/// for zero-copy cloning when broadcasting to multiple players.
pub type PlayerSender = mpsc::Sender<Bytes>;

/// Tracks a connected player's outbound channel.
struct ConnectedPlayer {
    sender: PlayerSender,
}

/// Manages all active rooms and their connected players.
pub struct RoomManager {
    rooms: HashMap<String, RoomEntry>,
    next_player_id: PlayerId,
    max_players: usize,
}

struct RoomEntry {
    players: Vec<Player>,
    host_id: PlayerId,
    status: RoomStatus,
    connections: HashMap<PlayerId, ConnectedPlayer>,
    last_activity: Instant,
    /// Channel to send commands to the active session task.
    session_tx: Option<mpsc::UnboundedSender<SessionCommand>>,
    /// Handle for the session task.
    session_task: Option<JoinHandle<()>>,
    /// Handle for the broadcast forwarder task.
    broadcast_task: Option<JoinHandle<()>>,
    /// Shared sender map for active session broadcasts. Connections that
    /// drop mid-game are removed here so the forwarder stops reaching them.
    broadcast_senders: Arc<Mutex<HashMap<PlayerId, PlayerSender>>>,
}

impl RoomManager {
    pub fn new(max_players: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            next_player_id: 1,
            max_players,
        }
    }

    fn alloc_player_id(&mut self) -> PlayerId {
        let id = self.next_player_id;
        self.next_player_id += 1;
        id
    }

    /// Create a new room. Returns (room_code, player_id) for the host.
    pub fn create_room(&mut self, player_name: String, sender: PlayerSender) -> (String, PlayerId) {
        let code = generate_unique_room_code(&self.rooms);
        let player_id = self.alloc_player_id();
        let host = Player::new(player_id, player_name, true);
        let mut connections = HashMap::new();
        connections.insert(player_id, ConnectedPlayer { sender });
        self.rooms.insert(
            code.clone(),
            RoomEntry {
                players: vec![host],
                host_id: player_id,
                status: RoomStatus::Waiting,
                connections,
                last_activity: Instant::now(),
                session_tx: None,
                session_task: None,
                broadcast_task: None,
                broadcast_senders: Arc::new(Mutex::new(HashMap::new())),
            },
        );
        (code, player_id)
    }

    /// Join an existing room by normalized code. Rooms only admit players
    /// while still waiting for the host to start.
    pub fn join_room(
        &mut self,
        room_code: &str,
        player_name: String,
        sender: PlayerSender,
    ) -> Result<PlayerId, JoinError> {
        {
            let entry = self.rooms.get(room_code).ok_or(JoinError::RoomNotFound)?;
            if entry.status != RoomStatus::Waiting {
                return Err(JoinError::GameAlreadyStarted);
            }
            if entry.players.len() >= self.max_players {
                return Err(JoinError::RoomFull);
            }
        }

        let player_id = self.alloc_player_id();
        let Some(entry) = self.rooms.get_mut(room_code) else {
            return Err(JoinError::RoomNotFound);
        };
        entry.last_activity = Instant::now();
        entry
            .players
            .push(Player::new(player_id, player_name, false));
        entry
            .connections
            .insert(player_id, ConnectedPlayer { sender });
        Ok(player_id)
    }

    /// Remove a player from their room. Returns the room code if the room
    /// was destroyed (empty after leave).
    pub fn leave_room(&mut self, room_code: &str, player_id: PlayerId) -> Option<String> {
        let entry = self.rooms.get_mut(room_code)?;

        entry.connections.remove(&player_id);
        {
            let mut senders = entry.broadcast_senders.lock().unwrap();
            senders.remove(&player_id);
        }

        // Notify an active session so the current round can settle.
        if let Some(ref session_tx) = entry.session_tx
            && let Err(e) = session_tx.send(SessionCommand::PlayerLeft { player_id })
        {
            tracing::debug!(player_id, room = room_code, error = %e, "Session gone");
        }

        entry.players.retain(|p| p.id != player_id);

        if entry.players.is_empty() {
            if let Some(ref session_tx) = entry.session_tx
                && let Err(e) = session_tx.send(SessionCommand::Stop)
            {
                tracing::debug!(room = room_code, error = %e, "Session already stopped");
            }
            self.rooms.remove(room_code);
            return Some(room_code.to_string());
        }

        // If the host left, promote the earliest-joined remaining player.
        if entry.host_id == player_id
            && let Some(next_host) = entry.players.first()
        {
            entry.host_id = next_host.id;
            for p in &mut entry.players {
                p.is_host = p.id == entry.host_id;
            }
        }

        None
    }

    /// Start a server-authoritative trivia session in a room. Only the host
    /// may start, and only from the Waiting state.
    pub fn start_session(
        &mut self,
        room_code: &str,
        requester_id: PlayerId,
        questions: Vec<Question>,
        game: &GameConfig,
        rooms: SharedRoomManager,
    ) -> Result<(), GameError> {
        let entry = self
            .rooms
            .get_mut(room_code)
            .ok_or(GameError::RoomNotFound)?;

        if entry.host_id != requester_id {
            return Err(GameError::NotHost);
        }
        if entry.status != RoomStatus::Waiting {
            return Err(GameError::InvalidState);
        }

        let config = SessionConfig {
            room_code: room_code.to_string(),
            questions,
            players: entry.players.clone(),
            host_id: entry.host_id,
            countdown: Duration::from_secs(game.countdown_secs),
            question_duration: Duration::from_secs(game.question_secs),
            reveal_pause: Duration::from_millis(game.reveal_pause_ms),
            points_per_correct: game.points_per_correct,
        };
        let (cmd_tx, broadcast_rx, session_handle) = spawn_session(config);

        // Snapshot current connections into the shared sender map.
        {
            let mut senders = entry.broadcast_senders.lock().unwrap();
            senders.clear();
            for (&id, conn) in &entry.connections {
                senders.insert(id, conn.sender.clone());
            }
        }
        let shared_senders = Arc::clone(&entry.broadcast_senders);
        let room_code_owned = room_code.to_string();
        let broadcast_handle = tokio::spawn(async move {
            forward_broadcasts(broadcast_rx, shared_senders, room_code_owned, rooms).await;
        });

        entry.session_tx = Some(cmd_tx);
        entry.session_task = Some(session_handle);
        entry.broadcast_task = Some(broadcast_handle);
        entry.status = RoomStatus::Starting;
        entry.last_activity = Instant::now();

        Ok(())
    }

    /// Route a player's answer to the active session.
    pub fn route_answer(
        &self,
        room_code: &str,
        player_id: PlayerId,
        question_index: usize,
        option_index: usize,
    ) {
        if let Some(entry) = self.rooms.get(room_code)
            && let Some(ref session_tx) = entry.session_tx
            && let Err(e) = session_tx.send(SessionCommand::Answer {
                player_id,
                question_index,
                option_index,
            })
        {
            tracing::debug!(player_id, room = room_code, error = %e, "Session gone");
        }
    }

    /// Mark a room's countdown as complete.
    pub fn mark_in_progress(&mut self, room_code: &str) {
        self.set_status(room_code, RoomStatus::InProgress);
    }

    /// Update room status. Returns true if the transition was valid.
    /// Invalid transitions are logged and rejected; the lifecycle only
    /// moves forward.
    pub fn set_status(&mut self, room_code: &str, next: RoomStatus) -> bool {
        if let Some(entry) = self.rooms.get_mut(room_code) {
            let valid = entry.status.can_transition_to(next);
            if valid {
                entry.status = next;
            } else {
                tracing::warn!(
                    room = room_code,
                    from = ?entry.status,
                    to = ?next,
                    "Invalid room status transition"
                );
            }
            valid
        } else {
            false
        }
    }

    /// Clean up after a session ends, syncing the final roster from the
    /// session task.
    pub fn finish_session(&mut self, room_code: &str, final_players: &[Player]) {
        if let Some(entry) = self.rooms.get_mut(room_code) {
            entry.session_tx = None;
            entry.session_task = None;
            entry.broadcast_task = None;
            if !final_players.is_empty() {
                entry.players = final_players.to_vec();
                if let Some(host) = final_players.iter().find(|p| p.is_host) {
                    entry.host_id = host.id;
                }
            }
            if entry.status.can_transition_to(RoomStatus::Finished) {
                entry.status = RoomStatus::Finished;
            } else if entry.status != RoomStatus::Finished {
                tracing::debug!(
                    room = room_code,
                    status = ?entry.status,
                    "Session ended before the room reached InProgress"
                );
            }
        }
    }

    /// Send a raw binary message to a specific player.
    pub fn send_to_player(&self, room_code: &str, player_id: PlayerId, data: Bytes) {
        if let Some(entry) = self.rooms.get(room_code)
            && let Some(conn) = entry.connections.get(&player_id)
            && let Err(e) = conn.sender.try_send(data)
        {
            tracing::debug!(
                player_id, room = room_code, error = %e,
                "Failed to send to player (slow or disconnected)"
            );
        }
    }

    /// Broadcast raw binary data to all players in a room.
    /// Uses `Bytes` internally for zero-copy cloning across player channels.
    pub fn broadcast_to_room(&self, room_code: &str, data: &[u8]) {
        if let Some(entry) = self.rooms.get(room_code) {
            let bytes = Bytes::copy_from_slice(data);
            for (&pid, conn) in &entry.connections {
                if let Err(e) = conn.sender.try_send(bytes.clone()) {
                    tracing::debug!(
                        player_id = pid, room = room_code, error = %e,
                        "Skipping broadcast to slow client"
                    );
                }
            }
        }
    }

    /// Build and broadcast a roster snapshot to everyone in the room.
    pub fn broadcast_room_update(&self, room_code: &str) {
        if let Some(entry) = self.rooms.get(room_code) {
            let msg = ServerMessage::RoomUpdate(RoomUpdateMsg {
                players: entry.players.clone(),
                host_id: entry.host_id,
                status: entry.status,
            });
            match encode_server_message(&msg) {
                Ok(data) => self.broadcast_to_room(room_code, &data),
                Err(e) => tracing::error!(room = room_code, error = %e, "Failed to encode roster"),
            }
        }
    }

    /// Build a successful JoinResponse message.
    pub fn make_join_response(
        player_id: PlayerId,
        room_code: &str,
    ) -> Result<Vec<u8>, ProtocolError> {
        let msg = ServerMessage::JoinResponse(JoinResponseMsg {
            success: true,
            room_code: Some(room_code.to_string()),
            player_id: Some(player_id),
            error: None,
        });
        encode_server_message(&msg)
    }

    /// Build a JoinResponse error message.
    pub fn make_join_error(error: &str) -> Result<Vec<u8>, ProtocolError> {
        let msg = ServerMessage::JoinResponse(JoinResponseMsg {
            success: false,
            room_code: None,
            player_id: None,
            error: Some(error.to_string()),
        });
        encode_server_message(&msg)
    }

    pub fn get_host_id(&self, room_code: &str) -> Option<PlayerId> {
        self.rooms.get(room_code).map(|e| e.host_id)
    }

    pub fn get_status(&self, room_code: &str) -> Option<RoomStatus> {
        self.rooms.get(room_code).map(|e| e.status)
    }

    /// Whether a session task is currently running in the room.
    pub fn has_active_session(&self, room_code: &str) -> bool {
        self.rooms
            .get(room_code)
            .is_some_and(|e| e.session_tx.is_some())
    }

    /// (active rooms, total players) for the health endpoint.
    pub fn stats(&self) -> (usize, usize) {
        let players = self.rooms.values().map(|e| e.players.len()).sum();
        (self.rooms.len(), players)
    }

    /// Touch room activity timestamp (call on any incoming message).
    pub fn touch_activity(&mut self, room_code: &str) {
        if let Some(entry) = self.rooms.get_mut(room_code) {
            entry.last_activity = Instant::now();
        }
    }

    /// Remove rooms that have been idle for longer than `max_idle`, stopping
    /// any session still running in them. Returns the number removed.
    pub fn cleanup_idle_rooms(&mut self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let stale: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, e)| now.duration_since(e.last_activity) >= max_idle)
            .map(|(code, _)| code.clone())
            .collect();
        for code in &stale {
            if let Some(entry) = self.rooms.remove(code) {
                if let Some(ref session_tx) = entry.session_tx {
                    let _ = session_tx.send(SessionCommand::Stop);
                }
                tracing::info!(room = %code, "Removed idle room");
            }
        }
        stale.len()
    }

    #[cfg(test)]
    pub fn get_players(&self, room_code: &str) -> Option<Vec<Player>> {
        self.rooms.get(room_code).map(|e| e.players.clone())
    }

    #[cfg(test)]
    pub fn room_exists(&self, room_code: &str) -> bool {
        self.rooms.contains_key(room_code)
    }
}

/// Forward session broadcasts to all connected players in a room, then
/// settle the room's final state once the session ends.
async fn forward_broadcasts(
    mut broadcast_rx: mpsc::UnboundedReceiver<SessionBroadcast>,
    senders: Arc<Mutex<HashMap<PlayerId, PlayerSender>>>,
    room_code: String,
    rooms: SharedRoomManager,
) {
    let mut final_players = Vec::new();
    while let Some(broadcast) = broadcast_rx.recv().await {
        match broadcast {
            SessionBroadcast::Message(data) => {
                let snapshot = senders.lock().unwrap().clone();
                for (&player_id, sender) in &snapshot {
                    if sender.try_send(data.clone()).is_err() {
                        tracing::debug!(
                            player_id,
                            room = %room_code,
                            "Skipping broadcast to slow client (channel full or closed)"
                        );
                    }
                }
            },
            SessionBroadcast::Started => {
                rooms.write().await.mark_in_progress(&room_code);
            },
            SessionBroadcast::Ended(players) => {
                tracing::info!(room = %room_code, "Session ended");
                final_players = players;
                break;
            },
        }
    }

    let mut mgr = rooms.write().await;
    mgr.finish_session(&room_code, &final_players);
    mgr.broadcast_room_update(&room_code);
}

/// Generate a unique room code, retrying on collision with existing rooms.
fn generate_unique_room_code(existing: &HashMap<String, RoomEntry>) -> String {
    let mut rng = rand::rng();
    loop {
        let code = trivia_core::room::generate_room_code(&mut rng);
        if !existing.contains_key(&code) {
            return code;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::RwLock;
    use tokio::time::timeout;
    use trivia_core::net::protocol::decode_server_message;
    use trivia_core::test_helpers::marked_bank;

    fn make_sender() -> (PlayerSender, mpsc::Receiver<Bytes>) {
        mpsc::channel(256)
    }

    fn fast_game() -> GameConfig {
        GameConfig {
            countdown_secs: 0,
            question_secs: 1,
            reveal_pause_ms: 10,
            ..GameConfig::default()
        }
    }

    #[test]
    fn create_room_returns_valid_code() {
        let mut mgr = RoomManager::new(50);
        let (tx, _rx) = make_sender();
        let (code, player_id) = mgr.create_room("Alice".into(), tx);
        assert!(trivia_core::room::is_valid_room_code(&code));
        assert_eq!(player_id, 1);
        assert!(mgr.room_exists(&code));
        assert_eq!(mgr.get_status(&code), Some(RoomStatus::Waiting));
    }

    #[test]
    fn join_room_succeeds() {
        let mut mgr = RoomManager::new(50);
        let (tx1, _rx1) = make_sender();
        let (code, _) = mgr.create_room("Alice".into(), tx1);

        let (tx2, _rx2) = make_sender();
        let bob_id = mgr.join_room(&code, "Bob".into(), tx2).unwrap();
        assert_eq!(bob_id, 2);

        let players = mgr.get_players(&code).unwrap();
        assert_eq!(players.len(), 2);
        assert!(players[0].is_host);
        assert!(!players[1].is_host);
    }

    #[test]
    fn join_nonexistent_room_fails() {
        let mut mgr = RoomManager::new(50);
        let (tx, _rx) = make_sender();
        let result = mgr.join_room("ZZZZZ", "Bob".into(), tx);
        assert_eq!(result.unwrap_err(), JoinError::RoomNotFound);
    }

    #[test]
    fn join_full_room_fails() {
        let mut mgr = RoomManager::new(2);
        let (tx1, _rx1) = make_sender();
        let (code, _) = mgr.create_room("Alice".into(), tx1);

        let (tx2, _rx2) = make_sender();
        mgr.join_room(&code, "Bob".into(), tx2).unwrap();

        let (tx3, _rx3) = make_sender();
        let result = mgr.join_room(&code, "Extra".into(), tx3);
        assert_eq!(result.unwrap_err(), JoinError::RoomFull);
    }

    #[test]
    fn join_after_start_rejected() {
        let mut mgr = RoomManager::new(50);
        let (tx1, _rx1) = make_sender();
        let (code, _) = mgr.create_room("Alice".into(), tx1);
        assert!(mgr.set_status(&code, RoomStatus::Starting));

        let (tx2, _rx2) = make_sender();
        let result = mgr.join_room(&code, "Late".into(), tx2);
        assert_eq!(result.unwrap_err(), JoinError::GameAlreadyStarted);
    }

    #[test]
    fn leave_room_removes_player() {
        let mut mgr = RoomManager::new(50);
        let (tx1, _rx1) = make_sender();
        let (code, host_id) = mgr.create_room("Alice".into(), tx1);

        let (tx2, _rx2) = make_sender();
        let bob_id = mgr.join_room(&code, "Bob".into(), tx2).unwrap();

        assert!(mgr.leave_room(&code, bob_id).is_none());
        let players = mgr.get_players(&code).unwrap();
        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, host_id);
    }

    #[test]
    fn leave_room_destroys_empty_room() {
        let mut mgr = RoomManager::new(50);
        let (tx, _rx) = make_sender();
        let (code, host_id) = mgr.create_room("Alice".into(), tx);

        let destroyed = mgr.leave_room(&code, host_id);
        assert_eq!(destroyed, Some(code.clone()));
        assert!(!mgr.room_exists(&code));
    }

    #[test]
    fn destroyed_room_code_is_no_longer_joinable() {
        let mut mgr = RoomManager::new(50);
        let (tx, _rx) = make_sender();
        let (code, host_id) = mgr.create_room("Alice".into(), tx);
        mgr.leave_room(&code, host_id);

        let (tx2, _rx2) = make_sender();
        let result = mgr.join_room(&code, "Bob".into(), tx2);
        assert_eq!(result.unwrap_err(), JoinError::RoomNotFound);
    }

    #[test]
    fn host_promotion_on_leave() {
        let mut mgr = RoomManager::new(50);
        let (tx1, _rx1) = make_sender();
        let (code, host_id) = mgr.create_room("Alice".into(), tx1);

        let (tx2, _rx2) = make_sender();
        let bob_id = mgr.join_room(&code, "Bob".into(), tx2).unwrap();

        mgr.leave_room(&code, host_id);
        assert_eq!(mgr.get_host_id(&code), Some(bob_id));
        let players = mgr.get_players(&code).unwrap();
        assert!(players[0].is_host);
    }

    #[test]
    fn status_transitions_are_forward_only() {
        let mut mgr = RoomManager::new(50);
        let (tx, _rx) = make_sender();
        let (code, _) = mgr.create_room("Alice".into(), tx);

        assert!(!mgr.set_status(&code, RoomStatus::InProgress));
        assert!(!mgr.set_status(&code, RoomStatus::Finished));
        assert_eq!(mgr.get_status(&code), Some(RoomStatus::Waiting));

        assert!(mgr.set_status(&code, RoomStatus::Starting));
        assert!(!mgr.set_status(&code, RoomStatus::Waiting));
        assert!(mgr.set_status(&code, RoomStatus::InProgress));
        assert!(mgr.set_status(&code, RoomStatus::Finished));
        assert!(!mgr.set_status(&code, RoomStatus::Waiting));
    }

    #[test]
    fn idle_room_cleanup_removes_stale_rooms() {
        let mut mgr = RoomManager::new(50);
        let (tx1, _rx1) = make_sender();
        let (code1, _) = mgr.create_room("Alice".into(), tx1);

        let (tx2, _rx2) = make_sender();
        let (code2, _) = mgr.create_room("Bob".into(), tx2);

        // Artificially age the first room
        mgr.rooms.get_mut(&code1).unwrap().last_activity =
            Instant::now() - Duration::from_secs(7200);

        let removed = mgr.cleanup_idle_rooms(Duration::from_secs(3600));
        assert_eq!(removed, 1);
        assert!(!mgr.room_exists(&code1));
        assert!(mgr.room_exists(&code2));
    }

    #[test]
    fn touch_activity_resets_idle_clock() {
        let mut mgr = RoomManager::new(50);
        let (tx, _rx) = make_sender();
        let (code, _) = mgr.create_room("Alice".into(), tx);

        // Artificially age the room past the idle cutoff, then touch it.
        mgr.rooms.get_mut(&code).unwrap().last_activity =
            Instant::now() - Duration::from_secs(7200);
        mgr.touch_activity(&code);

        assert_eq!(mgr.cleanup_idle_rooms(Duration::from_secs(3600)), 0);
        assert!(mgr.room_exists(&code));
    }

    #[test]
    fn stats_counts_rooms_and_players() {
        let mut mgr = RoomManager::new(50);
        let (tx1, _rx1) = make_sender();
        let (code, _) = mgr.create_room("Alice".into(), tx1);
        let (tx2, _rx2) = make_sender();
        mgr.join_room(&code, "Bob".into(), tx2).unwrap();
        let (tx3, _rx3) = make_sender();
        mgr.create_room("Caro".into(), tx3);

        assert_eq!(mgr.stats(), (2, 3));
    }

    #[tokio::test]
    async fn start_session_requires_host() {
        let rooms: SharedRoomManager = Arc::new(RwLock::new(RoomManager::new(50)));
        let (code, _host_id) = {
            let mut mgr = rooms.write().await;
            let (tx1, _rx1) = make_sender();
            let (code, host_id) = mgr.create_room("Alice".into(), tx1);
            let (tx2, _rx2) = make_sender();
            mgr.join_room(&code, "Bob".into(), tx2).unwrap();
            (code, host_id)
        };

        let questions = marked_bank(1).questions().to_vec();
        let result = rooms.write().await.start_session(
            &code,
            2, // Bob, not the host
            questions,
            &fast_game(),
            Arc::clone(&rooms),
        );
        assert_eq!(result.unwrap_err(), GameError::NotHost);
    }

    #[tokio::test]
    async fn start_session_rejects_double_start() {
        let rooms: SharedRoomManager = Arc::new(RwLock::new(RoomManager::new(50)));
        let (code, host_id, _rx) = {
            let mut mgr = rooms.write().await;
            let (tx, rx) = make_sender();
            let (code, host_id) = mgr.create_room("Alice".into(), tx);
            (code, host_id, rx)
        };

        let questions = marked_bank(1).questions().to_vec();
        {
            let mut mgr = rooms.write().await;
            mgr.start_session(
                &code,
                host_id,
                questions.clone(),
                &fast_game(),
                Arc::clone(&rooms),
            )
            .unwrap();
            assert_eq!(mgr.get_status(&code), Some(RoomStatus::Starting));

            let result =
                mgr.start_session(&code, host_id, questions, &fast_game(), Arc::clone(&rooms));
            assert_eq!(result.unwrap_err(), GameError::InvalidState);
        }
    }

    #[tokio::test]
    async fn session_broadcasts_reach_connections() {
        let rooms: SharedRoomManager = Arc::new(RwLock::new(RoomManager::new(50)));
        let (code, host_id, mut rx) = {
            let mut mgr = rooms.write().await;
            let (tx, rx) = make_sender();
            let (code, host_id) = mgr.create_room("Alice".into(), tx);
            (code, host_id, rx)
        };

        let questions = marked_bank(1).questions().to_vec();
        rooms
            .write()
            .await
            .start_session(&code, host_id, questions, &fast_game(), Arc::clone(&rooms))
            .unwrap();

        let data = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out")
            .expect("channel closed");
        let msg = decode_server_message(&data).unwrap();
        assert!(matches!(msg, ServerMessage::CountdownStart(_)));
    }

    #[tokio::test]
    async fn session_end_marks_room_finished() {
        let rooms: SharedRoomManager = Arc::new(RwLock::new(RoomManager::new(50)));
        let (code, host_id, _rx) = {
            let mut mgr = rooms.write().await;
            let (tx, rx) = make_sender();
            let (code, host_id) = mgr.create_room("Alice".into(), tx);
            (code, host_id, rx)
        };

        let questions = marked_bank(1).questions().to_vec();
        rooms
            .write()
            .await
            .start_session(&code, host_id, questions, &fast_game(), Arc::clone(&rooms))
            .unwrap();

        // One unanswered 1s question plus the reveal pause.
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if rooms.read().await.get_status(&code) == Some(RoomStatus::Finished) {
                break;
            }
            assert!(Instant::now() < deadline, "room never reached Finished");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}
