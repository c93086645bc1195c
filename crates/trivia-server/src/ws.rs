use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, FromRequest, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use trivia_core::net::messages::{ClientMessage, MessageType, RoomErrorMsg, ServerMessage};
use trivia_core::net::protocol::{
    MAX_MESSAGE_SIZE, PROTOCOL_VERSION, decode_client_message, decode_message_type,
    encode_server_message,
};
use trivia_core::player::PlayerId;
use trivia_core::room::{is_valid_room_code, normalize_room_code};

use crate::error::JoinError;
use crate::room_manager::RoomManager;
use crate::state::{AppState, ConnectionGuard, IpConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    // Per-IP connection limit
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    let max_per_ip = state.config.limits.max_ws_per_ip;
    let ip_guard = IpConnectionGuard::try_acquire(ip, Arc::clone(&state.ws_per_ip), max_per_ip);
    let Some(ip_guard) = ip_guard else {
        tracing::warn!(%ip, max_per_ip, "Per-IP WS connection limit reached");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    };

    // Perform WebSocket upgrade manually
    let ws = WebSocketUpgrade::from_request(request, &state)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, ip_guard))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState, _ip_guard: IpConnectionGuard) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Wait for the first message: must be CreateRoom or JoinRoom.
    let first_msg = match ws_receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };

    let Ok(client_msg) = decode_client_message(&first_msg) else {
        return;
    };

    let result = match client_msg {
        ClientMessage::CreateRoom(create) => {
            attempt_create(create.player_name, create.protocol_version, &state).await
        },
        ClientMessage::JoinRoom(join) => {
            attempt_join(join.room_code, join.player_name, join.protocol_version, &state).await
        },
        _ => return,
    };

    let (room_code, player_id, rx) = match result {
        JoinOutcome::Success {
            room_code,
            player_id,
            rx,
        } => {
            let Ok(response) = RoomManager::make_join_response(player_id, &room_code) else {
                tracing::warn!("Failed to encode JoinResponse");
                return;
            };
            if ws_sender
                .send(Message::Binary(response.into()))
                .await
                .is_err()
            {
                return;
            }
            (room_code, player_id, rx)
        },
        JoinOutcome::Error(err) => {
            send_join_error(&mut ws_sender, &err).await;
            return;
        },
    };

    // Everyone in the room sees the new roster, the joiner included.
    {
        let rooms = state.rooms.read().await;
        rooms.broadcast_room_update(&room_code);
    }

    spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, &room_code, player_id).await;

    // Player disconnected or left — clean up. While a session is running it
    // owns the authoritative roster and broadcasts it on PlayerLeft; the
    // registry copy only carries lobby scores.
    let mut rooms = state.rooms.write().await;
    let destroyed = rooms.leave_room(&room_code, player_id);
    if destroyed.is_none() && !rooms.has_active_session(&room_code) {
        rooms.broadcast_room_update(&room_code);
    }
    drop(rooms);

    tracing::info!(player_id, room_code = %room_code, "Player disconnected");
}

enum JoinOutcome {
    Success {
        room_code: String,
        player_id: PlayerId,
        rx: mpsc::Receiver<Bytes>,
    },
    Error(String),
}

fn validate_name(raw: &str) -> Option<String> {
    let name = raw.trim().to_string();
    if name.is_empty() || name.len() > 32 || name.chars().any(|c| c.is_control()) {
        return None;
    }
    Some(name)
}

fn protocol_mismatch(client_version: u8) -> Option<String> {
    // Version 0 means "unversioned client", accepted for compatibility.
    if client_version != 0 && client_version != PROTOCOL_VERSION {
        return Some(format!(
            "Protocol version mismatch: client={client_version}, server={PROTOCOL_VERSION}"
        ));
    }
    None
}

async fn attempt_create(player_name: String, protocol_version: u8, state: &AppState) -> JoinOutcome {
    if let Some(err) = protocol_mismatch(protocol_version) {
        return JoinOutcome::Error(err);
    }
    let Some(name) = validate_name(&player_name) else {
        return JoinOutcome::Error(JoinError::InvalidName.to_string());
    };

    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);
    let mut rooms = state.rooms.write().await;
    let (code, player_id) = rooms.create_room(name, tx);
    drop(rooms);

    tracing::info!(player_id, room = %code, "Room created");
    JoinOutcome::Success {
        room_code: code,
        player_id,
        rx,
    }
}

async fn attempt_join(
    room_code: String,
    player_name: String,
    protocol_version: u8,
    state: &AppState,
) -> JoinOutcome {
    if let Some(err) = protocol_mismatch(protocol_version) {
        return JoinOutcome::Error(err);
    }
    let Some(name) = validate_name(&player_name) else {
        return JoinOutcome::Error(JoinError::InvalidName.to_string());
    };

    // Codes are matched case-insensitively.
    let code = normalize_room_code(&room_code);
    if !is_valid_room_code(&code) {
        return JoinOutcome::Error(JoinError::InvalidRoomCode.to_string());
    }

    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);
    let mut rooms = state.rooms.write().await;
    match rooms.join_room(&code, name, tx) {
        Ok(player_id) => {
            drop(rooms);
            tracing::info!(player_id, room = %code, "Player joined");
            JoinOutcome::Success {
                room_code: code,
                player_id,
                rx,
            }
        },
        Err(err) => {
            drop(rooms);
            JoinOutcome::Error(err.to_string())
        },
    }
}

async fn send_join_error(
    ws_sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    error: &str,
) {
    if let Ok(response) = RoomManager::make_join_error(error)
        && let Err(e) = ws_sender.send(Message::Binary(response.into())).await
    {
        tracing::warn!(error = %e, "Failed to send join error response");
    }
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender
                .send(Message::Binary(data.to_vec().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    room_code: &str,
    player_id: PlayerId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d.to_vec(),
            Message::Close(_) => break,
            _ => continue,
        };

        // Rate limit: drop messages that exceed per-connection rate
        if !rate_limiter.allow() {
            tracing::warn!(player_id, room_code, "Rate limited");
            continue;
        }

        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        let msg_type = match decode_message_type(&data) {
            Ok(t) => t,
            Err(_) => continue,
        };

        // Any decodable client message keeps the room off the idle reaper.
        {
            let mut rooms = state.rooms.write().await;
            rooms.touch_activity(room_code);
        }

        match msg_type {
            MessageType::StartGame => {
                handle_start_game(state, room_code, player_id).await;
            },

            MessageType::SubmitAnswer => {
                if let Ok(ClientMessage::SubmitAnswer(answer)) = decode_client_message(&data) {
                    let rooms = state.rooms.read().await;
                    rooms.route_answer(
                        room_code,
                        player_id,
                        answer.question_index,
                        answer.option_index,
                    );
                }
            },

            MessageType::LeaveRoom => break,

            // A joined connection cannot create or join again.
            MessageType::CreateRoom | MessageType::JoinRoom => {
                tracing::debug!(player_id, room_code, "Ignoring duplicate join attempt");
            },

            // Server-authoritative: everything else is server-only.
            _ => {
                tracing::warn!(
                    player_id,
                    room_code,
                    ?msg_type,
                    "Rejected server-only message from client"
                );
            },
        }
    }
}

async fn handle_start_game(state: &AppState, room_code: &str, player_id: PlayerId) {
    let count = state.config.game.question_count.min(state.bank.len());
    let questions = state.bank.pick(count, &mut rand::rng());

    let mut rooms = state.rooms.write().await;
    match rooms.start_session(
        room_code,
        player_id,
        questions,
        &state.config.game,
        Arc::clone(&state.rooms),
    ) {
        Ok(()) => {
            tracing::info!(player_id, room_code, "Game started");
            rooms.broadcast_room_update(room_code);
        },
        Err(e) => {
            tracing::warn!(player_id, room_code, error = %e, "Failed to start game");
            let msg = ServerMessage::RoomError(RoomErrorMsg {
                reason: e.to_string(),
            });
            if let Ok(encoded) = encode_server_message(&msg) {
                rooms.send_to_player(room_code, player_id, Bytes::from(encoded));
            }
        },
    }
}
