use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use trivia_core::net::messages::{
    AnswerRecord, CountdownStartMsg, CountdownTickMsg, FinalResultsMsg, QuestionMsg, RevealMsg,
    RoomUpdateMsg, ServerMessage,
};
use trivia_core::net::protocol::encode_server_message;
use trivia_core::player::{Player, PlayerId, rank_players};
use trivia_core::question::Question;
use trivia_core::room::RoomStatus;
use trivia_core::shuffle::shuffle_question;

/// Commands sent from the WebSocket handler to a running session.
#[derive(Debug)]
pub enum SessionCommand {
    Answer {
        player_id: PlayerId,
        question_index: usize,
        option_index: usize,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    Stop,
}

/// Broadcasts sent from the session task to the room's connections.
#[derive(Debug, Clone)]
pub enum SessionBroadcast {
    /// Serialized ServerMessage bytes ready to send over WebSocket.
    Message(Bytes),
    /// The countdown finished and the first question is about to go out.
    Started,
    /// The session has finished (or been stopped) and the task is exiting.
    /// Carries the final roster so the room registry can sync scores.
    Ended(Vec<Player>),
}

/// Everything a session needs to run one game, captured at start time.
pub struct SessionConfig {
    pub room_code: String,
    pub questions: Vec<Question>,
    pub players: Vec<Player>,
    pub host_id: PlayerId,
    pub countdown: Duration,
    pub question_duration: Duration,
    pub reveal_pause: Duration,
    pub points_per_correct: u32,
}

/// Spawn a session task for one room. All mutation of the session's state
/// happens inside the task, so answer handling and deadline firing are
/// serialized by construction.
pub fn spawn_session(
    config: SessionConfig,
) -> (
    mpsc::UnboundedSender<SessionCommand>,
    mpsc::UnboundedReceiver<SessionBroadcast>,
    JoinHandle<()>,
) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        run_session(config, cmd_rx, broadcast_tx).await;
    });
    (cmd_tx, broadcast_rx, handle)
}

/// Wire time budgets are u16 seconds; saturate rather than truncate.
fn wire_secs(duration: Duration) -> u16 {
    u16::try_from(duration.as_secs()).unwrap_or(u16::MAX)
}

fn broadcast(tx: &mpsc::UnboundedSender<SessionBroadcast>, msg: &ServerMessage) {
    match encode_server_message(msg) {
        Ok(data) => {
            let _ = tx.send(SessionBroadcast::Message(Bytes::from(data)));
        },
        Err(e) => tracing::error!(error = %e, "Failed to encode session broadcast"),
    }
}

fn broadcast_roster(
    tx: &mpsc::UnboundedSender<SessionBroadcast>,
    players: &[Player],
    host_id: PlayerId,
    status: RoomStatus,
) {
    broadcast(
        tx,
        &ServerMessage::RoomUpdate(RoomUpdateMsg {
            players: players.to_vec(),
            host_id,
            status,
        }),
    );
}

/// Remove a departing player, promoting the earliest-joined remaining
/// member when the host leaves.
fn remove_player(players: &mut Vec<Player>, host_id: &mut PlayerId, leaving: PlayerId) {
    players.retain(|p| p.id != leaving);
    if *host_id == leaving
        && let Some(next_id) = players.first().map(|p| p.id)
    {
        *host_id = next_id;
        for p in players.iter_mut() {
            p.is_host = p.id == *host_id;
        }
    }
}

fn all_answered(players: &[Player], ledger: &HashMap<PlayerId, usize>) -> bool {
    !players.is_empty() && players.iter().all(|p| ledger.contains_key(&p.id))
}

/// What happened while waiting out a countdown or reveal pause.
enum IdleOutcome {
    Continue,
    RoomEmpty,
    Stopped,
}

/// Handle a command received outside the answer window. Answers arriving
/// here are stale and silently dropped.
fn handle_idle_command(
    cmd: Option<SessionCommand>,
    players: &mut Vec<Player>,
    host_id: &mut PlayerId,
    status: RoomStatus,
    tx: &mpsc::UnboundedSender<SessionBroadcast>,
) -> IdleOutcome {
    match cmd {
        Some(SessionCommand::Answer { .. }) => IdleOutcome::Continue,
        Some(SessionCommand::PlayerLeft { player_id }) => {
            remove_player(players, host_id, player_id);
            if players.is_empty() {
                return IdleOutcome::RoomEmpty;
            }
            broadcast_roster(tx, players, *host_id, status);
            IdleOutcome::Continue
        },
        Some(SessionCommand::Stop) | None => IdleOutcome::Stopped,
    }
}

async fn run_session(
    config: SessionConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    tx: mpsc::UnboundedSender<SessionBroadcast>,
) {
    let room_code = config.room_code;
    let mut players = config.players;
    let mut host_id = config.host_id;
    let question_count = config.questions.len();

    if players.is_empty() || question_count == 0 {
        let _ = tx.send(SessionBroadcast::Ended(players));
        return;
    }

    // Pre-game countdown, presentational only.
    broadcast(
        &tx,
        &ServerMessage::CountdownStart(CountdownStartMsg {
            seconds: wire_secs(config.countdown),
        }),
    );
    let countdown_end = Instant::now() + config.countdown;
    loop {
        let remaining = countdown_end.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        let step_end = Instant::now() + remaining.min(Duration::from_secs(1));
        tokio::select! {
            _ = sleep_until(step_end) => {
                let seconds_left =
                    wire_secs(countdown_end.saturating_duration_since(Instant::now()));
                broadcast(
                    &tx,
                    &ServerMessage::CountdownTick(CountdownTickMsg { seconds_left }),
                );
            }
            cmd = cmd_rx.recv() => {
                match handle_idle_command(cmd, &mut players, &mut host_id, RoomStatus::Starting, &tx) {
                    IdleOutcome::Continue => {},
                    IdleOutcome::RoomEmpty | IdleOutcome::Stopped => {
                        let _ = tx.send(SessionBroadcast::Ended(players));
                        return;
                    },
                }
            }
        }
    }

    let _ = tx.send(SessionBroadcast::Started);
    broadcast_roster(&tx, &players, host_id, RoomStatus::InProgress);
    tracing::info!(room = %room_code, players = players.len(), question_count, "Session started");

    for (index, question) in config.questions.iter().enumerate() {
        let round = shuffle_question(question, &mut rand::rng());
        let mut ledger: HashMap<PlayerId, usize> = HashMap::new();

        broadcast(
            &tx,
            &ServerMessage::Question(QuestionMsg {
                index,
                prompt: round.prompt.clone(),
                options: round.options.clone(),
                time_limit_secs: wire_secs(config.question_duration),
            }),
        );

        let deadline = Instant::now() + config.question_duration;
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => break,
                cmd = cmd_rx.recv() => match cmd {
                    Some(SessionCommand::Answer { player_id, question_index, option_index }) => {
                        // Stale or malformed submissions are expected under
                        // network jitter; drop them without comment.
                        if question_index != index || option_index >= round.options.len() {
                            continue;
                        }
                        // First submission wins; duplicates are no-ops.
                        if ledger.contains_key(&player_id) {
                            continue;
                        }
                        let Some(player) = players.iter_mut().find(|p| p.id == player_id) else {
                            continue;
                        };
                        ledger.insert(player_id, option_index);
                        if option_index == round.correct_index {
                            player.score += config.points_per_correct;
                            player.correct_count += 1;
                        }
                        // Live scores may leak; the answer key never does.
                        broadcast_roster(&tx, &players, host_id, RoomStatus::InProgress);
                        if all_answered(&players, &ledger) {
                            break;
                        }
                    },
                    Some(SessionCommand::PlayerLeft { player_id }) => {
                        remove_player(&mut players, &mut host_id, player_id);
                        ledger.remove(&player_id);
                        if players.is_empty() {
                            let _ = tx.send(SessionBroadcast::Ended(players));
                            return;
                        }
                        broadcast_roster(&tx, &players, host_id, RoomStatus::InProgress);
                        if all_answered(&players, &ledger) {
                            break;
                        }
                    },
                    Some(SessionCommand::Stop) | None => {
                        let _ = tx.send(SessionBroadcast::Ended(players));
                        return;
                    },
                }
            }
        }

        // Both end conditions converge here; the pending deadline future
        // was dropped with the loop, so a second reveal cannot fire.
        let answers: Vec<AnswerRecord> = players
            .iter()
            .map(|p| {
                let option_index = ledger.get(&p.id).copied();
                AnswerRecord {
                    player_id: p.id,
                    option_index,
                    correct: option_index == Some(round.correct_index),
                }
            })
            .collect();
        broadcast(
            &tx,
            &ServerMessage::Reveal(RevealMsg {
                question_index: index,
                correct_index: round.correct_index,
                answers,
            }),
        );

        // Short pause so clients can render the reveal.
        let pause_end = Instant::now() + config.reveal_pause;
        loop {
            tokio::select! {
                _ = sleep_until(pause_end) => break,
                cmd = cmd_rx.recv() => {
                    match handle_idle_command(
                        cmd, &mut players, &mut host_id, RoomStatus::InProgress, &tx,
                    ) {
                        IdleOutcome::Continue => {},
                        IdleOutcome::RoomEmpty | IdleOutcome::Stopped => {
                            let _ = tx.send(SessionBroadcast::Ended(players));
                            return;
                        },
                    }
                }
            }
        }
    }

    let ranking = rank_players(&players, question_count);
    broadcast(&tx, &ServerMessage::FinalResults(FinalResultsMsg { ranking }));
    tracing::info!(room = %room_code, "Session finished");
    let _ = tx.send(SessionBroadcast::Ended(players));
}
