use serde::{Deserialize, Serialize};

use crate::player::{Player, PlayerId, RankingEntry};
use crate::room::RoomStatus;

/// Network message type discriminator (wire prefix byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    CreateRoom = 0x01,
    JoinRoom = 0x02,
    LeaveRoom = 0x03,
    StartGame = 0x04,
    SubmitAnswer = 0x05,

    // Server -> Client
    JoinResponse = 0x10,
    RoomUpdate = 0x11,
    CountdownStart = 0x12,
    CountdownTick = 0x13,
    Question = 0x14,
    Reveal = 0x15,
    FinalResults = 0x16,
    RoomError = 0x17,
}

impl MessageType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::CreateRoom),
            0x02 => Some(Self::JoinRoom),
            0x03 => Some(Self::LeaveRoom),
            0x04 => Some(Self::StartGame),
            0x05 => Some(Self::SubmitAnswer),
            0x10 => Some(Self::JoinResponse),
            0x11 => Some(Self::RoomUpdate),
            0x12 => Some(Self::CountdownStart),
            0x13 => Some(Self::CountdownTick),
            0x14 => Some(Self::Question),
            0x15 => Some(Self::Reveal),
            0x16 => Some(Self::FinalResults),
            0x17 => Some(Self::RoomError),
            _ => None,
        }
    }
}

/// Request to create a fresh room with the sender as host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomMsg {
    pub player_name: String,
    pub protocol_version: u8,
}

/// Request to join an existing room by code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomMsg {
    pub room_code: String,
    pub player_name: String,
    pub protocol_version: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveRoomMsg {}

/// Host asks the server to start the round sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartGameMsg {}

/// Answer submission for the question currently on screen. Stale indices
/// are dropped server-side, never errored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitAnswerMsg {
    pub question_index: usize,
    pub option_index: usize,
}

/// Reply to CreateRoom/JoinRoom, unicast to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinResponseMsg {
    pub success: bool,
    pub room_code: Option<String>,
    pub player_id: Option<PlayerId>,
    pub error: Option<String>,
}

/// Roster snapshot, broadcast after any membership, score, or status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomUpdateMsg {
    pub players: Vec<Player>,
    pub host_id: PlayerId,
    pub status: RoomStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownStartMsg {
    pub seconds: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownTickMsg {
    pub seconds_left: u16,
}

/// One question broadcast. Options arrive pre-shuffled; the correct index
/// is never included here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionMsg {
    pub index: usize,
    pub prompt: String,
    pub options: Vec<String>,
    pub time_limit_secs: u16,
}

/// Per-player outcome included in a reveal. `option_index` is None for
/// players who never answered (scored as incorrect).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub player_id: PlayerId,
    pub option_index: Option<usize>,
    pub correct: bool,
}

/// End-of-round disclosure. Exactly one per question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealMsg {
    pub question_index: usize,
    pub correct_index: usize,
    pub answers: Vec<AnswerRecord>,
}

/// Final leaderboard. Exactly one per completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalResultsMsg {
    pub ranking: Vec<RankingEntry>,
}

/// Unicast failure report for a single caller's request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomErrorMsg {
    pub reason: String,
}

/// All messages a client may send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    CreateRoom(CreateRoomMsg),
    JoinRoom(JoinRoomMsg),
    LeaveRoom(LeaveRoomMsg),
    StartGame(StartGameMsg),
    SubmitAnswer(SubmitAnswerMsg),
}

/// All messages the server may send.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    JoinResponse(JoinResponseMsg),
    RoomUpdate(RoomUpdateMsg),
    CountdownStart(CountdownStartMsg),
    CountdownTick(CountdownTickMsg),
    Question(QuestionMsg),
    Reveal(RevealMsg),
    FinalResults(FinalResultsMsg),
    RoomError(RoomErrorMsg),
}
