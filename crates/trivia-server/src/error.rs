/// Failures reported to a client trying to create or join a room. All of
/// these are expected, user-facing conditions answered unicast to the
/// requester; they never affect other room members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    RoomNotFound,
    RoomFull,
    GameAlreadyStarted,
    InvalidRoomCode,
    InvalidName,
}

impl std::fmt::Display for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoomNotFound => write!(f, "Room not found"),
            Self::RoomFull => write!(f, "Room is full"),
            Self::GameAlreadyStarted => write!(f, "Game already started"),
            Self::InvalidRoomCode => write!(f, "Invalid room code"),
            Self::InvalidName => write!(f, "Invalid player name"),
        }
    }
}

impl std::error::Error for JoinError {}

/// Failures for in-room game requests (start, etc.). Unicast to the
/// caller as a RoomError; never broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameError {
    RoomNotFound,
    NotHost,
    InvalidState,
}

impl std::fmt::Display for GameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoomNotFound => write!(f, "Room not found"),
            Self::NotHost => write!(f, "Only the host can start the game"),
            Self::InvalidState => write!(f, "Game cannot be started in the current state"),
        }
    }
}

impl std::error::Error for GameError {}
