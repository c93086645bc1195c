use rand::Rng;
use serde::{Deserialize, Serialize};

/// Alphabet used for room codes. Uppercase letters and digits, no
/// exclusions: codes are matched case-insensitively at the gateway.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Room code length. 36^5 ≈ 60M codes, so collisions are retried but
/// practically never happen.
pub const CODE_LEN: usize = 5;

/// Lifecycle of a room. Transitions are strictly forward:
/// Waiting → Starting → InProgress → Finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Waiting,
    Starting,
    InProgress,
    Finished,
}

impl RoomStatus {
    /// Whether moving to `next` is a valid forward transition.
    pub fn can_transition_to(self, next: RoomStatus) -> bool {
        matches!(
            (self, next),
            (RoomStatus::Waiting, RoomStatus::Starting)
                | (RoomStatus::Starting, RoomStatus::InProgress)
                | (RoomStatus::InProgress, RoomStatus::Finished)
        )
    }
}

/// Generate a random room code from the shared alphabet.
pub fn generate_room_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CODE_ALPHABET.len());
            char::from(CODE_ALPHABET[idx])
        })
        .collect()
}

/// Normalize a client-supplied code: trimmed and uppercased.
pub fn normalize_room_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Check a normalized room code for the expected shape.
pub fn is_valid_room_code(code: &str) -> bool {
    code.len() == CODE_LEN && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}
