use serde::{Deserialize, Serialize};

use super::messages::{
    ClientMessage, CountdownStartMsg, CountdownTickMsg, CreateRoomMsg, FinalResultsMsg,
    JoinResponseMsg, JoinRoomMsg, LeaveRoomMsg, MessageType, QuestionMsg, RevealMsg, RoomErrorMsg,
    RoomUpdateMsg, ServerMessage, StartGameMsg, SubmitAnswerMsg,
};

/// Current protocol version, carried in CreateRoom/JoinRoom.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024; // 16 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::CreateRoom(m) => encode_message(MessageType::CreateRoom, m),
        ClientMessage::JoinRoom(m) => encode_message(MessageType::JoinRoom, m),
        ClientMessage::LeaveRoom(m) => encode_message(MessageType::LeaveRoom, m),
        ClientMessage::StartGame(m) => encode_message(MessageType::StartGame, m),
        ClientMessage::SubmitAnswer(m) => encode_message(MessageType::SubmitAnswer, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::JoinResponse(m) => encode_message(MessageType::JoinResponse, m),
        ServerMessage::RoomUpdate(m) => encode_message(MessageType::RoomUpdate, m),
        ServerMessage::CountdownStart(m) => encode_message(MessageType::CountdownStart, m),
        ServerMessage::CountdownTick(m) => encode_message(MessageType::CountdownTick, m),
        ServerMessage::Question(m) => encode_message(MessageType::Question, m),
        ServerMessage::Reveal(m) => encode_message(MessageType::Reveal, m),
        ServerMessage::FinalResults(m) => encode_message(MessageType::FinalResults, m),
        ServerMessage::RoomError(m) => encode_message(MessageType::RoomError, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::CreateRoom => Ok(ClientMessage::CreateRoom(
            decode_payload::<CreateRoomMsg>(data)?,
        )),
        MessageType::JoinRoom => Ok(ClientMessage::JoinRoom(decode_payload::<JoinRoomMsg>(
            data,
        )?)),
        MessageType::LeaveRoom => Ok(ClientMessage::LeaveRoom(decode_payload::<LeaveRoomMsg>(
            data,
        )?)),
        MessageType::StartGame => Ok(ClientMessage::StartGame(decode_payload::<StartGameMsg>(
            data,
        )?)),
        MessageType::SubmitAnswer => Ok(ClientMessage::SubmitAnswer(decode_payload::<
            SubmitAnswerMsg,
        >(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::JoinResponse => Ok(ServerMessage::JoinResponse(decode_payload::<
            JoinResponseMsg,
        >(data)?)),
        MessageType::RoomUpdate => Ok(ServerMessage::RoomUpdate(decode_payload::<RoomUpdateMsg>(
            data,
        )?)),
        MessageType::CountdownStart => Ok(ServerMessage::CountdownStart(decode_payload::<
            CountdownStartMsg,
        >(data)?)),
        MessageType::CountdownTick => Ok(ServerMessage::CountdownTick(decode_payload::<
            CountdownTickMsg,
        >(data)?)),
        MessageType::Question => Ok(ServerMessage::Question(decode_payload::<QuestionMsg>(
            data,
        )?)),
        MessageType::Reveal => Ok(ServerMessage::Reveal(decode_payload::<RevealMsg>(data)?)),
        MessageType::FinalResults => Ok(ServerMessage::FinalResults(decode_payload::<
            FinalResultsMsg,
        >(data)?)),
        MessageType::RoomError => Ok(ServerMessage::RoomError(decode_payload::<RoomErrorMsg>(
            data,
        )?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::Player;
    use crate::room::RoomStatus;

    #[test]
    fn roundtrip_join_room() {
        let msg = ClientMessage::JoinRoom(JoinRoomMsg {
            room_code: "AB1CD".to_string(),
            player_name: "Ana".to_string(),
            protocol_version: PROTOCOL_VERSION,
        });
        let encoded = encode_client_message(&msg).unwrap();
        assert_eq!(encoded[0], MessageType::JoinRoom as u8);
        let decoded = decode_client_message(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn roundtrip_submit_answer() {
        let msg = ClientMessage::SubmitAnswer(SubmitAnswerMsg {
            question_index: 3,
            option_index: 1,
        });
        let encoded = encode_client_message(&msg).unwrap();
        let decoded = decode_client_message(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn roundtrip_room_update() {
        let msg = ServerMessage::RoomUpdate(RoomUpdateMsg {
            players: vec![Player::new(1, "Ana".to_string(), true)],
            host_id: 1,
            status: RoomStatus::Waiting,
        });
        let encoded = encode_server_message(&msg).unwrap();
        let decoded = decode_server_message(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn roundtrip_reveal() {
        use crate::net::messages::AnswerRecord;
        let msg = ServerMessage::Reveal(RevealMsg {
            question_index: 0,
            correct_index: 2,
            answers: vec![AnswerRecord {
                player_id: 1,
                option_index: Some(2),
                correct: true,
            }],
        });
        let encoded = encode_server_message(&msg).unwrap();
        let decoded = decode_server_message(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn empty_message_rejected() {
        assert!(matches!(
            decode_client_message(&[]),
            Err(ProtocolError::EmptyMessage)
        ));
    }

    #[test]
    fn unknown_type_rejected() {
        assert!(matches!(
            decode_client_message(&[0xEE, 0x00]),
            Err(ProtocolError::UnknownMessageType(0xEE))
        ));
    }

    #[test]
    fn server_type_rejected_on_client_decode() {
        let msg = ServerMessage::RoomError(RoomErrorMsg {
            reason: "nope".to_string(),
        });
        let encoded = encode_server_message(&msg).unwrap();
        assert!(matches!(
            decode_client_message(&encoded),
            Err(ProtocolError::UnknownMessageType(_))
        ));
    }

    #[test]
    fn truncated_payload_fails_decode() {
        let msg = ClientMessage::JoinRoom(JoinRoomMsg {
            room_code: "AB1CD".to_string(),
            player_name: "Ana".to_string(),
            protocol_version: PROTOCOL_VERSION,
        });
        let encoded = encode_client_message(&msg).unwrap();
        let truncated = &encoded[..encoded.len() / 2];
        assert!(matches!(
            decode_client_message(truncated),
            Err(ProtocolError::DeserializeError(_))
        ));
    }
}
