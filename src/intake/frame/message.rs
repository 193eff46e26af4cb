use serde::Serialize;

use crate::{
    error::FrameError,
    game::{DanceResult, FinalScores, PrepareResult, Registration},
};

pub const PONG_TAG: u8 = 0;
pub const PREPARE_RESPONSE_TAG: u8 = 1;
pub const REGISTERED_TAG: u8 = 2;
pub const DANCE_RESPONSE_TAG: u8 = 3;
pub const SCORES_TAG: u8 = 4;
pub const ERROR_TAG: u8 = 5;

/// A reply sent back to a live client: `[tag][json body]`. `Pong` has no body.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Pong,
    PrepareResponse(PrepareResult),
    Registered(Registration),
    DanceResponse(DanceResult),
    Scores(FinalScores),
    Error(ErrorBody),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl Message {
    pub fn error(message: impl Into<String>) -> Self {
        Message::Error(ErrorBody {
            message: message.into(),
        })
    }

    pub fn tag(&self) -> u8 {
        match self {
            Message::Pong => PONG_TAG,
            Message::PrepareResponse(_) => PREPARE_RESPONSE_TAG,
            Message::Registered(_) => REGISTERED_TAG,
            Message::DanceResponse(_) => DANCE_RESPONSE_TAG,
            Message::Scores(_) => SCORES_TAG,
            Message::Error(_) => ERROR_TAG,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let mut payload = vec![self.tag()];
        match self {
            Message::Pong => {}
            Message::PrepareResponse(body) => serde_json::to_writer(&mut payload, body)?,
            Message::Registered(body) => serde_json::to_writer(&mut payload, body)?,
            Message::DanceResponse(body) => serde_json::to_writer(&mut payload, body)?,
            Message::Scores(body) => serde_json::to_writer(&mut payload, body)?,
            Message::Error(body) => serde_json::to_writer(&mut payload, body)?,
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn body(payload: &[u8]) -> serde_json::Value {
        serde_json::from_slice(&payload[1..]).unwrap()
    }

    #[test]
    fn pong_is_a_bare_tag() {
        assert_eq!(Message::Pong.encode().unwrap(), vec![PONG_TAG]);
    }

    #[test]
    fn scores_are_keyed_by_track_id() {
        let mut scores = IndexMap::new();
        scores.insert(4, 87.5);
        let payload = Message::Scores(FinalScores {
            session_id: Some(2),
            scores,
        })
        .encode()
        .unwrap();
        assert_eq!(payload[0], SCORES_TAG);
        assert_eq!(
            body(&payload),
            serde_json::json!({"session_id": 2, "scores": {"4": 87.5}})
        );
    }

    #[test]
    fn errors_carry_a_message() {
        let payload = Message::error("Unknown reference: 9").encode().unwrap();
        assert_eq!(payload[0], ERROR_TAG);
        assert_eq!(body(&payload)["message"], "Unknown reference: 9");
    }
}
