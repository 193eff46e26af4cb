use serde::Deserialize;

use crate::{
    common::imaging::decode_base64,
    error::{AppError, FrameError},
    game::DancerRegistration,
    intake::frame::{message::Message, visitor::FrameVisitor},
    pose::TrackId,
    storage::ReferenceId,
};

// [tag][data]
// Register carries a JSON body, Dance an f64 LE timestamp followed by the image.
pub const PING_TAG: u8 = 0;
pub const PREPARE_TAG: u8 = 1;
pub const REGISTER_TAG: u8 = 2;
pub const DANCE_TAG: u8 = 3;
pub const FINISHED_TAG: u8 = 4;
pub const SHUTDOWN_TAG: u8 = 5;

const TIMESTAMP_BYTES: usize = 8;

/// A request from a live client.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Ping,
    Prepare {
        image: Vec<u8>,
    },
    Register {
        reference_id: ReferenceId,
        dancers: Vec<DancerRegistration>,
    },
    Dance {
        timestamp: f64,
        image: Vec<u8>,
    },
    Finished,
    Shutdown,
}

#[derive(Debug, Deserialize)]
struct RegisterBody {
    reference_id: ReferenceId,
    #[serde(default)]
    dancers: Vec<(TrackId, Option<String>)>,
}

impl Frame {
    pub async fn accept<V: FrameVisitor + ?Sized>(
        self,
        visitor: &mut V,
    ) -> Result<Option<Message>, AppError> {
        match self {
            Frame::Ping => visitor.ping().await,
            Frame::Prepare { image } => visitor.prepare(image).await,
            Frame::Register {
                reference_id,
                dancers,
            } => visitor.register(reference_id, dancers).await,
            Frame::Dance { timestamp, image } => visitor.dance(timestamp, image).await,
            Frame::Finished => visitor.finished().await,
            Frame::Shutdown => visitor.shutdown().await,
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            Frame::Ping => PING_TAG,
            Frame::Prepare { .. } => PREPARE_TAG,
            Frame::Register { .. } => REGISTER_TAG,
            Frame::Dance { .. } => DANCE_TAG,
            Frame::Finished => FINISHED_TAG,
            Frame::Shutdown => SHUTDOWN_TAG,
        }
    }
}

impl TryFrom<&[u8]> for Frame {
    type Error = FrameError;

    fn try_from(payload: &[u8]) -> Result<Self, Self::Error> {
        let Some((&tag, data)) = payload.split_first() else {
            return Err(FrameError::InvalidFrameLength(0));
        };
        match tag {
            PING_TAG => Ok(Frame::Ping),
            PREPARE_TAG => Ok(Frame::Prepare {
                image: data.to_vec(),
            }),
            REGISTER_TAG => {
                let body: RegisterBody = serde_json::from_slice(data)?;
                let dancers = body
                    .dancers
                    .into_iter()
                    .map(|(track_id, avatar)| DancerRegistration {
                        track_id,
                        avatar: avatar.as_deref().and_then(decode_base64),
                    })
                    .collect();
                Ok(Frame::Register {
                    reference_id: body.reference_id,
                    dancers,
                })
            }
            DANCE_TAG => {
                if data.len() < TIMESTAMP_BYTES {
                    return Err(FrameError::InvalidFrameLength(payload.len()));
                }
                let (timestamp, image) = data.split_at(TIMESTAMP_BYTES);
                let mut timestamp_buffer = [0u8; TIMESTAMP_BYTES];
                timestamp_buffer.copy_from_slice(timestamp);
                Ok(Frame::Dance {
                    timestamp: f64::from_le_bytes(timestamp_buffer),
                    image: image.to_vec(),
                })
            }
            FINISHED_TAG => Ok(Frame::Finished),
            SHUTDOWN_TAG => Ok(Frame::Shutdown),
            _ => Err(FrameError::InvalidFrameTag(tag)),
        }
    }
}
