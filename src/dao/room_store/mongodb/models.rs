use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::MongoDaoError;
use crate::{
    dao::models::{QuestionEntity, RoomEntity, SubmissionEntity},
    state::room::RoomStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoRoomDocument {
    #[serde(rename = "_id")]
    id: String,
    creator: String,
    room_key: String,
    questions: Vec<QuestionEntity>,
    players: Vec<String>,
    status: RoomStatus,
    current_question_number: i64,
    version: i64,
    created_at: DateTime,
    updated_at: DateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoSubmissionDocument {
    room_id: String,
    player: String,
    question_number: i64,
    response: String,
    correct: bool,
    submitted_at: DateTime,
}

impl From<RoomEntity> for MongoRoomDocument {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id.to_string(),
            creator: value.creator,
            room_key: value.room_key,
            questions: value.questions,
            players: value.players,
            status: value.status,
            current_question_number: i64::from(value.current_question_number),
            version: value.version as i64,
            created_at: DateTime::from_system_time(value.created_at),
            updated_at: DateTime::from_system_time(value.updated_at),
        }
    }
}

impl TryFrom<MongoRoomDocument> for RoomEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoRoomDocument) -> Result<Self, Self::Error> {
        let id = parse_uuid(&value.id)?;
        let current_question_number =
            u32::try_from(value.current_question_number).map_err(|_| MongoDaoError::Malformed {
                id: value.id.clone(),
                reason: "negative question pointer",
            })?;
        let version = u64::try_from(value.version).map_err(|_| MongoDaoError::Malformed {
            id: value.id.clone(),
            reason: "negative version",
        })?;

        Ok(Self {
            id,
            creator: value.creator,
            room_key: value.room_key,
            questions: value.questions,
            players: value.players,
            status: value.status,
            current_question_number,
            version,
            created_at: value.created_at.to_system_time(),
            updated_at: value.updated_at.to_system_time(),
        })
    }
}

impl From<SubmissionEntity> for MongoSubmissionDocument {
    fn from(value: SubmissionEntity) -> Self {
        Self {
            room_id: value.room_id.to_string(),
            player: value.player,
            question_number: i64::from(value.question_number),
            response: value.response,
            correct: value.correct,
            submitted_at: DateTime::from_system_time(value.submitted_at),
        }
    }
}

impl TryFrom<MongoSubmissionDocument> for SubmissionEntity {
    type Error = MongoDaoError;

    fn try_from(value: MongoSubmissionDocument) -> Result<Self, Self::Error> {
        let room_id = parse_uuid(&value.room_id)?;
        let question_number =
            u32::try_from(value.question_number).map_err(|_| MongoDaoError::Malformed {
                id: value.room_id.clone(),
                reason: "negative submission question number",
            })?;

        Ok(Self {
            room_id,
            player: value.player,
            question_number,
            response: value.response,
            correct: value.correct,
            submitted_at: value.submitted_at.to_system_time(),
        })
    }
}

fn parse_uuid(raw: &str) -> Result<Uuid, MongoDaoError> {
    Uuid::parse_str(raw).map_err(|_| MongoDaoError::Malformed {
        id: raw.to_owned(),
        reason: "identifier is not a UUID",
    })
}

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

pub fn versioned_doc_id(id: Uuid, version: u64) -> Document {
    doc! {"_id": id.to_string(), "version": version as i64}
}

pub fn room_submissions(room_id: Uuid) -> Document {
    doc! {"room_id": room_id.to_string()}
}
