use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::state::{
    room::{Question, Room, RoomStatus},
    submission::Submission,
};

/// Question entry stored alongside its room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionEntity {
    /// Text shown to players.
    pub prompt: String,
    /// Expected answer.
    pub answer: String,
}

/// Aggregate room entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomEntity {
    /// Primary key of the room.
    pub id: Uuid,
    /// Organizer display name.
    pub creator: String,
    /// Organizer secret.
    pub room_key: String,
    /// Ordered questions.
    pub questions: Vec<QuestionEntity>,
    /// Roster in join order.
    pub players: Vec<String>,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Index of the question accepting submissions.
    pub current_question_number: u32,
    /// Optimistic concurrency counter.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last time the room entity was updated.
    pub updated_at: SystemTime,
}

/// Ledger row: one answer for one (room, player, question).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmissionEntity {
    /// Owning room.
    pub room_id: Uuid,
    /// Player name.
    pub player: String,
    /// Question answered.
    pub question_number: u32,
    /// Raw response text.
    pub response: String,
    /// Correctness computed at submission time.
    pub correct: bool,
    /// Acceptance timestamp.
    pub submitted_at: SystemTime,
}

/// Room list item entity (subset of RoomEntity) without secrets or answers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomListItemEntity {
    /// Primary key of the room.
    pub id: Uuid,
    /// Organizer display name.
    pub creator: String,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Roster size.
    pub player_count: usize,
    /// Number of questions.
    pub question_count: usize,
    /// Creation timestamp.
    pub created_at: SystemTime,
}

impl From<RoomEntity> for RoomListItemEntity {
    fn from(entity: RoomEntity) -> Self {
        Self {
            id: entity.id,
            creator: entity.creator,
            status: entity.status,
            player_count: entity.players.len(),
            question_count: entity.questions.len(),
            created_at: entity.created_at,
        }
    }
}

impl From<QuestionEntity> for Question {
    fn from(value: QuestionEntity) -> Self {
        Self {
            prompt: value.prompt,
            answer: value.answer,
        }
    }
}

impl From<Question> for QuestionEntity {
    fn from(value: Question) -> Self {
        Self {
            prompt: value.prompt,
            answer: value.answer,
        }
    }
}

impl From<RoomEntity> for Room {
    fn from(value: RoomEntity) -> Self {
        Self {
            id: value.id,
            creator: value.creator,
            room_key: value.room_key,
            questions: value.questions.into_iter().map(Into::into).collect(),
            players: value.players.into_iter().collect(),
            status: value.status,
            current_question_number: value.current_question_number as usize,
            version: value.version,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<Room> for RoomEntity {
    fn from(value: Room) -> Self {
        Self {
            id: value.id,
            creator: value.creator,
            room_key: value.room_key,
            questions: value.questions.into_iter().map(Into::into).collect(),
            players: value.players.into_iter().collect(),
            status: value.status,
            current_question_number: value.current_question_number as u32,
            version: value.version,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<SubmissionEntity> for Submission {
    fn from(value: SubmissionEntity) -> Self {
        Self {
            room_id: value.room_id,
            player: value.player,
            question_number: value.question_number as usize,
            response: value.response,
            correct: value.correct,
            submitted_at: value.submitted_at,
        }
    }
}

impl From<Submission> for SubmissionEntity {
    fn from(value: Submission) -> Self {
        Self {
            room_id: value.room_id,
            player: value.player,
            question_number: value.question_number as u32,
            response: value.response,
            correct: value.correct,
            submitted_at: value.submitted_at,
        }
    }
}
