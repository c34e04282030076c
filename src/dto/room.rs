//! Request and response payloads of the `/rooms` API. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::RoomListItemEntity,
    dto::{format_system_time, validation::validate_not_blank},
    state::{
        room::{Question, Room, RoomStatus},
        scoring::{ScoreEntry, Scoreboard},
        submission::Submission,
    },
};

/// Payload used by the organizer to create a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub creator: String,
    #[validate(custom(function = "validate_not_blank"))]
    pub room_key: String,
    #[validate(length(min = 1, message = "a room requires at least one question"))]
    #[validate(nested)]
    pub questions: Vec<QuestionInput>,
}

/// One question of a [`CreateRoomRequest`].
#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct QuestionInput {
    #[validate(custom(function = "validate_not_blank"))]
    pub prompt: String,
    /// Compared verbatim with player responses.
    pub answer: String,
}

impl From<QuestionInput> for Question {
    fn from(value: QuestionInput) -> Self {
        Self {
            prompt: value.prompt,
            answer: value.answer,
        }
    }
}

/// Payload sent by a player to join an open room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRoomRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub name: String,
}

/// Organizer request to overwrite the room status.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRequest {
    /// One of `closed`, `open`, `in_progress`, `game_over`.
    #[validate(custom(function = "validate_not_blank"))]
    pub status: String,
    /// Accepted as an alternative to the `roomKey` query parameter.
    #[serde(default)]
    pub room_key: Option<String>,
}

/// A player's answer to the active question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    #[validate(custom(function = "validate_not_blank"))]
    pub player: String,
    #[validate(length(min = 1, message = "response must not be empty"))]
    pub response: String,
}

/// Query string of `GET /rooms/{id}`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RoomQuery {
    /// Player asking for their rank.
    pub player: Option<String>,
    /// Organizer key; when present the full room is returned instead of the state view.
    pub room_key: Option<String>,
}

/// Query string carrying the organizer key.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct RoomKeyQuery {
    /// Organizer key.
    pub room_key: Option<String>,
}

/// Query string of `GET /rooms/{id}/submissions`.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Player whose answers are listed.
    pub player: String,
}

/// Question as shown to the organizer.
#[derive(Debug, Serialize, ToSchema)]
pub struct QuestionDetail {
    pub prompt: String,
    pub answer: String,
}

/// Full room projection, only returned to holders of the room key.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomDetail {
    pub id: Uuid,
    pub creator: String,
    pub room_key: String,
    pub questions: Vec<QuestionDetail>,
    pub players: Vec<String>,
    pub status: RoomStatus,
    pub current_question_number: usize,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Room> for RoomDetail {
    fn from(room: Room) -> Self {
        Self {
            id: room.id,
            creator: room.creator,
            room_key: room.room_key,
            questions: room
                .questions
                .into_iter()
                .map(|q| QuestionDetail {
                    prompt: q.prompt,
                    answer: q.answer,
                })
                .collect(),
            players: room.players.into_iter().collect(),
            status: room.status,
            current_question_number: room.current_question_number,
            created_at: format_system_time(room.created_at),
            updated_at: format_system_time(room.updated_at),
        }
    }
}

/// Player-facing view of a room.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateResponse {
    pub status: RoomStatus,
    pub players: Vec<String>,
    /// 1-based rank of the requesting player; null when not ranked.
    pub your_rank: Option<usize>,
    /// Leading `[name, score]` pairs.
    #[schema(value_type = Vec<Object>)]
    pub top3: Vec<(String, u32)>,
    /// Null once every question has closed.
    pub current_question_number: Option<usize>,
    /// Prompt of the active question; null once every question has closed.
    pub current_question: Option<String>,
}

impl RoomStateResponse {
    /// Assemble the view for `player` from a room and its ranking.
    pub fn build(room: &Room, board: &Scoreboard, player: Option<&str>, top: usize) -> Self {
        let active = room.current_question();
        Self {
            status: room.status,
            players: room.players.iter().cloned().collect(),
            your_rank: player.and_then(|name| board.rank_of(name)),
            top3: board
                .top(top)
                .iter()
                .map(|entry| (entry.name.clone(), entry.score))
                .collect(),
            current_question_number: active.map(|_| room.current_question_number),
            current_question: active.map(|question| question.prompt.clone()),
        }
    }
}

/// Either projection of `GET /rooms/{id}` depending on the query.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum RoomView {
    Detail(RoomDetail),
    State(RoomStateResponse),
}

/// Confirmation returned after a successful join.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinResponse {
    pub room_id: Uuid,
    pub name: String,
    pub players: Vec<String>,
}

/// A recorded submission.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResponse {
    pub room_id: Uuid,
    pub player: String,
    pub response: String,
    pub question_number: usize,
    pub correct: bool,
    pub submitted_at: String,
}

impl From<Submission> for SubmissionResponse {
    fn from(value: Submission) -> Self {
        Self {
            room_id: value.room_id,
            player: value.player,
            response: value.response,
            question_number: value.question_number,
            correct: value.correct,
            submitted_at: format_system_time(value.submitted_at),
        }
    }
}

/// One ranked line of the scoreboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct ScoreLine {
    pub rank: usize,
    pub name: String,
    pub score: u32,
}

/// Complete ranking of a room.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScoreboardResponse {
    pub room_id: Uuid,
    /// Number of questions already closed.
    pub closed_questions: usize,
    pub entries: Vec<ScoreLine>,
}

impl ScoreboardResponse {
    /// Number the ranking lines of `board`.
    pub fn build(room: &Room, board: &Scoreboard) -> Self {
        Self {
            room_id: room.id,
            closed_questions: room.current_question_number,
            entries: board
                .entries()
                .iter()
                .enumerate()
                .map(|(index, ScoreEntry { name, score })| ScoreLine {
                    rank: index + 1,
                    name: name.clone(),
                    score: *score,
                })
                .collect(),
        }
    }
}

/// Public listing entry; never includes keys or answers.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RoomListItem {
    pub id: Uuid,
    pub creator: String,
    pub status: RoomStatus,
    pub player_count: usize,
    pub question_count: usize,
    pub created_at: String,
}

impl From<RoomListItemEntity> for RoomListItem {
    fn from(value: RoomListItemEntity) -> Self {
        Self {
            id: value.id,
            creator: value.creator,
            status: value.status,
            player_count: value.player_count,
            question_count: value.question_count,
            created_at: format_system_time(value.created_at),
        }
    }
}

/// Generic acknowledgement.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub message: String,
}
