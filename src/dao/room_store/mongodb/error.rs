use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to save room `{id}`")]
    SaveRoom {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("room `{id}` no longer at version {expected}")]
    StaleRoom { id: Uuid, expected: u64 },
    #[error("failed to load room `{id}`")]
    LoadRoom {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete room `{id}`")]
    DeleteRoom {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to list rooms")]
    ListRooms {
        #[source]
        source: MongoError,
    },
    #[error("`{player}` already answered question {question_number} in room `{room_id}`")]
    DuplicateSubmission {
        room_id: Uuid,
        player: String,
        question_number: u32,
    },
    #[error("failed to save submission for room `{room_id}`")]
    SaveSubmission {
        room_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("failed to load submissions for room `{room_id}`")]
    LoadSubmissions {
        room_id: Uuid,
        #[source]
        source: MongoError,
    },
    #[error("stored document for room `{id}` is malformed: {reason}")]
    Malformed { id: String, reason: &'static str },
}
