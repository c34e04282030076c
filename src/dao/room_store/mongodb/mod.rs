pub mod config;
mod connection;
mod error;
mod models;
pub mod store;

pub use config::MongoConfig;
pub use error::MongoDaoError;
pub use store::MongoRoomStore;

use crate::dao::storage::StorageError;

impl From<MongoDaoError> for StorageError {
    fn from(err: MongoDaoError) -> Self {
        match err {
            MongoDaoError::DuplicateSubmission {
                player,
                question_number,
                ..
            } => StorageError::Duplicate {
                what: format!("submission by `{player}` for question {question_number}"),
            },
            MongoDaoError::StaleRoom { id, expected } => {
                StorageError::VersionConflict { id, expected }
            }
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
