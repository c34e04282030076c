use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

const APP_NAME: &str = "trivia-room-back";

/// Parsed driver options plus the database holding the `rooms` and `submissions`
/// collections.
#[derive(Clone)]
pub struct MongoConfig {
    pub options: ClientOptions,
    pub database_name: String,
}

impl MongoConfig {
    pub async fn from_uri(uri: &str, database_name: &str) -> MongoResult<Self> {
        let mut options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;
        options.app_name.get_or_insert_with(|| APP_NAME.to_owned());

        Ok(Self {
            options,
            database_name: database_name.to_owned(),
        })
    }
}
