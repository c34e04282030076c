use std::time::Duration;

use mongodb::{Client, Database, bson::doc, error::Error as MongoError};
use tokio::time::sleep;
use tracing::debug;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
};

// Initial pings only; longer outages are handled by the storage supervisor.
const PING_ATTEMPTS: u32 = 5;
const FIRST_PING_DELAY: Duration = Duration::from_millis(250);
const MAX_PING_DELAY: Duration = Duration::from_secs(2);

pub async fn ping(database: &Database) -> Result<(), MongoError> {
    database.run_command(doc! { "ping": 1 }).await.map(|_| ())
}

/// Open a client for `config` and wait until its database answers a ping.
pub async fn establish_connection(config: &MongoConfig) -> MongoResult<Database> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut delay = FIRST_PING_DELAY;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match ping(&database).await {
            Ok(()) => {
                debug!(database = %config.database_name, attempt, "MongoDB answered ping");
                return Ok(database);
            }
            Err(source) if attempt >= PING_ATTEMPTS => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                debug!(attempt, error = %err, "MongoDB ping failed; retrying");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_PING_DELAY);
            }
        }
    }
}
