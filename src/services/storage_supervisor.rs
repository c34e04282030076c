use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{room_store::RoomStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

fn backoff(delay: Duration) -> Duration {
    (delay * 2).min(MAX_DELAY)
}

/// Install the room store once `connect` succeeds, then watch its health.
///
/// Requests fail with 503 while the store is missing or unhealthy. A failed health
/// check triggers a few in-place reconnects before the store is dropped and a fresh
/// connection is attempted.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn RoomStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.set_room_store(store.clone()).await;
                info!("room store connected; leaving degraded mode");
                delay = INITIAL_DELAY;

                watch_health(&state, store.as_ref()).await;

                warn!("exhausted room store reconnect attempts; reconnecting from scratch");
                state.clear_room_store().await;
                sleep(delay).await;
                delay = backoff(delay);
            }
            Err(err) => {
                warn!(error = %err, "room store connection attempt failed");
                sleep(delay).await;
                delay = backoff(delay);
            }
        }
    }
}

/// Poll `store` until it fails and cannot be revived in place.
async fn watch_health(state: &SharedState, store: &dyn RoomStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded().await {
                    info!("room store healthy again; leaving degraded mode");
                    state.update_degraded(false).await;
                }
            }
            Err(err) => {
                warn!(error = %err, "room store health check failed");
                if !reconnect(state, store).await {
                    return;
                }
                state.update_degraded(false).await;
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

async fn reconnect(state: &SharedState, store: &dyn RoomStore) -> bool {
    let mut delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "room store reconnected after failed health check");
                return true;
            }
            Err(err) => {
                if attempt == 0 {
                    warn!(attempt, error = %err, "room store reconnect failed; entering degraded mode");
                    state.update_degraded(true).await;
                } else {
                    warn!(attempt, error = %err, "room store reconnect attempt failed");
                }
                sleep(delay).await;
                delay = backoff(delay);
            }
        }
    }
    false
}
