use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod extract;
pub mod health;
pub mod rooms;

/// Compose all route trees and attach the shared state.
pub fn router(state: SharedState) -> Router<()> {
    rooms::router()
        .merge(health::router())
        .merge(docs::router())
        .with_state(state)
}
