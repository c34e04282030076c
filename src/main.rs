//! Trivia room backend entrypoint wiring configuration, storage and the REST API.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trivia_room_back::{
    config::{AppConfig, StorageBackend},
    dao::room_store::MemoryRoomStore,
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let port = config.port;
    let app_state = install_storage(config)?;

    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Create the shared state for the configured backend. MongoDB is connected in the
/// background; the server answers 503 until the supervisor installs the store.
fn install_storage(config: AppConfig) -> anyhow::Result<SharedState> {
    match config.storage {
        StorageBackend::Memory => {
            info!("using in-memory room store");
            Ok(AppState::with_store(config, Arc::new(MemoryRoomStore::new())))
        }
        StorageBackend::Mongo => spawn_mongo_supervisor(config),
    }
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(config: AppConfig) -> anyhow::Result<SharedState> {
    use trivia_room_back::{
        dao::{
            room_store::{
                RoomStore,
                mongodb::{MongoConfig, MongoRoomStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    let uri = config.mongo_uri.clone();
    let db_name = config.mongo_db.clone();
    let state = AppState::new(config);

    info!(database = %db_name, "using MongoDB room store");
    tokio::spawn(storage_supervisor::run(state.clone(), move || {
        let uri = uri.clone();
        let db_name = db_name.clone();
        async move {
            let mongo_config = MongoConfig::from_uri(&uri, &db_name)
                .await
                .map_err(StorageError::from)?;
            let store = MongoRoomStore::connect(mongo_config)
                .await
                .map_err(StorageError::from)?;
            Ok::<_, StorageError>(Arc::new(store) as Arc<dyn RoomStore>)
        }
    }));

    Ok(state)
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo_supervisor(_config: AppConfig) -> anyhow::Result<SharedState> {
    anyhow::bail!("STORAGE_BACKEND=mongo requires the `mongo-store` feature")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "could not install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
