pub mod room;
pub mod scoring;
pub mod submission;

use std::{future::Future, sync::Arc};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::time::timeout;
use tracing::warn;
use uuid::Uuid;

use crate::{config::AppConfig, dao::room_store::RoomStore, error::ServiceError};

pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, degraded flag and per-room write gates.
pub struct AppState {
    room_store: RwLock<Option<Arc<dyn RoomStore>>>,
    degraded: watch::Sender<bool>,
    room_gates: DashMap<Uuid, Arc<Mutex<()>>>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            room_store: RwLock::new(None),
            degraded: degraded_tx,
            room_gates: DashMap::new(),
            config,
        })
    }

    /// Construct a state with a store already installed (memory backend, tests).
    pub fn with_store(config: AppConfig, store: Arc<dyn RoomStore>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(false);
        Arc::new(Self {
            room_store: RwLock::new(Some(store)),
            degraded: degraded_tx,
            room_gates: DashMap::new(),
            config,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current room store, if one is installed.
    pub async fn room_store(&self) -> Option<Arc<dyn RoomStore>> {
        let guard = self.room_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the room store or fail with [`ServiceError::Degraded`].
    pub async fn require_room_store(&self) -> Result<Arc<dyn RoomStore>, ServiceError> {
        if self.is_degraded().await {
            return Err(ServiceError::Degraded);
        }
        self.room_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new room store implementation and leave degraded mode.
    pub async fn set_room_store(&self, store: Arc<dyn RoomStore>) {
        {
            let mut guard = self.room_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false).await;
    }

    /// Remove the current room store and enter degraded mode.
    pub async fn clear_room_store(&self) {
        {
            let mut guard = self.room_store.write().await;
            guard.take();
        }
        self.update_degraded(true).await;
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub async fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    fn room_gate(&self, room_id: Uuid) -> Arc<Mutex<()>> {
        self.room_gates
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the gate of `room_id` unless another request still holds a handle to it.
    fn release_room_gate(&self, room_id: Uuid, gate: Arc<Mutex<()>>) {
        drop(gate);
        // the shard lock held by `remove_if` orders this against `room_gate` clones
        self.room_gates
            .remove_if(&room_id, |_, gate| Arc::strong_count(gate) == 1);
    }

    #[cfg(test)]
    pub(crate) fn open_gates(&self) -> usize {
        self.room_gates.len()
    }

    /// Run `work` while holding the write gate of `room_id`.
    ///
    /// Mutations of one room are serialized in-process; waiting for the gate and the
    /// work itself share the configured timeout. Gates only live while some request
    /// for the room is in flight.
    pub async fn run_exclusive<F, Fut, T>(&self, room_id: Uuid, work: F) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let gate = self.room_gate(room_id);
        let guarded = async {
            let _guard = gate.lock().await;
            work().await
        };

        let outcome = match timeout(self.config.mutation_timeout, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    room_id = %room_id,
                    limit_ms = self.config.mutation_timeout.as_millis() as u64,
                    "room mutation timed out"
                );
                Err(ServiceError::Timeout)
            }
        };

        self.release_room_gate(room_id, gate);
        outcome
    }
}
