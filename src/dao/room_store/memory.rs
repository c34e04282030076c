//! Process-local backend used when no database is configured and by the test suite.

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    models::{RoomEntity, RoomListItemEntity, SubmissionEntity},
    room_store::RoomStore,
    storage::{StorageError, StorageResult},
};

#[derive(Clone, Default)]
pub struct MemoryRoomStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    rooms: DashMap<Uuid, RoomEntity>,
    // keyed by room id; the shard lock held by `entry` makes check-and-append atomic
    submissions: DashMap<Uuid, Vec<SubmissionEntity>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert_room(&self, room: RoomEntity) {
        self.inner.rooms.insert(room.id, room);
    }

    fn replace_room(&self, room: RoomEntity, expected_version: u64) -> StorageResult<()> {
        let id = room.id;
        match self.inner.rooms.get_mut(&id) {
            Some(mut slot) if slot.version == expected_version => {
                *slot = room;
                Ok(())
            }
            _ => Err(StorageError::VersionConflict {
                id,
                expected: expected_version,
            }),
        }
    }

    fn delete_room(&self, id: Uuid) -> bool {
        self.inner.submissions.remove(&id);
        self.inner.rooms.remove(&id).is_some()
    }

    fn list_rooms(&self) -> Vec<RoomListItemEntity> {
        let mut rooms: Vec<RoomListItemEntity> = self
            .inner
            .rooms
            .iter()
            .map(|entry| entry.value().clone().into())
            .collect();
        rooms.sort_by_key(|room| room.created_at);
        rooms
    }

    fn insert_submission(&self, submission: SubmissionEntity) -> StorageResult<u64> {
        let mut ledger = self.inner.submissions.entry(submission.room_id).or_default();

        let duplicate = ledger.iter().any(|existing| {
            existing.player == submission.player
                && existing.question_number == submission.question_number
        });
        if duplicate {
            return Err(StorageError::Duplicate {
                what: format!(
                    "submission by `{}` for question {}",
                    submission.player, submission.question_number
                ),
            });
        }

        let question_number = submission.question_number;
        ledger.push(submission);
        Ok(ledger
            .iter()
            .filter(|existing| existing.question_number == question_number)
            .count() as u64)
    }

    fn count_submissions(&self, room_id: Uuid, question_number: u32) -> u64 {
        self.inner
            .submissions
            .get(&room_id)
            .map(|ledger| {
                ledger
                    .iter()
                    .filter(|existing| existing.question_number == question_number)
                    .count() as u64
            })
            .unwrap_or(0)
    }

    fn list_submissions(&self, room_id: Uuid) -> Vec<SubmissionEntity> {
        self.inner
            .submissions
            .get(&room_id)
            .map(|ledger| ledger.clone())
            .unwrap_or_default()
    }

    fn player_submissions(&self, room_id: Uuid, player: &str) -> Vec<SubmissionEntity> {
        let mut history: Vec<SubmissionEntity> = self
            .list_submissions(room_id)
            .into_iter()
            .filter(|submission| submission.player == player)
            .collect();
        history.sort_by_key(|submission| submission.question_number);
        history
    }
}

impl RoomStore for MemoryRoomStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.insert_room(room);
            Ok(())
        })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.inner.rooms.get(&id).map(|room| room.clone())) })
    }

    fn replace_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.replace_room(room, expected_version) })
    }

    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.delete_room(id)) })
    }

    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.list_rooms()) })
    }

    fn insert_submission(
        &self,
        submission: SubmissionEntity,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.insert_submission(submission) })
    }

    fn count_submissions(
        &self,
        room_id: Uuid,
        question_number: u32,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.count_submissions(room_id, question_number)) })
    }

    fn list_submissions(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<SubmissionEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.list_submissions(room_id)) })
    }

    fn player_submissions(
        &self,
        room_id: Uuid,
        player: String,
    ) -> BoxFuture<'static, StorageResult<Vec<SubmissionEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.player_submissions(room_id, &player)) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
