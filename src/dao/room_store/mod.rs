pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{RoomEntity, RoomListItemEntity, SubmissionEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

pub use memory::MemoryRoomStore;

/// Abstraction over the persistence layer for rooms and their submission ledger.
///
/// Implementations must make [`RoomStore::insert_submission`] atomic with respect to
/// the (room, player, question) uniqueness rule, and [`RoomStore::replace_room`] a
/// compare-and-swap on the room version.
pub trait RoomStore: Send + Sync {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>>;
    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>>;
    /// Overwrite the room only if the stored copy still carries `expected_version`.
    fn replace_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove the room and every submission recorded for it.
    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>>;
    /// Append to the ledger, returning the number of submissions now recorded for the
    /// same (room, question) pair.
    fn insert_submission(
        &self,
        submission: SubmissionEntity,
    ) -> BoxFuture<'static, StorageResult<u64>>;
    fn count_submissions(
        &self,
        room_id: Uuid,
        question_number: u32,
    ) -> BoxFuture<'static, StorageResult<u64>>;
    fn list_submissions(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<SubmissionEntity>>>;
    /// Submissions of one player, ordered by question number.
    fn player_submissions(
        &self,
        room_id: Uuid,
        player: String,
    ) -> BoxFuture<'static, StorageResult<Vec<SubmissionEntity>>>;
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
