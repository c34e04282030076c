use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database, IndexModel,
    bson::doc,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::{establish_connection, ping},
    error::{MongoDaoError, MongoResult},
    models::{
        MongoRoomDocument, MongoSubmissionDocument, doc_id, room_submissions, versioned_doc_id,
    },
};
use crate::dao::{
    models::{RoomEntity, RoomListItemEntity, SubmissionEntity},
    room_store::RoomStore,
    storage::StorageResult,
};

const ROOM_COLLECTION_NAME: &str = "rooms";
const SUBMISSION_COLLECTION_NAME: &str = "submissions";
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Clone)]
pub struct MongoRoomStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn check_health(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        ping(&database)
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database = establish_connection(&self.config).await?;
        let mut guard = self.state.write().await;
        guard.database = database;
        Ok(())
    }
}

impl MongoRoomStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.submission_collection().await;

        // The ledger's "one answer per player and question" rule lives in this index.
        let unique = IndexModel::builder()
            .keys(doc! {"room_id": 1, "player": 1, "question_number": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("submission_unique_idx".to_owned()))
                    .unique(Some(true))
                    .build(),
            )
            .build();
        collection
            .create_index(unique)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SUBMISSION_COLLECTION_NAME,
                index: "room_id,player,question_number",
                source,
            })?;

        let per_question = IndexModel::builder()
            .keys(doc! {"room_id": 1, "question_number": 1})
            .options(
                IndexOptions::builder()
                    .name(Some("submission_question_idx".to_owned()))
                    .build(),
            )
            .build();
        collection
            .create_index(per_question)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: SUBMISSION_COLLECTION_NAME,
                index: "room_id,question_number",
                source,
            })?;

        Ok(())
    }

    async fn room_collection(&self) -> Collection<MongoRoomDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoRoomDocument>(ROOM_COLLECTION_NAME)
    }

    async fn submission_collection(&self) -> Collection<MongoSubmissionDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoSubmissionDocument>(SUBMISSION_COLLECTION_NAME)
    }

    async fn insert_room(&self, room: RoomEntity) -> MongoResult<()> {
        let id = room.id;
        let document: MongoRoomDocument = room.into();
        self.room_collection()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::SaveRoom { id, source })?;
        Ok(())
    }

    async fn find_room(&self, id: Uuid) -> MongoResult<Option<RoomEntity>> {
        let document = self
            .room_collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadRoom { id, source })?;

        document.map(RoomEntity::try_from).transpose()
    }

    async fn replace_room(&self, room: RoomEntity, expected_version: u64) -> MongoResult<()> {
        let id = room.id;
        let document: MongoRoomDocument = room.into();
        let result = self
            .room_collection()
            .await
            .replace_one(versioned_doc_id(id, expected_version), &document)
            .await
            .map_err(|source| MongoDaoError::SaveRoom { id, source })?;

        if result.matched_count == 0 {
            return Err(MongoDaoError::StaleRoom {
                id,
                expected: expected_version,
            });
        }
        Ok(())
    }

    async fn delete_room(&self, id: Uuid) -> MongoResult<bool> {
        self.submission_collection()
            .await
            .delete_many(room_submissions(id))
            .await
            .map_err(|source| MongoDaoError::DeleteRoom { id, source })?;

        let result = self
            .room_collection()
            .await
            .delete_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::DeleteRoom { id, source })?;
        Ok(result.deleted_count > 0)
    }

    async fn list_rooms(&self) -> MongoResult<Vec<RoomListItemEntity>> {
        let documents: Vec<MongoRoomDocument> = self
            .room_collection()
            .await
            .find(doc! {})
            .sort(doc! {"created_at": 1})
            .await
            .map_err(|source| MongoDaoError::ListRooms { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListRooms { source })?;

        documents
            .into_iter()
            .map(|document| RoomEntity::try_from(document).map(Into::into))
            .collect()
    }

    async fn insert_submission(&self, submission: SubmissionEntity) -> MongoResult<u64> {
        let room_id = submission.room_id;
        let player = submission.player.clone();
        let question_number = submission.question_number;
        let document: MongoSubmissionDocument = submission.into();
        let collection = self.submission_collection().await;

        match collection.insert_one(&document).await {
            Ok(_) => {}
            Err(err) if is_duplicate_key(&err) => {
                return Err(MongoDaoError::DuplicateSubmission {
                    room_id,
                    player,
                    question_number,
                });
            }
            Err(source) => return Err(MongoDaoError::SaveSubmission { room_id, source }),
        }

        self.count_submissions(room_id, question_number).await
    }

    async fn count_submissions(&self, room_id: Uuid, question_number: u32) -> MongoResult<u64> {
        self.submission_collection()
            .await
            .count_documents(doc! {
                "room_id": room_id.to_string(),
                "question_number": i64::from(question_number),
            })
            .await
            .map_err(|source| MongoDaoError::LoadSubmissions { room_id, source })
    }

    async fn find_submissions(
        &self,
        room_id: Uuid,
        player: Option<String>,
    ) -> MongoResult<Vec<SubmissionEntity>> {
        let mut filter = room_submissions(room_id);
        if let Some(player) = player {
            filter.insert("player", player);
        }

        let documents: Vec<MongoSubmissionDocument> = self
            .submission_collection()
            .await
            .find(filter)
            .sort(doc! {"question_number": 1})
            .await
            .map_err(|source| MongoDaoError::LoadSubmissions { room_id, source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::LoadSubmissions { room_id, source })?;

        documents
            .into_iter()
            .map(SubmissionEntity::try_from)
            .collect()
    }
}

fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write)) if write.code == DUPLICATE_KEY_CODE
    )
}

impl RoomStore for MongoRoomStore {
    fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_room(room).await.map_err(Into::into) })
    }

    fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_room(id).await.map_err(Into::into) })
    }

    fn replace_room(
        &self,
        room: RoomEntity,
        expected_version: u64,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .replace_room(room, expected_version)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_room(id).await.map_err(Into::into) })
    }

    fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_rooms().await.map_err(Into::into) })
    }

    fn insert_submission(
        &self,
        submission: SubmissionEntity,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move { store.insert_submission(submission).await.map_err(Into::into) })
    }

    fn count_submissions(
        &self,
        room_id: Uuid,
        question_number: u32,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .count_submissions(room_id, question_number)
                .await
                .map_err(Into::into)
        })
    }

    fn list_submissions(
        &self,
        room_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<SubmissionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_submissions(room_id, None)
                .await
                .map_err(Into::into)
        })
    }

    fn player_submissions(
        &self,
        room_id: Uuid,
        player: String,
    ) -> BoxFuture<'static, StorageResult<Vec<SubmissionEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_submissions(room_id, Some(player))
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.check_health().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
