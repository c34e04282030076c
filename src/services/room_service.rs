//! Game session facade. Every room mutation runs behind the room's write gate and is
//! persisted through a compare-and-swap on the room version, so concurrent requests
//! (in this process or another one sharing the database) never lose updates.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    dao::{room_store::RoomStore, storage::StorageError},
    dto::room::{
        CreateRoomRequest, JoinResponse, RoomDetail, RoomListItem, RoomQuery, RoomStateResponse,
        RoomView, ScoreboardResponse, SubmissionResponse,
    },
    error::ServiceError,
    services::ledger::SubmissionLedger,
    state::{
        SharedState,
        room::{Advance, Room, RoomStatus},
        scoring::Scoreboard,
    },
};

fn room_not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("room `{id}` not found"))
}

fn require_key(room_key: Option<String>) -> Result<String, ServiceError> {
    room_key
        .filter(|key| !key.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("room key is required".into()))
}

async fn load_room(store: &Arc<dyn RoomStore>, id: Uuid) -> Result<Room, ServiceError> {
    store
        .find_room(id)
        .await?
        .map(Room::from)
        .ok_or_else(|| room_not_found(id))
}

/// Reload `room_id`, apply `change` and write it back if asked to.
///
/// `change` returns its outcome and whether the room must be persisted. A version
/// conflict means another writer got there first: the room is reloaded and `change`
/// re-evaluated against the fresh copy, up to `max_cas_retries` times.
async fn update_room<T, F>(
    state: &SharedState,
    store: &Arc<dyn RoomStore>,
    room_id: Uuid,
    mut change: F,
) -> Result<(Room, T), ServiceError>
where
    F: FnMut(&mut Room) -> Result<(T, bool), ServiceError>,
{
    let max_retries = state.config().max_cas_retries;
    let mut attempt = 0;

    loop {
        let mut room = load_room(store, room_id).await?;
        let (outcome, persist) = change(&mut room)?;
        if !persist {
            return Ok((room, outcome));
        }

        let expected = room.bump();
        match store.replace_room(room.clone().into(), expected).await {
            Ok(()) => return Ok((room, outcome)),
            Err(StorageError::VersionConflict { .. }) if attempt < max_retries => {
                attempt += 1;
                warn!(room_id = %room_id, attempt, "room changed underneath; reloading");
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Advance past `question_number` when `answered` covers the whole roster.
async fn advance_if_complete(
    state: &SharedState,
    store: &Arc<dyn RoomStore>,
    room_id: Uuid,
    question_number: usize,
    answered: usize,
) -> Result<Room, ServiceError> {
    let (room, outcome) = update_room(state, store, room_id, |room| {
        let outcome = room.advance_if_complete(question_number, answered);
        let moved = matches!(outcome, Advance::Advanced { .. } | Advance::Finished);
        Ok((outcome, moved))
    })
    .await?;

    match outcome {
        Advance::Advanced { next } => {
            info!(room_id = %room_id, question = next, "question advanced");
        }
        Advance::Finished => info!(room_id = %room_id, "last question closed; game over"),
        Advance::Waiting { answered, expected } => {
            debug!(room_id = %room_id, answered, expected, "waiting for answers");
        }
        Advance::Stale => {}
    }
    Ok(room)
}

/// Whether every roster member already answered the active question, so the room
/// should have moved on.
fn advance_pending(room: &Room, answered: usize) -> bool {
    room.status == RoomStatus::InProgress
        && !room.is_finished()
        && !room.players.is_empty()
        && answered >= room.players.len()
}

/// Finish an advance a previous request recorded the last answer for but could not
/// persist. Readers keep the loaded room when the store refuses the write.
async fn settle_for_read(
    state: &SharedState,
    store: &Arc<dyn RoomStore>,
    room: Room,
    answered: usize,
) -> Room {
    if !advance_pending(&room, answered) {
        return room;
    }
    let question_number = room.current_question_number;
    warn!(room_id = %room.id, question = question_number, "settling pending advance");
    match advance_if_complete(state, store, room.id, question_number, answered).await {
        Ok(settled) => settled,
        Err(err) => {
            warn!(room_id = %room.id, error = %err, "pending advance still not settled");
            room
        }
    }
}

// ---------------------------------------------------------------------------
// Organizer operations
// ---------------------------------------------------------------------------

/// Create a closed room with an empty roster pointing at the first question.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<RoomDetail, ServiceError> {
    let store = state.require_room_store().await?;
    let room = Room::create(
        request.creator,
        request.room_key,
        request.questions.into_iter().map(Into::into).collect(),
    )?;

    store.insert_room(room.clone().into()).await?;
    info!(
        room_id = %room.id,
        creator = %room.creator,
        questions = room.questions.len(),
        "room created"
    );
    Ok(room.into())
}

/// Overwrite the room status on behalf of the holder of the room key.
pub async fn change_status(
    state: &SharedState,
    room_id: Uuid,
    room_key: Option<String>,
    status: String,
) -> Result<RoomDetail, ServiceError> {
    let room_key = require_key(room_key)?;
    let store = state.require_room_store().await?;

    let (room, previous) = state
        .run_exclusive(room_id, || async {
            update_room(state, &store, room_id, |room| {
                let previous = room.change_status(&room_key, &status)?;
                Ok((previous, true))
            })
            .await
        })
        .await?;

    info!(
        room_id = %room_id,
        from = %previous,
        to = %room.status,
        "room status changed"
    );
    Ok(room.into())
}

/// Full room including answers and key.
pub async fn get_room_detail(
    state: &SharedState,
    room_id: Uuid,
    room_key: &str,
) -> Result<RoomDetail, ServiceError> {
    let store = state.require_room_store().await?;
    let room = load_room(&store, room_id).await?;
    room.authorize(room_key)?;
    Ok(room.into())
}

/// Remove a room together with its submissions.
pub async fn delete_room(
    state: &SharedState,
    room_id: Uuid,
    room_key: Option<String>,
) -> Result<(), ServiceError> {
    let room_key = require_key(room_key)?;
    let store = state.require_room_store().await?;

    let deleted = state
        .run_exclusive(room_id, || async {
            let room = load_room(&store, room_id).await?;
            room.authorize(&room_key)?;
            Ok::<_, ServiceError>(store.delete_room(room_id).await?)
        })
        .await?;

    if !deleted {
        return Err(room_not_found(room_id));
    }
    info!(room_id = %room_id, "room deleted");
    Ok(())
}

// ---------------------------------------------------------------------------
// Player operations
// ---------------------------------------------------------------------------

/// Add `name` to the roster of an open room.
pub async fn join_room(
    state: &SharedState,
    room_id: Uuid,
    name: String,
) -> Result<JoinResponse, ServiceError> {
    let store = state.require_room_store().await?;

    let (room, ()) = state
        .run_exclusive(room_id, || async {
            // status is re-read from the fresh copy right before the roster changes
            update_room(state, &store, room_id, |room| {
                room.join(&name)?;
                Ok(((), true))
            })
            .await
        })
        .await?;

    debug!(room_id = %room_id, player = %name, roster = room.players.len(), "player joined");
    Ok(JoinResponse {
        room_id,
        name,
        players: room.players.into_iter().collect(),
    })
}

/// Grade and record `response` for the active question, then advance the room when
/// every roster member has answered it.
///
/// The caller only learns whether the answer was correct; a question change becomes
/// visible on the next state read. Once the answer is recorded the request succeeds:
/// an advance that cannot be persisted is left for the next reader or submitter.
pub async fn submit_answer(
    state: &SharedState,
    room_id: Uuid,
    player: String,
    response: String,
) -> Result<SubmissionResponse, ServiceError> {
    let store = state.require_room_store().await?;
    let ledger = SubmissionLedger::new(store.clone());

    let (submission, answered, roster) = state
        .run_exclusive(room_id, || async {
            let mut room = load_room(&store, room_id).await?;

            // grading against a question everyone already answered would misfile the answer
            let question_number = room.current_question_number;
            if room.status == RoomStatus::InProgress && !room.is_finished() {
                let answered = ledger.count_for_question(room_id, question_number).await?;
                if advance_pending(&room, answered) {
                    warn!(room_id = %room_id, question = question_number, "settling pending advance");
                    room = advance_if_complete(state, &store, room_id, question_number, answered)
                        .await?;
                }
            }

            let submission = room.grade(&player, response)?;
            let (submission, answered) = ledger.record_submission(submission).await?;
            Ok::<_, ServiceError>((submission, answered, room.players.len()))
        })
        .await?;

    let question_number = submission.question_number;
    debug!(
        room_id = %room_id,
        player = %submission.player,
        question = question_number,
        correct = submission.correct,
        answered,
        "answer recorded"
    );

    if answered >= roster {
        if let Err(err) =
            advance_if_complete(state, &store, room_id, question_number, answered).await
        {
            warn!(
                room_id = %room_id,
                question = question_number,
                error = %err,
                "answer recorded but the room could not advance"
            );
        }
    }
    Ok(submission.into())
}

/// History of one player's answers ordered by question.
pub async fn player_history(
    state: &SharedState,
    room_id: Uuid,
    player: &str,
) -> Result<Vec<SubmissionResponse>, ServiceError> {
    let store = state.require_room_store().await?;
    let room = load_room(&store, room_id).await?;
    if !room.players.contains(player) {
        return Err(ServiceError::NotFound(format!(
            "player `{player}` is not part of this room"
        )));
    }

    let history = SubmissionLedger::new(store)
        .history_for_player(room_id, player)
        .await?;
    Ok(history.into_iter().map(Into::into).collect())
}

// ---------------------------------------------------------------------------
// Read-only projections
// ---------------------------------------------------------------------------

async fn room_with_scoreboard(
    state: &SharedState,
    room_id: Uuid,
) -> Result<(Room, Scoreboard), ServiceError> {
    let store = state.require_room_store().await?;
    let room = load_room(&store, room_id).await?;
    let submissions = SubmissionLedger::new(store.clone())
        .room_submissions(room_id)
        .await?;

    let answered = submissions
        .iter()
        .filter(|submission| submission.question_number == room.current_question_number)
        .count();
    let room = settle_for_read(state, &store, room, answered).await;

    let board = Scoreboard::compute(&room, &submissions);
    Ok((room, board))
}

/// Player-facing view: status, roster, ranking and the active prompt.
pub async fn get_state(
    state: &SharedState,
    room_id: Uuid,
    player: Option<&str>,
) -> Result<RoomStateResponse, ServiceError> {
    let (room, board) = room_with_scoreboard(state, room_id).await?;
    Ok(RoomStateResponse::build(
        &room,
        &board,
        player,
        state.config().leaderboard_size,
    ))
}

/// Resolve `GET /rooms/{id}`: the organizer detail when a key is supplied, the player
/// view otherwise.
pub async fn get_room(
    state: &SharedState,
    room_id: Uuid,
    query: RoomQuery,
) -> Result<RoomView, ServiceError> {
    match query.room_key {
        Some(room_key) => Ok(RoomView::Detail(
            get_room_detail(state, room_id, &room_key).await?,
        )),
        None => Ok(RoomView::State(
            get_state(state, room_id, query.player.as_deref()).await?,
        )),
    }
}

/// Full ranking of the room.
pub async fn get_scoreboard(
    state: &SharedState,
    room_id: Uuid,
) -> Result<ScoreboardResponse, ServiceError> {
    let (room, board) = room_with_scoreboard(state, room_id).await?;
    Ok(ScoreboardResponse::build(&room, &board))
}

/// Public room summaries, oldest first.
pub async fn list_rooms(state: &SharedState) -> Result<Vec<RoomListItem>, ServiceError> {
    let store = state.require_room_store().await?;
    let rooms = store.list_rooms().await?;
    Ok(rooms.into_iter().map(Into::into).collect())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use futures::future::BoxFuture;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{
            models::{RoomEntity, RoomListItemEntity, SubmissionEntity},
            room_store::MemoryRoomStore,
            storage::StorageResult,
        },
        dto::room::QuestionInput,
        state::AppState,
    };

    fn memory_state() -> SharedState {
        AppState::with_store(AppConfig::default(), Arc::new(MemoryRoomStore::new()))
    }

    fn create_request(answers: &[&str]) -> CreateRoomRequest {
        CreateRoomRequest {
            creator: "ZSG".into(),
            room_key: "secret".into(),
            questions: answers
                .iter()
                .enumerate()
                .map(|(i, answer)| QuestionInput {
                    prompt: format!("question {i}"),
                    answer: answer.to_string(),
                })
                .collect(),
        }
    }

    async fn running_room(state: &SharedState, answers: &[&str], players: &[&str]) -> Uuid {
        let room = create_room(state, create_request(answers)).await.unwrap();
        change_status(state, room.id, Some("secret".into()), "open".into())
            .await
            .unwrap();
        for player in players {
            join_room(state, room.id, player.to_string()).await.unwrap();
        }
        change_status(state, room.id, Some("secret".into()), "in progress".into())
            .await
            .unwrap();
        room.id
    }

    async fn submit(
        state: &SharedState,
        room_id: Uuid,
        player: &str,
        response: &str,
    ) -> Result<SubmissionResponse, ServiceError> {
        submit_answer(state, room_id, player.into(), response.into()).await
    }

    #[tokio::test]
    async fn created_room_is_closed_with_empty_roster() {
        let state = memory_state();
        let room = create_room(&state, create_request(&["CS52"])).await.unwrap();
        assert_eq!(room.status, RoomStatus::Closed);
        assert_eq!(room.current_question_number, 0);
        assert!(room.players.is_empty());

        let view = get_state(&state, room.id, None).await.unwrap();
        assert_eq!(view.current_question.as_deref(), Some("question 0"));
        assert_eq!(view.your_rank, None);
    }

    #[tokio::test]
    async fn create_rejects_empty_questions() {
        let state = memory_state();
        let err = create_room(&state, create_request(&[])).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn first_question_scenario() {
        let state = memory_state();
        let room_id = running_room(&state, &["CS52", "JavaScript", "42"], &["Alice", "Bob"]).await;

        let alice = submit(&state, room_id, "Alice", "CS52").await.unwrap();
        assert!(alice.correct);
        let view = get_state(&state, room_id, Some("Alice")).await.unwrap();
        assert_eq!(view.current_question_number, Some(0));

        let bob = submit(&state, room_id, "Bob", "CS 52").await.unwrap();
        assert!(!bob.correct);

        let view = get_state(&state, room_id, Some("Alice")).await.unwrap();
        assert_eq!(view.current_question_number, Some(1));
        assert_eq!(view.current_question.as_deref(), Some("question 1"));
        assert_eq!(view.your_rank, Some(1));
        assert_eq!(
            view.top3,
            vec![("Alice".to_string(), 1), ("Bob".to_string(), 0)]
        );

        let bob_view = get_state(&state, room_id, Some("Bob")).await.unwrap();
        assert_eq!(bob_view.your_rank, Some(2));
    }

    #[tokio::test]
    async fn game_over_after_last_question() {
        let state = memory_state();
        let room_id = running_room(&state, &["a", "b"], &["Alice", "Bob"]).await;

        for (alice, bob) in [("a", "x"), ("b", "b")] {
            submit(&state, room_id, "Alice", alice).await.unwrap();
            submit(&state, room_id, "Bob", bob).await.unwrap();
        }

        let view = get_state(&state, room_id, None).await.unwrap();
        assert_eq!(view.status, RoomStatus::GameOver);
        assert_eq!(view.current_question_number, None);
        assert_eq!(view.current_question, None);

        let board = get_scoreboard(&state, room_id).await.unwrap();
        assert_eq!(board.closed_questions, 2);
        assert_eq!(board.entries[0].name, "Alice");
        assert_eq!(board.entries[0].score, 2);
        assert_eq!(board.entries[1].score, 1);

        let err = submit(&state, room_id, "Alice", "a").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn duplicate_submission_is_a_conflict() {
        let state = memory_state();
        let room_id = running_room(&state, &["a", "b"], &["Alice", "Bob"]).await;

        submit(&state, room_id, "Alice", "a").await.unwrap();
        let err = submit(&state, room_id, "Alice", "b").await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let history = player_history(&state, room_id, "Alice").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].response, "a");
    }

    #[tokio::test]
    async fn non_member_submission_leaves_no_trace() {
        let state = memory_state();
        let room_id = running_room(&state, &["a"], &["Alice"]).await;

        let err = submit(&state, room_id, "Mallory", "a").await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let board = get_scoreboard(&state, room_id).await.unwrap();
        assert_eq!(board.entries.len(), 1);
        let view = get_state(&state, room_id, None).await.unwrap();
        assert_eq!(view.current_question_number, Some(0));
    }

    #[tokio::test]
    async fn second_bob_is_rejected() {
        let state = memory_state();
        let room = create_room(&state, create_request(&["a"])).await.unwrap();
        change_status(&state, room.id, Some("secret".into()), "open".into())
            .await
            .unwrap();
        join_room(&state, room.id, "Bob".into()).await.unwrap();

        let err = join_room(&state, room.id, "Bob".into()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        let view = get_state(&state, room.id, None).await.unwrap();
        assert_eq!(view.players, vec!["Bob".to_string()]);
    }

    #[tokio::test]
    async fn join_only_while_open() {
        let state = memory_state();
        let room = create_room(&state, create_request(&["a"])).await.unwrap();

        for status in ["closed", "in_progress", "game_over"] {
            change_status(&state, room.id, Some("secret".into()), status.into())
                .await
                .unwrap();
            let err = join_room(&state, room.id, "late".into()).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidState(_)), "{status}");
        }
    }

    #[tokio::test]
    async fn status_change_requires_the_key() {
        let state = memory_state();
        let room = create_room(&state, create_request(&["a"])).await.unwrap();

        let err = change_status(&state, room.id, Some("nope".into()), "open".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        let err = change_status(&state, room.id, None, "open".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
        let err = change_status(&state, room.id, Some("secret".into()), "paused".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unknown_room_is_not_found() {
        let state = memory_state();
        let err = get_state(&state, Uuid::new_v4(), None).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn concurrent_answers_advance_exactly_once() {
        let state = memory_state();
        let players: Vec<String> = (0..12).map(|i| format!("player-{i}")).collect();
        let names: Vec<&str> = players.iter().map(String::as_str).collect();
        let room_id = running_room(&state, &["a", "b", "c"], &names).await;

        let tasks: Vec<_> = players
            .iter()
            .cloned()
            .map(|player| {
                let state = state.clone();
                tokio::spawn(async move {
                    submit_answer(&state, room_id, player, "a".into()).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let view = get_state(&state, room_id, None).await.unwrap();
        assert_eq!(view.current_question_number, Some(1));
        assert_eq!(view.status, RoomStatus::InProgress);
        assert!(view.top3.iter().all(|(_, score)| *score == 1));
    }

    #[tokio::test]
    async fn detail_and_delete_are_key_gated() {
        let state = memory_state();
        let room_id = running_room(&state, &["a"], &["Alice"]).await;
        submit(&state, room_id, "Alice", "a").await.unwrap();

        let detail = get_room_detail(&state, room_id, "secret").await.unwrap();
        assert_eq!(detail.questions[0].answer, "a");
        assert!(matches!(
            get_room_detail(&state, room_id, "wrong").await,
            Err(ServiceError::Unauthorized(_))
        ));

        assert!(matches!(
            delete_room(&state, room_id, Some("wrong".into())).await,
            Err(ServiceError::Unauthorized(_))
        ));
        delete_room(&state, room_id, Some("secret".into()))
            .await
            .unwrap();
        assert!(list_rooms(&state).await.unwrap().is_empty());

        let store = state.require_room_store().await.unwrap();
        assert!(store.list_submissions(room_id).await.unwrap().is_empty());
    }

    /// Store whose compare-and-swap misses a fixed number of times, as if another
    /// process kept writing the room.
    struct ContendedStore {
        inner: MemoryRoomStore,
        misses: AtomicU32,
    }

    impl RoomStore for ContendedStore {
        fn insert_room(&self, room: RoomEntity) -> BoxFuture<'static, StorageResult<()>> {
            RoomStore::insert_room(&self.inner, room)
        }
        fn find_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<RoomEntity>>> {
            RoomStore::find_room(&self.inner, id)
        }
        fn replace_room(
            &self,
            room: RoomEntity,
            expected_version: u64,
        ) -> BoxFuture<'static, StorageResult<()>> {
            let missed = self
                .misses
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok();
            if missed {
                let id = room.id;
                return Box::pin(async move {
                    Err(StorageError::VersionConflict {
                        id,
                        expected: expected_version,
                    })
                });
            }
            RoomStore::replace_room(&self.inner, room, expected_version)
        }
        fn delete_room(&self, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
            RoomStore::delete_room(&self.inner, id)
        }
        fn list_rooms(&self) -> BoxFuture<'static, StorageResult<Vec<RoomListItemEntity>>> {
            RoomStore::list_rooms(&self.inner)
        }
        fn insert_submission(
            &self,
            submission: SubmissionEntity,
        ) -> BoxFuture<'static, StorageResult<u64>> {
            RoomStore::insert_submission(&self.inner, submission)
        }
        fn count_submissions(
            &self,
            room_id: Uuid,
            question_number: u32,
        ) -> BoxFuture<'static, StorageResult<u64>> {
            RoomStore::count_submissions(&self.inner, room_id, question_number)
        }
        fn list_submissions(
            &self,
            room_id: Uuid,
        ) -> BoxFuture<'static, StorageResult<Vec<SubmissionEntity>>> {
            RoomStore::list_submissions(&self.inner, room_id)
        }
        fn player_submissions(
            &self,
            room_id: Uuid,
            player: String,
        ) -> BoxFuture<'static, StorageResult<Vec<SubmissionEntity>>> {
            RoomStore::player_submissions(&self.inner, room_id, player)
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            RoomStore::health_check(&self.inner)
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            RoomStore::try_reconnect(&self.inner)
        }
    }

    fn contended_state() -> (SharedState, Arc<ContendedStore>) {
        let store = Arc::new(ContendedStore {
            inner: MemoryRoomStore::new(),
            misses: AtomicU32::new(0),
        });
        let state = AppState::with_store(AppConfig::default(), store.clone());
        (state, store)
    }

    #[tokio::test]
    async fn version_conflicts_are_retried() {
        let (state, store) = contended_state();
        let room = create_room(&state, create_request(&["a"])).await.unwrap();

        store.misses.store(2, Ordering::SeqCst);
        let updated = change_status(&state, room.id, Some("secret".into()), "open".into())
            .await
            .unwrap();
        assert_eq!(updated.status, RoomStatus::Open);
    }

    #[tokio::test]
    async fn persistent_conflicts_give_up() {
        let (state, store) = contended_state();
        let room = create_room(&state, create_request(&["a"])).await.unwrap();

        store.misses.store(100, Ordering::SeqCst);
        let err = change_status(&state, room.id, Some("secret".into()), "open".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Busy(_)));

        store.misses.store(0, Ordering::SeqCst);
        let view = get_state(&state, room.id, None).await.unwrap();
        assert_eq!(view.status, RoomStatus::Closed);
    }

    #[tokio::test]
    async fn recorded_answer_survives_a_failed_advance() {
        let (state, store) = contended_state();
        let room_id = running_room(&state, &["a", "b"], &["Alice", "Bob"]).await;
        submit(&state, room_id, "Alice", "a").await.unwrap();

        // just enough misses to exhaust every retry of the advance after Bob's answer
        let retries = state.config().max_cas_retries;
        store.misses.store(retries + 1, Ordering::SeqCst);
        let bob = submit(&state, room_id, "Bob", "a").await.unwrap();
        assert_eq!(bob.question_number, 0);
        assert!(bob.correct);
        assert_eq!(store.misses.load(Ordering::SeqCst), 0);

        // the next read finishes the advance
        let view = get_state(&state, room_id, Some("Bob")).await.unwrap();
        assert_eq!(view.current_question_number, Some(1));
        assert_eq!(view.current_question.as_deref(), Some("question 1"));

        let next = submit(&state, room_id, "Bob", "b").await.unwrap();
        assert_eq!(next.question_number, 1);
        assert!(next.correct);

        let history = player_history(&state, room_id, "Bob").await.unwrap();
        let answered: Vec<usize> = history.iter().map(|entry| entry.question_number).collect();
        assert_eq!(answered, [0, 1]);
    }

    #[tokio::test]
    async fn pending_advance_is_settled_by_next_submission() {
        let (state, store) = contended_state();
        let room_id = running_room(&state, &["a", "b"], &["Alice"]).await;

        // every write keeps missing: the answer stands, reads still serve the old question
        store.misses.store(100, Ordering::SeqCst);
        let first = submit(&state, room_id, "Alice", "a").await.unwrap();
        assert_eq!(first.question_number, 0);
        let view = get_state(&state, room_id, None).await.unwrap();
        assert_eq!(view.current_question_number, Some(0));

        store.misses.store(0, Ordering::SeqCst);
        let second = submit(&state, room_id, "Alice", "b").await.unwrap();
        assert_eq!(second.question_number, 1);
        assert!(second.correct);

        let view = get_state(&state, room_id, Some("Alice")).await.unwrap();
        assert_eq!(view.status, RoomStatus::GameOver);
        assert_eq!(view.top3, vec![("Alice".to_string(), 2)]);
    }

    #[tokio::test]
    async fn unknown_rooms_leave_no_gates() {
        let state = memory_state();
        for _ in 0..50 {
            let id = Uuid::new_v4();
            assert!(matches!(
                join_room(&state, id, "x".into()).await,
                Err(ServiceError::NotFound(_))
            ));
            assert!(submit(&state, id, "x", "a").await.is_err());
            assert!(
                change_status(&state, id, Some("k".into()), "open".into())
                    .await
                    .is_err()
            );
        }
        assert_eq!(state.open_gates(), 0);

        let room_id = running_room(&state, &["a"], &["Alice"]).await;
        submit(&state, room_id, "Alice", "a").await.unwrap();
        assert_eq!(state.open_gates(), 0);
    }

    #[tokio::test]
    async fn degraded_state_rejects_requests() {
        let state = AppState::new(AppConfig::default());
        let err = list_rooms(&state).await.unwrap_err();
        assert!(matches!(err, ServiceError::Degraded));
    }
}
