//! Append-only submission ledger on top of the [`RoomStore`] collaborator.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    dao::room_store::RoomStore, error::ServiceError, state::submission::Submission,
};

/// Records one answer per (room, player, question) and reports completion counts.
#[derive(Clone)]
pub struct SubmissionLedger {
    store: Arc<dyn RoomStore>,
}

impl SubmissionLedger {
    pub fn new(store: Arc<dyn RoomStore>) -> Self {
        Self { store }
    }

    /// Persist `submission`, returning it along with the number of answers now recorded
    /// for its question.
    ///
    /// The uniqueness check is performed by the store in the same step as the insert, so
    /// two racing submissions for the same tuple yield exactly one record and one
    /// [`ServiceError::Conflict`].
    pub async fn record_submission(
        &self,
        submission: Submission,
    ) -> Result<(Submission, usize), ServiceError> {
        let count = self
            .store
            .insert_submission(submission.clone().into())
            .await?;
        Ok((submission, count as usize))
    }

    /// Number of answers recorded for `question_number` of `room_id`.
    pub async fn count_for_question(
        &self,
        room_id: Uuid,
        question_number: usize,
    ) -> Result<usize, ServiceError> {
        let count = self
            .store
            .count_submissions(room_id, question_number as u32)
            .await?;
        Ok(count as usize)
    }

    /// Answers of `player` ordered by question number.
    pub async fn history_for_player(
        &self,
        room_id: Uuid,
        player: &str,
    ) -> Result<Vec<Submission>, ServiceError> {
        let entries = self
            .store
            .player_submissions(room_id, player.to_owned())
            .await?;
        Ok(entries.into_iter().map(Into::into).collect())
    }

    /// Every answer recorded for `room_id`.
    pub async fn room_submissions(&self, room_id: Uuid) -> Result<Vec<Submission>, ServiceError> {
        let entries = self.store.list_submissions(room_id).await?;
        Ok(entries.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;
    use crate::dao::room_store::MemoryRoomStore;

    fn submission(room_id: Uuid, player: &str, question_number: usize) -> Submission {
        Submission {
            room_id,
            player: player.into(),
            question_number,
            response: "x".into(),
            correct: false,
            submitted_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn first_submission_wins() {
        let ledger = SubmissionLedger::new(Arc::new(MemoryRoomStore::new()));
        let room_id = Uuid::new_v4();

        let (_, count) = ledger
            .record_submission(submission(room_id, "Alice", 0))
            .await
            .unwrap();
        assert_eq!(count, 1);

        let err = ledger
            .record_submission(submission(room_id, "Alice", 0))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(ledger.count_for_question(room_id, 0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn racing_duplicates_record_once() {
        let ledger = SubmissionLedger::new(Arc::new(MemoryRoomStore::new()));
        let room_id = Uuid::new_v4();

        let attempts: Vec<_> = (0..16)
            .map(|_| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger
                        .record_submission(submission(room_id, "Bob", 2))
                        .await
                })
            })
            .collect();

        let mut accepted = 0;
        for attempt in attempts {
            if attempt.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
        assert_eq!(ledger.room_submissions(room_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_is_ordered_by_question() {
        let ledger = SubmissionLedger::new(Arc::new(MemoryRoomStore::new()));
        let room_id = Uuid::new_v4();
        for question_number in [2, 0, 1] {
            ledger
                .record_submission(submission(room_id, "Carol", question_number))
                .await
                .unwrap();
        }
        ledger
            .record_submission(submission(room_id, "Dave", 0))
            .await
            .unwrap();

        let history = ledger.history_for_player(room_id, "Carol").await.unwrap();
        let numbers: Vec<_> = history.iter().map(|s| s.question_number).collect();
        assert_eq!(numbers, [0, 1, 2]);
    }
}
