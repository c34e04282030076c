use std::{fmt, str::FromStr, time::SystemTime};

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::state::submission::Submission;

/// Lifecycle status of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Initial status; nobody can join yet.
    Closed,
    /// Lobby is open and players may join.
    Open,
    /// Questions are being played; only submissions are accepted.
    InProgress,
    /// Every question has closed (or the organizer ended the game).
    GameOver,
}

impl RoomStatus {
    /// Wire spelling of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Closed => "closed",
            RoomStatus::Open => "open",
            RoomStatus::InProgress => "in_progress",
            RoomStatus::GameOver => "game_over",
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a status string does not name one of the four room statuses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown room status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for RoomStatus {
    type Err = UnknownStatus;

    /// Accepts `in_progress`, `in progress` and `in-progress` alike, ignoring case.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();

        match normalized.as_str() {
            "closed" => Ok(RoomStatus::Closed),
            "open" => Ok(RoomStatus::Open),
            "in_progress" => Ok(RoomStatus::InProgress),
            "game_over" => Ok(RoomStatus::GameOver),
            _ => Err(UnknownStatus(value.to_owned())),
        }
    }
}

/// A single prompt and its expected answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Text shown to players.
    pub prompt: String,
    /// Exact string a response must equal to be scored as correct.
    pub answer: String,
}

/// Rule violations raised by the room state machine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    /// Room definition is malformed (empty question list, blank fields).
    #[error("{0}")]
    InvalidDefinition(String),
    /// The status string could not be parsed.
    #[error(transparent)]
    UnknownStatus(#[from] UnknownStatus),
    /// The supplied room key does not match.
    #[error("room key does not match")]
    WrongKey,
    /// A player with this name already joined.
    #[error("player `{0}` already joined this room")]
    DuplicatePlayer(String),
    /// Player names must contain at least one non-whitespace character.
    #[error("player name must not be empty")]
    BlankPlayerName,
    /// Joining is only possible while the room is open.
    #[error("room is {0}; players can only join an open room")]
    JoinNotAllowed(RoomStatus),
    /// Submissions are only accepted while the game is in progress.
    #[error("room is {0}; answers are only accepted while the game is in progress")]
    NotInProgress(RoomStatus),
    /// The submitting player is not on the roster.
    #[error("player `{0}` is not part of this room")]
    NotAMember(String),
    /// The question pointer is past the last question.
    #[error("room has no active question")]
    NoActiveQuestion,
}

/// Outcome of [`Room::advance_if_complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Some roster members have not answered the current question yet.
    Waiting {
        /// Submissions recorded so far for the question.
        answered: usize,
        /// Roster size.
        expected: usize,
    },
    /// The pointer already moved past the question; nothing to do.
    Stale,
    /// The pointer moved to the next question.
    Advanced {
        /// Newly active question number.
        next: usize,
    },
    /// The last question closed and the game is over.
    Finished,
}

/// Aggregate state of one trivia room.
#[derive(Debug, Clone)]
pub struct Room {
    /// Primary key of the room.
    pub id: Uuid,
    /// Display name of the organizer.
    pub creator: String,
    /// Shared secret required for organizer operations.
    pub room_key: String,
    /// Ordered question list, fixed at creation.
    pub questions: Vec<Question>,
    /// Joined players in join order.
    pub players: IndexSet<String>,
    /// Current lifecycle status.
    pub status: RoomStatus,
    /// Zero-based index of the question accepting submissions.
    pub current_question_number: usize,
    /// Optimistic concurrency counter, bumped on every persisted mutation.
    pub version: u64,
    /// Creation timestamp.
    pub created_at: SystemTime,
    /// Last mutation timestamp.
    pub updated_at: SystemTime,
}

impl Room {
    /// Build a closed room with an empty roster pointing at the first question.
    pub fn create(
        creator: String,
        room_key: String,
        questions: Vec<Question>,
    ) -> Result<Self, RoomError> {
        if creator.trim().is_empty() {
            return Err(RoomError::InvalidDefinition(
                "creator must not be empty".into(),
            ));
        }
        if room_key.trim().is_empty() {
            return Err(RoomError::InvalidDefinition(
                "room key must not be empty".into(),
            ));
        }
        if questions.is_empty() {
            return Err(RoomError::InvalidDefinition(
                "a room requires at least one question".into(),
            ));
        }
        if let Some(index) = questions.iter().position(|q| q.prompt.trim().is_empty()) {
            return Err(RoomError::InvalidDefinition(format!(
                "question {index} has an empty prompt"
            )));
        }

        let now = SystemTime::now();
        Ok(Self {
            id: Uuid::new_v4(),
            creator,
            room_key,
            questions,
            players: IndexSet::new(),
            status: RoomStatus::Closed,
            current_question_number: 0,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Check the organizer key.
    pub fn authorize(&self, room_key: &str) -> Result<(), RoomError> {
        if self.room_key == room_key {
            Ok(())
        } else {
            Err(RoomError::WrongKey)
        }
    }

    /// True once every question has closed.
    pub fn is_finished(&self) -> bool {
        self.current_question_number >= self.questions.len()
    }

    /// Question currently accepting submissions, if any.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_question_number)
    }

    /// Add a player to the roster.
    pub fn join(&mut self, name: &str) -> Result<(), RoomError> {
        if name.trim().is_empty() {
            return Err(RoomError::BlankPlayerName);
        }
        if self.players.contains(name) {
            return Err(RoomError::DuplicatePlayer(name.to_owned()));
        }
        if self.status != RoomStatus::Open {
            return Err(RoomError::JoinNotAllowed(self.status));
        }

        self.players.insert(name.to_owned());
        Ok(())
    }

    /// Overwrite the status on behalf of the organizer, returning the previous one.
    ///
    /// Any of the four statuses may be set from any other, backwards moves included.
    pub fn change_status(&mut self, room_key: &str, status: &str) -> Result<RoomStatus, RoomError> {
        self.authorize(room_key)?;
        let next: RoomStatus = status.parse()?;
        let previous = self.status;
        self.status = next;
        Ok(previous)
    }

    /// Validate a response against the current question and build the ledger record.
    ///
    /// Duplicate detection is left to the ledger.
    pub fn grade(&self, player: &str, response: String) -> Result<Submission, RoomError> {
        if self.status != RoomStatus::InProgress {
            return Err(RoomError::NotInProgress(self.status));
        }
        if !self.players.contains(player) {
            return Err(RoomError::NotAMember(player.to_owned()));
        }
        let question = self.current_question().ok_or(RoomError::NoActiveQuestion)?;
        let correct = response == question.answer;

        Ok(Submission {
            room_id: self.id,
            player: player.to_owned(),
            question_number: self.current_question_number,
            response,
            correct,
            submitted_at: SystemTime::now(),
        })
    }

    /// Move past `question_number` once `submitted` reaches the roster size.
    ///
    /// The pointer only moves when it still equals `question_number`, so replaying the
    /// same count after a reload never advances twice.
    pub fn advance_if_complete(&mut self, question_number: usize, submitted: usize) -> Advance {
        if self.current_question_number != question_number || self.is_finished() {
            return Advance::Stale;
        }

        let expected = self.players.len();
        if submitted < expected || expected == 0 {
            return Advance::Waiting {
                answered: submitted,
                expected,
            };
        }

        self.current_question_number += 1;
        if self.is_finished() {
            self.status = RoomStatus::GameOver;
            Advance::Finished
        } else {
            Advance::Advanced {
                next: self.current_question_number,
            }
        }
    }

    /// Stamp a mutation, returning the version the stored copy must still carry.
    pub fn bump(&mut self) -> u64 {
        let expected = self.version;
        self.version += 1;
        self.updated_at = SystemTime::now();
        expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(count: usize) -> Vec<Question> {
        (0..count)
            .map(|i| Question {
                prompt: format!("question {i}"),
                answer: format!("answer {i}"),
            })
            .collect()
    }

    fn open_room(players: &[&str], question_count: usize) -> Room {
        let mut room = Room::create("host".into(), "secret".into(), questions(question_count))
            .unwrap();
        room.change_status("secret", "open").unwrap();
        for player in players {
            room.join(player).unwrap();
        }
        room
    }

    #[test]
    fn new_room_is_closed_on_first_question() {
        let room = Room::create("host".into(), "secret".into(), questions(2)).unwrap();
        assert_eq!(room.status, RoomStatus::Closed);
        assert_eq!(room.current_question_number, 0);
        assert!(room.players.is_empty());
        assert_eq!(room.version, 0);
    }

    #[test]
    fn create_rejects_empty_question_list() {
        let err = Room::create("host".into(), "secret".into(), Vec::new()).unwrap_err();
        assert!(matches!(err, RoomError::InvalidDefinition(_)));
    }

    #[test]
    fn create_rejects_blank_prompt_and_key() {
        let mut qs = questions(2);
        qs[1].prompt = "  ".into();
        assert!(matches!(
            Room::create("host".into(), "secret".into(), qs),
            Err(RoomError::InvalidDefinition(_))
        ));
        assert!(matches!(
            Room::create("host".into(), " ".into(), questions(1)),
            Err(RoomError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn status_parsing_accepts_aliases() {
        assert_eq!("open".parse::<RoomStatus>(), Ok(RoomStatus::Open));
        assert_eq!("in_progress".parse::<RoomStatus>(), Ok(RoomStatus::InProgress));
        assert_eq!("in progress".parse::<RoomStatus>(), Ok(RoomStatus::InProgress));
        assert_eq!("Game-Over".parse::<RoomStatus>(), Ok(RoomStatus::GameOver));
        assert!("paused".parse::<RoomStatus>().is_err());
    }

    #[test]
    fn join_only_allowed_while_open() {
        for status in ["closed", "in_progress", "game_over"] {
            let mut room = open_room(&[], 1);
            room.change_status("secret", status).unwrap();
            assert!(matches!(
                room.join("late"),
                Err(RoomError::JoinNotAllowed(_))
            ));
            assert!(room.players.is_empty());
        }
    }

    #[test]
    fn duplicate_join_leaves_roster_unchanged() {
        let mut room = open_room(&["Alice", "Bob"], 1);
        assert_eq!(
            room.join("Bob"),
            Err(RoomError::DuplicatePlayer("Bob".into()))
        );
        assert_eq!(room.players.len(), 2);
    }

    #[test]
    fn roster_keeps_join_order() {
        let room = open_room(&["Carol", "Alice", "Bob"], 1);
        let names: Vec<_> = room.players.iter().map(String::as_str).collect();
        assert_eq!(names, ["Carol", "Alice", "Bob"]);
    }

    #[test]
    fn change_status_checks_key_before_status() {
        let mut room = open_room(&[], 1);
        assert_eq!(
            room.change_status("wrong", "bogus"),
            Err(RoomError::WrongKey)
        );
        assert!(matches!(
            room.change_status("secret", "bogus"),
            Err(RoomError::UnknownStatus(_))
        ));
        assert_eq!(room.status, RoomStatus::Open);
    }

    #[test]
    fn backwards_transition_is_permitted() {
        let mut room = open_room(&[], 1);
        room.change_status("secret", "game_over").unwrap();
        let previous = room.change_status("secret", "open").unwrap();
        assert_eq!(previous, RoomStatus::GameOver);
        assert_eq!(room.status, RoomStatus::Open);
    }

    #[test]
    fn grade_uses_exact_comparison() {
        let mut room = open_room(&["Alice"], 1);
        room.change_status("secret", "in_progress").unwrap();

        assert!(room.grade("Alice", "answer 0".into()).unwrap().correct);
        assert!(!room.grade("Alice", "Answer 0".into()).unwrap().correct);
        assert!(!room.grade("Alice", "answer 0 ".into()).unwrap().correct);
    }

    #[test]
    fn grade_requires_progress_and_membership() {
        let mut room = open_room(&["Alice"], 1);
        assert_eq!(
            room.grade("Alice", "x".into()).unwrap_err(),
            RoomError::NotInProgress(RoomStatus::Open)
        );

        room.change_status("secret", "in_progress").unwrap();
        assert_eq!(
            room.grade("Mallory", "x".into()).unwrap_err(),
            RoomError::NotAMember("Mallory".into())
        );
    }

    #[test]
    fn grade_without_active_question_fails() {
        let mut room = open_room(&["Alice"], 1);
        room.change_status("secret", "in_progress").unwrap();
        room.advance_if_complete(0, 1);
        room.change_status("secret", "in_progress").unwrap();
        assert_eq!(
            room.grade("Alice", "x".into()).unwrap_err(),
            RoomError::NoActiveQuestion
        );
    }

    #[test]
    fn advances_exactly_when_everyone_answered() {
        let mut room = open_room(&["Alice", "Bob", "Carol"], 3);
        room.change_status("secret", "in_progress").unwrap();

        assert_eq!(
            room.advance_if_complete(0, 1),
            Advance::Waiting {
                answered: 1,
                expected: 3
            }
        );
        assert_eq!(room.current_question_number, 0);
        room.advance_if_complete(0, 2);
        assert_eq!(room.current_question_number, 0);

        assert_eq!(room.advance_if_complete(0, 3), Advance::Advanced { next: 1 });
        assert_eq!(room.advance_if_complete(0, 3), Advance::Stale);
        assert_eq!(room.current_question_number, 1);
        assert_eq!(room.status, RoomStatus::InProgress);
    }

    #[test]
    fn last_question_ends_the_game() {
        let mut room = open_room(&["Alice", "Bob"], 2);
        room.change_status("secret", "in_progress").unwrap();

        room.advance_if_complete(0, 2);
        assert_eq!(room.advance_if_complete(1, 2), Advance::Finished);
        assert_eq!(room.current_question_number, 2);
        assert_eq!(room.status, RoomStatus::GameOver);
        assert!(room.current_question().is_none());
        assert_eq!(room.advance_if_complete(2, 2), Advance::Stale);
        assert_eq!(room.current_question_number, 2);
    }

    #[test]
    fn bump_returns_previous_version() {
        let mut room = open_room(&[], 1);
        assert_eq!(room.bump(), 0);
        assert_eq!(room.bump(), 1);
        assert_eq!(room.version, 2);
    }
}
