//! Leaderboard derivation. Scores are never stored; they are recomputed from the
//! submission history on every read.

use indexmap::IndexMap;

use crate::state::{room::Room, submission::Submission};

/// A roster member and the number of closed questions they answered correctly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    /// Player name.
    pub name: String,
    /// Correct answers among closed questions.
    pub score: u32,
}

/// Players ranked by descending score. Equal scores keep join order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scoreboard {
    entries: Vec<ScoreEntry>,
}

impl Scoreboard {
    /// Rank every roster member of `room` from its submission history.
    ///
    /// Only correct answers to questions before the current pointer count, so the
    /// in-flight question never leaks partial results. Answers from names outside the
    /// roster are ignored.
    pub fn compute(room: &Room, submissions: &[Submission]) -> Self {
        let mut scores: IndexMap<&str, u32> = room
            .players
            .iter()
            .map(|name| (name.as_str(), 0))
            .collect();

        for submission in submissions {
            if submission.room_id != room.id
                || !submission.correct
                || submission.question_number >= room.current_question_number
            {
                continue;
            }
            if let Some(score) = scores.get_mut(submission.player.as_str()) {
                *score += 1;
            }
        }

        let mut entries: Vec<ScoreEntry> = scores
            .into_iter()
            .map(|(name, score)| ScoreEntry {
                name: name.to_owned(),
                score,
            })
            .collect();
        // stable: ties stay in join order
        entries.sort_by(|a, b| b.score.cmp(&a.score));

        Self { entries }
    }

    /// Full ranking, best first.
    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    /// The first `count` entries (fewer when the roster is smaller).
    pub fn top(&self, count: usize) -> &[ScoreEntry] {
        &self.entries[..count.min(self.entries.len())]
    }

    /// 1-based rank of `player`, or `None` when they are not on the roster.
    pub fn rank_of(&self, player: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.name == player)
            .map(|index| index + 1)
    }

    /// Current score of `player`, if ranked.
    pub fn score_of(&self, player: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|entry| entry.name == player)
            .map(|entry| entry.score)
    }
}
