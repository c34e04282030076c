use std::time::SystemTime;

use uuid::Uuid;

/// One player's answer to one question of one room. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Room the answer belongs to (lookup key only).
    pub room_id: Uuid,
    /// Roster name of the player who answered.
    pub player: String,
    /// Question the answer targets.
    pub question_number: usize,
    /// Raw text supplied by the player.
    pub response: String,
    /// Whether `response` matched the expected answer exactly.
    pub correct: bool,
    /// When the ledger accepted the answer.
    pub submitted_at: SystemTime,
}
