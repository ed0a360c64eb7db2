//! Session identity and turn accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One agent session. Lives as long as the agent; nothing is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    turn_count: u32,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            turn_count: 0,
        }
    }

    /// Record one model call. Returns the new total.
    pub fn increment_turn(&mut self) -> u32 {
        self.turn_count += 1;
        self.updated_at = Utc::now();
        self.turn_count
    }

    /// Model calls made over the whole session, across runs.
    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
