//! Where a playthrough stands and what the player chose along the way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::schema::event::EndReason;
use crate::schema::scenario::{Choice, Dialogue};

/// One taken choice. Kept for review and analytics; replaying it only
/// reproduces the run when the director was seeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub scene_id: Option<String>,
    pub dialogue: Option<Dialogue>,
    pub choice: Choice,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub current_scene_id: Option<String>,
    pub current_dialogue_index: usize,
    pub current_dialogue_id: Option<String>,
    pub ended: bool,
    pub end_reason: Option<EndReason>,
    history: Vec<HistoryEntry>,
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append-only record of choices.
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn record(&mut self, scene_id: Option<String>, dialogue: Option<Dialogue>, choice: Choice) {
        self.history.push(HistoryEntry {
            scene_id,
            dialogue,
            choice,
            timestamp: Utc::now(),
        });
    }

    /// Mark the playthrough finished. The first reason wins.
    pub fn end(&mut self, reason: EndReason) -> bool {
        if self.ended {
            return false;
        }
        self.ended = true;
        self.end_reason = Some(reason);
        true
    }
}
