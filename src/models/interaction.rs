use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::BookId;

pub type PatronId = i64;

/// Library patron.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patron {
    pub patron_id: PatronId,
    #[serde(default)]
    pub name: Option<String>,
}

/// Where an interaction record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Read,
    Borrow,
}

/// One reading or borrowing event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub book_id: BookId,
    pub kind: InteractionKind,
    pub occurred_at: DateTime<Utc>,
}

/// Interaction row tagged with its patron, as loaded from snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatronInteraction {
    pub patron_id: PatronId,
    pub book_id: BookId,
    pub kind: InteractionKind,
    pub occurred_at: DateTime<Utc>,
}

impl PatronInteraction {
    pub fn into_interaction(self) -> (PatronId, Interaction) {
        (
            self.patron_id,
            Interaction {
                book_id: self.book_id,
                kind: self.kind,
                occurred_at: self.occurred_at,
            },
        )
    }
}

/// A patron's interactions, newest first.
#[derive(Debug, Clone, Default)]
pub struct InteractionHistory {
    pub patron_id: PatronId,
    entries: Vec<Interaction>,
}

impl InteractionHistory {
    pub fn new(patron_id: PatronId, mut entries: Vec<Interaction>) -> Self {
        entries.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| a.book_id.cmp(&b.book_id))
        });
        Self { patron_id, entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> &[Interaction] {
        &self.entries
    }

    /// The `window` most recent entries.
    pub fn recent(&self, window: usize) -> &[Interaction] {
        &self.entries[..window.min(self.entries.len())]
    }

    /// Every item the patron ever read or borrowed.
    pub fn exclusion_set(&self) -> HashSet<BookId> {
        self.entries.iter().map(|e| e.book_id).collect()
    }
}
