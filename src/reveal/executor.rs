use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;

use crate::{domain::id::TrackId, storage::error::StorageError};

/// What the reveal executor needs from the store.
pub trait VisibilityStore {
    /// ids of all records still hidden
    fn hidden_track_ids(&mut self) -> Result<Vec<TrackId>, StorageError>;

    /// Flips every hidden record to visible in one conditional update and
    /// returns the ids it flipped. Must not partially apply on error.
    fn reveal_hidden(&mut self, now: DateTime<Utc>) -> Result<Vec<TrackId>, StorageError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealOutcome {
    pub revealed_count: u64,
    #[serde(skip)]
    pub revealed_ids: Vec<TrackId>,
    pub timestamp: DateTime<Utc>,
}

impl RevealOutcome {
    fn nothing(timestamp: DateTime<Utc>) -> Self {
        Self {
            revealed_count: 0,
            revealed_ids: Vec::new(),
            timestamp,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.revealed_count == 0
    }
}

/// Makes every hidden track visible.
///
/// Safe to call speculatively: with nothing hidden it reports zero and writes
/// nothing, so a second call right after a successful one is a no-op. Whether
/// to announce the outcome is up to the caller.
pub fn reveal<S: VisibilityStore + ?Sized>(
    store: &mut S,
    now: DateTime<Utc>,
) -> Result<RevealOutcome, StorageError> {
    let pending = store.hidden_track_ids()?;
    if pending.is_empty() {
        return Ok(RevealOutcome::nothing(now));
    }

    // the update re-evaluates the predicate, so a concurrent trigger that got
    // there first leaves us with fewer (possibly zero) flipped ids
    let revealed_ids = store.reveal_hidden(now)?;
    if revealed_ids.len() != pending.len() {
        info!(
            "{} tracks were pending but {} were revealed by this call",
            pending.len(),
            revealed_ids.len()
        );
    }

    Ok(RevealOutcome {
        revealed_count: revealed_ids.len() as u64,
        revealed_ids,
        timestamp: now,
    })
}
