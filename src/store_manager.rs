use tracing::{debug, warn};

use crate::secret_store::{SecretStore, StorageError};
use crate::storage::HistoryEntry;

/// Maximum number of entries kept in the persisted history.
pub const HISTORY_LIMIT: usize = 100;

/// Key under which the JSON history blob is stored.
pub const HISTORY_KEY: &str = "command_history";

/// Bounded, most-recent-first log of dispatch records.
///
/// `append` is a read-modify-write of a single blob. Within one process the
/// dispatcher serializes writers; writers in other processes sharing the same
/// store race and the last write wins.
pub struct HistoryStore<'a> {
    store: &'a dyn SecretStore,
}

impl<'a> HistoryStore<'a> {
    pub fn new(store: &'a dyn SecretStore) -> Self {
        Self { store }
    }

    /// Returns the persisted log, newest first.
    ///
    /// Fails open: a missing or unreadable blob, or one that is not a JSON
    /// array, reads as empty so a corrupt history never blocks a dispatch.
    /// Array elements that are not valid entries are skipped; the rest are kept.
    pub fn read(&self) -> Vec<HistoryEntry> {
        let raw = match self.store.get(HISTORY_KEY) {
            Ok(Some(raw)) if !raw.trim().is_empty() => raw,
            Ok(_) => return Vec::new(),
            Err(e) => {
                warn!(error = %e, "history unreadable, treating as empty");
                return Vec::new();
            }
        };

        let elements = match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
            Ok(elements) => elements,
            Err(e) => {
                warn!(error = %e, "malformed history blob, treating as empty");
                return Vec::new();
            }
        };

        let total = elements.len();
        let entries: Vec<HistoryEntry> = elements
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();
        if entries.len() < total {
            warn!(skipped = total - entries.len(), "dropped malformed history entries");
        }
        entries
    }

    /// Prepends `entry` and truncates to `HISTORY_LIMIT`.
    pub fn append(&self, entry: HistoryEntry) -> Result<(), StorageError> {
        let current = self.read();
        let mut next = Vec::with_capacity((current.len() + 1).min(HISTORY_LIMIT));
        next.push(entry);
        next.extend(current);
        next.truncate(HISTORY_LIMIT);

        let blob = serde_json::to_string(&next)?;
        self.store.set(HISTORY_KEY, &blob)?;
        debug!(entries = next.len(), "history written");
        Ok(())
    }

    /// Deletes all history. Clearing an empty history succeeds.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.delete(HISTORY_KEY)
    }
}
