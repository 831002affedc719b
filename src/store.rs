//! The record store: the canonical note collection.
//!
//! A [`NoteStore`] is created once at startup and shared by `Arc`. The
//! underlying database is opened lazily on first use; [`NoteStore::ready`]
//! is the explicit initialization barrier. Racing callers all wait for, and
//! then share, the single opened database. SQLite work runs on the blocking
//! pool so it never stalls the async workers.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::db::Database;
use crate::error::{NoteError, Result};
use crate::models::{
    extract_tags, now_millis, EditOutcome, ImportedNote, NewNote, Note, NoteId, NotePatch,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Path(PathBuf),
    Memory,
}

pub struct NoteStore {
    location: StoreLocation,
    db: OnceCell<Arc<Mutex<Database>>>,
    #[cfg(test)]
    opens: AtomicUsize,
}

impl NoteStore {
    pub fn new(location: StoreLocation) -> Self {
        Self {
            location,
            db: OnceCell::new(),
            #[cfg(test)]
            opens: AtomicUsize::new(0),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(StoreLocation::Memory)
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Wait until the database is open and migrated.
    pub async fn ready(&self) -> Result<()> {
        self.shared().await.map(|_| ())
    }

    async fn shared(&self) -> Result<Arc<Mutex<Database>>> {
        let db = self
            .db
            .get_or_try_init(|| async {
                #[cfg(test)]
                self.opens.fetch_add(1, Ordering::SeqCst);
                let location = self.location.clone();
                let db = run_blocking(move || match location {
                    StoreLocation::Memory => Database::open_memory(),
                    StoreLocation::Path(path) => Database::open_at(&path),
                })
                .await?;
                info!(location = ?self.location, "note store ready");
                Ok::<_, NoteError>(Arc::new(Mutex::new(db)))
            })
            .await?;
        Ok(db.clone())
    }

    /// Run `f` against the database on the blocking pool.
    async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
    {
        let db = self.shared().await?;
        run_blocking(move || {
            let db = db.lock().unwrap_or_else(PoisonError::into_inner);
            f(&db)
        })
        .await
    }

    pub async fn add(&self, note: NewNote) -> Result<NoteId> {
        let note = NewNote {
            tags: extract_tags(&note.content),
            updated_at: note.updated_at.max(note.created_at),
            ..note
        };
        let tags = note.tags.clone();
        let id = self.with_db(move |db| db.insert_note(&note)).await?;
        debug!(id, ?tags, "note added");
        Ok(id)
    }

    pub async fn update(&self, id: NoteId, patch: NotePatch) -> Result<()> {
        let now = now_millis();
        self.with_db(move |db| db.update_note(id, &patch, now)).await?;
        debug!(id, "note updated");
        Ok(())
    }

    /// Save an edit; content that is blank after trimming deletes the note.
    pub async fn save_edit(&self, id: NoteId, content: &str) -> Result<EditOutcome> {
        if content.trim().is_empty() {
            self.delete(id).await?;
            return Ok(EditOutcome::Deleted);
        }
        self.update(id, NotePatch::content(content)).await?;
        Ok(EditOutcome::Updated)
    }

    /// Remove a note. Deleting a missing note is not an error.
    pub async fn delete(&self, id: NoteId) -> Result<()> {
        if self.with_db(move |db| db.delete_note(id)).await? {
            debug!(id, "note deleted");
        } else {
            debug!(id, "note already absent, nothing to delete");
        }
        Ok(())
    }

    pub async fn get(&self, id: NoteId) -> Result<Option<Note>> {
        self.with_db(move |db| db.get_note(id)).await
    }

    /// All notes, newest first.
    pub async fn get_all(&self) -> Result<Vec<Note>> {
        self.with_db(|db| db.list_notes()).await
    }

    pub async fn get_by_tag(&self, tag: &str) -> Result<Vec<Note>> {
        let tag = tag.to_string();
        self.with_db(move |db| db.list_notes_by_tag(&tag)).await
    }

    pub async fn clear(&self) -> Result<()> {
        let removed = self.with_db(|db| db.clear_notes()).await?;
        info!(removed, "note store cleared");
        Ok(())
    }

    /// Insert notes, skipping any whose id is already present. Notes
    /// without an id are always added under a fresh one.
    pub async fn bulk_add<N>(&self, notes: Vec<N>) -> Result<usize>
    where
        N: Into<ImportedNote>,
    {
        let notes: Vec<ImportedNote> = notes.into_iter().map(|n| normalize(n.into())).collect();
        let total = notes.len();
        let inserted = self.with_db(move |db| db.insert_imported(&notes)).await?;
        if inserted < total {
            debug!(skipped = total - inserted, "skipped notes with existing ids");
        }
        Ok(inserted)
    }

    /// Clear the store and insert `notes` in a single transaction.
    pub async fn replace_all<N>(&self, notes: Vec<N>) -> Result<usize>
    where
        N: Into<ImportedNote>,
    {
        let notes: Vec<ImportedNote> = notes.into_iter().map(|n| normalize(n.into())).collect();
        let inserted = self.with_db(move |db| db.replace_notes(&notes)).await?;
        info!(inserted, "note store replaced");
        Ok(inserted)
    }

    pub async fn ids(&self) -> Result<HashSet<NoteId>> {
        self.with_db(|db| db.note_ids()).await
    }

    pub async fn count(&self) -> Result<usize> {
        self.with_db(|db| db.count_notes()).await
    }

    pub async fn setting(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        self.with_db(move |db| db.get_setting(&key)).await
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let (key, value) = (key.to_string(), value.to_string());
        self.with_db(move |db| db.set_setting(&key, &value)).await
    }

    pub async fn remove_setting(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_db(move |db| db.delete_setting(&key).map(|_| ()))
            .await
    }

    #[cfg(test)]
    fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| NoteError::Io(io::Error::other(e)))?
}

/// Re-derive tags from content and keep `updated_at >= created_at`.
fn normalize(note: ImportedNote) -> ImportedNote {
    ImportedNote {
        tags: extract_tags(&note.content),
        updated_at: note.updated_at.max(note.created_at),
        ..note
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration};
    use std::sync::Arc;

    fn note(id: NoteId, content: &str) -> Note {
        let at = DateTime::from_timestamp_millis(1_700_000_000_000 + id).unwrap();
        Note {
            id,
            content: content.to_string(),
            tags: extract_tags(content),
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_concurrent_ready_opens_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(NoteStore::new(StoreLocation::Path(
            dir.path().join("notes.db"),
        )));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move { store.ready().await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.open_count(), 1);
    }

    #[tokio::test]
    async fn test_database_work_runs_on_blocking_pool() {
        let store = NoteStore::in_memory();
        let caller = std::thread::current().id();
        let worker = store
            .with_db(|_| Ok(std::thread::current().id()))
            .await
            .unwrap();
        assert_ne!(worker, caller);
    }

    #[tokio::test]
    async fn test_add_then_edit_end_to_end() {
        let store = NoteStore::in_memory();

        let id = store.add(NewNote::new("Buy milk #todo")).await.unwrap();
        let all = store.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].tags, vec!["todo"]);
        assert_eq!(all[0].created_at, all[0].updated_at);

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let outcome = store
            .save_edit(id, "Buy milk and eggs #todo #errand")
            .await
            .unwrap();
        assert_eq!(outcome, EditOutcome::Updated);

        let edited = store.get(id).await.unwrap().unwrap();
        assert_eq!(edited.tags, vec!["todo", "errand"]);
        assert!(edited.updated_at > edited.created_at);
    }

    #[tokio::test]
    async fn test_add_rederives_tags() {
        let store = NoteStore::in_memory();
        let mut new = NewNote::new("see #real");
        new.tags = vec!["bogus".to_string()];

        let id = store.add(new).await.unwrap();
        assert_eq!(store.get(id).await.unwrap().unwrap().tags, vec!["real"]);
    }

    #[tokio::test]
    async fn test_blank_edit_deletes() {
        let store = NoteStore::in_memory();
        let id = store.add(NewNote::new("temporary")).await.unwrap();

        let outcome = store.save_edit(id, "  \n\t ").await.unwrap();
        assert_eq!(outcome, EditOutcome::Deleted);
        assert!(store.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = NoteStore::in_memory();
        let err = store
            .update(99, NotePatch::content("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, NoteError::NotFound(99)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = NoteStore::in_memory();
        let keep = store.add(NewNote::new("keep")).await.unwrap();
        let gone = store.add(NewNote::new("gone")).await.unwrap();

        store.delete(gone).await.unwrap();
        let after_first = store.get_all().await.unwrap();
        store.delete(gone).await.unwrap();
        let after_second = store.get_all().await.unwrap();

        assert_eq!(after_first, after_second);
        assert_eq!(after_second.len(), 1);
        assert_eq!(after_second[0].id, keep);
    }

    #[tokio::test]
    async fn test_get_by_tag_exact() {
        let store = NoteStore::in_memory();
        store.add(NewNote::new("plan #project")).await.unwrap();

        assert_eq!(store.get_by_tag("project").await.unwrap().len(), 1);
        assert!(store.get_by_tag("proj").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_add_skips_existing_and_normalizes() {
        let store = NoteStore::in_memory();
        store.bulk_add(vec![note(1, "A")]).await.unwrap();

        let mut skewed = note(2, "C #c");
        skewed.tags = Vec::new();
        skewed.updated_at = skewed.created_at - Duration::seconds(1);

        let inserted = store
            .bulk_add(vec![note(1, "B"), skewed.clone()])
            .await
            .unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(store.get(1).await.unwrap().unwrap().content, "A");

        let stored = store.get(2).await.unwrap().unwrap();
        assert_eq!(stored.tags, vec!["c"]);
        assert_eq!(stored.updated_at, skewed.created_at);
        assert_eq!(store.ids().await.unwrap(), HashSet::from([1, 2]));
    }

    #[tokio::test]
    async fn test_replace_all_assigns_ids_to_records_without_one() {
        let store = NoteStore::in_memory();
        store.bulk_add(vec![note(1, "old")]).await.unwrap();

        let fresh = ImportedNote {
            id: None,
            ..note(0, "from elsewhere #x").into()
        };
        let kept: ImportedNote = note(9, "kept").into();
        assert_eq!(store.replace_all(vec![fresh, kept]).await.unwrap(), 2);

        assert!(store.get(1).await.unwrap().is_none());
        assert_eq!(store.get(9).await.unwrap().unwrap().content, "kept");
        let tagged = store.get_by_tag("x").await.unwrap();
        assert_eq!(tagged.len(), 1);
        assert_ne!(tagged[0].id, 9);
    }

    #[tokio::test]
    async fn test_clear_and_count() {
        let store = NoteStore::in_memory();
        store.bulk_add(vec![note(1, "A"), note(2, "B")]).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
