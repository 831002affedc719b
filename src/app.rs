//! The operations a front end drives: note edits, file attachment, loads,
//! exports and the auto-sync lifecycle.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::mirror::{Attachment, FileHandle, FileMirror, MergeReport, SyncStatus};
use crate::models::{EditOutcome, NewNote, Note, NoteId};
use crate::query::{NoteFilter, TagMatch};
use crate::scheduler::SyncScheduler;
use crate::store::NoteStore;

pub struct Notebook {
    store: Arc<NoteStore>,
    mirror: Arc<FileMirror>,
    scheduler: SyncScheduler,
    tag_match: TagMatch,
}

impl Notebook {
    /// Wait for the store, then build the notebook from its saved settings.
    pub async fn open(store: Arc<NoteStore>) -> Result<Self> {
        store.ready().await?;
        let config = SyncConfig::load(&store).await?;
        Ok(Self::with_config(store, &config))
    }

    pub fn with_config(store: Arc<NoteStore>, config: &SyncConfig) -> Self {
        let mirror = Arc::new(FileMirror::new(store.clone(), config.min_write_duration));
        let scheduler = SyncScheduler::new(mirror.clone(), config.interval);
        Self {
            store,
            mirror,
            scheduler,
            tag_match: config.tag_match,
        }
    }

    pub fn store(&self) -> &Arc<NoteStore> {
        &self.store
    }

    pub fn mirror(&self) -> &Arc<FileMirror> {
        &self.mirror
    }

    /// A filter using the notebook's configured tag matching.
    pub fn filter(&self) -> NoteFilter {
        NoteFilter::default().with_tag_match(self.tag_match)
    }

    // ==================== NOTES ====================

    /// Add a note. Blank content is ignored and yields `None`.
    pub async fn add_note(&self, content: &str) -> Result<Option<NoteId>> {
        if content.trim().is_empty() {
            return Ok(None);
        }
        let id = self.store.add(NewNote::new(content)).await?;
        self.sync_after_change().await;
        Ok(Some(id))
    }

    /// Save edited content; blank content deletes the note.
    pub async fn edit_note(&self, id: NoteId, content: &str) -> Result<EditOutcome> {
        let outcome = self.store.save_edit(id, content).await?;
        self.sync_after_change().await;
        Ok(outcome)
    }

    pub async fn delete_note(&self, id: NoteId) -> Result<()> {
        self.store.delete(id).await?;
        self.sync_after_change().await;
        Ok(())
    }

    /// Notes matching `filter`, newest first.
    pub async fn notes(&self, filter: &NoteFilter) -> Result<Vec<Note>> {
        let notes = match (&filter.tag, filter.tag_match) {
            (Some(tag), TagMatch::Exact) => self.store.get_by_tag(tag).await?,
            _ => self.store.get_all().await?,
        };
        Ok(notes.into_iter().filter(|n| filter.matches(n)).collect())
    }

    // ==================== FILE ====================

    pub fn attach_file(&self, handle: Arc<dyn FileHandle>) {
        self.mirror.attach(handle);
    }

    pub fn detach_file(&self) {
        self.mirror.detach();
    }

    pub fn attachment(&self) -> Attachment {
        self.mirror.attachment()
    }

    pub fn status(&self) -> SyncStatus {
        self.mirror.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.mirror.subscribe()
    }

    /// Export now, reporting any failure to the caller.
    pub async fn manual_sync(&self) -> Result<()> {
        self.mirror.export().await
    }

    /// Start fresh from `handle`: replace every note with the file's notes
    /// and keep the file attached. On failure the store and the previous
    /// attachment are left as they were.
    pub async fn load_replace(&self, handle: Arc<dyn FileHandle>) -> Result<usize> {
        let previous = self.mirror.handle();
        self.mirror.attach(handle);
        match self.mirror.import_replace().await {
            Ok(count) => Ok(count),
            Err(e) => {
                match previous {
                    Some(previous) => self.mirror.attach(previous),
                    None => {
                        self.mirror.detach();
                    }
                }
                Err(e)
            }
        }
    }

    /// Attach `handle` during a session: pull in its new notes and write the
    /// merged result back.
    pub async fn load_merge(&self, handle: Arc<dyn FileHandle>) -> Result<MergeReport> {
        self.mirror.attach(handle);
        self.mirror.import_merge().await
    }

    /// Download every note to `handle`, leaving the attachment alone.
    pub async fn export_download(&self, handle: &dyn FileHandle) -> Result<usize> {
        self.mirror.export_to(handle).await
    }

    // ==================== AUTO SYNC ====================

    pub fn start_auto_sync(&self) -> bool {
        self.scheduler.start()
    }

    pub async fn stop_auto_sync(&self) {
        self.scheduler.stop().await
    }

    pub fn is_auto_syncing(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Best-effort export after a mutation. The mutation already succeeded,
    /// so a failed write only shows up in the status and the log.
    async fn sync_after_change(&self) {
        if !self.mirror.is_attached() {
            return;
        }
        if let Err(e) = self.mirror.export().await {
            warn!("sync after change failed: {e}");
        } else {
            info!("synced after change");
        }
    }
}
