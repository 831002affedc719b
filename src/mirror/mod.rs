//! Keeps the note store mirrored to an optional external JSON file.

mod handle;
#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::io;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

pub use handle::{DialogPicker, FileHandle, FilePicker, LocalFile};

use crate::codec::{self, Strictness};
use crate::error::{NoteError, Result};
use crate::store::NoteStore;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Done,
    Failed(String),
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Done => "done",
            Self::Failed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Attachment {
    pub attached: bool,
    pub name: Option<String>,
}

/// What a merge import did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeReport {
    /// Notes read from the file.
    pub found: usize,
    /// Notes whose id was new to the store.
    pub added: usize,
    /// Notes ignored because the store already had their id.
    pub skipped: usize,
}

/// Run `fut`, but do not complete before `min` has elapsed.
pub async fn with_min_duration<F: Future>(min: Duration, fut: F) -> F::Output {
    let (output, ()) = tokio::join!(fut, tokio::time::sleep(min));
    output
}

pub struct FileMirror {
    store: Arc<NoteStore>,
    handle: RwLock<Option<Arc<dyn FileHandle>>>,
    status: watch::Sender<SyncStatus>,
    min_write_duration: Duration,
}

impl FileMirror {
    pub fn new(store: Arc<NoteStore>, min_write_duration: Duration) -> Self {
        let (status, _) = watch::channel(SyncStatus::Idle);
        Self {
            store,
            handle: RwLock::new(None),
            status,
            min_write_duration,
        }
    }

    pub fn store(&self) -> &Arc<NoteStore> {
        &self.store
    }

    /// Point the mirror at `handle`. Nothing is read or written.
    pub fn attach(&self, handle: Arc<dyn FileHandle>) {
        info!(file = %handle.name(), "attached notes file");
        let previous = self
            .handle
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            debug!(file = %previous.name(), "replaced previously attached file");
        }
        self.status.send_replace(SyncStatus::Idle);
    }

    pub fn detach(&self) -> Option<Arc<dyn FileHandle>> {
        let previous = self
            .handle
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match &previous {
            Some(handle) => info!(file = %handle.name(), "detached notes file"),
            None => debug!("detach requested with no file attached"),
        }
        self.status.send_replace(SyncStatus::Idle);
        previous
    }

    pub fn handle(&self) -> Option<Arc<dyn FileHandle>> {
        self.handle
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_attached(&self) -> bool {
        self.handle().is_some()
    }

    pub fn attachment(&self) -> Attachment {
        let name = self.handle().map(|h| h.name());
        Attachment {
            attached: name.is_some(),
            name,
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    fn attached_or_err(&self) -> Result<Arc<dyn FileHandle>> {
        self.handle().ok_or_else(|| {
            NoteError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no notes file attached",
            ))
        })
    }

    /// Replace the whole store with the attached file's notes.
    ///
    /// The store is only touched after the file was read and every record
    /// validated.
    pub async fn import_replace(&self) -> Result<usize> {
        let handle = self.attached_or_err()?;
        let text = handle.read_text().await?;
        let notes = codec::decode_payload(&text, Strictness::Strict)?;
        let count = self.store.replace_all(notes).await?;
        info!(file = %handle.name(), count, "replaced notes from file");
        Ok(count)
    }

    /// Add the attached file's notes whose ids the store lacks, then write
    /// the merged store back so the file catches up.
    ///
    /// An unreadable or malformed file counts as empty.
    pub async fn import_merge(&self) -> Result<MergeReport> {
        let Some(handle) = self.handle() else {
            warn!("merge requested with no file attached");
            return Ok(MergeReport::default());
        };

        let incoming = match handle.read_text().await {
            Ok(text) => codec::decode_payload(&text, Strictness::Lenient).unwrap_or_else(|e| {
                warn!(file = %handle.name(), "treating notes file as empty: {e}");
                Vec::new()
            }),
            Err(e) => {
                warn!(file = %handle.name(), "cannot read notes file, treating as empty: {e}");
                Vec::new()
            }
        };

        let known = self.store.ids().await?;
        let found = incoming.len();
        let novel: Vec<_> = incoming
            .into_iter()
            .filter(|note| note.id.map_or(true, |id| !known.contains(&id)))
            .collect();
        let added = self.store.bulk_add(novel).await?;
        let report = MergeReport {
            found,
            added,
            skipped: found - added,
        };
        info!(
            file = %handle.name(),
            found = report.found,
            added = report.added,
            skipped = report.skipped,
            "merged notes from file"
        );

        self.export().await?;
        Ok(report)
    }

    /// Write the full store to the attached file. Without a file this only
    /// logs a warning.
    pub async fn export(&self) -> Result<()> {
        let Some(handle) = self.handle() else {
            warn!("no notes file attached, skipping export");
            return Ok(());
        };

        self.status.send_replace(SyncStatus::Syncing);
        let result = with_min_duration(self.min_write_duration, self.write_snapshot(&handle)).await;
        match &result {
            Ok(count) => {
                debug!(file = %handle.name(), count, "notes exported");
                self.status.send_replace(SyncStatus::Done);
            }
            Err(e) => {
                warn!(file = %handle.name(), "notes export failed: {e}");
                self.status.send_replace(SyncStatus::Failed(e.to_string()));
            }
        }
        result.map(|_| ())
    }

    async fn write_snapshot(&self, handle: &Arc<dyn FileHandle>) -> Result<usize> {
        let notes = self.store.get_all().await?;
        let payload = codec::encode_export(&notes)?;
        handle.write_text(&payload).await?;
        Ok(notes.len())
    }

    /// One-off download of every note to `handle` as a bare array,
    /// independent of the attached file.
    pub async fn export_to(&self, handle: &dyn FileHandle) -> Result<usize> {
        let notes = self.store.get_all().await?;
        let payload = codec::encode_download(&notes)?;
        handle.write_text(&payload).await?;
        info!(file = %handle.name(), count = notes.len(), "notes downloaded");
        Ok(notes.len())
    }
}

/// File name suggested for a download made on `date`.
pub fn download_file_name(date: chrono::NaiveDate) -> String {
    format!("memocat-notes-{}.json", date.format("%Y-%m-%d"))
}
