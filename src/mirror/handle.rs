use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rfd::FileDialog;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, trace};

/// An external file the mirror reads from and writes to.
#[async_trait]
pub trait FileHandle: Send + Sync + fmt::Debug {
    /// Name shown to the user.
    fn name(&self) -> String;

    /// Location on the local filesystem, when there is one.
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Read the whole file as text.
    async fn read_text(&self) -> io::Result<String>;

    /// Replace the file's contents. Must not return before the data is
    /// flushed.
    async fn write_text(&self, contents: &str) -> io::Result<()>;
}

/// Lets the user choose an existing file or a new destination.
#[async_trait]
pub trait FilePicker: Send + Sync {
    async fn open(&self) -> io::Result<Option<Arc<dyn FileHandle>>>;

    async fn create(&self, suggested_name: &str) -> io::Result<Option<Arc<dyn FileHandle>>>;
}

/// A file on the local filesystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    path: PathBuf,
}

impl LocalFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".tmp.{}.{n}", std::process::id()));
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl FileHandle for LocalFile {
    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    async fn read_text(&self) -> io::Result<String> {
        fs::read_to_string(&self.path).await
    }

    async fn write_text(&self, contents: &str) -> io::Result<()> {
        let tmp = self.tmp_path();
        trace!(tmp = %tmp.display(), "writing notes to tmp file");

        let written = async {
            let mut file = fs::File::create(&tmp).await?;
            file.write_all(contents.as_bytes()).await?;
            file.sync_all().await
        }
        .await;

        let result = match written {
            Ok(()) => fs::rename(&tmp, &self.path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!(path = %self.path.display(), "failed to write notes file: {e}");
            if let Err(e) = fs::remove_file(&tmp).await {
                if e.kind() != io::ErrorKind::NotFound {
                    error!(tmp = %tmp.display(), "failed to remove tmp file: {e}");
                }
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Native file dialogs.
pub struct DialogPicker;

#[async_trait]
impl FilePicker for DialogPicker {
    async fn open(&self) -> io::Result<Option<Arc<dyn FileHandle>>> {
        let picked = tokio::task::spawn_blocking(|| {
            FileDialog::new()
                .add_filter("JSON files", &["json"])
                .set_title("Open notes file")
                .pick_file()
        })
        .await
        .map_err(io::Error::other)?;
        Ok(picked.map(|path| Arc::new(LocalFile::new(path)) as Arc<dyn FileHandle>))
    }

    async fn create(&self, suggested_name: &str) -> io::Result<Option<Arc<dyn FileHandle>>> {
        let suggested_name = suggested_name.to_string();
        let picked = tokio::task::spawn_blocking(move || {
            FileDialog::new()
                .add_filter("JSON files", &["json"])
                .set_title("Save notes to")
                .set_file_name(suggested_name)
                .save_file()
        })
        .await
        .map_err(io::Error::other)?;
        Ok(picked.map(|path| Arc::new(LocalFile::new(path)) as Arc<dyn FileHandle>))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_file_write_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        std::fs::write(&path, "a much longer previous body").unwrap();

        let file = LocalFile::new(&path);
        file.write_text("{}").await.unwrap();

        assert_eq!(file.read_text().await.unwrap(), "{}");
        assert_eq!(file.name(), "notes.json");
        assert_eq!(FileHandle::path(&file), Some(path.as_path()));
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[tokio::test]
    async fn test_local_file_missing_read_errors() {
        let dir = tempfile::tempdir().unwrap();
        let file = LocalFile::new(dir.path().join("absent.json"));
        let err = file.read_text().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_local_file_write_into_missing_dir_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let file = LocalFile::new(dir.path().join("missing").join("notes.json"));
        assert!(file.write_text("{}").await.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
