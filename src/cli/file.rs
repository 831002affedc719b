//! Commands around the attached notes file.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use tracing::{info, warn};

use super::display::print_status;
use crate::app::Notebook;
use crate::codec::{self, Strictness};
use crate::config::SyncConfig;
use crate::mirror::{download_file_name, DialogPicker, FileHandle, FilePicker, LocalFile};

const NEW_FILE_NAME: &str = "memocat-notes.json";

pub async fn run_attach(
    notebook: &Notebook,
    config: &mut SyncConfig,
    path: Option<PathBuf>,
    merge: bool,
) -> Result<()> {
    let handle: Arc<dyn FileHandle> = match path {
        Some(path) => Arc::new(LocalFile::new(path)),
        None => {
            let picked = if merge {
                DialogPicker.open().await?
            } else {
                DialogPicker.create(NEW_FILE_NAME).await?
            };
            match picked {
                Some(handle) => handle,
                None => {
                    println!("No file chosen.");
                    return Ok(());
                }
            }
        }
    };

    let name = handle.name();
    let merge = merge || holds_notes(&*handle).await?;
    if merge {
        let report = notebook.load_merge(handle.clone()).await?;
        println!(
            "Attached {name}: {} notes in file, {} added, {} already present.",
            report.found, report.added, report.skipped
        );
    } else {
        notebook.attach_file(handle.clone());
        notebook
            .manual_sync()
            .await
            .with_context(|| format!("failed to write {name}"))?;
        println!("Attached {name}.");
    }
    remember(notebook, config, &*handle).await
}

pub async fn run_detach(notebook: &Notebook, config: &mut SyncConfig) -> Result<()> {
    let attachment = notebook.attachment();
    notebook.detach_file();
    config.sync_file = None;
    config.save(notebook.store()).await?;
    match attachment.name {
        Some(name) => println!("Detached {name}."),
        None => println!("No file attached."),
    }
    Ok(())
}

pub async fn run_sync(notebook: &Notebook) -> Result<()> {
    let Some(name) = notebook.attachment().name else {
        bail!("no file attached; use `memocat attach` first");
    };
    notebook
        .manual_sync()
        .await
        .with_context(|| format!("failed to write {name}"))?;
    println!("Synced to {name}.");
    Ok(())
}

pub async fn run_load(
    notebook: &Notebook,
    config: &mut SyncConfig,
    path: PathBuf,
    merge: bool,
) -> Result<()> {
    let handle = Arc::new(LocalFile::new(&path));
    let name = handle.name();
    if merge {
        let report = notebook.load_merge(handle.clone()).await?;
        println!(
            "Merged {name}: {} added, {} already present.",
            report.added, report.skipped
        );
    } else {
        let count = notebook
            .load_replace(handle.clone())
            .await
            .with_context(|| format!("failed to load {}", path.display()))?;
        println!("Loaded {count} notes from {name}.");
    }
    remember(notebook, config, &*handle).await
}

pub async fn run_export(notebook: &Notebook, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(|| PathBuf::from(download_file_name(Local::now().date_naive())));
    let file = LocalFile::new(&path);
    let count = notebook
        .export_download(&file)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    println!("Exported {count} notes to {}.", path.display());
    Ok(())
}

pub async fn run_watch(notebook: &Notebook) -> Result<()> {
    let Some(name) = notebook.attachment().name else {
        bail!("no file attached; use `memocat attach` first");
    };
    notebook.start_auto_sync();
    println!("Syncing to {name}. Press Ctrl-C to stop.");

    let mut status = notebook.subscribe_status();
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                info!(status = status.borrow_and_update().as_str(), "sync status");
            }
        }
    }

    notebook.stop_auto_sync().await;
    if let Err(e) = notebook.manual_sync().await {
        warn!("final sync failed: {e}");
    }
    println!("Stopped.");
    Ok(())
}

pub async fn run_status(notebook: &Notebook) -> Result<()> {
    let count = notebook.store().count().await?;
    print_status(&notebook.attachment(), &notebook.status(), count);
    Ok(())
}

/// Whether attaching must merge so the file's notes survive. A missing or
/// blank file can simply be written; content that is not a notes document
/// is refused rather than overwritten.
async fn holds_notes(handle: &dyn FileHandle) -> Result<bool> {
    let text = match handle.read_text().await {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", handle.name())),
    };
    if text.trim().is_empty() {
        return Ok(false);
    }
    if let Err(e) = codec::decode_payload(&text, Strictness::Lenient) {
        bail!(
            "{} is not a notes file ({e}); refusing to overwrite it",
            handle.name()
        );
    }
    Ok(true)
}

/// Persist the handle's path so the next run re-attaches it.
async fn remember(notebook: &Notebook, config: &mut SyncConfig, handle: &dyn FileHandle) -> Result<()> {
    let Some(path) = handle.path() else {
        return Ok(());
    };
    let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    config.sync_file = Some(path);
    config.save(notebook.store()).await?;
    Ok(())
}
