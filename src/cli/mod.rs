use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::warn;

pub mod display;
pub mod file;
pub mod notes;

pub use file::{run_attach, run_detach, run_export, run_load, run_status, run_sync, run_watch};
pub use notes::{run_add, run_delete, run_edit, run_list};

use crate::app::Notebook;
use crate::config::SyncConfig;
use crate::db::Database;
use crate::mirror::LocalFile;
use crate::store::{NoteStore, StoreLocation};

#[derive(Parser)]
#[command(name = "memocat")]
#[command(about = "Hashtag notes, mirrored to a JSON file")]
#[command(version)]
pub struct Cli {
    /// Database file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,
    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List notes, newest first
    List(ListArgs),
    /// Add a note; #words become tags
    Add(AddArgs),
    /// Replace a note's content (empty content deletes it)
    Edit(EditArgs),
    /// Delete a note
    Delete(DeleteArgs),
    /// Attach a JSON file that mirrors every change
    Attach(AttachArgs),
    /// Stop mirroring to the attached file
    Detach,
    /// Write all notes to the attached file now
    Sync,
    /// Load notes from a file and keep it attached
    Load(LoadArgs),
    /// Download all notes to a JSON file
    Export(ExportArgs),
    /// Keep syncing to the attached file until Ctrl-C
    Watch,
    /// Show the attached file and sync state
    Status,
}

#[derive(Args, Default)]
pub struct ListArgs {
    /// Only notes carrying this tag (without the #)
    #[arg(short, long)]
    pub tag: Option<String>,
    /// Case-insensitive text in content or tags
    #[arg(short, long)]
    pub search: Option<String>,
    /// Let --tag also match nested tags like work/meetings
    #[arg(long)]
    pub hierarchical: bool,
}

#[derive(Args)]
pub struct AddArgs {
    #[arg(required = true, num_args = 1..)]
    pub content: Vec<String>,
}

#[derive(Args)]
pub struct EditArgs {
    pub id: i64,
    pub content: Vec<String>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub id: i64,
}

#[derive(Args)]
pub struct AttachArgs {
    /// File to attach; opens a file dialog when omitted
    pub path: Option<PathBuf>,
    /// Pull in the file's notes before writing back (implied when the file
    /// already holds notes)
    #[arg(short, long)]
    pub merge: bool,
}

#[derive(Args)]
pub struct LoadArgs {
    pub path: PathBuf,
    /// Keep existing notes and add the file's new ones
    #[arg(short, long)]
    pub merge: bool,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Destination (defaults to memocat-notes-<date>.json)
    pub path: Option<PathBuf>,
}

/// Open the notebook and run one command.
pub async fn run(cli: Cli) -> Result<()> {
    let path = match cli.db {
        Some(path) => path,
        None => Database::default_path().context("no config directory for the notes database")?,
    };
    let store = Arc::new(NoteStore::new(StoreLocation::Path(path.clone())));
    store
        .ready()
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;

    let mut config = SyncConfig::load(&store).await?;
    let notebook = Notebook::with_config(store, &config);
    if let Some(sync_file) = &config.sync_file {
        notebook.attach_file(Arc::new(LocalFile::new(sync_file)));
    }

    let color = !cli.no_color;
    match cli.command {
        None => run_list(&notebook, ListArgs::default(), color).await?,
        Some(Commands::List(args)) => run_list(&notebook, args, color).await?,
        Some(Commands::Add(args)) => run_add(&notebook, &args.content.join(" ")).await?,
        Some(Commands::Edit(args)) => {
            run_edit(&notebook, args.id, &args.content.join(" ")).await?
        }
        Some(Commands::Delete(args)) => run_delete(&notebook, args.id).await?,
        Some(Commands::Attach(args)) => {
            run_attach(&notebook, &mut config, args.path, args.merge).await?
        }
        Some(Commands::Detach) => run_detach(&notebook, &mut config).await?,
        Some(Commands::Sync) => run_sync(&notebook).await?,
        Some(Commands::Load(args)) => {
            run_load(&notebook, &mut config, args.path, args.merge).await?
        }
        Some(Commands::Export(args)) => run_export(&notebook, args.path).await?,
        Some(Commands::Watch) => run_watch(&notebook).await?,
        Some(Commands::Status) => run_status(&notebook).await?,
    }

    if notebook.is_auto_syncing() {
        warn!("auto sync still running at exit");
        notebook.stop_auto_sync().await;
    }
    Ok(())
}
