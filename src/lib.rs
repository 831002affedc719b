pub mod app;
pub mod cli;
pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod mirror;
pub mod models;
pub mod query;
pub mod scheduler;
pub mod store;

pub use app::Notebook;
pub use db::Database;
pub use error::{NoteError, Result};
pub use mirror::{FileHandle, FileMirror, LocalFile, SyncStatus};
pub use models::{Note, NoteId};
pub use query::{NoteFilter, TagMatch};
pub use scheduler::SyncScheduler;
pub use store::{NoteStore, StoreLocation};
