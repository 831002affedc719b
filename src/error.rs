use thiserror::Error;

use crate::models::NoteId;

pub type Result<T, E = NoteError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum NoteError {
    #[error("note storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("note {0} not found")]
    NotFound(NoteId),

    #[error("invalid notes file: {0}")]
    Format(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl NoteError {
    pub(crate) fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }
}
