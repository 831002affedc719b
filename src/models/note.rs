use std::sync::LazyLock;

use chrono::{DateTime, SubsecRound, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub type NoteId = i64;

/// A stored note. `tags` always mirrors the `#tokens` found in `content`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// True once the note has been edited after creation.
    pub fn is_edited(&self) -> bool {
        self.updated_at > self.created_at
    }
}

/// A note that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewNote {
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        let now = now_millis();
        Self {
            tags: extract_tags(&content),
            content,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A note read from a file. Records without an id get a fresh one when
/// stored; given ids are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedNote {
    pub id: Option<NoteId>,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ImportedNote {
    /// The stored form, available only when the record carried its own id.
    pub fn into_note(self) -> Option<Note> {
        Some(Note {
            id: self.id?,
            content: self.content,
            tags: self.tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl From<Note> for ImportedNote {
    fn from(note: Note) -> Self {
        Self {
            id: Some(note.id),
            content: note.content,
            tags: note.tags,
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

/// Fields an edit may change. Tags and timestamps are always derived.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub content: Option<String>,
}

impl NotePatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
        }
    }
}

/// What `save_edit` ended up doing with the note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    Updated,
    Deleted,
}

/// Current time truncated to milliseconds, the precision of the export format.
pub fn now_millis() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([^\s#]+)").expect("tag pattern is valid"));

/// Extract `#tags` from content, in order of appearance, duplicates kept.
pub fn extract_tags(content: &str) -> Vec<String> {
    TAG_RE
        .captures_iter(content)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// A piece of note content, for rendering tags differently from plain text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Tag(&'a str),
}

/// Split content into alternating text and tag segments.
pub fn segments(content: &str) -> Vec<Segment<'_>> {
    let mut parts = Vec::new();
    let mut last = 0;
    for caps in TAG_RE.captures_iter(content) {
        let (Some(whole), Some(tag)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            parts.push(Segment::Text(&content[last..whole.start()]));
        }
        parts.push(Segment::Tag(tag.as_str()));
        last = whole.end();
    }
    if last < content.len() {
        parts.push(Segment::Text(&content[last..]));
    }
    parts
}
