use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;

use super::Database;
use crate::error::{NoteError, Result};
use crate::models::{extract_tags, ImportedNote, NewNote, Note, NoteId, NotePatch};

const NOTE_COLUMNS: &str = "id, content, tags, created_at, updated_at";

/// Helper to convert stored epoch milliseconds to a timestamp
fn parse_millis(idx: usize, ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, ms))
}

fn tags_to_json(tags: &[String]) -> rusqlite::Result<String> {
    serde_json::to_string(tags).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn tags_from_json(idx: usize, raw: &str) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

impl Database {
    // ==================== NOTE CREATE ====================

    pub fn insert_note(&self, note: &NewNote) -> Result<NoteId> {
        self.in_transaction(|conn| {
            conn.execute(
                "INSERT INTO notes (content, tags, created_at, updated_at) VALUES (?, ?, ?, ?)",
                params![
                    note.content,
                    tags_to_json(&note.tags)?,
                    note.created_at.timestamp_millis(),
                    note.updated_at.timestamp_millis(),
                ],
            )?;
            let id = conn.last_insert_rowid();
            write_tag_index(conn, id, &note.tags)?;
            Ok(id)
        })
    }

    /// Insert imported notes. Given ids are kept and skipped when already
    /// taken; notes without one get a fresh id. Returns the number inserted.
    pub fn insert_imported(&self, notes: &[ImportedNote]) -> Result<usize> {
        if notes.is_empty() {
            return Ok(0);
        }
        self.in_transaction(|conn| insert_imported(conn, notes))
    }

    /// Delete every note and insert `notes` in their place, atomically.
    pub fn replace_notes(&self, notes: &[ImportedNote]) -> Result<usize> {
        self.in_transaction(|conn| {
            conn.execute("DELETE FROM notes", [])?;
            insert_imported(conn, notes)
        })
    }

    // ==================== NOTE READ ====================

    pub fn get_note(&self, id: NoteId) -> Result<Option<Note>> {
        let note = self
            .conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?"),
                [id],
                Self::row_to_note,
            )
            .optional()?;
        Ok(note)
    }

    /// All notes, newest first.
    pub fn list_notes(&self) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes ORDER BY created_at DESC, id DESC"
        ))?;
        let notes = stmt
            .query_map([], Self::row_to_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    /// Notes carrying exactly `tag`, newest first.
    pub fn list_notes_by_tag(&self, tag: &str) -> Result<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes
             WHERE id IN (SELECT note_id FROM note_tags WHERE tag = ?)
             ORDER BY created_at DESC, id DESC"
        ))?;
        let notes = stmt
            .query_map([tag], Self::row_to_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    pub fn note_ids(&self) -> Result<HashSet<NoteId>> {
        let mut stmt = self.conn.prepare("SELECT id FROM notes")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<NoteId>>>()?;
        Ok(ids)
    }

    pub fn count_notes(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ==================== NOTE UPDATE ====================

    /// Apply `patch` and stamp `updated_at` with `now` (never earlier than
    /// `created_at`). Tags are recomputed when the content changes.
    pub fn update_note(&self, id: NoteId, patch: &NotePatch, now: DateTime<Utc>) -> Result<()> {
        self.in_transaction(|conn| {
            let existing = conn
                .query_row(
                    &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?"),
                    [id],
                    Self::row_to_note,
                )
                .optional()?
                .ok_or(NoteError::NotFound(id))?;

            let (content, tags) = match &patch.content {
                Some(content) if *content != existing.content => {
                    (content.clone(), extract_tags(content))
                }
                _ => (existing.content, existing.tags),
            };
            let updated_at = now.max(existing.created_at);

            conn.execute(
                "UPDATE notes SET content = ?, tags = ?, updated_at = ? WHERE id = ?",
                params![content, tags_to_json(&tags)?, updated_at.timestamp_millis(), id],
            )?;
            write_tag_index(conn, id, &tags)?;
            Ok(())
        })
    }

    // ==================== NOTE DELETE ====================

    pub fn delete_note(&self, id: NoteId) -> Result<bool> {
        let rows = self.conn.execute("DELETE FROM notes WHERE id = ?", [id])?;
        Ok(rows > 0)
    }

    pub fn clear_notes(&self) -> Result<usize> {
        let rows = self.conn.execute("DELETE FROM notes", [])?;
        Ok(rows)
    }

    fn row_to_note(row: &Row) -> rusqlite::Result<Note> {
        let tags: String = row.get("tags")?;
        let created_at: i64 = row.get("created_at")?;
        let updated_at: i64 = row.get("updated_at")?;

        Ok(Note {
            id: row.get("id")?,
            content: row.get("content")?,
            tags: tags_from_json(2, &tags)?,
            created_at: parse_millis(3, created_at)?,
            updated_at: parse_millis(4, updated_at)?,
        })
    }
}

fn insert_imported(conn: &Connection, notes: &[ImportedNote]) -> Result<usize> {
    // Explicit ids go first so a freshly assigned id never takes one of them.
    let (with_ids, without_ids): (Vec<&ImportedNote>, Vec<&ImportedNote>) =
        notes.iter().partition(|note| note.id.is_some());

    let mut inserted = 0;
    for note in with_ids.into_iter().chain(without_ids) {
        let tags = tags_to_json(&note.tags)?;
        let created_at = note.created_at.timestamp_millis();
        let updated_at = note.updated_at.timestamp_millis();
        let id = match note.id {
            Some(id) => {
                let rows = conn.execute(
                    "INSERT OR IGNORE INTO notes (id, content, tags, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?)",
                    params![id, note.content, tags, created_at, updated_at],
                )?;
                if rows == 0 {
                    continue;
                }
                id
            }
            None => {
                conn.execute(
                    "INSERT INTO notes (content, tags, created_at, updated_at) VALUES (?, ?, ?, ?)",
                    params![note.content, tags, created_at, updated_at],
                )?;
                conn.last_insert_rowid()
            }
        };
        write_tag_index(conn, id, &note.tags)?;
        inserted += 1;
    }
    Ok(inserted)
}

fn write_tag_index(conn: &Connection, id: NoteId, tags: &[String]) -> Result<()> {
    conn.execute("DELETE FROM note_tags WHERE note_id = ?", [id])?;
    let mut stmt =
        conn.prepare_cached("INSERT INTO note_tags (note_id, position, tag) VALUES (?, ?, ?)")?;
    for (position, tag) in tags.iter().enumerate() {
        stmt.execute(params![id, position as i64, tag])?;
    }
    Ok(())
}
