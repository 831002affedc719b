//! JSON representation of notes for the file mirror and downloads.
//!
//! Exported documents look like `{ "notes": [ { "id", "content", "tags",
//! "createdAt", "updatedAt" } ] }` with ISO-8601 millisecond timestamps.
//! Imports also accept a bare array of records, snake_case date fields and
//! epoch-millisecond dates.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{NoteError, Result};
use crate::models::{ImportedNote, Note, NoteId};

/// A note as it appears on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRecord {
    pub id: NoteId,
    pub content: String,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
struct ExportDocument {
    notes: Vec<NoteRecord>,
}

/// How to treat individual records that fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strictness {
    /// Reject the whole payload.
    Strict,
    /// Skip the record and keep going.
    Lenient,
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn encode(note: &Note) -> NoteRecord {
    NoteRecord {
        id: note.id,
        content: note.content.clone(),
        tags: note.tags.clone(),
        created_at: format_timestamp(&note.created_at),
        updated_at: format_timestamp(&note.updated_at),
    }
}

/// Render the mirror document, `{ "notes": [...] }`.
pub fn encode_export(notes: &[Note]) -> Result<String> {
    let document = ExportDocument {
        notes: notes.iter().map(encode).collect(),
    };
    serde_json::to_string_pretty(&document).map_err(|e| NoteError::format(e.to_string()))
}

/// Render a bare array of records, the shape of a one-off download.
pub fn encode_download(notes: &[Note]) -> Result<String> {
    let records: Vec<NoteRecord> = notes.iter().map(encode).collect();
    serde_json::to_string_pretty(&records).map_err(|e| NoteError::format(e.to_string()))
}

/// Decode a whole file's text into notes. Records may omit `id`.
pub fn decode_payload(text: &str, strictness: Strictness) -> Result<Vec<ImportedNote>> {
    let payload: Value = serde_json::from_str(text)
        .map_err(|e| NoteError::format(format!("not valid JSON: {e}")))?;

    let records = match &payload {
        Value::Array(records) => records,
        Value::Object(object) => match object.get("notes") {
            Some(Value::Array(records)) => records,
            _ => {
                return Err(NoteError::format(
                    "expected an array of notes or an object with a notes array",
                ))
            }
        },
        _ => return Err(NoteError::format("expected an object or an array")),
    };

    let mut notes = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        match decode_record(record) {
            Ok(note) => notes.push(note),
            Err(reason) => {
                let label = describe(index, record);
                match strictness {
                    Strictness::Strict => {
                        return Err(NoteError::format(format!("{label}: {reason}")))
                    }
                    Strictness::Lenient => warn!(record = %label, %reason, "skipping note"),
                }
            }
        }
    }
    Ok(notes)
}

/// Decode a single stored note record, which must carry its id.
pub fn decode(record: &Value) -> Result<Note> {
    decode_record(record)
        .map_err(NoteError::Format)?
        .into_note()
        .ok_or_else(|| NoteError::format("missing integer id"))
}

fn decode_record(record: &Value) -> std::result::Result<ImportedNote, String> {
    let Value::Object(fields) = record else {
        return Err("not an object".to_string());
    };

    // Anything but an integer id means "assign one on insert".
    let id = fields.get("id").and_then(Value::as_i64);
    let content = fields
        .get("content")
        .and_then(Value::as_str)
        .ok_or("missing string content")?
        .to_string();

    // Malformed tags never block an otherwise valid note.
    let tags = match fields.get("tags") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|t| t.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };

    let created_at = first_timestamp(fields.get("createdAt"), fields.get("created_at"));
    let updated_at = first_timestamp(fields.get("updatedAt"), fields.get("updated_at"));
    let (created_at, updated_at) = match (created_at, updated_at) {
        (Some(created), Some(updated)) => (created, updated.max(created)),
        (Some(only), None) | (None, Some(only)) => (only, only),
        (None, None) => return Err("no readable createdAt or updatedAt".to_string()),
    };

    Ok(ImportedNote {
        id,
        content,
        tags,
        created_at,
        updated_at,
    })
}

fn first_timestamp(primary: Option<&Value>, legacy: Option<&Value>) -> Option<DateTime<Utc>> {
    primary
        .and_then(parse_timestamp)
        .or_else(|| legacy.and_then(parse_timestamp))
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn describe(index: usize, record: &Value) -> String {
    match record.get("id").and_then(Value::as_i64) {
        Some(id) => format!("note #{index} (id {id})"),
        None => format!("note #{index}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{extract_tags, now_millis};
    use serde_json::json;

    fn sample() -> Note {
        let created_at = DateTime::parse_from_rfc3339("2024-03-01T10:15:30.123Z")
            .unwrap()
            .with_timezone(&Utc);
        let content = "Buy milk #todo #errand";
        Note {
            id: 42,
            content: content.to_string(),
            tags: extract_tags(content),
            created_at,
            updated_at: created_at + chrono::Duration::milliseconds(1_500),
        }
    }

    #[test]
    fn test_encode_uses_iso_millis() {
        let record = encode(&sample());
        assert_eq!(record.created_at, "2024-03-01T10:15:30.123Z");
        assert_eq!(record.updated_at, "2024-03-01T10:15:31.623Z");
        assert_eq!(record.id, 42);
    }

    #[test]
    fn test_roundtrip_preserves_every_field() {
        let mut note = sample();
        note.created_at = now_millis();
        note.updated_at = note.created_at;

        let value = serde_json::to_value(encode(&note)).unwrap();
        assert_eq!(decode(&value).unwrap(), note);
    }

    #[test]
    fn test_export_document_shape() {
        let text = encode_export(&[sample()]).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        let notes = value["notes"].as_array().unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0]["createdAt"], "2024-03-01T10:15:30.123Z");
        assert_eq!(notes[0]["tags"], json!(["todo", "errand"]));
        assert!(text.contains("\n  \"notes\""));
    }

    #[test]
    fn test_download_is_bare_array() {
        let text = encode_download(&[sample()]).unwrap();
        let decoded = decode_payload(&text, Strictness::Strict).unwrap();
        assert_eq!(decoded, vec![ImportedNote::from(sample())]);
    }

    #[test]
    fn test_decode_legacy_fields_and_bad_tags() {
        let notes = decode_payload(
            r#"[{"id": 3, "content": "old", "tags": "oops",
                 "created_at": "2023-01-01T00:00:00Z", "updated_at": 1672531200500}]"#,
            Strictness::Strict,
        )
        .unwrap();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].tags.is_empty());
        assert_eq!(format_timestamp(&notes[0].created_at), "2023-01-01T00:00:00.000Z");
        assert_eq!(format_timestamp(&notes[0].updated_at), "2023-01-01T00:00:00.500Z");
    }

    #[test]
    fn test_decode_single_date_fills_the_other() {
        let note = decode(&json!({
            "id": 1, "content": "x", "tags": [], "updatedAt": "2024-01-02T03:04:05.006Z"
        }))
        .unwrap();
        assert_eq!(note.created_at, note.updated_at);
    }

    #[test]
    fn test_decode_rejects_bad_shapes() {
        for text in ["not json", "42", r#"{"items": []}"#, r#"{"notes": {}}"#] {
            let err = decode_payload(text, Strictness::Lenient).unwrap_err();
            assert!(matches!(err, NoteError::Format(_)), "{text}: {err:?}");
        }
    }

    #[test]
    fn test_strict_names_offending_record() {
        let err = decode_payload(
            r#"{"notes": [
                {"id": 1, "content": "ok", "tags": [], "createdAt": "2024-01-01T00:00:00Z"},
                {"id": 2, "tags": [], "createdAt": "2024-01-01T00:00:00Z"}
            ]}"#,
            Strictness::Strict,
        )
        .unwrap_err();
        match err {
            NoteError::Format(message) => {
                assert!(message.contains("note #1 (id 2)"), "{message}");
                assert!(message.contains("content"), "{message}");
            }
            other => panic!("wrong error type: {other:?}"),
        }
    }

    #[test]
    fn test_lenient_skips_bad_records() {
        let notes = decode_payload(
            r#"{"notes": [
                {"id": 1, "content": "ok", "createdAt": "2024-01-01T00:00:00Z"},
                {"id": 2, "content": "no dates"},
                "garbage"
            ]}"#,
            Strictness::Lenient,
        )
        .unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, Some(1));
    }

    #[test]
    fn test_records_without_id_are_accepted() {
        let notes = decode_payload(
            r#"{"notes": [{"content": "from elsewhere #x", "tags": ["x"],
                           "createdAt": "2024-01-01T00:00:00.000Z"}]}"#,
            Strictness::Strict,
        )
        .unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].id, None);
        assert_eq!(notes[0].content, "from elsewhere #x");

        let err = decode(&json!({"content": "x", "createdAt": "2024-01-01T00:00:00Z"}));
        assert!(matches!(err, Err(NoteError::Format(_))));
    }
}
