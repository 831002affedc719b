use chrono::{DateTime, Local, Utc};

use crate::mirror::{Attachment, SyncStatus};
use crate::models::{segments, Note, Segment};

const BOLD_CYAN: &str = "\x1b[1;36m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Print one note: the content with highlighted tags, then its dates.
pub fn print_note(note: &Note, color: bool) {
    println!("#{:<4} {}", note.id, highlight_tags(&note.content, color));
    let meta = note_meta(note, Utc::now());
    if color {
        println!("      {DIM}{meta}{RESET}");
    } else {
        println!("      {meta}");
    }
}

pub fn print_notes(notes: &[Note], color: bool) {
    if notes.is_empty() {
        println!("No notes.");
        return;
    }
    for note in notes {
        print_note(note, color);
    }
}

pub fn print_status(attachment: &Attachment, status: &SyncStatus, count: usize) {
    match &attachment.name {
        Some(name) => println!("File:   {name}"),
        None => println!("File:   (none)"),
    }
    match status {
        SyncStatus::Failed(reason) => println!("Sync:   failed ({reason})"),
        other => println!("Sync:   {}", other.as_str()),
    }
    println!("Notes:  {count}");
}

/// Content with each `#tag` wrapped in a highlight.
pub fn highlight_tags(content: &str, color: bool) -> String {
    let mut out = String::with_capacity(content.len());
    for segment in segments(content) {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Tag(tag) if color => {
                out.push_str(BOLD_CYAN);
                out.push('#');
                out.push_str(tag);
                out.push_str(RESET);
            }
            Segment::Tag(tag) => {
                out.push('#');
                out.push_str(tag);
            }
        }
    }
    out
}

/// "3h ago", or "3h ago, edited just now" once the note was changed.
pub fn note_meta(note: &Note, now: DateTime<Utc>) -> String {
    let created = format_relative(note.created_at, now);
    if note.is_edited() {
        format!("{created}, edited {}", format_relative(note.updated_at, now))
    } else {
        created
    }
}

/// Short relative date; anything older than a week shows as "Mar 5".
pub fn format_relative(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(date);
    if diff.num_seconds() < 60 {
        "just now".to_string()
    } else if diff.num_minutes() < 60 {
        format!("{}m ago", diff.num_minutes())
    } else if diff.num_hours() < 24 {
        format!("{}h ago", diff.num_hours())
    } else if diff.num_days() < 7 {
        format!("{}d ago", diff.num_days())
    } else {
        date.with_timezone(&Local).format("%b %-d").to_string()
    }
}
