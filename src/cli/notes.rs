//! Note commands: list, add, edit and delete.

use anyhow::Result;

use super::display::print_notes;
use super::ListArgs;
use crate::app::Notebook;
use crate::models::{EditOutcome, NoteId};
use crate::query::TagMatch;

pub async fn run_list(notebook: &Notebook, args: ListArgs, color: bool) -> Result<()> {
    let mut filter = notebook.filter();
    if let Some(tag) = args.tag {
        filter = filter.with_tag(tag.trim_start_matches('#'));
    }
    if let Some(text) = args.search {
        filter = filter.with_text(text);
    }
    if args.hierarchical {
        filter = filter.with_tag_match(TagMatch::Hierarchical);
    }

    let notes = notebook.notes(&filter).await?;
    print_notes(&notes, color);
    Ok(())
}

pub async fn run_add(notebook: &Notebook, content: &str) -> Result<()> {
    match notebook.add_note(content).await? {
        Some(id) => println!("Added note {id}."),
        None => println!("Nothing to add."),
    }
    Ok(())
}

pub async fn run_edit(notebook: &Notebook, id: NoteId, content: &str) -> Result<()> {
    match notebook.edit_note(id, content).await? {
        EditOutcome::Updated => println!("Updated note {id}."),
        EditOutcome::Deleted => println!("Deleted note {id}."),
    }
    Ok(())
}

pub async fn run_delete(notebook: &Notebook, id: NoteId) -> Result<()> {
    notebook.delete_note(id).await?;
    println!("Deleted note {id}.");
    Ok(())
}
