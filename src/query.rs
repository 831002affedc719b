use serde::{Deserialize, Serialize};

use crate::models::Note;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagMatch {
    /// The note must carry exactly the tag.
    #[default]
    Exact,
    /// The tag itself or any `tag/...` below it.
    Hierarchical,
}

impl TagMatch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Hierarchical => "hierarchical",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "hierarchical" => Self::Hierarchical,
            _ => Self::Exact,
        }
    }

    pub fn matches(&self, wanted: &str, tag: &str) -> bool {
        match self {
            Self::Exact => tag == wanted,
            Self::Hierarchical => {
                tag == wanted
                    || tag
                        .strip_prefix(wanted)
                        .is_some_and(|rest| rest.starts_with('/'))
            }
        }
    }
}

/// A view over notes. Both criteria must hold when both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteFilter {
    pub tag: Option<String>,
    pub text: Option<String>,
    pub tag_match: TagMatch,
}

impl NoteFilter {
    pub fn tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_tag_match(mut self, tag_match: TagMatch) -> Self {
        self.tag_match = tag_match;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tag.is_none() && self.text.as_deref().map_or(true, |t| t.trim().is_empty())
    }

    pub fn matches(&self, note: &Note) -> bool {
        if let Some(wanted) = &self.tag {
            if !note.tags.iter().any(|t| self.tag_match.matches(wanted, t)) {
                return false;
            }
        }
        if let Some(text) = self.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let needle = text.to_lowercase();
            let in_content = note.content.to_lowercase().contains(&needle);
            let in_tags = note.tags.iter().any(|t| t.to_lowercase().contains(&needle));
            if !in_content && !in_tags {
                return false;
            }
        }
        true
    }

    /// Matching notes in their original order.
    pub fn apply<'a>(&self, notes: &'a [Note]) -> Vec<&'a Note> {
        notes.iter().filter(|n| self.matches(n)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::extract_tags;
    use chrono::Utc;

    fn note(id: i64, content: &str) -> Note {
        let now = Utc::now();
        Note {
            id,
            content: content.to_string(),
            tags: extract_tags(content),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_tag_filter_is_exact_by_default() {
        let notes = vec![note(1, "plan #project"), note(2, "#proj x")];
        let hits = NoteFilter::tag("project").apply(&notes);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
        assert!(NoteFilter::tag("proj").apply(&notes[..1]).is_empty());
    }

    #[test]
    fn test_hierarchical_tag_filter() {
        let notes = vec![
            note(1, "#work"),
            note(2, "#work/meetings"),
            note(3, "#workout"),
        ];
        let filter = NoteFilter::tag("work").with_tag_match(TagMatch::Hierarchical);
        let ids: Vec<_> = filter.apply(&notes).into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_text_filter_case_insensitive_content_or_tag() {
        let notes = vec![
            note(1, "Call MOM tomorrow"),
            note(2, "groceries #Errands"),
            note(3, "unrelated"),
        ];
        let ids: Vec<_> = NoteFilter::text("mom")
            .apply(&notes)
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![1]);

        let ids: Vec<_> = NoteFilter::text("errand")
            .apply(&notes)
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn test_filters_compose_and_keep_order() {
        let notes = vec![
            note(3, "milk #todo"),
            note(2, "eggs #todo"),
            note(1, "milk #done"),
        ];
        let filter = NoteFilter::tag("todo").with_text("MILK");
        let ids: Vec<_> = filter.apply(&notes).into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![3]);

        let all: Vec<_> = NoteFilter::default()
            .apply(&notes)
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(all, vec![3, 2, 1]);
    }

    #[test]
    fn test_blank_text_is_ignored() {
        let filter = NoteFilter::text("   ");
        assert!(filter.is_empty());
        assert!(filter.matches(&note(1, "anything")));
    }
}
