use std::path::PathBuf;

use indexmap::IndexMap;
use serde_json::Value;

use crate::foundation::color::Color;

/// One card's content: an ordered field-name to value map plus its position
/// in the source deck. Immutable once loaded for a render pass; loaders take
/// a copy before attaching derived fields so the source data stays pristine.
#[derive(Clone, Debug, PartialEq)]
pub struct CardRow {
    pub index: usize,
    pub fields: IndexMap<String, Value>,
}

impl CardRow {
    pub fn new(index: usize, fields: IndexMap<String, Value>) -> Self {
        Self { index, fields }
    }

    pub fn name(&self) -> String {
        self.display("name")
            .unwrap_or_else(|| format!("Card {}", self.index + 1))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        matches!(self.fields.get(key), Some(v) if !v.is_null())
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Human-readable rendering of a field: strings verbatim, numbers and
    /// booleans via their display form, null/missing as `None`.
    pub fn display(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// A loaded deck: cards plus deck-level styling and prompt metadata.
#[derive(Clone, Debug)]
pub struct Deck {
    pub name: String,
    pub path: PathBuf,
    pub deck_color: Color,
    pub cards: Vec<CardRow>,
    pub prompts: IndexMap<String, String>,
    pub metadata: IndexMap<String, Value>,
}

impl Deck {
    pub fn card_at(&self, index: usize) -> Option<&CardRow> {
        self.cards.get(index)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CardRow> {
        self.cards.iter()
    }
}

const WINDOWS_FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Filesystem-safe slug for export filenames: forbidden characters become
/// underscores, runs collapse, and the result is lowercased. Empty names
/// fall back to `card`.
pub fn slugify_card_name(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for ch in name.chars() {
        let ch = if WINDOWS_FORBIDDEN.contains(&ch) { '_' } else { ch };
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-') {
            slug.push(ch.to_ascii_lowercase());
            last_was_sep = false;
        } else if !last_was_sep && !slug.is_empty() {
            slug.push('_');
            last_was_sep = true;
        }
    }
    let trimmed = slug.trim_matches(['.', '_', '-', ' ']);
    if trimmed.is_empty() {
        "card".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Name sanitizer used by art autodetection: keeps alphanumerics, spaces,
/// underscores and dashes, trims trailing whitespace. Matches the naming the
/// art generator uses when writing `arts/<name>.png`.
pub fn sanitize_art_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect::<String>()
        .trim_end()
        .to_string()
}
