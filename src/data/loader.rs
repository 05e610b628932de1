//! Deck loading: CSV (header + one row per card) and JSON (cards array,
//! object-of-objects, or bare array), plus the derived fields the rest of
//! the pipeline expects: deck color, per-type prompt, autodetected art path.
//!
//! JSON object-of-objects decks keep insertion order as list order; this is
//! the documented resolution of an ambiguity between loader generations.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    data::deck::{CardRow, Deck, sanitize_art_name},
    foundation::{
        color::Color,
        error::{CardsmithError, CardsmithResult},
    },
    project::substitute_placeholders,
};

const ART_EXTENSIONS: &[&str] = &["png", "jpg", "webp"];

/// Load a deck from a `.json` or `.csv` file.
#[tracing::instrument]
pub fn load_deck(path: &Path) -> CardsmithResult<Deck> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("json") => load_json_deck(path),
        Some("csv") => load_csv_deck(path),
        _ => Err(CardsmithError::data(format!(
            "unsupported deck format '{}': expected .json or .csv",
            path.display()
        ))),
    }
}

fn load_json_deck(path: &Path) -> CardsmithResult<Deck> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| CardsmithError::data(format!("read deck '{}': {e}", path.display())))?;
    let data: Value = serde_json::from_str(&raw)
        .map_err(|e| CardsmithError::data(format!("parse deck '{}': {e}", path.display())))?;

    let mut deck_color = Color::WHITE;
    let mut prompts: IndexMap<String, String> = IndexMap::new();
    let mut metadata: IndexMap<String, Value> = IndexMap::new();
    let mut style_hint: Option<String> = None;

    let raw_cards: Vec<Value> = match data {
        Value::Array(cards) => cards,
        Value::Object(map) => {
            let mut cards: Option<Vec<Value>> = None;
            let mut rest: IndexMap<String, Value> = IndexMap::new();
            for (key, value) in map {
                match (key.as_str(), value) {
                    ("cards", Value::Array(list)) => cards = Some(list),
                    ("deck_color", Value::String(s)) => match s.parse() {
                        Ok(c) => deck_color = c,
                        Err(_) => {
                            tracing::warn!(color = %s, "invalid deck_color, using white");
                        }
                    },
                    ("prompts", Value::Object(p)) => {
                        prompts = p
                            .into_iter()
                            .filter_map(|(k, v)| match v {
                                Value::String(s) => Some((k, s)),
                                _ => None,
                            })
                            .collect();
                    }
                    ("style_hint", Value::String(s)) => style_hint = Some(s),
                    (_, value) => {
                        rest.insert(key, value);
                    }
                }
            }
            match cards {
                Some(cards) => {
                    metadata = rest;
                    cards
                }
                // Object-of-objects deck: every value is one card, in
                // insertion order.
                None if !rest.is_empty() && rest.values().all(Value::is_object) => {
                    rest.into_values().collect()
                }
                _ => {
                    return Err(CardsmithError::data(format!(
                        "deck '{}' has no 'cards' array and is not an object of card objects",
                        path.display()
                    )));
                }
            }
        }
        _ => {
            return Err(CardsmithError::data(format!(
                "deck '{}' must be a JSON object or array",
                path.display()
            )));
        }
    };

    let deck_folder = path.parent().unwrap_or_else(|| Path::new("."));
    let mut cards = Vec::with_capacity(raw_cards.len());
    for (index, value) in raw_cards.into_iter().enumerate() {
        let Value::Object(fields) = value else {
            return Err(CardsmithError::data(format!(
                "deck '{}': card {index} is not an object",
                path.display()
            )));
        };
        let row = CardRow::new(index, fields.into_iter().collect());
        cards.push(prepare_card(
            row,
            deck_color,
            &prompts,
            style_hint.as_deref(),
            deck_folder,
        ));
    }

    Ok(Deck {
        name: deck_name(path),
        path: path.to_path_buf(),
        deck_color,
        cards,
        prompts,
        metadata,
    })
}

fn load_csv_deck(path: &Path) -> CardsmithResult<Deck> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| CardsmithError::data(format!("read deck '{}': {e}", path.display())))?;
    let headers = reader
        .headers()
        .map_err(|e| CardsmithError::data(format!("read csv headers '{}': {e}", path.display())))?
        .clone();

    let deck_folder = path.parent().unwrap_or_else(|| Path::new("."));
    let mut cards = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            CardsmithError::data(format!("csv record {index} in '{}': {e}", path.display()))
        })?;
        let fields: IndexMap<String, Value> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
            .collect();
        let row = CardRow::new(index, fields);
        cards.push(prepare_card(
            row,
            Color::WHITE,
            &IndexMap::new(),
            None,
            deck_folder,
        ));
    }

    Ok(Deck {
        name: deck_name(path),
        path: path.to_path_buf(),
        deck_color: Color::WHITE,
        cards,
        prompts: IndexMap::new(),
        metadata: IndexMap::new(),
    })
}

/// Attach derived fields to a copy of the row: deck color, a formatted
/// per-type prompt (never overwriting an explicit one), the deck style hint,
/// and an autodetected art path. The cached source row is never altered.
fn prepare_card(
    mut row: CardRow,
    deck_color: Color,
    prompts: &IndexMap<String, String>,
    style_hint: Option<&str>,
    deck_folder: &Path,
) -> CardRow {
    row.set("deck_color", Value::String(deck_color.to_string()));

    if !row.contains("prompt")
        && let Some(prompt) = format_prompt(prompts, &row)
    {
        row.set("prompt", Value::String(prompt));
    }
    if let Some(hint) = style_hint
        && !row.contains("style_hint")
    {
        row.set("style_hint", Value::String(hint.to_string()));
    }
    if !row.contains("art_path")
        && let Some(art) = autodetect_art(&row, deck_folder)
    {
        row.set("art_path", Value::String(art.to_string_lossy().into_owned()));
    }
    row
}

/// Pick the prompt template for the card's type and personalize it. A
/// template that fails to format (malformed braces) is used verbatim.
fn format_prompt(prompts: &IndexMap<String, String>, row: &CardRow) -> Option<String> {
    let card_type = row.display("type").unwrap_or_default();
    let template = prompts.get(&card_type)?;
    match substitute_placeholders(template, row) {
        Ok(prompt) => Some(prompt),
        Err(_) => Some(template.clone()),
    }
}

/// Look for `<deck_folder>/../arts/<sanitized name>.{png,jpg,webp}`.
fn autodetect_art(row: &CardRow, deck_folder: &Path) -> Option<PathBuf> {
    let sanitized = sanitize_art_name(&row.name());
    if sanitized.is_empty() {
        return None;
    }
    let arts_dir = deck_folder.join("..").join("arts");
    ART_EXTENSIONS
        .iter()
        .map(|ext| arts_dir.join(format!("{sanitized}.{ext}")))
        .find(|candidate| candidate.is_file())
}

fn deck_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "deck".to_string())
}
