//! Element projection: merge one [`LayoutDocument`] with one [`CardRow`]
//! into a fully resolved draw list for the compositor.
//!
//! Projection is pure apart from art-path existence checks: it snapshots the
//! document fields it needs, so a document can be edited while an earlier
//! projection is still rendering.

use std::path::{Path, PathBuf};

use crate::{
    data::deck::CardRow,
    foundation::{
        color::Color,
        error::{CardsmithError, CardsmithResult},
        geom::{Canvas, Position, Size},
    },
    layout::{BrushSpec, ElementSpec, FontSpec, ImageSpec, LayoutDocument, PenSpec, ShadowSpec, TextSpec},
};

/// Element id the per-card artwork is bound to.
pub const ART_ELEMENT_ID: &str = "artwork";

/// Rendered in place of absent stat values. Never the empty string, so stat
/// columns keep their alignment.
pub const STAT_PLACEHOLDER: &str = "-";

/// Stat fields that default to [`STAT_PLACEHOLDER`] when a row omits them.
pub const STAT_KEYS: &[&str] = &["atk", "def", "stb", "init", "rng", "move"];

/// Neutral fill drawn when an image element's source cannot be resolved.
pub const PLACEHOLDER_FILL: Color = Color::rgb(45, 60, 75);

#[derive(Clone, Debug, PartialEq)]
pub enum ImageSource {
    File(PathBuf),
    Placeholder(Color),
}

#[derive(Clone, Debug)]
pub struct ResolvedText {
    pub text: String,
    pub font: FontSpec,
    pub color: Color,
    pub wrap_width: Option<f64>,
    pub shadow: Option<ShadowSpec>,
}

#[derive(Clone, Debug)]
pub struct ResolvedImage {
    pub source: ImageSource,
    pub size: Size,
}

#[derive(Clone, Debug)]
pub struct ResolvedShape {
    pub size: Size,
    pub pen: PenSpec,
    pub brush: Option<BrushSpec>,
}

#[derive(Clone, Debug)]
pub enum DrawKind {
    Text(ResolvedText),
    Image(ResolvedImage),
    Shape(ResolvedShape),
}

/// One resolved draw instruction. `seq` is the element's insertion index and
/// breaks z ties, so documents render identically across runs.
#[derive(Clone, Debug)]
pub struct DrawOp {
    pub id: String,
    pub pos: Position,
    pub z: f64,
    pub seq: usize,
    pub opacity: f32,
    pub kind: DrawKind,
}

/// The resolved, per-card draw list. Created fresh per card, discarded after
/// compositing, never persisted.
#[derive(Clone, Debug)]
pub struct RenderProjection {
    pub canvas: Canvas,
    pub dpi: u32,
    pub background: Color,
    pub card_index: usize,
    pub card_name: String,
    pub ops: Vec<DrawOp>,
}

impl RenderProjection {
    /// Draw order: z ascending, insertion order for equal z.
    pub fn sorted_ops(&self) -> Vec<&DrawOp> {
        let mut ops: Vec<&DrawOp> = self.ops.iter().collect();
        ops.sort_by(|a, b| {
            a.z.partial_cmp(&b.z)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.seq.cmp(&b.seq))
        });
        ops
    }
}

/// Substitute `{field}` tokens from the row. Unresolved tokens are left
/// verbatim rather than raising, so partially personalized text survives.
/// `{{` and `}}` escape literal braces; an unclosed `{` is malformed.
pub fn substitute_placeholders(template: &str, row: &CardRow) -> CardsmithResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();
    while let Some((start, ch)) = chars.next() {
        if ch == '}' {
            if matches!(chars.peek(), Some((_, '}'))) {
                chars.next();
            }
            out.push('}');
            continue;
        }
        if ch != '{' {
            out.push(ch);
            continue;
        }
        if matches!(chars.peek(), Some((_, '{'))) {
            chars.next();
            out.push('{');
            continue;
        }
        let mut end = None;
        for (j, c) in chars.by_ref() {
            match c {
                '}' => {
                    end = Some(j);
                    break;
                }
                '{' => break,
                _ => {}
            }
        }
        let Some(end) = end else {
            return Err(CardsmithError::render(format!(
                "unterminated placeholder at byte {start} in '{template}'"
            )));
        };
        let field = &template[start + 1..end];
        match row.display(field) {
            Some(value) => out.push_str(&value),
            None => {
                out.push('{');
                out.push_str(field);
                out.push('}');
            }
        }
    }
    Ok(out)
}

/// Project a card row onto a layout. Fails only for malformed text
/// templates; missing data degrades to sentinels and placeholder fills.
#[tracing::instrument(skip_all, fields(card = row.index))]
pub fn project(doc: &LayoutDocument, row: &CardRow) -> CardsmithResult<RenderProjection> {
    let canvas = doc.canvas();
    let mut ops = Vec::with_capacity(doc.items.len());

    for (seq, (id, item)) in doc.items.iter().enumerate() {
        let Some(common) = item.common() else {
            tracing::debug!(id, "skipping unknown element kind");
            continue;
        };
        let kind = match item {
            ElementSpec::Text(spec) => DrawKind::Text(resolve_text(id, spec, row)?),
            ElementSpec::Image(spec) => DrawKind::Image(resolve_image(id, spec, row)),
            ElementSpec::Shape(spec) => DrawKind::Shape(ResolvedShape {
                size: spec.size,
                pen: spec.pen.clone(),
                brush: spec.brush.clone(),
            }),
            ElementSpec::Unknown(_) => unreachable!("unknown elements have no common block"),
        };
        ops.push(DrawOp {
            id: id.clone(),
            pos: common.resolved_pos(canvas),
            z: common.z,
            seq,
            opacity: common.opacity.clamp(0.0, 1.0) as f32,
            kind,
        });
    }

    Ok(RenderProjection {
        canvas,
        dpi: doc.meta.dpi,
        background: doc.meta.background,
        card_index: row.index,
        card_name: row.name(),
        ops,
    })
}

fn resolve_text(id: &str, spec: &TextSpec, row: &CardRow) -> CardsmithResult<ResolvedText> {
    let text = match id {
        "title" if row.contains("name") => row.display("name").unwrap_or_default(),
        "type" if row.contains("type") => row.display("type").unwrap_or_default().to_uppercase(),
        // Empty strings count as absent, so a CSV row with a blank
        // description column still falls through to text/effect.
        "description" => match ["description", "text", "effect"]
            .iter()
            .find_map(|k| display_non_empty(row, k))
        {
            Some(desc) => desc,
            None => substitute_placeholders(&spec.text, row)?,
        },
        "cost" if row.contains("cost") => row.display("cost").unwrap_or_default(),
        "cost_type" => match display_non_empty(row, "cost_type") {
            Some(value) => value,
            None => substitute_placeholders(&spec.text, row)?,
        },
        _ => match id.strip_prefix("stat_") {
            Some(key) => {
                let value = row
                    .display(key)
                    .unwrap_or_else(|| STAT_PLACEHOLDER.to_string());
                format!("{} {}", key.to_uppercase(), value)
            }
            None => substitute_placeholders(&spec.text, row)?,
        },
    };
    Ok(ResolvedText {
        text,
        font: spec.font.clone(),
        color: spec.color,
        wrap_width: spec.text_width,
        shadow: spec.shadow.clone(),
    })
}

fn display_non_empty(row: &CardRow, key: &str) -> Option<String> {
    row.display(key).filter(|s| !s.is_empty())
}

fn resolve_image(id: &str, spec: &ImageSpec, row: &CardRow) -> ResolvedImage {
    let source = if id == ART_ELEMENT_ID {
        resolve_art(row).or_else(|| resolve_asset(id, spec.asset.as_deref()))
    } else {
        resolve_asset(id, spec.asset.as_deref())
    };
    ResolvedImage {
        source: source.unwrap_or(ImageSource::Placeholder(PLACEHOLDER_FILL)),
        size: spec.size,
    }
}

fn resolve_art(row: &CardRow) -> Option<ImageSource> {
    let path = PathBuf::from(row.display("art_path")?);
    if path.is_file() {
        Some(ImageSource::File(path))
    } else {
        tracing::warn!(card = row.index, path = %path.display(), "art path missing, using placeholder fill");
        None
    }
}

fn resolve_asset(id: &str, asset: Option<&str>) -> Option<ImageSource> {
    let path = Path::new(asset?);
    if path.is_file() {
        Some(ImageSource::File(path.to_path_buf()))
    } else {
        tracing::warn!(id, path = %path.display(), "asset missing, using placeholder fill");
        None
    }
}
