//! The card template data model: a serializable, ordered tree of named
//! elements plus canvas metadata, as written by the interactive editor.
//!
//! Item order is insertion order and doubles as the z-order tie break.
//! Unknown element kinds are preserved verbatim across a load/save cycle so
//! newer documents survive older builds.

use std::path::Path;

use indexmap::IndexMap;

use crate::foundation::{
    color::Color,
    error::{CardsmithError, CardsmithResult},
    geom::{Canvas, Position, Size},
};

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayoutMeta {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default = "default_background")]
    pub background: Color,
    #[serde(default = "default_grid")]
    pub grid: u32,
    #[serde(default = "default_snap")]
    pub snap: u32,
}

fn default_dpi() -> u32 {
    300
}

fn default_background() -> Color {
    Color::rgb(28, 28, 28)
}

fn default_grid() -> u32 {
    25
}

fn default_snap() -> u32 {
    5
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayoutDocument {
    pub meta: LayoutMeta,
    #[serde(default)]
    pub items: IndexMap<String, ElementSpec>,
}

/// Shared per-element attributes, flattened into each concrete kind.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ElementCommon {
    #[serde(default)]
    pub pos: Position,
    #[serde(default)]
    pub z: f64,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Binding::is_absolute")]
    pub bindings: Binding,
}

impl Default for ElementCommon {
    fn default() -> Self {
        Self {
            pos: Position::default(),
            z: 0.0,
            opacity: default_opacity(),
            locked: false,
            bindings: Binding::default(),
        }
    }
}

impl ElementCommon {
    /// Position resolved against the given canvas.
    ///
    /// Relative-bound elements derive their position from the anchor
    /// fraction; the stored `pos` is never authoritative for them. An
    /// anchor absent from the file means the stored position *is* the
    /// anchor, expressed at the current canvas size.
    pub fn resolved_pos(&self, canvas: Canvas) -> Position {
        if !self.bindings.relative {
            return self.pos;
        }
        match self.bindings.anchor {
            Some(a) => Position::new(a.x * f64::from(canvas.width), a.y * f64::from(canvas.height)),
            None => self.pos,
        }
    }
}

fn default_opacity() -> f64 {
    1.0
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Position binding: absolute pixels, or a fraction of the canvas that is
/// re-derived whenever the canvas is resized.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Binding {
    #[serde(default)]
    pub relative: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Anchor>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub lock_x: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub lock_y: bool,
}

impl Binding {
    pub fn is_absolute(&self) -> bool {
        !self.relative && self.anchor.is_none() && !self.lock_x && !self.lock_y
    }
}

/// Anchor as a fraction of canvas width/height, 0..1 for on-canvas points.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Anchor {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FontSpec {
    #[serde(default = "default_family")]
    pub family: String,
    #[serde(default = "default_font_size")]
    pub size: f32,
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub underline: bool,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: default_family(),
            size: default_font_size(),
            bold: false,
            italic: false,
            underline: false,
        }
    }
}

fn default_family() -> String {
    "Arial".to_string()
}

fn default_font_size() -> f32 {
    20.0
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShadowSpec {
    #[serde(default = "default_shadow_color")]
    pub color: Color,
    #[serde(default)]
    pub offset: [f64; 2],
    #[serde(default)]
    pub blur: f64,
}

fn default_shadow_color() -> Color {
    Color::BLACK
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextSpec {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub font: FontSpec,
    #[serde(default = "default_text_color")]
    pub color: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow: Option<ShadowSpec>,
    #[serde(flatten)]
    pub common: ElementCommon,
}

fn default_text_color() -> Color {
    Color::WHITE
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    #[serde(default = "default_image_size")]
    pub size: Size,
    #[serde(flatten)]
    pub common: ElementCommon,
}

fn default_image_size() -> Size {
    Size::new(100.0, 100.0)
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PenSpec {
    #[serde(default = "default_text_color")]
    pub color: Color,
    #[serde(default = "default_pen_width")]
    pub width: f64,
}

impl Default for PenSpec {
    fn default() -> Self {
        Self {
            color: default_text_color(),
            width: default_pen_width(),
        }
    }
}

fn default_pen_width() -> f64 {
    1.0
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BrushSpec {
    pub color: Color,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShapeSpec {
    #[serde(default = "default_image_size")]
    pub size: Size,
    #[serde(default)]
    pub pen: PenSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brush: Option<BrushSpec>,
    #[serde(flatten)]
    pub common: ElementCommon,
}

/// One named visual element, tagged by the `type` field in the document.
///
/// Kinds this build does not know are kept as raw JSON: they round-trip
/// through save untouched and the compositor skips them.
#[derive(Clone, Debug, PartialEq)]
pub enum ElementSpec {
    Text(TextSpec),
    Image(ImageSpec),
    Shape(ShapeSpec),
    Unknown(serde_json::Value),
}

impl ElementSpec {
    pub fn common(&self) -> Option<&ElementCommon> {
        match self {
            ElementSpec::Text(t) => Some(&t.common),
            ElementSpec::Image(i) => Some(&i.common),
            ElementSpec::Shape(s) => Some(&s.common),
            ElementSpec::Unknown(_) => None,
        }
    }

    pub fn common_mut(&mut self) -> Option<&mut ElementCommon> {
        match self {
            ElementSpec::Text(t) => Some(&mut t.common),
            ElementSpec::Image(i) => Some(&mut i.common),
            ElementSpec::Shape(s) => Some(&mut s.common),
            ElementSpec::Unknown(_) => None,
        }
    }
}

impl serde::Serialize for ElementSpec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::Error as _;

        fn tagged<T: serde::Serialize>(
            spec: &T,
            kind: &str,
        ) -> Result<serde_json::Value, serde_json::Error> {
            let mut value = serde_json::to_value(spec)?;
            if let Some(obj) = value.as_object_mut() {
                obj.insert(
                    "type".to_string(),
                    serde_json::Value::String(kind.to_string()),
                );
            }
            Ok(value)
        }

        let value = match self {
            ElementSpec::Text(t) => tagged(t, "text"),
            ElementSpec::Image(i) => tagged(i, "image"),
            ElementSpec::Shape(s) => tagged(s, "rect"),
            ElementSpec::Unknown(raw) => Ok(raw.clone()),
        }
        .map_err(S::Error::custom)?;
        value.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for ElementSpec {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error as _;

        let value = serde_json::Value::deserialize(deserializer)?;
        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("text");
        match kind {
            "text" => serde_json::from_value(value.clone())
                .map(ElementSpec::Text)
                .map_err(D::Error::custom),
            "image" | "pixmap" | "icon" => serde_json::from_value(value.clone())
                .map(ElementSpec::Image)
                .map_err(D::Error::custom),
            "rect" | "decor" | "shape" => serde_json::from_value(value.clone())
                .map(ElementSpec::Shape)
                .map_err(D::Error::custom),
            _ => Ok(ElementSpec::Unknown(value)),
        }
    }
}

impl LayoutDocument {
    /// Parse a template file. Unreadable files, invalid JSON and absent
    /// canvas geometry all surface as `MalformedLayout`.
    pub fn load(path: &Path) -> CardsmithResult<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CardsmithError::malformed_layout(format!("read '{}': {e}", path.display()))
        })?;
        let doc: LayoutDocument = serde_json::from_str(&raw).map_err(|e| {
            CardsmithError::malformed_layout(format!("parse '{}': {e}", path.display()))
        })?;
        doc.validate()?;
        Ok(doc)
    }

    /// Write canonical pretty JSON. `load(save(doc)) == doc` for every
    /// tracked field; transient editor state is never part of the model.
    pub fn save(&self, path: &Path) -> CardsmithResult<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                CardsmithError::data(format!("create dir '{}': {e}", parent.display()))
            })?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CardsmithError::data(format!("serialize layout: {e}")))?;
        std::fs::write(path, json)
            .map_err(|e| CardsmithError::data(format!("write '{}': {e}", path.display())))
    }

    /// Load a template, synthesizing and persisting the built-in default
    /// when the file does not exist. Every template path self-heals on
    /// first use.
    pub fn load_or_default(path: &Path) -> CardsmithResult<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "template missing, writing default layout");
            Self::default_template().save(path)?;
        }
        Self::load(path)
    }

    /// The minimal built-in template: one art region and three text regions.
    pub fn default_template() -> Self {
        let mut items = IndexMap::new();
        items.insert(
            "artwork".to_string(),
            ElementSpec::Image(ImageSpec {
                asset: None,
                size: Size::new(520.0, 320.0),
                common: ElementCommon {
                    pos: Position::new(112.0, 160.0),
                    z: 1.0,
                    ..ElementCommon::default()
                },
            }),
        );
        items.insert(
            "title".to_string(),
            ElementSpec::Text(TextSpec {
                text: "Card title".to_string(),
                font: FontSpec {
                    size: 30.0,
                    bold: true,
                    ..FontSpec::default()
                },
                color: Color::WHITE,
                text_width: Some(500.0),
                shadow: None,
                common: ElementCommon {
                    pos: Position::new(60.0, 40.0),
                    z: 5.0,
                    ..ElementCommon::default()
                },
            }),
        );
        items.insert(
            "type".to_string(),
            ElementSpec::Text(TextSpec {
                text: "UNIT".to_string(),
                font: FontSpec {
                    size: 18.0,
                    ..FontSpec::default()
                },
                color: Color::rgb(247, 213, 110),
                text_width: None,
                shadow: None,
                common: ElementCommon {
                    pos: Position::new(60.0, 90.0),
                    z: 5.0,
                    ..ElementCommon::default()
                },
            }),
        );
        items.insert(
            "description".to_string(),
            ElementSpec::Text(TextSpec {
                text: "Ability and effect text...".to_string(),
                font: FontSpec {
                    size: 18.0,
                    ..FontSpec::default()
                },
                color: Color::WHITE,
                text_width: Some(520.0),
                shadow: None,
                common: ElementCommon {
                    pos: Position::new(60.0, 520.0),
                    z: 5.0,
                    ..ElementCommon::default()
                },
            }),
        );
        LayoutDocument {
            meta: LayoutMeta {
                width: 744,
                height: 1038,
                dpi: default_dpi(),
                background: default_background(),
                grid: default_grid(),
                snap: default_snap(),
            },
            items,
        }
    }

    pub fn canvas(&self) -> Canvas {
        Canvas {
            width: self.meta.width,
            height: self.meta.height,
        }
    }

    pub fn validate(&self) -> CardsmithResult<()> {
        Canvas::new(self.meta.width, self.meta.height)?;
        for (id, item) in &self.items {
            let Some(common) = item.common() else {
                continue;
            };
            if !(0.0..=1.0).contains(&common.opacity) {
                return Err(CardsmithError::malformed_layout(format!(
                    "element '{id}' opacity must be in 0..1"
                )));
            }
            if !common.pos.x.is_finite() || !common.pos.y.is_finite() {
                return Err(CardsmithError::malformed_layout(format!(
                    "element '{id}' position must be finite"
                )));
            }
            if let Some(a) = common.bindings.anchor
                && (!a.x.is_finite() || !a.y.is_finite())
            {
                return Err(CardsmithError::malformed_layout(format!(
                    "element '{id}' anchor must be finite"
                )));
            }
            match item {
                ElementSpec::Text(t) => {
                    if !(t.font.size > 0.0) {
                        return Err(CardsmithError::malformed_layout(format!(
                            "element '{id}' font size must be > 0"
                        )));
                    }
                }
                ElementSpec::Shape(s) => {
                    if s.pen.width < 0.0 {
                        return Err(CardsmithError::malformed_layout(format!(
                            "element '{id}' pen width must be >= 0"
                        )));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Change the canvas size, keeping relative-bound elements glued to
    /// their anchor fraction. Elements without a stored anchor get one
    /// derived from their current position first, so the invariant
    /// `pos == anchor * canvas` holds after every resize.
    pub fn resize_canvas(&mut self, width: u32, height: u32) -> CardsmithResult<()> {
        let new = Canvas::new(width, height)?;
        let old = self.canvas();
        for item in self.items.values_mut() {
            let Some(common) = item.common_mut() else {
                continue;
            };
            if !common.bindings.relative {
                continue;
            }
            let anchor = common.bindings.anchor.get_or_insert_with(|| Anchor {
                x: common.pos.x / f64::from(old.width),
                y: common.pos.y / f64::from(old.height),
            });
            common.pos = Position::new(
                anchor.x * f64::from(new.width),
                anchor.y * f64::from(new.height),
            );
        }
        self.meta.width = width;
        self.meta.height = height;
        Ok(())
    }
}
