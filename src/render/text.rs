//! Font loading and line layout.
//!
//! Faces are keyed by file stem; template font families are matched against
//! those stems after normalization, so "Open Sans" finds `OpenSans-Regular.ttf`.
//! An empty library is not an error: text elements are skipped with a warning
//! so a deck can still be proofed without any fonts installed.

use std::path::Path;

use fontdue::{Font, FontSettings};

use crate::foundation::error::{CardsmithError, CardsmithResult};

struct Face {
    key: String,
    font: Font,
}

#[derive(Default)]
pub struct FontLibrary {
    faces: Vec<Face>,
}

impl FontLibrary {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load every `.ttf`/`.otf` under `dir`. A missing directory yields an
    /// empty library; individual unparseable files are skipped with a warning.
    pub fn load_dir(dir: &Path) -> CardsmithResult<Self> {
        let mut lib = Self::empty();
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => {
                tracing::warn!(dir = %dir.display(), "fonts directory not found, text will be skipped");
                return Ok(lib);
            }
        };
        let mut paths: Vec<_> = entries
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("ttf" | "otf" | "TTF" | "OTF")
                )
            })
            .collect();
        paths.sort();

        for path in paths {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let bytes = std::fs::read(&path).map_err(|e| {
                CardsmithError::missing_asset(format!("read font '{}': {e}", path.display()))
            })?;
            if let Err(err) = lib.add_font_bytes(stem, &bytes) {
                tracing::warn!(path = %path.display(), %err, "skipping unreadable font");
            }
        }
        Ok(lib)
    }

    pub fn add_font_bytes(&mut self, key: &str, bytes: &[u8]) -> CardsmithResult<()> {
        let font = Font::from_bytes(bytes.to_vec(), FontSettings::default())
            .map_err(|e| CardsmithError::missing_asset(format!("parse font '{key}': {e}")))?;
        self.faces.push(Face {
            key: normalize(key),
            font,
        });
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    /// Find the best face for a family plus style flags. Style-specific
    /// faces ("...-bold") win over the plain family match; an unmatched
    /// family falls back to the first loaded face.
    pub fn resolve(&self, family: &str, bold: bool, italic: bool) -> Option<&Font> {
        let base = normalize(family);
        let mut styled = Vec::new();
        if bold && italic {
            styled.push(format!("{base}bolditalic"));
        }
        if bold {
            styled.push(format!("{base}bold"));
        }
        if italic {
            styled.push(format!("{base}italic"));
        }
        styled.push(base);

        for want in &styled {
            if let Some(face) = self
                .faces
                .iter()
                .find(|f| f.key == *want || f.key.contains(want.as_str()))
            {
                return Some(&face.font);
            }
        }
        self.faces.first().map(|f| &f.font)
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Advance-width sum for a single line.
pub fn measure_line(font: &Font, text: &str, px: f32) -> f32 {
    text.chars()
        .map(|ch| font.metrics(ch, px).advance_width)
        .sum()
}

/// Greedy word wrap. Explicit newlines always break; a word wider than
/// `max_width` gets a line of its own rather than being split.
pub fn wrap_greedy<F>(text: &str, max_width: f32, mut measure: F) -> Vec<String>
where
    F: FnMut(&str) -> f32,
{
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            if current.is_empty() {
                current = word.to_string();
                continue;
            }
            let candidate = format!("{current} {word}");
            if measure(&candidate) <= max_width {
                current = candidate;
            } else {
                lines.push(std::mem::take(&mut current));
                current = word.to_string();
            }
        }
        lines.push(current);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_count_measure(s: &str) -> f32 {
        s.chars().count() as f32
    }

    #[test]
    fn wrap_respects_max_width() {
        let lines = wrap_greedy("aa bb cc dd", 5.0, char_count_measure);
        assert_eq!(lines, vec!["aa bb", "cc dd"]);
    }

    #[test]
    fn wrap_keeps_explicit_newlines() {
        let lines = wrap_greedy("one\ntwo three", 100.0, char_count_measure);
        assert_eq!(lines, vec!["one", "two three"]);
    }

    #[test]
    fn wrap_overlong_word_gets_own_line() {
        let lines = wrap_greedy("a verylongword b", 4.0, char_count_measure);
        assert_eq!(lines, vec!["a", "verylongword", "b"]);
    }

    #[test]
    fn wrap_empty_text_is_one_empty_line() {
        let lines = wrap_greedy("", 10.0, char_count_measure);
        assert_eq!(lines, vec![""]);
    }

    #[test]
    fn empty_library_resolves_nothing() {
        let lib = FontLibrary::empty();
        assert!(lib.is_empty());
        assert!(lib.resolve("Arial", false, false).is_none());
    }

    #[test]
    fn missing_fonts_dir_yields_empty_library() {
        let lib = FontLibrary::load_dir(Path::new("/no/such/dir")).unwrap();
        assert!(lib.is_empty());
    }

    #[test]
    fn normalize_strips_spaces_and_case() {
        assert_eq!(normalize("Open Sans-Bold"), "opensansbold");
    }
}
