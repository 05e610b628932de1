use std::fmt;
use std::str::FromStr;

use crate::foundation::error::{CardsmithError, CardsmithResult};

/// Straight (non-premultiplied) RGBA color.
///
/// Serialized as the hex strings the template editor writes: `#RRGGBB` for
/// opaque colors, `#AARRGGBB` (Qt HexArgb) when alpha is involved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Premultiplied RGBA8 pixel, the surface-native format.
    pub fn premul(self) -> [u8; 4] {
        fn mul(c: u8, a: u8) -> u8 {
            ((u16::from(c) * u16::from(a) + 127) / 255) as u8
        }
        [
            mul(self.r, self.a),
            mul(self.g, self.a),
            mul(self.b, self.a),
            self.a,
        ]
    }
}

impl FromStr for Color {
    type Err = CardsmithError;

    fn from_str(s: &str) -> CardsmithResult<Self> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| CardsmithError::data(format!("color '{s}' must start with '#'")))?;
        if !hex.is_ascii() {
            return Err(CardsmithError::data(format!(
                "color '{s}' has invalid hex digits"
            )));
        }
        let byte = |i: usize| -> CardsmithResult<u8> {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|_| CardsmithError::data(format!("color '{s}' has invalid hex digits")))
        };
        match hex.len() {
            6 => Ok(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Ok(Color::rgba(byte(2)?, byte(4)?, byte(6)?, byte(0)?)),
            _ => Err(CardsmithError::data(format!(
                "color '{s}' must be #RRGGBB or #AARRGGBB"
            ))),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.a == 255 {
            write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            write!(
                f,
                "#{:02x}{:02x}{:02x}{:02x}",
                self.a, self.r, self.g, self.b
            )
        }
    }
}

impl serde::Serialize for Color {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Color {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rgb_and_argb() {
        assert_eq!("#ffffff".parse::<Color>().unwrap(), Color::WHITE);
        assert_eq!(
            "#80ff0000".parse::<Color>().unwrap(),
            Color::rgba(255, 0, 0, 128)
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!("ffffff".parse::<Color>().is_err());
        assert!("#ff".parse::<Color>().is_err());
        assert!("#zzzzzz".parse::<Color>().is_err());
    }

    #[test]
    fn rejects_non_ascii_without_panicking() {
        // Multi-byte characters can hit the 6/8 byte lengths; slicing by
        // byte offset must not land inside one.
        assert!("#€€".parse::<Color>().is_err());
        assert!("#ééé".parse::<Color>().is_err());
    }

    #[test]
    fn display_roundtrips_through_parse() {
        for c in [Color::rgb(28, 28, 28), Color::rgba(1, 2, 3, 4)] {
            assert_eq!(c.to_string().parse::<Color>().unwrap(), c);
        }
    }

    #[test]
    fn premul_scales_channels() {
        let c = Color::rgba(255, 100, 0, 128);
        let p = c.premul();
        assert_eq!(p[0], 128);
        assert_eq!(p[1], ((100u16 * 128 + 127) / 255) as u8);
        assert_eq!(p[3], 128);
    }

    #[test]
    fn serde_uses_hex_strings() {
        let s = serde_json::to_string(&Color::rgb(247, 213, 110)).unwrap();
        assert_eq!(s, "\"#f7d56e\"");
        let back: Color = serde_json::from_str(&s).unwrap();
        assert_eq!(back, Color::rgb(247, 213, 110));
    }
}
