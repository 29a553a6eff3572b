//! RGB color values shared by materials, lights and the scene background
//!
//! Colors are stored as 0.0-1.0 channel triples. The inspector exchanges
//! them with the UI as CSS text, the hover highlight uses packed hex.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid color: {0}")]
pub struct ColorParseError(pub String);

/// Serialized as CSS text (`"#rrggbb"`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Build from a packed `0xRRGGBB` value
    pub fn from_hex(hex: u32) -> Self {
        Self::from_u8(
            ((hex >> 16) & 0xff) as u8,
            ((hex >> 8) & 0xff) as u8,
            (hex & 0xff) as u8,
        )
    }

    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    pub fn to_u8(self) -> [u8; 3] {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b)]
    }

    /// Pack into `0xRRGGBB`
    pub fn to_hex(self) -> u32 {
        let [r, g, b] = self.to_u8();
        ((r as u32) << 16) | ((g as u32) << 8) | b as u32
    }

    /// CSS hex form, e.g. `#aaaaaa`
    pub fn to_css(self) -> String {
        format!("#{:06x}", self.to_hex())
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn from_array(c: [f32; 3]) -> Self {
        Self::new(c[0], c[1], c[2])
    }

    /// Parse a textual color: `#rgb`, `#rrggbb`, `rgb(r, g, b)` or a basic
    /// color name
    pub fn parse(text: &str) -> Result<Self, ColorParseError> {
        let s = text.trim().to_ascii_lowercase();
        let err = || ColorParseError(text.to_string());

        if let Some(hex) = s.strip_prefix('#') {
            // from_str_radix alone would let a leading '+' through
            if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(err());
            }
            return match hex.len() {
                6 => u32::from_str_radix(hex, 16).map(Self::from_hex).map_err(|_| err()),
                3 => {
                    let v = u32::from_str_radix(hex, 16).map_err(|_| err())?;
                    let expand = |n: u32| ((n << 4) | n) as u8;
                    Ok(Self::from_u8(
                        expand((v >> 8) & 0xf),
                        expand((v >> 4) & 0xf),
                        expand(v & 0xf),
                    ))
                }
                _ => Err(err()),
            };
        }

        if let Some(body) = s.strip_prefix("rgb(").and_then(|b| b.strip_suffix(')')) {
            let parts: Vec<u8> = body
                .split(',')
                .map(|p| p.trim().parse::<u8>())
                .collect::<Result<_, _>>()
                .map_err(|_| err())?;
            return match parts.as_slice() {
                [r, g, b] => Ok(Self::from_u8(*r, *g, *b)),
                _ => Err(err()),
            };
        }

        named_color(&s).map(Self::from_hex).ok_or_else(err)
    }
}

fn named_color(name: &str) -> Option<u32> {
    let hex = match name {
        "white" => 0xffffff,
        "black" => 0x000000,
        "red" => 0xff0000,
        "green" => 0x008000,
        "lime" => 0x00ff00,
        "blue" => 0x0000ff,
        "yellow" => 0xffff00,
        "cyan" => 0x00ffff,
        "magenta" => 0xff00ff,
        "orange" => 0xffa500,
        "gray" | "grey" => 0x808080,
        "silver" => 0xc0c0c0,
        _ => return None,
    };
    Some(hex)
}

impl FromStr for Rgb {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Rgb> for String {
    fn from(c: Rgb) -> Self {
        c.to_css()
    }
}

impl TryFrom<String> for Rgb {
    type Error = ColorParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_css())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_uses_css_text() {
        let json = serde_json::to_string(&Rgb::from_hex(0x336699)).unwrap();
        assert_eq!(json, "\"#336699\"");
        let c: Rgb = serde_json::from_str("\"white\"").unwrap();
        assert_eq!(c, Rgb::WHITE);
        assert!(serde_json::from_str::<Rgb>("\"nope\"").is_err());
    }

    #[test]
    fn test_hex_round_trip() {
        let c = Rgb::from_hex(0xaaaaaa);
        assert_eq!(c.to_hex(), 0xaaaaaa);
        assert_eq!(c.to_css(), "#aaaaaa");
    }

    #[test]
    fn test_parse_forms() {
        assert_eq!(Rgb::parse("#ff0000").unwrap().to_hex(), 0xff0000);
        assert_eq!(Rgb::parse("#0f0").unwrap().to_hex(), 0x00ff00);
        assert_eq!(Rgb::parse("rgb(0, 0, 255)").unwrap().to_hex(), 0x0000ff);
        assert_eq!(Rgb::parse(" White ").unwrap().to_hex(), 0xffffff);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Rgb::parse("#12").is_err());
        assert!(Rgb::parse("rgb(1,2)").is_err());
        assert!(Rgb::parse("chartreuse-ish").is_err());
    }

    #[test]
    fn test_parse_rejects_signed_hex() {
        assert!(Rgb::parse("#+fffff").is_err());
        assert!(Rgb::parse("#+ff").is_err());
        assert!(Rgb::parse("#-12345").is_err());
    }
}
