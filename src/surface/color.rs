use std::fmt;
use std::str::FromStr;

use image::Rgba;
use palette::Srgb;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An sRGB colour with straight (non-premultiplied) alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub alpha: u8,
}

#[derive(Debug, Error)]
#[error("Invalid colour '{value}': expected #rgb, #rrggbb or #rrggbbaa")]
pub struct ColorParseError {
    value: String,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    pub const fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self::rgba(red, green, blue, 255)
    }

    pub const fn rgba(red: u8, green: u8, blue: u8, alpha: u8) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.alpha == 0
    }

    pub fn with_opacity(self, opacity: f32) -> Self {
        let alpha = (self.alpha as f32 * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { alpha, ..self }
    }

    pub fn to_rgba(self) -> Rgba<u8> {
        Rgba([self.red, self.green, self.blue, self.alpha])
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || ColorParseError {
            value: s.to_string(),
        };
        let hex = trimmed.strip_prefix('#').unwrap_or(trimmed);

        // palette handles the 3 and 6 digit forms; alpha is the trailing byte pair.
        let (rgb_part, alpha) = match hex.len() {
            3 | 6 => (hex, 255),
            8 => {
                let alpha = u8::from_str_radix(&hex[6..], 16).map_err(|_| invalid())?;
                (&hex[..6], alpha)
            }
            _ => return Err(invalid()),
        };

        let rgb: Srgb<u8> = rgb_part.parse().map_err(|_| invalid())?;
        Ok(Color::rgba(rgb.red, rgb.green, rgb.blue, alpha))
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.red, self.green, self.blue)?;
        if self.alpha != 255 {
            write!(f, "{:02x}", self.alpha)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_short_and_long_hex() {
        assert_eq!("#fff".parse::<Color>().unwrap(), Color::WHITE);
        assert_eq!(
            "#1f2937".parse::<Color>().unwrap(),
            Color::rgb(0x1f, 0x29, 0x37)
        );
    }

    #[test]
    fn parses_alpha_suffix() {
        let color: Color = "#ec489980".parse().unwrap();
        assert_eq!(color, Color::rgba(0xec, 0x48, 0x99, 0x80));
        assert_eq!(color.to_string(), "#ec489980");
    }

    #[test]
    fn rejects_garbage() {
        assert!("#12".parse::<Color>().is_err());
        assert!("#zzzzzz".parse::<Color>().is_err());
        assert!("#1234567".parse::<Color>().is_err());
    }

    #[test]
    fn deserializes_from_json_string() {
        let color: Color = serde_json::from_str("\"#3b82f6\"").unwrap();
        assert_eq!(color, Color::rgb(0x3b, 0x82, 0xf6));
        assert_eq!(serde_json::to_string(&color).unwrap(), "\"#3b82f6\"");
    }

    #[test]
    fn opacity_scales_alpha() {
        assert_eq!(Color::WHITE.with_opacity(0.5).alpha, 128);
        assert!(Color::WHITE.with_opacity(0.0).is_transparent());
    }
}
