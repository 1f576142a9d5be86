use crate::foundation::error::{NewsreelError, NewsreelResult};

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create a canvas usable for yuv420p H.264 output (non-zero, even dimensions).
    pub fn new(width: u32, height: u32) -> NewsreelResult<Self> {
        let canvas = Self { width, height };
        canvas.validate()?;
        Ok(canvas)
    }

    /// Check the canvas is non-empty and has even dimensions.
    pub fn validate(self) -> NewsreelResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(NewsreelError::config("canvas width/height must be non-zero"));
        }
        if !self.width.is_multiple_of(2) || !self.height.is_multiple_of(2) {
            // yuv420p subsamples chroma 2x2.
            return Err(NewsreelError::config(
                "canvas width/height must be even (required for yuv420p output)",
            ));
        }
        Ok(())
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Canonical pixel format every clip stream is forced into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// Planar YUV 4:2:0, 8 bit.
    #[default]
    Yuv420p,
}

impl PixelFormat {
    /// Name understood by the encoder.
    pub fn as_ffmpeg(self) -> &'static str {
        match self {
            Self::Yuv420p => "yuv420p",
        }
    }
}

/// How a clip image is fitted into the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FitPolicy {
    /// Scale to fit inside, pad the remainder with the fill color (letterbox).
    #[default]
    Contain,
    /// Scale to cover, crop the overflow.
    Cover,
}

impl std::str::FromStr for FitPolicy {
    type Err = NewsreelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "contain" => Ok(Self::Contain),
            "cover" => Ok(Self::Cover),
            other => Err(NewsreelError::config(format!(
                "unknown fit policy '{other}' (expected 'contain' or 'cover')"
            ))),
        }
    }
}

/// Opaque RGB8 color, serialized as `#rrggbb`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb8 {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb8 {
    /// Encoder color literal (`0xRRGGBB`).
    pub fn as_ffmpeg(self) -> String {
        format!("0x{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl TryFrom<String> for Rgb8 {
    type Error = NewsreelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let hex = value.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(NewsreelError::config(format!(
                "color '{value}' must be in '#rrggbb' form"
            )));
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map_err(|e| NewsreelError::config(format!("color '{value}': {e}")))
        };
        Ok(Self {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

impl From<Rgb8> for String {
    fn from(c: Rgb8) -> Self {
        format!("#{:02x}{:02x}{:02x}", c.r, c.g, c.b)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
