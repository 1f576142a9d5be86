use base64::Engine as _;

use crate::foundation::error::{NewsreelError, NewsreelResult};

/// Default still duration for a clip without an explicit `durationSeconds`.
pub const DEFAULT_CLIP_DURATION_SECS: f64 = 5.0;

fn default_clip_duration() -> f64 {
    DEFAULT_CLIP_DURATION_SECS
}

/// Reference to an uploaded asset: base64 payload plus declared content type.
///
/// Deserializes from either `{ "data": ..., "contentType": ... }` or a bare string. Bare strings
/// may be data URLs (`data:image/png;base64,...`), in which case the content type is taken from
/// the header.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase", from = "AssetRefRepr")]
pub struct AssetRef {
    /// Base64 payload (data URL header already stripped).
    pub data: String,
    /// Declared MIME type, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum AssetRefRepr {
    Inline(String),
    #[serde(rename_all = "camelCase")]
    Object {
        data: String,
        #[serde(default, alias = "content_type", alias = "mimeType")]
        content_type: Option<String>,
    },
}

impl From<AssetRefRepr> for AssetRef {
    fn from(repr: AssetRefRepr) -> Self {
        match repr {
            AssetRefRepr::Inline(s) => Self::parse_inline(&s),
            AssetRefRepr::Object { data, content_type } => {
                let mut r = Self::parse_inline(&data);
                if content_type.as_deref().is_some_and(|c| !c.trim().is_empty()) {
                    r.content_type = content_type;
                }
                r
            }
        }
    }
}

impl AssetRef {
    /// Build a reference from an already base64-encoded payload.
    pub fn new(data: impl Into<String>, content_type: Option<&str>) -> Self {
        Self {
            data: data.into(),
            content_type: content_type.map(str::to_string),
        }
    }

    /// Build a reference by base64-encoding raw bytes.
    pub fn from_bytes(bytes: &[u8], content_type: &str) -> Self {
        Self {
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
            content_type: Some(content_type.to_string()),
        }
    }

    fn parse_inline(s: &str) -> Self {
        let s = s.trim();
        let Some(rest) = s.strip_prefix("data:") else {
            return Self::new(s, None);
        };
        let Some((header, payload)) = rest.split_once(',') else {
            return Self::new(s, None);
        };
        let mime = header.split(';').next().unwrap_or_default().trim();
        Self {
            data: payload.to_string(),
            content_type: (!mime.is_empty()).then(|| mime.to_string()),
        }
    }

    /// `true` when the payload carries no data at all.
    pub fn is_blank(&self) -> bool {
        self.data.trim().is_empty()
    }
}

/// One still image shown for a fixed duration.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    /// Image shown for the whole clip.
    #[serde(alias = "imageData")]
    pub image: AssetRef,
    /// Display duration in seconds (> 0).
    #[serde(default = "default_clip_duration", alias = "duration")]
    pub duration_seconds: f64,
}

impl Clip {
    /// Create a clip showing `image` for `duration_seconds`.
    pub fn new(image: AssetRef, duration_seconds: f64) -> Self {
        Self {
            image,
            duration_seconds,
        }
    }
}

/// Declarative render request as received from the HTTP boundary.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    /// Narration; governs the audio length. Required.
    #[serde(default, alias = "audioData", skip_serializing_if = "Option::is_none")]
    pub voice_track: Option<AssetRef>,
    /// Music bed mixed under the voice.
    #[serde(default, alias = "bgmData", skip_serializing_if = "Option::is_none")]
    pub background_music: Option<AssetRef>,
    /// Logo composited top-left over the slideshow.
    #[serde(default, alias = "logoData", skip_serializing_if = "Option::is_none")]
    pub logo_overlay: Option<AssetRef>,
    /// Ordered clips. Must be non-empty.
    #[serde(default)]
    pub clips: Vec<Clip>,
}

impl RenderRequest {
    /// Start a request with the mandatory voice track.
    pub fn new(voice_track: AssetRef) -> Self {
        Self {
            voice_track: Some(voice_track),
            ..Self::default()
        }
    }

    /// Append a clip.
    pub fn with_clip(mut self, clip: Clip) -> Self {
        self.clips.push(clip);
        self
    }

    /// Set the logo overlay.
    pub fn with_logo(mut self, logo: AssetRef) -> Self {
        self.logo_overlay = Some(logo);
        self
    }

    /// Set the background music.
    pub fn with_music(mut self, music: AssetRef) -> Self {
        self.background_music = Some(music);
        self
    }

    /// Parse a request from JSON text.
    pub fn from_json_str(s: &str) -> NewsreelResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| NewsreelError::invalid_request(format!("request JSON: {e}")))
    }

    /// Structural validation done before any asset is touched.
    pub fn validate(&self) -> NewsreelResult<()> {
        match &self.voice_track {
            Some(v) if !v.is_blank() => {}
            _ => return Err(NewsreelError::invalid_request("voice track is required")),
        }
        if self.clips.is_empty() {
            return Err(NewsreelError::invalid_request(
                "at least one clip is required",
            ));
        }
        for (i, clip) in self.clips.iter().enumerate() {
            let d = clip.duration_seconds;
            if !d.is_finite() || d <= 0.0 {
                return Err(NewsreelError::invalid_request(format!(
                    "clip {i} duration must be a positive number of seconds (got {d})"
                )));
            }
        }
        Ok(())
    }

    /// Sum of all clip durations, i.e. the length of the concatenated slideshow.
    pub fn total_clip_secs(&self) -> f64 {
        self.clips.iter().map(|c| c.duration_seconds).sum()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/request/model.rs"]
mod tests;
