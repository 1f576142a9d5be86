use std::io::Cursor;
use std::sync::Arc;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::foundation::error::{NewsreelError, NewsreelResult};
use crate::request::model::{AssetRef, RenderRequest};

/// Standard alphabet, padding optional.
const LENIENT_B64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Declared media kind of an asset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Still image.
    Image,
    /// Audio track.
    Audio,
}

/// The slot an asset fills in a request.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AssetRole {
    /// Narration track.
    Voice,
    /// Image of clip `n` (0-based, request order).
    Clip(usize),
    /// Logo overlay.
    Logo,
    /// Background music.
    Music,
}

impl AssetRole {
    /// Kind an asset in this slot must have.
    pub fn expected_kind(self) -> AssetKind {
        match self {
            Self::Voice | Self::Music => AssetKind::Audio,
            Self::Clip(_) | Self::Logo => AssetKind::Image,
        }
    }

    /// Stable file stem used when the asset is written to disk.
    pub fn file_stem(self) -> String {
        match self {
            Self::Voice => "voice".to_string(),
            Self::Clip(i) => format!("clip_{i:03}"),
            Self::Logo => "logo".to_string(),
            Self::Music => "music".to_string(),
        }
    }
}

impl std::fmt::Display for AssetRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Voice => f.write_str("voice track"),
            Self::Clip(i) => write!(f, "clip {i} image"),
            Self::Logo => f.write_str("logo overlay"),
            Self::Music => f.write_str("background music"),
        }
    }
}

/// Decoded asset owned by one pipeline run.
#[derive(Clone, Debug)]
pub struct Asset {
    /// Slot in the request.
    pub role: AssetRole,
    /// Declared kind.
    pub kind: AssetKind,
    /// File extension used when materialized.
    pub extension: &'static str,
    /// Raw payload.
    pub bytes: Arc<Vec<u8>>,
    /// Pixel dimensions, for images.
    pub dimensions: Option<(u32, u32)>,
}

/// All assets of a request, decoded.
#[derive(Clone, Debug)]
pub struct ResolvedAssets {
    /// Narration.
    pub voice: Asset,
    /// Clip images in request order.
    pub clips: Vec<Asset>,
    /// Optional logo.
    pub logo: Option<Asset>,
    /// Optional music bed.
    pub music: Option<Asset>,
}

impl ResolvedAssets {
    /// Iterate over every asset, voice first, then clips, logo and music.
    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        std::iter::once(&self.voice)
            .chain(self.clips.iter())
            .chain(self.logo.iter())
            .chain(self.music.iter())
    }

    /// Look up the asset filling `role`.
    pub fn get(&self, role: AssetRole) -> Option<&Asset> {
        match role {
            AssetRole::Voice => Some(&self.voice),
            AssetRole::Clip(i) => self.clips.get(i),
            AssetRole::Logo => self.logo.as_ref(),
            AssetRole::Music => self.music.as_ref(),
        }
    }
}

/// Maps asset references to decoded, typed assets. Never transforms content.
#[derive(Clone, Copy, Debug, Default)]
pub struct AssetResolver;

impl AssetResolver {
    /// Create a resolver.
    pub fn new() -> Self {
        Self
    }

    /// Decode one reference for `role`.
    pub fn resolve(&self, role: AssetRole, r: &AssetRef) -> NewsreelResult<Asset> {
        let kind = infer_kind(role, r.content_type.as_deref())?;
        let bytes = decode_payload(role, &r.data)?;

        let (extension, dimensions) = match kind {
            AssetKind::Image => {
                let (format, dims) = sniff_image(role, &bytes)?;
                let ext = r
                    .content_type
                    .as_deref()
                    .and_then(extension_for_content_type)
                    .or_else(|| format.extensions_str().first().copied())
                    .unwrap_or("img");
                (ext, Some(dims))
            }
            AssetKind::Audio => {
                let ext = r
                    .content_type
                    .as_deref()
                    .and_then(extension_for_content_type)
                    .unwrap_or("bin");
                (ext, None)
            }
        };

        Ok(Asset {
            role,
            kind,
            extension,
            bytes: Arc::new(bytes),
            dimensions,
        })
    }

    /// Decode every asset of a validated request.
    ///
    /// Blank optional references (logo, music) count as absent.
    #[tracing::instrument(skip_all, fields(clips = req.clips.len()))]
    pub fn resolve_request(&self, req: &RenderRequest) -> NewsreelResult<ResolvedAssets> {
        req.validate()?;
        let voice_ref = req
            .voice_track
            .as_ref()
            .ok_or_else(|| NewsreelError::invalid_request("voice track is required"))?;
        let voice = self.resolve(AssetRole::Voice, voice_ref)?;

        let clips = req
            .clips
            .iter()
            .enumerate()
            .map(|(i, c)| self.resolve(AssetRole::Clip(i), &c.image))
            .collect::<NewsreelResult<Vec<_>>>()?;

        let logo = match req.logo_overlay.as_ref().filter(|r| !r.is_blank()) {
            Some(r) => Some(self.resolve(AssetRole::Logo, r)?),
            None => None,
        };
        let music = match req.background_music.as_ref().filter(|r| !r.is_blank()) {
            Some(r) => Some(self.resolve(AssetRole::Music, r)?),
            None => None,
        };

        tracing::debug!(
            logo = logo.is_some(),
            music = music.is_some(),
            "resolved request assets"
        );
        Ok(ResolvedAssets {
            voice,
            clips,
            logo,
            music,
        })
    }
}

fn infer_kind(role: AssetRole, content_type: Option<&str>) -> NewsreelResult<AssetKind> {
    let essence = content_type
        .map(|c| c.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty());

    let kind = match essence.as_deref() {
        None if role.expected_kind() == AssetKind::Image => AssetKind::Image,
        None => {
            return Err(NewsreelError::asset_decode(format!(
                "{role}: content type is required for audio assets"
            )));
        }
        Some(c) if c.starts_with("image/") => AssetKind::Image,
        Some(c) if c.starts_with("audio/") => AssetKind::Audio,
        Some(c) if c.starts_with("video/") => {
            return Err(NewsreelError::asset_decode(format!(
                "{role}: content type '{c}' is ambiguous; declare image/* or audio/*"
            )));
        }
        Some(c) => {
            return Err(NewsreelError::asset_decode(format!(
                "{role}: unrecognized content type '{c}'"
            )));
        }
    };

    if kind != role.expected_kind() {
        return Err(NewsreelError::asset_decode(format!(
            "{role}: declared {kind:?} content where {:?} is required",
            role.expected_kind()
        )));
    }
    Ok(kind)
}

fn decode_payload(role: AssetRole, data: &str) -> NewsreelResult<Vec<u8>> {
    let compact: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(NewsreelError::asset_decode(format!("{role}: payload is empty")));
    }
    let bytes = LENIENT_B64
        .decode(compact.as_bytes())
        .map_err(|e| NewsreelError::asset_decode(format!("{role}: malformed base64: {e}")))?;
    if bytes.is_empty() {
        return Err(NewsreelError::asset_decode(format!(
            "{role}: payload decodes to zero bytes"
        )));
    }
    Ok(bytes)
}

fn sniff_image(role: AssetRole, bytes: &[u8]) -> NewsreelResult<(image::ImageFormat, (u32, u32))> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| NewsreelError::asset_decode(format!("{role}: {e}")))?;
    let format = reader
        .format()
        .ok_or_else(|| NewsreelError::asset_decode(format!("{role}: unrecognized image format")))?;
    let dims = reader
        .into_dimensions()
        .map_err(|e| NewsreelError::asset_decode(format!("{role}: undecodable image: {e}")))?;
    if dims.0 == 0 || dims.1 == 0 {
        return Err(NewsreelError::asset_decode(format!(
            "{role}: image has zero size"
        )));
    }
    Ok((format, dims))
}

/// File extension for a MIME type, when we know one.
pub(crate) fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let ext = match essence.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" | "image/pjpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" | "image/x-ms-bmp" => "bmp",
        "audio/mpeg" | "audio/mp3" => "mp3",
        "audio/wav" | "audio/x-wav" | "audio/wave" | "audio/vnd.wave" => "wav",
        "audio/aac" => "aac",
        "audio/mp4" | "audio/x-m4a" => "m4a",
        "audio/ogg" | "audio/opus" => "ogg",
        "audio/flac" | "audio/x-flac" => "flac",
        _ => return None,
    };
    Some(ext)
}

#[cfg(test)]
#[path = "../../tests/unit/assets/resolver.rs"]
mod tests;
