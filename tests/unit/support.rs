use std::io::Cursor;

use crate::assets::resolver::{AssetResolver, ResolvedAssets};
use crate::graph::builder::GraphBuilder;
use crate::graph::ir::CompositionGraph;
use crate::request::config::RenderConfig;
use crate::request::model::{AssetRef, Clip, RenderRequest};

pub(crate) fn png_bytes(w: u32, h: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(w, h, image::Rgb(rgb));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

pub(crate) fn png_ref(w: u32, h: u32, rgb: [u8; 3]) -> AssetRef {
    AssetRef::from_bytes(&png_bytes(w, h, rgb), "image/png")
}

/// Audio payloads are never decoded by the resolver, so any bytes do.
pub(crate) fn audio_ref() -> AssetRef {
    AssetRef::from_bytes(b"RIFF\0\0\0\0WAVEfmt ", "audio/wav")
}

pub(crate) fn request(durations: &[f64], logo: bool, music: bool) -> RenderRequest {
    let mut req = RenderRequest::new(audio_ref());
    for (i, d) in durations.iter().enumerate() {
        let shade = (i * 40 % 256) as u8;
        req = req.with_clip(Clip::new(png_ref(64, 36, [shade, 0, 255 - shade]), *d));
    }
    if logo {
        req = req.with_logo(png_ref(32, 16, [255, 255, 255]));
    }
    if music {
        req = req.with_music(AssetRef::from_bytes(b"ID3\x03\0\0\0\0\0\0", "audio/mpeg"));
    }
    req
}

pub(crate) fn resolved(req: &RenderRequest) -> ResolvedAssets {
    AssetResolver::new().resolve_request(req).unwrap()
}

pub(crate) fn graph_with(
    cfg: &RenderConfig,
    durations: &[f64],
    logo: bool,
    music: bool,
) -> CompositionGraph {
    let req = request(durations, logo, music);
    GraphBuilder::new(cfg).build(&req, &resolved(&req)).unwrap()
}

pub(crate) fn graph(durations: &[f64], logo: bool, music: bool) -> CompositionGraph {
    graph_with(&RenderConfig::default(), durations, logo, music)
}
