//! Encoding collaborators.
//!
//! The pipeline never links a codec: every stage is handed to a [`encoder::MediaEncoder`] as a
//! bound argument list.

/// Dry-run encoder used by tests and `--dry-run`.
pub mod dry_run;
/// Encoder trait and argument construction.
pub mod encoder;
/// `ffmpeg`/`ffprobe` subprocess encoder.
pub mod ffmpeg;
