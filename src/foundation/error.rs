use std::time::Duration;

use crate::foundation::diag::excerpt_tail;

/// Convenience result type used across newsreel.
pub type NewsreelResult<T> = Result<T, NewsreelError>;

/// Classification of a non-zero encoder exit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The encoder rejected the filter graph. Indicates a builder defect.
    MalformedGraph,
    /// An input could not be read or decoded.
    CorruptAsset,
    /// Memory, disk or descriptor exhaustion on the encoder side.
    ResourceExhausted,
    /// The encoder process could not be spawned or reaped.
    Process,
    /// Anything the diagnostics did not let us pin down.
    Unknown,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::MalformedGraph => "malformed graph",
            Self::CorruptAsset => "corrupt asset",
            Self::ResourceExhausted => "resource exhausted",
            Self::Process => "process failure",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Top-level error taxonomy used by the render pipeline.
#[derive(thiserror::Error, Debug)]
pub enum NewsreelError {
    /// Missing voice track, empty clip list or otherwise unusable request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Asset payload is empty, malformed or of the wrong kind.
    #[error("asset decode error: {0}")]
    AssetDecode(String),

    /// Internal consistency violation in the composition graph.
    #[error("graph construction error: {0}")]
    GraphConstruction(String),

    /// The encoder ran but reported failure.
    #[error("encoding failure in stage '{stage}' ({kind}): {excerpt}")]
    EncodingFailure {
        /// Stage name, e.g. `normalize_clip_002` or `render`.
        stage: String,
        /// Classified cause.
        kind: FailureKind,
        /// Bounded tail of the encoder diagnostics.
        excerpt: String,
    },

    /// An encoder invocation exceeded its time bound.
    #[error("stage '{stage}' timed out after {}s", limit.as_secs_f64())]
    Timeout {
        /// Stage name.
        stage: String,
        /// Configured bound.
        limit: Duration,
    },

    /// Admission limit reached.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Invalid render configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Stable error kind exposed at the request boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`NewsreelError::InvalidRequest`].
    InvalidRequest,
    /// See [`NewsreelError::AssetDecode`].
    AssetDecodeError,
    /// See [`NewsreelError::GraphConstruction`].
    GraphConstructionError,
    /// See [`NewsreelError::EncodingFailure`].
    EncodingFailure,
    /// See [`NewsreelError::Timeout`].
    Timeout,
    /// See [`NewsreelError::ResourceExhausted`].
    ResourceExhausted,
    /// Configuration or IO problems on our side.
    Internal,
}

/// Structured, bounded error payload for the boundary layer.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct ErrorReport {
    /// Error kind.
    pub kind: ErrorKind,
    /// Human readable message, truncated to the requested bound.
    pub message: String,
}

impl NewsreelError {
    /// Build a [`NewsreelError::InvalidRequest`] value.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Build a [`NewsreelError::AssetDecode`] value.
    pub fn asset_decode(msg: impl Into<String>) -> Self {
        Self::AssetDecode(msg.into())
    }

    /// Build a [`NewsreelError::GraphConstruction`] value.
    pub fn graph(msg: impl Into<String>) -> Self {
        Self::GraphConstruction(msg.into())
    }

    /// Build a [`NewsreelError::ResourceExhausted`] value.
    pub fn exhausted(msg: impl Into<String>) -> Self {
        Self::ResourceExhausted(msg.into())
    }

    /// Build a [`NewsreelError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`NewsreelError::EncodingFailure`], truncating diagnostics to `max_bytes`.
    pub fn encoding(
        stage: impl Into<String>,
        kind: FailureKind,
        diagnostics: &str,
        max_bytes: usize,
    ) -> Self {
        Self::EncodingFailure {
            stage: stage.into(),
            kind,
            excerpt: excerpt_tail(diagnostics, max_bytes),
        }
    }

    /// Boundary-facing kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::AssetDecode(_) => ErrorKind::AssetDecodeError,
            Self::GraphConstruction(_) => ErrorKind::GraphConstructionError,
            Self::EncodingFailure { .. } => ErrorKind::EncodingFailure,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ResourceExhausted(_) => ErrorKind::ResourceExhausted,
            Self::Config(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Structured report with the message truncated to at most `max_bytes`.
    pub fn report(&self, max_bytes: usize) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: excerpt_tail(&self.to_string(), max_bytes),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
