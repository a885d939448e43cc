use thiserror::Error;

/// Library error type for composition and export operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The intake collaborator handed over something that is not an image.
    #[error("please select an image file")]
    NotAnImage,

    /// The bytes looked like an image but could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    /// Container or content has not been laid out yet. Callers defer and retry.
    #[error("frame geometry is not measurable yet")]
    GeometryUnavailable,

    /// The composition is not in a state that can be exported.
    #[error("export precondition failed: {0}")]
    ExportPrecondition(String),

    /// Another export is still in flight against the same composition.
    #[error("an export is already in progress")]
    ExportInProgress,

    /// Rasterizing the composition failed.
    #[error("capture failed: {0:#}")]
    Capture(anyhow::Error),

    /// Encoding the rasterized bitmap failed.
    #[error("failed to encode export: {0}")]
    Encode(#[source] image::ImageError),

    /// QR or other secondary artifact generation failed. Never fails an export.
    #[error("secondary artifact failed: {0:#}")]
    SecondaryArtifact(anyhow::Error),

    /// Underlying IO error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// YAML/serde configuration error.
    #[error(transparent)]
    Config(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether the user can simply invoke the same action again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ExportPrecondition(_)
                | Self::ExportInProgress
                | Self::Capture(_)
                | Self::Encode(_)
                | Self::GeometryUnavailable
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
