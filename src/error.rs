use std::{path::PathBuf, time::Duration};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForensicsError {
    #[error("Decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Decode error: {0}")]
    DecodeFailed(String),

    #[error("Metadata extraction error: {0}")]
    Metadata(String),

    #[error("ELA error: {0}")]
    Ela(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Input path does not exist: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Image has no pixels")]
    EmptyImage,

    #[error("Invalid perceptual hash: {0}")]
    InvalidHash(String),

    #[error("Analysis timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Report error: {0}")]
    Report(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),
}

/// Coarse classification used to decide how far a failure propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Decode,
    Metadata,
    Ela,
    Io,
    Configuration,
    Other,
}

impl ForensicsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ForensicsError::Decode(_) | ForensicsError::DecodeFailed(_) => ErrorKind::Decode,
            ForensicsError::Metadata(_) => ErrorKind::Metadata,
            ForensicsError::Ela(_) => ErrorKind::Ela,
            ForensicsError::Io(_) => ErrorKind::Io,
            ForensicsError::InvalidParameter(_)
            | ForensicsError::Configuration(_)
            | ForensicsError::InputNotFound(_) => ErrorKind::Configuration,
            _ => ErrorKind::Other,
        }
    }
}

impl From<csv::Error> for ForensicsError {
    fn from(err: csv::Error) -> Self {
        ForensicsError::Report(err.to_string())
    }
}

impl From<serde_json::Error> for ForensicsError {
    fn from(err: serde_json::Error) -> Self {
        ForensicsError::Report(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ForensicsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(ForensicsError::Ela("boom".into()).kind(), ErrorKind::Ela);
        assert_eq!(ForensicsError::DecodeFailed("x".into()).kind(), ErrorKind::Decode);
        assert_eq!(
            ForensicsError::InputNotFound(PathBuf::from("/nope")).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(ForensicsError::EmptyImage.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_decode_message_prefix() {
        let err = ForensicsError::DecodeFailed("truncated".into());
        assert_eq!(err.to_string(), "Decode error: truncated");
    }
}
