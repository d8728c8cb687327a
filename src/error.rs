//! Error types for the piano-to-score system

use std::fmt;

/// Custom error type for transcription
#[derive(Debug, Clone)]
pub enum TranscribeError {
    /// E001: Audio source could not be opened or decoded
    AudioLoadFailed(String),
    /// E002: Container/codec not supported by the decoder
    UnsupportedAudioFormat(String),
    /// E003: Decoded buffer contains no samples
    EmptyAudio,
    /// E004: Invalid configuration parameter
    InvalidConfigParameter(String),
    /// E005: Configuration file could not be read or written
    ConfigIo(String),
    /// E006: Transcription was cancelled between stages
    Cancelled(String),
    /// E007: Transcription export error
    ExportError(String),
}

impl TranscribeError {
    /// True for failures at the audio load boundary
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            TranscribeError::AudioLoadFailed(_)
                | TranscribeError::UnsupportedAudioFormat(_)
                | TranscribeError::EmptyAudio
        )
    }

    /// True for configuration rejections
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TranscribeError::InvalidConfigParameter(_) | TranscribeError::ConfigIo(_)
        )
    }
}

impl fmt::Display for TranscribeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscribeError::AudioLoadFailed(msg) => {
                write!(f, "E001: Audio load failed - {}", msg)
            }
            TranscribeError::UnsupportedAudioFormat(msg) => {
                write!(f, "E002: Unsupported audio format - {}", msg)
            }
            TranscribeError::EmptyAudio => {
                write!(f, "E003: Audio source contains no samples")
            }
            TranscribeError::InvalidConfigParameter(msg) => {
                write!(f, "E004: Invalid configuration parameter - {}", msg)
            }
            TranscribeError::ConfigIo(msg) => {
                write!(f, "E005: Configuration I/O error - {}", msg)
            }
            TranscribeError::Cancelled(stage) => {
                write!(f, "E006: Transcription cancelled before {}", stage)
            }
            TranscribeError::ExportError(msg) => {
                write!(f, "E007: Export error - {}", msg)
            }
        }
    }
}

impl std::error::Error for TranscribeError {}

// From implementations for common error types
impl From<std::io::Error> for TranscribeError {
    fn from(err: std::io::Error) -> Self {
        TranscribeError::AudioLoadFailed(format!("File I/O error: {}", err))
    }
}

impl From<hound::Error> for TranscribeError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => TranscribeError::AudioLoadFailed(e.to_string()),
            hound::Error::Unsupported => {
                TranscribeError::UnsupportedAudioFormat("WAV feature not supported".to_string())
            }
            other => TranscribeError::AudioLoadFailed(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for TranscribeError {
    fn from(err: serde_json::Error) -> Self {
        TranscribeError::ExportError(format!("JSON serialization error: {}", err))
    }
}

impl From<symphonia::core::errors::Error> for TranscribeError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error;
        match err {
            Error::Unsupported(what) => TranscribeError::UnsupportedAudioFormat(what.to_string()),
            Error::IoError(e) => TranscribeError::AudioLoadFailed(e.to_string()),
            other => TranscribeError::AudioLoadFailed(other.to_string()),
        }
    }
}

/// Result type alias for transcription operations
pub type Result<T> = std::result::Result<T, TranscribeError>;
