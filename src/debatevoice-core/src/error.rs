//! Error types for voice lookup and synthesis.

use std::time::Duration;

use thiserror::Error;

use crate::voice::BackendKind;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("Unknown voice '{name}'. Available voices: {}", available.join(", "))]
    UnknownVoice { name: String, available: Vec<String> },

    #[error("Invalid configuration for voice '{voice}': field `{field}` {reason}")]
    InvalidVoiceConfig {
        voice: String,
        field: &'static str,
        reason: String,
    },

    #[error("Cannot synthesize empty text")]
    EmptyText,

    #[error("The {backend} backend is unavailable: {reason}")]
    BackendUnavailable { backend: BackendKind, reason: String },

    #[error("The {backend} backend did not finish within {}s", timeout.as_secs())]
    SynthesisTimeout {
        backend: BackendKind,
        timeout: Duration,
    },

    #[error("The {backend} backend reported an error: {message}")]
    SynthesisFailed { backend: BackendKind, message: String },

    #[error("Audio error: {0}")]
    Audio(#[from] hound::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceError {
    pub(crate) fn invalid(
        voice: impl Into<String>,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        VoiceError::InvalidVoiceConfig {
            voice: voice.into(),
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn unavailable(backend: BackendKind, reason: impl ToString) -> Self {
        VoiceError::BackendUnavailable {
            backend,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn failed(backend: BackendKind, message: impl Into<String>) -> Self {
        VoiceError::SynthesisFailed {
            backend,
            message: message.into(),
        }
    }
}
