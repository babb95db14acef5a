//! Configuration module for loading TOML config files.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::VoiceError;
use crate::registry::VoiceRegistry;
use crate::voice::{VoiceEntry, VoiceLimits};

/// Environment variable overriding `neural.url`.
pub const NEURAL_URL_ENV: &str = "DEBATEVOICE_NEURAL_URL";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub neural: NeuralSettings,
    #[serde(default)]
    pub cloud: CloudSettings,
    #[serde(default)]
    pub voices: Vec<VoiceEntry>,
}

/// How the neural server hands back audio.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Audio follows the metadata as a binary frame.
    #[default]
    Stream,
    /// The server writes a file and replies with its path.
    File,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Stream => "stream",
            ResponseMode::File => "file",
        }
    }
}

/// Settings for the local neural model server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct NeuralSettings {
    pub url: String,
    pub sample_rate: u32,
    pub response_mode: ResponseMode,
    pub max_audio_length_ms: u64,
    pub timeout_secs: u64,
    /// Texts larger than this many bytes are sent in chunks.
    pub max_message_bytes: usize,
    pub chunk_chars: usize,
    pub max_speaker_slot: u32,
}

impl Default for NeuralSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:9000".to_string(),
            sample_rate: 24000,
            response_mode: ResponseMode::Stream,
            max_audio_length_ms: 300_000,
            timeout_secs: 300,
            max_message_bytes: 500_000,
            chunk_chars: 500,
            max_speaker_slot: 1,
        }
    }
}

impl NeuralSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the Edge read-aloud service.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CloudSettings {
    pub endpoint: String,
    pub voices_url: String,
    pub trusted_client_token: String,
    pub gec_version: String,
    pub output_format: String,
    pub sample_rate: u32,
    pub timeout_secs: u64,
    pub max_ssml_text_bytes: usize,
}

impl Default for CloudSettings {
    fn default() -> Self {
        Self {
            endpoint: "wss://speech.platform.bing.com/consumer/speech/synthesize/readaloud/edge/v1"
                .to_string(),
            voices_url:
                "https://speech.platform.bing.com/consumer/speech/synthesize/readaloud/voices/list"
                    .to_string(),
            trusted_client_token: "6A5AA1D4EAFF4E9FB37E23D68491D6F4".to_string(),
            gec_version: "1-130.0.2849.68".to_string(),
            output_format: "audio-24khz-48kbitrate-mono-mp3".to_string(),
            sample_rate: 24000,
            timeout_secs: 60,
            max_ssml_text_bytes: 4096,
        }
    }
}

impl CloudSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, VoiceError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            VoiceError::ConfigError(format!(
                "Failed to read config {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    pub fn from_str(content: &str) -> Result<Self, VoiceError> {
        toml::from_str(content)
            .map_err(|e| VoiceError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var(NEURAL_URL_ENV) {
            if !url.trim().is_empty() {
                self.neural.url = url.trim().to_string();
            }
        }
    }

    pub fn voice_limits(&self) -> VoiceLimits {
        VoiceLimits {
            max_speaker_slot: self.neural.max_speaker_slot,
        }
    }

    /// Validate the voice table and build the registry.
    pub fn registry(&self) -> Result<VoiceRegistry, VoiceError> {
        VoiceRegistry::from_entries(&self.voices, &self.voice_limits())
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config {
        neural: NeuralSettings::default(),
        cloud: CloudSettings::default(),
        voices: vec![
            VoiceEntry::cloud("Narrator", "en-US-ChristopherNeural"),
            VoiceEntry::cloud("AI Debater 1", "en-GB-RyanNeural"),
            VoiceEntry::cloud("AI Debater 2", "en-US-JasonNeural"),
            VoiceEntry::cloud("Jane", "en-GB-SoniaNeural"),
            VoiceEntry::cloud("Valentino", "en-US-GuyNeural"),
            VoiceEntry::cloud("Jenny", "en-US-JennyNeural"),
            VoiceEntry::neural("CSM Male", 0),
            VoiceEntry::neural("CSM Female", 1),
        ],
    }
}
