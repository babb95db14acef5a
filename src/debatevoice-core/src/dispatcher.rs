//! Synthesis dispatch.
//!
//! Resolves a voice name through the registry and hands the text to the
//! backend that voice is configured for. One backend call per request, no
//! retries.

use std::sync::Arc;

use tracing::{debug, info};

use crate::audio::AudioArtifact;
use crate::backend::{CloudBackend, CloudRequest, NeuralBackend, NeuralRequest};
use crate::cloud::CloudClient;
use crate::config::Config;
use crate::error::VoiceError;
use crate::neural::NeuralClient;
use crate::registry::VoiceRegistry;
use crate::voice::{BackendKind, VoiceBackend};

/// Result of a successful synthesis call.
#[derive(Debug, Clone)]
pub struct Synthesis {
    /// Voice name as registered.
    pub voice: String,
    /// Backend that produced the audio.
    pub backend: BackendKind,
    pub artifact: AudioArtifact,
}

/// Routes synthesis requests to the backend configured for each voice.
#[derive(Clone)]
pub struct SynthesisDispatcher {
    registry: Arc<VoiceRegistry>,
    neural: Arc<dyn NeuralBackend>,
    cloud: Arc<dyn CloudBackend>,
}

impl SynthesisDispatcher {
    pub fn new(
        registry: Arc<VoiceRegistry>,
        neural: Arc<dyn NeuralBackend>,
        cloud: Arc<dyn CloudBackend>,
    ) -> Self {
        Self {
            registry,
            neural,
            cloud,
        }
    }

    /// Build a dispatcher with the network clients described by `config`.
    pub fn from_config(config: &Config) -> Result<Self, VoiceError> {
        let registry = config.registry()?;
        Ok(Self::new(
            Arc::new(registry),
            Arc::new(NeuralClient::new(config.neural.clone())),
            Arc::new(CloudClient::new(config.cloud.clone())),
        ))
    }

    pub fn registry(&self) -> &VoiceRegistry {
        &self.registry
    }

    /// Synthesize `text` with the voice registered as `voice_name`.
    ///
    /// Leading and trailing whitespace is stripped first, and the backend
    /// receives the trimmed text. Text that is empty after trimming fails
    /// with [`VoiceError::EmptyText`] before the voice is looked up.
    pub async fn synthesize(&self, text: &str, voice_name: &str) -> Result<Synthesis, VoiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VoiceError::EmptyText);
        }

        let voice = self.registry.lookup(voice_name)?;
        debug!(
            voice = %voice.name,
            backend = %voice.kind(),
            params = %voice.describe(),
            "dispatching synthesis"
        );

        let artifact = match &voice.backend {
            VoiceBackend::Neural { speaker_slot } => {
                self.neural
                    .synthesize(NeuralRequest {
                        text,
                        speaker_slot: *speaker_slot,
                    })
                    .await?
            }
            VoiceBackend::Cloud(cloud) => {
                self.cloud
                    .synthesize(CloudRequest {
                        text,
                        voice_id: &cloud.voice_id,
                        prosody: cloud.prosody,
                    })
                    .await?
            }
        };

        info!(
            voice = %voice.name,
            backend = %voice.kind(),
            bytes = ?artifact.inline_len(),
            "synthesis finished"
        );

        Ok(Synthesis {
            voice: voice.name.clone(),
            backend: voice.kind(),
            artifact,
        })
    }
}
