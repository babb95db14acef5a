//! Backend client traits.
//!
//! The dispatcher talks to the synthesis engines only through these traits,
//! so alternative clients can be plugged in.

use async_trait::async_trait;

use crate::audio::AudioArtifact;
use crate::error::VoiceError;
use crate::voice::{Prosody, SpeakerSlot};

/// Request for the neural model server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeuralRequest<'a> {
    pub text: &'a str,
    pub speaker_slot: SpeakerSlot,
}

/// Request for the cloud voice service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudRequest<'a> {
    pub text: &'a str,
    pub voice_id: &'a str,
    pub prosody: Prosody,
}

/// Client for the locally hosted neural speech model.
#[async_trait]
pub trait NeuralBackend: Send + Sync {
    async fn synthesize(&self, request: NeuralRequest<'_>) -> Result<AudioArtifact, VoiceError>;
}

/// Client for the hosted cloud voice service.
#[async_trait]
pub trait CloudBackend: Send + Sync {
    async fn synthesize(&self, request: CloudRequest<'_>) -> Result<AudioArtifact, VoiceError>;
}
