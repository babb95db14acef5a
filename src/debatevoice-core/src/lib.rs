//! DebateVoice Core Library
//!
//! Provides the voice registry, the synthesis dispatcher and the clients
//! for the neural and cloud speech backends.

pub mod audio;
pub mod backend;
pub mod cloud;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod neural;
pub mod registry;
pub mod text;
pub mod voice;

pub use audio::{AudioArtifact, AudioFormat, AudioPayload};
pub use backend::{CloudBackend, CloudRequest, NeuralBackend, NeuralRequest};
pub use cloud::{CloudClient, CloudVoiceInfo};
pub use config::{Config, default_config};
pub use dispatcher::{Synthesis, SynthesisDispatcher};
pub use error::VoiceError;
pub use neural::NeuralClient;
pub use registry::VoiceRegistry;
pub use voice::{BackendKind, Percent, Prosody, SpeakerSlot, VoiceBackend, VoiceConfig, VoiceEntry};
