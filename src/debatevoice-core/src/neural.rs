//! WebSocket client for the local neural model server.
//!
//! The server accepts one JSON request per text frame and answers with JSON
//! status frames (`loading`, `queued`, `success` or `error`). On `success`
//! in stream mode the audio follows as a single binary WAV frame; in file
//! mode the status carries the path of a file the server wrote.

use std::env;
use std::path::PathBuf;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::audio::{self, AudioArtifact, AudioFormat, AudioPayload};
use crate::backend::{NeuralBackend, NeuralRequest};
use crate::config::{NeuralSettings, ResponseMode};
use crate::error::VoiceError;
use crate::text::split_into_chunks;
use crate::voice::{BackendKind, SpeakerSlot};

/// Variable the model server needs to skip its compilation step.
pub const NO_TORCH_COMPILE_ENV: &str = "NO_TORCH_COMPILE";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const BACKEND: BackendKind = BackendKind::Neural;

/// Whether `NO_TORCH_COMPILE=1` is set in this process's environment.
pub fn torch_compile_disabled() -> bool {
    env::var(NO_TORCH_COMPILE_ENV)
        .map(|v| v.trim() == "1")
        .unwrap_or(false)
}

#[derive(Debug, Serialize)]
struct TtsRequest<'a> {
    text: &'a str,
    speaker: u32,
    sample_rate: u32,
    response_mode: &'static str,
    max_audio_length_ms: u64,
}

#[derive(Debug, Deserialize)]
struct StatusReply {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    queue_position: Option<serde_json::Value>,
    #[serde(default)]
    length_bytes: Option<usize>,
    #[serde(default)]
    sample_rate: Option<u32>,
    #[serde(default)]
    filepath: Option<String>,
}

/// Audio handed back for one request.
enum Reply {
    Audio { bytes: Vec<u8>, sample_rate: u32 },
    File { path: PathBuf, sample_rate: u32 },
}

/// Neural model server client.
#[derive(Debug, Clone)]
pub struct NeuralClient {
    settings: NeuralSettings,
}

impl NeuralClient {
    pub fn new(settings: NeuralSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &NeuralSettings {
        &self.settings
    }

    async fn connect(&self) -> Result<WsStream, VoiceError> {
        debug!(url = %self.settings.url, "connecting to neural TTS server");
        let (ws, _) = connect_async(self.settings.url.as_str()).await.map_err(|e| {
            VoiceError::unavailable(
                BACKEND,
                format!(
                    "cannot reach TTS server at {} ({}); make sure the model server is running",
                    self.settings.url, e
                ),
            )
        })?;
        Ok(ws)
    }

    async fn run(&self, request: NeuralRequest<'_>) -> Result<AudioArtifact, VoiceError> {
        let mut ws = self.connect().await?;

        let result = if request.text.len() > self.settings.max_message_bytes {
            self.run_chunked(&mut ws, request).await
        } else {
            self.exchange(&mut ws, request.text, request.speaker_slot, self.settings.response_mode)
                .await
                .map(|reply| match reply {
                    Reply::Audio { bytes, sample_rate } => {
                        AudioArtifact::inline(bytes, AudioFormat::Wav, sample_rate)
                    }
                    Reply::File { path, sample_rate } => AudioArtifact {
                        payload: AudioPayload::File(path),
                        format: AudioFormat::Wav,
                        sample_rate,
                    },
                })
        };

        if let Err(e) = ws.close(None).await {
            debug!(error = %e, "closing neural TTS connection failed");
        }
        result
    }

    /// Send oversized text as a series of stream-mode requests over one
    /// connection and join the returned WAV audio.
    async fn run_chunked(
        &self,
        ws: &mut WsStream,
        request: NeuralRequest<'_>,
    ) -> Result<AudioArtifact, VoiceError> {
        let chunks = split_into_chunks(request.text, self.settings.chunk_chars);
        info!(
            bytes = request.text.len(),
            chunks = chunks.len(),
            "text too long for one message, splitting"
        );

        let mut parts = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            debug!(chunk = i + 1, total = chunks.len(), chars = chunk.len(), "sending chunk");
            match self
                .exchange(ws, chunk, request.speaker_slot, ResponseMode::Stream)
                .await?
            {
                Reply::Audio { bytes, .. } => parts.push(bytes),
                Reply::File { .. } => {
                    return Err(VoiceError::failed(
                        BACKEND,
                        "server returned a file for a stream request",
                    ));
                }
            }
        }

        let combined = audio::concat_wav(&parts)?;
        let sample_rate = audio::wav_sample_rate(&combined)?;
        Ok(AudioArtifact::inline(combined, AudioFormat::Wav, sample_rate))
    }

    async fn exchange(
        &self,
        ws: &mut WsStream,
        text: &str,
        speaker_slot: SpeakerSlot,
        mode: ResponseMode,
    ) -> Result<Reply, VoiceError> {
        let request = TtsRequest {
            text,
            speaker: speaker_slot.get(),
            sample_rate: self.settings.sample_rate,
            response_mode: mode.as_str(),
            max_audio_length_ms: self.settings.max_audio_length_ms,
        };
        let payload = serde_json::to_string(&request)
            .map_err(|e| VoiceError::failed(BACKEND, format!("cannot encode request: {e}")))?;

        debug!(speaker = request.speaker, chars = text.len(), "sending TTS request");
        ws.send(Message::text(payload))
            .await
            .map_err(|e| VoiceError::unavailable(BACKEND, e))?;

        let status = loop {
            let reply = next_status(ws).await?;
            match reply.status.as_str() {
                "loading" => debug!("TTS model is still loading, waiting"),
                "queued" => debug!(position = ?reply.queue_position, "request queued, waiting"),
                _ => break reply,
            }
        };

        if status.status != "success" {
            return Err(VoiceError::failed(
                BACKEND,
                status
                    .message
                    .unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }

        let sample_rate = status.sample_rate.unwrap_or(self.settings.sample_rate);
        match mode {
            ResponseMode::File => {
                let path = status.filepath.ok_or_else(|| {
                    VoiceError::failed(BACKEND, "success reply did not include a filepath")
                })?;
                Ok(Reply::File {
                    path: PathBuf::from(path),
                    sample_rate,
                })
            }
            ResponseMode::Stream => {
                let bytes = next_binary(ws).await?;
                if let Some(expected) = status.length_bytes {
                    if bytes.len() < expected {
                        warn!(
                            expected,
                            received = bytes.len(),
                            "received fewer audio bytes than announced"
                        );
                    }
                }
                Ok(Reply::Audio { bytes, sample_rate })
            }
        }
    }
}

#[async_trait]
impl NeuralBackend for NeuralClient {
    async fn synthesize(&self, request: NeuralRequest<'_>) -> Result<AudioArtifact, VoiceError> {
        let timeout = self.settings.timeout();
        tokio::time::timeout(timeout, self.run(request))
            .await
            .unwrap_or(Err(VoiceError::SynthesisTimeout {
                backend: BACKEND,
                timeout,
            }))
    }
}

async fn next_status(ws: &mut WsStream) -> Result<StatusReply, VoiceError> {
    loop {
        match next_message(ws).await? {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).map_err(|e| {
                    VoiceError::failed(BACKEND, format!("malformed status message: {e}"))
                });
            }
            Message::Binary(_) => {
                return Err(VoiceError::failed(
                    BACKEND,
                    "received audio before a status message",
                ));
            }
            _ => continue,
        }
    }
}

async fn next_binary(ws: &mut WsStream) -> Result<Vec<u8>, VoiceError> {
    loop {
        match next_message(ws).await? {
            Message::Binary(bytes) => return Ok(bytes.to_vec()),
            Message::Text(text) => {
                return Err(VoiceError::failed(
                    BACKEND,
                    format!("expected audio data, got text: {}", text.as_str()),
                ));
            }
            _ => continue,
        }
    }
}

/// Next data frame; control frames are passed through for the caller to skip.
async fn next_message(ws: &mut WsStream) -> Result<Message, VoiceError> {
    match ws.next().await {
        Some(Ok(Message::Close(frame))) => Err(VoiceError::failed(
            BACKEND,
            format!(
                "server closed the connection{}",
                frame
                    .map(|f| format!(": {}", f.reason.as_str()))
                    .unwrap_or_default()
            ),
        )),
        Some(Ok(message)) => Ok(message),
        Some(Err(e)) => Err(VoiceError::unavailable(BACKEND, e)),
        None => Err(VoiceError::failed(
            BACKEND,
            "server closed the connection",
        )),
    }
}
