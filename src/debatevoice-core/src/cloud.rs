//! Client for the Edge read-aloud cloud voices.
//!
//! Each synthesis opens a WebSocket, sends a `speech.config` message and an
//! `ssml` message, then collects `Path:audio` binary frames until the
//! service sends `Path:turn.end`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info};
use uuid::Uuid;

use crate::audio::{AudioArtifact, AudioFormat};
use crate::backend::{CloudBackend, CloudRequest};
use crate::config::CloudSettings;
use crate::error::VoiceError;
use crate::text::{escape_xml, escaped_len, split_into_chunks_by};
use crate::voice::{BackendKind, Prosody};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const BACKEND: BackendKind = BackendKind::Cloud;

const ORIGIN: &str = "chrome-extension://jdiccldimpdaibmpdkjnbmckianbfold";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36 Edg/130.0.0.0";

/// Seconds between 1601-01-01 and 1970-01-01.
const WINDOWS_EPOCH_OFFSET: i64 = 11_644_473_600;

/// A voice offered by the cloud service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct CloudVoiceInfo {
    pub short_name: String,
    pub gender: String,
    pub locale: String,
    #[serde(default)]
    pub friendly_name: String,
}

/// Edge read-aloud client.
#[derive(Debug, Clone)]
pub struct CloudClient {
    settings: CloudSettings,
    http: reqwest::Client,
}

impl CloudClient {
    pub fn new(settings: CloudSettings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    pub fn settings(&self) -> &CloudSettings {
        &self.settings
    }

    /// Fetch the voice catalogue, optionally keeping only locales starting
    /// with `locale_prefix` (case-insensitive).
    pub async fn list_voices(
        &self,
        locale_prefix: Option<&str>,
    ) -> Result<Vec<CloudVoiceInfo>, VoiceError> {
        let url = format!(
            "{}?trustedclienttoken={}",
            self.settings.voices_url, self.settings.trusted_client_token
        );
        debug!(%url, "fetching cloud voice list");

        let response = self
            .http
            .get(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(self.settings.timeout())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| VoiceError::unavailable(BACKEND, e))?;

        let mut voices: Vec<CloudVoiceInfo> = response
            .json()
            .await
            .map_err(|e| VoiceError::failed(BACKEND, format!("malformed voice list: {e}")))?;

        if let Some(prefix) = locale_prefix {
            let prefix = prefix.to_lowercase();
            voices.retain(|v| v.locale.to_lowercase().starts_with(&prefix));
        }
        voices.sort_by(|a, b| a.short_name.cmp(&b.short_name));
        Ok(voices)
    }

    fn connection_url(&self, now: DateTime<Utc>) -> String {
        format!(
            "{}?TrustedClientToken={}&Sec-MS-GEC={}&Sec-MS-GEC-Version={}&ConnectionId={}",
            self.settings.endpoint,
            self.settings.trusted_client_token,
            sec_ms_gec(&self.settings.trusted_client_token, now),
            self.settings.gec_version,
            Uuid::new_v4().simple()
        )
    }

    async fn connect(&self) -> Result<WsStream, VoiceError> {
        let mut request = self
            .connection_url(Utc::now())
            .into_client_request()
            .map_err(|e| VoiceError::unavailable(BACKEND, e))?;
        let headers = request.headers_mut();
        headers.insert("Origin", HeaderValue::from_static(ORIGIN));
        headers.insert("User-Agent", HeaderValue::from_static(USER_AGENT));
        headers.insert("Pragma", HeaderValue::from_static("no-cache"));
        headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));

        let (ws, _) = connect_async(request).await.map_err(|e| {
            VoiceError::unavailable(
                BACKEND,
                format!("cannot reach {} ({})", self.settings.endpoint, e),
            )
        })?;
        Ok(ws)
    }

    async fn run(&self, request: CloudRequest<'_>) -> Result<AudioArtifact, VoiceError> {
        // The limit applies to the text as it appears inside the SSML.
        let chunks = split_into_chunks_by(
            request.text,
            self.settings.max_ssml_text_bytes,
            escaped_len,
        );
        if chunks.len() > 1 {
            info!(chunks = chunks.len(), "text too long for one request, splitting");
        }

        let mut audio = Vec::new();
        for chunk in &chunks {
            let part = self
                .synthesize_chunk(chunk, request.voice_id, &request.prosody)
                .await?;
            audio.extend_from_slice(&part);
        }

        Ok(AudioArtifact::inline(
            audio,
            AudioFormat::Mp3,
            self.settings.sample_rate,
        ))
    }

    async fn synthesize_chunk(
        &self,
        text: &str,
        voice_id: &str,
        prosody: &Prosody,
    ) -> Result<Vec<u8>, VoiceError> {
        let mut ws = self.connect().await?;
        let timestamp = edge_timestamp(Utc::now());
        let request_id = Uuid::new_v4().simple().to_string();

        ws.send(Message::text(speech_config_message(
            &timestamp,
            &self.settings.output_format,
        )))
        .await
        .map_err(|e| VoiceError::unavailable(BACKEND, e))?;

        let ssml = build_ssml(text, voice_id, prosody);
        debug!(voice = voice_id, %request_id, chars = text.len(), "sending SSML request");
        ws.send(Message::text(ssml_message(&request_id, &timestamp, &ssml)))
            .await
            .map_err(|e| VoiceError::unavailable(BACKEND, e))?;

        let audio = receive_audio(&mut ws).await;
        if let Err(e) = ws.close(None).await {
            debug!(error = %e, "closing cloud TTS connection failed");
        }
        audio
    }
}

#[async_trait]
impl CloudBackend for CloudClient {
    async fn synthesize(&self, request: CloudRequest<'_>) -> Result<AudioArtifact, VoiceError> {
        let timeout = self.settings.timeout();
        tokio::time::timeout(timeout, self.run(request))
            .await
            .unwrap_or(Err(VoiceError::SynthesisTimeout {
                backend: BACKEND,
                timeout,
            }))
    }
}

async fn receive_audio(ws: &mut WsStream) -> Result<Vec<u8>, VoiceError> {
    let mut audio = Vec::new();

    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                let (headers, _) = split_text_frame(text.as_str());
                match header_path(headers) {
                    Some("turn.end") => break,
                    Some(path) => debug!(path, "cloud TTS event"),
                    None => {}
                }
            }
            Some(Ok(Message::Binary(frame))) => {
                let (headers, payload) = split_binary_frame(&frame)?;
                if header_path(headers) == Some("audio") {
                    audio.extend_from_slice(payload);
                }
            }
            Some(Ok(Message::Close(_))) | None => {
                return Err(VoiceError::failed(
                    BACKEND,
                    "connection closed before the turn ended",
                ));
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(VoiceError::unavailable(BACKEND, e)),
        }
    }

    if audio.is_empty() {
        return Err(VoiceError::failed(BACKEND, "no audio was received"));
    }
    Ok(audio)
}

/// `Sec-MS-GEC` token: SHA-256 over the Windows file time, rounded down to
/// five minutes, followed by the client token.
fn sec_ms_gec(token: &str, now: DateTime<Utc>) -> String {
    let mut secs = now.timestamp() + WINDOWS_EPOCH_OFFSET;
    secs -= secs % 300;
    let ticks = secs as u128 * 10_000_000;

    Sha256::digest(format!("{ticks}{token}").as_bytes())
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect()
}

fn edge_timestamp(now: DateTime<Utc>) -> String {
    now.format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
        .to_string()
}

fn speech_config_message(timestamp: &str, output_format: &str) -> String {
    let body = serde_json::json!({
        "context": {
            "synthesis": {
                "audio": {
                    "metadataoptions": {
                        "sentenceBoundaryEnabled": "false",
                        "wordBoundaryEnabled": "false"
                    },
                    "outputFormat": output_format
                }
            }
        }
    });
    format!(
        "X-Timestamp:{timestamp}\r\nContent-Type:application/json; charset=utf-8\r\n\
         Path:speech.config\r\n\r\n{body}\r\n"
    )
}

fn ssml_message(request_id: &str, timestamp: &str, ssml: &str) -> String {
    format!(
        "X-RequestId:{request_id}\r\nContent-Type:application/ssml+xml\r\n\
         X-Timestamp:{timestamp}Z\r\nPath:ssml\r\n\r\n{ssml}"
    )
}

fn build_ssml(text: &str, voice_id: &str, prosody: &Prosody) -> String {
    format!(
        "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' xml:lang='en-US'>\
         <voice name='{}'><prosody pitch='{}' rate='{}' volume='{}'>{}</prosody></voice></speak>",
        escape_xml(voice_id),
        prosody.pitch,
        prosody.rate,
        prosody.volume,
        escape_xml(text)
    )
}

/// Split a text frame into its header block and body.
fn split_text_frame(frame: &str) -> (&str, &str) {
    frame.split_once("\r\n\r\n").unwrap_or((frame, ""))
}

/// Split a binary frame: a big-endian `u16` header length, the headers,
/// then the payload.
fn split_binary_frame(frame: &[u8]) -> Result<(&str, &[u8]), VoiceError> {
    let malformed = || VoiceError::failed(BACKEND, "malformed binary frame");

    let (len_bytes, rest) = frame.split_first_chunk::<2>().ok_or_else(malformed)?;
    let header_len = u16::from_be_bytes(*len_bytes) as usize;
    if header_len > rest.len() {
        return Err(malformed());
    }
    let (headers, payload) = rest.split_at(header_len);
    let headers = std::str::from_utf8(headers).map_err(|_| malformed())?;
    Ok((headers, payload))
}

fn header_path(headers: &str) -> Option<&str> {
    headers
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("Path"))
        .map(|(_, value)| value.trim())
}
