//! Audio artifacts returned by the synthesis backends.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::VoiceError;

/// Container format of synthesized audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
}

impl AudioFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
        }
    }
}

/// Where the audio bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioPayload {
    /// Audio returned over the wire.
    Inline(Vec<u8>),
    /// Audio written by the backend to a path on this machine.
    File(PathBuf),
}

/// Audio produced by a single synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub payload: AudioPayload,
    pub format: AudioFormat,
    pub sample_rate: u32,
}

impl AudioArtifact {
    pub fn inline(bytes: Vec<u8>, format: AudioFormat, sample_rate: u32) -> Self {
        Self {
            payload: AudioPayload::Inline(bytes),
            format,
            sample_rate,
        }
    }

    /// Size of inline audio, `None` for file payloads.
    pub fn inline_len(&self) -> Option<usize> {
        match &self.payload {
            AudioPayload::Inline(bytes) => Some(bytes.len()),
            AudioPayload::File(_) => None,
        }
    }

    /// Write the audio to `path`, copying file payloads.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), VoiceError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        match &self.payload {
            AudioPayload::Inline(bytes) => fs::write(path, bytes)?,
            AudioPayload::File(source) => {
                fs::copy(source, path)?;
            }
        }
        Ok(())
    }
}

/// Join WAV files end to end into a single WAV file.
///
/// Every input must share the first input's channel count, sample rate and
/// sample format.
pub fn concat_wav(parts: &[Vec<u8>]) -> Result<Vec<u8>, VoiceError> {
    let Some((first, rest)) = parts.split_first() else {
        return Err(VoiceError::Audio(hound::Error::FormatError(
            "no audio to combine",
        )));
    };

    let spec = hound::WavReader::new(Cursor::new(first.as_slice()))?.spec();
    let mut out = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut out, spec)?;
        for part in std::iter::once(first).chain(rest) {
            let mut reader = hound::WavReader::new(Cursor::new(part.as_slice()))?;
            let part_spec = reader.spec();
            if part_spec != spec {
                return Err(VoiceError::Audio(hound::Error::FormatError(
                    "audio chunks use different formats",
                )));
            }
            match spec.sample_format {
                hound::SampleFormat::Float => {
                    for sample in reader.samples::<f32>() {
                        writer.write_sample(sample?)?;
                    }
                }
                hound::SampleFormat::Int => {
                    for sample in reader.samples::<i32>() {
                        writer.write_sample(sample?)?;
                    }
                }
            }
        }
        writer.finalize()?;
    }

    Ok(out.into_inner())
}

/// Sample rate declared in a WAV header.
pub fn wav_sample_rate(bytes: &[u8]) -> Result<u32, VoiceError> {
    Ok(hound::WavReader::new(Cursor::new(bytes))?.spec().sample_rate)
}

/// Generate a file name for a synthesized line.
pub fn generate_output_filename(voice: &str, text: &str, format: AudioFormat) -> String {
    let sanitize = |s: &str| -> String {
        s.chars()
            .map(|c| {
                if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    };

    let excerpt: String = sanitize(text).chars().take(40).collect();

    format!(
        "DebateVoice - {} - {}.{}",
        sanitize(voice).trim(),
        excerpt.trim(),
        format.extension()
    )
}
