//! Voice definitions.
//!
//! A [`VoiceConfig`] names a voice and says which synthesis backend speaks
//! it. Raw [`VoiceEntry`] values come straight from the TOML file and are
//! only turned into `VoiceConfig`s through [`VoiceEntry::validate`].

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::VoiceError;

/// Lowest accepted prosody adjustment, in percent.
pub const MIN_PERCENT: i16 = -50;
/// Highest accepted prosody adjustment, in percent.
pub const MAX_PERCENT: i16 = 50;

static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([+-])?(\d{1,3})%$").expect("valid percent pattern"));

static CLOUD_VOICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2,3}-[A-Za-z]{2,4}(-[A-Za-z]+)*-[A-Za-z]+Neural$")
        .expect("valid voice id pattern")
});

/// Which synthesis engine a voice is rendered by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Locally hosted neural model server.
    Neural,
    /// Hosted cloud voice service.
    Cloud,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Neural => "neural",
            BackendKind::Cloud => "cloud",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Speaker identifier inside the neural model's embedding space.
///
/// This deployment labels slot 0 as male-coded and slot 1 as female-coded.
/// The label is informational only; the server receives the bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpeakerSlot(u32);

impl SpeakerSlot {
    pub const MALE: SpeakerSlot = SpeakerSlot(0);
    pub const FEMALE: SpeakerSlot = SpeakerSlot(1);

    pub fn new(slot: u32) -> Self {
        SpeakerSlot(slot)
    }

    pub fn get(&self) -> u32 {
        self.0
    }

    /// Human-readable label following the deployment convention.
    pub fn convention_label(&self) -> &'static str {
        match self.0 {
            0 => "male-coded",
            1 => "female-coded",
            _ => "unlabelled",
        }
    }
}

impl fmt::Display for SpeakerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signed percentage adjustment such as `+10%` or `-20%`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Percent(i16);

impl Percent {
    pub const ZERO: Percent = Percent(0);

    /// Build a percentage, rejecting values outside `MIN_PERCENT..=MAX_PERCENT`.
    pub fn new(value: i16) -> Result<Self, String> {
        if !(MIN_PERCENT..=MAX_PERCENT).contains(&value) {
            return Err(format!(
                "must be between {MIN_PERCENT}% and +{MAX_PERCENT}%, got {value}%"
            ));
        }
        Ok(Percent(value))
    }

    /// Parse the textual form used by configuration files.
    pub fn parse(text: &str) -> Result<Self, String> {
        let trimmed = text.trim();
        let caps = PERCENT_RE
            .captures(trimmed)
            .ok_or_else(|| format!("expected a percentage like \"+10%\", got \"{text}\""))?;

        // At most three digits, so this always fits.
        let magnitude: i16 = caps[2]
            .parse()
            .map_err(|_| format!("invalid percentage \"{text}\""))?;
        let value = match caps.get(1).map(|m| m.as_str()) {
            Some("-") => -magnitude,
            _ => magnitude,
        };

        Self::new(value)
    }

    pub fn value(&self) -> i16 {
        self.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}%", self.0)
    }
}

/// Rate, volume and pitch adjustments sent to the cloud backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Prosody {
    pub rate: Percent,
    pub volume: Percent,
    pub pitch: Percent,
}

/// Parameters of a cloud-rendered voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudVoice {
    /// Service voice identifier, e.g. `en-US-JennyNeural`.
    pub voice_id: String,
    pub prosody: Prosody,
}

/// Backend selection together with the parameters that backend needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceBackend {
    Neural { speaker_slot: SpeakerSlot },
    Cloud(CloudVoice),
}

impl VoiceBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            VoiceBackend::Neural { .. } => BackendKind::Neural,
            VoiceBackend::Cloud(_) => BackendKind::Cloud,
        }
    }
}

/// A validated, named voice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceConfig {
    pub name: String,
    pub backend: VoiceBackend,
}

impl VoiceConfig {
    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Speaker slot, present only for neural voices.
    pub fn speaker_slot(&self) -> Option<SpeakerSlot> {
        match &self.backend {
            VoiceBackend::Neural { speaker_slot } => Some(*speaker_slot),
            VoiceBackend::Cloud(_) => None,
        }
    }

    /// Cloud voice identifier, present only for cloud voices.
    pub fn cloud_voice_id(&self) -> Option<&str> {
        match &self.backend {
            VoiceBackend::Neural { .. } => None,
            VoiceBackend::Cloud(cloud) => Some(&cloud.voice_id),
        }
    }

    /// One-line parameter summary for listings and logs.
    pub fn describe(&self) -> String {
        match &self.backend {
            VoiceBackend::Neural { speaker_slot } => format!(
                "speaker slot {} ({})",
                speaker_slot,
                speaker_slot.convention_label()
            ),
            VoiceBackend::Cloud(cloud) => format!(
                "{} rate {} volume {} pitch {}",
                cloud.voice_id, cloud.prosody.rate, cloud.prosody.volume, cloud.prosody.pitch
            ),
        }
    }
}

/// Limits applied while validating voice entries.
#[derive(Debug, Clone, Copy)]
pub struct VoiceLimits {
    /// Highest speaker slot the neural server exposes.
    pub max_speaker_slot: u32,
}

impl Default for VoiceLimits {
    fn default() -> Self {
        Self {
            max_speaker_slot: SpeakerSlot::FEMALE.get(),
        }
    }
}

/// A voice as written in the configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct VoiceEntry {
    pub name: String,
    pub backend: BackendKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_slot: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_voice_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<String>,
}

impl VoiceEntry {
    /// Neural voice entry.
    pub fn neural(name: impl Into<String>, speaker_slot: u32) -> Self {
        Self {
            name: name.into(),
            backend: BackendKind::Neural,
            speaker_slot: Some(speaker_slot),
            cloud_voice_id: None,
            rate: None,
            volume: None,
            pitch: None,
        }
    }

    /// Cloud voice entry with no prosody adjustment.
    pub fn cloud(name: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            backend: BackendKind::Cloud,
            speaker_slot: None,
            cloud_voice_id: Some(voice_id.into()),
            rate: None,
            volume: None,
            pitch: None,
        }
    }

    pub fn with_rate(mut self, rate: impl Into<String>) -> Self {
        self.rate = Some(rate.into());
        self
    }

    pub fn with_volume(mut self, volume: impl Into<String>) -> Self {
        self.volume = Some(volume.into());
        self
    }

    pub fn with_pitch(mut self, pitch: impl Into<String>) -> Self {
        self.pitch = Some(pitch.into());
        self
    }

    /// Check the entry and convert it into a [`VoiceConfig`].
    pub fn validate(&self, limits: &VoiceLimits) -> Result<VoiceConfig, VoiceError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(VoiceError::invalid(&self.name, "name", "must not be empty"));
        }

        let backend = match self.backend {
            BackendKind::Neural => self.validate_neural(name, limits)?,
            BackendKind::Cloud => self.validate_cloud(name)?,
        };

        Ok(VoiceConfig {
            name: name.to_string(),
            backend,
        })
    }

    fn validate_neural(&self, name: &str, limits: &VoiceLimits) -> Result<VoiceBackend, VoiceError> {
        if self.cloud_voice_id.is_some() {
            return Err(VoiceError::invalid(
                name,
                "cloud_voice_id",
                "is not used by neural voices",
            ));
        }
        for (field, value) in self.prosody_fields() {
            if value.is_some() {
                return Err(VoiceError::invalid(name, field, "is not used by neural voices"));
            }
        }

        let slot = self
            .speaker_slot
            .ok_or_else(|| VoiceError::invalid(name, "speaker_slot", "is required for neural voices"))?;
        if slot > limits.max_speaker_slot {
            return Err(VoiceError::invalid(
                name,
                "speaker_slot",
                format!(
                    "must be at most {}, got {}",
                    limits.max_speaker_slot, slot
                ),
            ));
        }

        Ok(VoiceBackend::Neural {
            speaker_slot: SpeakerSlot::new(slot),
        })
    }

    fn validate_cloud(&self, name: &str) -> Result<VoiceBackend, VoiceError> {
        if self.speaker_slot.is_some() {
            return Err(VoiceError::invalid(
                name,
                "speaker_slot",
                "is not used by cloud voices",
            ));
        }

        let voice_id = self
            .cloud_voice_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| VoiceError::invalid(name, "cloud_voice_id", "is required for cloud voices"))?;
        if !CLOUD_VOICE_RE.is_match(voice_id) {
            return Err(VoiceError::invalid(
                name,
                "cloud_voice_id",
                format!("\"{voice_id}\" is not a voice identifier like \"en-US-JennyNeural\""),
            ));
        }

        let mut prosody = Prosody::default();
        for (field, value) in self.prosody_fields() {
            let Some(text) = value else { continue };
            let percent =
                Percent::parse(text).map_err(|reason| VoiceError::invalid(name, field, reason))?;
            match field {
                "rate" => prosody.rate = percent,
                "volume" => prosody.volume = percent,
                _ => prosody.pitch = percent,
            }
        }

        Ok(VoiceBackend::Cloud(CloudVoice {
            voice_id: voice_id.to_string(),
            prosody,
        }))
    }

    fn prosody_fields(&self) -> [(&'static str, Option<&String>); 3] {
        [
            ("rate", self.rate.as_ref()),
            ("volume", self.volume.as_ref()),
            ("pitch", self.pitch.as_ref()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: VoiceError) -> &'static str {
        match err {
            VoiceError::InvalidVoiceConfig { field, .. } => field,
            other => panic!("expected InvalidVoiceConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_percent_parse() {
        assert_eq!(Percent::parse("+10%").unwrap().value(), 10);
        assert_eq!(Percent::parse("-20%").unwrap().value(), -20);
        assert_eq!(Percent::parse("5%").unwrap().value(), 5);
        assert_eq!(Percent::parse(" +0% ").unwrap(), Percent::ZERO);
        assert!(Percent::parse("+999%").is_err());
        assert!(Percent::parse("+51%").is_err());
        assert!(Percent::parse("-50%").is_ok());
        assert!(Percent::parse("10").is_err());
        assert!(Percent::parse("fast").is_err());
    }

    #[test]
    fn test_percent_display_has_sign() {
        assert_eq!(Percent::ZERO.to_string(), "+0%");
        assert_eq!(Percent::new(10).unwrap().to_string(), "+10%");
        assert_eq!(Percent::new(-20).unwrap().to_string(), "-20%");
    }

    #[test]
    fn test_cloud_entry_validates() {
        let config = VoiceEntry::cloud("Jenny", "en-US-JennyNeural")
            .with_rate("+10%")
            .validate(&VoiceLimits::default())
            .unwrap();

        assert_eq!(config.kind(), BackendKind::Cloud);
        assert_eq!(config.cloud_voice_id(), Some("en-US-JennyNeural"));
        assert_eq!(config.speaker_slot(), None);
        match config.backend {
            VoiceBackend::Cloud(cloud) => {
                assert_eq!(cloud.prosody.rate.value(), 10);
                assert_eq!(cloud.prosody.volume, Percent::ZERO);
                assert_eq!(cloud.prosody.pitch, Percent::ZERO);
            }
            other => panic!("unexpected backend {other:?}"),
        }
    }

    #[test]
    fn test_neural_entry_validates() {
        let config = VoiceEntry::neural("Valentino", 0)
            .validate(&VoiceLimits::default())
            .unwrap();

        assert_eq!(config.speaker_slot(), Some(SpeakerSlot::MALE));
        assert_eq!(config.cloud_voice_id(), None);
        assert!(config.describe().contains("male-coded"));
    }

    #[test]
    fn test_out_of_range_rate_names_field() {
        let err = VoiceEntry::cloud("Jenny", "en-US-JennyNeural")
            .with_rate("+999%")
            .validate(&VoiceLimits::default())
            .unwrap_err();
        assert_eq!(field_of(err), "rate");

        let err = VoiceEntry::cloud("Jenny", "en-US-JennyNeural")
            .with_pitch("lower")
            .validate(&VoiceLimits::default())
            .unwrap_err();
        assert_eq!(field_of(err), "pitch");
    }

    #[test]
    fn test_neural_entry_rejects_cloud_fields() {
        let mut entry = VoiceEntry::neural("Jane", 1);
        entry.cloud_voice_id = Some("en-GB-SoniaNeural".to_string());
        let err = entry.validate(&VoiceLimits::default()).unwrap_err();
        assert_eq!(field_of(err), "cloud_voice_id");

        let err = VoiceEntry::neural("Jane", 1)
            .with_volume("+10%")
            .validate(&VoiceLimits::default())
            .unwrap_err();
        assert_eq!(field_of(err), "volume");
    }

    #[test]
    fn test_cloud_entry_rejects_speaker_slot() {
        let mut entry = VoiceEntry::cloud("Guy", "en-US-GuyNeural");
        entry.speaker_slot = Some(0);
        let err = entry.validate(&VoiceLimits::default()).unwrap_err();
        assert_eq!(field_of(err), "speaker_slot");
    }

    #[test]
    fn test_missing_backend_parameters() {
        let mut entry = VoiceEntry::neural("Jane", 1);
        entry.speaker_slot = None;
        assert_eq!(field_of(entry.validate(&VoiceLimits::default()).unwrap_err()), "speaker_slot");

        let mut entry = VoiceEntry::cloud("Guy", "en-US-GuyNeural");
        entry.cloud_voice_id = Some("   ".to_string());
        assert_eq!(field_of(entry.validate(&VoiceLimits::default()).unwrap_err()), "cloud_voice_id");
    }

    #[test]
    fn test_speaker_slot_limit() {
        let err = VoiceEntry::neural("Third", 2)
            .validate(&VoiceLimits::default())
            .unwrap_err();
        assert_eq!(field_of(err), "speaker_slot");

        let limits = VoiceLimits { max_speaker_slot: 3 };
        let config = VoiceEntry::neural("Third", 2).validate(&limits).unwrap();
        assert_eq!(config.speaker_slot().unwrap().convention_label(), "unlabelled");
    }

    #[test]
    fn test_cloud_voice_id_shape() {
        let limits = VoiceLimits::default();
        for id in [
            "en-US-JennyNeural",
            "en-GB-RyanNeural",
            "zh-CN-liaoning-XiaobeiNeural",
            "en-US-AndrewMultilingualNeural",
        ] {
            assert!(VoiceEntry::cloud("v", id).validate(&limits).is_ok(), "{id}");
        }
        for id in ["Jenny", "en US JennyNeural", "en-US-Jenny"] {
            assert!(VoiceEntry::cloud("v", id).validate(&limits).is_err(), "{id}");
        }
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = VoiceEntry::neural("  ", 0)
            .validate(&VoiceLimits::default())
            .unwrap_err();
        assert_eq!(field_of(err), "name");
    }
}
