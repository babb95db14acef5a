//! Read-only registry of named voices.

use std::collections::BTreeMap;

use crate::error::VoiceError;
use crate::voice::{VoiceConfig, VoiceEntry, VoiceLimits};

/// Validated voice table, built once at startup and never mutated.
#[derive(Debug, Clone, Default)]
pub struct VoiceRegistry {
    voices: BTreeMap<String, VoiceConfig>,
}

impl VoiceRegistry {
    /// Validate every entry and build the registry.
    ///
    /// Fails on the first invalid or duplicate entry.
    pub fn from_entries<'a, I>(entries: I, limits: &VoiceLimits) -> Result<Self, VoiceError>
    where
        I: IntoIterator<Item = &'a VoiceEntry>,
    {
        let mut voices = BTreeMap::new();

        for entry in entries {
            let config = entry.validate(limits)?;
            if voices.contains_key(&config.name) {
                return Err(VoiceError::invalid(
                    config.name,
                    "name",
                    "is defined more than once",
                ));
            }
            voices.insert(config.name.clone(), config);
        }

        Ok(Self { voices })
    }

    /// Resolve a voice by exact name.
    pub fn lookup(&self, name: &str) -> Result<&VoiceConfig, VoiceError> {
        self.voices
            .get(name)
            .ok_or_else(|| VoiceError::UnknownVoice {
                name: name.to_string(),
                available: self.names().map(str::to_string).collect(),
            })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.voices.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VoiceConfig> {
        self.voices.values()
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::{BackendKind, VoiceBackend};

    fn sample_entries() -> Vec<VoiceEntry> {
        vec![
            VoiceEntry::cloud("Jenny", "en-US-JennyNeural").with_rate("+10%"),
            VoiceEntry::cloud("Narrator", "en-US-ChristopherNeural"),
            VoiceEntry::neural("Valentino", 0),
            VoiceEntry::neural("Jane", 1),
        ]
    }

    #[test]
    fn test_lookup_known_voice() {
        let registry = VoiceRegistry::from_entries(&sample_entries(), &VoiceLimits::default()).unwrap();

        assert_eq!(registry.len(), 4);
        let jenny = registry.lookup("Jenny").unwrap();
        assert_eq!(jenny.kind(), BackendKind::Cloud);
        assert_eq!(jenny.cloud_voice_id(), Some("en-US-JennyNeural"));
    }

    #[test]
    fn test_every_voice_has_one_active_parameter_set() {
        let registry = VoiceRegistry::from_entries(&sample_entries(), &VoiceLimits::default()).unwrap();

        for voice in registry.iter() {
            match &voice.backend {
                VoiceBackend::Neural { .. } => {
                    assert!(voice.speaker_slot().is_some());
                    assert!(voice.cloud_voice_id().is_none());
                }
                VoiceBackend::Cloud(_) => {
                    assert!(voice.speaker_slot().is_none());
                    assert!(voice.cloud_voice_id().is_some());
                }
            }
        }
    }

    #[test]
    fn test_lookup_nonexistent() {
        let registry = VoiceRegistry::from_entries(&sample_entries(), &VoiceLimits::default()).unwrap();

        match registry.lookup("nonexistent") {
            Err(VoiceError::UnknownVoice { name, available }) => {
                assert_eq!(name, "nonexistent");
                assert_eq!(available, vec!["Jane", "Jenny", "Narrator", "Valentino"]);
            }
            other => panic!("expected UnknownVoice, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_rate_fails_at_load() {
        let mut entries = sample_entries();
        entries.push(VoiceEntry::cloud("Loud", "en-US-GuyNeural").with_rate("+999%"));

        match VoiceRegistry::from_entries(&entries, &VoiceLimits::default()) {
            Err(VoiceError::InvalidVoiceConfig { voice, field, .. }) => {
                assert_eq!(voice, "Loud");
                assert_eq!(field, "rate");
            }
            other => panic!("expected InvalidVoiceConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut entries = sample_entries();
        entries.push(VoiceEntry::neural("Jenny", 1));

        match VoiceRegistry::from_entries(&entries, &VoiceLimits::default()) {
            Err(VoiceError::InvalidVoiceConfig { voice, field, .. }) => {
                assert_eq!(voice, "Jenny");
                assert_eq!(field, "name");
            }
            other => panic!("expected InvalidVoiceConfig, got {other:?}"),
        }
    }

    #[test]
    fn test_names_are_trimmed() {
        let entries = vec![VoiceEntry::cloud(" Jenny ", "en-US-JennyNeural")];
        let registry = VoiceRegistry::from_entries(&entries, &VoiceLimits::default()).unwrap();
        assert!(registry.lookup("Jenny").is_ok());
    }
}
