//! Static voice table and lookup.

use serde::Serialize;
use tracing::warn;

/// Voice used when a request names no voice or an unknown one.
pub const DEFAULT_VOICE_ID: &str = "af_nicole";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceDescriptor {
    pub voice_id: &'static str,
    pub language_code: &'static str,
    pub display_name: &'static str,
    pub emoji: &'static str,
    pub language_label: &'static str,
}

const VOICES: &[VoiceDescriptor] = &[
    // English voices
    VoiceDescriptor {
        voice_id: "af_heart",
        language_code: "a",
        display_name: "Heart",
        emoji: "👱‍♀️",
        language_label: "English 🇺🇸",
    },
    VoiceDescriptor {
        voice_id: "af_nicole",
        language_code: "a",
        display_name: "Nicole",
        emoji: "👩‍💼",
        language_label: "English 🇺🇸",
    },
    VoiceDescriptor {
        voice_id: "af_bella",
        language_code: "a",
        display_name: "Bella",
        emoji: "👩",
        language_label: "English 🇺🇸",
    },
    // Hindi voices
    VoiceDescriptor {
        voice_id: "hf_alpha",
        language_code: "h",
        display_name: "Sita",
        emoji: "👩‍🦰",
        language_label: "Hindi 🇮🇳",
    },
    VoiceDescriptor {
        voice_id: "hf_beta",
        language_code: "h",
        display_name: "Gita",
        emoji: "👩‍🔬",
        language_label: "Hindi 🇮🇳",
    },
];

/// Outcome of a voice lookup. `fallback` is set when the requested id was
/// unknown and the default voice was substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceResolution {
    pub voice: VoiceDescriptor,
    pub fallback: bool,
}

/// A language label together with its voices, in definition order.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageGroup {
    pub language: &'static str,
    pub voices: Vec<VoiceDescriptor>,
}

#[derive(Debug, Clone)]
pub struct VoiceRegistry {
    voices: &'static [VoiceDescriptor],
    default_index: usize,
}

impl Default for VoiceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl VoiceRegistry {
    /// The built-in Kokoro voice table with `af_nicole` as default.
    pub fn builtin() -> Self {
        let default_index = VOICES
            .iter()
            .position(|v| v.voice_id == DEFAULT_VOICE_ID)
            .unwrap_or(0);
        Self {
            voices: VOICES,
            default_index,
        }
    }

    pub fn default_voice(&self) -> &VoiceDescriptor {
        &self.voices[self.default_index]
    }

    pub fn get(&self, voice_id: &str) -> Option<&VoiceDescriptor> {
        self.voices.iter().find(|v| v.voice_id == voice_id)
    }

    /// Resolve a voice id, substituting the default voice for unknown ids.
    /// Never fails.
    pub fn resolve(&self, voice_id: &str) -> VoiceResolution {
        match self.get(voice_id) {
            Some(voice) => VoiceResolution {
                voice: voice.clone(),
                fallback: false,
            },
            None => {
                let voice = self.default_voice().clone();
                warn!(
                    "Unknown voice '{}', falling back to '{}'",
                    voice_id, voice.voice_id
                );
                VoiceResolution {
                    voice,
                    fallback: true,
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &VoiceDescriptor> {
        self.voices.iter()
    }

    /// Group voices by language label, keeping first-seen language order.
    pub fn list_grouped_by_language(&self) -> Vec<LanguageGroup> {
        let mut groups: Vec<LanguageGroup> = Vec::new();
        for voice in self.voices {
            match groups.iter_mut().find(|g| g.language == voice.language_label) {
                Some(group) => group.voices.push(voice.clone()),
                None => groups.push(LanguageGroup {
                    language: voice.language_label,
                    voices: vec![voice.clone()],
                }),
            }
        }
        groups
    }
}
