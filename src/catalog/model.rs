//! Catalog model metadata.
//!
//! A [`Model`] is one installed model as reported by the catalog.  Its
//! [`ModelEngine`] names the concrete engine implementation, and
//! [`ModelEngine::role`] tells which engine family consumes it.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ModelRole
// ---------------------------------------------------------------------------

/// The engine family a model is used by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    Stt,
    Tts,
    Mnt,
    /// Text-to-text helpers: punctuation and diacritics restoration.
    Ttt,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelRole::Stt => "stt",
            ModelRole::Tts => "tts",
            ModelRole::Mnt => "mnt",
            ModelRole::Ttt => "ttt",
        })
    }
}

// ---------------------------------------------------------------------------
// ModelEngine
// ---------------------------------------------------------------------------

/// Concrete engine implementation a model file is built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelEngine {
    SttDs,
    SttVosk,
    SttWhisper,
    SttFasterWhisper,
    SttApril,
    TttHftc,
    TttTashkeel,
    TttUnikud,
    TtsCoqui,
    TtsPiper,
    TtsEspeak,
    TtsRhvoice,
    TtsMimic3,
    TtsWhisperSpeech,
    TtsSam,
    TtsParler,
    TtsF5,
    TtsKokoro,
    MntBergamot,
}

impl ModelEngine {
    /// Engine family this implementation belongs to.
    pub fn role(self) -> ModelRole {
        use ModelEngine::*;
        match self {
            SttDs | SttVosk | SttWhisper | SttFasterWhisper | SttApril => ModelRole::Stt,
            TttHftc | TttTashkeel | TttUnikud => ModelRole::Ttt,
            TtsCoqui | TtsPiper | TtsEspeak | TtsRhvoice | TtsMimic3 | TtsWhisperSpeech
            | TtsSam | TtsParler | TtsF5 | TtsKokoro => ModelRole::Tts,
            MntBergamot => ModelRole::Mnt,
        }
    }

    /// `true` for engines that honour the whisper decoding profile.
    pub fn is_whisper_family(self) -> bool {
        matches!(self, ModelEngine::SttWhisper | ModelEngine::SttFasterWhisper)
    }

    /// TTS engines that bake the speaker into the loaded voice, so a
    /// speaker change needs a fresh instance.
    pub fn speaker_needs_restart(self) -> bool {
        matches!(
            self,
            ModelEngine::TtsPiper
                | ModelEngine::TtsRhvoice
                | ModelEngine::TtsEspeak
                | ModelEngine::TtsKokoro
        )
    }

    /// TTS engines that bake the language into the loaded voice.
    pub fn lang_needs_restart(self) -> bool {
        matches!(self, ModelEngine::TtsEspeak)
    }
}

// ---------------------------------------------------------------------------
// SupFile
// ---------------------------------------------------------------------------

/// What an auxiliary model file is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupRole {
    Scorer,
    Vocoder,
    Diacritizer,
    Openvino,
}

/// An auxiliary file shipped with a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupFile {
    pub role: SupRole,
    pub file: PathBuf,
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// One installed model as listed by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Unique id, conventionally `<lang>_<engine>_<name>`.
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Source language id (`"en"`, `"fr"` …).
    pub lang_id: String,
    /// Engine-specific language code, when it differs from `lang_id`.
    #[serde(default)]
    pub lang_code: String,
    /// Target language id.  Only set for translation models.
    #[serde(default, alias = "target_lang_id")]
    pub trg_lang_id: String,
    pub engine: ModelEngine,
    pub model_file: PathBuf,
    #[serde(default)]
    pub sup_files: Vec<SupFile>,
    /// Opaque engine options string.
    #[serde(default)]
    pub options: String,
    /// Voice name for multi-speaker TTS models.
    #[serde(default)]
    pub speaker: String,
    /// Quality score; higher is better.
    #[serde(default)]
    pub score: i32,
    /// Preferred model for its language.
    #[serde(default)]
    pub default_for_lang: bool,
}

impl Model {
    /// Family of this model.
    pub fn role(&self) -> ModelRole {
        self.engine.role()
    }

    /// First auxiliary file with the given role.
    pub fn sup_file(&self, role: SupRole) -> Option<&PathBuf> {
        self.sup_files.iter().find(|s| s.role == role).map(|s| &s.file)
    }
}
