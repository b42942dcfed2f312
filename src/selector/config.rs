//! Resolved per-family model configurations.
//!
//! Built fresh by the selector for every (re)configuration request.
//! Auxiliary models that may be absent are `Option`s.

use std::path::PathBuf;

use crate::catalog::{Model, ModelEngine};

/// A helper model attached to a primary config (punctuation model for STT,
/// second translation leg, diacritizers for text repair).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxModel {
    pub model_id: String,
    pub model_file: PathBuf,
}

impl From<&Model> for AuxModel {
    fn from(m: &Model) -> Self {
        Self {
            model_id: m.id.clone(),
            model_file: m.model_file.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SttModelConfig {
    pub model_id: String,
    pub engine: ModelEngine,
    pub lang_id: String,
    pub lang_code: String,
    pub model_file: PathBuf,
    pub scorer_file: Option<PathBuf>,
    pub openvino_file: Option<PathBuf>,
    /// Punctuation restoration model for the same language.
    pub punctuation: Option<AuxModel>,
    pub options: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtsModelConfig {
    pub model_id: String,
    pub engine: ModelEngine,
    pub lang_id: String,
    pub lang_code: String,
    pub model_file: PathBuf,
    pub vocoder_file: Option<PathBuf>,
    pub diacritizer_file: Option<PathBuf>,
    pub speaker: String,
    pub options: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MntModelConfig {
    /// Id of the first leg; identifies the task's model.
    pub model_id: String,
    pub lang_id: String,
    pub out_lang_id: String,
    pub model_file: PathBuf,
    /// Second leg when translating through the pivot language.
    pub pivot: Option<AuxModel>,
    pub options: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextRepairModelConfig {
    pub diacritizer_ar: Option<AuxModel>,
    pub diacritizer_he: Option<AuxModel>,
    pub punctuation: Option<AuxModel>,
}

impl TextRepairModelConfig {
    /// Id recorded on the task; the first sub-model present.
    pub fn model_id(&self) -> String {
        [&self.punctuation, &self.diacritizer_ar, &self.diacritizer_he]
            .into_iter()
            .flatten()
            .map(|m| m.model_id.clone())
            .next()
            .unwrap_or_else(|| "text_repair".to_string())
    }
}

/// Output of [`resolve`](super::ModelSelector::resolve): exactly one family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelConfig {
    Stt(SttModelConfig),
    Tts(TtsModelConfig),
    Mnt(MntModelConfig),
    TextRepair(TextRepairModelConfig),
}

impl ModelConfig {
    /// Id of the primary model.
    pub fn model_id(&self) -> String {
        match self {
            ModelConfig::Stt(c) => c.model_id.clone(),
            ModelConfig::Tts(c) => c.model_id.clone(),
            ModelConfig::Mnt(c) => c.model_id.clone(),
            ModelConfig::TextRepair(c) => c.model_id(),
        }
    }
}
