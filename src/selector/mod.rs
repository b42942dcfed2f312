//! Model selection: request id → concrete per-family model config.
//!
//! # Fallback chain
//!
//! ```text
//! resolve(kind, id, out_lang)
//!   │  empty id / out_lang → configured defaults
//!   ├─ 1. exact id            (mnt: lang_id + trg_lang_id pair)
//!   ├─ 2. mnt pivot           lang → en → out_lang, neither side "en"
//!   │      mnt stops here → NotFound
//!   ├─ 3. best for language   default_for_lang wins, else highest score
//!   ├─ 4. first available     logs a warning
//!   └─ NoModels               when the family has nothing installed
//! ```
//!
//! Text repair does not go through the chain; it assembles its optional
//! sub-models by engine type.
//!
//! [`ModelSelector::resolve`] only reads the catalog snapshot and settings
//! it was built with, so identical inputs always give identical results.

pub mod config;

use thiserror::Error;

use crate::catalog::index::PIVOT_LANG;
use crate::catalog::{Model, ModelEngine, ModelRole, SupRole};
use crate::config::DefaultsConfig;
use crate::engine::EngineKind;

pub use config::{
    AuxModel, ModelConfig, MntModelConfig, SttModelConfig, TextRepairModelConfig, TtsModelConfig,
};

// ---------------------------------------------------------------------------
// SelectError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectError {
    /// Nothing of the requested family is installed.
    #[error("no {0} models available")]
    NoModels(EngineKind),

    /// No stage of the fallback chain matched.
    #[error("no {kind} model matches {id:?}")]
    NotFound { kind: EngineKind, id: String },
}

// ---------------------------------------------------------------------------
// ModelSelector
// ---------------------------------------------------------------------------

/// Resolves requests against one catalog snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ModelSelector<'a> {
    models: &'a [Model],
    defaults: &'a DefaultsConfig,
    restore_punctuation: bool,
    tts_diacritizer: bool,
}

impl<'a> ModelSelector<'a> {
    pub fn new(models: &'a [Model], defaults: &'a DefaultsConfig) -> Self {
        Self {
            models,
            defaults,
            restore_punctuation: false,
            tts_diacritizer: false,
        }
    }

    /// Attach a punctuation model to resolved STT configs when available.
    pub fn restore_punctuation(mut self, enabled: bool) -> Self {
        self.restore_punctuation = enabled;
        self
    }

    /// Hand diacritizer files to resolved TTS configs.
    pub fn tts_diacritizer(mut self, enabled: bool) -> Self {
        self.tts_diacritizer = enabled;
        self
    }

    /// Resolve `model_or_lang_id` (and `out_lang_id` for translation) into a
    /// config for `kind`.
    pub fn resolve(
        &self,
        kind: EngineKind,
        model_or_lang_id: &str,
        out_lang_id: &str,
    ) -> Result<ModelConfig, SelectError> {
        if kind == EngineKind::TextRepair {
            return self.text_repair_config();
        }

        let role = kind.model_role();
        if !self.models.iter().any(|m| m.role() == role) {
            return Err(SelectError::NoModels(kind));
        }

        let id = match (model_or_lang_id.is_empty(), kind) {
            (false, _) => model_or_lang_id,
            (true, EngineKind::Stt) => self.defaults.stt_model.as_str(),
            (true, EngineKind::Tts) => self.defaults.tts_model.as_str(),
            (true, _) => self.defaults.mnt_lang.as_str(),
        };

        if kind == EngineKind::Mnt {
            let out_lang = if out_lang_id.is_empty() {
                self.defaults.mnt_out_lang.as_str()
            } else {
                out_lang_id
            };
            return self.mnt_config(id, out_lang);
        }

        let model = self
            .by_id(role, id)
            .or_else(|| self.by_lang(role, id))
            .or_else(|| {
                let first = self.models.iter().find(|m| m.role() == role);
                if let Some(m) = first {
                    log::warn!("selector: no {kind} model for {id:?}, using first available {}", m.id);
                }
                first
            })
            .ok_or_else(|| SelectError::NotFound {
                kind,
                id: id.to_string(),
            })?;

        log::debug!("selector: {kind} request {id:?} resolved to {}", model.id);

        Ok(match kind {
            EngineKind::Stt => ModelConfig::Stt(self.stt_config(model)),
            _ => ModelConfig::Tts(self.tts_config(model)),
        })
    }

    // -----------------------------------------------------------------------
    // Fallback stages
    // -----------------------------------------------------------------------

    fn by_id(&self, role: ModelRole, id: &str) -> Option<&'a Model> {
        self.models.iter().find(|m| m.role() == role && m.id == id)
    }

    fn by_lang(&self, role: ModelRole, lang: &str) -> Option<&'a Model> {
        let mut best: Option<&'a Model> = None;
        for m in self.models.iter().filter(|m| m.role() == role && m.lang_id == lang) {
            if m.default_for_lang {
                return Some(m);
            }
            if best.map_or(true, |b| m.score > b.score) {
                best = Some(m);
            }
        }
        best
    }

    fn mnt_pair(&self, lang: &str, out_lang: &str) -> Option<&'a Model> {
        self.models
            .iter()
            .find(|m| m.role() == ModelRole::Mnt && m.lang_id == lang && m.trg_lang_id == out_lang)
    }

    // -----------------------------------------------------------------------
    // Config builders
    // -----------------------------------------------------------------------

    fn mnt_config(&self, lang: &str, out_lang: &str) -> Result<ModelConfig, SelectError> {
        let not_found = || SelectError::NotFound {
            kind: EngineKind::Mnt,
            id: format!("{lang}->{out_lang}"),
        };

        let (first, pivot) = match self.mnt_pair(lang, out_lang) {
            Some(direct) => (direct, None),
            None if lang != PIVOT_LANG && out_lang != PIVOT_LANG => {
                let first = self.mnt_pair(lang, PIVOT_LANG).ok_or_else(not_found)?;
                let second = self.mnt_pair(PIVOT_LANG, out_lang).ok_or_else(not_found)?;
                log::debug!("selector: translating {lang}->{out_lang} through {PIVOT_LANG}");
                (first, Some(AuxModel::from(second)))
            }
            None => return Err(not_found()),
        };

        Ok(ModelConfig::Mnt(MntModelConfig {
            model_id: first.id.clone(),
            lang_id: lang.to_string(),
            out_lang_id: out_lang.to_string(),
            model_file: first.model_file.clone(),
            pivot,
            options: first.options.clone(),
        }))
    }

    fn stt_config(&self, model: &Model) -> SttModelConfig {
        let punctuation = if self.restore_punctuation {
            self.models
                .iter()
                .find(|m| m.engine == ModelEngine::TttHftc && m.lang_id == model.lang_id)
                .map(AuxModel::from)
        } else {
            None
        };

        SttModelConfig {
            model_id: model.id.clone(),
            engine: model.engine,
            lang_id: model.lang_id.clone(),
            lang_code: model.lang_code.clone(),
            model_file: model.model_file.clone(),
            scorer_file: model.sup_file(SupRole::Scorer).cloned(),
            openvino_file: model.sup_file(SupRole::Openvino).cloned(),
            punctuation,
            options: model.options.clone(),
        }
    }

    fn tts_config(&self, model: &Model) -> TtsModelConfig {
        let diacritizer_file = if self.tts_diacritizer {
            model.sup_file(SupRole::Diacritizer).cloned()
        } else {
            None
        };

        TtsModelConfig {
            model_id: model.id.clone(),
            engine: model.engine,
            lang_id: model.lang_id.clone(),
            lang_code: model.lang_code.clone(),
            model_file: model.model_file.clone(),
            vocoder_file: model.sup_file(SupRole::Vocoder).cloned(),
            diacritizer_file,
            speaker: model.speaker.clone(),
            options: model.options.clone(),
        }
    }

    fn text_repair_config(&self) -> Result<ModelConfig, SelectError> {
        let first_of = |engine: ModelEngine| {
            self.models
                .iter()
                .find(|m| m.engine == engine)
                .map(AuxModel::from)
        };

        let config = TextRepairModelConfig {
            diacritizer_ar: first_of(ModelEngine::TttTashkeel),
            diacritizer_he: first_of(ModelEngine::TttUnikud),
            punctuation: first_of(ModelEngine::TttHftc),
        };

        if config == TextRepairModelConfig::default() {
            return Err(SelectError::NoModels(EngineKind::TextRepair));
        }
        Ok(ModelConfig::TextRepair(config))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
