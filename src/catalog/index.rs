//! Service-side index over a catalog snapshot.
//!
//! Rebuilt every time the catalog reports a change.  Answers the listing
//! queries of the control API and repairs configured defaults that point at
//! models which are no longer installed.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use super::{Model, ModelRole};
use crate::config::DefaultsConfig;

/// Pivot language used to chain two translation models.
pub const PIVOT_LANG: &str = "en";

/// Listing entry returned by the control API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    pub id: String,
    pub name: String,
    pub lang_id: String,
    pub trg_lang_id: String,
}

impl From<&Model> for ModelSummary {
    fn from(m: &Model) -> Self {
        Self {
            id: m.id.clone(),
            name: m.name.clone(),
            lang_id: m.lang_id.clone(),
            trg_lang_id: m.trg_lang_id.clone(),
        }
    }
}

/// Immutable view over one catalog snapshot.
#[derive(Debug, Clone, Default)]
pub struct ModelIndex {
    models: Vec<Model>,
}

impl ModelIndex {
    pub fn new(models: Vec<Model>) -> Self {
        Self { models }
    }

    /// All models, in catalog order.
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn has_role(&self, role: ModelRole) -> bool {
        self.of_role(role).next().is_some()
    }

    /// `true` when a model with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.models.iter().any(|m| m.id == id)
    }

    fn of_role(&self, role: ModelRole) -> impl Iterator<Item = &Model> {
        self.models.iter().filter(move |m| m.role() == role)
    }

    /// Models of `role` sorted by id.
    pub fn models_of(&self, role: ModelRole) -> Vec<ModelSummary> {
        let by_id: BTreeMap<&str, &Model> =
            self.of_role(role).map(|m| (m.id.as_str(), m)).collect();
        by_id.into_values().map(ModelSummary::from).collect()
    }

    /// Distinct source languages of `role`, sorted.
    pub fn langs(&self, role: ModelRole) -> Vec<String> {
        self.of_role(role)
            .map(|m| m.lang_id.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Target languages reachable from `in_lang`, directly or through the
    /// [`PIVOT_LANG`] chain.
    pub fn mnt_out_langs(&self, in_lang: &str) -> Vec<String> {
        let direct = self
            .of_role(ModelRole::Mnt)
            .filter(|m| m.lang_id == in_lang)
            .map(|m| m.trg_lang_id.clone());

        let mut out: BTreeSet<String> = direct.collect();

        if in_lang != PIVOT_LANG && out.contains(PIVOT_LANG) {
            out.extend(
                self.of_role(ModelRole::Mnt)
                    .filter(|m| m.lang_id == PIVOT_LANG && m.trg_lang_id != in_lang)
                    .map(|m| m.trg_lang_id.clone()),
            );
        }

        out.into_iter().collect()
    }

    // -----------------------------------------------------------------------
    // Default fixing
    // -----------------------------------------------------------------------

    /// Replace defaults that no longer resolve against this snapshot.
    ///
    /// Returns `true` when anything changed.
    pub fn fix_defaults(&self, defaults: &mut DefaultsConfig) -> bool {
        let before = defaults.clone();

        defaults.stt_model = self.fix_default_model(ModelRole::Stt, &defaults.stt_model);
        defaults.tts_model = self.fix_default_model(ModelRole::Tts, &defaults.tts_model);
        defaults.mnt_lang = self.fix_default_mnt_lang(&defaults.mnt_lang);
        defaults.mnt_out_lang = self.fix_default_mnt_out_lang(&defaults.mnt_lang, &defaults.mnt_out_lang);

        if *defaults != before {
            log::info!("catalog: default models changed: {before:?} => {defaults:?}");
            true
        } else {
            false
        }
    }

    fn fix_default_model(&self, role: ModelRole, current: &str) -> String {
        let resolves = self
            .of_role(role)
            .any(|m| m.id == current || m.lang_id == current);
        if resolves {
            return current.to_string();
        }

        let lang = current.split('_').next().unwrap_or_default();
        self.of_role(role)
            .find(|m| !lang.is_empty() && m.lang_id == lang)
            .or_else(|| self.of_role(role).find(|m| m.lang_id == PIVOT_LANG))
            .or_else(|| self.of_role(role).next())
            .map(|m| m.id.clone())
            .unwrap_or_default()
    }

    fn fix_default_mnt_lang(&self, current: &str) -> String {
        let langs = self.langs(ModelRole::Mnt);
        if langs.iter().any(|l| l == current) {
            return current.to_string();
        }
        langs
            .iter()
            .find(|l| *l == PIVOT_LANG)
            .or_else(|| langs.first())
            .cloned()
            .unwrap_or_default()
    }

    fn fix_default_mnt_out_lang(&self, in_lang: &str, current: &str) -> String {
        let outs = self.mnt_out_langs(in_lang);
        if outs.iter().any(|l| l == current) {
            return current.to_string();
        }
        outs.first().cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fixtures::{mnt, model};
    use crate::catalog::ModelEngine;

    fn index() -> ModelIndex {
        ModelIndex::new(vec![
            model("fr_vosk", "fr", ModelEngine::SttVosk),
            model("en_whisper", "en", ModelEngine::SttWhisper),
            model("de_piper", "de", ModelEngine::TtsPiper),
            mnt("fr", "en"),
            mnt("en", "de"),
            mnt("en", "fr"),
        ])
    }

    #[test]
    fn listings_are_sorted_per_role() {
        let idx = index();
        let ids: Vec<_> = idx.models_of(ModelRole::Stt).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["en_whisper", "fr_vosk"]);
        assert_eq!(idx.langs(ModelRole::Mnt), vec!["en", "fr"]);
        assert!(idx.langs(ModelRole::Ttt).is_empty());
    }

    #[test]
    fn out_langs_include_pivot_targets() {
        let idx = index();
        assert_eq!(idx.mnt_out_langs("fr"), vec!["de", "en"]);
        assert_eq!(idx.mnt_out_langs("en"), vec!["de", "fr"]);
        assert!(idx.mnt_out_langs("it").is_empty());
    }

    #[test]
    fn valid_defaults_are_kept() {
        let idx = index();
        let mut d = DefaultsConfig {
            stt_model: "fr_vosk".into(),
            tts_model: "de".into(),
            mnt_lang: "fr".into(),
            mnt_out_lang: "de".into(),
        };
        assert!(!idx.fix_defaults(&mut d));
        assert_eq!(d.stt_model, "fr_vosk");
    }

    #[test]
    fn stale_defaults_are_repaired() {
        let idx = index();
        let mut d = DefaultsConfig {
            stt_model: "fr_whisper_large".into(),
            tts_model: "pl_piper".into(),
            mnt_lang: "it".into(),
            mnt_out_lang: "xx".into(),
        };

        assert!(idx.fix_defaults(&mut d));

        // same language first, then the first model of the role
        assert_eq!(d.stt_model, "fr_vosk");
        assert_eq!(d.tts_model, "de_piper");
        assert_eq!(d.mnt_lang, "en");
        assert_eq!(d.mnt_out_lang, "de");
    }

    #[test]
    fn empty_index_clears_defaults() {
        let idx = ModelIndex::default();
        let mut d = DefaultsConfig {
            stt_model: "en_whisper".into(),
            ..Default::default()
        };
        assert!(idx.fix_defaults(&mut d));
        assert!(d.stt_model.is_empty());
    }
}
