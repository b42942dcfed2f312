//! Model catalog contract and an in-memory implementation.
//!
//! The catalog (download manager, model registry) is an external
//! collaborator.  The service only needs the list of installed models and
//! a busy flag while the catalog reloads, which is what [`ModelCatalog`]
//! exposes.  [`StaticCatalog`] is a simple implementation backed by a
//! `Vec<Model>`, optionally loaded from a JSON file.
//!
//! [`ModelIndex`] is the service-side view built from a catalog snapshot:
//! per-family model maps, language lists and default-model fixing.

pub mod index;
pub mod model;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use anyhow::Result;

pub use index::{ModelIndex, ModelSummary};
pub use model::{Model, ModelEngine, ModelRole, SupFile, SupRole};

// ---------------------------------------------------------------------------
// ModelCatalog trait
// ---------------------------------------------------------------------------

/// Read access to the installed models.
///
/// Implementations must be `Send + Sync`; the task manager holds the catalog
/// behind an `Arc<dyn ModelCatalog>`.
pub trait ModelCatalog: Send + Sync {
    /// Snapshot of every available model, in catalog order.
    fn available_models(&self) -> Vec<Model>;

    /// `true` while the catalog is reloading or downloading.
    fn busy(&self) -> bool {
        false
    }

    /// `true` when at least one model of `role` is available.
    fn has_model_of_role(&self, role: ModelRole) -> bool {
        self.available_models().iter().any(|m| m.role() == role)
    }
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn ModelCatalog>) {}
};

// ---------------------------------------------------------------------------
// StaticCatalog
// ---------------------------------------------------------------------------

/// Catalog backed by an in-memory model list.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    models: RwLock<Vec<Model>>,
    busy: AtomicBool,
}

impl StaticCatalog {
    pub fn new(models: Vec<Model>) -> Self {
        Self {
            models: RwLock::new(models),
            busy: AtomicBool::new(false),
        }
    }

    /// Load a JSON array of [`Model`]s.  A missing file yields an empty
    /// catalog.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::warn!("catalog: {} not found, starting empty", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let models: Vec<Model> = serde_json::from_str(&content)?;
        log::info!("catalog: loaded {} models from {}", models.len(), path.display());
        Ok(Self::new(models))
    }

    /// Replace the model list.
    pub fn set_models(&self, models: Vec<Model>) {
        match self.models.write() {
            Ok(mut guard) => *guard = models,
            Err(poisoned) => *poisoned.into_inner() = models,
        }
    }

    pub fn set_busy(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }
}

impl ModelCatalog for StaticCatalog {
    fn available_models(&self) -> Vec<Model> {
        match self.models.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A model with the given id, language and engine and otherwise default
    /// fields.  The model file path is derived from the id.
    pub fn model(id: &str, lang: &str, engine: ModelEngine) -> Model {
        Model {
            id: id.into(),
            name: id.into(),
            lang_id: lang.into(),
            lang_code: String::new(),
            trg_lang_id: String::new(),
            engine,
            model_file: format!("/models/{id}").into(),
            sup_files: Vec::new(),
            options: String::new(),
            speaker: String::new(),
            score: 0,
            default_for_lang: false,
        }
    }

    /// A translation model from `lang` to `trg`.
    pub fn mnt(lang: &str, trg: &str) -> Model {
        let mut m = model(&format!("{lang}{trg}_bergamot"), lang, ModelEngine::MntBergamot);
        m.trg_lang_id = trg.into();
        m
    }
}
