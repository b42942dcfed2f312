//! `speech-service` — inspect the installed models and effective settings.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (returns default on first run).
//! 3. Load the model catalog (empty when the file does not exist yet).
//! 4. Fix the default models against the catalog and persist any change.
//! 5. Print models and languages per role.

use speech_service::{
    catalog::{ModelCatalog, ModelIndex, ModelRole, StaticCatalog},
    config::{purge_cached_audio, AppConfig, AppPaths},
};

const ROLES: [ModelRole; 4] = [ModelRole::Stt, ModelRole::Tts, ModelRole::Mnt, ModelRole::Ttt];

fn load_catalog(paths: &AppPaths) -> StaticCatalog {
    if !paths.catalog_file.exists() {
        log::warn!("No model catalog at {}", paths.catalog_file.display());
        return StaticCatalog::new(Vec::new());
    }
    StaticCatalog::load_from(&paths.catalog_file).unwrap_or_else(|e| {
        log::error!("Failed to load catalog ({e}); no models available");
        StaticCatalog::new(Vec::new())
    })
}

fn main() -> anyhow::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    if config.cache.purge_on_start {
        let removed = purge_cached_audio(&config.cache_dir())?;
        log::info!("Removed {removed} cached audio files");
    }

    // 3. Catalog
    let paths = AppPaths::new();
    let catalog = load_catalog(&paths);
    let index = ModelIndex::new(catalog.available_models());

    // 4. Defaults
    if index.fix_defaults(&mut config.defaults) {
        log::info!("Default models updated, saving settings");
        config.save()?;
    }

    // 5. Listing
    for role in ROLES {
        let models = index.models_of(role);
        println!("{role}: {} models, langs [{}]", models.len(), index.langs(role).join(", "));
        for m in models {
            if m.trg_lang_id.is_empty() {
                println!("  {} ({}) {}", m.id, m.lang_id, m.name);
            } else {
                println!("  {} ({} -> {}) {}", m.id, m.lang_id, m.trg_lang_id, m.name);
            }
        }
    }
    println!(
        "defaults: stt={} tts={} mnt={}->{}",
        config.defaults.stt_model,
        config.defaults.tts_model,
        config.defaults.mnt_lang,
        config.defaults.mnt_out_lang
    );
    Ok(())
}
