//! Configuration module for the speech service.
//!
//! Provides `AppConfig` (top-level settings), sub-configs for each engine
//! family, `AppPaths` for cross-platform directories, and TOML persistence
//! via `AppConfig::load` / `AppConfig::save`.

pub mod paths;
pub mod settings;

pub use paths::{purge_cached_audio, AppPaths};
pub use settings::{
    AppConfig, AudioConfig, AudioCtxMode, CacheConfig, DefaultsConfig, EngineProfile,
    KeepaliveConfig, MntConfig, SttConfig, TtsConfig,
};
