//! Service settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and handed to the task
//! manager at construction.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;
use crate::audio::{AudioFormat, AudioQuality};

// ---------------------------------------------------------------------------
// EngineProfile
// ---------------------------------------------------------------------------

/// Decoding profile applied to whisper-family STT engines.
///
/// | Variant     | Beam | Threads | Audio context       |
/// |-------------|------|---------|---------------------|
/// | Performance | 2    | 4       | dynamic, 1500       |
/// | Quality     | 5    | 4       | no change, 1500     |
/// | Custom      | from [`SttConfig`] fields              |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EngineProfile {
    #[default]
    Performance,
    Quality,
    Custom,
}

/// How the STT engine sizes its audio context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioCtxMode {
    #[default]
    Dynamic,
    NoChange,
    Custom,
}

// ---------------------------------------------------------------------------
// DefaultsConfig
// ---------------------------------------------------------------------------

/// Fallback model / language ids used when a request leaves them empty.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Default STT model id (or language id).
    pub stt_model: String,
    /// Default TTS model id (or language id).
    pub tts_model: String,
    /// Default translation source language.
    pub mnt_lang: String,
    /// Default translation target language.
    pub mnt_out_lang: String,
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for speech-to-text engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Decoding profile for whisper-family engines.
    pub profile: EngineProfile,
    /// Beam width used by the `Custom` profile.
    pub beam_search: i32,
    /// CPU thread count used by the `Custom` profile.
    pub cpu_threads: i32,
    /// Audio context mode used by the `Custom` profile.
    pub audio_ctx_mode: AudioCtxMode,
    /// Audio context size used by the `Custom` profile.
    pub audio_ctx_size: i32,
    /// Attempt GPU-accelerated inference when available.
    pub use_gpu: bool,
    /// Preferred GPU device, `"<API>,<index>,<name>"`.  Empty means auto.
    pub gpu_device: String,
    /// Device picked by feature discovery, used when `gpu_device` is empty.
    pub auto_gpu_device: String,
    /// Attach a punctuation model to STT configs when one exists.
    pub restore_punctuation: bool,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            profile: EngineProfile::default(),
            beam_search: 5,
            cpu_threads: 4,
            audio_ctx_mode: AudioCtxMode::default(),
            audio_ctx_size: 1500,
            use_gpu: false,
            gpu_device: String::new(),
            auto_gpu_device: String::new(),
            restore_punctuation: false,
        }
    }
}

// ---------------------------------------------------------------------------
// TtsConfig
// ---------------------------------------------------------------------------

/// Settings for text-to-speech and text-repair engines.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TtsConfig {
    pub use_gpu: bool,
    pub gpu_device: String,
    pub auto_gpu_device: String,
    /// Hand diacritizer files to TTS engines for Arabic/Hebrew voices.
    pub diacritizer_enabled: bool,
}

// ---------------------------------------------------------------------------
// MntConfig
// ---------------------------------------------------------------------------

/// Settings for machine translation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MntConfig {
    /// Default for the per-request `clean_text` option.
    pub clean_text: bool,
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Output audio settings for merged speech files and beeps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Container used when a request does not name `audio_format`.
    pub format: AudioFormat,
    /// Quality used when a request does not name `audio_quality`.
    pub quality: AudioQuality,
    /// Directory holding `beep-start.wav` / `beep-end.wav`.  `None` means
    /// the config dir.
    pub beep_dir: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::Wav,
            quality: AudioQuality::VbrMedium,
            beep_dir: None,
        }
    }
}

// ---------------------------------------------------------------------------
// KeepaliveConfig
// ---------------------------------------------------------------------------

/// Inactivity timeouts.  `0` disables the corresponding watchdog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepaliveConfig {
    /// Seconds without any control call before the service shuts down.
    pub service_idle_secs: u64,
    /// Seconds without a keepalive before the current task is cancelled.
    pub task_idle_secs: u64,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            service_idle_secs: 60,
            task_idle_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// CacheConfig
// ---------------------------------------------------------------------------

/// Location and policy of the synthesized-audio cache.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory override.  `None` means [`AppPaths::cache_dir`].
    pub dir: Option<PathBuf>,
    /// Delete cached audio left over from a previous run.
    pub purge_on_start: bool,
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level service configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use speech_service::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub defaults: DefaultsConfig,
    pub stt: SttConfig,
    pub tts: TtsConfig,
    pub mnt: MntConfig,
    pub audio: AudioConfig,
    pub keepalive: KeepaliveConfig,
    pub cache: CacheConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Effective cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().cache_dir)
    }

    /// Effective directory holding the beep sounds.
    pub fn beep_dir(&self) -> PathBuf {
        self.audio
            .beep_dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().config_dir)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");

        assert_eq!(config.stt.profile, EngineProfile::Performance);
        assert_eq!(config.keepalive.service_idle_secs, 60);
        assert_eq!(config.audio.format, AudioFormat::Wav);
        assert!(config.defaults.stt_model.is_empty());
    }

    #[test]
    fn round_trip_modified_values() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let mut cfg = AppConfig::default();
        cfg.defaults.stt_model = "en_whisper_base".into();
        cfg.defaults.mnt_out_lang = "de".into();
        cfg.stt.profile = EngineProfile::Custom;
        cfg.stt.beam_search = 3;
        cfg.stt.restore_punctuation = true;
        cfg.tts.gpu_device = "CUDA,0,RTX".into();
        cfg.audio.format = AudioFormat::OggOpus;
        cfg.keepalive.task_idle_secs = 0;
        cfg.cache.dir = Some(dir.path().join("cache"));

        cfg.save_to(&path).expect("save");
        let loaded = AppConfig::load_from(&path).expect("load");

        assert_eq!(loaded.defaults, cfg.defaults);
        assert_eq!(loaded.stt.profile, EngineProfile::Custom);
        assert_eq!(loaded.stt.beam_search, 3);
        assert!(loaded.stt.restore_punctuation);
        assert_eq!(loaded.tts.gpu_device, "CUDA,0,RTX");
        assert_eq!(loaded.audio.format, AudioFormat::OggOpus);
        assert_eq!(loaded.keepalive.task_idle_secs, 0);
        assert_eq!(loaded.cache_dir(), dir.path().join("cache"));
    }

    /// Sections missing from a hand-written file fall back to defaults.
    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("partial.toml");
        std::fs::write(&path, "[stt]\nrestore_punctuation = true\n").expect("write");

        let cfg = AppConfig::load_from(&path).expect("load");

        assert!(cfg.stt.restore_punctuation);
        assert_eq!(cfg.stt.audio_ctx_size, 1500);
        assert_eq!(cfg.keepalive.task_idle_secs, 60);
    }
}
