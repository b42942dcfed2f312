//! Cross-platform service paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + beep sounds):
//!   Linux:   ~/.config/speech-service/
//!   macOS:   ~/Library/Application Support/speech-service/
//!
//! Cache dir (synthesized speech, merged files):
//!   Linux:   ~/.cache/speech-service/
//!   macOS:   ~/Library/Caches/speech-service/
//!
//! Data dir (model catalog):
//!   Linux:   ~/.local/share/speech-service/

use std::io;
use std::path::{Path, PathBuf};

/// Holds all resolved service directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and beep sounds.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for synthesized audio.
    pub cache_dir: PathBuf,
    /// Full path to the JSON model catalog.
    pub catalog_file: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "speech-service";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path.
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        Self {
            settings_file: config_dir.join("settings.toml"),
            catalog_file: data_dir.join("models.json"),
            config_dir,
            cache_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

/// Audio extensions written into the cache by synthesis and merging.
const CACHED_AUDIO_EXTS: &[&str] = &["wav", "mp3", "ogg", "opus", "flac"];

/// Delete cached audio files directly under `dir`.
///
/// Subdirectories and non-audio files are left alone.  A missing directory
/// is not an error.  Returns the number of files removed.
pub fn purge_cached_audio(dir: &Path) -> io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_audio = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| CACHED_AUDIO_EXTS.contains(&e));
        if is_audio {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => log::warn!("config: failed to remove {}: {e}", path.display()),
            }
        }
    }

    log::debug!("config: purged {removed} cached audio files from {}", dir.display());
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_non_empty() {
        let paths = AppPaths::new();
        assert!(paths.config_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths.cache_dir.to_str().is_some_and(|s| !s.is_empty()));
        assert!(paths
            .settings_file
            .file_name()
            .is_some_and(|n| n == "settings.toml"));
        assert!(paths
            .catalog_file
            .file_name()
            .is_some_and(|n| n == "models.json"));
    }

    #[test]
    fn purge_removes_only_audio_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(dir.path().join("a.wav"), b"x").unwrap();
        std::fs::write(dir.path().join("b.ogg"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub.wav")).unwrap();

        let removed = purge_cached_audio(dir.path()).expect("purge");

        assert_eq!(removed, 2);
        assert!(dir.path().join("notes.txt").exists());
        assert!(dir.path().join("sub.wav").exists());
    }

    #[test]
    fn purge_missing_dir_is_noop() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert_eq!(purge_cached_audio(&dir.path().join("nope")).unwrap(), 0);
    }
}
