//! Audio I/O around the STT and TTS engines.
//!
//! # Pipeline
//!
//! ```text
//!  Input side (STT)
//!  ────────────────
//!  FileSource (hound) ─┐
//!                      ├─ downmix → resample 16 kHz → read_audio(buf) ─► SttEngine::return_buf
//!  MicSource (cpal) ───┘        ▲
//!          │                    │ borrow_buf / slowdown / speedup
//!          └─ AudioEvent::Available ─► control loop
//!
//!  Output side (TTS)
//!  ─────────────────
//!  SpeechEncoded segments ─► Player (play / pause / resume / stop)
//!                         └► MediaCompressor::merge → one output file
//! ```

pub mod buffer;
pub mod compress;
pub mod file;
#[cfg(feature = "mic")]
pub mod mic;
pub mod player;
pub mod resample;
pub mod source;

#[cfg(test)]
pub(crate) mod mock;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use buffer::RingBuffer;
pub use compress::{CompressError, MediaCompressor, WavCompressor};
pub use file::FileSource;
#[cfg(feature = "mic")]
pub use mic::MicSource;
pub use player::{Player, PlayerSink, PlayerState};
pub use resample::{downmix, resample, SAMPLE_RATE};
pub use source::{AudioSource, AudioSourceFactory, DefaultSourceFactory};

// ---------------------------------------------------------------------------
// Formats
// ---------------------------------------------------------------------------

/// Container/codec of an audio file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
    OggVorbis,
    OggOpus,
    Flac,
}

impl AudioFormat {
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::OggVorbis => "ogg",
            AudioFormat::OggOpus => "opus",
            AudioFormat::Flac => "flac",
        }
    }

    /// Guess the format from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "wav" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            "ogg" | "oga" => Some(AudioFormat::OggVorbis),
            "opus" => Some(AudioFormat::OggOpus),
            "flac" => Some(AudioFormat::Flac),
            _ => None,
        }
    }

    /// Parse the `audio_format` request option.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "wav" => Some(AudioFormat::Wav),
            "mp3" => Some(AudioFormat::Mp3),
            "ogg" | "ogg_vorbis" => Some(AudioFormat::OggVorbis),
            "opus" | "ogg_opus" => Some(AudioFormat::OggOpus),
            "flac" => Some(AudioFormat::Flac),
            _ => None,
        }
    }
}

/// Encoder quality for lossy formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AudioQuality {
    VbrHigh,
    #[default]
    VbrMedium,
    VbrLow,
}

impl AudioQuality {
    pub fn as_str(self) -> &'static str {
        match self {
            AudioQuality::VbrHigh => "vbr_high",
            AudioQuality::VbrMedium => "vbr_medium",
            AudioQuality::VbrLow => "vbr_low",
        }
    }

    /// Parse the `audio_quality` request option.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "vbr_high" | "high" => Some(AudioQuality::VbrHigh),
            "vbr_medium" | "medium" => Some(AudioQuality::VbrMedium),
            "vbr_low" | "low" => Some(AudioQuality::VbrLow),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Source protocol types
// ---------------------------------------------------------------------------

/// Result of one [`AudioSource::read_audio`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AudioRead {
    /// Samples written to the buffer.
    pub size: usize,
    /// First read of the stream.
    pub sof: bool,
    /// No more audio will follow.
    pub eof: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Mic,
    File,
}

/// Notification from the active audio source.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// New audio can be read.
    Available,
    Error(String),
    /// The source reached its end and stopped producing.
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioSourceError {
    #[error("audio file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("no input device found on the default audio host")]
    NoDevice,

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("unsupported audio source: {0}")]
    Unsupported(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_path_and_name() {
        assert_eq!(AudioFormat::from_path(Path::new("/a/b.OPUS")), Some(AudioFormat::OggOpus));
        assert_eq!(AudioFormat::from_path(Path::new("/a/b")), None);
        assert_eq!(AudioFormat::from_name("mp3"), Some(AudioFormat::Mp3));
        assert_eq!(AudioFormat::from_name("aiff"), None);
        assert_eq!(AudioFormat::Flac.extension(), "flac");
    }

    #[test]
    fn quality_names() {
        assert_eq!(AudioQuality::from_name("high"), Some(AudioQuality::VbrHigh));
        assert_eq!(AudioQuality::VbrLow.as_str(), "vbr_low");
    }
}
