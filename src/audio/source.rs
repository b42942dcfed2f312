//! Pull-based audio source contract.

use std::path::{Path, PathBuf};

use super::{AudioRead, AudioSourceError, FileSource, SourceKind};
use crate::event::EventSender;

/// A microphone or file feeding the STT engine.
///
/// Sources announce new data with `AudioEvent::Available`; the control loop
/// then reads at most one buffer per announcement.  `slowdown` / `speedup`
/// let the loop throttle a source whose consumer has no free buffer.
pub trait AudioSource: Send {
    fn kind(&self) -> SourceKind;
    /// Fill `buf` with 16 kHz mono samples.
    fn read_audio(&mut self, buf: &mut [f32]) -> AudioRead;
    /// Drop audio captured so far.
    fn clear(&mut self);
    fn slowdown(&mut self);
    fn speedup(&mut self);
    /// Fraction consumed, `-1.0` for endless sources.
    fn progress(&self) -> f64;
    fn stop(&mut self);
    fn stopped(&self) -> bool;
}

/// Opens audio sources on behalf of the task manager.
pub trait AudioSourceFactory: Send {
    fn open_mic(&self, events: EventSender) -> Result<Box<dyn AudioSource>, AudioSourceError>;

    fn open_file(
        &self,
        path: &Path,
        stream_index: i32,
        events: EventSender,
    ) -> Result<Box<dyn AudioSource>, AudioSourceError>;
}

/// Opens [`FileSource`]s and, with the `mic` feature, `MicSource`s.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultSourceFactory;

impl AudioSourceFactory for DefaultSourceFactory {
    #[cfg(feature = "mic")]
    fn open_mic(&self, events: EventSender) -> Result<Box<dyn AudioSource>, AudioSourceError> {
        Ok(Box::new(super::MicSource::new(events)?))
    }

    #[cfg(not(feature = "mic"))]
    fn open_mic(&self, _events: EventSender) -> Result<Box<dyn AudioSource>, AudioSourceError> {
        Err(AudioSourceError::Unsupported(
            "microphone capture is not enabled in this build".into(),
        ))
    }

    fn open_file(
        &self,
        path: &Path,
        stream_index: i32,
        events: EventSender,
    ) -> Result<Box<dyn AudioSource>, AudioSourceError> {
        if stream_index > 0 {
            log::warn!("audio: stream index {stream_index} ignored for wav input");
        }
        Ok(Box::new(FileSource::open(path, events)?))
    }
}

/// Accept both plain paths and `file://` URLs.
pub fn local_path(input: &str) -> PathBuf {
    PathBuf::from(input.strip_prefix("file://").unwrap_or(input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_urls_become_paths() {
        assert_eq!(local_path("file:///tmp/a.wav"), PathBuf::from("/tmp/a.wav"));
        assert_eq!(local_path("/tmp/b.wav"), PathBuf::from("/tmp/b.wav"));
    }

    #[cfg(not(feature = "mic"))]
    #[test]
    fn mic_unavailable_without_feature() {
        let (tx, _rx) = crate::event::channel();
        assert!(matches!(
            DefaultSourceFactory.open_mic(tx),
            Err(AudioSourceError::Unsupported(_))
        ));
    }
}
