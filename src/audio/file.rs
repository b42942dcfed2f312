//! WAV file input.
//!
//! The whole file is decoded up front (hound), converted to 16 kHz mono and
//! then handed out buffer by buffer.  A pacing thread emits
//! `AudioEvent::Available` at an interval that doubles on every
//! `slowdown()` (up to [`MAX_INTERVAL`]) and snaps back on `speedup()`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::resample::{downmix, int_to_f32, resample, SAMPLE_RATE};
use super::{AudioEvent, AudioRead, AudioSource, AudioSourceError, SourceKind};
use crate::event::{Event, EventSender};

pub const MIN_INTERVAL: Duration = Duration::from_millis(5);
pub const MAX_INTERVAL: Duration = Duration::from_millis(200);

struct Pacer {
    interval_ms: AtomicU64,
    stop: AtomicBool,
    finished: AtomicBool,
}

pub struct FileSource {
    path: PathBuf,
    samples: Vec<f32>,
    pos: usize,
    pacer: Arc<Pacer>,
}

impl FileSource {
    /// Decode `path` and start pacing.
    pub fn open(path: &Path, events: EventSender) -> Result<Self, AudioSourceError> {
        let samples = decode_wav(path)?;
        log::info!(
            "audio: opened {} ({:.1}s)",
            path.display(),
            samples.len() as f64 / SAMPLE_RATE as f64
        );

        let pacer = Arc::new(Pacer {
            interval_ms: AtomicU64::new(MIN_INTERVAL.as_millis() as u64),
            stop: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        });

        let p = Arc::clone(&pacer);
        thread::Builder::new()
            .name("file-source".into())
            .spawn(move || pace(p, events))
            .map_err(|e| AudioSourceError::Stream(e.to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            samples,
            pos: 0,
            pacer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn interval(&self) -> Duration {
        Duration::from_millis(self.pacer.interval_ms.load(Ordering::Relaxed))
    }
}

fn pace(pacer: Arc<Pacer>, events: EventSender) {
    while !pacer.stop.load(Ordering::Acquire) {
        thread::sleep(Duration::from_millis(
            pacer.interval_ms.load(Ordering::Relaxed),
        ));
        let event = if pacer.finished.load(Ordering::Acquire) {
            AudioEvent::Ended
        } else {
            AudioEvent::Available
        };
        let ended = event == AudioEvent::Ended;
        if events.send(Event::Audio(event)).is_err() || ended {
            break;
        }
    }
}

impl AudioSource for FileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn read_audio(&mut self, buf: &mut [f32]) -> AudioRead {
        let sof = self.pos == 0;
        let n = buf.len().min(self.samples.len() - self.pos);
        buf[..n].copy_from_slice(&self.samples[self.pos..self.pos + n]);
        self.pos += n;

        let eof = self.pos >= self.samples.len();
        if eof {
            self.pacer.finished.store(true, Ordering::Release);
        }
        AudioRead { size: n, sof, eof }
    }

    fn clear(&mut self) {}

    fn slowdown(&mut self) {
        let next = (self.interval() * 2).min(MAX_INTERVAL);
        self.pacer
            .interval_ms
            .store(next.as_millis() as u64, Ordering::Relaxed);
    }

    fn speedup(&mut self) {
        self.pacer
            .interval_ms
            .store(MIN_INTERVAL.as_millis() as u64, Ordering::Relaxed);
    }

    fn progress(&self) -> f64 {
        if self.samples.is_empty() {
            return 1.0;
        }
        self.pos as f64 / self.samples.len() as f64
    }

    fn stop(&mut self) {
        self.pacer.stop.store(true, Ordering::Release);
    }

    fn stopped(&self) -> bool {
        self.pacer.stop.load(Ordering::Acquire)
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Decode a WAV file into 16 kHz mono `f32`.
pub fn decode_wav(path: &Path) -> Result<Vec<f32>, AudioSourceError> {
    if !path.is_file() {
        return Err(AudioSourceError::NotFound(path.to_path_buf()));
    }

    let reader = hound::WavReader::open(path).map_err(|e| AudioSourceError::Decode(e.to_string()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| AudioSourceError::Decode(e.to_string()))?,
        hound::SampleFormat::Int => reader
            .into_samples::<i32>()
            .map(|s| s.map(|v| int_to_f32(v, spec.bits_per_sample)))
            .collect::<Result<_, _>>()
            .map_err(|e| AudioSourceError::Decode(e.to_string()))?,
    };

    let mono = downmix(&interleaved, spec.channels);
    Ok(resample(&mono, spec.sample_rate, SAMPLE_RATE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_wav(path: &Path, rate: u32, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames * channels as usize {
            w.write_sample(8_192_i16).unwrap();
        }
        w.finalize().unwrap();
    }

    #[test]
    fn decode_converts_to_16k_mono() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 32_000, 2, 3_200);

        let samples = decode_wav(&path).unwrap();
        assert_eq!(samples.len(), 1_600);
        assert!((samples[0] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = decode_wav(Path::new("/nonexistent/missing.wav"));
        assert!(matches!(err, Err(AudioSourceError::NotFound(_))));
    }

    #[test]
    fn garbage_file_is_decode_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        std::fs::write(&path, b"not a wav").unwrap();
        assert!(matches!(decode_wav(&path), Err(AudioSourceError::Decode(_))));
    }

    #[tokio::test]
    async fn reads_in_chunks_with_stream_markers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, SAMPLE_RATE, 1, 1_000);
        let (tx, mut rx) = crate::event::channel();

        let mut src = FileSource::open(&path, tx).unwrap();
        let mut buf = vec![0.0; 600];

        let first = src.read_audio(&mut buf);
        assert_eq!(first, AudioRead { size: 600, sof: true, eof: false });
        assert!((src.progress() - 0.6).abs() < 1e-9);

        let second = src.read_audio(&mut buf);
        assert_eq!(second, AudioRead { size: 400, sof: false, eof: true });

        // The pacer announces availability and then the end.
        let mut saw_ended = false;
        while let Some(ev) = rx.recv().await {
            if ev == Event::Audio(AudioEvent::Ended) {
                saw_ended = true;
                break;
            }
        }
        assert!(saw_ended);
    }

    #[test]
    fn slowdown_doubles_until_cap_and_speedup_resets() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, SAMPLE_RATE, 1, 10);
        let (tx, _rx) = crate::event::channel();

        let mut src = FileSource::open(&path, tx).unwrap();
        src.slowdown();
        assert_eq!(src.interval(), Duration::from_millis(10));
        for _ in 0..10 {
            src.slowdown();
        }
        assert_eq!(src.interval(), MAX_INTERVAL);
        src.speedup();
        assert_eq!(src.interval(), MIN_INTERVAL);

        src.stop();
        assert!(src.stopped());
    }
}
