//! Test doubles for the player, compressor and audio sources.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::{
    AudioFormat, AudioQuality, AudioRead, AudioSource, AudioSourceError, AudioSourceFactory,
    CompressError, MediaCompressor, Player, PlayerSink, PlayerState, SourceKind,
};
use crate::event::EventSender;

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct PlayerLog {
    pub calls: Vec<String>,
    pub played: Vec<PathBuf>,
    pub state: PlayerState,
    pub sink: Option<PlayerSink>,
}

/// Records calls; state changes are driven by the test through the sink.
pub struct MockPlayer(pub Arc<Mutex<PlayerLog>>);

impl MockPlayer {
    pub fn new() -> (Self, Arc<Mutex<PlayerLog>>) {
        let log = Arc::new(Mutex::new(PlayerLog::default()));
        (Self(log.clone()), log)
    }
}

impl Player for MockPlayer {
    fn attach(&mut self, sink: PlayerSink) {
        self.0.lock().unwrap().sink = Some(sink);
    }

    fn play(&mut self, path: &Path) {
        let mut log = self.0.lock().unwrap();
        log.calls.push("play".into());
        log.played.push(path.to_path_buf());
        log.state = PlayerState::Playing;
    }

    fn pause(&mut self) {
        let mut log = self.0.lock().unwrap();
        log.calls.push("pause".into());
        log.state = PlayerState::Paused;
    }

    fn resume(&mut self) {
        let mut log = self.0.lock().unwrap();
        log.calls.push("resume".into());
        log.state = PlayerState::Playing;
    }

    fn stop(&mut self) {
        let mut log = self.0.lock().unwrap();
        log.calls.push("stop".into());
        log.state = PlayerState::Stopped;
    }

    fn state(&self) -> PlayerState {
        self.0.lock().unwrap().state
    }
}

// ---------------------------------------------------------------------------
// Compressor
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CompressLog {
    pub merges: Vec<(Vec<PathBuf>, PathBuf)>,
    pub decoded: Vec<PathBuf>,
    pub fail_decode: bool,
}

/// Writes empty output files so existence checks behave as with real
/// encoders.
pub struct MockCompressor(pub Arc<Mutex<CompressLog>>);

impl MockCompressor {
    pub fn new() -> (Self, Arc<Mutex<CompressLog>>) {
        let log = Arc::new(Mutex::new(CompressLog::default()));
        (Self(log.clone()), log)
    }
}

impl MediaCompressor for MockCompressor {
    fn merge(
        &mut self,
        inputs: &[PathBuf],
        output: &Path,
        _format: AudioFormat,
        _quality: AudioQuality,
    ) -> Result<(), CompressError> {
        std::fs::write(output, b"")?;
        self.0
            .lock()
            .unwrap()
            .merges
            .push((inputs.to_vec(), output.to_path_buf()));
        Ok(())
    }

    fn decode_to_wav(&mut self, input: &Path, output: &Path) -> Result<(), CompressError> {
        let mut log = self.0.lock().unwrap();
        if log.fail_decode {
            return Err(CompressError::Unsupported(AudioFormat::Mp3));
        }
        log.decoded.push(input.to_path_buf());
        drop(log);
        std::fs::write(output, b"")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SourceLog {
    pub opened: Vec<SourceKind>,
    pub cleared: usize,
    pub slowdowns: usize,
    pub speedups: usize,
    pub stopped: bool,
    pub fail_mic: bool,
    /// Samples a file source serves before reporting end of stream.
    pub file_samples: usize,
}

pub struct MockSource {
    kind: SourceKind,
    remaining: usize,
    total: usize,
    sof: bool,
    log: Arc<Mutex<SourceLog>>,
}

impl AudioSource for MockSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn read_audio(&mut self, buf: &mut [f32]) -> AudioRead {
        let sof = std::mem::take(&mut self.sof);
        match self.kind {
            SourceKind::Mic => AudioRead {
                size: buf.len(),
                sof,
                eof: false,
            },
            SourceKind::File => {
                let n = buf.len().min(self.remaining);
                self.remaining -= n;
                AudioRead {
                    size: n,
                    sof,
                    eof: self.remaining == 0,
                }
            }
        }
    }

    fn clear(&mut self) {
        self.log.lock().unwrap().cleared += 1;
    }

    fn slowdown(&mut self) {
        self.log.lock().unwrap().slowdowns += 1;
    }

    fn speedup(&mut self) {
        self.log.lock().unwrap().speedups += 1;
    }

    fn progress(&self) -> f64 {
        match self.kind {
            SourceKind::Mic => -1.0,
            SourceKind::File if self.total == 0 => 1.0,
            SourceKind::File => (self.total - self.remaining) as f64 / self.total as f64,
        }
    }

    fn stop(&mut self) {
        self.log.lock().unwrap().stopped = true;
    }

    fn stopped(&self) -> bool {
        self.log.lock().unwrap().stopped
    }
}

/// Opens [`MockSource`]s.  File sources only open paths that exist.
pub struct MockSourceFactory(pub Arc<Mutex<SourceLog>>);

impl MockSourceFactory {
    pub fn new() -> (Self, Arc<Mutex<SourceLog>>) {
        let log = Arc::new(Mutex::new(SourceLog {
            file_samples: 4_096,
            ..SourceLog::default()
        }));
        (Self(log.clone()), log)
    }
}

impl AudioSourceFactory for MockSourceFactory {
    fn open_mic(&self, _events: EventSender) -> Result<Box<dyn AudioSource>, AudioSourceError> {
        let mut log = self.0.lock().unwrap();
        if log.fail_mic {
            return Err(AudioSourceError::NoDevice);
        }
        log.opened.push(SourceKind::Mic);
        log.stopped = false;
        Ok(Box::new(MockSource {
            kind: SourceKind::Mic,
            remaining: 0,
            total: 0,
            sof: true,
            log: self.0.clone(),
        }))
    }

    fn open_file(
        &self,
        path: &Path,
        _stream_index: i32,
        _events: EventSender,
    ) -> Result<Box<dyn AudioSource>, AudioSourceError> {
        if !path.exists() {
            return Err(AudioSourceError::NotFound(path.to_path_buf()));
        }
        let mut log = self.0.lock().unwrap();
        log.opened.push(SourceKind::File);
        log.stopped = false;
        Ok(Box::new(MockSource {
            kind: SourceKind::File,
            remaining: log.file_samples,
            total: log.file_samples,
            sof: true,
            log: self.0.clone(),
        }))
    }
}
