//! Microphone input via `cpal`.
//!
//! `cpal::Stream` is not `Send`, so the stream lives on its own thread for
//! the lifetime of the [`MicSource`].  The cpal callback downmixes and
//! resamples each hardware buffer, pushes it into a shared [`RingBuffer`]
//! and announces `AudioEvent::Available`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use super::resample::{downmix, resample, SAMPLE_RATE};
use super::{AudioEvent, AudioRead, AudioSource, AudioSourceError, RingBuffer, SourceKind};
use crate::event::{Event, EventSender};

/// Ten seconds of 16 kHz audio.
const RING_CAPACITY: usize = SAMPLE_RATE as usize * 10;

pub struct MicSource {
    ring: Arc<Mutex<RingBuffer<f32>>>,
    stop: Arc<AtomicBool>,
    sof: bool,
}

impl MicSource {
    /// Open the default input device and start capturing.
    pub fn new(events: EventSender) -> Result<Self, AudioSourceError> {
        let ring = Arc::new(Mutex::new(RingBuffer::new(RING_CAPACITY)));
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();

        let (r, s) = (Arc::clone(&ring), Arc::clone(&stop));
        thread::Builder::new()
            .name("mic-source".into())
            .spawn(move || capture(r, s, events, ready_tx))
            .map_err(|e| AudioSourceError::Stream(e.to_string()))?;

        ready_rx
            .recv()
            .map_err(|_| AudioSourceError::Stream("capture thread exited".into()))??;

        Ok(Self {
            ring,
            stop,
            sof: true,
        })
    }
}

fn capture(
    ring: Arc<Mutex<RingBuffer<f32>>>,
    stop: Arc<AtomicBool>,
    events: EventSender,
    ready: mpsc::Sender<Result<(), AudioSourceError>>,
) {
    let stream = match build_stream(ring, events) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    while !stop.load(Ordering::Acquire) {
        thread::sleep(Duration::from_millis(50));
    }
    drop(stream);
    log::debug!("audio: mic capture stopped");
}

fn build_stream(
    ring: Arc<Mutex<RingBuffer<f32>>>,
    events: EventSender,
) -> Result<cpal::Stream, AudioSourceError> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or(AudioSourceError::NoDevice)?;
    let supported = device
        .default_input_config()
        .map_err(|e| AudioSourceError::Stream(e.to_string()))?;

    let channels = supported.channels();
    let rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    let err_events = events.clone();
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = resample(&downmix(data, channels), rate, SAMPLE_RATE);
                if let Ok(mut ring) = ring.lock() {
                    ring.push_slice(&mono);
                }
                let _ = events.send(Event::Audio(AudioEvent::Available));
            },
            move |err: cpal::StreamError| {
                log::error!("audio: cpal stream error: {err}");
                let _ = err_events.send(Event::Audio(AudioEvent::Error(err.to_string())));
            },
            None,
        )
        .map_err(|e| AudioSourceError::Stream(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioSourceError::Stream(e.to_string()))?;
    log::info!("audio: mic capture started ({rate} Hz, {channels} ch)");
    Ok(stream)
}

impl AudioSource for MicSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Mic
    }

    fn read_audio(&mut self, buf: &mut [f32]) -> AudioRead {
        let size = match self.ring.lock() {
            Ok(mut ring) => ring.pop_into(buf),
            Err(_) => 0,
        };
        let sof = std::mem::take(&mut self.sof);
        AudioRead {
            size,
            sof,
            eof: self.stopped(),
        }
    }

    fn clear(&mut self) {
        if let Ok(mut ring) = self.ring.lock() {
            ring.clear();
        }
    }

    // The device clock sets the pace.
    fn slowdown(&mut self) {}

    fn speedup(&mut self) {}

    fn progress(&self) -> f64 {
        -1.0
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::Release);
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        self.stop();
    }
}
