//! Engine callbacks and the sink engines report through.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use super::traits::{MntState, SpeechDetectionStatus, TextRepairState, TtsState};
use super::EngineKind;
use crate::audio::AudioFormat;
use crate::event::{Event, EventSender};
use crate::service::TaskId;

#[derive(Debug, Clone, PartialEq)]
pub enum SttEvent {
    TextDecoded { text: String, lang: String },
    IntermediateTextDecoded { text: String, lang: String },
    SpeechDetectionStatusChanged(SpeechDetectionStatus),
    /// No speech arrived within the single-sentence window.
    SentenceTimeout,
    /// Source audio has been fully consumed.
    Eof,
    Error,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TtsEvent {
    /// One synthesized segment written to `audio_path`.
    SpeechEncoded {
        text: String,
        audio_path: PathBuf,
        format: AudioFormat,
        progress: f64,
        last: bool,
    },
    TextRestored(String),
    StateChanged(TtsState),
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MntEvent {
    TextTranslated {
        in_text: String,
        in_lang: String,
        out_text: String,
        out_lang: String,
    },
    StateChanged(MntState),
    ProgressChanged(f64),
    /// `init` is set when the model failed to load.
    Error { init: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextRepairEvent {
    TextRepaired(String),
    StateChanged(TextRepairState),
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Stt(SttEvent),
    Tts(TtsEvent),
    Mnt(MntEvent),
    TextRepair(TextRepairEvent),
}

impl EngineEvent {
    pub fn kind(&self) -> EngineKind {
        match self {
            EngineEvent::Stt(_) => EngineKind::Stt,
            EngineEvent::Tts(_) => EngineKind::Tts,
            EngineEvent::Mnt(_) => EngineKind::Mnt,
            EngineEvent::TextRepair(_) => EngineKind::TextRepair,
        }
    }
}

impl From<SttEvent> for EngineEvent {
    fn from(e: SttEvent) -> Self {
        EngineEvent::Stt(e)
    }
}

impl From<TtsEvent> for EngineEvent {
    fn from(e: TtsEvent) -> Self {
        EngineEvent::Tts(e)
    }
}

impl From<MntEvent> for EngineEvent {
    fn from(e: MntEvent) -> Self {
        EngineEvent::Mnt(e)
    }
}

impl From<TextRepairEvent> for EngineEvent {
    fn from(e: TextRepairEvent) -> Self {
        EngineEvent::TextRepair(e)
    }
}

/// Handle an engine uses to report back to the control loop.
///
/// The sink belongs to one family and stamps every event with the task id
/// currently bound to that family, so events emitted after a rebind are
/// recognisable as stale.
#[derive(Debug, Clone)]
pub struct EventSink {
    kind: EngineKind,
    binding: Arc<AtomicI32>,
    tx: EventSender,
}

impl EventSink {
    pub(crate) fn new(kind: EngineKind, binding: Arc<AtomicI32>, tx: EventSender) -> Self {
        Self { kind, binding, tx }
    }

    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Send `event` tagged with the bound task.  Events after the control
    /// loop is gone are dropped.
    pub fn emit(&self, event: impl Into<EngineEvent>) {
        let event = event.into();
        debug_assert_eq!(event.kind(), self.kind);
        let task: TaskId = self.binding.load(Ordering::Acquire);
        if self.tx.send(Event::Engine { task, event }).is_err() {
            log::debug!("engine: {} event dropped, control loop closed", self.kind);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_tags_with_current_binding() {
        let (tx, mut rx) = crate::event::channel();
        let binding = Arc::new(AtomicI32::new(3));
        let sink = EventSink::new(EngineKind::Stt, binding.clone(), tx);

        sink.emit(SttEvent::Eof);
        binding.store(4, Ordering::Release);
        sink.emit(SttEvent::Stopped);

        assert_eq!(
            rx.try_recv().ok(),
            Some(Event::Engine {
                task: 3,
                event: EngineEvent::Stt(SttEvent::Eof)
            })
        );
        assert_eq!(
            rx.try_recv().ok(),
            Some(Event::Engine {
                task: 4,
                event: EngineEvent::Stt(SttEvent::Stopped)
            })
        );
    }

    #[test]
    fn emit_after_receiver_dropped_is_silent() {
        let (tx, rx) = crate::event::channel();
        drop(rx);
        let sink = EventSink::new(EngineKind::Mnt, Arc::new(AtomicI32::new(1)), tx);
        sink.emit(MntEvent::ProgressChanged(0.5));
    }
}
