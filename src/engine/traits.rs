//! Per-family engine traits, engine states and the factory contract.
//!
//! Engines run their own worker activity and report back only through the
//! [`EventSink`](super::EventSink) handed to them at construction.  All
//! trait methods are called from the control loop and must not block for
//! long; heavy work belongs on the engine's own thread.

use std::path::PathBuf;

use thiserror::Error;

use super::config::{
    MntEngineConfig, MntParams, SttEngineConfig, SttParams, TextRepairEngineConfig,
    TextRepairParams, TtsEngineConfig, TtsParams,
};
use super::events::EventSink;
use super::EngineKind;
use crate::audio::AudioRead;
use crate::catalog::ModelEngine;

// ---------------------------------------------------------------------------
// EngineError
// ---------------------------------------------------------------------------

/// Errors raised while constructing an engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The config names an engine of another family.
    #[error("{engine:?} is not a {expected} engine")]
    WrongFamily {
        expected: EngineKind,
        engine: ModelEngine,
    },

    /// The factory has no implementation for this engine.
    #[error("{0:?} engine is not available in this build")]
    Unsupported(ModelEngine),

    /// A model or auxiliary file is missing on disk.
    #[error("model file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// The engine failed to initialise.
    #[error("engine initialisation failed: {0}")]
    Init(String),
}

// ---------------------------------------------------------------------------
// STT
// ---------------------------------------------------------------------------

/// What an STT engine is doing with the audio it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechDetectionStatus {
    #[default]
    NoSpeech,
    SpeechDetected,
    Decoding,
    Initializing,
}

/// Streaming speech recognizer.
///
/// Audio is pushed with a borrow/return protocol: the control loop borrows
/// a writable buffer, the audio source fills it, and the buffer is handed
/// back annotated with stream markers.  `borrow_buf` returning `None` means
/// the engine has no room right now.
pub trait SttEngine: Send {
    fn start(&mut self);
    /// Stop synchronously; no further events except `Stopped`.
    fn stop(&mut self);
    /// Ask the engine to finish; it reports `Stopped` when done.
    fn request_stop(&mut self);
    fn started(&self) -> bool;
    fn stopping(&self) -> bool;
    fn stop_requested(&self) -> bool;
    fn speech_detection_status(&self) -> SpeechDetectionStatus;
    /// Whether speech capture is switched on (manual mode toggle).
    fn speech_started(&self) -> bool;
    fn set_speech_started(&mut self, started: bool);
    fn borrow_buf(&mut self) -> Option<Vec<f32>>;
    fn return_buf(&mut self, buf: Vec<f32>, read: AudioRead);
    fn update_params(&mut self, params: &SttParams);
}

// ---------------------------------------------------------------------------
// TTS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsState {
    #[default]
    Idle,
    Initializing,
    SpeechEncoding,
    TextRestoring,
    Stopping,
    Stopped,
    Error,
}

/// Speech synthesizer producing one `SpeechEncoded` event per segment.
pub trait TtsEngine: Send {
    fn start(&mut self);
    /// Reset per-request state while keeping the loaded model.
    fn restart(&mut self);
    fn request_stop(&mut self);
    fn state(&self) -> TtsState;
    fn encode_speech(&mut self, text: &str);
    fn update_params(&mut self, params: &TtsParams);
}

// ---------------------------------------------------------------------------
// MNT
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MntState {
    #[default]
    Idle,
    Initializing,
    Translating,
    Stopping,
    Stopped,
    Error,
}

/// Machine translator.
pub trait MntEngine: Send {
    fn start(&mut self);
    fn stop(&mut self);
    fn request_stop(&mut self);
    fn state(&self) -> MntState;
    /// Progress of the running translation, `-1.0` when unknown.
    fn progress(&self) -> f64;
    fn translate(&mut self, text: &str);
    fn update_params(&mut self, params: &MntParams);
}

// ---------------------------------------------------------------------------
// Text repair
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextRepairState {
    #[default]
    Idle,
    Processing,
    Stopping,
    Stopped,
    Error,
}

/// What a text repair request should restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextRepairTask {
    RestorePunctuation,
    RestoreDiacriticsAr,
    RestoreDiacriticsHe,
}

impl TextRepairTask {
    /// Parse the numeric `task_type` option; `0` and unknown values mean
    /// no task.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::RestorePunctuation),
            2 => Some(Self::RestoreDiacriticsAr),
            3 => Some(Self::RestoreDiacriticsHe),
            _ => None,
        }
    }
}

/// Punctuation and diacritics restoration.
pub trait TextRepairEngine: Send {
    fn start(&mut self);
    fn request_stop(&mut self);
    fn state(&self) -> TextRepairState;
    fn repair_text(&mut self, text: &str, task: TextRepairTask);
    fn update_params(&mut self, params: &TextRepairParams);
}

// Compile-time assertion: every family trait must be usable as a trait object.
const _: fn() = || {
    fn _assert_object_safe(
        _: Box<dyn SttEngine>,
        _: Box<dyn TtsEngine>,
        _: Box<dyn MntEngine>,
        _: Box<dyn TextRepairEngine>,
    ) {
    }
};

// ---------------------------------------------------------------------------
// EngineFactory
// ---------------------------------------------------------------------------

/// Builds concrete engines.  Implementations dispatch on the config's
/// [`ModelEngine`] and return [`EngineError::Unsupported`] for engines they
/// do not provide.
///
/// A factory either returns a fully constructed engine or an error; it
/// must not keep partially initialised engines around.
pub trait EngineFactory: Send {
    fn create_stt(
        &self,
        config: &SttEngineConfig,
        sink: EventSink,
    ) -> Result<Box<dyn SttEngine>, EngineError>;

    fn create_tts(
        &self,
        config: &TtsEngineConfig,
        sink: EventSink,
    ) -> Result<Box<dyn TtsEngine>, EngineError>;

    fn create_mnt(
        &self,
        config: &MntEngineConfig,
        sink: EventSink,
    ) -> Result<Box<dyn MntEngine>, EngineError>;

    fn create_text_repair(
        &self,
        config: &TextRepairEngineConfig,
        sink: EventSink,
    ) -> Result<Box<dyn TextRepairEngine>, EngineError>;
}
