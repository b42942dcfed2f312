//! The single unit of work in flight.

use std::path::PathBuf;

use serde::Serialize;

use crate::engine::{EngineKind, ListenMode};
use crate::options::Options;

pub type TaskId = i32;

/// Returned by control calls that were rejected.
pub const INVALID_TASK: TaskId = -1;

// ---------------------------------------------------------------------------
// TaskIdGenerator
// ---------------------------------------------------------------------------

/// Hands out task ids: 1, 2, 3 … wrapping modulo `i32::MAX`.
#[derive(Debug, Default)]
pub struct TaskIdGenerator {
    last: TaskId,
}

impl TaskIdGenerator {
    pub fn next_id(&mut self) -> TaskId {
        self.last = (self.last + 1) % TaskId::MAX;
        self.last
    }

    pub fn last(&self) -> TaskId {
        self.last
    }

    #[cfg(test)]
    pub(crate) fn starting_at(last: TaskId) -> Self {
        Self { last }
    }
}

// ---------------------------------------------------------------------------
// SpeechMode
// ---------------------------------------------------------------------------

/// What the task is doing.  Text-only tasks (translation and text repair)
/// use `Translate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechMode {
    Automatic,
    Manual,
    SingleSentence,
    PlaySpeech,
    SpeechToFile,
    Translate,
}

impl From<ListenMode> for SpeechMode {
    fn from(mode: ListenMode) -> Self {
        match mode {
            ListenMode::Automatic => SpeechMode::Automatic,
            ListenMode::Manual => SpeechMode::Manual,
            ListenMode::SingleSentence => SpeechMode::SingleSentence,
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskFlags {
    /// Drop microphone audio captured while the engine is decoding.
    pub clear_mic_while_decoding: bool,
    /// Play start/end beeps around listening.
    pub play_beep: bool,
}

#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub engine: EngineKind,
    pub model_id: String,
    pub speech_mode: SpeechMode,
    pub out_lang: String,
    /// 0.0 to 1.0, or -1.0 when not applicable.
    pub progress: f64,
    /// Artifacts produced so far (speech-to-file segments).
    pub files: Vec<PathBuf>,
    pub options: Options,
    /// Playback paused by the client (TTS playback only).
    pub paused: bool,
    pub flags: TaskFlags,
    /// A stop was requested; the task ends when the engine acknowledges.
    pub canceling: bool,
}

impl Task {
    pub fn new(id: TaskId, engine: EngineKind, model_id: String, speech_mode: SpeechMode) -> Self {
        Self {
            id,
            engine,
            model_id,
            speech_mode,
            out_lang: String::new(),
            progress: -1.0,
            files: Vec::new(),
            options: Options::new(),
            paused: false,
            flags: TaskFlags::default(),
            canceling: false,
        }
    }

    pub fn with_out_lang(mut self, out_lang: &str) -> Self {
        self.out_lang = out_lang.to_string();
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn with_flags(mut self, flags: TaskFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_progress(mut self, progress: f64) -> Self {
        self.progress = progress;
        self
    }

    pub fn is(&self, engine: EngineKind, mode: SpeechMode) -> bool {
        self.engine == engine && self.speech_mode == mode
    }
}
