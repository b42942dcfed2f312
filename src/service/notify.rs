//! Notifications published by the task manager.

use std::path::PathBuf;

use serde::Serialize;
use tokio::sync::mpsc;

use super::state::{ServiceState, TaskState};
use super::task::TaskId;
use crate::engine::EngineKind;

/// Externally observable error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "engine")]
pub enum ErrorKind {
    ModelResolution,
    EngineConstruction(EngineKind),
    EngineRuntime(EngineKind),
    MicSource,
    FileSource,
    /// Merging synthesized audio failed.
    AudioMerge,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Notification {
    StateChanged { state: ServiceState },
    TaskStateChanged { state: TaskState },
    CurrentTaskChanged { task: TaskId },
    ModelsChanged,

    IntermediateTextDecoded { text: String, lang: String, task: TaskId },
    TextDecoded { text: String, lang: String, task: TaskId },
    SentenceTimeout { task: TaskId },
    TranscribeFileProgress { progress: f64, task: TaskId },

    /// A synthesized segment started playing.
    SpeechPlaying { progress: f64, task: TaskId },
    PlaySpeechFinished { task: TaskId },
    SpeechToFileProgress { progress: f64, task: TaskId },
    SpeechToFileFinished { files: Vec<PathBuf>, task: TaskId },
    TextRestored { text: String, task: TaskId },

    TextTranslated {
        in_text: String,
        in_lang: String,
        out_text: String,
        out_lang: String,
        task: TaskId,
    },
    TranslateProgress { progress: f64, task: TaskId },
    TextRepaired { text: String, task: TaskId },

    Error { error: ErrorKind },
    /// The service idle watchdog fired; the control loop is exiting.
    Shutdown,
}

pub type NotificationSender = mpsc::UnboundedSender<Notification>;
pub type NotificationReceiver = mpsc::UnboundedReceiver<Notification>;
