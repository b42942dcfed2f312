//! Inference engine contracts and lifecycle management.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    EngineController                           │
//! │                                                              │
//! │  ensure_stt / ensure_tts / ensure_mnt / ensure_text_repair    │
//! │        │                                                     │
//! │        ├─ fingerprint unchanged → update_params + restart     │
//! │        └─ fingerprint changed   → teardown old                │
//! │                                   EngineFactory::create_*     │
//! │                                   start                       │
//! │                                                              │
//! │  one slot per family:  stt │ tts │ mnt │ text_repair          │
//! └──────────────┬───────────────────────────────────────────────┘
//!                │ EventSink (family-bound, tags the bound task id)
//!                ▼
//!        Event::Engine { task, event }  →  control loop
//! ```
//!
//! Concrete engines (whisper, piper, bergamot …) live outside this crate
//! and are plugged in through [`EngineFactory`].

pub mod config;
pub mod controller;
pub mod events;
pub mod traits;

#[cfg(test)]
pub(crate) mod mock;

use std::fmt;

use serde::Serialize;

use crate::catalog::ModelRole;

pub use config::{
    AudioCtx, GpuApi, GpuDevice, ListenMode, MntEngineConfig, MntModelFiles, MntParams, SubConfig,
    SubtitlesSync, SttEngineConfig, SttModelFiles, SttParams, TagMode, TextFormat,
    TextRepairEngineConfig, TextRepairModelFiles, TextRepairParams, TtsEngineConfig,
    TtsModelFiles, TtsParams,
};
pub use controller::{EngineController, Ensured};
pub use events::{EngineEvent, EventSink, MntEvent, SttEvent, TextRepairEvent, TtsEvent};
pub use traits::{
    EngineError, EngineFactory, MntEngine, MntState, SpeechDetectionStatus, SttEngine,
    TextRepairEngine, TextRepairState, TextRepairTask, TtsEngine, TtsState,
};

// ---------------------------------------------------------------------------
// EngineKind
// ---------------------------------------------------------------------------

/// Engine family a task runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Stt,
    Tts,
    Mnt,
    TextRepair,
}

impl EngineKind {
    pub const ALL: [EngineKind; 4] = [
        EngineKind::Stt,
        EngineKind::Tts,
        EngineKind::Mnt,
        EngineKind::TextRepair,
    ];

    /// Catalog role of the models this family consumes.
    pub fn model_role(self) -> ModelRole {
        match self {
            EngineKind::Stt => ModelRole::Stt,
            EngineKind::Tts => ModelRole::Tts,
            EngineKind::Mnt => ModelRole::Mnt,
            EngineKind::TextRepair => ModelRole::Ttt,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            EngineKind::Stt => 0,
            EngineKind::Tts => 1,
            EngineKind::Mnt => 2,
            EngineKind::TextRepair => 3,
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineKind::Stt => "stt",
            EngineKind::Tts => "tts",
            EngineKind::Mnt => "mnt",
            EngineKind::TextRepair => "text_repair",
        })
    }
}
