//! Externally observable status, derived from internal state.
//!
//! Both derivations are pure: the task manager snapshots the task, engine,
//! source and player states into an inputs struct after every event and
//! publishes the result when it changed.

use serde::Serialize;

use super::task::SpeechMode;
use crate::audio::{PlayerState, SourceKind};
use crate::engine::{EngineKind, MntState, SpeechDetectionStatus, TextRepairState, TtsState};

// ---------------------------------------------------------------------------
// ServiceState
// ---------------------------------------------------------------------------

/// Coarse service status.
///
/// ```text
/// not_configured ─► busy ─► transcribing_file ─► (mic) listening_* / playing_speech / translating
///                        ─► (tts) repairing_text / playing_speech / writing_speech_to_file
///                        ─► (mnt, text repair) translating / repairing_text ─► idle
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    #[default]
    Unknown,
    NotConfigured,
    Busy,
    Idle,
    ListeningManual,
    ListeningAuto,
    ListeningSingleSentence,
    TranscribingFile,
    PlayingSpeech,
    WritingSpeechToFile,
    Translating,
    RepairingText,
}

/// Snapshot consumed by [`derive_service_state`].
#[derive(Debug, Clone, Default)]
pub struct StatusInputs {
    pub has_models: bool,
    /// Catalog busy or its latest change not yet handled.
    pub busy: bool,
    pub source: Option<SourceKind>,
    pub task: Option<(EngineKind, SpeechMode)>,
    pub stt_status: Option<SpeechDetectionStatus>,
    pub tts: Option<TtsState>,
    pub mnt: Option<MntState>,
    pub text_repair: Option<TextRepairState>,
}

/// First matching rule wins.
pub fn derive_service_state(s: &StatusInputs) -> ServiceState {
    if !s.has_models {
        return ServiceState::NotConfigured;
    }
    if s.busy {
        return ServiceState::Busy;
    }

    match (s.source, s.task) {
        (Some(SourceKind::File), _) => return ServiceState::TranscribingFile,
        (Some(SourceKind::Mic), Some((engine, mode))) => {
            return match engine {
                EngineKind::Tts => ServiceState::PlayingSpeech,
                EngineKind::Mnt => ServiceState::Translating,
                _ => match mode {
                    SpeechMode::Manual
                        if s.stt_status.unwrap_or_default() == SpeechDetectionStatus::NoSpeech =>
                    {
                        ServiceState::Idle
                    }
                    SpeechMode::Manual => ServiceState::ListeningManual,
                    SpeechMode::SingleSentence => ServiceState::ListeningSingleSentence,
                    _ => ServiceState::ListeningAuto,
                },
            };
        }
        (Some(SourceKind::Mic), None) => return ServiceState::Idle,
        (None, _) => {}
    }

    match s.task {
        Some((EngineKind::Tts, mode)) => {
            if s.tts == Some(TtsState::TextRestoring) {
                ServiceState::RepairingText
            } else if mode == SpeechMode::SpeechToFile {
                ServiceState::WritingSpeechToFile
            } else {
                ServiceState::PlayingSpeech
            }
        }
        Some((EngineKind::Mnt, _)) => match s.mnt {
            Some(MntState::Idle | MntState::Error | MntState::Stopped) | None => ServiceState::Idle,
            Some(_) => ServiceState::Translating,
        },
        Some((EngineKind::TextRepair, _)) => match s.text_repair {
            Some(TextRepairState::Processing) => ServiceState::RepairingText,
            _ => ServiceState::Idle,
        },
        _ => ServiceState::Idle,
    }
}

// ---------------------------------------------------------------------------
// TaskState
// ---------------------------------------------------------------------------

/// Fine-grained task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Idle,
    SpeechDetected,
    Processing,
    Initializing,
    Playing,
    Paused,
    Canceling,
}

impl TaskState {
    /// Wire code of the state.
    pub fn code(self) -> i32 {
        match self {
            TaskState::Idle => 0,
            TaskState::SpeechDetected => 1,
            TaskState::Processing => 2,
            TaskState::Initializing => 3,
            TaskState::Playing => 4,
            TaskState::Paused => 5,
            TaskState::Canceling => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SttSnapshot {
    pub started: bool,
    pub stopping: bool,
    pub status: SpeechDetectionStatus,
}

/// Snapshot consumed by [`derive_task_state`].
#[derive(Debug, Clone, Default)]
pub struct TaskStateInputs {
    pub player: PlayerState,
    /// The current task plays synthesized speech.
    pub playing_speech: bool,
    pub task_paused: bool,
    pub stt: Option<SttSnapshot>,
    pub tts: Option<TtsState>,
    pub mnt: Option<MntState>,
    pub text_repair: Option<TextRepairState>,
}

pub fn derive_task_state(s: &TaskStateInputs) -> TaskState {
    if s.player == PlayerState::Playing && s.playing_speech {
        return TaskState::Playing;
    }

    if let Some(stt) = s.stt.filter(|stt| stt.started) {
        match stt.status {
            SpeechDetectionStatus::SpeechDetected => return TaskState::SpeechDetected,
            SpeechDetectionStatus::Decoding => return TaskState::Processing,
            SpeechDetectionStatus::Initializing => return TaskState::Initializing,
            SpeechDetectionStatus::NoSpeech => {}
        }
    }

    if s.player == PlayerState::Paused || (s.player == PlayerState::Stopped && s.task_paused) {
        return TaskState::Paused;
    }

    match s.tts {
        Some(TtsState::SpeechEncoding | TtsState::TextRestoring) => return TaskState::Processing,
        Some(TtsState::Initializing) => return TaskState::Initializing,
        Some(TtsState::Stopping) => return TaskState::Canceling,
        _ => {}
    }

    match s.mnt {
        Some(MntState::Translating) => return TaskState::Processing,
        Some(MntState::Initializing) => return TaskState::Initializing,
        Some(MntState::Stopping) => return TaskState::Canceling,
        _ => {}
    }

    if s.stt.is_some_and(|stt| stt.stopping) {
        return TaskState::Canceling;
    }

    match s.text_repair {
        Some(TextRepairState::Processing) => TaskState::Processing,
        Some(TextRepairState::Stopping) => TaskState::Canceling,
        _ => TaskState::Idle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready() -> StatusInputs {
        StatusInputs {
            has_models: true,
            ..StatusInputs::default()
        }
    }

    #[test]
    fn not_configured_wins_over_busy() {
        let s = StatusInputs {
            busy: true,
            ..StatusInputs::default()
        };
        assert_eq!(derive_service_state(&s), ServiceState::NotConfigured);

        let s = StatusInputs { busy: true, ..ready() };
        assert_eq!(derive_service_state(&s), ServiceState::Busy);
    }

    #[test]
    fn file_source_means_transcribing() {
        let s = StatusInputs {
            source: Some(SourceKind::File),
            task: Some((EngineKind::Stt, SpeechMode::Automatic)),
            ..ready()
        };
        assert_eq!(derive_service_state(&s), ServiceState::TranscribingFile);
    }

    #[test]
    fn mic_listening_variants() {
        let mic = |mode, status| StatusInputs {
            source: Some(SourceKind::Mic),
            task: Some((EngineKind::Stt, mode)),
            stt_status: Some(status),
            ..ready()
        };
        use SpeechDetectionStatus::*;
        assert_eq!(derive_service_state(&mic(SpeechMode::Manual, NoSpeech)), ServiceState::Idle);
        assert_eq!(
            derive_service_state(&mic(SpeechMode::Manual, SpeechDetected)),
            ServiceState::ListeningManual
        );
        assert_eq!(
            derive_service_state(&mic(SpeechMode::SingleSentence, NoSpeech)),
            ServiceState::ListeningSingleSentence
        );
        assert_eq!(
            derive_service_state(&mic(SpeechMode::Automatic, NoSpeech)),
            ServiceState::ListeningAuto
        );
    }

    #[test]
    fn tts_task_states() {
        let tts = |mode, state| StatusInputs {
            task: Some((EngineKind::Tts, mode)),
            tts: Some(state),
            ..ready()
        };
        assert_eq!(
            derive_service_state(&tts(SpeechMode::PlaySpeech, TtsState::TextRestoring)),
            ServiceState::RepairingText
        );
        assert_eq!(
            derive_service_state(&tts(SpeechMode::PlaySpeech, TtsState::SpeechEncoding)),
            ServiceState::PlayingSpeech
        );
        assert_eq!(
            derive_service_state(&tts(SpeechMode::SpeechToFile, TtsState::Idle)),
            ServiceState::WritingSpeechToFile
        );
    }

    #[test]
    fn text_tasks_idle_unless_processing() {
        let mnt = |state| StatusInputs {
            task: Some((EngineKind::Mnt, SpeechMode::Translate)),
            mnt: Some(state),
            ..ready()
        };
        assert_eq!(derive_service_state(&mnt(MntState::Translating)), ServiceState::Translating);
        assert_eq!(derive_service_state(&mnt(MntState::Initializing)), ServiceState::Translating);
        assert_eq!(derive_service_state(&mnt(MntState::Idle)), ServiceState::Idle);

        let repair = StatusInputs {
            task: Some((EngineKind::TextRepair, SpeechMode::Translate)),
            text_repair: Some(TextRepairState::Processing),
            ..ready()
        };
        assert_eq!(derive_service_state(&repair), ServiceState::RepairingText);
        assert_eq!(derive_service_state(&ready()), ServiceState::Idle);
    }

    #[test]
    fn task_state_priority() {
        let playing = TaskStateInputs {
            player: PlayerState::Playing,
            playing_speech: true,
            tts: Some(TtsState::SpeechEncoding),
            ..TaskStateInputs::default()
        };
        assert_eq!(derive_task_state(&playing), TaskState::Playing);

        let encoding = TaskStateInputs {
            tts: Some(TtsState::SpeechEncoding),
            ..TaskStateInputs::default()
        };
        assert_eq!(derive_task_state(&encoding), TaskState::Processing);

        let paused = TaskStateInputs {
            task_paused: true,
            tts: Some(TtsState::SpeechEncoding),
            ..TaskStateInputs::default()
        };
        assert_eq!(derive_task_state(&paused), TaskState::Paused);
        assert_eq!(TaskState::Paused.code(), 5);
    }

    #[test]
    fn task_state_from_stt() {
        let stt = |started, stopping, status| TaskStateInputs {
            stt: Some(SttSnapshot {
                started,
                stopping,
                status,
            }),
            ..TaskStateInputs::default()
        };
        use SpeechDetectionStatus::*;
        assert_eq!(derive_task_state(&stt(true, false, SpeechDetected)), TaskState::SpeechDetected);
        assert_eq!(derive_task_state(&stt(true, false, Decoding)), TaskState::Processing);
        assert_eq!(derive_task_state(&stt(true, false, Initializing)), TaskState::Initializing);
        assert_eq!(derive_task_state(&stt(true, true, NoSpeech)), TaskState::Canceling);
        assert_eq!(derive_task_state(&stt(false, false, Decoding)), TaskState::Idle);
        assert_eq!(derive_task_state(&TaskStateInputs::default()), TaskState::Idle);
    }
}
