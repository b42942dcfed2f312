//! The task manager: single owner of the current task, the engines and the
//! audio I/O.
//!
//! # Request flow
//!
//! ```text
//! control call
//!   ├─ ensure_ready          catalog busy / change unhandled → InvalidState
//!   ├─ validate arguments    → InvalidState, nothing touched
//!   ├─ resolve model         → ModelResolutionFailed, nothing touched
//!   ├─ retire current task   stop its engine activity, drop source / queue
//!   ├─ allocate id, bind     engine events now carry the new id
//!   ├─ ensure engine         → EngineConstructionFailed
//!   ├─ open audio source     → AudioSource (stt only)
//!   └─ install task          CurrentTaskChanged, status refresh
//! ```
//!
//! Failures are logged, published as a single `Notification::Error` (except
//! `InvalidState`) and turned into `INVALID_TASK` / `Err` at the boundary.
//!
//! # Event flow
//!
//! Engine, source and player callbacks arrive one at a time through
//! [`TaskManager::handle_event`].  Engine events tagged with a task other
//! than the current one are stale and dropped.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::error::ServiceError;
use super::notify::{ErrorKind, Notification, NotificationSender};
use super::queue::{discard, PartialResult, ResultQueue};
use super::state::{
    derive_service_state, derive_task_state, ServiceState, SttSnapshot, StatusInputs, TaskState,
    TaskStateInputs,
};
use super::task::{SpeechMode, Task, TaskFlags, TaskId, TaskIdGenerator, INVALID_TASK};
use super::watchdog::Watchdog;
use crate::audio::source::local_path;
use crate::audio::{
    AudioEvent, AudioFormat, AudioQuality, AudioSource, AudioSourceError, AudioSourceFactory,
    CompressError, MediaCompressor, Player, PlayerSink, PlayerState, SourceKind,
};
use crate::catalog::{ModelCatalog, ModelIndex, ModelRole, ModelSummary};
use crate::config::{purge_cached_audio, AppConfig, DefaultsConfig};
use crate::engine::{
    EngineController, EngineEvent, EngineFactory, EngineKind, ListenMode, MntEngineConfig,
    MntEvent, MntState, SpeechDetectionStatus, SttEngineConfig, SttEvent, TextRepairEngineConfig,
    TextRepairEvent, TextRepairState, TextRepairTask, TtsEngineConfig, TtsEvent, TtsState,
};
use crate::event::{Event, EventSender};
use crate::options::{Options, OptionsExt};
use crate::selector::{
    MntModelConfig, ModelConfig, ModelSelector, SelectError, SttModelConfig,
    TextRepairModelConfig, TtsModelConfig,
};

const BEEP_START: &str = "beep-start.wav";
const BEEP_END: &str = "beep-end.wav";

/// External collaborators injected at construction.
pub struct Collaborators {
    pub catalog: Arc<dyn ModelCatalog>,
    pub engines: Box<dyn EngineFactory>,
    pub sources: Box<dyn AudioSourceFactory>,
    /// Plays synthesized speech.
    pub player: Box<dyn Player>,
    /// Plays start/end beeps; optional.
    pub beeper: Option<Box<dyn Player>>,
    pub compressor: Box<dyn MediaCompressor>,
}

pub struct TaskManager {
    config: AppConfig,
    catalog: Arc<dyn ModelCatalog>,
    index: ModelIndex,
    models_handled: bool,

    engines: EngineController,
    sources: Box<dyn AudioSourceFactory>,
    source: Option<Box<dyn AudioSource>>,
    player: Box<dyn Player>,
    beeper: Option<Box<dyn Player>>,
    compressor: Box<dyn MediaCompressor>,

    events: EventSender,
    notify: NotificationSender,

    ids: TaskIdGenerator,
    task: Option<Task>,
    queue: ResultQueue,
    /// Segment handed to the player and not yet finished.
    playing: Option<PartialResult>,

    service_watchdog: Watchdog,
    task_watchdog: Watchdog,
    shut_down: bool,

    state: ServiceState,
    task_state: TaskState,
}

impl TaskManager {
    pub fn new(
        config: AppConfig,
        parts: Collaborators,
        events: EventSender,
        notify: NotificationSender,
    ) -> Self {
        if config.cache.purge_on_start {
            let dir = config.cache_dir();
            match purge_cached_audio(&dir) {
                Ok(n) => log::info!("service: purged {n} cached audio files from {}", dir.display()),
                Err(e) => log::warn!("service: cache purge failed: {e}"),
            }
        }

        let mut player = parts.player;
        player.attach(PlayerSink::new(events.clone()));

        let service_watchdog = Watchdog::new(
            "service",
            Duration::from_secs(config.keepalive.service_idle_secs),
        );
        let task_watchdog =
            Watchdog::new("task", Duration::from_secs(config.keepalive.task_idle_secs));

        let mut manager = Self {
            config,
            catalog: parts.catalog,
            index: ModelIndex::default(),
            models_handled: false,
            engines: EngineController::new(parts.engines, events.clone()),
            sources: parts.sources,
            source: None,
            player,
            beeper: parts.beeper,
            compressor: parts.compressor,
            events,
            notify,
            ids: TaskIdGenerator::default(),
            task: None,
            queue: ResultQueue::default(),
            playing: None,
            service_watchdog,
            task_watchdog,
            shut_down: false,
            state: ServiceState::Unknown,
            task_state: TaskState::Idle,
        };
        manager.models_changed();
        manager.service_watchdog.arm();
        manager
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn state(&self) -> ServiceState {
        self.state
    }

    pub fn task_state(&self) -> TaskState {
        self.task_state
    }

    pub fn current_task(&self) -> TaskId {
        self.task.as_ref().map_or(INVALID_TASK, |t| t.id)
    }

    pub fn task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    pub fn defaults(&self) -> &DefaultsConfig {
        &self.config.defaults
    }

    pub fn available_models(&self, role: ModelRole) -> Vec<ModelSummary> {
        self.index.models_of(role)
    }

    pub fn available_langs(&self, role: ModelRole) -> Vec<String> {
        self.index.langs(role)
    }

    pub fn mnt_out_langs(&self, in_lang: &str) -> Vec<String> {
        self.index.mnt_out_langs(in_lang)
    }

    /// Progress of the current file transcription, `-1` otherwise.
    pub fn transcribe_file_progress(&self, task: TaskId) -> f64 {
        match (&self.task, &self.source) {
            (Some(t), Some(s)) if t.id == task && s.kind() == SourceKind::File => s.progress(),
            _ => -1.0,
        }
    }

    pub fn speech_to_file_progress(&self, task: TaskId) -> f64 {
        match &self.task {
            Some(t) if t.id == task && t.is(EngineKind::Tts, SpeechMode::SpeechToFile) => t.progress,
            _ => -1.0,
        }
    }

    pub fn translate_progress(&self, task: TaskId) -> f64 {
        match &self.task {
            Some(t) if t.id == task && t.engine == EngineKind::Mnt => self
                .engines
                .mnt()
                .map(|m| m.progress())
                .filter(|p| *p >= 0.0)
                .unwrap_or(t.progress),
            _ => -1.0,
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    /// Mark the catalog as changing; calls are rejected until
    /// [`models_changed`](Self::models_changed).
    pub fn reload(&mut self) {
        self.service_watchdog.arm();
        log::info!("service: catalog reload requested");
        self.models_handled = false;
        self.refresh();
    }

    /// Rebuild the model index from the catalog.
    pub fn models_changed(&mut self) {
        self.index = ModelIndex::new(self.catalog.available_models());
        self.index.fix_defaults(&mut self.config.defaults);
        self.models_handled = true;
        log::info!("service: {} models available", self.index.models().len());

        let stt_model_gone = self
            .engines
            .model_id(EngineKind::Stt)
            .is_some_and(|id| !self.index.contains(id));
        if stt_model_gone {
            log::warn!("service: stt model removed from catalog, stopping stt");
            if self.task.as_ref().is_some_and(|t| t.engine == EngineKind::Stt) {
                self.finish_task("model removed");
            }
            self.engines.destroy(EngineKind::Stt);
        }

        self.emit(Notification::ModelsChanged);
        self.refresh();
    }

    // -----------------------------------------------------------------------
    // Control API: stt
    // -----------------------------------------------------------------------

    pub fn start_listen(
        &mut self,
        mode: ListenMode,
        lang: &str,
        out_lang: &str,
        options: Options,
    ) -> TaskId {
        self.service_watchdog.arm();
        let result = self.try_start_listen(mode, lang, out_lang, options);
        self.accept("start_listen", result)
    }

    fn try_start_listen(
        &mut self,
        mode: ListenMode,
        lang: &str,
        out_lang: &str,
        options: Options,
    ) -> Result<TaskId, ServiceError> {
        self.ensure_ready()?;
        let model = self.resolve_stt(lang)?;
        let flags = TaskFlags {
            clear_mic_while_decoding: options.bool_or("stt_clear_mic_audio_when_decoding", false),
            play_beep: options.bool_or("stt_play_beep", false),
        };

        self.retire_current();
        let id = self.ids.next_id();
        self.engines.bind(EngineKind::Stt, id);
        let config = SttEngineConfig::build(&model, mode, out_lang, &self.config, &options);
        self.ensure_stt(config)?;

        let source = self.sources.open_mic(self.events.clone());
        self.attach_source(SourceKind::Mic, source)?;

        if mode == ListenMode::Manual {
            if let Some(stt) = self.engines.stt_mut() {
                stt.set_speech_started(true);
            }
        }
        if flags.play_beep {
            self.beep(BEEP_START);
        }

        let task = Task::new(id, EngineKind::Stt, model.model_id, mode.into())
            .with_out_lang(out_lang)
            .with_options(options)
            .with_flags(flags);
        self.install_task(task);
        Ok(id)
    }

    /// End listening gracefully; the engine decodes what it has and the
    /// task ends when it reports `Stopped`.
    pub fn stop_listen(&mut self, task: TaskId) -> Result<(), ServiceError> {
        self.service_watchdog.arm();
        let result = self.try_stop_listen(task);
        self.checked("stop_listen", result)
    }

    fn try_stop_listen(&mut self, task: TaskId) -> Result<(), ServiceError> {
        let (engine, mode, play_beep) = {
            let t = self.current(task)?;
            (t.engine, t.speech_mode, t.flags.play_beep)
        };
        if engine != EngineKind::Stt {
            return Err(ServiceError::invalid("current task is not a listening task"));
        }

        self.close_source();
        if play_beep {
            self.beep(BEEP_END);
        }

        let graceful = match self.engines.stt_mut() {
            Some(stt) if stt.started() => {
                if mode == SpeechMode::Manual {
                    stt.set_speech_started(false);
                }
                stt.request_stop();
                true
            }
            _ => false,
        };

        if graceful {
            if let Some(t) = self.task.as_mut() {
                t.canceling = true;
            }
            self.refresh();
        } else {
            self.finish_task("listening stopped");
        }
        Ok(())
    }

    /// Transcribe a WAV file (plain path or `file://` URL).
    pub fn transcribe_file(
        &mut self,
        file: &str,
        lang: &str,
        out_lang: &str,
        options: Options,
    ) -> TaskId {
        self.service_watchdog.arm();
        let result = self.try_transcribe_file(file, lang, out_lang, options);
        self.accept("transcribe_file", result)
    }

    fn try_transcribe_file(
        &mut self,
        file: &str,
        lang: &str,
        out_lang: &str,
        options: Options,
    ) -> Result<TaskId, ServiceError> {
        self.ensure_ready()?;
        let path = local_path(file);
        if !path.is_file() {
            return Err(ServiceError::AudioSource {
                kind: SourceKind::File,
                source: AudioSourceError::NotFound(path),
            });
        }
        let model = self.resolve_stt(lang)?;

        self.retire_current();
        let id = self.ids.next_id();
        self.engines.bind(EngineKind::Stt, id);
        let config = SttEngineConfig::build(
            &model,
            ListenMode::Automatic,
            out_lang,
            &self.config,
            &options,
        );
        self.ensure_stt(config)?;

        let stream_index = i32::try_from(options.int_or("stream_index", -1)).unwrap_or(-1);
        let source = self
            .sources
            .open_file(&path, stream_index, self.events.clone());
        self.attach_source(SourceKind::File, source)?;

        let task = Task::new(id, EngineKind::Stt, model.model_id, SpeechMode::Automatic)
            .with_out_lang(out_lang)
            .with_options(options)
            .with_progress(0.0);
        self.install_task(task);
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Control API: tts
    // -----------------------------------------------------------------------

    pub fn play_speech(&mut self, text: &str, lang: &str, options: Options) -> TaskId {
        self.service_watchdog.arm();
        let result = self.try_speak(text, lang, options, SpeechMode::PlaySpeech);
        self.accept("play_speech", result)
    }

    pub fn speech_to_file(&mut self, text: &str, lang: &str, options: Options) -> TaskId {
        self.service_watchdog.arm();
        let result = self.try_speak(text, lang, options, SpeechMode::SpeechToFile);
        self.accept("speech_to_file", result)
    }

    fn try_speak(
        &mut self,
        text: &str,
        lang: &str,
        options: Options,
        mode: SpeechMode,
    ) -> Result<TaskId, ServiceError> {
        self.ensure_ready()?;
        if text.trim().is_empty() {
            return Err(ServiceError::invalid("text is empty"));
        }
        let model = self.resolve_tts(lang)?;

        self.retire_current();
        let id = self.ids.next_id();
        self.engines.bind(EngineKind::Tts, id);
        let config = TtsEngineConfig::build(&model, &self.config, &options);
        self.engines
            .ensure_tts(config)
            .map_err(|source| ServiceError::EngineConstructionFailed {
                kind: EngineKind::Tts,
                source,
            })?;

        self.queue.clear();
        if let Some(tts) = self.engines.tts_mut() {
            tts.encode_speech(text);
        }

        let task = Task::new(id, EngineKind::Tts, model.model_id, mode)
            .with_options(options)
            .with_progress(0.0);
        self.install_task(task);
        Ok(id)
    }

    pub fn pause_speech(&mut self, task: TaskId) -> Result<(), ServiceError> {
        self.service_watchdog.arm();
        let result = self.try_pause_speech(task);
        self.checked("pause_speech", result)
    }

    fn try_pause_speech(&mut self, task: TaskId) -> Result<(), ServiceError> {
        self.current_playback(task)?;
        if self.player.state() == PlayerState::Playing {
            self.player.pause();
        }
        if let Some(t) = self.task.as_mut() {
            t.paused = true;
        }
        self.refresh();
        Ok(())
    }

    pub fn resume_speech(&mut self, task: TaskId) -> Result<(), ServiceError> {
        self.service_watchdog.arm();
        let result = self.try_resume_speech(task);
        self.checked("resume_speech", result)
    }

    fn try_resume_speech(&mut self, task: TaskId) -> Result<(), ServiceError> {
        if !self.current_playback(task)?.paused {
            return Err(ServiceError::invalid("speech is not paused"));
        }
        if let Some(t) = self.task.as_mut() {
            t.paused = false;
        }
        if self.player.state() == PlayerState::Paused {
            self.player.resume();
        } else {
            self.drain_queue();
        }
        self.refresh();
        Ok(())
    }

    pub fn stop_speech(&mut self, task: TaskId) -> Result<(), ServiceError> {
        self.service_watchdog.arm();
        let result = self.try_stop_speech(task);
        self.checked("stop_speech", result)
    }

    fn try_stop_speech(&mut self, task: TaskId) -> Result<(), ServiceError> {
        if self.current(task)?.engine != EngineKind::Tts {
            return Err(ServiceError::invalid("current task is not a speech task"));
        }
        self.cancel_current();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Control API: text
    // -----------------------------------------------------------------------

    pub fn translate(&mut self, text: &str, lang: &str, out_lang: &str, options: Options) -> TaskId {
        self.service_watchdog.arm();
        let result = self.try_translate(text, lang, out_lang, options);
        self.accept("translate", result)
    }

    fn try_translate(
        &mut self,
        text: &str,
        lang: &str,
        out_lang: &str,
        options: Options,
    ) -> Result<TaskId, ServiceError> {
        self.ensure_ready()?;
        if text.trim().is_empty() {
            return Err(ServiceError::invalid("text is empty"));
        }
        let model = self.resolve_mnt(lang, out_lang)?;

        self.retire_current();
        let id = self.ids.next_id();
        self.engines.bind(EngineKind::Mnt, id);
        let config = MntEngineConfig::build(&model, &self.config, &options);
        self.engines
            .ensure_mnt(config)
            .map_err(|source| ServiceError::EngineConstructionFailed {
                kind: EngineKind::Mnt,
                source,
            })?;

        if let Some(mnt) = self.engines.mnt_mut() {
            mnt.translate(text);
        }

        let task = Task::new(id, EngineKind::Mnt, model.model_id, SpeechMode::Translate)
            .with_out_lang(&model.out_lang_id)
            .with_options(options)
            .with_progress(0.0);
        self.install_task(task);
        Ok(id)
    }

    /// Restore punctuation or diacritics; `task_type` picks which.
    pub fn repair_text(&mut self, text: &str, options: Options) -> TaskId {
        self.service_watchdog.arm();
        let result = self.try_repair_text(text, options);
        self.accept("repair_text", result)
    }

    fn try_repair_text(&mut self, text: &str, options: Options) -> Result<TaskId, ServiceError> {
        self.ensure_ready()?;
        let job = TextRepairTask::from_code(options.int_or("task_type", 0))
            .ok_or_else(|| ServiceError::invalid("missing or unknown task_type"))?;
        if text.trim().is_empty() {
            return Err(ServiceError::invalid("text is empty"));
        }

        let model = self.resolve_text_repair()?;
        let has_model = match job {
            TextRepairTask::RestorePunctuation => model.punctuation.is_some(),
            TextRepairTask::RestoreDiacriticsAr => model.diacritizer_ar.is_some(),
            TextRepairTask::RestoreDiacriticsHe => model.diacritizer_he.is_some(),
        };
        if !has_model {
            return Err(SelectError::NotFound {
                kind: EngineKind::TextRepair,
                id: format!("{job:?}"),
            }
            .into());
        }

        self.retire_current();
        let id = self.ids.next_id();
        self.engines.bind(EngineKind::TextRepair, id);
        let config = TextRepairEngineConfig::build(&model, &self.config, &options);
        self.engines
            .ensure_text_repair(config)
            .map_err(|source| ServiceError::EngineConstructionFailed {
                kind: EngineKind::TextRepair,
                source,
            })?;

        if let Some(engine) = self.engines.text_repair_mut() {
            engine.repair_text(text, job);
        }

        let task = Task::new(id, EngineKind::TextRepair, model.model_id(), SpeechMode::Translate)
            .with_options(options);
        self.install_task(task);
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // Control API: lifecycle
    // -----------------------------------------------------------------------

    /// Cancel the current task.  Engines busy with work are asked to stop
    /// and the task ends on their acknowledgement.
    pub fn cancel(&mut self, task: TaskId) -> Result<(), ServiceError> {
        self.service_watchdog.arm();
        let result = self.current(task).map(|_| ());
        if result.is_ok() {
            self.cancel_current();
        }
        self.checked("cancel", result)
    }

    /// Reset the service idle timer; returns the time left.
    pub fn keepalive_service(&mut self) -> Duration {
        self.service_watchdog.arm();
        self.service_watchdog.remaining()
    }

    /// Reset the task idle timer; returns the time left.
    pub fn keepalive_task(&mut self, task: TaskId) -> Result<Duration, ServiceError> {
        self.service_watchdog.arm();
        if let Err(e) = self.current(task) {
            log::debug!("service: keepalive for task {task} rejected: {e}");
            return Err(e);
        }
        self.task_watchdog.arm();
        Ok(self.task_watchdog.remaining())
    }

    // -----------------------------------------------------------------------
    // Watchdogs
    // -----------------------------------------------------------------------

    /// Earliest armed watchdog deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.service_watchdog.deadline(), self.task_watchdog.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Handle whichever watchdogs have expired.
    pub fn on_timer(&mut self) {
        if self.task_watchdog.take_expired() {
            self.task_timeout();
        }
        if self.service_watchdog.take_expired() {
            self.service_timeout();
        }
    }

    fn task_timeout(&mut self) {
        let Some(task) = self.task.as_ref() else {
            return;
        };
        if task.speech_mode == SpeechMode::SingleSentence {
            log::debug!("service: keepalive of single sentence task {} lapsed", task.id);
            return;
        }
        log::warn!("service: task {} timed out without keepalive", task.id);
        self.finish_task("keepalive timeout");
    }

    fn service_timeout(&mut self) {
        if self.task.is_some() {
            self.service_watchdog.arm();
            return;
        }
        log::info!("service: idle timeout, shutting down");
        self.engines.destroy_all();
        self.shut_down = true;
        self.emit(Notification::Shutdown);
    }

    // -----------------------------------------------------------------------
    // Events
    // -----------------------------------------------------------------------

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Engine { task, event } => self.handle_engine_event(task, event),
            Event::Audio(event) => self.handle_audio_event(event),
            Event::Player(state) => self.handle_player_state(state),
        }
    }

    fn handle_engine_event(&mut self, task: TaskId, event: EngineEvent) {
        let kind = event.kind();
        let current = self.task.as_ref().filter(|t| t.id == task && t.engine == kind);
        if current.is_none() {
            log::debug!("service: dropping stale {kind} event of task {task}");
            if is_engine_failure(&event) {
                self.engines.destroy(kind);
            }
            return;
        }

        match event {
            EngineEvent::Stt(e) => self.on_stt_event(task, e),
            EngineEvent::Tts(e) => self.on_tts_event(task, e),
            EngineEvent::Mnt(e) => self.on_mnt_event(task, e),
            EngineEvent::TextRepair(e) => self.on_text_repair_event(task, e),
        }
    }

    fn on_stt_event(&mut self, task: TaskId, event: SttEvent) {
        let single_sentence = self
            .task
            .as_ref()
            .is_some_and(|t| t.speech_mode == SpeechMode::SingleSentence);

        match event {
            SttEvent::TextDecoded { text, lang } => {
                log::debug!("service: text decoded ({lang}): {text}");
                self.emit(Notification::TextDecoded { text, lang, task });
                if single_sentence {
                    self.finish_task("sentence decoded");
                }
            }
            SttEvent::IntermediateTextDecoded { text, lang } => {
                self.emit(Notification::IntermediateTextDecoded { text, lang, task });
            }
            SttEvent::SentenceTimeout => {
                self.emit(Notification::SentenceTimeout { task });
                if single_sentence {
                    self.finish_task("sentence timeout");
                }
            }
            SttEvent::Eof => {
                if self.source.as_ref().is_some_and(|s| s.kind() == SourceKind::File) {
                    self.emit(Notification::TranscribeFileProgress { progress: 1.0, task });
                }
                self.finish_task("end of stream");
            }
            SttEvent::Error => self.engine_failed(EngineKind::Stt, false),
            SttEvent::Stopped => self.finish_task("stt stopped"),
            SttEvent::SpeechDetectionStatusChanged(_) | SttEvent::Stopping => self.refresh(),
        }
    }

    fn on_tts_event(&mut self, task: TaskId, event: TtsEvent) {
        match event {
            TtsEvent::SpeechEncoded {
                text,
                audio_path,
                format,
                progress,
                last,
            } => {
                let to_file = self
                    .task
                    .as_ref()
                    .is_some_and(|t| t.speech_mode == SpeechMode::SpeechToFile);
                if to_file {
                    if let Some(t) = self.task.as_mut() {
                        if !audio_path.as_os_str().is_empty() {
                            t.files.push(audio_path);
                        }
                        t.progress = progress;
                    }
                    self.emit(Notification::SpeechToFileProgress { progress, task });
                    if last {
                        self.finish_speech_to_file();
                    }
                } else {
                    self.queue.push(PartialResult {
                        text,
                        audio_path,
                        format,
                        progress,
                        last,
                        task,
                        remove_audio_file: false,
                    });
                    self.drain_queue();
                }
            }
            TtsEvent::TextRestored(text) => self.emit(Notification::TextRestored { text, task }),
            TtsEvent::StateChanged(state) => {
                if self.is_canceling() && matches!(state, TtsState::Idle | TtsState::Stopped) {
                    self.finish_task("speech canceled");
                } else {
                    self.refresh();
                }
            }
            TtsEvent::Error => self.engine_failed(EngineKind::Tts, false),
        }
    }

    fn on_mnt_event(&mut self, task: TaskId, event: MntEvent) {
        match event {
            MntEvent::TextTranslated {
                in_text,
                in_lang,
                out_text,
                out_lang,
            } => {
                self.emit(Notification::TextTranslated {
                    in_text,
                    in_lang,
                    out_text,
                    out_lang,
                    task,
                });
                self.finish_task("translated");
            }
            MntEvent::ProgressChanged(progress) => {
                if let Some(t) = self.task.as_mut() {
                    t.progress = progress;
                }
                self.emit(Notification::TranslateProgress { progress, task });
            }
            MntEvent::StateChanged(state) => {
                if self.is_canceling() && matches!(state, MntState::Idle | MntState::Stopped) {
                    self.finish_task("translation canceled");
                } else {
                    self.refresh();
                }
            }
            MntEvent::Error { init } => self.engine_failed(EngineKind::Mnt, init),
        }
    }

    fn on_text_repair_event(&mut self, task: TaskId, event: TextRepairEvent) {
        match event {
            TextRepairEvent::TextRepaired(text) => {
                self.emit(Notification::TextRepaired { text, task });
                self.finish_task("text repaired");
            }
            TextRepairEvent::StateChanged(state) => {
                if self.is_canceling()
                    && matches!(state, TextRepairState::Idle | TextRepairState::Stopped)
                {
                    self.finish_task("text repair canceled");
                } else {
                    self.refresh();
                }
            }
            TextRepairEvent::Error => self.engine_failed(EngineKind::TextRepair, false),
        }
    }

    fn handle_audio_event(&mut self, event: AudioEvent) {
        match event {
            AudioEvent::Available => self.feed_engine(),
            AudioEvent::Ended => log::debug!("audio: source ended"),
            AudioEvent::Error(msg) => {
                let Some(kind) = self.source.as_ref().map(|s| s.kind()) else {
                    return;
                };
                log::error!("service: {kind:?} source error: {msg}");
                match kind {
                    SourceKind::Mic => {
                        self.emit(Notification::Error {
                            error: ErrorKind::MicSource,
                        });
                        self.close_source();
                        self.finish_task("microphone failed");
                        self.engines.destroy(EngineKind::Stt);
                        self.refresh();
                    }
                    SourceKind::File => {
                        self.emit(Notification::Error {
                            error: ErrorKind::FileSource,
                        });
                        self.cancel_current();
                    }
                }
            }
        }
    }

    fn handle_player_state(&mut self, state: PlayerState) {
        log::debug!("service: player {state:?}");
        if state == PlayerState::Stopped {
            if let Some(item) = self.playing.take() {
                discard(&item);
                if item.last {
                    self.finish_play_speech();
                } else {
                    self.drain_queue();
                }
            }
        }
        self.refresh();
    }

    // -----------------------------------------------------------------------
    // Audio feeding
    // -----------------------------------------------------------------------

    /// Move one buffer from the source into the STT engine.
    fn feed_engine(&mut self) {
        let clear_while_decoding = self
            .task
            .as_ref()
            .is_some_and(|t| t.flags.clear_mic_while_decoding);

        let (Some(source), Some(stt)) = (self.source.as_mut(), self.engines.stt_mut()) else {
            return;
        };
        if !stt.started() || source.stopped() {
            return;
        }

        if source.kind() == SourceKind::Mic {
            match stt.speech_detection_status() {
                SpeechDetectionStatus::Initializing => source.clear(),
                SpeechDetectionStatus::Decoding if clear_while_decoding => source.clear(),
                _ => {}
            }
        }

        match stt.borrow_buf() {
            Some(mut buf) => {
                let read = source.read_audio(&mut buf);
                stt.return_buf(buf, read);
                source.speedup();
            }
            None => {
                source.slowdown();
                return;
            }
        }

        if source.kind() != SourceKind::File {
            return;
        }
        let progress = source.progress();
        let Some(t) = self.task.as_mut() else {
            return;
        };
        let changed = (progress * 100.0).floor() != (t.progress * 100.0).floor();
        t.progress = progress;
        if changed {
            let task = t.id;
            self.emit(Notification::TranscribeFileProgress { progress, task });
        }
    }

    // -----------------------------------------------------------------------
    // Speech playback and files
    // -----------------------------------------------------------------------

    /// Start the next queued segment unless one is playing or playback is
    /// paused.
    fn drain_queue(&mut self) {
        let Some(task) = self.task.as_ref() else {
            return;
        };
        if self.playing.is_some() || task.paused || task.canceling {
            return;
        }
        let id = task.id;

        while let Some(item) = self.queue.pop() {
            if item.task != id {
                discard(&item);
                continue;
            }
            if !item.has_audio() {
                discard(&item);
                if item.last {
                    self.finish_play_speech();
                    return;
                }
                continue;
            }
            let Some(item) = self.playable(item) else {
                continue;
            };

            log::debug!("service: playing {}", item.audio_path.display());
            self.player.play(&item.audio_path);
            let progress = item.progress;
            if let Some(t) = self.task.as_mut() {
                t.progress = progress;
            }
            self.playing = Some(item);
            self.emit(Notification::SpeechPlaying { progress, task: id });
            self.refresh();
            return;
        }
    }

    /// Transcode a non-WAV segment into the cache; `None` drops it.
    fn playable(&mut self, item: PartialResult) -> Option<PartialResult> {
        if item.format == AudioFormat::Wav {
            return Some(item);
        }
        let stem = item
            .audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "segment".into());
        let dir = self.config.cache_dir();
        let out = dir.join(format!("play-{stem}.wav"));

        let decoded = std::fs::create_dir_all(&dir)
            .map_err(CompressError::from)
            .and_then(|()| self.compressor.decode_to_wav(&item.audio_path, &out));
        match decoded {
            Ok(()) => Some(PartialResult {
                audio_path: out,
                format: AudioFormat::Wav,
                remove_audio_file: true,
                ..item
            }),
            Err(e) => {
                log::warn!(
                    "service: dropping segment {}, cannot transcode: {e}",
                    item.audio_path.display()
                );
                None
            }
        }
    }

    fn finish_play_speech(&mut self) {
        let task = self.current_task();
        self.emit(Notification::PlaySpeechFinished { task });
        self.finish_task("speech played");
    }

    fn finish_speech_to_file(&mut self) {
        let Some(task) = self.task.as_ref() else {
            return;
        };
        let id = task.id;
        let files = task.files.clone();
        let not_merge = task.options.bool_or("not_merge_files", false);
        let format = AudioFormat::from_name(task.options.str_or("audio_format", ""))
            .unwrap_or(self.config.audio.format);
        let quality = AudioQuality::from_name(task.options.str_or("audio_quality", ""))
            .unwrap_or(self.config.audio.quality);

        if not_merge || files.is_empty() {
            self.emit(Notification::SpeechToFileFinished { files, task: id });
        } else {
            match self.merge_files(&files, format, quality) {
                Ok(merged) => self.emit(Notification::SpeechToFileFinished {
                    files: vec![merged],
                    task: id,
                }),
                Err(e) => {
                    log::error!("service: merging {} files failed: {e}", files.len());
                    self.emit(Notification::Error {
                        error: ErrorKind::AudioMerge,
                    });
                }
            }
        }
        self.finish_task("speech written to file");
    }

    /// Merge into `merged-<fingerprint>-<quality>.<ext>` in the cache; an
    /// existing file with the same name is reused.
    fn merge_files(
        &mut self,
        files: &[PathBuf],
        format: AudioFormat,
        quality: AudioQuality,
    ) -> Result<PathBuf, CompressError> {
        let mut hasher = DefaultHasher::new();
        files.hash(&mut hasher);
        format.hash(&mut hasher);
        let dir = self.config.cache_dir();
        let out = dir.join(format!(
            "merged-{:016x}-{}.{}",
            hasher.finish(),
            quality.as_str(),
            format.extension()
        ));

        if out.exists() {
            log::debug!("service: {} already merged", out.display());
            return Ok(out);
        }
        std::fs::create_dir_all(&dir)?;
        if let Err(e) = self.compressor.merge(files, &out, format, quality) {
            if out.exists() {
                if let Err(rm) = std::fs::remove_file(&out) {
                    log::warn!("service: cannot remove partial {}: {rm}", out.display());
                }
            }
            return Err(e);
        }
        Ok(out)
    }

    fn stop_playback(&mut self) {
        if self.player.state() != PlayerState::Stopped {
            self.player.stop();
        }
        if let Some(item) = self.playing.take() {
            discard(&item);
        }
        self.queue.clear();
    }

    fn beep(&mut self, name: &str) {
        let path = self.config.beep_dir().join(name);
        let Some(beeper) = self.beeper.as_mut() else {
            return;
        };
        if path.is_file() {
            beeper.play(&path);
        } else {
            log::debug!("service: beep {} not found", path.display());
        }
    }

    // -----------------------------------------------------------------------
    // Task lifecycle
    // -----------------------------------------------------------------------

    fn install_task(&mut self, task: Task) {
        log::info!(
            "service: task {} started ({} {:?}, model {})",
            task.id,
            task.engine,
            task.speech_mode,
            task.model_id
        );
        let id = task.id;
        self.task = Some(task);
        self.task_watchdog.arm();
        self.emit(Notification::CurrentTaskChanged { task: id });
        self.refresh();
    }

    /// Stop whatever engine activity belongs to the current task and drop
    /// it.  Does not notify.
    fn retire_current(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        log::debug!("service: retiring task {}", task.id);

        match task.engine {
            EngineKind::Stt => {
                self.close_source();
                if let Some(stt) = self.engines.stt_mut() {
                    if stt.started() {
                        stt.stop();
                    }
                }
            }
            EngineKind::Tts => {
                self.stop_playback();
                let draining = self
                    .engines
                    .tts()
                    .is_some_and(|tts| tts_busy(tts.state()) || tts.state() == TtsState::Stopping);
                if draining {
                    self.engines.abandon(EngineKind::Tts);
                }
            }
            EngineKind::Mnt => {
                if let Some(mnt) = self.engines.mnt_mut() {
                    if mnt_busy(mnt.state()) {
                        mnt.stop();
                    }
                }
            }
            EngineKind::TextRepair => {
                let draining = self.engines.text_repair().is_some_and(|e| {
                    matches!(
                        e.state(),
                        TextRepairState::Processing | TextRepairState::Stopping
                    )
                });
                if draining {
                    self.engines.abandon(EngineKind::TextRepair);
                }
            }
        }

        self.engines.bind(task.engine, INVALID_TASK);
        self.task_watchdog.disarm();
    }

    fn finish_task(&mut self, reason: &str) {
        let Some(task) = self.task.as_ref() else {
            return;
        };
        log::info!("service: task {} ended: {reason}", task.id);
        self.retire_current();
        self.emit(Notification::CurrentTaskChanged { task: INVALID_TASK });
        self.refresh();
    }

    fn cancel_current(&mut self) {
        let Some(engine) = self.task.as_ref().map(|t| t.engine) else {
            return;
        };

        let pending = match engine {
            EngineKind::Stt => false,
            EngineKind::Tts => {
                self.stop_playback();
                match self.engines.tts_mut() {
                    Some(tts) if tts_busy(tts.state()) => {
                        tts.request_stop();
                        true
                    }
                    _ => false,
                }
            }
            EngineKind::Mnt => match self.engines.mnt_mut() {
                Some(mnt) if mnt_busy(mnt.state()) => {
                    mnt.request_stop();
                    true
                }
                _ => false,
            },
            EngineKind::TextRepair => match self.engines.text_repair_mut() {
                Some(e) if e.state() == TextRepairState::Processing => {
                    e.request_stop();
                    true
                }
                _ => false,
            },
        };

        if pending {
            if let Some(t) = self.task.as_mut() {
                log::debug!("service: task {} canceling, waiting for {engine}", t.id);
                t.canceling = true;
            }
            self.refresh();
        } else {
            self.finish_task("canceled");
        }
    }

    /// Runtime failure: publish, drop the engine and end the task.
    fn engine_failed(&mut self, kind: EngineKind, during_init: bool) {
        log::error!("service: {kind} engine failed");
        let error = if during_init {
            ErrorKind::EngineConstruction(kind)
        } else {
            ErrorKind::EngineRuntime(kind)
        };
        self.emit(Notification::Error { error });
        if kind == EngineKind::Tts {
            self.stop_playback();
        }
        self.close_source();
        self.engines.destroy(kind);
        self.finish_task("engine error");
    }

    fn close_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.stop();
        }
    }

    fn ensure_stt(&mut self, config: SttEngineConfig) -> Result<(), ServiceError> {
        self.engines
            .ensure_stt(config)
            .map(|_| ())
            .map_err(|source| ServiceError::EngineConstructionFailed {
                kind: EngineKind::Stt,
                source,
            })
    }

    fn attach_source(
        &mut self,
        kind: SourceKind,
        source: Result<Box<dyn AudioSource>, AudioSourceError>,
    ) -> Result<(), ServiceError> {
        match source {
            Ok(source) => {
                self.source = Some(source);
                Ok(())
            }
            Err(source) => {
                if let Some(stt) = self.engines.stt_mut() {
                    stt.stop();
                }
                Err(ServiceError::AudioSource { kind, source })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    fn selector(&self) -> ModelSelector<'_> {
        ModelSelector::new(self.index.models(), &self.config.defaults)
            .restore_punctuation(self.config.stt.restore_punctuation)
            .tts_diacritizer(self.config.tts.diacritizer_enabled)
    }

    fn resolve_stt(&self, lang: &str) -> Result<SttModelConfig, ServiceError> {
        match self.selector().resolve(EngineKind::Stt, lang, "")? {
            ModelConfig::Stt(c) => Ok(c),
            other => Err(unexpected_config(&other)),
        }
    }

    fn resolve_tts(&self, lang: &str) -> Result<TtsModelConfig, ServiceError> {
        match self.selector().resolve(EngineKind::Tts, lang, "")? {
            ModelConfig::Tts(c) => Ok(c),
            other => Err(unexpected_config(&other)),
        }
    }

    fn resolve_mnt(&self, lang: &str, out_lang: &str) -> Result<MntModelConfig, ServiceError> {
        match self.selector().resolve(EngineKind::Mnt, lang, out_lang)? {
            ModelConfig::Mnt(c) => Ok(c),
            other => Err(unexpected_config(&other)),
        }
    }

    fn resolve_text_repair(&self) -> Result<TextRepairModelConfig, ServiceError> {
        match self.selector().resolve(EngineKind::TextRepair, "", "")? {
            ModelConfig::TextRepair(c) => Ok(c),
            other => Err(unexpected_config(&other)),
        }
    }

    // -----------------------------------------------------------------------
    // Boundary helpers
    // -----------------------------------------------------------------------

    fn ensure_ready(&self) -> Result<(), ServiceError> {
        if self.catalog.busy() || !self.models_handled {
            return Err(ServiceError::invalid("service is busy"));
        }
        Ok(())
    }

    fn current(&self, task: TaskId) -> Result<&Task, ServiceError> {
        self.task
            .as_ref()
            .filter(|t| t.id == task)
            .ok_or_else(|| ServiceError::invalid(format!("task {task} is not the current task")))
    }

    fn current_playback(&self, task: TaskId) -> Result<&Task, ServiceError> {
        let t = self.current(task)?;
        if !t.is(EngineKind::Tts, SpeechMode::PlaySpeech) {
            return Err(ServiceError::invalid("current task is not playing speech"));
        }
        Ok(t)
    }

    fn is_canceling(&self) -> bool {
        self.task.as_ref().is_some_and(|t| t.canceling)
    }

    fn accept(&mut self, op: &str, result: Result<TaskId, ServiceError>) -> TaskId {
        match result {
            Ok(id) => id,
            Err(e) => {
                self.reject(op, &e);
                INVALID_TASK
            }
        }
    }

    fn checked<T>(&mut self, op: &str, result: Result<T, ServiceError>) -> Result<T, ServiceError> {
        if let Err(e) = &result {
            self.reject(op, e);
        }
        result
    }

    fn reject(&mut self, op: &str, e: &ServiceError) {
        log::warn!("service: {op} rejected: {e}");
        if let Some(error) = e.notification() {
            self.emit(Notification::Error { error });
        }
        self.refresh();
    }

    fn emit(&self, notification: Notification) {
        if self.notify.send(notification).is_err() {
            log::debug!("service: notification dropped, no listener");
        }
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    /// Recompute both status values and publish changes.
    fn refresh(&mut self) {
        let state = derive_service_state(&self.status_inputs());
        if state != self.state {
            log::debug!("service: state {:?} => {state:?}", self.state);
            self.state = state;
            self.emit(Notification::StateChanged { state });
        }

        let task_state = derive_task_state(&self.task_state_inputs());
        if task_state != self.task_state {
            log::debug!("service: task state {:?} => {task_state:?}", self.task_state);
            self.task_state = task_state;
            self.emit(Notification::TaskStateChanged { state: task_state });
        }
    }

    fn status_inputs(&self) -> StatusInputs {
        StatusInputs {
            has_models: !self.index.is_empty(),
            busy: self.catalog.busy() || !self.models_handled,
            source: self.source.as_ref().map(|s| s.kind()),
            task: self.task.as_ref().map(|t| (t.engine, t.speech_mode)),
            stt_status: self.engines.stt().map(|e| e.speech_detection_status()),
            tts: self.engines.tts().map(|e| e.state()),
            mnt: self.engines.mnt().map(|e| e.state()),
            text_repair: self.engines.text_repair().map(|e| e.state()),
        }
    }

    fn task_state_inputs(&self) -> TaskStateInputs {
        TaskStateInputs {
            player: self.player.state(),
            playing_speech: self
                .task
                .as_ref()
                .is_some_and(|t| t.is(EngineKind::Tts, SpeechMode::PlaySpeech)),
            task_paused: self.task.as_ref().is_some_and(|t| t.paused),
            stt: self.engines.stt().map(|e| SttSnapshot {
                started: e.started(),
                stopping: e.stopping(),
                status: e.speech_detection_status(),
            }),
            tts: self.engines.tts().map(|e| e.state()),
            mnt: self.engines.mnt().map(|e| e.state()),
            text_repair: self.engines.text_repair().map(|e| e.state()),
        }
    }
}

fn tts_busy(state: TtsState) -> bool {
    matches!(
        state,
        TtsState::Initializing | TtsState::SpeechEncoding | TtsState::TextRestoring
    )
}

fn mnt_busy(state: MntState) -> bool {
    matches!(state, MntState::Initializing | MntState::Translating)
}

fn is_engine_failure(event: &EngineEvent) -> bool {
    matches!(
        event,
        EngineEvent::Stt(SttEvent::Error)
            | EngineEvent::Tts(TtsEvent::Error)
            | EngineEvent::Mnt(MntEvent::Error { .. })
            | EngineEvent::TextRepair(TextRepairEvent::Error)
    )
}

fn unexpected_config(config: &ModelConfig) -> ServiceError {
    ServiceError::invalid(format!(
        "selector returned a config of another family for {}",
        config.model_id()
    ))
}
