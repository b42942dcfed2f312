//! Owns at most one live engine per family and decides, on every
//! configuration request, whether the existing engine can be reused.
//!
//! ```text
//! ensure_*(config)
//!   │
//!   ├─ config names another family ──────────► Err(WrongFamily), slot untouched
//!   ├─ slot occupied, !requires_rebuild ─────► update_params (+ restart) → Reused
//!   └─ otherwise ─► teardown old ─► factory.create_* ─► start ─► Created
//!                                        │
//!                                        └─ Err ─► slot left empty
//! ```
//!
//! Engines hold an [`EventSink`] whose task binding lives here; the task
//! manager calls [`EngineController::bind`] before `ensure_*` so that events
//! emitted during construction already carry the new task id.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use super::config::{MntEngineConfig, SttEngineConfig, TextRepairEngineConfig, TtsEngineConfig};
use super::events::EventSink;
use super::traits::{
    EngineError, EngineFactory, MntEngine, SttEngine, TextRepairEngine, TtsEngine,
};
use super::EngineKind;
use crate::catalog::ModelRole;
use crate::event::EventSender;
use crate::service::{TaskId, INVALID_TASK};

/// Outcome of an `ensure_*` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    Created,
    Reused,
}

struct Slot<E: ?Sized, C> {
    engine: Box<E>,
    config: C,
    generation: u64,
}

pub struct EngineController {
    factory: Box<dyn EngineFactory>,
    events: EventSender,
    bindings: [Arc<AtomicI32>; 4],
    next_generation: u64,
    stt: Option<Slot<dyn SttEngine, SttEngineConfig>>,
    tts: Option<Slot<dyn TtsEngine, TtsEngineConfig>>,
    mnt: Option<Slot<dyn MntEngine, MntEngineConfig>>,
    text_repair: Option<Slot<dyn TextRepairEngine, TextRepairEngineConfig>>,
}

impl EngineController {
    pub fn new(factory: Box<dyn EngineFactory>, events: EventSender) -> Self {
        Self {
            factory,
            events,
            bindings: std::array::from_fn(|_| Arc::new(AtomicI32::new(INVALID_TASK))),
            next_generation: 1,
            stt: None,
            tts: None,
            mnt: None,
            text_repair: None,
        }
    }

    // -----------------------------------------------------------------------
    // Task binding
    // -----------------------------------------------------------------------

    /// Tag all future events of `kind` with `task`.
    pub fn bind(&self, kind: EngineKind, task: TaskId) {
        self.bindings[kind.index()].store(task, Ordering::Release);
    }

    pub fn bound(&self, kind: EngineKind) -> TaskId {
        self.bindings[kind.index()].load(Ordering::Acquire)
    }

    fn sink(&self, kind: EngineKind) -> EventSink {
        EventSink::new(kind, self.bindings[kind.index()].clone(), self.events.clone())
    }

    fn take_generation(&mut self) -> u64 {
        let g = self.next_generation;
        self.next_generation += 1;
        g
    }

    // -----------------------------------------------------------------------
    // ensure_*
    // -----------------------------------------------------------------------

    pub fn ensure_stt(&mut self, config: SttEngineConfig) -> Result<Ensured, EngineError> {
        if config.engine.role() != ModelRole::Stt {
            return Err(EngineError::WrongFamily {
                expected: EngineKind::Stt,
                engine: config.engine,
            });
        }

        if let Some(slot) = self.stt.as_mut() {
            if !slot.config.requires_rebuild(&config) {
                log::debug!("engine: reusing stt engine {}", config.model_id);
                slot.engine.stop();
                slot.engine.update_params(&config.params);
                slot.engine.start();
                slot.config = config;
                return Ok(Ensured::Reused);
            }
        }

        self.destroy(EngineKind::Stt);
        log::info!("engine: creating stt engine {:?} ({})", config.engine, config.model_id);
        let mut engine = self.factory.create_stt(&config, self.sink(EngineKind::Stt))?;
        engine.start();
        let generation = self.take_generation();
        self.stt = Some(Slot {
            engine,
            config,
            generation,
        });
        Ok(Ensured::Created)
    }

    pub fn ensure_tts(&mut self, config: TtsEngineConfig) -> Result<Ensured, EngineError> {
        if config.engine.role() != ModelRole::Tts {
            return Err(EngineError::WrongFamily {
                expected: EngineKind::Tts,
                engine: config.engine,
            });
        }

        if let Some(slot) = self.tts.as_mut() {
            if !slot.config.requires_rebuild(&config) {
                log::debug!("engine: reusing tts engine {}", config.model_id);
                slot.engine.update_params(&config.params);
                slot.engine.restart();
                slot.config = config;
                return Ok(Ensured::Reused);
            }
        }

        self.destroy(EngineKind::Tts);
        log::info!("engine: creating tts engine {:?} ({})", config.engine, config.model_id);
        let mut engine = self.factory.create_tts(&config, self.sink(EngineKind::Tts))?;
        engine.start();
        let generation = self.take_generation();
        self.tts = Some(Slot {
            engine,
            config,
            generation,
        });
        Ok(Ensured::Created)
    }

    pub fn ensure_mnt(&mut self, config: MntEngineConfig) -> Result<Ensured, EngineError> {
        if let Some(slot) = self.mnt.as_mut() {
            if !slot.config.requires_rebuild(&config) {
                log::debug!("engine: reusing mnt engine {}", config.model_id);
                slot.engine.update_params(&config.params);
                slot.engine.start();
                slot.config = config;
                return Ok(Ensured::Reused);
            }
        }

        self.destroy(EngineKind::Mnt);
        log::info!(
            "engine: creating mnt engine {} ({} -> {})",
            config.model_id,
            config.lang,
            config.out_lang
        );
        let mut engine = self.factory.create_mnt(&config, self.sink(EngineKind::Mnt))?;
        engine.start();
        let generation = self.take_generation();
        self.mnt = Some(Slot {
            engine,
            config,
            generation,
        });
        Ok(Ensured::Created)
    }

    pub fn ensure_text_repair(
        &mut self,
        config: TextRepairEngineConfig,
    ) -> Result<Ensured, EngineError> {
        if let Some(slot) = self.text_repair.as_mut() {
            if !slot.config.requires_rebuild(&config) {
                slot.engine.update_params(&config.params);
                slot.engine.start();
                slot.config = config;
                return Ok(Ensured::Reused);
            }
        }

        self.destroy(EngineKind::TextRepair);
        log::info!("engine: creating text repair engine ({})", config.model_id);
        let mut engine = self
            .factory
            .create_text_repair(&config, self.sink(EngineKind::TextRepair))?;
        engine.start();
        let generation = self.take_generation();
        self.text_repair = Some(Slot {
            engine,
            config,
            generation,
        });
        Ok(Ensured::Created)
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    /// Stop and drop the engine of `kind`, if any.
    pub fn destroy(&mut self, kind: EngineKind) {
        match kind {
            EngineKind::Stt => {
                if let Some(mut slot) = self.stt.take() {
                    log::debug!("engine: destroying stt engine {}", slot.config.model_id);
                    slot.engine.stop();
                }
            }
            EngineKind::Tts => {
                if let Some(mut slot) = self.tts.take() {
                    log::debug!("engine: destroying tts engine {}", slot.config.model_id);
                    slot.engine.request_stop();
                }
            }
            EngineKind::Mnt => {
                if let Some(mut slot) = self.mnt.take() {
                    log::debug!("engine: destroying mnt engine {}", slot.config.model_id);
                    slot.engine.stop();
                }
            }
            EngineKind::TextRepair => {
                if let Some(mut slot) = self.text_repair.take() {
                    log::debug!("engine: destroying text repair engine {}", slot.config.model_id);
                    slot.engine.request_stop();
                }
            }
        }
    }

    /// Drop the engine of `kind` while it may still be working on a request
    /// nobody wants any more.  The family gets a fresh binding, so whatever
    /// the old engine emits from now on carries `INVALID_TASK`.
    pub fn abandon(&mut self, kind: EngineKind) {
        self.bind(kind, INVALID_TASK);
        self.bindings[kind.index()] = Arc::new(AtomicI32::new(INVALID_TASK));
        self.destroy(kind);
    }

    pub fn destroy_all(&mut self) {
        for kind in EngineKind::ALL {
            self.destroy(kind);
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn exists(&self, kind: EngineKind) -> bool {
        self.generation(kind).is_some()
    }

    /// Construction counter of the live engine of `kind`.  Changes only
    /// when the engine is rebuilt.
    pub fn generation(&self, kind: EngineKind) -> Option<u64> {
        match kind {
            EngineKind::Stt => self.stt.as_ref().map(|s| s.generation),
            EngineKind::Tts => self.tts.as_ref().map(|s| s.generation),
            EngineKind::Mnt => self.mnt.as_ref().map(|s| s.generation),
            EngineKind::TextRepair => self.text_repair.as_ref().map(|s| s.generation),
        }
    }

    /// Model id the live engine of `kind` was configured with.
    pub fn model_id(&self, kind: EngineKind) -> Option<&str> {
        match kind {
            EngineKind::Stt => self.stt.as_ref().map(|s| s.config.model_id.as_str()),
            EngineKind::Tts => self.tts.as_ref().map(|s| s.config.model_id.as_str()),
            EngineKind::Mnt => self.mnt.as_ref().map(|s| s.config.model_id.as_str()),
            EngineKind::TextRepair => self
                .text_repair
                .as_ref()
                .map(|s| s.config.model_id.as_str()),
        }
    }

    pub fn stt(&self) -> Option<&(dyn SttEngine + 'static)> {
        self.stt.as_ref().map(|s| s.engine.as_ref())
    }

    pub fn stt_mut(&mut self) -> Option<&mut (dyn SttEngine + 'static)> {
        self.stt.as_mut().map(|s| s.engine.as_mut())
    }

    pub fn stt_config(&self) -> Option<&SttEngineConfig> {
        self.stt.as_ref().map(|s| &s.config)
    }

    pub fn tts(&self) -> Option<&(dyn TtsEngine + 'static)> {
        self.tts.as_ref().map(|s| s.engine.as_ref())
    }

    pub fn tts_mut(&mut self) -> Option<&mut (dyn TtsEngine + 'static)> {
        self.tts.as_mut().map(|s| s.engine.as_mut())
    }

    pub fn mnt(&self) -> Option<&(dyn MntEngine + 'static)> {
        self.mnt.as_ref().map(|s| s.engine.as_ref())
    }

    pub fn mnt_mut(&mut self) -> Option<&mut (dyn MntEngine + 'static)> {
        self.mnt.as_mut().map(|s| s.engine.as_mut())
    }

    pub fn text_repair(&self) -> Option<&(dyn TextRepairEngine + 'static)> {
        self.text_repair.as_ref().map(|s| s.engine.as_ref())
    }

    pub fn text_repair_mut(&mut self) -> Option<&mut (dyn TextRepairEngine + 'static)> {
        self.text_repair.as_mut().map(|s| s.engine.as_mut())
    }
}

impl Drop for EngineController {
    fn drop(&mut self) {
        self.destroy_all();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModelEngine;
    use crate::config::AppConfig;
    use crate::engine::config::ListenMode;
    use crate::engine::events::{SttEvent, TtsEvent};
    use crate::engine::mock::MockEngineFactory;
    use crate::event::Event;
    use crate::options::Options;
    use crate::selector::{SttModelConfig, TtsModelConfig};

    fn stt_config(id: &str, engine: ModelEngine) -> SttEngineConfig {
        let model = SttModelConfig {
            model_id: id.into(),
            engine,
            lang_id: "en".into(),
            lang_code: String::new(),
            model_file: format!("/models/{id}").into(),
            scorer_file: None,
            openvino_file: None,
            punctuation: None,
            options: String::new(),
        };
        SttEngineConfig::build(
            &model,
            ListenMode::Automatic,
            "",
            &AppConfig::default(),
            &Options::new(),
        )
    }

    fn tts_config(id: &str, speaker: &str) -> TtsEngineConfig {
        let model = TtsModelConfig {
            model_id: id.into(),
            engine: ModelEngine::TtsPiper,
            lang_id: "en".into(),
            lang_code: String::new(),
            model_file: format!("/models/{id}").into(),
            vocoder_file: None,
            diacritizer_file: None,
            speaker: speaker.into(),
            options: String::new(),
        };
        TtsEngineConfig::build(&model, &AppConfig::default(), &Options::new())
    }

    #[test]
    fn same_fingerprint_reuses_engine() {
        let (factory, state) = MockEngineFactory::new();
        let (tx, _rx) = crate::event::channel();
        let mut ctl = EngineController::new(Box::new(factory), tx);

        assert_eq!(ctl.ensure_stt(stt_config("a", ModelEngine::SttVosk)), Ok(Ensured::Created));
        let g = ctl.generation(EngineKind::Stt);

        let mut next = stt_config("a", ModelEngine::SttVosk);
        next.params.insert_stats = true;
        assert_eq!(ctl.ensure_stt(next), Ok(Ensured::Reused));
        assert_eq!(ctl.generation(EngineKind::Stt), g);
        assert_eq!(state.lock().unwrap().created, 1);
        assert!(state.lock().unwrap().stt_params.as_ref().is_some_and(|p| p.insert_stats));
    }

    #[test]
    fn changed_fingerprint_rebuilds_engine() {
        let (factory, state) = MockEngineFactory::new();
        let (tx, _rx) = crate::event::channel();
        let mut ctl = EngineController::new(Box::new(factory), tx);

        ctl.ensure_stt(stt_config("a", ModelEngine::SttVosk)).unwrap();
        let g = ctl.generation(EngineKind::Stt);
        assert_eq!(ctl.ensure_stt(stt_config("b", ModelEngine::SttVosk)), Ok(Ensured::Created));

        assert_ne!(ctl.generation(EngineKind::Stt), g);
        assert_eq!(ctl.model_id(EngineKind::Stt), Some("b"));
        assert_eq!(state.lock().unwrap().created, 2);
    }

    #[test]
    fn tts_speaker_change_rebuilds_piper() {
        let (factory, state) = MockEngineFactory::new();
        let (tx, _rx) = crate::event::channel();
        let mut ctl = EngineController::new(Box::new(factory), tx);

        ctl.ensure_tts(tts_config("v", "amy")).unwrap();
        assert_eq!(ctl.ensure_tts(tts_config("v", "amy")), Ok(Ensured::Reused));
        assert_eq!(ctl.ensure_tts(tts_config("v", "joe")), Ok(Ensured::Created));
        assert_eq!(state.lock().unwrap().created, 2);
    }

    #[test]
    fn wrong_family_leaves_slot_untouched() {
        let (factory, _state) = MockEngineFactory::new();
        let (tx, _rx) = crate::event::channel();
        let mut ctl = EngineController::new(Box::new(factory), tx);

        ctl.ensure_stt(stt_config("a", ModelEngine::SttVosk)).unwrap();
        let err = ctl.ensure_stt(stt_config("p", ModelEngine::TtsPiper));

        assert!(matches!(err, Err(EngineError::WrongFamily { .. })));
        assert_eq!(ctl.model_id(EngineKind::Stt), Some("a"));
    }

    #[test]
    fn factory_failure_leaves_slot_empty() {
        let (factory, state) = MockEngineFactory::new();
        let (tx, _rx) = crate::event::channel();
        let mut ctl = EngineController::new(Box::new(factory), tx);

        ctl.ensure_stt(stt_config("a", ModelEngine::SttVosk)).unwrap();
        state.lock().unwrap().fail_create = true;

        assert!(ctl.ensure_stt(stt_config("b", ModelEngine::SttVosk)).is_err());
        assert!(!ctl.exists(EngineKind::Stt));
    }

    #[test]
    fn sink_uses_binding_set_before_ensure() {
        let (factory, state) = MockEngineFactory::new();
        let (tx, mut rx) = crate::event::channel();
        let mut ctl = EngineController::new(Box::new(factory), tx);

        ctl.bind(EngineKind::Stt, 7);
        ctl.ensure_stt(stt_config("a", ModelEngine::SttVosk)).unwrap();
        let sink = state.lock().unwrap().sink(EngineKind::Stt).expect("sink");
        sink.emit(SttEvent::Eof);

        match rx.try_recv() {
            Ok(Event::Engine { task, .. }) => assert_eq!(task, 7),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn abandoned_engine_cannot_tag_later_tasks() {
        let (factory, state) = MockEngineFactory::new();
        let (tx, mut rx) = crate::event::channel();
        let mut ctl = EngineController::new(Box::new(factory), tx);

        ctl.bind(EngineKind::Tts, 1);
        ctl.ensure_tts(tts_config("en_piper_amy", "")).unwrap();
        let old = state.lock().unwrap().sink(EngineKind::Tts).expect("sink");

        ctl.abandon(EngineKind::Tts);
        assert!(ctl.tts().is_none());
        assert!(state.lock().unwrap().called("tts.request_stop"));

        ctl.bind(EngineKind::Tts, 2);
        ctl.ensure_tts(tts_config("en_piper_amy", "")).unwrap();
        let new = state.lock().unwrap().sink(EngineKind::Tts).expect("sink");

        old.emit(TtsEvent::Error);
        new.emit(TtsEvent::Error);
        let tasks: Vec<TaskId> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|e| match e {
                Event::Engine { task, .. } => Some(task),
                _ => None,
            })
            .collect();
        assert_eq!(tasks, [INVALID_TASK, 2]);
    }

    #[test]
    fn destroy_stops_engine() {
        let (factory, state) = MockEngineFactory::new();
        let (tx, _rx) = crate::event::channel();
        let mut ctl = EngineController::new(Box::new(factory), tx);

        ctl.ensure_stt(stt_config("a", ModelEngine::SttVosk)).unwrap();
        assert!(state.lock().unwrap().stt_started);
        ctl.destroy(EngineKind::Stt);

        assert!(!state.lock().unwrap().stt_started);
        assert!(ctl.stt().is_none());
    }
}
