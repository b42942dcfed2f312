//! Scriptable in-memory engines for tests.
//!
//! Every engine created by [`MockEngineFactory`] records its calls in a
//! shared [`MockState`] and reads its reported state from it, so a test can
//! both inspect what the service did and steer what the engines report.

use std::sync::{Arc, Mutex};

use super::config::{
    MntEngineConfig, MntParams, SttEngineConfig, SttParams, TextRepairEngineConfig,
    TextRepairParams, TtsEngineConfig, TtsParams,
};
use super::events::EventSink;
use super::traits::{
    EngineError, EngineFactory, MntEngine, MntState, SpeechDetectionStatus, SttEngine,
    TextRepairEngine, TextRepairState, TextRepairTask, TtsEngine, TtsState,
};
use super::EngineKind;
use crate::audio::AudioRead;

pub type Shared = Arc<Mutex<MockState>>;

#[derive(Debug)]
pub struct MockState {
    pub calls: Vec<String>,
    pub fail_create: bool,
    pub created: usize,
    pub sinks: Vec<EventSink>,

    pub stt_started: bool,
    pub stt_stopping: bool,
    pub stt_stop_requested: bool,
    pub stt_status: SpeechDetectionStatus,
    pub speech_started: bool,
    /// When `false`, `borrow_buf` reports no free buffer.
    pub stt_free_buf: bool,
    pub fed: Vec<AudioRead>,
    pub stt_params: Option<SttParams>,

    pub tts_state: TtsState,
    pub encoded: Vec<String>,
    pub tts_params: Option<TtsParams>,

    pub mnt_state: MntState,
    pub mnt_progress: f64,
    pub translated: Vec<String>,
    pub mnt_params: Option<MntParams>,

    pub repair_state: TextRepairState,
    pub repaired: Vec<(String, TextRepairTask)>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            fail_create: false,
            created: 0,
            sinks: Vec::new(),
            stt_started: false,
            stt_stopping: false,
            stt_stop_requested: false,
            stt_status: SpeechDetectionStatus::NoSpeech,
            speech_started: false,
            stt_free_buf: true,
            fed: Vec::new(),
            stt_params: None,
            tts_state: TtsState::Idle,
            encoded: Vec::new(),
            tts_params: None,
            mnt_state: MntState::Idle,
            mnt_progress: -1.0,
            translated: Vec::new(),
            mnt_params: None,
            repair_state: TextRepairState::Idle,
            repaired: Vec::new(),
        }
    }
}

impl MockState {
    /// Most recent sink handed to an engine of `kind`.
    pub fn sink(&self, kind: EngineKind) -> Option<EventSink> {
        self.sinks.iter().rev().find(|s| s.kind() == kind).cloned()
    }

    pub fn called(&self, call: &str) -> bool {
        self.calls.iter().any(|c| c == call)
    }

    fn log(&mut self, call: impl Into<String>) {
        self.calls.push(call.into());
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

pub struct MockEngineFactory {
    state: Shared,
}

impl MockEngineFactory {
    pub fn new() -> (Self, Shared) {
        let state = Shared::default();
        (
            Self {
                state: state.clone(),
            },
            state,
        )
    }

    fn register(&self, kind: EngineKind, model_id: &str, sink: EventSink) -> Result<(), EngineError> {
        let mut s = self.state.lock().unwrap();
        if s.fail_create {
            return Err(EngineError::Init("mock failure".into()));
        }
        s.log(format!("{kind}.create:{model_id}"));
        s.created += 1;
        s.sinks.push(sink);
        Ok(())
    }
}

impl EngineFactory for MockEngineFactory {
    fn create_stt(
        &self,
        config: &SttEngineConfig,
        sink: EventSink,
    ) -> Result<Box<dyn SttEngine>, EngineError> {
        self.register(EngineKind::Stt, &config.model_id, sink)?;
        self.state.lock().unwrap().stt_params = Some(config.params.clone());
        Ok(Box::new(MockStt(self.state.clone())))
    }

    fn create_tts(
        &self,
        config: &TtsEngineConfig,
        sink: EventSink,
    ) -> Result<Box<dyn TtsEngine>, EngineError> {
        self.register(EngineKind::Tts, &config.model_id, sink)?;
        self.state.lock().unwrap().tts_params = Some(config.params.clone());
        Ok(Box::new(MockTts(self.state.clone())))
    }

    fn create_mnt(
        &self,
        config: &MntEngineConfig,
        sink: EventSink,
    ) -> Result<Box<dyn MntEngine>, EngineError> {
        self.register(EngineKind::Mnt, &config.model_id, sink)?;
        self.state.lock().unwrap().mnt_params = Some(config.params.clone());
        Ok(Box::new(MockMnt(self.state.clone())))
    }

    fn create_text_repair(
        &self,
        config: &TextRepairEngineConfig,
        sink: EventSink,
    ) -> Result<Box<dyn TextRepairEngine>, EngineError> {
        self.register(EngineKind::TextRepair, &config.model_id, sink)?;
        Ok(Box::new(MockTextRepair(self.state.clone())))
    }
}

// ---------------------------------------------------------------------------
// Engines
// ---------------------------------------------------------------------------

struct MockStt(Shared);

impl SttEngine for MockStt {
    fn start(&mut self) {
        let mut s = self.0.lock().unwrap();
        s.log("stt.start");
        s.stt_started = true;
        s.stt_stopping = false;
        s.stt_stop_requested = false;
    }

    fn stop(&mut self) {
        let mut s = self.0.lock().unwrap();
        s.log("stt.stop");
        s.stt_started = false;
        s.stt_stopping = false;
    }

    fn request_stop(&mut self) {
        let mut s = self.0.lock().unwrap();
        s.log("stt.request_stop");
        s.stt_stop_requested = true;
        s.stt_stopping = true;
    }

    fn started(&self) -> bool {
        self.0.lock().unwrap().stt_started
    }

    fn stopping(&self) -> bool {
        self.0.lock().unwrap().stt_stopping
    }

    fn stop_requested(&self) -> bool {
        self.0.lock().unwrap().stt_stop_requested
    }

    fn speech_detection_status(&self) -> SpeechDetectionStatus {
        self.0.lock().unwrap().stt_status
    }

    fn speech_started(&self) -> bool {
        self.0.lock().unwrap().speech_started
    }

    fn set_speech_started(&mut self, started: bool) {
        let mut s = self.0.lock().unwrap();
        s.log(format!("stt.speech_started:{started}"));
        s.speech_started = started;
    }

    fn borrow_buf(&mut self) -> Option<Vec<f32>> {
        if self.0.lock().unwrap().stt_free_buf {
            Some(vec![0.0; 1024])
        } else {
            None
        }
    }

    fn return_buf(&mut self, _buf: Vec<f32>, read: AudioRead) {
        self.0.lock().unwrap().fed.push(read);
    }

    fn update_params(&mut self, params: &SttParams) {
        let mut s = self.0.lock().unwrap();
        s.log("stt.update_params");
        s.stt_params = Some(params.clone());
    }
}

struct MockTts(Shared);

impl TtsEngine for MockTts {
    fn start(&mut self) {
        self.0.lock().unwrap().log("tts.start");
    }

    fn restart(&mut self) {
        let mut s = self.0.lock().unwrap();
        s.log("tts.restart");
        s.tts_state = TtsState::Idle;
    }

    fn request_stop(&mut self) {
        let mut s = self.0.lock().unwrap();
        s.log("tts.request_stop");
        s.tts_state = TtsState::Stopping;
    }

    fn state(&self) -> TtsState {
        self.0.lock().unwrap().tts_state
    }

    fn encode_speech(&mut self, text: &str) {
        let mut s = self.0.lock().unwrap();
        s.encoded.push(text.to_string());
        s.tts_state = TtsState::SpeechEncoding;
    }

    fn update_params(&mut self, params: &TtsParams) {
        let mut s = self.0.lock().unwrap();
        s.log("tts.update_params");
        s.tts_params = Some(params.clone());
    }
}

struct MockMnt(Shared);

impl MntEngine for MockMnt {
    fn start(&mut self) {
        self.0.lock().unwrap().log("mnt.start");
    }

    fn stop(&mut self) {
        let mut s = self.0.lock().unwrap();
        s.log("mnt.stop");
        s.mnt_state = MntState::Stopped;
    }

    fn request_stop(&mut self) {
        let mut s = self.0.lock().unwrap();
        s.log("mnt.request_stop");
        s.mnt_state = MntState::Stopping;
    }

    fn state(&self) -> MntState {
        self.0.lock().unwrap().mnt_state
    }

    fn progress(&self) -> f64 {
        self.0.lock().unwrap().mnt_progress
    }

    fn translate(&mut self, text: &str) {
        let mut s = self.0.lock().unwrap();
        s.translated.push(text.to_string());
        s.mnt_state = MntState::Translating;
    }

    fn update_params(&mut self, params: &MntParams) {
        self.0.lock().unwrap().mnt_params = Some(params.clone());
    }
}

struct MockTextRepair(Shared);

impl TextRepairEngine for MockTextRepair {
    fn start(&mut self) {
        self.0.lock().unwrap().log("text_repair.start");
    }

    fn request_stop(&mut self) {
        let mut s = self.0.lock().unwrap();
        s.log("text_repair.request_stop");
        s.repair_state = TextRepairState::Stopping;
    }

    fn state(&self) -> TextRepairState {
        self.0.lock().unwrap().repair_state
    }

    fn repair_text(&mut self, text: &str, task: TextRepairTask) {
        let mut s = self.0.lock().unwrap();
        s.repaired.push((text.to_string(), task));
        s.repair_state = TextRepairState::Processing;
    }

    fn update_params(&mut self, _params: &TextRepairParams) {
        self.0.lock().unwrap().log("text_repair.update_params");
    }
}
