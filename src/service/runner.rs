//! The control loop and its handle.
//!
//! ```text
//!  ServiceHandle ──Command──┐
//!                           ▼
//!  engines / sources ──► tokio::select! ──► TaskManager ──► Notification
//!  player            ──►      ▲
//!                   watchdog deadline
//! ```
//!
//! Every call, callback and timer expiry is handled on this one task, so the
//! manager never sees two mutations at once.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use super::error::ServiceError;
use super::manager::{Collaborators, TaskManager};
use super::notify::NotificationReceiver;
use super::state::{ServiceState, TaskState};
use super::task::{TaskId, INVALID_TASK};
use crate::catalog::{ModelRole, ModelSummary};
use crate::config::AppConfig;
use crate::engine::ListenMode;
use crate::event::{self, EventReceiver};
use crate::options::Options;

const COMMAND_QUEUE: usize = 32;

/// A unit of work run on the control loop.
pub type Command = Box<dyn FnOnce(&mut TaskManager) + Send>;

/// Start the control loop on the current tokio runtime.
pub fn spawn(
    config: AppConfig,
    parts: Collaborators,
) -> (ServiceHandle, NotificationReceiver, JoinHandle<()>) {
    let (event_tx, event_rx) = event::channel();
    let (notify_tx, notify_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);

    let manager = TaskManager::new(config, parts, event_tx, notify_tx);
    let join = tokio::spawn(run(manager, cmd_rx, event_rx));
    (ServiceHandle { tx: cmd_tx }, notify_rx, join)
}

async fn run(
    mut manager: TaskManager,
    mut commands: mpsc::Receiver<Command>,
    mut events: EventReceiver,
) {
    log::info!("service: control loop started");
    loop {
        let deadline = manager.next_deadline();
        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(cmd) => cmd(&mut manager),
                None => {
                    log::info!("service: all handles dropped");
                    break;
                }
            },
            Some(event) = events.recv() => manager.handle_event(event),
            _ = sleep_until_deadline(deadline) => manager.on_timer(),
        }
        if manager.is_shut_down() {
            break;
        }
    }
    log::info!("service: control loop exited");
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

// ---------------------------------------------------------------------------
// ServiceHandle
// ---------------------------------------------------------------------------

fn stopped() -> ServiceError {
    ServiceError::invalid("service is not running")
}

/// Cloneable front end of the control loop.
#[derive(Clone)]
pub struct ServiceHandle {
    tx: mpsc::Sender<Command>,
}

impl ServiceHandle {
    /// Run `f` on the control loop; `None` once the loop has exited.
    pub async fn call<R, F>(&self, f: F) -> Option<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut TaskManager) -> R + Send + 'static,
    {
        let (reply, rx) = oneshot::channel();
        let cmd: Command = Box::new(move |manager| {
            let _ = reply.send(f(manager));
        });
        self.tx.send(cmd).await.ok()?;
        rx.await.ok()
    }

    pub async fn state(&self) -> ServiceState {
        self.call(|m| m.state()).await.unwrap_or_default()
    }

    pub async fn task_state(&self) -> TaskState {
        self.call(|m| m.task_state()).await.unwrap_or(TaskState::Idle)
    }

    pub async fn current_task(&self) -> TaskId {
        self.call(|m| m.current_task()).await.unwrap_or(INVALID_TASK)
    }

    pub async fn available_models(&self, role: ModelRole) -> Vec<ModelSummary> {
        self.call(move |m| m.available_models(role)).await.unwrap_or_default()
    }

    pub async fn available_langs(&self, role: ModelRole) -> Vec<String> {
        self.call(move |m| m.available_langs(role)).await.unwrap_or_default()
    }

    pub async fn mnt_out_langs(&self, in_lang: &str) -> Vec<String> {
        let in_lang = in_lang.to_string();
        self.call(move |m| m.mnt_out_langs(&in_lang))
            .await
            .unwrap_or_default()
    }

    pub async fn start_listen(
        &self,
        mode: ListenMode,
        lang: &str,
        out_lang: &str,
        options: Options,
    ) -> TaskId {
        let (lang, out_lang) = (lang.to_string(), out_lang.to_string());
        self.call(move |m| m.start_listen(mode, &lang, &out_lang, options))
            .await
            .unwrap_or(INVALID_TASK)
    }

    pub async fn stop_listen(&self, task: TaskId) -> Result<(), ServiceError> {
        self.call(move |m| m.stop_listen(task))
            .await
            .unwrap_or_else(|| Err(stopped()))
    }

    pub async fn transcribe_file(
        &self,
        file: &str,
        lang: &str,
        out_lang: &str,
        options: Options,
    ) -> TaskId {
        let (file, lang, out_lang) = (file.to_string(), lang.to_string(), out_lang.to_string());
        self.call(move |m| m.transcribe_file(&file, &lang, &out_lang, options))
            .await
            .unwrap_or(INVALID_TASK)
    }

    pub async fn play_speech(&self, text: &str, lang: &str, options: Options) -> TaskId {
        let (text, lang) = (text.to_string(), lang.to_string());
        self.call(move |m| m.play_speech(&text, &lang, options))
            .await
            .unwrap_or(INVALID_TASK)
    }

    pub async fn speech_to_file(&self, text: &str, lang: &str, options: Options) -> TaskId {
        let (text, lang) = (text.to_string(), lang.to_string());
        self.call(move |m| m.speech_to_file(&text, &lang, options))
            .await
            .unwrap_or(INVALID_TASK)
    }

    pub async fn pause_speech(&self, task: TaskId) -> Result<(), ServiceError> {
        self.call(move |m| m.pause_speech(task))
            .await
            .unwrap_or_else(|| Err(stopped()))
    }

    pub async fn resume_speech(&self, task: TaskId) -> Result<(), ServiceError> {
        self.call(move |m| m.resume_speech(task))
            .await
            .unwrap_or_else(|| Err(stopped()))
    }

    pub async fn stop_speech(&self, task: TaskId) -> Result<(), ServiceError> {
        self.call(move |m| m.stop_speech(task))
            .await
            .unwrap_or_else(|| Err(stopped()))
    }

    pub async fn translate(
        &self,
        text: &str,
        lang: &str,
        out_lang: &str,
        options: Options,
    ) -> TaskId {
        let (text, lang, out_lang) = (text.to_string(), lang.to_string(), out_lang.to_string());
        self.call(move |m| m.translate(&text, &lang, &out_lang, options))
            .await
            .unwrap_or(INVALID_TASK)
    }

    pub async fn repair_text(&self, text: &str, options: Options) -> TaskId {
        let text = text.to_string();
        self.call(move |m| m.repair_text(&text, options))
            .await
            .unwrap_or(INVALID_TASK)
    }

    pub async fn cancel(&self, task: TaskId) -> Result<(), ServiceError> {
        self.call(move |m| m.cancel(task))
            .await
            .unwrap_or_else(|| Err(stopped()))
    }

    pub async fn keepalive_service(&self) -> Duration {
        self.call(|m| m.keepalive_service())
            .await
            .unwrap_or_default()
    }

    pub async fn keepalive_task(&self, task: TaskId) -> Result<Duration, ServiceError> {
        self.call(move |m| m.keepalive_task(task))
            .await
            .unwrap_or_else(|| Err(stopped()))
    }

    pub async fn transcribe_file_progress(&self, task: TaskId) -> f64 {
        self.call(move |m| m.transcribe_file_progress(task))
            .await
            .unwrap_or(-1.0)
    }

    pub async fn speech_to_file_progress(&self, task: TaskId) -> f64 {
        self.call(move |m| m.speech_to_file_progress(task))
            .await
            .unwrap_or(-1.0)
    }

    pub async fn translate_progress(&self, task: TaskId) -> f64 {
        self.call(move |m| m.translate_progress(task))
            .await
            .unwrap_or(-1.0)
    }

    /// The catalog is about to change.
    pub async fn reload(&self) {
        self.call(|m| m.reload()).await;
    }

    /// The catalog finished changing.
    pub async fn models_changed(&self) {
        self.call(|m| m.models_changed()).await;
    }
}
