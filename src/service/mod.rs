//! Task orchestration: one active task, one control loop.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ runner: tokio control loop                                  │
//! │   commands (ServiceHandle) │ Event channel │ watchdogs      │
//! └───────────────────────────┬─────────────────────────────────┘
//!                             ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │ TaskManager                                                 │
//! │   current Task ─ ResultQueue ─ AudioSource ─ Player         │
//! │   EngineController (stt │ tts │ mnt │ text_repair)          │
//! │   status derivation ─► Notification channel                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod manager;
pub mod notify;
pub mod queue;
pub mod runner;
pub mod state;
pub mod task;
pub mod watchdog;

pub use error::ServiceError;
pub use manager::{Collaborators, TaskManager};
pub use notify::{ErrorKind, Notification, NotificationReceiver, NotificationSender};
pub use queue::{PartialResult, ResultQueue};
pub use runner::{spawn, Command, ServiceHandle};
pub use state::{ServiceState, TaskState};
pub use task::{SpeechMode, Task, TaskFlags, TaskId, TaskIdGenerator, INVALID_TASK};
pub use watchdog::Watchdog;
