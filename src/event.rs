//! Events delivered to the task manager's control loop.
//!
//! Engines, audio sources and players never touch service state directly;
//! they push an [`Event`] on an unbounded channel and the control loop
//! handles events one at a time in arrival order.

use tokio::sync::mpsc;

use crate::audio::{AudioEvent, PlayerState};
use crate::engine::EngineEvent;
use crate::service::TaskId;

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Engine callback, tagged with the task bound to the engine's family
    /// when it was emitted.
    Engine { task: TaskId, event: EngineEvent },
    /// Notification from the active audio source.
    Audio(AudioEvent),
    /// State change of the speech player.
    Player(PlayerState),
}

pub type EventSender = mpsc::UnboundedSender<Event>;
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

/// Create the control-loop event channel.
pub fn channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
