//! Playback contract for synthesized speech and beeps.

use std::path::Path;

use crate::event::{Event, EventSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
    Paused,
}

/// Where a player reports its state changes.
#[derive(Debug, Clone)]
pub struct PlayerSink {
    tx: EventSender,
}

impl PlayerSink {
    pub(crate) fn new(tx: EventSender) -> Self {
        Self { tx }
    }

    pub fn state_changed(&self, state: PlayerState) {
        let _ = self.tx.send(Event::Player(state));
    }
}

/// Audio output.  A player plays one file at a time and must report
/// `Stopped` when a file finishes on its own.
pub trait Player: Send {
    /// Called once when the player is handed to the service.  Players
    /// used only for beeps are never attached.
    fn attach(&mut self, _sink: PlayerSink) {}
    fn play(&mut self, path: &Path);
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);
    fn state(&self) -> PlayerState;
}
