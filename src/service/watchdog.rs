//! Inactivity timers.
//!
//! A watchdog is only a deadline; the control loop sleeps until the earliest
//! armed deadline and hands the expiry back to the task manager.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Watchdog {
    name: &'static str,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl Watchdog {
    /// A zero `timeout` disables the watchdog.
    pub fn new(name: &'static str, timeout: Duration) -> Self {
        Self {
            name,
            timeout,
            deadline: None,
        }
    }

    /// Start or restart the countdown.
    pub fn arm(&mut self) {
        if self.timeout.is_zero() {
            return;
        }
        self.deadline = Some(Instant::now() + self.timeout);
    }

    pub fn disarm(&mut self) {
        if self.deadline.take().is_some() {
            log::debug!("service: {} watchdog disarmed", self.name);
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left before expiry; zero when disarmed or expired.
    pub fn remaining(&self) -> Duration {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or_default()
    }

    /// Disarm and return `true` if the deadline has passed.
    pub fn take_expired(&mut self) -> bool {
        match self.deadline {
            Some(d) if d <= Instant::now() => {
                self.deadline = None;
                log::debug!("service: {} watchdog expired", self.name);
                true
            }
            _ => false,
        }
    }
}
