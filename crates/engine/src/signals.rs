//! Signal subscriptions -- per-task OS signal listeners
//!
//! Every long-lived task owns its own [`SignalListener`] rather than
//! sharing one subscription; the OS delivers each signal to all of them.
//! Hangup asks for a full resync, the terminal signals ask the task to
//! return.

use tokio::signal::unix::{signal, Signal, SignalKind};

use crate::error::EngineError;

/// What a received signal asks of the task observing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEvent {
    /// `SIGHUP`: rebuild the context and re-render every config
    Reload,
    /// `SIGINT`/`SIGTERM`/`SIGQUIT`: stop the observing task
    Shutdown(&'static str),
}

/// Subscription to hangup, interrupt, terminate, and quit.
pub struct SignalListener {
    hangup: Signal,
    interrupt: Signal,
    terminate: Signal,
    quit: Signal,
}

impl SignalListener {
    /// Installs the handlers.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Signal` when a handler cannot be installed;
    /// callers treat that as setup-fatal.
    pub fn new() -> Result<Self, EngineError> {
        let install = |kind: SignalKind, name: &str| {
            signal(kind)
                .map_err(|e| EngineError::Signal(format!("failed to install {name} handler: {e}")))
        };
        Ok(Self {
            hangup: install(SignalKind::hangup(), "SIGHUP")?,
            interrupt: install(SignalKind::interrupt(), "SIGINT")?,
            terminate: install(SignalKind::terminate(), "SIGTERM")?,
            quit: install(SignalKind::quit(), "SIGQUIT")?,
        })
    }

    /// Waits for the next signal.
    pub async fn recv(&mut self) -> Option<SignalEvent> {
        tokio::select! {
            received = self.hangup.recv() => received.map(|()| SignalEvent::Reload),
            received = self.interrupt.recv() => received.map(|()| SignalEvent::Shutdown("SIGINT")),
            received = self.terminate.recv() => received.map(|()| SignalEvent::Shutdown("SIGTERM")),
            received = self.quit.recv() => received.map(|()| SignalEvent::Shutdown("SIGQUIT")),
        }
    }
}
