//! Process-wide shutdown signal.
//!
//! Background tasks hold a clone of the receiver and `select!` on it. Nothing
//! is ever sent: [`Shutdown::trigger`] drops the only sender, which
//! disconnects the channel and wakes every receiver at once.
use crossbeam_channel::{Receiver, Sender, bounded};
use log::info;
use std::sync::Mutex;

use crate::error::SessionError;
use crate::result::Result;

/// Owner of the shutdown signal.
pub struct Shutdown {
    tx: Mutex<Option<Sender<()>>>,
    rx: Receiver<()>,
}

impl Shutdown {
    /// New, untriggered signal.
    pub fn new() -> Self {
        let (tx, rx) = bounded(0);
        Shutdown {
            tx: Mutex::new(Some(tx)),
            rx,
        }
    }

    /// Receiver that becomes ready (disconnected) once triggered.
    pub fn subscribe(&self) -> Receiver<()> {
        self.rx.clone()
    }

    /// Fire the signal. Idempotent.
    pub fn trigger(&self) {
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a Ctrl+C / SIGTERM handler; the returned receiver gets one
/// message per interrupt.
pub fn interrupt_channel() -> Result<Receiver<()>> {
    let (tx, rx) = bounded(1);
    ctrlc::set_handler(move || {
        info!("Interrupt received. Shutting down...");
        let _ = tx.try_send(());
    })
    .map_err(|e| SessionError::Format(format!("Error setting Ctrl+C handler: {}", e)))?;
    Ok(rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::TryRecvError;

    #[test]
    fn trigger_wakes_every_subscriber() {
        let shutdown = Shutdown::new();
        let a = shutdown.subscribe();
        let b = shutdown.subscribe();
        assert_eq!(a.try_recv(), Err(TryRecvError::Empty));

        shutdown.trigger();
        shutdown.trigger();
        assert_eq!(a.try_recv(), Err(TryRecvError::Disconnected));
        assert_eq!(b.try_recv(), Err(TryRecvError::Disconnected));
    }
}
