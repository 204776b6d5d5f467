//! Initiator-side application callbacks.
//!
//! Received quotes are logged and handed to the audit logger. In debug mode
//! outbound admin traffic is traced too, and artificial delays are inserted
//! after sending a logon and on every received heartbeat, to exercise the
//! counterparty's timeout handling.
use crate::model::audit::AuditLogger;
use log::{debug, error, info, warn};
use quote_common::message::{Body, Message, MessageReject, MsgType};
use quote_common::{Application, Result, SessionEngine, SessionId};
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

/// Artificial delays applied in debug mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugDelays {
    /// Pause after a logon was sent.
    pub after_logon_sent: Duration,
    /// Pause when a heartbeat arrives.
    pub on_heartbeat: Duration,
}

impl Default for DebugDelays {
    fn default() -> Self {
        DebugDelays {
            after_logon_sent: Duration::from_secs(10),
            on_heartbeat: Duration::from_secs(120),
        }
    }
}

/// Quote subscriber application.
pub struct Subscriber {
    audit: Mutex<AuditLogger>,
    debug: bool,
    delays: DebugDelays,
}

impl Subscriber {
    /// Create the application around an audit logger.
    pub fn new(audit: AuditLogger, debug: bool, delays: DebugDelays) -> Self {
        Subscriber {
            audit: Mutex::new(audit),
            debug,
            delays,
        }
    }

    fn audit(&self) -> MutexGuard<'_, AuditLogger> {
        self.audit.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Open the audit file.
    pub fn open_audit(&self) -> Result<()> {
        self.audit().open()
    }

    /// Close the audit file.
    pub fn close_audit(&self) -> Result<()> {
        self.audit().close()
    }
}

impl Application for Subscriber {
    fn on_create(&self, session_id: &SessionId) {
        info!("OnCreate: {}", session_id);
    }

    fn on_logon(&self, session_id: &SessionId) {
        info!("Logon: {}", session_id);
    }

    fn on_logout(&self, session_id: &SessionId) {
        info!("Logout: {}", session_id);
    }

    fn to_admin(&self, msg: &Message, _session_id: &SessionId) {
        if !self.debug {
            return;
        }
        match msg.msg_type() {
            MsgType::Logon => {
                info!("Send Logon: {:?}", msg);
                thread::sleep(self.delays.after_logon_sent);
            }
            MsgType::Logout => info!("Send Logout: {:?}", msg),
            MsgType::ResendRequest => info!("Send ResendRequest: {:?}", msg),
            MsgType::Heartbeat => {}
            _ => info!("Send: {:?}", msg),
        }
    }

    fn to_app(&self, msg: &Message, _session_id: &SessionId) -> Result<()> {
        info!("Sending {:?}", msg);
        Ok(())
    }

    fn from_admin(
        &self,
        msg: &Message,
        _session_id: &SessionId,
        _engine: &dyn SessionEngine,
    ) -> Result<(), MessageReject> {
        match msg.msg_type() {
            MsgType::Logon => info!("Recv Logon: {:?}", msg),
            MsgType::Logout => info!("Recv Logout: {:?}", msg),
            MsgType::Reject => warn!("Recv Reject: {:?}", msg),
            MsgType::SequenceReset => info!("Recv SequenceReset: {:?}", msg),
            MsgType::Heartbeat if self.debug => {
                debug!("[heartbeat] sleep {:?}", self.delays.on_heartbeat);
                thread::sleep(self.delays.on_heartbeat);
                info!("Recv heartbeat.");
            }
            MsgType::Heartbeat => {}
            _ => info!("Recv: {:?}", msg),
        }
        Ok(())
    }

    fn from_app(
        &self,
        msg: &Message,
        _session_id: &SessionId,
        _engine: &dyn SessionEngine,
    ) -> Result<(), MessageReject> {
        match &msg.body {
            Body::Quote(quote) => {
                info!("Quote: {:?}", quote);
                if let Err(e) = self.audit().write(quote) {
                    error!("Logging error: {}", e);
                }
            }
            Body::BusinessMessageReject(reject) => warn!("BusinessMessageReject: {:?}", reject),
            _ => info!("Receive: {:?}", msg),
        }
        Ok(())
    }
}
