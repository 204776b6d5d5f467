//! Contract between the session engine and the endpoint applications.
//!
//! The engine owns the wire protocol: framing, sequencing, heartbeats and the
//! logon handshake. Applications only see two things:
//!
//! - [`SessionEngine`]: what the core may ask of the engine: enumerate
//!   sessions, send a message, wait for a session to log on.
//! - [`Application`]: the callbacks the engine invokes as sessions come and
//!   go and as messages flow in either direction.
//!
//! Callbacks take `&self` and receive the engine handle, so a handler can
//! reply without keeping a back-reference to the engine that owns it.
//! Implementations must use interior mutability for their own state since the
//! engine may call in from several connection threads.
use crossbeam_channel::Receiver;

use crate::error::SessionError;
use crate::message::{Message, MessageReject};
use crate::result::Result;
use crate::session::SessionId;

/// Operations the core consumes from the session engine.
pub trait SessionEngine: Send + Sync {
    /// Every session the engine knows about, logged on or not.
    fn session_ids(&self) -> Vec<SessionId>;

    /// Sessions currently logged on.
    fn alive_session_ids(&self) -> Vec<SessionId>;

    /// Deliver `msg` to `session_id`. The engine stamps the header.
    fn send_to_session(&self, msg: Message, session_id: &SessionId) -> Result<()>;

    /// Deliver `msg` only if `session_id` is currently logged on.
    fn send_to_alive_session(&self, msg: Message, session_id: &SessionId) -> Result<()> {
        if !self.is_logged_on(session_id) {
            return Err(SessionError::NotLoggedOn(session_id.to_string()));
        }
        self.send_to_session(msg, session_id)
    }

    /// Whether `session_id` is currently logged on.
    fn is_logged_on(&self, session_id: &SessionId) -> bool {
        self.alive_session_ids().contains(session_id)
    }

    /// Fires once when `session_id` is, or becomes, logged on.
    fn wait_for_logon(&self, session_id: &SessionId) -> Receiver<()>;
}

/// Callbacks invoked by the engine.
pub trait Application: Send + Sync {
    /// A session was created from configuration or dynamically.
    fn on_create(&self, _session_id: &SessionId) {}

    /// The logon handshake completed.
    fn on_logon(&self, _session_id: &SessionId) {}

    /// The session logged out or the connection dropped.
    fn on_logout(&self, _session_id: &SessionId) {}

    /// Observes an outbound admin message before it is written.
    fn to_admin(&self, _msg: &Message, _session_id: &SessionId) {}

    /// Observes an outbound application message; an error vetoes the send.
    fn to_app(&self, _msg: &Message, _session_id: &SessionId) -> Result<()> {
        Ok(())
    }

    /// Inbound admin message.
    fn from_admin(
        &self,
        _msg: &Message,
        _session_id: &SessionId,
        _engine: &dyn SessionEngine,
    ) -> Result<(), MessageReject> {
        Ok(())
    }

    /// Inbound application message.
    fn from_app(
        &self,
        msg: &Message,
        session_id: &SessionId,
        engine: &dyn SessionEngine,
    ) -> Result<(), MessageReject>;
}
