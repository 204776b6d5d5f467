//! Stand-in session engine: newline-delimited JSON messages over TCP.
//!
//! This is the minimum needed to run both endpoints against each other. It
//! performs the logon handshake (the first message on a connection must be a
//! `Logon`; the acceptor answers with its own), numbers outbound messages
//! per session, sends heartbeats, invokes the [`Application`] callbacks and
//! answers rejected application messages with a `Reject`. It does not verify
//! inbound sequence numbers, service resend requests, reconnect, or persist
//! anything.
//!
//! Threads:
//! - acceptor: one accept loop, polling a non-blocking listener;
//! - initiator: one connect thread per configured session;
//! - one reader thread and one writer thread per connection; senders only
//!   queue serialized lines, so a slow peer never stalls the session table;
//! - one heartbeat thread per hub.
//!
//! All of them stop when [`SessionHub::stop`] fires the hub's shutdown signal.
use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{Shutdown as NetShutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::engine::{Application, SessionEngine};
use crate::error::SessionError;
use crate::message::{Body, Header, Heartbeat, Logon, Logout, Message, MsgType, Reject};
use crate::net::{DEFAULT_ACCEPT_PORT, DEFAULT_HEART_BT_INT, addr};
use crate::result::Result;
use crate::session::SessionId;
use crate::settings::Settings;
use crate::shutdown::Shutdown;

/// How often the acceptor polls for new connections.
const ACCEPT_POLL: Duration = Duration::from_millis(100);
/// A peer that accepts nothing for this long is dropped.
const WRITE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Acceptor,
    Initiator,
}

#[derive(Default)]
struct SessionState {
    outbound: Option<Sender<Vec<u8>>>,
    logged_on: bool,
    next_out_seq: u64,
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<SessionId, SessionState>,
    waiters: HashMap<SessionId, Vec<Sender<()>>>,
}

/// Session table and message pump shared by [`Acceptor`] and [`Initiator`].
pub struct SessionHub {
    app: Arc<dyn Application>,
    role: Role,
    dynamic_sessions: bool,
    heart_bt_int: u64,
    registry: Mutex<Registry>,
    stop: Shutdown,
}

impl SessionHub {
    fn new(app: Arc<dyn Application>, role: Role, dynamic_sessions: bool, heart_bt_int: u64) -> Self {
        SessionHub {
            app,
            role,
            dynamic_sessions,
            heart_bt_int,
            registry: Mutex::new(Registry::default()),
            stop: Shutdown::new(),
        }
    }

    fn register(&self, session_id: &SessionId) -> Result<()> {
        {
            let mut registry = self.registry.lock()?;
            if registry.sessions.contains_key(session_id) {
                return Ok(());
            }
            registry
                .sessions
                .insert(session_id.clone(), SessionState::default());
        }
        self.app.on_create(session_id);
        Ok(())
    }

    fn attach(&self, session_id: &SessionId, stream: TcpStream) -> Result<()> {
        let mut registry = self.registry.lock()?;
        let state = registry
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        if state.logged_on {
            return Err(SessionError::Format(format!(
                "session {} is already logged on",
                session_id
            )));
        }
        state.outbound = Some(spawn_writer(session_id.clone(), stream));
        Ok(())
    }

    fn mark_logged_on(&self, session_id: &SessionId) -> Result<()> {
        let mut registry = self.registry.lock()?;
        if let Some(state) = registry.sessions.get_mut(session_id) {
            state.logged_on = true;
        }
        for waiter in registry.waiters.remove(session_id).unwrap_or_default() {
            let _ = waiter.try_send(());
        }
        Ok(())
    }

    fn disconnect(&self, session_id: &SessionId) {
        let was_logged_on = match self.registry.lock() {
            Ok(mut registry) => match registry.sessions.get_mut(session_id) {
                Some(state) => {
                    // The writer drains what is queued, then closes the socket.
                    state.outbound = None;
                    std::mem::replace(&mut state.logged_on, false)
                }
                None => false,
            },
            Err(e) => {
                error!("Session registry unavailable: {}", e);
                false
            }
        };
        if was_logged_on {
            info!("Session {} disconnected", session_id);
            self.app.on_logout(session_id);
        }
    }

    /// Stamp, observe and queue one message for the connection's writer.
    /// `require_logon` is false only for the handshake itself.
    fn write(&self, mut msg: Message, session_id: &SessionId, require_logon: bool) -> Result<()> {
        if msg.header.sender_comp_id.is_empty() {
            msg.header = Header::for_session(session_id);
        }
        if msg.msg_type().is_admin() {
            self.app.to_admin(&msg, session_id);
        } else {
            self.app.to_app(&msg, session_id)?;
        }

        let mut registry = self.registry.lock()?;
        let state = registry
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::SessionNotFound(session_id.to_string()))?;
        if require_logon && !state.logged_on {
            return Err(SessionError::NotLoggedOn(session_id.to_string()));
        }
        state.next_out_seq += 1;
        msg.header.msg_seq_num = state.next_out_seq;
        msg.header.sending_time = Some(Utc::now());

        let outbound = state
            .outbound
            .as_ref()
            .ok_or_else(|| SessionError::Send(format!("no connection for {}", session_id)))?;
        let mut line = serde_json::to_vec(&msg)?;
        line.push(b'\n');
        outbound
            .send(line)
            .map_err(|_| SessionError::Send(format!("connection to {} is closed", session_id)))
    }

    fn logon_message(&self) -> Message {
        Message::new(Body::Logon(Logon {
            heart_bt_int: self.heart_bt_int,
        }))
    }

    /// Reader loop for one connection. `bound` is known up front on the
    /// initiator side and learned from the logon on the acceptor side.
    fn serve(&self, stream: TcpStream, mut bound: Option<SessionId>) {
        let reader = match stream.try_clone() {
            Ok(clone) => BufReader::new(clone),
            Err(e) => {
                error!("Failed to clone connection: {}", e);
                return;
            }
        };

        for line in reader.lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    debug!("Connection read ended: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let msg: Message = match serde_json::from_str(&line) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!("Dropping malformed message: {}", e);
                    continue;
                }
            };
            if !self.handle_inbound(msg, &stream, &mut bound) {
                break;
            }
        }

        match bound {
            Some(session_id) => self.disconnect(&session_id),
            None => {
                let _ = stream.shutdown(NetShutdown::Both);
            }
        }
    }

    fn handle_inbound(&self, msg: Message, stream: &TcpStream, bound: &mut Option<SessionId>) -> bool {
        let session_id = match bound.clone() {
            Some(session_id) => session_id,
            None => match self.accept_logon(&msg, stream) {
                Ok(session_id) => {
                    *bound = Some(session_id.clone());
                    session_id
                }
                Err(e) => {
                    warn!("Refusing connection: {}", e);
                    return false;
                }
            },
        };

        if msg.msg_type().is_admin() {
            self.handle_admin(msg, &session_id)
        } else {
            self.handle_app(msg, &session_id);
            true
        }
    }

    fn accept_logon(&self, msg: &Message, stream: &TcpStream) -> Result<SessionId> {
        if msg.msg_type() != MsgType::Logon {
            return Err(SessionError::Format(format!(
                "first message must be Logon, got {}",
                msg.msg_type()
            )));
        }
        let session_id = msg.header.session_id().reversed();
        let known = self.registry.lock()?.sessions.contains_key(&session_id);
        if !known {
            if !self.dynamic_sessions {
                return Err(SessionError::SessionNotFound(session_id.to_string()));
            }
            self.register(&session_id)?;
        }
        self.attach(&session_id, stream.try_clone()?)?;
        Ok(session_id)
    }

    fn handle_admin(&self, msg: Message, session_id: &SessionId) -> bool {
        if let Err(reject) = self.app.from_admin(&msg, session_id, self) {
            warn!("Admin message from {} rejected: {}", session_id, reject);
        }
        match msg.body {
            Body::Logon(_) => {
                if self.role == Role::Acceptor {
                    if let Err(e) = self.write(self.logon_message(), session_id, false) {
                        error!("Failed to answer logon from {}: {}", session_id, e);
                        return false;
                    }
                }
                if let Err(e) = self.mark_logged_on(session_id) {
                    error!("Failed to mark {} logged on: {}", session_id, e);
                    return false;
                }
                info!("Session {} logged on", session_id);
                self.app.on_logon(session_id);
                true
            }
            Body::Logout(_) => {
                if self.role == Role::Acceptor {
                    let _ = self.write(Message::new(Body::Logout(Logout::default())), session_id, true);
                }
                false
            }
            _ => true,
        }
    }

    fn handle_app(&self, msg: Message, session_id: &SessionId) {
        if !self.is_logged_on(session_id) {
            warn!("Ignoring {} from {} before logon", msg.msg_type(), session_id);
            return;
        }
        if let Err(reject) = self.app.from_app(&msg, session_id, self) {
            warn!(
                "Rejecting {} from {}: {}",
                msg.msg_type(),
                session_id,
                reject
            );
            let reply = Message::new(Body::Reject(Reject {
                ref_seq_num: msg.header.msg_seq_num,
                ref_msg_type: Some(msg.msg_type()),
                ref_tag_id: reject.ref_tag_id,
                reason: Some(reject.reason),
                text: Some(reject.to_string()),
            }));
            if let Err(e) = self.send_to_session(reply, session_id) {
                error!("Failed to send reject to {}: {}", session_id, e);
            }
        }
    }

    fn spawn_heartbeats(self: &Arc<Self>) {
        let hub = Arc::clone(self);
        let stop = self.stop.subscribe();
        let interval = Duration::from_secs(self.heart_bt_int.max(1));
        thread::spawn(move || {
            loop {
                select! {
                    recv(stop) -> _ => break,
                    default(interval) => {
                        for session_id in hub.alive_session_ids() {
                            let heartbeat = Message::new(Body::Heartbeat(Heartbeat::default()));
                            if let Err(e) = hub.write(heartbeat, &session_id, true) {
                                debug!("Heartbeat to {} failed: {}", session_id, e);
                            }
                        }
                    }
                }
            }
            debug!("Heartbeat thread stopping...");
        });
    }

    /// Log out every session, close all connections and stop background threads.
    pub fn stop(&self) {
        self.stop.trigger();
        for session_id in self.alive_session_ids() {
            let logout = Message::new(Body::Logout(Logout::default()));
            if let Err(e) = self.write(logout, &session_id, true) {
                debug!("Logout to {} failed: {}", session_id, e);
            }
        }
        let session_ids = self.session_ids();
        for session_id in session_ids {
            self.disconnect(&session_id);
        }
    }
}

impl SessionEngine for SessionHub {
    fn session_ids(&self) -> Vec<SessionId> {
        self.registry
            .lock()
            .map(|registry| registry.sessions.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn alive_session_ids(&self) -> Vec<SessionId> {
        self.registry
            .lock()
            .map(|registry| {
                registry
                    .sessions
                    .iter()
                    .filter(|(_, state)| state.logged_on)
                    .map(|(id, _)| id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn send_to_session(&self, msg: Message, session_id: &SessionId) -> Result<()> {
        self.write(msg, session_id, true)
    }

    fn is_logged_on(&self, session_id: &SessionId) -> bool {
        self.registry
            .lock()
            .map(|registry| {
                registry
                    .sessions
                    .get(session_id)
                    .map(|state| state.logged_on)
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    fn wait_for_logon(&self, session_id: &SessionId) -> Receiver<()> {
        let (tx, rx) = bounded(1);
        match self.registry.lock() {
            Ok(mut registry) => {
                let logged_on = registry
                    .sessions
                    .get(session_id)
                    .map(|state| state.logged_on)
                    .unwrap_or(false);
                if logged_on {
                    let _ = tx.try_send(());
                } else {
                    registry
                        .waiters
                        .entry(session_id.clone())
                        .or_default()
                        .push(tx);
                }
            }
            Err(e) => error!("Session registry unavailable: {}", e),
        }
        rx
    }
}

/// Write queued lines in order until the queue is dropped or the peer fails,
/// then close the socket.
fn spawn_writer(session_id: SessionId, mut stream: TcpStream) -> Sender<Vec<u8>> {
    let (tx, rx) = unbounded::<Vec<u8>>();
    thread::spawn(move || {
        if let Err(e) = stream.set_write_timeout(Some(WRITE_TIMEOUT)) {
            warn!("Failed to set write timeout for {}: {}", session_id, e);
        }
        for line in rx {
            if let Err(e) = stream.write_all(&line) {
                warn!("Write to {} failed: {}", session_id, e);
                break;
            }
        }
        let _ = stream.shutdown(NetShutdown::Both);
        debug!("Writer for {} stopping...", session_id);
    });
    tx
}

fn heart_bt_int(settings: &Settings) -> Result<u64> {
    let global = settings.global_settings();
    if !global.has_setting("HeartBtInt") {
        return Ok(DEFAULT_HEART_BT_INT);
    }
    let value = global.int_setting("HeartBtInt")?;
    u64::try_from(value)
        .map_err(|_| SessionError::Config(format!("HeartBtInt must be positive: {}", value)))
}

/// Accepting side of the stand-in engine.
pub struct Acceptor {
    hub: Arc<SessionHub>,
    port: u16,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Acceptor {
    /// Build an acceptor from settings. Sessions declared in the file are
    /// registered now; with `DynamicSessions=Y` unknown counterparties are
    /// registered at logon.
    pub fn new(app: Arc<dyn Application>, settings: &Settings) -> Result<Self> {
        let global = settings.global_settings();
        let dynamic_sessions = global.has_setting("DynamicSessions") && global.bool_setting("DynamicSessions")?;
        let port = if global.has_setting("SocketAcceptPort") {
            let value = global.int_setting("SocketAcceptPort")?;
            u16::try_from(value)
                .map_err(|_| SessionError::Config(format!("invalid SocketAcceptPort: {}", value)))?
        } else {
            DEFAULT_ACCEPT_PORT
        };

        let hub = Arc::new(SessionHub::new(app, Role::Acceptor, dynamic_sessions, heart_bt_int(settings)?));
        for session_id in settings.session_ids()? {
            hub.register(&session_id)?;
        }
        Ok(Acceptor {
            hub,
            port,
            local_addr: Mutex::new(None),
        })
    }

    /// Bind the listener and start accepting connections.
    pub fn start(&self) -> Result<()> {
        let listener = TcpListener::bind(addr("0.0.0.0", self.port))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        *self.local_addr.lock()? = Some(local_addr);
        info!("Acceptor listening on {}", local_addr);

        let hub = Arc::clone(&self.hub);
        let stop = self.hub.stop.subscribe();
        thread::spawn(move || {
            loop {
                select! {
                    recv(stop) -> _ => break,
                    default(ACCEPT_POLL) => loop {
                        match listener.accept() {
                            Ok((stream, peer)) => {
                                debug!("Accepted connection from {}", peer);
                                if let Err(e) = stream.set_nonblocking(false) {
                                    error!("Failed to configure connection from {}: {}", peer, e);
                                    continue;
                                }
                                let hub = Arc::clone(&hub);
                                thread::spawn(move || hub.serve(stream, None));
                            }
                            Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                            Err(e) => {
                                error!("TCP connection error: {}", e);
                                break;
                            }
                        }
                    },
                }
            }
            info!("Acceptor accept loop stopping...");
        });
        self.hub.spawn_heartbeats();
        Ok(())
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.lock().ok().and_then(|addr| *addr)
    }

    /// Engine handle for background tasks.
    pub fn engine(&self) -> Arc<SessionHub> {
        Arc::clone(&self.hub)
    }

    /// Log out all sessions and stop accepting.
    pub fn stop(&self) {
        self.hub.stop();
    }
}

/// Initiating side of the stand-in engine.
pub struct Initiator {
    hub: Arc<SessionHub>,
    targets: Vec<(SessionId, String)>,
}

impl Initiator {
    /// Build an initiator from settings. Every session needs
    /// `SocketConnectPort`; `SocketConnectHost` defaults to `127.0.0.1`.
    pub fn new(app: Arc<dyn Application>, settings: &Settings) -> Result<Self> {
        let hub = Arc::new(SessionHub::new(app, Role::Initiator, false, heart_bt_int(settings)?));
        let session_ids = settings.session_ids()?;
        if session_ids.is_empty() {
            return Err(SessionError::Config(String::from("no sessions declared")));
        }

        let mut targets = Vec::with_capacity(session_ids.len());
        for (session_id, session) in session_ids.into_iter().zip(settings.session_settings()) {
            let host = if session.has_setting("SocketConnectHost") {
                session.setting("SocketConnectHost")?
            } else {
                "127.0.0.1"
            };
            let port = session.int_setting("SocketConnectPort")?;
            let port = u16::try_from(port)
                .map_err(|_| SessionError::Config(format!("invalid SocketConnectPort: {}", port)))?;
            hub.register(&session_id)?;
            targets.push((session_id, addr(host, port)));
        }
        Ok(Initiator { hub, targets })
    }

    /// Connect every session and send its logon. Connection failures are
    /// logged; the session simply never logs on.
    pub fn start(&self) -> Result<()> {
        for (session_id, target) in &self.targets {
            let hub = Arc::clone(&self.hub);
            let session_id = session_id.clone();
            let target = target.clone();
            thread::spawn(move || {
                info!("Connecting {} to {}", session_id, target);
                let stream = match TcpStream::connect(&target) {
                    Ok(stream) => stream,
                    Err(e) => {
                        error!("Failed to connect {} to {}: {}", session_id, target, e);
                        return;
                    }
                };
                let attached = stream
                    .try_clone()
                    .map_err(SessionError::Io)
                    .and_then(|clone| hub.attach(&session_id, clone))
                    .and_then(|_| hub.write(hub.logon_message(), &session_id, false));
                if let Err(e) = attached {
                    error!("Failed to send logon for {}: {}", session_id, e);
                    hub.disconnect(&session_id);
                    return;
                }
                hub.serve(stream, Some(session_id));
            });
        }
        self.hub.spawn_heartbeats();
        Ok(())
    }

    /// Sessions declared in the settings, in file order.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.targets.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Engine handle for the dispatcher and background tasks.
    pub fn engine(&self) -> Arc<SessionHub> {
        Arc::clone(&self.hub)
    }

    /// Log out and close every connection.
    pub fn stop(&self) {
        self.hub.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageReject;

    struct Quiet;

    impl Application for Quiet {
        fn from_app(
            &self,
            _msg: &Message,
            _session_id: &SessionId,
            _engine: &dyn SessionEngine,
        ) -> Result<(), MessageReject> {
            Ok(())
        }
    }

    #[test]
    fn peer_that_never_reads_does_not_block_the_hub() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (server_side, _) = listener.accept().unwrap();

        let hub = Arc::new(SessionHub::new(Arc::new(Quiet), Role::Acceptor, false, 30));
        let id = SessionId::new("FIX.4.4", "ACCEPTOR", "STALLED");
        hub.register(&id).unwrap();
        hub.attach(&id, server_side).unwrap();
        hub.mark_logged_on(&id).unwrap();

        let (done_tx, done_rx) = bounded(1);
        let flooder = Arc::clone(&hub);
        let flood_id = id.clone();
        thread::spawn(move || {
            let padding = "x".repeat(4096);
            let sent = (0..2000)
                .map(|_| {
                    let heartbeat = Heartbeat { test_req_id: Some(padding.clone()) };
                    flooder.send_to_session(Message::new(Body::Heartbeat(heartbeat)), &flood_id)
                })
                .filter(|result| result.is_ok())
                .count();
            let _ = done_tx.send(sent);
        });

        assert_eq!(done_rx.recv_timeout(Duration::from_secs(10)), Ok(2000));
        assert_eq!(hub.alive_session_ids(), vec![id.clone()]);
        assert!(hub.is_logged_on(&id));
        drop(client);
    }

    #[test]
    fn send_without_connection_fails() {
        let hub = SessionHub::new(Arc::new(Quiet), Role::Initiator, false, 30);
        let id = SessionId::new("FIX.4.4", "INIT1", "ACCEPTOR");
        hub.register(&id).unwrap();
        hub.mark_logged_on(&id).unwrap();

        let heartbeat = Message::new(Body::Heartbeat(Heartbeat::default()));
        assert!(matches!(hub.send_to_session(heartbeat, &id), Err(SessionError::Send(_))));
    }
}
