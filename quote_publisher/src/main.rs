//! Quote publisher (acceptor side).
//!
//! This binary accepts counterparty sessions and serves them quotes. It wires
//! together three building blocks:
//!
//! - `Publisher`: the application callbacks. Limit orders are answered with a
//!   full fill, quote requests with a quote snapshot.
//! - `QuoteBroadcaster`: a background thread pushing an unsolicited snapshot
//!   to every known session each cycle, skipping sessions that keep failing.
//! - Logon-wait tasks: one thread per configured session that logs when the
//!   session logs on (not used with `DynamicSessions=Y`).
//!
//! Concurrency and shutdown:
//! - All background threads `select!` on one shutdown receiver; Ctrl+C or
//!   SIGTERM triggers it, then the acceptor logs every session out.
//! - Configuration problems are fatal at startup; per-message and delivery
//!   errors are logged and never stop the process.
#![warn(missing_docs)]
use crate::args::Args;
use crate::model::broadcaster::{BroadcastConfig, QuoteBroadcaster};
use crate::model::ids::SharedIds;
use crate::publisher::Publisher;
use clap::Parser;
use crossbeam_channel::{Receiver, select};
use log::{error, info};
use quote_common::settings::Settings;
use quote_common::shutdown::{Shutdown, interrupt_channel};
use quote_common::transport::Acceptor;
use quote_common::{Result, SessionEngine, SessionError, SessionId};
use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

mod args;
pub mod model;
mod publisher;

fn main() -> Result<(), SessionError> {
    init_logger();
    let args = Args::parse();
    if let Err(e) = run(&args) {
        error!("{}", e);
        return Err(e);
    }
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let settings = Settings::from_file(Path::new(&args.config))?;
    let dynamic_sessions = check_settings(&settings)?;
    let broadcast_config = BroadcastConfig::from_settings(&settings)?;

    let interrupt = interrupt_channel()?;
    let shutdown = Shutdown::new();

    let ids = SharedIds::new();
    let acceptor = Acceptor::new(Arc::new(Publisher::new(ids.clone())), &settings)?;
    acceptor.start()?;
    let engine: Arc<dyn SessionEngine> = acceptor.engine();

    let mut tasks = Vec::new();
    if !dynamic_sessions {
        for session_id in engine.session_ids() {
            tasks.push(spawn_logon_wait(Arc::clone(&engine), session_id, shutdown.subscribe()));
        }
    }
    tasks.push(QuoteBroadcaster::new(Arc::clone(&engine), broadcast_config, ids).start(shutdown.subscribe()));

    let _ = interrupt.recv();
    shutdown.trigger();
    for task in tasks {
        if task.join().is_err() {
            error!("Background task panicked");
        }
    }
    acceptor.stop();
    info!("Quote publisher stopped");
    Ok(())
}

/// Fatal startup checks. Returns whether dynamic sessions are enabled.
fn check_settings(settings: &Settings) -> Result<bool> {
    let global = settings.global_settings();
    if !global.has_setting("BeginString") {
        return Err(SessionError::Config(String::from("BeginString is required")));
    }
    let dynamic_sessions = global.has_setting("DynamicSessions") && global.bool_setting("DynamicSessions")?;
    let sessions = settings.session_settings();
    let has_sender = global.has_setting("SenderCompID")
        || (!sessions.is_empty() && sessions.iter().all(|s| s.has_setting("SenderCompID")));
    if !dynamic_sessions && !has_sender {
        return Err(SessionError::Config(String::from(
            "SenderCompID is required unless DynamicSessions=Y",
        )));
    }
    Ok(dynamic_sessions)
}

/// Log when `session_id` logs on, or give up on shutdown.
fn spawn_logon_wait(
    engine: Arc<dyn SessionEngine>,
    session_id: SessionId,
    shutdown: Receiver<()>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        info!("Waiting for logon: {}", session_id);
        let logon = engine.wait_for_logon(&session_id);
        select! {
            recv(logon) -> _ => info!("Logon: {}", session_id),
            recv(shutdown) -> _ => info!("Interrupted while waiting for logon: {}", session_id),
        }
    })
}

fn init_logger() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote_common::settings::SettingsParser;
    use std::io::Cursor;

    fn parse(text: &str) -> Settings {
        Settings::parse_from_reader(Cursor::new(text)).unwrap()
    }

    #[test]
    fn begin_string_is_required() {
        let settings = parse("[DEFAULT]\nSenderCompID=ACCEPTOR\n");
        assert!(matches!(check_settings(&settings), Err(SessionError::Config(_))));
    }

    #[test]
    fn sender_comp_id_is_required_unless_dynamic() {
        let settings = parse("[DEFAULT]\nBeginString=FIX.4.4\n");
        assert!(check_settings(&settings).is_err());

        let settings = parse("[DEFAULT]\nBeginString=FIX.4.4\nDynamicSessions=Y\n");
        assert!(check_settings(&settings).unwrap());
    }
}
