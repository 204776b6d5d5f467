//! Quote subscriber (initiator side).
//!
//! Connects to the quote publisher, records received quotes to a CSV audit
//! file and lets an operator send quote requests from a small menu.
//!
//! Usage example (CLI):
//! ```bash
//! quote_subscriber config/subscriber.cfg
//! ```
//!
//! Boot sequence:
//! - open the audit file (when `LoggingPrice=Y`) and start the initiator;
//! - wait for the first session to log on (in debug mode, a bounded
//!   pre-wait first);
//! - optionally ask for a resend (`BeginResendIndexOnBoot` and
//!   `EndResendIndexOnBoot`), then send the boot quote request;
//! - run the operator menu until quit, end of input or Ctrl+C.
#![warn(missing_docs)]
mod args;
mod dispatcher;
mod menu;
mod model;
mod subscriber;

use crate::args::Args;
use crate::dispatcher::QuoteRequestDispatcher;
use crate::menu::{Menu, spawn_stdin_reader};
use crate::model::audit::AuditLogger;
use crate::model::quote_request::{BOOT_ACCOUNT, BOOT_QUOTE_REQ_ID, BOOT_SYMBOL, QuoteRequestSpec};
use crate::subscriber::{DebugDelays, Subscriber};
use clap::Parser;
use crossbeam_channel::{Receiver, after, select};
use log::{error, info};
use quote_common::settings::Settings;
use quote_common::shutdown::interrupt_channel;
use quote_common::transport::Initiator;
use quote_common::{Result, SessionEngine, SessionError};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Bound on the debug-mode pre-wait for logon.
const DEBUG_LOGON_WAIT: Duration = Duration::from_secs(5);
/// Pause between logon and the first request.
const SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Boot options read from the global settings section.
#[derive(Debug, Clone, PartialEq, Eq)]
struct BootOptions {
    debug: bool,
    resend: Option<(u64, u64)>,
}

impl BootOptions {
    fn from_settings(settings: &Settings) -> Result<Self> {
        let global = settings.global_settings();
        let debug = global.has_setting("Debug") && global.bool_setting("Debug").unwrap_or(false);

        let mut resend = None;
        if global.has_setting("BeginResendIndexOnBoot") && global.has_setting("EndResendIndexOnBoot") {
            let begin = global.int_setting("BeginResendIndexOnBoot")?;
            let end = global.int_setting("EndResendIndexOnBoot")?;
            if let (Ok(begin), Ok(end)) = (u64::try_from(begin), u64::try_from(end)) {
                resend = Some((begin, end));
            }
        }
        Ok(BootOptions { debug, resend })
    }
}

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
    let options = BootOptions::from_settings(&settings)?;

    let app = Arc::new(Subscriber::new(
        AuditLogger::from_settings(&settings),
        options.debug,
        DebugDelays::default(),
    ));
    let initiator = Initiator::new(app.clone(), &settings)?;
    app.open_audit()?;

    let interrupt = interrupt_channel()?;
    initiator.start()?;
    let result = session(&initiator, &settings, &options, &interrupt);

    info!("Call stop.");
    initiator.stop();
    info!("Called stop.");
    if let Err(e) = app.close_audit() {
        error!("Error closing audit file: {}", e);
    }
    result
}

fn session(
    initiator: &Initiator,
    settings: &Settings,
    options: &BootOptions,
    interrupt: &Receiver<()>,
) -> Result<()> {
    let session_id = initiator
        .session_ids()
        .into_iter()
        .next()
        .ok_or_else(|| SessionError::Config(String::from("no sessions declared")))?;
    let engine: Arc<dyn SessionEngine> = initiator.engine();

    if options.debug {
        info!("Wait1 start");
        let logon = engine.wait_for_logon(&session_id);
        let timeout = after(DEBUG_LOGON_WAIT);
        select! {
            recv(logon) -> _ => info!("Wait1 finish"),
            recv(timeout) -> _ => info!("Wait1 timeout"),
            recv(interrupt) -> _ => return Ok(()),
        }
    }
    info!("Wait start");
    let logon = engine.wait_for_logon(&session_id);
    select! {
        recv(logon) -> _ => {
            info!("Wait finish");
            thread::sleep(SETTLE_DELAY);
        },
        recv(interrupt) -> _ => return Ok(()),
    }

    let dispatcher = QuoteRequestDispatcher::new(engine, session_id);
    if let Some((begin, end)) = options.resend {
        dispatcher.request_range(begin, end)?;
    }
    dispatcher.request(BOOT_QUOTE_REQ_ID, BOOT_SYMBOL, BOOT_ACCOUNT)?;

    let specs = QuoteRequestSpec::from_settings(settings);
    let input = spawn_stdin_reader();
    Menu::new(&specs).run(&dispatcher, &input, interrupt, &mut io::stdout())
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
