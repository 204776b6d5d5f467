//! Interactive operator menu.
//!
//! Lines typed by the operator arrive on a channel fed by a stdin reader
//! thread, so the menu can `select!` between input and the interrupt signal.
use crate::dispatcher::QuoteRequestDispatcher;
use crate::model::quote_request::QuoteRequestSpec;
use crossbeam_channel::{Receiver, select, unbounded};
use log::debug;
use quote_common::Result;
use std::io::{self, BufRead, Write};
use std::thread;

/// Menu entry that leaves the loop.
pub const QUIT: &str = "9";

/// Read stdin line by line on a background thread. The channel disconnects
/// on EOF or a read error.
pub fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!("Scan error: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Operator menu over the configured quote requests.
pub struct Menu<'a> {
    specs: &'a [QuoteRequestSpec],
}

impl<'a> Menu<'a> {
    /// Menu offering `specs`.
    pub fn new(specs: &'a [QuoteRequestSpec]) -> Self {
        Menu { specs }
    }

    /// Show the menu and serve actions until quit, end of input or
    /// interrupt. Dispatch errors are printed and the loop continues; only
    /// failures to write to `out` are returned.
    pub fn run<W: Write>(
        &self,
        dispatcher: &QuoteRequestDispatcher,
        input: &Receiver<String>,
        interrupt: &Receiver<()>,
        out: &mut W,
    ) -> Result<()> {
        loop {
            self.show(out)?;
            let action = select! {
                recv(input) -> line => match line {
                    Ok(line) => line,
                    Err(_) => break,
                },
                recv(interrupt) -> _ => {
                    writeln!(out, "recv interrupt")?;
                    return Ok(());
                },
            };
            let action = action.trim();
            if action == QUIT {
                break;
            }
            if let Err(e) = self.dispatch(dispatcher, action) {
                writeln!(out, "{}", e)?;
            }
        }
        writeln!(out, "end")?;
        Ok(())
    }

    fn show<W: Write>(&self, out: &mut W) -> Result<()> {
        writeln!(out)?;
        for spec in self.specs {
            writeln!(out, "{}) Quote Request({})", spec.index, spec.symbol)?;
        }
        writeln!(out, "{}) Quit", QUIT)?;
        write!(out, "Action > ")?;
        out.flush()?;
        Ok(())
    }

    fn dispatch(&self, dispatcher: &QuoteRequestDispatcher, action: &str) -> std::result::Result<(), String> {
        let spec = action
            .parse::<usize>()
            .ok()
            .and_then(|index| self.specs.iter().find(|spec| spec.index == index))
            .ok_or_else(|| format!("unknown action: '{}'", action))?;
        dispatcher
            .request(&spec.quote_req_id, &spec.symbol, &spec.account)
            .map_err(|e| e.to_string())
    }
}
