//!
//! Common types and utilities shared by the quote publisher and subscriber.
//!
//! This crate aggregates:
//! - `error`: unified error type `SessionError` used across the workspace.
//! - `result`: handy `Result<T, SessionError>` alias.
//! - `session`: `SessionId`, the identity of one counterparty connection.
//! - `message`: the closed set of protocol messages and reject values.
//! - `engine`: the `SessionEngine` / `Application` contract.
//! - `router`: message-kind keyed routing table for inbound messages.
//! - `settings`: session settings file parser.
//! - `transport`: TCP stand-in engine (`Acceptor`, `Initiator`).
//! - `memory`: in-process engine used by tests.
//! - `shutdown`: process-wide shutdown signal.
//! - `net`: networking constants and small helpers.
#![warn(missing_docs)]
pub mod engine;
pub mod error;
pub mod memory;
pub mod message;
pub mod net;
pub mod result;
pub mod router;
pub mod session;
pub mod settings;
pub mod shutdown;
pub mod transport;

pub use engine::{Application, SessionEngine};
pub use error::SessionError;
pub use result::Result;
pub use session::SessionId;
