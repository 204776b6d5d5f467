//! Error types shared between the publisher and the subscriber.
//!
//! The `SessionError` enum unifies the failure cases of both endpoints:
//! configuration problems found at startup, delivery failures reported by
//! the session engine, message construction faults, and audit-file I/O.
//! Protocol validation failures are not errors of this kind; they travel as
//! [`crate::message::MessageReject`] values back to the counterparty.
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type shared by both endpoints.
#[derive(Error, Debug)]
pub enum SessionError {
    /// I/O error originating from sockets or files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Missing or malformed setting in the session configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Failure while writing CSV rows.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The engine does not know the addressed session.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// The addressed session exists but is not logged on.
    #[error("Session not logged on: {0}")]
    NotLoggedOn(String),

    /// The engine accepted the message but could not deliver it.
    #[error("Send failed: {0}")]
    Send(String),

    /// An outbound message could not be built from the supplied values.
    #[error("Message construction failed: {0}")]
    Construction(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl<T> From<PoisonError<T>> for SessionError {
    fn from(err: PoisonError<T>) -> Self {
        SessionError::MutexLock(err.to_string())
    }
}
