//! Result type alias shared across the workspace.
//!
//! Functions can simply return `Result<T>`; the error type defaults to the
//! common `SessionError`.
use crate::error::SessionError;

/// Workspace-wide `Result` alias with `SessionError` as the default error.
pub type Result<T, E = SessionError> = std::result::Result<T, E>;
