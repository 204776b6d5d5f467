//! Domain models of the quote publisher.
//!
//! - `ids`: per-kind identifier counters for orders, executions and quotes.
//! - `snapshot`: the fixed-value `Quote` payload sent to counterparties.
//! - `health`: per-destination delivery failure counts.
//! - `broadcaster`: the periodic quote broadcast loop.

pub mod broadcaster;
pub mod health;
pub mod ids;
pub mod snapshot;
