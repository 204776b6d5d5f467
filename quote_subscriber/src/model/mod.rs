//! Data model of the quote subscriber.
//!
//! - `audit`: CSV audit trail of received quotes.
//! - `quote_request`: quote requests offered by the operator menu.
pub mod audit;
pub mod quote_request;
