//! Outbound quote payloads.
//!
//! A `MarketSnapshot` is built fresh for every send and turned into a `Quote`
//! body. Prices and sizes are fixed reference values; the publisher does not
//! run a pricing model.

use chrono::Utc;
use quote_common::message::Quote;
use rust_decimal::Decimal;

/// Currency stamped on every snapshot.
pub const CURRENCY: &str = "BTC";
/// Reference bid price.
pub const BID_PX: i64 = 120;
/// Reference offer price.
pub const OFFER_PX: i64 = 100;
/// Reference bid size.
pub const BID_SIZE: i64 = 120;
/// Reference offer size.
pub const OFFER_SIZE: i64 = 100;

/// Parameters of one outbound quote.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    quote_id: String,
    quote_req_id: String,
    symbol: String,
    account: Option<String>,
}

impl MarketSnapshot {
    /// Snapshot answering `quote_req_id` for `symbol`.
    pub fn new(quote_id: &str, quote_req_id: &str, symbol: &str) -> Self {
        MarketSnapshot {
            quote_id: String::from(quote_id),
            quote_req_id: String::from(quote_req_id),
            symbol: String::from(symbol),
            account: None,
        }
    }

    /// Tag the snapshot with an account.
    pub fn with_account(mut self, account: Option<String>) -> Self {
        self.account = account;
        self
    }

    /// Build the `Quote` body, timestamped now.
    pub fn build(self) -> Quote {
        Quote {
            quote_id: self.quote_id,
            quote_req_id: Some(self.quote_req_id),
            symbol: Some(self.symbol),
            currency: Some(String::from(CURRENCY)),
            account: self.account,
            transact_time: Some(Utc::now()),
            bid_px: Some(Decimal::from(BID_PX)),
            offer_px: Some(Decimal::from(OFFER_PX)),
            bid_size: Some(Decimal::from(BID_SIZE)),
            offer_size: Some(Decimal::from(OFFER_SIZE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_fills_reference_values() {
        let quote = MarketSnapshot::new("7", "CG001", "BTC/JPY")
            .with_account(Some(String::from("BTC-1-00000000")))
            .build();
        assert_eq!(quote.quote_id, "7");
        assert_eq!(quote.quote_req_id.as_deref(), Some("CG001"));
        assert_eq!(quote.symbol().unwrap(), "BTC/JPY");
        assert_eq!(quote.currency.as_deref(), Some("BTC"));
        assert_eq!(quote.bid_px().unwrap(), Decimal::from(120));
        assert_eq!(quote.offer_px().unwrap(), Decimal::from(100));
        assert_eq!(quote.account.as_deref(), Some("BTC-1-00000000"));
        assert!(quote.transact_time.is_some());
    }
}
