//! Outbound requests of the subscriber.
//!
//! `QuoteRequestDispatcher` is bound to one session and builds the two
//! messages the subscriber originates: quote requests and resend requests.
//! Both are delivered with `send_to_alive_session`; delivery errors are
//! returned to the caller unchanged.
use log::info;
use quote_common::message::{Body, Message, QuoteRequest, RelatedSym, ResendRequest};
use quote_common::{Result, SessionEngine, SessionError, SessionId};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Sends quote and resend requests to the bound session.
pub struct QuoteRequestDispatcher {
    engine: Arc<dyn SessionEngine>,
    session_id: SessionId,
}

impl QuoteRequestDispatcher {
    /// Dispatcher bound to `session_id`.
    pub fn new(engine: Arc<dyn SessionEngine>, session_id: SessionId) -> Self {
        QuoteRequestDispatcher { engine, session_id }
    }

    /// Session the requests go to.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Bind to another session.
    pub fn rebind(&mut self, session_id: SessionId) {
        self.session_id = session_id;
    }

    /// Send a quote request with a single related-symbol entry
    /// `{account, symbol, order_qty = 0}`.
    pub fn request(&self, quote_req_id: &str, symbol: &str, account: &str) -> Result<()> {
        let msg = self.quote_request(quote_req_id, symbol, account)?;
        info!("QuoteRequest {} for {} to {}", quote_req_id, symbol, self.session_id);
        self.engine.send_to_alive_session(msg, &self.session_id)
    }

    /// Ask the counterparty to resend a range of messages.
    ///
    /// Note the order: `BeginSeqNo` carries `end` and `EndSeqNo` carries `begin`.
    pub fn request_range(&self, begin: u64, end: u64) -> Result<()> {
        let msg = Message::addressed(
            &self.session_id,
            Body::ResendRequest(ResendRequest {
                begin_seq_no: end,
                end_seq_no: begin,
            }),
        );
        info!("ResendRequest {}..{} to {}", begin, end, self.session_id);
        self.engine.send_to_alive_session(msg, &self.session_id)
    }

    fn quote_request(&self, quote_req_id: &str, symbol: &str, account: &str) -> Result<Message> {
        if quote_req_id.is_empty() {
            return Err(SessionError::Construction(String::from("QuoteReqID must not be empty")));
        }
        if symbol.is_empty() {
            return Err(SessionError::Construction(String::from("Symbol must not be empty")));
        }
        let request = QuoteRequest {
            quote_req_id: Some(String::from(quote_req_id)),
            related_sym: vec![RelatedSym {
                symbol: Some(String::from(symbol)),
                account: Some(String::from(account)),
                order_qty: Some(Decimal::ZERO),
            }],
        };
        Ok(Message::addressed(&self.session_id, Body::QuoteRequest(request)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote_common::memory::MemoryEngine;

    fn fixture() -> (Arc<MemoryEngine>, QuoteRequestDispatcher) {
        let engine = Arc::new(MemoryEngine::new());
        let id = SessionId::new("FIX.4.4", "INIT1", "ACCEPTOR");
        engine.set_logged_on(&id, true);
        let dispatcher = QuoteRequestDispatcher::new(engine.clone(), id);
        (engine, dispatcher)
    }

    #[test]
    fn quote_request_carries_one_group_entry() {
        let (engine, dispatcher) = fixture();
        dispatcher.request("CG001", "BTC/JPY", "BTC-1-00000000").unwrap();

        let sent = engine.sent();
        assert_eq!(sent.len(), 1);
        let (to, msg) = &sent[0];
        assert_eq!(to, dispatcher.session_id());
        assert_eq!(msg.header.sender_comp_id, "INIT1");
        assert_eq!(msg.header.target_comp_id, "ACCEPTOR");
        match &msg.body {
            Body::QuoteRequest(request) => {
                assert_eq!(request.quote_req_id.as_deref(), Some("CG001"));
                assert_eq!(
                    request.related_sym,
                    vec![RelatedSym {
                        symbol: Some(String::from("BTC/JPY")),
                        account: Some(String::from("BTC-1-00000000")),
                        order_qty: Some(Decimal::ZERO),
                    }]
                );
            }
            other => panic!("expected quote request, got {:?}", other),
        }
    }

    #[test]
    fn empty_identifiers_are_construction_errors() {
        let (engine, dispatcher) = fixture();
        assert!(matches!(
            dispatcher.request("", "BTC/JPY", "A"),
            Err(SessionError::Construction(_))
        ));
        assert!(matches!(
            dispatcher.request("Q", "", "A"),
            Err(SessionError::Construction(_))
        ));
        assert!(engine.attempts().is_empty());
    }

    #[test]
    fn resend_request_swaps_bounds() {
        let (engine, dispatcher) = fixture();
        dispatcher.request_range(100, 50).unwrap();

        match &engine.sent()[0].1.body {
            Body::ResendRequest(request) => {
                assert_eq!(request.begin_seq_no, 50);
                assert_eq!(request.end_seq_no, 100);
            }
            other => panic!("expected resend request, got {:?}", other),
        }
    }

    #[test]
    fn delivery_errors_are_returned() {
        let (engine, mut dispatcher) = fixture();
        let offline = SessionId::new("FIX.4.4", "INIT2", "ACCEPTOR");
        engine.add_session(&offline);
        dispatcher.rebind(offline);

        assert!(matches!(
            dispatcher.request("CG001", "BTC/JPY", "A"),
            Err(SessionError::NotLoggedOn(_))
        ));
    }
}
