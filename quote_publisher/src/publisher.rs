//! Acceptor-side application callbacks.
//!
//! Inbound application messages go through a [`MessageRouter`]:
//! - `NewOrderSingle`: answered with a full fill (`on_new_order_single`);
//! - `QuoteRequest`: answered with a quote snapshot (`on_quote_request`).
//!
//! Any other kind is rejected by the router. Replies go back to the
//! originating session only while it is logged on; delivery failures are
//! logged and never turned into rejects.
use crate::model::ids::{IdKind, SharedIds};
use crate::model::snapshot::MarketSnapshot;
use log::{debug, error, info, warn};
use quote_common::message::{
    Body, ExecType, ExecutionReport, Message, MessageReject, MsgType, NewOrderSingle, OrdStatus,
    OrdType, QuoteRequest, tag,
};
use quote_common::router::MessageRouter;
use quote_common::{Application, SessionEngine, SessionId};
use rust_decimal::Decimal;

/// Quote publisher and order filler.
pub struct Publisher {
    ids: SharedIds,
    router: MessageRouter<Publisher>,
}

impl Publisher {
    /// Create the application with its routing table. `ids` is shared with
    /// the quote broadcaster.
    pub fn new(ids: SharedIds) -> Self {
        let mut router = MessageRouter::new();
        router.add_route(Publisher::on_new_order_single);
        router.add_route(Publisher::on_quote_request);
        Publisher { ids, router }
    }

    /// Fill a limit order in full and report it back.
    pub fn on_new_order_single(
        &self,
        order: &NewOrderSingle,
        session_id: &SessionId,
        engine: &dyn SessionEngine,
    ) -> Result<(), MessageReject> {
        if order.ord_type()? != OrdType::Limit {
            return Err(MessageReject::value_is_incorrect(tag::ORD_TYPE));
        }
        let symbol = order.symbol()?;
        let side = order.side()?;
        let order_qty = order.order_qty()?;
        let price = order.price()?;
        let cl_ord_id = order.cl_ord_id()?;

        let (order_id, exec_id) = {
            let mut ids = self.ids.lock();
            (ids.next(IdKind::Order), ids.next(IdKind::Execution))
        };
        let report = ExecutionReport {
            order_id,
            exec_id,
            exec_type: ExecType::Fill,
            ord_status: OrdStatus::Filled,
            side,
            leaves_qty: Decimal::ZERO,
            cum_qty: order_qty,
            avg_px: price,
            cl_ord_id: Some(cl_ord_id),
            symbol: Some(symbol),
            account: order.account.clone(),
            order_qty: Some(order_qty),
            last_qty: Some(order_qty),
            last_px: Some(price),
        };

        let msg = Message::new(Body::ExecutionReport(report));
        if let Err(e) = engine.send_to_alive_session(msg, session_id) {
            error!("Error SendToAliveSession, {}", e);
        }
        Ok(())
    }

    /// Answer a quote request with a reference snapshot.
    pub fn on_quote_request(
        &self,
        request: &QuoteRequest,
        session_id: &SessionId,
        engine: &dyn SessionEngine,
    ) -> Result<(), MessageReject> {
        let quote_req_id = request.quote_req_id()?;
        let symbol = request.symbol()?;

        let quote_id = self.ids.next(IdKind::Quote);
        let quote = MarketSnapshot::new(&quote_id, &quote_req_id, &symbol)
            .with_account(request.account())
            .build();

        let msg = Message::new(Body::Quote(quote));
        if let Err(e) = engine.send_to_alive_session(msg, session_id) {
            error!("Error SendToAliveSession, {}", e);
        }
        Ok(())
    }
}

impl Application for Publisher {
    fn on_create(&self, session_id: &SessionId) {
        info!("OnCreate: {}", session_id);
    }

    fn on_logon(&self, session_id: &SessionId) {
        info!("OnLogon: {}", session_id);
    }

    fn on_logout(&self, session_id: &SessionId) {
        info!("OnLogout: {}", session_id);
    }

    fn from_admin(
        &self,
        msg: &Message,
        _session_id: &SessionId,
        _engine: &dyn SessionEngine,
    ) -> Result<(), MessageReject> {
        match msg.msg_type() {
            MsgType::Logon => info!("Recv Logon: {:?}", msg),
            MsgType::Logout => info!("Recv Logout: {:?}", msg),
            MsgType::Reject => warn!("Recv Reject: {:?}", msg),
            MsgType::Heartbeat => debug!("Recv heartbeat."),
            _ => info!("Recv: {:?}", msg),
        }
        Ok(())
    }

    fn from_app(
        &self,
        msg: &Message,
        session_id: &SessionId,
        engine: &dyn SessionEngine,
    ) -> Result<(), MessageReject> {
        self.router.route(self, msg, session_id, engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::broadcaster::{BroadcastConfig, QuoteBroadcaster};
    use quote_common::memory::MemoryEngine;
    use std::sync::Arc;
    use quote_common::message::{Quote, RelatedSym, RejectReason, Side};

    fn logged_on() -> (MemoryEngine, SessionId) {
        let engine = MemoryEngine::new();
        let id = SessionId::new("FIX.4.4", "ACCEPTOR", "INIT1");
        engine.set_logged_on(&id, true);
        (engine, id)
    }

    fn limit_order(qty: i64, price: i64) -> NewOrderSingle {
        NewOrderSingle {
            cl_ord_id: Some(String::from("C-1")),
            account: None,
            symbol: Some(String::from("BTC/JPY")),
            side: Some(Side::Buy),
            order_qty: Some(Decimal::from(qty)),
            ord_type: Some(OrdType::Limit),
            price: Some(Decimal::from(price)),
        }
    }

    fn reports(engine: &MemoryEngine) -> Vec<ExecutionReport> {
        engine
            .sent()
            .into_iter()
            .filter_map(|(_, msg)| match msg.body {
                Body::ExecutionReport(report) => Some(report),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn limit_order_is_filled_in_full() {
        let (engine, id) = logged_on();
        let publisher = Publisher::new(SharedIds::new());
        let msg = Message::new(Body::NewOrderSingle(limit_order(5, 250)));

        publisher.from_app(&msg, &id, &engine).unwrap();

        let reports = reports(&engine);
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.exec_type, ExecType::Fill);
        assert_eq!(report.ord_status, OrdStatus::Filled);
        assert_eq!(report.cum_qty, Decimal::from(5));
        assert_eq!(report.leaves_qty, Decimal::ZERO);
        assert_eq!(report.last_qty, Some(Decimal::from(5)));
        assert_eq!(report.last_px, Some(Decimal::from(250)));
        assert_eq!(report.avg_px, Decimal::from(250));
        assert_eq!(report.cl_ord_id.as_deref(), Some("C-1"));
        assert_eq!(report.order_id, "1");
        assert_eq!(report.exec_id, "1");
        assert_eq!(report.account, None);
    }

    #[test]
    fn non_limit_order_is_rejected_without_side_effects() {
        let (engine, id) = logged_on();
        let publisher = Publisher::new(SharedIds::new());
        let mut order = limit_order(5, 250);
        order.ord_type = Some(OrdType::Market);

        let reject = publisher
            .from_app(&Message::new(Body::NewOrderSingle(order)), &id, &engine)
            .unwrap_err();
        assert_eq!(reject.reason, RejectReason::ValueIsIncorrect);
        assert_eq!(reject.ref_tag_id, Some(tag::ORD_TYPE));
        assert!(engine.sent().is_empty());

        // No identifiers were consumed by the rejected order.
        let msg = Message::new(Body::NewOrderSingle(limit_order(1, 1)));
        publisher.from_app(&msg, &id, &engine).unwrap();
        assert_eq!(reports(&engine)[0].order_id, "1");
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let (engine, id) = logged_on();
        let publisher = Publisher::new(SharedIds::new());
        let mut order = limit_order(5, 250);
        order.price = None;

        let reject = publisher
            .from_app(&Message::new(Body::NewOrderSingle(order)), &id, &engine)
            .unwrap_err();
        assert_eq!(reject, MessageReject::required_tag_missing(tag::PRICE));
        assert!(engine.sent().is_empty());
    }

    #[test]
    fn account_is_echoed_and_ids_increase() {
        let (engine, id) = logged_on();
        let publisher = Publisher::new(SharedIds::new());
        let mut order = limit_order(2, 10);
        order.account = Some(String::from("ACC-9"));
        let msg = Message::new(Body::NewOrderSingle(order));
        publisher.from_app(&msg, &id, &engine).unwrap();
        publisher.from_app(&msg, &id, &engine).unwrap();

        let reports = reports(&engine);
        assert_eq!(reports[0].account.as_deref(), Some("ACC-9"));
        assert_eq!(reports[1].order_id, "2");
        assert_eq!(reports[1].exec_id, "2");
    }

    #[test]
    fn report_to_offline_session_is_dropped_quietly() {
        let engine = MemoryEngine::new();
        let id = SessionId::new("FIX.4.4", "ACCEPTOR", "INIT1");
        engine.add_session(&id);
        let publisher = Publisher::new(SharedIds::new());

        let msg = Message::new(Body::NewOrderSingle(limit_order(1, 1)));
        assert!(publisher.from_app(&msg, &id, &engine).is_ok());
        assert!(engine.sent().is_empty());
    }

    #[test]
    fn quote_request_is_answered() {
        let (engine, id) = logged_on();
        let publisher = Publisher::new(SharedIds::new());
        let request = QuoteRequest {
            quote_req_id: Some(String::from("CG001")),
            related_sym: vec![RelatedSym {
                symbol: Some(String::from("ETH/JPY")),
                account: Some(String::from("BTC-1-00000000")),
                order_qty: Some(Decimal::ZERO),
            }],
        };

        publisher
            .from_app(&Message::new(Body::QuoteRequest(request)), &id, &engine)
            .unwrap();

        let sent = engine.sent();
        assert_eq!(sent.len(), 1);
        let quote: &Quote = match &sent[0].1.body {
            Body::Quote(quote) => quote,
            other => panic!("expected quote, got {:?}", other),
        };
        assert_eq!(quote.quote_req_id.as_deref(), Some("CG001"));
        assert_eq!(quote.symbol.as_deref(), Some("ETH/JPY"));
        assert_eq!(quote.account.as_deref(), Some("BTC-1-00000000"));
    }

    #[test]
    fn broadcast_and_reply_never_share_a_quote_id() {
        let engine = Arc::new(MemoryEngine::new());
        let id = SessionId::new("FIX.4.4", "ACCEPTOR", "INIT1");
        engine.set_logged_on(&id, true);
        let ids = SharedIds::new();
        let mut broadcaster =
            QuoteBroadcaster::new(engine.clone(), BroadcastConfig::new("FIX.4.4"), ids.clone());
        let publisher = Publisher::new(ids);

        broadcaster.run_cycle();
        let request = QuoteRequest {
            quote_req_id: Some(String::from("CG001")),
            related_sym: vec![RelatedSym {
                symbol: Some(String::from("BTC/JPY")),
                ..RelatedSym::default()
            }],
        };
        publisher
            .from_app(&Message::new(Body::QuoteRequest(request)), &id, engine.as_ref())
            .unwrap();

        let quote_ids: Vec<String> = engine
            .sent()
            .into_iter()
            .filter_map(|(_, msg)| match msg.body {
                Body::Quote(quote) => Some(quote.quote_id),
                _ => None,
            })
            .collect();
        assert_eq!(quote_ids, vec!["1", "2"]);
    }

    #[test]
    fn unrouted_kind_is_rejected() {
        let (engine, id) = logged_on();
        let publisher = Publisher::new(SharedIds::new());
        let msg = Message::new(Body::Quote(Quote::default()));
        assert_eq!(
            publisher.from_app(&msg, &id, &engine).unwrap_err().reason,
            RejectReason::UnsupportedMessageType
        );
    }
}
