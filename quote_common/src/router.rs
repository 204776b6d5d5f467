//! Routing table for inbound application messages.
//!
//! Each message kind maps to exactly one handler. Handlers are plain
//! functions (usually methods of the application) receiving the typed body:
//!
//! ```ignore
//! let mut router = MessageRouter::new();
//! router.add_route(Publisher::on_new_order_single);
//! router.route(&publisher, &msg, &session_id, engine)?;
//! ```
use std::collections::HashMap;

use crate::engine::SessionEngine;
use crate::message::{
    Body, BusinessMessageReject, ExecutionReport, Message, MessageReject, MsgType,
    NewOrderSingle, Quote, QuoteRequest,
};
use crate::session::SessionId;

/// Application body that can be the target of a route.
pub trait Routable: Sized {
    /// Kind the route is registered under.
    const MSG_TYPE: MsgType;

    /// Borrow the typed body out of a message of this kind.
    fn extract(body: &Body) -> Option<&Self>;
}

macro_rules! routable {
    ($ty:ident) => {
        impl Routable for $ty {
            const MSG_TYPE: MsgType = MsgType::$ty;

            fn extract(body: &Body) -> Option<&Self> {
                match body {
                    Body::$ty(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

routable!(NewOrderSingle);
routable!(ExecutionReport);
routable!(QuoteRequest);
routable!(Quote);
routable!(BusinessMessageReject);

/// Handler signature for a typed route.
pub type Handler<A, M> = fn(&A, &M, &SessionId, &dyn SessionEngine) -> Result<(), MessageReject>;

type Route<A> =
    Box<dyn Fn(&A, &Message, &SessionId, &dyn SessionEngine) -> Result<(), MessageReject> + Send + Sync>;

/// Message-kind keyed dispatch table over an application of type `A`.
pub struct MessageRouter<A> {
    routes: HashMap<MsgType, Route<A>>,
}

impl<A: 'static> MessageRouter<A> {
    /// Empty table.
    pub fn new() -> Self {
        MessageRouter {
            routes: HashMap::new(),
        }
    }

    /// Bind `handler` to the kind of `M`, replacing any earlier binding.
    pub fn add_route<M: Routable + 'static>(&mut self, handler: Handler<A, M>) {
        self.routes.insert(
            M::MSG_TYPE,
            Box::new(
                move |app: &A,
                      msg: &Message,
                      session_id: &SessionId,
                      engine: &dyn SessionEngine| match M::extract(&msg.body) {
                    Some(body) => handler(app, body, session_id, engine),
                    None => Err(MessageReject::unsupported_message_type()),
                },
            ),
        );
    }

    /// Dispatch `msg` to its handler; unrouted kinds are rejected.
    pub fn route(
        &self,
        app: &A,
        msg: &Message,
        session_id: &SessionId,
        engine: &dyn SessionEngine,
    ) -> Result<(), MessageReject> {
        match self.routes.get(&msg.msg_type()) {
            Some(route) => route(app, msg, session_id, engine),
            None => Err(MessageReject::unsupported_message_type()),
        }
    }
}

impl<A: 'static> Default for MessageRouter<A> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryEngine;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counter {
        quotes: AtomicUsize,
    }

    impl Counter {
        fn on_quote(
            &self,
            _quote: &Quote,
            _session_id: &SessionId,
            _engine: &dyn SessionEngine,
        ) -> Result<(), MessageReject> {
            self.quotes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn routes_by_kind_and_rejects_unknown() {
        let mut router = MessageRouter::new();
        router.add_route(Counter::on_quote);
        let app = Counter::default();
        let engine = MemoryEngine::new();
        let id = SessionId::new("FIX.4.4", "A", "B");

        let quote = Message::new(Body::Quote(Quote::default()));
        router.route(&app, &quote, &id, &engine).unwrap();
        assert_eq!(app.quotes.load(Ordering::SeqCst), 1);

        let order = Message::new(Body::NewOrderSingle(NewOrderSingle::default()));
        assert_eq!(
            router.route(&app, &order, &id, &engine).unwrap_err(),
            MessageReject::unsupported_message_type()
        );
    }
}
