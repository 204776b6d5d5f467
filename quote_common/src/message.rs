//! Message model exchanged through the session engine.
//!
//! A `Message` is a header plus one `Body` variant. The set of variants is
//! closed: admin kinds (logon, heartbeat, resend request, ...) are handled by
//! the engine and observed by applications, application kinds (orders,
//! quotes, quote requests, execution reports) are routed to handlers by
//! [`MsgType`] through [`crate::router::MessageRouter`].
//!
//! Inbound fields that the protocol allows to be absent on the wire are
//! `Option`s. The typed getters turn an absent field into a
//! [`MessageReject`] naming the missing tag so handlers can use `?`.
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{Display, EnumString};

use crate::session::SessionId;

/// Protocol tag numbers referenced by rejects.
pub mod tag {
    /// Account (1).
    pub const ACCOUNT: u32 = 1;
    /// BeginSeqNo (7).
    pub const BEGIN_SEQ_NO: u32 = 7;
    /// ClOrdID (11).
    pub const CL_ORD_ID: u32 = 11;
    /// EndSeqNo (16).
    pub const END_SEQ_NO: u32 = 16;
    /// MsgType (35).
    pub const MSG_TYPE: u32 = 35;
    /// OrderQty (38).
    pub const ORDER_QTY: u32 = 38;
    /// OrdType (40).
    pub const ORD_TYPE: u32 = 40;
    /// Price (44).
    pub const PRICE: u32 = 44;
    /// Side (54).
    pub const SIDE: u32 = 54;
    /// Symbol (55).
    pub const SYMBOL: u32 = 55;
    /// QuoteReqID (131).
    pub const QUOTE_REQ_ID: u32 = 131;
    /// BidPx (132).
    pub const BID_PX: u32 = 132;
    /// OfferPx (133).
    pub const OFFER_PX: u32 = 133;
    /// BidSize (134).
    pub const BID_SIZE: u32 = 134;
}

/// Message kind with its protocol type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum MsgType {
    #[strum(serialize = "0")]
    /// Heartbeat.
    Heartbeat,
    #[strum(serialize = "2")]
    /// ResendRequest.
    ResendRequest,
    #[strum(serialize = "3")]
    /// Session-level Reject.
    Reject,
    #[strum(serialize = "4")]
    /// SequenceReset.
    SequenceReset,
    #[strum(serialize = "5")]
    /// Logout.
    Logout,
    #[strum(serialize = "A")]
    /// Logon.
    Logon,
    #[strum(serialize = "8")]
    /// ExecutionReport.
    ExecutionReport,
    #[strum(serialize = "D")]
    /// NewOrderSingle.
    NewOrderSingle,
    #[strum(serialize = "R")]
    /// QuoteRequest.
    QuoteRequest,
    #[strum(serialize = "S")]
    /// Quote.
    Quote,
    #[strum(serialize = "j")]
    /// BusinessMessageReject.
    BusinessMessageReject,
}

impl MsgType {
    /// Admin kinds are session-level traffic owned by the engine.
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            MsgType::Heartbeat
                | MsgType::ResendRequest
                | MsgType::Reject
                | MsgType::SequenceReset
                | MsgType::Logout
                | MsgType::Logon
        )
    }
}

/// Order type (tag 40).
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum OrdType {
    #[strum(serialize = "1")]
    Market,
    #[strum(serialize = "2")]
    Limit,
    #[strum(serialize = "3")]
    Stop,
    #[strum(serialize = "4")]
    StopLimit,
}

/// Order side (tag 54).
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum Side {
    #[strum(serialize = "1")]
    Buy,
    #[strum(serialize = "2")]
    Sell,
}

/// Execution type (tag 150).
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum ExecType {
    #[strum(serialize = "0")]
    New,
    #[strum(serialize = "F")]
    Fill,
    #[strum(serialize = "8")]
    Rejected,
}

/// Order status (tag 39).
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
pub enum OrdStatus {
    #[strum(serialize = "0")]
    New,
    #[strum(serialize = "1")]
    PartiallyFilled,
    #[strum(serialize = "2")]
    Filled,
    #[strum(serialize = "8")]
    Rejected,
}

/// Reason carried by a [`MessageReject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum RejectReason {
    /// A required field is absent.
    #[strum(to_string = "Required tag missing")]
    RequiredTagMissing,
    /// A field holds a value the handler does not accept.
    #[strum(to_string = "Value is incorrect (out of range) for this tag")]
    ValueIsIncorrect,
    /// No handler is registered for the message kind.
    #[strum(to_string = "Unsupported Message Type")]
    UnsupportedMessageType,
}

/// Per-message protocol rejection returned by inbound handlers.
///
/// The session continues after a reject; the engine reports it back to the
/// counterparty as a `Reject` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageReject {
    /// Why the message was rejected.
    pub reason: RejectReason,
    /// Offending tag, if any.
    pub ref_tag_id: Option<u32>,
}

impl MessageReject {
    /// Field `tag` holds an unacceptable value.
    pub fn value_is_incorrect(tag: u32) -> Self {
        MessageReject {
            reason: RejectReason::ValueIsIncorrect,
            ref_tag_id: Some(tag),
        }
    }

    /// Field `tag` is absent.
    pub fn required_tag_missing(tag: u32) -> Self {
        MessageReject {
            reason: RejectReason::RequiredTagMissing,
            ref_tag_id: Some(tag),
        }
    }

    /// No route exists for this message kind.
    pub fn unsupported_message_type() -> Self {
        MessageReject {
            reason: RejectReason::UnsupportedMessageType,
            ref_tag_id: Some(tag::MSG_TYPE),
        }
    }
}

impl fmt::Display for MessageReject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ref_tag_id {
            Some(tag) => write!(f, "{}, field={}", self.reason, tag),
            None => write!(f, "{}", self.reason),
        }
    }
}

impl std::error::Error for MessageReject {}

fn required<T: Clone>(value: &Option<T>, tag: u32) -> Result<T, MessageReject> {
    value
        .clone()
        .ok_or_else(|| MessageReject::required_tag_missing(tag))
}

/// Standard header. Sequence number and sending time are stamped by the
/// engine on the way out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Protocol version string.
    pub begin_string: String,
    /// Sender comp id.
    pub sender_comp_id: String,
    /// Target comp id.
    pub target_comp_id: String,
    /// Outbound sequence number assigned by the engine.
    pub msg_seq_num: u64,
    /// Time the engine wrote the message.
    pub sending_time: Option<DateTime<Utc>>,
}

impl Header {
    /// Header addressed from the local side of `session_id`.
    pub fn for_session(session_id: &SessionId) -> Self {
        Header {
            begin_string: session_id.begin_string.clone(),
            sender_comp_id: session_id.sender_comp_id.clone(),
            target_comp_id: session_id.target_comp_id.clone(),
            ..Header::default()
        }
    }

    /// The session as named by the writer of this header.
    pub fn session_id(&self) -> SessionId {
        SessionId::new(&self.begin_string, &self.sender_comp_id, &self.target_comp_id)
    }
}

/// Envelope sent through the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Routing header.
    pub header: Header,
    /// Message content.
    pub body: Body,
}

impl Message {
    /// Unaddressed message; the engine fills the header from the target session.
    pub fn new(body: Body) -> Self {
        Message {
            header: Header::default(),
            body,
        }
    }

    /// Message addressed from the local side of `session_id`.
    pub fn addressed(session_id: &SessionId, body: Body) -> Self {
        Message {
            header: Header::for_session(session_id),
            body,
        }
    }

    /// Kind of the body.
    pub fn msg_type(&self) -> MsgType {
        self.body.msg_type()
    }
}

/// All message kinds known to the endpoints.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg_type")]
pub enum Body {
    Heartbeat(Heartbeat),
    ResendRequest(ResendRequest),
    Reject(Reject),
    SequenceReset(SequenceReset),
    Logout(Logout),
    Logon(Logon),
    ExecutionReport(ExecutionReport),
    NewOrderSingle(NewOrderSingle),
    QuoteRequest(QuoteRequest),
    Quote(Quote),
    BusinessMessageReject(BusinessMessageReject),
}

impl Body {
    /// Protocol kind of this body.
    pub fn msg_type(&self) -> MsgType {
        match self {
            Body::Heartbeat(_) => MsgType::Heartbeat,
            Body::ResendRequest(_) => MsgType::ResendRequest,
            Body::Reject(_) => MsgType::Reject,
            Body::SequenceReset(_) => MsgType::SequenceReset,
            Body::Logout(_) => MsgType::Logout,
            Body::Logon(_) => MsgType::Logon,
            Body::ExecutionReport(_) => MsgType::ExecutionReport,
            Body::NewOrderSingle(_) => MsgType::NewOrderSingle,
            Body::QuoteRequest(_) => MsgType::QuoteRequest,
            Body::Quote(_) => MsgType::Quote,
            Body::BusinessMessageReject(_) => MsgType::BusinessMessageReject,
        }
    }
}

/// Heartbeat (0).
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Heartbeat {
    pub test_req_id: Option<String>,
}

/// ResendRequest (2): asks the counterparty to retransmit a sequence range.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResendRequest {
    pub begin_seq_no: u64,
    pub end_seq_no: u64,
}

/// Session-level Reject (3).
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reject {
    pub ref_seq_num: u64,
    pub ref_msg_type: Option<MsgType>,
    pub ref_tag_id: Option<u32>,
    pub reason: Option<RejectReason>,
    pub text: Option<String>,
}

/// SequenceReset (4).
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceReset {
    pub new_seq_no: u64,
    pub gap_fill: bool,
}

/// Logout (5).
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Logout {
    pub text: Option<String>,
}

/// Logon (A).
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logon {
    pub heart_bt_int: u64,
}

/// ExecutionReport (8).
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub order_id: String,
    pub exec_id: String,
    pub exec_type: ExecType,
    pub ord_status: OrdStatus,
    pub side: Side,
    pub leaves_qty: Decimal,
    pub cum_qty: Decimal,
    pub avg_px: Decimal,
    pub cl_ord_id: Option<String>,
    pub symbol: Option<String>,
    pub account: Option<String>,
    pub order_qty: Option<Decimal>,
    pub last_qty: Option<Decimal>,
    pub last_px: Option<Decimal>,
}

/// NewOrderSingle (D).
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewOrderSingle {
    pub cl_ord_id: Option<String>,
    pub account: Option<String>,
    pub symbol: Option<String>,
    pub side: Option<Side>,
    pub order_qty: Option<Decimal>,
    pub ord_type: Option<OrdType>,
    pub price: Option<Decimal>,
}

impl NewOrderSingle {
    /// Required ClOrdID.
    pub fn cl_ord_id(&self) -> Result<String, MessageReject> {
        required(&self.cl_ord_id, tag::CL_ORD_ID)
    }

    /// Required Symbol.
    pub fn symbol(&self) -> Result<String, MessageReject> {
        required(&self.symbol, tag::SYMBOL)
    }

    /// Required Side.
    pub fn side(&self) -> Result<Side, MessageReject> {
        required(&self.side, tag::SIDE)
    }

    /// Required OrderQty.
    pub fn order_qty(&self) -> Result<Decimal, MessageReject> {
        required(&self.order_qty, tag::ORDER_QTY)
    }

    /// Required OrdType.
    pub fn ord_type(&self) -> Result<OrdType, MessageReject> {
        required(&self.ord_type, tag::ORD_TYPE)
    }

    /// Required Price.
    pub fn price(&self) -> Result<Decimal, MessageReject> {
        required(&self.price, tag::PRICE)
    }
}

/// One entry of the QuoteRequest related-symbol group.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelatedSym {
    pub symbol: Option<String>,
    pub account: Option<String>,
    pub order_qty: Option<Decimal>,
}

/// QuoteRequest (R).
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub quote_req_id: Option<String>,
    pub related_sym: Vec<RelatedSym>,
}

impl QuoteRequest {
    /// Required QuoteReqID.
    pub fn quote_req_id(&self) -> Result<String, MessageReject> {
        required(&self.quote_req_id, tag::QUOTE_REQ_ID)
    }

    /// Symbol of the first group entry.
    pub fn symbol(&self) -> Result<String, MessageReject> {
        self.related_sym
            .first()
            .and_then(|entry| entry.symbol.clone())
            .ok_or_else(|| MessageReject::required_tag_missing(tag::SYMBOL))
    }

    /// Account of the first group entry, if any.
    pub fn account(&self) -> Option<String> {
        self.related_sym
            .first()
            .and_then(|entry| entry.account.clone())
    }
}

/// Quote (S).
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub quote_id: String,
    pub quote_req_id: Option<String>,
    pub symbol: Option<String>,
    pub currency: Option<String>,
    pub account: Option<String>,
    pub transact_time: Option<DateTime<Utc>>,
    pub bid_px: Option<Decimal>,
    pub offer_px: Option<Decimal>,
    pub bid_size: Option<Decimal>,
    pub offer_size: Option<Decimal>,
}

impl Quote {
    /// Required Symbol.
    pub fn symbol(&self) -> Result<String, MessageReject> {
        required(&self.symbol, tag::SYMBOL)
    }

    /// Required BidPx.
    pub fn bid_px(&self) -> Result<Decimal, MessageReject> {
        required(&self.bid_px, tag::BID_PX)
    }

    /// Required OfferPx.
    pub fn offer_px(&self) -> Result<Decimal, MessageReject> {
        required(&self.offer_px, tag::OFFER_PX)
    }

    /// Required BidSize.
    pub fn bid_size(&self) -> Result<Decimal, MessageReject> {
        required(&self.bid_size, tag::BID_SIZE)
    }
}

/// BusinessMessageReject (j).
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessMessageReject {
    pub ref_msg_type: Option<String>,
    pub text: Option<String>,
}
