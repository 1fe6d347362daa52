//! Wire message types for the order/quote protocol.
//!
//! Outbound messages carry a FIX-style envelope: a `standard_header` with
//! the message type and sequence number, a signed `standard_trailer`, and
//! flat body fields. Amounts travel as decimal strings.
//!
//! Inbound frames are classified leniently: the counterparty's exact field
//! placement is a provisional contract, so type and sequence information is
//! extracted from several candidate locations before a frame is dropped.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{WsError, WsResult};

// ============================================================================
// Message types and channel routing
// ============================================================================

/// The two protocol channels. Quote traffic and order traffic run over
/// separate sockets with independent sequence numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Quotes,
    Orders,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Quotes => write!(f, "quotes"),
            Self::Orders => write!(f, "orders"),
        }
    }
}

/// Outbound message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MsgType {
    NewQuoteRequest,
    CancelQuoteRequest,
    NewIndexOrder,
    CancelIndexOrder,
    ReplaceIndexOrder,
    CancelIndexReplaceRequest,
}

impl MsgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NewQuoteRequest => "NewQuoteRequest",
            Self::CancelQuoteRequest => "CancelQuoteRequest",
            Self::NewIndexOrder => "NewIndexOrder",
            Self::CancelIndexOrder => "CancelIndexOrder",
            Self::ReplaceIndexOrder => "ReplaceIndexOrder",
            Self::CancelIndexReplaceRequest => "CancelIndexReplaceRequest",
        }
    }

    /// Which channel this message type is sent over.
    pub fn channel(&self) -> ChannelKind {
        match self {
            Self::NewQuoteRequest | Self::CancelQuoteRequest => ChannelKind::Quotes,
            Self::NewIndexOrder
            | Self::CancelIndexOrder
            | Self::ReplaceIndexOrder
            | Self::CancelIndexReplaceRequest => ChannelKind::Orders,
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// Message header shared by all outbound messages.
///
/// `seq_num` is stamped by the channel connection at send time; callers
/// construct the header with a placeholder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardHeader {
    pub msg_type: String,
    pub sender_comp_id: String,
    pub target_comp_id: String,
    pub seq_num: u64,
    pub timestamp: String,
}

impl StandardHeader {
    pub fn new(msg_type: MsgType, sender_comp_id: &str, target_comp_id: &str) -> Self {
        Self {
            msg_type: msg_type.as_str().to_string(),
            sender_comp_id: sender_comp_id.to_string(),
            target_comp_id: target_comp_id.to_string(),
            seq_num: 0,
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Signature material appended to outbound messages (hex-encoded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardTrailer {
    pub public_key: String,
    pub signature: String,
}

/// Outbound message with a mutable header, so the connection can stamp the
/// sequence number under its send guard before enqueueing.
pub trait WireMessage: Serialize + Send {
    fn header_mut(&mut self) -> &mut StandardHeader;
}

/// Order mutation: NewIndexOrder, CancelIndexOrder, ReplaceIndexOrder.
///
/// Cancels echo the original symbol/side/amount; only `msg_type` and
/// `client_order_id` enter the signed payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderMessage {
    pub standard_header: StandardHeader,
    pub chain_id: u64,
    pub address: String,
    pub client_order_id: String,
    pub symbol: String,
    pub side: ivc_core::Side,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub standard_trailer: StandardTrailer,
}

impl WireMessage for OrderMessage {
    fn header_mut(&mut self) -> &mut StandardHeader {
        &mut self.standard_header
    }
}

/// Quote request: NewQuoteRequest, CancelQuoteRequest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteMessage {
    pub standard_header: StandardHeader,
    pub chain_id: u64,
    pub address: String,
    pub client_quote_id: String,
    pub symbol: String,
    pub side: ivc_core::Side,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    pub standard_trailer: StandardTrailer,
}

impl WireMessage for QuoteMessage {
    fn header_mut(&mut self) -> &mut StandardHeader {
        &mut self.standard_header
    }
}

// ============================================================================
// Inbound classification
// ============================================================================

/// Quote response carrying executable quantity for the requested amount.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuoteResponse {
    pub client_quote_id: String,
    pub amount: Decimal,
    pub quantity_possible: Decimal,
}

impl IndexQuoteResponse {
    /// Unit price implied by this quote, if the quantity is non-zero.
    pub fn unit_price(&self) -> Option<Decimal> {
        if self.quantity_possible.is_zero() {
            None
        } else {
            Some(self.amount / self.quantity_possible)
        }
    }
}

/// Fill progress report. `fill_rate` is a 0..=1 fraction of the order.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexOrderFill {
    pub client_order_id: String,
    pub fill_rate: Decimal,
}

/// Mint invoice issued once an order is fully filled. The detail payload is
/// opaque to the client and handed to subscribers as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct MintInvoice {
    pub client_order_id: String,
    pub detail: Value,
}

/// Negative acknowledgment with a human-readable reason.
#[derive(Debug, Clone, PartialEq)]
pub struct NakMessage {
    pub reason: String,
}

/// Which outbound message an ACK acknowledges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckKind {
    NewIndexOrder,
    CancelIndexOrder,
    Unknown,
}

/// Positive acknowledgment. The acknowledged type lives in different fields
/// depending on counterparty version, so the raw frame is kept and
/// discriminated on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct AckMessage {
    pub client_order_id: Option<String>,
    raw: Value,
}

impl AckMessage {
    /// Discriminate which message type this ACK acknowledges.
    ///
    /// Provisional contract: checks `ref_msg_type`, `orig_msg_type`, and a
    /// nested `msg_type`, then falls back to substring matching on the raw
    /// frame.
    pub fn acked_type(&self) -> AckKind {
        let candidate = ["ref_msg_type", "orig_msg_type"]
            .iter()
            .find_map(|key| self.raw.get(key).and_then(Value::as_str))
            .or_else(|| {
                self.raw
                    .get("data")
                    .and_then(|d| d.get("msg_type"))
                    .and_then(Value::as_str)
            });

        if let Some(t) = candidate {
            if t.contains("Cancel") {
                return AckKind::CancelIndexOrder;
            }
            if t.contains("NewIndexOrder") || t.contains("IndexOrder") {
                return AckKind::NewIndexOrder;
            }
        }

        // Last resort: scan the whole frame.
        let text = self.raw.to_string();
        if text.contains("CancelIndexOrder") {
            AckKind::CancelIndexOrder
        } else if text.contains("NewIndexOrder") {
            AckKind::NewIndexOrder
        } else {
            AckKind::Unknown
        }
    }
}

/// Classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    QuoteResponse(IndexQuoteResponse),
    Fill(IndexOrderFill),
    Invoice(MintInvoice),
    Ack(AckMessage),
    Nak(NakMessage),
}

/// Inbound frame after parsing: the classified message plus the
/// counterparty's sequence reference, if present.
#[derive(Debug, Clone)]
pub struct ParsedFrame {
    pub ref_seq_num: Option<u64>,
    pub message: Option<InboundMessage>,
}

/// Extract the message type from an inbound frame.
///
/// Checks `standard_header.msg_type` first, then a top-level `msg_type`.
pub fn extract_msg_type(value: &Value) -> Option<&str> {
    value
        .get("standard_header")
        .and_then(|h| h.get("msg_type"))
        .and_then(Value::as_str)
        .or_else(|| value.get("msg_type").and_then(Value::as_str))
}

/// Extract `ref_seq_num` from an inbound frame (header or top level).
pub fn extract_ref_seq_num(value: &Value) -> Option<u64> {
    value
        .get("standard_header")
        .and_then(|h| h.get("ref_seq_num"))
        .and_then(Value::as_u64)
        .or_else(|| value.get("ref_seq_num").and_then(Value::as_u64))
}

fn extract_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Decimals arrive as strings per the contract, but some frames carry bare
/// numbers. Accept both.
fn extract_decimal(value: &Value, key: &str) -> Option<Decimal> {
    match value.get(key)? {
        Value::String(s) => Decimal::from_str(s).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

/// Parse and classify an inbound text frame.
///
/// Returns the extracted `ref_seq_num` even when the body cannot be
/// classified, so sequence resync happens before any drop decision. A frame
/// with a recognized type but missing required fields is a `ParseError`.
pub fn parse_inbound(text: &str) -> WsResult<ParsedFrame> {
    let value: Value = serde_json::from_str(text)?;
    let ref_seq_num = extract_ref_seq_num(&value);

    let Some(msg_type) = extract_msg_type(&value) else {
        // A typeless frame that still references our sequence must reach
        // the resync path before being dropped.
        if ref_seq_num.is_some() {
            return Ok(ParsedFrame {
                ref_seq_num,
                message: None,
            });
        }
        return Err(WsError::ParseError("frame has no msg_type".to_string()));
    };

    let message = match msg_type {
        "IndexQuoteResponse" => {
            let client_quote_id = extract_str(&value, "client_quote_id")
                .ok_or_else(|| WsError::ParseError("quote response missing client_quote_id".to_string()))?;
            let amount = extract_decimal(&value, "amount")
                .ok_or_else(|| WsError::ParseError("quote response missing amount".to_string()))?;
            let quantity_possible = extract_decimal(&value, "quantity_possible")
                .ok_or_else(|| WsError::ParseError("quote response missing quantity_possible".to_string()))?;
            Some(InboundMessage::QuoteResponse(IndexQuoteResponse {
                client_quote_id,
                amount,
                quantity_possible,
            }))
        }
        "IndexOrderFill" => {
            let client_order_id = extract_str(&value, "client_order_id")
                .ok_or_else(|| WsError::ParseError("fill missing client_order_id".to_string()))?;
            let fill_rate = extract_decimal(&value, "fill_rate")
                .ok_or_else(|| WsError::ParseError("fill missing fill_rate".to_string()))?;
            Some(InboundMessage::Fill(IndexOrderFill {
                client_order_id,
                fill_rate,
            }))
        }
        "MintInvoice" => {
            let client_order_id = extract_str(&value, "client_order_id")
                .ok_or_else(|| WsError::ParseError("invoice missing client_order_id".to_string()))?;
            let detail = value.get("detail").cloned().unwrap_or(Value::Null);
            Some(InboundMessage::Invoice(MintInvoice {
                client_order_id,
                detail,
            }))
        }
        "Nak" | "Reject" => {
            let reason = extract_str(&value, "reason")
                .or_else(|| extract_str(&value, "text"))
                .unwrap_or_else(|| "unspecified".to_string());
            Some(InboundMessage::Nak(NakMessage { reason }))
        }
        t if t.contains("Ack") => Some(InboundMessage::Ack(AckMessage {
            client_order_id: extract_str(&value, "client_order_id"),
            raw: value.clone(),
        })),
        other => {
            tracing::debug!(msg_type = other, "Unrecognized inbound message type");
            None
        }
    };

    Ok(ParsedFrame {
        ref_seq_num,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_msg_type_channel_routing() {
        assert_eq!(MsgType::NewQuoteRequest.channel(), ChannelKind::Quotes);
        assert_eq!(MsgType::CancelQuoteRequest.channel(), ChannelKind::Quotes);
        assert_eq!(MsgType::NewIndexOrder.channel(), ChannelKind::Orders);
        assert_eq!(MsgType::CancelIndexOrder.channel(), ChannelKind::Orders);
        assert_eq!(MsgType::ReplaceIndexOrder.channel(), ChannelKind::Orders);
        assert_eq!(
            MsgType::CancelIndexReplaceRequest.channel(),
            ChannelKind::Orders
        );
    }

    #[test]
    fn test_order_message_serialization() {
        let msg = OrderMessage {
            standard_header: StandardHeader::new(MsgType::NewIndexOrder, "CLIENT", "VAULT"),
            chain_id: 42161,
            address: "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".to_string(),
            client_order_id: "ABC-DEF-GHI-1234".to_string(),
            symbol: "SY100".to_string(),
            side: ivc_core::Side::Buy,
            amount: dec!(250.50),
            standard_trailer: StandardTrailer {
                public_key: "04ab".to_string(),
                signature: "beef".to_string(),
            },
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["standard_header"]["msg_type"], "NewIndexOrder");
        assert_eq!(json["standard_header"]["sender_comp_id"], "CLIENT");
        assert_eq!(json["side"], "1");
        // Amounts are decimal strings on the wire.
        assert_eq!(json["amount"], "250.50");
        assert_eq!(json["standard_trailer"]["signature"], "beef");
    }

    #[test]
    fn test_parse_quote_response() {
        let text = json!({
            "standard_header": {"msg_type": "IndexQuoteResponse", "ref_seq_num": 17},
            "client_quote_id": "QQQ-RRR-SSS-2002",
            "amount": "1000",
            "quantity_possible": "8"
        })
        .to_string();

        let frame = parse_inbound(&text).unwrap();
        assert_eq!(frame.ref_seq_num, Some(17));
        match frame.message.unwrap() {
            InboundMessage::QuoteResponse(q) => {
                assert_eq!(q.client_quote_id, "QQQ-RRR-SSS-2002");
                assert_eq!(q.unit_price(), Some(dec!(125)));
            }
            other => panic!("expected quote response, got {other:?}"),
        }
    }

    #[test]
    fn test_quote_response_zero_quantity_has_no_price() {
        let q = IndexQuoteResponse {
            client_quote_id: "X".to_string(),
            amount: dec!(1000),
            quantity_possible: Decimal::ZERO,
        };
        assert_eq!(q.unit_price(), None);
    }

    #[test]
    fn test_parse_fill_with_top_level_fields() {
        let text = json!({
            "msg_type": "IndexOrderFill",
            "ref_seq_num": 9,
            "client_order_id": "ABC-DEF-GHI-1234",
            "fill_rate": "0.5"
        })
        .to_string();

        let frame = parse_inbound(&text).unwrap();
        assert_eq!(frame.ref_seq_num, Some(9));
        match frame.message.unwrap() {
            InboundMessage::Fill(f) => {
                assert_eq!(f.client_order_id, "ABC-DEF-GHI-1234");
                assert_eq!(f.fill_rate, dec!(0.5));
            }
            other => panic!("expected fill, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_fill_numeric_rate() {
        let text = json!({
            "msg_type": "IndexOrderFill",
            "client_order_id": "ABC-DEF-GHI-1234",
            "fill_rate": 0.75
        })
        .to_string();

        let frame = parse_inbound(&text).unwrap();
        match frame.message.unwrap() {
            InboundMessage::Fill(f) => assert_eq!(f.fill_rate, dec!(0.75)),
            other => panic!("expected fill, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_invoice() {
        let text = json!({
            "msg_type": "MintInvoice",
            "client_order_id": "ABC-DEF-GHI-1234",
            "detail": {"invoice_id": "inv-77", "total": "995.00"}
        })
        .to_string();

        let frame = parse_inbound(&text).unwrap();
        match frame.message.unwrap() {
            InboundMessage::Invoice(inv) => {
                assert_eq!(inv.client_order_id, "ABC-DEF-GHI-1234");
                assert_eq!(inv.detail["invoice_id"], "inv-77");
            }
            other => panic!("expected invoice, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_nak_reason_fallback() {
        let text = json!({"msg_type": "Nak", "text": "unknown symbol"}).to_string();
        let frame = parse_inbound(&text).unwrap();
        match frame.message.unwrap() {
            InboundMessage::Nak(n) => assert_eq!(n.reason, "unknown symbol"),
            other => panic!("expected nak, got {other:?}"),
        }
    }

    #[test]
    fn test_ack_discrimination_ref_msg_type() {
        let text = json!({
            "msg_type": "Ack",
            "ref_msg_type": "CancelIndexOrder",
            "client_order_id": "ABC-DEF-GHI-1234"
        })
        .to_string();

        let frame = parse_inbound(&text).unwrap();
        match frame.message.unwrap() {
            InboundMessage::Ack(ack) => {
                assert_eq!(ack.acked_type(), AckKind::CancelIndexOrder);
                assert_eq!(ack.client_order_id.as_deref(), Some("ABC-DEF-GHI-1234"));
            }
            other => panic!("expected ack, got {other:?}"),
        }
    }

    #[test]
    fn test_ack_discrimination_orig_msg_type() {
        let text = json!({
            "msg_type": "Ack",
            "orig_msg_type": "NewIndexOrder"
        })
        .to_string();

        let frame = parse_inbound(&text).unwrap();
        match frame.message.unwrap() {
            InboundMessage::Ack(ack) => assert_eq!(ack.acked_type(), AckKind::NewIndexOrder),
            other => panic!("expected ack, got {other:?}"),
        }
    }

    #[test]
    fn test_ack_discrimination_nested_and_substring() {
        let nested = json!({
            "msg_type": "OrderAck",
            "data": {"msg_type": "NewIndexOrder"}
        })
        .to_string();
        let frame = parse_inbound(&nested).unwrap();
        match frame.message.unwrap() {
            InboundMessage::Ack(ack) => assert_eq!(ack.acked_type(), AckKind::NewIndexOrder),
            other => panic!("expected ack, got {other:?}"),
        }

        let substring_only = json!({
            "msg_type": "Ack",
            "note": "CancelIndexOrder accepted"
        })
        .to_string();
        let frame = parse_inbound(&substring_only).unwrap();
        match frame.message.unwrap() {
            InboundMessage::Ack(ack) => assert_eq!(ack.acked_type(), AckKind::CancelIndexOrder),
            other => panic!("expected ack, got {other:?}"),
        }
    }

    #[test]
    fn test_ack_discrimination_unknown() {
        let text = json!({"msg_type": "Ack"}).to_string();
        let frame = parse_inbound(&text).unwrap();
        match frame.message.unwrap() {
            InboundMessage::Ack(ack) => assert_eq!(ack.acked_type(), AckKind::Unknown),
            other => panic!("expected ack, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_frames_error() {
        assert!(parse_inbound("not json").is_err());
        assert!(parse_inbound(r#"{"no_type_here": true}"#).is_err());
        // Recognized type with missing required fields.
        assert!(parse_inbound(r#"{"msg_type": "IndexOrderFill"}"#).is_err());
    }

    #[test]
    fn test_unknown_type_keeps_ref_seq_num() {
        let text = json!({"msg_type": "Heartbeat", "ref_seq_num": 33}).to_string();
        let frame = parse_inbound(&text).unwrap();
        assert_eq!(frame.ref_seq_num, Some(33));
        assert!(frame.message.is_none());
    }

    #[test]
    fn test_typeless_frame_keeps_ref_seq_num() {
        let text = json!({"ref_seq_num": 77}).to_string();
        let frame = parse_inbound(&text).unwrap();
        assert_eq!(frame.ref_seq_num, Some(77));
        assert!(frame.message.is_none());
    }
}
