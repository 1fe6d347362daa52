//! Inbound message routing.
//!
//! One router serves both channels: classified messages arrive tagged with
//! their channel kind and are dispatched to the correlator, the quote
//! bridge, or the ACK/NAK slots. A cancel acknowledgment additionally
//! clears the cancelled order's correlation state.

use crate::acks::AckRouter;
use crate::correlator::OrderCorrelator;
use crate::quotes::QuoteBridge;
use ivc_ws::{AckKind, ChannelKind, InboundMessage};
use std::sync::Arc;
use tracing::{debug, warn};

pub struct InboundRouter {
    correlator: Arc<OrderCorrelator>,
    quotes: Arc<QuoteBridge>,
    acks: Arc<AckRouter>,
}

impl InboundRouter {
    pub fn new(
        correlator: Arc<OrderCorrelator>,
        quotes: Arc<QuoteBridge>,
        acks: Arc<AckRouter>,
    ) -> Self {
        Self {
            correlator,
            quotes,
            acks,
        }
    }

    pub fn route(&self, channel: ChannelKind, message: InboundMessage) {
        match message {
            InboundMessage::QuoteResponse(response) => {
                if channel != ChannelKind::Quotes {
                    warn!(%channel, "Quote response on unexpected channel");
                }
                self.quotes.on_response(response);
            }
            InboundMessage::Fill(fill) => {
                self.correlator.on_fill(&fill.client_order_id, fill.fill_rate);
            }
            InboundMessage::Invoice(invoice) => {
                self.correlator
                    .on_invoice(&invoice.client_order_id, invoice.detail);
            }
            InboundMessage::Ack(ack) => {
                if ack.acked_type() == AckKind::CancelIndexOrder {
                    if let Some(id) = ack.client_order_id.as_deref() {
                        debug!(client_order_id = id, "Cancel acknowledged, clearing state");
                        self.correlator.clear_order(id);
                    }
                }
                self.acks.on_ack(&ack);
            }
            InboundMessage::Nak(nak) => {
                self.acks.on_nak(&nak.reason);
            }
        }
    }
}
