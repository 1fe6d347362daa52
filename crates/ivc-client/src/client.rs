//! Top-level index order/quote client.
//!
//! `IndexClient` is an explicit instance: it owns both channel connections,
//! the routing state, and its background tasks, and everything dies with
//! `shutdown()`. Nothing lives in module-level globals, so independent
//! clients can coexist in one process.

use crate::acks::AckRouter;
use crate::config::ClientConfig;
use crate::correlator::OrderCorrelator;
use crate::error::{ClientError, Result};
use crate::quotes::QuoteBridge;
use crate::router::InboundRouter;
use chrono::Utc;
use ivc_core::{ClientOrderId, ClientQuoteId, Side, Symbol};
use ivc_signing::{OrderSigner, SignedTrailer};
use ivc_ws::{
    ChannelConnection, ChannelKind, IndexQuoteResponse, MsgType, OrderMessage, QuoteMessage,
    StandardHeader, StandardTrailer,
};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct IndexClient {
    config: ClientConfig,
    signer: Arc<dyn OrderSigner>,
    quotes_conn: Arc<ChannelConnection>,
    orders_conn: Arc<ChannelConnection>,
    correlator: Arc<OrderCorrelator>,
    quote_bridge: Arc<QuoteBridge>,
    acks: Arc<AckRouter>,
    tracked_symbols: Arc<RwLock<HashSet<Symbol>>>,
    /// Per-instance counter feeding the id generator.
    id_seq: AtomicU64,
    shutdown: CancellationToken,
}

impl IndexClient {
    /// Build a client and start its dispatch and price-poll tasks.
    /// Sockets stay down until `connect()`.
    pub fn new(config: ClientConfig, signer: Arc<dyn OrderSigner>) -> Arc<Self> {
        ivc_ws::init_crypto();

        let (inbound_tx, mut inbound_rx) = mpsc::channel(256);
        let quotes_conn = Arc::new(ChannelConnection::new(
            ChannelKind::Quotes,
            config.quotes_url.clone(),
            inbound_tx.clone(),
        ));
        let orders_conn = Arc::new(ChannelConnection::new(
            ChannelKind::Orders,
            config.orders_url.clone(),
            inbound_tx,
        ));

        let correlator = Arc::new(OrderCorrelator::new());
        let quote_bridge = Arc::new(QuoteBridge::new());
        let acks = Arc::new(AckRouter::new());

        let client = Arc::new(Self {
            config,
            signer,
            quotes_conn,
            orders_conn,
            correlator: correlator.clone(),
            quote_bridge: quote_bridge.clone(),
            acks: acks.clone(),
            tracked_symbols: Arc::new(RwLock::new(HashSet::new())),
            id_seq: AtomicU64::new(0),
            shutdown: CancellationToken::new(),
        });

        // Dispatch task: drains both channels into the router.
        let router = InboundRouter::new(correlator, quote_bridge, acks);
        let token = client.shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    inbound = inbound_rx.recv() => {
                        match inbound {
                            Some((channel, message)) => router.route(channel, message),
                            None => break,
                        }
                    }
                }
            }
            debug!("Dispatch task ended");
        });

        // Price poll task: one quote request per tracked symbol per tick.
        let poller = Arc::clone(&client);
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(poller.config.quote_poll_interval_ms));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = poller.shutdown.cancelled() => break,
                    _ = interval.tick() => poller.poll_prices().await,
                }
            }
            debug!("Price poll task ended");
        });

        client
    }

    /// Open both channel sockets. Idempotent per channel.
    pub fn connect(&self) {
        self.quotes_conn.connect();
        self.orders_conn.connect();
    }

    /// Stop background tasks and close both sockets. Final: a shut-down
    /// client is not reusable.
    pub fn shutdown(&self) {
        info!("Client shutdown requested");
        self.shutdown.cancel();
        self.quotes_conn.disconnect();
        self.orders_conn.disconnect();
    }

    pub fn is_connected(&self, channel: ChannelKind) -> bool {
        match channel {
            ChannelKind::Quotes => self.quotes_conn.is_connected(),
            ChannelKind::Orders => self.orders_conn.is_connected(),
        }
    }

    /// Add a symbol to the background price poll.
    pub fn track_symbol(&self, symbol: Symbol) {
        self.tracked_symbols.write().insert(symbol);
    }

    pub fn untrack_symbol(&self, symbol: &Symbol) {
        self.tracked_symbols.write().remove(symbol);
    }

    /// Latest polled unit price for `symbol`.
    pub fn price(&self, symbol: &Symbol) -> Option<Decimal> {
        self.quote_bridge.price(symbol)
    }

    // ------------------------------------------------------------------
    // Orders
    // ------------------------------------------------------------------

    /// Sign and submit a new index order. Returns the generated client
    /// order id used to correlate fills and the mint invoice.
    pub async fn send_index_order(
        &self,
        symbol: &Symbol,
        side: Side,
        amount: Decimal,
    ) -> Result<ClientOrderId> {
        // Stale invoices from abandoned orders must not reach the new
        // order's subscriber.
        self.correlator.clear_pending_invoices();

        let id = ClientOrderId::from_string(self.next_client_id());
        let trailer = self
            .signer
            .sign_order(MsgType::NewIndexOrder.as_str(), id.as_str())
            .await?;

        let msg = self.order_message(MsgType::NewIndexOrder, &id, symbol, side, amount, trailer);
        self.orders_conn.send(msg).await?;
        info!(client_order_id = %id, %symbol, %side, %amount, "Index order sent");
        Ok(id)
    }

    /// Sign and submit a cancel for `client_order_id`. The original symbol,
    /// side, and amount are echoed on the wire but do not enter the signed
    /// payload.
    pub async fn cancel_index_order(
        &self,
        client_order_id: &ClientOrderId,
        symbol: &Symbol,
        side: Side,
        amount: Decimal,
    ) -> Result<()> {
        let trailer = self
            .signer
            .sign_order(MsgType::CancelIndexOrder.as_str(), client_order_id.as_str())
            .await?;

        let msg = self.order_message(
            MsgType::CancelIndexOrder,
            client_order_id,
            symbol,
            side,
            amount,
            trailer,
        );
        self.orders_conn.send(msg).await?;
        info!(%client_order_id, "Cancel sent");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Quotes
    // ------------------------------------------------------------------

    /// Request a quote and await the response, bounded by the configured
    /// deadline. On expiry the pending resolver is removed and
    /// `ClientError::QuoteTimeout` is returned.
    pub async fn request_quote_and_wait(
        &self,
        symbol: &Symbol,
        side: Side,
        amount: Decimal,
    ) -> Result<IndexQuoteResponse> {
        let id = ClientQuoteId::from_string(self.next_client_id());
        let rx = self.quote_bridge.register(id.as_str(), symbol.clone());

        if let Err(e) = self.send_quote_request(&id, symbol, side, amount).await {
            self.quote_bridge.abandon(id.as_str());
            return Err(e);
        }

        let timeout_ms = self.config.quote_timeout_ms;
        match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(response)) => Ok(response),
            // Closed sender counts as a timeout: nothing will resolve it.
            Ok(Err(_)) | Err(_) => {
                self.quote_bridge.abandon(id.as_str());
                warn!(client_quote_id = %id, timeout_ms, "Quote wait expired");
                Err(ClientError::QuoteTimeout {
                    client_quote_id: id.to_string(),
                    timeout_ms,
                })
            }
        }
    }

    /// Sign and submit a quote cancellation.
    pub async fn cancel_quote(
        &self,
        client_quote_id: &ClientQuoteId,
        symbol: &Symbol,
        side: Side,
        amount: Decimal,
    ) -> Result<()> {
        let trailer = self
            .signer
            .sign_order(MsgType::CancelQuoteRequest.as_str(), client_quote_id.as_str())
            .await?;

        let msg = self.quote_message(
            MsgType::CancelQuoteRequest,
            client_quote_id.as_str(),
            symbol,
            side,
            amount,
            trailer,
        );
        self.quotes_conn.send(msg).await?;
        self.quote_bridge.abandon(client_quote_id.as_str());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle subscriptions and handler slots
    // ------------------------------------------------------------------

    pub fn subscribe_fills<F>(&self, client_order_id: &ClientOrderId, handler: F)
    where
        F: Fn(Decimal) + Send + Sync + 'static,
    {
        self.correlator.subscribe_fills(client_order_id.as_str(), handler);
    }

    pub fn unsubscribe_fills(&self, client_order_id: &ClientOrderId) {
        self.correlator.unsubscribe_fills(client_order_id.as_str());
    }

    pub fn subscribe_invoice<F>(&self, client_order_id: &ClientOrderId, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.correlator
            .subscribe_invoice(client_order_id.as_str(), handler);
    }

    pub fn unsubscribe_invoice(&self, client_order_id: &ClientOrderId) {
        self.correlator.unsubscribe_invoice(client_order_id.as_str());
    }

    pub fn set_nak_handler<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.acks.set_nak_handler(handler);
    }

    pub fn set_ack_handler<F>(&self, handler: F)
    where
        F: Fn(ivc_ws::AckKind, Option<&str>) + Send + Sync + 'static,
    {
        self.acks.set_ack_handler(handler);
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn next_client_id(&self) -> String {
        let seq = self.id_seq.fetch_add(1, Ordering::SeqCst);
        ivc_core::derive_client_id(
            Utc::now().timestamp_millis(),
            &self.signer.address().to_string(),
            self.config.chain_id,
            seq,
        )
    }

    fn order_message(
        &self,
        msg_type: MsgType,
        id: &ClientOrderId,
        symbol: &Symbol,
        side: Side,
        amount: Decimal,
        trailer: SignedTrailer,
    ) -> OrderMessage {
        OrderMessage {
            standard_header: StandardHeader::new(
                msg_type,
                &self.config.sender_comp_id,
                &self.config.target_comp_id,
            ),
            chain_id: self.config.chain_id,
            address: self.signer.address().to_string(),
            client_order_id: id.to_string(),
            symbol: symbol.to_string(),
            side,
            amount,
            standard_trailer: StandardTrailer {
                public_key: hex::encode(&trailer.public_key),
                signature: hex::encode(&trailer.signature),
            },
        }
    }

    fn quote_message(
        &self,
        msg_type: MsgType,
        id: &str,
        symbol: &Symbol,
        side: Side,
        amount: Decimal,
        trailer: SignedTrailer,
    ) -> QuoteMessage {
        QuoteMessage {
            standard_header: StandardHeader::new(
                msg_type,
                &self.config.sender_comp_id,
                &self.config.target_comp_id,
            ),
            chain_id: self.config.chain_id,
            address: self.signer.address().to_string(),
            client_quote_id: id.to_string(),
            symbol: symbol.to_string(),
            side,
            amount,
            standard_trailer: StandardTrailer {
                public_key: hex::encode(&trailer.public_key),
                signature: hex::encode(&trailer.signature),
            },
        }
    }

    async fn send_quote_request(
        &self,
        id: &ClientQuoteId,
        symbol: &Symbol,
        side: Side,
        amount: Decimal,
    ) -> Result<()> {
        let trailer = self
            .signer
            .sign_order(MsgType::NewQuoteRequest.as_str(), id.as_str())
            .await?;
        let msg = self.quote_message(
            MsgType::NewQuoteRequest,
            id.as_str(),
            symbol,
            side,
            amount,
            trailer,
        );
        self.quotes_conn.send(msg).await?;
        Ok(())
    }

    /// One poll tick: a fire-and-forget quote request per tracked symbol.
    /// Skipped entirely while the quotes channel is down.
    async fn poll_prices(&self) {
        if !self.quotes_conn.is_connected() {
            return;
        }

        let symbols: Vec<Symbol> = self.tracked_symbols.read().iter().cloned().collect();
        for symbol in symbols {
            let id = ClientQuoteId::from_string(self.next_client_id());
            self.quote_bridge.note_symbol(id.as_str(), symbol.clone());

            let result = self
                .send_quote_request(&id, &symbol, Side::Buy, self.config.quote_probe_amount)
                .await;
            if let Err(e) = result {
                self.quote_bridge.abandon(id.as_str());
                warn!(%symbol, %e, "Price poll quote failed");
            }
        }
    }
}
