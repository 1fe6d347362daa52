//! Per-channel WebSocket connection manager.
//!
//! Each protocol channel (quotes, orders) runs one `ChannelConnection`:
//! a session task that owns the socket, reconnects with capped exponential
//! backoff, stamps outbound sequence numbers, and forwards classified
//! inbound messages to the client router.

use crate::error::{WsError, WsResult};
use crate::message::{parse_inbound, ChannelKind, InboundMessage, WireMessage};
use crate::sequence::SequenceCounter;
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio_tungstenite::{connect_async_tls_with_config, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Connection state, visible to callers via `state()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Reconnect delay for the given attempt count: `min(1000 * 2^attempts, 10000)` ms.
///
/// The first retry (attempts = 0) waits 1s; the cap is reached at the
/// fourth retry and held from there.
pub fn backoff_delay(attempts: u32) -> Duration {
    let delay = 1000u64.saturating_mul(1u64 << attempts.min(10));
    Duration::from_millis(delay.min(10_000))
}

/// One protocol channel over its own socket.
pub struct ChannelConnection {
    kind: ChannelKind,
    url: String,
    state: Arc<RwLock<ConnectionState>>,
    sequence: SequenceCounter,
    outbound_tx: mpsc::Sender<String>,
    outbound_rx: Arc<TokioMutex<mpsc::Receiver<String>>>,
    // Orders stamp-and-enqueue so wire order matches sequence order.
    send_guard: TokioMutex<()>,
    inbound_tx: mpsc::Sender<(ChannelKind, InboundMessage)>,
    shutdown: RwLock<CancellationToken>,
    session_live: AtomicBool,
}

impl ChannelConnection {
    /// Create a connection for `kind` targeting `url`. Classified inbound
    /// messages are forwarded over `inbound_tx`, tagged with the channel.
    pub fn new(
        kind: ChannelKind,
        url: String,
        inbound_tx: mpsc::Sender<(ChannelKind, InboundMessage)>,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(100);
        Self {
            kind,
            url,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            sequence: SequenceCounter::new(),
            outbound_tx,
            outbound_rx: Arc::new(TokioMutex::new(outbound_rx)),
            send_guard: TokioMutex::new(()),
            inbound_tx,
            shutdown: RwLock::new(CancellationToken::new()),
            session_live: AtomicBool::new(false),
        }
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Start the session task. Idempotent: a no-op while a session task is
    /// live, including during its reconnect backoff.
    pub fn connect(self: &Arc<Self>) {
        if self.session_live.swap(true, Ordering::SeqCst) {
            debug!(channel = %self.kind, "Connect requested while session live, ignoring");
            return;
        }

        // A previous disconnect leaves a cancelled token behind.
        {
            let mut token = self.shutdown.write();
            if token.is_cancelled() {
                *token = CancellationToken::new();
            }
        }

        let conn = Arc::clone(self);
        tokio::spawn(async move {
            conn.run_with_retry().await;
            *conn.state.write() = ConnectionState::Disconnected;
            conn.session_live.store(false, Ordering::SeqCst);
            info!(channel = %conn.kind, "Session task ended");
        });
    }

    /// Stop the session: cancels any pending reconnect and closes the
    /// socket. No auto-reconnect follows; `connect()` starts fresh.
    pub fn disconnect(&self) {
        info!(channel = %self.kind, "Disconnect requested");
        self.shutdown.read().cancel();
    }

    /// Stamp the next sequence number into the message header and queue it
    /// for the socket writer. Concurrent sends are serialized so the queue
    /// order matches the sequence order.
    ///
    /// # Errors
    /// Returns `WsError::NotConnected` when the channel has no open socket.
    pub async fn send<T: WireMessage>(&self, mut msg: T) -> WsResult<u64> {
        if !self.is_connected() {
            return Err(WsError::NotConnected);
        }

        let _order = self.send_guard.lock().await;
        let seq = self.sequence.take();
        msg.header_mut().seq_num = seq;
        let text = serde_json::to_string(&msg)?;

        self.outbound_tx
            .send(text)
            .await
            .map_err(|e| WsError::SendFailed(e.to_string()))?;
        Ok(seq)
    }

    /// Sequence counter for this channel (the router applies resyncs here).
    pub fn sequence(&self) -> &SequenceCounter {
        &self.sequence
    }

    async fn run_with_retry(&self) {
        let mut attempts = 0u32;

        loop {
            let token = self.shutdown.read().clone();
            if token.is_cancelled() {
                return;
            }

            *self.state.write() = if attempts == 0 {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting
            };

            match self.run_session(&mut attempts, &token).await {
                Ok(()) => {
                    // Clean shutdown requested from inside the session.
                    return;
                }
                Err(e) => {
                    error!(channel = %self.kind, ?e, "Session ended with error");
                }
            }

            if token.is_cancelled() {
                return;
            }

            let delay = backoff_delay(attempts);
            warn!(
                channel = %self.kind,
                attempts,
                delay_ms = delay.as_millis(),
                "Scheduling reconnect"
            );

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = token.cancelled() => {
                    info!(channel = %self.kind, "Shutdown during backoff");
                    return;
                }
            }

            // The scheduled reconnect fired; count it.
            attempts = attempts.saturating_add(1);
        }
    }

    async fn run_session(&self, attempts: &mut u32, token: &CancellationToken) -> WsResult<()> {
        info!(channel = %self.kind, url = %self.url, "Connecting");

        let (ws_stream, _response) =
            connect_async_tls_with_config(&self.url, None, true, None).await?;
        let (mut write, mut read) = ws_stream.split();

        *self.state.write() = ConnectionState::Connected;
        *attempts = 0;
        info!(channel = %self.kind, "Connected");

        loop {
            let outbound_recv = async { self.outbound_rx.lock().await.recv().await };

            tokio::select! {
                () = token.cancelled() => {
                    info!(channel = %self.kind, "Shutdown signal in session loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(channel = %self.kind, ?e, "Failed to send Close frame");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_frame(&text).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(channel = %self.kind, code, %reason, "Closed by server");
                            *self.state.write() = ConnectionState::Disconnected;
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Err(e)) => {
                            error!(channel = %self.kind, ?e, "Read error");
                            *self.state.write() = ConnectionState::Disconnected;
                            return Err(e.into());
                        }
                        None => {
                            warn!(channel = %self.kind, "Stream ended");
                            *self.state.write() = ConnectionState::Disconnected;
                            return Err(WsError::ConnectionClosed {
                                code: 1006,
                                reason: "Stream ended".to_string(),
                            });
                        }
                        _ => {}
                    }
                }

                outbound = outbound_recv => {
                    if let Some(text) = outbound {
                        write.send(Message::Text(text)).await?;
                    }
                }
            }
        }
    }

    /// Parse one inbound frame: apply sequence resync first, then forward
    /// the classified message. Malformed frames are logged and dropped.
    async fn handle_frame(&self, text: &str) {
        match parse_inbound(text) {
            Ok(frame) => {
                if let Some(ref_seq) = frame.ref_seq_num {
                    debug!(channel = %self.kind, ref_seq, "Sequence resync");
                    self.sequence.resync(ref_seq);
                }
                if let Some(message) = frame.message {
                    if self.inbound_tx.send((self.kind, message)).await.is_err() {
                        warn!(channel = %self.kind, "Inbound receiver dropped");
                    }
                }
            }
            Err(e) => {
                warn!(channel = %self.kind, %e, "Dropping malformed frame");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence() {
        let delays: Vec<u64> = (0..6).map(|a| backoff_delay(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 10000, 10000]);
    }

    #[test]
    fn test_backoff_large_attempts_stay_capped() {
        assert_eq!(backoff_delay(31).as_millis(), 10_000);
        assert_eq!(backoff_delay(u32::MAX).as_millis(), 10_000);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_and_disconnect_stops_session() {
        let (tx, _rx) = mpsc::channel(8);
        // Connection refused immediately; the session enters backoff.
        let conn = Arc::new(ChannelConnection::new(
            ChannelKind::Orders,
            "ws://127.0.0.1:9".to_string(),
            tx,
        ));

        conn.connect();
        conn.connect(); // no-op while the session task is live
        assert!(conn.session_live.load(Ordering::SeqCst));
        assert!(!conn.is_connected());

        conn.disconnect();
        for _ in 0..50 {
            if !conn.session_live.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!conn.session_live.load(Ordering::SeqCst));
        assert_eq!(conn.state(), ConnectionState::Disconnected);
    }

    fn sample_order() -> crate::message::OrderMessage {
        use crate::message::{MsgType, OrderMessage, StandardHeader, StandardTrailer};
        use rust_decimal::Decimal;

        OrderMessage {
            standard_header: StandardHeader::new(MsgType::NewIndexOrder, "A", "B"),
            chain_id: 1,
            address: "0x".to_string(),
            client_order_id: "ABC-DEF-GHI-1234".to_string(),
            symbol: "SY100".to_string(),
            side: ivc_core::Side::Buy,
            amount: Decimal::ONE,
            standard_trailer: StandardTrailer {
                public_key: String::new(),
                signature: String::new(),
            },
        }
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let (tx, _rx) = mpsc::channel(8);
        let conn = Arc::new(ChannelConnection::new(
            ChannelKind::Orders,
            "ws://127.0.0.1:9".to_string(),
            tx,
        ));

        let result = conn.send(sample_order()).await;
        assert!(matches!(result, Err(WsError::NotConnected)));
    }

    #[tokio::test]
    async fn test_concurrent_sends_enqueue_in_sequence_order() {
        let (tx, _rx) = mpsc::channel(8);
        let conn = Arc::new(ChannelConnection::new(
            ChannelKind::Orders,
            "ws://127.0.0.1:9".to_string(),
            tx,
        ));
        *conn.state.write() = ConnectionState::Connected;

        let mut handles = Vec::new();
        for _ in 0..32 {
            let conn = Arc::clone(&conn);
            handles.push(tokio::spawn(async move {
                conn.send(sample_order()).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut rx = conn.outbound_rx.lock().await;
        let mut seqs = Vec::new();
        while let Ok(text) = rx.try_recv() {
            let value: serde_json::Value = serde_json::from_str(&text).unwrap();
            seqs.push(value["standard_header"]["seq_num"].as_u64().unwrap());
        }
        assert_eq!(seqs, (1..=32).collect::<Vec<u64>>());
    }
}
