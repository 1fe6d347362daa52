//! Quote request/response bridge.
//!
//! Each outbound quote request registers a one-shot resolver keyed by its
//! client quote id. Responses resolve the waiter and, via the quote id to
//! symbol map, feed the symbol price table (`amount / quantity_possible`).
//! The background poll loop registers symbol mappings without a waiter;
//! an unanswered poll is displaced by the symbol's next tick so the
//! tracking maps stay bounded.

use ivc_core::Symbol;
use ivc_ws::IndexQuoteResponse;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tracing::debug;

#[derive(Default)]
pub struct QuoteBridge {
    pending: Mutex<HashMap<String, oneshot::Sender<IndexQuoteResponse>>>,
    quote_symbols: Mutex<HashMap<String, Symbol>>,
    // At most one outstanding poll id per symbol; an unanswered poll is
    // displaced by the next tick instead of accumulating.
    poll_ids: Mutex<HashMap<Symbol, String>>,
    prices: RwLock<HashMap<Symbol, Decimal>>,
}

impl QuoteBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `client_quote_id`. The returned receiver
    /// resolves with the matching response.
    pub fn register(
        &self,
        client_quote_id: &str,
        symbol: Symbol,
    ) -> oneshot::Receiver<IndexQuoteResponse> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(client_quote_id.to_string(), tx);
        self.quote_symbols
            .lock()
            .insert(client_quote_id.to_string(), symbol);
        rx
    }

    /// Track a fire-and-forget quote (price polling): no waiter, but the
    /// response still updates the price table. The symbol's previous
    /// unanswered poll entry, if any, is dropped.
    pub fn note_symbol(&self, client_quote_id: &str, symbol: Symbol) {
        let stale = self
            .poll_ids
            .lock()
            .insert(symbol.clone(), client_quote_id.to_string());
        let mut symbols = self.quote_symbols.lock();
        if let Some(stale_id) = stale {
            symbols.remove(&stale_id);
        }
        symbols.insert(client_quote_id.to_string(), symbol);
    }

    /// Remove a waiter whose deadline expired so the entry does not leak.
    pub fn abandon(&self, client_quote_id: &str) {
        self.pending.lock().remove(client_quote_id);
        if let Some(symbol) = self.quote_symbols.lock().remove(client_quote_id) {
            let mut polls = self.poll_ids.lock();
            if polls.get(&symbol).map(String::as_str) == Some(client_quote_id) {
                polls.remove(&symbol);
            }
        }
    }

    /// Resolve a quote response: wake the waiter (if any) and update the
    /// symbol price table.
    pub fn on_response(&self, response: IndexQuoteResponse) {
        let id = response.client_quote_id.clone();

        if let Some(symbol) = self.quote_symbols.lock().remove(&id) {
            {
                let mut polls = self.poll_ids.lock();
                if polls.get(&symbol).map(String::as_str) == Some(id.as_str()) {
                    polls.remove(&symbol);
                }
            }
            match response.unit_price() {
                Some(price) => {
                    debug!(%symbol, %price, "Quote price updated");
                    self.prices.write().insert(symbol, price);
                }
                None => {
                    debug!(%symbol, "Quote with zero quantity, price unchanged");
                }
            }
        }

        if let Some(waiter) = self.pending.lock().remove(&id) {
            // Receiver may have timed out and dropped; that is fine.
            let _ = waiter.send(response);
        }
    }

    /// Latest unit price observed for `symbol`.
    pub fn price(&self, symbol: &Symbol) -> Option<Decimal> {
        self.prices.read().get(symbol).copied()
    }
}
