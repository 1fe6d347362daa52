//! Order lifecycle correlation.
//!
//! Fill and invoice events arrive asynchronously and may land before the
//! caller has attached a handler. The correlator keeps per-order state so a
//! late subscriber still sees what it missed:
//!
//! - fill percentages are cached per order id and replayed on subscribe;
//!   the cache survives unsubscribe/resubscribe
//! - an unclaimed mint invoice is buffered per order id and delivered once
//!   to the first subscriber, then dropped
//!
//! When an event arrives for an unknown id and exactly one subscriber
//! exists in that table, it is delivered to that subscriber as a fallback.
//! This covers counterparties that echo their own id instead of ours; it is
//! logged as degraded correlation and never applied with multiple
//! subscribers.

use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Callback invoked with the cumulative fill percentage (0..=100).
pub type FillHandler = Arc<dyn Fn(Decimal) + Send + Sync>;

/// Callback invoked with the opaque invoice detail.
pub type InvoiceHandler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct Tables {
    fill_handlers: HashMap<String, FillHandler>,
    invoice_handlers: HashMap<String, InvoiceHandler>,
    last_fill: HashMap<String, Decimal>,
    pending_invoices: HashMap<String, Value>,
}

/// Per-order correlation state. All methods are synchronous; delivery
/// happens on the router task.
#[derive(Default)]
pub struct OrderCorrelator {
    inner: Mutex<Tables>,
}

impl OrderCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a fill handler for `client_order_id`. If a fill percentage is
    /// already cached for the id it is replayed synchronously.
    pub fn subscribe_fills<F>(&self, client_order_id: &str, handler: F)
    where
        F: Fn(Decimal) + Send + Sync + 'static,
    {
        let handler: FillHandler = Arc::new(handler);
        let cached = {
            let mut tables = self.inner.lock();
            tables
                .fill_handlers
                .insert(client_order_id.to_string(), handler.clone());
            tables.last_fill.get(client_order_id).copied()
        };
        if let Some(percent) = cached {
            debug!(client_order_id, %percent, "Replaying cached fill percentage");
            handler(percent);
        }
    }

    /// Detach the fill handler. The cached percentage is kept so a
    /// resubscribe replays it.
    pub fn unsubscribe_fills(&self, client_order_id: &str) {
        self.inner.lock().fill_handlers.remove(client_order_id);
    }

    /// Attach an invoice handler for `client_order_id`. A buffered invoice
    /// is delivered synchronously and removed: delivery is one-shot.
    pub fn subscribe_invoice<F>(&self, client_order_id: &str, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let handler: InvoiceHandler = Arc::new(handler);
        let buffered = {
            let mut tables = self.inner.lock();
            tables
                .invoice_handlers
                .insert(client_order_id.to_string(), handler.clone());
            tables.pending_invoices.remove(client_order_id)
        };
        if let Some(detail) = buffered {
            debug!(client_order_id, "Delivering buffered invoice");
            handler(&detail);
        }
    }

    pub fn unsubscribe_invoice(&self, client_order_id: &str) {
        self.inner.lock().invoice_handlers.remove(client_order_id);
    }

    /// Drop all unclaimed invoices. Called when a new order is initiated so
    /// stale buffers from abandoned orders cannot be misdelivered.
    pub fn clear_pending_invoices(&self) {
        let mut tables = self.inner.lock();
        if !tables.pending_invoices.is_empty() {
            debug!(
                count = tables.pending_invoices.len(),
                "Clearing pending invoices"
            );
            tables.pending_invoices.clear();
        }
    }

    /// Drop every trace of an order: handlers, cached fill, buffered
    /// invoice. Used when a cancel is acknowledged.
    pub fn clear_order(&self, client_order_id: &str) {
        let mut tables = self.inner.lock();
        tables.fill_handlers.remove(client_order_id);
        tables.invoice_handlers.remove(client_order_id);
        tables.last_fill.remove(client_order_id);
        tables.pending_invoices.remove(client_order_id);
    }

    /// Process a fill event. `fill_rate` is a 0..=1 fraction; the cached and
    /// delivered value is a percentage capped at 100.
    pub fn on_fill(&self, client_order_id: &str, fill_rate: Decimal) {
        let percent = (fill_rate * Decimal::ONE_HUNDRED).min(Decimal::ONE_HUNDRED);

        let handler = {
            let mut tables = self.inner.lock();
            // Cache under the id the counterparty echoed, even when delivery
            // falls back to an aliased subscriber.
            tables
                .last_fill
                .insert(client_order_id.to_string(), percent);

            match tables.fill_handlers.get(client_order_id) {
                Some(h) => Some(h.clone()),
                None if tables.fill_handlers.len() == 1 => {
                    let (known_id, h) = tables.fill_handlers.iter().next().unwrap();
                    warn!(
                        event = "degraded_correlation",
                        echoed_id = client_order_id,
                        subscriber_id = %known_id,
                        "Fill for unknown id delivered to lone subscriber"
                    );
                    Some(h.clone())
                }
                None => {
                    debug!(client_order_id, "Fill with no subscriber, cached only");
                    None
                }
            }
        };

        if let Some(handler) = handler {
            handler(percent);
        }
    }

    /// Process a mint invoice. Delivered if a handler exists (directly or
    /// via the single-subscriber fallback), otherwise buffered for the next
    /// subscriber.
    pub fn on_invoice(&self, client_order_id: &str, detail: Value) {
        let handler = {
            let mut tables = self.inner.lock();
            match tables.invoice_handlers.get(client_order_id) {
                Some(h) => Some(h.clone()),
                None if tables.invoice_handlers.len() == 1 => {
                    let (known_id, h) = tables.invoice_handlers.iter().next().unwrap();
                    warn!(
                        event = "degraded_correlation",
                        echoed_id = client_order_id,
                        subscriber_id = %known_id,
                        "Invoice for unknown id delivered to lone subscriber"
                    );
                    Some(h.clone())
                }
                None => {
                    debug!(client_order_id, "Invoice with no subscriber, buffering");
                    tables
                        .pending_invoices
                        .insert(client_order_id.to_string(), detail.clone());
                    None
                }
            }
        };

        if let Some(handler) = handler {
            handler(&detail);
        }
    }

    #[cfg(test)]
    fn pending_invoice_count(&self) -> usize {
        self.inner.lock().pending_invoices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    fn recorder() -> (Arc<StdMutex<Vec<Decimal>>>, impl Fn(Decimal) + Send + Sync) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |p| sink.lock().unwrap().push(p))
    }

    #[test]
    fn test_fill_delivered_and_cached() {
        let correlator = OrderCorrelator::new();
        let (seen, handler) = recorder();
        correlator.subscribe_fills("ORD-1", handler);

        correlator.on_fill("ORD-1", dec!(0.25));
        correlator.on_fill("ORD-1", dec!(0.5));
        assert_eq!(*seen.lock().unwrap(), vec![dec!(25.00), dec!(50.00)]);
    }

    #[test]
    fn test_fill_percent_capped_at_100() {
        let correlator = OrderCorrelator::new();
        let (seen, handler) = recorder();
        correlator.subscribe_fills("ORD-1", handler);

        correlator.on_fill("ORD-1", dec!(1.2));
        assert_eq!(*seen.lock().unwrap(), vec![dec!(100)]);
    }

    #[test]
    fn test_cached_fill_replayed_to_late_subscriber() {
        let correlator = OrderCorrelator::new();
        correlator.on_fill("ORD-1", dec!(0.6));

        let (seen, handler) = recorder();
        correlator.subscribe_fills("ORD-1", handler);
        assert_eq!(*seen.lock().unwrap(), vec![dec!(60.00)]);
    }

    #[test]
    fn test_fill_cache_survives_unsubscribe() {
        let correlator = OrderCorrelator::new();
        let (first, handler) = recorder();
        correlator.subscribe_fills("ORD-1", handler);
        correlator.on_fill("ORD-1", dec!(0.4));
        correlator.unsubscribe_fills("ORD-1");

        // Events while detached update the cache silently.
        correlator.on_fill("ORD-1", dec!(0.8));
        assert_eq!(first.lock().unwrap().len(), 1);

        let (second, handler) = recorder();
        correlator.subscribe_fills("ORD-1", handler);
        assert_eq!(*second.lock().unwrap(), vec![dec!(80.00)]);
    }

    #[test]
    fn test_fill_replay_is_id_scoped() {
        let correlator = OrderCorrelator::new();
        correlator.on_fill("ORD-1", dec!(0.3));
        correlator.subscribe_fills("ORD-1", |_| {});

        // A subscriber for a different order sees nothing.
        let (seen, handler) = recorder();
        correlator.subscribe_fills("ORD-2", handler);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_alias_fallback_single_subscriber_only() {
        let correlator = OrderCorrelator::new();
        let (seen, handler) = recorder();
        correlator.subscribe_fills("ORD-1", handler);

        // Counterparty echoed its own id; lone subscriber still gets it.
        correlator.on_fill("VENUE-999", dec!(0.1));
        assert_eq!(*seen.lock().unwrap(), vec![dec!(10.00)]);

        // With two subscribers the fallback is off.
        let (other, handler) = recorder();
        correlator.subscribe_fills("ORD-2", handler);
        correlator.on_fill("VENUE-998", dec!(0.2));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(other.lock().unwrap().is_empty());
    }

    #[test]
    fn test_invoice_buffered_and_delivered_once() {
        let correlator = OrderCorrelator::new();
        correlator.on_invoice("ORD-1", json!({"invoice_id": "inv-1"}));
        assert_eq!(correlator.pending_invoice_count(), 1);

        let delivered = Arc::new(StdMutex::new(Vec::new()));
        let sink = delivered.clone();
        correlator.subscribe_invoice("ORD-1", move |d| sink.lock().unwrap().push(d.clone()));
        assert_eq!(delivered.lock().unwrap().len(), 1);
        assert_eq!(correlator.pending_invoice_count(), 0);

        // Resubscribing must not replay the consumed invoice.
        let sink = delivered.clone();
        correlator.subscribe_invoice("ORD-1", move |d| sink.lock().unwrap().push(d.clone()));
        assert_eq!(delivered.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_clear_pending_invoices() {
        let correlator = OrderCorrelator::new();
        correlator.on_invoice("ORD-1", json!({"invoice_id": "inv-1"}));
        correlator.on_invoice("ORD-2", json!({"invoice_id": "inv-2"}));
        correlator.clear_pending_invoices();
        assert_eq!(correlator.pending_invoice_count(), 0);
    }

    #[test]
    fn test_clear_order_removes_all_state() {
        let correlator = OrderCorrelator::new();
        let (seen, handler) = recorder();
        correlator.subscribe_fills("ORD-1", handler);
        correlator.on_fill("ORD-1", dec!(0.5));
        correlator.clear_order("ORD-1");

        // No cache left to replay.
        let (late, handler) = recorder();
        correlator.subscribe_fills("ORD-1", handler);
        assert!(late.lock().unwrap().is_empty());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
