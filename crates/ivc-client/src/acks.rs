//! ACK/NAK handler slots.
//!
//! The client exposes one overwritable handler per slot. NAKs carry a
//! human-readable reason and are delivered as data, never surfaced as
//! errors. ACKs are discriminated by the acknowledged message type (see
//! `AckMessage::acked_type`).

use ivc_ws::{AckKind, AckMessage};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

pub type NakHandler = Arc<dyn Fn(&str) + Send + Sync>;
pub type AckHandler = Arc<dyn Fn(AckKind, Option<&str>) + Send + Sync>;

#[derive(Default)]
pub struct AckRouter {
    nak: Mutex<Option<NakHandler>>,
    ack: Mutex<Option<AckHandler>>,
}

impl AckRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the NAK handler, replacing any previous one.
    pub fn set_nak_handler<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.nak.lock() = Some(Arc::new(handler));
    }

    /// Set the ACK handler, replacing any previous one.
    pub fn set_ack_handler<F>(&self, handler: F)
    where
        F: Fn(AckKind, Option<&str>) + Send + Sync + 'static,
    {
        *self.ack.lock() = Some(Arc::new(handler));
    }

    pub fn on_nak(&self, reason: &str) {
        let handler = self.nak.lock().clone();
        match handler {
            Some(h) => h(reason),
            None => debug!(reason, "NAK with no handler registered"),
        }
    }

    pub fn on_ack(&self, ack: &AckMessage) {
        let kind = ack.acked_type();
        let handler = self.ack.lock().clone();
        match handler {
            Some(h) => h(kind, ack.client_order_id.as_deref()),
            None => debug!(?kind, "ACK with no handler registered"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn test_nak_handler_is_overwritable() {
        let router = AckRouter::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));

        let sink = seen.clone();
        router.set_nak_handler(move |r| sink.lock().unwrap().push(format!("first:{r}")));
        let sink = seen.clone();
        router.set_nak_handler(move |r| sink.lock().unwrap().push(format!("second:{r}")));

        router.on_nak("bad symbol");
        assert_eq!(*seen.lock().unwrap(), vec!["second:bad symbol".to_string()]);
    }

    #[test]
    fn test_nak_without_handler_is_silent() {
        let router = AckRouter::new();
        router.on_nak("nobody listening");
    }
}
