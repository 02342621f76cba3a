//! Loot event fan-out.
//!
//! Observers are invoked in registration order, on the thread that produced
//! the event. A failing or panicking observer is logged and skipped; later
//! observers and later packets are unaffected. Slow consumers should use
//! [`ChannelObserver`], which never blocks the producer.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::error::{ProtocolError, Result};
use crate::world::LootEvent;

pub trait LootObserver: Send + Sync {
    fn on_loot(&self, event: &LootEvent) -> Result<()>;
}

impl<F> LootObserver for F
where
    F: Fn(&LootEvent) + Send + Sync,
{
    fn on_loot(&self, event: &LootEvent) -> Result<()> {
        self(event);
        Ok(())
    }
}

/// Forwards events into a bounded tokio channel with `try_send`.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::Sender<LootEvent>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::Sender<LootEvent>) -> Self {
        Self { tx }
    }

    /// Observer plus the stream its events arrive on.
    pub fn bounded(capacity: usize) -> (Self, ReceiverStream<LootEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), ReceiverStream::new(rx))
    }
}

impl LootObserver for ChannelObserver {
    fn on_loot(&self, event: &LootEvent) -> Result<()> {
        match self.tx.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ProtocolError::Observer(
                "loot queue full, event dropped".to_string(),
            )),
            Err(TrySendError::Closed(_)) => Err(ProtocolError::Observer(
                "loot queue receiver dropped".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registered observers.
#[derive(Default)]
pub struct LootSink {
    observers: RwLock<Vec<(SubscriptionId, Arc<dyn LootObserver>)>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for LootSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LootSink")
            .field("observers", &self.len())
            .finish()
    }
}

impl LootSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: Arc<dyn LootObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((id, observer));
        debug!(id = id.0, "Loot observer subscribed");
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self
            .observers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        before != observers.len()
    }

    /// Register a bounded channel observer and return its stream.
    pub fn channel(&self, capacity: usize) -> ReceiverStream<LootEvent> {
        let (observer, stream) = ChannelObserver::bounded(capacity);
        self.subscribe(Arc::new(observer));
        stream
    }

    pub fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every observer. Returns how many accepted it.
    pub fn publish(&self, event: &LootEvent) -> usize {
        // snapshot so observers run without holding the registry lock
        let observers: Vec<_> = self
            .observers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        let mut delivered = 0;
        for (id, observer) in observers {
            match catch_unwind(AssertUnwindSafe(|| observer.on_loot(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!(id = id.0, error = %e, "Loot observer failed"),
                Err(_) => warn!(id = id.0, "Loot observer panicked"),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Player;
    use std::sync::Mutex;

    fn sample(quantity: i64) -> LootEvent {
        LootEvent::new("T4_BAG", "Bag", quantity, Player::new("A"), Player::new("B"))
    }

    #[test]
    fn test_failing_observer_does_not_stop_others() {
        let sink = LootSink::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        sink.subscribe(Arc::new(|_: &LootEvent| panic!("observer bug")));
        let seen_clone = Arc::clone(&seen);
        sink.subscribe(Arc::new(move |event: &LootEvent| {
            seen_clone.lock().unwrap().push(event.quantity)
        }));

        assert_eq!(sink.publish(&sample(1)), 1);
        assert_eq!(sink.publish(&sample(2)), 1);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_channel_drops_when_full() {
        let sink = LootSink::new();
        let stream = sink.channel(1);
        assert_eq!(sink.publish(&sample(1)), 1);
        assert_eq!(sink.publish(&sample(2)), 0);

        let mut rx = stream.into_inner();
        assert_eq!(rx.try_recv().unwrap().quantity, 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unsubscribe() {
        let sink = LootSink::new();
        let id = sink.subscribe(Arc::new(|_: &LootEvent| {}));
        assert_eq!(sink.len(), 1);
        assert!(sink.unsubscribe(id));
        assert!(!sink.unsubscribe(id));
        assert!(sink.is_empty());
    }
}
