//! Outbound delivery handles, one per transport connection.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::events::ServerEvent;

/// Result of handing an event to a connection's sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// The connection's queue is full; the event was dropped.
    Dropped,
    /// The connection's receiving side is gone.
    Closed,
    /// The transport has no push channel (polling clients).
    Detached,
}

/// Abstraction over how a transport receives outbound events.
///
/// Implementations must not block: the coordinator delivers fire-and-forget.
pub trait EventSink: Send + Sync {
    fn deliver(&self, event: Arc<ServerEvent>) -> Delivery;
}

impl EventSink for mpsc::Sender<Arc<ServerEvent>> {
    fn deliver(&self, event: Arc<ServerEvent>) -> Delivery {
        match self.try_send(event) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => Delivery::Dropped,
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }
}

/// Sink for transports without push capability. Events are discarded; the
/// client reads state back through queries.
pub struct DetachedSink;

impl EventSink for DetachedSink {
    fn deliver(&self, _event: Arc<ServerEvent>) -> Delivery {
        Delivery::Detached
    }
}

/// Create a bounded channel-backed sink and its receiving half.
pub fn channel(capacity: usize) -> (Arc<dyn EventSink>, mpsc::Receiver<Arc<ServerEvent>>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (Arc::new(tx), rx)
}
