use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;

use crate::models::events::SessionEvent;

/// Queue size for hosts that poll events.
pub const EVENT_CHANNEL_CAPACITY: usize = 4_096;

/// Receives every state change of a session, in order.
pub trait SessionObserver: Send {
    fn on_event(&mut self, event: &SessionEvent);
}

/// Forwards events to an async consumer over a bounded queue.
///
/// High-volume events stop once only a sixteenth of the queue is free, which
/// keeps room for phase and result events when the consumer lags. A closed
/// receiver is ignored.
pub struct ChannelObserver {
    tx: Sender<SessionEvent>,
    reserve: usize,
    dropped: u64,
}

impl ChannelObserver {
    pub fn new(tx: Sender<SessionEvent>) -> Self {
        let reserve = (tx.max_capacity() / 16).max(1);
        Self {
            tx,
            reserve,
            dropped: 0,
        }
    }
}

impl SessionObserver for ChannelObserver {
    fn on_event(&mut self, event: &SessionEvent) {
        if event.is_high_volume() && self.tx.capacity() <= self.reserve {
            self.dropped += 1;
            if self.dropped.is_power_of_two() {
                log::debug!("ChannelObserver: consumer lags, {} events dropped", self.dropped);
            }
            return;
        }

        match self.tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::warn!("ChannelObserver: queue full, dropping {event:?}");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
