//! Bounded fan-out of engine events to a dynamic set of subscribers.
//!
//! Built on a tokio broadcast channel: publishing never blocks, and a
//! subscriber that falls behind loses the oldest events (it observes
//! `Lagged(n)` and carries on) instead of slowing the engine down.

use crate::event::EngineEvent;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Send to every current subscriber. Returns how many received it.
    pub fn publish(&self, event: EngineEvent) -> usize {
        match self.tx.send(event) {
            Ok(n) => n,
            Err(broadcast::error::SendError(event)) => {
                // No receivers is fine.
                log::debug!("event bus: {} dropped, no subscribers", event.event_type());
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Run `handler` on every event in its own task. Errors and panics in
    /// the handler are logged per event and never reach the publisher.
    /// Must be called from within a tokio runtime.
    pub fn spawn_handler<F>(&self, name: &str, mut handler: F) -> tokio::task::JoinHandle<()>
    where
        F: FnMut(&EngineEvent) -> anyhow::Result<()> + Send + 'static,
    {
        let mut rx = self.subscribe();
        let name = name.to_string();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        match catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                log::warn!("subscriber={name} failed on {}: {e}", event.event_type());
                            }
                            Err(_) => {
                                log::warn!("subscriber={name} panicked on {}", event.event_type());
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        log::warn!("subscriber={name} lagged, skipped {n} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            log::debug!("subscriber={name} stopped");
        })
    }
}
