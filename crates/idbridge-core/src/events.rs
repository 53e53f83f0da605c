//! Authentication events and their deferred delivery.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::CredentialError;

/// Notification emitted by an `AuthenticationClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// First transition into either steady state. Opt-in, fires once.
    Ready,
    Authenticated,
    /// Carries the broker error that caused the transition, if any
    Deauthenticated(Option<CredentialError>),
}

/// Receiving end handed to listeners
pub type EventReceiver = mpsc::UnboundedReceiver<AuthEvent>;

type Listeners = Arc<Mutex<Vec<mpsc::UnboundedSender<AuthEvent>>>>;

/// Queues events and delivers them from a separate task.
///
/// `emit` never runs listener code: it only enqueues. The dispatcher task
/// fans each event out to whoever is subscribed when it gets to run, so on
/// a current-thread runtime a listener subscribed right after the call that
/// emitted still receives the event. Delivery order matches emit order.
pub(crate) struct EventHub {
    queue: mpsc::UnboundedSender<AuthEvent>,
    listeners: Listeners,
}

impl EventHub {
    /// Spawns the dispatcher on `handle`
    pub(crate) fn new(handle: &Handle) -> Self {
        let (queue, rx) = mpsc::unbounded_channel();
        let listeners: Listeners = Arc::default();
        handle.spawn(Self::dispatch(rx, Arc::clone(&listeners)));
        Self { queue, listeners }
    }

    pub(crate) fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub(crate) fn emit(&self, event: AuthEvent) {
        debug!(?event, "Event queued");
        // Only fails once the dispatcher is gone, i.e. the runtime shut down
        let _ = self.queue.send(event);
    }

    async fn dispatch(mut rx: mpsc::UnboundedReceiver<AuthEvent>, listeners: Listeners) {
        while let Some(event) = rx.recv().await {
            let mut active = listeners.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop listeners whose receiver has gone away
            active.retain(|tx| tx.send(event.clone()).is_ok());
        }
        debug!("Event dispatcher stopped");
    }
}
