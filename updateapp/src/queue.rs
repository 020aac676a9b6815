//! Serializes task events pushed by the update service.
//!
//! Events arrive on the service's callback, faster than the handler can show them.
//! [`MessageQueue::execute`] appends to the tail and only the caller that finds the
//! queue empty drives the drain loop, so at most one handler runs at any time and
//! messages are handled in arrival order. The head stays queued while it is being
//! handled, which keeps [`is_empty`](MessageQueue::is_empty) false until the last
//! message is done.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::{debug, error, info};
use tokio::runtime::Handle;

use crate::base::{AppContext, EventInfo, PlatformError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Platform error {0}")]
    Platform(#[from] PlatformError),
    #[error("Unknown upgrade status {0}")]
    UnknownStatus(i32),
}

#[derive(Debug, Clone)]
pub struct Message {
    pub context: Arc<AppContext>,
    pub event_info: EventInfo,
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle_message(&self, message: Message) -> Result<(), Error>;
}

pub struct MessageQueue {
    queue: Mutex<VecDeque<Message>>,
    handler: Arc<dyn MessageHandler>,
}

impl MessageQueue {
    pub fn new(handler: Arc<dyn MessageHandler>) -> Self {
        Self { queue: Mutex::new(VecDeque::new()), handler }
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Message>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues `message`. Returns right away if another caller is draining,
    /// otherwise waits until every queued message is handled. The drain runs in its
    /// own task and goes on if this future is dropped.
    pub async fn execute(self: &Arc<Self>, message: Message) {
        if self.push(message) {
            let queue = self.clone();
            if let Err(e) = tokio::spawn(async move { queue.drain().await }).await {
                error!("drain aborted: {e}");
            }
        }
    }

    /// Queues `message` from outside the runtime, the service callback thread for
    /// instance. Arrival order is fixed before returning, draining happens on `handle`.
    pub fn execute_detached(self: &Arc<Self>, message: Message, handle: &Handle) {
        if self.push(message) {
            let queue = self.clone();
            handle.spawn(async move { queue.drain().await });
        }
    }

    // True if the caller is now responsible for draining
    fn push(&self, message: Message) -> bool {
        let mut queue = self.queue();
        queue.push_back(message);
        if queue.len() > 1 {
            debug!("queued, {} pending", queue.len());
            return false;
        }

        true
    }

    /// True when nothing is queued or being handled
    pub fn is_empty(&self) -> bool {
        self.queue().is_empty()
    }

    async fn drain(&self) {
        let mut next = self.queue().front().cloned();
        while let Some(message) = next {
            self.handle(message).await;
            next = {
                let mut queue = self.queue();
                queue.pop_front();
                queue.front().cloned()
            };
        }
    }

    // Runs the handler in its own task so a panic surfaces as a join error
    // instead of unwinding through the drain loop.
    async fn handle(&self, message: Message) {
        let event_id = message.event_info.event_id;
        let handler = self.handler.clone();
        let result =
            tokio::spawn(async move { handler.handle_message(message).await }).await;

        match result {
            Ok(Ok(())) => info!("handled {event_id:?}"),
            Ok(Err(e)) => error!("handle {event_id:?} failed: {e}"),
            Err(e) if e.is_panic() => error!("handler panicked on {event_id:?}"),
            Err(e) => error!("handler aborted on {event_id:?}: {e}"),
        }
    }
}
