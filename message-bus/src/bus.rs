//! Topic bus with per-subscriber mailboxes
//!
//! Each `listen` registers a mailbox on a channel; `publish` appends to
//! every registered mailbox and wakes waiters. Mailboxes are unbounded
//! (payloads are short status strings) and strictly FIFO.

use crate::types::Topic;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Duration, Instant};
use tracing::trace;

/// Per-subscriber message queue plus its wakeup.
#[derive(Default)]
struct Mailbox {
    messages: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl Mailbox {
    fn push(&self, payload: &str) {
        self.messages.lock().push_back(payload.to_string());
        self.notify.notify_one();
    }

    fn pop(&self) -> Option<String> {
        self.messages.lock().pop_front()
    }
}

struct Subscription {
    handle_id: u64,
    mailbox: Arc<Mailbox>,
}

/// Subscription handle returned by [`NotificationBus::listen`].
///
/// Dropping the handle does not unsubscribe; call
/// [`NotificationBus::unlisten`] when done.
pub struct ListenHandle {
    id: u64,
    topic: Topic,
    mailbox: Arc<Mailbox>,
}

impl ListenHandle {
    /// Topic this handle is subscribed to.
    pub fn topic(&self) -> &Topic {
        &self.topic
    }
}

impl std::fmt::Debug for ListenHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenHandle")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .finish()
    }
}

#[derive(Default)]
struct BusState {
    next_handle_id: u64,
    channels: HashMap<String, Vec<Subscription>>,
}

/// In-process notification bus.
#[derive(Default)]
pub struct NotificationBus {
    state: Mutex<BusState>,
}

impl NotificationBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a payload to every current subscriber of `topic`.
    ///
    /// Never blocks. When nobody listens the message is dropped.
    pub fn publish(&self, topic: &Topic, payload: &str) {
        let state = self.state.lock();
        match state.channels.get(topic.as_str()) {
            Some(subs) => {
                for sub in subs {
                    sub.mailbox.push(payload);
                }
                trace!(topic = %topic, payload, subscribers = subs.len(), "published");
            }
            None => trace!(topic = %topic, payload, "dropped, no subscribers"),
        }
    }

    /// Register a subscriber on `topic`.
    pub fn listen(&self, topic: Topic) -> ListenHandle {
        let mut state = self.state.lock();
        state.next_handle_id += 1;
        let id = state.next_handle_id;
        let mailbox = Arc::new(Mailbox::default());
        state
            .channels
            .entry(topic.as_str().to_string())
            .or_default()
            .push(Subscription {
                handle_id: id,
                mailbox: mailbox.clone(),
            });
        ListenHandle { id, topic, mailbox }
    }

    /// Wait up to `timeout` for the next payload on `handle`.
    ///
    /// Returns `None` on timeout. Messages that arrived before the call
    /// are returned immediately, in publish order.
    pub async fn wait(&self, handle: &ListenHandle, timeout: Duration) -> Option<String> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(payload) = handle.mailbox.pop() {
                return Some(payload);
            }
            if timeout_at(deadline, handle.mailbox.notify.notified())
                .await
                .is_err()
            {
                // Deadline hit; one last look in case of a late publish.
                return handle.mailbox.pop();
            }
        }
    }

    /// Remove the subscription behind `handle`. Idempotent.
    pub fn unlisten(&self, handle: &ListenHandle) {
        let mut state = self.state.lock();
        if let Some(subs) = state.channels.get_mut(handle.topic.as_str()) {
            subs.retain(|s| s.handle_id != handle.id);
            if subs.is_empty() {
                state.channels.remove(handle.topic.as_str());
            }
        }
    }
}
