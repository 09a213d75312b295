//! Live view of one open conversation
//!
//! A [`ConversationView`] owns everything an open chat screen needs: the
//! visible [`MessageList`], an insert subscription for the conversation and
//! a poll task that re-fetches it on a fixed interval. Both background
//! channels and optimistic sends write through the same list, and every
//! change is published as a [`ViewEvent`].
//!
//! Closing the view (explicitly with [`ConversationView::close`] or by
//! dropping it) stops both tasks and releases the subscription. Results that
//! arrive after that are discarded.

use bazaar_store::{from_row, Filter, RemoteStore, Subscription, SubscriptionId, Table};
use chrono::Utc;
use futures::channel::mpsc;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::channel::{Merge, MessageList};
use crate::config::MessagingConfig;
use crate::conversations::ConversationRepository;
use crate::error::{MessagingError, Result};
use crate::messages::{insert_message, list_messages, validate_content};
use crate::models::{Message, MessageRecord, PendingMessage};
use crate::read_state::ReadTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewPhase {
    Loading,
    Ready,
    Closed,
}

/// Which update path produced a change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// Optimistic insert or rollback of a pending message
    Local,
    /// Response to this view's own send
    Send,
    /// Insert notification from the subscription
    Realtime,
    /// Periodic re-fetch
    Poll,
}

/// Events emitted by a [`ConversationView`]
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// Initial load finished
    Ready { messages: Vec<Message> },
    /// The visible list changed; `messages` is the full new list
    MessagesUpdated {
        messages: Vec<Message>,
        source: UpdateSource,
    },
    /// A send failed and its pending entry was removed. `draft` is the text
    /// exactly as it was passed to `send_message`.
    SendFailed { draft: String, error: String },
    Closed,
}

struct ViewState {
    list: MessageList,
    phase: ViewPhase,
}

struct ViewShared {
    state: Mutex<ViewState>,
    active: AtomicBool,
    events: mpsc::UnboundedSender<ViewEvent>,
}

impl ViewShared {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Run `update` on the list and publish the result if it reports a
    /// change. Does nothing once the view is closed.
    fn apply<F>(&self, source: UpdateSource, update: F) -> bool
    where
        F: FnOnce(&mut MessageList) -> bool,
    {
        let mut state = self.state.lock();
        if !self.is_active() || !update(&mut state.list) {
            return false;
        }
        self.send(ViewEvent::MessagesUpdated {
            messages: state.list.to_vec(),
            source,
        });
        true
    }

    fn emit(&self, event: ViewEvent) {
        let _state = self.state.lock();
        if self.is_active() {
            self.send(event);
        }
    }

    /// Flip the view to closed. Returns false if it already was.
    fn deactivate(&self) -> bool {
        let mut state = self.state.lock();
        if !self.active.swap(false, Ordering::SeqCst) {
            return false;
        }
        state.phase = ViewPhase::Closed;
        true
    }

    fn send(&self, event: ViewEvent) {
        // The receiver may have been dropped; the view keeps working without it.
        let _ = self.events.unbounded_send(event);
    }
}

/// An open conversation with live updates
pub struct ConversationView {
    conversation_id: String,
    viewer: String,
    shared: Arc<ViewShared>,
    store: Arc<dyn RemoteStore>,
    config: Arc<MessagingConfig>,
    subscription_id: Option<SubscriptionId>,
    tasks: Vec<JoinHandle<()>>,
    next_seq: AtomicU64,
}

impl ConversationView {
    /// Verify access, subscribe, load the messages, then start the poll
    /// channel and mark the conversation read.
    ///
    /// The subscription is registered before the initial load, so inserts
    /// landing in between are buffered and reconciled against the loaded list.
    pub(crate) async fn open(
        store: Arc<dyn RemoteStore>,
        config: Arc<MessagingConfig>,
        conversation_id: &str,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ViewEvent>)> {
        let viewer = crate::require_viewer(store.as_ref()).await?;
        let repository = ConversationRepository::new(store.clone(), config.clone());
        let record = repository.get_conversation(conversation_id).await?;

        let subscription = match store
            .subscribe(
                Table::PrivateMessages,
                Filter::eq("conversation_id", record.id.as_str()),
            )
            .await
        {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                warn!(conversation_id = %record.id, "Subscribe failed, relying on poll: {}", e);
                None
            }
        };

        let records = match list_messages(store.as_ref(), &record.id).await {
            Ok(records) => records,
            Err(e) => {
                if let Some(subscription) = subscription {
                    if let Err(unsub) = store.unsubscribe(subscription.id).await {
                        warn!(subscription = %subscription.id, "Failed to unsubscribe: {}", unsub);
                    }
                }
                return Err(e);
            }
        };

        let (events, receiver) = mpsc::unbounded();
        let shared = Arc::new(ViewShared {
            state: Mutex::new(ViewState {
                list: MessageList::new(),
                phase: ViewPhase::Loading,
            }),
            active: AtomicBool::new(true),
            events,
        });

        {
            let mut state = shared.state.lock();
            state.list = MessageList::from_records(records);
            state.phase = ViewPhase::Ready;
            shared.send(ViewEvent::Ready {
                messages: state.list.to_vec(),
            });
        }

        let mut view = Self {
            conversation_id: record.id,
            viewer,
            shared,
            store,
            config,
            subscription_id: None,
            tasks: Vec::new(),
            next_seq: AtomicU64::new(0),
        };

        let reads = ReadTracker::new(view.store.clone());
        if let Some(subscription) = subscription {
            view.subscription_id = Some(subscription.id);
            view.tasks.push(tokio::spawn(run_subscription(
                view.shared.clone(),
                subscription,
                reads.clone(),
                view.conversation_id.clone(),
            )));
        }

        view.tasks.push(tokio::spawn(run_poll(
            view.shared.clone(),
            view.store.clone(),
            view.config.clone(),
            view.conversation_id.clone(),
        )));

        if let Err(e) = reads.mark_read(&view.conversation_id).await {
            warn!(conversation_id = %view.conversation_id, "Failed to mark conversation read: {}", e);
        }

        info!(conversation_id = %view.conversation_id, "Conversation opened");
        Ok((view, receiver))
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn phase(&self) -> ViewPhase {
        self.shared.state.lock().phase
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    /// Snapshot of the visible list
    pub fn messages(&self) -> Vec<Message> {
        self.shared.state.lock().list.to_vec()
    }

    /// Send a message with an optimistic pending entry.
    ///
    /// The pending entry is shown immediately and replaced by the stored
    /// record on success. On failure it is removed again, `SendFailed` is
    /// emitted with the untouched draft and the error is returned.
    pub async fn send_message(&self, draft: &str) -> Result<MessageRecord> {
        if !self.is_active() {
            return Err(MessagingError::Validation(
                "Conversation view is closed".to_string(),
            ));
        }
        let content = validate_content(draft, self.config.max_message_length)?;

        let pending = PendingMessage {
            temp_id: self.next_temp_id(),
            conversation_id: self.conversation_id.clone(),
            sender_id: self.viewer.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let temp_id = pending.temp_id.clone();
        self.shared.apply(UpdateSource::Local, |list| {
            list.push_pending(pending);
            true
        });

        match insert_message(
            self.store.as_ref(),
            &self.conversation_id,
            &self.viewer,
            content,
        )
        .await
        {
            Ok(record) => {
                self.shared.apply(UpdateSource::Send, |list| {
                    list.reconcile(record.clone()) != Merge::Duplicate
                });
                debug!(conversation_id = %self.conversation_id, message_id = %record.id, "Message sent");
                Ok(record)
            }
            Err(e) => {
                warn!(conversation_id = %self.conversation_id, "Send failed: {}", e);
                self.shared.apply(UpdateSource::Local, |list| {
                    list.remove_pending(&temp_id).is_some()
                });
                self.shared.emit(ViewEvent::SendFailed {
                    draft: draft.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Stop both channels, release the subscription and emit `Closed`
    pub async fn close(&mut self) {
        if !self.shared.deactivate() {
            return;
        }
        self.abort_tasks();

        if let Some(id) = self.subscription_id.take() {
            if let Err(e) = self.store.unsubscribe(id).await {
                warn!(subscription = %id, "Failed to unsubscribe: {}", e);
            }
        }

        self.shared.send(ViewEvent::Closed);
        info!(conversation_id = %self.conversation_id, "Conversation closed");
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    fn next_temp_id(&self) -> String {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        format!(
            "{}{}-{}",
            self.config.temp_id_prefix,
            Utc::now().timestamp_millis(),
            seq
        )
    }
}

impl Drop for ConversationView {
    fn drop(&mut self) {
        if !self.shared.deactivate() {
            return;
        }
        self.abort_tasks();

        if let Some(id) = self.subscription_id.take() {
            // Without a runtime the aborted task's receiver is dropped and
            // the hub prunes it on its next publish.
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let store = self.store.clone();
                handle.spawn(async move {
                    if let Err(e) = store.unsubscribe(id).await {
                        warn!(subscription = %id, "Failed to unsubscribe: {}", e);
                    }
                });
            }
        }

        self.shared.send(ViewEvent::Closed);
        debug!(conversation_id = %self.conversation_id, "Conversation view dropped");
    }
}

async fn run_subscription(
    shared: Arc<ViewShared>,
    mut subscription: Subscription,
    reads: ReadTracker,
    conversation_id: String,
) {
    // Dropped with this task, which cancels read markers still in flight
    let mut marks = JoinSet::new();

    loop {
        tokio::select! {
            row = subscription.recv() => {
                let Some(row) = row else { break };
                if !shared.is_active() {
                    break;
                }

                let record: MessageRecord = match from_row(row) {
                    Ok(record) => record,
                    Err(e) => {
                        warn!(%conversation_id, "Dropping malformed message row: {}", e);
                        continue;
                    }
                };

                shared.apply(UpdateSource::Realtime, |list| {
                    list.reconcile(record) != Merge::Duplicate
                });

                let shared = shared.clone();
                let reads = reads.clone();
                let id = conversation_id.clone();
                marks.spawn(async move {
                    if !shared.is_active() {
                        return;
                    }
                    if let Err(e) = reads.mark_read(&id).await {
                        warn!(conversation_id = %id, "Failed to mark conversation read: {}", e);
                    }
                });
            }
            Some(_) = marks.join_next(), if !marks.is_empty() => {}
        }
    }
    debug!(%conversation_id, "Subscription channel stopped");
}

async fn run_poll(
    shared: Arc<ViewShared>,
    store: Arc<dyn RemoteStore>,
    config: Arc<MessagingConfig>,
    conversation_id: String,
) {
    let mut delay = config.poll_interval();
    loop {
        tokio::time::sleep(delay).await;
        if !shared.is_active() {
            break;
        }

        match list_messages(store.as_ref(), &conversation_id).await {
            Ok(records) => {
                delay = config.poll_interval();
                shared.apply(UpdateSource::Poll, |list| {
                    list.merge_snapshot(records, config.poll_merge)
                });
            }
            Err(e) => {
                warn!(%conversation_id, "Poll failed: {}", e);
                delay = config.poll_error_interval();
            }
        }
    }
    debug!(%conversation_id, "Poll channel stopped");
}
