use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{Instant, sleep_until};

use crate::common::{
    ChatEnvelope, Direction, FriendRef, Message, MessageData, MessageId, TypingEnvelope, UserId,
};
use crate::network::{ApiError, MessageApi, Subscription, TransportChannel};
use crate::session::SessionContext;

use super::store::{ConversationStore, ConversationView, LoadState, LocalUser};

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no active session")]
    NotLoggedIn,
}

/// Changes the presentation layer may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerUpdate {
    HistoryLoaded { friend_id: UserId, count: usize },
    MessageReceived(MessageId),
    TypingChanged(bool),
    /// Short-lived, user-facing notice about a failure.
    Notice(String),
}

/// Completions and pushes, delivered back to the controller's own turn.
enum Inbox {
    History {
        generation: u64,
        friend_id: UserId,
        result: Result<Vec<Message>, ApiError>,
    },
    Chat {
        generation: u64,
        envelope: ChatEnvelope,
    },
    Typing {
        generation: u64,
        envelope: TypingEnvelope,
    },
    TypingExpired {
        generation: u64,
    },
    PersistFailed {
        message_id: MessageId,
        error: ApiError,
    },
}

/// At most one pending expiry; rescheduling aborts the previous one.
#[derive(Default)]
struct TypingTimer {
    pending: Option<AbortHandle>,
}

impl TypingTimer {
    fn reschedule(&mut self, handle: AbortHandle) {
        self.cancel();
        self.pending = Some(handle);
    }

    fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for TypingTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct OpenConversation {
    generation: u64,
    store: ConversationStore,
    subscription: Subscription,
    typing_timer: TypingTimer,
}

/// Drives one conversation view: fetch on open, optimistic send, merge of
/// pushed events and typing expiry.
///
/// All state changes happen inside the controller's own calls (`pump` or
/// `next_update`); network work runs as spawned tasks that report back
/// through the inbox.
pub struct ConversationController {
    session: SessionContext,
    channel: TransportChannel,
    api: Arc<dyn MessageApi>,
    runtime: Handle,
    inbox_tx: mpsc::UnboundedSender<Inbox>,
    inbox_rx: mpsc::UnboundedReceiver<Inbox>,
    generation: u64,
    open: Option<OpenConversation>,
}

impl ConversationController {
    pub fn new(
        session: SessionContext,
        channel: TransportChannel,
        api: Arc<dyn MessageApi>,
        runtime: Handle,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            session,
            channel,
            api,
            runtime,
            inbox_tx,
            inbox_rx,
            generation: 0,
            open: None,
        }
    }

    pub fn active_friend(&self) -> Option<&FriendRef> {
        self.open.as_ref().map(|open| open.store.friend())
    }

    pub fn store(&self) -> Option<&ConversationStore> {
        self.open.as_ref().map(|open| &open.store)
    }

    pub fn view(&self) -> Option<ConversationView<'_>> {
        self.store().map(ConversationStore::view)
    }

    pub fn is_typing(&self) -> bool {
        self.store().is_some_and(ConversationStore::is_typing)
    }

    /// A conversation is open and its history has arrived, so `submit` will
    /// be accepted.
    pub fn accepts_input(&self) -> bool {
        self.store()
            .is_some_and(|store| store.state() == LoadState::Ready)
    }

    /// Switch to `friend`: drop the previous conversation, subscribe to the
    /// channel and start fetching history.
    pub fn open(&mut self, friend: FriendRef) -> Result<(), ControllerError> {
        let session = self.session.current().ok_or(ControllerError::NotLoggedIn)?;
        // Listeners of the previous conversation go before new ones are added.
        self.close();

        self.generation += 1;
        let generation = self.generation;
        let friend_id = friend.id;
        log::info!("Opening conversation with {} ({friend_id})", friend.name);

        let mut subscription = Subscription::new(self.channel.clone());
        let tx = self.inbox_tx.clone();
        subscription.on_chat_received(move |envelope| {
            let _ = tx.send(Inbox::Chat {
                generation,
                envelope: envelope.clone(),
            });
        });
        let tx = self.inbox_tx.clone();
        subscription.on_typing_received(move |envelope| {
            let _ = tx.send(Inbox::Typing {
                generation,
                envelope: envelope.clone(),
            });
        });

        log::debug!(
            "Conversation {generation} subscribed; {} channel listener(s) registered",
            self.channel.listener_count()
        );

        self.open = Some(OpenConversation {
            generation,
            store: ConversationStore::new(friend, LocalUser::from(&session)),
            subscription,
            typing_timer: TypingTimer::default(),
        });

        let api = Arc::clone(&self.api);
        let tx = self.inbox_tx.clone();
        self.runtime.spawn(async move {
            let result = api.fetch_history(friend_id).await;
            let _ = tx.send(Inbox::History {
                generation,
                friend_id,
                result,
            });
        });

        Ok(())
    }

    /// Send `text` to the open friend. Returns the local id of the new entry,
    /// or `None` if nothing was sent.
    pub fn submit(&mut self, text: &str) -> Option<MessageId> {
        if text.trim().is_empty() {
            return None;
        }
        let Some(open) = self.open.as_mut() else {
            log::warn!("Ignoring submit: no conversation is open");
            return None;
        };
        if open.store.state() == LoadState::Loading {
            log::debug!(
                "Ignoring submit: history with {} is still loading",
                open.store.friend().name
            );
            return None;
        }

        let id = open.store.append_optimistic(text);
        let friend = open.store.friend().clone();
        let me = open.store.me().id;

        self.channel.send_chat(
            &friend.name,
            MessageData {
                id: Some(id),
                content: text.to_string(),
                sender_id: Some(me),
                receiver_id: Some(friend.id),
                direction: Direction::Received,
                sent_at: Some(Utc::now()),
            },
        );

        let api = Arc::clone(&self.api);
        let tx = self.inbox_tx.clone();
        let content = text.to_string();
        self.runtime.spawn(async move {
            match api.persist_message(friend.id, &content).await {
                Ok(ack) if !ack.message.is_empty() => log::debug!("Message {id}: {}", ack.message),
                Ok(_) => {}
                Err(error) => {
                    let _ = tx.send(Inbox::PersistFailed {
                        message_id: id,
                        error,
                    });
                }
            }
        });

        Some(id)
    }

    /// Tell the open friend we are typing.
    pub fn notify_typing(&self) {
        if let Some(open) = &self.open {
            self.channel.send_typing(&open.store.friend().name);
        }
    }

    /// Leave the open conversation. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(mut open) = self.open.take() {
            open.subscription.release();
            open.typing_timer.cancel();
            log::debug!("Closed conversation with {}", open.store.friend().name);
        }
    }

    /// Apply everything that has arrived so far without waiting.
    pub fn pump(&mut self) -> Vec<ControllerUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.inbox_rx.try_recv() {
            if let Some(update) = self.apply(event) {
                updates.push(update);
            }
        }
        updates
    }

    /// Wait for the next change to the open conversation.
    pub async fn next_update(&mut self) -> ControllerUpdate {
        loop {
            // The controller holds a sender, so the inbox never closes.
            let Some(event) = self.inbox_rx.recv().await else {
                continue;
            };
            if let Some(update) = self.apply(event) {
                return update;
            }
        }
    }

    fn current(&mut self, generation: u64) -> Option<&mut OpenConversation> {
        self.open
            .as_mut()
            .filter(|open| open.generation == generation)
    }

    fn apply(&mut self, event: Inbox) -> Option<ControllerUpdate> {
        match event {
            Inbox::History {
                generation,
                friend_id,
                result,
            } => {
                let Some(open) = self
                    .current(generation)
                    .filter(|open| open.store.friend().id == friend_id)
                else {
                    log::debug!("Discarding stale history for friend {friend_id}");
                    return None;
                };
                match result {
                    Ok(history) => {
                        let count = history.len();
                        open.store.load(history);
                        Some(ControllerUpdate::HistoryLoaded { friend_id, count })
                    }
                    Err(err) => {
                        log::warn!("Failed to fetch messages for friend {friend_id}: {err}");
                        open.store.mark_ready();
                        Some(ControllerUpdate::Notice(
                            "Sorry! Failed to get messages".to_string(),
                        ))
                    }
                }
            }
            Inbox::Chat {
                generation,
                envelope,
            } => {
                let open = self.current(generation)?;
                open.store
                    .merge_inbound(&envelope)
                    .map(ControllerUpdate::MessageReceived)
            }
            Inbox::Typing {
                generation,
                envelope,
            } => {
                let tx = self.inbox_tx.clone();
                let runtime = self.runtime.clone();
                let open = self.current(generation)?;
                if !open.store.accepts(&envelope) {
                    return None;
                }
                let deadline = open.store.set_typing(Instant::now());
                let timer = runtime.spawn(async move {
                    sleep_until(deadline).await;
                    let _ = tx.send(Inbox::TypingExpired { generation });
                });
                open.typing_timer.reschedule(timer.abort_handle());
                Some(ControllerUpdate::TypingChanged(true))
            }
            Inbox::TypingExpired { generation } => {
                let open = self.current(generation)?;
                open.store
                    .expire_typing(Instant::now())
                    .then_some(ControllerUpdate::TypingChanged(false))
            }
            Inbox::PersistFailed { message_id, error } => {
                // The optimistic entry stays; there is no retry.
                log::warn!("Message {message_id} was not persisted: {error}");
                Some(ControllerUpdate::Notice(
                    "Sorry! Failed to send message, please try again".to_string(),
                ))
            }
        }
    }
}
