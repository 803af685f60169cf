use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

use tokio::sync::mpsc;

use crate::common::{ChatEnvelope, InboundEvent, MessageData, TransportCommand, TypingEnvelope};
use crate::session::SessionContext;

use super::socket;

type ChatHandler = Arc<dyn Fn(&ChatEnvelope) + Send + Sync>;
type TypingHandler = Arc<dyn Fn(&TypingEnvelope) + Send + Sync>;

/// Handle returned by listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default, Clone)]
struct ListenerTable {
    chat: Vec<(ListenerId, ChatHandler)>,
    typing: Vec<(ListenerId, TypingHandler)>,
}

impl ListenerTable {
    fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.chat.len() + self.typing.len();
        self.chat.retain(|(listener, _)| *listener != id);
        self.typing.retain(|(listener, _)| *listener != id);
        before != self.chat.len() + self.typing.len()
    }
}

struct Inner {
    session: SessionContext,
    outbound: mpsc::UnboundedSender<TransportCommand>,
    // Copy-on-write: dispatch works on a snapshot, registration swaps the table.
    listeners: RwLock<Arc<ListenerTable>>,
    next_listener: AtomicU64,
}

/// Process-wide connection to the messaging server.
///
/// Cloning is cheap; every clone talks to the same connection and listener table.
#[derive(Clone)]
pub struct TransportChannel {
    inner: Arc<Inner>,
}

impl TransportChannel {
    /// Builds a channel without a connection. Outbound commands are yielded
    /// on the returned receiver; inbound events are fed through [`dispatch`].
    ///
    /// [`dispatch`]: TransportChannel::dispatch
    pub fn new(session: SessionContext) -> (Self, mpsc::UnboundedReceiver<TransportCommand>) {
        let (outbound, commands) = mpsc::unbounded_channel();
        let channel = Self {
            inner: Arc::new(Inner {
                session,
                outbound,
                listeners: RwLock::new(Arc::new(ListenerTable::default())),
                next_listener: AtomicU64::new(1),
            }),
        };
        (channel, commands)
    }

    /// Builds a channel and spawns the socket task that keeps it connected.
    pub fn connect(session: SessionContext, socket_url: &str) -> Self {
        let (channel, commands) = Self::new(session);
        let endpoint = socket::endpoint(socket_url);
        let weak = channel.downgrade();
        tokio::spawn(async move {
            if let Err(err) = socket::run(endpoint, commands, weak).await {
                log::error!("Socket task terminated: {err}");
            }
        });
        channel
    }

    pub fn downgrade(&self) -> WeakChannel {
        WeakChannel {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Push a chat payload to `recipient_username`. Fire-and-forget.
    pub fn send_chat(&self, recipient_username: &str, payload: MessageData) {
        let Some(sender_user_id) = self.inner.session.user_id() else {
            log::warn!("Dropping outbound chat: no active session");
            return;
        };
        self.push(TransportCommand::SendChat(ChatEnvelope {
            recipient_username: recipient_username.to_string(),
            sender_user_id,
            payload,
        }));
    }

    /// Push a typing notice to `recipient_username`. Fire-and-forget.
    pub fn send_typing(&self, recipient_username: &str) {
        let Some(sender_user_id) = self.inner.session.user_id() else {
            log::warn!("Dropping outbound typing notice: no active session");
            return;
        };
        self.push(TransportCommand::SendTyping(TypingEnvelope {
            recipient_username: recipient_username.to_string(),
            sender_user_id,
        }));
    }

    fn push(&self, command: TransportCommand) {
        if let Err(err) = self.inner.outbound.send(command) {
            log::warn!("Socket task is gone; dropping {}", err.0.event_name());
        }
    }

    pub fn on_chat_received<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&ChatEnvelope) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.update_listeners(|table| table.chat.push((id, Arc::new(handler))));
        id
    }

    pub fn on_typing_received<F>(&self, handler: F) -> ListenerId
    where
        F: Fn(&TypingEnvelope) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.update_listeners(|table| table.typing.push((id, Arc::new(handler))));
        id
    }

    /// Removes a listener. Unknown or already removed ids are ignored.
    pub fn deregister(&self, id: ListenerId) -> bool {
        let mut removed = false;
        self.update_listeners(|table| removed = table.remove(id));
        removed
    }

    pub fn listener_count(&self) -> usize {
        let table = self.snapshot();
        table.chat.len() + table.typing.len()
    }

    /// Deliver an inbound event to every registered listener of its kind.
    pub fn dispatch(&self, event: &InboundEvent) {
        let table = self.snapshot();
        match event {
            InboundEvent::ChatDelivered(envelope) => {
                for (_, handler) in &table.chat {
                    handler(envelope);
                }
            }
            InboundEvent::TypingNotice(envelope) => {
                for (_, handler) in &table.typing {
                    handler(envelope);
                }
            }
        }
    }

    fn next_id(&self) -> ListenerId {
        ListenerId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed))
    }

    fn snapshot(&self) -> Arc<ListenerTable> {
        let guard = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    fn update_listeners(&self, update: impl FnOnce(&mut ListenerTable)) {
        let mut guard = self
            .inner
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut table = ListenerTable::clone(&guard);
        update(&mut table);
        *guard = Arc::new(table);
    }
}

/// Non-owning reference held by the socket task so that dropping every
/// [`TransportChannel`] shuts the connection down.
#[derive(Clone)]
pub struct WeakChannel {
    inner: Weak<Inner>,
}

impl WeakChannel {
    pub fn upgrade(&self) -> Option<TransportChannel> {
        self.inner.upgrade().map(|inner| TransportChannel { inner })
    }
}

/// Listener registrations owned by one conversation view.
///
/// Released explicitly with [`Subscription::release`] or on drop.
pub struct Subscription {
    channel: TransportChannel,
    ids: Vec<ListenerId>,
}

impl Subscription {
    pub fn new(channel: TransportChannel) -> Self {
        Self {
            channel,
            ids: Vec::new(),
        }
    }

    pub fn on_chat_received<F>(&mut self, handler: F)
    where
        F: Fn(&ChatEnvelope) + Send + Sync + 'static,
    {
        let id = self.channel.on_chat_received(handler);
        self.ids.push(id);
    }

    pub fn on_typing_received<F>(&mut self, handler: F)
    where
        F: Fn(&TypingEnvelope) + Send + Sync + 'static,
    {
        let id = self.channel.on_typing_received(handler);
        self.ids.push(id);
    }

    pub fn release(&mut self) {
        for id in self.ids.drain(..) {
            self.channel.deregister(id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Session;
    use std::sync::Mutex;

    fn logged_in() -> SessionContext {
        let session = SessionContext::new();
        session.login(Session {
            user_id: 1,
            username: "me".into(),
            token: "t".into(),
        });
        session
    }

    fn typing_for(name: &str) -> InboundEvent {
        InboundEvent::TypingNotice(TypingEnvelope {
            recipient_username: name.into(),
            sender_user_id: 2,
        })
    }

    #[test]
    fn outbound_envelopes_are_stamped_with_session_user() {
        let (channel, mut commands) = TransportChannel::new(logged_in());
        channel.send_typing("alice");

        let command = commands.try_recv().unwrap();
        assert_eq!(
            command,
            TransportCommand::SendTyping(TypingEnvelope {
                recipient_username: "alice".into(),
                sender_user_id: 1,
            })
        );
    }

    #[test]
    fn outbound_is_dropped_without_session() {
        let (channel, mut commands) = TransportChannel::new(SessionContext::new());
        channel.send_typing("alice");
        assert!(commands.try_recv().is_err());
    }

    #[test]
    fn deregistered_listener_stops_receiving() {
        let (channel, _commands) = TransportChannel::new(logged_in());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let id = channel.on_typing_received(move |envelope| {
            sink.lock().unwrap().push(envelope.recipient_username.clone());
        });

        channel.dispatch(&typing_for("first"));
        assert!(channel.deregister(id));
        assert!(!channel.deregister(id));
        channel.dispatch(&typing_for("second"));

        assert_eq!(*seen.lock().unwrap(), vec!["first".to_string()]);
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn subscription_releases_on_drop() {
        let (channel, _commands) = TransportChannel::new(logged_in());
        {
            let mut subscription = Subscription::new(channel.clone());
            subscription.on_chat_received(|_| {});
            subscription.on_typing_received(|_| {});
            assert_eq!(channel.listener_count(), 2);
        }
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn release_is_idempotent() {
        let (channel, _commands) = TransportChannel::new(logged_in());
        let mut subscription = Subscription::new(channel.clone());
        subscription.on_chat_received(|_| {});
        subscription.release();
        subscription.release();
        assert_eq!(channel.listener_count(), 0);
    }

    #[test]
    fn weak_channel_does_not_keep_connection_alive() {
        let (channel, _commands) = TransportChannel::new(logged_in());
        let weak = channel.downgrade();
        assert!(weak.upgrade().is_some());
        drop(channel);
        assert!(weak.upgrade().is_none());
    }
}
