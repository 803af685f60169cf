use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;

use crate::common::{
    Addressed, ChatEnvelope, Direction, FriendRef, Message, MessageId, Session, UserId,
};

/// Quiet period after which a typing indicator clears itself.
pub const TYPING_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Loading,
    Ready,
}

/// What the presentation layer should draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConversationView<'a> {
    Loading,
    /// Loaded, nothing said yet: show the placeholder.
    Empty,
    Messages(&'a [Message]),
}

/// The local side of a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalUser {
    pub id: UserId,
    pub username: String,
}

impl From<&Session> for LocalUser {
    fn from(session: &Session) -> Self {
        Self {
            id: session.user_id,
            username: session.username.clone(),
        }
    }
}

/// Ordered, duplicate-free log for the conversation with one friend.
///
/// Display order is insertion order. Ids come from a single counter shared by
/// sent and received entries, so they are unique and never decrease.
#[derive(Debug)]
pub struct ConversationStore {
    friend: FriendRef,
    me: LocalUser,
    messages: Vec<Message>,
    next_id: MessageId,
    state: LoadState,
    /// Inbound chats that arrived before the history; replayed once it lands.
    held_inbound: Vec<Message>,
    typing_deadline: Option<Instant>,
}

impl ConversationStore {
    pub fn new(friend: FriendRef, me: LocalUser) -> Self {
        Self {
            friend,
            me,
            messages: Vec::new(),
            next_id: 1,
            state: LoadState::Loading,
            held_inbound: Vec::new(),
            typing_deadline: None,
        }
    }

    pub fn friend(&self) -> &FriendRef {
        &self.friend
    }

    pub fn me(&self) -> &LocalUser {
        &self.me
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn view(&self) -> ConversationView<'_> {
        match self.state {
            LoadState::Loading => ConversationView::Loading,
            LoadState::Ready if self.messages.is_empty() => ConversationView::Empty,
            LoadState::Ready => ConversationView::Messages(&self.messages),
        }
    }

    /// Replace the log with persisted history, then replay chats held while loading.
    pub fn load(&mut self, history: Vec<Message>) {
        let highest = history.iter().map(|message| message.id).max().unwrap_or(0);
        self.next_id = highest.max(history.len() as MessageId) + 1;
        self.messages = history;
        self.replay_held();
    }

    /// History could not be fetched; stop showing the loading state.
    pub fn mark_ready(&mut self) {
        self.replay_held();
    }

    fn replay_held(&mut self) {
        let held = std::mem::take(&mut self.held_inbound);
        // A held chat may already be part of the fetched history; only the
        // newest entries can overlap with it.
        let overlap_start = self.messages.len().saturating_sub(held.len());
        let mut already_loaded: Vec<String> = self.messages[overlap_start..]
            .iter()
            .filter(|message| message.direction == Direction::Received)
            .map(|message| message.content.clone())
            .collect();

        for mut message in held {
            if let Some(pos) = already_loaded
                .iter()
                .position(|content| *content == message.content)
            {
                already_loaded.swap_remove(pos);
                continue;
            }
            message.id = self.mint_id();
            self.messages.push(message);
        }
        self.state = LoadState::Ready;
    }

    /// Append a locally authored message before the server has seen it.
    pub fn append_optimistic(&mut self, content: &str) -> MessageId {
        let id = self.mint_id();
        self.messages.push(Message {
            id,
            content: content.to_string(),
            sender_id: self.me.id,
            receiver_id: self.friend.id,
            direction: Direction::Sent,
            sent_at: Utc::now(),
        });
        id
    }

    /// True when the event was sent by the open friend to the local user.
    pub fn accepts(&self, event: &impl Addressed) -> bool {
        event.recipient_username() == self.me.username && event.sender_user_id() == self.friend.id
    }

    /// Append an inbound chat if it belongs to this conversation.
    ///
    /// While the history is loading the chat is held back and `None` is
    /// returned; it is appended when [`load`](Self::load) or
    /// [`mark_ready`](Self::mark_ready) runs.
    pub fn merge_inbound(&mut self, envelope: &ChatEnvelope) -> Option<MessageId> {
        if !self.accepts(envelope) {
            return None;
        }
        let mut message = Message {
            id: 0,
            content: envelope.payload.content.clone(),
            sender_id: self.friend.id,
            receiver_id: self.me.id,
            direction: Direction::Received,
            sent_at: envelope.payload.sent_at.unwrap_or_else(Utc::now),
        };
        if self.state == LoadState::Loading {
            self.held_inbound.push(message);
            return None;
        }
        let id = self.mint_id();
        message.id = id;
        self.messages.push(message);
        Some(id)
    }

    pub fn is_typing(&self) -> bool {
        self.typing_deadline.is_some()
    }

    /// Mark the friend as typing; a repeated call moves the deadline, it never adds one.
    pub fn set_typing(&mut self, now: Instant) -> Instant {
        let deadline = now + TYPING_WINDOW;
        self.typing_deadline = Some(deadline);
        deadline
    }

    /// Clear the typing flag if its deadline has passed. Returns true if it was cleared.
    pub fn expire_typing(&mut self, now: Instant) -> bool {
        match self.typing_deadline {
            Some(deadline) if deadline <= now => {
                self.typing_deadline = None;
                true
            }
            _ => false,
        }
    }

    fn mint_id(&mut self) -> MessageId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::MessageData;

    fn store() -> ConversationStore {
        ConversationStore::new(
            FriendRef::new(5, "alice"),
            LocalUser {
                id: 1,
                username: "me".into(),
            },
        )
    }

    fn persisted(id: MessageId, content: &str) -> Message {
        Message {
            id,
            content: content.into(),
            sender_id: 5,
            receiver_id: 1,
            direction: Direction::Received,
            sent_at: Utc::now(),
        }
    }

    fn chat(recipient: &str, sender: UserId, content: &str) -> ChatEnvelope {
        ChatEnvelope {
            recipient_username: recipient.into(),
            sender_user_id: sender,
            payload: MessageData {
                id: None,
                content: content.into(),
                sender_id: None,
                receiver_id: None,
                direction: Direction::Received,
                sent_at: None,
            },
        }
    }

    #[test]
    fn view_distinguishes_loading_from_empty() {
        let mut store = store();
        assert_eq!(store.view(), ConversationView::Loading);
        store.load(Vec::new());
        assert_eq!(store.view(), ConversationView::Empty);
        store.append_optimistic("hi");
        assert!(matches!(store.view(), ConversationView::Messages(m) if m.len() == 1));
    }

    #[test]
    fn optimistic_appends_follow_history_in_call_order() {
        let mut store = store();
        store.load(vec![persisted(1, "a"), persisted(2, "b"), persisted(3, "c")]);

        let texts = ["one", "two", "three", "four"];
        for text in texts {
            store.append_optimistic(text);
        }

        assert_eq!(store.messages().len(), 3 + texts.len());
        let tail: Vec<_> = store.messages()[3..]
            .iter()
            .map(|message| message.content.as_str())
            .collect();
        assert_eq!(tail, texts);
        assert!(
            store.messages()[3..]
                .iter()
                .all(|message| message.direction == Direction::Sent)
        );
    }

    #[test]
    fn first_optimistic_id_on_empty_history_is_one() {
        let mut store = store();
        store.load(Vec::new());
        assert_eq!(store.append_optimistic("hi"), 1);
        assert_eq!(store.append_optimistic("again"), 2);
    }

    #[test]
    fn ids_continue_after_server_ids() {
        let mut store = store();
        store.load(vec![persisted(40, "old"), persisted(41, "older")]);
        assert_eq!(store.append_optimistic("new"), 42);
    }

    #[test]
    fn ids_are_unique_across_directions() {
        let mut store = store();
        store.load(Vec::new());
        let sent = store.append_optimistic("hi");
        let received = store.merge_inbound(&chat("me", 5, "hello")).unwrap();
        let sent_again = store.append_optimistic("how are you");

        assert_eq!((sent, received, sent_again), (1, 2, 3));
        let ids: Vec<_> = store.messages().iter().map(|message| message.id).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn unaddressed_inbound_leaves_store_unchanged() {
        let mut store = store();
        store.load(vec![persisted(1, "a")]);
        let before = store.messages().to_vec();

        assert_eq!(store.merge_inbound(&chat("someone-else", 5, "x")), None);
        assert_eq!(store.merge_inbound(&chat("me", 99, "x")), None);
        assert_eq!(store.messages(), before.as_slice());

        // A rejected event does not burn an id.
        assert_eq!(store.append_optimistic("next"), 2);
    }

    #[test]
    fn inbound_is_recorded_from_friend_to_me() {
        let mut store = store();
        store.load(Vec::new());
        store.merge_inbound(&chat("me", 5, "hello"));
        let message = &store.messages()[0];
        assert_eq!(message.sender_id, 5);
        assert_eq!(message.receiver_id, 1);
        assert_eq!(message.direction, Direction::Received);
    }

    #[test]
    fn load_replaces_previous_contents() {
        let mut store = store();
        store.append_optimistic("typed while loading");
        store.load(vec![persisted(1, "a")]);
        assert_eq!(store.messages().len(), 1);
        assert_eq!(store.messages()[0].content, "a");
    }

    #[test]
    fn inbound_during_loading_is_replayed_after_history() {
        let mut store = store();
        assert_eq!(store.merge_inbound(&chat("me", 5, "are you there?")), None);
        assert_eq!(store.merge_inbound(&chat("someone-else", 5, "ignored")), None);
        assert_eq!(store.view(), ConversationView::Loading);

        store.load(vec![persisted(1, "a"), persisted(2, "b")]);

        let contents: Vec<_> = store
            .messages()
            .iter()
            .map(|message| (message.id, message.content.as_str()))
            .collect();
        assert_eq!(contents, vec![(1, "a"), (2, "b"), (3, "are you there?")]);
        assert_eq!(store.append_optimistic("yes"), 4);
    }

    #[test]
    fn held_inbound_already_in_history_is_not_duplicated() {
        let mut store = store();
        store.merge_inbound(&chat("me", 5, "hello"));
        store.load(vec![persisted(1, "old"), persisted(2, "hello")]);

        assert_eq!(store.messages().len(), 2);
        assert_eq!(store.append_optimistic("hi"), 3);
    }

    #[test]
    fn held_inbound_survives_failed_fetch() {
        let mut store = store();
        store.merge_inbound(&chat("me", 5, "hello"));
        store.mark_ready();

        assert!(matches!(
            store.view(),
            ConversationView::Messages([message]) if message.content == "hello" && message.id == 1
        ));
    }

    #[test]
    fn failed_fetch_shows_placeholder() {
        let mut store = store();
        store.mark_ready();
        assert_eq!(store.view(), ConversationView::Empty);
    }

    #[test]
    fn typing_signal_resets_deadline() {
        let mut store = store();
        let start = Instant::now();

        store.set_typing(start);
        let second = start + Duration::from_secs(1);
        let deadline = store.set_typing(second);
        assert_eq!(deadline, second + TYPING_WINDOW);

        // The first window has passed but the reset one has not.
        assert!(!store.expire_typing(start + TYPING_WINDOW));
        assert!(store.is_typing());

        assert!(store.expire_typing(deadline));
        assert!(!store.is_typing());
        assert!(!store.expire_typing(deadline + TYPING_WINDOW));
    }
}
