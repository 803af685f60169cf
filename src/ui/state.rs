use chrono::{DateTime, Duration, Utc};

use ease_chat::common::{Friend, User, UserId};

/// How long a notice stays on screen, like the web client's toasts.
const NOTICE_SECONDS: i64 = 5;

/// Kết quả các lời gọi danh bạ chạy nền gửi lên UI.
#[derive(Debug, Clone)]
pub enum DirectoryEvent {
    Friends(Vec<Friend>),
    Discovered(Vec<User>),
    FriendAdded(UserId),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub text: String,
    pub shown_at: DateTime<Utc>,
}

/// Trạng thái cục bộ của UI.
pub struct AppState {
    pub input_text: String,
    pub friends: Vec<Friend>,
    pub friends_loading: bool,
    pub potential_friends: Vec<User>,
    pub notice: Option<Notice>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            input_text: String::new(),
            friends: Vec::new(),
            friends_loading: true,
            potential_friends: Vec::new(),
            notice: None,
        }
    }

    pub fn apply(&mut self, event: DirectoryEvent) {
        match event {
            DirectoryEvent::Friends(friends) => {
                self.friends = friends;
                self.friends_loading = false;
            }
            DirectoryEvent::Discovered(users) => {
                if users.is_empty() {
                    self.show_notice("No new people to add right now");
                } else {
                    self.show_notice("Make some new friends");
                }
                self.potential_friends = users;
            }
            DirectoryEvent::FriendAdded(user_id) => {
                self.potential_friends.retain(|user| user.id != user_id);
                self.show_notice("Yay, you made a new friend. Let's talk");
            }
            DirectoryEvent::Failed(text) => {
                self.friends_loading = false;
                self.show_notice(text);
            }
        }
    }

    pub fn show_notice(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            shown_at: Utc::now(),
        });
    }

    /// The current notice, if it has not timed out yet.
    pub fn active_notice(&self) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|notice| Utc::now() - notice.shown_at < Duration::seconds(NOTICE_SECONDS))
            .map(|notice| notice.text.as_str())
    }
}
