use std::sync::{Arc, RwLock};

use rusqlite::Result as SqlResult;

use crate::common::{Session, UserId};
use crate::storage::SessionDatabase;

/// Identity of the logged-in user, shared by the transport and the controllers.
///
/// `login` and `logout` are the only writers.
#[derive(Clone, Default)]
pub struct SessionContext {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the context from the persisted session, if any.
    pub fn restore(db: &SessionDatabase) -> SqlResult<Self> {
        let context = Self::new();
        if let Some(session) = db.load_session()? {
            log::info!("Restored session for {}", session.username);
            context.login(session);
        }
        Ok(context)
    }

    pub fn login(&self, session: Session) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(session);
    }

    pub fn logout(&self) {
        let mut guard = self
            .inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
    }

    pub fn current(&self) -> Option<Session> {
        self.inner
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.current().is_some()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.current().map(|session| session.user_id)
    }

    pub fn username(&self) -> Option<String> {
        self.current().map(|session| session.username)
    }

    pub fn token(&self) -> Option<String> {
        self.current().map(|session| session.token)
    }
}
