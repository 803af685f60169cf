use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::{Friend, Message, Session, User, UserId};
use crate::common::types::user_id;
use crate::session::SessionContext;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("{0}")]
    Invalid(&'static str),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{context} ({status})")]
    Status {
        status: StatusCode,
        context: &'static str,
    },
}

/// Server acknowledgement for a persisted message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendAck {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

/// The two message endpoints the conversation core depends on.
#[async_trait]
pub trait MessageApi: Send + Sync {
    /// Persisted history with `friend_id`, oldest first.
    async fn fetch_history(&self, friend_id: UserId) -> Result<Vec<Message>, ApiError>;

    async fn persist_message(&self, receiver_id: UserId, content: &str)
    -> Result<SendAck, ApiError>;
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct SignupRequest<'a> {
    username: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    username: String,
    #[serde(deserialize_with = "user_id::deserialize")]
    user_id: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupResponse {
    #[serde(default)]
    message: String,
    token: String,
    #[serde(deserialize_with = "user_id::deserialize")]
    user_id: UserId,
}

#[derive(Deserialize)]
struct FriendsResponse {
    friendships: Vec<Friend>,
}

#[derive(Deserialize)]
struct UsersResponse {
    users: Vec<User>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    messages: Vec<Message>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FriendRequest {
    friend_id: UserId,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    receiver_id: UserId,
    content: &'a str,
}

/// Reject signup input the backend would refuse anyway.
pub fn validate_signup(username: &str, email: &str, password: &str) -> Result<(), ApiError> {
    if username.trim().is_empty() {
        return Err(ApiError::Invalid("username is required"));
    }
    if !EMAIL_PATTERN.is_match(email.trim()) {
        return Err(ApiError::Invalid("email address is not valid"));
    }
    if password.is_empty() {
        return Err(ApiError::Invalid("password is required"));
    }
    Ok(())
}

/// REST client for the chat backend.
#[derive(Clone)]
pub struct HttpApi {
    base_url: String,
    http: reqwest::Client,
    session: SessionContext,
}

impl HttpApi {
    pub fn new(base_url: &str, session: SessionContext) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            session,
        })
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, ApiError> {
        let request = self
            .request(Method::POST, "/auth/login", false)?
            .json(&Credentials { email, password });
        let response: LoginResponse = execute(request, "Invalid email or password").await?;
        Ok(Session {
            user_id: response.user_id,
            username: response.username,
            token: response.token,
        })
    }

    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, ApiError> {
        validate_signup(username, email, password)?;
        let request = self
            .request(Method::POST, "/auth/signup", false)?
            .json(&SignupRequest {
                username,
                email,
                password,
            });
        let response: SignupResponse =
            execute(request, "Username or email already in use").await?;
        if !response.message.is_empty() {
            log::info!("Signup: {}", response.message);
        }
        Ok(Session {
            user_id: response.user_id,
            username: username.to_string(),
            token: response.token,
        })
    }

    pub async fn friends(&self) -> Result<Vec<Friend>, ApiError> {
        let request = self.request(Method::GET, "/friendships/get", true)?;
        let response: FriendsResponse =
            execute(request, "There was some problem fetching friends").await?;
        Ok(response.friendships)
    }

    pub async fn potential_friends(&self) -> Result<Vec<User>, ApiError> {
        let request = self.request(Method::GET, "/friendships/potential-friends", true)?;
        let response: UsersResponse =
            execute(request, "There was some problem fetching potential friends").await?;
        Ok(response.users)
    }

    pub async fn add_friend(&self, friend_id: UserId) -> Result<(), ApiError> {
        let request = self
            .request(Method::POST, "/friendships", true)?
            .json(&FriendRequest { friend_id });
        let response = request.send().await?;
        check_status(response.status(), "Failed to make friend, try again")
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        authorized: bool,
    ) -> Result<RequestBuilder, ApiError> {
        let builder = self
            .http
            .request(method, format!("{}{path}", self.base_url));
        if !authorized {
            return Ok(builder);
        }
        let token = self.session.token().ok_or(ApiError::NotLoggedIn)?;
        Ok(builder.bearer_auth(token))
    }
}

#[async_trait]
impl MessageApi for HttpApi {
    async fn fetch_history(&self, friend_id: UserId) -> Result<Vec<Message>, ApiError> {
        let request = self
            .request(Method::POST, "/messages", true)?
            .json(&FriendRequest { friend_id });
        let response: MessagesResponse = execute(request, "Failed to get messages").await?;
        Ok(response.messages)
    }

    async fn persist_message(
        &self,
        receiver_id: UserId,
        content: &str,
    ) -> Result<SendAck, ApiError> {
        let request = self
            .request(Method::POST, "/messages/add", true)?
            .json(&SendRequest {
                receiver_id,
                content,
            });
        execute(request, "Failed to send message, please try again").await
    }
}

fn check_status(status: StatusCode, context: &'static str) -> Result<(), ApiError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ApiError::Status { status, context })
    }
}

async fn execute<T: DeserializeOwned>(
    request: RequestBuilder,
    context: &'static str,
) -> Result<T, ApiError> {
    let response = request.send().await?;
    check_status(response.status(), context)?;
    Ok(response.json::<T>().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_validation_rejects_bad_email() {
        assert!(validate_signup("amy", "amy@example.com", "pw").is_ok());
        assert!(matches!(
            validate_signup("amy", "not-an-email", "pw"),
            Err(ApiError::Invalid(_))
        ));
        assert!(matches!(
            validate_signup("  ", "amy@example.com", "pw"),
            Err(ApiError::Invalid(_))
        ));
        assert!(matches!(
            validate_signup("amy", "amy@example.com", ""),
            Err(ApiError::Invalid(_))
        ));
    }

    #[test]
    fn authorized_request_requires_session() {
        let api = HttpApi::new("http://localhost:1/", SessionContext::new()).unwrap();
        assert!(matches!(
            api.request(Method::GET, "/friendships/get", true),
            Err(ApiError::NotLoggedIn)
        ));
        assert!(api.request(Method::POST, "/auth/login", false).is_ok());
    }
}
