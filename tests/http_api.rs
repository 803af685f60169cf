use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ease_chat::common::{Direction, Session};
use ease_chat::network::{ApiError, HttpApi, MessageApi};
use ease_chat::session::SessionContext;

fn logged_in() -> SessionContext {
    let session = SessionContext::new();
    session.login(Session {
        user_id: 1,
        username: "me".into(),
        token: "secret-token".into(),
    });
    session
}

#[tokio::test]
async fn login_accepts_string_user_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .and(body_json(json!({"email": "me@example.com", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "abc",
            "username": "me",
            "userId": "42"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpApi::new(&server.uri(), SessionContext::new()).unwrap();
    let session = api.login("me@example.com", "pw").await.unwrap();

    assert_eq!(
        session,
        Session {
            user_id: 42,
            username: "me".into(),
            token: "abc".into(),
        }
    );
}

#[tokio::test]
async fn rejected_login_maps_to_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let api = HttpApi::new(&server.uri(), SessionContext::new()).unwrap();
    let err = api.login("me@example.com", "wrong").await.unwrap_err();

    match err {
        ApiError::Status { status, context } => {
            assert_eq!(status.as_u16(), 401);
            assert_eq!(context, "Invalid email or password");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn history_is_fetched_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_json(json!({"friendId": 5})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [
                {"id": 1, "content": "hey", "senderId": 5, "receiverId": 1, "type": "recived"},
                {"id": 2, "content": "yo", "senderId": "1", "receiverId": "5", "type": "sent",
                 "sentAt": "2025-01-01T10:00:00Z"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpApi::new(&server.uri(), logged_in()).unwrap();
    let history = api.fetch_history(5).await.unwrap();

    assert_eq!(history.len(), 2);
    assert_eq!(history[0].direction, Direction::Received);
    assert_eq!(history[0].sender_id, 5);
    assert_eq!(history[1].direction, Direction::Sent);
    assert_eq!(history[1].receiver_id, 5);
}

#[tokio::test]
async fn persist_posts_receiver_and_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages/add"))
        .and(header("authorization", "Bearer secret-token"))
        .and(body_json(json!({"receiverId": 5, "content": "hi"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "Message sent"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpApi::new(&server.uri(), logged_in()).unwrap();
    let ack = api.persist_message(5, "hi").await.unwrap();

    assert!(ack.success);
    assert_eq!(ack.message, "Message sent");
}

#[tokio::test]
async fn message_calls_without_session_never_reach_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let api = HttpApi::new(&server.uri(), SessionContext::new()).unwrap();

    assert!(matches!(
        api.fetch_history(5).await,
        Err(ApiError::NotLoggedIn)
    ));
    assert!(matches!(
        api.persist_message(5, "hi").await,
        Err(ApiError::NotLoggedIn)
    ));
}

#[tokio::test]
async fn friend_directory_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/friendships/get"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "friendships": [
                {"id": 10, "friendId": 5, "friendName": "alice", "lastMessage": "see you"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/friendships/potential-friends"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "users": [{"id": "7", "username": "carol"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/friendships"))
        .and(body_json(json!({"friendId": 7})))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpApi::new(&server.uri(), logged_in()).unwrap();

    let friends = api.friends().await.unwrap();
    assert_eq!(friends.len(), 1);
    assert_eq!(friends[0].friend_id, 5);
    assert_eq!(friends[0].friend_name, "alice");
    assert_eq!(friends[0].last_message.as_deref(), Some("see you"));

    let users = api.potential_friends().await.unwrap();
    assert_eq!(users[0].id, 7);
    assert_eq!(users[0].email, None);

    api.add_friend(7).await.unwrap();
}

#[tokio::test]
async fn signup_validates_before_sending() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let api = HttpApi::new(&server.uri(), SessionContext::new()).unwrap();
    let err = api.signup("amy", "nope", "pw").await.unwrap_err();
    assert!(matches!(err, ApiError::Invalid(_)));
}
