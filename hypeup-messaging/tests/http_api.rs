use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode, header};
use chrono::Utc;
use hypeup_messaging::config::{IdentityBackend, MessageStoreBackend, MessagingConfig};
use hypeup_messaging::domain::model::{ChatMessage, LifecycleEvent, PostedMessage, Role};
use hypeup_messaging::domain::service::LifecycleConfig;
use hypeup_messaging::infrastructure::identity::InMemoryIdentityDirectory;
use hypeup_messaging::infrastructure::persistence::InMemoryMessageStore;
use hypeup_messaging::service::ApplicationContext;
use hypeup_messaging::service::wire::{Backends, assemble};
use prometheus::Registry;
use serde_json::{Value, json};
use tower::ServiceExt;

fn messaging_config(lifecycle: LifecycleConfig) -> MessagingConfig {
    MessagingConfig {
        service_name: "hypeup-messaging-test".to_string(),
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        message_store: MessageStoreBackend::Memory,
        identity_store: IdentityBackend::Memory,
        blob_store: None,
        key_prefix: "test".to_string(),
        lifecycle,
        cors_allowed_origin: None,
    }
}

async fn app_with(lifecycle: LifecycleConfig) -> ApplicationContext {
    let identity = InMemoryIdentityDirectory::new()
        .with_profile(Role::User, "owner-1", "Ada")
        .with_profile(Role::Promoter, "promo-1", "Bo");
    let backends = Backends {
        chats: Arc::new(InMemoryMessageStore::<ChatMessage>::new()),
        posts: Arc::new(InMemoryMessageStore::<PostedMessage>::new()),
        identity: Arc::new(identity),
        blobs: None,
    };
    assemble(&messaging_config(lifecycle), backends, Registry::new())
        .await
        .unwrap()
}

async fn app() -> ApplicationContext {
    app_with(LifecycleConfig::default()).await
}

async fn call(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn tomorrow() -> String {
    (Utc::now() + chrono::Duration::days(1))
        .format("%Y-%m-%d")
        .to_string()
}

async fn create_post(router: &Router, owner: &str) -> (StatusCode, Value) {
    call(
        router,
        Method::POST,
        "/messages",
        Some(json!({
            "content": "promo",
            "cost": 50,
            "receiverId": owner,
            "userType": "user",
            "releaseDate": tomorrow(),
        })),
    )
    .await
}

#[tokio::test]
async fn test_post_rating_and_reply_flow() {
    let ctx = app().await;
    let router = &ctx.router;

    let (status, body) = create_post(router, "owner-1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Message posted successfully");
    assert_eq!(body["newMessage"]["senderName"], "Ada");
    let post_id = body["newMessage"]["id"].as_str().unwrap().to_string();
    let ratings_uri = format!("/messages/{}/ratings", post_id);

    let (status, body) = call(
        router,
        Method::POST,
        &ratings_uri,
        Some(json!({ "userId": "u1", "rating": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Rating stored successfully");
    assert_eq!(body["updatedMessage"]["ratingCounts"], json!([0, 0, 0, 1, 0]));

    let (_, body) = call(
        router,
        Method::POST,
        &ratings_uri,
        Some(json!({ "userId": "u1", "rating": 4 })),
    )
    .await;
    assert_eq!(body["updatedMessage"]["ratingCounts"], json!([0, 0, 0, 0, 0]));

    call(
        router,
        Method::POST,
        &ratings_uri,
        Some(json!({ "userId": "u1", "rating": 5 })),
    )
    .await;
    let (status, body) = call(router, Method::GET, &ratings_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ratingCounts"], json!([0, 0, 0, 0, 1]));

    let (status, body) = call(
        router,
        Method::POST,
        "/chat/send-message",
        Some(json!({
            "senderId": "promo-1",
            "receiverId": "owner-1",
            "message": "can do 1000 views",
            "messageType": "reply",
            "messageContent": "promo",
            "expectedCost": 50,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Message sent successfully");

    let (status, body) = call(
        router,
        Method::POST,
        "/chat/send-message",
        Some(json!({
            "senderId": "promo-1",
            "receiverId": "owner-1",
            "message": "no terms",
            "messageType": "reply",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");

    let (_, posts) = call(router, Method::GET, "/messages", None).await;
    let posts = posts.as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["totalRatings"], 5);
    assert_eq!(posts[0]["userType"], "user");
    assert_eq!(posts[0]["filteredRatings"], json!({ "u1": 5 }));
}

#[tokio::test]
async fn test_conversation_is_filtered_and_projected() {
    let ctx = app().await;
    let router = &ctx.router;

    let sends = [
        json!({ "senderId": "a", "receiverId": "b", "message": "hi b", "messageType": "regular", "senderName": "A", "senderType": "user" }),
        json!({ "senderId": "a", "receiverId": "c", "message": "hi c", "messageType": "regular", "senderName": "A", "senderType": "user" }),
        json!({ "senderId": "b", "receiverId": "a", "message": "offer", "messageType": "reply", "messageContent": "story", "expectedCost": 20, "senderName": "B", "senderType": "promoter" }),
    ];
    for send in sends {
        let (status, _) = call(router, Method::POST, "/chat/send-message", Some(send)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = call(
        router,
        Method::POST,
        "/chat/messages",
        Some(json!({ "currentUserId": "a", "userId": "b" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages = body.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["message"], "hi b");
    assert!(messages[0].get("expectedCost").is_none());
    assert_eq!(messages[1]["messageType"], "reply");
    assert_eq!(messages[1]["expectedCost"], 20);

    let (status, body) = call(
        router,
        Method::POST,
        "/chat/messages",
        Some(json!({ "currentUserId": "a" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn test_delete_messages_removes_by_receiver() {
    let ctx = app().await;
    let router = &ctx.router;

    for (sender, receiver) in [("a", "b"), ("c", "b"), ("b", "a")] {
        call(
            router,
            Method::POST,
            "/chat/send-message",
            Some(json!({
                "senderId": sender,
                "receiverId": receiver,
                "message": "hello",
                "messageType": "regular",
                "senderName": "x",
                "senderType": "user",
            })),
        )
        .await;
    }

    let (status, body) = call(
        router,
        Method::POST,
        "/chat/delete-messages",
        Some(json!({ "senderId": "a", "receiverId": "b" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 2);

    let (_, remaining) = call(
        router,
        Method::POST,
        "/chat/messages",
        Some(json!({ "currentUserId": "a", "userId": "b" })),
    )
    .await;
    assert_eq!(remaining.as_array().unwrap().len(), 1);

    let (status, _) = call(
        router,
        Method::POST,
        "/chat/delete-messages",
        Some(json!({ "receiverId": "b" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_error_statuses() {
    let ctx = app().await;
    let router = &ctx.router;

    let (status, body) = call(
        router,
        Method::POST,
        "/messages/missing/ratings",
        Some(json!({ "userId": "u1", "rating": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (_, body) = create_post(router, "owner-1").await;
    let post_id = body["newMessage"]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        router,
        Method::POST,
        &format!("/messages/{}/ratings", post_id),
        Some(json!({ "userId": "u1", "rating": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid star rating. Must be between 1 and 5.");

    let (status, _) = call(
        router,
        Method::POST,
        &format!("/messages/{}/ratings", post_id),
        Some(json!({ "userId": "u1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = create_post(router, "owner-1").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = create_post(router, "ghost").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        router,
        Method::DELETE,
        &format!("/messages/{}?requesterId=stranger", post_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, body) = call(
        router,
        Method::POST,
        &format!("/messages/{}/notice/confirm", post_id),
        Some(json!({ "requesterId": "owner-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");

    let (status, body) = call(
        router,
        Method::POST,
        "/messages",
        Some(json!({
            "content": "x",
            "cost": 1,
            "receiverId": "owner-1",
            "userType": "admin",
            "releaseDate": tomorrow(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid user type or receiver ID");
}

#[tokio::test]
async fn test_owner_delete_is_idempotent() {
    let ctx = app().await;
    let router = &ctx.router;

    let (_, body) = create_post(router, "owner-1").await;
    let post_id = body["newMessage"]["id"].as_str().unwrap().to_string();
    let delete_uri = format!("/messages/{}?requesterId=owner-1", post_id);

    let (status, body) = call(router, Method::DELETE, &delete_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (_, body) = call(
        router,
        Method::GET,
        &format!("/messages/{}/lifecycle", post_id),
        None,
    )
    .await;
    assert_eq!(body["state"], "deleted");

    let (status, body) = call(router, Method::DELETE, &delete_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], false);

    let (status, _) = create_post(router, "owner-1").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test(start_paused = true)]
async fn test_notice_confirmation_deletes_post() {
    let ctx = app_with(LifecycleConfig {
        notice_offset: Duration::from_secs(30),
        total_lifetime: Duration::from_secs(60),
        ..LifecycleConfig::default()
    })
    .await;
    let router = &ctx.router;
    let mut events = ctx.scheduler.subscribe();

    let (_, body) = create_post(router, "owner-1").await;
    let post_id = body["newMessage"]["id"].as_str().unwrap().to_string();
    let lifecycle_uri = format!("/messages/{}/lifecycle", post_id);

    let (_, body) = call(router, Method::GET, &lifecycle_uri, None).await;
    assert_eq!(body["state"], "active");

    tokio::time::advance(Duration::from_secs(31)).await;
    match events.recv().await.unwrap() {
        LifecycleEvent::DeletionNotice { post_id: id, owner_id, .. } => {
            assert_eq!(id, post_id);
            assert_eq!(owner_id, "owner-1");
        }
        other => panic!("unexpected event {:?}", other),
    }
    let (_, body) = call(router, Method::GET, &lifecycle_uri, None).await;
    assert_eq!(body["state"], "notice_pending");

    let (status, body) = call(
        router,
        Method::POST,
        &format!("/messages/{}/notice/confirm", post_id),
        Some(json!({ "requesterId": "owner-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _) = call(
        router,
        Method::GET,
        &format!("/messages/{}/ratings", post_id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // 过了原定删除时间也不会重复删除
    tokio::time::advance(Duration::from_secs(60)).await;
    tokio::task::yield_now().await;
    assert_eq!(ctx.scheduler.live_timers(), 0);
}

#[tokio::test]
async fn test_metrics_and_event_stream_endpoints() {
    let ctx = app().await;
    let router = &ctx.router;
    create_post(router, "owner-1").await;

    let response = router
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("hypeup_posts_created_total"));

    let response = router
        .clone()
        .oneshot(
            Request::get("/messages/notices?ownerId=owner-1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/event-stream"
    );
}
