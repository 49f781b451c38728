mod common;

use serde_json::Value;
use uuid::Uuid;

async fn vote_event(app: &common::TestApp, token: &str, event_id: Uuid, reaction: &str) -> reqwest::Response {
    app.client
        .post(app.url(&format!("/events/{}/vote", event_id)))
        .bearer_auth(token)
        .json(&serde_json::json!({ "reaction": reaction }))
        .send()
        .await
        .unwrap()
}

async fn vote_ok(app: &common::TestApp, token: &str, event_id: Uuid, reaction: &str) -> Value {
    let resp = vote_event(app, token, event_id, reaction).await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);
    body["data"].clone()
}

#[tokio::test]
async fn test_upvote_then_toggle_off() {
    let app = common::spawn_app().await;
    let (_, token) = common::create_test_user();
    let event_id = app.seed_event(5, 0).await;

    let data = vote_ok(&app, &token, event_id, "upvote").await;
    assert_eq!(data["transition"], "added");
    assert_eq!(data["previous"], Value::Null);
    assert_eq!(data["current"], "upvote");
    assert_eq!(data["target_id"], event_id.to_string());
    assert_eq!(data["delta"], serde_json::json!({ "upvotes": 1, "downvotes": 0 }));
    assert_eq!(app.get_event(event_id).await["upvotes"], 6);

    let data = vote_ok(&app, &token, event_id, "upvote").await;
    assert_eq!(data["transition"], "removed");
    assert_eq!(data["current"], Value::Null);
    assert_eq!(app.get_event(event_id).await["upvotes"], 5);
}

#[tokio::test]
async fn test_switch_vote() {
    let app = common::spawn_app().await;
    let (_, token) = common::create_test_user();
    let event_id = app.seed_event(5, 0).await;

    vote_ok(&app, &token, event_id, "upvote").await;
    let data = vote_ok(&app, &token, event_id, "downvote").await;
    assert_eq!(data["transition"], "switched");
    assert_eq!(data["previous"], "upvote");
    assert_eq!(data["current"], "downvote");
    assert_eq!(data["delta"]["upvotes"], -1);
    assert_eq!(data["delta"]["downvotes"], 1);

    let event = app.get_event(event_id).await;
    assert_eq!(event["upvotes"], 5);
    assert_eq!(event["downvotes"], 1);
    assert_eq!(event["score"], 4);
}

#[tokio::test]
async fn test_votes_from_different_users_accumulate() {
    let app = common::spawn_app().await;
    let event_id = app.seed_event(0, 0).await;

    for _ in 0..3 {
        let (_, token) = common::create_test_user();
        vote_ok(&app, &token, event_id, "upvote").await;
    }

    assert_eq!(app.get_event(event_id).await["upvotes"], 3);
}

#[tokio::test]
async fn test_vote_requires_auth() {
    let app = common::spawn_app().await;
    let event_id = app.seed_event(0, 0).await;

    let resp = app
        .client
        .post(app.url(&format!("/events/{}/vote", event_id)))
        .json(&serde_json::json!({ "reaction": "upvote" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = vote_event(&app, "not-a-jwt", event_id, "upvote").await;
    assert_eq!(resp.status(), 401);
    assert_eq!(app.get_event(event_id).await["upvotes"], 0);
}

#[tokio::test]
async fn test_vote_unknown_event() {
    let app = common::spawn_app().await;
    let (_, token) = common::create_test_user();

    let resp = vote_event(&app, &token, Uuid::new_v4(), "upvote").await;
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_vote_nil_event_is_bad_request() {
    let app = common::spawn_app().await;
    let (_, token) = common::create_test_user();

    let resp = vote_event(&app, &token, Uuid::nil(), "upvote").await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn test_invalid_reaction_rejected() {
    let app = common::spawn_app().await;
    let (_, token) = common::create_test_user();
    let event_id = app.seed_event(0, 0).await;

    let resp = vote_event(&app, &token, event_id, "sideways").await;
    assert!(resp.status().is_client_error());
    assert_eq!(app.get_event(event_id).await["upvotes"], 0);
}
