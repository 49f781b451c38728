mod common;

use serde_json::Value;
use slug_board::models::COMMENT_VOTES;
use uuid::Uuid;

async fn setup(app: &common::TestApp, token: &str) -> (Uuid, String) {
    let event_id = app.seed_event(0, 0).await;
    let resp = app
        .client
        .post(app.url(&format!("/events/{}/comments", event_id)))
        .bearer_auth(token)
        .json(&serde_json::json!({ "content": "Great event!" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let comment_id = body["data"]["id"].as_str().unwrap().to_string();
    (event_id, comment_id)
}

async fn vote_comment(app: &common::TestApp, token: &str, comment_id: &str, reaction: &str) -> Value {
    let resp = app
        .client
        .post(app.url(&format!("/comments/{}/vote", comment_id)))
        .bearer_auth(token)
        .json(&serde_json::json!({ "reaction": reaction }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    body["data"].clone()
}

async fn first_comment(app: &common::TestApp, event_id: Uuid) -> Value {
    let resp = app
        .client
        .get(app.url(&format!("/events/{}/comments", event_id)))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    body["data"][0].clone()
}

#[tokio::test]
async fn test_comment_vote_cycle() {
    let app = common::spawn_app().await;
    let (_, token) = common::create_test_user();
    let (event_id, comment_id) = setup(&app, &token).await;

    let data = vote_comment(&app, &token, &comment_id, "upvote").await;
    assert_eq!(data["transition"], "added");
    let comment = first_comment(&app, event_id).await;
    assert_eq!(comment["upvotes"], 1);
    assert_eq!(comment["score"], 1);

    let data = vote_comment(&app, &token, &comment_id, "downvote").await;
    assert_eq!(data["transition"], "switched");
    let comment = first_comment(&app, event_id).await;
    assert_eq!(comment["upvotes"], 0);
    assert_eq!(comment["downvotes"], 1);
    assert_eq!(comment["score"], -1);

    let data = vote_comment(&app, &token, &comment_id, "downvote").await;
    assert_eq!(data["transition"], "removed");
    let comment = first_comment(&app, event_id).await;
    assert_eq!(comment["downvotes"], 0);

    // Comment votes never touch the event's own counters.
    let event = app.get_event(event_id).await;
    assert_eq!(event["upvotes"], 0);
    assert_eq!(event["downvotes"], 0);
}

#[tokio::test]
async fn test_deleting_comment_removes_its_votes() {
    let app = common::spawn_app().await;
    let (_, token) = common::create_test_user();
    let (_, comment_id) = setup(&app, &token).await;

    let (_, voter) = common::create_test_user();
    vote_comment(&app, &voter, &comment_id, "upvote").await;
    assert_eq!(app.store.reactions_in(&COMMENT_VOTES).len(), 1);

    let resp = app
        .client
        .delete(app.url(&format!("/comments/{}", comment_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(app.store.reactions_in(&COMMENT_VOTES).is_empty());
}

#[tokio::test]
async fn test_vote_unknown_comment() {
    let app = common::spawn_app().await;
    let (_, token) = common::create_test_user();

    let resp = app
        .client
        .post(app.url(&format!("/comments/{}/vote", Uuid::new_v4())))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "reaction": "upvote" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
