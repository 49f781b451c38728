mod common;

use serde_json::{json, Value};
use uuid::Uuid;

async fn create_event(app: &common::TestApp, token: &str, body: Value) -> reqwest::Response {
    app.client
        .post(app.url("/events"))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn feed(app: &common::TestApp, query: &str) -> Value {
    let resp = app
        .client
        .get(app.url(&format!("/events?{}", query)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    body["data"].clone()
}

#[tokio::test]
async fn test_create_event_sets_host() {
    let app = common::spawn_app().await;
    let (host, token) = common::create_test_user();

    let resp = create_event(
        &app,
        &token,
        json!({
            "title": "Farmers market",
            "description": "Fresh produce by the library",
            "location": "McHenry Library",
            "category": "Food",
            "start_time": "2030-05-01T17:00:00Z"
        }),
    )
    .await;
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    let event = &body["data"];
    assert_eq!(event["host_id"], host.to_string());
    assert_eq!(event["title"], "Farmers market");
    assert_eq!(event["upvotes"], 0);
    assert_eq!(event["rsvp_count"], 0);

    let id: Uuid = event["id"].as_str().unwrap().parse().unwrap();
    assert_eq!(app.get_event(id).await["location"], "McHenry Library");
}

#[tokio::test]
async fn test_create_event_validation() {
    let app = common::spawn_app().await;
    let (_, token) = common::create_test_user();

    let resp = create_event(&app, &token, json!({ "title": "" })).await;
    assert_eq!(resp.status(), 400);

    let resp = create_event(&app, &token, json!({ "title": "   " })).await;
    assert_eq!(resp.status(), 400);

    let resp = create_event(&app, &token, json!({ "title": "x".repeat(201) })).await;
    assert_eq!(resp.status(), 400);

    let resp = app
        .client
        .post(app.url("/events"))
        .json(&json!({ "title": "No token" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn test_host_edits_and_deletes() {
    let app = common::spawn_app().await;
    let (_, host_token) = common::create_test_user();
    let (_, other_token) = common::create_test_user();

    let resp = create_event(&app, &host_token, json!({ "title": "Board games" })).await;
    let body: Value = resp.json().await.unwrap();
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let url = app.url(&format!("/events/{}", id));

    let resp = app
        .client
        .put(&url)
        .bearer_auth(&other_token)
        .json(&json!({ "title": "Mine now" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .put(&url)
        .bearer_auth(&host_token)
        .json(&json!({ "title": "Board games night", "category": "Social" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["data"]["title"], "Board games night");
    assert_eq!(body["data"]["category"], "Social");

    let resp = app
        .client
        .delete(&url)
        .bearer_auth(&other_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = app
        .client
        .delete(&url)
        .bearer_auth(&host_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = app.client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_feed_filters() {
    let app = common::spawn_app().await;
    let (host, token) = common::create_test_user();
    let (_, other_token) = common::create_test_user();

    for (title, category, start) in [
        ("Salsa lessons", "Dance", "2031-01-10T18:00:00Z"),
        ("Swing social", "Dance", "2030-06-01T18:00:00Z"),
        ("Robotics demo", "Tech", "2001-01-01T18:00:00Z"),
    ] {
        let resp = create_event(
            &app,
            &token,
            json!({ "title": title, "category": category, "start_time": start }),
        )
        .await;
        assert_eq!(resp.status(), 200);
    }
    create_event(&app, &other_token, json!({ "title": "Salsa tasting", "category": "Food" })).await;

    let data = feed(&app, "category=Dance").await;
    assert_eq!(data["total"], 2);

    let data = feed(&app, "search=salsa").await;
    assert_eq!(data["total"], 2);

    let data = feed(&app, &format!("host_id={}", host)).await;
    assert_eq!(data["total"], 3);

    let data = feed(&app, "upcoming=true").await;
    assert_eq!(data["total"], 2);
    assert_eq!(data["items"][0]["title"], "Swing social");
    assert_eq!(data["items"][1]["title"], "Salsa lessons");

    let data = feed(&app, "search=salsa&category=Food").await;
    assert_eq!(data["total"], 1);
}
