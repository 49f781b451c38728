#![allow(dead_code)]

use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::Value;
use slug_board::{
    config::{BoardConfig, StoreBackend},
    models::EventModel,
    store::{EventStore, MemoryStore},
};
use std::net::SocketAddr;
use std::sync::{Arc, Once};
use uuid::Uuid;

static INIT: Once = Once::new();

fn init_env() {
    INIT.call_once(|| {
        dotenv::dotenv().ok();
        std::env::set_var(
            "JWT_SECRET",
            "integration_test_secret_that_is_at_least_32_characters_long",
        );
        std::env::set_var("JWT_AUDIENCE", "authenticated");
        std::env::set_var("RATE_LIMIT_ENABLED", "false");
        let config = slug_board::config::jwt::JwtConfig::from_env().unwrap();
        let _ = slug_board::utils::jwt::init_jwt_config(config);
    });
}

pub struct TestApp {
    pub addr: String,
    pub store: Arc<MemoryStore>,
    pub client: Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.addr, path)
    }

    /// Insert an event with the given cached vote counts and return its id.
    pub async fn seed_event(&self, upvotes: i32, downvotes: i32) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        self.store
            .insert_event(EventModel {
                id,
                host_id: Uuid::new_v4(),
                title: "Banana Slug Social".to_string(),
                description: "Meet other slugs at Quarry Plaza.".to_string(),
                location: Some("Quarry Plaza".to_string()),
                category: Some("Social".to_string()),
                start_time: Some(now + Duration::days(3)),
                upvotes_count: upvotes,
                downvotes_count: downvotes,
                rsvp_count: 0,
                comments_count: 0,
                created_at: now,
                updated_at: now,
            })
            .await
            .expect("Failed to seed event");
        id
    }

    pub async fn get_event(&self, id: Uuid) -> Value {
        let resp = self
            .client
            .get(self.url(&format!("/events/{}", id)))
            .send()
            .await
            .expect("Failed to fetch event");
        assert_eq!(resp.status(), 200);
        let body: Value = resp.json().await.expect("Failed to parse event");
        body["data"].clone()
    }
}

pub async fn spawn_app() -> TestApp {
    init_env();

    let store = Arc::new(MemoryStore::new());
    let board = BoardConfig {
        backend: StoreBackend::Memory,
        seed_demo_events: false,
        ..BoardConfig::default()
    };

    let app = slug_board::app::create_app(store.clone(), board);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        addr: format!("http://{}", addr),
        store,
        client: Client::new(),
    }
}

/// A fresh user id with a signed access token for it.
pub fn create_test_user() -> (Uuid, String) {
    let user_id = Uuid::new_v4();
    let token = slug_board::utils::jwt::encode_access_token(&user_id.to_string(), 3600)
        .expect("Failed to sign test token");
    (user_id, token)
}
