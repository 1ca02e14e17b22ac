//! HTTP surface tests
//!
//! Ingestion endpoints and the tracking middleware, wired the same way the
//! server wires them.

use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::test::{self, TestRequest};
use actix_web::{App, HttpResponse, web};
use migration::entities::{PerformanceEntryEntity, RequestEntity, performance_entry_type};
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::{Value, json};
use tempfile::TempDir;

use webanalytics::api::middleware::TrackingMiddleware;
use webanalytics::api::services::ingest_routes;
use webanalytics::config::{DatabaseConfig, TrackingConfig};
use webanalytics::runtime::lifetime::startup::{StartupContext, build_context};
use webanalytics::storage::SeaOrmStorage;

// =============================================================================
// Test Setup
// =============================================================================

async fn setup(tracking: TrackingConfig) -> (StartupContext, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("ingest_test.db");
    let config = DatabaseConfig {
        database_url: format!("sqlite://{}?mode=rwc", db_path.display()),
        ..Default::default()
    };
    let storage = SeaOrmStorage::connect(&config)
        .await
        .expect("Failed to create storage");
    let context = build_context(Arc::new(storage), &tracking)
        .await
        .expect("Failed to build context");
    (context, temp_dir)
}

macro_rules! test_app {
    ($context:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($context.ingestor.clone()))
                .service(ingest_routes())
                .service(
                    web::scope("")
                        .wrap(TrackingMiddleware::new($context.pipeline.clone()))
                        .default_service(web::to(|| async { HttpResponse::NoContent().finish() })),
                ),
        )
        .await
    };
}

macro_rules! post_raw {
    ($app:expr, $uri:expr, $body:expr $(,)?) => {{
        let req = TestRequest::post()
            .uri($uri)
            .insert_header(("content-type", "application/json"))
            .set_payload($body.to_string())
            .to_request();
        let resp = test::call_service(&$app, req).await;
        let status: StatusCode = resp.status();
        let body: Value = test::read_body_json(resp).await;
        (status, body)
    }};
}

// =============================================================================
// Performance entries
// =============================================================================

#[tokio::test]
async fn test_partial_batch_failure() {
    let (context, _dir) = setup(TrackingConfig::default()).await;
    let app = test_app!(context);

    let (status, body) = post_raw!(
        app,
        "/api/performance/",
        r#"[{"entryType":"mark","name":"a","startTime":1,"duration":0},{"entryType":"mark"}]"#,
    );

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], true);
    assert!(body["message"].as_str().unwrap().starts_with("1 of 2"));

    let db = context.storage.get_db();
    assert_eq!(PerformanceEntryEntity::find().count(db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_successful_batch_stores_extra_fields() {
    let (context, _dir) = setup(TrackingConfig::default()).await;
    let app = test_app!(context);

    let (status, body) = post_raw!(
        app,
        "/api/performance/",
        r#"[
            {"entryType":"resource","name":"https://cdn.example.com/app.css","startTime":12.5,"duration":30.25,"transferSize":5120},
            {"entryType":"resource","name":"https://cdn.example.com/app.js"},
            {"entryType":"paint","name":"first-contentful-paint","startTime":480.1,"duration":0}
        ]"#,
    );

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"error": false, "message": "Success"}));

    let db = context.storage.get_db();
    let mut rows = PerformanceEntryEntity::find().all(db).await.unwrap();
    rows.sort_by_key(|r| r.id);
    assert_eq!(rows.len(), 3);

    assert_eq!(rows[0].start_time, Some(12.5));
    assert_eq!(rows[0].duration, 30.25);
    assert_eq!(rows[0].data, json!({"transferSize": 5120}));
    // 缺省值：startTime 为空，duration 为 0
    assert_eq!(rows[1].start_time, None);
    assert_eq!(rows[1].duration, 0.0);
    assert_eq!(rows[1].data, json!({}));

    // 同一批次内同名类型只建一行
    assert_eq!(rows[0].entry_type_id, rows[1].entry_type_id);
    assert_ne!(rows[0].entry_type_id, rows[2].entry_type_id);
    assert_eq!(
        performance_entry_type::Entity::find().count(db).await.unwrap(),
        2
    );
}

#[tokio::test]
async fn test_not_an_array() {
    let (context, _dir) = setup(TrackingConfig::default()).await;
    let app = test_app!(context);

    let (status, body) = post_raw!(app, "/api/performance/", r#"{"entryType":"mark"}"#);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"error": true, "message": "Must send an array of performance entries"})
    );
}

#[tokio::test]
async fn test_invalid_json_is_reported_not_raised() {
    let (context, _dir) = setup(TrackingConfig::default()).await;
    let app = test_app!(context);

    let (status, body) = post_raw!(app, "/api/performance/", "[{not json");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"], true);
}

#[tokio::test]
async fn test_oversized_batch_is_rejected() {
    let (context, _dir) = setup(TrackingConfig {
        max_batch_entries: 2,
        ..Default::default()
    })
    .await;
    let app = test_app!(context);

    let entries: Vec<Value> = (0..3)
        .map(|i| json!({"entryType": "mark", "name": format!("m{}", i)}))
        .collect();
    let (_, body) = post_raw!(
        app,
        "/api/performance/",
        &serde_json::to_string(&entries).unwrap(),
    );
    assert_eq!(body["error"], true);

    let db = context.storage.get_db();
    assert_eq!(PerformanceEntryEntity::find().count(db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_empty_batch_succeeds() {
    let (context, _dir) = setup(TrackingConfig::default()).await;
    let app = test_app!(context);

    let (_, body) = post_raw!(app, "/api/performance/", "[]");
    assert_eq!(body, json!({"error": false, "message": "Success"}));
}

// =============================================================================
// Page view / event
// =============================================================================

#[tokio::test]
async fn test_page_view_and_event_acknowledge() {
    let (context, _dir) = setup(TrackingConfig::default()).await;
    let app = test_app!(context);

    let (status, body) = post_raw!(app, "/api/page-view/", r#"{"path":"/"}"#);
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"error": false}));

    let (_, body) = post_raw!(app, "/api/event/", r#"{"name":"click"}"#);
    assert_eq!(body, json!({"error": false}));

    let (status, body) = post_raw!(app, "/api/event/", "{broken");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"error": true}));

    let req = TestRequest::get().uri("/api/performance/").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"error": false}));
}

// =============================================================================
// Tracking middleware
// =============================================================================

#[tokio::test]
async fn test_middleware_tracks_and_passes_through() {
    let (context, _dir) = setup(TrackingConfig::default()).await;
    let app = test_app!(context);

    let req = TestRequest::get()
        .uri("/products/42?utm=mail")
        .insert_header(("user-agent", "Mozilla/5.0 (X11; Linux x86_64) Firefox/121.0"))
        .insert_header(("x-forwarded-for", "203.0.113.7"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let db = context.storage.get_db();
    assert_eq!(RequestEntity::find().count(db).await.unwrap(), 1);
}

#[tokio::test]
async fn test_middleware_honors_dnt() {
    let (context, _dir) = setup(TrackingConfig::default()).await;
    let app = test_app!(context);

    let req = TestRequest::get()
        .uri("/products/42")
        .insert_header(("dnt", "1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let db = context.storage.get_db();
    assert_eq!(RequestEntity::find().count(db).await.unwrap(), 0);
}

#[tokio::test]
async fn test_disabled_tracking_passes_through() {
    let (context, _dir) = setup(TrackingConfig {
        enabled: false,
        ..Default::default()
    })
    .await;
    let app = test_app!(context);

    let req = TestRequest::get().uri("/products/42").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let db = context.storage.get_db();
    assert_eq!(RequestEntity::find().count(db).await.unwrap(), 0);
}
