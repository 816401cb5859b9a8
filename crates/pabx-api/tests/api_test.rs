// tests/api_test.rs
//! Route-level tests of the status surface

use actix_web::{http::StatusCode, test, web, App};
use chrono::Utc;
use pabx_ami::AmiPool;
use pabx_api::configure_routes;
use pabx_cache::MemoryCache;
use pabx_core::config::{AmiConfig, ConsolidatorConfig};
use pabx_core::models::ConsolidatedCall;
use pabx_core::traits::CacheService;
use pabx_services::CallConsolidator;
use serde_json::Value;
use std::sync::Arc;

fn call(id: &str, account: &str, extension: &str) -> ConsolidatedCall {
    ConsolidatedCall::new(
        id,
        format!("PJSIP/{}-00000001", extension),
        account,
        extension,
        Utc::now(),
    )
}

async fn seeded_cache() -> Arc<MemoryCache> {
    let cache = Arc::new(MemoryCache::new());
    cache
        .set("active-calls:U1", &vec![call("1", "U1", "1001")], 60)
        .await
        .unwrap();
    cache
        .set(
            "active-calls:U2",
            &vec![call("2", "U2", "2001"), call("3", "U2", "2002")],
            60,
        )
        .await
        .unwrap();
    cache
}

fn app_data(
    cache: Arc<MemoryCache>,
) -> (web::Data<AmiPool>, web::Data<CallConsolidator<MemoryCache>>) {
    let pool = AmiPool::new(AmiConfig::new("127.0.0.1", 5038, "admin", "secret"));
    let consolidator = CallConsolidator::new(cache, ConsolidatorConfig::default());
    (web::Data::new(pool), web::Data::new(consolidator))
}

#[actix_web::test]
async fn test_health_check() {
    let (pool, consolidator) = app_data(Arc::new(MemoryCache::new()));
    let app = test::init_service(
        App::new()
            .app_data(pool)
            .app_data(consolidator)
            .configure(configure_routes::<MemoryCache>),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "pabx-backend");
}

#[actix_web::test]
async fn test_ami_status_before_initialize() {
    let (pool, consolidator) = app_data(Arc::new(MemoryCache::new()));
    let app = test::init_service(
        App::new()
            .app_data(pool)
            .app_data(consolidator)
            .configure(configure_routes::<MemoryCache>),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/ami/status").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["data"]["initialized"], false);
    assert_eq!(body["data"]["total"], 0);
    assert_eq!(body["data"]["healthy"], 0);
    assert!(body["data"]["connections"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn test_list_all_active_calls() {
    let (pool, consolidator) = app_data(seeded_cache().await);
    let app = test::init_service(
        App::new()
            .app_data(pool)
            .app_data(consolidator)
            .configure(configure_routes::<MemoryCache>),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/active-calls").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    let calls = body["data"].as_array().unwrap();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0]["accountCode"], "U1");
    assert_eq!(calls[0]["channelName"], "PJSIP/1001-00000001");
    assert_eq!(calls[0]["state"], "unknown");
}

#[actix_web::test]
async fn test_account_active_calls() {
    let (pool, consolidator) = app_data(seeded_cache().await);
    let app = test::init_service(
        App::new()
            .app_data(pool)
            .app_data(consolidator)
            .configure(configure_routes::<MemoryCache>),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/active-calls/U2").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["2", "3"]);

    // Unknown accounts are simply empty
    let req = test::TestRequest::get().uri("/api/v1/active-calls/U9").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[actix_web::test]
async fn test_blank_account_code_is_rejected() {
    let (pool, consolidator) = app_data(Arc::new(MemoryCache::new()));
    let app = test::init_service(
        App::new()
            .app_data(pool)
            .app_data(consolidator)
            .configure(configure_routes::<MemoryCache>),
    )
    .await;

    let req = test::TestRequest::get().uri("/api/v1/active-calls/%20").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "invalid_input");
    assert_eq!(body["status"], 400);
}
