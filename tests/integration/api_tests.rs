//! API integration tests for picture retrieval and error handling.
//!
//! Tests verify:
//! - Original passthrough and transformed variants over HTTP
//! - Query parameter parsing and validation
//! - Error cases (missing source, undecodable source, store outage)
//! - HTTP response codes and headers

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use picture_proxy::transform::TransformService;
use picture_proxy::{create_router, RouterConfig};

use super::test_utils::{
    create_test_jpeg, create_test_png, create_test_rgba_png, dimensions, is_valid_jpeg,
    is_valid_png, is_valid_webp, CountingTransformer, MemoryObjectStore,
};

fn router_for(store: MemoryObjectStore) -> Router {
    create_router(TransformService::new(store), RouterConfig::new())
}

async fn get(router: Router, uri: &str) -> Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    router.oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

async fn error_type(response: Response) -> String {
    let body = body_bytes(response).await;
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    error["error"].as_str().unwrap().to_string()
}

// =============================================================================
// Picture Retrieval
// =============================================================================

#[tokio::test]
async fn test_resize_returns_jpeg_by_default() {
    let store = MemoryObjectStore::new().with_object("cat.png", create_test_png(400, 200), "image/png");
    let router = router_for(store);

    let response = get(router, "/pictures/cat.png?w=100&h=100").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=3600"
    );
    assert_eq!(response.headers().get("x-picture-cache").unwrap(), "miss");

    let body = body_bytes(response).await;
    assert!(is_valid_jpeg(&body));
    assert_eq!(dimensions(&body), (100, 50));
}

#[tokio::test]
async fn test_identity_request_passes_png_through() {
    let original = create_test_png(32, 16);
    let store = MemoryObjectStore::new().with_object("cat.png", original.clone(), "image/png");
    let transformer = CountingTransformer::new();
    let router = create_router(
        TransformService::with_transformer(store.clone(), transformer.clone()),
        RouterConfig::new(),
    );

    let response = get(router, "/pictures/cat.png").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(response.headers().get("x-picture-cache").unwrap(), "store");

    let body = body_bytes(response).await;
    assert_eq!(&body[..], &original[..]);
    assert_eq!(transformer.calls(), 0);
    assert_eq!(store.get_calls(), 1);
    assert_eq!(store.put_calls(), 0);
}

#[tokio::test]
async fn test_explicit_defaults_are_identity() {
    let original = create_test_jpeg(20, 20);
    let store = MemoryObjectStore::new().with_object("dog.jpg", original.clone(), "image/jpeg");
    let router = router_for(store);

    let response = get(router, "/pictures/dog.jpg?q=85&gray=0").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(&body_bytes(response).await[..], &original[..]);
}

#[tokio::test]
async fn test_output_formats() {
    let store = MemoryObjectStore::new().with_object("cat.jpg", create_test_jpeg(64, 48), "image/jpeg");
    let router = router_for(store);

    let response = get(router.clone(), "/pictures/cat.jpg?w=32&fm=png").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    let body = body_bytes(response).await;
    assert!(is_valid_png(&body));
    assert_eq!(dimensions(&body), (32, 24));

    let response = get(router, "/pictures/cat.jpg?fm=WEBP&q=40").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/webp");
    assert!(is_valid_webp(&body_bytes(response).await));
}

#[tokio::test]
async fn test_png_output_keeps_alpha() {
    let store =
        MemoryObjectStore::new().with_object("logo.png", create_test_rgba_png(32, 32), "image/png");
    let router = router_for(store);

    let response = get(router, "/pictures/logo.png?w=16&fm=png").await;
    assert_eq!(response.status(), StatusCode::OK);

    let img = image::load_from_memory(&body_bytes(response).await).unwrap();
    assert!(img.color().has_alpha());
    assert_eq!((img.width(), img.height()), (16, 16));
}

#[tokio::test]
async fn test_grayscale_parameter() {
    let store = MemoryObjectStore::new().with_object("cat.png", create_test_png(16, 16), "image/png");
    let router = router_for(store);

    let response = get(router, "/pictures/cat.png?gray=1&fm=png").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    let img = image::load_from_memory(&body).unwrap();
    assert!(!img.color().has_color());
}

#[tokio::test]
async fn test_no_enlargement_over_http() {
    let store = MemoryObjectStore::new().with_object("small.png", create_test_png(40, 30), "image/png");
    let router = router_for(store);

    let response = get(router, "/pictures/small.png?w=400&h=300").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(dimensions(&body_bytes(response).await), (40, 30));
}

#[tokio::test]
async fn test_nested_source_id() {
    let store = MemoryObjectStore::new().with_object(
        "albums/2024/cat.png",
        create_test_png(50, 50),
        "image/png",
    );
    let router = router_for(store.clone());

    let response = get(router, "/pictures/albums/2024/cat.png?w=10").await;
    assert_eq!(response.status(), StatusCode::OK);

    store.wait_for_puts(1).await;
    assert!(store
        .object("albums/2024/cat_10xauto_q85_gray0.jpeg")
        .await
        .is_some());
}

#[tokio::test]
async fn test_unknown_query_parameters_ignored() {
    let store = MemoryObjectStore::new().with_object("cat.png", create_test_png(20, 20), "image/png");
    let router = router_for(store);

    let response = get(router, "/pictures/cat.png?w=10&utm_source=mail").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_custom_cache_max_age() {
    let store = MemoryObjectStore::new().with_object("cat.png", create_test_png(8, 8), "image/png");
    let router = create_router(
        TransformService::new(store),
        RouterConfig::new().with_cache_max_age(60),
    );

    let response = get(router, "/pictures/cat.png").await;
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "public, max-age=60"
    );
}

// =============================================================================
// Error Handling
// =============================================================================

#[tokio::test]
async fn test_missing_source_returns_404() {
    let router = router_for(MemoryObjectStore::new());

    let response = get(router.clone(), "/pictures/nope.png?w=100").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_type(response).await, "not_found");

    let response = get(router, "/pictures/nope.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_parameters_return_400() {
    let store = MemoryObjectStore::new().with_object("cat.png", create_test_png(8, 8), "image/png");
    let router = router_for(store.clone());

    for uri in [
        "/pictures/cat.png?w=0",
        "/pictures/cat.png?w=-5",
        "/pictures/cat.png?h=abc",
        "/pictures/cat.png?fm=gif",
        "/pictures/cat.png?q=high",
        "/pictures/cat.png?gray=maybe",
    ] {
        let response = get(router.clone(), uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(error_type(response).await, "invalid_parameters");
    }

    // Rejected before touching the store
    assert_eq!(store.exists_calls(), 0);
}

#[tokio::test]
async fn test_relative_source_id_rejected() {
    let router = router_for(MemoryObjectStore::new());

    let response = get(router, "/pictures/a/%2E%2E/secret.png").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_out_of_range_quality_is_clamped() {
    let store = MemoryObjectStore::new().with_object("cat.png", create_test_png(16, 16), "image/png");
    let router = router_for(store.clone());

    let response = get(router, "/pictures/cat.png?q=500").await;
    assert_eq!(response.status(), StatusCode::OK);

    store.wait_for_puts(1).await;
    assert!(store
        .object("cat_autoxauto_q100_gray0.jpeg")
        .await
        .is_some());
}

#[tokio::test]
async fn test_undecodable_source_returns_422() {
    let store = MemoryObjectStore::new().with_object(
        "notes.png",
        b"definitely not a picture".to_vec(),
        "image/png",
    );
    let router = router_for(store.clone());

    let response = get(router, "/pictures/notes.png?w=10").await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_type(response).await, "decode_error");
    assert_eq!(store.put_calls(), 0);
}

#[tokio::test]
async fn test_store_outage_returns_502() {
    let store = MemoryObjectStore::new().with_object("cat.png", create_test_png(8, 8), "image/png");
    store.fail_all(true);
    let router = router_for(store);

    let response = get(router, "/pictures/cat.png?w=4").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(error_type(response).await, "storage_unavailable");
}

// =============================================================================
// Health Check
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let router = router_for(MemoryObjectStore::new());

    let response = get(router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_bytes(response).await;
    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["version"].is_string());
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let router = router_for(MemoryObjectStore::new());

    let response = get(router, "/thumbnails/cat.png").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
