//! Cache effectiveness integration tests.
//!
//! Tests verify:
//! - Repeated requests are served from memory without re-transforming
//! - Computed pictures are written back and survive a restart
//! - Concurrent misses for one picture run a single transform
//! - Durable write failures never change the response

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use picture_proxy::transform::{CacheStatus, PictureRequest, TransformParams, TransformService};
use picture_proxy::{create_router, OutputFormat, RouterConfig};

use super::test_utils::{create_test_png, is_valid_jpeg, CountingTransformer, MemoryObjectStore};

fn store_with_cat() -> MemoryObjectStore {
    MemoryObjectStore::new().with_object("cat.png", create_test_png(200, 100), "image/png")
}

// =============================================================================
// Memory Tier
// =============================================================================

#[tokio::test]
async fn test_second_request_served_from_memory() {
    let transformer = CountingTransformer::new();
    let router = create_router(
        TransformService::with_transformer(store_with_cat(), transformer.clone()),
        RouterConfig::new(),
    );

    let request1 = Request::builder()
        .uri("/pictures/cat.png?w=50")
        .body(Body::empty())
        .unwrap();
    let response1 = router.clone().oneshot(request1).await.unwrap();
    assert_eq!(response1.status(), StatusCode::OK);
    assert_eq!(response1.headers().get("x-picture-cache").unwrap(), "miss");
    let body1 = response1.into_body().collect().await.unwrap().to_bytes();

    let request2 = Request::builder()
        .uri("/pictures/cat.png?w=50")
        .body(Body::empty())
        .unwrap();
    let response2 = router.oneshot(request2).await.unwrap();
    assert_eq!(response2.status(), StatusCode::OK);
    assert_eq!(
        response2.headers().get("x-picture-cache").unwrap(),
        "memory"
    );
    let body2 = response2.into_body().collect().await.unwrap().to_bytes();

    assert_eq!(body1, body2);
    assert!(is_valid_jpeg(&body2));
    assert_eq!(transformer.calls(), 1);
}

#[tokio::test]
async fn test_equivalent_queries_share_one_entry() {
    let transformer = CountingTransformer::new();
    let service = TransformService::with_transformer(store_with_cat(), transformer.clone());

    let omitted = TransformParams::identity().with_width(80);
    let explicit = TransformParams::identity()
        .with_width(80)
        .with_format(OutputFormat::Jpeg)
        .with_quality(85)
        .with_grayscale(false);

    let first = service
        .get_picture(PictureRequest::new("cat.png", omitted))
        .await
        .unwrap();
    let second = service
        .get_picture(PictureRequest::new("cat.png", explicit))
        .await
        .unwrap();

    assert_eq!(first.key, second.key);
    assert_eq!(second.cache, CacheStatus::Memory);
    assert_eq!(transformer.calls(), 1);
}

// =============================================================================
// Durable Tier
// =============================================================================

#[tokio::test]
async fn test_write_back_survives_restart() {
    let store = store_with_cat();
    let params = TransformParams::identity()
        .with_height(25)
        .with_format(OutputFormat::Png);

    let first_run = TransformService::new(store.clone());
    let computed = first_run
        .get_picture(PictureRequest::new("cat.png", params))
        .await
        .unwrap();
    assert_eq!(computed.cache, CacheStatus::Miss);
    assert_eq!(computed.key, "cat_autox25_q85_gray0.png");

    store.wait_for_puts(1).await;
    let stored = store.object("cat_autox25_q85_gray0.png").await.unwrap();
    assert_eq!(stored.content_type, "image/png");
    assert_eq!(stored.data, computed.image.data);

    // A fresh process has an empty memory tier but shares the bucket
    let transformer = CountingTransformer::new();
    let second_run = TransformService::with_transformer(store.clone(), transformer.clone());
    let restored = second_run
        .get_picture(PictureRequest::new("cat.png", params))
        .await
        .unwrap();

    assert_eq!(restored.cache, CacheStatus::Store);
    assert_eq!(restored.image, computed.image);
    assert_eq!(transformer.calls(), 0);
}

#[tokio::test]
async fn test_write_back_failure_does_not_change_response() {
    let store = store_with_cat();
    store.fail_puts(true);
    let transformer = CountingTransformer::new();
    let service = TransformService::with_transformer(store.clone(), transformer.clone());
    let params = TransformParams::identity().with_width(40);

    let response = service
        .get_picture(PictureRequest::new("cat.png", params))
        .await
        .unwrap();
    assert_eq!(response.cache, CacheStatus::Miss);
    assert!(is_valid_jpeg(&response.image.data));

    store.wait_for_puts(1).await;
    assert!(store.object(&response.key).await.is_none());

    // Still cached in memory
    let again = service
        .get_picture(PictureRequest::new("cat.png", params))
        .await
        .unwrap();
    assert_eq!(again.cache, CacheStatus::Memory);
    assert_eq!(transformer.calls(), 1);
}

#[tokio::test]
async fn test_originals_are_never_overwritten() {
    let store = store_with_cat();
    let original = store.object("cat.png").await.unwrap();
    let service = TransformService::new(store.clone());

    for w in [10, 20, 30] {
        service
            .get_picture(PictureRequest::new(
                "cat.png",
                TransformParams::identity().with_width(w),
            ))
            .await
            .unwrap();
    }
    store.wait_for_puts(3).await;

    assert_eq!(store.object("cat.png").await.unwrap(), original);
    assert_eq!(
        store.keys().await,
        vec![
            "cat.png",
            "cat_10xauto_q85_gray0.jpeg",
            "cat_20xauto_q85_gray0.jpeg",
            "cat_30xauto_q85_gray0.jpeg",
        ]
    );
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_single_transform() {
    let transformer = CountingTransformer::new().with_delay(Duration::from_millis(100));
    let service = Arc::new(TransformService::with_transformer(
        store_with_cat(),
        transformer.clone(),
    ));
    let params = TransformParams::identity().with_width(64).with_grayscale(true);

    let mut handles = Vec::new();
    for _ in 0..10 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .get_picture(PictureRequest::new("cat.png", params))
                .await
                .unwrap()
        }));
    }

    let mut bodies = Vec::new();
    for handle in handles {
        bodies.push(handle.await.unwrap().image.data);
    }

    assert_eq!(transformer.calls(), 1);
    assert!(bodies.iter().all(|b| *b == bodies[0]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_keys_do_not_block_each_other() {
    let transformer = CountingTransformer::new().with_delay(Duration::from_millis(50));
    let service = Arc::new(TransformService::with_transformer(
        store_with_cat(),
        transformer.clone(),
    ));

    let mut handles = Vec::new();
    for w in 1..=4u32 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .get_picture(PictureRequest::new(
                    "cat.png",
                    TransformParams::identity().with_width(w * 10),
                ))
                .await
                .unwrap()
        }));
    }

    let mut keys = Vec::new();
    for handle in handles {
        keys.push(handle.await.unwrap().key);
    }
    keys.sort();
    keys.dedup();

    assert_eq!(keys.len(), 4);
    assert_eq!(transformer.calls(), 4);
}
