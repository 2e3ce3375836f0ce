//! Endpoint tests for `process_3d` and the operational routes.

mod common;

use axum::http::StatusCode;
use serde_json::json;

use common::TestFixture;
use relay3d_core::inference::{api, InferenceError};
use relay3d_core::source::FetchError;
use relay3d_core::testing::MockOutput;

const IMAGE_URL: &str = "https://images.test/chair.png";

fn assert_cors_json(response: &common::TestResponse) {
    assert_eq!(
        response.headers["access-control-allow-origin"],
        "*",
        "missing CORS origin header"
    );
    assert_eq!(response.headers["content-type"], "application/json");
}

// =============================================================================
// Preflight and validation
// =============================================================================

#[tokio::test]
async fn test_options_preflight() {
    let fixture = TestFixture::new();

    let response = fixture.request("OPTIONS", "/process_3d", None).await;

    assert_status!(response, StatusCode::NO_CONTENT);
    assert_eq!(response.headers["access-control-allow-origin"], "*");
    assert_eq!(response.headers["access-control-allow-methods"], "GET, POST");
    assert_eq!(response.headers["access-control-allow-headers"], "Content-Type");
    assert_eq!(fixture.inference.session_count(), 0);
}

#[tokio::test]
async fn test_missing_image_url_rejected_without_remote_calls() {
    let fixture = TestFixture::new();

    let response = fixture
        .post("/process_3d", json!({ "userId": "u1" }))
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_cors_json(&response);
    assert_eq!(response.body, json!({ "error": "No image URL provided" }));
    assert_eq!(fixture.inference.session_count(), 0);
    assert_eq!(fixture.source.fetch_count().await, 0);
    assert_eq!(fixture.store.upload_count().await, 0);
    assert!(fixture.leftover_files().is_empty());
}

#[tokio::test]
async fn test_malformed_body_treated_as_missing_input() {
    let fixture = TestFixture::new();

    let response = fixture.post_raw("/process_3d", "{not json").await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "No image URL provided");
    assert_eq!(fixture.inference.session_count(), 0);
}

#[tokio::test]
async fn test_get_without_body_is_rejected() {
    let fixture = TestFixture::new();

    let response = fixture.get("/process_3d").await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert_cors_json(&response);
}

// =============================================================================
// Successful requests
// =============================================================================

#[tokio::test]
async fn test_video_ready_response() {
    let fixture = TestFixture::new();

    let response = fixture
        .post(
            "/process_3d",
            json!({ "image_url": IMAGE_URL, "userId": "u1" }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    assert_cors_json(&response);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["status"], "video_ready");
    assert_eq!(response.body["userId"], "u1");

    let timestamp = response.body["timestamp"].as_i64().unwrap();
    assert_eq!(
        response.body["video_url"],
        format!(
            "https://storage.test/mock-bucket/processed/u1/{}/preview.mp4",
            timestamp
        )
    );

    // Every artifact is namespaced by the same timestamp.
    let keys = fixture.store.uploaded_keys().await;
    assert_eq!(keys.len(), 3);
    for key in keys {
        assert!(
            key.starts_with(&format!("processed/u1/{}/", timestamp)),
            "unexpected key {}",
            key
        );
    }
    assert!(fixture.leftover_files().is_empty());
}

#[tokio::test]
async fn test_user_id_defaults() {
    let fixture = TestFixture::new();

    let response = fixture
        .post("/process_3d", json!({ "image_url": IMAGE_URL }))
        .await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["userId"], "default");
    assert!(fixture
        .store
        .uploaded_keys()
        .await
        .iter()
        .all(|k| k.starts_with("processed/default/")));
}

#[tokio::test]
async fn test_mesh_failure_keeps_identical_response_shape() {
    let fixture = TestFixture::new();
    fixture
        .inference
        .set_next_error(
            api::EXTRACT_GLB,
            InferenceError::remote(api::EXTRACT_GLB, "extraction crashed"),
        )
        .await;

    let response = fixture
        .post(
            "/process_3d",
            json!({ "image_url": IMAGE_URL, "userId": "u1" }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    let mut keys: Vec<&str> = response
        .body
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["status", "success", "timestamp", "userId", "video_url"]);
    assert_eq!(response.body["status"], "video_ready");
    assert!(fixture.leftover_files().is_empty());
}

#[tokio::test]
async fn test_multiple_meshes_uploaded_with_indexes() {
    let fixture = TestFixture::new();
    fixture
        .inference
        .set_output(
            api::EXTRACT_GLB,
            MockOutput::Sequence(vec!["a.glb".to_string(), "b.glb".to_string()]),
        )
        .await;

    let response = fixture
        .post(
            "/process_3d",
            json!({ "image_url": IMAGE_URL, "userId": "u1" }),
        )
        .await;

    assert_status!(response, StatusCode::OK);
    let timestamp = response.body["timestamp"].as_i64().unwrap();
    let keys = fixture.store.uploaded_keys().await;
    assert!(keys.contains(&format!("processed/u1/{}/model_0.glb", timestamp)));
    assert!(keys.contains(&format!("processed/u1/{}/model_1.glb", timestamp)));
    assert!(!keys.contains(&format!("processed/u1/{}/model.glb", timestamp)));
}

#[tokio::test]
async fn test_detached_mesh_extraction_finishes_after_response() {
    let fixture = TestFixture::with_config(|config| {
        config.pipeline.detach_mesh_extraction = true;
    });

    let response = fixture
        .post(
            "/process_3d",
            json!({ "image_url": IMAGE_URL, "userId": "u1" }),
        )
        .await;
    assert_status!(response, StatusCode::OK);

    fixture.state.drain_mesh_extractions().await;

    assert_eq!(
        fixture.inference.call_names().await,
        vec![api::PREPROCESS_IMAGE, api::IMAGE_TO_3D, api::EXTRACT_GLB]
    );
    assert_eq!(fixture.store.uploaded_keys().await.len(), 3);
    assert!(fixture.leftover_files().is_empty());
}

// =============================================================================
// Fatal failures
// =============================================================================

#[tokio::test]
async fn test_download_failure_returns_500() {
    let fixture = TestFixture::new();
    fixture
        .source
        .push_error(FetchError::HttpStatus {
            url: IMAGE_URL.to_string(),
            status: 404,
        })
        .await;

    let response = fixture
        .post("/process_3d", json!({ "image_url": IMAGE_URL }))
        .await;

    assert_status!(response, StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors_json(&response);
    assert_eq!(response.body["error_type"], "DownloadError");
    assert!(response.body["error"].as_str().unwrap().contains("404"));
    assert_eq!(fixture.store.upload_count().await, 0);
    assert!(fixture.leftover_files().is_empty());
}

#[tokio::test]
async fn test_session_failure_returns_500() {
    let fixture = TestFixture::new();
    fixture
        .inference
        .set_session_error(InferenceError::ConnectionFailed("space asleep".to_string()))
        .await;

    let response = fixture
        .post("/process_3d", json!({ "image_url": IMAGE_URL }))
        .await;

    assert_status!(response, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error_type"], "SessionError");
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("space asleep"));
}

#[tokio::test]
async fn test_generation_failure_returns_500_and_cleans_up() {
    let fixture = TestFixture::new();
    fixture
        .inference
        .set_next_error(
            api::IMAGE_TO_3D,
            InferenceError::remote(api::IMAGE_TO_3D, "GPU quota exceeded"),
        )
        .await;

    let response = fixture
        .post("/process_3d", json!({ "image_url": IMAGE_URL }))
        .await;

    assert_status!(response, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body["error_type"], "InferenceError");
    assert!(fixture.leftover_files().is_empty());
}

// =============================================================================
// Operational routes
// =============================================================================

#[tokio::test]
async fn test_health() {
    let fixture = TestFixture::new();

    let response = fixture.get("/health").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_config_is_sanitized() {
    let fixture = TestFixture::with_config(|config| {
        config.inference.hf_token = Some("hf_secret".to_string());
    });

    let response = fixture.get("/config").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["inference"]["hf_token_configured"], true);
    assert!(!response.body.to_string().contains("hf_secret"));
}

#[tokio::test]
async fn test_metrics_exposition() {
    let fixture = TestFixture::new();
    fixture
        .post("/process_3d", json!({ "image_url": IMAGE_URL }))
        .await;

    let response = fixture.get("/metrics").await;

    assert_status!(response, StatusCode::OK);
    let text = response.body.as_str().unwrap();
    assert!(text.contains("relay3d_pipeline_runs_total"));
    assert!(text.contains("relay3d_http_requests_total"));
}

#[tokio::test]
async fn test_local_blobs_are_served() {
    let fixture = TestFixture::new();
    let root = fixture.config.storage.local.root.clone();
    std::fs::create_dir_all(root.join("processed/u1/1")).unwrap();
    std::fs::write(root.join("processed/u1/1/preview.mp4"), b"\"mp4\"").unwrap();

    let response = fixture.get("/blobs/processed/u1/1/preview.mp4").await;

    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body, json!("mp4"));
}
