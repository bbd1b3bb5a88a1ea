//! Management API integration tests
//!
//! These tests drive the asset API end to end: creation with generated
//! images, degradation warnings, image resolution, updates, teardown, and
//! design file uploads.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use base64::prelude::*;
use magpie::api::routes::create_api_router;
use magpie::auth::AuthService;
use magpie::external::{ImageStore, StoreError, StoreResult, StoredFile, TransformParams};
use magpie::models::{NewQrAsset, PixelShape, TemplateData};
use magpie::storage::{SqliteStorage, Storage};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Helper to create test storage
async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn open_auth() -> Arc<AuthService> {
    Arc::new(AuthService::new(false, vec![]))
}

/// In-memory image store that records calls and hands out sequential ids.
struct TestStore {
    uploads: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    fail_uploads: bool,
}

impl TestStore {
    fn new(fail_uploads: bool) -> Arc<Self> {
        Arc::new(Self {
            uploads: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            fail_uploads,
        })
    }

    fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }

    fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageStore for TestStore {
    async fn upload(
        &self,
        _bytes: &[u8],
        file_name: &str,
        folder: &str,
        _tags: &[&str],
    ) -> StoreResult<StoredFile> {
        if self.fail_uploads {
            return Err(StoreError::Rejected {
                operation: "upload",
                status: 500,
            });
        }

        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(format!("{}/{}", folder, file_name));
        let n = uploads.len();
        Ok(StoredFile {
            file_id: format!("file-{}", n),
            url: format!("https://media.test/hosted/file-{}", n),
            thumbnail_url: Some(format!("https://media.test/thumb/file-{}", n)),
        })
    }

    async fn delete(&self, file_id: &str) -> StoreResult<()> {
        self.deletes.lock().unwrap().push(file_id.to_string());
        Ok(())
    }

    fn transform_url(&self, file_id: &str, params: TransformParams) -> String {
        let mut tr = format!("w-{},q-{}", params.width, params.quality);
        if let Some(format) = params.format {
            tr.push_str(",f-");
            tr.push_str(format);
        }
        format!("https://media.test/{}?tr={}", file_id, tr)
    }

    fn attachment_url(&self, url: &str) -> String {
        format!("{}&attachment=true", url)
    }
}

fn app(storage: Arc<dyn Storage>, store: Option<Arc<TestStore>>) -> Router {
    let store = store.map(|s| s as Arc<dyn ImageStore>);
    create_api_router(storage, store, open_auth())
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn patch_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn tiny_png_base64() -> String {
    let image = image::RgbaImage::from_pixel(8, 8, image::Rgba([10, 20, 30, 255]));
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    BASE64_STANDARD.encode(&bytes)
}

#[tokio::test]
async fn test_create_asset_returns_generated_image() {
    let storage = create_test_storage().await;
    let app = app(storage, None);

    let response = app
        .oneshot(post_json("/assets", r#"{"payload": "https://example.com"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let code = json["code"].as_str().unwrap();
    assert_eq!(code.len(), 8);
    assert!(
        code.chars().next().unwrap().is_ascii_alphabetic(),
        "Codes must start with a letter, got {}",
        code
    );
    assert_eq!(json["kind"], "url");
    assert_eq!(json["color"], "#000000");
    assert_eq!(json["background_color"], "#FFFFFF");
    assert_eq!(json["pixel_shape"], "square");
    assert!(json["embedded_image"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
    assert_eq!(json["scan_count"], 0);
    assert_eq!(json["scanned"], false);
    assert!(
        json.get("warnings").is_none(),
        "A clean creation should carry no warnings"
    );
    assert!(json["hosted_url"].is_null(), "No store, no hosted URL");
}

#[tokio::test]
async fn test_create_infers_text_kind() {
    let storage = create_test_storage().await;
    let app = app(storage, None);

    let response = app
        .oneshot(post_json("/assets", r#"{"payload": "hello world"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["kind"], "text");
}

#[tokio::test]
async fn test_invalid_colors_are_stored_verbatim() {
    let storage = create_test_storage().await;
    let app = app(storage, None);

    let response = app
        .oneshot(post_json(
            "/assets",
            r##"{"payload": "https://example.com", "color": "#GGGGGG", "background_color": "bogus"}"##,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    // The stored style is exactly what the client sent; rendering silently
    // fell back to the default palette.
    assert_eq!(json["color"], "#GGGGGG");
    assert_eq!(json["background_color"], "bogus");
    assert!(json["embedded_image"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_empty_payload_is_rejected() {
    let storage = create_test_storage().await;
    let app = app(storage, None);

    let response = app
        .oneshot(post_json("/assets", r#"{"payload": ""}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_oversized_payload_is_rejected() {
    let storage = create_test_storage().await;
    let app = app(storage, None);

    let payload = "x".repeat(4000);
    let response = app
        .oneshot(post_json(
            "/assets",
            &format!(r#"{{"payload": "{}"}}"#, payload),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_undecodable_logo_degrades_with_warning() {
    let storage = create_test_storage().await;
    let app = app(storage, None);

    let response = app
        .oneshot(post_json(
            "/assets",
            r#"{"payload": "https://example.com", "logo": "!!!"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(
        response.status(),
        StatusCode::CREATED,
        "A broken logo must not fail the request"
    );

    let json = body_json(response).await;
    let warnings = json["warnings"].as_array().unwrap();
    assert!(warnings
        .iter()
        .any(|w| w.as_str().unwrap().contains("base64")));
    assert!(json["embedded_image"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_create_with_logo_uploads_both_files() {
    let storage = create_test_storage().await;
    let store = TestStore::new(false);
    let app = app(storage, Some(store.clone()));

    let response = app
        .oneshot(post_json(
            "/assets",
            &format!(
                r#"{{"payload": "https://example.com", "logo": "{}"}}"#,
                tiny_png_base64()
            ),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["hosted_url"], "https://media.test/hosted/file-1");
    assert_eq!(json["hosted_thumbnail_url"], "https://media.test/thumb/file-1");
    assert_eq!(json["external_file_id"], "file-1");
    assert_eq!(json["logo_file_id"], "file-2");
    assert!(json.get("warnings").is_none());

    let uploads = store.uploads();
    assert_eq!(uploads.len(), 2);
    assert!(uploads[0].starts_with("qr-codes/qr-"));
    assert!(uploads[0].ends_with(".png"));
    assert!(uploads[1].starts_with("qr-codes/logo-"));
    assert!(uploads[1].ends_with(".png"));
}

#[tokio::test]
async fn test_upload_failure_falls_back_to_embedded() {
    let storage = create_test_storage().await;
    let store = TestStore::new(true);
    let app = app(storage, Some(store));

    let response = app
        .clone()
        .oneshot(post_json("/assets", r#"{"payload": "https://example.com"}"#))
        .await
        .unwrap();
    assert_eq!(
        response.status(),
        StatusCode::CREATED,
        "Upload failures degrade, they do not fail creation"
    );

    let json = body_json(response).await;
    assert!(json["hosted_url"].is_null());
    assert!(json["external_file_id"].is_null());
    let warnings = json["warnings"].as_array().unwrap();
    assert!(warnings
        .iter()
        .any(|w| w.as_str().unwrap().contains("upload failed")));

    // The embedded copy still resolves through the image endpoint
    let code = json["code"].as_str().unwrap();
    let response = app
        .oneshot(get(&format!("/assets/{}/image", code)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["url"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_image_endpoint_prefers_hosted_url() {
    let storage = create_test_storage().await;
    let store = TestStore::new(false);
    let app = app(storage, Some(store));

    let response = app
        .clone()
        .oneshot(post_json("/assets", r#"{"payload": "https://example.com"}"#))
        .await
        .unwrap();
    let json = body_json(response).await;
    let code = json["code"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(get(&format!("/assets/{}/image", code)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["url"], "https://media.test/hosted/file-1");

    // Downloads follow the same precedence and redirect out
    let response = app
        .oneshot(get(&format!("/assets/{}/download", code)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://media.test/hosted/file-1"
    );
}

#[tokio::test]
async fn test_transform_urls_serve_assets_that_only_have_a_file_id() {
    let storage = create_test_storage().await;
    let store = TestStore::new(false);

    // Seed a row that has a stored file id but no hosted URLs, as left by
    // an older ingestion path.
    let seed = NewQrAsset {
        code: "filesonly".to_string(),
        kind: "url".to_string(),
        payload: "https://example.com".to_string(),
        color: "#000000".to_string(),
        background_color: "#FFFFFF".to_string(),
        pixel_shape: PixelShape::Square,
        hosted_url: None,
        hosted_thumbnail_url: None,
        external_file_id: Some("file-9".to_string()),
        embedded_image: None,
        logo_file_id: None,
        template_data: TemplateData::default(),
        owner: None,
    };
    storage.create(&seed).await.unwrap();

    let app = app(storage, Some(store));

    let response = app
        .clone()
        .oneshot(get("/assets/filesonly/image"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["url"], "https://media.test/file-9?tr=w-512,q-80");

    let response = app
        .oneshot(get("/assets/filesonly/download"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        response.headers().get("location").unwrap(),
        "https://media.test/file-9?tr=w-1024,q-100,f-png&attachment=true"
    );
}

#[tokio::test]
async fn test_download_serves_embedded_bytes_as_attachment() {
    let storage = create_test_storage().await;
    let app = app(storage, None);

    let response = app
        .clone()
        .oneshot(post_json("/assets", r#"{"payload": "https://example.com"}"#))
        .await
        .unwrap();
    let json = body_json(response).await;
    let code = json["code"].as_str().unwrap().to_string();

    let response = app
        .oneshot(get(&format!("/assets/{}/download", code)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers().get("content-type").unwrap(), "image/png");
    assert_eq!(
        response.headers().get("content-disposition").unwrap(),
        &format!("attachment; filename=\"{}.png\"", code)
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..8], b"\x89PNG\r\n\x1a\n", "Body should be PNG bytes");
}

#[tokio::test]
async fn test_asset_with_no_image_resolves_to_404() {
    let storage = create_test_storage().await;

    let seed = NewQrAsset {
        code: "imageless".to_string(),
        kind: "text".to_string(),
        payload: "bare".to_string(),
        color: "#000000".to_string(),
        background_color: "#FFFFFF".to_string(),
        pixel_shape: PixelShape::Square,
        hosted_url: None,
        hosted_thumbnail_url: None,
        external_file_id: None,
        embedded_image: None,
        logo_file_id: None,
        template_data: TemplateData::default(),
        owner: None,
    };
    storage.create(&seed).await.unwrap();

    let app = app(storage, None);

    let response = app
        .clone()
        .oneshot(get("/assets/imageless/image"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(get("/assets/imageless/download"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_regenerates_the_image() {
    let storage = create_test_storage().await;
    let app = app(storage, None);

    let response = app
        .clone()
        .oneshot(post_json("/assets", r#"{"payload": "https://example.com"}"#))
        .await
        .unwrap();
    let created = body_json(response).await;
    let code = created["code"].as_str().unwrap().to_string();
    let original_image = created["embedded_image"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(patch_json(
            &format!("/assets/{}", code),
            r##"{"color": "#FF0000"}"##,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let updated = body_json(response).await;
    assert_eq!(updated["color"], "#FF0000");
    let new_image = updated["embedded_image"].as_str().unwrap();
    assert_ne!(
        new_image, original_image,
        "A style change must regenerate the image"
    );

    // The change is durable
    let response = app
        .oneshot(get(&format!("/assets/{}", code)))
        .await
        .unwrap();
    let fetched = body_json(response).await;
    assert_eq!(fetched["color"], "#FF0000");
    assert_eq!(fetched["embedded_image"], new_image);
}

#[tokio::test]
async fn test_update_without_style_fields_keeps_the_image() {
    let storage = create_test_storage().await;
    let app = app(storage, None);

    let response = app
        .clone()
        .oneshot(post_json("/assets", r#"{"payload": "https://example.com"}"#))
        .await
        .unwrap();
    let created = body_json(response).await;
    let code = created["code"].as_str().unwrap().to_string();
    let original_image = created["embedded_image"].as_str().unwrap().to_string();

    let response = app
        .oneshot(patch_json(
            &format!("/assets/{}", code),
            r#"{"template_data": {"uploads": [], "design": {"layout": "grid"}}}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let updated = body_json(response).await;
    assert_eq!(updated["embedded_image"], original_image.as_str());
    assert_eq!(updated["template_data"]["design"]["layout"], "grid");
}

#[tokio::test]
async fn test_update_replaces_stale_hosted_files() {
    let storage = create_test_storage().await;
    let store = TestStore::new(false);
    let app = app(storage, Some(store.clone()));

    let response = app
        .clone()
        .oneshot(post_json("/assets", r#"{"payload": "https://example.com"}"#))
        .await
        .unwrap();
    let created = body_json(response).await;
    let code = created["code"].as_str().unwrap().to_string();
    assert_eq!(created["external_file_id"], "file-1");

    let response = app
        .oneshot(patch_json(
            &format!("/assets/{}", code),
            r#"{"payload": "https://example.com/v2"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let updated = body_json(response).await;
    assert_eq!(updated["payload"], "https://example.com/v2");
    assert_eq!(updated["external_file_id"], "file-2");
    assert_eq!(updated["hosted_url"], "https://media.test/hosted/file-2");

    // The replaced blob was deleted from the store
    assert_eq!(store.deletes(), vec!["file-1"]);
}

#[tokio::test]
async fn test_update_missing_asset_returns_404() {
    let storage = create_test_storage().await;
    let app = app(storage, None);

    let response = app
        .oneshot(patch_json("/assets/missing1", r##"{"color": "#FF0000"}"##))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_tears_down_external_files() {
    let storage = create_test_storage().await;
    let store = TestStore::new(false);
    let app = app(storage.clone(), Some(store.clone()));

    let response = app
        .clone()
        .oneshot(post_json("/assets", r#"{"payload": "https://example.com"}"#))
        .await
        .unwrap();
    let created = body_json(response).await;
    let code = created["code"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/assets/{}", code))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["message"], "QR asset deleted");
    assert_eq!(json["deleted_external"], serde_json::json!(["file-1"]));
    assert_eq!(json["failed_external"], serde_json::json!([]));
    assert_eq!(json["local_deleted"], true);
    assert_eq!(store.deletes(), vec!["file-1"]);

    // The asset is gone
    let response = app
        .oneshot(get(&format!("/assets/{}", code)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(storage.get_by_code(&code).await.unwrap().is_none());
}

#[tokio::test]
async fn test_design_upload_requires_a_store() {
    let storage = create_test_storage().await;
    let app = app(storage, None);

    let response = app
        .clone()
        .oneshot(post_json("/assets", r#"{"payload": "https://example.com"}"#))
        .await
        .unwrap();
    let created = body_json(response).await;
    let code = created["code"].as_str().unwrap().to_string();

    let response = app
        .oneshot(post_json(
            &format!("/assets/{}/uploads", code),
            r#"{"data": "aGk=", "name": "design.pdf"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_design_upload_registers_against_the_asset() {
    let storage = create_test_storage().await;
    let store = TestStore::new(false);
    let app = app(storage, Some(store.clone()));

    let response = app
        .clone()
        .oneshot(post_json("/assets", r#"{"payload": "https://example.com"}"#))
        .await
        .unwrap();
    let created = body_json(response).await;
    let code = created["code"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/assets/{}/uploads", code),
            r#"{"data": "aGk=", "name": "hero.png", "kind": "cover"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let upload = body_json(response).await;
    assert_eq!(upload["file_id"], "file-2");
    assert_eq!(upload["kind"], "cover");
    assert_eq!(upload["name"], "hero.png");
    assert!(upload["url"]
        .as_str()
        .unwrap()
        .starts_with("https://media.test/hosted/"));

    // The upload is attached to the asset
    let response = app
        .clone()
        .oneshot(get(&format!("/assets/{}", code)))
        .await
        .unwrap();
    let fetched = body_json(response).await;
    let uploads = fetched["template_data"]["uploads"].as_array().unwrap();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0]["file_id"], "file-2");

    // Teardown removes the QR image and the design file
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/assets/{}", code))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(
        json["deleted_external"],
        serde_json::json!(["file-1", "file-2"])
    );
}

#[tokio::test]
async fn test_design_upload_rejects_bad_base64() {
    let storage = create_test_storage().await;
    let store = TestStore::new(false);
    let app = app(storage, Some(store));

    let response = app
        .clone()
        .oneshot(post_json("/assets", r#"{"payload": "https://example.com"}"#))
        .await
        .unwrap();
    let created = body_json(response).await;
    let code = created["code"].as_str().unwrap().to_string();

    let response = app
        .oneshot(post_json(
            &format!("/assets/{}/uploads", code),
            r#"{"data": "!!!", "name": "broken.bin"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_scopes_by_owner() {
    let storage = create_test_storage().await;
    let app = app(storage, None);

    for (payload, owner) in [
        ("https://example.com/1", "alice"),
        ("https://example.com/2", "alice"),
        ("https://example.com/3", "bob"),
    ] {
        let response = app
            .clone()
            .oneshot(post_json(
                "/assets",
                &format!(r#"{{"payload": "{}", "owner": "{}"}}"#, payload, owner),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app.clone().oneshot(get("/assets")).await.unwrap();
    let all = body_json(response).await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let response = app
        .clone()
        .oneshot(get("/assets?owner=alice"))
        .await
        .unwrap();
    let alice = body_json(response).await;
    assert_eq!(alice.as_array().unwrap().len(), 2);
    for asset in alice.as_array().unwrap() {
        assert_eq!(asset["owner"], "alice");
    }

    let response = app.oneshot(get("/assets?limit=1")).await.unwrap();
    let limited = body_json(response).await;
    assert_eq!(limited.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_creations_all_succeed() {
    let storage = create_test_storage().await;
    let app = app(storage, None);

    let mut handles = vec![];
    for i in 0..10 {
        let app_clone = app.clone();
        let handle = tokio::spawn(async move {
            let request = post_json(
                "/assets",
                &format!(r#"{{"payload": "https://example.com/{}"}}"#, i),
            );
            app_clone.oneshot(request).await.unwrap()
        });
        handles.push(handle);
    }

    let mut success_count = 0;
    for handle in handles {
        let response = handle.await.unwrap();
        if response.status() == StatusCode::CREATED {
            success_count += 1;
        }
    }
    assert_eq!(success_count, 10, "All 10 creations should succeed");
}

#[tokio::test]
async fn test_api_requires_a_valid_key_when_enabled() {
    let storage = create_test_storage().await;
    let auth = Arc::new(AuthService::new(true, vec!["secret".to_string()]));
    let app = create_api_router(storage, None, auth);

    // No key
    let response = app
        .clone()
        .oneshot(post_json("/assets", r#"{"payload": "https://example.com"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Wrong key
    let mut request = post_json("/assets", r#"{"payload": "https://example.com"}"#);
    request
        .headers_mut()
        .insert("X-API-Key", "wrong".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Header key
    let mut request = post_json("/assets", r#"{"payload": "https://example.com"}"#);
    request
        .headers_mut()
        .insert("X-API-Key", "secret".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Bearer token
    let mut request = post_json("/assets", r#"{"payload": "https://example.com"}"#);
    request
        .headers_mut()
        .insert("Authorization", "Bearer secret".parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    // Health stays open
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_get_missing_asset_returns_404() {
    let storage = create_test_storage().await;
    let app = app(storage, None);

    let response = app.oneshot(get("/assets/absent99")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["error"], "QR asset not found");
}
