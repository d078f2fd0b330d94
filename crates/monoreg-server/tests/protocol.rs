//! End-to-end tests of the registry protocol against fixture repositories.

use std::io::Read;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use flate2::read::GzDecoder;
use monoreg_core::fixtures::FixtureRepo;
use monoreg_core::{empty_archive, VersionStore};
use monoreg_registry::{
    ArchiveSource, BuildConfig, BuildPass, CacheConfig, OnDemandSource, PrecomputedSource,
};
use monoreg_server::{build_router, serve_with_shutdown, AppState, ServerConfig, ServerError};
use tower::ServiceExt;

fn monorepo() -> FixtureRepo {
    let repo = FixtureRepo::new();
    repo.commit(&[
        ("docker/main.tf", "resource \"docker_container\" \"x\" {}"),
        ("docker/README.md", "# docker"),
        (".github/workflows/ci.yml", "on: push"),
        ("README.md", "monorepo"),
    ]);
    repo.tag_lightweight("v1.0.0");
    repo.commit(&[("aws/main.tf", "provider \"aws\" {}")]);
    repo.tag_annotated("v1.1.0", "release 1.1.0");
    repo
}

fn on_demand(repo: &FixtureRepo) -> Router {
    let store = Arc::new(VersionStore::open(repo.path()).unwrap());
    build_router(AppState::new(Arc::new(OnDemandSource::new(store))))
}

async fn get(app: Router, uri: &str, accept_encoding: Option<&str>) -> Response {
    let mut request = Request::builder().method(Method::GET).uri(uri);
    if let Some(value) = accept_encoding {
        request = request.header(header::ACCEPT_ENCODING, value);
    }
    app.oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn entry_names(archive: &[u8]) -> Vec<String> {
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    tar.entries()
        .unwrap()
        .map(|entry| {
            let entry = entry.unwrap();
            entry.path().unwrap().to_string_lossy().into_owned()
        })
        .collect()
}

#[tokio::test]
async fn test_discovery_document() {
    let repo = monorepo();
    let response = get(on_demand(&repo), "/.well-known/terraform.json", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json"
    );
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"modules.v1": "/api/modules/v1"})
    );
}

#[tokio::test]
async fn test_discovery_advertises_configured_base() {
    let repo = monorepo();
    let store = Arc::new(VersionStore::open(repo.path()).unwrap());
    let state = AppState::new(Arc::new(OnDemandSource::new(store)))
        .with_base_path("registry/v1/")
        .unwrap();
    let app = build_router(state);

    let response = get(app.clone(), "/.well-known/terraform.json", None).await;
    assert_eq!(
        body_json(response).await,
        serde_json::json!({"modules.v1": "/registry/v1"})
    );

    let response = get(app, "/registry/v1/modules/docker/coder/versions", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_versions_listing_ignores_module_name() {
    let repo = monorepo();
    let expected = serde_json::json!({
        "modules": [{"versions": [{"version": "v1.0.0"}, {"version": "v1.1.0"}]}]
    });

    for name in ["docker", "does-not-exist"] {
        let uri = format!("/api/modules/v1/modules/{name}/coder/versions");
        let response = get(on_demand(&repo), &uri, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, expected);
    }
}

#[tokio::test]
async fn test_download_points_at_archive() {
    let repo = monorepo();
    let response = get(
        on_demand(&repo),
        "/api/modules/v1/modules/docker/coder/v1.0.0/download",
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()["x-terraform-get"],
        "/api/modules/docker?archive=tar.gz&ref=v1.0.0"
    );
    assert!(body_bytes(response).await.is_empty());
}

#[tokio::test]
async fn test_archive_of_docker_module() {
    let repo = monorepo();
    let response = get(
        on_demand(&repo),
        "/api/modules/docker?archive=tar.gz&ref=v1.0.0",
        Some("gzip"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/gzip");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=docker.tar.gz"
    );

    let archive = body_bytes(response).await;
    assert_eq!(entry_names(&archive), vec!["README.md", "main.tf"]);

    let mut tar = tar::Archive::new(GzDecoder::new(archive.as_slice()));
    let mut main = tar
        .entries()
        .unwrap()
        .map(Result::unwrap)
        .find(|entry| entry.path().unwrap().to_str() == Some("main.tf"))
        .unwrap();
    let mut content = String::new();
    main.read_to_string(&mut content).unwrap();
    assert_eq!(content, "resource \"docker_container\" \"x\" {}");
}

#[tokio::test]
async fn test_ref_without_prefix_is_normalized() {
    let repo = monorepo();
    let response = get(
        on_demand(&repo),
        "/api/modules/aws?archive=tar.gz&ref=1.1.0",
        Some("gzip, deflate"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(entry_names(&body_bytes(response).await), vec!["main.tf"]);
}

#[tokio::test]
async fn test_module_absent_at_tag_is_empty_archive() {
    let repo = monorepo();
    let response = get(
        on_demand(&repo),
        "/api/modules/aws?archive=tar.gz&ref=v1.0.0",
        Some("gzip"),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let archive = body_bytes(response).await;
    assert_eq!(archive, empty_archive().unwrap());
    assert!(entry_names(&archive).is_empty());
}

#[tokio::test]
async fn test_unknown_tag_is_not_found() {
    let repo = monorepo();
    let response = get(
        on_demand(&repo),
        "/api/modules/docker?archive=tar.gz&ref=v9.9.9",
        Some("gzip"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_ref_without_main_tag_is_not_found() {
    let repo = monorepo();
    let response = get(on_demand(&repo), "/api/modules/docker", Some("gzip")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_ref_serves_main_tag() {
    let repo = monorepo();
    repo.tag_lightweight("main");
    let response = get(on_demand(&repo), "/api/modules/aws", Some("gzip")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(entry_names(&body_bytes(response).await), vec!["main.tf"]);
}

#[tokio::test]
async fn test_gzip_required() {
    let repo = monorepo();
    for accept in [None, Some("identity"), Some("gzip;q=0")] {
        let response = get(
            on_demand(&repo),
            "/api/modules/docker?archive=tar.gz&ref=v1.0.0",
            accept,
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{accept:?}");
    }
}

#[tokio::test]
async fn test_gzip_checked_before_tag_lookup() {
    let repo = monorepo();
    let response = get(
        on_demand(&repo),
        "/api/modules/docker?archive=tar.gz&ref=v9.9.9",
        None,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unrouted_requests() {
    let repo = monorepo();

    let response = get(on_demand(&repo), "/api/other", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/.well-known/terraform.json")
        .body(Body::empty())
        .unwrap();
    let response = on_demand(&repo).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_precomputed_serves_identical_bytes() {
    let repo = monorepo();
    let out = tempfile::tempdir().unwrap();
    let assets = out.path().join("assets");
    let store = Arc::new(VersionStore::open(repo.path()).unwrap());
    BuildPass::new(Arc::clone(&store), BuildConfig::new(&assets))
        .run()
        .await
        .unwrap();

    let precomputed: Arc<dyn ArchiveSource> =
        Arc::new(PrecomputedSource::open(CacheConfig::new(&assets)).unwrap());
    let cached_app = build_router(AppState::new(precomputed));
    let live_app = build_router(AppState::new(Arc::new(OnDemandSource::new(store))));

    for uri in [
        "/api/modules/docker?archive=tar.gz&ref=v1.0.0",
        "/api/modules/docker?archive=tar.gz&ref=v1.1.0",
        "/api/modules/aws?archive=tar.gz&ref=v1.0.0",
        "/api/modules/aws?archive=tar.gz&ref=v1.1.0",
    ] {
        let cached = get(cached_app.clone(), uri, Some("gzip")).await;
        let live = get(live_app.clone(), uri, Some("gzip")).await;
        assert_eq!(cached.status(), StatusCode::OK);
        assert_eq!(body_bytes(cached).await, body_bytes(live).await, "{uri}");
    }

    let response = get(
        cached_app.clone(),
        "/api/modules/docker?archive=tar.gz&ref=v2.0.0",
        Some("gzip"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = get(cached_app, "/api/modules/v1/modules/x/coder/versions", None).await;
    assert_eq!(
        body_json(response).await,
        serde_json::json!({
            "modules": [{"versions": [{"version": "v1.0.0"}, {"version": "v1.1.0"}]}]
        })
    );
}

#[tokio::test]
async fn test_tampered_cache_is_server_error() {
    let repo = monorepo();
    let out = tempfile::tempdir().unwrap();
    let assets = out.path().join("assets");
    let store = Arc::new(VersionStore::open(repo.path()).unwrap());
    BuildPass::new(store, BuildConfig::new(&assets))
        .run()
        .await
        .unwrap();

    std::fs::write(assets.join("v1.0.0").join("docker.tar.gz"), b"tampered").unwrap();

    let source = Arc::new(PrecomputedSource::open(CacheConfig::new(&assets)).unwrap());
    let response = get(
        build_router(AppState::new(source)),
        "/api/modules/docker?archive=tar.gz&ref=v1.0.0",
        Some("gzip"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_route_syntax_in_base_path_is_rejected() {
    let repo = monorepo();
    let store = Arc::new(VersionStore::open(repo.path()).unwrap());
    let err = AppState::new(Arc::new(OnDemandSource::new(store)))
        .with_base_path("/registry/:v1")
        .unwrap_err();
    assert!(matches!(err, ServerError::InvalidBasePath { .. }));
}

#[tokio::test]
async fn test_serve_rejects_invalid_base_path() {
    let repo = monorepo();
    let store = Arc::new(VersionStore::open(repo.path()).unwrap());
    let config = ServerConfig::new("127.0.0.1:0".parse().unwrap()).with_base_path("registry/*all");

    let err = serve_with_shutdown(
        config,
        Arc::new(OnDemandSource::new(store)),
        std::future::ready(()),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServerError::InvalidBasePath { ref base_path, .. } if base_path == "/registry/*all"));
}
