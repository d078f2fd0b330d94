//! Request handlers of the registry protocol.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use monoreg_core::normalize_ref;

use crate::error::ApiError;
use crate::protocol::{
    accepts_gzip, attachment_disposition, download_location, ArchiveQuery, DiscoveryDocument,
    ModuleVersionsResponse, TERRAFORM_GET,
};
use crate::router::AppState;

/// `GET /.well-known/terraform.json`
pub async fn discovery(State(state): State<AppState>) -> Json<DiscoveryDocument> {
    Json(DiscoveryDocument {
        modules_v1: state.base_path().to_string(),
    })
}

/// `GET /api/modules/v1/modules/:name/coder/versions`
///
/// Every module is published at every tag, so the listing does not depend on
/// the module name.
pub async fn list_versions(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ModuleVersionsResponse>, ApiError> {
    let versions = state
        .source()
        .versions()
        .await
        .map_err(ApiError::Internal)?;
    tracing::debug!(module = %name, versions = versions.len(), "Listed versions");
    Ok(Json(ModuleVersionsResponse::from_versions(versions)))
}

/// `GET /api/modules/v1/modules/:name/coder/:version/download`
pub async fn download(
    Path((name, version)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let location = header_value(download_location(&name, &version))?;
    Ok((
        StatusCode::NO_CONTENT,
        [(HeaderName::from_static(TERRAFORM_GET), location)],
    ))
}

/// `GET /api/modules/:name?archive=tar.gz&ref=<version>`
pub async fn fetch_archive(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ArchiveQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let version = normalize_ref(query.reference.as_deref());

    if !accepts_gzip(&headers) {
        tracing::debug!(module = %name, version = %version, "Client does not accept gzip");
        return Err(ApiError::ClientEncodingUnsupported);
    }

    let bytes = state.source().archive(&name, &version).await?;
    tracing::info!(
        module = %name,
        version = %version,
        size = bytes.len(),
        strategy = state.source().strategy(),
        "Serving archive"
    );

    let disposition = header_value(attachment_disposition(&name))?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/gzip")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

fn header_value(value: String) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&value).map_err(|_| ApiError::InvalidReference { value })
}
