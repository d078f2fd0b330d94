//! Wire types and header rules of the module registry protocol.

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};

/// Name of the response header that tells the client where to fetch an archive.
pub const TERRAFORM_GET: &str = "x-terraform-get";

/// Archive format named in download locations.
pub const ARCHIVE_FORMAT: &str = "tar.gz";

/// Body of `/.well-known/terraform.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    /// Base path of the module registry API.
    #[serde(rename = "modules.v1")]
    pub modules_v1: String,
}

/// Body of the versions listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleVersionsResponse {
    /// Always a single element.
    pub modules: Vec<ModuleVersions>,
}

/// Versions of one module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleVersions {
    /// Available versions.
    pub versions: Vec<VersionEntry>,
}

/// One available version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    /// Tag name.
    pub version: String,
}

impl ModuleVersionsResponse {
    /// Builds the listing from tag names.
    #[must_use]
    pub fn from_versions(versions: impl IntoIterator<Item = String>) -> Self {
        Self {
            modules: vec![ModuleVersions {
                versions: versions
                    .into_iter()
                    .map(|version| VersionEntry { version })
                    .collect(),
            }],
        }
    }
}

/// Query string of the archive endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveQuery {
    /// Requested archive format. Only `tar.gz` is produced.
    pub archive: Option<String>,

    /// Requested version, normalized before lookup.
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

/// Returns the archive location handed out by the download endpoint.
#[must_use]
pub fn download_location(module: &str, version: &str) -> String {
    format!("/api/modules/{module}?archive={ARCHIVE_FORMAT}&ref={version}")
}

/// Returns the `Content-Disposition` value for a module archive.
#[must_use]
pub fn attachment_disposition(module: &str) -> String {
    format!("attachment; filename={module}.{ARCHIVE_FORMAT}")
}

/// Returns true if the request's `Accept-Encoding` allows gzip.
///
/// An explicit `gzip` or `x-gzip` coding decides on its own. Otherwise a `*`
/// coding is honoured. A coding with `q=0` is refused.
///
/// # Examples
///
/// ```
/// use axum::http::{header, HeaderMap, HeaderValue};
/// use monoreg_server::protocol::accepts_gzip;
///
/// let mut headers = HeaderMap::new();
/// headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("br, gzip;q=0.5"));
/// assert!(accepts_gzip(&headers));
///
/// headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip;q=0, *"));
/// assert!(!accepts_gzip(&headers));
/// ```
#[must_use]
pub fn accepts_gzip(headers: &HeaderMap) -> bool {
    let mut gzip = None;
    let mut wildcard = None;

    let codings = headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','));

    for item in codings {
        let mut parts = item.split(';');
        let coding = parts.next().unwrap_or_default().trim();
        let accepted = parts.all(|param| quality_allows(param.trim()));

        if coding.eq_ignore_ascii_case("gzip") || coding.eq_ignore_ascii_case("x-gzip") {
            gzip = Some(gzip.unwrap_or(false) || accepted);
        } else if coding == "*" {
            wildcard = Some(wildcard.unwrap_or(false) || accepted);
        }
    }

    gzip.or(wildcard).unwrap_or(false)
}

/// Returns false only for a `q` parameter whose value is zero.
fn quality_allows(param: &str) -> bool {
    let Some((name, value)) = param.split_once('=') else {
        return true;
    };
    if !name.trim().eq_ignore_ascii_case("q") {
        return true;
    }
    value.trim().parse::<f32>().map_or(true, |q| q > 0.0)
}
