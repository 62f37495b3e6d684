//! server::responses
//!
//! Response bodies of the module registry protocol.
//!
//! Field names are part of the protocol and must not change. Bodies are
//! rendered as pretty-printed JSON with two-space indentation.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::core::types::ModuleCoordinate;
use crate::core::version::Version;

/// One module version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSummary {
    /// `namespace/name/provider/version`
    pub id: String,
    pub namespace: String,
    pub name: String,
    pub provider: String,
    pub version: String,
}

impl ModuleSummary {
    pub fn new(coordinate: &ModuleCoordinate, version: &Version) -> Self {
        Self {
            id: coordinate.module_id(version),
            namespace: coordinate.namespace().to_string(),
            name: coordinate.name().to_string(),
            provider: coordinate.provider().to_string(),
            version: version.to_string(),
        }
    }
}

/// Pagination block of a module list. Never filled in by this server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub limit: String,
    pub current_offset: String,
    pub next_offset: String,
    pub prev_offset: String,
}

/// Body of list-providers-for-module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleList {
    pub modules: Vec<ModuleSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

/// Body of list-versions-for-provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionList {
    pub modules: Vec<ProviderVersions>,
}

/// All versions of one module, under its source address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderVersions {
    /// `hostname/namespace/name/provider`
    pub source: String,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub version: String,
}

impl VersionList {
    /// The single-module list for `coordinate`, as served by `hostname`.
    pub fn new(hostname: &str, coordinate: &ModuleCoordinate, versions: &[Version]) -> Self {
        Self {
            modules: vec![ProviderVersions {
                source: format!("{hostname}/{coordinate}"),
                versions: versions
                    .iter()
                    .map(|v| VersionEntry {
                        version: v.to_string(),
                    })
                    .collect(),
            }],
        }
    }
}

/// JSON rendered with two-space indentation.
#[derive(Debug, Clone)]
pub struct PrettyJson<T>(pub T);

impl<T: Serialize> IntoResponse for PrettyJson<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec_pretty(&self.0) {
            Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
            Err(err) => {
                error!(error = %err, "failed to encode response body");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
