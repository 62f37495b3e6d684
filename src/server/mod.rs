//! server
//!
//! HTTP surface of the registry.
//!
//! # Architecture
//!
//! [`router`] maps the protocol's path shapes onto handlers; [`transport`]
//! binds the configured listeners and serves the router on each of them.
//! The only shared state is [`RegistryState`]: the hostname and the
//! read-only module map, both fixed at startup.
//!
//! | Path | Operation |
//! |---|---|
//! | `/.well-known/terraform.json` | service discovery |
//! | `/{namespace}/{name}` | list providers |
//! | `/{namespace}/{name}/{provider}` | latest version |
//! | `/{namespace}/{name}/{provider}/versions` | list versions |
//! | `/{namespace}/{name}/{provider}/{version}` | exact version |
//! | `/{namespace}/{name}/{provider}/{version}/download` | download location |
//! | `/{namespace}/{name}/{provider}/{version}/download/{tree_id}` | archive |
//!
//! # Example
//!
//! ```
//! use modreg::core::config::Hostname;
//! use modreg::core::modules::ModuleMap;
//! use modreg::server::{router, RegistryState};
//!
//! let state = RegistryState::new(
//!     Hostname::parse("registry.example.com").unwrap(),
//!     ModuleMap::new(),
//! );
//! let app = router(state);
//! # drop(app);
//! ```

pub mod error;
mod handlers;
pub mod responses;
mod stream;
pub mod transport;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::core::config::Hostname;
use crate::core::modules::ModuleCoordinateMap;

pub use error::RegistryError;
pub use handlers::{ARCHIVE_CONTENT_TYPE, TERRAFORM_GET};
pub use transport::{serve, ServeError};

/// State shared by every request.
#[derive(Clone)]
pub struct RegistryState {
    /// Hostname shown in module source addresses.
    pub hostname: Hostname,
    /// Configured modules.
    pub modules: Arc<dyn ModuleCoordinateMap>,
}

impl RegistryState {
    pub fn new(hostname: Hostname, modules: impl ModuleCoordinateMap + 'static) -> Self {
        Self {
            hostname,
            modules: Arc::new(modules),
        }
    }
}

impl std::fmt::Debug for RegistryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryState")
            .field("hostname", &self.hostname)
            .finish_non_exhaustive()
    }
}

/// Build the protocol router.
pub fn router(state: RegistryState) -> Router {
    Router::new()
        .route("/.well-known/terraform.json", get(handlers::discovery))
        .route("/{namespace}/{name}", get(handlers::list_providers))
        .route("/{namespace}/{name}/{provider}", get(handlers::get_latest))
        .route(
            "/{namespace}/{name}/{provider}/versions",
            get(handlers::list_versions),
        )
        .route(
            "/{namespace}/{name}/{provider}/{version}",
            get(handlers::get_version),
        )
        .route(
            "/{namespace}/{name}/{provider}/{version}/download",
            get(handlers::download_location),
        )
        .route(
            "/{namespace}/{name}/{provider}/{version}/download/{tree_id}",
            get(handlers::download_archive),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::modules::{ModuleLocation, ModuleMap};
    use crate::core::types::ModuleCoordinate;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app(modules: ModuleMap) -> Router {
        router(RegistryState::new(
            Hostname::parse("registry.example.com").unwrap(),
            modules,
        ))
    }

    async fn get_status(app: Router, uri: &str) -> StatusCode {
        app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn discovery_document() {
        let response = app(ModuleMap::new())
            .oneshot(
                Request::get("/.well-known/terraform.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, serde_json::json!({"modules.v1": "/"}));
    }

    #[tokio::test]
    async fn unconfigured_coordinates_are_not_found() {
        for uri in [
            "/acme/widget",
            "/acme/widget/aws",
            "/acme/widget/aws/versions",
            "/acme/widget/aws/1.0.0",
            "/acme/widget/aws/1.0.0/download",
            "/acme/widget/aws/1.0.0/download/abc.tgz",
        ] {
            assert_eq!(
                get_status(app(ModuleMap::new()), uri).await,
                StatusCode::NOT_FOUND,
                "{uri}"
            );
        }
    }

    #[tokio::test]
    async fn unreadable_store_is_internal_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut modules = ModuleMap::new();
        modules
            .insert(
                &ModuleCoordinate::new("acme", "widget", "aws").unwrap(),
                ModuleLocation {
                    git_dir: dir.path().join("missing.git"),
                    origin: "test.toml: module[0]".into(),
                },
            )
            .unwrap();

        let response = app(modules)
            .oneshot(Request::get("/acme/widget/aws").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn unreadable_provider_left_out_of_listing() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut modules = ModuleMap::new();
        modules
            .insert(
                &ModuleCoordinate::new("acme", "widget", "aws").unwrap(),
                ModuleLocation {
                    git_dir: dir.path().join("missing.git"),
                    origin: "test.toml: module[0]".into(),
                },
            )
            .unwrap();

        let response = app(modules)
            .oneshot(Request::get("/acme/widget").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, serde_json::json!({"modules": []}));
    }
}
