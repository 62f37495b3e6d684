//! server::handlers
//!
//! One handler per protocol operation.
//!
//! # Architecture
//!
//! Handlers resolve the coordinate against configuration on the async side,
//! then move all store work onto a blocking thread: the store is opened,
//! queried and dropped within that one task. Nothing outlives the request.
//!
//! Outcomes fold into [`RegistryError`]:
//! - unconfigured coordinates, unparsable versions, missing tags and
//!   mismatched tree ids are `NotFound`
//! - anything the store fails to do is logged with the module's location
//!   and declaration origin, then reported as `Internal`

use std::io::{BufWriter, Write};

use axum::extract::{Path, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use super::error::RegistryError;
use super::responses::{ModuleList, ModuleSummary, PrettyJson, VersionList};
use super::stream::{channel_body, ChannelWriter, CHUNK_SIZE};
use super::RegistryState;
use crate::core::modules::ModuleLocation;
use crate::core::types::{ModuleCoordinate, TreeId};
use crate::core::version::Version;
use crate::git::{GitStore, ObjectStore, StoreError};
use crate::registry::{ArchiveBuilder, VersionCatalog};

/// Header carrying the download location.
pub const TERRAFORM_GET: HeaderName = HeaderName::from_static("x-terraform-get");

/// Content type of a module archive.
///
/// Downloaders recognise the archive by this type together with the URL
/// suffix; a tar type with a gzip content encoding is not accepted.
pub const ARCHIVE_CONTENT_TYPE: &str = "application/x-gzip";

/// Suffix appended to the tree id in download locations.
pub const ARCHIVE_SUFFIX: &str = ".tgz";

/// Suffixes stripped from a supplied tree id.
const RECOGNISED_SUFFIXES: [&str; 2] = [".tar.gz", ".tgz"];

/// A configured module, as seen by one request.
#[derive(Debug, Clone)]
pub(crate) struct ModuleContext {
    pub coordinate: ModuleCoordinate,
    pub location: ModuleLocation,
}

impl ModuleContext {
    /// Resolve a coordinate against configuration.
    fn locate(
        state: &RegistryState,
        namespace: &str,
        name: &str,
        provider: &str,
    ) -> Result<Self, RegistryError> {
        let location = state
            .modules
            .lookup(namespace, name, provider)
            .ok_or(RegistryError::NotFound)?;
        let coordinate =
            ModuleCoordinate::new(namespace, name, provider).map_err(|_| RegistryError::NotFound)?;
        Ok(Self {
            coordinate,
            location: location.clone(),
        })
    }

    fn open(&self) -> Result<GitStore, RegistryError> {
        GitStore::open(&self.location.git_dir).map_err(|err| self.store_failure(&err))
    }

    /// Log a store failure with everything needed to find it, and return
    /// the detail-free client outcome.
    pub(crate) fn store_failure(&self, err: &StoreError) -> RegistryError {
        error!(
            module = %self.coordinate,
            git_dir = %self.location.git_dir.display(),
            origin = %self.location.origin,
            error = %err,
            "module store failure"
        );
        RegistryError::Internal
    }

    /// Latest version summary, or `None` if the module has no versions.
    fn latest<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<Option<ModuleSummary>, RegistryError> {
        let latest = VersionCatalog::new(store)
            .latest_version()
            .map_err(|err| self.store_failure(&err))?;
        Ok(latest.map(|version| ModuleSummary::new(&self.coordinate, &version)))
    }

    /// Existence check followed by tree resolution.
    fn tree_for<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
        version: &Version,
    ) -> Result<TreeId, RegistryError> {
        let catalog = VersionCatalog::new(store);
        if !catalog
            .has_version(version)
            .map_err(|err| self.store_failure(&err))?
        {
            return Err(RegistryError::NotFound);
        }
        catalog.resolve_tree_id(version).map_err(|err| {
            if err.is_not_found() {
                debug!(module = %self.coordinate, %version, "version has no canonical tag");
                RegistryError::NotFound
            } else {
                self.store_failure(&err)
            }
        })
    }
}

/// Parse a version path segment; malformed is indistinguishable from missing.
fn parse_version(raw: &str) -> Result<Version, RegistryError> {
    Version::parse(raw).map_err(|_| RegistryError::NotFound)
}

/// Drop a recognised archive suffix from a supplied tree id.
fn strip_archive_suffix(supplied: &str) -> &str {
    RECOGNISED_SUFFIXES
        .iter()
        .find_map(|suffix| supplied.strip_suffix(suffix))
        .unwrap_or(supplied)
}

/// Run store work on a blocking thread.
async fn blocking<T, F>(work: F) -> Result<T, RegistryError>
where
    F: FnOnce() -> Result<T, RegistryError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.unwrap_or_else(|err| {
        error!(error = %err, "request worker failed");
        Err(RegistryError::Internal)
    })
}

/// `GET /.well-known/terraform.json`
pub async fn discovery() -> impl IntoResponse {
    PrettyJson(serde_json::json!({ "modules.v1": "/" }))
}

/// `GET /{namespace}/{name}`: latest version of every provider.
///
/// Providers that cannot be read or have no versions are left out.
pub async fn list_providers(
    State(state): State<RegistryState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Response, RegistryError> {
    let modules: Vec<ModuleContext> = state
        .modules
        .providers(&namespace, &name)
        .ok_or(RegistryError::NotFound)?
        .into_iter()
        .filter_map(|(provider, location)| {
            let coordinate = ModuleCoordinate::new(&namespace, &name, provider).ok()?;
            Some(ModuleContext {
                coordinate,
                location: location.clone(),
            })
        })
        .collect();

    let summaries = blocking(move || {
        Ok(modules
            .iter()
            .filter_map(|module| {
                let store = module.open().ok()?;
                module.latest(&store).ok().flatten()
            })
            .collect::<Vec<_>>())
    })
    .await?;

    Ok(PrettyJson(ModuleList {
        modules: summaries,
        meta: None,
    })
    .into_response())
}

/// `GET /{namespace}/{name}/{provider}`: latest version.
pub async fn get_latest(
    State(state): State<RegistryState>,
    Path((namespace, name, provider)): Path<(String, String, String)>,
) -> Result<Response, RegistryError> {
    let module = ModuleContext::locate(&state, &namespace, &name, &provider)?;
    let summary = blocking(move || {
        let store = module.open()?;
        module.latest(&store)?.ok_or(RegistryError::NotFound)
    })
    .await?;
    Ok(PrettyJson(summary).into_response())
}

/// `GET /{namespace}/{name}/{provider}/versions`: all versions, latest first.
pub async fn list_versions(
    State(state): State<RegistryState>,
    Path((namespace, name, provider)): Path<(String, String, String)>,
) -> Result<Response, RegistryError> {
    let module = ModuleContext::locate(&state, &namespace, &name, &provider)?;
    let hostname = state.hostname.clone();
    let body = blocking(move || {
        let store = module.open()?;
        let versions = VersionCatalog::new(&store)
            .list_versions()
            .map_err(|err| module.store_failure(&err))?;
        Ok(VersionList::new(
            hostname.for_display(),
            &module.coordinate,
            &versions,
        ))
    })
    .await?;
    Ok(PrettyJson(body).into_response())
}

/// `GET /{namespace}/{name}/{provider}/{version}`: one version's summary.
pub async fn get_version(
    State(state): State<RegistryState>,
    Path((namespace, name, provider, version)): Path<(String, String, String, String)>,
) -> Result<Response, RegistryError> {
    let module = ModuleContext::locate(&state, &namespace, &name, &provider)?;
    let version = parse_version(&version)?;
    let summary = blocking(move || {
        let store = module.open()?;
        let exists = VersionCatalog::new(&store)
            .has_version(&version)
            .map_err(|err| module.store_failure(&err))?;
        if !exists {
            return Err(RegistryError::NotFound);
        }
        Ok(ModuleSummary::new(&module.coordinate, &version))
    })
    .await?;
    Ok(PrettyJson(summary).into_response())
}

/// `GET /{namespace}/{name}/{provider}/{version}/download`
///
/// Answers with an empty body and the archive location in
/// `X-Terraform-Get`, relative to the request path.
pub async fn download_location(
    State(state): State<RegistryState>,
    Path((namespace, name, provider, version)): Path<(String, String, String, String)>,
) -> Result<Response, RegistryError> {
    let module = ModuleContext::locate(&state, &namespace, &name, &provider)?;
    let version = parse_version(&version)?;
    let tree = blocking(move || {
        let store = module.open()?;
        module.tree_for(&store, &version)
    })
    .await?;

    Ok((
        StatusCode::NO_CONTENT,
        [
            (header::CONTENT_TYPE, "text/plain".to_string()),
            (TERRAFORM_GET, format!("./download/{tree}{ARCHIVE_SUFFIX}")),
        ],
    )
        .into_response())
}

/// `GET /{namespace}/{name}/{provider}/{version}/download/{tree_id}`
///
/// Streams the gzip-compressed archive, but only if `tree_id` is the
/// version's current tree. Any other id, including one that belongs to a
/// different version of the same module, is `NotFound`.
pub async fn download_archive(
    State(state): State<RegistryState>,
    Path((namespace, name, provider, version, tree_id)): Path<(
        String,
        String,
        String,
        String,
        String,
    )>,
) -> Result<Response, RegistryError> {
    let module = ModuleContext::locate(&state, &namespace, &name, &provider)?;
    let version = parse_version(&version)?;
    let supplied = strip_archive_suffix(&tree_id).to_string();
    let file_name = module.coordinate.archive_file_name(&version);

    let (writer, body) = channel_body();
    let (ready_tx, ready_rx) = oneshot::channel();

    tokio::task::spawn_blocking(move || {
        let checked = module.open().and_then(|store| {
            let tree = module.tree_for(&store, &version)?;
            if !tree.matches(&supplied) {
                debug!(module = %module.coordinate, %version, supplied = %supplied, "stale or wrong tree id");
                return Err(RegistryError::NotFound);
            }
            Ok(store)
        });

        match checked {
            Ok(store) => {
                // A closed receiver means the request is already gone.
                if ready_tx.send(Ok(())).is_ok() {
                    stream_archive(&module, &store, &version, writer);
                }
            }
            Err(outcome) => {
                let _ = ready_tx.send(Err(outcome));
            }
        }
    });

    match ready_rx.await {
        Ok(Ok(())) => Ok((
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, ARCHIVE_CONTENT_TYPE.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename={file_name}"),
                ),
            ],
            body,
        )
            .into_response()),
        Ok(Err(outcome)) => Err(outcome),
        Err(_) => {
            error!("archive worker exited before answering");
            Err(RegistryError::Internal)
        }
    }
}

/// Write the compressed archive into the response body.
///
/// Runs after the status line is committed, so a failure can only be
/// reported by ending the body with an error. It is logged exactly once.
fn stream_archive<S: ObjectStore + ?Sized>(
    module: &ModuleContext,
    store: &S,
    version: &Version,
    writer: ChannelWriter,
) {
    let aborter = writer.clone();
    let mut out = BufWriter::with_capacity(CHUNK_SIZE, writer);

    let result = ArchiveBuilder::new(store)
        .write_version_tgz(version, &mut out)
        .and_then(|out| out.flush().map_err(StoreError::Write));

    if let Err(err) = result {
        match &err {
            StoreError::Write(_) => warn!(
                module = %module.coordinate,
                %version,
                error = %err,
                "archive stream aborted"
            ),
            _ => {
                module.store_failure(&err);
            }
        }
        drop(out);
        aborter.abort("archive incomplete");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::memory::{FailOn, MemoryStore};
    use std::path::PathBuf;

    fn context() -> ModuleContext {
        ModuleContext {
            coordinate: ModuleCoordinate::new("acme", "widget", "aws").unwrap(),
            location: ModuleLocation {
                git_dir: PathBuf::from("/srv/git/widget.git"),
                origin: "registry.toml: module[0]".into(),
            },
        }
    }

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    mod suffixes {
        use super::*;

        #[test]
        fn recognised_suffixes_stripped() {
            assert_eq!(strip_archive_suffix("abc.tgz"), "abc");
            assert_eq!(strip_archive_suffix("abc.tar.gz"), "abc");
            assert_eq!(strip_archive_suffix("abc"), "abc");
            assert_eq!(strip_archive_suffix("abc.zip"), "abc.zip");
        }

        #[test]
        fn only_one_suffix_stripped() {
            assert_eq!(strip_archive_suffix("abc.tgz.tgz"), "abc.tgz");
        }
    }

    mod versions {
        use super::*;

        #[test]
        fn malformed_is_not_found() {
            assert_eq!(parse_version("latest"), Err(RegistryError::NotFound));
            assert_eq!(parse_version(""), Err(RegistryError::NotFound));
        }

        #[test]
        fn well_formed_parses() {
            assert_eq!(parse_version("1.2").unwrap().to_string(), "1.2.0");
        }
    }

    mod latest {
        use super::*;

        #[test]
        fn summary_of_latest() {
            let mut store = MemoryStore::new();
            let tree = store.add_tree(vec![]);
            store.add_tag("refs/tags/v1.0.0", &tree, 0);
            store.add_tag("refs/tags/v1.2.0", &tree, 0);

            let summary = context().latest(&store).unwrap().unwrap();
            assert_eq!(summary.id, "acme/widget/aws/1.2.0");
        }

        #[test]
        fn none_without_versions() {
            assert_eq!(context().latest(&MemoryStore::new()).unwrap(), None);
        }

        #[test]
        fn enumeration_failure_is_internal() {
            let mut store = MemoryStore::new();
            store.fail_on(FailOn::Enumerate);
            assert_eq!(
                context().latest(&store).unwrap_err(),
                RegistryError::Internal
            );
        }
    }

    mod tree_for {
        use super::*;

        fn two_versions() -> (MemoryStore, crate::core::types::Oid, crate::core::types::Oid) {
            let mut store = MemoryStore::new();
            let old = store.add_tree(vec![]);
            let new = store.add_tree(vec![]);
            store.add_tag("refs/tags/v1.0.0", &old, 0);
            store.add_tag("refs/tags/v1.2.0", &new, 0);
            (store, old, new)
        }

        #[test]
        fn resolves_each_version() {
            let (store, old, new) = two_versions();
            assert_eq!(context().tree_for(&store, &v("1.0.0")).unwrap().oid(), &old);
            assert_eq!(context().tree_for(&store, &v("1.2.0")).unwrap().oid(), &new);
        }

        #[test]
        fn missing_version_is_not_found() {
            let (store, _, _) = two_versions();
            assert_eq!(
                context().tree_for(&store, &v("2.0.0")).unwrap_err(),
                RegistryError::NotFound
            );
        }

        #[test]
        fn non_canonical_tag_is_not_found() {
            let mut store = MemoryStore::new();
            let tree = store.add_tree(vec![]);
            store.add_tag("refs/tags/v1.0", &tree, 0);
            assert_eq!(
                context().tree_for(&store, &v("1.0.0")).unwrap_err(),
                RegistryError::NotFound
            );
        }

        #[test]
        fn enumeration_failure_is_internal() {
            let (mut store, _, _) = two_versions();
            store.fail_on(FailOn::Enumerate);
            assert_eq!(
                context().tree_for(&store, &v("1.0.0")).unwrap_err(),
                RegistryError::Internal
            );
        }
    }

    mod streaming {
        use super::*;
        use flate2::read::GzDecoder;
        use http_body_util::BodyExt;
        use std::io::Read;

        fn store_with_file() -> (MemoryStore, crate::core::types::Oid) {
            let mut store = MemoryStore::new();
            let blob = store.add_blob(&[b'x'; 4096]);
            let root = store.add_tree(vec![MemoryStore::file("main.tf", &blob, 0o100644)]);
            store.add_tag("refs/tags/v1.0.0", &root, 1_700_000_000);
            (store, blob)
        }

        #[tokio::test]
        async fn complete_archive_streams() {
            let (store, _) = store_with_file();
            let (writer, body) = channel_body();
            let worker = tokio::task::spawn_blocking(move || {
                stream_archive(&context(), &store, &v("1.0.0"), writer);
            });

            let compressed = body.collect().await.unwrap().to_bytes();
            worker.await.unwrap();

            let mut tar_bytes = Vec::new();
            GzDecoder::new(&compressed[..])
                .read_to_end(&mut tar_bytes)
                .unwrap();
            let mut archive = tar::Archive::new(tar_bytes.as_slice());
            let names: Vec<String> = archive
                .entries()
                .unwrap()
                .map(|e| e.unwrap().path().unwrap().display().to_string())
                .collect();
            assert_eq!(names, vec!["main.tf"]);
        }

        #[tokio::test]
        async fn read_failure_truncates_body() {
            let (mut store, blob) = store_with_file();
            store.fail_on(FailOn::Object(blob));
            let (writer, body) = channel_body();
            let worker = tokio::task::spawn_blocking(move || {
                stream_archive(&context(), &store, &v("1.0.0"), writer);
            });

            assert!(body.collect().await.is_err());
            worker.await.unwrap();
        }
    }
}
