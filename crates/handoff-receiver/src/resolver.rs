//! Turns the identifiers a producer stores into paths the consumer can read.
//!
//! Identifiers are either direct filesystem references or opaque handles into
//! the platform asset catalog. Catalog fetches may go to the network; the
//! resolver blocks on them and imposes no timeout of its own.

use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;

pub const FILE_SCHEME_PREFIX: &str = "file://";
pub const MEDIA_STORAGE_PREFIXES: [&str; 2] = ["/var/mobile/Media", "/private/var/mobile"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no asset catalog available for '{0}'")]
    NoCatalog(String),
    #[error("asset '{0}' is not in the catalog")]
    NotInCatalog(String),
    #[error("asset '{0}' has no full-size file")]
    Unavailable(String),
    #[error("asset catalog abandoned the request for '{0}'")]
    Abandoned(String),
}

pub trait IdentifierResolver {
    fn try_resolve(&self, identifier: &str) -> Result<String, ResolveError>;

    fn resolve(&self, identifier: &str) -> Option<String> {
        match self.try_resolve(identifier) {
            Ok(path) => Some(path),
            Err(err) => {
                warn!(event = "identifier_unresolved", identifier, error = %err);
                None
            }
        }
    }
}

/// Prefixes that mark an identifier as a path that needs no lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectPaths {
    prefixes: Vec<String>,
}

impl Default for DirectPaths {
    fn default() -> Self {
        Self {
            prefixes: MEDIA_STORAGE_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
        }
    }
}

impl DirectPaths {
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn direct_path(&self, identifier: &str) -> Option<String> {
        if identifier.starts_with(FILE_SCHEME_PREFIX) {
            return Some(file_url_path(identifier));
        }
        self.prefixes
            .iter()
            .any(|prefix| identifier.starts_with(prefix.as_str()))
            .then(|| identifier.to_string())
    }
}

fn file_url_path(identifier: &str) -> String {
    Url::parse(identifier)
        .ok()
        .and_then(|url| url.to_file_path().ok())
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_else(|| identifier[FILE_SCHEME_PREFIX.len()..].to_string())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogAsset {
    pub local_identifier: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullSizeRequest {
    pub network_access_allowed: bool,
}

pub type FullSizeCallback = Box<dyn FnOnce(Option<PathBuf>) + Send + 'static>;

/// Platform asset library.
pub trait AssetCatalog {
    fn find(&self, identifier: &str) -> Option<CatalogAsset>;

    /// Asks for the asset's full-resolution file. `done` is invoked exactly
    /// once, from any thread; dropping it without a call counts as failure.
    fn request_full_size(&self, asset: &CatalogAsset, request: FullSizeRequest, done: FullSizeCallback);
}

pub struct PlatformResolver {
    direct: DirectPaths,
    catalog: Option<Box<dyn AssetCatalog>>,
}

impl PlatformResolver {
    pub fn new(direct: DirectPaths) -> Self {
        Self {
            direct,
            catalog: None,
        }
    }

    pub fn with_catalog(mut self, catalog: Box<dyn AssetCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }
}

impl Default for PlatformResolver {
    fn default() -> Self {
        Self::new(DirectPaths::default())
    }
}

impl IdentifierResolver for PlatformResolver {
    fn try_resolve(&self, identifier: &str) -> Result<String, ResolveError> {
        if let Some(path) = self.direct.direct_path(identifier) {
            return Ok(path);
        }
        let catalog = self
            .catalog
            .as_deref()
            .ok_or_else(|| ResolveError::NoCatalog(identifier.to_string()))?;
        let asset = catalog
            .find(identifier)
            .ok_or_else(|| ResolveError::NotInCatalog(identifier.to_string()))?;

        debug!(event = "asset_fetch_start", identifier);
        let path = wait_for_full_size(catalog, &asset)?;
        debug!(event = "asset_fetch_done", identifier, path = %path.display());
        Ok(path.to_string_lossy().into_owned())
    }
}

/// Blocks the calling thread until the catalog answers. Must not be called
/// from inside an async runtime, nor while holding a lock.
fn wait_for_full_size(
    catalog: &dyn AssetCatalog,
    asset: &CatalogAsset,
) -> Result<PathBuf, ResolveError> {
    let (tx, rx) = oneshot::channel();
    catalog.request_full_size(
        asset,
        FullSizeRequest {
            network_access_allowed: true,
        },
        Box::new(move |path| {
            let _ = tx.send(path);
        }),
    );
    match rx.blocking_recv() {
        Ok(Some(path)) => Ok(path),
        Ok(None) => Err(ResolveError::Unavailable(asset.local_identifier.clone())),
        Err(_) => Err(ResolveError::Abandoned(asset.local_identifier.clone())),
    }
}
