//! A directory standing in for the platform asset library.
//!
//! An opaque handle maps to the file whose stem is the handle with `/`
//! replaced by `_` (`9F2A-11/L0/001` -> `9F2A-11_L0_001.heic`). Fetches answer
//! from a worker thread, like a real library would.

use handoff_receiver::{AssetCatalog, CatalogAsset, FullSizeCallback, FullSizeRequest};
use std::path::{Path, PathBuf};
use std::thread;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn lookup(&self, identifier: &str) -> Option<PathBuf> {
        let stem = identifier.replace('/', "_");
        if stem.is_empty() || stem.starts_with('.') {
            return None;
        }
        let entries = std::fs::read_dir(&self.root).ok()?;
        entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .find(|path| file_stem(path).as_deref() == Some(stem.as_str()))
    }
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
}

impl AssetCatalog for DirectoryCatalog {
    fn find(&self, identifier: &str) -> Option<CatalogAsset> {
        self.lookup(identifier).map(|_| CatalogAsset {
            local_identifier: identifier.to_string(),
        })
    }

    fn request_full_size(
        &self,
        asset: &CatalogAsset,
        request: FullSizeRequest,
        done: FullSizeCallback,
    ) {
        let catalog = self.clone();
        let identifier = asset.local_identifier.clone();
        debug!(
            event = "catalog_request",
            identifier = %identifier,
            network = request.network_access_allowed
        );
        thread::spawn(move || done(catalog.lookup(&identifier)));
    }
}
