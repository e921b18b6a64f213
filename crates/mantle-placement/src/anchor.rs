//! Namespace anchor: makes sure the tracked path exists in the shared
//! namespace before anything is placed against it.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tracing::info;

use mantle_core::PathKey;

/// Boxed future alias for anchor operations.
pub type AnchorFuture<'a> = Pin<Box<dyn Future<Output = io::Result<()>> + Send + 'a>>;

pub trait NamespaceAnchor: Send + Sync {
    /// Create `path` (and its parents). Succeeds if it already exists.
    fn create_directory<'a>(&'a self, path: &'a PathKey) -> AnchorFuture<'a>;
}

/// The shared namespace seen through a local mount point.
#[derive(Debug, Clone)]
pub struct MountedNamespace {
    mount: PathBuf,
}

impl MountedNamespace {
    pub fn new(mount: impl Into<PathBuf>) -> Self {
        Self {
            mount: mount.into(),
        }
    }

    /// Local filesystem path for a namespace path.
    pub fn local_path(&self, path: &PathKey) -> PathBuf {
        path.components()
            .iter()
            .fold(self.mount.clone(), |acc, c| acc.join(c))
    }

    pub fn mount(&self) -> &Path {
        &self.mount
    }
}

impl NamespaceAnchor for MountedNamespace {
    fn create_directory<'a>(&'a self, path: &'a PathKey) -> AnchorFuture<'a> {
        Box::pin(async move {
            let local = self.local_path(path);
            tokio::fs::create_dir_all(&local).await?;
            info!(%path, local = %local.display(), "namespace anchor ready");
            Ok(())
        })
    }
}
