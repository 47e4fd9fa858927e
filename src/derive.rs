//! Thumbnail derivation with cache short-circuiting.
//!
//! [`ThumbnailDeriver`] is the stateless front door for thumbnail requests.
//! Per option bag it predicts the storage path the rendered file would live
//! at, checks existence, and only invokes the (expensive) renderer on a
//! miss. Repeated derivations with identical bags converge on one cache
//! entry; the existence check and the render are deliberately not atomic —
//! two concurrent misses render redundantly, which costs CPU but never
//! correctness.
//!
//! ## Failure isolation
//!
//! Batches are requested by name (`"admin_tiny_icon"`, `"48"`, ...). A
//! failure in one entry must not take down its siblings: under
//! [`FailurePolicy::LogAndSkip`] the entry is logged and omitted from the
//! result map. [`FailurePolicy::Propagate`] aborts the whole batch on the
//! first failure instead — the development-time setting, where a silent
//! hole in the result map is worse than a crash.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, error};
use thiserror::Error;

use crate::config::LibraryConfig;
use crate::options::{ThumbnailOptions, prepared_tokens, thumbnail_filename};
use crate::render::{RenderError, Renderer};
use crate::storage::{Storage, StorageError};

#[derive(Error, Debug)]
pub enum DeriveError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("render error: {0}")]
    Render(#[from] RenderError),
}

/// What to do when a single named derivation fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure and omit the entry; siblings continue. Production
    /// behavior.
    #[default]
    LogAndSkip,
    /// Abort the batch on the first failure. Development behavior.
    Propagate,
}

/// Predict the storage-relative path a thumbnail for `source_name` and
/// `options` lives at: the thumbnail base directory, then the source's own
/// containing directory, then the encoded filename.
///
/// Shared between the deriver (existence checks) and the renderer (write
/// target) so the two always agree.
pub fn thumbnail_storage_path(
    config: &LibraryConfig,
    source_name: &str,
    options: &ThumbnailOptions,
) -> PathBuf {
    let tokens = prepared_tokens(options, config.thumbnails.quality);
    let filename = thumbnail_filename(source_name, &tokens, config.options_in_template());
    let source_dir = Path::new(source_name).parent().unwrap_or(Path::new(""));
    Path::new(&config.storage.thumbnail_base_dir)
        .join(source_dir)
        .join(filename)
}

/// Stateless thumbnail derivation over a storage and a renderer.
pub struct ThumbnailDeriver<'a, S: Storage, R: Renderer> {
    config: &'a LibraryConfig,
    storage: &'a S,
    renderer: &'a R,
    policy: FailurePolicy,
}

impl<'a, S: Storage, R: Renderer> ThumbnailDeriver<'a, S, R> {
    pub fn new(
        config: &'a LibraryConfig,
        storage: &'a S,
        renderer: &'a R,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            config,
            storage,
            renderer,
            policy,
        }
    }

    pub fn config(&self) -> &LibraryConfig {
        self.config
    }

    /// Derive a single thumbnail URL for one option bag.
    ///
    /// Cache hit: the predicted path already exists in storage, and its URL
    /// is returned without touching the renderer. Cache miss: the renderer
    /// runs and its URL is returned.
    pub fn derive(
        &self,
        source_name: &str,
        options: &ThumbnailOptions,
    ) -> Result<String, DeriveError> {
        let relative = thumbnail_storage_path(self.config, source_name, options);
        if self.storage.exists(&relative)? {
            debug!("thumbnail cache hit: {}", relative.display());
            return Ok(self.storage.url_for(&relative)?);
        }

        debug!("thumbnail cache miss, rendering: {}", relative.display());
        let rendered = self.renderer.render(source_name, options)?;
        Ok(rendered.url)
    }

    /// Derive a named batch, honoring the failure policy.
    ///
    /// Under [`FailurePolicy::LogAndSkip`] the result is always `Ok`; failed
    /// entries are simply absent from the map.
    pub fn generate(
        &self,
        source_name: &str,
        specs: &BTreeMap<String, ThumbnailOptions>,
    ) -> Result<BTreeMap<String, String>, DeriveError> {
        let mut thumbnails = BTreeMap::new();
        for (name, options) in specs {
            match self.derive(source_name, options) {
                Ok(url) => {
                    thumbnails.insert(name.clone(), url);
                }
                Err(e) => match self.policy {
                    FailurePolicy::Propagate => return Err(e),
                    FailurePolicy::LogAndSkip => {
                        error!("error while generating thumbnail '{}': {}", name, e);
                    }
                },
            }
        }
        Ok(thumbnails)
    }
}
