//! The image asset entity.
//!
//! [`ImageAsset`] augments a generic library file with image-specific
//! metadata: pixel dimensions, a lazily extracted EXIF map, alt text and
//! caption, and a subject-location crop hint. It also owns preset dispatch —
//! turning the configured preset table and admin icon sizes into named
//! option-bag batches for the [`crate::derive::ThumbnailDeriver`].
//!
//! ## Dimension bookkeeping
//!
//! `width`/`height` use `0` as the "unknown" sentinel; callers never see an
//! optional. Dimensions are re-read whenever the source content changes
//! (detected by SHA-256 fingerprint). A decode failure on a live upload
//! resets them to unknown; the same failure during a bulk/fixture load keeps
//! the previously stored values, because fixture rows routinely arrive
//! without their blobs.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use log::debug;
use sha2::{Digest, Sha256};

use crate::config::{PresetConfig, SIDEBAR_IMAGE_WIDTH};
use crate::derive::{DeriveError, ThumbnailDeriver};
use crate::exif::extract_exif;
use crate::options::ThumbnailOptions;
use crate::perms::{FolderId, PermissionKind, PermissionResolver, User, UserId};
use crate::render::Renderer;
use crate::storage::Storage;

/// Upper bound on alt text and caption length.
const TEXT_FIELD_MAX: usize = 255;

/// An image file in the media library.
#[derive(Debug, Clone, Default)]
pub struct ImageAsset {
    /// User-facing display name; empty means unset.
    pub name: String,
    /// Filename the file was originally uploaded under.
    pub original_filename: String,
    /// Storage key of the source blob, e.g. `photos/2024/cat.jpg`.
    pub file_name: String,
    /// Owning user, if any.
    pub owner: Option<UserId>,
    /// Containing folder; permissions delegate here for non-owners.
    pub folder: Option<FolderId>,
    /// Focal point hint as `"x,y"`, passed verbatim into every option bag.
    pub subject_location: String,
    /// Mirror of `check_validity()`, refreshed on save.
    pub has_all_mandatory_data: bool,

    width: u32,
    height: u32,
    default_alt_text: Option<String>,
    default_caption: Option<String>,
    source_hash: Option<String>,
    exif_cache: Option<BTreeMap<String, String>>,
}

impl ImageAsset {
    pub fn new(name: &str, original_filename: &str, file_name: &str) -> Self {
        Self {
            name: name.to_string(),
            original_filename: original_filename.to_string(),
            file_name: file_name.to_string(),
            ..Self::default()
        }
    }

    /// Whether a filename looks like an image this entity can represent.
    pub fn matches_file_type(file_name: &str) -> bool {
        let ext = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        matches!(ext.as_str(), "jpg" | "jpeg" | "png" | "gif")
    }

    /// Pixel width; `0` when unknown.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Pixel height; `0` when unknown.
    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn default_alt_text(&self) -> Option<&str> {
        self.default_alt_text.as_deref()
    }

    /// Set the alt text, truncating to the field bound.
    pub fn set_default_alt_text(&mut self, text: Option<&str>) {
        self.default_alt_text = text.map(truncate_field);
    }

    pub fn default_caption(&self) -> Option<&str> {
        self.default_caption.as_deref()
    }

    /// Set the caption, truncating to the field bound.
    pub fn set_default_caption(&mut self, text: Option<&str>) {
        self.default_caption = text.map(truncate_field);
    }

    /// Re-read pixel dimensions when the source content changed.
    ///
    /// `source` is the blob's current bytes, `None` when the blob is
    /// unreadable. Returns whether a content change was detected at all;
    /// unchanged bytes are a no-op. On a detected change the EXIF memo is
    /// dropped, and a decode failure resets dimensions to unknown unless
    /// this is a bulk/fixture load.
    pub fn update_dimensions_from_source(
        &mut self,
        source: Option<&[u8]>,
        is_bulk_load: bool,
    ) -> bool {
        let fingerprint = source.map(content_fingerprint);
        if fingerprint == self.source_hash {
            return false;
        }
        self.source_hash = fingerprint;
        self.exif_cache = None;

        match source.and_then(probe_dimensions) {
            Some((width, height)) => {
                self.width = width;
                self.height = height;
            }
            None => {
                debug!("could not read image dimensions for {}", self.file_name);
                if !is_bulk_load {
                    self.width = 0;
                    self.height = 0;
                }
            }
        }
        true
    }

    /// EXIF fields of the source blob, memoized for this instance's
    /// lifetime. An unreadable source memoizes an empty map. The memo is
    /// only dropped when [`Self::update_dimensions_from_source`] detects a
    /// content change.
    pub fn exif(&mut self, storage: &impl Storage) -> &BTreeMap<String, String> {
        let file_name = &self.file_name;
        self.exif_cache.get_or_insert_with(|| {
            match storage.read(Path::new(file_name)) {
                Ok(bytes) => extract_exif(&bytes),
                Err(e) => {
                    debug!("no source for EXIF extraction ({}): {}", file_name, e);
                    BTreeMap::new()
                }
            }
        })
    }

    /// Whether the asset has all data required to be used.
    pub fn check_validity(&self) -> bool {
        !self.name.is_empty()
    }

    /// Refresh the persisted validity flag; call before every save.
    pub fn refresh_validity(&mut self) {
        self.has_all_mandatory_data = self.check_validity();
    }

    /// Display label: name, else original filename, else a placeholder.
    pub fn label(&self) -> &str {
        if !self.name.is_empty() {
            &self.name
        } else if !self.original_filename.is_empty() {
            &self.original_filename
        } else {
            "unnamed file"
        }
    }

    /// Ratio of the image width to the admin sidebar width; `1.0` when the
    /// width is unknown.
    pub fn sidebar_ratio(&self) -> f64 {
        if self.width > 0 {
            f64::from(self.width) / f64::from(SIDEBAR_IMAGE_WIDTH)
        } else {
            1.0
        }
    }

    /// Capability check, in strict order: unauthenticated users fail, then
    /// superusers pass, then the owner passes, then the folder hierarchy
    /// decides. An asset outside any folder is private to its owner.
    pub fn has_permission(
        &self,
        user: &User,
        kind: PermissionKind,
        resolver: &impl PermissionResolver,
    ) -> bool {
        if !user.is_authenticated {
            return false;
        }
        if user.is_superuser {
            return true;
        }
        if self.owner == Some(user.id) {
            return true;
        }
        match self.folder {
            Some(folder) => resolver.has_permission(folder, user, kind),
            None => false,
        }
    }

    /// Derive the configured preset table. Entries whose derivation failed
    /// are absent from the result (policy permitting).
    pub fn thumbnails<S: Storage, R: Renderer>(
        &self,
        deriver: &ThumbnailDeriver<'_, S, R>,
    ) -> Result<BTreeMap<String, String>, DeriveError> {
        let specs = deriver
            .config()
            .thumbnails
            .presets
            .iter()
            .map(|(name, preset)| {
                (
                    name.clone(),
                    ThumbnailOptions::from_preset(preset, &self.subject_location),
                )
            })
            .collect();
        deriver.generate(&self.file_name, &specs)
    }

    /// Derive one square crop+upscale icon per configured admin icon size,
    /// keyed by the stringified size.
    pub fn icons<S: Storage, R: Renderer>(
        &self,
        deriver: &ThumbnailDeriver<'_, S, R>,
    ) -> Result<BTreeMap<String, String>, DeriveError> {
        let specs = self.icon_specs(&deriver.config().thumbnails.admin_icon_sizes);
        deriver.generate(&self.file_name, &specs)
    }

    /// The single icon-image URL: the first configured icon-image size, or
    /// `None` when its derivation failed.
    pub fn icon_image<S: Storage, R: Renderer>(
        &self,
        deriver: &ThumbnailDeriver<'_, S, R>,
    ) -> Result<Option<String>, DeriveError> {
        let sizes = &deriver.config().thumbnails.admin_icon_image_sizes;
        let specs = self.icon_specs(sizes);
        let thumbnails = deriver.generate(&self.file_name, &specs)?;
        Ok(sizes
            .first()
            .and_then(|size| thumbnails.get(&size.to_string()).cloned()))
    }

    fn icon_specs(&self, sizes: &[u32]) -> BTreeMap<String, ThumbnailOptions> {
        sizes
            .iter()
            .map(|&size| {
                let preset = PresetConfig {
                    size: [size, size],
                    crop: true,
                    upscale: true,
                };
                (
                    size.to_string(),
                    ThumbnailOptions::from_preset(&preset, &self.subject_location),
                )
            })
            .collect()
    }
}

fn truncate_field(text: &str) -> String {
    text.chars().take(TEXT_FIELD_MAX).collect()
}

fn content_fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Read pixel dimensions from the image header without a full decode.
fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}
