//! Library configuration.
//!
//! Handles loading and validating `mediashelf.toml` files. All values have
//! stock defaults; user config files are sparse and override only what they
//! name. Unknown keys are rejected to catch typos early.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [storage]
//! media_root = "media"            # Filesystem root for all blobs
//! media_url = "/media"            # Public URL prefix for resolved paths
//! thumbnail_base_dir = "thumbnails"  # Subtree holding derived thumbnails
//! basedir_template = ""           # External layout template, may embed %(opts)s
//! subdir_template = ""            # Ditto, applied below the base dir
//!
//! [thumbnails]
//! quality = 85                    # JPEG quality for rendered thumbnails
//! admin_icon_sizes = [16, 32, 48, 64]
//! admin_icon_image_sizes = [210]  # First entry backs the single-icon lookup
//!
//! [thumbnails.presets.admin_tiny_icon]
//! size = [32, 32]
//! crop = true
//! upscale = true
//! ```
//!
//! ## The `%(opts)s` marker
//!
//! Deployments that lay thumbnails out with a per-options directory segment
//! put the literal `%(opts)s` marker in one of the two template strings. The
//! deriver only *checks* for the marker — the external rendering tool owns
//! the actual substitution — but its presence switches the filename scheme
//! (see [`crate::options::thumbnail_filename`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Width in pixels the admin sidebar renders previews at.
pub const SIDEBAR_IMAGE_WIDTH: u32 = 210;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Process-wide library configuration.
///
/// Read-only at call time: built once at startup and shared by reference.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LibraryConfig {
    /// Blob storage layout and URL settings.
    pub storage: StorageConfig,
    /// Thumbnail quality, icon sizes, and the named preset table.
    pub thumbnails: ThumbnailsConfig,
}

impl LibraryConfig {
    /// Load from a TOML file. Unknown keys are rejected.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thumbnails.quality == 0 || self.thumbnails.quality > 100 {
            return Err(ConfigError::Validation(
                "thumbnails.quality must be 1-100".into(),
            ));
        }
        if self.thumbnails.admin_icon_sizes.is_empty() {
            return Err(ConfigError::Validation(
                "thumbnails.admin_icon_sizes must not be empty".into(),
            ));
        }
        if self.thumbnails.admin_icon_image_sizes.is_empty() {
            return Err(ConfigError::Validation(
                "thumbnails.admin_icon_image_sizes must not be empty".into(),
            ));
        }
        for (name, preset) in &self.thumbnails.presets {
            if preset.size == [0, 0] {
                return Err(ConfigError::Validation(format!(
                    "preset '{}' has size [0, 0]",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Whether either directory template embeds the `%(opts)s` segment.
    pub fn options_in_template(&self) -> bool {
        self.storage.basedir_template.contains("%(opts)s")
            || self.storage.subdir_template.contains("%(opts)s")
    }
}

/// Blob storage layout: filesystem root, public URL prefix, and the
/// thumbnail directory scheme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Filesystem root under which all storage-relative paths resolve.
    pub media_root: String,
    /// Public URL prefix joined with relative paths to form resolvable URLs.
    pub media_url: String,
    /// Directory subtree (under the root) holding derived thumbnails.
    pub thumbnail_base_dir: String,
    /// External layout template for the thumbnail base directory.
    pub basedir_template: String,
    /// External layout template applied below the base directory.
    pub subdir_template: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_root: "media".to_string(),
            media_url: "/media".to_string(),
            thumbnail_base_dir: "thumbnails".to_string(),
            basedir_template: String::new(),
            subdir_template: String::new(),
        }
    }
}

/// Thumbnail generation settings and the named preset table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    /// JPEG encoding quality for rendered thumbnails (1-100). Also appears
    /// as the `q` token in every derived filename.
    pub quality: u32,
    /// Square icon edge lengths offered in admin listings.
    pub admin_icon_sizes: Vec<u32>,
    /// Icon-image sizes; the first entry backs the single-icon lookup.
    pub admin_icon_image_sizes: Vec<u32>,
    /// Named presets derived by [`crate::asset::ImageAsset::thumbnails`].
    pub presets: BTreeMap<String, PresetConfig>,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            quality: 85,
            admin_icon_sizes: vec![16, 32, 48, 64],
            admin_icon_image_sizes: vec![SIDEBAR_IMAGE_WIDTH],
            presets: default_presets(),
        }
    }
}

/// A named thumbnail preset: target size plus crop/upscale flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PresetConfig {
    /// Target size as `[width, height]`; a zero edge is unconstrained.
    pub size: [u32; 2],
    #[serde(default)]
    pub crop: bool,
    #[serde(default)]
    pub upscale: bool,
}

/// The stock preset table used when no presets are configured.
pub fn default_presets() -> BTreeMap<String, PresetConfig> {
    let mut presets = BTreeMap::new();
    presets.insert(
        "admin_clipboard_icon".to_string(),
        PresetConfig {
            size: [32, 32],
            crop: true,
            upscale: true,
        },
    );
    presets.insert(
        "admin_sidebar_preview".to_string(),
        PresetConfig {
            size: [SIDEBAR_IMAGE_WIDTH, 0],
            crop: false,
            upscale: true,
        },
    );
    presets.insert(
        "admin_directory_listing_icon".to_string(),
        PresetConfig {
            size: [48, 48],
            crop: true,
            upscale: true,
        },
    );
    presets.insert(
        "admin_tiny_icon".to_string(),
        PresetConfig {
            size: [32, 32],
            crop: true,
            upscale: true,
        },
    );
    presets
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let config = LibraryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.thumbnails.quality, 85);
        assert_eq!(config.thumbnails.admin_icon_sizes, vec![16, 32, 48, 64]);
        assert_eq!(config.thumbnails.admin_icon_image_sizes, vec![210]);
        assert_eq!(config.thumbnails.presets.len(), 4);
    }

    #[test]
    fn default_presets_match_stock_table() {
        let presets = default_presets();
        let sidebar = &presets["admin_sidebar_preview"];
        assert_eq!(sidebar.size, [210, 0]);
        assert!(!sidebar.crop);
        assert!(sidebar.upscale);

        let tiny = &presets["admin_tiny_icon"];
        assert_eq!(tiny.size, [32, 32]);
        assert!(tiny.crop);
        assert!(tiny.upscale);
    }

    #[test]
    fn options_in_template_checks_both_templates() {
        let mut config = LibraryConfig::default();
        assert!(!config.options_in_template());

        config.storage.basedir_template = "thumbs/%(opts)s".to_string();
        assert!(config.options_in_template());

        config.storage.basedir_template.clear();
        config.storage.subdir_template = "%(opts)s".to_string();
        assert!(config.options_in_template());
    }

    #[test]
    fn load_partial_config_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mediashelf.toml");
        fs::write(&path, "[thumbnails]\nquality = 70\n").unwrap();

        let config = LibraryConfig::load(&path).unwrap();
        assert_eq!(config.thumbnails.quality, 70);
        assert_eq!(config.storage.media_root, "media");
        assert_eq!(config.thumbnails.presets.len(), 4);
    }

    #[test]
    fn load_rejects_unknown_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mediashelf.toml");
        fs::write(&path, "[thumbnails]\nqualty = 70\n").unwrap();

        assert!(matches!(
            LibraryConfig::load(&path),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_parses_preset_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("mediashelf.toml");
        fs::write(
            &path,
            r#"
[thumbnails.presets.gallery_card]
size = [320, 240]
crop = true
"#,
        )
        .unwrap();

        let config = LibraryConfig::load(&path).unwrap();
        let card = &config.thumbnails.presets["gallery_card"];
        assert_eq!(card.size, [320, 240]);
        assert!(card.crop);
        assert!(!card.upscale);
        // User preset tables replace the stock one wholesale.
        assert_eq!(config.thumbnails.presets.len(), 1);
    }

    #[test]
    fn validate_rejects_zero_quality() {
        let mut config = LibraryConfig::default();
        config.thumbnails.quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_quality_above_100() {
        let mut config = LibraryConfig::default();
        config.thumbnails.quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_icon_sizes() {
        let mut config = LibraryConfig::default();
        config.thumbnails.admin_icon_sizes.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_by_zero_preset() {
        let mut config = LibraryConfig::default();
        config.thumbnails.presets.insert(
            "broken".to_string(),
            PresetConfig {
                size: [0, 0],
                crop: false,
                upscale: false,
            },
        );
        assert!(config.validate().is_err());
    }
}
