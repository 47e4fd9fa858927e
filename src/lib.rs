//! # mediashelf
//!
//! Image asset metadata and cached thumbnail derivation for a media file
//! library. An [`asset::ImageAsset`] carries image-specific metadata on top
//! of a generic library file — pixel dimensions, EXIF, alt text/caption, a
//! subject-location crop hint — and exposes named thumbnail presets whose
//! derivation is cached by deterministic filename.
//!
//! # Architecture: Predict, Check, Render
//!
//! Thumbnail derivation runs in three steps per request:
//!
//! ```text
//! 1. Encode   option bag  →  token list  →  filename     (pure)
//! 2. Check    predicted path against storage              (cheap)
//! 3. Render   decode + resize + encode, only on a miss    (expensive)
//! ```
//!
//! The filename *is* the cache key. It is derived from the option bag in a
//! canonical order, so any caller asking for the same options lands on the
//! same storage entry — including the external rendering tool, whose
//! filename convention the encoding mirrors bit-for-bit.
//!
//! Failures are isolated per named entry: one broken derivation is logged
//! and dropped from the batch instead of taking down its siblings (see
//! [`derive::FailurePolicy`]).
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`asset`] | `ImageAsset` entity: dimensions, EXIF memo, labels, preset dispatch, permissions |
//! | [`options`] | Option bags and the canonical token/filename encoding |
//! | [`derive`] | `ThumbnailDeriver` — path prediction, cache check, render dispatch |
//! | [`storage`] | `Storage` trait + filesystem implementation |
//! | [`render`] | `Renderer` trait + `image`-crate implementation |
//! | [`exif`] | Best-effort EXIF extraction into a string map |
//! | [`perms`] | Folder-delegated permission resolution |
//! | [`config`] | TOML-loadable process-wide configuration |
//!
//! # Example
//!
//! ```no_run
//! use mediashelf::asset::ImageAsset;
//! use mediashelf::config::LibraryConfig;
//! use mediashelf::derive::{FailurePolicy, ThumbnailDeriver};
//! use mediashelf::render::ImageRenderer;
//! use mediashelf::storage::FileStorage;
//!
//! let config = LibraryConfig::default();
//! let storage = FileStorage::from_config(&config.storage);
//! let renderer = ImageRenderer::new(&config, &storage);
//! let deriver = ThumbnailDeriver::new(&config, &storage, &renderer, FailurePolicy::LogAndSkip);
//!
//! let asset = ImageAsset::new("Cat", "IMG_1.jpg", "photos/cat.jpg");
//! let thumbnails = asset.thumbnails(&deriver).unwrap();
//! for (name, url) in &thumbnails {
//!     println!("{name}: {url}");
//! }
//! ```

pub mod asset;
pub mod config;
pub mod derive;
pub mod exif;
pub mod options;
pub mod perms;
pub mod render;
pub mod storage;
