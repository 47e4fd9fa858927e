//! Thumbnail rendering.
//!
//! The [`Renderer`] trait is the seam between path/cache logic and actual
//! pixel work, mirroring the storage seam: the deriver predicts where a
//! thumbnail should live, and only on a cache miss hands the full option bag
//! to a renderer. The production implementation is [`ImageRenderer`], built
//! on the `image` crate.
//!
//! ## Sizing semantics
//!
//! - A zero width or height in the target size means "unconstrained on that
//!   edge" — `(210, 0)` scales to 210px wide at natural height.
//! - Without the `upscale` flag the source is never enlarged; crop targets
//!   larger than the source shrink to what the source can cover.
//! - With `crop`, the image is cover-scaled and a window is cut out, biased
//!   toward the `subject_location` focal point when one is set (`"x,y"` in
//!   source pixel coordinates) and centered otherwise.

use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use log::debug;
use thiserror::Error;

use crate::config::LibraryConfig;
use crate::derive::thumbnail_storage_path;
use crate::options::{ThumbnailOptions, rendering_extension};
use crate::storage::{Storage, StorageError};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("source bytes are not a decodable image: {0}")]
    Decode(String),
    #[error("encoding failed: {0}")]
    Encode(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A rendered thumbnail, already placed in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedThumbnail {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Renders a thumbnail for a source blob according to an option bag and
/// writes the result wherever its storage layout dictates.
pub trait Renderer {
    fn render(
        &self,
        source_name: &str,
        options: &ThumbnailOptions,
    ) -> Result<RenderedThumbnail, RenderError>;
}

/// Production renderer: decode with the `image` crate, resize/crop, encode
/// by rendering extension, write back through [`Storage`].
///
/// Writes land at the exact relative path the deriver predicts, so the next
/// derivation for the same option bag is a cache hit.
pub struct ImageRenderer<'a, S: Storage> {
    config: &'a LibraryConfig,
    storage: &'a S,
}

impl<'a, S: Storage> ImageRenderer<'a, S> {
    pub fn new(config: &'a LibraryConfig, storage: &'a S) -> Self {
        Self { config, storage }
    }
}

impl<S: Storage> Renderer for ImageRenderer<'_, S> {
    fn render(
        &self,
        source_name: &str,
        options: &ThumbnailOptions,
    ) -> Result<RenderedThumbnail, RenderError> {
        let bytes = self.storage.read(Path::new(source_name))?;
        let img = image::load_from_memory(&bytes).map_err(|e| RenderError::Decode(e.to_string()))?;

        let source_size = (img.width(), img.height());
        let target = options.size;
        let crop = options.flag("crop") && target.0 > 0 && target.1 > 0;
        let upscale = options.flag("upscale");

        let factor = scale_factor(source_size, target, crop, upscale);
        let scaled = scaled_size(source_size, factor);
        let resized = img.resize_exact(scaled.0, scaled.1, FilterType::Lanczos3);

        let result = if crop {
            let window = (target.0.min(scaled.0), target.1.min(scaled.1));
            let subject = options
                .subject_location()
                .and_then(parse_subject_location)
                .map(|(x, y)| scale_point((x, y), factor));
            let (x, y) = crop_origin(scaled, window, subject);
            resized.crop_imm(x, y, window.0, window.1)
        } else {
            resized
        };

        let encoded = encode(&result, source_name, self.config.thumbnails.quality)?;
        let relative = thumbnail_storage_path(self.config, source_name, options);
        self.storage.write(&relative, &encoded)?;
        debug!("rendered thumbnail: {}", relative.display());

        Ok(RenderedThumbnail {
            url: self.storage.url_for(&relative)?,
            width: result.width(),
            height: result.height(),
        })
    }
}

/// Scale factor from source to the resize stage.
///
/// Crop mode covers the target box (both edges reach it); fit mode stays
/// inside it. Zero target edges constrain nothing. Without `upscale` the
/// factor is capped at 1.0.
fn scale_factor(source: (u32, u32), target: (u32, u32), crop: bool, upscale: bool) -> f64 {
    let fx = (target.0 > 0).then(|| f64::from(target.0) / f64::from(source.0));
    let fy = (target.1 > 0).then(|| f64::from(target.1) / f64::from(source.1));

    let factor = match (fx, fy) {
        (Some(fx), Some(fy)) => {
            if crop {
                fx.max(fy)
            } else {
                fx.min(fy)
            }
        }
        (Some(fx), None) => fx,
        (None, Some(fy)) => fy,
        (None, None) => 1.0,
    };

    if upscale { factor } else { factor.min(1.0) }
}

fn scaled_size(source: (u32, u32), factor: f64) -> (u32, u32) {
    let scale = |edge: u32| ((f64::from(edge) * factor).round().max(1.0)) as u32;
    (scale(source.0), scale(source.1))
}

fn scale_point(point: (u32, u32), factor: f64) -> (u32, u32) {
    (
        (f64::from(point.0) * factor).round() as u32,
        (f64::from(point.1) * factor).round() as u32,
    )
}

/// Origin of the crop window inside the scaled image.
///
/// Centered on the subject point when given, on the image center otherwise;
/// always clamped so the window stays inside the image.
fn crop_origin(scaled: (u32, u32), window: (u32, u32), subject: Option<(u32, u32)>) -> (u32, u32) {
    let (cx, cy) = subject.unwrap_or((scaled.0 / 2, scaled.1 / 2));
    let clamp_axis = |center: u32, window: u32, total: u32| -> u32 {
        let half = window / 2;
        center.saturating_sub(half).min(total.saturating_sub(window))
    };
    (
        clamp_axis(cx, window.0, scaled.0),
        clamp_axis(cy, window.1, scaled.1),
    )
}

/// Parse a `"x,y"` subject location string. Anything unparsable is treated
/// as unset rather than an error — it is a hint, not a contract.
pub fn parse_subject_location(value: &str) -> Option<(u32, u32)> {
    let (x, y) = value.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

/// Encode for the rendering extension of the source: JPEG at the configured
/// quality, the matching `image` codec for other known extensions, PNG for
/// everything else.
fn encode(img: &DynamicImage, source_name: &str, quality: u32) -> Result<Vec<u8>, RenderError> {
    let mut buffer = Cursor::new(Vec::new());
    let extension = rendering_extension(source_name);

    if extension == "jpg" {
        // JPEG has no alpha channel; flatten before encoding.
        let rgb = img.to_rgb8();
        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100) as u8);
        rgb.write_with_encoder(encoder)
            .map_err(|e| RenderError::Encode(e.to_string()))?;
    } else {
        let format = ImageFormat::from_extension(&extension).unwrap_or(ImageFormat::Png);
        img.write_to(&mut buffer, format)
            .map_err(|e| RenderError::Encode(e.to_string()))?;
    }

    Ok(buffer.into_inner())
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::storage::tests::MemoryStorage;
    use std::sync::Mutex;

    /// Mock renderer that records calls and returns canned URLs, or fails on
    /// request. Mirrors the storage-side mock.
    #[derive(Default)]
    pub struct MockRenderer {
        pub calls: Mutex<Vec<(String, ThumbnailOptions)>>,
        pub fail_on: Option<(u32, u32)>,
    }

    impl MockRenderer {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail any render whose target size matches.
        pub fn failing_on(size: (u32, u32)) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                fail_on: Some(size),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Renderer for MockRenderer {
        fn render(
            &self,
            source_name: &str,
            options: &ThumbnailOptions,
        ) -> Result<RenderedThumbnail, RenderError> {
            self.calls
                .lock()
                .unwrap()
                .push((source_name.to_string(), options.clone()));
            if self.fail_on == Some(options.size) {
                return Err(RenderError::Decode("mock failure".to_string()));
            }
            Ok(RenderedThumbnail {
                url: format!(
                    "/rendered/{}x{}/{}",
                    options.size.0, options.size.1, source_name
                ),
                width: options.size.0,
                height: options.size.1,
            })
        }
    }

    fn test_jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, _| {
            image::Rgb([(x % 256) as u8, 64, 128])
        });
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, ImageFormat::Jpeg)
            .unwrap();
        buffer.into_inner()
    }

    // =========================================================================
    // Pure sizing math
    // =========================================================================

    #[test]
    fn scale_factor_crop_covers_target() {
        // 400x200 source into 100x100 crop: height is the binding edge.
        assert_eq!(scale_factor((400, 200), (100, 100), true, true), 0.5);
    }

    #[test]
    fn scale_factor_fit_stays_inside_target() {
        assert_eq!(scale_factor((400, 200), (100, 100), false, true), 0.25);
    }

    #[test]
    fn scale_factor_zero_edge_is_unconstrained() {
        assert_eq!(scale_factor((420, 300), (210, 0), false, true), 0.5);
        assert_eq!(scale_factor((300, 100), (0, 50), false, true), 0.5);
    }

    #[test]
    fn scale_factor_without_upscale_never_enlarges() {
        assert_eq!(scale_factor((50, 50), (100, 100), true, false), 1.0);
        assert_eq!(scale_factor((50, 50), (100, 100), true, true), 2.0);
    }

    #[test]
    fn crop_origin_centers_by_default() {
        assert_eq!(crop_origin((200, 100), (100, 100), None), (50, 0));
    }

    #[test]
    fn crop_origin_follows_subject_point() {
        assert_eq!(crop_origin((200, 100), (100, 100), Some((30, 50))), (0, 0));
        assert_eq!(
            crop_origin((200, 100), (100, 100), Some((180, 50))),
            (100, 0)
        );
    }

    #[test]
    fn crop_origin_clamps_window_inside_image() {
        // Window as large as the image: origin pinned to zero.
        assert_eq!(crop_origin((100, 100), (100, 100), Some((95, 95))), (0, 0));
    }

    #[test]
    fn parse_subject_location_valid_and_invalid() {
        assert_eq!(parse_subject_location("10,20"), Some((10, 20)));
        assert_eq!(parse_subject_location(" 10 , 20 "), Some((10, 20)));
        assert_eq!(parse_subject_location(""), None);
        assert_eq!(parse_subject_location("10"), None);
        assert_eq!(parse_subject_location("a,b"), None);
    }

    // =========================================================================
    // ImageRenderer
    // =========================================================================

    #[test]
    fn render_writes_at_predicted_path() {
        let config = LibraryConfig::default();
        let storage = MemoryStorage::new();
        storage.seed("photos/cat.jpg", &test_jpeg(64, 64));

        let renderer = ImageRenderer::new(&config, &storage);
        let options = ThumbnailOptions::new((32, 32)).with("crop", true).with("upscale", true);
        let rendered = renderer.render("photos/cat.jpg", &options).unwrap();

        let predicted = thumbnail_storage_path(&config, "photos/cat.jpg", &options);
        assert!(storage.contains(&predicted.to_string_lossy()));
        assert_eq!(rendered.url, format!("/media/{}", predicted.display()));
        assert_eq!((rendered.width, rendered.height), (32, 32));
    }

    #[test]
    fn render_crop_produces_exact_target_size() {
        let config = LibraryConfig::default();
        let storage = MemoryStorage::new();
        storage.seed("wide.jpg", &test_jpeg(120, 40));

        let renderer = ImageRenderer::new(&config, &storage);
        let options = ThumbnailOptions::new((32, 32)).with("crop", true);
        let rendered = renderer.render("wide.jpg", &options).unwrap();
        assert_eq!((rendered.width, rendered.height), (32, 32));
    }

    #[test]
    fn render_without_upscale_keeps_small_sources() {
        let config = LibraryConfig::default();
        let storage = MemoryStorage::new();
        storage.seed("tiny.jpg", &test_jpeg(16, 16));

        let renderer = ImageRenderer::new(&config, &storage);
        let options = ThumbnailOptions::new((64, 64));
        let rendered = renderer.render("tiny.jpg", &options).unwrap();
        assert_eq!((rendered.width, rendered.height), (16, 16));
    }

    #[test]
    fn render_zero_height_scales_to_width() {
        let config = LibraryConfig::default();
        let storage = MemoryStorage::new();
        storage.seed("photo.jpg", &test_jpeg(420, 300));

        let renderer = ImageRenderer::new(&config, &storage);
        let options = ThumbnailOptions::new((210, 0)).with("upscale", true);
        let rendered = renderer.render("photo.jpg", &options).unwrap();
        assert_eq!((rendered.width, rendered.height), (210, 150));
    }

    #[test]
    fn render_undecodable_source_is_decode_error() {
        let config = LibraryConfig::default();
        let storage = MemoryStorage::new();
        storage.seed("bad.jpg", b"not an image");

        let renderer = ImageRenderer::new(&config, &storage);
        let options = ThumbnailOptions::new((32, 32));
        assert!(matches!(
            renderer.render("bad.jpg", &options),
            Err(RenderError::Decode(_))
        ));
    }

    #[test]
    fn render_missing_source_is_storage_error() {
        let config = LibraryConfig::default();
        let storage = MemoryStorage::new();
        let renderer = ImageRenderer::new(&config, &storage);
        let options = ThumbnailOptions::new((32, 32));
        assert!(matches!(
            renderer.render("gone.jpg", &options),
            Err(RenderError::Storage(_))
        ));
    }
}
