//! Option bags and the canonical cache-key encoding.
//!
//! A thumbnail request is a target size plus a free-form bag of named
//! options. The bag is encoded into an ordered token list and ultimately a
//! filename, and that filename *is* the cache key: any caller encoding the
//! same options must land on the same storage entry. The external rendering
//! tool writes files under the same convention, so the encoding here has to
//! mirror its filenames bit-for-bit — every rule below (key ordering,
//! uppercase skipping, the `subsampling-2` token) exists to match it.
//!
//! ## Encoding rules
//!
//! Tokens start with `"{w}x{h}"` and `"q{quality}"`, then the remaining
//! options in ascending key order. ALL-UPPERCASE keys are directives for the
//! rendering tool, not content-affecting parameters, and never reach the
//! key. Falsy values are dropped. A boolean `true` emits the bare key;
//! anything else emits `key-value`.
//!
//! The option map is a `BTreeMap`, so key iteration is ascending-sorted no
//! matter what order callers inserted in.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::config::PresetConfig;

/// A single option value in a thumbnail option bag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<String>),
}

impl OptionValue {
    /// Falsy values are omitted from the token encoding entirely.
    pub fn is_falsy(&self) -> bool {
        match self {
            OptionValue::Bool(b) => !b,
            OptionValue::Int(i) => *i == 0,
            OptionValue::Str(s) => s.is_empty(),
            OptionValue::List(items) => items.is_empty(),
        }
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Int(i) => write!(f, "{}", i),
            OptionValue::Str(s) => write!(f, "{}", s),
            OptionValue::List(items) => write!(f, "{}", items.join(",")),
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(value: String) -> Self {
        OptionValue::Str(value)
    }
}

impl From<Vec<String>> for OptionValue {
    fn from(value: Vec<String>) -> Self {
        OptionValue::List(value)
    }
}

/// A full thumbnail request: target size plus the named option bag.
///
/// A zero width or height means "unconstrained on that edge".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ThumbnailOptions {
    pub size: (u32, u32),
    pub extra: BTreeMap<String, OptionValue>,
}

impl ThumbnailOptions {
    pub fn new(size: (u32, u32)) -> Self {
        Self {
            size,
            extra: BTreeMap::new(),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<OptionValue>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Build from a configured preset, injecting the asset's subject
    /// location verbatim. An empty subject location is falsy and thus never
    /// reaches the token encoding.
    pub fn from_preset(preset: &PresetConfig, subject_location: &str) -> Self {
        let mut options = Self::new((preset.size[0], preset.size[1]));
        if preset.crop {
            options.extra.insert("crop".to_string(), OptionValue::Bool(true));
        }
        if preset.upscale {
            options
                .extra
                .insert("upscale".to_string(), OptionValue::Bool(true));
        }
        options.extra.insert(
            "subject_location".to_string(),
            OptionValue::Str(subject_location.to_string()),
        );
        options
    }

    /// Whether a named option is present and truthy.
    pub fn flag(&self, key: &str) -> bool {
        self.extra.get(key).is_some_and(|v| !v.is_falsy())
    }

    /// The subject-location hint, when present and non-empty.
    pub fn subject_location(&self) -> Option<&str> {
        match self.extra.get("subject_location") {
            Some(OptionValue::Str(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

/// The extension a rendered thumbnail is stored under: the source extension
/// lower-cased, with `jpeg` normalized to `jpg` and `gif` remapped to `png`
/// (animated sources render as stills). Everything else passes through.
pub fn rendering_extension(source_name: &str) -> String {
    let ext = Path::new(source_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "jpeg" => "jpg".to_string(),
        "gif" => "png".to_string(),
        _ => ext,
    }
}

// A key with no lowercase letters is a directive. Keys without any cased
// characters (digit-only, punctuation) count too; the external tool
// classifies them the same way, and the filenames must agree.
fn is_directive_key(key: &str) -> bool {
    key == key.to_uppercase()
}

/// Encode an option bag into its canonical token list.
///
/// Order: the size token, the quality token, then remaining options in
/// ascending key order. Skipped entirely: ALL-UPPERCASE keys, falsy values,
/// and the redundant `size`/`quality` keys. `Bool(true)` emits the bare key,
/// anything else emits `key-value`.
///
/// Then, unless a `subsampling-2` token is already present, one is inserted
/// right after the `crop` token, or failing that right before the `upscale`
/// token, or not at all. The rendering tool bakes this token into its own
/// filenames for crop/upscale outputs; without it our predicted paths would
/// never hit its cache entries.
pub fn prepared_tokens(options: &ThumbnailOptions, quality: u32) -> Vec<String> {
    let mut tokens = vec![
        format!("{}x{}", options.size.0, options.size.1),
        format!("q{}", quality),
    ];

    for (key, value) in &options.extra {
        if key == "size" || key == "quality" {
            continue;
        }
        if is_directive_key(key) || value.is_falsy() {
            continue;
        }
        if *value == OptionValue::Bool(true) {
            tokens.push(key.clone());
        } else {
            tokens.push(format!("{}-{}", key, value));
        }
    }

    if !tokens.iter().any(|t| t == "subsampling-2") {
        if let Some(pos) = tokens.iter().position(|t| t == "crop") {
            tokens.insert(pos + 1, "subsampling-2".to_string());
        } else if let Some(pos) = tokens.iter().position(|t| t == "upscale") {
            tokens.insert(pos, "subsampling-2".to_string());
        }
    }

    tokens
}

/// The filename a thumbnail is stored under, relative to its directory.
///
/// Flat layouts embed the full token list:
/// `{file_name}__{tokens joined by '_'}.{rendering extension}`.
///
/// Layouts whose directory template carries a per-options segment
/// (`options_in_template`) omit the tokens — the options live in the
/// directory instead. The filename is then `{stem}.{rext}` when the
/// rendering extension matches the source's own, or `{file_name}.{rext}`
/// (both extensions visible) when it differs. Distinct option sets collide
/// on one filename in this layout; the directory segment is what keeps them
/// apart, and the encoding here must not second-guess that.
pub fn thumbnail_filename(source_name: &str, tokens: &[String], options_in_template: bool) -> String {
    let path = Path::new(source_name);
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(source_name);
    let rext = rendering_extension(source_name);

    if options_in_template {
        let source_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        if rext == source_ext {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(file_name);
            format!("{}.{}", stem, rext)
        } else {
            format!("{}.{}", file_name, rext)
        }
    } else {
        format!("{}__{}.{}", file_name, tokens.join("_"), rext)
    }
}
