//! EXIF extraction.
//!
//! Thin wrapper over `kamadak-exif` producing a flat tag-name → display-value
//! map. Extraction is best-effort by design: assets are routinely PNGs,
//! truncated uploads, or plain not-images, and none of that should surface as
//! an error — callers get an empty map and move on.

use std::collections::BTreeMap;
use std::io::Cursor;

use exif::Reader;
use log::debug;

/// Extract EXIF fields from raw image bytes.
///
/// Keys are the tag display names (`"DateTimeOriginal"`, `"Model"`, ...),
/// values are the human-readable display values with null bytes stripped and
/// whitespace trimmed. Bytes that carry no parseable EXIF yield an empty map.
pub fn extract_exif(bytes: &[u8]) -> BTreeMap<String, String> {
    let mut cursor = Cursor::new(bytes);
    let parsed = match Reader::new().read_from_container(&mut cursor) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("no EXIF data: {}", e);
            return BTreeMap::new();
        }
    };

    let mut fields = BTreeMap::new();
    for field in parsed.fields() {
        let value = field
            .display_value()
            .with_unit(&parsed)
            .to_string()
            .replace('\0', "")
            .trim()
            .to_string();
        if value.is_empty() {
            continue;
        }
        fields.insert(field.tag.to_string(), value);
    }
    fields
}
