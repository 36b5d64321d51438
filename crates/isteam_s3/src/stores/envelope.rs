//! Metadata envelope: the whole info record travels as one JSON string
//! in a single user-metadata field.

use crate::error::StorageError;
use crate::models::types::{parse_timestamp, ImageInfo, RESERVED_FIELDS};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// User-metadata field holding the serialized info record.
pub const METADATA_FIELD: &str = "isteam";

/// Reserved names left in `extra` are dropped; the typed fields win.
pub fn serialize(info: &ImageInfo) -> Result<HashMap<String, String>, StorageError> {
    let mut record = info.clone();
    for name in RESERVED_FIELDS {
        record.extra.remove(name);
    }
    let encoded = serde_json::to_string(&record)?;
    Ok(HashMap::from([(METADATA_FIELD.to_string(), encoded)]))
}

/// Rebuild the info record from an object's user metadata.
///
/// The store's own modification time, when known, replaces any
/// `lastModified` carried in the payload, and the payload value is then not
/// parsed at all. A payload that is not a JSON object, or whose
/// `lastModified` is unreadable with no store time to fall back on, is
/// reported as [`StorageError::CorruptMetadata`].
pub fn deserialize(
    key: &str,
    metadata: &HashMap<String, String>,
    store_last_modified: Option<DateTime<Utc>>,
) -> Result<ImageInfo, StorageError> {
    let corrupt = |source| StorageError::CorruptMetadata {
        key: key.to_string(),
        source,
    };

    let mut fields = match metadata.get(METADATA_FIELD) {
        Some(encoded) => serde_json::from_str::<Map<String, Value>>(encoded).map_err(corrupt)?,
        None => Map::new(),
    };

    let stored_last_modified = fields.remove("lastModified");
    let mut info = ImageInfo::default();
    for (name, value) in fields {
        info.set_field(name, value);
    }

    info.last_modified = match (store_last_modified, stored_last_modified) {
        (Some(last_modified), _) => Some(last_modified),
        (None, None | Some(Value::Null)) => None,
        (None, Some(value)) => match parse_timestamp(&value) {
            Some(last_modified) => Some(last_modified),
            None => Some(serde_json::from_value::<DateTime<Utc>>(value).map_err(corrupt)?),
        },
    };

    Ok(info)
}
