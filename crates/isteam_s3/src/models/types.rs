use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default page size for directory listings.
pub const DEFAULT_MAX_COUNT: i32 = 1000;

/// Largest page an S3 listing returns.
pub const MAX_PAGE_SIZE: i32 = 1000;

/// Envelope names backed by typed fields; never stored in `extra`.
pub const RESERVED_FIELDS: [&str; 3] = ["path", "stepsHash", "lastModified"];

/// Content type used when the host does not know the image format.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Info record carried alongside every stored image.
///
/// Persisted as a single JSON string in the object's user metadata. Unknown
/// fields written by the host survive the round trip through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Percent-encoded original path, set on fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "stepsHash", default, skip_serializing_if = "Option::is_none")]
    pub steps_hash: Option<String>,
    #[serde(rename = "lastModified", default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageInfo {
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(name.into(), value.into());
        self
    }

    /// Set a field by its envelope name. Reserved names land in the typed
    /// fields; values of the wrong shape clear them.
    pub fn set_field(&mut self, name: String, value: Value) {
        match name.as_str() {
            "path" => self.path = value.as_str().map(str::to_string),
            "stepsHash" => self.steps_hash = value.as_str().map(str::to_string),
            "lastModified" => self.last_modified = parse_timestamp(&value),
            _ => {
                self.extra.insert(name, value);
            }
        }
    }
}

/// Accepts RFC 3339 strings and epoch milliseconds.
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Image handed over by the host on store/touch.
#[derive(Debug, Clone, Default)]
pub struct ImageArtifact {
    pub buffer: Bytes,
    pub info: ImageInfo,
    pub content_type: Option<String>,
}

impl ImageArtifact {
    pub fn new(buffer: impl Into<Bytes>, info: ImageInfo) -> Self {
        Self {
            buffer: buffer.into(),
            info,
            content_type: None,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub(crate) fn content_type_or_default(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Skip the body when the stored object still carries this etag.
    pub etag: Option<String>,
}

/// Result of a successful fetch. The body is streamed, not buffered.
#[derive(Debug)]
pub struct FetchedImage {
    pub info: ImageInfo,
    pub body: ByteStream,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListOptions {
    pub resume_cursor: Option<String>,
    pub max_count: i32,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            resume_cursor: None,
            max_count: DEFAULT_MAX_COUNT,
        }
    }
}

/// One object returned by a directory listing, key already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct ListedFile {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

/// A page of a directory listing. No cursor means this was the last page.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub files: Vec<ListedFile>,
    pub resume_cursor: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub pages: usize,
    pub deleted: usize,
}
