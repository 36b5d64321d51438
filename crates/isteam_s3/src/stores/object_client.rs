//! Object store primitives the image storage is built on

use crate::error::StorageError;
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Object returned by a get.
#[derive(Debug)]
pub struct StoredObject {
    pub body: ByteStream,
    pub metadata: HashMap<String, String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// Listing entry as the store reports it; `key` is still URL-encoded.
#[derive(Debug, Clone)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ListRequest<'a> {
    pub prefix: &'a str,
    pub delimiter: &'a str,
    pub continuation_token: Option<&'a str>,
    pub max_keys: i32,
}

#[derive(Debug, Clone, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectSummary>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Bucket the client operates on.
    fn bucket(&self) -> &str;

    /// Fetch an object. Missing keys map to `NotFound`, a matching
    /// `if_none_match` etag to `NotModified`.
    async fn get_object(
        &self,
        key: &str,
        if_none_match: Option<&str>,
    ) -> Result<StoredObject, StorageError>;

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        metadata: HashMap<String, String>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Copy `key` onto itself, replacing its metadata and content type.
    async fn copy_object_metadata(
        &self,
        key: &str,
        metadata: HashMap<String, String>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// List with URL-encoded keys, grouped by `delimiter`.
    async fn list_objects(&self, request: ListRequest<'_>) -> Result<ObjectPage, StorageError>;

    async fn delete_objects(&self, keys: &[String]) -> Result<(), StorageError>;
}
