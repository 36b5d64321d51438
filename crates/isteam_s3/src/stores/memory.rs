//! In-memory object store
//!
//! Mirrors the S3 behaviours the image storage depends on: delimiter-grouped
//! prefix listings with URL-encoded keys, continuation tokens, etag
//! preconditions and store-side modification times.

use crate::error::StorageError;
use crate::stores::key_path::encode_listed_key;
use crate::stores::object_client::{
    ListRequest, ObjectPage, ObjectStoreClient, ObjectSummary, StoredObject,
};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct MemoryObject {
    body: Bytes,
    metadata: HashMap<String, String>,
    content_type: String,
    last_modified: DateTime<Utc>,
    etag: String,
}

/// One listing entry: either an object or a rolled-up common prefix.
enum Entry<'a> {
    Object(&'a str, &'a MemoryObject),
    CommonPrefix(String),
}

impl Entry<'_> {
    fn marker(&self) -> String {
        match self {
            Entry::Object(key, _) => key.to_string(),
            Entry::CommonPrefix(prefix) => prefix.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InMemoryObjectClient {
    bucket: String,
    objects: Arc<RwLock<BTreeMap<String, MemoryObject>>>,
}

impl InMemoryObjectClient {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    fn etag_of(body: &[u8]) -> String {
        let mut hasher = DefaultHasher::new();
        body.hash(&mut hasher);
        format!("\"{:x}\"", hasher.finish())
    }
}

#[async_trait]
impl ObjectStoreClient for InMemoryObjectClient {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_object(
        &self,
        key: &str,
        if_none_match: Option<&str>,
    ) -> Result<StoredObject, StorageError> {
        let objects = self.objects.read().await;
        let object = objects.get(key).ok_or_else(|| StorageError::NotFound {
            key: key.to_string(),
        })?;

        if if_none_match == Some(object.etag.as_str()) {
            return Err(StorageError::NotModified {
                key: key.to_string(),
            });
        }

        Ok(StoredObject {
            body: ByteStream::from(object.body.clone()),
            metadata: object.metadata.clone(),
            last_modified: Some(object.last_modified),
            content_type: Some(object.content_type.clone()),
            etag: Some(object.etag.clone()),
        })
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        metadata: HashMap<String, String>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let object = MemoryObject {
            etag: Self::etag_of(&body),
            body,
            metadata,
            content_type: content_type.to_string(),
            last_modified: Utc::now(),
        };
        self.objects.write().await.insert(key.to_string(), object);
        Ok(())
    }

    async fn copy_object_metadata(
        &self,
        key: &str,
        metadata: HashMap<String, String>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut objects = self.objects.write().await;
        let object = objects.get_mut(key).ok_or_else(|| StorageError::NotFound {
            key: key.to_string(),
        })?;
        object.metadata = metadata;
        object.content_type = content_type.to_string();
        object.last_modified = Utc::now();
        Ok(())
    }

    async fn list_objects(&self, request: ListRequest<'_>) -> Result<ObjectPage, StorageError> {
        let objects = self.objects.read().await;
        let max_keys = request.max_keys.max(0) as usize;
        let resume_after = request.continuation_token;

        let mut entries: Vec<Entry<'_>> = Vec::new();
        for (key, object) in objects.range(request.prefix.to_string()..) {
            if !key.starts_with(request.prefix) {
                break;
            }
            if let Some(marker) = resume_after {
                let inside_marker_group = marker.ends_with(request.delimiter)
                    && !request.delimiter.is_empty()
                    && key.starts_with(marker);
                if key.as_str() <= marker || inside_marker_group {
                    continue;
                }
            }

            let rest = &key[request.prefix.len()..];
            let grouped = if request.delimiter.is_empty() {
                None
            } else {
                rest.find(request.delimiter)
            };
            match grouped {
                Some(idx) => {
                    let common = format!(
                        "{}{}",
                        request.prefix,
                        &rest[..idx + request.delimiter.len()]
                    );
                    let seen = matches!(entries.last(), Some(Entry::CommonPrefix(p)) if *p == common);
                    if !seen {
                        entries.push(Entry::CommonPrefix(common));
                    }
                }
                None => entries.push(Entry::Object(key.as_str(), object)),
            }

            if entries.len() > max_keys {
                break;
            }
        }

        let is_truncated = entries.len() > max_keys;
        entries.truncate(max_keys);
        let next_continuation_token = if is_truncated {
            entries.last().map(Entry::marker)
        } else {
            None
        };

        let objects = entries
            .into_iter()
            .filter_map(|entry| match entry {
                Entry::Object(key, object) => Some(ObjectSummary {
                    key: encode_listed_key(key),
                    size: object.body.len() as i64,
                    last_modified: Some(object.last_modified),
                    etag: Some(object.etag.clone()),
                }),
                Entry::CommonPrefix(_) => None,
            })
            .collect();

        Ok(ObjectPage {
            objects,
            is_truncated,
            next_continuation_token,
        })
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<(), StorageError> {
        let mut objects = self.objects.write().await;
        for key in keys {
            objects.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded(keys: &[&str]) -> InMemoryObjectClient {
        let client = InMemoryObjectClient::new("test");
        for key in keys {
            client
                .put_object(key, Bytes::from(key.to_string()), HashMap::new(), "text/plain")
                .await
                .unwrap();
        }
        client
    }

    fn request<'a>(prefix: &'a str, token: Option<&'a str>, max_keys: i32) -> ListRequest<'a> {
        ListRequest {
            prefix,
            delimiter: "/",
            continuation_token: token,
            max_keys,
        }
    }

    #[tokio::test]
    async fn lists_only_direct_children() {
        let client = seeded(&["d/a", "d/b", "d/sub/c", "e/x"]).await;
        let page = client.list_objects(request("d/", None, 1000)).await.unwrap();
        let keys: Vec<_> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["d/a", "d/b"]);
        assert!(!page.is_truncated);
        assert!(page.next_continuation_token.is_none());
    }

    #[tokio::test]
    async fn paginates_with_continuation_tokens() {
        let client = seeded(&["d/1", "d/2", "d/3"]).await;
        let first = client.list_objects(request("d/", None, 2)).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        assert!(first.is_truncated);

        let token = first.next_continuation_token.unwrap();
        let second = client
            .list_objects(request("d/", Some(&token), 2))
            .await
            .unwrap();
        assert_eq!(second.objects.len(), 1);
        assert_eq!(second.objects[0].key, "d/3");
        assert!(!second.is_truncated);
    }

    #[tokio::test]
    async fn listed_keys_are_url_encoded() {
        let client = seeded(&["d/my cat+1.jpg"]).await;
        let page = client.list_objects(request("d/", None, 10)).await.unwrap();
        assert_eq!(page.objects[0].key, "d/my+cat%2B1.jpg");
    }

    #[tokio::test]
    async fn matching_etag_is_not_modified() {
        let client = seeded(&["k"]).await;
        let etag = client.get_object("k", None).await.unwrap().etag.unwrap();
        let err = client.get_object("k", Some(&etag)).await.unwrap_err();
        assert!(err.is_not_modified());
        assert!(client.get_object("k", Some("\"other\"")).await.is_ok());
    }

    #[tokio::test]
    async fn copy_of_missing_key_is_not_found() {
        let client = InMemoryObjectClient::new("test");
        let err = client
            .copy_object_metadata("nope", HashMap::new(), "image/png")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
