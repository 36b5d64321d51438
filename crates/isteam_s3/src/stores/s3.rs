//! S3-backed object store client

use crate::config::{LifecycleConfig, StorageConfig};
use crate::error::StorageError;
use crate::stores::key_path::copy_source;
use crate::stores::object_client::{
    ListRequest, ObjectPage, ObjectStoreClient, ObjectSummary, StoredObject,
};
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLifecycleConfiguration, Delete, EncodingType, ExpirationStatus, LifecycleExpiration,
    LifecycleRule, LifecycleRuleFilter, MetadataDirective, ObjectIdentifier,
};
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, info, warn};

const LIFECYCLE_RULE_ID: &str = "isteam-expire-derived";

pub struct S3ObjectClient {
    s3_client: S3Client,
    bucket: String,
}

impl S3ObjectClient {
    /// Build a client from the default AWS provider chain, verify the bucket
    /// is reachable and install the lifecycle rule if one is configured.
    pub async fn new(config: &StorageConfig) -> Result<Self, StorageError> {
        config.validate()?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }
        if config.path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = Self::from_client(S3Client::from_conf(s3_config_builder.build()), &config.bucket);

        client
            .s3_client
            .head_bucket()
            .bucket(&client.bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::Config(format!("Failed to access S3 bucket {}: {}", config.bucket, e))
            })?;

        if let Some(lifecycle) = &config.lifecycle {
            client.apply_lifecycle(lifecycle).await?;
        }

        info!(bucket = %config.bucket, region = ?config.region, "S3 image storage initialized");
        Ok(client)
    }

    pub fn from_client(s3_client: S3Client, bucket: impl Into<String>) -> Self {
        Self {
            s3_client,
            bucket: bucket.into(),
        }
    }

    /// Install the expiry rule for derived images. Rules already on the bucket
    /// are kept; only a previous version of our own rule is replaced.
    async fn apply_lifecycle(&self, lifecycle: &LifecycleConfig) -> Result<(), StorageError> {
        let rule = LifecycleRule::builder()
            .id(LIFECYCLE_RULE_ID)
            .status(ExpirationStatus::Enabled)
            .filter(LifecycleRuleFilter::builder().prefix(&lifecycle.prefix).build())
            .expiration(
                LifecycleExpiration::builder()
                    .days(lifecycle.expiration_days)
                    .build(),
            )
            .build()
            .map_err(|e| StorageError::Config(format!("Invalid lifecycle rule: {}", e)))?;

        let existing = match self
            .s3_client
            .get_bucket_lifecycle_configuration()
            .bucket(&self.bucket)
            .send()
            .await
        {
            Ok(response) => response.rules().to_vec(),
            // No configuration yet.
            Err(e) if e.raw_response().map(|r| r.status().as_u16()) == Some(404) => Vec::new(),
            Err(e) => return Err(StorageError::backend("get_bucket_lifecycle_configuration", e)),
        };
        let kept = existing.len();

        let configuration = BucketLifecycleConfiguration::builder()
            .set_rules(Some(merge_lifecycle_rules(existing, rule)))
            .build()
            .map_err(|e| StorageError::Config(format!("Invalid lifecycle configuration: {}", e)))?;

        self.s3_client
            .put_bucket_lifecycle_configuration()
            .bucket(&self.bucket)
            .lifecycle_configuration(configuration)
            .send()
            .await
            .map_err(|e| StorageError::backend("put_bucket_lifecycle_configuration", e))?;

        info!(
            bucket = %self.bucket,
            prefix = %lifecycle.prefix,
            days = lifecycle.expiration_days,
            existing_rules = kept,
            "Lifecycle rule applied"
        );
        Ok(())
    }
}

/// Replace any rule carrying our id, keep everything else in order.
fn merge_lifecycle_rules(existing: Vec<LifecycleRule>, rule: LifecycleRule) -> Vec<LifecycleRule> {
    let mut rules: Vec<LifecycleRule> = existing
        .into_iter()
        .filter(|existing| existing.id() != Some(LIFECYCLE_RULE_ID))
        .collect();
    rules.push(rule);
    rules
}

fn to_chrono(timestamp: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())
}

#[async_trait]
impl ObjectStoreClient for S3ObjectClient {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn get_object(
        &self,
        key: &str,
        if_none_match: Option<&str>,
    ) -> Result<StoredObject, StorageError> {
        let response = self
            .s3_client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_if_none_match(if_none_match.map(str::to_string))
            .send()
            .await
            .map_err(|e| {
                let status = e.raw_response().map(|r| r.status().as_u16());
                let no_such_key = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if no_such_key || status == Some(404) {
                    StorageError::NotFound {
                        key: key.to_string(),
                    }
                } else if status == Some(304) {
                    StorageError::NotModified {
                        key: key.to_string(),
                    }
                } else {
                    StorageError::backend("get_object", e)
                }
            })?;

        let metadata = response.metadata().cloned().unwrap_or_default();
        let last_modified = response.last_modified().and_then(to_chrono);
        let content_type = response.content_type().map(str::to_string);
        let etag = response.e_tag().map(str::to_string);

        debug!(bucket = %self.bucket, key = %key, "Object fetched");
        Ok(StoredObject {
            body: response.body,
            metadata,
            last_modified,
            content_type,
            etag,
        })
    }

    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        metadata: HashMap<String, String>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let size = body.len();
        self.s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .set_metadata(Some(metadata))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::backend("put_object", e))?;

        debug!(bucket = %self.bucket, key = %key, size = size, "Object uploaded");
        Ok(())
    }

    async fn copy_object_metadata(
        &self,
        key: &str,
        metadata: HashMap<String, String>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.s3_client
            .copy_object()
            .bucket(&self.bucket)
            .key(key)
            .copy_source(copy_source(&self.bucket, key))
            .metadata_directive(MetadataDirective::Replace)
            .set_metadata(Some(metadata))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                if e.raw_response().map(|r| r.status().as_u16()) == Some(404) {
                    StorageError::NotFound {
                        key: key.to_string(),
                    }
                } else {
                    StorageError::backend("copy_object", e)
                }
            })?;

        debug!(bucket = %self.bucket, key = %key, "Object metadata replaced");
        Ok(())
    }

    async fn list_objects(&self, request: ListRequest<'_>) -> Result<ObjectPage, StorageError> {
        let response = self
            .s3_client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(request.prefix)
            .delimiter(request.delimiter)
            .encoding_type(EncodingType::Url)
            .fetch_owner(false)
            .set_continuation_token(request.continuation_token.map(str::to_string))
            .max_keys(request.max_keys)
            .send()
            .await
            .map_err(|e| StorageError::backend("list_objects", e))?;

        let objects: Vec<ObjectSummary> = response
            .contents()
            .iter()
            .filter_map(|object| {
                Some(ObjectSummary {
                    key: object.key()?.to_string(),
                    size: object.size().unwrap_or_default(),
                    last_modified: object.last_modified().and_then(to_chrono),
                    etag: object.e_tag().map(str::to_string),
                })
            })
            .collect();

        debug!(bucket = %self.bucket, prefix = %request.prefix, count = objects.len(), "Objects listed");
        Ok(ObjectPage {
            objects,
            is_truncated: response.is_truncated().unwrap_or(false),
            next_continuation_token: response.next_continuation_token().map(str::to_string),
        })
    }

    async fn delete_objects(&self, keys: &[String]) -> Result<(), StorageError> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::backend("delete_objects", e))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| StorageError::backend("delete_objects", e))?;

        let response = self
            .s3_client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| StorageError::backend("delete_objects", e))?;

        let errors = response.errors();
        if let Some(first) = errors.first() {
            let first_key = first.key().unwrap_or_default().to_string();
            let message = first.message().unwrap_or_default().to_string();
            warn!(
                bucket = %self.bucket,
                failed = errors.len(),
                key = %first_key,
                error = %message,
                "Batch delete reported failures"
            );
            return Err(StorageError::PartialDelete {
                failed: errors.len(),
                first_key,
                message,
            });
        }

        debug!(bucket = %self.bucket, count = keys.len(), "Objects deleted");
        Ok(())
    }
}
