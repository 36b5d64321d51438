//! Image storage on top of an object store

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::models::types::{
    FetchOptions, FetchedImage, ImageArtifact, ListOptions, ListPage, PurgeSummary,
    DEFAULT_MAX_COUNT, MAX_PAGE_SIZE,
};
use crate::stores::envelope;
use crate::stores::image_trait::ImageStorage;
use crate::stores::key_path::{cache_directory, encode_original_path, object_key};
use crate::stores::listing::{list_directory, purge_directory};
use crate::stores::object_client::ObjectStoreClient;
use crate::stores::s3::S3ObjectClient;
use crate::utils::metrics::get_metrics;
use std::future::Future;
use std::time::Instant;
use tracing::{debug, info};

pub struct S3ImageStorage<C = S3ObjectClient> {
    client: C,
    page_size: i32,
}

impl S3ImageStorage<S3ObjectClient> {
    pub async fn connect(config: &StorageConfig) -> Result<Self, StorageError> {
        let client = S3ObjectClient::new(config).await?;
        Ok(Self::with_client(client).with_page_size(config.list_page_size))
    }
}

impl<C: ObjectStoreClient> S3ImageStorage<C> {
    pub fn with_client(client: C) -> Self {
        Self {
            client,
            page_size: DEFAULT_MAX_COUNT,
        }
    }

    /// Page size used when purging a cache directory, clamped to what a
    /// single listing can return.
    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

async fn instrumented<T, F>(operation: &'static str, fut: F) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    let started = Instant::now();
    let result = fut.await;
    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => e.outcome(),
    };
    get_metrics().record_request(operation, outcome, started.elapsed().as_secs_f64());
    result
}

#[async_trait::async_trait]
impl<C: ObjectStoreClient> ImageStorage for S3ImageStorage<C> {
    async fn fetch(
        &self,
        options: &FetchOptions,
        original_path: &str,
        steps_hash: Option<&str>,
    ) -> Result<FetchedImage, StorageError> {
        instrumented("fetch", async {
            let key = object_key(original_path, steps_hash);
            let object = self
                .client
                .get_object(&key, options.etag.as_deref())
                .await?;

            // stored fields take precedence over the request's
            let mut info = envelope::deserialize(&key, &object.metadata, object.last_modified)?;
            if info.path.is_none() {
                info.path = Some(encode_original_path(original_path));
            }
            if info.steps_hash.is_none() {
                info.steps_hash = steps_hash.map(str::to_string);
            }

            debug!(bucket = %self.client.bucket(), key = %key, "Image fetched");
            Ok::<_, StorageError>(FetchedImage {
                info,
                body: object.body,
                content_type: object.content_type,
                etag: object.etag,
            })
        })
        .await
    }

    async fn store(
        &self,
        original_path: &str,
        steps_hash: &str,
        image: &mut ImageArtifact,
    ) -> Result<(), StorageError> {
        instrumented("store", async {
            image.info.steps_hash = Some(steps_hash.to_string());

            let key = object_key(original_path, Some(steps_hash));
            let metadata = envelope::serialize(&image.info)?;
            self.client
                .put_object(
                    &key,
                    image.buffer.clone(),
                    metadata,
                    image.content_type_or_default(),
                )
                .await?;

            info!(
                bucket = %self.client.bucket(),
                key = %key,
                size = image.buffer.len(),
                "Image stored"
            );
            Ok::<_, StorageError>(())
        })
        .await
    }

    async fn touch(
        &self,
        original_path: &str,
        steps_hash: &str,
        image: &mut ImageArtifact,
    ) -> Result<(), StorageError> {
        instrumented("touch", async {
            image.info.steps_hash = Some(steps_hash.to_string());

            let key = object_key(original_path, Some(steps_hash));
            let metadata = envelope::serialize(&image.info)?;
            self.client
                .copy_object_metadata(&key, metadata, image.content_type_or_default())
                .await?;

            debug!(bucket = %self.client.bucket(), key = %key, "Image touched");
            Ok::<_, StorageError>(())
        })
        .await
    }

    async fn delete_cache(&self, original_path: &str) -> Result<PurgeSummary, StorageError> {
        instrumented("delete_cache", async {
            let directory = cache_directory(original_path);
            let summary = purge_directory(&self.client, &directory, self.page_size).await?;
            get_metrics().record_purged(summary.deleted);

            info!(
                bucket = %self.client.bucket(),
                directory = %directory,
                pages = summary.pages,
                deleted = summary.deleted,
                "Image cache purged"
            );
            Ok::<_, StorageError>(summary)
        })
        .await
    }

    async fn list(
        &self,
        original_path: &str,
        options: &ListOptions,
    ) -> Result<ListPage, StorageError> {
        instrumented("list", list_directory(&self.client, original_path, options)).await
    }
}
