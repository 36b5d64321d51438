//! Capability interface the image pipeline stores derived images through

use crate::error::StorageError;
use crate::models::types::{
    FetchOptions, FetchedImage, ImageArtifact, ListOptions, ListPage, PurgeSummary,
};

#[async_trait::async_trait]
pub trait ImageStorage: Send + Sync {
    /// Fetch a derived image, or the raw original when `steps_hash` is `None`.
    async fn fetch(
        &self,
        options: &FetchOptions,
        original_path: &str,
        steps_hash: Option<&str>,
    ) -> Result<FetchedImage, StorageError>;

    /// Store a derived image. `steps_hash` is stamped into `image.info`.
    async fn store(
        &self,
        original_path: &str,
        steps_hash: &str,
        image: &mut ImageArtifact,
    ) -> Result<(), StorageError>;

    /// Replace the metadata of a stored image without re-uploading its body.
    async fn touch(
        &self,
        original_path: &str,
        steps_hash: &str,
        image: &mut ImageArtifact,
    ) -> Result<(), StorageError>;

    /// Delete every cached variant of `original_path`.
    async fn delete_cache(&self, original_path: &str) -> Result<PurgeSummary, StorageError>;

    /// List one page of the direct children of `original_path`.
    async fn list(
        &self,
        original_path: &str,
        options: &ListOptions,
    ) -> Result<ListPage, StorageError>;
}
