//! image-steam S3 storage
//!
//! Persists derived images and their info records in an S3 bucket under
//! `isteam/<original path>/<steps hash>`, and purges whole cache directories
//! page by page.

// Core modules
pub mod config;
pub mod error;
pub mod models;

// Storage
pub mod stores;

// Utilities
pub mod utils;

// Re-export commonly used types
pub use config::{Config, LifecycleConfig, StorageConfig};
pub use error::StorageError;
pub use models::types::{
    FetchOptions, FetchedImage, ImageArtifact, ImageInfo, ListOptions, ListPage, ListedFile,
    PurgeSummary,
};
pub use stores::image_store::S3ImageStorage;
pub use stores::image_trait::ImageStorage;
pub use stores::memory::InMemoryObjectClient;
pub use stores::object_client::ObjectStoreClient;
pub use stores::s3::S3ObjectClient;
