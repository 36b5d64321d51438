//! Storage implementations

pub mod envelope;
pub mod image_store;
pub mod image_trait;
pub mod key_path;
pub mod listing;
pub mod memory;
pub mod object_client;
pub mod s3;
