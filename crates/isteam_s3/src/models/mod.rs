//! Data types shared by the storage layer

pub mod types;
