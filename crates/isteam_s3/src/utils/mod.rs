//! Cross-cutting helpers

pub mod metrics;
pub mod telemetry;
