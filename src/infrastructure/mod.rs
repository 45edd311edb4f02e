//! Infrastructure layer - Adapters for files, HTTP generators and observability

pub mod generator;
pub mod loader;
pub mod logging;
pub mod observability;
pub mod stream;
