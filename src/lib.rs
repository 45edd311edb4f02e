//! Generative media pipelines
//!
//! Declarative chains of image, video and audio generation steps, with:
//! - A model registry loaded from a catalog file
//! - Static validation of chains before anything runs
//! - Sequential steps and bounded parallel groups with retries and timeouts
//! - Dry-run cost and time estimation
//! - A JSON Lines progress stream and Prometheus metrics

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use crate::config::AppConfig;
pub use domain::{ChainExecutor, ChainResult, DomainError, ModelRegistry};
