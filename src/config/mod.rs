//! Application configuration

mod app_config;

pub use app_config::{
    AppConfig, CatalogConfig, GeneratorConfig, LogFormat, LoggingConfig, StreamConfig,
};
