//! Configuration Module
//!
//! Configuration loading for the ingestion service.

mod settings;

pub use settings::{
    ConfigError, DEFAULT_SYMBOL, FeedSettings, IngestConfig, MockSettings, StorageSettings,
};
