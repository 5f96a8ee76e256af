//! # LRS Common Library
//!
//! Shared code for the learning-record services including:
//! - Database initialization, migrations and settings
//! - Event types (LrsEvent enum) and the EventBus
//! - Configuration loading and root folder resolution
//! - Retry with exponential backoff for transient store failures
//! - Utility functions (timestamps, UUIDs, hashing)

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod events;
pub mod hash;
#[cfg(feature = "sqlx")]
pub mod retry;
pub mod sse;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
