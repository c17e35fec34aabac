//! Common types and utilities shared across Parley crates.
//!
//! This crate defines the shared error type and observability helpers used
//! throughout the Parley workspace. It stays dependency-minimal so that every
//! crate can depend on it.
//!
//! # Overview
//!
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`ParleyError`] and [`Result`]: Shared error handling for remote services
//!
//! # Examples
//!
//! ```rust
//! use parley_common::ParleyError;
//!
//! let err = ParleyError::Unavailable("502 Bad Gateway".into());
//! assert!(err.is_transient());
//! assert!(!ParleyError::Config("missing key".into()).is_transient());
//! ```

pub mod observability;

/// Error types used across the Parley system.
#[derive(thiserror::Error, Debug)]
pub enum ParleyError {
    /// The remote service rejected or failed the request.
    #[error("Service error: {0}")]
    Service(String),

    /// The remote service could not be reached or asked us to back off
    /// (network failure, 429, 5xx). Safe to retry.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// A response could not be decoded into the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation exceeded the configured timeout.
    #[error("Timeout occurred")]
    Timeout,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ParleyError {
    /// Whether the failure is worth retrying with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, ParleyError::Unavailable(_) | ParleyError::Timeout)
    }
}

/// Convenient alias for results that use [`ParleyError`].
pub type Result<T> = std::result::Result<T, ParleyError>;
