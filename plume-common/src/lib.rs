//! Common types shared across the Plume crates.
//!
//! This crate defines the shared error taxonomy and the observability
//! helpers used by every binary and integration test in the workspace. It is
//! intentionally lightweight so that all crates can depend on it without
//! introducing heavy transitive costs.
//!
//! # Overview
//!
//! - [`PlumeError`] and [`Result`]: shared error handling
//! - [`observability`]: centralised tracing/logging initialisation
use uuid::Uuid;

pub mod observability;

/// Error types used across the Plume pipeline.
///
/// The variants follow the failure taxonomy of the ingestion pipeline:
/// provider (upstream) failures, storage failures, configuration problems,
/// and trigger-gate rejections. Per-creator fetch failures are recorded in
/// run reports rather than propagated, so they never surface here.
#[derive(thiserror::Error, Debug)]
pub enum PlumeError {
    /// An upstream provider call failed (transport, auth, or decode).
    #[error("provider error: {0}")]
    Provider(String),

    /// The storage layer reported an error during a read, upsert, or sweep.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),

    /// Configuration was incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A referenced creator could not be located.
    #[error("creator not found: {0}")]
    CreatorNotFound(Uuid),

    /// The external trigger presented a missing or invalid shared secret.
    #[error("trigger rejected: {0}")]
    TriggerRejected(&'static str),
}

/// Convenient alias for results that use [`PlumeError`].
pub type Result<T> = std::result::Result<T, PlumeError>;
