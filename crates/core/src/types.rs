//! Shared type aliases used across waveclip crates.

/// Opaque entity identifier. Songs, users, and projects are all keyed by
/// UUID strings; the core never inspects their structure.
pub type DbId = String;

/// Timestamp type used in all models (UTC).
pub type Timestamp = chrono::DateTime<chrono::Utc>;
