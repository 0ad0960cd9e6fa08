//! Axum middleware settings applied to the router.
//!
//! Includes request tracing, timeout enforcement, and response compression.

use std::time::Duration;

/// Per-request timeout applied to all routes.
///
/// Covers the slowest path: a first-use key creation against a cold disk.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
