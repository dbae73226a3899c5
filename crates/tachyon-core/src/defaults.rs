//! Centralized default constants for the tachyon client.
//!
//! All crates reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// TRANSPORT
// =============================================================================

/// Backend used when no base URL is configured.
pub const API_BASE_URL: &str = "http://localhost:8000";

/// Prefix of every tenant-scoped endpoint.
pub const API_PREFIX: &str = "/api/v1/usecases";

/// Per-attempt HTTP timeout in seconds.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// RETRY
// =============================================================================

/// Retries after the first attempt.
pub const MAX_RETRIES: u32 = 3;

/// Base backoff delay, doubled for every further retry.
pub const RETRY_DELAY_MS: u64 = 1000;

// =============================================================================
// CACHE
// =============================================================================

/// Lifetime of a cached GET response (5 minutes).
pub const CACHE_TTL_SECS: u64 = 300;

/// Most responses held in the cache at once.
pub const CACHE_CAPACITY: usize = 256;

// =============================================================================
// TENANT
// =============================================================================

/// Usecase active until the host selects another one.
pub const USECASE: &str = "usecase_001";

// =============================================================================
// POLLING
// =============================================================================

/// Interval between evaluation history polls.
pub const POLL_INTERVAL_MS: u64 = 1000;
