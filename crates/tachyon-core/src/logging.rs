//! Structured logging field names for the tachyon client.
//!
//! All crates use these constants so log aggregation can query the same
//! field across the client, the poller and the CLI.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Request failed for good, surfaced to the host |
//! | WARN  | Retry scheduled, session teardown, status regression ignored |
//! | INFO  | Client construction, usecase switch, poller start/stop |
//! | DEBUG | Requests, responses, cache hits and misses |
//! | TRACE | Per-row detail |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID of one logical operation (shared by all its retries).
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Active tenant scope.
pub const USECASE: &str = "usecase";

/// Logical operation name.
/// Examples: "get_datasets", "create_golden", "submit_evaluation"
pub const OPERATION: &str = "op";

// ─── Request fields ────────────────────────────────────────────────────────

/// HTTP method.
pub const METHOD: &str = "method";

/// Request path below the base URL.
pub const PATH: &str = "path";

/// HTTP status code (0 when no response was received).
pub const STATUS: &str = "status";

/// 1-based attempt number.
pub const ATTEMPT: &str = "attempt";

/// Backoff delay before the next attempt, in milliseconds.
pub const DELAY_MS: &str = "delay_ms";

// ─── Cache fields ──────────────────────────────────────────────────────────

/// Cache outcome ("hit", "miss", "expired", "cleared").
pub const CACHE: &str = "cache";

/// Number of entries held by the cache.
pub const CACHE_ENTRIES: &str = "cache_entries";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Dataset identifier.
pub const DATASET_ID: &str = "dataset_id";

/// Evaluation run identifier.
pub const EVALUATION_ID: &str = "evaluation_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of records returned.
pub const RESULT_COUNT: &str = "result_count";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
