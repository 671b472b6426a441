//! Telemetry metric name constants.
//!
//! Centralised metric names for mindful operations. Consumers install their
//! own `metrics` recorder; without a recorder installed, all metric calls are
//! no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `mindful_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `channel`: bridge channel: "summary" or "usefulness"
//! - `outcome`: "ok", "remote_error" or "timeout"
//! - `cache`: persisted cache key (e.g. "calmSummaryCache")
//! - `feature`: orchestrated feature (e.g. "calmSummarize", "usefulness")
//! - `tier`: fallback tier that produced the result

/// Total requests dispatched across the page bridge.
///
/// Labels: `channel`, `outcome`.
pub const BRIDGE_REQUESTS_TOTAL: &str = "mindful_bridge_requests_total";

/// Bridge round-trip duration in seconds.
///
/// Labels: `channel`.
pub const BRIDGE_DURATION_SECONDS: &str = "mindful_bridge_duration_seconds";

/// Total capability initializations attempted.
///
/// Labels: `capability`, `status` ("ok" | "error").
pub const CAPABILITY_INITS_TOTAL: &str = "mindful_capability_inits_total";

/// Total result cache hits.
///
/// Labels: `cache`.
pub const CACHE_HITS_TOTAL: &str = "mindful_cache_hits_total";

/// Total result cache misses.
///
/// Labels: `cache`.
pub const CACHE_MISSES_TOTAL: &str = "mindful_cache_misses_total";

/// Total feature results, by the fallback tier that produced them.
///
/// Labels: `feature`, `tier` ("bridge" | "background" | "saved" | "degraded").
pub const FALLBACK_RESULTS_TOTAL: &str = "mindful_fallback_results_total";

/// Total drift nudges presented.
///
/// Labels: `trigger` ("consecutive" | "dwell").
pub const NUDGES_TOTAL: &str = "mindful_nudges_total";

/// Total retry attempts (not counting the initial call).
///
/// Labels: `target` (command channel or provider name), `operation`.
pub const RETRIES_TOTAL: &str = "mindful_retries_total";
