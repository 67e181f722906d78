//! Structured logging field name constants for nexograph.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), job completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (entities, edges) |

/// Subsystem originating the log event.
/// Values: "api", "store", "jobs", "graph"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "worker", "invoker", "builder", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "submit", "claim_next", "build", "invoke"
pub const OPERATION: &str = "op";

/// Client-facing job UID being operated on.
pub const JOB_UID: &str = "job_uid";

/// Job kind tag.
pub const JOB_KIND: &str = "job_kind";

/// Job fingerprint (dedup key).
pub const FINGERPRINT: &str = "fingerprint";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of entities/rows processed.
pub const RESULT_COUNT: &str = "result_count";

/// Entity store collection being read.
pub const COLLECTION: &str = "collection";

/// External executable being invoked.
pub const TOOL: &str = "tool";
