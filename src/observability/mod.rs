//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Modules and the merge engine produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters and gauges via the metrics facade)
//! ```
//!
//! # Design Decisions
//! - The library only emits; installing a subscriber or a metrics recorder
//!   is the binary's job
//! - Module names label every event

pub mod logging;
pub mod metrics;
