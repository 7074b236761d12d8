//! # vocaline-observability
//!
//! Observability-Crate fuer Vocaline:
//! - Audit-Log als begrenzter Ringpuffer (`/api/logs`)
//! - Prometheus-kompatible Matchmaking-Metriken (`/metrics`)
//! - Structured Logging via tracing-subscriber

pub mod audit;
pub mod logging;
pub mod metrics;

pub use audit::{AuditEintrag, AuditLog, AuditStatistik};
pub use logging::logging_initialisieren;
pub use metrics::MatchMetriken;
