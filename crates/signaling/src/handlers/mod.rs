//! Handler fuer alle Client-Ereignisse
//!
//! Jeder Handler fuehrt genau eine Transaktion auf dem SignalingState aus.
//! Ausnahme ist der Diagnose-Handler, der nur ins Audit-Log schreibt.

pub mod diagnose_handler;
pub mod relay_handler;
pub mod session_handler;
