//! Diagnose-Handler – Geraeteberichte der Clients ins Audit-Log
//!
//! Aendert keinen Matchmaking-Zustand und schickt keine Antwort.

use serde_json::{json, Value};
use vocaline_core::types::ConnectionId;

use crate::server_state::SignalingState;

/// Maximale Laenge des gespeicherten User-Agents (Zeichen)
pub const USER_AGENT_MAX: usize = 100;

/// Schreibt einen `MOBILE_DEBUG`-Eintrag fuer die Verbindung
pub fn handle_mobile_debug(
    state: &SignalingState,
    connection_id: ConnectionId,
    message: Option<String>,
    data: Value,
) {
    let message = message.unwrap_or_else(|| "Debug mobile".into());

    let mobil = data.get("isMobile").and_then(Value::as_bool).unwrap_or(false);
    let geraet = if mobil { "Mobile" } else { "Desktop" };
    let user_agent: String = data
        .get("userAgent")
        .and_then(Value::as_str)
        .unwrap_or("Unknown")
        .chars()
        .take(USER_AGENT_MAX)
        .collect();
    let verbindungsart = data
        .get("connection")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let online = data.get("online").and_then(Value::as_bool).unwrap_or(true);
    let debug_data = if data.is_null() { json!({}) } else { data };

    tracing::debug!(
        connection_id = %connection_id,
        geraet,
        verbindungsart = %verbindungsart,
        online,
        "Client-Diagnose: {message}"
    );

    state.ausgang.audit(
        "MOBILE_DEBUG",
        Some(connection_id),
        None,
        format!("{geraet}: {message}"),
        json!({
            "device_type": geraet,
            "user_agent": user_agent,
            "connection_type": verbindungsart,
            "online": online,
            "debug_data": debug_data,
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobiler_bericht_wird_auditiert() {
        let state = SignalingState::standard().unwrap();
        let id = ConnectionId::new();
        let ua = "x".repeat(250);

        handle_mobile_debug(
            &state,
            id,
            Some("Mikrofon stumm".into()),
            json!({ "isMobile": true, "userAgent": ua, "connection": "4g", "online": false }),
        );

        let eintraege = state.audit_log().nach_typ("MOBILE_DEBUG");
        assert_eq!(eintraege.len(), 1);
        let e = &eintraege[0];
        assert_eq!(e.connection_id, Some(id));
        assert_eq!(e.room_id, None);
        assert_eq!(e.message, "Mobile: Mikrofon stumm");
        assert_eq!(e.data["device_type"], "Mobile");
        assert_eq!(e.data["user_agent"].as_str().unwrap().len(), USER_AGENT_MAX);
        assert_eq!(e.data["connection_type"], "4g");
        assert_eq!(e.data["online"], false);
        assert_eq!(e.data["debug_data"]["connection"], "4g");
    }

    #[test]
    fn leerer_bericht_nutzt_standardwerte() {
        let state = SignalingState::standard().unwrap();
        let id = ConnectionId::new();
        let mut rx = crate::handlers::session_handler::handle_connect(&state, id);
        let _connected = rx.try_recv();

        handle_mobile_debug(&state, id, None, Value::Null);

        let e = &state.audit_log().nach_typ("MOBILE_DEBUG")[0];
        assert_eq!(e.message, "Desktop: Debug mobile");
        assert_eq!(e.data["user_agent"], "Unknown");
        assert_eq!(e.data["connection_type"], "unknown");
        assert_eq!(e.data["online"], true);
        assert_eq!(e.data["debug_data"], json!({}));
        // Keine Antwort und kein Zustandswechsel
        assert!(rx.try_recv().is_err());
        assert_eq!(state.status().connected_users, 0);
    }
}
