//! Relay-Handler – Signaling-Nutzdaten an den Raumpartner weiterleiten
//!
//! Der Inhalt wird nicht interpretiert. Einzelne Felder werden nur fuer
//! Log und Audit herausgelesen.

use serde_json::{json, Value};
use vocaline_core::types::ConnectionId;
use vocaline_protocol::control::{ServerNachricht, SignalArt};

use crate::error::{SignalingError, SignalingResult};
use crate::server_state::SignalingState;

/// Verbindungszustaende nach denen die Medienverbindung als verloren gilt
pub const TERMINALE_ZUSTAENDE: [&str; 3] = ["failed", "disconnected", "closed"];

/// Leitet ein Signal an das andere Raummitglied weiter
///
/// Gibt den Empfaenger zurueck. Ohne aktiven Raum wird die Nachricht
/// verworfen und `KeinAktiverRaum` geliefert.
pub fn handle_signal(
    state: &SignalingState,
    connection_id: ConnectionId,
    art: SignalArt,
    data: Value,
) -> SignalingResult<ConnectionId> {
    state.transaktion(|zustand, ausgang| {
        let ergebnis = zustand
            .verbindungen
            .holen(&connection_id)
            .ok()
            .and_then(|s| s.raum.map(|raum| (s.username.clone(), raum)))
            .ok_or(SignalingError::KeinAktiverRaum(connection_id))
            .and_then(|(username, raum_id)| {
                let raum = zustand.raeume.holen(&raum_id)?;
                let partner = raum
                    .partner_von(&connection_id)
                    .ok_or(SignalingError::KeinAktiverRaum(connection_id))?;
                Ok((username, raum_id, partner))
            });

        let (username, raum_id, partner) = match ergebnis {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    art = %art,
                    fehler = %e,
                    "Signal ohne aktiven Raum verworfen"
                );
                ausgang.audit(
                    "WEBRTC_ERROR",
                    Some(connection_id),
                    None,
                    format!("{art} ohne aktiven Raum verworfen"),
                    json!({ "kind": art.als_str() }),
                );
                ausgang
                    .metriken
                    .signals_dropped_total
                    .with_label_values(&[art.als_str()])
                    .inc();
                return Err(e);
            }
        };

        let diagnose = diagnose_felder(art, &data);
        let terminal = art == SignalArt::ConnectionState && ist_terminal(&data);

        tracing::debug!(
            connection_id = %connection_id,
            partner = %partner,
            room_id = %raum_id,
            art = %art,
            "Signal weitergeleitet"
        );
        ausgang.audit(
            audit_typ(art),
            Some(connection_id),
            Some(raum_id),
            format!("{art} an {}", partner.kurz()),
            diagnose,
        );

        ausgang.senden(&partner, ServerNachricht::signal(art, data));
        ausgang
            .metriken
            .signals_relayed_total
            .with_label_values(&[art.als_str()])
            .inc();

        if terminal {
            tracing::warn!(
                connection_id = %connection_id,
                room_id = %raum_id,
                "Medienverbindung des Partners abgebrochen"
            );
            ausgang.senden(
                &partner,
                ServerNachricht::WebrtcConnectionFailed {
                    reason: format!("Audioverbindung mit {username} fehlgeschlagen"),
                },
            );
            ausgang.audit(
                "WEBRTC_FAILURE",
                Some(connection_id),
                Some(raum_id),
                "Verbindungsabbruch an Partner gemeldet",
                json!({ "partner": partner }),
            );
        }

        Ok(partner)
    })
}

fn audit_typ(art: SignalArt) -> &'static str {
    match art {
        SignalArt::Offer => "WEBRTC_OFFER",
        SignalArt::Answer => "WEBRTC_ANSWER",
        SignalArt::IceCandidate => "WEBRTC_ICE",
        SignalArt::ConnectionState => "WEBRTC_STATE",
        SignalArt::AudioState => "WEBRTC_AUDIO",
        SignalArt::ClientError => "WEBRTC_CLIENT_ERROR",
    }
}

/// True wenn `state` einen terminalen Verbindungszustand meldet
pub fn ist_terminal(data: &Value) -> bool {
    data.get("state")
        .and_then(Value::as_str)
        .map(|s| TERMINALE_ZUSTAENDE.contains(&s))
        .unwrap_or(false)
}

/// Liest die fuer die Diagnose relevanten Felder aus
fn diagnose_felder(art: SignalArt, data: &Value) -> Value {
    let feld = |pfad: &[&str]| -> Value {
        pfad.iter()
            .try_fold(data, |v, k| v.get(*k))
            .cloned()
            .unwrap_or(Value::Null)
    };
    match art {
        SignalArt::Offer | SignalArt::Answer => json!({ "sdp_type": feld(&["type"]) }),
        SignalArt::IceCandidate => json!({ "candidate_type": feld(&["candidate", "type"]) }),
        SignalArt::ConnectionState => json!({
            "state": feld(&["state"]),
            "timestamp": feld(&["timestamp"]),
        }),
        SignalArt::AudioState => json!({
            "enabled": feld(&["enabled"]),
            "type": feld(&["type"]),
        }),
        SignalArt::ClientError => json!({
            "type": feld(&["type"]),
            "message": feld(&["message"]),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::session_handler::{handle_connect, handle_join};
    use std::sync::Arc;
    use tokio::sync::mpsc;
    use vocaline_protocol::control::JoinAnfrage;

    struct Paar {
        state: Arc<SignalingState>,
        a: ConnectionId,
        b: ConnectionId,
        rx_a: mpsc::Receiver<ServerNachricht>,
        rx_b: mpsc::Receiver<ServerNachricht>,
    }

    fn paar() -> Paar {
        let state = SignalingState::standard().unwrap();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let mut rx_a = handle_connect(&state, a);
        let mut rx_b = handle_connect(&state, b);
        for (id, name) in [(a, "Alice"), (b, "Bob")] {
            handle_join(
                &state,
                id,
                JoinAnfrage {
                    username: Some(name.into()),
                    user_id: None,
                },
            );
        }
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}
        Paar {
            state,
            a,
            b,
            rx_a,
            rx_b,
        }
    }

    #[test]
    fn offer_geht_nur_an_partner() {
        let mut p = paar();
        let sdp = json!({ "type": "offer", "sdp": "v=0..." });

        let empfaenger = handle_signal(&p.state, p.b, SignalArt::Offer, sdp.clone()).unwrap();
        assert_eq!(empfaenger, p.a);
        assert_eq!(
            p.rx_a.try_recv().unwrap(),
            ServerNachricht::WebrtcOffer { data: sdp }
        );
        assert!(p.rx_b.try_recv().is_err(), "kein Echo an den Absender");

        let eintraege = p.state.audit_log().nach_typ("WEBRTC_OFFER");
        assert_eq!(eintraege.len(), 1);
        assert_eq!(eintraege[0].data["sdp_type"], "offer");
    }

    #[test]
    fn alle_arten_werden_weitergeleitet() {
        let mut p = paar();
        for art in SignalArt::ALLE {
            let data = json!({ "n": art.als_str() });
            handle_signal(&p.state, p.a, art, data.clone()).unwrap();
            let empfangen = p.rx_b.try_recv().unwrap();
            assert_eq!(empfangen.als_signal(), Some((art, &data)));
        }
        assert_eq!(
            p.state
                .metriken()
                .signals_relayed_total
                .with_label_values(&["ice_candidate"])
                .get(),
            1
        );
    }

    #[test]
    fn ohne_raum_verworfen() {
        let state = SignalingState::standard().unwrap();
        let a = ConnectionId::new();
        let mut rx = handle_connect(&state, a);
        let _ = rx.try_recv();

        let err = handle_signal(&state, a, SignalArt::Answer, json!({})).unwrap_err();
        assert!(matches!(err, SignalingError::KeinAktiverRaum(c) if c == a));
        assert!(rx.try_recv().is_err());
        assert_eq!(
            state
                .metriken()
                .signals_dropped_total
                .with_label_values(&["answer"])
                .get(),
            1
        );
    }

    #[test]
    fn terminaler_zustand_meldet_abbruch() {
        let mut p = paar();
        let data = json!({ "state": "failed", "timestamp": 1 });

        handle_signal(&p.state, p.a, SignalArt::ConnectionState, data.clone()).unwrap();

        assert_eq!(
            p.rx_b.try_recv().unwrap(),
            ServerNachricht::WebrtcConnectionState { data }
        );
        let ServerNachricht::WebrtcConnectionFailed { reason } = p.rx_b.try_recv().unwrap() else {
            panic!("webrtc_connection_failed erwartet");
        };
        assert!(reason.contains("Alice"));
        // Raum bleibt bestehen
        assert_eq!(p.state.status().active_rooms, 1);
        assert!(p.rx_a.try_recv().is_err());
    }

    #[test]
    fn nicht_terminaler_zustand() {
        let mut p = paar();
        handle_signal(
            &p.state,
            p.a,
            SignalArt::ConnectionState,
            json!({ "state": "connected" }),
        )
        .unwrap();
        assert!(p.rx_b.try_recv().is_ok());
        assert!(p.rx_b.try_recv().is_err());
    }

    #[test]
    fn terminal_erkennung() {
        for s in TERMINALE_ZUSTAENDE {
            assert!(ist_terminal(&json!({ "state": s })));
        }
        assert!(!ist_terminal(&json!({ "state": "checking" })));
        assert!(!ist_terminal(&json!({ "state": 3 })));
        assert!(!ist_terminal(&json!("failed")));
    }

    #[test]
    fn diagnose_ice_kandidat() {
        let d = diagnose_felder(
            SignalArt::IceCandidate,
            &json!({ "candidate": { "type": "srflx" } }),
        );
        assert_eq!(d["candidate_type"], "srflx");
        let leer = diagnose_felder(SignalArt::IceCandidate, &json!(null));
        assert_eq!(leer["candidate_type"], Value::Null);
    }
}
