//! Control-Protokoll (TCP)
//!
//! Definiert alle Nachrichten die zwischen Client und Matchmaking-Server
//! ausgetauscht werden.
//!
//! ## Design
//! - JSON-Serialisierung via serde, Tag-Feld `type` in snake_case
//! - Signaling-Nutzdaten (`data`) sind opakes JSON und werden unveraendert
//!   an den Partner weitergereicht
//! - Eingehend (`ClientNachricht`) und ausgehend (`ServerNachricht`) sind
//!   getrennte Enums, damit keine Richtung versehentlich vertauscht wird

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vocaline_core::types::{ConnectionId, RoomId, UserId};

// ---------------------------------------------------------------------------
// Signal-Arten
// ---------------------------------------------------------------------------

/// Art einer weitergeleiteten Signaling-Nachricht
///
/// Der Relay behandelt alle Arten identisch. Die Art bestimmt nur das
/// Tag der ausgehenden Nachricht und die Audit-Kategorie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalArt {
    Offer,
    Answer,
    IceCandidate,
    ConnectionState,
    AudioState,
    ClientError,
}

impl SignalArt {
    /// Alle Arten (fuer Metrik-Labels und Tests)
    pub const ALLE: [SignalArt; 6] = [
        SignalArt::Offer,
        SignalArt::Answer,
        SignalArt::IceCandidate,
        SignalArt::ConnectionState,
        SignalArt::AudioState,
        SignalArt::ClientError,
    ];

    /// Kurzname fuer Logs und Metrik-Labels
    pub fn als_str(&self) -> &'static str {
        match self {
            SignalArt::Offer => "offer",
            SignalArt::Answer => "answer",
            SignalArt::IceCandidate => "ice_candidate",
            SignalArt::ConnectionState => "connection_state",
            SignalArt::AudioState => "audio_state",
            SignalArt::ClientError => "client_error",
        }
    }
}

impl std::fmt::Display for SignalArt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.als_str())
    }
}

// ---------------------------------------------------------------------------
// Match-Rollen
// ---------------------------------------------------------------------------

/// WebRTC-Rolle die beim Match zugewiesen wird
///
/// Genau eine Seite startet die Verhandlung, sonst verhandeln beide
/// gleichzeitig (Glare).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WebRtcRolle {
    Initiator,
    Receiver,
}

impl WebRtcRolle {
    /// Ob diese Seite den Anruf starten soll
    pub fn soll_anruf_starten(&self) -> bool {
        matches!(self, WebRtcRolle::Initiator)
    }
}

// ---------------------------------------------------------------------------
// Eingehende Nachrichten (Client -> Server)
// ---------------------------------------------------------------------------

/// Matchmaking-Beitritt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JoinAnfrage {
    /// Anzeigename (nicht eindeutig). Fehlt er, vergibt der Server `User_<id>`.
    #[serde(default)]
    pub username: Option<String>,
    /// Stabile Benutzer-ID. Fehlt sie, vergibt der Server eine UUID.
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Alle Nachrichten die ein Client senden darf
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientNachricht {
    JoinMatchmaking(JoinAnfrage),
    LeaveConversation,
    WebrtcOffer {
        #[serde(default)]
        data: Value,
    },
    WebrtcAnswer {
        #[serde(default)]
        data: Value,
    },
    WebrtcIceCandidate {
        #[serde(default)]
        data: Value,
    },
    WebrtcConnectionState {
        #[serde(default)]
        data: Value,
    },
    WebrtcAudioState {
        #[serde(default)]
        data: Value,
    },
    WebrtcError {
        #[serde(default)]
        data: Value,
    },
    /// Geraete-Diagnose vom Client, landet nur im Audit-Log
    MobileDebug {
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        data: Value,
    },
}

impl ClientNachricht {
    /// Zerlegt eine Signaling-Nachricht in Art und Nutzdaten
    ///
    /// Gibt `Err(self)` zurueck wenn es keine Signaling-Nachricht ist.
    pub fn als_signal(self) -> Result<(SignalArt, Value), Self> {
        match self {
            ClientNachricht::WebrtcOffer { data } => Ok((SignalArt::Offer, data)),
            ClientNachricht::WebrtcAnswer { data } => Ok((SignalArt::Answer, data)),
            ClientNachricht::WebrtcIceCandidate { data } => Ok((SignalArt::IceCandidate, data)),
            ClientNachricht::WebrtcConnectionState { data } => {
                Ok((SignalArt::ConnectionState, data))
            }
            ClientNachricht::WebrtcAudioState { data } => Ok((SignalArt::AudioState, data)),
            ClientNachricht::WebrtcError { data } => Ok((SignalArt::ClientError, data)),
            andere => Err(andere),
        }
    }

    /// Baut eine Signaling-Nachricht aus Art und Nutzdaten
    pub fn signal(art: SignalArt, data: Value) -> Self {
        match art {
            SignalArt::Offer => ClientNachricht::WebrtcOffer { data },
            SignalArt::Answer => ClientNachricht::WebrtcAnswer { data },
            SignalArt::IceCandidate => ClientNachricht::WebrtcIceCandidate { data },
            SignalArt::ConnectionState => ClientNachricht::WebrtcConnectionState { data },
            SignalArt::AudioState => ClientNachricht::WebrtcAudioState { data },
            SignalArt::ClientError => ClientNachricht::WebrtcError { data },
        }
    }
}

// ---------------------------------------------------------------------------
// Ausgehende Nachrichten (Server -> Client)
// ---------------------------------------------------------------------------

/// Partner-Informationen in `match_found`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartnerInfo {
    pub username: String,
    pub user_id: UserId,
}

/// Match-Benachrichtigung
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchGefunden {
    pub room_id: RoomId,
    pub partner: PartnerInfo,
    pub webrtc_role: WebRtcRolle,
    pub should_start_call: bool,
}

/// Alle Nachrichten die der Server an einen einzelnen Client sendet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerNachricht {
    /// Verbindung angenommen
    Connected { socket_id: ConnectionId },
    /// In der Warteschlange
    WaitingForMatch { status: String },
    /// Partner gefunden
    MatchFound(MatchGefunden),
    /// Partner hat die Unterhaltung verlassen
    PartnerLeft,
    /// Partner hat die Verbindung verloren
    PartnerDisconnected,
    /// Partner meldet eine abgebrochene Medienverbindung
    WebrtcConnectionFailed { reason: String },
    WebrtcOffer { data: Value },
    WebrtcAnswer { data: Value },
    WebrtcIceCandidate { data: Value },
    WebrtcConnectionState { data: Value },
    WebrtcAudioState { data: Value },
    WebrtcError { data: Value },
}

impl ServerNachricht {
    /// Erstellt eine `waiting_for_match`-Nachricht
    pub fn warten(status: impl Into<String>) -> Self {
        ServerNachricht::WaitingForMatch {
            status: status.into(),
        }
    }

    /// Erstellt eine `match_found`-Nachricht; `should_start_call` folgt der Rolle
    pub fn match_gefunden(room_id: RoomId, partner: PartnerInfo, rolle: WebRtcRolle) -> Self {
        ServerNachricht::MatchFound(MatchGefunden {
            room_id,
            partner,
            webrtc_role: rolle,
            should_start_call: rolle.soll_anruf_starten(),
        })
    }

    /// Erstellt eine weitergeleitete Signaling-Nachricht mit gleichem Tag
    pub fn signal(art: SignalArt, data: Value) -> Self {
        match art {
            SignalArt::Offer => ServerNachricht::WebrtcOffer { data },
            SignalArt::Answer => ServerNachricht::WebrtcAnswer { data },
            SignalArt::IceCandidate => ServerNachricht::WebrtcIceCandidate { data },
            SignalArt::ConnectionState => ServerNachricht::WebrtcConnectionState { data },
            SignalArt::AudioState => ServerNachricht::WebrtcAudioState { data },
            SignalArt::ClientError => ServerNachricht::WebrtcError { data },
        }
    }

    /// Gibt Art und Nutzdaten zurueck falls es ein weitergeleitetes Signal ist
    pub fn als_signal(&self) -> Option<(SignalArt, &Value)> {
        match self {
            ServerNachricht::WebrtcOffer { data } => Some((SignalArt::Offer, data)),
            ServerNachricht::WebrtcAnswer { data } => Some((SignalArt::Answer, data)),
            ServerNachricht::WebrtcIceCandidate { data } => Some((SignalArt::IceCandidate, data)),
            ServerNachricht::WebrtcConnectionState { data } => {
                Some((SignalArt::ConnectionState, data))
            }
            ServerNachricht::WebrtcAudioState { data } => Some((SignalArt::AudioState, data)),
            ServerNachricht::WebrtcError { data } => Some((SignalArt::ClientError, data)),
            _ => None,
        }
    }

    /// Kurzname fuer Logs
    pub fn typ_name(&self) -> &'static str {
        match self {
            ServerNachricht::Connected { .. } => "connected",
            ServerNachricht::WaitingForMatch { .. } => "waiting_for_match",
            ServerNachricht::MatchFound(_) => "match_found",
            ServerNachricht::PartnerLeft => "partner_left",
            ServerNachricht::PartnerDisconnected => "partner_disconnected",
            ServerNachricht::WebrtcConnectionFailed { .. } => "webrtc_connection_failed",
            ServerNachricht::WebrtcOffer { .. } => "webrtc_offer",
            ServerNachricht::WebrtcAnswer { .. } => "webrtc_answer",
            ServerNachricht::WebrtcIceCandidate { .. } => "webrtc_ice_candidate",
            ServerNachricht::WebrtcConnectionState { .. } => "webrtc_connection_state",
            ServerNachricht::WebrtcAudioState { .. } => "webrtc_audio_state",
            ServerNachricht::WebrtcError { .. } => "webrtc_error",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_ohne_felder_ist_gueltig() {
        let msg: ClientNachricht =
            serde_json::from_str(r#"{"type":"join_matchmaking"}"#).unwrap();
        assert_eq!(msg, ClientNachricht::JoinMatchmaking(JoinAnfrage::default()));
    }

    #[test]
    fn join_mit_name_und_id() {
        let msg: ClientNachricht = serde_json::from_str(
            r#"{"type":"join_matchmaking","username":"Alice","user_id":"u-1"}"#,
        )
        .unwrap();
        match msg {
            ClientNachricht::JoinMatchmaking(req) => {
                assert_eq!(req.username.as_deref(), Some("Alice"));
                assert_eq!(req.user_id, Some(UserId::from("u-1")));
            }
            andere => panic!("Unerwartet: {:?}", andere),
        }
    }

    #[test]
    fn leave_hat_keine_felder() {
        let msg: ClientNachricht =
            serde_json::from_str(r#"{"type":"leave_conversation"}"#).unwrap();
        assert_eq!(msg, ClientNachricht::LeaveConversation);
    }

    #[test]
    fn mobile_debug_mit_und_ohne_felder() {
        let msg: ClientNachricht = serde_json::from_str(
            r#"{"type":"mobile_debug","message":"ICE haengt","data":{"isMobile":true}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientNachricht::MobileDebug {
                message: Some("ICE haengt".into()),
                data: json!({ "isMobile": true }),
            }
        );
        assert!(msg.als_signal().is_err());

        let leer: ClientNachricht = serde_json::from_str(r#"{"type":"mobile_debug"}"#).unwrap();
        assert_eq!(
            leer,
            ClientNachricht::MobileDebug {
                message: None,
                data: Value::Null,
            }
        );
    }

    #[test]
    fn signal_nutzdaten_bleiben_opak() {
        let roh = json!({"type": "webrtc_ice_candidate", "data": {"candidate": {"type": "host"}, "x": [1, 2]}});
        let msg: ClientNachricht = serde_json::from_value(roh).unwrap();
        let (art, data) = msg.als_signal().unwrap();
        assert_eq!(art, SignalArt::IceCandidate);
        assert_eq!(data, json!({"candidate": {"type": "host"}, "x": [1, 2]}));
    }

    #[test]
    fn als_signal_gibt_nicht_signale_zurueck() {
        let msg = ClientNachricht::LeaveConversation;
        assert_eq!(msg.clone().als_signal(), Err(msg));
    }

    #[test]
    fn weitergeleitetes_signal_behaelt_tag() {
        for art in SignalArt::ALLE {
            let data = json!({"art": art.als_str()});
            let ein = serde_json::to_value(ClientNachricht::signal(art, data.clone())).unwrap();
            let aus = serde_json::to_value(ServerNachricht::signal(art, data)).unwrap();
            assert_eq!(ein, aus, "Tag fuer {} muss in beide Richtungen gleich sein", art);
        }
    }

    #[test]
    fn match_found_format() {
        let msg = ServerNachricht::match_gefunden(
            RoomId(uuid::Uuid::nil()),
            PartnerInfo {
                username: "Bob".into(),
                user_id: UserId::from("b"),
            },
            WebRtcRolle::Initiator,
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "match_found");
        assert_eq!(json["webrtc_role"], "initiator");
        assert_eq!(json["should_start_call"], true);
        assert_eq!(json["partner"]["username"], "Bob");
        assert_eq!(json["room_id"], "00000000-0000-0000-0000-000000000000");
    }

    #[test]
    fn receiver_startet_keinen_anruf() {
        assert!(!WebRtcRolle::Receiver.soll_anruf_starten());
    }

    #[test]
    fn partner_events_ohne_felder() {
        let json = serde_json::to_string(&ServerNachricht::PartnerDisconnected).unwrap();
        assert_eq!(json, r#"{"type":"partner_disconnected"}"#);
        assert_eq!(ServerNachricht::PartnerLeft.typ_name(), "partner_left");
    }
}
