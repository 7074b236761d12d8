//! Session-Handler – Connect, Join, Leave, Disconnect
//!
//! Leave und Disconnect loesen den Raum auf und stossen sofort Rematches an:
//! zuerst fuer den Partner, dann (nur bei Leave) fuer den Verlassenden.
//! Die Rematches laufen als Arbeitsliste in derselben Transaktion wie das
//! ausloesende Ereignis.

use serde_json::json;
use std::collections::{HashSet, VecDeque};
use tokio::sync::mpsc;
use vocaline_core::types::{ConnectionId, RoomId, UserId};
use vocaline_protocol::control::{JoinAnfrage, ServerNachricht};

use crate::error::SignalingError;
use crate::matchmaker::{self, MatchErgebnis, Suchanlass};
use crate::registry::MatchZustand;
use crate::server_state::{Ausgang, SignalingState};

/// Statustext fuer den ersten Eintritt in die Warteschlange
pub const STATUS_WARTEN: &str = "Warte auf einen Partner...";
/// Statustext nach Leave oder Disconnect des Partners
pub const STATUS_NEUE_SUCHE: &str = "Suche nach einem neuen Partner...";

// ---------------------------------------------------------------------------
// Connect
// ---------------------------------------------------------------------------

/// Neue Transport-Verbindung: Send-Queue anlegen und `connected` senden
///
/// Registriert noch keine Sitzung; das passiert erst mit `join`.
pub fn handle_connect(
    state: &SignalingState,
    connection_id: ConnectionId,
) -> mpsc::Receiver<ServerNachricht> {
    let rx = state.broadcaster().verbindung_registrieren(connection_id);
    state.ausgang.senden(
        &connection_id,
        ServerNachricht::Connected {
            socket_id: connection_id,
        },
    );
    state.ausgang.audit(
        "CONNECT",
        Some(connection_id),
        None,
        "Verbindung hergestellt",
        json!({}),
    );
    rx
}

// ---------------------------------------------------------------------------
// Join
// ---------------------------------------------------------------------------

/// Registriert die Sitzung und sucht sofort einen Partner
pub fn handle_join(state: &SignalingState, connection_id: ConnectionId, anfrage: JoinAnfrage) {
    let username = anfrage
        .username
        .unwrap_or_else(|| format!("User_{}", connection_id.kurz()));
    let user_id = anfrage.user_id.unwrap_or_else(UserId::zufaellig);

    state.transaktion(|zustand, ausgang| {
        ausgang.audit(
            "JOIN_MATCHMAKING",
            Some(connection_id),
            None,
            format!("{username} moechte einen Partner"),
            json!({ "username": username, "user_id": user_id }),
        );

        match zustand
            .verbindungen
            .registrieren(connection_id, user_id.clone(), username.clone())
        {
            Ok(_) => {}
            Err(SignalingError::BereitsRegistriert(_)) => {
                tracing::warn!(connection_id = %connection_id, "Wiederholter Join ignoriert");
                ausgang.audit(
                    "WARNING",
                    Some(connection_id),
                    None,
                    "Verbindung ist bereits registriert",
                    json!({}),
                );
                return;
            }
            Err(e) => {
                tracing::error!(connection_id = %connection_id, fehler = %e, "Registrierung fehlgeschlagen");
                return;
            }
        }

        tracing::info!(
            connection_id = %connection_id,
            username = %username,
            user_id = %user_id,
            "Benutzer registriert"
        );
        ausgang.audit(
            "USER_REGISTER",
            Some(connection_id),
            None,
            format!("{username} registriert"),
            json!({
                "total_connected": zustand.verbindungen.anzahl(),
                "waiting_count": zustand.warteschlange.anzahl(),
            }),
        );

        match matchmaker::partner_suchen(zustand, ausgang, connection_id, Suchanlass::Beitritt) {
            MatchErgebnis::KeinPartner => {
                zustand.warteschlange.einreihen(connection_id);
                ausgang.senden(&connection_id, ServerNachricht::warten(STATUS_WARTEN));
                tracing::debug!(
                    connection_id = %connection_id,
                    position = zustand.warteschlange.anzahl(),
                    "In Warteschlange eingereiht"
                );
            }
            MatchErgebnis::Gepaart { .. } => {}
            anderes => {
                tracing::error!(connection_id = %connection_id, ergebnis = ?anderes, "Unerwartetes Suchergebnis nach Join");
            }
        }
    });
}

// ---------------------------------------------------------------------------
// Leave
// ---------------------------------------------------------------------------

/// Verlaesst die aktuelle Unterhaltung; beide Seiten suchen sofort neu
pub fn handle_leave(state: &SignalingState, connection_id: ConnectionId) {
    state.transaktion(|zustand, ausgang| {
        ausgang.audit(
            "LEAVE_CONVERSATION",
            Some(connection_id),
            None,
            "Unterhaltung verlassen",
            json!({}),
        );

        let raum = match zustand.verbindungen.holen(&connection_id) {
            Ok(sitzung) => sitzung.raum,
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, fehler = %e, "Leave ohne Registrierung");
                return;
            }
        };
        let Some(raum_id) = raum else {
            tracing::debug!(connection_id = %connection_id, "Leave ohne aktiven Raum ignoriert");
            return;
        };

        let mut kaskade = Kaskade::neu();
        if let Some(partner) = raum_aufloesen(zustand, ausgang, connection_id, raum_id, Trennung::Verlassen) {
            kaskade.vormerken(partner, "PARTNER_REQUEUE", STATUS_NEUE_SUCHE);
        }
        kaskade.vormerken(connection_id, "USER_REQUEUE", STATUS_WARTEN);
        kaskade.abarbeiten(zustand, ausgang);
    });
}

// ---------------------------------------------------------------------------
// Disconnect
// ---------------------------------------------------------------------------

/// Transport-Verbindung geschlossen; der Partner sucht sofort neu
///
/// Die Send-Queue im Broadcaster entfernt der Aufrufer danach.
pub fn handle_disconnect(state: &SignalingState, connection_id: ConnectionId) {
    state.transaktion(|zustand, ausgang| {
        ausgang.audit(
            "DISCONNECT",
            Some(connection_id),
            None,
            "Verbindung getrennt",
            json!({}),
        );

        let sitzung = match zustand.verbindungen.holen(&connection_id) {
            Ok(s) => s.clone(),
            Err(_) => {
                // Verbindung ohne Join
                tracing::debug!(connection_id = %connection_id, "Disconnect ohne Registrierung");
                return;
            }
        };

        if zustand.warteschlange.entfernen(&connection_id) {
            ausgang.audit(
                "WAITING_REMOVE",
                Some(connection_id),
                None,
                format!("{} aus der Warteschlange entfernt", sitzung.username),
                json!({ "waiting_count": zustand.warteschlange.anzahl() }),
            );
        }

        let mut kaskade = Kaskade::neu();
        if let Some(raum_id) = sitzung.raum {
            if let Some(partner) =
                raum_aufloesen(zustand, ausgang, connection_id, raum_id, Trennung::Getrennt)
            {
                kaskade.vormerken(partner, "AUTO_REQUEUE", STATUS_NEUE_SUCHE);
            }
        }
        kaskade.abarbeiten(zustand, ausgang);

        if zustand.verbindungen.entfernen(&connection_id).is_ok() {
            tracing::info!(
                connection_id = %connection_id,
                username = %sitzung.username,
                "Benutzer entfernt"
            );
            ausgang.audit(
                "USER_REMOVE",
                Some(connection_id),
                None,
                format!("{} entfernt", sitzung.username),
                json!({ "total_connected": zustand.verbindungen.anzahl() }),
            );
        }
    });
}

// ---------------------------------------------------------------------------
// Raum aufloesen
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum Trennung {
    Verlassen,
    Getrennt,
}

/// Loest den Raum von `ausloeser` auf und benachrichtigt den Partner
///
/// Gibt den Partner zurueck, falls er noch registriert ist.
fn raum_aufloesen(
    zustand: &mut MatchZustand,
    ausgang: &Ausgang,
    ausloeser: ConnectionId,
    raum_id: RoomId,
    trennung: Trennung,
) -> Option<ConnectionId> {
    let _ = zustand.verbindungen.raum_setzen(&ausloeser, None);

    let raum = match zustand.raeume.entfernen(&raum_id) {
        Ok(raum) => raum,
        Err(e) => {
            tracing::error!(connection_id = %ausloeser, room_id = %raum_id, fehler = %e, "Raum der Sitzung fehlt");
            ausgang.audit("ERROR", Some(ausloeser), Some(raum_id), e.to_string(), json!({}));
            return None;
        }
    };
    tracing::info!(room_id = %raum_id, ausloeser = %ausloeser, "Raum aufgeloest");
    ausgang.audit(
        "ROOM_DELETE",
        Some(ausloeser),
        Some(raum_id),
        "Raum aufgeloest",
        json!({ "members": raum.mitglieder() }),
    );

    let partner = raum.partner_von(&ausloeser)?;
    if zustand.verbindungen.raum_setzen(&partner, None).is_err() {
        tracing::warn!(room_id = %raum_id, partner = %partner, "Partner nicht mehr registriert");
        return None;
    }

    let nachricht = match trennung {
        Trennung::Verlassen => ServerNachricht::PartnerLeft,
        Trennung::Getrennt => ServerNachricht::PartnerDisconnected,
    };
    let typ = nachricht.typ_name();
    ausgang.senden(&partner, nachricht);
    ausgang.audit(
        "PARTNER_NOTIFY",
        Some(partner),
        Some(raum_id),
        format!("Partner benachrichtigt ({typ})"),
        json!({ "from": ausloeser }),
    );

    Some(partner)
}

// ---------------------------------------------------------------------------
// Kaskade
// ---------------------------------------------------------------------------

/// Arbeitsliste fuer Sofort-Rematches innerhalb einer Transaktion
///
/// Jede Verbindung wird hoechstens einmal bearbeitet. Der Partner bekommt
/// `STATUS_NEUE_SUCHE`, wer selbst verlassen hat `STATUS_WARTEN`.
struct Kaskade {
    offen: VecDeque<Vormerkung>,
    gesehen: HashSet<ConnectionId>,
}

struct Vormerkung {
    connection_id: ConnectionId,
    event_type: &'static str,
    status: &'static str,
}

impl Kaskade {
    fn neu() -> Self {
        Self {
            offen: VecDeque::new(),
            gesehen: HashSet::new(),
        }
    }

    fn vormerken(
        &mut self,
        connection_id: ConnectionId,
        event_type: &'static str,
        status: &'static str,
    ) {
        if self.gesehen.insert(connection_id) {
            self.offen.push_back(Vormerkung {
                connection_id,
                event_type,
                status,
            });
        }
    }

    fn abarbeiten(mut self, zustand: &mut MatchZustand, ausgang: &Ausgang) {
        while let Some(Vormerkung {
            connection_id,
            event_type,
            status,
        }) = self.offen.pop_front()
        {
            let Ok(sitzung) = zustand.verbindungen.holen(&connection_id) else {
                continue;
            };
            if sitzung.raum.is_some() {
                continue;
            }
            let username = sitzung.username.clone();

            zustand.warteschlange.einreihen(connection_id);
            ausgang.senden(&connection_id, ServerNachricht::warten(status));
            ausgang.audit(
                event_type,
                Some(connection_id),
                None,
                format!("{username} erneut eingereiht"),
                json!({ "waiting_count": zustand.warteschlange.anzahl() }),
            );
            ausgang.metriken.rematches_total.inc();

            if let MatchErgebnis::Gepaart { raum, partner } =
                matchmaker::partner_suchen(zustand, ausgang, connection_id, Suchanlass::Rematch)
            {
                tracing::debug!(
                    connection_id = %connection_id,
                    partner = %partner,
                    room_id = %raum,
                    "Sofort-Rematch erfolgreich"
                );
                // Der gefundene Partner hat nun einen Raum und faellt spaeter heraus
                self.gesehen.insert(partner);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consistency;
    use std::sync::Arc;

    fn verbinden(state: &SignalingState) -> (ConnectionId, mpsc::Receiver<ServerNachricht>) {
        let id = ConnectionId::new();
        let mut rx = handle_connect(state, id);
        assert!(matches!(
            rx.try_recv(),
            Ok(ServerNachricht::Connected { socket_id }) if socket_id == id
        ));
        (id, rx)
    }

    fn beitreten(state: &SignalingState, id: ConnectionId, name: &str) {
        handle_join(
            state,
            id,
            JoinAnfrage {
                username: Some(name.into()),
                user_id: None,
            },
        );
    }

    fn ruhig(state: &Arc<SignalingState>) {
        let befunde = state.lesen(consistency::pruefen_ruhezustand);
        assert!(befunde.is_empty(), "Inkonsistenzen: {befunde:?}");
    }

    #[test]
    fn join_ohne_partner_wartet() {
        let state = SignalingState::standard().unwrap();
        let (a, mut rx) = verbinden(&state);
        beitreten(&state, a, "Alice");

        assert_eq!(
            rx.try_recv().unwrap(),
            ServerNachricht::warten(STATUS_WARTEN)
        );
        assert_eq!(state.status().waiting_users, 1);
        ruhig(&state);
    }

    #[test]
    fn join_standardwerte() {
        let state = SignalingState::standard().unwrap();
        let (a, _rx) = verbinden(&state);
        handle_join(&state, a, JoinAnfrage::default());

        let sitzung = state.lesen(|z| z.verbindungen.holen(&a).unwrap().clone());
        assert_eq!(sitzung.username, format!("User_{}", a.kurz()));
        assert!(uuid::Uuid::parse_str(sitzung.user_id.as_str()).is_ok());
    }

    #[test]
    fn zweiter_join_ist_noop() {
        let state = SignalingState::standard().unwrap();
        let (a, mut rx) = verbinden(&state);
        beitreten(&state, a, "Alice");
        let _ = rx.try_recv();

        beitreten(&state, a, "Anders");
        assert!(rx.try_recv().is_err());
        let sitzung = state.lesen(|z| z.verbindungen.holen(&a).unwrap().clone());
        assert_eq!(sitzung.username, "Alice");
        assert_eq!(state.status().waiting_users, 1);
        assert_eq!(state.audit_log().nach_typ("WARNING").len(), 1);
    }

    #[test]
    fn leave_ohne_raum_ist_noop() {
        let state = SignalingState::standard().unwrap();
        let (a, mut rx) = verbinden(&state);
        beitreten(&state, a, "Alice");
        let _ = rx.try_recv();

        handle_leave(&state, a);
        assert!(rx.try_recv().is_err());
        assert_eq!(state.status().waiting_users, 1);
        ruhig(&state);
    }

    #[test]
    fn leave_und_disconnect_unbekannt() {
        let state = SignalingState::standard().unwrap();
        let (a, _rx) = verbinden(&state);
        handle_leave(&state, a);
        handle_disconnect(&state, a);
        assert_eq!(state.status().connected_users, 0);
    }

    #[test]
    fn disconnect_waehrend_warten() {
        let state = SignalingState::standard().unwrap();
        let (a, _rx) = verbinden(&state);
        beitreten(&state, a, "Alice");

        handle_disconnect(&state, a);
        let status = state.status();
        assert_eq!(status.connected_users, 0);
        assert_eq!(status.waiting_users, 0);
        assert_eq!(state.audit_log().nach_typ("WAITING_REMOVE").len(), 1);
        assert_eq!(state.audit_log().nach_typ("USER_REMOVE").len(), 1);
    }

    #[test]
    fn leave_zu_zweit_paart_erneut() {
        let state = SignalingState::standard().unwrap();
        let (a, mut rx_a) = verbinden(&state);
        let (b, mut rx_b) = verbinden(&state);
        beitreten(&state, a, "Alice");
        beitreten(&state, b, "Bob");
        while rx_a.try_recv().is_ok() {}
        while rx_b.try_recv().is_ok() {}

        handle_leave(&state, a);

        // Partner zuerst: partner_left, neue Suche, dann Match mit Alice als Initiator
        assert_eq!(rx_b.try_recv().unwrap(), ServerNachricht::PartnerLeft);
        assert_eq!(
            rx_b.try_recv().unwrap(),
            ServerNachricht::warten(STATUS_NEUE_SUCHE)
        );
        let ServerNachricht::MatchFound(an_b) = rx_b.try_recv().unwrap() else {
            panic!("match_found erwartet");
        };
        assert!(!an_b.should_start_call);

        // Wer selbst verlassen hat, wartet mit dem normalen Statustext
        assert_eq!(
            rx_a.try_recv().unwrap(),
            ServerNachricht::warten(STATUS_WARTEN)
        );
        let ServerNachricht::MatchFound(an_a) = rx_a.try_recv().unwrap() else {
            panic!("match_found erwartet");
        };
        assert!(an_a.should_start_call);
        assert_eq!(an_a.room_id, an_b.room_id);

        assert_eq!(state.status().active_rooms, 1);
        assert_eq!(state.metriken().rematches_total.get(), 2);
        ruhig(&state);
    }
}
