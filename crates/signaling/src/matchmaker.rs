//! Matchmaker – Paarbildung aus der Warteschlange
//!
//! Wird immer innerhalb einer laufenden Transaktion aufgerufen. Der
//! Anfragende bekommt die Rolle `initiator`, der bereits Wartende `receiver`,
//! damit genau eine Seite den Anruf startet.

use serde_json::json;
use vocaline_core::types::{ConnectionId, RoomId};
use vocaline_protocol::control::{PartnerInfo, ServerNachricht, WebRtcRolle};

use crate::consistency;
use crate::registry::{MatchZustand, VerbindungsSitzung};
use crate::server_state::Ausgang;

/// Warum gerade ein Partner gesucht wird
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suchanlass {
    /// Frischer `join`; der Anfragende wartet noch nicht
    Beitritt,
    /// Nach Leave/Disconnect erneut eingereiht
    Rematch,
}

/// Ausgang einer Partnersuche
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchErgebnis {
    /// Raum gebildet
    Gepaart { raum: RoomId, partner: ConnectionId },
    /// Kein passender Kandidat; der Aufrufer entscheidet ueber das Einreihen
    KeinPartner,
    /// Anfragender ist nicht registriert
    Unbekannt,
    /// Anfragender ist bereits in einem Raum
    BereitsGepaart(RoomId),
}

/// Sucht einen Partner fuer `anfragender` und bildet gegebenenfalls einen Raum
pub fn partner_suchen(
    zustand: &mut MatchZustand,
    ausgang: &Ausgang,
    anfragender: ConnectionId,
    anlass: Suchanlass,
) -> MatchErgebnis {
    let bereinigt = consistency::verwaiste_wartende_entfernen(zustand);
    if !bereinigt.is_empty() {
        tracing::warn!(anzahl = bereinigt.len(), "Verwaiste Wartende entfernt");
        ausgang.audit(
            "CLEANUP",
            None,
            None,
            format!("{} verwaiste Wartende entfernt", bereinigt.len()),
            json!({ "removed": bereinigt }),
        );
    }
    consistency::pruefen_und_melden(zustand, ausgang);

    let sitzung = match zustand.verbindungen.holen(&anfragender) {
        Ok(s) => s.clone(),
        Err(e) => {
            tracing::error!(connection_id = %anfragender, fehler = %e, "Partnersuche fuer unbekannte Verbindung");
            ausgang.audit(
                "ERROR",
                Some(anfragender),
                None,
                "Partnersuche fuer nicht registrierte Verbindung",
                json!({}),
            );
            return MatchErgebnis::Unbekannt;
        }
    };
    if let Some(raum) = sitzung.raum {
        tracing::warn!(connection_id = %anfragender, room_id = %raum, "Partnersuche trotz aktivem Raum");
        return MatchErgebnis::BereitsGepaart(raum);
    }

    ausgang.audit(
        "MATCHMAKING",
        Some(anfragender),
        None,
        format!("Suche Partner fuer {}", sitzung.username),
        json!({
            "waiting_users_count": zustand.warteschlange.anzahl(),
            "connected_users_count": zustand.verbindungen.anzahl(),
            "cleaned_users": bereinigt.len(),
            "rematch": anlass == Suchanlass::Rematch,
        }),
    );

    let Some(partner) = kandidat_waehlen(zustand, ausgang, &sitzung) else {
        tracing::debug!(
            connection_id = %anfragender,
            wartend = zustand.warteschlange.anzahl(),
            "Kein passender Partner"
        );
        ausgang.audit(
            "NO_VALID_PARTNER",
            Some(anfragender),
            None,
            "Kein passender Partner in der Warteschlange",
            json!({ "waiting_users_count": zustand.warteschlange.anzahl() }),
        );
        return MatchErgebnis::KeinPartner;
    };

    raum_bilden(zustand, ausgang, sitzung, partner, anlass)
}

/// Erster wartender Kandidat mit anderer Verbindung und anderem Anzeigenamen
fn kandidat_waehlen(
    zustand: &MatchZustand,
    ausgang: &Ausgang,
    anfragender: &VerbindungsSitzung,
) -> Option<VerbindungsSitzung> {
    for id in zustand.warteschlange.iter() {
        if *id == anfragender.connection_id {
            continue;
        }
        let Ok(kandidat) = zustand.verbindungen.holen(id) else {
            continue;
        };
        if kandidat.raum.is_some() {
            continue;
        }
        if kandidat.username == anfragender.username {
            tracing::debug!(
                connection_id = %anfragender.connection_id,
                kandidat = %id,
                username = %anfragender.username,
                "Gleicher Anzeigename – Kandidat uebersprungen"
            );
            ausgang.audit(
                "SELF_MATCH_PREVENTED",
                Some(anfragender.connection_id),
                None,
                format!("Kandidat {} hat denselben Anzeigenamen", id.kurz()),
                json!({ "candidate": id, "username": anfragender.username }),
            );
            ausgang.metriken.self_match_prevented_total.inc();
            continue;
        }
        return Some(kandidat.clone());
    }
    None
}

fn raum_bilden(
    zustand: &mut MatchZustand,
    ausgang: &Ausgang,
    initiator: VerbindungsSitzung,
    receiver: VerbindungsSitzung,
    anlass: Suchanlass,
) -> MatchErgebnis {
    let a = initiator.connection_id;
    let b = receiver.connection_id;

    // Beim Beitritt wartet der Anfragende noch nicht
    if !zustand.warteschlange.entfernen(&a) && anlass == Suchanlass::Rematch {
        tracing::warn!(connection_id = %a, "Anfragender war nicht in der Warteschlange");
        ausgang.audit(
            "WARNING",
            Some(a),
            None,
            "Anfragender war nicht in der Warteschlange",
            json!({}),
        );
    }
    if !zustand.warteschlange.entfernen(&b) {
        tracing::warn!(connection_id = %b, "Partner war nicht in der Warteschlange");
        ausgang.audit(
            "WARNING",
            Some(b),
            None,
            "Partner war nicht in der Warteschlange",
            json!({}),
        );
    }

    let raum_id = match zustand.raeume.anlegen(a, b) {
        Ok(raum) => raum.id,
        Err(e) => {
            tracing::error!(connection_id = %a, partner = %b, fehler = %e, "Raum konnte nicht angelegt werden");
            ausgang.audit("ERROR", Some(a), None, e.to_string(), json!({ "partner": b }));
            // Beide duerfen nicht aus dem Zustand fallen
            zustand.warteschlange.einreihen(b);
            if anlass == Suchanlass::Rematch {
                zustand.warteschlange.einreihen(a);
            }
            return MatchErgebnis::KeinPartner;
        }
    };

    for id in [a, b] {
        if let Err(e) = zustand.verbindungen.raum_setzen(&id, Some(raum_id)) {
            tracing::error!(connection_id = %id, room_id = %raum_id, fehler = %e, "Raum konnte nicht gesetzt werden");
        }
    }

    ausgang.audit(
        "ROOM_CREATE",
        Some(a),
        Some(raum_id),
        format!("Raum fuer {} und {}", initiator.username, receiver.username),
        json!({ "member_a": a, "member_b": b }),
    );

    ausgang.senden(
        &a,
        ServerNachricht::match_gefunden(
            raum_id,
            PartnerInfo {
                username: receiver.username.clone(),
                user_id: receiver.user_id.clone(),
            },
            WebRtcRolle::Initiator,
        ),
    );
    ausgang.senden(
        &b,
        ServerNachricht::match_gefunden(
            raum_id,
            PartnerInfo {
                username: initiator.username.clone(),
                user_id: initiator.user_id.clone(),
            },
            WebRtcRolle::Receiver,
        ),
    );

    tracing::info!(
        room_id = %raum_id,
        initiator = %a,
        receiver = %b,
        "Match gebildet"
    );
    ausgang.audit(
        "MATCH_SUCCESS",
        Some(a),
        Some(raum_id),
        format!("{} <-> {}", initiator.username, receiver.username),
        json!({
            "initiator": a,
            "receiver": b,
            "rematch": anlass == Suchanlass::Rematch,
        }),
    );
    ausgang.metriken.matches_total.inc();

    MatchErgebnis::Gepaart {
        raum: raum_id,
        partner: b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use vocaline_core::types::UserId;

    struct Aufbau {
        zustand: MatchZustand,
        ausgang: Ausgang,
    }

    impl Aufbau {
        fn neu() -> Self {
            Self {
                zustand: MatchZustand::neu(),
                ausgang: Ausgang::fuer_tests(),
            }
        }

        fn verbinden(&mut self, name: &str) -> (ConnectionId, mpsc::Receiver<ServerNachricht>) {
            let id = ConnectionId::new();
            let rx = self.ausgang.broadcaster.verbindung_registrieren(id);
            self.zustand
                .verbindungen
                .registrieren(id, UserId::from(format!("uid-{name}")), name.into())
                .unwrap();
            (id, rx)
        }

        fn suchen(&mut self, id: ConnectionId, anlass: Suchanlass) -> MatchErgebnis {
            partner_suchen(&mut self.zustand, &self.ausgang, id, anlass)
        }
    }

    #[test]
    fn leere_warteschlange_kein_partner() {
        let mut t = Aufbau::neu();
        let (a, _rx) = t.verbinden("Alice");
        assert_eq!(t.suchen(a, Suchanlass::Beitritt), MatchErgebnis::KeinPartner);
        assert_eq!(t.zustand.raeume.anzahl(), 0);
    }

    #[test]
    fn wartender_wird_receiver() {
        let mut t = Aufbau::neu();
        let (x, mut rx_x) = t.verbinden("Xaver");
        t.zustand.warteschlange.einreihen(x);
        let (y, mut rx_y) = t.verbinden("Yvonne");

        let ergebnis = t.suchen(y, Suchanlass::Beitritt);
        let MatchErgebnis::Gepaart { raum, partner } = ergebnis else {
            panic!("Match erwartet, war {ergebnis:?}");
        };
        assert_eq!(partner, x);
        assert!(t.zustand.warteschlange.ist_leer());
        assert_eq!(t.zustand.verbindungen.holen(&x).unwrap().raum, Some(raum));
        assert_eq!(t.zustand.verbindungen.holen(&y).unwrap().raum, Some(raum));

        let ServerNachricht::MatchFound(an_y) = rx_y.try_recv().unwrap() else {
            panic!("match_found fuer y erwartet");
        };
        assert_eq!(an_y.webrtc_role, WebRtcRolle::Initiator);
        assert!(an_y.should_start_call);
        assert_eq!(an_y.partner.username, "Xaver");
        assert_eq!(an_y.partner.user_id, UserId::from("uid-Xaver"));

        let ServerNachricht::MatchFound(an_x) = rx_x.try_recv().unwrap() else {
            panic!("match_found fuer x erwartet");
        };
        assert_eq!(an_x.webrtc_role, WebRtcRolle::Receiver);
        assert!(!an_x.should_start_call);
        assert_eq!(an_x.room_id, raum);

        assert_eq!(t.ausgang.metriken.matches_total.get(), 1);
        assert_eq!(t.ausgang.audit_log.nach_typ("MATCH_SUCCESS").len(), 1);
        assert_eq!(t.ausgang.audit_log.nach_typ("ROOM_CREATE").len(), 1);
        // Beim Beitritt keine Warnung ueber den fehlenden Anfragenden
        assert!(t.ausgang.audit_log.nach_typ("WARNING").is_empty());
    }

    #[test]
    fn fifo_reihenfolge() {
        let mut t = Aufbau::neu();
        let (erster, _r1) = t.verbinden("Erster");
        let (zweiter, _r2) = t.verbinden("Zweiter");
        t.zustand.warteschlange.einreihen(erster);
        t.zustand.warteschlange.einreihen(zweiter);
        let (neu, _r3) = t.verbinden("Neu");

        let ergebnis = t.suchen(neu, Suchanlass::Beitritt);
        assert!(matches!(ergebnis, MatchErgebnis::Gepaart { partner, .. } if partner == erster));
        assert_eq!(t.zustand.warteschlange.snapshot(), vec![zweiter]);
    }

    #[test]
    fn gleicher_name_wird_uebersprungen() {
        let mut t = Aufbau::neu();
        let (alice1, _r1) = t.verbinden("Alice");
        let (bob, _r2) = t.verbinden("Bob");
        t.zustand.warteschlange.einreihen(alice1);
        t.zustand.warteschlange.einreihen(bob);
        let (alice2, _r3) = t.verbinden("Alice");

        let ergebnis = t.suchen(alice2, Suchanlass::Beitritt);
        assert!(matches!(ergebnis, MatchErgebnis::Gepaart { partner, .. } if partner == bob));
        assert_eq!(t.zustand.warteschlange.snapshot(), vec![alice1]);
        assert_eq!(t.ausgang.metriken.self_match_prevented_total.get(), 1);
        assert_eq!(
            t.ausgang.audit_log.nach_typ("SELF_MATCH_PREVENTED").len(),
            1
        );
    }

    #[test]
    fn nur_gleichnamige_wartend() {
        let mut t = Aufbau::neu();
        let (a1, _r1) = t.verbinden("Alice");
        t.zustand.warteschlange.einreihen(a1);
        let (a2, _r2) = t.verbinden("Alice");

        assert_eq!(t.suchen(a2, Suchanlass::Beitritt), MatchErgebnis::KeinPartner);
        assert_eq!(t.zustand.warteschlange.snapshot(), vec![a1]);
    }

    #[test]
    fn sich_selbst_nie_als_kandidat() {
        let mut t = Aufbau::neu();
        let (a, _r) = t.verbinden("Alice");
        t.zustand.warteschlange.einreihen(a);

        assert_eq!(t.suchen(a, Suchanlass::Rematch), MatchErgebnis::KeinPartner);
        assert!(t.zustand.warteschlange.enthaelt(&a));
    }

    #[test]
    fn unbekannter_anfragender() {
        let mut t = Aufbau::neu();
        let (b, _r) = t.verbinden("Bob");
        t.zustand.warteschlange.einreihen(b);

        assert_eq!(
            t.suchen(ConnectionId::new(), Suchanlass::Beitritt),
            MatchErgebnis::Unbekannt
        );
        assert!(t.zustand.warteschlange.enthaelt(&b));
        assert_eq!(t.ausgang.audit_log.nach_typ("ERROR").len(), 1);
    }

    #[test]
    fn verwaiste_eintraege_werden_vorher_entfernt() {
        let mut t = Aufbau::neu();
        let geist = ConnectionId::new();
        t.zustand.warteschlange.einreihen(geist);
        let (b, _r1) = t.verbinden("Bob");
        t.zustand.warteschlange.einreihen(b);
        let (c, _r2) = t.verbinden("Carol");

        let ergebnis = t.suchen(c, Suchanlass::Beitritt);
        assert!(matches!(ergebnis, MatchErgebnis::Gepaart { partner, .. } if partner == b));
        assert!(!t.zustand.warteschlange.enthaelt(&geist));
        assert_eq!(t.ausgang.audit_log.nach_typ("CLEANUP").len(), 1);
    }

    #[test]
    fn rematch_entfernt_anfragenden_aus_warteschlange() {
        let mut t = Aufbau::neu();
        let (a, _r1) = t.verbinden("Alice");
        let (b, _r2) = t.verbinden("Bob");
        t.zustand.warteschlange.einreihen(a);
        t.zustand.warteschlange.einreihen(b);

        let ergebnis = t.suchen(b, Suchanlass::Rematch);
        assert!(matches!(ergebnis, MatchErgebnis::Gepaart { partner, .. } if partner == a));
        assert!(t.zustand.warteschlange.ist_leer());
        assert!(consistency::pruefen_ruhezustand(&t.zustand).is_empty());
    }

    #[test]
    fn bereits_gepaart() {
        let mut t = Aufbau::neu();
        let (a, _r1) = t.verbinden("Alice");
        let (b, _r2) = t.verbinden("Bob");
        t.zustand.warteschlange.einreihen(a);
        let MatchErgebnis::Gepaart { raum, .. } = t.suchen(b, Suchanlass::Beitritt) else {
            panic!("Match erwartet");
        };

        assert_eq!(
            t.suchen(b, Suchanlass::Beitritt),
            MatchErgebnis::BereitsGepaart(raum)
        );
        assert_eq!(t.zustand.raeume.anzahl(), 1);
    }
}
