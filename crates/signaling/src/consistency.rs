//! Konsistenzpruefung der drei Register
//!
//! Rein lesend bis auf [`verwaiste_wartende_entfernen`]. Gefundene
//! Widersprueche werden protokolliert, nie als fataler Fehler behandelt.

use serde_json::json;
use thiserror::Error;
use vocaline_core::types::{ConnectionId, RoomId};

use crate::registry::MatchZustand;
use crate::server_state::Ausgang;

/// Ein einzelner Widerspruch zwischen den Registern
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Inkonsistenz {
    #[error("Verbindung {0} wartet, ist aber nicht registriert")]
    WartendOhneSitzung(ConnectionId),

    #[error("Raum {raum} enthaelt nicht registrierte Verbindung {verbindung}")]
    RaumMitgliedOhneSitzung { raum: RoomId, verbindung: ConnectionId },

    #[error("Verbindung {verbindung} wartet und ist gleichzeitig in Raum {raum}")]
    GleichzeitigImRaumUndWartend { raum: RoomId, verbindung: ConnectionId },

    #[error("Raum mit zweimal derselben Verbindung {0}")]
    SelbstPaarung(ConnectionId),

    #[error("Sitzung {verbindung} verweist auf Raum {raum}, der sie nicht enthaelt")]
    UngueltigerRaumVerweis { raum: RoomId, verbindung: ConnectionId },

    #[error("Verbindung {0} ist registriert, wartet aber nicht und ist in keinem Raum")]
    Ungebunden(ConnectionId),
}

impl Inkonsistenz {
    /// Betroffene Verbindung (fuer Audit-Eintraege)
    pub fn verbindung(&self) -> ConnectionId {
        match self {
            Self::WartendOhneSitzung(c) | Self::SelbstPaarung(c) | Self::Ungebunden(c) => *c,
            Self::RaumMitgliedOhneSitzung { verbindung, .. }
            | Self::GleichzeitigImRaumUndWartend { verbindung, .. }
            | Self::UngueltigerRaumVerweis { verbindung, .. } => *verbindung,
        }
    }

    pub fn raum(&self) -> Option<RoomId> {
        match self {
            Self::RaumMitgliedOhneSitzung { raum, .. }
            | Self::GleichzeitigImRaumUndWartend { raum, .. }
            | Self::UngueltigerRaumVerweis { raum, .. } => Some(*raum),
            _ => None,
        }
    }
}

/// Prueft die Register gegeneinander
///
/// Meldet nicht, dass eine registrierte Verbindung ohne Raum fehlt in der
/// Warteschlange, denn das ist waehrend einer laufenden Operation erlaubt.
/// Dafuer gibt es [`pruefen_ruhezustand`].
pub fn pruefen(zustand: &MatchZustand) -> Vec<Inkonsistenz> {
    let mut befunde = Vec::new();

    for id in zustand.warteschlange.iter() {
        match zustand.verbindungen.holen(id) {
            Err(_) => befunde.push(Inkonsistenz::WartendOhneSitzung(*id)),
            Ok(sitzung) => {
                if let Some(raum) = sitzung.raum {
                    befunde.push(Inkonsistenz::GleichzeitigImRaumUndWartend {
                        raum,
                        verbindung: *id,
                    });
                }
            }
        }
    }

    for raum in zustand.raeume.iter() {
        if raum.mitglied_a == raum.mitglied_b {
            befunde.push(Inkonsistenz::SelbstPaarung(raum.mitglied_a));
        }
        for mitglied in raum.mitglieder() {
            if !zustand.verbindungen.enthaelt(&mitglied) {
                befunde.push(Inkonsistenz::RaumMitgliedOhneSitzung {
                    raum: raum.id,
                    verbindung: mitglied,
                });
            } else if zustand.warteschlange.enthaelt(&mitglied) {
                // Gleicher Befund wie oben, nur wenn die Sitzung keinen Raum kennt
                let sitzung_kennt_raum = zustand
                    .verbindungen
                    .holen(&mitglied)
                    .map(|s| s.raum.is_some())
                    .unwrap_or(false);
                if !sitzung_kennt_raum {
                    befunde.push(Inkonsistenz::GleichzeitigImRaumUndWartend {
                        raum: raum.id,
                        verbindung: mitglied,
                    });
                }
            }
        }
    }

    for sitzung in zustand.verbindungen.iter() {
        if let Some(raum_id) = sitzung.raum {
            let gueltig = zustand
                .raeume
                .holen(&raum_id)
                .map(|r| r.enthaelt(&sitzung.connection_id))
                .unwrap_or(false);
            if !gueltig {
                befunde.push(Inkonsistenz::UngueltigerRaumVerweis {
                    raum: raum_id,
                    verbindung: sitzung.connection_id,
                });
            }
        }
    }

    befunde
}

/// Wie [`pruefen`], zusaetzlich muss jede ungepaarte Verbindung warten
///
/// Gilt nur zwischen zwei Ereignissen.
pub fn pruefen_ruhezustand(zustand: &MatchZustand) -> Vec<Inkonsistenz> {
    let mut befunde = pruefen(zustand);
    for sitzung in zustand.verbindungen.iter() {
        if sitzung.raum.is_none() && !zustand.warteschlange.enthaelt(&sitzung.connection_id) {
            befunde.push(Inkonsistenz::Ungebunden(sitzung.connection_id));
        }
    }
    befunde
}

/// Entfernt wartende Eintraege ohne registrierte Sitzung
pub fn verwaiste_wartende_entfernen(zustand: &mut MatchZustand) -> Vec<ConnectionId> {
    let verbindungen = &zustand.verbindungen;
    zustand
        .warteschlange
        .behalten_wenn(|id| verbindungen.enthaelt(id))
}

/// Prueft und meldet jeden Befund an Log, Audit und Metriken
pub fn pruefen_und_melden(zustand: &MatchZustand, ausgang: &Ausgang) -> Vec<Inkonsistenz> {
    let befunde = pruefen(zustand);
    for befund in &befunde {
        tracing::error!(fehler = %befund, "Inkonsistenter Zustand");
        ausgang.audit(
            "VALIDATION_ERROR",
            Some(befund.verbindung()),
            befund.raum(),
            befund.to_string(),
            json!({}),
        );
        ausgang.metriken.consistency_violations_total.inc();
    }
    befunde
}
