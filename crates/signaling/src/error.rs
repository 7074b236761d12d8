//! Fehlertypen fuer den Signaling-Service
//!
//! Kein Fehler hier ist fatal: Handler wandeln jeden Fehler in eine
//! Log-Zeile plus Audit-Eintrag um und machen weiter.

use thiserror::Error;
use vocaline_core::types::{ConnectionId, RoomId};

use crate::consistency::Inkonsistenz;

/// Fehlertyp fuer den Signaling-Service
#[derive(Debug, Error)]
pub enum SignalingError {
    /// Verbindung ist nicht im Register
    #[error("Verbindung nicht gefunden: {0}")]
    VerbindungNichtGefunden(ConnectionId),

    /// Raum ist nicht in der Raumtabelle
    #[error("Raum nicht gefunden: {0}")]
    RaumNichtGefunden(RoomId),

    /// Verbindung ist bereits registriert
    #[error("Verbindung bereits registriert: {0}")]
    BereitsRegistriert(ConnectionId),

    /// Signal ohne aktive Paarung
    #[error("Kein aktiver Raum fuer Verbindung {0}")]
    KeinAktiverRaum(ConnectionId),

    /// Register widersprechen sich
    #[error("Inkonsistenter Zustand: {0}")]
    InkonsistenterZustand(#[from] Inkonsistenz),

    /// Warteschlange ist leer
    #[error("Warteschlange ist leer")]
    WarteschlangeLeer,

    /// Interner Fehler
    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl SignalingError {
    /// Erstellt einen internen Fehler
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// True fuer Fehler die ein erwartetes Rennen mit einem Disconnect anzeigen
    pub fn ist_nicht_gefunden(&self) -> bool {
        matches!(
            self,
            Self::VerbindungNichtGefunden(_) | Self::RaumNichtGefunden(_)
        )
    }
}

/// Result-Typ fuer den Signaling-Service
pub type SignalingResult<T> = Result<T, SignalingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nicht_gefunden_erkennung() {
        assert!(SignalingError::VerbindungNichtGefunden(ConnectionId::new()).ist_nicht_gefunden());
        assert!(SignalingError::RaumNichtGefunden(RoomId::new()).ist_nicht_gefunden());
        assert!(!SignalingError::WarteschlangeLeer.ist_nicht_gefunden());
    }

    #[test]
    fn inkonsistenz_wird_konvertiert() {
        let conn = ConnectionId::new();
        let e: SignalingError = Inkonsistenz::WartendOhneSitzung(conn).into();
        assert!(e.to_string().starts_with("Inkonsistenter Zustand"));
        assert!(e.to_string().contains(&conn.to_string()));
    }
}
