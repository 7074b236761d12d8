//! Fehlertypen fuer Vocaline
//!
//! Zentraler Fehler-Enum fuer die Randbereiche (Konfiguration, Listener).
//! Der Matchmaking-Kern definiert eigene Fehler im Signaling-Crate.

use thiserror::Error;

/// Globaler Result-Alias fuer Vocaline
pub type Result<T> = std::result::Result<T, VocalineError>;

/// Fehler ausserhalb des Matchmaking-Kerns
#[derive(Debug, Error)]
pub enum VocalineError {
    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Netzwerk ---
    #[error("Adresse {adresse} kann nicht gebunden werden: {quelle}")]
    Binden {
        adresse: String,
        #[source]
        quelle: std::io::Error,
    },
}

impl VocalineError {
    /// Erstellt einen Bind-Fehler fuer eine Listener-Adresse
    pub fn binden(adresse: impl std::fmt::Display, quelle: std::io::Error) -> Self {
        Self::Binden {
            adresse: adresse.to_string(),
            quelle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn fehler_anzeige() {
        let e = VocalineError::Konfiguration("Port fehlt".into());
        assert_eq!(e.to_string(), "Konfigurationsfehler: Port fehlt");
    }

    #[test]
    fn bind_fehler_behaelt_quelle() {
        let quelle = std::io::Error::new(std::io::ErrorKind::AddrInUse, "belegt");
        let e = VocalineError::binden("127.0.0.1:5000", quelle);
        assert!(e.to_string().contains("127.0.0.1:5000"));
        assert!(e.source().is_some());
    }
}
