//! Gemeinsame Identifikationstypen fuer Vocaline
//!
//! Alle IDs verwenden das Newtype-Pattern um Verwechslungen zwischen
//! Verbindungs-, Raum- und Benutzer-IDs zur Compilezeit auszuschliessen.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige ID einer Transport-Verbindung
///
/// Stabil fuer die Lebensdauer der Verbindung, wird erst nach vollstaendigem
/// Abbau wieder frei.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Erstellt eine neue zufaellige ConnectionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }

    /// Kurzform (erste 8 Zeichen) fuer generierte Anzeigenamen
    pub fn kurz(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Eindeutige Raum-ID (Paarung zweier Verbindungen)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub Uuid);

impl RoomId {
    /// Erstellt eine neue zufaellige RoomId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Benutzer-ID wie vom Client geliefert
///
/// Opak und ueber Reconnects stabil. Darf sich zwischen Verbindungen
/// wiederholen und ist deshalb kein Primaerschluessel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Erstellt eine zufaellige UserId (fuer Clients ohne eigene ID)
    pub fn zufaellig() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_eindeutig() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b, "Zwei neue ConnectionIds muessen verschieden sein");
    }

    #[test]
    fn connection_id_kurzform_hat_acht_zeichen() {
        let id = ConnectionId::new();
        assert_eq!(id.kurz().len(), 8);
        assert!(id.to_string().replace('-', "").starts_with(&id.kurz()));
    }

    #[test]
    fn room_id_eindeutig() {
        assert_ne!(RoomId::new(), RoomId::new());
    }

    #[test]
    fn ids_serialisieren_transparent() {
        let rid = RoomId(Uuid::nil());
        let json = serde_json::to_string(&rid).unwrap();
        assert_eq!(json, "\"00000000-0000-0000-0000-000000000000\"");

        let uid = UserId::from("abc-123");
        assert_eq!(serde_json::to_string(&uid).unwrap(), "\"abc-123\"");
        let zurueck: UserId = serde_json::from_str("\"abc-123\"").unwrap();
        assert_eq!(zurueck, uid);
    }
}
