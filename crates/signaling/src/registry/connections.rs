//! Verbindungsregister – Verbindung -> Sitzungszustand
//!
//! Eine Sitzung existiert genau dann, wenn die Transport-Verbindung offen ist
//! und der Client `join_matchmaking` gesendet hat.

use std::collections::HashMap;
use vocaline_core::types::{ConnectionId, RoomId, UserId};

use crate::error::{SignalingError, SignalingResult};

/// Sitzungszustand einer registrierten Verbindung
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerbindungsSitzung {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    /// Anzeigename, nicht eindeutig
    pub username: String,
    /// Aktueller Raum oder `None`
    pub raum: Option<RoomId>,
}

/// Autoritatives Register aller registrierten Verbindungen
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    sitzungen: HashMap<ConnectionId, VerbindungsSitzung>,
}

impl ConnectionRegistry {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Legt eine Sitzung ohne Raum an
    pub fn registrieren(
        &mut self,
        connection_id: ConnectionId,
        user_id: UserId,
        username: String,
    ) -> SignalingResult<&VerbindungsSitzung> {
        use std::collections::hash_map::Entry;

        match self.sitzungen.entry(connection_id) {
            Entry::Occupied(_) => Err(SignalingError::BereitsRegistriert(connection_id)),
            Entry::Vacant(slot) => Ok(slot.insert(VerbindungsSitzung {
                connection_id,
                user_id,
                username,
                raum: None,
            })),
        }
    }

    pub fn holen(&self, connection_id: &ConnectionId) -> SignalingResult<&VerbindungsSitzung> {
        self.sitzungen
            .get(connection_id)
            .ok_or(SignalingError::VerbindungNichtGefunden(*connection_id))
    }

    /// Entfernt eine Sitzung und gibt sie zurueck
    pub fn entfernen(&mut self, connection_id: &ConnectionId) -> SignalingResult<VerbindungsSitzung> {
        self.sitzungen
            .remove(connection_id)
            .ok_or(SignalingError::VerbindungNichtGefunden(*connection_id))
    }

    /// Setzt den Raum einer Sitzung und gibt den vorherigen zurueck
    pub fn raum_setzen(
        &mut self,
        connection_id: &ConnectionId,
        raum: Option<RoomId>,
    ) -> SignalingResult<Option<RoomId>> {
        let sitzung = self
            .sitzungen
            .get_mut(connection_id)
            .ok_or(SignalingError::VerbindungNichtGefunden(*connection_id))?;
        Ok(std::mem::replace(&mut sitzung.raum, raum))
    }

    pub fn enthaelt(&self, connection_id: &ConnectionId) -> bool {
        self.sitzungen.contains_key(connection_id)
    }

    pub fn anzahl(&self) -> usize {
        self.sitzungen.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VerbindungsSitzung> {
        self.sitzungen.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registrieren(reg: &mut ConnectionRegistry, name: &str) -> ConnectionId {
        let id = ConnectionId::new();
        reg.registrieren(id, UserId::zufaellig(), name.to_string())
            .unwrap();
        id
    }

    #[test]
    fn registrieren_ohne_raum() {
        let mut reg = ConnectionRegistry::neu();
        let id = registrieren(&mut reg, "Alice");

        let sitzung = reg.holen(&id).unwrap();
        assert_eq!(sitzung.username, "Alice");
        assert_eq!(sitzung.raum, None);
        assert_eq!(reg.anzahl(), 1);
    }

    #[test]
    fn doppelte_registrierung_schlaegt_fehl() {
        let mut reg = ConnectionRegistry::neu();
        let id = registrieren(&mut reg, "Alice");

        let err = reg
            .registrieren(id, UserId::from("x"), "Mallory".into())
            .unwrap_err();
        assert!(matches!(err, SignalingError::BereitsRegistriert(c) if c == id));
        // Urspruengliche Sitzung bleibt unveraendert
        assert_eq!(reg.holen(&id).unwrap().username, "Alice");
    }

    #[test]
    fn holen_unbekannt() {
        let reg = ConnectionRegistry::neu();
        assert!(reg.holen(&ConnectionId::new()).unwrap_err().ist_nicht_gefunden());
    }

    #[test]
    fn raum_setzen_liefert_vorherigen() {
        let mut reg = ConnectionRegistry::neu();
        let id = registrieren(&mut reg, "Bob");
        let raum = RoomId::new();

        assert_eq!(reg.raum_setzen(&id, Some(raum)).unwrap(), None);
        assert_eq!(reg.holen(&id).unwrap().raum, Some(raum));
        assert_eq!(reg.raum_setzen(&id, None).unwrap(), Some(raum));
        assert!(reg.raum_setzen(&ConnectionId::new(), None).is_err());
    }

    #[test]
    fn entfernen_und_erneut_entfernen() {
        let mut reg = ConnectionRegistry::neu();
        let id = registrieren(&mut reg, "Carol");

        let sitzung = reg.entfernen(&id).unwrap();
        assert_eq!(sitzung.connection_id, id);
        assert!(!reg.enthaelt(&id));
        assert!(matches!(
            reg.entfernen(&id),
            Err(SignalingError::VerbindungNichtGefunden(_))
        ));
    }
}
