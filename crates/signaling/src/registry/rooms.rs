//! Raumtabelle – Raum -> die zwei gepaarten Verbindungen

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use vocaline_core::types::{ConnectionId, RoomId};

use crate::consistency::Inkonsistenz;
use crate::error::{SignalingError, SignalingResult};

/// Paarung zweier verschiedener Verbindungen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raum {
    pub id: RoomId,
    /// Die suchende Seite (Initiator)
    pub mitglied_a: ConnectionId,
    /// Die wartende Seite (Receiver)
    pub mitglied_b: ConnectionId,
    pub erstellt_am: DateTime<Utc>,
}

impl Raum {
    /// Das jeweils andere Mitglied, `None` wenn `connection_id` kein Mitglied ist
    pub fn partner_von(&self, connection_id: &ConnectionId) -> Option<ConnectionId> {
        if *connection_id == self.mitglied_a {
            Some(self.mitglied_b)
        } else if *connection_id == self.mitglied_b {
            Some(self.mitglied_a)
        } else {
            None
        }
    }

    pub fn mitglieder(&self) -> [ConnectionId; 2] {
        [self.mitglied_a, self.mitglied_b]
    }

    pub fn enthaelt(&self, connection_id: &ConnectionId) -> bool {
        self.partner_von(connection_id).is_some()
    }
}

/// Autoritative Tabelle aller aktiven Raeume
#[derive(Debug, Default)]
pub struct RoomTable {
    raeume: HashMap<RoomId, Raum>,
}

impl RoomTable {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Legt einen Raum mit frischer ID an
    ///
    /// Ein Raum mit zweimal derselben Verbindung wird abgelehnt.
    pub fn anlegen(&mut self, a: ConnectionId, b: ConnectionId) -> SignalingResult<&Raum> {
        if a == b {
            return Err(Inkonsistenz::SelbstPaarung(a).into());
        }
        let id = RoomId::new();
        let raum = Raum {
            id,
            mitglied_a: a,
            mitglied_b: b,
            erstellt_am: Utc::now(),
        };
        Ok(self.raeume.entry(id).or_insert(raum))
    }

    pub fn holen(&self, raum_id: &RoomId) -> SignalingResult<&Raum> {
        self.raeume
            .get(raum_id)
            .ok_or(SignalingError::RaumNichtGefunden(*raum_id))
    }

    pub fn entfernen(&mut self, raum_id: &RoomId) -> SignalingResult<Raum> {
        self.raeume
            .remove(raum_id)
            .ok_or(SignalingError::RaumNichtGefunden(*raum_id))
    }

    pub fn anzahl(&self) -> usize {
        self.raeume.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Raum> {
        self.raeume.values()
    }
}
