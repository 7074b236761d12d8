//! Warteschlange – FIFO nach Ankunft, ohne Duplikate

use std::collections::{HashSet, VecDeque};
use vocaline_core::types::ConnectionId;

use crate::error::{SignalingError, SignalingResult};

/// Geordnete Menge wartender Verbindungen
///
/// `mitglieder` spiegelt `reihenfolge` fuer O(1)-`enthaelt`.
#[derive(Debug, Default)]
pub struct WaitingQueue {
    reihenfolge: VecDeque<ConnectionId>,
    mitglieder: HashSet<ConnectionId>,
}

impl WaitingQueue {
    pub fn neu() -> Self {
        Self::default()
    }

    /// Haengt eine Verbindung an, falls sie noch nicht wartet
    ///
    /// Gibt `false` zurueck wenn sie bereits enthalten war (kein Fehler).
    pub fn einreihen(&mut self, connection_id: ConnectionId) -> bool {
        if !self.mitglieder.insert(connection_id) {
            return false;
        }
        self.reihenfolge.push_back(connection_id);
        true
    }

    /// Entnimmt die am laengsten wartende Verbindung
    pub fn erstes_entnehmen(&mut self) -> SignalingResult<ConnectionId> {
        let erstes = self
            .reihenfolge
            .pop_front()
            .ok_or(SignalingError::WarteschlangeLeer)?;
        self.mitglieder.remove(&erstes);
        Ok(erstes)
    }

    /// Entfernt eine Verbindung; `false` wenn sie nicht wartete
    pub fn entfernen(&mut self, connection_id: &ConnectionId) -> bool {
        if !self.mitglieder.remove(connection_id) {
            return false;
        }
        self.reihenfolge.retain(|id| id != connection_id);
        true
    }

    /// Behaelt nur Eintraege fuer die `behalten` true liefert
    ///
    /// Gibt die entfernten Verbindungen in Warteschlangen-Reihenfolge zurueck.
    pub fn behalten_wenn<F>(&mut self, mut behalten: F) -> Vec<ConnectionId>
    where
        F: FnMut(&ConnectionId) -> bool,
    {
        let mut entfernt = Vec::new();
        self.reihenfolge.retain(|id| {
            if behalten(id) {
                true
            } else {
                entfernt.push(*id);
                false
            }
        });
        for id in &entfernt {
            self.mitglieder.remove(id);
        }
        entfernt
    }

    pub fn enthaelt(&self, connection_id: &ConnectionId) -> bool {
        self.mitglieder.contains(connection_id)
    }

    /// Aktuelle Reihenfolge (Diagnose)
    pub fn snapshot(&self) -> Vec<ConnectionId> {
        self.reihenfolge.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConnectionId> {
        self.reihenfolge.iter()
    }

    pub fn anzahl(&self) -> usize {
        self.reihenfolge.len()
    }

    pub fn ist_leer(&self) -> bool {
        self.reihenfolge.is_empty()
    }
}
