//! Audit-Log – Begrenzter In-Memory-Ringpuffer fuer Diagnose-Ereignisse
//!
//! Jeder Zustandsuebergang des Matchmakings wird hier mit Typ, Verbindung,
//! Raum, Klartext-Nachricht und strukturierten Details abgelegt. Der Puffer
//! behaelt nur die neuesten `kapazitaet` Eintraege; aeltere werden beim
//! Einfuegen verdraengt.
//!
//! Der Puffer ist reine Diagnose: es gibt keine Persistenz und keine
//! Garantie ueber den Verbleib einzelner Eintraege.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use vocaline_core::types::{ConnectionId, RoomId};

/// Standard-Kapazitaet des Ringpuffers
pub const STANDARD_KAPAZITAET: usize = 1000;

/// Ein einzelner Audit-Eintrag
#[derive(Debug, Clone, Serialize)]
pub struct AuditEintrag {
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub connection_id: Option<ConnectionId>,
    pub room_id: Option<RoomId>,
    pub message: String,
    pub data: Value,
}

/// Statistik ueber den aktuellen Pufferinhalt
#[derive(Debug, Clone, Serialize)]
pub struct AuditStatistik {
    pub total_logs: usize,
    pub event_counts: BTreeMap<String, usize>,
    pub oldest_log: Option<DateTime<Utc>>,
    pub newest_log: Option<DateTime<Utc>>,
}

/// Thread-sicherer, groessenbegrenzter Audit-Puffer
///
/// Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct AuditLog {
    inner: Arc<AuditLogInner>,
}

struct AuditLogInner {
    eintraege: Mutex<VecDeque<AuditEintrag>>,
    kapazitaet: usize,
}

impl AuditLog {
    /// Erstellt einen Puffer mit Standard-Kapazitaet
    pub fn neu() -> Self {
        Self::mit_kapazitaet(STANDARD_KAPAZITAET)
    }

    /// Erstellt einen Puffer mit fester Kapazitaet (mindestens 1)
    pub fn mit_kapazitaet(kapazitaet: usize) -> Self {
        let kapazitaet = kapazitaet.max(1);
        Self {
            inner: Arc::new(AuditLogInner {
                eintraege: Mutex::new(VecDeque::with_capacity(kapazitaet)),
                kapazitaet,
            }),
        }
    }

    /// Zeichnet ein Ereignis auf
    pub fn aufzeichnen(
        &self,
        event_type: &str,
        connection_id: Option<ConnectionId>,
        room_id: Option<RoomId>,
        message: impl Into<String>,
        data: Value,
    ) {
        let eintrag = AuditEintrag {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            connection_id,
            room_id,
            message: message.into(),
            data,
        };

        let mut eintraege = self.inner.eintraege.lock();
        if eintraege.len() >= self.inner.kapazitaet {
            eintraege.pop_front();
        }
        eintraege.push_back(eintrag);
    }

    /// Gibt die neuesten `limit` Eintraege in chronologischer Reihenfolge zurueck
    ///
    /// `None` oder `Some(0)` liefert den gesamten Puffer.
    pub fn auflisten(&self, limit: Option<usize>) -> Vec<AuditEintrag> {
        let eintraege = self.inner.eintraege.lock();
        let anzahl = match limit {
            Some(n) if n > 0 => n.min(eintraege.len()),
            _ => eintraege.len(),
        };
        eintraege
            .iter()
            .skip(eintraege.len() - anzahl)
            .cloned()
            .collect()
    }

    /// Alle Eintraege eines Ereignistyps
    pub fn nach_typ(&self, event_type: &str) -> Vec<AuditEintrag> {
        self.inner
            .eintraege
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Alle Eintraege einer Verbindung
    pub fn nach_verbindung(&self, connection_id: &ConnectionId) -> Vec<AuditEintrag> {
        self.inner
            .eintraege
            .lock()
            .iter()
            .filter(|e| e.connection_id.as_ref() == Some(connection_id))
            .cloned()
            .collect()
    }

    /// Leert den Puffer
    pub fn leeren(&self) {
        self.inner.eintraege.lock().clear();
    }

    /// Anzahl der Eintraege pro Ereignistyp plus Zeitspanne
    pub fn statistik(&self) -> AuditStatistik {
        let eintraege = self.inner.eintraege.lock();
        let mut event_counts = BTreeMap::new();
        for e in eintraege.iter() {
            *event_counts.entry(e.event_type.clone()).or_insert(0) += 1;
        }
        AuditStatistik {
            total_logs: eintraege.len(),
            event_counts,
            oldest_log: eintraege.front().map(|e| e.timestamp),
            newest_log: eintraege.back().map(|e| e.timestamp),
        }
    }

    /// Aktuelle Anzahl der Eintraege
    pub fn anzahl(&self) -> usize {
        self.inner.eintraege.lock().len()
    }

    /// Konfigurierte Kapazitaet
    pub fn kapazitaet(&self) -> usize {
        self.inner.kapazitaet
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
