//! Gemeinsamer Zustand fuer den Signaling-Service
//!
//! Die drei Register liegen zusammen hinter genau einem Mutex. Jedes Ereignis
//! (join, leave, disconnect, Signal) laeuft vollstaendig in einer
//! [`SignalingState::transaktion`], inklusive aller ausgeloesten Rematches.
//! Innerhalb der Transaktion wird nie auf etwas gewartet: Zustellung und
//! Audit sind nicht-blockierend.

use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use vocaline_core::types::{ConnectionId, RoomId};
use vocaline_observability::{AuditLog, MatchMetriken};
use vocaline_protocol::control::ServerNachricht;
use vocaline_protocol::wire::DEFAULT_MAX_FRAME_SIZE;

use crate::broadcast::{EventBroadcaster, SEND_QUEUE_GROESSE};
use crate::error::{SignalingError, SignalingResult};
use crate::registry::{MatchZustand, StatusSnapshot};

/// Konfiguration fuer den Signaling-Service
#[derive(Debug, Clone)]
pub struct SignalingConfig {
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_groesse: usize,
    /// Groesse der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            max_frame_groesse: DEFAULT_MAX_FRAME_SIZE,
            send_queue_groesse: SEND_QUEUE_GROESSE,
        }
    }
}

// ---------------------------------------------------------------------------
// Ausgang
// ---------------------------------------------------------------------------

/// Alles was eine Transaktion nach aussen meldet
///
/// Clone teilt Broadcaster, Audit-Log und Metriken.
#[derive(Clone)]
pub struct Ausgang {
    pub broadcaster: EventBroadcaster,
    pub audit_log: AuditLog,
    pub metriken: MatchMetriken,
}

impl Ausgang {
    pub fn neu(broadcaster: EventBroadcaster, audit_log: AuditLog, metriken: MatchMetriken) -> Self {
        Self {
            broadcaster,
            audit_log,
            metriken,
        }
    }

    /// Stellt eine Nachricht zu (fire-and-forget)
    pub fn senden(&self, connection_id: &ConnectionId, nachricht: ServerNachricht) -> bool {
        self.broadcaster.an_verbindung_senden(connection_id, nachricht)
    }

    /// Schreibt einen Audit-Eintrag
    pub fn audit(
        &self,
        event_type: &str,
        connection_id: Option<ConnectionId>,
        room_id: Option<RoomId>,
        message: impl Into<String>,
        data: Value,
    ) {
        self.audit_log
            .aufzeichnen(event_type, connection_id, room_id, message, data);
    }

    #[cfg(test)]
    pub(crate) fn fuer_tests() -> Self {
        Self::neu(
            EventBroadcaster::neu(),
            AuditLog::neu(),
            MatchMetriken::neu().expect("Metriken muessen sich registrieren lassen"),
        )
    }
}

// ---------------------------------------------------------------------------
// SignalingState
// ---------------------------------------------------------------------------

/// Gemeinsamer Server-Zustand (thread-safe, Arc-geteilt)
pub struct SignalingState {
    pub config: Arc<SignalingConfig>,
    /// Broadcaster, Audit-Log und Metriken
    pub ausgang: Ausgang,
    zustand: Mutex<MatchZustand>,
    /// Startzeitpunkt (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl SignalingState {
    pub fn neu(config: SignalingConfig, audit_log: AuditLog, metriken: MatchMetriken) -> Arc<Self> {
        let broadcaster = EventBroadcaster::mit_queue_groesse(config.send_queue_groesse);
        Arc::new(Self {
            config: Arc::new(config),
            ausgang: Ausgang::neu(broadcaster, audit_log, metriken),
            zustand: Mutex::new(MatchZustand::neu()),
            start_time: Instant::now(),
        })
    }

    /// Zustand mit Standardkonfiguration und frischen Metriken
    pub fn standard() -> SignalingResult<Arc<Self>> {
        let metriken = MatchMetriken::neu()
            .map_err(|e| SignalingError::intern(format!("Metriken: {e}")))?;
        Ok(Self::neu(SignalingConfig::default(), AuditLog::neu(), metriken))
    }

    /// Fuehrt eine Zustandsaenderung als eine atomare Transaktion aus
    ///
    /// Danach werden die Zustands-Gauges aktualisiert, noch unter dem Lock.
    pub fn transaktion<R>(&self, f: impl FnOnce(&mut MatchZustand, &Ausgang) -> R) -> R {
        let mut zustand = self.zustand.lock();
        let ergebnis = f(&mut zustand, &self.ausgang);
        let status = zustand.status();
        self.ausgang.metriken.zustand_setzen(
            status.connected_users,
            status.waiting_users,
            status.active_rooms,
        );
        ergebnis
    }

    /// Liest den Zustand ohne ihn zu veraendern
    pub fn lesen<R>(&self, f: impl FnOnce(&MatchZustand) -> R) -> R {
        f(&self.zustand.lock())
    }

    pub fn status(&self) -> StatusSnapshot {
        self.lesen(MatchZustand::status)
    }

    pub fn broadcaster(&self) -> &EventBroadcaster {
        &self.ausgang.broadcaster
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.ausgang.audit_log
    }

    pub fn metriken(&self) -> &MatchMetriken {
        &self.ausgang.metriken
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
