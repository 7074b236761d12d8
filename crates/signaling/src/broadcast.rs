//! Event-Broadcaster – Zustellung an einzelne Verbindungen
//!
//! Der EventBroadcaster verwaltet die Send-Queues aller offenen Verbindungen.
//! Zustellung ist fire-and-forget: `try_send` blockiert nie, eine volle oder
//! geschlossene Queue verwirft die Nachricht mit einer Log-Zeile.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use vocaline_core::types::ConnectionId;
use vocaline_protocol::control::ServerNachricht;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Standardgroesse der Send-Queue pro Verbindung
pub const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// ClientSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue einer Verbindung
#[derive(Clone, Debug)]
pub struct ClientSender {
    pub connection_id: ConnectionId,
    pub tx: mpsc::Sender<ServerNachricht>,
}

impl ClientSender {
    /// Sendet eine Nachricht nicht-blockierend
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, nachricht: ServerNachricht) -> bool {
        match self.tx.try_send(nachricht) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(n)) => {
                tracing::warn!(
                    connection_id = %self.connection_id,
                    typ = n.typ_name(),
                    "Send-Queue voll – Nachricht verworfen"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    connection_id = %self.connection_id,
                    "Send-Queue geschlossen (Verbindung getrennt)"
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EventBroadcaster
// ---------------------------------------------------------------------------

/// Zentrale Zustellung an alle offenen Verbindungen
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct EventBroadcaster {
    inner: Arc<EventBroadcasterInner>,
}

struct EventBroadcasterInner {
    clients: DashMap<ConnectionId, ClientSender>,
    queue_groesse: usize,
}

impl EventBroadcaster {
    pub fn neu() -> Self {
        Self::mit_queue_groesse(SEND_QUEUE_GROESSE)
    }

    /// Erstellt einen Broadcaster mit eigener Queue-Groesse (mindestens 1)
    pub fn mit_queue_groesse(queue_groesse: usize) -> Self {
        Self {
            inner: Arc::new(EventBroadcasterInner {
                clients: DashMap::new(),
                queue_groesse: queue_groesse.max(1),
            }),
        }
    }

    /// Registriert eine Verbindung und gibt ihre Empfangs-Queue zurueck
    ///
    /// Die `ClientConnection` liest aus dieser Queue und schreibt auf den Socket.
    pub fn verbindung_registrieren(
        &self,
        connection_id: ConnectionId,
    ) -> mpsc::Receiver<ServerNachricht> {
        let (tx, rx) = mpsc::channel(self.inner.queue_groesse);
        let sender = ClientSender { connection_id, tx };
        self.inner.clients.insert(connection_id, sender);
        tracing::debug!(connection_id = %connection_id, "Verbindung im Broadcaster registriert");
        rx
    }

    pub fn verbindung_entfernen(&self, connection_id: &ConnectionId) {
        if self.inner.clients.remove(connection_id).is_some() {
            tracing::debug!(connection_id = %connection_id, "Verbindung aus Broadcaster entfernt");
        }
    }

    /// Sendet eine Nachricht an eine einzelne Verbindung
    ///
    /// Gibt `true` zurueck wenn die Nachricht eingereiht wurde.
    pub fn an_verbindung_senden(
        &self,
        connection_id: &ConnectionId,
        nachricht: ServerNachricht,
    ) -> bool {
        match self.inner.clients.get(connection_id) {
            Some(sender) => sender.senden(nachricht),
            None => {
                tracing::debug!(
                    connection_id = %connection_id,
                    typ = nachricht.typ_name(),
                    "Senden an unbekannte Verbindung"
                );
                false
            }
        }
    }

    pub fn anzahl(&self) -> usize {
        self.inner.clients.len()
    }

    pub fn ist_registriert(&self, connection_id: &ConnectionId) -> bool {
        self.inner.clients.contains_key(connection_id)
    }

    pub fn queue_groesse(&self) -> usize {
        self.inner.queue_groesse
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
