//! Message-Dispatcher – Routet Client-Nachrichten an die Handler
//!
//! Es gibt keine Antworten im Request/Response-Sinn: alle Rueckmeldungen
//! laufen ueber den EventBroadcaster an die betroffenen Verbindungen.

use std::sync::Arc;
use vocaline_core::types::ConnectionId;
use vocaline_protocol::control::ClientNachricht;

use crate::handlers::{diagnose_handler, relay_handler, session_handler};
use crate::server_state::SignalingState;

/// Zentraler Message-Dispatcher
pub struct MessageDispatcher {
    state: Arc<SignalingState>,
}

impl MessageDispatcher {
    pub fn neu(state: Arc<SignalingState>) -> Self {
        Self { state }
    }

    /// Verarbeitet eine eingehende Nachricht einer Verbindung
    pub fn dispatch(&self, connection_id: ConnectionId, nachricht: ClientNachricht) {
        let nachricht = match nachricht.als_signal() {
            Ok((art, data)) => {
                // Fehler sind bereits protokolliert; der Client erfaehrt nichts
                let _ = relay_handler::handle_signal(&self.state, connection_id, art, data);
                return;
            }
            Err(andere) => andere,
        };

        match nachricht {
            ClientNachricht::JoinMatchmaking(anfrage) => {
                session_handler::handle_join(&self.state, connection_id, anfrage);
            }
            ClientNachricht::LeaveConversation => {
                session_handler::handle_leave(&self.state, connection_id);
            }
            ClientNachricht::MobileDebug { message, data } => {
                diagnose_handler::handle_mobile_debug(&self.state, connection_id, message, data);
            }
            andere => {
                tracing::debug!(
                    connection_id = %connection_id,
                    nachricht = ?andere,
                    "Nachricht ohne Handler ignoriert"
                );
            }
        }
    }
}
