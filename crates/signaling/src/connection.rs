//! Client-Connection – Verwaltet eine einzelne Transport-Verbindung
//!
//! Jede Verbindung bekommt eine `ClientConnection` in einem eigenen
//! tokio-Task. Es gibt keinen Keepalive und kein Timeout: eine Verbindung
//! endet nur durch Schliessen, Lesefehler oder Shutdown, und jeder dieser
//! Wege fuehrt zum Disconnect-Handler.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Framed;
use vocaline_core::types::ConnectionId;
use vocaline_protocol::wire::ServerCodec;

use crate::dispatcher::MessageDispatcher;
use crate::handlers::session_handler;
use crate::server_state::SignalingState;

/// Grund fuer das Ende einer Verbindung
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbindungsende {
    /// Client hat den Socket geschlossen
    Geschlossen,
    /// Frame konnte nicht gelesen oder geschrieben werden
    Fehler,
    /// Server faehrt herunter
    Shutdown,
}

/// Verarbeitet eine einzelne Verbindung
///
/// Liest Frames via `ServerCodec`, dispatcht an den `MessageDispatcher` und
/// schreibt alles aus der Broadcaster-Queue zurueck auf den Stream.
pub struct ClientConnection {
    state: Arc<SignalingState>,
    peer_addr: SocketAddr,
    connection_id: ConnectionId,
}

impl ClientConnection {
    pub fn neu(state: Arc<SignalingState>, peer_addr: SocketAddr) -> Self {
        Self {
            state,
            peer_addr,
            connection_id: ConnectionId::new(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Startet die Verarbeitungsschleife
    ///
    /// Laeuft bis die Verbindung endet oder `shutdown_rx` auf `true` wechselt.
    pub async fn verarbeiten<S>(
        self,
        stream: S,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> Verbindungsende
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let peer_addr = self.peer_addr;
        let connection_id = self.connection_id;

        tracing::info!(peer = %peer_addr, connection_id = %connection_id, "Neue Verbindung");

        let mut framed = Framed::new(
            stream,
            ServerCodec::with_max_size(self.state.config.max_frame_groesse),
        );
        let mut ausgehend = session_handler::handle_connect(&self.state, connection_id);
        let dispatcher = MessageDispatcher::neu(Arc::clone(&self.state));

        let ende = loop {
            tokio::select! {
                // Eingehende Nachricht vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(nachricht)) => {
                            tracing::trace!(connection_id = %connection_id, "Nachricht empfangen");
                            dispatcher.dispatch(connection_id, nachricht);
                        }
                        Some(Err(e)) => {
                            tracing::warn!(
                                peer = %peer_addr,
                                connection_id = %connection_id,
                                fehler = %e,
                                "Frame-Lesefehler"
                            );
                            break Verbindungsende::Fehler;
                        }
                        None => {
                            tracing::info!(
                                peer = %peer_addr,
                                connection_id = %connection_id,
                                "Verbindung vom Client getrennt"
                            );
                            break Verbindungsende::Geschlossen;
                        }
                    }
                }

                // Ausgehende Nachricht aus dem Broadcaster
                Some(nachricht) = ausgehend.recv() => {
                    if let Err(e) = framed.send(nachricht).await {
                        tracing::warn!(
                            peer = %peer_addr,
                            connection_id = %connection_id,
                            fehler = %e,
                            "Senden fehlgeschlagen"
                        );
                        break Verbindungsende::Fehler;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(connection_id = %connection_id, "Shutdown-Signal – Verbindung wird getrennt");
                        break Verbindungsende::Shutdown;
                    }
                }
            }
        };

        session_handler::handle_disconnect(&self.state, connection_id);
        self.state.broadcaster().verbindung_entfernen(&connection_id);

        tracing::info!(connection_id = %connection_id, ende = ?ende, "Verbindungs-Task beendet");
        ende
    }
}
