//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `SignalingServer` bindet beim Erzeugen und startet fuer jede
//! eingehende Verbindung einen eigenen tokio-Task mit einer
//! `ClientConnection`. Es gibt keine
//! Zulassungsbeschraenkung: jede Verbindung wird angenommen.
//!
//! Beim Shutdown wird nicht mehr akzeptiert und auf alle laufenden
//! Verbindungs-Tasks gewartet, damit jede Sitzung sauber abgebaut wird.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinSet;

use crate::connection::ClientConnection;
use crate::server_state::SignalingState;

/// TCP-Signaling-Server auf einem bereits gebundenen Socket
pub struct SignalingServer {
    state: Arc<SignalingState>,
    listener: TcpListener,
}

impl SignalingServer {
    /// Bindet den Socket sofort, damit Bind-Fehler beim Aufrufer landen
    pub async fn binden(
        state: Arc<SignalingState>,
        bind_addr: SocketAddr,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(bind_addr).await?;
        Ok(Self { state, listener })
    }

    /// Tatsaechlich gebundene Adresse (relevant bei Port 0)
    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    pub async fn starten(
        self,
        shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) -> std::io::Result<()> {
        accept_loop(self.state, self.listener, shutdown_rx).await
    }
}

/// Accept-Loop auf einem bereits gebundenen Listener
pub async fn accept_loop(
    state: Arc<SignalingState>,
    listener: TcpListener,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> std::io::Result<()> {
    let lokale_addr = listener.local_addr()?;
    tracing::info!(adresse = %lokale_addr, "TCP Signaling-Server gestartet");

    let mut verbindungen = JoinSet::new();

    loop {
        tokio::select! {
            // Neue eingehende Verbindung
            result = listener.accept() => {
                match result {
                    Ok((stream, peer_addr)) => {
                        if let Err(e) = stream.set_nodelay(true) {
                            tracing::debug!(peer = %peer_addr, fehler = %e, "TCP_NODELAY nicht gesetzt");
                        }
                        tracing::debug!(peer = %peer_addr, "Verbindung akzeptiert");

                        let verbindung = ClientConnection::neu(Arc::clone(&state), peer_addr);
                        verbindungen.spawn(verbindung.verarbeiten(stream, shutdown_rx.clone()));
                    }
                    Err(e) => {
                        tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    }
                }
            }

            // Beendete Verbindungs-Tasks einsammeln
            Some(beendet) = verbindungen.join_next() => {
                if let Err(e) = beendet {
                    tracing::error!(fehler = %e, "Verbindungs-Task abgebrochen");
                }
            }

            // Shutdown-Signal
            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Signaling-Server: Shutdown-Signal empfangen");
                    break;
                }
            }
        }
    }

    drop(listener);
    let offen = verbindungen.len();
    if offen > 0 {
        tracing::info!(offen, "Warte auf laufende Verbindungen");
    }
    while let Some(beendet) = verbindungen.join_next().await {
        if let Err(e) = beendet {
            tracing::error!(fehler = %e, "Verbindungs-Task abgebrochen");
        }
    }

    tracing::info!("TCP Signaling-Server gestoppt");
    Ok(())
}
