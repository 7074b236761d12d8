//! vocaline-server – Bibliotheks-Root
//!
//! Deklariert alle Server-Module und stellt den oeffentlichen Einstiegspunkt
//! fuer Integrationstests bereit.

pub mod config;
pub mod http;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use config::ServerConfig;
use tokio::sync::watch;
use vocaline_core::VocalineError;
use vocaline_observability::{AuditLog, MatchMetriken};
use vocaline_signaling::{SignalingServer, SignalingState};

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Baut den gemeinsamen Matchmaking-Zustand aus der Konfiguration
    pub fn state_aufbauen(&self) -> Result<Arc<SignalingState>> {
        let audit_log = AuditLog::mit_kapazitaet(self.config.matchmaking.audit_kapazitaet);
        let metriken = MatchMetriken::neu().context("Metriken konnten nicht registriert werden")?;
        Ok(SignalingState::neu(
            self.config.signaling_config(),
            audit_log,
            metriken,
        ))
    }

    /// Startet alle Server-Subsysteme und laeuft bis Ctrl-C
    pub async fn starten(self) -> Result<()> {
        self.starten_bis(tokio::signal::ctrl_c()).await
    }

    /// Startet alle Server-Subsysteme und laeuft bis `signal` endet
    ///
    /// Reihenfolge:
    /// 1. Matchmaking-Zustand aufbauen
    /// 2. Signaling- und API-Socket binden (Fehler kehren sofort zurueck)
    /// 3. Signaling und HTTP-API als Tasks starten
    /// 4. Auf `signal` warten, dann beide Tasks geordnet beenden
    pub async fn starten_bis<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = std::io::Result<()>>,
    {
        let signaling_addr: SocketAddr = self
            .config
            .signaling_bind_adresse()
            .parse()
            .context("Ungueltige Signaling-Adresse")?;
        let api_addr: SocketAddr = self
            .config
            .api_bind_adresse()
            .parse()
            .context("Ungueltige API-Adresse")?;

        tracing::info!(
            signaling = %signaling_addr,
            api = %api_addr,
            "Server startet"
        );

        let state = self.state_aufbauen()?;

        let signaling = SignalingServer::binden(Arc::clone(&state), signaling_addr)
            .await
            .map_err(|e| VocalineError::binden(signaling_addr, e))?;
        let api_listener = tokio::net::TcpListener::bind(api_addr)
            .await
            .map_err(|e| VocalineError::binden(api_addr, e))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let signaling_task = tokio::spawn(signaling.starten(shutdown_rx.clone()));

        let app = http::router(Arc::clone(&state), &self.config.http.cors_origins);
        tracing::info!(addr = %api_addr, "HTTP-API gestartet");

        let mut api_shutdown = shutdown_rx;
        let api_task = tokio::spawn(async move {
            axum::serve(api_listener, app)
                .with_graceful_shutdown(async move {
                    let _ = api_shutdown.wait_for(|beendet| *beendet).await;
                })
                .await
        });

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal...");
        let signal_ergebnis = signal.await;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        let _ = shutdown_tx.send(true);

        signaling_task
            .await
            .context("Signaling-Task abgebrochen")?
            .context("Signaling-Server fehlgeschlagen")?;
        api_task
            .await
            .context("API-Task abgebrochen")?
            .context("HTTP-API fehlgeschlagen")?;
        signal_ergebnis.context("Shutdown-Signal nicht empfangbar")?;

        let rest = state.status();
        tracing::info!(
            verbunden = rest.connected_users,
            wartend = rest.waiting_users,
            raeume = rest.active_rooms,
            "Server beendet"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_uebernimmt_konfiguration() {
        let mut config = ServerConfig::default();
        config.matchmaking.audit_kapazitaet = 5;
        config.matchmaking.send_queue_groesse = 8;
        let server = Server::neu(config);
        let state = server.state_aufbauen().unwrap();
        assert_eq!(state.audit_log().kapazitaet(), 5);
        assert_eq!(state.config.send_queue_groesse, 8);
        assert_eq!(state.status().connected_users, 0);
    }
}
