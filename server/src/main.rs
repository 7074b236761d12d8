//! Vocaline Server – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und startet den Server.

use anyhow::Result;
use vocaline_observability::logging_initialisieren;
use vocaline_server::config::{ConfigQuelle, ServerConfig};
use vocaline_server::Server;

#[tokio::main]
async fn main() -> Result<()> {
    // Konfigurationsdatei-Pfad aus Umgebungsvariable oder Standard
    let config_pfad = std::env::var("VOCALINE_CONFIG").unwrap_or_else(|_| "config.toml".into());

    // Konfiguration laden (Standardwerte falls Datei fehlt)
    let (config, quelle) = ServerConfig::laden(&config_pfad)?;

    // Logging initialisieren, erst danach wird geloggt
    logging_initialisieren(&config.logging.level, &config.logging.format);

    if quelle == ConfigQuelle::Standard {
        tracing::warn!(
            pfad = %config_pfad,
            "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
        );
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_pfad,
        "Vocaline Server wird initialisiert"
    );

    let server = Server::neu(config);
    server.starten().await?;

    Ok(())
}
