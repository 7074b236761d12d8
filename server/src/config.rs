//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use serde::{Deserialize, Serialize};
use vocaline_core::{Result, VocalineError};
use vocaline_observability::audit::STANDARD_KAPAZITAET;
use vocaline_observability::logging::{log_format_gueltig, log_level_gueltig};
use vocaline_protocol::wire::DEFAULT_MAX_FRAME_SIZE;
use vocaline_signaling::broadcast::SEND_QUEUE_GROESSE;
use vocaline_signaling::SignalingConfig;

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Matchmaking-Einstellungen
    pub matchmaking: MatchmakingEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// HTTP-API-Einstellungen
    pub http: HttpEinstellungen,
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    /// Bind-Adresse fuer Signaling und HTTP-API
    pub bind_adresse: String,
    /// Port fuer die Signaling-Verbindungen (TCP)
    pub signaling_port: u16,
    /// Port fuer die HTTP-API
    pub api_port: u16,
    /// Maximale Frame-Groesse in Bytes
    pub max_frame_groesse: usize,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            signaling_port: 5000,
            api_port: 5001,
            max_frame_groesse: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

/// Matchmaking-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingEinstellungen {
    /// Groesse der Send-Queue pro Verbindung
    pub send_queue_groesse: usize,
    /// Anzahl der Eintraege im Audit-Log
    pub audit_kapazitaet: usize,
}

impl Default for MatchmakingEinstellungen {
    fn default() -> Self {
        Self {
            send_queue_groesse: SEND_QUEUE_GROESSE,
            audit_kapazitaet: STANDARD_KAPAZITAET,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// HTTP-API-Einstellungen
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpEinstellungen {
    /// CORS-Origins (leer = alle erlaubt)
    pub cors_origins: Vec<String>,
}

/// Woher die geladene Konfiguration stammt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigQuelle {
    Datei,
    /// Datei fehlt, Standardwerte
    Standard,
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    ///
    /// Loggt selbst nichts, da das Logging erst mit der geladenen
    /// Konfiguration initialisiert wird.
    pub fn laden(pfad: &str) -> Result<(Self, ConfigQuelle)> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => Self::aus_toml(&inhalt)
                .map(|config| (config, ConfigQuelle::Datei))
                .map_err(|e| VocalineError::Konfiguration(format!("'{pfad}': {e}"))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok((Self::default(), ConfigQuelle::Standard))
            }
            Err(e) => Err(VocalineError::Konfiguration(format!(
                "Datei '{pfad}' nicht lesbar: {e}"
            ))),
        }
    }

    /// Parst und prueft eine Konfiguration aus einem TOML-String
    pub fn aus_toml(inhalt: &str) -> Result<Self> {
        let config: Self = toml::from_str(inhalt)
            .map_err(|e| VocalineError::Konfiguration(e.to_string()))?;
        config.pruefen()?;
        Ok(config)
    }

    /// Prueft Werte die serde nicht abfangen kann
    pub fn pruefen(&self) -> Result<()> {
        if self.netzwerk.signaling_port == self.netzwerk.api_port && self.netzwerk.api_port != 0 {
            return Err(VocalineError::Konfiguration(format!(
                "signaling_port und api_port sind beide {}",
                self.netzwerk.api_port
            )));
        }
        if self.netzwerk.max_frame_groesse == 0 {
            return Err(VocalineError::Konfiguration(
                "max_frame_groesse muss groesser als 0 sein".into(),
            ));
        }
        if !log_level_gueltig(&self.logging.level) {
            return Err(VocalineError::Konfiguration(format!(
                "Unbekanntes Log-Level '{}'",
                self.logging.level
            )));
        }
        if !log_format_gueltig(&self.logging.format) {
            return Err(VocalineError::Konfiguration(format!(
                "Unbekanntes Log-Format '{}' (erlaubt: text, json)",
                self.logging.format
            )));
        }
        if self.matchmaking.send_queue_groesse == 0 {
            return Err(VocalineError::Konfiguration(
                "send_queue_groesse muss groesser als 0 sein".into(),
            ));
        }
        Ok(())
    }

    /// Gibt die vollstaendige Bind-Adresse fuer das Signaling zurueck
    pub fn signaling_bind_adresse(&self) -> String {
        format!(
            "{}:{}",
            self.netzwerk.bind_adresse, self.netzwerk.signaling_port
        )
    }

    /// Gibt die Bind-Adresse fuer die HTTP-API zurueck
    pub fn api_bind_adresse(&self) -> String {
        format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.api_port)
    }

    /// Leitet die Signaling-Konfiguration ab
    pub fn signaling_config(&self) -> SignalingConfig {
        SignalingConfig {
            max_frame_groesse: self.netzwerk.max_frame_groesse,
            send_queue_groesse: self.matchmaking.send_queue_groesse,
        }
    }
}
