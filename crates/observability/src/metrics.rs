//! Prometheus-kompatible Metriken fuer das Matchmaking
//!
//! Registrierte Metriken:
//! - `vocaline_connected_users` – Gauge: Registrierte Verbindungen
//! - `vocaline_waiting_users` – Gauge: Verbindungen in der Warteschlange
//! - `vocaline_active_rooms` – Gauge: Aktive Raeume
//! - `vocaline_matches_total` – Counter: Gebildete Raeume
//! - `vocaline_rematches_total` – Counter: Sofort-Rematches nach Leave/Disconnect
//! - `vocaline_self_match_prevented_total` – Counter: Durch Namensgleichheit verhinderte Matches
//! - `vocaline_signals_relayed_total` – Counter: Weitergeleitete Signale (kind)
//! - `vocaline_signals_dropped_total` – Counter: Verworfene Signale ohne Raum (kind)
//! - `vocaline_consistency_violations_total` – Counter: Gefundene Inkonsistenzen

use anyhow::Result;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle Matchmaking-Metriken
#[derive(Clone)]
pub struct MatchMetriken {
    pub registry: Arc<Registry>,

    // Zustand
    pub connected_users: IntGauge,
    pub waiting_users: IntGauge,
    pub active_rooms: IntGauge,

    // Ereignisse
    pub matches_total: IntCounter,
    pub rematches_total: IntCounter,
    pub self_match_prevented_total: IntCounter,
    pub signals_relayed_total: IntCounterVec,
    pub signals_dropped_total: IntCounterVec,
    pub consistency_violations_total: IntCounter,
}

impl MatchMetriken {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        // --- Zustand ---
        let connected_users = IntGauge::with_opts(Opts::new(
            "vocaline_connected_users",
            "Anzahl registrierter Verbindungen",
        ))?;
        registry.register(Box::new(connected_users.clone()))?;

        let waiting_users = IntGauge::with_opts(Opts::new(
            "vocaline_waiting_users",
            "Anzahl wartender Verbindungen",
        ))?;
        registry.register(Box::new(waiting_users.clone()))?;

        let active_rooms = IntGauge::with_opts(Opts::new(
            "vocaline_active_rooms",
            "Anzahl aktiver Raeume",
        ))?;
        registry.register(Box::new(active_rooms.clone()))?;

        // --- Ereignisse ---
        let matches_total = IntCounter::with_opts(Opts::new(
            "vocaline_matches_total",
            "Gesamtanzahl gebildeter Raeume",
        ))?;
        registry.register(Box::new(matches_total.clone()))?;

        let rematches_total = IntCounter::with_opts(Opts::new(
            "vocaline_rematches_total",
            "Sofort-Rematch-Versuche nach Leave oder Disconnect",
        ))?;
        registry.register(Box::new(rematches_total.clone()))?;

        let self_match_prevented_total = IntCounter::with_opts(Opts::new(
            "vocaline_self_match_prevented_total",
            "Wegen gleichem Anzeigenamen uebersprungene Kandidaten",
        ))?;
        registry.register(Box::new(self_match_prevented_total.clone()))?;

        let signals_relayed_total = IntCounterVec::new(
            Opts::new(
                "vocaline_signals_relayed_total",
                "An den Partner weitergeleitete Signale",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(signals_relayed_total.clone()))?;

        let signals_dropped_total = IntCounterVec::new(
            Opts::new(
                "vocaline_signals_dropped_total",
                "Verworfene Signale (kein aktiver Raum)",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(signals_dropped_total.clone()))?;

        let consistency_violations_total = IntCounter::with_opts(Opts::new(
            "vocaline_consistency_violations_total",
            "Gefundene Inkonsistenzen zwischen den Registern",
        ))?;
        registry.register(Box::new(consistency_violations_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_users,
            waiting_users,
            active_rooms,
            matches_total,
            rematches_total,
            self_match_prevented_total,
            signals_relayed_total,
            signals_dropped_total,
            consistency_violations_total,
        })
    }

    /// Setzt die drei Zustands-Gauges auf einmal
    pub fn zustand_setzen(&self, verbunden: usize, wartend: usize, raeume: usize) {
        self.connected_users.set(verbunden as i64);
        self.waiting_users.set(wartend as i64);
        self.active_rooms.set(raeume as i64);
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
