//! Matchmaking-Register
//!
//! Verbindungsregister, Warteschlange und Raumtabelle bilden zusammen den
//! autoritativen Zustand. Sie werden nur gemeinsam als [`MatchZustand`]
//! hinter einem einzigen Lock veraendert.

pub mod connections;
pub mod queue;
pub mod rooms;

pub use connections::{ConnectionRegistry, VerbindungsSitzung};
pub use queue::WaitingQueue;
pub use rooms::{Raum, RoomTable};

use serde::Serialize;

/// Zaehlwerte der drei Register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub connected_users: usize,
    pub waiting_users: usize,
    pub active_rooms: usize,
}

impl StatusSnapshot {
    /// Verbindungen die weder warten noch in einem Raum sind
    ///
    /// In einem konsistenten Zustand ohne laufende Operation ist das 0.
    pub fn ungebunden(&self) -> isize {
        self.connected_users as isize
            - self.waiting_users as isize
            - 2 * self.active_rooms as isize
    }
}

/// Die drei Register als eine Einheit
#[derive(Debug, Default)]
pub struct MatchZustand {
    pub verbindungen: ConnectionRegistry,
    pub warteschlange: WaitingQueue,
    pub raeume: RoomTable,
}

impl MatchZustand {
    pub fn neu() -> Self {
        Self::default()
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            connected_users: self.verbindungen.anzahl(),
            waiting_users: self.warteschlange.anzahl(),
            active_rooms: self.raeume.anzahl(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vocaline_core::types::{ConnectionId, UserId};

    #[test]
    fn status_zaehlt_alle_register() {
        let mut z = MatchZustand::neu();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        let c = ConnectionId::new();
        for (id, name) in [(a, "A"), (b, "B"), (c, "C")] {
            z.verbindungen
                .registrieren(id, UserId::zufaellig(), name.into())
                .unwrap();
        }
        let raum = z.raeume.anlegen(a, b).unwrap().id;
        z.verbindungen.raum_setzen(&a, Some(raum)).unwrap();
        z.verbindungen.raum_setzen(&b, Some(raum)).unwrap();
        z.warteschlange.einreihen(c);

        let status = z.status();
        assert_eq!(
            status,
            StatusSnapshot {
                connected_users: 3,
                waiting_users: 1,
                active_rooms: 1,
            }
        );
        assert_eq!(status.ungebunden(), 0);
    }

    #[test]
    fn status_json_feldnamen() {
        let json = serde_json::to_value(MatchZustand::neu().status()).unwrap();
        assert_eq!(json["connected_users"], 0);
        assert_eq!(json["waiting_users"], 0);
        assert_eq!(json["active_rooms"], 0);
    }
}
