//! vocaline-signaling – Matchmaking und Signaling-Relay
//!
//! Dieser Crate paart anonyme Teilnehmer zu Zweier-Raeumen und leitet die
//! WebRTC-Signaling-Nachrichten zwischen den beiden Raummitgliedern weiter.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (SignalingServer)
//!     |
//!     v
//! ClientConnection (pro Verbindung ein Task)
//!     |
//!     v
//! MessageDispatcher
//!     |
//!     +-- SessionHandler (Connect, Join, Leave, Disconnect)
//!     +-- RelayHandler   (Offer, Answer, ICE, Zustaende)
//!     |
//!     v
//! SignalingState ── Mutex<MatchZustand>
//!     |                 +-- ConnectionRegistry
//!     |                 +-- WaitingQueue
//!     |                 +-- RoomTable
//!     +-- Matchmaker, Konsistenzpruefung
//!     +-- Ausgang (EventBroadcaster, AuditLog, MatchMetriken)
//! ```

pub mod broadcast;
pub mod connection;
pub mod consistency;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod matchmaker;
pub mod registry;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::EventBroadcaster;
pub use connection::ClientConnection;
pub use dispatcher::MessageDispatcher;
pub use error::{SignalingError, SignalingResult};
pub use registry::{MatchZustand, StatusSnapshot};
pub use server_state::{Ausgang, SignalingConfig, SignalingState};
pub use tcp::SignalingServer;
