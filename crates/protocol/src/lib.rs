//! vocaline-protocol – Netzwerkprotokoll-Definitionen
//!
//! Dieses Crate definiert alle Nachrichtentypen die zwischen Client und
//! Matchmaking-Server ausgetauscht werden, sowie das Frame-Format.

pub mod control;
pub mod wire;

pub use control::{
    ClientNachricht, JoinAnfrage, MatchGefunden, PartnerInfo, ServerNachricht, SignalArt,
    WebRtcRolle,
};
pub use wire::{ClientCodec, FrameCodec, ServerCodec};
