//! Transport layers of a peer connection.
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   SRTP keys / application data      │
//! ├─────────────────────────────────────┤
//! │   DTLS (handshake, records)         │  dtls
//! ├─────────────────────────────────────┤
//! │   ICE (checks, selected pair)       │  ice
//! ├─────────────────────────────────────┤
//! │   UDP datagrams, owned by the app   │
//! └─────────────────────────────────────┘
//! ```
//!
//! The DTLS transport owns the ICE transport it runs over. STUN datagrams
//! are routed down to it, and during the handshake DTLS flights may travel
//! inside its connectivity checks.

pub mod dtls;
pub mod ice;
