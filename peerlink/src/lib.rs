//! # peerlink
//!
//! A sans-I/O connectivity and secure-transport negotiation core: STUN
//! candidate gathering, an ICE transport, a DTLS transport that can carry its
//! handshake inside STUN connectivity checks, and an SDP offer/answer engine.
//!
//! No object in this crate owns a socket, a thread or a clock. Datagrams are
//! fed in through `handle_read`, produced through `poll_write`, and timers are
//! driven by `poll_timeout`/`handle_timeout`.
//!
//! ```no_run
//! use peerlink::peer_connection::RTCPeerConnection;
//! use peerlink::peer_connection::configuration::RTCConfigurationBuilder;
//! use peerlink::sansio::Protocol;
//! use std::time::Instant;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RTCConfigurationBuilder::new()
//!     .with_local_addrs(vec!["192.168.1.100:5000".parse()?])
//!     .with_stun_servers(vec!["stun:stun.example.org:3478".to_owned()])
//!     .build();
//! let mut pc = RTCPeerConnection::new(config)?;
//!
//! let offer = pc.create_offer()?;
//! pc.set_local_description(offer)?;
//!
//! loop {
//!     pc.handle_timeout(Instant::now())?;
//!     while let Some(_transmit) = pc.poll_write() {
//!         // send _transmit.message to _transmit.transport.peer_addr
//!     }
//!     while let Some(_event) = pc.poll_event() {}
//!     # break;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - **[`RTCPeerConnection`](peer_connection::RTCPeerConnection)** - offer/answer and transport driver
//! - **[`certificate`](peer_connection::certificate)** - DTLS certificates and fingerprints
//! - **[`configuration`](peer_connection::configuration)** - configuration and setting engine
//! - **[`event`](peer_connection::event)** - events polled from a peer connection
//! - **[`sdp`](peer_connection::sdp)** - session descriptions, validation and answer generation
//! - **[`state`](peer_connection::state)** - signaling and connection states
//! - **[`transport`](peer_connection::transport)** - DTLS transport and piggyback controller

#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub use {dtls, ice, sansio, sdp, shared, stun};

pub mod peer_connection;
