#![warn(rust_2018_idioms)]
#![allow(dead_code)]

#[cfg(feature = "crypto")]
pub mod crypto;

pub mod error;
#[cfg(feature = "replay")]
pub mod replay_detector;
pub(crate) mod transport;
pub mod util;

pub use transport::{FourTuple, TaggedBytesMut, TransportContext, TransportMessage, TransportProtocol};
