#![warn(rust_2018_idioms)]
#![allow(dead_code)]

pub mod attributes;
pub mod candidate;
pub mod channel;
pub mod gatherer;
pub mod mdns;
pub mod network_type;
pub mod rand;
pub mod resolver;
pub mod state;
pub mod transport;
