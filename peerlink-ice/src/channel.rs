use std::time::Instant;

use shared::TaggedBytesMut;
use shared::error::Result;

/// PacketChannel is the capability a DTLS transport needs from whatever
/// carries its datagrams.
///
/// Inbound packets reach the channel owner through its `handle_read`, and
/// writability changes are reported through the owner's polled events.
pub trait PacketChannel {
    /// Queues a datagram for the remote peer, returning the number of bytes queued.
    fn send(&mut self, now: Instant, buf: &[u8]) -> Result<usize>;

    /// Whether `send` currently has a path to the peer.
    fn writable(&self) -> bool;

    /// Next datagram to put on the wire.
    fn poll_transmit(&mut self) -> Option<TaggedBytesMut>;
}
