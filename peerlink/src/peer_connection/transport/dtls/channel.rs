use std::collections::VecDeque;
use std::time::Instant;

use bytes::BytesMut;
use ice::channel::PacketChannel;
use ice::transport::IceTransport;
use shared::error::{Error, Result};
use shared::{TaggedBytesMut, TransportContext};

/// Where the DTLS transport sends its datagrams.
pub enum DtlsChannel {
    /// The selected pair of an ICE transport. STUN traffic is routed to it
    /// and DTLS records can ride inside its checks.
    Ice(Box<IceTransport>),
    /// A fixed 4-tuple without connectivity checks.
    Raw(RawChannel),
}

impl DtlsChannel {
    pub fn ice(&self) -> Option<&IceTransport> {
        match self {
            DtlsChannel::Ice(ice) => Some(ice.as_ref()),
            DtlsChannel::Raw(_) => None,
        }
    }

    pub fn ice_mut(&mut self) -> Option<&mut IceTransport> {
        match self {
            DtlsChannel::Ice(ice) => Some(ice.as_mut()),
            DtlsChannel::Raw(_) => None,
        }
    }
}

impl PacketChannel for DtlsChannel {
    fn send(&mut self, now: Instant, buf: &[u8]) -> Result<usize> {
        match self {
            DtlsChannel::Ice(ice) => ice.send(now, buf),
            DtlsChannel::Raw(raw) => raw.send(now, buf),
        }
    }

    fn writable(&self) -> bool {
        match self {
            DtlsChannel::Ice(ice) => ice.writable(),
            DtlsChannel::Raw(raw) => raw.writable(),
        }
    }

    fn poll_transmit(&mut self) -> Option<TaggedBytesMut> {
        match self {
            DtlsChannel::Ice(ice) => ice.poll_transmit(),
            DtlsChannel::Raw(raw) => raw.poll_transmit(),
        }
    }
}

/// A channel bound to one local and one remote address, for peers that
/// reach each other without ICE.
pub struct RawChannel {
    transport: TransportContext,
    writable: bool,
    closed: bool,
    transmits: VecDeque<TaggedBytesMut>,
}

impl RawChannel {
    /// A channel that is writable from the start.
    pub fn new(transport: TransportContext) -> Self {
        Self {
            transport,
            writable: true,
            closed: false,
            transmits: VecDeque::new(),
        }
    }

    pub fn transport(&self) -> &TransportContext {
        &self.transport
    }

    /// Marks the path usable or not, e.g. while a NAT binding is refreshed.
    pub fn set_writable(&mut self, writable: bool) {
        self.writable = writable;
    }

    /// Refuses further sends. Datagrams already queued can still be polled.
    pub(crate) fn close(&mut self) {
        self.closed = true;
        self.writable = false;
    }
}

impl PacketChannel for RawChannel {
    fn send(&mut self, now: Instant, buf: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::ErrClosed);
        }
        if !self.writable {
            return Err(Error::ErrNoSelectedCandidatePair);
        }
        self.transmits.push_back(TaggedBytesMut {
            now,
            transport: self.transport,
            message: BytesMut::from(buf),
        });
        Ok(buf.len())
    }

    fn writable(&self) -> bool {
        self.writable && !self.closed
    }

    fn poll_transmit(&mut self) -> Option<TaggedBytesMut> {
        self.transmits.pop_front()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_raw_channel() -> Result<()> {
        let now = Instant::now();
        let transport =
            TransportContext::udp("10.0.0.1:5000".parse()?, "10.0.0.2:6000".parse()?);
        let mut channel = DtlsChannel::Raw(RawChannel::new(transport));

        assert!(channel.writable());
        assert!(channel.ice().is_none());
        assert_eq!(channel.send(now, b"hello")?, 5);
        let t = channel.poll_transmit().ok_or(Error::Other("no transmit".to_owned()))?;
        assert_eq!(&t.message[..], b"hello");
        assert_eq!(t.transport.peer_addr, transport.peer_addr);
        assert!(channel.poll_transmit().is_none());

        if let DtlsChannel::Raw(raw) = &mut channel {
            raw.set_writable(false);
        }
        assert!(!channel.writable());
        assert_eq!(
            channel.send(now, b"x"),
            Err(Error::ErrNoSelectedCandidatePair)
        );

        Ok(())
    }
}
