use crate::attributes::*;
use crate::message::*;
use shared::error::*;

/// Most DTLS-in-STUN acks carried by a single message.
pub const MAX_DTLS_IN_STUN_ACKS: usize = 4;

/// DtlsInStun carries one DTLS datagram (one or more records) inside a
/// connectivity check.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct DtlsInStun(pub Vec<u8>);

impl Setter for DtlsInStun {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.add(ATTR_DTLS_IN_STUN, &self.0);
        Ok(())
    }
}

impl Getter for DtlsInStun {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        self.0 = m.get(ATTR_DTLS_IN_STUN)?;
        Ok(())
    }
}

/// DtlsInStunAck lists CRC-32 values of DTLS datagrams received through
/// piggybacking. An empty list is valid and signals support.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct DtlsInStunAck(pub Vec<u32>);

impl Setter for DtlsInStunAck {
    fn add_to(&self, m: &mut Message) -> Result<()> {
        check_overflow(ATTR_DTLS_IN_STUN_ACK, self.0.len(), MAX_DTLS_IN_STUN_ACKS)
            .map_err(|_| Error::ErrTooManyPiggybackAcks)?;
        let mut v = Vec::with_capacity(self.0.len() * 4);
        for ack in &self.0 {
            v.extend_from_slice(&ack.to_be_bytes());
        }
        m.add(ATTR_DTLS_IN_STUN_ACK, &v);
        Ok(())
    }
}

impl Getter for DtlsInStunAck {
    fn get_from(&mut self, m: &Message) -> Result<()> {
        let v = m.get(ATTR_DTLS_IN_STUN_ACK)?;
        if v.len() % 4 != 0 {
            return Err(Error::ErrAttributeSizeInvalid);
        }
        if v.len() / 4 > MAX_DTLS_IN_STUN_ACKS {
            return Err(Error::ErrTooManyPiggybackAcks);
        }
        self.0 = v
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Ok(())
    }
}
