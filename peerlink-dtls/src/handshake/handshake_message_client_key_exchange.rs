use super::*;

use byteorder::{ReadBytesExt, WriteBytesExt};

/// The client's ECDHE public value.
/// <https://tools.ietf.org/html/rfc8422#section-5.7>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeMessageClientKeyExchange {
    pub(crate) public_key: Vec<u8>,
}

impl HandshakeMessageClientKeyExchange {
    pub fn handshake_type(&self) -> HandshakeType {
        HandshakeType::ClientKeyExchange
    }

    pub fn size(&self) -> usize {
        1 + self.public_key.len()
    }

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        if self.public_key.is_empty() {
            return Err(Error::ErrInvalidPrivateKey);
        }

        writer.write_u8(self.public_key.len() as u8)?;
        writer.write_all(&self.public_key)?;

        Ok(writer.flush()?)
    }

    pub fn unmarshal<R: Read>(reader: &mut R) -> Result<Self> {
        let public_key_len = reader.read_u8()? as usize;
        let mut public_key = vec![0u8; public_key_len];
        reader.read_exact(&mut public_key)?;

        Ok(HandshakeMessageClientKeyExchange { public_key })
    }
}
