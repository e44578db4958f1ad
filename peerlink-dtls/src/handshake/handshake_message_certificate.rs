use super::*;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

const HANDSHAKE_MESSAGE_CERTIFICATE_LENGTH_FIELD_SIZE: usize = 3;

/// DER encoded chain, leaf first.
/// <https://tools.ietf.org/html/rfc5246#section-7.4.2>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeMessageCertificate {
    pub(crate) certificate: Vec<Vec<u8>>,
}

impl HandshakeMessageCertificate {
    pub fn handshake_type(&self) -> HandshakeType {
        HandshakeType::Certificate
    }

    pub fn size(&self) -> usize {
        let mut len = HANDSHAKE_MESSAGE_CERTIFICATE_LENGTH_FIELD_SIZE;

        for r in &self.certificate {
            len += HANDSHAKE_MESSAGE_CERTIFICATE_LENGTH_FIELD_SIZE + r.len();
        }

        len
    }

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        let payload_size = self.size() - HANDSHAKE_MESSAGE_CERTIFICATE_LENGTH_FIELD_SIZE;
        writer.write_u24::<BigEndian>(payload_size as u32)?;

        for r in &self.certificate {
            writer.write_u24::<BigEndian>(r.len() as u32)?;
            writer.write_all(r)?;
        }

        Ok(writer.flush()?)
    }

    pub fn unmarshal<R: Read>(reader: &mut R) -> Result<Self> {
        let mut certificate: Vec<Vec<u8>> = vec![];

        let payload_size = reader.read_u24::<BigEndian>()? as usize;
        let mut offset = 0;
        while offset < payload_size {
            let certificate_len = reader.read_u24::<BigEndian>()? as usize;
            offset += HANDSHAKE_MESSAGE_CERTIFICATE_LENGTH_FIELD_SIZE;
            if offset + certificate_len > payload_size {
                return Err(Error::ErrLengthMismatch);
            }

            let mut buf = vec![0; certificate_len];
            reader.read_exact(&mut buf)?;
            offset += certificate_len;

            certificate.push(buf);
        }

        Ok(HandshakeMessageCertificate { certificate })
    }
}
