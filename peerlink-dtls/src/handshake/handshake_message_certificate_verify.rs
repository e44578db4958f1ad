use super::*;
use crate::signature_hash_algorithm::*;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

/// Proof of possession of the client certificate key over the transcript.
/// <https://tools.ietf.org/html/rfc5246#section-7.4.8>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeMessageCertificateVerify {
    pub(crate) algorithm: SignatureHashAlgorithm,
    pub(crate) signature: Vec<u8>,
}

impl HandshakeMessageCertificateVerify {
    pub fn handshake_type(&self) -> HandshakeType {
        HandshakeType::CertificateVerify
    }

    pub fn size(&self) -> usize {
        1 + 1 + 2 + self.signature.len()
    }

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.algorithm.hash as u8)?;
        writer.write_u8(self.algorithm.signature as u8)?;
        writer.write_u16::<BigEndian>(self.signature.len() as u16)?;
        writer.write_all(&self.signature)?;

        Ok(writer.flush()?)
    }

    pub fn unmarshal<R: Read>(reader: &mut R) -> Result<Self> {
        let hash: HashAlgorithm = reader.read_u8()?.into();
        if hash == HashAlgorithm::Unsupported {
            return Err(Error::ErrInvalidHashAlgorithm);
        }

        let signature: SignatureAlgorithm = reader.read_u8()?.into();
        if signature == SignatureAlgorithm::Unsupported {
            return Err(Error::ErrInvalidSignatureAlgorithm);
        }

        let signature_length = reader.read_u16::<BigEndian>()? as usize;
        let mut sig = vec![0u8; signature_length];
        reader.read_exact(&mut sig)?;

        Ok(HandshakeMessageCertificateVerify {
            algorithm: SignatureHashAlgorithm { hash, signature },
            signature: sig,
        })
    }
}
