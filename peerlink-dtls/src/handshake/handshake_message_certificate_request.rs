use super::*;
use crate::client_certificate_type::*;
use crate::signature_hash_algorithm::*;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

/// A non-anonymous server can optionally request a certificate from
/// the client, if appropriate for the selected cipher suite. This
/// message, if sent, will immediately follow the ServerKeyExchange
/// message (if it is sent; otherwise, this message follows the
/// server's Certificate message).
/// <https://tools.ietf.org/html/rfc5246#section-7.4.4>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeMessageCertificateRequest {
    pub(crate) certificate_types: Vec<ClientCertificateType>,
    pub(crate) signature_hash_algorithms: Vec<SignatureHashAlgorithm>,
}

impl HandshakeMessageCertificateRequest {
    pub fn handshake_type(&self) -> HandshakeType {
        HandshakeType::CertificateRequest
    }

    pub fn size(&self) -> usize {
        1 + self.certificate_types.len() + 2 + 2 * self.signature_hash_algorithms.len() + 2
    }

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.certificate_types.len() as u8)?;
        for v in &self.certificate_types {
            writer.write_u8(*v as u8)?;
        }

        writer.write_u16::<BigEndian>(2 * self.signature_hash_algorithms.len() as u16)?;
        for v in &self.signature_hash_algorithms {
            writer.write_u8(v.hash as u8)?;
            writer.write_u8(v.signature as u8)?;
        }

        // No certificate authorities.
        writer.write_u16::<BigEndian>(0)?;

        Ok(writer.flush()?)
    }

    pub fn unmarshal<R: Read>(reader: &mut R) -> Result<Self> {
        let certificate_types_length = reader.read_u8()?;

        let mut certificate_types = vec![];
        for _ in 0..certificate_types_length {
            let cert_type: ClientCertificateType = reader.read_u8()?.into();
            if cert_type != ClientCertificateType::Unsupported {
                certificate_types.push(cert_type);
            }
        }

        let signature_hash_algorithms_length = reader.read_u16::<BigEndian>()? as usize;
        if signature_hash_algorithms_length % 2 != 0 {
            return Err(Error::ErrLengthMismatch);
        }

        let mut signature_hash_algorithms = vec![];
        for _ in 0..signature_hash_algorithms_length / 2 {
            let hash: HashAlgorithm = reader.read_u8()?.into();
            let signature: SignatureAlgorithm = reader.read_u8()?.into();
            let algorithm = SignatureHashAlgorithm { hash, signature };
            if algorithm.is_supported() {
                signature_hash_algorithms.push(algorithm);
            }
        }

        let authorities_length = reader.read_u16::<BigEndian>()? as usize;
        let mut authorities = vec![0u8; authorities_length];
        reader.read_exact(&mut authorities)?;

        Ok(HandshakeMessageCertificateRequest {
            certificate_types,
            signature_hash_algorithms,
        })
    }
}
