use super::*;
use crate::curve::named_curve::*;
use crate::curve::*;
use crate::signature_hash_algorithm::*;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

/// ECDHE parameters signed with the server certificate key.
/// <https://tools.ietf.org/html/rfc8422#section-5.4>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandshakeMessageServerKeyExchange {
    pub(crate) elliptic_curve_type: EllipticCurveType,
    pub(crate) named_curve: NamedCurve,
    pub(crate) public_key: Vec<u8>,
    pub(crate) algorithm: SignatureHashAlgorithm,
    pub(crate) signature: Vec<u8>,
}

impl HandshakeMessageServerKeyExchange {
    pub fn handshake_type(&self) -> HandshakeType {
        HandshakeType::ServerKeyExchange
    }

    pub fn size(&self) -> usize {
        1 + 2 + 1 + self.public_key.len() + 2 + 2 + self.signature.len()
    }

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.elliptic_curve_type as u8)?;
        writer.write_u16::<BigEndian>(self.named_curve as u16)?;
        writer.write_u8(self.public_key.len() as u8)?;
        writer.write_all(&self.public_key)?;

        writer.write_u8(self.algorithm.hash as u8)?;
        writer.write_u8(self.algorithm.signature as u8)?;
        writer.write_u16::<BigEndian>(self.signature.len() as u16)?;
        writer.write_all(&self.signature)?;

        Ok(writer.flush()?)
    }

    pub fn unmarshal<R: Read>(reader: &mut R) -> Result<Self> {
        let elliptic_curve_type: EllipticCurveType = reader.read_u8()?.into();
        if elliptic_curve_type != EllipticCurveType::NamedCurve {
            return Err(Error::ErrInvalidEllipticCurveType);
        }

        let named_curve: NamedCurve = reader.read_u16::<BigEndian>()?.into();
        if named_curve == NamedCurve::Unsupported {
            return Err(Error::ErrInvalidNamedCurve);
        }

        let public_key_len = reader.read_u8()? as usize;
        let mut public_key = vec![0u8; public_key_len];
        reader.read_exact(&mut public_key)?;

        let hash: HashAlgorithm = reader.read_u8()?.into();
        if hash == HashAlgorithm::Unsupported {
            return Err(Error::ErrInvalidHashAlgorithm);
        }
        let signature: SignatureAlgorithm = reader.read_u8()?.into();
        if signature == SignatureAlgorithm::Unsupported {
            return Err(Error::ErrInvalidSignatureAlgorithm);
        }

        let signature_len = reader.read_u16::<BigEndian>()? as usize;
        let mut sig = vec![0u8; signature_len];
        reader.read_exact(&mut sig)?;

        Ok(HandshakeMessageServerKeyExchange {
            elliptic_curve_type,
            named_curve,
            public_key,
            algorithm: SignatureHashAlgorithm { hash, signature },
            signature: sig,
        })
    }
}
