use super::handshake_random::*;
use super::*;
use crate::cipher_suite::*;
use crate::compression_methods::*;
use crate::extension::*;
use crate::record_layer::record_layer_header::*;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

/// The server will send this message in response to a ClientHello
/// message when it was able to find an acceptable set of algorithms.
/// If it cannot find such a match, it will respond with a handshake
/// failure alert.
/// <https://tools.ietf.org/html/rfc5246#section-7.4.1.3>
#[derive(Clone, Debug, PartialEq)]
pub struct HandshakeMessageServerHello {
    pub(crate) version: ProtocolVersion,
    pub(crate) random: HandshakeRandom,
    pub(crate) session_id: Vec<u8>,
    pub(crate) cipher_suite: CipherSuiteId,
    pub(crate) compression_method: CompressionMethodId,
    pub(crate) extensions: Vec<Extension>,
}

impl HandshakeMessageServerHello {
    pub fn handshake_type(&self) -> HandshakeType {
        HandshakeType::ServerHello
    }

    pub fn size(&self) -> usize {
        2 + self.random.size()
            + 1
            + self.session_id.len()
            + 2
            + 1
            + extensions_size(&self.extensions)
    }

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(self.version.major)?;
        writer.write_u8(self.version.minor)?;
        self.random.marshal(writer)?;

        writer.write_u8(self.session_id.len() as u8)?;
        writer.write_all(&self.session_id)?;

        writer.write_u16::<BigEndian>(self.cipher_suite as u16)?;
        writer.write_u8(self.compression_method as u8)?;

        marshal_extensions(&self.extensions, writer)?;

        Ok(writer.flush()?)
    }

    pub fn unmarshal<R: Read>(reader: &mut R) -> Result<Self> {
        let major = reader.read_u8()?;
        let minor = reader.read_u8()?;
        let random = HandshakeRandom::unmarshal(reader)?;

        let session_id_len = reader.read_u8()? as usize;
        let mut session_id = vec![0u8; session_id_len];
        reader.read_exact(&mut session_id)?;

        let cipher_suite: CipherSuiteId = reader.read_u16::<BigEndian>()?.into();
        let compression_method: CompressionMethodId = reader.read_u8()?.into();
        if compression_method == CompressionMethodId::Unsupported {
            return Err(Error::ErrInvalidCompressionMethod);
        }

        let mut rest = vec![];
        reader.read_to_end(&mut rest)?;
        let extensions = unmarshal_extensions(&rest)?;

        Ok(HandshakeMessageServerHello {
            version: ProtocolVersion { major, minor },
            random,
            session_id,
            cipher_suite,
            compression_method,
            extensions,
        })
    }
}
