use super::handshake_random::*;
use super::*;
use crate::cipher_suite::*;
use crate::compression_methods::*;
use crate::extension::*;
use crate::record_layer::record_layer_header::*;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

const MAX_COOKIE_LENGTH: usize = 255;

/// When a client first connects to a server it is required to send
/// the client hello as its first message. The client can also send a
/// client hello in response to a hello request or on its own
/// initiative in order to renegotiate the security parameters in an
/// existing connection.
/// <https://tools.ietf.org/html/rfc6347#section-4.2.1>
#[derive(Clone, Debug, PartialEq)]
pub struct HandshakeMessageClientHello {
    pub(crate) version: ProtocolVersion,
    pub(crate) random: HandshakeRandom,
    pub(crate) session_id: Vec<u8>,
    pub(crate) cookie: Vec<u8>,
    pub(crate) cipher_suites: Vec<CipherSuiteId>,
    pub(crate) compression_methods: CompressionMethods,
    pub(crate) extensions: Vec<Extension>,
}

impl HandshakeMessageClientHello {
    pub fn handshake_type(&self) -> HandshakeType {
        HandshakeType::ClientHello
    }

    pub fn size(&self) -> usize {
        2 + self.random.size()
            + 1
            + self.session_id.len()
            + 1
            + self.cookie.len()
            + 2
            + 2 * self.cipher_suites.len()
            + self.compression_methods.size()
            + extensions_size(&self.extensions)
    }

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        if self.cookie.len() > MAX_COOKIE_LENGTH {
            return Err(Error::ErrCookieTooLong);
        }

        writer.write_u8(self.version.major)?;
        writer.write_u8(self.version.minor)?;
        self.random.marshal(writer)?;

        writer.write_u8(self.session_id.len() as u8)?;
        writer.write_all(&self.session_id)?;

        writer.write_u8(self.cookie.len() as u8)?;
        writer.write_all(&self.cookie)?;

        writer.write_u16::<BigEndian>(2 * self.cipher_suites.len() as u16)?;
        for cipher_suite in &self.cipher_suites {
            writer.write_u16::<BigEndian>(*cipher_suite as u16)?;
        }

        self.compression_methods.marshal(writer)?;
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

        let cookie_len = reader.read_u8()? as usize;
        let mut cookie = vec![0u8; cookie_len];
        reader.read_exact(&mut cookie)?;

        let cipher_suites_len = reader.read_u16::<BigEndian>()? as usize;
        if cipher_suites_len % 2 != 0 {
            return Err(Error::ErrInvalidCipherSuite);
        }
        let mut cipher_suites = vec![];
        for _ in 0..cipher_suites_len / 2 {
            cipher_suites.push(reader.read_u16::<BigEndian>()?.into());
        }

        let compression_methods = CompressionMethods::unmarshal(reader)?;

        let mut rest = vec![];
        reader.read_to_end(&mut rest)?;
        let extensions = unmarshal_extensions(&rest)?;

        Ok(HandshakeMessageClientHello {
            version: ProtocolVersion { major, minor },
            random,
            session_id,
            cookie,
            cipher_suites,
            compression_methods,
            extensions,
        })
    }
}
