use super::content::*;
use shared::error::*;

use byteorder::{ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// The change cipher spec protocol exists to signal transitions in
/// ciphering strategies. The protocol consists of a single message,
/// which is encrypted and compressed under the current (not the pending)
/// connection state. The message consists of a single byte of value 1.
/// <https://tools.ietf.org/html/rfc5246#section-7.1>
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ChangeCipherSpec;

impl ChangeCipherSpec {
    pub fn content_type(&self) -> ContentType {
        ContentType::ChangeCipherSpec
    }

    pub fn size(&self) -> usize {
        1
    }

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(0x01)?;
        Ok(writer.flush()?)
    }

    pub fn unmarshal<R: Read>(reader: &mut R) -> Result<Self> {
        let data = reader.read_u8()?;
        if data != 0x01 {
            return Err(Error::ErrInvalidCipherSpec);
        }

        Ok(ChangeCipherSpec {})
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use std::io::BufReader;

    #[test]
    fn test_change_cipher_spec_invalid() {
        let raw = vec![0x00];
        let mut reader = BufReader::new(raw.as_slice());
        assert_eq!(
            ChangeCipherSpec::unmarshal(&mut reader),
            Err(Error::ErrInvalidCipherSpec)
        );
    }
}
