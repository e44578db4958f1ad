use super::content::*;
use shared::error::*;

use bytes::BytesMut;
use std::io::{Read, Write};

/// Application data messages are carried by the record layer and are
/// fragmented, compressed, and encrypted based on the current connection state.
/// <https://tools.ietf.org/html/rfc5246#section-10>
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ApplicationData {
    pub data: BytesMut,
}

impl ApplicationData {
    pub fn content_type(&self) -> ContentType {
        ContentType::ApplicationData
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(writer.flush()?)
    }

    pub fn unmarshal<R: Read>(reader: &mut R) -> Result<Self> {
        let mut data: Vec<u8> = vec![];
        reader.read_to_end(&mut data)?;

        Ok(ApplicationData {
            data: BytesMut::from(data.as_slice()),
        })
    }
}
