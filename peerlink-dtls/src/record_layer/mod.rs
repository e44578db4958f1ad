#[cfg(test)]
mod record_layer_test;

pub mod record_layer_header;

use super::content::*;
use record_layer_header::*;
use shared::error::*;

use std::io::{Read, Write};

/// The record layer is the DTLS framing of every message: it identifies the
/// content type, the epoch of the cipher state and the record sequence number.
/// <https://tools.ietf.org/html/rfc6347#section-4.1>
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayer {
    pub record_layer_header: RecordLayerHeader,
    pub content: Content,
}

impl RecordLayer {
    pub fn new(protocol_version: ProtocolVersion, epoch: u16, content: Content) -> Self {
        RecordLayer {
            record_layer_header: RecordLayerHeader {
                content_type: content.content_type(),
                protocol_version,
                epoch,
                sequence_number: 0,
                content_len: content.size() as u16,
            },
            content,
        }
    }

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        let header = RecordLayerHeader {
            content_type: self.content.content_type(),
            content_len: self.content.size() as u16,
            ..self.record_layer_header
        };
        header.marshal(writer)?;
        self.content.marshal(writer)?;
        Ok(())
    }

    pub fn unmarshal<R: Read>(reader: &mut R) -> Result<Self> {
        let record_layer_header = RecordLayerHeader::unmarshal(reader)?;
        let content = Content::unmarshal(record_layer_header.content_type, reader)?;

        Ok(RecordLayer {
            record_layer_header,
            content,
        })
    }
}

/// Note that as with TLS, multiple handshake messages may be placed in
/// the same DTLS record, provided that there is room and that they are
/// part of the same flight. Thus, there are two acceptable ways to pack
/// two DTLS messages into the same datagram: in the same record or in
/// separate records.
/// <https://tools.ietf.org/html/rfc6347#section-4.2.3>
pub(crate) fn unpack_datagram(buf: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut out = vec![];

    let mut offset = 0;
    while buf.len() != offset {
        if buf.len() - offset <= RECORD_LAYER_HEADER_SIZE {
            return Err(Error::ErrInvalidPacketLength);
        }

        let pkt_len = RECORD_LAYER_HEADER_SIZE
            + (((buf[offset + RECORD_LAYER_HEADER_SIZE - 2] as usize) << 8)
                | buf[offset + RECORD_LAYER_HEADER_SIZE - 1] as usize);
        if offset + pkt_len > buf.len() {
            return Err(Error::ErrInvalidPacketLength);
        }

        out.push(buf[offset..offset + pkt_len].to_vec());
        offset += pkt_len;
    }

    Ok(out)
}
