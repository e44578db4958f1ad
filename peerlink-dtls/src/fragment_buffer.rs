use crate::content::*;
use crate::handshake::handshake_header::*;
use crate::record_layer::record_layer_header::*;
use shared::error::*;

use std::collections::HashMap;
use std::io::{BufReader, BufWriter};

// 2 megabytes
const FRAGMENT_BUFFER_MAX_SIZE: usize = 2_000_000;

#[derive(Debug)]
pub(crate) struct Fragment {
    epoch: u16,
    handshake_header: HandshakeHeader,
    data: Vec<u8>,
}

/// Reassembles fragmented handshake messages in message_sequence order.
#[derive(Debug, Default)]
pub(crate) struct FragmentBuffer {
    // map of MessageSequenceNumbers that hold slices of fragments
    cache: HashMap<u16, Vec<Fragment>>,
    current_message_sequence_number: u16,
}

impl FragmentBuffer {
    pub(crate) fn new() -> Self {
        FragmentBuffer::default()
    }

    /// Attempts to push a DTLS packet to the FragmentBuffer. When it returns
    /// true it was a handshake record and the caller must not process it as
    /// anything else. Fragments of already delivered messages are dropped but
    /// still reported, so a retransmitted flight can be noticed.
    pub(crate) fn push(&mut self, buf: &[u8]) -> Result<bool> {
        if self.size() + buf.len() >= FRAGMENT_BUFFER_MAX_SIZE {
            return Err(Error::ErrFragmentBufferOverflow);
        }

        let mut reader = BufReader::new(buf);
        let record_layer_header = RecordLayerHeader::unmarshal(&mut reader)?;

        // Fragment isn't a handshake, we don't need to handle it
        if record_layer_header.content_type != ContentType::Handshake {
            return Ok(false);
        }

        let mut rest = &buf[RECORD_LAYER_HEADER_SIZE..];
        while !rest.is_empty() {
            let mut reader = BufReader::new(rest);
            let handshake_header = HandshakeHeader::unmarshal(&mut reader)?;

            let end = HANDSHAKE_HEADER_LENGTH + handshake_header.fragment_length as usize;
            if end > rest.len()
                || handshake_header.fragment_offset + handshake_header.fragment_length
                    > handshake_header.length
            {
                return Err(Error::ErrLengthMismatch);
            }

            if handshake_header.message_sequence >= self.current_message_sequence_number {
                self.cache
                    .entry(handshake_header.message_sequence)
                    .or_default()
                    .push(Fragment {
                        epoch: record_layer_header.epoch,
                        handshake_header,
                        data: rest[HANDSHAKE_HEADER_LENGTH..end].to_vec(),
                    });
            }

            rest = &rest[end..];
        }

        Ok(true)
    }

    /// Returns the next complete handshake message, header included and
    /// unfragmented, together with the epoch it was received in.
    pub(crate) fn pop(&mut self) -> Option<(Vec<u8>, u16)> {
        let frags = self.cache.get_mut(&self.current_message_sequence_number)?;
        frags.sort_by_key(|f| f.handshake_header.fragment_offset);

        let first = frags.first()?;
        let total = first.handshake_header.length as usize;
        let epoch = first.epoch;

        let mut content = Vec::with_capacity(total);
        for f in frags.iter() {
            let offset = f.handshake_header.fragment_offset as usize;
            if offset > content.len() {
                // gap, wait for the missing fragment
                return None;
            }
            let end = offset + f.data.len();
            if end > content.len() {
                content.extend_from_slice(&f.data[content.len() - offset..]);
            }
        }
        if content.len() != total {
            return None;
        }

        let mut handshake_header = first.handshake_header;
        handshake_header.fragment_offset = 0;
        handshake_header.fragment_length = handshake_header.length;

        let mut raw_header = vec![];
        {
            let mut writer = BufWriter::<&mut Vec<u8>>::new(raw_header.as_mut());
            if handshake_header.marshal(&mut writer).is_err() {
                return None;
            }
        }

        self.cache.remove(&self.current_message_sequence_number);
        self.current_message_sequence_number += 1;

        raw_header.extend_from_slice(&content);
        Some((raw_header, epoch))
    }

    fn size(&self) -> usize {
        self.cache
            .values()
            .flat_map(|frags| frags.iter())
            .map(|f| f.data.len())
            .sum()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn record(epoch: u16, fragments: &[(u16, u32, u32, &[u8])]) -> Vec<u8> {
        let mut body = vec![];
        for (seq, length, offset, data) in fragments {
            let h = HandshakeHeader {
                handshake_type: crate::handshake::HandshakeType::Certificate,
                length: *length,
                message_sequence: *seq,
                fragment_offset: *offset,
                fragment_length: data.len() as u32,
            };
            h.marshal(&mut body).unwrap();
            body.extend_from_slice(data);
        }

        let mut out = vec![];
        RecordLayerHeader {
            content_type: ContentType::Handshake,
            protocol_version: PROTOCOL_VERSION1_2,
            epoch,
            sequence_number: 0,
            content_len: body.len() as u16,
        }
        .marshal(&mut out)
        .unwrap();
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn test_fragment_buffer_reassembles_out_of_order() -> Result<()> {
        let mut fb = FragmentBuffer::new();

        assert!(fb.push(&record(0, &[(0, 6, 3, &[4, 5, 6])]))?);
        assert!(fb.pop().is_none(), "first half still missing");

        assert!(fb.push(&record(0, &[(0, 6, 0, &[1, 2, 3])]))?);
        let (raw, epoch) = fb.pop().expect("message complete");
        assert_eq!(epoch, 0);
        assert_eq!(&raw[HANDSHAKE_HEADER_LENGTH..], &[1, 2, 3, 4, 5, 6]);

        let mut reader = BufReader::new(&raw[..HANDSHAKE_HEADER_LENGTH]);
        let h = HandshakeHeader::unmarshal(&mut reader)?;
        assert_eq!(h.fragment_offset, 0);
        assert_eq!(h.fragment_length, 6);
        assert!(fb.pop().is_none());
        Ok(())
    }

    #[test]
    fn test_fragment_buffer_overlapping_and_multiple_messages() -> Result<()> {
        let mut fb = FragmentBuffer::new();
        assert!(fb.push(&record(
            0,
            &[(0, 4, 0, &[1, 2, 3]), (0, 4, 2, &[3, 4]), (1, 1, 0, &[9])]
        ))?);

        let (first, _) = fb.pop().expect("seq 0");
        assert_eq!(&first[HANDSHAKE_HEADER_LENGTH..], &[1, 2, 3, 4]);
        let (second, _) = fb.pop().expect("seq 1");
        assert_eq!(&second[HANDSHAKE_HEADER_LENGTH..], &[9]);
        Ok(())
    }

    #[test]
    fn test_fragment_buffer_ignores_delivered_and_non_handshake() -> Result<()> {
        let mut fb = FragmentBuffer::new();
        assert!(fb.push(&record(0, &[(0, 1, 0, &[7])]))?);
        assert!(fb.pop().is_some());

        // retransmission of a delivered message is reported but not buffered
        assert!(fb.push(&record(0, &[(0, 1, 0, &[7])]))?);
        assert!(fb.pop().is_none());

        let mut ccs = vec![];
        RecordLayerHeader {
            content_type: ContentType::ChangeCipherSpec,
            protocol_version: PROTOCOL_VERSION1_2,
            epoch: 0,
            sequence_number: 1,
            content_len: 1,
        }
        .marshal(&mut ccs)?;
        ccs.push(1);
        assert!(!fb.push(&ccs)?);
        Ok(())
    }

    #[test]
    fn test_fragment_buffer_rejects_truncated_fragment() {
        let mut fb = FragmentBuffer::new();
        let mut raw = record(0, &[(0, 4, 0, &[1, 2, 3, 4])]);
        raw.truncate(raw.len() - 2);
        assert_eq!(fb.push(&raw), Err(Error::ErrLengthMismatch));
    }
}
