use super::*;
use crate::change_cipher_spec::ChangeCipherSpec;

use std::io::{BufReader, BufWriter};

#[test]
fn test_record_layer_change_cipher_spec() -> Result<()> {
    let raw = vec![
        0x14, 0xfe, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x12, 0x00, 0x01, 0x01,
    ];

    let mut reader = BufReader::new(raw.as_slice());
    let r = RecordLayer::unmarshal(&mut reader)?;
    assert_eq!(r.record_layer_header.protocol_version, PROTOCOL_VERSION1_0);
    assert_eq!(r.record_layer_header.sequence_number, 18);
    assert_eq!(r.content, Content::ChangeCipherSpec(ChangeCipherSpec {}));

    let mut out = vec![];
    {
        let mut writer = BufWriter::<&mut Vec<u8>>::new(out.as_mut());
        r.marshal(&mut writer)?;
    }
    assert_eq!(out, raw);

    Ok(())
}

#[test]
fn test_record_layer_rejects_dtls13_record_version() {
    let raw = vec![
        0x14, 0xfe, 0xfc, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01,
    ];
    let mut reader = BufReader::new(raw.as_slice());
    assert_eq!(
        RecordLayer::unmarshal(&mut reader),
        Err(Error::ErrUnsupportedProtocolVersion)
    );
}

#[test]
fn test_record_layer_sequence_overflow() {
    let h = RecordLayerHeader {
        sequence_number: MAX_SEQUENCE_NUMBER + 1,
        ..Default::default()
    };
    let mut out = vec![];
    assert_eq!(h.marshal(&mut out), Err(Error::ErrSequenceNumberOverflow));
}

#[test]
fn test_unpack_datagram() -> Result<()> {
    let record = vec![
        0x14, 0xfe, 0xfd, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01,
    ];

    assert!(unpack_datagram(&[])?.is_empty());

    let mut two = record.clone();
    two.extend_from_slice(&record);
    assert_eq!(unpack_datagram(&two)?, vec![record.clone(), record.clone()]);

    assert_eq!(
        unpack_datagram(&record[..RECORD_LAYER_HEADER_SIZE]),
        Err(Error::ErrInvalidPacketLength),
        "a bare header is too short"
    );

    let mut truncated = record.clone();
    truncated[12] = 0x02;
    assert_eq!(
        unpack_datagram(&truncated),
        Err(Error::ErrInvalidPacketLength)
    );

    Ok(())
}
