use super::handshake_random::*;
use super::*;
use crate::cipher_suite::*;
use crate::compression_methods::*;
use crate::extension::extension_supported_elliptic_curves::*;
use crate::extension::extension_use_extended_master_secret::*;
use crate::extension::*;
use crate::record_layer::record_layer_header::*;

use std::time::{Duration, SystemTime};

fn client_hello() -> HandshakeMessageClientHello {
    HandshakeMessageClientHello {
        version: PROTOCOL_VERSION1_2,
        random: HandshakeRandom {
            gmt_unix_time: SystemTime::UNIX_EPOCH + Duration::from_secs(560149025),
            random_bytes: [0x42; RANDOM_BYTES_LENGTH],
        },
        session_id: vec![],
        cookie: vec![0xe6; 20],
        cipher_suites: vec![CipherSuiteId::Tls_Ecdhe_Ecdsa_With_Aes_128_Gcm_Sha256],
        compression_methods: CompressionMethods::default(),
        extensions: vec![
            Extension::SupportedEllipticCurves(ExtensionSupportedEllipticCurves {
                elliptic_curves: vec![crate::curve::named_curve::NamedCurve::X25519],
            }),
            Extension::UseExtendedMasterSecret(ExtensionUseExtendedMasterSecret {
                supported: true,
            }),
        ],
    }
}

#[test]
fn test_handshake_client_hello() -> Result<()> {
    let mut h = Handshake::new(HandshakeMessage::ClientHello(client_hello()));
    h.handshake_header.message_sequence = 1;

    let mut raw = vec![];
    h.marshal(&mut raw)?;
    assert_eq!(raw.len(), h.size());
    assert_eq!(raw[0], HandshakeType::ClientHello as u8);
    assert_eq!(&raw[4..6], &[0x00, 0x01], "message_seq");
    assert_eq!(&raw[12..14], &[0xfe, 0xfd], "client_version");

    let mut reader = BufReader::new(raw.as_slice());
    let parsed = Handshake::unmarshal(&mut reader)?;
    assert_eq!(parsed, h);

    Ok(())
}

#[test]
fn test_handshake_rejects_fragment() -> Result<()> {
    let h = Handshake::new(HandshakeMessage::ClientHello(client_hello()));
    let mut raw = vec![];
    h.marshal(&mut raw)?;

    // fragment_length of 1 on a longer message
    raw[9..12].copy_from_slice(&[0x00, 0x00, 0x01]);
    let mut reader = BufReader::new(raw.as_slice());
    assert_eq!(
        Handshake::unmarshal(&mut reader).err(),
        Some(Error::ErrLengthMismatch)
    );

    Ok(())
}

#[test]
fn test_handshake_unsupported_type() {
    let raw = vec![
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    ];
    let mut reader = BufReader::new(raw.as_slice());
    assert_eq!(
        Handshake::unmarshal(&mut reader).err(),
        Some(Error::ErrUnsupportedHandshakeType)
    );
}

#[test]
fn test_client_hello_cookie_too_long() {
    let mut ch = client_hello();
    ch.cookie = vec![0u8; 256];
    let mut raw = vec![];
    assert_eq!(ch.marshal(&mut raw).err(), Some(Error::ErrCookieTooLong));
}

#[test]
fn test_hello_verify_request() -> Result<()> {
    let raw = vec![
        0xfe, 0xff, 0x14, 0x25, 0xfb, 0xee, 0xb3, 0x7c, 0x95, 0xcf, 0x00, 0xeb, 0xad, 0xe2, 0xef,
        0xc7, 0xfd, 0xbb, 0xed, 0xf7, 0x1f, 0x6c, 0xcd,
    ];
    let mut reader = BufReader::new(raw.as_slice());
    let hvr = HandshakeMessageHelloVerifyRequest::unmarshal(&mut reader)?;
    assert_eq!(hvr.version, PROTOCOL_VERSION1_0);
    assert_eq!(hvr.cookie.len(), 20);

    let mut out = vec![];
    hvr.marshal(&mut out)?;
    assert_eq!(out, raw);
    Ok(())
}

#[test]
fn test_certificate_chain() -> Result<()> {
    let msg = HandshakeMessageCertificate {
        certificate: vec![vec![1, 2, 3], vec![4]],
    };
    let mut raw = vec![];
    msg.marshal(&mut raw)?;
    assert_eq!(
        raw,
        vec![0x00, 0x00, 0x0a, 0x00, 0x00, 0x03, 1, 2, 3, 0x00, 0x00, 0x01, 4]
    );

    let mut reader = BufReader::new(raw.as_slice());
    assert_eq!(HandshakeMessageCertificate::unmarshal(&mut reader)?, msg);
    Ok(())
}
