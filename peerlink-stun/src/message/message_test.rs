use super::*;
use crate::dtls_in_stun::*;
use crate::error_code::*;
use crate::fingerprint::*;
use crate::integrity::*;
use crate::textattrs::*;
use crate::xoraddr::*;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

#[test]
fn test_message_type_value() {
    let tests = vec![
        (BINDING_REQUEST, 0x0001),
        (BINDING_SUCCESS, 0x0101),
        (BINDING_ERROR, 0x0111),
    ];

    for (input, output) in tests {
        let b = input.value();
        assert_eq!(b, output, "value({input}) -> {b:x}, want {output:x}");

        let mut m = MessageType::default();
        m.read_value(output);
        assert_eq!(m, input);
    }
}

#[test]
fn test_is_message() {
    let mut m = Message::new();
    m.build(&[Box::new(BINDING_REQUEST), Box::new(TransactionId::new())])
        .unwrap();

    assert!(is_message(&m.raw));
    assert!(!is_message(&m.raw[..MESSAGE_HEADER_SIZE - 1]));
    // DTLS record header
    assert!(!is_message(&[
        22, 0xfe, 0xfd, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0
    ]));
}

#[test]
fn test_binding_request_with_credentials() -> Result<()> {
    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(Username::new(ATTR_USERNAME, "remote:local".to_owned())),
        Box::new(MessageIntegrity::new_short_term_integrity(
            "secret-password".to_owned(),
        )),
        Box::new(FINGERPRINT),
    ])?;

    let mut decoded = Message::new();
    decoded.unmarshal_binary(&m.raw)?;
    assert_eq!(decoded, m);

    let mut username = Username::new(ATTR_USERNAME, String::new());
    username.get_from(&decoded)?;
    assert_eq!(username.to_string(), "remote:local");

    FINGERPRINT.check(&decoded)?;
    MessageIntegrity::new_short_term_integrity("secret-password".to_owned())
        .check(&mut decoded)?;
    assert_eq!(
        MessageIntegrity::new_short_term_integrity("wrong".to_owned()).check(&mut decoded),
        Err(Error::ErrIntegrityMismatch)
    );

    // flip one bit of the username
    let mut tampered = m.raw.clone();
    tampered[MESSAGE_HEADER_SIZE + ATTRIBUTE_HEADER_SIZE] ^= 0x01;
    let mut decoded = Message::new();
    decoded.unmarshal_binary(&tampered)?;
    assert_eq!(
        FINGERPRINT.check(&decoded),
        Err(Error::ErrFingerprintMismatch)
    );

    Ok(())
}

#[test]
fn test_integrity_after_fingerprint_rejected() {
    let mut m = Message::new();
    let result = m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(FINGERPRINT),
        Box::new(MessageIntegrity::new_short_term_integrity("pwd".to_owned())),
    ]);
    assert_eq!(result, Err(Error::ErrFingerprintBeforeIntegrity));
}

#[test]
fn test_xor_mapped_address() -> Result<()> {
    for ip in [
        IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)),
        IpAddr::V6(Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 0x42)),
    ] {
        let mut m = Message::new();
        m.build(&[
            Box::new(BINDING_SUCCESS),
            Box::new(TransactionId::new()),
            Box::new(XorMappedAddress { ip, port: 51000 }),
        ])?;

        // the port is obfuscated on the wire
        let v = m.get(crate::attributes::ATTR_XORMAPPED_ADDRESS)?;
        assert_ne!(u16::from_be_bytes([v[2], v[3]]), 51000);

        let mut decoded = Message::new();
        decoded.unmarshal_binary(&m.raw)?;
        let mut addr = XorMappedAddress::default();
        addr.get_from(&decoded)?;
        assert_eq!(addr.ip, ip);
        assert_eq!(addr.port, 51000);
    }

    Ok(())
}

#[test]
fn test_error_code_attribute() -> Result<()> {
    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_ERROR),
        Box::new(TransactionId::new()),
        Box::new(CODE_ROLE_CONFLICT),
    ])?;

    let mut decoded = Message::new();
    decoded.unmarshal_binary(&m.raw)?;
    let mut code = ErrorCodeAttribute::default();
    code.get_from(&decoded)?;
    assert_eq!(code.code, CODE_ROLE_CONFLICT);
    assert_eq!(code.reason, b"Role Conflict".to_vec());

    Ok(())
}

#[test]
fn test_dtls_in_stun_attributes() -> Result<()> {
    let record = vec![22u8, 0xfe, 0xfd, 0, 0, 0, 0, 0, 0, 0, 1, 0, 3, 1, 2, 3];
    let mut m = Message::new();
    m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(DtlsInStun(record.clone())),
        Box::new(DtlsInStunAck(vec![0xdeadbeef, 7])),
        Box::new(FINGERPRINT),
    ])?;

    let mut decoded = Message::new();
    decoded.unmarshal_binary(&m.raw)?;
    let mut data = DtlsInStun::default();
    data.get_from(&decoded)?;
    assert_eq!(data.0, record);
    let mut ack = DtlsInStunAck::default();
    ack.get_from(&decoded)?;
    assert_eq!(ack.0, vec![0xdeadbeef, 7]);

    let mut m = Message::new();
    let too_many = m.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(DtlsInStunAck(vec![1, 2, 3, 4, 5])),
    ]);
    assert_eq!(too_many, Err(Error::ErrTooManyPiggybackAcks));

    // an empty ack list is still present and signals support
    let mut m = Message::new();
    m.build(&[Box::new(BINDING_REQUEST), Box::new(DtlsInStunAck(vec![]))])?;
    let mut ack = DtlsInStunAck(vec![9]);
    ack.get_from(&m)?;
    assert!(ack.0.is_empty());

    Ok(())
}

#[test]
fn test_decode_truncated() {
    let mut m = Message::new();
    assert_eq!(
        m.unmarshal_binary(&[0, 1, 0, 8]),
        Err(Error::ErrUnexpectedHeaderEof)
    );

    let mut ok = Message::new();
    ok.build(&[
        Box::new(BINDING_REQUEST),
        Box::new(TransactionId::new()),
        Box::new(Software::new(ATTR_SOFTWARE, "peerlink".to_owned())),
    ])
    .unwrap();
    let truncated = &ok.raw[..ok.raw.len() - 4];
    let mut m = Message::new();
    assert!(m.unmarshal_binary(truncated).is_err());
}
