use super::crypto_gcm::*;
use super::*;
use crate::content::*;

#[test]
fn test_key_signature_round_trip() -> Result<()> {
    let certificate = Certificate::generate_self_signed(vec!["peerlink".to_owned()])?;
    let client_random = [0x01u8; 32];
    let server_random = [0x02u8; 32];
    let public_key = NamedCurve::X25519.generate_keypair()?.public_key;

    let signature = generate_key_signature(
        &client_random,
        &server_random,
        &public_key,
        NamedCurve::X25519,
        &certificate.private_key,
    )?;

    let message = value_key_message(&client_random, &server_random, &public_key, NamedCurve::X25519);
    verify_key_signature(
        &message,
        HashAlgorithm::Sha256,
        &signature,
        &certificate.certificate,
    )?;

    let tampered = value_key_message(&server_random, &client_random, &public_key, NamedCurve::X25519);
    assert_eq!(
        verify_key_signature(
            &tampered,
            HashAlgorithm::Sha256,
            &signature,
            &certificate.certificate,
        ),
        Err(Error::ErrKeySignatureMismatch)
    );

    Ok(())
}

#[test]
fn test_certificate_verify_wrong_certificate() -> Result<()> {
    let a = Certificate::generate_self_signed(vec!["a".to_owned()])?;
    let b = Certificate::generate_self_signed(vec!["b".to_owned()])?;

    let bodies = b"client hello server hello".to_vec();
    let signature = generate_certificate_verify(&bodies, &a.private_key)?;
    verify_certificate_verify(&bodies, HashAlgorithm::Sha256, &signature, &a.certificate)?;
    assert_eq!(
        verify_certificate_verify(&bodies, HashAlgorithm::Sha256, &signature, &b.certificate),
        Err(Error::ErrKeySignatureMismatch)
    );
    assert_eq!(
        verify_certificate_verify(&bodies, HashAlgorithm::Sha256, &signature, &[]),
        Err(Error::ErrLengthMismatch)
    );

    Ok(())
}

#[test]
fn test_crypto_gcm() -> Result<()> {
    let key_a = [0x11u8; 16];
    let key_b = [0x22u8; 16];
    let iv_a = [0x01u8, 0x02, 0x03, 0x04];
    let iv_b = [0x05u8, 0x06, 0x07, 0x08];
    let local = CryptoGcm::new(&key_a, &iv_a, &key_b, &iv_b)?;
    let remote = CryptoGcm::new(&key_b, &iv_b, &key_a, &iv_a)?;

    let header = RecordLayerHeader {
        content_type: ContentType::ApplicationData,
        protocol_version: PROTOCOL_VERSION1_2,
        epoch: 1,
        sequence_number: 7,
        content_len: 5,
    };
    let mut raw = vec![];
    header.marshal(&mut raw)?;
    raw.extend_from_slice(b"hello");

    let encrypted = local.encrypt(&header, &raw)?;
    assert_eq!(encrypted.len(), raw.len() + 8 + 16);
    assert_ne!(&encrypted[21..26], b"hello");

    let decrypted = remote.decrypt(&encrypted)?;
    assert_eq!(decrypted, raw);

    let mut tampered = encrypted.clone();
    let last = tampered.len() - 1;
    tampered[last] ^= 0xff;
    assert_eq!(remote.decrypt(&tampered), Err(Error::ErrDecryptPacket));

    assert_eq!(
        remote.decrypt(&encrypted[..RECORD_LAYER_HEADER_SIZE + 4]),
        Err(Error::ErrNotEnoughRoomForNonce)
    );

    Ok(())
}
