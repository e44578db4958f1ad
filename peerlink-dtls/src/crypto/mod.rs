#[cfg(test)]
mod crypto_test;

pub mod crypto_gcm;

use crate::curve::named_curve::*;
use crate::record_layer::record_layer_header::*;
use crate::signature_hash_algorithm::*;
use shared::error::*;

use ring::rand::SystemRandom;
use ring::signature::{
    ECDSA_P256_SHA256_ASN1, ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, UnparsedPublicKey,
};
use std::sync::Arc;

/// A certificate chain and the private key of its leaf.
#[derive(Clone, PartialEq, Debug)]
pub struct Certificate {
    pub certificate: Vec<Vec<u8>>,
    pub private_key: CryptoPrivateKey,
}

impl Certificate {
    /// Generates an ECDSA P-256 self-signed certificate for `subject_alt_names`.
    pub fn generate_self_signed(subject_alt_names: impl Into<Vec<String>>) -> Result<Self> {
        let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)?;
        let cert = rcgen::CertificateParams::new(subject_alt_names)?.self_signed(&key_pair)?;

        Ok(Certificate {
            certificate: vec![cert.der().to_vec()],
            private_key: CryptoPrivateKey::from_key_pair(&key_pair)?,
        })
    }
}

#[derive(Debug)]
pub enum CryptoPrivateKeyKind {
    Ecdsa256(Arc<EcdsaKeyPair>),
}

/// Private key with its PKCS#8 encoding kept for comparison.
#[derive(Debug)]
pub struct CryptoPrivateKey {
    pub kind: CryptoPrivateKeyKind,
    pub serialized_der: Vec<u8>,
}

impl PartialEq for CryptoPrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.serialized_der == other.serialized_der
    }
}

impl Clone for CryptoPrivateKey {
    fn clone(&self) -> Self {
        match &self.kind {
            CryptoPrivateKeyKind::Ecdsa256(key) => CryptoPrivateKey {
                kind: CryptoPrivateKeyKind::Ecdsa256(Arc::clone(key)),
                serialized_der: self.serialized_der.clone(),
            },
        }
    }
}

impl CryptoPrivateKey {
    pub fn from_key_pair(key_pair: &rcgen::KeyPair) -> Result<Self> {
        let serialized_der = key_pair.serialize_der();
        if key_pair.algorithm() != &rcgen::PKCS_ECDSA_P256_SHA256 {
            return Err(Error::ErrInvalidPrivateKey);
        }

        let key = EcdsaKeyPair::from_pkcs8(
            &ECDSA_P256_SHA256_ASN1_SIGNING,
            &serialized_der,
            &SystemRandom::new(),
        )
        .map_err(|e| Error::Other(e.to_string()))?;

        Ok(CryptoPrivateKey {
            kind: CryptoPrivateKeyKind::Ecdsa256(Arc::new(key)),
            serialized_der,
        })
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        match &self.kind {
            CryptoPrivateKeyKind::Ecdsa256(key) => {
                let signature = key
                    .sign(&SystemRandom::new(), message)
                    .map_err(|e| Error::Other(e.to_string()))?;
                Ok(signature.as_ref().to_vec())
            }
        }
    }
}

/// Signed portion of ServerKeyExchange.
/// <https://tools.ietf.org/html/rfc8422#section-5.4>
pub(crate) fn value_key_message(
    client_random: &[u8],
    server_random: &[u8],
    public_key: &[u8],
    named_curve: NamedCurve,
) -> Vec<u8> {
    let mut server_ecdh_params = vec![0u8; 4];
    server_ecdh_params[0] = 3; // named curve
    server_ecdh_params[1..3].copy_from_slice(&(named_curve as u16).to_be_bytes());
    server_ecdh_params[3] = public_key.len() as u8;

    let mut plaintext = vec![];
    plaintext.extend_from_slice(client_random);
    plaintext.extend_from_slice(server_random);
    plaintext.extend_from_slice(&server_ecdh_params);
    plaintext.extend_from_slice(public_key);

    plaintext
}

pub(crate) fn generate_key_signature(
    client_random: &[u8],
    server_random: &[u8],
    public_key: &[u8],
    named_curve: NamedCurve,
    private_key: &CryptoPrivateKey,
) -> Result<Vec<u8>> {
    let msg = value_key_message(client_random, server_random, public_key, named_curve);
    private_key.sign(&msg)
}

fn verify_signature(
    message: &[u8],
    hash_algorithm: HashAlgorithm,
    remote_signature: &[u8],
    raw_certificates: &[Vec<u8>],
) -> Result<()> {
    if raw_certificates.is_empty() {
        return Err(Error::ErrLengthMismatch);
    }
    if hash_algorithm != HashAlgorithm::Sha256 {
        return Err(Error::ErrInvalidHashAlgorithm);
    }

    let (_, certificate) = x509_parser::parse_x509_certificate(&raw_certificates[0])
        .map_err(|e| Error::Other(e.to_string()))?;

    let public_key = certificate.public_key();
    if public_key.algorithm.algorithm != x509_parser::oid_registry::OID_KEY_TYPE_EC_PUBLIC_KEY {
        return Err(Error::ErrKeySignatureVerifyUnimplemented);
    }

    let peer_public_key = UnparsedPublicKey::new(
        &ECDSA_P256_SHA256_ASN1,
        public_key.subject_public_key.data.to_vec(),
    );
    peer_public_key
        .verify(message, remote_signature)
        .map_err(|_| Error::ErrKeySignatureMismatch)
}

pub(crate) fn verify_key_signature(
    message: &[u8],
    hash_algorithm: HashAlgorithm,
    remote_key_signature: &[u8],
    raw_certificates: &[Vec<u8>],
) -> Result<()> {
    verify_signature(
        message,
        hash_algorithm,
        remote_key_signature,
        raw_certificates,
    )
}

/// If the server has sent a CertificateRequest message, the client MUST send the Certificate
/// message. The ClientKeyExchange message is now sent, and the content
/// of that message will depend on the public key algorithm selected
/// between the ClientHello and the ServerHello. If the client has sent
/// a certificate with signing ability, a digitally-signed
/// CertificateVerify message is sent to explicitly verify possession of
/// the private key in the certificate.
/// <https://tools.ietf.org/html/rfc5246#section-7.3>
pub(crate) fn generate_certificate_verify(
    handshake_bodies: &[u8],
    private_key: &CryptoPrivateKey,
) -> Result<Vec<u8>> {
    private_key.sign(handshake_bodies)
}

pub(crate) fn verify_certificate_verify(
    handshake_bodies: &[u8],
    hash_algorithm: HashAlgorithm,
    remote_key_signature: &[u8],
    raw_certificates: &[Vec<u8>],
) -> Result<()> {
    verify_signature(
        handshake_bodies,
        hash_algorithm,
        remote_key_signature,
        raw_certificates,
    )
}

pub(crate) fn load_certs(raw_certificates: &[Vec<u8>]) -> Result<()> {
    if raw_certificates.is_empty() {
        return Err(Error::ErrLengthMismatch);
    }

    for raw_cert in raw_certificates {
        x509_parser::parse_x509_certificate(raw_cert)
            .map_err(|_| Error::ErrInvalidCertificate)?;
    }

    Ok(())
}

pub(crate) fn generate_aead_additional_data(h: &RecordLayerHeader, payload_len: usize) -> [u8; 13] {
    let mut additional_data = [0u8; 13];
    // SequenceNumber MUST be set first
    // we only want uint48, clobbering an extra 2 (using uint64, rust doesn't have uint48)
    additional_data[..8].copy_from_slice(&h.sequence_number.to_be_bytes());
    additional_data[..2].copy_from_slice(&h.epoch.to_be_bytes());
    additional_data[8] = h.content_type as u8;
    additional_data[9] = h.protocol_version.major;
    additional_data[10] = h.protocol_version.minor;
    additional_data[11..].copy_from_slice(&(payload_len as u16).to_be_bytes());

    additional_data
}
