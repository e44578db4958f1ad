//! X.509 certificates used to authenticate the DTLS handshake.
//!
//! Each peer presents a self-signed certificate and asserts its SHA-256
//! digest in the session description (`a=fingerprint`). The remote side
//! accepts the handshake only when the certificate it receives hashes to the
//! asserted value.
//!
//! ```
//! use peerlink::peer_connection::certificate::RTCCertificate;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)?;
//! let certificate = RTCCertificate::from_key_pair(key_pair)?;
//! for fp in certificate.get_fingerprints() {
//!     println!("a=fingerprint:{} {}", fp.algorithm, fp.value);
//! }
//! # Ok(())
//! # }
//! ```

use std::time::SystemTime;

use dtls::crypto::CryptoPrivateKey;
use rcgen::{CertificateParams, KeyPair};
use sha2::{Digest, Sha256};

use crate::peer_connection::transport::dtls::fingerprint::{
    FINGERPRINT_ALGORITHM_SHA256, RTCDtlsFingerprint,
};
use shared::error::{Error, Result};
use shared::util::math_rand_alpha;

/// A DTLS certificate together with its expiry.
///
/// Only ECDSA P-256 keys are accepted, which is the one signature scheme the
/// DTLS layer negotiates.
#[derive(Clone, Debug)]
pub struct RTCCertificate {
    pub(crate) dtls_certificate: dtls::crypto::Certificate,

    pub(crate) expires: SystemTime,
}

impl PartialEq for RTCCertificate {
    fn eq(&self, other: &Self) -> bool {
        self.dtls_certificate == other.dtls_certificate
    }
}

impl RTCCertificate {
    fn from_params(params: CertificateParams, key_pair: KeyPair) -> Result<Self> {
        let not_after = params.not_after;

        let x509_cert = params.self_signed(&key_pair)?;
        let private_key = CryptoPrivateKey::from_key_pair(&key_pair)?;

        Ok(Self {
            dtls_certificate: dtls::crypto::Certificate {
                certificate: vec![x509_cert.der().to_vec()],
                private_key,
            },
            expires: not_after.into(),
        })
    }

    /// Self-signs a certificate for `key_pair` with a random common name.
    pub fn from_key_pair(key_pair: KeyPair) -> Result<Self> {
        if key_pair.algorithm() != &rcgen::PKCS_ECDSA_P256_SHA256 {
            return Err(Error::Other("unsupported key_pair, expected ECDSA P-256".to_owned()));
        }

        RTCCertificate::from_params(CertificateParams::new(vec![math_rand_alpha(16)])?, key_pair)
    }

    /// Generates a fresh ECDSA P-256 certificate.
    pub fn generate() -> Result<Self> {
        let key_pair = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)?;
        RTCCertificate::from_key_pair(key_pair)
    }

    pub fn from_existing(dtls_certificate: dtls::crypto::Certificate, expires: SystemTime) -> Self {
        Self {
            dtls_certificate,
            expires,
        }
    }

    /// Time after which the certificate is no longer usable.
    pub fn expires(&self) -> SystemTime {
        self.expires
    }

    /// SHA-256 fingerprints of the certificate chain, formatted for
    /// `a=fingerprint`.
    pub fn get_fingerprints(&self) -> Vec<RTCDtlsFingerprint> {
        self.dtls_certificate
            .certificate
            .iter()
            .map(|c| RTCDtlsFingerprint {
                algorithm: FINGERPRINT_ALGORITHM_SHA256.to_owned(),
                value: fingerprint_sha256(c),
            })
            .collect()
    }
}

/// Lowercase colon separated hex of the SHA-256 digest of `der`.
pub(crate) fn fingerprint_sha256(der: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(der);
    let hashed = h.finalize();
    hex::encode(hashed)
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<String>>()
        .join(":")
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_generate_certificate_ecdsa() -> Result<()> {
        let kp = KeyPair::generate_for(&rcgen::PKCS_ECDSA_P256_SHA256)?;
        let cert = RTCCertificate::from_key_pair(kp)?;

        assert_eq!(cert.dtls_certificate.certificate.len(), 1);
        assert!(cert.expires() > SystemTime::now());

        Ok(())
    }

    #[test]
    fn test_certificate_rejects_other_keys() -> Result<()> {
        let kp = KeyPair::generate_for(&rcgen::PKCS_ED25519)?;
        assert!(RTCCertificate::from_key_pair(kp).is_err());
        Ok(())
    }

    #[test]
    fn test_certificate_equal() -> Result<()> {
        let cert1 = RTCCertificate::generate()?;
        let cert2 = RTCCertificate::generate()?;

        assert_eq!(cert1, cert1.clone());
        assert_ne!(cert1, cert2);

        Ok(())
    }

    #[test]
    fn test_certificate_fingerprints() -> Result<()> {
        let cert = RTCCertificate::generate()?;
        let fingerprints = cert.get_fingerprints();

        assert_eq!(fingerprints.len(), 1);
        assert_eq!(fingerprints[0].algorithm, "sha-256");
        let value = &fingerprints[0].value;
        assert_eq!(value.len(), 32 * 3 - 1);
        assert!(
            value
                .split(':')
                .all(|b| b.len() == 2 && b.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()))
        );

        Ok(())
    }

    #[test]
    fn test_certificate_from_existing() -> Result<()> {
        let cert = RTCCertificate::generate()?;
        let expires = SystemTime::now() + Duration::from_secs(3600);
        let existing = RTCCertificate::from_existing(cert.dtls_certificate.clone(), expires);

        assert_eq!(existing, cert);
        assert_eq!(existing.expires(), expires);
        assert_eq!(existing.get_fingerprints(), cert.get_fingerprints());

        Ok(())
    }
}
