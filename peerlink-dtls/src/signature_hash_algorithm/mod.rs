use crate::crypto::*;
use shared::error::*;

use std::fmt;

/// HashAlgorithm is used to indicate the hash algorithm used
/// <https://tools.ietf.org/html/rfc5246#section-7.4.1.4.1>
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum HashAlgorithm {
    Sha256 = 4,
    Unsupported,
}

impl From<u8> for HashAlgorithm {
    fn from(val: u8) -> Self {
        match val {
            4 => HashAlgorithm::Sha256,
            _ => HashAlgorithm::Unsupported,
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HashAlgorithm::Sha256 => write!(f, "sha-256"),
            _ => write!(f, "unknown or unsupported hash algorithm"),
        }
    }
}

/// SignatureAlgorithm as defined in <https://tools.ietf.org/html/rfc5246#section-7.4.1.4.1>
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum SignatureAlgorithm {
    Ecdsa = 3,
    Unsupported,
}

impl From<u8> for SignatureAlgorithm {
    fn from(val: u8) -> Self {
        match val {
            3 => SignatureAlgorithm::Ecdsa,
            _ => SignatureAlgorithm::Unsupported,
        }
    }
}

/// SignatureHashAlgorithm is a signature/hash algorithm pair
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct SignatureHashAlgorithm {
    pub hash: HashAlgorithm,
    pub signature: SignatureAlgorithm,
}

/// ecdsa_secp256r1_sha256, the only scheme both offered and accepted.
pub const ECDSA_SECP256R1_SHA256: SignatureHashAlgorithm = SignatureHashAlgorithm {
    hash: HashAlgorithm::Sha256,
    signature: SignatureAlgorithm::Ecdsa,
};

impl SignatureHashAlgorithm {
    pub fn is_supported(&self) -> bool {
        self.hash != HashAlgorithm::Unsupported && self.signature != SignatureAlgorithm::Unsupported
    }

    /// is_compatible checks that given private key is compatible with the signature scheme.
    pub(crate) fn is_compatible(&self, private_key: &CryptoPrivateKey) -> bool {
        match &private_key.kind {
            CryptoPrivateKeyKind::Ecdsa256(_) => self.signature == SignatureAlgorithm::Ecdsa,
        }
    }
}

pub(crate) fn default_signature_schemes() -> Vec<SignatureHashAlgorithm> {
    vec![ECDSA_SECP256R1_SHA256]
}

/// select Signature Scheme returns most preferred and compatible scheme.
pub(crate) fn select_signature_scheme(
    sigs: &[SignatureHashAlgorithm],
    private_key: &CryptoPrivateKey,
) -> Result<SignatureHashAlgorithm> {
    for ss in sigs {
        if ss.is_supported() && ss.is_compatible(private_key) {
            return Ok(*ss);
        }
    }

    Err(Error::ErrNoAvailableSignatureSchemes)
}
