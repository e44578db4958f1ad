use shared::error::*;

use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand_core::OsRng;
use std::fmt;

/// <https://www.iana.org/assignments/tls-parameters/tls-parameters.xml#tls-parameters-8>
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum NamedCurve {
    Unsupported = 0x0000,
    P256 = 0x0017,
    X25519 = 0x001d,
}

impl From<u16> for NamedCurve {
    fn from(val: u16) -> Self {
        match val {
            0x0017 => NamedCurve::P256,
            0x001d => NamedCurve::X25519,
            _ => NamedCurve::Unsupported,
        }
    }
}

impl fmt::Display for NamedCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            NamedCurve::P256 => write!(f, "secp256r1"),
            NamedCurve::X25519 => write!(f, "x25519"),
            NamedCurve::Unsupported => write!(f, "unsupported"),
        }
    }
}

pub(crate) enum NamedCurvePrivateKey {
    EphemeralSecretP256(p256::ecdh::EphemeralSecret),
    StaticSecretX25519(x25519_dalek::StaticSecret),
}

pub struct NamedCurveKeypair {
    pub(crate) curve: NamedCurve,
    pub(crate) public_key: Vec<u8>,
    pub(crate) private_key: NamedCurvePrivateKey,
}

fn elliptic_curve_keypair(curve: NamedCurve) -> Result<NamedCurveKeypair> {
    let (public_key, private_key) = match curve {
        NamedCurve::P256 => {
            let secret_key = p256::ecdh::EphemeralSecret::random(&mut OsRng);
            let public_key = secret_key.public_key().to_encoded_point(false);
            (
                public_key.as_bytes().to_vec(),
                NamedCurvePrivateKey::EphemeralSecretP256(secret_key),
            )
        }
        NamedCurve::X25519 => {
            let secret_key = x25519_dalek::StaticSecret::random_from_rng(OsRng);
            let public_key = x25519_dalek::PublicKey::from(&secret_key);
            (
                public_key.as_bytes().to_vec(),
                NamedCurvePrivateKey::StaticSecretX25519(secret_key),
            )
        }
        NamedCurve::Unsupported => return Err(Error::ErrInvalidNamedCurve),
    };

    Ok(NamedCurveKeypair {
        curve,
        public_key,
        private_key,
    })
}

impl NamedCurve {
    pub fn generate_keypair(&self) -> Result<NamedCurveKeypair> {
        elliptic_curve_keypair(*self)
    }
}

impl NamedCurveKeypair {
    /// ECDH with the peer's public key, which must be on the same curve.
    pub(crate) fn shared_secret(&self, remote_public_key: &[u8]) -> Result<Vec<u8>> {
        match &self.private_key {
            NamedCurvePrivateKey::EphemeralSecretP256(local_private_key) => {
                let remote_public_key = p256::PublicKey::from_sec1_bytes(remote_public_key)
                    .map_err(|_| Error::ErrInvalidNamedCurve)?;
                let secret = local_private_key.diffie_hellman(&remote_public_key);
                Ok(secret.raw_secret_bytes().to_vec())
            }
            NamedCurvePrivateKey::StaticSecretX25519(local_private_key) => {
                let remote_public_key: [u8; 32] = remote_public_key
                    .try_into()
                    .map_err(|_| Error::ErrInvalidNamedCurve)?;
                let public = x25519_dalek::PublicKey::from(remote_public_key);
                let secret = local_private_key.diffie_hellman(&public);
                Ok(secret.as_bytes().to_vec())
            }
        }
    }
}
