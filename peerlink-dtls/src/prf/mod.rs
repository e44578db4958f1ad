#[cfg(test)]
mod prf_test;

use shared::error::*;

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::fmt;

pub(crate) const PRF_MASTER_SECRET_LABEL: &str = "master secret";
pub(crate) const PRF_EXTENDED_MASTER_SECRET_LABEL: &str = "extended master secret";
pub(crate) const PRF_KEY_EXPANSION_LABEL: &str = "key expansion";
pub(crate) const PRF_VERIFY_DATA_CLIENT_LABEL: &str = "client finished";
pub(crate) const PRF_VERIFY_DATA_SERVER_LABEL: &str = "server finished";

const MASTER_SECRET_LENGTH: usize = 48;
const VERIFY_DATA_LENGTH: usize = 12;

type HmacSha256 = Hmac<Sha256>;

#[derive(PartialEq, Eq, Debug, Clone)]
pub(crate) struct EncryptionKeys {
    pub(crate) master_secret: Vec<u8>,
    pub(crate) client_mac_key: Vec<u8>,
    pub(crate) server_mac_key: Vec<u8>,
    pub(crate) client_write_key: Vec<u8>,
    pub(crate) server_write_key: Vec<u8>,
    pub(crate) client_write_iv: Vec<u8>,
    pub(crate) server_write_iv: Vec<u8>,
}

impl fmt::Display for EncryptionKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EncryptionKeys: key_len={} iv_len={}",
            self.client_write_key.len(),
            self.client_write_iv.len(),
        )
    }
}

fn hmac_sha256(secret: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|e| Error::Other(e.to_string()))?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}

/// P_hash from RFC 5246, instantiated with HMAC-SHA256.
///
/// ```text
/// P_hash(secret, seed) = HMAC_hash(secret, A(1) + seed) +
///                        HMAC_hash(secret, A(2) + seed) +
///                        HMAC_hash(secret, A(3) + seed) + ...
/// A(0) = seed
/// A(i) = HMAC_hash(secret, A(i-1))
/// ```
/// <https://tools.ietf.org/html/rfc5246#section-5>
pub(crate) fn prf_p_hash(secret: &[u8], seed: &[u8], requested_length: usize) -> Result<Vec<u8>> {
    let mut last_round = seed.to_vec();
    let mut out = Vec::with_capacity(requested_length);

    while out.len() < requested_length {
        last_round = hmac_sha256(secret, &[&last_round])?;
        let with_secret = hmac_sha256(secret, &[&last_round, seed])?;
        let take = (requested_length - out.len()).min(with_secret.len());
        out.extend_from_slice(&with_secret[..take]);
    }

    Ok(out)
}

fn labeled_seed(label: &str, parts: &[&[u8]]) -> Vec<u8> {
    let mut seed = label.as_bytes().to_vec();
    for part in parts {
        seed.extend_from_slice(part);
    }
    seed
}

pub(crate) fn prf_master_secret(
    pre_master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
) -> Result<Vec<u8>> {
    let seed = labeled_seed(PRF_MASTER_SECRET_LABEL, &[client_random, server_random]);
    prf_p_hash(pre_master_secret, &seed, MASTER_SECRET_LENGTH)
}

/// <https://tools.ietf.org/html/rfc7627#section-4>
pub(crate) fn prf_extended_master_secret(
    pre_master_secret: &[u8],
    session_hash: &[u8],
) -> Result<Vec<u8>> {
    let seed = labeled_seed(PRF_EXTENDED_MASTER_SECRET_LABEL, &[session_hash]);
    prf_p_hash(pre_master_secret, &seed, MASTER_SECRET_LENGTH)
}

/// Derives the key block. The seed order is server random then client random.
pub(crate) fn prf_encryption_keys(
    master_secret: &[u8],
    client_random: &[u8],
    server_random: &[u8],
    prf_mac_len: usize,
    prf_key_len: usize,
    prf_iv_len: usize,
) -> Result<EncryptionKeys> {
    let seed = labeled_seed(PRF_KEY_EXPANSION_LABEL, &[server_random, client_random]);
    let material = prf_p_hash(
        master_secret,
        &seed,
        (2 * prf_mac_len) + (2 * prf_key_len) + (2 * prf_iv_len),
    )?;
    let mut key_material = &material[..];

    let client_mac_key = key_material[..prf_mac_len].to_vec();
    key_material = &key_material[prf_mac_len..];

    let server_mac_key = key_material[..prf_mac_len].to_vec();
    key_material = &key_material[prf_mac_len..];

    let client_write_key = key_material[..prf_key_len].to_vec();
    key_material = &key_material[prf_key_len..];

    let server_write_key = key_material[..prf_key_len].to_vec();
    key_material = &key_material[prf_key_len..];

    let client_write_iv = key_material[..prf_iv_len].to_vec();
    key_material = &key_material[prf_iv_len..];

    let server_write_iv = key_material[..prf_iv_len].to_vec();

    Ok(EncryptionKeys {
        master_secret: master_secret.to_vec(),
        client_mac_key,
        server_mac_key,
        client_write_key,
        server_write_key,
        client_write_iv,
        server_write_iv,
    })
}

fn prf_verify_data(master_secret: &[u8], handshake_bodies: &[u8], label: &str) -> Result<Vec<u8>> {
    let mut hasher = Sha256::new();
    hasher.update(handshake_bodies);
    let result = hasher.finalize();

    let seed = labeled_seed(label, &[result.as_slice()]);
    prf_p_hash(master_secret, &seed, VERIFY_DATA_LENGTH)
}

pub(crate) fn prf_verify_data_client(
    master_secret: &[u8],
    handshake_bodies: &[u8],
) -> Result<Vec<u8>> {
    prf_verify_data(master_secret, handshake_bodies, PRF_VERIFY_DATA_CLIENT_LABEL)
}

pub(crate) fn prf_verify_data_server(
    master_secret: &[u8],
    handshake_bodies: &[u8],
) -> Result<Vec<u8>> {
    prf_verify_data(master_secret, handshake_bodies, PRF_VERIFY_DATA_SERVER_LABEL)
}

/// Keying material exporter PRF.
/// <https://tools.ietf.org/html/rfc5705#section-4>
pub(crate) fn prf_export(
    master_secret: &[u8],
    label: &str,
    client_random: &[u8],
    server_random: &[u8],
    length: usize,
) -> Result<Vec<u8>> {
    let seed = labeled_seed(label, &[client_random, server_random]);
    prf_p_hash(master_secret, &seed, length)
}
