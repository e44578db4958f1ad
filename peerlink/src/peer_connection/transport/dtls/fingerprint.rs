use serde::{Deserialize, Serialize};

use shared::error::{Error, Result};

/// The only digest accepted for certificate fingerprints.
pub const FINGERPRINT_ALGORITHM_SHA256: &str = "sha-256";

/// A certificate digest as carried by `a=fingerprint:<algorithm> <value>`.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RTCDtlsFingerprint {
    /// Hash function name from the IANA "Hash Function Textual Names"
    /// registry, e.g. `sha-256`.
    pub algorithm: String,

    /// Colon separated hex bytes of the digest.
    pub value: String,
}

impl RTCDtlsFingerprint {
    /// Parses the value of an `a=fingerprint` attribute.
    pub fn unmarshal(attr: &str) -> Result<Self> {
        let mut fields = attr.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(algorithm), Some(value), None) => Ok(RTCDtlsFingerprint {
                algorithm: algorithm.to_ascii_lowercase(),
                value: value.to_owned(),
            }),
            _ => Err(Error::ErrSessionDescriptionInvalidFingerprint),
        }
    }

    /// Digest bytes, ignoring separators and case.
    pub(crate) fn digest(&self) -> Result<Vec<u8>> {
        let hex_str: String = self.value.chars().filter(|c| *c != ':').collect();
        hex::decode(hex_str).map_err(|_| Error::ErrSessionDescriptionInvalidFingerprint)
    }

    pub(crate) fn is_supported(&self) -> bool {
        self.algorithm.eq_ignore_ascii_case(FINGERPRINT_ALGORITHM_SHA256)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_fingerprint_unmarshal() -> Result<()> {
        let fp = RTCDtlsFingerprint::unmarshal("SHA-256 AB:cd:01")?;
        assert_eq!(fp.algorithm, "sha-256");
        assert!(fp.is_supported());
        assert_eq!(fp.digest()?, vec![0xab, 0xcd, 0x01]);

        assert_eq!(
            RTCDtlsFingerprint::unmarshal("sha-256"),
            Err(Error::ErrSessionDescriptionInvalidFingerprint)
        );
        assert_eq!(
            RTCDtlsFingerprint::unmarshal("sha-1 aa:bb extra"),
            Err(Error::ErrSessionDescriptionInvalidFingerprint)
        );

        let sha1 = RTCDtlsFingerprint::unmarshal("sha-1 aa:bb")?;
        assert!(!sha1.is_supported());

        let bad = RTCDtlsFingerprint::unmarshal("sha-256 zz:01")?;
        assert!(bad.digest().is_err());

        Ok(())
    }
}
