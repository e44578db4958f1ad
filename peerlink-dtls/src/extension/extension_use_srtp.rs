use super::*;

use std::fmt;

/// SRTP protection profiles negotiated through use_srtp.
/// <https://www.iana.org/assignments/srtp-protection/srtp-protection.xhtml>
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum SrtpProtectionProfile {
    Srtp_Aes128_Cm_Hmac_Sha1_80 = 0x0001,
    Srtp_Aes128_Cm_Hmac_Sha1_32 = 0x0002,
    Srtp_Aead_Aes_128_Gcm = 0x0007,
    Srtp_Aead_Aes_256_Gcm = 0x0008,
    #[default]
    Unsupported,
}

impl From<u16> for SrtpProtectionProfile {
    fn from(val: u16) -> Self {
        match val {
            0x0001 => SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80,
            0x0002 => SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_32,
            0x0007 => SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm,
            0x0008 => SrtpProtectionProfile::Srtp_Aead_Aes_256_Gcm,
            _ => SrtpProtectionProfile::Unsupported,
        }
    }
}

impl fmt::Display for SrtpProtectionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80 => "SRTP_AES128_CM_HMAC_SHA1_80",
            SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_32 => "SRTP_AES128_CM_HMAC_SHA1_32",
            SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm => "SRTP_AEAD_AES_128_GCM",
            SrtpProtectionProfile::Srtp_Aead_Aes_256_Gcm => "SRTP_AEAD_AES_256_GCM",
            SrtpProtectionProfile::Unsupported => "Unsupported",
        };
        write!(f, "{s}")
    }
}

impl SrtpProtectionProfile {
    /// Master key length in bytes.
    pub fn key_len(&self) -> usize {
        match *self {
            SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80
            | SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_32
            | SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm => 16,
            SrtpProtectionProfile::Srtp_Aead_Aes_256_Gcm => 32,
            SrtpProtectionProfile::Unsupported => 0,
        }
    }

    /// Master salt length in bytes.
    pub fn salt_len(&self) -> usize {
        match *self {
            SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80
            | SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_32 => 14,
            SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm
            | SrtpProtectionProfile::Srtp_Aead_Aes_256_Gcm => 12,
            SrtpProtectionProfile::Unsupported => 0,
        }
    }
}

/// <https://tools.ietf.org/html/rfc5764#section-4.1.1>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionUseSrtp {
    pub protection_profiles: Vec<SrtpProtectionProfile>,
}

impl ExtensionUseSrtp {
    pub fn extension_value(&self) -> ExtensionValue {
        ExtensionValue::UseSrtp
    }

    pub fn size(&self) -> usize {
        2 + 2 * self.protection_profiles.len() + 1
    }

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(2 * self.protection_profiles.len() as u16)?;
        for v in &self.protection_profiles {
            writer.write_u16::<BigEndian>(*v as u16)?;
        }

        // MKI length
        writer.write_u8(0x00)?;

        Ok(writer.flush()?)
    }

    pub fn unmarshal<R: Read>(reader: &mut R) -> Result<Self> {
        let profile_count = reader.read_u16::<BigEndian>()? as usize / 2;
        let mut protection_profiles = vec![];
        for _ in 0..profile_count {
            let profile: SrtpProtectionProfile = reader.read_u16::<BigEndian>()?.into();
            if profile != SrtpProtectionProfile::Unsupported {
                protection_profiles.push(profile);
            }
        }

        // MKI is ignored.
        let mki_len = reader.read_u8()? as usize;
        let mut mki = vec![0u8; mki_len];
        reader.read_exact(&mut mki)?;

        Ok(ExtensionUseSrtp {
            protection_profiles,
        })
    }
}
