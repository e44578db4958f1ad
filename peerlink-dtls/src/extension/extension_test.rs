use super::*;
use crate::curve::named_curve::NamedCurve;
use crate::record_layer::record_layer_header::*;

#[test]
fn test_extensions_block() -> Result<()> {
    let extensions = vec![
        Extension::SupportedEllipticCurves(ExtensionSupportedEllipticCurves {
            elliptic_curves: vec![NamedCurve::X25519, NamedCurve::P256],
        }),
        Extension::UseSrtp(ExtensionUseSrtp {
            protection_profiles: vec![SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm],
        }),
        Extension::UseExtendedMasterSecret(ExtensionUseExtendedMasterSecret { supported: true }),
    ];

    let mut raw = vec![];
    marshal_extensions(&extensions, &mut raw)?;
    assert_eq!(raw.len(), extensions_size(&extensions));
    assert_eq!(
        &raw[..12],
        &[
            0x00, 0x17, // block length
            0x00, 0x0a, 0x00, 0x06, 0x00, 0x04, 0x00, 0x1d, 0x00, 0x17,
        ]
    );

    assert_eq!(unmarshal_extensions(&raw)?, extensions);
    Ok(())
}

#[test]
fn test_extensions_skip_unknown() -> Result<()> {
    let raw = vec![
        0x00, 0x0c, // block length
        0xff, 0x01, 0x00, 0x01, 0x00, // renegotiation_info
        0x00, 0x17, 0x00, 0x00, // extended_master_secret
        0x00, 0x00, 0x00, // truncated
    ];
    assert_eq!(unmarshal_extensions(&raw), Err(Error::ErrBufferTooSmall));

    let raw = vec![
        0x00, 0x09, // block length
        0xff, 0x01, 0x00, 0x01, 0x00, // renegotiation_info
        0x00, 0x17, 0x00, 0x00, // extended_master_secret
    ];
    assert_eq!(
        unmarshal_extensions(&raw)?,
        vec![Extension::UseExtendedMasterSecret(
            ExtensionUseExtendedMasterSecret { supported: true }
        )]
    );

    Ok(())
}

#[test]
fn test_supported_versions() -> Result<()> {
    let ext = Extension::SupportedVersions(ExtensionSupportedVersions {
        versions: vec![PROTOCOL_VERSION1_3, PROTOCOL_VERSION1_2],
    });
    let mut raw = vec![];
    ext.marshal(&mut raw)?;
    assert_eq!(raw, vec![0x00, 0x2b, 0x00, 0x05, 0x04, 0xfe, 0xfc, 0xfe, 0xfd]);
    assert_eq!(Extension::unmarshal(0x2b, &raw[4..])?, Some(ext));

    assert_eq!(
        Extension::unmarshal(0x2b, &[0xfe, 0xfd])?,
        Some(Extension::SupportedVersions(ExtensionSupportedVersions {
            versions: vec![PROTOCOL_VERSION1_2],
        })),
        "server selected_version form"
    );

    assert_eq!(
        Extension::unmarshal(0x2b, &[0x04, 0xfe, 0xfc]),
        Err(Error::ErrLengthMismatch)
    );
    Ok(())
}

#[test]
fn test_srtp_profile_lengths() {
    let p = SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80;
    assert_eq!((p.key_len(), p.salt_len()), (16, 14));
    let p = SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm;
    assert_eq!((p.key_len(), p.salt_len()), (16, 12));
    let p = SrtpProtectionProfile::Srtp_Aead_Aes_256_Gcm;
    assert_eq!((p.key_len(), p.salt_len()), (32, 12));
}
