#[cfg(test)]
mod extension_test;

pub mod extension_supported_elliptic_curves;
pub mod extension_supported_point_formats;
pub mod extension_supported_signature_algorithms;
pub mod extension_supported_versions;
pub mod extension_use_extended_master_secret;
pub mod extension_use_srtp;

use extension_supported_elliptic_curves::*;
use extension_supported_point_formats::*;
use extension_supported_signature_algorithms::*;
use extension_supported_versions::*;
use extension_use_extended_master_secret::*;
use extension_use_srtp::*;
use shared::error::*;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::trace;
use std::io::{BufReader, Read, Write};

/// Extension types understood by the handshake.
/// <https://www.iana.org/assignments/tls-extensiontype-values/tls-extensiontype-values.xhtml>
#[derive(Clone, Debug, PartialEq, Eq, Copy)]
pub enum ExtensionValue {
    SupportedEllipticCurves = 10,
    SupportedPointFormats = 11,
    SupportedSignatureAlgorithms = 13,
    UseSrtp = 14,
    UseExtendedMasterSecret = 23,
    SupportedVersions = 43,
    Unsupported,
}

impl From<u16> for ExtensionValue {
    fn from(val: u16) -> Self {
        match val {
            10 => ExtensionValue::SupportedEllipticCurves,
            11 => ExtensionValue::SupportedPointFormats,
            13 => ExtensionValue::SupportedSignatureAlgorithms,
            14 => ExtensionValue::UseSrtp,
            23 => ExtensionValue::UseExtendedMasterSecret,
            43 => ExtensionValue::SupportedVersions,
            _ => ExtensionValue::Unsupported,
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Extension {
    SupportedEllipticCurves(ExtensionSupportedEllipticCurves),
    SupportedPointFormats(ExtensionSupportedPointFormats),
    SupportedSignatureAlgorithms(ExtensionSupportedSignatureAlgorithms),
    UseSrtp(ExtensionUseSrtp),
    UseExtendedMasterSecret(ExtensionUseExtendedMasterSecret),
    SupportedVersions(ExtensionSupportedVersions),
}

impl Extension {
    pub fn extension_value(&self) -> ExtensionValue {
        match self {
            Extension::SupportedEllipticCurves(ext) => ext.extension_value(),
            Extension::SupportedPointFormats(ext) => ext.extension_value(),
            Extension::SupportedSignatureAlgorithms(ext) => ext.extension_value(),
            Extension::UseSrtp(ext) => ext.extension_value(),
            Extension::UseExtendedMasterSecret(ext) => ext.extension_value(),
            Extension::SupportedVersions(ext) => ext.extension_value(),
        }
    }

    fn body_size(&self) -> usize {
        match self {
            Extension::SupportedEllipticCurves(ext) => ext.size(),
            Extension::SupportedPointFormats(ext) => ext.size(),
            Extension::SupportedSignatureAlgorithms(ext) => ext.size(),
            Extension::UseSrtp(ext) => ext.size(),
            Extension::UseExtendedMasterSecret(ext) => ext.size(),
            Extension::SupportedVersions(ext) => ext.size(),
        }
    }

    pub fn size(&self) -> usize {
        4 + self.body_size()
    }

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(self.extension_value() as u16)?;
        writer.write_u16::<BigEndian>(self.body_size() as u16)?;
        match self {
            Extension::SupportedEllipticCurves(ext) => ext.marshal(writer),
            Extension::SupportedPointFormats(ext) => ext.marshal(writer),
            Extension::SupportedSignatureAlgorithms(ext) => ext.marshal(writer),
            Extension::UseSrtp(ext) => ext.marshal(writer),
            Extension::UseExtendedMasterSecret(ext) => ext.marshal(writer),
            Extension::SupportedVersions(ext) => ext.marshal(writer),
        }
    }

    /// Parses one extension body. `None` means the type is not understood.
    pub fn unmarshal(extension_value: u16, body: &[u8]) -> Result<Option<Self>> {
        let mut reader = BufReader::new(body);
        let extension = match ExtensionValue::from(extension_value) {
            ExtensionValue::SupportedEllipticCurves => Extension::SupportedEllipticCurves(
                ExtensionSupportedEllipticCurves::unmarshal(&mut reader)?,
            ),
            ExtensionValue::SupportedPointFormats => Extension::SupportedPointFormats(
                ExtensionSupportedPointFormats::unmarshal(&mut reader)?,
            ),
            ExtensionValue::SupportedSignatureAlgorithms => Extension::SupportedSignatureAlgorithms(
                ExtensionSupportedSignatureAlgorithms::unmarshal(&mut reader)?,
            ),
            ExtensionValue::UseSrtp => Extension::UseSrtp(ExtensionUseSrtp::unmarshal(&mut reader)?),
            ExtensionValue::UseExtendedMasterSecret => Extension::UseExtendedMasterSecret(
                ExtensionUseExtendedMasterSecret::unmarshal(&mut reader)?,
            ),
            ExtensionValue::SupportedVersions => Extension::SupportedVersions(
                ExtensionSupportedVersions::unmarshal_body(body)?,
            ),
            ExtensionValue::Unsupported => return Ok(None),
        };

        Ok(Some(extension))
    }
}

pub(crate) fn extensions_size(extensions: &[Extension]) -> usize {
    if extensions.is_empty() {
        0
    } else {
        2 + extensions.iter().map(|e| e.size()).sum::<usize>()
    }
}

/// Writes the extensions block; an empty list omits the block entirely.
pub(crate) fn marshal_extensions<W: Write>(extensions: &[Extension], writer: &mut W) -> Result<()> {
    if extensions.is_empty() {
        return Ok(());
    }

    let total = extensions_size(extensions) - 2;
    writer.write_u16::<BigEndian>(total as u16)?;
    for extension in extensions {
        extension.marshal(writer)?;
    }

    Ok(writer.flush()?)
}

/// Parses an extensions block, skipping extension types that are not understood.
pub(crate) fn unmarshal_extensions(buf: &[u8]) -> Result<Vec<Extension>> {
    if buf.is_empty() {
        return Ok(vec![]);
    }
    if buf.len() < 2 {
        return Err(Error::ErrBufferTooSmall);
    }

    let declared_len = ((buf[0] as usize) << 8) | buf[1] as usize;
    if declared_len + 2 != buf.len() {
        return Err(Error::ErrLengthMismatch);
    }

    let mut extensions = vec![];
    let mut offset = 2;
    while offset < buf.len() {
        if offset + 4 > buf.len() {
            return Err(Error::ErrBufferTooSmall);
        }
        let extension_value = ((buf[offset] as u16) << 8) | buf[offset + 1] as u16;
        let extension_len = ((buf[offset + 2] as usize) << 8) | buf[offset + 3] as usize;
        offset += 4;
        if offset + extension_len > buf.len() {
            return Err(Error::ErrBufferTooSmall);
        }

        let body = &buf[offset..offset + extension_len];
        match Extension::unmarshal(extension_value, body)? {
            Some(extension) => extensions.push(extension),
            None => trace!("skipping unsupported extension type {extension_value}"),
        }
        offset += extension_len;
    }

    Ok(extensions)
}
