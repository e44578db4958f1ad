use super::*;
use crate::record_layer::record_layer_header::ProtocolVersion;

/// Client form of supported_versions. A server selecting DTLS 1.2 never
/// echoes it, so only the list form is produced.
/// <https://www.rfc-editor.org/rfc/rfc8446#section-4.2.1>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionSupportedVersions {
    pub versions: Vec<ProtocolVersion>,
}

impl ExtensionSupportedVersions {
    pub fn extension_value(&self) -> ExtensionValue {
        ExtensionValue::SupportedVersions
    }

    pub fn size(&self) -> usize {
        1 + 2 * self.versions.len()
    }

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u8(2 * self.versions.len() as u8)?;
        for v in &self.versions {
            writer.write_u8(v.major)?;
            writer.write_u8(v.minor)?;
        }

        Ok(writer.flush()?)
    }

    /// Accepts both the list form and the single selected_version form.
    pub(crate) fn unmarshal_body(body: &[u8]) -> Result<Self> {
        if body.len() == 2 {
            return Ok(ExtensionSupportedVersions {
                versions: vec![ProtocolVersion {
                    major: body[0],
                    minor: body[1],
                }],
            });
        }

        if body.is_empty() || body[0] as usize + 1 != body.len() || body[0] % 2 != 0 {
            return Err(Error::ErrLengthMismatch);
        }

        let versions = body[1..]
            .chunks_exact(2)
            .map(|v| ProtocolVersion {
                major: v[0],
                minor: v[1],
            })
            .collect();

        Ok(ExtensionSupportedVersions { versions })
    }
}
