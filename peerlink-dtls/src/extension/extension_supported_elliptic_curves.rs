use super::*;
use crate::curve::named_curve::*;

/// <https://tools.ietf.org/html/rfc8422#section-5.1.1>
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtensionSupportedEllipticCurves {
    pub elliptic_curves: Vec<NamedCurve>,
}

impl ExtensionSupportedEllipticCurves {
    pub fn extension_value(&self) -> ExtensionValue {
        ExtensionValue::SupportedEllipticCurves
    }

    pub fn size(&self) -> usize {
        2 + 2 * self.elliptic_curves.len()
    }

    pub fn marshal<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<BigEndian>(2 * self.elliptic_curves.len() as u16)?;
        for v in &self.elliptic_curves {
            writer.write_u16::<BigEndian>(*v as u16)?;
        }

        Ok(writer.flush()?)
    }

    /// Unknown groups are kept as `Unsupported` so preference order survives.
    pub fn unmarshal<R: Read>(reader: &mut R) -> Result<Self> {
        let group_count = reader.read_u16::<BigEndian>()? as usize / 2;
        let mut elliptic_curves = vec![];
        for _ in 0..group_count {
            elliptic_curves.push(reader.read_u16::<BigEndian>()?.into());
        }

        Ok(ExtensionSupportedEllipticCurves { elliptic_curves })
    }
}
