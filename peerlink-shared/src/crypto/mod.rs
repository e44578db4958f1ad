use crate::error::Result;

/// KeyingMaterialExporter extracts keying material from a completed handshake.
///
/// It lives here so SRTP consumers can depend on the capability without
/// depending on the dtls crate.
pub trait KeyingMaterialExporter {
    fn export_keying_material(&self, label: &str, context: &[u8], length: usize)
    -> Result<Vec<u8>>;
}
