pub mod named_curve;

/// CurveType is used to represent the type of elliptic curve parameters.
/// Only named curves are negotiated.
/// <https://tools.ietf.org/html/rfc4492#section-5.4>
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EllipticCurveType {
    NamedCurve = 0x03,
    Unsupported,
}

impl From<u8> for EllipticCurveType {
    fn from(val: u8) -> Self {
        match val {
            0x03 => EllipticCurveType::NamedCurve,
            _ => EllipticCurveType::Unsupported,
        }
    }
}

#[cfg(test)]
mod test {
    use super::named_curve::*;
    use shared::error::Result;

    #[test]
    fn test_named_curve_shared_secret_agrees() -> Result<()> {
        for curve in [NamedCurve::X25519, NamedCurve::P256] {
            let a = curve.generate_keypair()?;
            let b = curve.generate_keypair()?;

            let ab = a.shared_secret(&b.public_key)?;
            let ba = b.shared_secret(&a.public_key)?;
            assert_eq!(ab, ba, "{curve}");
            assert_eq!(ab.len(), 32);
        }

        assert!(NamedCurve::Unsupported.generate_keypair().is_err());
        Ok(())
    }

    #[test]
    fn test_named_curve_rejects_foreign_key() -> Result<()> {
        let x = NamedCurve::X25519.generate_keypair()?;
        let p = NamedCurve::P256.generate_keypair()?;
        assert!(x.shared_secret(&p.public_key).is_err());
        assert!(p.shared_secret(&[0x04; 12]).is_err());
        Ok(())
    }
}
