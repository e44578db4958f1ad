use uuid::Uuid;

/// Represents the different Multicast modes that ICE can run.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub enum MulticastDnsMode {
    /// Means remote mDNS candidates will be discarded, and local host candidates will use IPs.
    Disabled,

    /// Means remote mDNS candidates will be accepted, and local host candidates will use IPs.
    #[default]
    QueryOnly,

    /// Means remote mDNS candidates will be accepted, and local host candidates will use mDNS.
    QueryAndGather,
}

impl MulticastDnsMode {
    /// Whether local host candidates hide their IP behind a `.local` name.
    pub fn obfuscates_host(self) -> bool {
        self == MulticastDnsMode::QueryAndGather
    }
}

pub(crate) fn generate_multicast_dns_name() -> String {
    // https://tools.ietf.org/id/draft-ietf-rtcweb-mdns-ice-candidates-02.html#gathering
    // The unique name MUST consist of a version 4 UUID as defined in [RFC4122], followed by “.local”.
    let u = Uuid::new_v4();
    format!("{u}.local")
}

/// Whether the address is an mDNS host name rather than an IP literal.
pub fn is_multicast_dns_name(address: &str) -> bool {
    address.ends_with(".local") && address.matches('.').count() == 1
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_generate_multicast_dns_name() {
        let name = generate_multicast_dns_name();
        assert!(is_multicast_dns_name(&name), "{name}");
        assert_eq!(name.len(), 36 + ".local".len());
        assert_ne!(name, generate_multicast_dns_name());
        assert!(!is_multicast_dns_name("10.0.0.1"));
        assert!(!is_multicast_dns_name("a.b.local"));
    }
}
