use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use stun::transaction::RtxPolicy;

use crate::candidate::COMPONENT_RTP;
use crate::mdns::MulticastDnsMode;

/// Delay between a successful binding and the next keepalive ping.
pub const DEFAULT_KEEPALIVE_DELAY: Duration = Duration::from_secs(10);

/// Keepalive lifetime on cellular adapters, so the radio is not woken forever.
pub const CELLULAR_KEEPALIVE_LIFETIME: Duration = Duration::from_secs(2 * 60);

/// Kind of network adapter the local address belongs to.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum NetworkAdapterType {
    #[default]
    Unknown,
    Ethernet,
    Wifi,
    Cellular,
    Vpn,
    Loopback,
}

impl fmt::Display for NetworkAdapterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            NetworkAdapterType::Unknown => "unknown",
            NetworkAdapterType::Ethernet => "ethernet",
            NetworkAdapterType::Wifi => "wifi",
            NetworkAdapterType::Cellular => "cellular",
            NetworkAdapterType::Vpn => "vpn",
            NetworkAdapterType::Loopback => "loopback",
        };
        write!(f, "{s}")
    }
}

impl NetworkAdapterType {
    /// How long keepalives continue after the first binding request to a
    /// server. `None` means they never stop.
    pub fn keepalive_lifetime(self) -> Option<Duration> {
        match self {
            NetworkAdapterType::Cellular => Some(CELLULAR_KEEPALIVE_LIFETIME),
            _ => None,
        }
    }
}

/// Collects the arguments to `Gatherer` construction into a single structure.
#[derive(Clone)]
pub struct GathererConfig {
    /// The local UDP socket address requests are sent from.
    pub local_addr: SocketAddr,
    pub component: u16,
    /// STUN server URIs, e.g. `stun:stun.example.org:3478`.
    pub stun_servers: Vec<String>,
    /// Defaults to 10 seconds when this property is nil.
    pub keepalive_delay: Option<Duration>,
    pub network_adapter_type: NetworkAdapterType,
    pub multicast_dns_mode: MulticastDnsMode,
    /// Retransmission envelope for binding requests.
    pub rtx_policy: Option<RtxPolicy>,
    /// Value of the SOFTWARE attribute, omitted when None.
    pub software: Option<String>,
}

impl Default for GathererConfig {
    fn default() -> Self {
        Self {
            local_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
            component: COMPONENT_RTP,
            stun_servers: vec![],
            keepalive_delay: None,
            network_adapter_type: NetworkAdapterType::default(),
            multicast_dns_mode: MulticastDnsMode::Disabled,
            rtx_policy: None,
            software: None,
        }
    }
}
