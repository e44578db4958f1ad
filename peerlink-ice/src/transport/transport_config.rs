use std::time::Duration;

use crate::attributes::control::IceRole;
use crate::mdns::MulticastDnsMode;

/// The interval at which the transport performs candidate checks in the connecting phase.
pub(crate) const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(200);

/// The interval used to keep the selected pair alive.
pub(crate) const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(2);

/// Max binding request before considering a pair failed.
pub(crate) const DEFAULT_MAX_BINDING_REQUESTS: u16 = 7;

/// Wait time before binding requests can be deleted.
pub(crate) const MAX_BINDING_REQUEST_TIMEOUT: Duration = Duration::from_millis(4000);

/// Collects the arguments to `IceTransport` construction into a single structure.
#[derive(Default, Clone)]
pub struct IceTransportConfig {
    pub role: IceRole,

    /// Random when None.
    pub tie_breaker: Option<u64>,

    /// It is used to perform connectivity checks. The values MUST be unguessable, with at least
    /// 128 bits of random number generator output used to generate the password, and at least 24
    /// bits of output to generate the username fragment. Generated when empty.
    pub local_ufrag: String,
    pub local_pwd: String,

    /// Controls how often checks are sent while no pair is selected.
    pub check_interval: Option<Duration>,

    /// How often the selected pair is refreshed.
    pub keepalive_interval: Option<Duration>,

    /// The max amount of binding requests sent over a candidate pair before it is failed.
    pub max_binding_requests: Option<u16>,

    /// Controls handling of remote `.local` candidates.
    pub multicast_dns_mode: MulticastDnsMode,

    /// Report DTLS-in-STUN attributes of every received check.
    pub piggyback_reporting: bool,
}
