//! Settings beyond the configuration dictionary.
//!
//! The [`SettingEngine`] holds the knobs an application rarely needs but
//! that tests and constrained deployments do: timers, candidate options,
//! DTLS tuning, piggybacking and validation policy.
//!
//! ```
//! use peerlink::peer_connection::configuration::setting_engine::SettingEngine;
//! use peerlink::peer_connection::transport::dtls::role::RTCDtlsRole;
//! use std::time::Duration;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut setting_engine = SettingEngine::default();
//! setting_engine.set_ice_timeouts(Some(Duration::from_millis(50)), None);
//! setting_engine.set_answering_dtls_role(RTCDtlsRole::Server)?;
//! setting_engine.enable_dtls_piggyback(true);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use dtls::extension::extension_use_srtp::SrtpProtectionProfile;
use ice::gatherer::NetworkAdapterType;
use ice::mdns::MulticastDnsMode;
use ice::resolver::{AsyncDnsResolver, AsyncDnsResolverFactory};
use shared::error::{Error, Result};

use super::bundle_policy::BundlePayloadTypePolicy;
use crate::peer_connection::transport::dtls::DtlsTransportConfig;
use crate::peer_connection::transport::dtls::role::RTCDtlsRole;

/// ICE and gatherer timers. `None` keeps each component's default.
#[derive(Default, Debug, Copy, Clone)]
pub struct Timeout {
    pub ice_check_interval: Option<Duration>,
    pub ice_keepalive_interval: Option<Duration>,
    pub stun_keepalive_delay: Option<Duration>,
}

#[derive(Default, Debug, Clone)]
pub struct Candidates {
    pub network_adapter_type: NetworkAdapterType,
    pub multicast_dns_mode: MulticastDnsMode,
    pub username_fragment: String,
    pub password: String,
}

#[derive(Default, Debug, Copy, Clone)]
pub struct ReplayProtection {
    /// DTLS replay window in records, the connection default when 0.
    pub dtls: usize,
}

#[derive(Default, Debug, Copy, Clone)]
pub struct DtlsRetransmission {
    pub initial_interval: Option<Duration>,
    pub maximum_interval: Option<Duration>,
    pub maximum_number: Option<usize>,
}

/// Hands one shared factory to every gatherer.
#[derive(Clone)]
pub(crate) struct SharedResolverFactory(pub(crate) Rc<dyn AsyncDnsResolverFactory>);

impl AsyncDnsResolverFactory for SharedResolverFactory {
    fn create(&self) -> Box<dyn AsyncDnsResolver> {
        self.0.create()
    }
}

/// SettingEngine allows influencing behavior in ways that are not
/// supported by the configuration dictionary.
#[derive(Default, Clone)]
pub struct SettingEngine {
    pub(crate) timeout: Timeout,
    pub(crate) candidates: Candidates,
    pub(crate) replay_protection: ReplayProtection,
    pub(crate) dtls_retransmission: DtlsRetransmission,
    pub(crate) answering_dtls_role: RTCDtlsRole,
    pub(crate) srtp_protection_profiles: Vec<SrtpProtectionProfile>,
    pub(crate) mtu: usize,
    pub(crate) enable_dtls_piggyback: bool,
    pub(crate) enable_dtls13_advertisement: bool,
    pub(crate) bundle_payload_type_policy: BundlePayloadTypePolicy,
    pub(crate) resolver_factory: Option<SharedResolverFactory>,
}

impl fmt::Debug for SettingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingEngine")
            .field("timeout", &self.timeout)
            .field("candidates", &self.candidates)
            .field("answering_dtls_role", &self.answering_dtls_role)
            .field("enable_dtls_piggyback", &self.enable_dtls_piggyback)
            .field(
                "bundle_payload_type_policy",
                &self.bundle_payload_type_policy,
            )
            .finish_non_exhaustive()
    }
}

impl SettingEngine {
    /// Sets how often connectivity checks are paced while no pair is
    /// selected, and how often the selected pair is refreshed.
    pub fn set_ice_timeouts(
        &mut self,
        check_interval: Option<Duration>,
        keepalive_interval: Option<Duration>,
    ) {
        self.timeout.ice_check_interval = check_interval;
        self.timeout.ice_keepalive_interval = keepalive_interval;
    }

    /// Sets the delay between keepalive binding requests to STUN servers.
    pub fn set_stun_keepalive_delay(&mut self, delay: Option<Duration>) {
        self.timeout.stun_keepalive_delay = delay;
    }

    /// Sets the adapter type gatherers assume, which bounds the keepalive
    /// lifetime on cellular networks.
    pub fn set_network_adapter_type(&mut self, network_adapter_type: NetworkAdapterType) {
        self.candidates.network_adapter_type = network_adapter_type;
    }

    /// Controls whether host candidates are obfuscated behind `.local`
    /// names and whether remote `.local` candidates are accepted.
    pub fn set_ice_multicast_dns_mode(&mut self, multicast_dns_mode: MulticastDnsMode) {
        self.candidates.multicast_dns_mode = multicast_dns_mode;
    }

    /// Fixes the local ICE credentials instead of generating them.
    pub fn set_ice_credentials(&mut self, username_fragment: String, password: String) {
        self.candidates.username_fragment = username_fragment;
        self.candidates.password = password;
    }

    /// Sets the DTLS role used when answering. It must be explicit; the
    /// default derives the role from the ICE role.
    pub fn set_answering_dtls_role(&mut self, role: RTCDtlsRole) -> Result<()> {
        if role != RTCDtlsRole::Client && role != RTCDtlsRole::Server {
            return Err(Error::ErrSettingEngineSetAnsweringDTLSRole);
        }

        self.answering_dtls_role = role;
        Ok(())
    }

    /// Restricts the SRTP profiles offered in use_srtp, in preference order.
    pub fn set_srtp_protection_profiles(&mut self, profiles: Vec<SrtpProtectionProfile>) {
        self.srtp_protection_profiles = profiles;
    }

    pub fn set_dtls_replay_protection_window(&mut self, n: usize) {
        self.replay_protection.dtls = n;
    }

    /// Tunes the handshake retransmission schedule.
    pub fn set_dtls_retransmission(&mut self, retransmission: DtlsRetransmission) {
        self.dtls_retransmission = retransmission;
    }

    /// Sets the largest DTLS datagram, 0 for the connection default.
    pub fn set_mtu(&mut self, mtu: usize) {
        self.mtu = mtu;
    }

    /// Offers to carry the DTLS handshake inside STUN checks. It only takes
    /// effect when the peer offers it too.
    pub fn enable_dtls_piggyback(&mut self, enabled: bool) {
        self.enable_dtls_piggyback = enabled;
    }

    /// Advertises DTLS 1.3 in supported_versions.
    pub fn enable_dtls13_advertisement(&mut self, enabled: bool) {
        self.enable_dtls13_advertisement = enabled;
    }

    pub fn set_bundle_payload_type_policy(&mut self, policy: BundlePayloadTypePolicy) {
        self.bundle_payload_type_policy = policy;
    }

    /// Resolves STUN server host names through `factory`. Without one the
    /// gatherers resolve on a worker thread.
    pub fn set_resolver_factory(&mut self, factory: Rc<dyn AsyncDnsResolverFactory>) {
        self.resolver_factory = Some(SharedResolverFactory(factory));
    }

    pub(crate) fn dtls_transport_config(&self) -> DtlsTransportConfig {
        DtlsTransportConfig {
            srtp_protection_profiles: self.srtp_protection_profiles.clone(),
            initial_retransmit_interval: self.dtls_retransmission.initial_interval,
            maximum_retransmit_interval: self.dtls_retransmission.maximum_interval,
            maximum_retransmit_number: self.dtls_retransmission.maximum_number,
            mtu: (self.mtu != 0).then_some(self.mtu),
            replay_protection_window: (self.replay_protection.dtls != 0)
                .then_some(self.replay_protection.dtls),
            enable_dtls13_advertisement: self.enable_dtls13_advertisement,
            enable_piggyback: self.enable_dtls_piggyback,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_set_answering_dtls_role() -> Result<()> {
        let mut s = SettingEngine::default();
        assert_eq!(
            s.set_answering_dtls_role(RTCDtlsRole::Auto),
            Err(Error::ErrSettingEngineSetAnsweringDTLSRole)
        );
        assert_eq!(
            s.set_answering_dtls_role(RTCDtlsRole::Unspecified),
            Err(Error::ErrSettingEngineSetAnsweringDTLSRole)
        );

        s.set_answering_dtls_role(RTCDtlsRole::Server)?;
        assert_eq!(s.answering_dtls_role, RTCDtlsRole::Server);
        s.set_answering_dtls_role(RTCDtlsRole::Client)?;
        assert_eq!(s.answering_dtls_role, RTCDtlsRole::Client);

        Ok(())
    }

    #[test]
    fn test_dtls_transport_config() {
        let mut s = SettingEngine::default();
        let cfg = s.dtls_transport_config();
        assert!(!cfg.enable_piggyback);
        assert_eq!(cfg.mtu, None);
        assert_eq!(cfg.replay_protection_window, None);

        s.enable_dtls_piggyback(true);
        s.set_mtu(1200);
        s.set_dtls_replay_protection_window(128);
        s.set_dtls_retransmission(DtlsRetransmission {
            initial_interval: Some(Duration::from_millis(100)),
            ..Default::default()
        });
        let cfg = s.dtls_transport_config();
        assert!(cfg.enable_piggyback);
        assert_eq!(cfg.mtu, Some(1200));
        assert_eq!(cfg.replay_protection_window, Some(128));
        assert_eq!(
            cfg.initial_retransmit_interval,
            Some(Duration::from_millis(100))
        );
    }
}
