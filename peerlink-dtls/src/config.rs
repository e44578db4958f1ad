use crate::cipher_suite::*;
use crate::crypto::*;
use crate::extension::extension_use_srtp::SrtpProtectionProfile;
use crate::signature_hash_algorithm::*;
use shared::error::*;

use std::fmt;
use std::time::Duration;

pub(crate) const DEFAULT_MTU: usize = 1200; // bytes
/// First retransmission happens this long after a flight is sent.
pub const DEFAULT_INITIAL_RETRANSMIT_INTERVAL: Duration = Duration::from_millis(50);
/// Cap of the doubling retransmission interval.
pub const DEFAULT_MAXIMUM_RETRANSMIT_INTERVAL: Duration = Duration::from_secs(60);
/// 50ms doubled up to the 60s cap gives twelve retransmissions.
pub const DEFAULT_MAXIMUM_RETRANSMIT_NUMBER: usize = 12;
// Default replay protection window is specified by RFC 6347 Section 4.1.2.6
pub(crate) const DEFAULT_REPLAY_PROTECTION_WINDOW: usize = 64;

/// ConfigBuilder is used to configure a DTLS client or server.
#[derive(Clone, Default)]
pub struct ConfigBuilder {
    certificates: Vec<Certificate>,
    cipher_suites: Vec<CipherSuiteId>,
    srtp_protection_profiles: Vec<SrtpProtectionProfile>,
    extended_master_secret: ExtendedMasterSecretType,
    initial_retransmit_interval: Option<Duration>,
    maximum_retransmit_interval: Option<Duration>,
    maximum_retransmit_number: Option<usize>,
    mtu: usize,
    replay_protection_window: usize,
    enable_dtls13_advertisement: bool,
}

impl ConfigBuilder {
    /// certificates contains certificate chain to present to the other side of the connection.
    /// Both ends authenticate, so clients and servers MUST set this.
    pub fn with_certificates(mut self, certificates: Vec<Certificate>) -> Self {
        self.certificates = certificates;
        self
    }

    /// cipher_suites is a list of supported cipher suites.
    /// If cipher_suites is empty, a default list is used
    pub fn with_cipher_suites(mut self, cipher_suites: Vec<CipherSuiteId>) -> Self {
        self.cipher_suites = cipher_suites;
        self
    }

    /// srtp_protection_profiles are the supported protection profiles
    /// Clients will send this via use_srtp and assert that the server properly responds
    /// Servers will assert that clients send one of these profiles and will respond as needed
    pub fn with_srtp_protection_profiles(
        mut self,
        srtp_protection_profiles: Vec<SrtpProtectionProfile>,
    ) -> Self {
        self.srtp_protection_profiles = srtp_protection_profiles;
        self
    }

    /// extended_master_secret determines if the "Extended Master Secret" extension
    /// should be disabled, requested, or required (default required).
    pub fn with_extended_master_secret(
        mut self,
        extended_master_secret: ExtendedMasterSecretType,
    ) -> Self {
        self.extended_master_secret = extended_master_secret;
        self
    }

    /// initial_retransmit_interval is the delay before the first retransmission
    /// of an unanswered flight (default 50ms). It doubles on every retransmission.
    pub fn with_initial_retransmit_interval(mut self, interval: Duration) -> Self {
        self.initial_retransmit_interval = Some(interval);
        self
    }

    /// maximum_retransmit_interval caps the doubling (default 60s).
    pub fn with_maximum_retransmit_interval(mut self, interval: Duration) -> Self {
        self.maximum_retransmit_interval = Some(interval);
        self
    }

    /// maximum_retransmit_number is how many times one flight is retransmitted
    /// before the handshake fails (default 12).
    pub fn with_maximum_retransmit_number(mut self, maximum_retransmit_number: usize) -> Self {
        self.maximum_retransmit_number = Some(maximum_retransmit_number);
        self
    }

    /// mtu is the length at which handshake messages will be fragmented to
    /// fit within the maximum transmission unit (default is 1200 bytes)
    pub fn with_mtu(mut self, mtu: usize) -> Self {
        self.mtu = mtu;
        self
    }

    /// replay_protection_window is the size of the replay attack protection window.
    /// Duplication of the sequence number is checked in this window size.
    /// Packet with sequence number older than this value compared to the latest
    /// accepted packet will be discarded. (default is 64)
    pub fn with_replay_protection_window(mut self, replay_protection_window: usize) -> Self {
        self.replay_protection_window = replay_protection_window;
        self
    }

    /// When set, the ClientHello carries supported_versions offering DTLS 1.3
    /// ahead of 1.2. The handshake itself is always DTLS 1.2.
    pub fn with_dtls13_advertisement(mut self, enable: bool) -> Self {
        self.enable_dtls13_advertisement = enable;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.certificates.is_empty() {
            return Err(Error::ErrNoCertificates);
        }

        if let Some(interval) = self.initial_retransmit_interval
            && interval.is_zero()
        {
            return Err(Error::ErrInvalidParameter(
                "initial retransmit interval must be positive".to_owned(),
            ));
        }

        if let (Some(initial), Some(maximum)) = (
            self.initial_retransmit_interval,
            self.maximum_retransmit_interval,
        ) && maximum < initial
        {
            return Err(Error::ErrInvalidParameter(
                "maximum retransmit interval below initial interval".to_owned(),
            ));
        }

        Ok(())
    }

    /// build handshake config
    pub fn build(self) -> Result<HandshakeConfig> {
        self.validate()?;

        let local_cipher_suites: Vec<CipherSuiteId> = if self.cipher_suites.is_empty() {
            default_cipher_suites().iter().map(|cs| cs.id()).collect()
        } else {
            for id in &self.cipher_suites {
                cipher_suite_for_id(*id)?;
            }
            self.cipher_suites
        };

        let maximum_transmission_unit = if self.mtu == 0 { DEFAULT_MTU } else { self.mtu };

        let replay_protection_window = if self.replay_protection_window == 0 {
            DEFAULT_REPLAY_PROTECTION_WINDOW
        } else {
            self.replay_protection_window
        };

        Ok(HandshakeConfig {
            local_cipher_suites,
            local_signature_schemes: default_signature_schemes(),
            extended_master_secret: self.extended_master_secret,
            local_srtp_protection_profiles: self.srtp_protection_profiles,
            local_certificates: self.certificates,
            initial_retransmit_interval: self
                .initial_retransmit_interval
                .unwrap_or(DEFAULT_INITIAL_RETRANSMIT_INTERVAL),
            maximum_retransmit_interval: self
                .maximum_retransmit_interval
                .unwrap_or(DEFAULT_MAXIMUM_RETRANSMIT_INTERVAL),
            maximum_retransmit_number: self
                .maximum_retransmit_number
                .unwrap_or(DEFAULT_MAXIMUM_RETRANSMIT_NUMBER),
            initial_epoch: 0,
            maximum_transmission_unit,
            replay_protection_window,
            advertise_dtls13: self.enable_dtls13_advertisement,
        })
    }
}

// ExtendedMasterSecretType declares the policy the client and server
// will follow for the Extended Master Secret extension
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone)]
pub enum ExtendedMasterSecretType {
    Request = 0,
    #[default]
    Require = 1,
    Disable = 2,
}

#[derive(Clone)]
pub struct HandshakeConfig {
    pub(crate) local_cipher_suites: Vec<CipherSuiteId>, // Available CipherSuites
    pub(crate) local_signature_schemes: Vec<SignatureHashAlgorithm>, // Available signature schemes
    pub(crate) extended_master_secret: ExtendedMasterSecretType, // Policy for the Extended Master Support extension
    pub(crate) local_srtp_protection_profiles: Vec<SrtpProtectionProfile>, // Available SRTPProtectionProfiles, if empty no SRTP support
    pub(crate) local_certificates: Vec<Certificate>,
    pub(crate) initial_retransmit_interval: Duration,
    pub(crate) maximum_retransmit_interval: Duration,
    pub(crate) maximum_retransmit_number: usize,
    pub(crate) initial_epoch: u16,
    pub(crate) maximum_transmission_unit: usize,
    pub(crate) replay_protection_window: usize,
    pub(crate) advertise_dtls13: bool,
}

impl fmt::Debug for HandshakeConfig {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.debug_struct("HandshakeConfig")
            .field("local_cipher_suites", &self.local_cipher_suites)
            .field("local_signature_schemes", &self.local_signature_schemes)
            .field("extended_master_secret", &self.extended_master_secret)
            .field(
                "local_srtp_protection_profiles",
                &self.local_srtp_protection_profiles,
            )
            .field("local_certificates", &self.local_certificates.len())
            .field(
                "initial_retransmit_interval",
                &self.initial_retransmit_interval,
            )
            .field(
                "maximum_retransmit_interval",
                &self.maximum_retransmit_interval,
            )
            .field("maximum_retransmit_number", &self.maximum_retransmit_number)
            .field("initial_epoch", &self.initial_epoch)
            .field("maximum_transmission_unit", &self.maximum_transmission_unit)
            .field("replay_protection_window", &self.replay_protection_window)
            .field("advertise_dtls13", &self.advertise_dtls13)
            .finish()
    }
}

impl HandshakeConfig {
    pub(crate) fn get_certificate(&self) -> Result<&Certificate> {
        self.local_certificates
            .first()
            .ok_or(Error::ErrNoCertificates)
    }

    pub fn maximum_retransmit_number(&self) -> usize {
        self.maximum_retransmit_number
    }

    pub fn srtp_protection_profiles(&self) -> &[SrtpProtectionProfile] {
        &self.local_srtp_protection_profiles
    }
}
