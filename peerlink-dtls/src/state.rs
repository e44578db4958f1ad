use crate::cipher_suite::*;
use crate::curve::named_curve::*;
use crate::extension::extension_use_srtp::SrtpProtectionProfile;
use crate::handshake::handshake_random::*;
use crate::prf::*;
use crate::record_layer::record_layer_header::*;
use shared::crypto::KeyingMaterialExporter;
use shared::error::*;

use std::fmt;

pub(crate) static INVALID_KEYING_LABELS: &[&str] = &[
    "client finished",
    "server finished",
    "master secret",
    "key expansion",
];

/// State holds the dtls connection state.
pub struct State {
    pub(crate) local_epoch: u16,
    pub(crate) remote_epoch: u16,
    pub(crate) local_sequence_number: Vec<u64>, // uint48
    pub(crate) local_random: HandshakeRandom,
    pub(crate) remote_random: HandshakeRandom,
    pub(crate) master_secret: Vec<u8>,
    pub(crate) pre_master_secret: Vec<u8>,
    pub(crate) cipher_suite: Option<Box<dyn CipherSuite + Send + Sync>>, // nil if a cipher_suite hasn't been chosen
    pub(crate) srtp_protection_profile: SrtpProtectionProfile,
    pub(crate) peer_certificates: Vec<Vec<u8>>,
    pub(crate) is_client: bool,
    pub(crate) extended_master_secret: bool,
    pub(crate) named_curve: NamedCurve,
    pub(crate) local_keypair: Option<NamedCurveKeypair>,
    pub(crate) cookie: Vec<u8>,
    pub(crate) handshake_send_sequence: isize,
    pub(crate) handshake_recv_sequence: isize,
    pub(crate) negotiated_version: ProtocolVersion,
    /// Versions the peer listed in supported_versions; empty when absent.
    pub(crate) remote_supported_versions: Vec<ProtocolVersion>,
    /// Set by the client when the server sent CertificateRequest.
    pub(crate) remote_requested_certificate: bool,
}

impl Default for State {
    fn default() -> Self {
        State {
            local_epoch: 0,
            remote_epoch: 0,
            local_sequence_number: vec![],
            local_random: HandshakeRandom::default(),
            remote_random: HandshakeRandom::default(),
            master_secret: vec![],
            pre_master_secret: vec![],
            cipher_suite: None,
            srtp_protection_profile: SrtpProtectionProfile::Unsupported,
            peer_certificates: vec![],
            is_client: false,
            extended_master_secret: false,
            named_curve: NamedCurve::Unsupported,
            local_keypair: None,
            cookie: vec![],
            handshake_send_sequence: 0,
            handshake_recv_sequence: -1,
            negotiated_version: ProtocolVersion::default(),
            remote_supported_versions: vec![],
            remote_requested_certificate: false,
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("is_client", &self.is_client)
            .field("local_epoch", &self.local_epoch)
            .field("remote_epoch", &self.remote_epoch)
            .field(
                "cipher_suite",
                &self.cipher_suite.as_ref().map(|cs| cs.id()),
            )
            .field("srtp_protection_profile", &self.srtp_protection_profile)
            .field("named_curve", &self.named_curve)
            .field("negotiated_version", &self.negotiated_version)
            .finish()
    }
}

impl State {
    pub fn is_client(&self) -> bool {
        self.is_client
    }

    /// DER certificates presented by the peer, leaf first.
    pub fn peer_certificates(&self) -> &[Vec<u8>] {
        &self.peer_certificates
    }

    pub fn srtp_protection_profile(&self) -> SrtpProtectionProfile {
        self.srtp_protection_profile
    }

    pub fn cipher_suite_id(&self) -> Option<CipherSuiteId> {
        self.cipher_suite.as_ref().map(|cs| cs.id())
    }

    /// Protocol version agreed in the hellos; the default value until then.
    pub fn negotiated_version(&self) -> ProtocolVersion {
        self.negotiated_version
    }

    pub fn extended_master_secret(&self) -> bool {
        self.extended_master_secret
    }

    pub(crate) fn client_and_server_random(&self) -> (Vec<u8>, Vec<u8>) {
        let local_random = self.local_random.marshal_fixed().to_vec();
        let remote_random = self.remote_random.marshal_fixed().to_vec();
        if self.is_client {
            (local_random, remote_random)
        } else {
            (remote_random, local_random)
        }
    }
}

impl KeyingMaterialExporter for State {
    /// export_keying_material returns length bytes of exported key material in a new
    /// slice as defined in RFC 5705.
    /// This allows protocols to use DTLS for key establishment, but
    /// then use some of the keying material for their own purposes
    fn export_keying_material(
        &self,
        label: &str,
        context: &[u8],
        length: usize,
    ) -> Result<Vec<u8>> {
        if self.local_epoch == 0 || self.master_secret.is_empty() {
            return Err(Error::HandshakeInProgress);
        } else if !context.is_empty() {
            return Err(Error::ContextUnsupported);
        } else if INVALID_KEYING_LABELS.contains(&label) {
            return Err(Error::ReservedExportKeyingMaterial);
        }

        if self.cipher_suite.is_none() {
            return Err(Error::CipherSuiteUnset);
        }

        let (client_random, server_random) = self.client_and_server_random();
        prf_export(
            &self.master_secret,
            label,
            &client_random,
            &server_random,
            length,
        )
    }
}
