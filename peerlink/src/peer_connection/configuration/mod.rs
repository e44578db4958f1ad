pub mod bundle_policy;
pub mod media_engine;
pub mod setting_engine;

use std::net::SocketAddr;

use crate::peer_connection::certificate::RTCCertificate;
pub use bundle_policy::BundlePayloadTypePolicy;
use media_engine::MediaEngine;
use setting_engine::SettingEngine;

pub(crate) const UNSPECIFIED_STR: &str = "Unspecified";

/// A Configuration defines how peer-to-peer communication via PeerConnection
/// is established.
///
/// Configurations are read-only once built; the same configuration may seed
/// several connections.
#[derive(Default, Clone)]
pub struct RTCConfiguration {
    /// Local UDP addresses candidates are gathered on, one gatherer each.
    pub(crate) local_addrs: Vec<SocketAddr>,

    /// STUN server URIs used to discover server reflexive candidates.
    pub(crate) stun_servers: Vec<String>,

    /// Certificates the connection may authenticate with. The first one is
    /// used; a fresh ECDSA P-256 certificate is generated when empty.
    pub(crate) certificates: Vec<RTCCertificate>,

    pub(crate) setting_engine: SettingEngine,

    /// Codecs and header extensions this endpoint is able to negotiate.
    pub(crate) media_engine: MediaEngine,
}

impl RTCConfiguration {
    /// Copies the STUN servers, stripping any query from "stun(s):" URIs,
    /// which the STUN URI parser rejects.
    pub(crate) fn get_stun_servers(&self) -> Vec<String> {
        self.stun_servers
            .iter()
            .map(|raw_url| {
                if raw_url.starts_with("stun") {
                    raw_url
                        .split('?')
                        .next()
                        .unwrap_or(raw_url.as_str())
                        .to_owned()
                } else {
                    raw_url.clone()
                }
            })
            .collect()
    }

    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    pub fn certificates(&self) -> &[RTCCertificate] {
        &self.certificates
    }

    pub fn setting_engine(&self) -> &SettingEngine {
        &self.setting_engine
    }

    pub fn media_engine(&self) -> &MediaEngine {
        &self.media_engine
    }
}

#[derive(Default)]
pub struct RTCConfigurationBuilder {
    local_addrs: Vec<SocketAddr>,
    stun_servers: Vec<String>,
    certificates: Vec<RTCCertificate>,
    setting_engine: SettingEngine,
    media_engine: Option<MediaEngine>,
}

impl RTCConfigurationBuilder {
    pub fn new() -> Self {
        RTCConfigurationBuilder::default()
    }

    pub fn with_local_addrs(mut self, local_addrs: Vec<SocketAddr>) -> Self {
        self.local_addrs = local_addrs;
        self
    }

    pub fn with_stun_servers(mut self, stun_servers: Vec<String>) -> Self {
        self.stun_servers = stun_servers;
        self
    }

    pub fn with_certificates(mut self, certificates: Vec<RTCCertificate>) -> Self {
        self.certificates = certificates;
        self
    }

    pub fn with_setting_engine(mut self, setting_engine: SettingEngine) -> Self {
        self.setting_engine = setting_engine;
        self
    }

    /// Without a media engine the default codecs and header extensions are
    /// registered.
    pub fn with_media_engine(mut self, media_engine: MediaEngine) -> Self {
        self.media_engine = Some(media_engine);
        self
    }

    pub fn build(self) -> RTCConfiguration {
        let media_engine = self.media_engine.unwrap_or_else(|| {
            let mut m = MediaEngine::default();
            m.register_defaults();
            m
        });
        RTCConfiguration {
            local_addrs: self.local_addrs,
            stun_servers: self.stun_servers,
            certificates: self.certificates,
            setting_engine: self.setting_engine,
            media_engine,
        }
    }
}
