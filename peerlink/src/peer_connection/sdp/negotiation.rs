//! Offer and answer generation.
//!
//! Every accepted section carries the same transport attributes, since all
//! of them share one BUNDLE transport. Candidates only go into the first
//! accepted section.

use std::collections::HashSet;

use log::debug;
use sdp::description::media::{MediaName, RangedPort};
use sdp::description::session::{
    ATTR_KEY_CONNECTION_SETUP, ATTR_KEY_GROUP, ATTR_KEY_ICE_OPTIONS, ATTR_KEY_MID,
    ATTR_KEY_RTCPMUX, ATTR_KEY_RTCPRSIZE, ICE_OPTION_DTLS_IN_STUN,
};
use sdp::direction::Direction;
use sdp::extmap::ExtMap;
use sdp::util::{Codec, SEMANTIC_TOKEN_BUNDLE};
use sdp::{MediaDescription, SessionDescription};
use shared::error::{Error, Result};

use crate::peer_connection::configuration::media_engine::{
    DATA_CHANNEL_FORMAT, MediaEngine, MediaKind,
};
use crate::peer_connection::transport::dtls::fingerprint::RTCDtlsFingerprint;
use crate::peer_connection::transport::dtls::role::{DEFAULT_DTLS_ROLE_ANSWER, RTCDtlsRole};

pub const ICE_OPTION_TRICKLE: &str = "trickle";

/// SCTP port of the application section (RFC 8841 5).
pub const SCTP_PORT: u16 = 5000;

/// Largest data channel message this endpoint receives.
pub const MAX_MESSAGE_SIZE: usize = 262_144;

const ATTR_KEY_SCTP_PORT: &str = "sctp-port";
const ATTR_KEY_MAX_MESSAGE_SIZE: &str = "max-message-size";
const FMTP_PARAM_APT: &str = "apt";

/// An RTP stream sent from a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource {
    pub ssrc: u32,
    pub cname: String,
    pub stream_id: String,
    pub track_id: String,
}

/// A section the local side wants in its offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMediaSection {
    pub mid: String,
    pub kind: MediaKind,
    pub direction: Direction,
    pub source: Option<MediaSource>,
}

/// Transport attributes the local side puts into its descriptions.
#[derive(Default, Debug, Clone)]
pub struct LocalTransportParameters {
    pub ice_ufrag: String,
    pub ice_pwd: String,
    pub fingerprints: Vec<RTCDtlsFingerprint>,
    /// `Auto` for offers (actpass), an explicit role for answers.
    pub dtls_role: RTCDtlsRole,
    /// Candidate attribute values, without the `candidate:` prefix.
    pub candidates: Vec<String>,
    pub dtls_piggyback: bool,
}

impl LocalTransportParameters {
    fn ice_options(&self) -> String {
        if self.dtls_piggyback {
            format!("{ICE_OPTION_TRICKLE} {ICE_OPTION_DTLS_IN_STUN}")
        } else {
            ICE_OPTION_TRICKLE.to_owned()
        }
    }

    fn apply(&self, mut m: MediaDescription, include_candidates: bool) -> MediaDescription {
        m = m.with_ice_credentials(self.ice_ufrag.clone(), self.ice_pwd.clone());
        for fp in &self.fingerprints {
            m = m.with_fingerprint(fp.algorithm.clone(), fp.value.clone());
        }
        m = m.with_value_attribute(
            ATTR_KEY_CONNECTION_SETUP.to_owned(),
            self.dtls_role.to_connection_role().to_string(),
        );
        if include_candidates {
            for c in &self.candidates {
                m = m.with_candidate(c.clone());
            }
        }
        m
    }
}

fn session(transport: &LocalTransportParameters, bundle: &[String]) -> SessionDescription {
    let mut desc = SessionDescription::new_jsep_session_description(false);
    if !bundle.is_empty() {
        desc = desc.with_value_attribute(
            ATTR_KEY_GROUP.to_owned(),
            format!("{SEMANTIC_TOKEN_BUNDLE} {}", bundle.join(" ")),
        );
    }
    desc.with_value_attribute(ATTR_KEY_ICE_OPTIONS.to_owned(), transport.ice_options())
}

fn application_section(mid: &str) -> MediaDescription {
    let mut m = MediaDescription::new_jsep_media_description(
        MediaKind::Application.to_string(),
        vec![],
    );
    m.media_name.protos = vec!["UDP".to_owned(), "DTLS".to_owned(), "SCTP".to_owned()];
    m.media_name.formats = vec![DATA_CHANNEL_FORMAT.to_owned()];
    m.with_value_attribute(ATTR_KEY_MID.to_owned(), mid.to_owned())
}

fn with_sctp_attributes(m: MediaDescription) -> MediaDescription {
    m.with_value_attribute(ATTR_KEY_SCTP_PORT.to_owned(), SCTP_PORT.to_string())
        .with_value_attribute(
            ATTR_KEY_MAX_MESSAGE_SIZE.to_owned(),
            MAX_MESSAGE_SIZE.to_string(),
        )
}

/// Builds an offer bundling every section in `sections`.
pub fn produce_offer(
    sections: &[LocalMediaSection],
    media_engine: &MediaEngine,
    transport: &LocalTransportParameters,
) -> Result<SessionDescription> {
    if sections.is_empty() {
        return Err(Error::ErrInvalidParameter(
            "offer without media sections".to_owned(),
        ));
    }

    let mids: Vec<String> = sections.iter().map(|s| s.mid.clone()).collect();
    let mut desc = session(transport, &mids);
    let extension_uris = media_engine.header_extension_uris();

    for (index, section) in sections.iter().enumerate() {
        if section.kind == MediaKind::Application {
            let m = transport.apply(application_section(&section.mid), index == 0);
            desc = desc.with_media(with_sctp_attributes(m));
            continue;
        }

        let codecs = media_engine.codecs(section.kind);
        if codecs.is_empty() {
            return Err(Error::ErrInvalidParameter(format!(
                "no {} codecs registered",
                section.kind
            )));
        }

        let mut m = MediaDescription::new_jsep_media_description(section.kind.to_string(), vec![])
            .with_value_attribute(ATTR_KEY_MID.to_owned(), section.mid.clone());
        m = transport.apply(m, index == 0);
        m = m
            .with_property_attribute(ATTR_KEY_RTCPMUX.to_owned())
            .with_property_attribute(ATTR_KEY_RTCPRSIZE.to_owned());
        for codec in codecs {
            m = m.with_codec(codec);
        }
        for (position, uri) in extension_uris.iter().enumerate() {
            if media_engine.supports_header_extension(section.kind, uri) {
                m = m.with_extmap(ExtMap::unmarshal(&format!("{} {uri}", position + 1))?);
            }
        }
        m = m.with_property_attribute(or_sendrecv(section.direction).to_string());
        if let Some(source) = &section.source {
            m = m.with_media_source(
                source.ssrc,
                source.cname.clone(),
                source.stream_id.clone(),
                source.track_id.clone(),
            );
        }
        desc = desc.with_media(m);
    }

    debug!("[sdp] produced offer with {} sections", sections.len());
    Ok(desc)
}

fn or_sendrecv(direction: Direction) -> Direction {
    match direction {
        Direction::Unspecified => Direction::Sendrecv,
        d => d,
    }
}

/// A port zero copy of an offered section, keeping only its mid.
fn rejected_section(offered: &MediaDescription, mid: &str) -> MediaDescription {
    MediaDescription {
        media_name: MediaName {
            media: offered.media_name.media.clone(),
            port: RangedPort {
                value: 0,
                range: None,
            },
            protos: offered.media_name.protos.clone(),
            formats: offered.media_name.formats.clone(),
        },
        connection_information: offered.connection_information.clone(),
        ..Default::default()
    }
    .with_value_attribute(ATTR_KEY_MID.to_owned(), mid.to_owned())
}

/// The payload type an rtx-like format repairs.
fn associated_payload_type(codec: &Codec) -> Option<u8> {
    codec
        .fmtp_params()
        .get(FMTP_PARAM_APT)
        .and_then(|apt| apt.parse().ok())
}

/// Offered codecs the local side supports, in offer order and with the
/// offer's payload types. Repair formats survive only together with the
/// payload type they reference.
fn intersect_codecs(media_engine: &MediaEngine, kind: MediaKind, offered: &[Codec]) -> Vec<Codec> {
    let mut accepted: HashSet<u8> = HashSet::new();
    let mut feedback: Vec<(u8, Vec<String>)> = vec![];

    for codec in offered
        .iter()
        .filter(|c| associated_payload_type(c).is_none())
    {
        if let Some(local) = media_engine.find_codec(kind, codec) {
            accepted.insert(codec.payload_type);
            feedback.push((codec.payload_type, local.rtcp_feedback.clone()));
        }
    }
    for codec in offered {
        if let Some(apt) = associated_payload_type(codec)
            && accepted.contains(&apt)
            && let Some(local) = media_engine.find_codec_by_name(kind, codec)
        {
            accepted.insert(codec.payload_type);
            feedback.push((codec.payload_type, local.rtcp_feedback.clone()));
        }
    }

    offered
        .iter()
        .filter(|c| accepted.contains(&c.payload_type))
        .map(|c| {
            let supported = feedback
                .iter()
                .find(|(pt, _)| *pt == c.payload_type)
                .map(|(_, fb)| fb.as_slice())
                .unwrap_or_default();
            Codec {
                rtcp_feedback: c
                    .rtcp_feedback
                    .iter()
                    .filter(|fb| supported.contains(fb))
                    .cloned()
                    .collect(),
                ..c.clone()
            }
        })
        .collect()
}

/// Answers `offer` with what `media_engine` supports.
///
/// A section offered with port zero, of an unknown kind, or without a single
/// common codec is rejected with port zero. Accepted sections keep the
/// offered payload types and header extension ids and reverse the offered
/// direction.
pub fn produce_answer(
    offer: &SessionDescription,
    media_engine: &MediaEngine,
    transport: &LocalTransportParameters,
) -> Result<SessionDescription> {
    let mut transport = transport.clone();
    if !transport.dtls_role.is_explicit() {
        transport.dtls_role = DEFAULT_DTLS_ROLE_ANSWER;
    }

    let mut sections = vec![];
    let mut accepted_mids: Vec<String> = vec![];

    for (index, offered) in offer.media_descriptions.iter().enumerate() {
        let mid = offered
            .mid()
            .map(str::to_owned)
            .unwrap_or_else(|| index.to_string());
        let kind = MediaKind::from_media(&offered.media_name.media);

        let answered = match kind {
            _ if offered.is_rejected() => None,
            None => None,
            Some(MediaKind::Application) => {
                let offers_data_channels = offered
                    .media_name
                    .formats
                    .iter()
                    .any(|f| f == DATA_CHANNEL_FORMAT);
                (offers_data_channels && media_engine.supports_data_channels()).then(|| {
                    let m = transport.apply(application_section(&mid), accepted_mids.is_empty());
                    with_sctp_attributes(m)
                })
            }
            Some(kind) => {
                let codecs = intersect_codecs(media_engine, kind, &offered.codecs()?);
                if codecs.is_empty() {
                    None
                } else {
                    Some(answer_media_section(
                        offered,
                        &mid,
                        kind,
                        &codecs,
                        media_engine,
                        &transport,
                        accepted_mids.is_empty(),
                    )?)
                }
            }
        };

        match answered {
            Some(m) => {
                accepted_mids.push(mid);
                sections.push(m);
            }
            None => {
                debug!(
                    "[sdp] rejected {} section {}",
                    offered.media_name.media, mid
                );
                sections.push(rejected_section(offered, &mid));
            }
        }
    }

    let bundle: Vec<String> = offer
        .bundle_group()
        .unwrap_or_default()
        .into_iter()
        .filter(|mid| accepted_mids.iter().any(|m| m == mid))
        .map(str::to_owned)
        .collect();

    let mut desc = session(&transport, &bundle);
    for m in sections {
        desc = desc.with_media(m);
    }
    Ok(desc)
}

fn answer_media_section(
    offered: &MediaDescription,
    mid: &str,
    kind: MediaKind,
    codecs: &[Codec],
    media_engine: &MediaEngine,
    transport: &LocalTransportParameters,
    include_candidates: bool,
) -> Result<MediaDescription> {
    let mut m = MediaDescription::new_jsep_media_description(kind.to_string(), vec![])
        .with_value_attribute(ATTR_KEY_MID.to_owned(), mid.to_owned());
    m.media_name.protos = offered.media_name.protos.clone();
    m = transport.apply(m, include_candidates);

    if offered.is_rtcp_mux() {
        m = m.with_property_attribute(ATTR_KEY_RTCPMUX.to_owned());
    }
    if offered.has_attribute(ATTR_KEY_RTCPRSIZE) {
        m = m.with_property_attribute(ATTR_KEY_RTCPRSIZE.to_owned());
    }
    for codec in codecs {
        m = m.with_codec(codec);
    }
    for extmap in offered.extmaps()? {
        if media_engine.supports_header_extension(kind, extmap.uri_str()) {
            m = m.with_extmap(ExtMap {
                direction: Direction::Unspecified,
                ..extmap
            });
        }
    }

    let direction = or_sendrecv(offered.direction().reverse());
    Ok(m.with_property_attribute(direction.to_string()))
}
