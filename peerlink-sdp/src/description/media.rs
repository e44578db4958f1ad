use std::collections::HashMap;
use std::fmt;

use super::common::*;
use super::session::*;
use crate::direction::*;
use crate::extmap::*;
use crate::util::*;
use shared::error::*;

/// Constants for extmap key
pub const EXT_MAP_VALUE_TRANSPORT_CC_KEY: isize = 3;
pub const EXT_MAP_VALUE_TRANSPORT_CC_URI: &str =
    "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";

/// MediaDescription represents a media type.
/// <https://tools.ietf.org/html/rfc4566#section-5.14>
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MediaDescription {
    /// `m=<media> <port>/<number of ports> <proto> <fmt> ...`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.14>
    pub media_name: MediaName,

    /// `i=<session description>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.4>
    pub media_title: Option<String>,

    /// `c=<nettype> <addrtype> <connection-address>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.7>
    pub connection_information: Option<ConnectionInformation>,

    /// `b=<bwtype>:<bandwidth>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.8>
    pub bandwidth: Vec<Bandwidth>,

    /// `k=<method>`
    ///
    /// `k=<method>:<encryption key>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.12>
    pub encryption_key: Option<String>,

    /// Attributes are the primary means for extending SDP.  Attributes may
    /// be defined to be used as "session-level" attributes, "media-level"
    /// attributes, or both.
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.12>
    pub attributes: Vec<Attribute>,
}

impl MediaDescription {
    /// attribute returns the value of an attribute and if it exists
    pub fn attribute(&self, key: &str) -> Option<Option<&str>> {
        for a in &self.attributes {
            if a.key == key {
                return Some(a.value.as_ref().map(|s| s.as_ref()));
            }
        }
        None
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.iter().any(|a| a.key == key)
    }

    /// Values of every attribute with this key, in order.
    pub fn attribute_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.attributes
            .iter()
            .filter(move |a| a.key == key)
            .filter_map(|a| a.value.as_deref())
    }

    /// new_jsep_media_description creates a new MediaName with
    /// some settings that are required by the JSEP spec.
    pub fn new_jsep_media_description(codec_type: String, _codec_prefs: Vec<&str>) -> Self {
        MediaDescription {
            media_name: MediaName {
                media: codec_type,
                port: RangedPort {
                    value: 9,
                    range: None,
                },
                protos: vec![
                    "UDP".to_string(),
                    "TLS".to_string(),
                    "RTP".to_string(),
                    "SAVPF".to_string(),
                ],
                formats: vec![],
            },
            media_title: None,
            connection_information: Some(ConnectionInformation {
                network_type: "IN".to_string(),
                address_type: "IP4".to_string(),
                address: Some(Address {
                    address: "0.0.0.0".to_string(),
                    ttl: None,
                    range: None,
                }),
            }),
            bandwidth: vec![],
            encryption_key: None,
            attributes: vec![],
        }
    }

    /// with_property_attribute adds a property attribute 'a=key' to the media description
    pub fn with_property_attribute(mut self, key: String) -> Self {
        self.attributes.push(Attribute::new(key, None));
        self
    }

    /// with_value_attribute adds a value attribute 'a=key:value' to the media description
    pub fn with_value_attribute(mut self, key: String, value: String) -> Self {
        self.attributes.push(Attribute::new(key, Some(value)));
        self
    }

    /// with_fingerprint adds a fingerprint to the media description
    pub fn with_fingerprint(self, algorithm: String, value: String) -> Self {
        self.with_value_attribute(ATTR_KEY_FINGERPRINT.to_owned(), algorithm + " " + &value)
    }

    /// with_ice_credentials adds ICE credentials to the media description
    pub fn with_ice_credentials(self, username: String, password: String) -> Self {
        self.with_value_attribute(ATTR_KEY_ICE_UFRAG.to_string(), username)
            .with_value_attribute(ATTR_KEY_ICE_PWD.to_string(), password)
    }

    /// with_codec adds codec information to the media description
    pub fn with_codec(mut self, codec: &Codec) -> Self {
        self.media_name.formats.push(codec.payload_type.to_string());
        self = self.with_value_attribute(ATTR_KEY_RTPMAP.to_string(), codec.rtpmap());
        if !codec.fmtp.is_empty() {
            self = self.with_value_attribute(
                ATTR_KEY_FMTP.to_string(),
                format!("{} {}", codec.payload_type, codec.fmtp),
            );
        }
        for fb in &codec.rtcp_feedback {
            self = self.with_value_attribute(
                ATTR_KEY_RTCPFB.to_string(),
                format!("{} {}", codec.payload_type, fb),
            );
        }
        self
    }

    /// with_media_source adds media source information to the media description
    pub fn with_media_source(
        self,
        ssrc: u32,
        cname: String,
        stream_label: String,
        label: String,
    ) -> Self {
        self.with_value_attribute(ATTR_KEY_SSRC.to_string(), format!("{ssrc} cname:{cname}"))
            .with_value_attribute(
                ATTR_KEY_SSRC.to_string(),
                format!("{ssrc} msid:{stream_label} {label}"),
            )
    }

    /// with_ssrc_group adds an `a=ssrc-group` attribute
    pub fn with_ssrc_group(self, group: &SsrcGroup) -> Self {
        self.with_value_attribute(ATTR_KEY_SSRCGROUP.to_string(), group.marshal())
    }

    /// with_candidate adds an ICE candidate to the media description
    pub fn with_candidate(self, value: String) -> Self {
        self.with_value_attribute(ATTR_KEY_CANDIDATE.to_string(), value)
    }

    pub fn with_extmap(self, e: ExtMap) -> Self {
        self.with_value_attribute(ATTR_KEY_EXTMAP.to_string(), e.to_string())
    }

    /// with_transport_cc_extmap adds an extmap to the media description
    pub fn with_transport_cc_extmap(self) -> Self {
        let uri = url::Url::parse(EXT_MAP_VALUE_TRANSPORT_CC_URI).ok();
        let e = ExtMap {
            value: EXT_MAP_VALUE_TRANSPORT_CC_KEY,
            uri,
            ..Default::default()
        };

        self.with_extmap(e)
    }

    /// Value of `a=mid`, if present.
    pub fn mid(&self) -> Option<&str> {
        self.attribute(ATTR_KEY_MID).flatten()
    }

    /// The first direction attribute of the section.
    pub fn direction(&self) -> Direction {
        self.attributes
            .iter()
            .filter(|a| a.value.is_none())
            .map(|a| Direction::new(&a.key))
            .find(|d| *d != Direction::Unspecified)
            .unwrap_or_default()
    }

    /// A section with port zero was rejected by the answerer, or is being
    /// disabled by the offerer (RFC 3264 6).
    pub fn is_rejected(&self) -> bool {
        self.media_name.port.value == 0
    }

    pub fn is_rtcp_mux(&self) -> bool {
        self.has_attribute(ATTR_KEY_RTCPMUX)
    }

    /// Codecs of the section in format order, with their rtpmap, fmtp and
    /// rtcp-fb attributes applied. Non numeric formats, as used by
    /// application sections, are skipped.
    pub fn codecs(&self) -> Result<Vec<Codec>> {
        let mut codecs: Vec<Codec> = vec![];
        let mut index: HashMap<u8, usize> = HashMap::new();
        for format in &self.media_name.formats {
            let Ok(payload_type) = format.parse::<u8>() else {
                continue;
            };
            if index.contains_key(&payload_type) {
                continue;
            }
            index.insert(payload_type, codecs.len());
            codecs.push(static_codec(payload_type).unwrap_or(Codec {
                payload_type,
                ..Default::default()
            }));
        }

        let mut wildcard_feedback = vec![];
        for a in &self.attributes {
            let Some(value) = a.value.as_deref() else {
                continue;
            };
            match a.key.as_str() {
                ATTR_KEY_RTPMAP => {
                    let codec = parse_rtpmap(value)?;
                    if let Some(&i) = index.get(&codec.payload_type) {
                        let existing = &mut codecs[i];
                        existing.name = codec.name;
                        existing.clock_rate = codec.clock_rate;
                        existing.encoding_parameters = codec.encoding_parameters;
                    }
                }
                ATTR_KEY_FMTP => {
                    let codec = parse_fmtp(value)?;
                    if let Some(&i) = index.get(&codec.payload_type) {
                        codecs[i].fmtp = codec.fmtp;
                    }
                }
                ATTR_KEY_RTCPFB => match parse_rtcp_fb(value)? {
                    (Some(payload_type), feedback) => {
                        if let Some(&i) = index.get(&payload_type) {
                            codecs[i].rtcp_feedback.push(feedback);
                        }
                    }
                    (None, feedback) => wildcard_feedback.push(feedback),
                },
                _ => {}
            }
        }

        for codec in &mut codecs {
            codec.rtcp_feedback.extend(wildcard_feedback.iter().cloned());
        }

        Ok(codecs)
    }

    /// get_codec_for_payload_type scans the media description for the
    /// codecs matching the given payload type
    pub fn get_codec_for_payload_type(&self, payload_type: u8) -> Result<Codec> {
        self.codecs()?
            .into_iter()
            .find(|c| c.payload_type == payload_type && !c.name.is_empty())
            .ok_or(Error::PayloadTypeNotFound)
    }

    /// Header extensions of the section.
    pub fn extmaps(&self) -> Result<Vec<ExtMap>> {
        self.attribute_values(ATTR_KEY_EXTMAP)
            .map(ExtMap::unmarshal)
            .collect()
    }

    /// SSRCs named by `a=ssrc` lines, each once, in order of appearance.
    pub fn ssrcs(&self) -> Result<Vec<u32>> {
        let mut ssrcs = vec![];
        for value in self.attribute_values(ATTR_KEY_SSRC) {
            let (ssrc, _) = parse_ssrc(value)?;
            if !ssrcs.contains(&ssrc) {
                ssrcs.push(ssrc);
            }
        }
        Ok(ssrcs)
    }

    /// SSRCs that carry their own `cname` line, in order of appearance.
    /// An SSRC with more than one `cname` line is listed more than once.
    pub fn primary_ssrcs(&self) -> Result<Vec<u32>> {
        let mut ssrcs = vec![];
        for value in self.attribute_values(ATTR_KEY_SSRC) {
            let (ssrc, attr) = parse_ssrc(value)?;
            if attr.starts_with("cname:") {
                ssrcs.push(ssrc);
            }
        }
        Ok(ssrcs)
    }

    pub fn ssrc_groups(&self) -> Result<Vec<SsrcGroup>> {
        self.attribute_values(ATTR_KEY_SSRCGROUP)
            .map(SsrcGroup::unmarshal)
            .collect()
    }

    /// `a=ice-ufrag` and `a=ice-pwd` of the section.
    pub fn ice_credentials(&self) -> (Option<&str>, Option<&str>) {
        (
            self.attribute(ATTR_KEY_ICE_UFRAG).flatten(),
            self.attribute(ATTR_KEY_ICE_PWD).flatten(),
        )
    }

    pub fn fingerprints(&self) -> Vec<&str> {
        self.attribute_values(ATTR_KEY_FINGERPRINT).collect()
    }

    pub fn connection_role(&self) -> ConnectionRole {
        self.attribute(ATTR_KEY_CONNECTION_SETUP)
            .flatten()
            .map(ConnectionRole::from)
            .unwrap_or_default()
    }

    pub fn candidates(&self) -> Vec<&str> {
        self.attribute_values(ATTR_KEY_CANDIDATE).collect()
    }

    pub(crate) fn marshal_into(&self, result: &mut String) {
        write_line(result, 'm', &self.media_name.to_string());
        if let Some(title) = &self.media_title {
            write_line(result, 'i', title);
        }
        if let Some(ci) = &self.connection_information {
            write_line(result, 'c', &ci.to_string());
        }
        for b in &self.bandwidth {
            write_line(result, 'b', &b.to_string());
        }
        if let Some(key) = &self.encryption_key {
            write_line(result, 'k', key);
        }
        for a in &self.attributes {
            write_line(result, 'a', &a.to_string());
        }
    }
}

/// RangedPort supports special format for the media field "m=" port value. If
/// it may be necessary to specify multiple transport ports, the protocol allows
/// to write it as: `<port>/<number of ports>` where number of ports is a an
/// offsetting range.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RangedPort {
    pub value: isize,
    pub range: Option<isize>,
}

impl fmt::Display for RangedPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(range) = self.range {
            write!(f, "{}/{}", self.value, range)
        } else {
            write!(f, "{}", self.value)
        }
    }
}

/// MediaName describes the "m=" field storage structure.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MediaName {
    pub media: String,
    pub port: RangedPort,
    pub protos: Vec<String>,
    pub formats: Vec<String>,
}

impl fmt::Display for MediaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = [
            self.media.clone(),
            self.port.to_string(),
            self.protos.join("/"),
            self.formats.join(" "),
        ];
        write!(f, "{}", s.join(" ").trim_end())
    }
}

impl MediaName {
    pub(crate) fn unmarshal(value: &str) -> Result<Self> {
        let fields: Vec<&str> = value.split_whitespace().collect();
        if fields.len() < 3 {
            return Err(Error::SdpInvalidSyntax(format!("`m={value}`")));
        }

        // <media>
        if !matches!(
            fields[0],
            "audio" | "video" | "text" | "application" | "message"
        ) {
            return Err(Error::SdpInvalidValue(fields[0].to_owned()));
        }

        // <port>
        let mut parts = fields[1].split('/');
        let port = parts
            .next()
            .unwrap_or_default()
            .parse::<u16>()
            .map_err(|_| Error::SdpInvalidValue(fields[1].to_owned()))?;
        let range = match parts.next() {
            Some(r) => Some(
                r.parse::<isize>()
                    .map_err(|_| Error::SdpInvalidValue(fields[1].to_owned()))?,
            ),
            None => None,
        };

        // <proto>
        // Set according to currently registered with IANA
        // https://tools.ietf.org/html/rfc4566#section-5.14
        // https://tools.ietf.org/html/rfc4975#section-8.1
        let protos: Vec<String> = fields[2].split('/').map(str::to_owned).collect();
        if protos.iter().any(|p| {
            !matches!(
                p.as_str(),
                "UDP" | "RTP" | "AVP" | "SAVP" | "SAVPF" | "TLS" | "DTLS" | "SCTP" | "AVPF" | "TCP"
                    | "MSRP"
            )
        }) {
            return Err(Error::SdpInvalidValue(fields[2].to_owned()));
        }

        Ok(MediaName {
            media: fields[0].to_owned(),
            port: RangedPort {
                value: port as isize,
                range,
            },
            protos,
            formats: fields[3..].iter().map(|f| (*f).to_owned()).collect(),
        })
    }
}
