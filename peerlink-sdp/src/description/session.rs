use std::fmt;
use std::io;

use super::common::*;
use super::media::*;
use crate::util::*;
use shared::error::*;

/// Constants for SDP attributes used in JSEP
pub const ATTR_KEY_CANDIDATE: &str = "candidate";
pub const ATTR_KEY_END_OF_CANDIDATES: &str = "end-of-candidates";
pub const ATTR_KEY_IDENTITY: &str = "identity";
pub const ATTR_KEY_GROUP: &str = "group";
pub const ATTR_KEY_SSRC: &str = "ssrc";
pub const ATTR_KEY_SSRCGROUP: &str = "ssrc-group";
pub const ATTR_KEY_MSID: &str = "msid";
pub const ATTR_KEY_MSID_SEMANTIC: &str = "msid-semantic";
pub const ATTR_KEY_CONNECTION_SETUP: &str = "setup";
pub const ATTR_KEY_MID: &str = "mid";
pub const ATTR_KEY_ICELITE: &str = "ice-lite";
pub const ATTR_KEY_ICE_UFRAG: &str = "ice-ufrag";
pub const ATTR_KEY_ICE_PWD: &str = "ice-pwd";
pub const ATTR_KEY_ICE_OPTIONS: &str = "ice-options";
pub const ATTR_KEY_FINGERPRINT: &str = "fingerprint";
pub const ATTR_KEY_RTCPMUX: &str = "rtcp-mux";
pub const ATTR_KEY_RTCPRSIZE: &str = "rtcp-rsize";
pub const ATTR_KEY_RTPMAP: &str = "rtpmap";
pub const ATTR_KEY_FMTP: &str = "fmtp";
pub const ATTR_KEY_RTCPFB: &str = "rtcp-fb";
pub const ATTR_KEY_INACTIVE: &str = "inactive";
pub const ATTR_KEY_RECV_ONLY: &str = "recvonly";
pub const ATTR_KEY_SEND_ONLY: &str = "sendonly";
pub const ATTR_KEY_SEND_RECV: &str = "sendrecv";
pub const ATTR_KEY_EXTMAP: &str = "extmap";
pub const ATTR_KEY_EXTMAP_ALLOW_MIXED: &str = "extmap-allow-mixed";

/// ICE option advertising DTLS-in-STUN support.
pub const ICE_OPTION_DTLS_IN_STUN: &str = "dtls-in-stun";

/// Constants for semantic tokens used in JSEP
pub const SEMANTIC_TOKEN_WEBRTC_MEDIA_STREAMS: &str = "WMS";

/// Version describes the value provided by the "v=" field which gives
/// the version of the Session Description Protocol.
pub type Version = isize;

/// Origin defines the structure for the "o=" field which provides the
/// originator of the session plus a session identifier and version number.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Origin {
    pub username: String,
    pub session_id: u64,
    pub session_version: u64,
    pub network_type: String,
    pub address_type: String,
    pub unicast_address: String,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.username,
            self.session_id,
            self.session_version,
            self.network_type,
            self.address_type,
            self.unicast_address,
        )
    }
}

impl Origin {
    pub fn new() -> Self {
        Origin {
            username: "".to_owned(),
            session_id: 0,
            session_version: 0,
            network_type: "".to_owned(),
            address_type: "".to_owned(),
            unicast_address: "".to_owned(),
        }
    }

    fn unmarshal(value: &str) -> Result<Self> {
        let fields: Vec<&str> = value.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(Error::SdpInvalidSyntax(format!("`o={value}`")));
        }

        let session_id = fields[1]
            .parse::<u64>()
            .map_err(|_| Error::SdpInvalidValue(fields[1].to_owned()))?;
        let session_version = fields[2]
            .parse::<u64>()
            .map_err(|_| Error::SdpInvalidValue(fields[2].to_owned()))?;

        // Set according to currently registered with IANA
        // https://tools.ietf.org/html/rfc4566#section-8.2.6
        if fields[3] != "IN" {
            return Err(Error::SdpInvalidValue(fields[3].to_owned()));
        }
        // Set according to currently registered with IANA
        // https://tools.ietf.org/html/rfc4566#section-8.2.7
        if !matches!(fields[4], "IP4" | "IP6") {
            return Err(Error::SdpInvalidValue(fields[4].to_owned()));
        }

        Ok(Origin {
            username: fields[0].to_owned(),
            session_id,
            session_version,
            network_type: fields[3].to_owned(),
            address_type: fields[4].to_owned(),
            unicast_address: fields[5].to_owned(),
        })
    }
}

/// TimeDescription describes "t=", "r=" fields of the session description
/// which are used to specify the start and stop times for a session as well as
/// repeat intervals and durations for the scheduled session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TimeDescription {
    /// `t=<start-time> <stop-time>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.9>
    pub timing: Timing,

    /// `r=<repeat interval> <active duration> <offsets from start-time>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.10>
    pub repeat_times: Vec<RepeatTime>,
}

/// Timing defines the "t=" field's structured representation for the start and
/// stop times.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Timing {
    pub start_time: u64,
    pub stop_time: u64,
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.start_time, self.stop_time)
    }
}

/// RepeatTime describes the "r=" fields of the session description which
/// represents the intervals and durations for repeated scheduled sessions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepeatTime {
    pub interval: i64,
    pub duration: i64,
    pub offsets: Vec<i64>,
}

impl fmt::Display for RepeatTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.interval, self.duration)?;
        for value in &self.offsets {
            write!(f, " {value}")?;
        }
        Ok(())
    }
}

/// TimeZone defines the structured object for "z=" line which describes
/// repeated sessions scheduling.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TimeZone {
    pub adjustment_time: u64,
    pub offset: i64,
}

impl fmt::Display for TimeZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.adjustment_time, self.offset)
    }
}

/// SessionDescription is a a well-defined format for conveying sufficient
/// information to discover and participate in a multimedia session.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    /// `v=0`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.1>
    pub version: Version,

    /// `o=<username> <sess-id> <sess-version> <nettype> <addrtype> <unicast-address>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.2>
    pub origin: Origin,

    /// `s=<session name>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.3>
    pub session_name: String,

    /// `i=<session description>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.4>
    pub session_information: Option<String>,

    /// `u=<uri>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.5>
    pub uri: Option<String>,

    /// `e=<email-address>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.6>
    pub email_address: Option<String>,

    /// `p=<phone-number>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.6>
    pub phone_number: Option<String>,

    /// `c=<nettype> <addrtype> <connection-address>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.7>
    pub connection_information: Option<ConnectionInformation>,

    /// `b=<bwtype>:<bandwidth>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.8>
    pub bandwidth: Vec<Bandwidth>,

    /// <https://tools.ietf.org/html/rfc4566#section-5.9>
    /// <https://tools.ietf.org/html/rfc4566#section-5.10>
    pub time_descriptions: Vec<TimeDescription>,

    /// `z=<adjustment time> <offset> <adjustment time> <offset> ...`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.11>
    pub time_zones: Vec<TimeZone>,

    /// `k=<method>`
    ///
    /// `k=<method>:<encryption key>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.12>
    pub encryption_key: Option<String>,

    /// `a=<attribute>`
    ///
    /// `a=<attribute>:<value>`
    ///
    /// <https://tools.ietf.org/html/rfc4566#section-5.13>
    pub attributes: Vec<Attribute>,

    /// <https://tools.ietf.org/html/rfc4566#section-5.14>
    pub media_descriptions: Vec<MediaDescription>,
}

/// Where the parser is: before `v=`, in the session part, or in a media section.
#[derive(Copy, Clone, PartialEq, Eq)]
enum ParseState {
    Start,
    Session,
    Media,
}

impl SessionDescription {
    /// Creates a new session description with the values JSEP expects
    /// (RFC 8829 5.2.1), an empty media list and a random session id.
    pub fn new_jsep_session_description(identity: bool) -> Self {
        let d = SessionDescription {
            version: 0,
            origin: Origin {
                username: "-".to_string(),
                session_id: new_session_id(),
                session_version: 2,
                network_type: "IN".to_string(),
                address_type: "IP4".to_string(),
                unicast_address: "127.0.0.1".to_string(),
            },
            session_name: "-".to_string(),
            time_descriptions: vec![TimeDescription {
                timing: Timing {
                    start_time: 0,
                    stop_time: 0,
                },
                repeat_times: vec![],
            }],
            ..Default::default()
        };

        if identity {
            d.with_property_attribute(ATTR_KEY_IDENTITY.to_string())
        } else {
            d
        }
    }

    /// with_property_attribute adds a property attribute 'a=key' to the session description
    pub fn with_property_attribute(mut self, key: String) -> Self {
        self.attributes.push(Attribute::new(key, None));
        self
    }

    /// with_value_attribute adds a value attribute 'a=key:value' to the session description
    pub fn with_value_attribute(mut self, key: String, value: String) -> Self {
        self.attributes.push(Attribute::new(key, Some(value)));
        self
    }

    /// with_fingerprint adds a fingerprint to the session description
    pub fn with_fingerprint(self, algorithm: String, value: String) -> Self {
        self.with_value_attribute(ATTR_KEY_FINGERPRINT.to_string(), algorithm + " " + value.as_str())
    }

    /// with_media adds a media description to the session description
    pub fn with_media(mut self, md: MediaDescription) -> Self {
        self.media_descriptions.push(md);
        self
    }

    /// attribute returns the value of an attribute and if it exists
    pub fn attribute(&self, key: &str) -> Option<&String> {
        for a in &self.attributes {
            if a.key == key {
                return a.value.as_ref();
            }
        }
        None
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.iter().any(|a| a.key == key)
    }

    /// `a=group` attributes as (semantics, identification tags).
    pub fn groups(&self) -> Vec<(&str, Vec<&str>)> {
        self.attributes
            .iter()
            .filter(|a| a.key == ATTR_KEY_GROUP)
            .filter_map(|a| a.value.as_deref())
            .filter_map(|v| {
                let mut fields = v.split_whitespace();
                fields.next().map(|semantics| (semantics, fields.collect()))
            })
            .collect()
    }

    /// The mids of the first `a=group:BUNDLE` attribute.
    pub fn bundle_group(&self) -> Option<Vec<&str>> {
        self.groups()
            .into_iter()
            .find(|(semantics, _)| *semantics == SEMANTIC_TOKEN_BUNDLE)
            .map(|(_, mids)| mids)
    }

    pub fn media_by_mid(&self, mid: &str) -> Option<&MediaDescription> {
        self.media_descriptions
            .iter()
            .find(|m| m.mid() == Some(mid))
    }

    /// get_codec_for_payload_type scans the SessionDescription for the given payload type and returns the codec
    pub fn get_codec_for_payload_type(&self, payload_type: u8) -> Result<Codec> {
        for m in &self.media_descriptions {
            if let Ok(codec) = m.get_codec_for_payload_type(payload_type) {
                return Ok(codec);
            }
        }
        Err(Error::PayloadTypeNotFound)
    }

    /// get_payload_type_for_codec scans the SessionDescription for a codec
    /// describing the same format and returns its payload type
    pub fn get_payload_type_for_codec(&self, wanted: &Codec) -> Result<u8> {
        for m in &self.media_descriptions {
            for codec in m.codecs()? {
                if codec.same_format(wanted) {
                    return Ok(codec.payload_type);
                }
            }
        }
        Err(Error::CodecNotFound)
    }

    /// ICE credentials of the first media section carrying them, falling
    /// back to the session level (RFC 8839 5.4).
    pub fn ice_credentials(&self) -> (Option<&str>, Option<&str>) {
        let session = (
            self.attribute(ATTR_KEY_ICE_UFRAG).map(String::as_str),
            self.attribute(ATTR_KEY_ICE_PWD).map(String::as_str),
        );
        for m in &self.media_descriptions {
            let (ufrag, pwd) = m.ice_credentials();
            if ufrag.is_some() || pwd.is_some() {
                return (ufrag.or(session.0), pwd.or(session.1));
            }
        }
        session
    }

    /// Fingerprints asserted at the session level followed by those of
    /// every media section.
    pub fn fingerprints(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|a| a.key == ATTR_KEY_FINGERPRINT)
            .filter_map(|a| a.value.as_deref())
            .chain(self.media_descriptions.iter().flat_map(|m| m.fingerprints()))
            .collect()
    }

    /// `a=setup` of the first media section declaring one, else the session level.
    pub fn connection_role(&self) -> ConnectionRole {
        self.media_descriptions
            .iter()
            .map(|m| m.connection_role())
            .find(|r| *r != ConnectionRole::Unspecified)
            .unwrap_or_else(|| {
                self.attribute(ATTR_KEY_CONNECTION_SETUP)
                    .map(|v| ConnectionRole::from(v.as_str()))
                    .unwrap_or_default()
            })
    }

    /// Candidate attribute values of every media section, with the section index.
    pub fn candidates(&self) -> Vec<(usize, &str)> {
        self.media_descriptions
            .iter()
            .enumerate()
            .flat_map(|(i, m)| m.candidates().into_iter().map(move |c| (i, c)))
            .collect()
    }

    /// Whether the session advertises an ICE option, at session or media level.
    pub fn has_ice_option(&self, option: &str) -> bool {
        let has = |v: &str| v.split_whitespace().any(|o| o == option);
        self.attributes
            .iter()
            .filter(|a| a.key == ATTR_KEY_ICE_OPTIONS)
            .filter_map(|a| a.value.as_deref())
            .any(has)
            || self
                .media_descriptions
                .iter()
                .flat_map(|m| m.attribute_values(ATTR_KEY_ICE_OPTIONS))
                .any(has)
    }

    /// Marshal takes a SDP struct to text
    /// <https://tools.ietf.org/html/rfc4566#section-5>
    ///
    /// Session description
    ///    v=  (protocol version)
    ///    o=  (originator and session identifier)
    ///    s=  (session name)
    ///    i=* (session information)
    ///    u=* (URI of description)
    ///    e=* (email address)
    ///    p=* (phone number)
    ///    c=* (connection information -- not required if included in
    ///         all media)
    ///    b=* (zero or more bandwidth information lines)
    ///    One or more time descriptions ("t=" and "r=" lines; see below)
    ///    z=* (time zone adjustments)
    ///    k=* (encryption key)
    ///    a=* (zero or more session attribute lines)
    ///    Zero or more media descriptions
    ///
    /// Time description
    ///    t=  (time the session is active)
    ///    r=* (zero or more repeat times)
    ///
    /// Media description, if present
    ///    m=  (media name and transport address)
    ///    i=* (media title)
    ///    c=* (connection information -- optional if included at
    ///         session level)
    ///    b=* (zero or more bandwidth information lines)
    ///    k=* (encryption key)
    ///    a=* (zero or more media attribute lines)
    pub fn marshal(&self) -> String {
        let mut result = String::new();

        write_line(&mut result, 'v', &self.version.to_string());
        write_line(&mut result, 'o', &self.origin.to_string());
        write_line(&mut result, 's', &self.session_name);

        if let Some(session_information) = &self.session_information {
            write_line(&mut result, 'i', session_information);
        }
        if let Some(uri) = &self.uri {
            write_line(&mut result, 'u', uri);
        }
        if let Some(email_address) = &self.email_address {
            write_line(&mut result, 'e', email_address);
        }
        if let Some(phone_number) = &self.phone_number {
            write_line(&mut result, 'p', phone_number);
        }
        if let Some(connection_information) = &self.connection_information {
            write_line(&mut result, 'c', &connection_information.to_string());
        }
        for bandwidth in &self.bandwidth {
            write_line(&mut result, 'b', &bandwidth.to_string());
        }
        for time_description in &self.time_descriptions {
            write_line(&mut result, 't', &time_description.timing.to_string());
            for repeat_time in &time_description.repeat_times {
                write_line(&mut result, 'r', &repeat_time.to_string());
            }
        }
        if !self.time_zones.is_empty() {
            let zones: Vec<String> = self.time_zones.iter().map(|z| z.to_string()).collect();
            write_line(&mut result, 'z', &zones.join(" "));
        }
        if let Some(encryption_key) = &self.encryption_key {
            write_line(&mut result, 'k', encryption_key);
        }
        for attribute in &self.attributes {
            write_line(&mut result, 'a', &attribute.to_string());
        }
        for media_description in &self.media_descriptions {
            media_description.marshal_into(&mut result);
        }

        result
    }

    /// Unmarshal parses SDP text. Lines may end in LF or CRLF. Lines of
    /// unknown types are skipped, fields of known types must be well formed.
    pub fn unmarshal<R: io::BufRead>(reader: &mut R) -> Result<Self> {
        let mut desc = SessionDescription::default();
        let mut state = ParseState::Start;
        let mut has_origin = false;
        let mut has_session_name = false;

        for line in io::BufRead::lines(&mut *reader) {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() {
                continue;
            }

            let (key, value) = split_line(line)?;
            match (state, key) {
                (ParseState::Start, 'v') => {
                    desc.version = value
                        .trim()
                        .parse::<Version>()
                        .map_err(|_| Error::SdpInvalidValue(format!("`v={value}`")))?;
                    state = ParseState::Session;
                }
                (ParseState::Start, _) => {
                    return Err(Error::SdpInvalidSyntax(format!(
                        "sdp must start with `v=`, got `{line}`"
                    )));
                }
                (ParseState::Session, 'v') | (ParseState::Media, 'v') => {
                    return Err(Error::SdpInvalidSyntax(format!("duplicate `{line}`")));
                }

                (ParseState::Session, 'o') => {
                    desc.origin = Origin::unmarshal(value)?;
                    has_origin = true;
                }
                (ParseState::Session, 's') => {
                    desc.session_name = value.to_owned();
                    has_session_name = true;
                }
                (ParseState::Session, 'i') => desc.session_information = Some(value.to_owned()),
                (ParseState::Session, 'u') => desc.uri = Some(value.to_owned()),
                (ParseState::Session, 'e') => desc.email_address = Some(value.to_owned()),
                (ParseState::Session, 'p') => desc.phone_number = Some(value.to_owned()),
                (ParseState::Session, 'c') => {
                    desc.connection_information = Some(ConnectionInformation::unmarshal(value)?)
                }
                (ParseState::Session, 'b') => desc.bandwidth.push(Bandwidth::unmarshal(value)?),
                (ParseState::Session, 't') => desc.time_descriptions.push(TimeDescription {
                    timing: unmarshal_timing(value)?,
                    repeat_times: vec![],
                }),
                (ParseState::Session, 'r') => {
                    let repeat_time = unmarshal_repeat_time(value)?;
                    let Some(td) = desc.time_descriptions.last_mut() else {
                        return Err(Error::SdpInvalidSyntax(format!("`r=` before `t=`: {line}")));
                    };
                    td.repeat_times.push(repeat_time);
                }
                (ParseState::Session, 'z') => desc.time_zones = unmarshal_time_zones(value)?,
                (ParseState::Session, 'k') => desc.encryption_key = Some(value.to_owned()),
                (ParseState::Session, 'a') => desc.attributes.push(Attribute::unmarshal(value)),

                (_, 'm') => {
                    if !has_origin || !has_session_name {
                        return Err(Error::SdpInvalidSyntax(
                            "media description before `o=` and `s=`".to_owned(),
                        ));
                    }
                    desc.media_descriptions.push(MediaDescription {
                        media_name: MediaName::unmarshal(value)?,
                        ..Default::default()
                    });
                    state = ParseState::Media;
                }

                (ParseState::Media, 'i' | 'c' | 'b' | 'k' | 'a') => {
                    let Some(media) = desc.media_descriptions.last_mut() else {
                        return Err(Error::SdpInvalidSyntax(line.to_owned()));
                    };
                    match key {
                        'i' => media.media_title = Some(value.to_owned()),
                        'c' => {
                            media.connection_information =
                                Some(ConnectionInformation::unmarshal(value)?)
                        }
                        'b' => media.bandwidth.push(Bandwidth::unmarshal(value)?),
                        'k' => media.encryption_key = Some(value.to_owned()),
                        _ => {
                            let attribute = Attribute::unmarshal(value);
                            if attribute.key == ATTR_KEY_RTPMAP {
                                parse_rtpmap(attribute.value.as_deref().unwrap_or_default())?;
                            }
                            media.attributes.push(attribute);
                        }
                    }
                }
                (ParseState::Media, 'o' | 's' | 'u' | 'e' | 'p' | 't' | 'r' | 'z') => {
                    return Err(Error::SdpInvalidSyntax(format!(
                        "session level `{line}` inside a media description"
                    )));
                }

                // unknown types are ignored (RFC 4566 5)
                _ => {}
            }
        }

        if state == ParseState::Start {
            return Err(Error::SdpInvalidSyntax("empty session description".to_owned()));
        }
        if !has_origin || !has_session_name {
            return Err(Error::SdpInvalidSyntax("missing `o=` or `s=`".to_owned()));
        }

        Ok(desc)
    }
}

impl fmt::Display for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.marshal())
    }
}

pub(crate) fn write_line(result: &mut String, key: char, value: &str) {
    result.push(key);
    result.push('=');
    result.push_str(value);
    result.push_str("\r\n");
}

fn split_line(line: &str) -> Result<(char, &str)> {
    let mut chars = line.chars();
    match (chars.next(), chars.next()) {
        (Some(key), Some('=')) if key.is_ascii_lowercase() => Ok((key, &line[2..])),
        _ => Err(Error::SdpInvalidSyntax(line.to_owned())),
    }
}

fn new_session_id() -> u64 {
    // https://tools.ietf.org/html/draft-ietf-rtcweb-jsep-26#section-5.2.1
    // Session ID is recommended to be constructed by generating a 64-bit
    // quantity with the highest bit set to zero and the remaining 63-bits
    // being cryptographically random.
    let c = u64::MAX ^ (1u64 << 63);
    rand::random::<u64>() & c
}

fn unmarshal_timing(value: &str) -> Result<Timing> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() != 2 {
        return Err(Error::SdpInvalidSyntax(format!("`t={value}`")));
    }
    let start_time = fields[0]
        .parse::<u64>()
        .map_err(|_| Error::SdpInvalidValue(fields[0].to_owned()))?;
    let stop_time = fields[1]
        .parse::<u64>()
        .map_err(|_| Error::SdpInvalidValue(fields[1].to_owned()))?;
    Ok(Timing {
        start_time,
        stop_time,
    })
}

fn unmarshal_repeat_time(value: &str) -> Result<RepeatTime> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(Error::SdpInvalidSyntax(format!("`r={value}`")));
    }
    Ok(RepeatTime {
        interval: parse_time_units(fields[0])?,
        duration: parse_time_units(fields[1])?,
        offsets: fields[2..]
            .iter()
            .map(|f| parse_time_units(f))
            .collect::<Result<Vec<i64>>>()?,
    })
}

fn unmarshal_time_zones(value: &str) -> Result<Vec<TimeZone>> {
    // These fields are transimitted in pairs
    // z=<adjustment time> <offset> <adjustment time> <offset> ....
    // so we are making sure that there are actually multiple of 2 total.
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.is_empty() || fields.len() % 2 != 0 {
        return Err(Error::SdpInvalidSyntax(format!("`z={value}`")));
    }

    fields
        .chunks(2)
        .map(|pair| {
            Ok(TimeZone {
                adjustment_time: pair[0]
                    .parse::<u64>()
                    .map_err(|_| Error::SdpInvalidValue(pair[0].to_owned()))?,
                offset: parse_time_units(pair[1])?,
            })
        })
        .collect()
}

/// Seconds of a typed time value, `<number>[d|h|m|s]` (RFC 4566 5.10).
fn parse_time_units(value: &str) -> Result<i64> {
    let (num, factor) = match value.chars().last() {
        Some('d') => (&value[..value.len() - 1], 86400),
        Some('h') => (&value[..value.len() - 1], 3600),
        Some('m') => (&value[..value.len() - 1], 60),
        Some('s') => (&value[..value.len() - 1], 1),
        _ => (value, 1),
    };
    num.parse::<i64>()
        .map(|n| n * factor)
        .map_err(|_| Error::SdpInvalidValue(value.to_owned()))
}
