use std::collections::BTreeMap;
use std::fmt;

use shared::error::*;

pub const ATTRIBUTE_KEY: &str = "a=";

pub const SEMANTIC_TOKEN_BUNDLE: &str = "BUNDLE";
pub const SEMANTIC_TOKEN_LIP_SYNCHRONIZATION: &str = "LS";
pub const SEMANTIC_TOKEN_FLOW_IDENTIFICATION: &str = "FID";
pub const SEMANTIC_TOKEN_FORWARD_ERROR_CORRECTION_FRAMEWORK: &str = "FEC-FR";
pub const SEMANTIC_TOKEN_SIMULCAST: &str = "SIM";

/// ConnectionRole indicates which of the end points should initiate the connection establishment
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum ConnectionRole {
    #[default]
    Unspecified,

    /// ConnectionRoleActive indicates the endpoint will initiate an outgoing connection.
    Active,

    /// ConnectionRolePassive indicates the endpoint will accept an incoming connection.
    Passive,

    /// ConnectionRoleActpass indicates the endpoint is willing to accept an incoming connection or to initiate an outgoing connection.
    Actpass,

    /// ConnectionRoleHoldconn indicates the endpoint does not want the connection to be established for the time being.
    Holdconn,
}

const CONNECTION_ROLE_ACTIVE_STR: &str = "active";
const CONNECTION_ROLE_PASSIVE_STR: &str = "passive";
const CONNECTION_ROLE_ACTPASS_STR: &str = "actpass";
const CONNECTION_ROLE_HOLDCONN_STR: &str = "holdconn";

impl fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionRole::Active => CONNECTION_ROLE_ACTIVE_STR,
            ConnectionRole::Passive => CONNECTION_ROLE_PASSIVE_STR,
            ConnectionRole::Actpass => CONNECTION_ROLE_ACTPASS_STR,
            ConnectionRole::Holdconn => CONNECTION_ROLE_HOLDCONN_STR,
            _ => "Unspecified",
        };
        write!(f, "{s}")
    }
}

impl From<u8> for ConnectionRole {
    fn from(v: u8) -> Self {
        match v {
            1 => ConnectionRole::Active,
            2 => ConnectionRole::Passive,
            3 => ConnectionRole::Actpass,
            4 => ConnectionRole::Holdconn,
            _ => ConnectionRole::Unspecified,
        }
    }
}

impl From<&str> for ConnectionRole {
    fn from(raw: &str) -> Self {
        match raw {
            CONNECTION_ROLE_ACTIVE_STR => ConnectionRole::Active,
            CONNECTION_ROLE_PASSIVE_STR => ConnectionRole::Passive,
            CONNECTION_ROLE_ACTPASS_STR => ConnectionRole::Actpass,
            CONNECTION_ROLE_HOLDCONN_STR => ConnectionRole::Holdconn,
            _ => ConnectionRole::Unspecified,
        }
    }
}

/// Codec represents a codec
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Codec {
    pub payload_type: u8,
    pub name: String,
    pub clock_rate: u32,
    pub encoding_parameters: String,
    pub fmtp: String,
    pub rtcp_feedback: Vec<String>,
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{}/{} ({}) [{}]",
            self.payload_type,
            self.name,
            self.clock_rate,
            self.encoding_parameters,
            self.fmtp,
            self.rtcp_feedback.join(", "),
        )
    }
}

impl Codec {
    /// Value of an `a=rtpmap:` attribute for this codec.
    pub fn rtpmap(&self) -> String {
        let mut rtpmap = format!("{} {}/{}", self.payload_type, self.name, self.clock_rate);
        if !self.encoding_parameters.is_empty() {
            rtpmap += format!("/{}", self.encoding_parameters).as_str();
        }
        rtpmap
    }

    /// Channel count; an absent encoding parameter means one channel.
    pub fn channels(&self) -> u16 {
        self.encoding_parameters.parse().unwrap_or(1)
    }

    /// fmtp parameters with lowercase keys. Flags without a value map to "".
    pub fn fmtp_params(&self) -> BTreeMap<String, String> {
        parse_fmtp_params(&self.fmtp)
    }

    /// Whether both codecs describe the same format, so one payload type may
    /// carry either. The names compare case-insensitively, and only the
    /// format parameters that change how the payload is decoded count.
    pub fn same_format(&self, other: &Codec) -> bool {
        if !self.name.eq_ignore_ascii_case(&other.name)
            || self.clock_rate != other.clock_rate
            || self.channels() != other.channels()
        {
            return false;
        }

        let (a, b) = (self.fmtp_params(), other.fmtp_params());
        let relevant: &[&str] = match self.name.to_ascii_lowercase().as_str() {
            "h264" => &["packetization-mode", "profile-level-id"],
            "vp9" => &["profile-id"],
            "av1" => &["profile"],
            "rtx" | "red" | "ulpfec" | "flexfec-03" => &["apt"],
            _ => &[],
        };

        relevant.iter().all(|k| match *k {
            // absent packetization-mode is mode 0 (RFC 6184 8.1)
            "packetization-mode" => {
                a.get(*k).map_or("0", |v| v.as_str()) == b.get(*k).map_or("0", |v| v.as_str())
            }
            "profile-level-id" => profile_of(a.get(*k)) == profile_of(b.get(*k)),
            _ => a.get(*k) == b.get(*k),
        })
    }
}

// profile_idc and profile_iop of an H264 profile-level-id; the level does
// not change how the stream is decoded.
fn profile_of(v: Option<&String>) -> Option<String> {
    v.map(|s| s.chars().take(4).collect::<String>().to_ascii_lowercase())
}

pub(crate) fn parse_fmtp_params(fmtp: &str) -> BTreeMap<String, String> {
    fmtp.split(';')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| match p.split_once('=') {
            Some((k, v)) => (k.trim().to_ascii_lowercase(), v.trim().to_owned()),
            None => (p.to_ascii_lowercase(), String::new()),
        })
        .collect()
}

/// Parses the value of `a=rtpmap:<payload type> <encoding name>/<clock rate>[/<encoding parameters>]`.
pub fn parse_rtpmap(rtpmap: &str) -> Result<Codec> {
    let split: Vec<&str> = rtpmap.split_whitespace().collect();
    if split.len() != 2 {
        return Err(Error::SdpInvalidValue(format!("rtpmap:{rtpmap}")));
    }

    let payload_type = split[0]
        .parse::<u8>()
        .map_err(|_| Error::SdpInvalidValue(format!("rtpmap payload type {}", split[0])))?;

    let split: Vec<&str> = split[1].split('/').collect();
    if split.len() < 2 || split.len() > 3 || split[0].is_empty() {
        return Err(Error::SdpInvalidValue(format!("rtpmap:{rtpmap}")));
    }
    let name = split[0].to_string();
    let clock_rate = split[1]
        .parse::<u32>()
        .map_err(|_| Error::SdpInvalidValue(format!("rtpmap clock rate {}", split[1])))?;
    let encoding_parameters = if split.len() == 3 {
        split[2].to_string()
    } else {
        String::new()
    };

    Ok(Codec {
        payload_type,
        name,
        clock_rate,
        encoding_parameters,
        ..Default::default()
    })
}

/// Parses the value of `a=fmtp:<format> <format specific parameters>`.
pub fn parse_fmtp(fmtp: &str) -> Result<Codec> {
    let (pt, params) = fmtp.split_once(' ').ok_or(Error::MissingWhitespace)?;
    let payload_type = pt
        .parse::<u8>()
        .map_err(|_| Error::SdpInvalidValue(format!("fmtp payload type {pt}")))?;

    Ok(Codec {
        payload_type,
        fmtp: params.trim().to_string(),
        ..Default::default()
    })
}

/// Parses the value of `a=rtcp-fb:<payload type|*> <RTCP feedback type> [<RTCP feedback parameter>]`.
/// The payload type is None for the `*` wildcard.
pub fn parse_rtcp_fb(rtcp_fb: &str) -> Result<(Option<u8>, String)> {
    let (pt, feedback) = rtcp_fb.split_once(' ').ok_or(Error::MissingWhitespace)?;
    if pt == "*" {
        return Ok((None, feedback.trim().to_string()));
    }
    let payload_type = pt
        .parse::<u8>()
        .map_err(|_| Error::SdpInvalidValue(format!("rtcp-fb payload type {pt}")))?;
    Ok((Some(payload_type), feedback.trim().to_string()))
}

/// Codecs with a static payload type (RFC 3551 table 4) that may appear
/// without an rtpmap.
pub(crate) fn static_codec(payload_type: u8) -> Option<Codec> {
    let (name, clock_rate) = match payload_type {
        0 => ("PCMU", 8000),
        8 => ("PCMA", 8000),
        9 => ("G722", 8000),
        _ => return None,
    };
    Some(Codec {
        payload_type,
        name: name.to_owned(),
        clock_rate,
        ..Default::default()
    })
}

/// SsrcGroup is the value of an `a=ssrc-group:<semantics> <ssrc-id> ...` attribute (RFC 5576).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SsrcGroup {
    pub semantics: String,
    pub ssrcs: Vec<u32>,
}

impl SsrcGroup {
    pub fn unmarshal(value: &str) -> Result<Self> {
        let mut fields = value.split_whitespace();
        let semantics = fields
            .next()
            .ok_or_else(|| Error::SdpInvalidSyntax(format!("ssrc-group:{value}")))?
            .to_owned();
        let ssrcs = fields
            .map(|s| {
                s.parse::<u32>()
                    .map_err(|_| Error::SdpInvalidValue(format!("ssrc-group ssrc {s}")))
            })
            .collect::<Result<Vec<u32>>>()?;
        Ok(SsrcGroup { semantics, ssrcs })
    }

    pub fn marshal(&self) -> String {
        let mut out = self.semantics.clone();
        for ssrc in &self.ssrcs {
            out += format!(" {ssrc}").as_str();
        }
        out
    }
}

/// Splits the value of `a=ssrc:<ssrc-id> <attribute>[:<value>]` into the ssrc
/// and the source attribute.
pub fn parse_ssrc(value: &str) -> Result<(u32, &str)> {
    let (ssrc, attr) = match value.split_once(' ') {
        Some((ssrc, attr)) => (ssrc, attr.trim()),
        None => (value.trim(), ""),
    };
    let ssrc = ssrc
        .parse::<u32>()
        .map_err(|_| Error::SdpInvalidValue(format!("ssrc {ssrc}")))?;
    Ok((ssrc, attr))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_connection_role() {
        for (raw, role) in [
            ("active", ConnectionRole::Active),
            ("passive", ConnectionRole::Passive),
            ("actpass", ConnectionRole::Actpass),
            ("holdconn", ConnectionRole::Holdconn),
        ] {
            assert_eq!(ConnectionRole::from(raw), role);
            assert_eq!(role.to_string(), raw);
        }
        assert_eq!(ConnectionRole::from("ACTIVE"), ConnectionRole::Unspecified);
        assert_eq!(ConnectionRole::from(3u8), ConnectionRole::Actpass);
    }

    #[test]
    fn test_parse_rtpmap() -> Result<()> {
        let codec = parse_rtpmap("111 opus/48000/2")?;
        assert_eq!(codec.payload_type, 111);
        assert_eq!(codec.name, "opus");
        assert_eq!(codec.clock_rate, 48000);
        assert_eq!(codec.channels(), 2);
        assert_eq!(codec.rtpmap(), "111 opus/48000/2");

        let codec = parse_rtpmap("96 VP8/90000")?;
        assert_eq!(codec.channels(), 1);
        assert_eq!(codec.rtpmap(), "96 VP8/90000");

        for bad in ["96", "96 VP8", "300 VP8/90000", "x VP8/90000", "96 VP8/fast", "96 /90000"] {
            assert!(parse_rtpmap(bad).is_err(), "{bad}");
        }
        Ok(())
    }

    #[test]
    fn test_parse_fmtp_and_feedback() -> Result<()> {
        let codec = parse_fmtp("111 minptime=10; useinbandfec=1")?;
        assert_eq!(codec.payload_type, 111);
        let params = codec.fmtp_params();
        assert_eq!(params.get("minptime").map(String::as_str), Some("10"));
        assert_eq!(params.get("useinbandfec").map(String::as_str), Some("1"));

        assert_eq!(parse_fmtp("111"), Err(Error::MissingWhitespace));

        assert_eq!(
            parse_rtcp_fb("96 nack pli")?,
            (Some(96), "nack pli".to_owned())
        );
        assert_eq!(parse_rtcp_fb("* transport-cc")?, (None, "transport-cc".to_owned()));
        Ok(())
    }

    #[test]
    fn test_codec_same_format() -> Result<()> {
        let mut h264_a = parse_rtpmap("102 H264/90000")?;
        h264_a.fmtp =
            "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42001f".to_owned();
        let mut h264_b = parse_rtpmap("102 h264/90000")?;
        h264_b.fmtp = "profile-level-id=42e01f;packetization-mode=1".to_owned();
        assert!(!h264_a.same_format(&h264_b), "different profile_iop");

        h264_b.fmtp = "profile-level-id=42001e;packetization-mode=1".to_owned();
        assert!(h264_a.same_format(&h264_b), "level does not matter");

        h264_b.fmtp = "profile-level-id=42001f".to_owned();
        assert!(!h264_a.same_format(&h264_b), "packetization mode 0 vs 1");

        let opus = parse_rtpmap("111 opus/48000/2")?;
        let mono = parse_rtpmap("111 opus/48000")?;
        assert!(!opus.same_format(&mono));
        assert!(opus.same_format(&opus.clone()));

        let mut tuned = opus.clone();
        tuned.fmtp = "minptime=20;useinbandfec=0".to_owned();
        assert!(opus.same_format(&tuned), "opus parameters do not change the format");

        let vp8 = parse_rtpmap("96 VP8/90000")?;
        assert!(!vp8.same_format(&h264_a));
        Ok(())
    }

    #[test]
    fn test_ssrc_group() -> Result<()> {
        let group = SsrcGroup::unmarshal("FID 1111 2222")?;
        assert_eq!(group.semantics, SEMANTIC_TOKEN_FLOW_IDENTIFICATION);
        assert_eq!(group.ssrcs, vec![1111, 2222]);
        assert_eq!(group.marshal(), "FID 1111 2222");

        assert!(SsrcGroup::unmarshal("").is_err());
        assert!(SsrcGroup::unmarshal("SIM 1 two").is_err());

        assert_eq!(parse_ssrc("1111 cname:abc")?, (1111, "cname:abc"));
        assert_eq!(parse_ssrc("2222")?, (2222, ""));
        assert!(parse_ssrc("-1 cname:x").is_err());
        Ok(())
    }
}
