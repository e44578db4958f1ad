use std::fmt;

use url::Url;

use super::direction::*;
use shared::error::*;

/// Default ext values
pub const DEF_EXT_MAP_VALUE_ABS_SEND_TIME: usize = 1;
pub const DEF_EXT_MAP_VALUE_TRANSPORT_CC: usize = 2;
pub const DEF_EXT_MAP_VALUE_SDES_MID: usize = 3;
pub const DEF_EXT_MAP_VALUE_SDES_RTP_STREAM_ID: usize = 4;

pub const ABS_SEND_TIME_URI: &str = "http://www.webrtc.org/experiments/rtp-hdrext/abs-send-time";
pub const TRANSPORT_CC_URI: &str =
    "http://www.ietf.org/id/draft-holmer-rmcat-transport-wide-cc-extensions-01";
pub const SDES_MID_URI: &str = "urn:ietf:params:rtp-hdrext:sdes:mid";
pub const SDES_RTP_STREAM_ID_URI: &str = "urn:ietf:params:rtp-hdrext:sdes:rtp-stream-id";
pub const SDES_REPAIR_RTP_STREAM_ID_URI: &str =
    "urn:ietf:params:rtp-hdrext:sdes:repaired-rtp-stream-id";
pub const AUDIO_LEVEL_URI: &str = "urn:ietf:params:rtp-hdrext:ssrc-audio-level";
pub const VIDEO_ORIENTATION_URI: &str = "urn:3gpp:video-orientation";

/// Highest id usable with the two-byte header form (RFC 8285).
pub const MAX_EXT_MAP_VALUE: isize = 255;

/// ExtMap represents the activation of a single RTP header extension
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtMap {
    pub value: isize,
    pub direction: Direction,
    pub uri: Option<Url>,
    pub ext_attr: Option<String>,
}

impl fmt::Display for ExtMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut output = format!("{}", self.value);
        if self.direction != Direction::Unspecified {
            output += format!("/{}", self.direction).as_str();
        }

        if let Some(uri) = &self.uri {
            output += format!(" {uri}").as_str();
        }

        if let Some(ext_attr) = &self.ext_attr {
            output += format!(" {ext_attr}").as_str();
        }

        write!(f, "{output}")
    }
}

impl ExtMap {
    /// Parses the value of an `a=extmap:` attribute,
    /// `<value>["/"<direction>] <URI> <extensionattributes>`.
    pub fn unmarshal(line: &str) -> Result<Self> {
        let line = line.trim();
        let value = line.strip_prefix("extmap:").unwrap_or(line);

        let fields: Vec<&str> = value.split_whitespace().collect();
        if fields.len() < 2 {
            return Err(Error::SdpInvalidSyntax(line.to_owned()));
        }

        let valdir: Vec<&str> = fields[0].split('/').collect();
        let value = valdir[0].parse::<isize>()?;
        if !(1..=MAX_EXT_MAP_VALUE).contains(&value) {
            return Err(Error::SdpInvalidValue(format!(
                "{} -- extmap key must be in the range 1-{MAX_EXT_MAP_VALUE}",
                valdir[0]
            )));
        }

        let mut direction = Direction::Unspecified;
        if valdir.len() == 2 {
            direction = Direction::new(valdir[1]);
            if direction == Direction::Unspecified {
                return Err(Error::SdpInvalidValue(format!(
                    "unknown direction from {}",
                    valdir[1]
                )));
            }
        }

        let uri = Some(
            Url::parse(fields[1]).map_err(|err| Error::SdpInvalidValue(err.to_string()))?,
        );

        let ext_attr = if fields.len() > 2 {
            Some(fields[2..].join(" "))
        } else {
            None
        };

        Ok(ExtMap {
            value,
            direction,
            uri,
            ext_attr,
        })
    }

    /// marshal creates a string from an ExtMap
    pub fn marshal(&self) -> String {
        "extmap:".to_string() + self.to_string().as_str()
    }

    pub fn uri_str(&self) -> &str {
        self.uri.as_ref().map_or("", |u| u.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const EXAMPLE_ATTR_EXTMAP1: &str = "extmap:1 http://example.com/082005/ext.htm#ttime";
    const EXAMPLE_ATTR_EXTMAP2: &str =
        "extmap:2/sendrecv http://example.com/082005/ext.htm#xmeta short";
    const FAILING_ATTR_EXTMAP1: &str =
        "extmap:257/sendrecv http://example.com/082005/ext.htm#xmeta short";
    const FAILING_ATTR_EXTMAP2: &str =
        "extmap:2/blorg http://example.com/082005/ext.htm#xmeta short";

    #[test]
    fn test_extmap() -> Result<()> {
        let examples = [EXAMPLE_ATTR_EXTMAP1, EXAMPLE_ATTR_EXTMAP2];
        for example in examples {
            let extmap = ExtMap::unmarshal(example)?;
            assert_eq!(extmap.marshal(), example);
        }

        let extmap = ExtMap::unmarshal(EXAMPLE_ATTR_EXTMAP2)?;
        assert_eq!(extmap.value, 2);
        assert_eq!(extmap.direction, Direction::Sendrecv);
        assert_eq!(extmap.ext_attr.as_deref(), Some("short"));

        let extmap = ExtMap::unmarshal(&format!("3 {SDES_MID_URI}"))?;
        assert_eq!(extmap.uri_str(), SDES_MID_URI);

        Ok(())
    }

    #[test]
    fn test_failing_extmap() {
        for example in [FAILING_ATTR_EXTMAP1, FAILING_ATTR_EXTMAP2, "extmap:1", "extmap:x urn:a"] {
            assert!(ExtMap::unmarshal(example).is_err(), "{example}");
        }
    }
}
