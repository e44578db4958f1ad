use std::fmt::Display;
use std::io::Cursor;

use sdp::description::session::SessionDescription;
use serde::{Deserialize, Serialize};

use super::sdp_type::RTCSdpType;
use shared::error::Result;

/// A session description as exchanged over signaling, serialized to JSON as
/// `{"type": "offer", "sdp": "..."}`.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct RTCSessionDescription {
    #[serde(rename = "type")]
    pub sdp_type: RTCSdpType,

    pub sdp: String,

    #[serde(skip)]
    pub(crate) parsed: Option<SessionDescription>,
}

impl PartialEq for RTCSessionDescription {
    fn eq(&self, other: &Self) -> bool {
        self.sdp_type == other.sdp_type && self.sdp == other.sdp
    }
}

impl Display for RTCSessionDescription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "type: {}, sdp:\n{}",
            self.sdp_type,
            self.sdp.replace("\r\n", "\n")
        )
    }
}

impl RTCSessionDescription {
    fn with_type(sdp: String, sdp_type: RTCSdpType) -> Result<Self> {
        let mut desc = RTCSessionDescription {
            sdp,
            sdp_type,
            parsed: None,
        };
        desc.parsed = Some(desc.unmarshal()?);
        Ok(desc)
    }

    pub fn answer(sdp: String) -> Result<RTCSessionDescription> {
        Self::with_type(sdp, RTCSdpType::Answer)
    }

    pub fn offer(sdp: String) -> Result<RTCSessionDescription> {
        Self::with_type(sdp, RTCSdpType::Offer)
    }

    pub fn pranswer(sdp: String) -> Result<RTCSessionDescription> {
        Self::with_type(sdp, RTCSdpType::Pranswer)
    }

    /// A rollback carries no SDP.
    pub fn rollback() -> RTCSessionDescription {
        RTCSessionDescription {
            sdp_type: RTCSdpType::Rollback,
            ..Default::default()
        }
    }

    pub(crate) fn from_parsed(sdp_type: RTCSdpType, parsed: SessionDescription) -> Self {
        RTCSessionDescription {
            sdp_type,
            sdp: parsed.marshal(),
            parsed: Some(parsed),
        }
    }

    /// Parses `sdp`.
    pub fn unmarshal(&self) -> Result<SessionDescription> {
        let mut reader = Cursor::new(self.sdp.as_bytes());
        let parsed = SessionDescription::unmarshal(&mut reader)?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_session_description_json() -> Result<()> {
        let tests = vec![
            (RTCSdpType::Offer, r#"{"type":"offer","sdp":"sdp"}"#),
            (RTCSdpType::Pranswer, r#"{"type":"pranswer","sdp":"sdp"}"#),
            (RTCSdpType::Answer, r#"{"type":"answer","sdp":"sdp"}"#),
            (RTCSdpType::Rollback, r#"{"type":"rollback","sdp":"sdp"}"#),
        ];

        for (sdp_type, expected_string) in tests {
            let desc = RTCSessionDescription {
                sdp_type,
                sdp: "sdp".to_owned(),
                parsed: None,
            };
            let desc_data = serde_json::to_string(&desc)
                .map_err(|err| shared::error::Error::Other(err.to_string()))?;
            assert_eq!(desc_data, expected_string);

            let sd = serde_json::from_str::<RTCSessionDescription>(&desc_data)
                .map_err(|err| shared::error::Error::Other(err.to_string()))?;
            assert_eq!(sd, desc);
        }

        Ok(())
    }

    #[test]
    fn test_session_description_parse() -> Result<()> {
        let sdp = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n".to_owned();
        let desc = RTCSessionDescription::offer(sdp.clone())?;
        assert_eq!(desc.sdp_type, RTCSdpType::Offer);
        assert!(desc.parsed.is_some());
        assert_eq!(desc.unmarshal()?.marshal(), sdp);

        assert!(RTCSessionDescription::answer("v=x".to_owned()).is_err());

        Ok(())
    }
}
