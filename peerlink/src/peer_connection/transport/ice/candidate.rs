use ice::candidate::{Candidate, unmarshal_candidate};
use serde::{Deserialize, Serialize};
use shared::error::Result;

/// ICECandidateInit is used to serialize ice candidates
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RTCIceCandidateInit {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex")]
    pub sdp_mline_index: Option<u16>,
    pub username_fragment: Option<String>,
}

impl RTCIceCandidateInit {
    /// Describes a local candidate for trickling to the peer.
    pub fn from_candidate(
        candidate: &Candidate,
        sdp_mid: Option<String>,
        username_fragment: Option<String>,
    ) -> Self {
        RTCIceCandidateInit {
            candidate: format!("candidate:{}", candidate.marshal()),
            sdp_mline_index: sdp_mid.as_ref().map(|_| 0),
            sdp_mid,
            username_fragment,
        }
    }

    /// Parses the candidate line, with or without the `candidate:` prefix.
    pub fn to_candidate(&self) -> Result<Candidate> {
        unmarshal_candidate(&self.candidate)
    }

    /// An empty candidate string signals the end of candidates.
    pub fn is_end_of_candidates(&self) -> bool {
        self.candidate.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use shared::error::Error;

    #[test]
    fn test_ice_candidate_serialization() -> Result<()> {
        let tests = vec![
            (
                RTCIceCandidateInit {
                    candidate: "candidate:abc123".to_string(),
                    sdp_mid: Some("0".to_string()),
                    sdp_mline_index: Some(0),
                    username_fragment: Some("def".to_string()),
                },
                r#"{"candidate":"candidate:abc123","sdpMid":"0","sdpMLineIndex":0,"usernameFragment":"def"}"#,
            ),
            (
                RTCIceCandidateInit {
                    candidate: "candidate:abc123".to_string(),
                    sdp_mid: None,
                    sdp_mline_index: None,
                    username_fragment: None,
                },
                r#"{"candidate":"candidate:abc123","sdpMid":null,"sdpMLineIndex":null,"usernameFragment":null}"#,
            ),
        ];

        for (candidate_init, expected_string) in tests {
            let candidate_data = serde_json::to_string(&candidate_init)
                .map_err(|err| Error::Other(err.to_string()))?;
            assert_eq!(candidate_data, expected_string, "string is not expected");

            let actual: RTCIceCandidateInit = serde_json::from_str(&candidate_data)
                .map_err(|err| Error::Other(err.to_string()))?;
            assert_eq!(actual, candidate_init);
        }

        Ok(())
    }

    #[test]
    fn test_ice_candidate_parse() -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: "candidate:647372371 1 udp 2130706431 10.0.0.1 5000 typ host".to_owned(),
            sdp_mid: Some("0".to_owned()),
            ..Default::default()
        };
        let c = init.to_candidate()?;
        assert_eq!(c.port(), 5000);

        let back = RTCIceCandidateInit::from_candidate(&c, Some("0".to_owned()), None);
        assert_eq!(back.to_candidate()?.port(), 5000);
        assert!(back.candidate.starts_with("candidate:"));
        assert_eq!(back.sdp_mline_index, Some(0));
        assert!(!back.is_end_of_candidates());
        assert!(RTCIceCandidateInit::default().is_end_of_candidates());

        Ok(())
    }
}
