use std::fmt;

use ice::attributes::control::IceRole;
use sdp::description::session::SessionDescription;
use sdp::util::ConnectionRole;
use serde::{Deserialize, Serialize};

/// RTCDtlsRole indicates the role of the DTLS transport.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RTCDtlsRole {
    #[default]
    Unspecified,

    /// The role is determined by the ICE role: the ICE controlling side is
    /// the DTLS server.
    #[serde(rename = "auto")]
    Auto,

    /// The endpoint sends the ClientHello.
    #[serde(rename = "client")]
    Client,

    /// The endpoint waits for the ClientHello.
    #[serde(rename = "server")]
    Server,
}

/// The role an answerer takes when nothing else decides it. Answering
/// `active` lets the handshake start one round trip earlier.
/// <https://tools.ietf.org/html/rfc5763#section-5>
pub(crate) const DEFAULT_DTLS_ROLE_ANSWER: RTCDtlsRole = RTCDtlsRole::Client;

/// An offerer must always use actpass.
/// <https://tools.ietf.org/html/rfc5763#section-5>
pub(crate) const DEFAULT_DTLS_ROLE_OFFER: RTCDtlsRole = RTCDtlsRole::Auto;

impl fmt::Display for RTCDtlsRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            RTCDtlsRole::Auto => write!(f, "auto"),
            RTCDtlsRole::Client => write!(f, "client"),
            RTCDtlsRole::Server => write!(f, "server"),
            _ => write!(
                f,
                "{}",
                crate::peer_connection::configuration::UNSPECIFIED_STR
            ),
        }
    }
}

/// Role asserted by the `a=setup` of a remote description. active means the
/// remote is the client, passive the server, anything else leaves it open.
impl From<&SessionDescription> for RTCDtlsRole {
    fn from(session_description: &SessionDescription) -> Self {
        RTCDtlsRole::from(session_description.connection_role())
    }
}

impl From<ConnectionRole> for RTCDtlsRole {
    fn from(role: ConnectionRole) -> Self {
        match role {
            ConnectionRole::Active => RTCDtlsRole::Client,
            ConnectionRole::Passive => RTCDtlsRole::Server,
            _ => RTCDtlsRole::Auto,
        }
    }
}

impl RTCDtlsRole {
    pub(crate) fn to_connection_role(self) -> ConnectionRole {
        match self {
            RTCDtlsRole::Client => ConnectionRole::Active,
            RTCDtlsRole::Server => ConnectionRole::Passive,
            RTCDtlsRole::Auto => ConnectionRole::Actpass,
            _ => ConnectionRole::Unspecified,
        }
    }

    pub(crate) fn is_explicit(self) -> bool {
        matches!(self, RTCDtlsRole::Client | RTCDtlsRole::Server)
    }

    pub(crate) fn inverse(self) -> Self {
        match self {
            RTCDtlsRole::Client => RTCDtlsRole::Server,
            RTCDtlsRole::Server => RTCDtlsRole::Client,
            other => other,
        }
    }
}

/// Picks the local DTLS role once the remote description is known.
///
/// An explicit remote role wins, then an explicit local answering role, then
/// the ICE role: the controlling agent acts as the DTLS server.
pub(crate) fn derive_role(
    remote_role: RTCDtlsRole,
    answering_role: RTCDtlsRole,
    ice_role: IceRole,
) -> RTCDtlsRole {
    if remote_role.is_explicit() {
        return remote_role.inverse();
    }

    if answering_role.is_explicit() {
        return answering_role;
    }

    if ice_role == IceRole::Controlling {
        return RTCDtlsRole::Server;
    }

    DEFAULT_DTLS_ROLE_ANSWER
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;
    use shared::error::Result;

    #[test]
    fn test_dtls_role_string() {
        let tests = vec![
            (RTCDtlsRole::Unspecified, "Unspecified"),
            (RTCDtlsRole::Auto, "auto"),
            (RTCDtlsRole::Client, "client"),
            (RTCDtlsRole::Server, "server"),
        ];

        for (role, expected_string) in tests {
            assert_eq!(role.to_string(), expected_string)
        }
    }

    #[test]
    fn test_dtls_role_from_remote_sdp() -> Result<()> {
        const NO_MEDIA: &str = "v=0
o=- 4596489990601351948 2 IN IP4 127.0.0.1
s=-
t=0 0
";

        const MEDIA_NO_SETUP: &str = "v=0
o=- 4596489990601351948 2 IN IP4 127.0.0.1
s=-
t=0 0
m=audio 47299 UDP/TLS/RTP/SAVPF 111
c=IN IP4 192.168.20.129
";

        const MEDIA_SETUP_DECLARED: &str = "v=0
o=- 4596489990601351948 2 IN IP4 127.0.0.1
s=-
t=0 0
m=audio 47299 UDP/TLS/RTP/SAVPF 111
c=IN IP4 192.168.20.129
a=setup:";

        let tests = vec![
            ("no media", NO_MEDIA.to_owned(), RTCDtlsRole::Auto),
            ("no setup", MEDIA_NO_SETUP.to_owned(), RTCDtlsRole::Auto),
            (
                "setup:actpass",
                format!("{MEDIA_SETUP_DECLARED}actpass\n"),
                RTCDtlsRole::Auto,
            ),
            (
                "setup:passive",
                format!("{MEDIA_SETUP_DECLARED}passive\n"),
                RTCDtlsRole::Server,
            ),
            (
                "setup:active",
                format!("{MEDIA_SETUP_DECLARED}active\n"),
                RTCDtlsRole::Client,
            ),
        ];

        for (name, session_description_str, expected_role) in tests {
            let mut reader = Cursor::new(session_description_str.as_bytes());
            let session_description = SessionDescription::unmarshal(&mut reader)?;
            assert_eq!(
                RTCDtlsRole::from(&session_description),
                expected_role,
                "{name} failed"
            );
        }

        Ok(())
    }

    #[test]
    fn test_derive_role() {
        let tests = vec![
            (
                "remote active",
                RTCDtlsRole::Client,
                RTCDtlsRole::Client,
                IceRole::Controlling,
                RTCDtlsRole::Server,
            ),
            (
                "remote passive",
                RTCDtlsRole::Server,
                RTCDtlsRole::Unspecified,
                IceRole::Controlling,
                RTCDtlsRole::Client,
            ),
            (
                "answering role",
                RTCDtlsRole::Auto,
                RTCDtlsRole::Server,
                IceRole::Controlled,
                RTCDtlsRole::Server,
            ),
            (
                "ice controlling",
                RTCDtlsRole::Auto,
                RTCDtlsRole::Unspecified,
                IceRole::Controlling,
                RTCDtlsRole::Server,
            ),
            (
                "ice controlled",
                RTCDtlsRole::Auto,
                RTCDtlsRole::Auto,
                IceRole::Controlled,
                RTCDtlsRole::Client,
            ),
        ];

        for (name, remote, answering, ice_role, expected) in tests {
            assert_eq!(derive_role(remote, answering, ice_role), expected, "{name}");
        }
    }
}
