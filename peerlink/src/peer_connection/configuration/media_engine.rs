//! Media capabilities advertised in offers and matched against remote
//! offers when answering.
//!
//! The engine does not encode or decode anything. It only lists the codecs
//! and RTP header extensions this endpoint is willing to negotiate, and
//! whether it takes part in data channel sections.
//!
//! ```
//! use peerlink::peer_connection::configuration::media_engine::{MediaEngine, MediaKind};
//! use peerlink::sdp::util::Codec;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut media_engine = MediaEngine::default();
//! media_engine.register_codec(
//!     Codec {
//!         payload_type: 111,
//!         name: "opus".to_owned(),
//!         clock_rate: 48000,
//!         encoding_parameters: "2".to_owned(),
//!         fmtp: "minptime=10;useinbandfec=1".to_owned(),
//!         rtcp_feedback: vec![],
//!     },
//!     MediaKind::Audio,
//! )?;
//! media_engine.register_header_extension(
//!     "urn:ietf:params:rtp-hdrext:sdes:mid",
//!     MediaKind::Audio,
//! )?;
//! # Ok(())
//! # }
//! ```

use std::fmt;

use sdp::extmap::{
    ABS_SEND_TIME_URI, AUDIO_LEVEL_URI, SDES_MID_URI, SDES_REPAIR_RTP_STREAM_ID_URI,
    SDES_RTP_STREAM_ID_URI, TRANSPORT_CC_URI, VIDEO_ORIENTATION_URI,
};
use sdp::util::Codec;
use shared::error::{Error, Result};

pub const MIME_TYPE_OPUS: &str = "opus";
pub const MIME_TYPE_G722: &str = "G722";
pub const MIME_TYPE_PCMU: &str = "PCMU";
pub const MIME_TYPE_PCMA: &str = "PCMA";
pub const MIME_TYPE_VP8: &str = "VP8";
pub const MIME_TYPE_VP9: &str = "VP9";
pub const MIME_TYPE_H264: &str = "H264";
pub const MIME_TYPE_RTX: &str = "rtx";

/// Format of SCTP-over-DTLS application sections (RFC 8841).
pub const DATA_CHANNEL_FORMAT: &str = "webrtc-datachannel";

/// Kind of an `m=` line.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Audio,
    Video,
    Application,
}

const MEDIA_KIND_AUDIO_STR: &str = "audio";
const MEDIA_KIND_VIDEO_STR: &str = "video";
const MEDIA_KIND_APPLICATION_STR: &str = "application";

impl MediaKind {
    /// The kind named by an `m=` line, `None` for kinds this endpoint
    /// never negotiates.
    pub fn from_media(media: &str) -> Option<Self> {
        match media {
            MEDIA_KIND_AUDIO_STR => Some(MediaKind::Audio),
            MEDIA_KIND_VIDEO_STR => Some(MediaKind::Video),
            MEDIA_KIND_APPLICATION_STR => Some(MediaKind::Application),
            _ => None,
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            MediaKind::Audio => MEDIA_KIND_AUDIO_STR,
            MediaKind::Video => MEDIA_KIND_VIDEO_STR,
            MediaKind::Application => MEDIA_KIND_APPLICATION_STR,
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderExtension {
    kind: MediaKind,
    uri: String,
}

/// MediaEngine lists the codecs and header extensions an endpoint supports.
#[derive(Default, Debug, Clone)]
pub struct MediaEngine {
    audio_codecs: Vec<Codec>,
    video_codecs: Vec<Codec>,
    header_extensions: Vec<HeaderExtension>,
    data_channels: bool,
}

impl MediaEngine {
    /// Registers the default codecs, header extensions and data channels.
    pub fn register_defaults(&mut self) {
        self.register_default_codecs();
        self.register_default_header_extensions();
        self.data_channels = true;
    }

    /// Registers Opus, G722, PCMU and PCMA for audio, and VP8, VP9 and
    /// H264 with their retransmission formats for video.
    pub fn register_default_codecs(&mut self) {
        let audio = [
            (MIME_TYPE_OPUS, 111, 48000, "2", "minptime=10;useinbandfec=1"),
            (MIME_TYPE_G722, 9, 8000, "", ""),
            (MIME_TYPE_PCMU, 0, 8000, "", ""),
            (MIME_TYPE_PCMA, 8, 8000, "", ""),
        ];
        for (name, payload_type, clock_rate, channels, fmtp) in audio {
            self.push_codec(
                Codec {
                    payload_type,
                    name: name.to_owned(),
                    clock_rate,
                    encoding_parameters: channels.to_owned(),
                    fmtp: fmtp.to_owned(),
                    rtcp_feedback: if name == MIME_TYPE_OPUS {
                        vec!["transport-cc".to_owned()]
                    } else {
                        vec![]
                    },
                },
                MediaKind::Audio,
            );
        }

        let video_feedback: Vec<String> = ["goog-remb", "transport-cc", "ccm fir", "nack", "nack pli"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let video = [
            (MIME_TYPE_VP8, 96, ""),
            (MIME_TYPE_VP9, 98, "profile-id=0"),
            (
                MIME_TYPE_H264,
                102,
                "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42001f",
            ),
        ];
        for (name, payload_type, fmtp) in video {
            self.push_codec(
                Codec {
                    payload_type,
                    name: name.to_owned(),
                    clock_rate: 90000,
                    encoding_parameters: String::new(),
                    fmtp: fmtp.to_owned(),
                    rtcp_feedback: video_feedback.clone(),
                },
                MediaKind::Video,
            );
            self.push_codec(
                Codec {
                    payload_type: payload_type + 1,
                    name: MIME_TYPE_RTX.to_owned(),
                    clock_rate: 90000,
                    encoding_parameters: String::new(),
                    fmtp: format!("apt={payload_type}"),
                    rtcp_feedback: vec![],
                },
                MediaKind::Video,
            );
        }
    }

    pub fn register_default_header_extensions(&mut self) {
        for uri in [SDES_MID_URI, AUDIO_LEVEL_URI, TRANSPORT_CC_URI] {
            self.push_header_extension(uri, MediaKind::Audio);
        }
        for uri in [
            SDES_MID_URI,
            SDES_RTP_STREAM_ID_URI,
            SDES_REPAIR_RTP_STREAM_ID_URI,
            TRANSPORT_CC_URI,
            ABS_SEND_TIME_URI,
            VIDEO_ORIENTATION_URI,
        ] {
            self.push_header_extension(uri, MediaKind::Video);
        }
    }

    /// Adds a codec. A payload type already bound to a different format, in
    /// any kind, is refused so that local offers can be bundled.
    pub fn register_codec(&mut self, codec: Codec, kind: MediaKind) -> Result<()> {
        if kind == MediaKind::Application {
            return Err(Error::ErrInvalidParameter(
                "codecs cannot be registered for application sections".to_owned(),
            ));
        }
        if codec.name.is_empty() || codec.clock_rate == 0 {
            return Err(Error::ErrInvalidParameter(format!(
                "codec {} needs a name and a clock rate",
                codec.payload_type
            )));
        }

        if let Some(existing) = self
            .audio_codecs
            .iter()
            .chain(self.video_codecs.iter())
            .find(|c| c.payload_type == codec.payload_type)
        {
            if existing.same_format(&codec) {
                return Ok(());
            }
            return Err(Error::ErrInvalidParameter(format!(
                "payload type {} already registered for {}",
                codec.payload_type, existing.name
            )));
        }

        self.push_codec(codec, kind);
        Ok(())
    }

    pub fn register_header_extension(&mut self, uri: &str, kind: MediaKind) -> Result<()> {
        if kind == MediaKind::Application {
            return Err(Error::ErrInvalidParameter(
                "header extensions cannot be registered for application sections".to_owned(),
            ));
        }
        self.push_header_extension(uri, kind);
        Ok(())
    }

    /// Whether `m=application` sections carrying data channels are accepted
    /// and offered.
    pub fn set_data_channels(&mut self, enabled: bool) {
        self.data_channels = enabled;
    }

    pub fn supports_data_channels(&self) -> bool {
        self.data_channels
    }

    pub fn audio_codecs(&self) -> &[Codec] {
        &self.audio_codecs
    }

    pub fn video_codecs(&self) -> &[Codec] {
        &self.video_codecs
    }

    pub fn codecs(&self, kind: MediaKind) -> &[Codec] {
        match kind {
            MediaKind::Audio => &self.audio_codecs,
            MediaKind::Video => &self.video_codecs,
            MediaKind::Application => &[],
        }
    }

    /// Header extension URIs of `kind`, in registration order.
    pub fn header_extensions(&self, kind: MediaKind) -> Vec<&str> {
        self.header_extensions
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.uri.as_str())
            .collect()
    }

    /// Every distinct header extension URI, in registration order. Offers
    /// number extensions by their position here, so one URI keeps one id
    /// across all sections.
    pub(crate) fn header_extension_uris(&self) -> Vec<&str> {
        let mut uris: Vec<&str> = vec![];
        for e in &self.header_extensions {
            if !uris.contains(&e.uri.as_str()) {
                uris.push(e.uri.as_str());
            }
        }
        uris
    }

    /// The local codec describing the same format as `remote`.
    pub(crate) fn find_codec(&self, kind: MediaKind, remote: &Codec) -> Option<&Codec> {
        self.codecs(kind).iter().find(|c| c.same_format(remote))
    }

    /// A local codec with the name and clock rate of `remote`, for formats
    /// such as rtx whose parameters reference another payload type.
    pub(crate) fn find_codec_by_name(&self, kind: MediaKind, remote: &Codec) -> Option<&Codec> {
        self.codecs(kind).iter().find(|c| {
            c.name.eq_ignore_ascii_case(&remote.name) && c.clock_rate == remote.clock_rate
        })
    }

    pub(crate) fn supports_header_extension(&self, kind: MediaKind, uri: &str) -> bool {
        self.header_extensions
            .iter()
            .any(|e| e.kind == kind && e.uri == uri)
    }

    fn push_codec(&mut self, codec: Codec, kind: MediaKind) {
        match kind {
            MediaKind::Audio => self.audio_codecs.push(codec),
            MediaKind::Video => self.video_codecs.push(codec),
            MediaKind::Application => {}
        }
    }

    fn push_header_extension(&mut self, uri: &str, kind: MediaKind) {
        let ext = HeaderExtension {
            kind,
            uri: uri.to_owned(),
        };
        if !self.header_extensions.contains(&ext) {
            self.header_extensions.push(ext);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn opus(payload_type: u8) -> Codec {
        Codec {
            payload_type,
            name: MIME_TYPE_OPUS.to_owned(),
            clock_rate: 48000,
            encoding_parameters: "2".to_owned(),
            fmtp: "minptime=10;useinbandfec=1".to_owned(),
            rtcp_feedback: vec![],
        }
    }

    #[test]
    fn test_register_default_codecs() {
        let mut m = MediaEngine::default();
        m.register_defaults();

        assert_eq!(m.audio_codecs().len(), 4);
        assert_eq!(m.video_codecs().len(), 6);
        assert!(m.supports_data_channels());
        assert!(m.find_codec(MediaKind::Audio, &opus(109)).is_some());
        assert!(m.find_codec(MediaKind::Video, &opus(109)).is_none());

        let uris = m.header_extension_uris();
        assert_eq!(uris[0], SDES_MID_URI);
        assert_eq!(
            uris.iter().filter(|u| **u == TRANSPORT_CC_URI).count(),
            1,
            "a shared uri is listed once"
        );
        assert!(m.supports_header_extension(MediaKind::Audio, AUDIO_LEVEL_URI));
        assert!(!m.supports_header_extension(MediaKind::Video, AUDIO_LEVEL_URI));
    }

    #[test]
    fn test_register_codec() -> Result<()> {
        let mut m = MediaEngine::default();
        m.register_codec(opus(111), MediaKind::Audio)?;
        m.register_codec(opus(111), MediaKind::Audio)?;
        assert_eq!(m.audio_codecs().len(), 1);

        let vp8 = Codec {
            payload_type: 111,
            name: MIME_TYPE_VP8.to_owned(),
            clock_rate: 90000,
            ..Default::default()
        };
        assert!(m.register_codec(vp8, MediaKind::Video).is_err());
        assert!(m.register_codec(opus(100), MediaKind::Application).is_err());
        assert!(
            m.register_codec(
                Codec {
                    payload_type: 100,
                    ..Default::default()
                },
                MediaKind::Audio
            )
            .is_err()
        );

        Ok(())
    }

    #[test]
    fn test_media_kind() {
        for (s, kind) in [
            ("audio", MediaKind::Audio),
            ("video", MediaKind::Video),
            ("application", MediaKind::Application),
        ] {
            assert_eq!(MediaKind::from_media(s), Some(kind));
            assert_eq!(kind.to_string(), s);
        }
        assert_eq!(MediaKind::from_media("text"), None);
    }
}
