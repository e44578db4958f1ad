use std::io::Cursor;

use super::common::*;
use super::media::*;
use super::session::*;
use crate::direction::Direction;
use crate::extmap::*;
use crate::util::*;
use shared::error::*;

const CANONICAL_OFFER: &str = "v=0\r\n\
o=- 4596489990601351948 2 IN IP4 127.0.0.1\r\n\
s=-\r\n\
t=0 0\r\n\
a=group:BUNDLE 0 1\r\n\
a=ice-options:trickle dtls-in-stun\r\n\
m=audio 9 UDP/TLS/RTP/SAVPF 111 0\r\n\
c=IN IP4 0.0.0.0\r\n\
a=ice-ufrag:AbCd\r\n\
a=ice-pwd:0123456789abcdefghijklmn\r\n\
a=fingerprint:sha-256 AA:BB:CC\r\n\
a=setup:actpass\r\n\
a=mid:0\r\n\
a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level\r\n\
a=sendrecv\r\n\
a=rtcp-mux\r\n\
a=rtpmap:111 opus/48000/2\r\n\
a=fmtp:111 minptime=10;useinbandfec=1\r\n\
a=rtcp-fb:111 transport-cc\r\n\
a=ssrc:1001 cname:peer\r\n\
a=ssrc:1001 msid:stream audio\r\n\
a=candidate:1 1 udp 2130706431 10.0.0.1 5000 typ host\r\n\
m=video 9 UDP/TLS/RTP/SAVPF 96 97\r\n\
c=IN IP4 0.0.0.0\r\n\
b=AS:2000\r\n\
a=mid:1\r\n\
a=recvonly\r\n\
a=rtcp-mux\r\n\
a=rtpmap:96 VP8/90000\r\n\
a=rtpmap:97 rtx/90000\r\n\
a=fmtp:97 apt=96\r\n\
a=rtcp-fb:* nack\r\n\
a=ssrc-group:FID 2001 2002\r\n\
a=ssrc:2001 cname:peer\r\n\
a=ssrc:2002 cname:peer\r\n";

fn parse(sdp: &str) -> Result<SessionDescription> {
    SessionDescription::unmarshal(&mut Cursor::new(sdp.as_bytes()))
}

#[test]
fn test_unmarshal_marshal_canonical() -> Result<()> {
    let desc = parse(CANONICAL_OFFER)?;
    assert_eq!(desc.marshal(), CANONICAL_OFFER);

    assert_eq!(desc.origin.session_id, 4596489990601351948);
    assert_eq!(desc.media_descriptions.len(), 2);
    assert_eq!(desc.bundle_group(), Some(vec!["0", "1"]));
    assert!(desc.has_ice_option(ICE_OPTION_DTLS_IN_STUN));
    assert!(!desc.has_ice_option("renomination"));

    let video = desc.media_by_mid("1").expect("video section");
    assert_eq!(video.media_name.media, "video");
    assert_eq!(video.direction(), Direction::Recvonly);
    assert_eq!(
        video.bandwidth,
        vec![Bandwidth {
            experimental: false,
            bandwidth_type: "AS".to_owned(),
            bandwidth: 2000,
        }]
    );
    Ok(())
}

#[test]
fn test_unmarshal_lf_line_endings() -> Result<()> {
    let lf = CANONICAL_OFFER.replace("\r\n", "\n");
    let desc = parse(&lf)?;
    assert_eq!(desc.marshal(), CANONICAL_OFFER);
    Ok(())
}

#[test]
fn test_unknown_lines_are_skipped() -> Result<()> {
    let sdp = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nx=whatever\r\nt=0 0\r\n\
               m=audio 9 RTP/AVP 0\r\ny=unknown\r\na=x-vendor:1\r\n";
    let desc = parse(sdp)?;
    let audio = &desc.media_descriptions[0];
    assert_eq!(audio.attribute("x-vendor"), Some(Some("1")));
    assert_eq!(
        desc.marshal(),
        "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\nm=audio 9 RTP/AVP 0\r\na=x-vendor:1\r\n"
    );
    Ok(())
}

#[test]
fn test_malformed_lines_are_rejected() {
    let base = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n";
    let cases = [
        ("", "empty"),
        ("o=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\n", "missing v="),
        ("v=zero\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\n", "bad version"),
        ("v=0\r\no=- 1 IN IP4 0.0.0.0\r\ns=-\r\n", "short origin"),
        ("v=0\r\no=- x 1 IN IP4 0.0.0.0\r\ns=-\r\n", "bad session id"),
        ("v=0\r\no=- 1 1 XX IP4 0.0.0.0\r\ns=-\r\n", "bad nettype"),
        ("v=0\r\ns=-\r\nm=audio 9 RTP/AVP 0\r\n", "media before origin"),
        ("v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nr=7d 1h 0\r\n", "r= before t="),
        ("v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nbogus\r\n", "no equals sign"),
    ];
    for (sdp, name) in cases {
        assert!(parse(sdp).is_err(), "{name}");
    }

    let media_cases = [
        ("m=audio\r\n", "short media line"),
        ("m=audio x RTP/AVP 0\r\n", "bad port"),
        ("m=audio 70000 RTP/AVP 0\r\n", "port out of range"),
        ("m=hologram 9 RTP/AVP 0\r\n", "unknown media"),
        ("m=audio 9 QUIC 0\r\n", "unknown proto"),
        ("m=audio 9 RTP/AVP 111\r\na=rtpmap:111 opus\r\n", "rtpmap without clock"),
        ("m=audio 9 RTP/AVP 111\r\na=rtpmap:abc opus/48000\r\n", "rtpmap bad pt"),
        ("m=audio 9 RTP/AVP 0\r\nt=0 0\r\n", "timing inside media"),
    ];
    for (media, name) in media_cases {
        let sdp = format!("{base}{media}");
        assert!(parse(&sdp).is_err(), "{name}");
    }

    assert!(matches!(
        parse("o=- 1 1 IN IP4 0.0.0.0\r\n"),
        Err(Error::SdpInvalidSyntax(_))
    ));
    assert!(matches!(
        parse(&format!("{base}m=audio x RTP/AVP 0\r\n")),
        Err(Error::SdpInvalidValue(_))
    ));
}

#[test]
fn test_repeat_times_and_time_zones() -> Result<()> {
    let sdp = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nt=2873397496 2873404696\r\n\
               r=7d 1h 0 25h\r\nz=2882844526 -1h 2898848070 0\r\n";
    let desc = parse(sdp)?;
    let td = &desc.time_descriptions[0];
    assert_eq!(
        td.repeat_times,
        vec![RepeatTime {
            interval: 604800,
            duration: 3600,
            offsets: vec![0, 90000],
        }]
    );
    assert_eq!(
        desc.time_zones,
        vec![
            TimeZone {
                adjustment_time: 2882844526,
                offset: -3600,
            },
            TimeZone {
                adjustment_time: 2898848070,
                offset: 0,
            },
        ]
    );
    assert!(desc.marshal().contains("r=604800 3600 0 90000\r\n"));
    Ok(())
}

#[test]
fn test_media_codecs() -> Result<()> {
    let desc = parse(CANONICAL_OFFER)?;
    let audio = &desc.media_descriptions[0];
    let codecs = audio.codecs()?;
    assert_eq!(codecs.len(), 2);
    assert_eq!(codecs[0].name, "opus");
    assert_eq!(codecs[0].fmtp, "minptime=10;useinbandfec=1");
    assert_eq!(codecs[0].rtcp_feedback, vec!["transport-cc".to_owned()]);
    assert_eq!(codecs[1].name, "PCMU", "static payload type without rtpmap");

    let video = &desc.media_descriptions[1];
    let codecs = video.codecs()?;
    assert_eq!(codecs[1].name, "rtx");
    assert_eq!(codecs[1].fmtp, "apt=96");
    assert!(codecs.iter().all(|c| c.rtcp_feedback == vec!["nack".to_owned()]));

    assert_eq!(desc.get_codec_for_payload_type(96)?.name, "VP8");
    assert_eq!(
        desc.get_codec_for_payload_type(100),
        Err(Error::PayloadTypeNotFound)
    );
    let mut opus = parse_rtpmap("1 OPUS/48000/2")?;
    opus.fmtp = "useinbandfec=1; minptime=10".to_owned();
    assert_eq!(desc.get_payload_type_for_codec(&opus), Ok(111));
    assert_eq!(
        desc.get_payload_type_for_codec(&parse_rtpmap("1 H264/90000")?),
        Err(Error::CodecNotFound)
    );
    Ok(())
}

#[test]
fn test_media_transport_helpers() -> Result<()> {
    let desc = parse(CANONICAL_OFFER)?;
    assert_eq!(
        desc.ice_credentials(),
        (Some("AbCd"), Some("0123456789abcdefghijklmn"))
    );
    assert_eq!(desc.fingerprints(), vec!["sha-256 AA:BB:CC"]);
    assert_eq!(desc.connection_role(), ConnectionRole::Actpass);
    assert_eq!(
        desc.candidates(),
        vec![(0, "1 1 udp 2130706431 10.0.0.1 5000 typ host")]
    );

    let audio = &desc.media_descriptions[0];
    assert_eq!(audio.mid(), Some("0"));
    assert!(audio.is_rtcp_mux());
    assert!(!audio.is_rejected());
    assert_eq!(audio.ssrcs()?, vec![1001]);
    assert_eq!(audio.primary_ssrcs()?, vec![1001]);
    let extmaps = audio.extmaps()?;
    assert_eq!(extmaps.len(), 1);
    assert_eq!(extmaps[0].uri_str(), AUDIO_LEVEL_URI);

    let video = &desc.media_descriptions[1];
    assert_eq!(video.ssrcs()?, vec![2001, 2002]);
    assert_eq!(
        video.ssrc_groups()?,
        vec![SsrcGroup {
            semantics: SEMANTIC_TOKEN_FLOW_IDENTIFICATION.to_owned(),
            ssrcs: vec![2001, 2002],
        }]
    );
    assert_eq!(video.ice_credentials(), (None, None));
    Ok(())
}

#[test]
fn test_session_level_transport_attributes() -> Result<()> {
    let sdp = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\n\
               a=ice-ufrag:sess\r\na=ice-pwd:sessionpasswordsessionpw\r\n\
               a=fingerprint:sha-256 01:02\r\na=setup:passive\r\n\
               m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\n";
    let desc = parse(sdp)?;
    assert_eq!(
        desc.ice_credentials(),
        (Some("sess"), Some("sessionpasswordsessionpw"))
    );
    assert_eq!(desc.fingerprints(), vec!["sha-256 01:02"]);
    assert_eq!(desc.connection_role(), ConnectionRole::Passive);
    assert!(desc.media_descriptions[0].codecs()?.is_empty());
    Ok(())
}

#[test]
fn test_jsep_builders() -> Result<()> {
    let opus = parse_rtpmap("111 opus/48000/2")?;
    let desc = SessionDescription::new_jsep_session_description(false)
        .with_value_attribute(ATTR_KEY_GROUP.to_owned(), "BUNDLE 0".to_owned())
        .with_media(
            MediaDescription::new_jsep_media_description("audio".to_owned(), vec![])
                .with_value_attribute(ATTR_KEY_MID.to_owned(), "0".to_owned())
                .with_ice_credentials("ufrag".to_owned(), "pwd".to_owned())
                .with_fingerprint("sha-256".to_owned(), "AA:BB".to_owned())
                .with_codec(&Codec {
                    fmtp: "minptime=10".to_owned(),
                    ..opus
                })
                .with_media_source(42, "cname".to_owned(), "stream".to_owned(), "track".to_owned())
                .with_transport_cc_extmap()
                .with_property_attribute(ATTR_KEY_SEND_RECV.to_owned()),
        );

    assert!(desc.origin.session_id < 1 << 63);
    let text = desc.marshal();
    assert!(text.starts_with("v=0\r\no=- "));
    assert!(text.contains("m=audio 9 UDP/TLS/RTP/SAVPF 111\r\n"));
    assert!(text.contains("a=fmtp:111 minptime=10\r\n"));
    assert!(text.contains(&format!("a=extmap:3 {TRANSPORT_CC_URI}\r\n")));

    let reparsed = parse(&text)?;
    assert_eq!(reparsed, desc);
    assert_eq!(reparsed.media_descriptions[0].primary_ssrcs()?, vec![42]);

    let with_identity = SessionDescription::new_jsep_session_description(true);
    assert!(with_identity.has_attribute(ATTR_KEY_IDENTITY));
    Ok(())
}

#[test]
fn test_rejected_section() -> Result<()> {
    let sdp = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nt=0 0\r\nm=video 0 UDP/TLS/RTP/SAVPF 96\r\n";
    let desc = parse(sdp)?;
    assert!(desc.media_descriptions[0].is_rejected());
    assert_eq!(
        desc.media_descriptions[0].media_name,
        MediaName {
            media: "video".to_owned(),
            port: RangedPort {
                value: 0,
                range: None,
            },
            protos: vec![
                "UDP".to_owned(),
                "TLS".to_owned(),
                "RTP".to_owned(),
                "SAVPF".to_owned(),
            ],
            formats: vec!["96".to_owned()],
        }
    );
    Ok(())
}

#[test]
fn test_connection_information() -> Result<()> {
    let sdp = "v=0\r\no=- 1 1 IN IP4 0.0.0.0\r\ns=-\r\nc=IN IP4 224.2.36.42/127/3\r\nt=0 0\r\n";
    let desc = parse(sdp)?;
    assert_eq!(
        desc.connection_information,
        Some(ConnectionInformation {
            network_type: "IN".to_owned(),
            address_type: "IP4".to_owned(),
            address: Some(Address {
                address: "224.2.36.42".to_owned(),
                ttl: Some(127),
                range: Some(3),
            }),
        })
    );
    assert!(desc.marshal().contains("c=IN IP4 224.2.36.42/127/3\r\n"));
    assert!(parse(&sdp.replace("IP4 224", "IPX 224")).is_err());
    Ok(())
}
