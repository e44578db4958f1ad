use std::io::Cursor;

use sdp::description::session::{ATTR_KEY_CONNECTION_SETUP, ICE_OPTION_DTLS_IN_STUN};
use sdp::direction::Direction;
use sdp::extmap::SDES_MID_URI;
use sdp::util::{Codec, ConnectionRole};
use sdp::SessionDescription;
use shared::error::{Error, Result};

use super::negotiation::*;
use crate::peer_connection::configuration::media_engine::{MediaEngine, MediaKind};
use crate::peer_connection::transport::dtls::fingerprint::RTCDtlsFingerprint;
use crate::peer_connection::transport::dtls::role::RTCDtlsRole;

fn transport(role: RTCDtlsRole, piggyback: bool) -> LocalTransportParameters {
    LocalTransportParameters {
        ice_ufrag: "ufrag".to_owned(),
        ice_pwd: "passwordpasswordpassword".to_owned(),
        fingerprints: vec![RTCDtlsFingerprint {
            algorithm: "sha-256".to_owned(),
            value: "AA:BB".to_owned(),
        }],
        dtls_role: role,
        candidates: vec!["1 1 udp 2130706431 10.0.0.1 5000 typ host".to_owned()],
        dtls_piggyback: piggyback,
    }
}

fn default_engine() -> MediaEngine {
    let mut m = MediaEngine::default();
    m.register_defaults();
    m
}

fn section(mid: &str, kind: MediaKind) -> LocalMediaSection {
    LocalMediaSection {
        mid: mid.to_owned(),
        kind,
        direction: Direction::Sendrecv,
        source: None,
    }
}

fn reparse(desc: &SessionDescription) -> Result<SessionDescription> {
    SessionDescription::unmarshal(&mut Cursor::new(desc.marshal().as_bytes()))
}

fn parse(s: &str) -> Result<SessionDescription> {
    SessionDescription::unmarshal(&mut Cursor::new(s.as_bytes()))
}

#[test]
fn test_produce_offer() -> Result<()> {
    let engine = default_engine();
    let mut audio = section("0", MediaKind::Audio);
    audio.source = Some(MediaSource {
        ssrc: 1234,
        cname: "cname".to_owned(),
        stream_id: "stream".to_owned(),
        track_id: "track".to_owned(),
    });
    let sections = vec![
        audio,
        section("1", MediaKind::Video),
        section("2", MediaKind::Application),
    ];

    let offer = reparse(&produce_offer(
        &sections,
        &engine,
        &transport(RTCDtlsRole::Auto, true),
    )?)?;

    assert_eq!(offer.bundle_group(), Some(vec!["0", "1", "2"]));
    assert!(offer.has_ice_option(ICE_OPTION_DTLS_IN_STUN));
    assert_eq!(offer.media_descriptions.len(), 3);
    for m in &offer.media_descriptions {
        assert_eq!(m.connection_role(), ConnectionRole::Actpass);
        assert_eq!(m.fingerprints(), vec!["sha-256 AA:BB"]);
    }

    let audio = &offer.media_descriptions[0];
    assert_eq!(audio.candidates().len(), 1);
    assert_eq!(audio.primary_ssrcs()?, vec![1234]);
    assert_eq!(audio.direction(), Direction::Sendrecv);
    assert_eq!(audio.codecs()?.len(), engine.audio_codecs().len());
    assert!(audio.is_rtcp_mux());

    let video = &offer.media_descriptions[1];
    assert!(video.candidates().is_empty());
    assert!(video.primary_ssrcs()?.is_empty());

    // one uri keeps one id in every section
    let uris = engine.header_extension_uris();
    for m in &offer.media_descriptions[..2] {
        for e in m.extmaps()? {
            let position = uris.iter().position(|u| *u == e.uri_str());
            assert_eq!(position.map(|p| p as isize + 1), Some(e.value));
        }
    }

    let application = &offer.media_descriptions[2];
    assert_eq!(application.media_name.formats, vec!["webrtc-datachannel"]);
    assert_eq!(application.media_name.protos, vec!["UDP", "DTLS", "SCTP"]);
    assert_eq!(application.attribute("sctp-port"), Some(Some("5000")));

    assert!(matches!(
        produce_offer(&[], &engine, &transport(RTCDtlsRole::Auto, false)),
        Err(Error::ErrInvalidParameter(_))
    ));
    assert!(matches!(
        produce_offer(
            &[section("0", MediaKind::Video)],
            &MediaEngine::default(),
            &transport(RTCDtlsRole::Auto, false)
        ),
        Err(Error::ErrInvalidParameter(_))
    ));

    Ok(())
}

#[test]
fn test_produce_answer_to_own_offer() -> Result<()> {
    let engine = default_engine();
    let mut video = section("1", MediaKind::Video);
    video.direction = Direction::Sendonly;
    let offer = reparse(&produce_offer(
        &[section("0", MediaKind::Audio), video],
        &engine,
        &transport(RTCDtlsRole::Auto, false),
    )?)?;

    // an answerer without an explicit role falls back to active
    let answer = reparse(&produce_answer(
        &offer,
        &engine,
        &transport(RTCDtlsRole::Auto, false),
    )?)?;

    assert_eq!(answer.bundle_group(), Some(vec!["0", "1"]));
    assert!(!answer.has_ice_option(ICE_OPTION_DTLS_IN_STUN));
    assert_eq!(
        answer.media_descriptions[0].attribute(ATTR_KEY_CONNECTION_SETUP),
        Some(Some("active"))
    );
    assert_eq!(answer.media_descriptions[1].direction(), Direction::Recvonly);

    for (o, a) in offer
        .media_descriptions
        .iter()
        .zip(answer.media_descriptions.iter())
    {
        assert_eq!(a.mid(), o.mid());
        assert_eq!(a.media_name.formats, o.media_name.formats);
        assert_eq!(a.extmaps()?, o.extmaps()?);
    }

    let answer = produce_answer(&offer, &engine, &transport(RTCDtlsRole::Server, false))?;
    assert_eq!(
        answer.media_descriptions[0].connection_role(),
        ConnectionRole::Passive
    );
    Ok(())
}

const OFFER_HEADER: &str = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n\
                            a=group:BUNDLE a v d x\r\n";

#[test]
fn test_produce_answer_rejects_sections() -> Result<()> {
    let offer = parse(&format!(
        "{OFFER_HEADER}\
         m=audio 0 UDP/TLS/RTP/SAVPF 111\r\na=mid:a\r\na=rtpmap:111 opus/48000/2\r\n\
         m=video 9 UDP/TLS/RTP/SAVPF 100\r\na=mid:v\r\na=rtpmap:100 unknown/90000\r\n\
         m=application 9 UDP/DTLS/SCTP webrtc-datachannel\r\na=mid:d\r\n\
         m=text 9 RTP/AVP 98\r\na=mid:x\r\n"
    ))?;

    let engine = default_engine();
    let answer = reparse(&produce_answer(
        &offer,
        &engine,
        &transport(RTCDtlsRole::Client, false),
    )?)?;
    assert_eq!(answer.media_descriptions.len(), 4);

    let rejected: Vec<(Option<&str>, bool)> = answer
        .media_descriptions
        .iter()
        .map(|m| (m.mid(), m.is_rejected()))
        .collect();
    assert_eq!(
        rejected,
        vec![
            (Some("a"), true),
            (Some("v"), true),
            (Some("d"), false),
            (Some("x"), true),
        ]
    );
    assert_eq!(answer.bundle_group(), Some(vec!["d"]));
    assert_eq!(answer.media_descriptions[1].media_name.formats, vec!["100"]);
    assert!(answer.media_descriptions[1].fingerprints().is_empty());
    // the first accepted section carries the candidates
    assert_eq!(answer.media_descriptions[2].candidates().len(), 1);

    let mut no_data_channels = default_engine();
    no_data_channels.set_data_channels(false);
    let answer = produce_answer(
        &offer,
        &no_data_channels,
        &transport(RTCDtlsRole::Client, false),
    )?;
    assert!(answer.media_descriptions.iter().all(|m| m.is_rejected()));
    assert_eq!(answer.bundle_group(), None);
    Ok(())
}

#[test]
fn test_produce_answer_codec_intersection() -> Result<()> {
    let offer = parse(
        "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n\
         m=video 9 UDP/TLS/RTP/SAVPF 120 121 122 123\r\na=mid:0\r\n\
         a=rtpmap:120 VP8/90000\r\na=rtcp-fb:120 nack\r\na=rtcp-fb:120 goog-lntf\r\n\
         a=rtpmap:121 rtx/90000\r\na=fmtp:121 apt=120\r\n\
         a=rtpmap:122 AV1/90000\r\n\
         a=rtpmap:123 rtx/90000\r\na=fmtp:123 apt=122\r\n\
         a=extmap:7 urn:ietf:params:rtp-hdrext:sdes:mid\r\n\
         a=extmap:8 urn:example:unsupported\r\n\
         a=recvonly\r\n",
    )?;

    let answer = produce_answer(
        &offer,
        &default_engine(),
        &transport(RTCDtlsRole::Client, false),
    )?;
    let m = &answer.media_descriptions[0];
    assert!(!m.is_rejected());
    // offered payload types are kept, rtx only with its primary
    assert_eq!(m.media_name.formats, vec!["120", "121"]);

    let codecs = m.codecs()?;
    let vp8: Vec<&Codec> = codecs.iter().filter(|c| c.payload_type == 120).collect();
    assert_eq!(vp8[0].rtcp_feedback, vec!["nack"]);

    let extmaps = m.extmaps()?;
    assert_eq!(extmaps.len(), 1);
    assert_eq!(extmaps[0].value, 7);
    assert_eq!(extmaps[0].uri_str(), SDES_MID_URI);

    assert_eq!(m.direction(), Direction::Sendonly);
    Ok(())
}

#[test]
fn test_produce_answer_plain_opus() -> Result<()> {
    let offer = parse(
        "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n\
         m=audio 9 UDP/TLS/RTP/SAVPF 109\r\na=mid:0\r\n\
         a=rtpmap:109 opus/48000/2\r\na=fmtp:109 maxplaybackrate=16000\r\n\
         a=sendrecv\r\n",
    )?;

    let answer = produce_answer(
        &offer,
        &default_engine(),
        &transport(RTCDtlsRole::Client, false),
    )?;
    let m = &answer.media_descriptions[0];
    assert!(!m.is_rejected());
    assert_eq!(m.media_name.formats, vec!["109"]);
    Ok(())
}
