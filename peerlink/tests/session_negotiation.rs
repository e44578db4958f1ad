/// Signaling and description handling of a single peer, driven with
/// hand-written remote descriptions.
use peerlink::peer_connection::RTCPeerConnection;
use peerlink::peer_connection::certificate::RTCCertificate;
use peerlink::peer_connection::configuration::RTCConfigurationBuilder;
use peerlink::peer_connection::configuration::bundle_policy::BundlePayloadTypePolicy;
use peerlink::peer_connection::configuration::media_engine::MediaKind;
use peerlink::peer_connection::configuration::setting_engine::SettingEngine;
use peerlink::peer_connection::event::RTCPeerConnectionEvent;
use peerlink::peer_connection::sdp::{RTCSdpType, RTCSessionDescription};
use peerlink::peer_connection::state::RTCSignalingState;
use peerlink::sansio::Protocol;
use peerlink::sdp::direction::Direction;
use peerlink::shared::error::{Error, Result};

fn peer() -> Result<RTCPeerConnection> {
    RTCPeerConnection::new(RTCConfigurationBuilder::new().build())
}

fn peer_with_policy(policy: BundlePayloadTypePolicy) -> Result<RTCPeerConnection> {
    let mut setting_engine = SettingEngine::default();
    setting_engine.set_bundle_payload_type_policy(policy);
    RTCPeerConnection::new(
        RTCConfigurationBuilder::new()
            .with_setting_engine(setting_engine)
            .build(),
    )
}

fn signaling_changes(pc: &mut RTCPeerConnection) -> Vec<RTCSignalingState> {
    let mut states = vec![];
    while let Some(ev) = pc.poll_event() {
        if let RTCPeerConnectionEvent::OnSignalingStateChangeEvent(s) = ev {
            states.push(s);
        }
    }
    states
}

/// A remote offer with the session header, ICE credentials and a valid
/// fingerprint in front of `body`.
fn remote_offer(group: &str, body: &str) -> Result<RTCSessionDescription> {
    let fp = &RTCCertificate::generate()?.get_fingerprints()[0];
    let mut sdp = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n".to_owned();
    if !group.is_empty() {
        sdp += &format!("a=group:BUNDLE {group}\r\n");
    }
    sdp += &format!(
        "a=ice-ufrag:remoteufrag\r\na=ice-pwd:remotepasswordremotepassword\r\n\
         a=fingerprint:{} {}\r\na=setup:actpass\r\n",
        fp.algorithm, fp.value
    );
    sdp += body;
    RTCSessionDescription::offer(sdp)
}

fn remote_mid(pc: &RTCPeerConnection, index: usize) -> Result<Option<String>> {
    let parsed = pc
        .remote_description()
        .ok_or(Error::ErrNoRemoteDescription)?
        .unmarshal()?;
    Ok(parsed.media_descriptions[index].mid().map(str::to_owned))
}

const AUDIO_NO_MID: &str = "m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=rtpmap:111 opus/48000/2\r\n";

#[test]
fn test_signaling_transitions() -> Result<()> {
    let mut pc = peer()?;
    assert_eq!(pc.create_answer(), Err(Error::ErrNoRemoteDescription));
    assert_eq!(
        pc.set_local_description(RTCSessionDescription::rollback()),
        Err(Error::ErrSignalingStateCannotRollback)
    );

    let offer = pc.create_offer()?;
    assert!(pc.set_remote_description(RTCSessionDescription::answer(offer.sdp.clone())?).is_err());

    // an empty offer stands for the last one created
    let mut last_offer = RTCSessionDescription::default();
    last_offer.sdp_type = RTCSdpType::Offer;
    pc.set_local_description(last_offer)?;
    assert_eq!(pc.signaling_state(), RTCSignalingState::HaveLocalOffer);
    assert_eq!(pc.pending_local_description(), Some(&offer));
    assert_eq!(pc.create_answer(), Err(Error::ErrNoRemoteDescription));

    pc.set_local_description(RTCSessionDescription::rollback())?;
    assert_eq!(pc.signaling_state(), RTCSignalingState::Stable);
    assert!(pc.local_description().is_none());
    assert_eq!(
        signaling_changes(&mut pc),
        vec![
            RTCSignalingState::HaveLocalOffer,
            RTCSignalingState::Stable
        ]
    );
    Ok(())
}

#[test]
fn test_pranswer_then_answer() -> Result<()> {
    let mut pc = peer()?;
    pc.set_remote_description(remote_offer("", "m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=mid:a\r\na=rtpmap:111 opus/48000/2\r\n")?)?;
    assert_eq!(pc.signaling_state(), RTCSignalingState::HaveRemoteOffer);

    let answer = pc.create_answer()?;
    assert!(answer.sdp.contains("a=setup:active"));
    pc.set_local_description(RTCSessionDescription::pranswer(answer.sdp.clone())?)?;
    assert_eq!(pc.signaling_state(), RTCSignalingState::HaveLocalPranswer);

    pc.set_local_description(answer.clone())?;
    assert_eq!(pc.signaling_state(), RTCSignalingState::Stable);
    assert_eq!(pc.current_local_description(), Some(&answer));
    assert!(pc.current_remote_description().is_some());
    assert!(pc.pending_remote_description().is_none());

    // the answered section takes part in the next local offer
    assert_eq!(pc.local_media_sections()[0].mid, "a");
    assert!(pc.create_offer()?.sdp.contains("a=mid:a"));
    Ok(())
}

#[test]
fn test_remote_mid_backfill_continues() -> Result<()> {
    let mut pc = peer()?;

    pc.set_remote_description(remote_offer("", AUDIO_NO_MID)?)?;
    assert_eq!(remote_mid(&pc, 0)?.as_deref(), Some("0"));
    let answer = pc.create_answer()?;
    pc.set_local_description(answer)?;

    // the counter belongs to the session, not to one description
    pc.set_remote_description(remote_offer("", AUDIO_NO_MID)?)?;
    assert_eq!(remote_mid(&pc, 0)?.as_deref(), Some("1"));

    // a BUNDLE group naming no backfilled section is tolerated
    pc.set_remote_description(RTCSessionDescription::rollback())?;
    pc.set_remote_description(remote_offer("x", AUDIO_NO_MID)?)?;
    assert_eq!(remote_mid(&pc, 0)?.as_deref(), Some("2"));
    let report = pc.validation_report().ok_or(Error::ErrNoRemoteDescription)?;
    assert_eq!(report.unknown_bundle_mids, vec!["x".to_owned()]);
    Ok(())
}

#[test]
fn test_remote_bundle_validation() -> Result<()> {
    let colliding = "m=audio 9 UDP/TLS/RTP/SAVPF 96\r\na=mid:0\r\na=rtpmap:96 opus/48000/2\r\n\
                     m=video 9 UDP/TLS/RTP/SAVPF 96\r\na=mid:1\r\na=rtpmap:96 VP8/90000\r\n";

    // recorded by default
    let mut pc = peer()?;
    pc.set_remote_description(remote_offer("0 1", colliding)?)?;
    let report = pc.validation_report().ok_or(Error::ErrNoRemoteDescription)?;
    assert!(!report.valid_bundled_payload_types);
    assert_eq!(report.payload_type_collisions.len(), 1);

    let mut pc = peer_with_policy(BundlePayloadTypePolicy::Reject)?;
    assert!(matches!(
        pc.set_remote_description(remote_offer("0 1", colliding)?),
        Err(Error::ErrInvalidParameter(_))
    ));
    assert_eq!(pc.signaling_state(), RTCSignalingState::Stable);

    // one id, two URIs inside a BUNDLE group
    let rebound = "m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=mid:0\r\na=rtpmap:111 opus/48000/2\r\n\
                   a=extmap:1 urn:ietf:params:rtp-hdrext:sdes:mid\r\n\
                   m=video 9 UDP/TLS/RTP/SAVPF 96\r\na=mid:1\r\na=rtpmap:96 VP8/90000\r\n\
                   a=extmap:1 urn:ietf:params:rtp-hdrext:ssrc-audio-level\r\n";
    let mut pc = peer()?;
    assert!(matches!(
        pc.set_remote_description(remote_offer("0 1", rebound)?),
        Err(Error::ErrInvalidParameter(_))
    ));
    assert!(pc.remote_description().is_none());

    let long_mid = "m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=mid:0123456789abcdefg\r\n\
                    a=rtpmap:111 opus/48000/2\r\n";
    assert!(matches!(
        pc.set_remote_description(remote_offer("", long_mid)?),
        Err(Error::ErrInvalidParameter(_))
    ));
    Ok(())
}

#[test]
fn test_local_ssrc_munging() -> Result<()> {
    let mut pc = peer()?;
    pc.add_media_section(MediaKind::Audio, Direction::Sendrecv)?;
    pc.add_media_section(MediaKind::Video, Direction::Sendonly)?;
    pc.add_media_section(MediaKind::Video, Direction::Recvonly)?;

    let ssrcs: Vec<Option<u32>> = pc
        .local_media_sections()
        .iter()
        .map(|s| s.source.as_ref().map(|src| src.ssrc))
        .collect();
    let (Some(audio), Some(video), None) = (ssrcs[0], ssrcs[1], ssrcs[2]) else {
        panic!("unexpected sources {ssrcs:?}");
    };

    let offer = pc.create_offer()?;

    // the video SSRC replaced by the audio one
    let across = offer
        .sdp
        .replace(&format!("a=ssrc:{video} "), &format!("a=ssrc:{audio} "));
    assert_eq!(
        pc.set_local_description(RTCSessionDescription::offer(across)?),
        Err(Error::ErrDuplicateLocalSsrc(audio))
    );

    // one stream listed twice in its own section
    let within = offer.sdp.replacen(
        &format!("a=ssrc:{audio} cname:"),
        &format!("a=ssrc:{audio} cname:twice\r\na=ssrc:{audio} cname:"),
        1,
    );
    assert_eq!(
        pc.set_local_description(RTCSessionDescription::offer(within)?),
        Err(Error::ErrDuplicateLocalSsrc(audio))
    );
    assert_eq!(pc.signaling_state(), RTCSignalingState::Stable);

    pc.set_local_description(offer)?;
    assert_eq!(pc.signaling_state(), RTCSignalingState::HaveLocalOffer);
    Ok(())
}

#[test]
fn test_rejected_remote_offer_changes_nothing() -> Result<()> {
    let mut pc = peer()?;

    let sha1_offer = RTCSessionDescription::offer(format!(
        "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n\
         a=ice-ufrag:remoteufrag\r\na=ice-pwd:remotepasswordremotepassword\r\n\
         a=fingerprint:sha-1 AA:BB:CC:DD\r\na=setup:actpass\r\n{AUDIO_NO_MID}"
    ))?;
    assert_eq!(
        pc.set_remote_description(sha1_offer),
        Err(Error::ErrUnsupportedFingerprintAlgorithm)
    );
    assert_eq!(pc.signaling_state(), RTCSignalingState::Stable);
    assert!(pc.remote_description().is_none());
    assert!(pc.validation_report().is_none());
    assert!(signaling_changes(&mut pc).is_empty());

    // the failed offer did not use up a mid
    pc.set_remote_description(remote_offer("", AUDIO_NO_MID)?)?;
    assert_eq!(pc.signaling_state(), RTCSignalingState::HaveRemoteOffer);
    assert_eq!(remote_mid(&pc, 0)?.as_deref(), Some("0"));
    Ok(())
}
