/// Offer/answer between two sans-IO peers wired back to back.
///
/// Datagrams are moved between the peers in memory; both clocks advance in
/// 50ms steps.
use std::time::{Duration, Instant};

use peerlink::peer_connection::RTCPeerConnection;
use peerlink::peer_connection::configuration::RTCConfigurationBuilder;
use peerlink::peer_connection::configuration::setting_engine::SettingEngine;
use peerlink::peer_connection::event::RTCPeerConnectionEvent;
use peerlink::peer_connection::sdp::RTCSessionDescription;
use peerlink::peer_connection::state::{RTCDtlsTransportState, RTCSignalingState};
use peerlink::peer_connection::transport::ice::RTCIceCandidateInit;
use peerlink::ice::state::ConnectionState;
use peerlink::sansio::Protocol;
use peerlink::shared::TaggedBytesMut;
use peerlink::shared::error::{Error, Result};

const ADDR_OFFER: &str = "10.0.0.1:5000";
const ADDR_ANSWER: &str = "10.0.0.2:6000";

fn peer(addr: &str, piggyback: bool) -> Result<RTCPeerConnection> {
    let mut setting_engine = SettingEngine::default();
    setting_engine.enable_dtls_piggyback(piggyback);
    setting_engine.enable_dtls13_advertisement(true);

    let config = RTCConfigurationBuilder::new()
        .with_local_addrs(vec![addr.parse()?])
        .with_setting_engine(setting_engine)
        .build();
    RTCPeerConnection::new(config)
}

fn drain_events(pc: &mut RTCPeerConnection) -> Vec<RTCPeerConnectionEvent> {
    let mut evs = vec![];
    while let Some(ev) = pc.poll_event() {
        evs.push(ev);
    }
    evs
}

/// Hands every trickled candidate of `from` to `to`.
fn trickle(
    evs: &[RTCPeerConnectionEvent],
    to: &mut RTCPeerConnection,
) -> Result<Vec<RTCIceCandidateInit>> {
    let mut candidates = vec![];
    for ev in evs {
        if let RTCPeerConnectionEvent::OnIceCandidateEvent(c) = ev {
            to.add_ice_candidate(c.clone())?;
            candidates.push(c.clone());
        }
    }
    Ok(candidates)
}

fn pump(a: &mut RTCPeerConnection, b: &mut RTCPeerConnection, now: Instant) -> Result<()> {
    loop {
        let mut moved = 0;
        while let Some(tx) = a.poll_write() {
            moved += 1;
            b.handle_read(TaggedBytesMut {
                now,
                transport: tx.transport.reversed(),
                message: tx.message,
            })?;
        }
        while let Some(tx) = b.poll_write() {
            moved += 1;
            a.handle_read(TaggedBytesMut {
                now,
                transport: tx.transport.reversed(),
                message: tx.message,
            })?;
        }
        if moved == 0 {
            return Ok(());
        }
    }
}

fn settled(pc: &RTCPeerConnection) -> bool {
    let state = pc.dtls_transport().state();
    state == RTCDtlsTransportState::Connected || state.is_terminal()
}

type Events = Vec<RTCPeerConnectionEvent>;

/// Runs both peers until their DTLS transports settle and returns the time
/// reached with the events seen on the way.
fn run(
    a: &mut RTCPeerConnection,
    b: &mut RTCPeerConnection,
    mut now: Instant,
) -> Result<(Instant, Events, Events)> {
    let (mut a_events, mut b_events) = (vec![], vec![]);
    for _ in 0..400 {
        a.handle_timeout(now)?;
        b.handle_timeout(now)?;
        pump(a, b, now)?;
        a_events.extend(drain_events(a));
        b_events.extend(drain_events(b));
        if settled(a) && settled(b) {
            break;
        }
        now += Duration::from_millis(50);
    }
    Ok((now, a_events, b_events))
}

/// Negotiates `offerer` with `answerer`, trickles candidates and returns the
/// applied answer.
fn negotiate(
    offerer: &mut RTCPeerConnection,
    answerer: &mut RTCPeerConnection,
    now: Instant,
) -> Result<RTCSessionDescription> {
    let offer = offerer.create_offer()?;
    offerer.set_local_description(offer.clone())?;
    answerer.set_remote_description(offer)?;

    let answer = answerer.create_answer()?;
    answerer.set_local_description(answer.clone())?;
    offerer.set_remote_description(answer.clone())?;

    offerer.handle_timeout(now)?;
    answerer.handle_timeout(now)?;
    let offerer_events = drain_events(offerer);
    let answerer_events = drain_events(answerer);
    trickle(&offerer_events, answerer)?;
    trickle(&answerer_events, offerer)?;

    Ok(answer)
}

#[test]
fn test_offer_answer_with_piggyback() -> Result<()> {
    let _ = env_logger::try_init();

    let now = Instant::now();
    let mut offerer = peer(ADDR_OFFER, true)?;
    let mut answerer = peer(ADDR_ANSWER, true)?;
    negotiate(&mut offerer, &mut answerer, now)?;

    assert_eq!(offerer.signaling_state(), RTCSignalingState::Stable);
    assert_eq!(answerer.signaling_state(), RTCSignalingState::Stable);

    let (_, offerer_events, answerer_events) = run(&mut offerer, &mut answerer, now)?;

    for pc in [&offerer, &answerer] {
        assert_eq!(pc.dtls_transport().state(), RTCDtlsTransportState::Connected);
        assert_eq!(pc.ice_connection_state(), ConnectionState::Connected);
        assert!(pc.is_dtls_piggyback_supported_by_peer());
    }
    for evs in [&offerer_events, &answerer_events] {
        assert!(
            evs.iter()
                .any(|ev| matches!(ev, RTCPeerConnectionEvent::OnWritableChangeEvent(true)))
        );
        assert!(evs.iter().any(|ev| matches!(
            ev,
            RTCPeerConnectionEvent::OnDtlsStateChangeEvent(RTCDtlsTransportState::Connected)
        )));
    }

    assert_eq!(
        offerer.export_srtp_keying_material()?,
        answerer.export_srtp_keying_material()?
    );
    Ok(())
}

#[test]
fn test_offer_answer_piggyback_on_one_side() -> Result<()> {
    let now = Instant::now();
    let mut offerer = peer(ADDR_OFFER, true)?;
    let mut answerer = peer(ADDR_ANSWER, false)?;
    let answer = negotiate(&mut offerer, &mut answerer, now)?;
    assert!(!answer.sdp.contains("dtls-in-stun"));

    run(&mut offerer, &mut answerer, now)?;

    for pc in [&offerer, &answerer] {
        assert_eq!(pc.dtls_transport().state(), RTCDtlsTransportState::Connected);
        assert!(!pc.is_dtls_piggyback_supported_by_peer());
    }
    assert_eq!(
        offerer.export_srtp_keying_material()?,
        answerer.export_srtp_keying_material()?
    );
    Ok(())
}

#[test]
fn test_offer_answer_trickled_candidates() -> Result<()> {
    let now = Instant::now();
    let mut offerer = peer(ADDR_OFFER, false)?;
    let mut answerer = peer(ADDR_ANSWER, false)?;

    let offer = offerer.create_offer()?;
    offerer.set_local_description(offer.clone())?;
    assert!(offerer.poll_timeout().is_some());
    offerer.handle_timeout(now)?;

    let evs = drain_events(&mut offerer);
    let candidates: Vec<&RTCIceCandidateInit> = evs
        .iter()
        .filter_map(|ev| match ev {
            RTCPeerConnectionEvent::OnIceCandidateEvent(c) => Some(c),
            _ => None,
        })
        .collect();
    // one host candidate, then the end of candidates
    assert_eq!(candidates.len(), 2);
    assert_eq!(candidates[0].sdp_mid.as_deref(), Some("0"));
    assert!(candidates[0].candidate.contains("10.0.0.1 5000 typ host"));
    assert!(candidates[1].is_end_of_candidates());
    assert_eq!(offerer.local_candidates().len(), 1);

    // candidates need a remote description
    assert_eq!(
        answerer.add_ice_candidate(candidates[0].clone()),
        Err(Error::ErrNoRemoteDescription)
    );
    answerer.set_remote_description(offer)?;
    answerer.add_ice_candidate(candidates[0].clone())?;
    answerer.add_ice_candidate(candidates[1].clone())?;

    // a later offer carries the gathered candidate
    let answer = answerer.create_answer()?;
    answerer.set_local_description(answer.clone())?;
    offerer.set_remote_description(answer)?;
    let offer = offerer.create_offer()?;
    assert!(offer.sdp.contains("a=candidate:"));
    Ok(())
}

#[test]
fn test_offer_answer_fingerprint_mismatch() -> Result<()> {
    let now = Instant::now();
    let mut offerer = peer(ADDR_OFFER, false)?;
    let mut answerer = peer(ADDR_ANSWER, false)?;

    let offer = offerer.create_offer()?;
    offerer.set_local_description(offer.clone())?;
    answerer.set_remote_description(offer)?;
    let answer = answerer.create_answer()?;
    answerer.set_local_description(answer.clone())?;

    // the offerer is told to expect its own certificate
    let answerer_fp = answerer.certificate().get_fingerprints()[0].value.clone();
    let offerer_fp = offerer.certificate().get_fingerprints()[0].value.clone();
    let forged = RTCSessionDescription::answer(answer.sdp.replace(&answerer_fp, &offerer_fp))?;
    offerer.set_remote_description(forged)?;

    offerer.handle_timeout(now)?;
    answerer.handle_timeout(now)?;
    let offerer_events = drain_events(&mut offerer);
    let answerer_events = drain_events(&mut answerer);
    trickle(&offerer_events, &mut answerer)?;
    trickle(&answerer_events, &mut offerer)?;

    run(&mut offerer, &mut answerer, now)?;

    assert_eq!(
        offerer.dtls_transport().state(),
        RTCDtlsTransportState::Failed
    );
    assert_eq!(
        offerer.export_srtp_keying_material(),
        Err(Error::ErrDtlsTransportNotStarted)
    );
    Ok(())
}

#[test]
fn test_renegotiation_keeps_handshake() -> Result<()> {
    let now = Instant::now();
    let mut offerer = peer(ADDR_OFFER, false)?;
    let mut answerer = peer(ADDR_ANSWER, false)?;
    negotiate(&mut offerer, &mut answerer, now)?;
    let (now, _, _) = run(&mut offerer, &mut answerer, now)?;
    let keys = offerer.export_srtp_keying_material()?;

    // the answerer offers this time; roles and fingerprints stay put
    let offer = answerer.create_offer()?;
    answerer.set_local_description(offer.clone())?;
    offerer.set_remote_description(offer)?;
    let answer = offerer.create_answer()?;
    offerer.set_local_description(answer.clone())?;
    answerer.set_remote_description(answer)?;

    run(&mut offerer, &mut answerer, now + Duration::from_millis(50))?;
    for pc in [&offerer, &answerer] {
        assert_eq!(pc.signaling_state(), RTCSignalingState::Stable);
        assert_eq!(pc.dtls_transport().state(), RTCDtlsTransportState::Connected);
    }
    assert_eq!(offerer.export_srtp_keying_material()?, keys);

    offerer.close()?;
    assert_eq!(offerer.signaling_state(), RTCSignalingState::Closed);
    assert_eq!(offerer.create_offer(), Err(Error::ErrConnectionClosed));

    // the answerer's close_notify arrives after close and is dropped
    answerer.close()?;
    pump(&mut offerer, &mut answerer, now)?;
    assert!(offerer.poll_timeout().is_none());
    Ok(())
}
