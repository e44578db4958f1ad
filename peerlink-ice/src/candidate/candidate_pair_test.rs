use super::*;
use crate::candidate::candidate_pair::*;

fn base_config(address: &str) -> CandidateConfig {
    CandidateConfig {
        network: "udp".to_owned(),
        address: address.to_owned(),
        port: 5000,
        component: COMPONENT_RTP,
        ..Default::default()
    }
}

pub(crate) fn host_candidate() -> Result<Candidate> {
    CandidateHostConfig {
        base_config: base_config("10.0.0.1"),
    }
    .new_candidate_host()
}

pub(crate) fn prflx_candidate() -> Result<Candidate> {
    CandidatePeerReflexiveConfig {
        base_config: base_config("10.0.0.2"),
        ..Default::default()
    }
    .new_candidate_peer_reflexive()
}

pub(crate) fn srflx_candidate() -> Result<Candidate> {
    CandidateServerReflexiveConfig {
        base_config: base_config("203.0.113.4"),
        rel_addr: "10.0.0.1".to_owned(),
        rel_port: 5000,
        ..Default::default()
    }
    .new_candidate_server_reflexive()
}

pub(crate) fn relay_candidate() -> Result<Candidate> {
    CandidateRelayConfig {
        base_config: base_config("198.51.100.7"),
        rel_addr: "203.0.113.4".to_owned(),
        rel_port: 5000,
        ..Default::default()
    }
    .new_candidate_relay()
}

#[test]
fn test_candidate_pair_priority() -> Result<()> {
    let host = host_candidate()?;
    let srflx = srflx_candidate()?;
    let relay = relay_candidate()?;

    let tests = vec![
        (
            CandidatePair::new(0, 0, host.priority(), host.priority(), false),
            9151314440652587007,
        ),
        (
            CandidatePair::new(0, 1, host.priority(), srflx.priority(), true),
            7277816996102668288,
        ),
        (
            CandidatePair::new(0, 1, host.priority(), srflx.priority(), false),
            7277816996102668287,
        ),
        (
            CandidatePair::new(0, 2, relay.priority(), host.priority(), true),
            72057593987596287,
        ),
        (
            CandidatePair::new(0, 2, relay.priority(), host.priority(), false),
            72057593987596288,
        ),
    ];

    for (pair, want) in tests {
        assert_eq!(pair.priority(), want, "CandidatePair({pair}).Priority()");
    }

    Ok(())
}

#[test]
fn test_candidate_pair_equality() -> Result<()> {
    let host = host_candidate()?;
    let srflx = srflx_candidate()?;
    let pair_a = CandidatePair::new(0, 1, host.priority(), srflx.priority(), true);
    let pair_b = CandidatePair::new(0, 1, srflx.priority(), host.priority(), false);
    let pair_c = CandidatePair::new(1, 0, host.priority(), srflx.priority(), true);

    assert_eq!(pair_a, pair_b, "Expected {pair_a} to equal {pair_b}");
    assert_ne!(pair_a, pair_c);
    assert_eq!(pair_a.state(), CandidatePairState::Waiting);
    assert!(!pair_a.nominated());

    Ok(())
}
