use super::*;
use std::time::{Duration, Instant};

#[test]
fn test_candidate_priority() -> Result<()> {
    let tests = vec![
        (
            Candidate {
                candidate_type: CandidateType::Host,
                component: COMPONENT_RTP,
                ..Default::default()
            },
            2130706431,
        ),
        (
            Candidate {
                candidate_type: CandidateType::PeerReflexive,
                component: COMPONENT_RTP,
                ..Default::default()
            },
            1862270975,
        ),
        (
            Candidate {
                candidate_type: CandidateType::ServerReflexive,
                component: COMPONENT_RTP,
                ..Default::default()
            },
            1694498815,
        ),
        (
            Candidate {
                candidate_type: CandidateType::ServerReflexive,
                component: COMPONENT_RTCP,
                ..Default::default()
            },
            1694498814,
        ),
        (
            Candidate {
                candidate_type: CandidateType::Relay,
                component: COMPONENT_RTP,
                ..Default::default()
            },
            16777215,
        ),
        (
            Candidate {
                candidate_type: CandidateType::Host,
                component: COMPONENT_RTP,
                priority_override: 42,
                ..Default::default()
            },
            42,
        ),
    ];

    for (candidate, want) in tests {
        assert_eq!(candidate.priority(), want, "Candidate({candidate}).Priority()");
    }

    Ok(())
}

#[test]
fn test_candidate_last_sent_received() -> Result<()> {
    let mut candidate = Candidate::default();
    assert!(candidate.last_sent().is_none());
    assert!(candidate.last_received().is_none());

    let now = Instant::now();
    candidate.seen(true, now);
    candidate.seen(false, now + Duration::from_millis(10));
    assert_eq!(candidate.last_sent(), Some(now));
    assert_eq!(
        candidate.last_received(),
        Some(now + Duration::from_millis(10))
    );

    Ok(())
}

#[test]
fn test_candidate_foundation_shared_by_base() -> Result<()> {
    let base: SocketAddr = "10.0.0.1:5000".parse()?;
    let srflx = |address: &str, port: u16| {
        CandidateServerReflexiveConfig {
            base_config: CandidateConfig {
                network: "udp".to_owned(),
                address: address.to_owned(),
                port,
                component: COMPONENT_RTP,
                base_address: Some(base),
                ..Default::default()
            },
            rel_addr: base.ip().to_string(),
            rel_port: base.port(),
            url: Some("stun:stun.example.org:3478".to_owned()),
        }
        .new_candidate_server_reflexive()
    };

    let a = srflx("203.0.113.4", 40000)?;
    let b = srflx("198.51.100.9", 41000)?;
    assert_eq!(a.foundation(), b.foundation());
    assert_eq!(a.url(), Some("stun:stun.example.org:3478"));
    assert_eq!(a.base_addr(), base);

    let host = CandidateHostConfig {
        base_config: CandidateConfig {
            network: "udp".to_owned(),
            address: "10.0.0.1".to_owned(),
            port: 5000,
            component: COMPONENT_RTP,
            ..Default::default()
        },
    }
    .new_candidate_host()?;
    assert_ne!(host.foundation(), a.foundation());
    assert_eq!(host.base_addr(), base);

    Ok(())
}

#[test]
fn test_candidate_mdns_host() -> Result<()> {
    let base: SocketAddr = "192.168.1.10:9000".parse()?;
    let host = CandidateHostConfig {
        base_config: CandidateConfig {
            network: "udp".to_owned(),
            address: "a5c5e4b2-40e6-4e4b-9c28-52bd0a0f2ef3.local".to_owned(),
            port: 9000,
            component: COMPONENT_RTP,
            base_address: Some(base),
            ..Default::default()
        },
    }
    .new_candidate_host()?;

    assert!(host.is_multicast_dns());
    assert_eq!(host.addr(), base);
    assert!(host.marshal().contains("a5c5e4b2-40e6-4e4b-9c28-52bd0a0f2ef3.local 9000"));
    assert!(!host.marshal().contains("192.168.1.10"));

    Ok(())
}

#[test]
fn test_candidate_marshal() -> Result<()> {
    let tests = vec![
        (
            Some(
                CandidateHostConfig {
                    base_config: CandidateConfig {
                        network: "udp".to_owned(),
                        address: "fcd9:e3b8:12ce:9fc5:74a5:c6bb:d8b:e08a".to_owned(),
                        port: 53987,
                        priority: 500,
                        foundation: "750".to_owned(),
                        ..Default::default()
                    },
                }
                .new_candidate_host()?,
            ),
            "750 0 udp 500 fcd9:e3b8:12ce:9fc5:74a5:c6bb:d8b:e08a 53987 typ host",
        ),
        (
            Some(
                CandidateHostConfig {
                    base_config: CandidateConfig {
                        network: "udp".to_owned(),
                        address: "10.0.75.1".to_owned(),
                        port: 53634,
                        component: COMPONENT_RTP,
                        ..Default::default()
                    },
                }
                .new_candidate_host()?,
            ),
            "1666856576 1 udp 2130706431 10.0.75.1 53634 typ host",
        ),
        (
            Some(
                CandidateServerReflexiveConfig {
                    base_config: CandidateConfig {
                        network: "udp".to_owned(),
                        address: "191.228.238.68".to_owned(),
                        port: 53991,
                        component: COMPONENT_RTP,
                        priority: 1694498815,
                        foundation: "647372371".to_owned(),
                        ..Default::default()
                    },
                    rel_addr: "192.168.0.274".to_owned(),
                    rel_port: 53991,
                    url: None,
                }
                .new_candidate_server_reflexive()?,
            ),
            "647372371 1 udp 1694498815 191.228.238.68 53991 typ srflx raddr 192.168.0.274 rport 53991",
        ),
        (
            Some(
                CandidateRelayConfig {
                    base_config: CandidateConfig {
                        network: "udp".to_owned(),
                        address: "50.0.0.1".to_owned(),
                        port: 5000,
                        component: COMPONENT_RTP,
                        priority: 16777215,
                        foundation: "848194626".to_owned(),
                        ..Default::default()
                    },
                    rel_addr: "192.168.0.1".to_owned(),
                    rel_port: 5001,
                    url: None,
                }
                .new_candidate_relay()?,
            ),
            "848194626 1 udp 16777215 50.0.0.1 5000 typ relay raddr 192.168.0.1 rport 5001",
        ),
        (None, "1938809241"),
        (None, "1986380506 99999999 udp 2122063615 10.0.75.1 53634 typ host generation 0 network-id 2"),
        (None, "1986380506 1 udp 99999999999 10.0.75.1 53634 typ host"),
        (None, "4207374051 1 udp 1685790463 191.228.238.68 99999999 typ srflx raddr 192.168.0.278 rport 53991 generation 0 network-id 3"),
        (None, "4207374051 INVALID udp 2130706431 10.0.75.1 53634 typ host"),
        (None, "4207374051 1 udp INVALID 10.0.75.1 53634 typ host"),
        (None, "4207374051 1 udp 2130706431 10.0.75.1 INVALID typ host"),
        (None, "4207374051 1 udp 2130706431 10.0.75.1 53634 typ INVALID"),
        (None, "4207374051 1 udp 2130706431 10.0.75.1 53634 INVALID host"),
        (None, "848194626 1 udp 16777215 50.0.0.1 5000 typ relay raddr 192.168.0.1 rport INVALID"),
        (None, "848194626 1 tcp 16777215 50.0.0.1 5000 typ host"),
    ];

    for (candidate, marshaled) in tests {
        let actual_candidate = unmarshal_candidate(marshaled);
        if let Some(candidate) = candidate {
            let actual_candidate = actual_candidate?;
            assert!(
                candidate.equal(&actual_candidate),
                "{} vs {}",
                candidate.marshal(),
                marshaled
            );
            assert_eq!(marshaled, actual_candidate.marshal());
        } else {
            assert!(actual_candidate.is_err(), "expected error for {marshaled}");
        }
    }

    Ok(())
}

#[test]
fn test_candidate_unmarshal_extensions() -> Result<()> {
    let c = unmarshal_candidate(
        "candidate:1 1 udp 2130706431 10.0.0.1 5000 typ host generation 0 ufrag abcd",
    )?;
    assert_eq!(c.candidate_type(), CandidateType::Host);
    assert_eq!(c.addr(), "10.0.0.1:5000".parse::<SocketAddr>()?);
    assert_eq!(c.foundation(), "1");
    assert_eq!(c.priority(), 2130706431);

    let c = unmarshal_candidate(
        "2 1 udp 1694498815 203.0.113.4 40000 typ srflx raddr 0.0.0.0 rport 0",
    )?;
    assert_eq!(c.candidate_type(), CandidateType::ServerReflexive);
    assert_eq!(
        c.related_address(),
        Some(CandidateRelatedAddress {
            address: "0.0.0.0".to_owned(),
            port: 0
        })
    );

    Ok(())
}

#[test]
fn test_candidate_type_serialization() -> Result<()> {
    let tests = vec![
        (CandidateType::Unspecified, "\"unspecified\""),
        (CandidateType::Host, "\"host\""),
        (CandidateType::ServerReflexive, "\"srflx\""),
        (CandidateType::PeerReflexive, "\"prflx\""),
        (CandidateType::Relay, "\"relay\""),
    ];

    for (candidate_type, expected_string) in tests {
        let s = serde_json::to_string(&candidate_type).map_err(|e| Error::Other(e.to_string()))?;
        assert_eq!(s, expected_string);
        let back: CandidateType =
            serde_json::from_str(expected_string).map_err(|e| Error::Other(e.to_string()))?;
        assert_eq!(back, candidate_type);
    }

    Ok(())
}
