use super::*;

#[test]
fn test_parse_uri() -> Result<()> {
    let tests = vec![
        (
            "default",
            "stun:example.org",
            Uri {
                host: "example.org".to_owned(),
                scheme: SCHEME.to_owned(),
                port: None,
            },
            "stun:example.org",
        ),
        (
            "secure",
            "stuns:example.org",
            Uri {
                host: "example.org".to_owned(),
                scheme: SCHEME_SECURE.to_owned(),
                port: None,
            },
            "stuns:example.org",
        ),
        (
            "with port",
            "stun:example.org:8000",
            Uri {
                host: "example.org".to_owned(),
                scheme: SCHEME.to_owned(),
                port: Some(8000),
            },
            "stun:example.org:8000",
        ),
        (
            "ipv6 address",
            "stun:[::1]:123",
            Uri {
                host: "::1".to_owned(),
                scheme: SCHEME.to_owned(),
                port: Some(123),
            },
            "stun:[::1]:123",
        ),
    ];

    for (name, input, output, expected_str) in tests {
        let out = Uri::parse_uri(input)?;
        assert_eq!(out, output, "{name}: {out} != {output}");
        assert_eq!(out.to_string(), expected_str, "{name}");
    }

    Ok(())
}

#[test]
fn test_parse_uri_errors() {
    let tests = vec![
        ("hierarchical", "stun://example.org", Error::ErrInvalidUrl),
        ("bad scheme", "turn:example.org", Error::ErrSchemeType),
        ("query", "stun:example.org?query", Error::ErrInvalidUrl),
        ("bad port", "stun:example.org:port", Error::ErrPort),
        ("no host", "stun::3478", Error::ErrHost),
    ];

    for (name, input, expected) in tests {
        let result = Uri::parse_uri(input);
        assert_eq!(result, Err(expected), "{name}");
    }
}

#[test]
fn test_uri_socket_addr() -> Result<()> {
    let uri = Uri::parse_uri("stun:192.0.2.1")?;
    assert_eq!(uri.socket_addr(), Some("192.0.2.1:3478".parse::<SocketAddr>()?));

    let uri = Uri::parse_uri("stun:[2001:db8::1]:19302")?;
    assert_eq!(uri.socket_addr(), Some("[2001:db8::1]:19302".parse::<SocketAddr>()?));

    let uri = Uri::parse_uri("stun:stun.example.org:19302")?;
    assert_eq!(uri.socket_addr(), None);

    Ok(())
}
