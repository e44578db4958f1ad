use super::*;
use crate::cipher_suite::CipherSuiteId;
use crate::compression_methods::CompressionMethods;
use crate::crypto::Certificate;
use crate::extension::Extension;
use crate::extension::extension_supported_elliptic_curves::ExtensionSupportedEllipticCurves;
use crate::extension::extension_supported_versions::ExtensionSupportedVersions;
use crate::extension::extension_use_extended_master_secret::ExtensionUseExtendedMasterSecret;
use crate::handshake::handshake_message_client_hello::HandshakeMessageClientHello;
use crate::handshake::handshake_random::HandshakeRandom;

use sansio::Protocol;
use shared::TransportContext;
use shared::TransportMessage;
use std::time::Duration;

const SRTP_LABEL: &str = "EXTRACTOR-dtls_srtp";

fn builder() -> Result<ConfigBuilder> {
    Ok(ConfigBuilder::default()
        .with_certificates(vec![Certificate::generate_self_signed(vec![
            "peerlink".to_owned(),
        ])?])
        .with_srtp_protection_profiles(vec![
            SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm,
            SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80,
        ]))
}

fn tagged(now: Instant, message: BytesMut) -> TaggedBytesMut {
    TransportMessage {
        now,
        transport: TransportContext::default(),
        message,
    }
}

fn drain(conn: &mut DTLSConn) -> Vec<BytesMut> {
    let mut out = vec![];
    while let Some(pkt) = conn.poll_write() {
        out.push(pkt);
    }
    out
}

fn transfer(from: &mut DTLSConn, to: &mut DTLSConn, now: Instant) -> Result<usize> {
    let datagrams = drain(from);
    let n = datagrams.len();
    for datagram in datagrams {
        to.handle_read(tagged(now, datagram))?;
    }
    Ok(n)
}

fn run_handshake(client: &mut DTLSConn, server: &mut DTLSConn, now: Instant) -> Result<()> {
    for _ in 0..16 {
        let sent = transfer(client, server, now)? + transfer(server, client, now)?;
        if sent == 0 && client.is_handshake_completed() && server.is_handshake_completed() {
            return Ok(());
        }
    }
    Err(Error::Other("handshake did not complete".to_owned()))
}

fn start_pair(
    client_cfg: HandshakeConfig,
    server_cfg: HandshakeConfig,
    now: Instant,
) -> Result<(DTLSConn, DTLSConn)> {
    let mut client = DTLSConn::new(client_cfg, true);
    let mut server = DTLSConn::new(server_cfg, false);
    server.start(now)?;
    client.start(now)?;
    Ok((client, server))
}

fn events(conn: &mut DTLSConn) -> Vec<DtlsEvent> {
    let mut out = vec![];
    while let Some(evt) = conn.poll_event() {
        out.push(evt);
    }
    out
}

#[test]
fn test_handshake_and_key_export() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();

    let now = Instant::now();
    let (mut client, mut server) = start_pair(builder()?.build()?, builder()?.build()?, now)?;

    assert_eq!(
        client.export_keying_material(SRTP_LABEL, &[], 60),
        Err(Error::HandshakeInProgress)
    );

    run_handshake(&mut client, &mut server, now)?;

    assert_eq!(events(&mut client), vec![DtlsEvent::HandshakeComplete]);
    assert_eq!(events(&mut server), vec![DtlsEvent::HandshakeComplete]);

    let client_keys = client.export_keying_material(SRTP_LABEL, &[], 60)?;
    let server_keys = server.export_keying_material(SRTP_LABEL, &[], 60)?;
    assert_eq!(client_keys.len(), 60);
    assert_eq!(client_keys, server_keys);

    assert_eq!(
        client.selected_srtp_protection_profile(),
        SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm
    );
    assert_eq!(
        server.selected_srtp_protection_profile(),
        SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm
    );

    for conn in [&client, &server] {
        let state = conn.connection_state();
        assert_eq!(state.negotiated_version(), PROTOCOL_VERSION1_2);
        assert!(state.extended_master_secret());
        assert_eq!(state.peer_certificates().len(), 1);
        assert_eq!(
            state.cipher_suite_id(),
            Some(CipherSuiteId::Tls_Ecdhe_Ecdsa_With_Aes_128_Gcm_Sha256)
        );
    }

    assert_eq!(
        client.export_keying_material("master secret", &[], 32),
        Err(Error::ReservedExportKeyingMaterial)
    );
    assert_eq!(
        client.export_keying_material(SRTP_LABEL, &[1], 32),
        Err(Error::ContextUnsupported)
    );
    assert!(client.poll_timeout().is_none());

    Ok(())
}

#[test]
fn test_application_data_round_trip() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = start_pair(builder()?.build()?, builder()?.build()?, now)?;

    // queued until the handshake completes
    client.handle_write(BytesMut::from(&b"early"[..]))?;
    run_handshake(&mut client, &mut server, now)?;
    transfer(&mut client, &mut server, now)?;
    assert_eq!(server.poll_read(), Some(BytesMut::from(&b"early"[..])));

    server.handle_write(BytesMut::from(&b"pong"[..]))?;
    transfer(&mut server, &mut client, now)?;
    assert_eq!(client.poll_read(), Some(BytesMut::from(&b"pong"[..])));
    assert_eq!(client.poll_read(), None);

    Ok(())
}

#[test]
fn test_close_notify() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = start_pair(builder()?.build()?, builder()?.build()?, now)?;
    run_handshake(&mut client, &mut server, now)?;
    events(&mut server);

    client.close()?;
    assert_eq!(
        transfer(&mut client, &mut server, now),
        Err(Error::ErrAlertFatalOrClose)
    );
    assert_eq!(
        events(&mut server),
        vec![DtlsEvent::Alert(Alert::new(
            AlertLevel::Warning,
            AlertDescription::CloseNotify
        ))]
    );
    assert_eq!(client.write(b"late"), Err(Error::ErrConnClosed));

    Ok(())
}

#[test]
fn test_handshake_with_small_mtu() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = start_pair(
        builder()?.with_mtu(100).build()?,
        builder()?.with_mtu(100).build()?,
        now,
    )?;
    run_handshake(&mut client, &mut server, now)?;

    assert_eq!(
        client.export_keying_material(SRTP_LABEL, &[], 30)?,
        server.export_keying_material(SRTP_LABEL, &[], 30)?
    );
    Ok(())
}

#[test]
fn test_lost_client_hello_is_retransmitted() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = start_pair(builder()?.build()?, builder()?.build()?, now)?;

    assert_eq!(drain(&mut client).len(), 1, "first ClientHello lost");
    let timer = client.poll_timeout().expect("retransmit timer armed");
    assert_eq!(timer - now, DEFAULT_INITIAL_RETRANSMIT_INTERVAL);

    client.handle_timeout(timer)?;
    assert_eq!(
        client.poll_timeout(),
        Some(timer + DEFAULT_INITIAL_RETRANSMIT_INTERVAL * 2)
    );
    run_handshake(&mut client, &mut server, timer)?;

    Ok(())
}

#[test]
fn test_lost_hello_verify_request_is_resent() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = start_pair(builder()?.build()?, builder()?.build()?, now)?;

    assert_eq!(transfer(&mut client, &mut server, now)?, 1);
    assert_eq!(drain(&mut server).len(), 1, "HelloVerifyRequest lost");
    assert!(server.poll_timeout().is_none());

    let timer = client.poll_timeout().expect("retransmit timer armed");
    client.handle_timeout(timer)?;
    run_handshake(&mut client, &mut server, timer)?;

    Ok(())
}

#[test]
fn test_handshake_timeout_after_retransmissions() -> Result<()> {
    let mut now = Instant::now();
    let mut client = DTLSConn::new(builder()?.build()?, true);
    client.start(now)?;

    let mut sent = drain(&mut client).len();
    let mut waits = vec![];
    let err = loop {
        let Some(timer) = client.poll_timeout() else {
            return Err(Error::Other("timer disarmed early".to_owned()));
        };
        waits.push((timer - now).as_millis());
        now = timer;
        match client.handle_timeout(now) {
            Ok(()) => sent += drain(&mut client).len(),
            Err(err) => break err,
        }
    };

    assert_eq!(err, Error::ErrHandshakeTimeout);
    assert_eq!(sent, 1 + DEFAULT_MAXIMUM_RETRANSMIT_NUMBER);
    assert_eq!(
        waits,
        vec![
            50, 100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 60000, 60000
        ]
    );
    assert!(client.poll_timeout().is_none());

    Ok(())
}

#[test]
fn test_custom_retransmit_interval() -> Result<()> {
    let now = Instant::now();
    let mut client = DTLSConn::new(
        builder()?
            .with_initial_retransmit_interval(Duration::from_millis(10))
            .with_maximum_retransmit_interval(Duration::from_millis(15))
            .with_maximum_retransmit_number(1)
            .build()?,
        true,
    );
    client.start(now)?;

    let timer = client.poll_timeout().expect("timer");
    assert_eq!(timer - now, Duration::from_millis(10));
    client.handle_timeout(timer)?;
    let next = client.poll_timeout().expect("timer");
    assert_eq!(next - timer, Duration::from_millis(15));
    assert_eq!(client.handle_timeout(next), Err(Error::ErrHandshakeTimeout));

    Ok(())
}

#[test]
fn test_dtls13_advertisement_negotiates_dtls12() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = start_pair(
        builder()?.with_dtls13_advertisement(true).build()?,
        builder()?.build()?,
        now,
    )?;
    run_handshake(&mut client, &mut server, now)?;

    assert_eq!(
        server.connection_state().remote_supported_versions,
        vec![PROTOCOL_VERSION1_3, PROTOCOL_VERSION1_2]
    );
    assert_eq!(
        server.connection_state().negotiated_version(),
        PROTOCOL_VERSION1_2
    );
    Ok(())
}

#[test]
fn test_dtls13_only_client_is_rejected() -> Result<()> {
    let now = Instant::now();
    let mut server = DTLSConn::new(builder()?.build()?, false);
    server.start(now)?;

    let hello = HandshakeMessageClientHello {
        version: PROTOCOL_VERSION1_2,
        random: HandshakeRandom::default(),
        session_id: vec![],
        cookie: vec![],
        cipher_suites: vec![CipherSuiteId::Tls_Ecdhe_Ecdsa_With_Aes_128_Gcm_Sha256],
        compression_methods: CompressionMethods::default(),
        extensions: vec![
            Extension::SupportedVersions(ExtensionSupportedVersions {
                versions: vec![PROTOCOL_VERSION1_3],
            }),
            Extension::SupportedEllipticCurves(ExtensionSupportedEllipticCurves {
                elliptic_curves: vec![NamedCurve::X25519],
            }),
            Extension::UseExtendedMasterSecret(ExtensionUseExtendedMasterSecret {
                supported: true,
            }),
        ],
    };
    let record = RecordLayer::new(
        PROTOCOL_VERSION1_2,
        0,
        Content::Handshake(Handshake::new(HandshakeMessage::ClientHello(hello))),
    );
    let mut raw = vec![];
    record.marshal(&mut raw)?;

    assert_eq!(
        server.handle_read(tagged(now, BytesMut::from(&raw[..]))),
        Err(Error::ErrUnsupportedProtocolVersion)
    );

    let reply = drain(&mut server);
    assert_eq!(reply.len(), 1);
    let mut reader = BufReader::new(&reply[0][..]);
    let alert = RecordLayer::unmarshal(&mut reader)?;
    assert_eq!(
        alert.content,
        Content::Alert(Alert::fatal(AlertDescription::ProtocolVersion))
    );
    Ok(())
}

#[test]
fn test_extended_master_secret_required_by_server() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = start_pair(
        builder()?
            .with_extended_master_secret(ExtendedMasterSecretType::Disable)
            .build()?,
        builder()?.build()?,
        now,
    )?;

    assert_eq!(
        transfer(&mut client, &mut server, now),
        Err(Error::ErrServerRequiredButNoClientEms)
    );
    Ok(())
}

#[test]
fn test_handshake_without_extended_master_secret() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = start_pair(
        builder()?
            .with_extended_master_secret(ExtendedMasterSecretType::Disable)
            .build()?,
        builder()?
            .with_extended_master_secret(ExtendedMasterSecretType::Request)
            .build()?,
        now,
    )?;
    run_handshake(&mut client, &mut server, now)?;

    assert!(!client.connection_state().extended_master_secret());
    assert_eq!(
        client.export_keying_material(SRTP_LABEL, &[], 16)?,
        server.export_keying_material(SRTP_LABEL, &[], 16)?
    );
    Ok(())
}

#[test]
fn test_no_common_srtp_profile() -> Result<()> {
    let now = Instant::now();
    let (mut client, mut server) = start_pair(
        builder()?
            .with_srtp_protection_profiles(vec![
                SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_32,
            ])
            .build()?,
        builder()?
            .with_srtp_protection_profiles(vec![SrtpProtectionProfile::Srtp_Aead_Aes_256_Gcm])
            .build()?,
        now,
    )?;

    assert_eq!(
        transfer(&mut client, &mut server, now),
        Err(Error::ErrServerNoMatchingSrtpProfile)
    );
    Ok(())
}

#[test]
fn test_config_requires_certificate() {
    assert_eq!(
        ConfigBuilder::default().build().map(|_| ()),
        Err(Error::ErrNoCertificates)
    );
}
