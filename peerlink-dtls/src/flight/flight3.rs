use super::*;
use crate::cipher_suite::*;
use crate::crypto::*;
use crate::curve::named_curve::NamedCurve;
use crate::extension::*;
use crate::handshaker::srv_cli_str;
use crate::*;

use log::debug;

/// Client: processes ServerHello through ServerHelloDone. On success the
/// server parameters are fixed and the pre-master secret is known.
pub(super) fn parse(
    state: &mut State,
    cache: &HandshakeCache,
    cfg: &HandshakeConfig,
) -> Result<Flight, FlightError> {
    let epoch = cfg.initial_epoch;
    let (seq, msgs) = match cache.full_pull_map(
        state.handshake_recv_sequence,
        &[
            rule(HandshakeType::ServerHello, epoch, false),
            rule(HandshakeType::Certificate, epoch, false),
            rule(HandshakeType::ServerKeyExchange, epoch, false),
            HandshakeCachePullRule::new(HandshakeType::CertificateRequest, epoch, false, true),
            rule(HandshakeType::ServerHelloDone, epoch, false),
        ],
    ) {
        Ok((seq, msgs)) => (seq, msgs),
        // Flight still incomplete
        Err(_) => return Err((None, None)),
    };

    let Some(HandshakeMessage::ServerHello(server_hello)) = msgs.get(&HandshakeType::ServerHello)
    else {
        return Err((Some(Alert::fatal(AlertDescription::InternalError)), None));
    };

    if server_hello.version != PROTOCOL_VERSION1_2 {
        return Err(alert_fatal(
            AlertDescription::ProtocolVersion,
            Error::ErrUnsupportedProtocolVersion,
        ));
    }
    state.negotiated_version = server_hello.version;

    let mut srtp_answered = false;
    for extension in &server_hello.extensions {
        match extension {
            Extension::UseSrtp(e) => {
                srtp_answered = true;
                match find_matching_srtp_profile(
                    &e.protection_profiles,
                    &cfg.local_srtp_protection_profiles,
                ) {
                    Ok(profile) => state.srtp_protection_profile = profile,
                    Err(_) => {
                        return Err(alert_fatal(
                            AlertDescription::IllegalParameter,
                            Error::ErrClientNoMatchingSrtpProfile,
                        ));
                    }
                }
            }
            Extension::UseExtendedMasterSecret(_) => {
                if cfg.extended_master_secret != ExtendedMasterSecretType::Disable {
                    state.extended_master_secret = true;
                }
            }
            _ => {}
        }
    }

    if !cfg.local_srtp_protection_profiles.is_empty() && !srtp_answered {
        return Err(alert_fatal(
            AlertDescription::InsufficientSecurity,
            Error::ErrRequestedButNoSrtpExtension,
        ));
    }

    if cfg.extended_master_secret == ExtendedMasterSecretType::Require
        && !state.extended_master_secret
    {
        return Err(alert_fatal(
            AlertDescription::InsufficientSecurity,
            Error::ErrExtendedMasterSecretRequired,
        ));
    }

    if !cfg.local_cipher_suites.contains(&server_hello.cipher_suite) {
        return Err(alert_fatal(
            AlertDescription::InsufficientSecurity,
            Error::ErrCipherSuiteNoIntersection,
        ));
    }
    let cipher_suite = cipher_suite_for_id(server_hello.cipher_suite)
        .map_err(|err| alert_fatal(AlertDescription::InsufficientSecurity, err))?;
    debug!(
        "[handshake:{}] use cipher suite: {}",
        srv_cli_str(state.is_client),
        cipher_suite.to_string()
    );
    state.cipher_suite = Some(cipher_suite);
    state.remote_random = server_hello.random.clone();

    let Some(HandshakeMessage::Certificate(certificate)) = msgs.get(&HandshakeType::Certificate)
    else {
        return Err((Some(Alert::fatal(AlertDescription::InternalError)), None));
    };
    if let Err(err) = load_certs(&certificate.certificate) {
        return Err(alert_fatal(AlertDescription::BadCertificate, err));
    }
    state.peer_certificates.clone_from(&certificate.certificate);

    let Some(HandshakeMessage::ServerKeyExchange(ske)) =
        msgs.get(&HandshakeType::ServerKeyExchange)
    else {
        return Err((Some(Alert::fatal(AlertDescription::InternalError)), None));
    };
    if ske.named_curve == NamedCurve::Unsupported {
        return Err(alert_fatal(
            AlertDescription::IllegalParameter,
            Error::ErrInvalidNamedCurve,
        ));
    }

    let (client_random, server_random) = state.client_and_server_random();
    let expected_msg = value_key_message(
        &client_random,
        &server_random,
        &ske.public_key,
        ske.named_curve,
    );
    if let Err(err) = verify_key_signature(
        &expected_msg,
        ske.algorithm.hash,
        &ske.signature,
        &state.peer_certificates,
    ) {
        return Err(alert_fatal(AlertDescription::BadCertificate, err));
    }

    state.named_curve = ske.named_curve;
    let keypair = ske
        .named_curve
        .generate_keypair()
        .map_err(|err| alert_fatal(AlertDescription::IllegalParameter, err))?;
    state.pre_master_secret = keypair
        .shared_secret(&ske.public_key)
        .map_err(|err| alert_fatal(AlertDescription::IllegalParameter, err))?;
    state.local_keypair = Some(keypair);

    state.remote_requested_certificate =
        msgs.contains_key(&HandshakeType::CertificateRequest);
    state.handshake_recv_sequence = seq;

    Ok(Flight::Flight5)
}

pub(super) fn generate(
    state: &mut State,
    _cache: &HandshakeCache,
    cfg: &HandshakeConfig,
) -> Result<Vec<Packet>, FlightError> {
    Ok(vec![Packet::plaintext(handshake_record(
        0,
        HandshakeMessage::ClientHello(super::flight1::client_hello(state, cfg)),
    ))])
}
