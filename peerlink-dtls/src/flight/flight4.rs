use super::*;
use crate::client_certificate_type::*;
use crate::compression_methods::*;
use crate::crypto::*;
use crate::curve::*;
use crate::extension::extension_supported_point_formats::*;
use crate::extension::extension_use_extended_master_secret::*;
use crate::extension::extension_use_srtp::*;
use crate::extension::*;
use crate::handshake::handshake_message_certificate::*;
use crate::handshake::handshake_message_certificate_request::*;
use crate::handshake::handshake_message_server_hello::*;
use crate::handshake::handshake_message_server_hello_done::*;
use crate::handshake::handshake_message_server_key_exchange::*;
use crate::handshaker::srv_cli_str;
use crate::prf::*;
use crate::signature_hash_algorithm::*;

use log::debug;
use subtle::ConstantTimeEq;

/// Server: processes the client's Certificate, ClientKeyExchange,
/// CertificateVerify and, once keys are derived, its Finished.
pub(super) fn parse(
    state: &mut State,
    cache: &HandshakeCache,
    cfg: &HandshakeConfig,
) -> Result<Flight, FlightError> {
    let epoch = cfg.initial_epoch;
    let (seq, msgs) = match cache.full_pull_map(
        state.handshake_recv_sequence,
        &[
            HandshakeCachePullRule::new(HandshakeType::Certificate, epoch, true, true),
            rule(HandshakeType::ClientKeyExchange, epoch, true),
            HandshakeCachePullRule::new(HandshakeType::CertificateVerify, epoch, true, true),
        ],
    ) {
        Ok((seq, msgs)) => (seq, msgs),
        Err(_) => return Err((None, None)),
    };

    let Some(HandshakeMessage::ClientKeyExchange(client_key_exchange)) =
        msgs.get(&HandshakeType::ClientKeyExchange)
    else {
        return Err((Some(Alert::fatal(AlertDescription::InternalError)), None));
    };

    let Some(HandshakeMessage::Certificate(certificate)) = msgs.get(&HandshakeType::Certificate)
    else {
        return Err(alert_fatal(
            AlertDescription::NoCertificate,
            Error::ErrClientCertificateRequired,
        ));
    };

    // A certificate without its proof of possession: the flight is still arriving
    let Some(HandshakeMessage::CertificateVerify(certificate_verify)) =
        msgs.get(&HandshakeType::CertificateVerify)
    else {
        return Err((None, None));
    };

    if let Err(err) = load_certs(&certificate.certificate) {
        return Err(alert_fatal(AlertDescription::BadCertificate, err));
    }

    let mut verify_rules = server_flight_rules(epoch);
    verify_rules.extend([
        rule(HandshakeType::Certificate, epoch, true),
        rule(HandshakeType::ClientKeyExchange, epoch, true),
    ]);
    let plain_text = cache.pull_and_merge(&verify_rules);
    if let Err(err) = verify_certificate_verify(
        &plain_text,
        certificate_verify.algorithm.hash,
        &certificate_verify.signature,
        &certificate.certificate,
    ) {
        return Err(alert_fatal(AlertDescription::BadCertificate, err));
    }
    state.peer_certificates.clone_from(&certificate.certificate);

    let cipher_suite_initialized = state
        .cipher_suite
        .as_ref()
        .is_some_and(|cs| cs.is_initialized());
    if !cipher_suite_initialized {
        init_cipher_suite(state, cache, epoch, &client_key_exchange.public_key)?;
    }

    let (seq, msgs) = match cache.full_pull_map(
        seq,
        &[rule(HandshakeType::Finished, epoch + 1, true)],
    ) {
        Ok((seq, msgs)) => (seq, msgs),
        // Finished not received yet
        Err(_) => return Err((None, None)),
    };

    let Some(HandshakeMessage::Finished(finished)) = msgs.get(&HandshakeType::Finished) else {
        return Err((Some(Alert::fatal(AlertDescription::InternalError)), None));
    };

    let plain_text = cache.pull_and_merge(&client_finished_rules(epoch));
    let expected_verify_data = prf_verify_data_client(&state.master_secret, &plain_text)
        .map_err(|err| alert_fatal(AlertDescription::InternalError, err))?;
    if !bool::from(expected_verify_data.ct_eq(&finished.verify_data)) {
        return Err(alert_fatal(
            AlertDescription::HandshakeFailure,
            Error::ErrVerifyDataMismatch,
        ));
    }

    state.handshake_recv_sequence = seq;
    Ok(Flight::Flight6)
}

fn init_cipher_suite(
    state: &mut State,
    cache: &HandshakeCache,
    epoch: u16,
    client_public_key: &[u8],
) -> Result<(), FlightError> {
    let Some(keypair) = &state.local_keypair else {
        return Err((Some(Alert::fatal(AlertDescription::InternalError)), None));
    };
    state.pre_master_secret = keypair
        .shared_secret(client_public_key)
        .map_err(|err| alert_fatal(AlertDescription::IllegalParameter, err))?;

    let (client_random, server_random) = state.client_and_server_random();
    let master_secret = if state.extended_master_secret {
        let client_messages = cache.pull_and_merge(&[
            rule(HandshakeType::Certificate, epoch, true),
            rule(HandshakeType::ClientKeyExchange, epoch, true),
        ]);
        let session_hash = cache
            .session_hash(epoch, &client_messages)
            .map_err(|err| alert_fatal(AlertDescription::InternalError, err))?;
        prf_extended_master_secret(&state.pre_master_secret, &session_hash)
    } else {
        prf_master_secret(&state.pre_master_secret, &client_random, &server_random)
    }
    .map_err(|err| alert_fatal(AlertDescription::InternalError, err))?;

    let Some(cipher_suite) = &mut state.cipher_suite else {
        return Err((Some(Alert::fatal(AlertDescription::InternalError)), None));
    };
    cipher_suite
        .init(&master_secret, &client_random, &server_random, false)
        .map_err(|err| alert_fatal(AlertDescription::InternalError, err))?;
    state.master_secret = master_secret;

    debug!(
        "[handshake:{}] keys derived (extended master secret: {})",
        srv_cli_str(state.is_client),
        state.extended_master_secret
    );
    Ok(())
}

pub(super) fn generate(
    state: &mut State,
    _cache: &HandshakeCache,
    cfg: &HandshakeConfig,
) -> Result<Vec<Packet>, FlightError> {
    let mut extensions = vec![Extension::SupportedPointFormats(
        ExtensionSupportedPointFormats {
            point_formats: vec![ELLIPTIC_CURVE_POINT_FORMAT_UNCOMPRESSED],
        },
    )];
    if state.extended_master_secret {
        extensions.push(Extension::UseExtendedMasterSecret(
            ExtensionUseExtendedMasterSecret { supported: true },
        ));
    }
    if state.srtp_protection_profile != SrtpProtectionProfile::Unsupported {
        extensions.push(Extension::UseSrtp(ExtensionUseSrtp {
            protection_profiles: vec![state.srtp_protection_profile],
        }));
    }

    let Some(cipher_suite) = &state.cipher_suite else {
        return Err(alert_fatal(
            AlertDescription::InsufficientSecurity,
            Error::ErrCipherSuiteNoIntersection,
        ));
    };

    let certificate = cfg
        .get_certificate()
        .map_err(|err| alert_fatal(AlertDescription::HandshakeFailure, err))?;

    let Some(keypair) = &state.local_keypair else {
        return Err((Some(Alert::fatal(AlertDescription::InternalError)), None));
    };

    let (client_random, server_random) = state.client_and_server_random();
    let signature = generate_key_signature(
        &client_random,
        &server_random,
        &keypair.public_key,
        state.named_curve,
        &certificate.private_key,
    )
    .map_err(|err| alert_fatal(AlertDescription::InternalError, err))?;
    let algorithm = select_signature_scheme(&cfg.local_signature_schemes, &certificate.private_key)
        .map_err(|err| alert_fatal(AlertDescription::InsufficientSecurity, err))?;

    let messages = vec![
        HandshakeMessage::ServerHello(HandshakeMessageServerHello {
            version: PROTOCOL_VERSION1_2,
            random: state.local_random.clone(),
            session_id: vec![],
            cipher_suite: cipher_suite.id(),
            compression_method: CompressionMethodId::Null,
            extensions,
        }),
        HandshakeMessage::Certificate(HandshakeMessageCertificate {
            certificate: certificate.certificate.clone(),
        }),
        HandshakeMessage::ServerKeyExchange(HandshakeMessageServerKeyExchange {
            elliptic_curve_type: EllipticCurveType::NamedCurve,
            named_curve: state.named_curve,
            public_key: keypair.public_key.clone(),
            algorithm,
            signature,
        }),
        HandshakeMessage::CertificateRequest(HandshakeMessageCertificateRequest {
            certificate_types: vec![ClientCertificateType::EcdsaSign],
            signature_hash_algorithms: cfg.local_signature_schemes.clone(),
        }),
        HandshakeMessage::ServerHelloDone(HandshakeMessageServerHelloDone),
    ];

    Ok(messages
        .into_iter()
        .map(|m| Packet::plaintext(handshake_record(0, m)))
        .collect())
}
