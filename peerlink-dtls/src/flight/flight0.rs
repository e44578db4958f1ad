use super::*;
use crate::cipher_suite::*;
use crate::conn::*;
use crate::curve::named_curve::NamedCurve;
use crate::extension::*;
use crate::handshake::*;
use crate::handshaker::srv_cli_str;
use crate::record_layer::record_layer_header::*;
use crate::*;

use log::debug;
use rand::Rng;

/// Server: waits for the first ClientHello and picks the parameters of the
/// session from it.
pub(super) fn parse(
    state: &mut State,
    cache: &HandshakeCache,
    cfg: &HandshakeConfig,
) -> Result<Flight, FlightError> {
    let (seq, msgs) = match cache.full_pull_map(
        state.handshake_recv_sequence,
        &[HandshakeCachePullRule::new(
            HandshakeType::ClientHello,
            cfg.initial_epoch,
            true,
            false,
        )],
    ) {
        Ok((seq, msgs)) => (seq, msgs),
        Err(_) => return Err((None, None)),
    };

    state.handshake_recv_sequence = seq;

    let Some(HandshakeMessage::ClientHello(client_hello)) = msgs.get(&HandshakeType::ClientHello)
    else {
        return Err((Some(Alert::fatal(AlertDescription::InternalError)), None));
    };

    state.negotiated_version = negotiate_version(state, client_hello)?;
    state.remote_random = client_hello.random.clone();

    if let Ok(id) =
        find_matching_cipher_suite(&client_hello.cipher_suites, &cfg.local_cipher_suites)
    {
        if let Ok(cipher_suite) = cipher_suite_for_id(id) {
            debug!(
                "[handshake:{}] use cipher suite: {}",
                srv_cli_str(state.is_client),
                cipher_suite.to_string()
            );
            state.cipher_suite = Some(cipher_suite);
        }
    } else {
        return Err(alert_fatal(
            AlertDescription::InsufficientSecurity,
            Error::ErrCipherSuiteNoIntersection,
        ));
    }

    for extension in &client_hello.extensions {
        match extension {
            Extension::SupportedEllipticCurves(e) => {
                if e.elliptic_curves.is_empty() {
                    return Err(alert_fatal(
                        AlertDescription::InsufficientSecurity,
                        Error::ErrNoSupportedEllipticCurves,
                    ));
                }
                if let Some(curve) = e
                    .elliptic_curves
                    .iter()
                    .find(|c| **c != NamedCurve::Unsupported)
                {
                    state.named_curve = *curve;
                }
            }
            Extension::UseSrtp(e) => {
                if let Ok(profile) = find_matching_srtp_profile(
                    &e.protection_profiles,
                    &cfg.local_srtp_protection_profiles,
                ) {
                    state.srtp_protection_profile = profile;
                } else {
                    return Err(alert_fatal(
                        AlertDescription::InsufficientSecurity,
                        Error::ErrServerNoMatchingSrtpProfile,
                    ));
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

    if cfg.extended_master_secret == ExtendedMasterSecretType::Require
        && !state.extended_master_secret
    {
        return Err(alert_fatal(
            AlertDescription::InsufficientSecurity,
            Error::ErrServerRequiredButNoClientEms,
        ));
    }

    if state.local_keypair.is_none() {
        state.local_keypair = match state.named_curve.generate_keypair() {
            Ok(local_keypair) => Some(local_keypair),
            Err(err) => return Err(alert_fatal(AlertDescription::IllegalParameter, err)),
        };
    }

    Ok(Flight::Flight2)
}

/// Only the DTLS 1.2 key schedule exists. A client listing supported_versions
/// must include 1.2 there; otherwise the legacy version field decides.
fn negotiate_version(
    state: &mut State,
    client_hello: &handshake_message_client_hello::HandshakeMessageClientHello,
) -> Result<ProtocolVersion, FlightError> {
    let offered: Vec<ProtocolVersion> = client_hello
        .extensions
        .iter()
        .filter_map(|e| match e {
            Extension::SupportedVersions(v) => Some(v.versions.clone()),
            _ => None,
        })
        .flatten()
        .collect();

    let acceptable = if offered.is_empty() {
        client_hello.version == PROTOCOL_VERSION1_2
    } else {
        offered.contains(&PROTOCOL_VERSION1_2)
    };
    state.remote_supported_versions = offered;

    if acceptable {
        Ok(PROTOCOL_VERSION1_2)
    } else {
        Err(alert_fatal(
            AlertDescription::ProtocolVersion,
            Error::ErrUnsupportedProtocolVersion,
        ))
    }
}

pub(super) fn generate(
    state: &mut State,
    _cache: &HandshakeCache,
    _cfg: &HandshakeConfig,
) -> Result<Vec<Packet>, FlightError> {
    // Initialize
    state.cookie = vec![0; COOKIE_LENGTH];
    rand::rng().fill(state.cookie.as_mut_slice());

    state.local_epoch = 0;
    state.remote_epoch = 0;

    state.named_curve = DEFAULT_NAMED_CURVE;
    state.local_random.populate();

    Ok(vec![])
}
