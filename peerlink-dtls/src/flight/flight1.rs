use super::*;
use crate::compression_methods::*;
use crate::conn::*;
use crate::curve::named_curve::NamedCurve;
use crate::extension::extension_supported_elliptic_curves::*;
use crate::extension::extension_supported_point_formats::*;
use crate::extension::extension_supported_signature_algorithms::*;
use crate::extension::extension_supported_versions::*;
use crate::extension::extension_use_extended_master_secret::*;
use crate::extension::extension_use_srtp::*;
use crate::extension::*;
use crate::handshake::handshake_message_client_hello::*;
use crate::handshaker::srv_cli_str;

use log::debug;

/// Client: the answer to the first ClientHello is either a HelloVerifyRequest
/// or, from a server that skips the cookie exchange, the whole server flight.
pub(super) fn parse(
    state: &mut State,
    cache: &HandshakeCache,
    cfg: &HandshakeConfig,
) -> Result<Flight, FlightError> {
    let (seq, msgs) = match cache.full_pull_map(
        state.handshake_recv_sequence,
        &[rule(
            HandshakeType::HelloVerifyRequest,
            cfg.initial_epoch,
            false,
        )],
    ) {
        Ok((seq, msgs)) => (seq, msgs),
        Err(_) => return super::flight3::parse(state, cache, cfg),
    };

    let Some(HandshakeMessage::HelloVerifyRequest(h)) =
        msgs.get(&HandshakeType::HelloVerifyRequest)
    else {
        return Err((Some(Alert::fatal(AlertDescription::InternalError)), None));
    };

    // DTLS 1.2 servers may still answer with a 1.0 HelloVerifyRequest
    // <https://tools.ietf.org/html/rfc6347#section-4.2.1>
    if h.version != PROTOCOL_VERSION1_0 && h.version != PROTOCOL_VERSION1_2 {
        return Err(alert_fatal(
            AlertDescription::ProtocolVersion,
            Error::ErrUnsupportedProtocolVersion,
        ));
    }

    debug!(
        "[handshake:{}] received cookie of {} bytes",
        srv_cli_str(state.is_client),
        h.cookie.len()
    );
    state.cookie.clone_from(&h.cookie);
    state.handshake_recv_sequence = seq;

    Ok(Flight::Flight3)
}

pub(super) fn generate(
    state: &mut State,
    _cache: &HandshakeCache,
    cfg: &HandshakeConfig,
) -> Result<Vec<Packet>, FlightError> {
    state.local_epoch = 0;
    state.remote_epoch = 0;
    state.named_curve = DEFAULT_NAMED_CURVE;
    state.cookie = vec![];
    state.local_random.populate();

    Ok(vec![Packet::plaintext(handshake_record(
        0,
        HandshakeMessage::ClientHello(client_hello(state, cfg)),
    ))])
}

/// ClientHello shared by flights 1 and 3; only the cookie differs.
pub(super) fn client_hello(state: &State, cfg: &HandshakeConfig) -> HandshakeMessageClientHello {
    let mut extensions = vec![
        Extension::SupportedSignatureAlgorithms(ExtensionSupportedSignatureAlgorithms {
            signature_hash_algorithms: cfg.local_signature_schemes.clone(),
        }),
        Extension::SupportedEllipticCurves(ExtensionSupportedEllipticCurves {
            elliptic_curves: vec![NamedCurve::X25519, NamedCurve::P256],
        }),
        Extension::SupportedPointFormats(ExtensionSupportedPointFormats {
            point_formats: vec![ELLIPTIC_CURVE_POINT_FORMAT_UNCOMPRESSED],
        }),
    ];

    if cfg.extended_master_secret != ExtendedMasterSecretType::Disable {
        extensions.push(Extension::UseExtendedMasterSecret(
            ExtensionUseExtendedMasterSecret { supported: true },
        ));
    }

    if !cfg.local_srtp_protection_profiles.is_empty() {
        extensions.push(Extension::UseSrtp(ExtensionUseSrtp {
            protection_profiles: cfg.local_srtp_protection_profiles.clone(),
        }));
    }

    if cfg.advertise_dtls13 {
        extensions.push(Extension::SupportedVersions(ExtensionSupportedVersions {
            versions: vec![PROTOCOL_VERSION1_3, PROTOCOL_VERSION1_2],
        }));
    }

    HandshakeMessageClientHello {
        version: PROTOCOL_VERSION1_2,
        random: state.local_random.clone(),
        session_id: vec![],
        cookie: state.cookie.clone(),
        cipher_suites: cfg.local_cipher_suites.clone(),
        compression_methods: CompressionMethods::default(),
        extensions,
    }
}
