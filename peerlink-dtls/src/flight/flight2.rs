use super::*;
use crate::handshake::handshake_message_hello_verify_request::*;

use subtle::ConstantTimeEq;

/// Server: waits for the ClientHello that echoes the cookie. A client that
/// lost the HelloVerifyRequest retransmits its first ClientHello, which is
/// answered by sending this flight again.
pub(super) fn parse(
    state: &mut State,
    cache: &HandshakeCache,
    cfg: &HandshakeConfig,
) -> Result<Flight, FlightError> {
    let (seq, msgs) = match cache.full_pull_map(
        state.handshake_recv_sequence,
        &[rule(HandshakeType::ClientHello, cfg.initial_epoch, true)],
    ) {
        Ok((seq, msgs)) => (seq, msgs),
        Err(_) => return Ok(Flight::Flight2),
    };

    let Some(HandshakeMessage::ClientHello(client_hello)) = msgs.get(&HandshakeType::ClientHello)
    else {
        return Err((Some(Alert::fatal(AlertDescription::InternalError)), None));
    };

    if client_hello.cookie.is_empty() {
        return Ok(Flight::Flight2);
    }

    if !bool::from(client_hello.cookie.ct_eq(&state.cookie)) {
        return Err(alert_fatal(
            AlertDescription::AccessDenied,
            Error::ErrCookieMismatch,
        ));
    }

    state.handshake_recv_sequence = seq;
    Ok(Flight::Flight4)
}

pub(super) fn generate(
    state: &mut State,
    _cache: &HandshakeCache,
    _cfg: &HandshakeConfig,
) -> Result<Vec<Packet>, FlightError> {
    Ok(vec![Packet::plaintext(handshake_record(
        0,
        HandshakeMessage::HelloVerifyRequest(HandshakeMessageHelloVerifyRequest {
            version: PROTOCOL_VERSION1_2,
            cookie: state.cookie.clone(),
        }),
    ))])
}
