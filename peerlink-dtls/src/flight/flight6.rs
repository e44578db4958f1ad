use super::*;
use crate::change_cipher_spec::*;
use crate::handshake::handshake_message_finished::*;
use crate::prf::*;

/// Server, after its last flight: a repeated client Finished means our
/// Finished was lost and has to be sent again.
pub(super) fn parse(
    state: &mut State,
    cache: &HandshakeCache,
    cfg: &HandshakeConfig,
) -> Result<Flight, FlightError> {
    match cache.full_pull_map(
        state.handshake_recv_sequence - 1,
        &[rule(HandshakeType::Finished, cfg.initial_epoch + 1, true)],
    ) {
        Ok(_) => Ok(Flight::Flight6),
        Err(_) => Err((None, None)),
    }
}

pub(super) fn generate(
    state: &mut State,
    cache: &HandshakeCache,
    cfg: &HandshakeConfig,
) -> Result<Vec<Packet>, FlightError> {
    let plain_text = cache.pull_and_merge(&server_finished_rules(cfg.initial_epoch));
    let verify_data = prf_verify_data_server(&state.master_secret, &plain_text)
        .map_err(|err| alert_fatal(AlertDescription::InternalError, err))?;

    Ok(vec![
        Packet::plaintext(RecordLayer::new(
            PROTOCOL_VERSION1_2,
            0,
            Content::ChangeCipherSpec(ChangeCipherSpec),
        )),
        Packet::encrypted(handshake_record(
            1,
            HandshakeMessage::Finished(HandshakeMessageFinished { verify_data }),
        )),
    ])
}
