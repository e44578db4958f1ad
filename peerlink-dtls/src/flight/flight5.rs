use super::*;
use crate::change_cipher_spec::*;
use crate::crypto::*;
use crate::handshake::handshake_message_certificate::*;
use crate::handshake::handshake_message_certificate_verify::*;
use crate::handshake::handshake_message_client_key_exchange::*;
use crate::handshake::handshake_message_finished::*;
use crate::prf::*;
use crate::signature_hash_algorithm::*;

use subtle::ConstantTimeEq;

/// Client: waits for the server's Finished. The handshake is complete once
/// it verifies.
pub(super) fn parse(
    state: &mut State,
    cache: &HandshakeCache,
    cfg: &HandshakeConfig,
) -> Result<Flight, FlightError> {
    let epoch = cfg.initial_epoch;
    let (_, msgs) = match cache.full_pull_map(
        state.handshake_recv_sequence,
        &[rule(HandshakeType::Finished, epoch + 1, false)],
    ) {
        Ok((seq, msgs)) => (seq, msgs),
        Err(_) => return Err((None, None)),
    };

    let Some(HandshakeMessage::Finished(finished)) = msgs.get(&HandshakeType::Finished) else {
        return Err((Some(Alert::fatal(AlertDescription::InternalError)), None));
    };

    let plain_text = cache.pull_and_merge(&server_finished_rules(epoch));
    let expected_verify_data = prf_verify_data_server(&state.master_secret, &plain_text)
        .map_err(|err| alert_fatal(AlertDescription::InternalError, err))?;
    if !bool::from(expected_verify_data.ct_eq(&finished.verify_data)) {
        return Err(alert_fatal(
            AlertDescription::HandshakeFailure,
            Error::ErrVerifyDataMismatch,
        ));
    }

    Ok(Flight::Flight5)
}

pub(super) fn generate(
    state: &mut State,
    cache: &HandshakeCache,
    cfg: &HandshakeConfig,
) -> Result<Vec<Packet>, FlightError> {
    let epoch = cfg.initial_epoch;
    let certificate = cfg
        .get_certificate()
        .map_err(|err| alert_fatal(AlertDescription::HandshakeFailure, err))?;
    let Some(keypair) = &state.local_keypair else {
        return Err((Some(Alert::fatal(AlertDescription::InternalError)), None));
    };

    let mut pkts = vec![];
    if state.remote_requested_certificate {
        pkts.push(Packet::plaintext(handshake_record(
            0,
            HandshakeMessage::Certificate(HandshakeMessageCertificate {
                certificate: certificate.certificate.clone(),
            }),
        )));
    }
    pkts.push(Packet::plaintext(handshake_record(
        0,
        HandshakeMessage::ClientKeyExchange(HandshakeMessageClientKeyExchange {
            public_key: keypair.public_key.clone(),
        }),
    )));

    // The transcript needs these messages in wire form before the caller
    // assigns their sequence numbers, so predict them.
    let mut next_sequence = state.handshake_send_sequence;
    let mut merged = vec![];
    for p in &mut pkts {
        append_handshake(&mut merged, p, &mut next_sequence)?;
    }

    init_cipher_suite(state, cache, epoch, &merged)?;

    if state.remote_requested_certificate {
        let mut plain_text = cache.pull_and_merge(&server_flight_rules(epoch));
        plain_text.extend_from_slice(&merged);

        let signature = generate_certificate_verify(&plain_text, &certificate.private_key)
            .map_err(|err| alert_fatal(AlertDescription::InternalError, err))?;
        let algorithm =
            select_signature_scheme(&cfg.local_signature_schemes, &certificate.private_key)
                .map_err(|err| alert_fatal(AlertDescription::InsufficientSecurity, err))?;

        let mut p = Packet::plaintext(handshake_record(
            0,
            HandshakeMessage::CertificateVerify(HandshakeMessageCertificateVerify {
                algorithm,
                signature,
            }),
        ));
        append_handshake(&mut merged, &mut p, &mut next_sequence)?;
        pkts.push(p);
    }

    let mut plain_text = cache.pull_and_merge(&server_flight_rules(epoch));
    plain_text.extend_from_slice(&merged);
    let verify_data = prf_verify_data_client(&state.master_secret, &plain_text)
        .map_err(|err| alert_fatal(AlertDescription::InternalError, err))?;

    pkts.push(Packet::plaintext(RecordLayer::new(
        PROTOCOL_VERSION1_2,
        0,
        Content::ChangeCipherSpec(ChangeCipherSpec),
    )));
    pkts.push(Packet::encrypted(handshake_record(
        1,
        HandshakeMessage::Finished(HandshakeMessageFinished { verify_data }),
    )));

    Ok(pkts)
}

fn append_handshake(
    merged: &mut Vec<u8>,
    p: &mut Packet,
    next_sequence: &mut isize,
) -> Result<(), FlightError> {
    if let Content::Handshake(h) = &mut p.record.content {
        h.handshake_header.message_sequence = *next_sequence as u16;
        *next_sequence += 1;
        h.marshal(merged)
            .map_err(|err| alert_fatal(AlertDescription::InternalError, err))?;
    }
    Ok(())
}

fn init_cipher_suite(
    state: &mut State,
    cache: &HandshakeCache,
    epoch: u16,
    client_messages: &[u8],
) -> Result<(), FlightError> {
    let (client_random, server_random) = state.client_and_server_random();
    let master_secret = if state.extended_master_secret {
        let session_hash = cache
            .session_hash(epoch, client_messages)
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
        .init(&master_secret, &client_random, &server_random, true)
        .map_err(|err| alert_fatal(AlertDescription::InternalError, err))?;
    state.master_secret = master_secret;
    Ok(())
}
