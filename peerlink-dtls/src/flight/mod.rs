pub(crate) mod flight0;
pub(crate) mod flight1;
pub(crate) mod flight2;
pub(crate) mod flight3;
pub(crate) mod flight4;
pub(crate) mod flight5;
pub(crate) mod flight6;

use crate::alert::*;
use crate::config::*;
use crate::content::*;
use crate::handshake::handshake_cache::*;
use crate::handshake::*;
use crate::record_layer::record_layer_header::*;
use crate::record_layer::*;
use crate::state::*;
use shared::error::Error;

use std::fmt;

/// Failure of a flight: an alert to send to the peer, an error to surface,
/// or neither when the flight is still incomplete and must keep waiting.
pub(crate) type FlightError = (Option<Alert>, Option<Error>);

pub(crate) fn alert_fatal(description: AlertDescription, err: Error) -> FlightError {
    (Some(Alert::fatal(description)), Some(err))
}

#[derive(Clone, Debug)]
pub(crate) struct Packet {
    pub(crate) record: RecordLayer,
    pub(crate) should_encrypt: bool,
}

impl Packet {
    pub(crate) fn plaintext(record: RecordLayer) -> Self {
        Packet {
            record,
            should_encrypt: false,
        }
    }

    /// A record of the next epoch, protected by the freshly derived keys.
    pub(crate) fn encrypted(record: RecordLayer) -> Self {
        Packet {
            record,
            should_encrypt: true,
        }
    }
}

/// Wraps a handshake message into a record of `epoch`.
pub(crate) fn handshake_record(epoch: u16, message: HandshakeMessage) -> RecordLayer {
    RecordLayer::new(
        PROTOCOL_VERSION1_2,
        epoch,
        Content::Handshake(Handshake::new(message)),
    )
}

/// Rule for a message of the handshake transcript.
pub(crate) fn rule(typ: HandshakeType, epoch: u16, is_client: bool) -> HandshakeCachePullRule {
    HandshakeCachePullRule::new(typ, epoch, is_client, false)
}

/// Transcript up to and including ServerHelloDone.
pub(crate) fn server_flight_rules(epoch: u16) -> Vec<HandshakeCachePullRule> {
    vec![
        rule(HandshakeType::ClientHello, epoch, true),
        rule(HandshakeType::ServerHello, epoch, false),
        rule(HandshakeType::Certificate, epoch, false),
        rule(HandshakeType::ServerKeyExchange, epoch, false),
        rule(HandshakeType::CertificateRequest, epoch, false),
        rule(HandshakeType::ServerHelloDone, epoch, false),
    ]
}

/// Transcript covered by the client's Finished.
pub(crate) fn client_finished_rules(epoch: u16) -> Vec<HandshakeCachePullRule> {
    let mut rules = server_flight_rules(epoch);
    rules.extend([
        rule(HandshakeType::Certificate, epoch, true),
        rule(HandshakeType::ClientKeyExchange, epoch, true),
        rule(HandshakeType::CertificateVerify, epoch, true),
    ]);
    rules
}

/// Transcript covered by the server's Finished.
pub(crate) fn server_finished_rules(epoch: u16) -> Vec<HandshakeCachePullRule> {
    let mut rules = client_finished_rules(epoch);
    rules.push(rule(HandshakeType::Finished, epoch + 1, true));
    rules
}

/// The flights of RFC 6347 section 4.2.4. Even flights belong to the server,
/// odd ones to the client.
///
/// ```text
/// Client                                          Server
/// ------                                          ------
///                                     Waiting                 Flight 0
///
/// ClientHello             -------->                           Flight 1
///
///                         <-------    HelloVerifyRequest      Flight 2
///
/// ClientHello             -------->                           Flight 3
///
///                                            ServerHello    \
///                                           Certificate*     \
///                                     ServerKeyExchange*      Flight 4
///                                    CertificateRequest*     /
///                         <--------      ServerHelloDone    /
///
/// Certificate*                                              \
/// ClientKeyExchange                                          \
/// CertificateVerify*                                          Flight 5
/// [ChangeCipherSpec]                                         /
/// Finished                -------->                         /
///
///                                     [ChangeCipherSpec]    \ Flight 6
///                         <--------             Finished    /
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Flight {
    Flight0,
    Flight1,
    Flight2,
    Flight3,
    Flight4,
    Flight5,
    Flight6,
}

impl fmt::Display for Flight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = match self {
            Flight::Flight0 => 0,
            Flight::Flight1 => 1,
            Flight::Flight2 => 2,
            Flight::Flight3 => 3,
            Flight::Flight4 => 4,
            Flight::Flight5 => 5,
            Flight::Flight6 => 6,
        };
        write!(f, "Flight {n}")
    }
}

impl Flight {
    pub(crate) fn initial(is_client: bool) -> Self {
        if is_client {
            Flight::Flight1
        } else {
            Flight::Flight0
        }
    }

    /// The server's last flight; after sending it there is nothing to wait for.
    pub(crate) fn is_last_send_flight(&self) -> bool {
        matches!(self, Flight::Flight6)
    }

    /// The client's last flight; its answer ends the handshake.
    pub(crate) fn is_last_recv_flight(&self) -> bool {
        matches!(self, Flight::Flight5)
    }

    /// Flight 0 sends nothing and a HelloVerifyRequest is never retransmitted
    /// (RFC 6347 4.2.1), the client's retransmitted ClientHello triggers it.
    pub(crate) fn has_retransmit(&self) -> bool {
        !matches!(self, Flight::Flight0 | Flight::Flight2)
    }

    /// Processes what the peer sent in answer to this flight and returns
    /// the flight to send next.
    pub(crate) fn parse(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> Result<Flight, FlightError> {
        match self {
            Flight::Flight0 => flight0::parse(state, cache, cfg),
            Flight::Flight1 => flight1::parse(state, cache, cfg),
            Flight::Flight2 => flight2::parse(state, cache, cfg),
            Flight::Flight3 => flight3::parse(state, cache, cfg),
            Flight::Flight4 => flight4::parse(state, cache, cfg),
            Flight::Flight5 => flight5::parse(state, cache, cfg),
            Flight::Flight6 => flight6::parse(state, cache, cfg),
        }
    }

    /// Builds the records of this flight. Handshake message sequence numbers
    /// are assigned by the caller.
    pub(crate) fn generate(
        &self,
        state: &mut State,
        cache: &HandshakeCache,
        cfg: &HandshakeConfig,
    ) -> Result<Vec<Packet>, FlightError> {
        match self {
            Flight::Flight0 => flight0::generate(state, cache, cfg),
            Flight::Flight1 => flight1::generate(state, cache, cfg),
            Flight::Flight2 => flight2::generate(state, cache, cfg),
            Flight::Flight3 => flight3::generate(state, cache, cfg),
            Flight::Flight4 => flight4::generate(state, cache, cfg),
            Flight::Flight5 => flight5::generate(state, cache, cfg),
            Flight::Flight6 => flight6::generate(state, cache, cfg),
        }
    }
}
