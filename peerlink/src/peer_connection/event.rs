use std::net::SocketAddr;

use bytes::BytesMut;
use ice::candidate::Candidate;
use ice::state::{ConnectionState, GatheringState};

use crate::peer_connection::state::{RTCDtlsTransportState, RTCSignalingState};
use crate::peer_connection::transport::ice::RTCIceCandidateInit;

/// Events produced by an `RTCPeerConnection`, drained with `poll_event`.
#[derive(Debug, Clone)]
pub enum RTCPeerConnectionEvent {
    OnSignalingStateChangeEvent(RTCSignalingState),

    /// A local candidate to trickle to the peer. An empty candidate marks
    /// the end of gathering.
    OnIceCandidateEvent(RTCIceCandidateInit),

    /// A STUN server failed; gathering continues with the other servers.
    OnIceCandidateErrorEvent {
        url: String,
        address: Option<SocketAddr>,
        reason: String,
    },

    OnIceGatheringStateChangeEvent(GatheringState),
    OnIceConnectionStateChangeEvent(ConnectionState),
    OnSelectedCandidatePairChangeEvent {
        local: Box<Candidate>,
        remote: Box<Candidate>,
    },
    OnWritableChangeEvent(bool),
    OnDtlsStateChangeEvent(RTCDtlsTransportState),

    /// An SRTP or SRTCP packet as received from the wire.
    OnSrtpPacket { packet: BytesMut, decrypted: bool },

    /// A datagram that is neither STUN nor DTLS, received before DTLS is
    /// connected.
    OnRawPacket(BytesMut),
}
