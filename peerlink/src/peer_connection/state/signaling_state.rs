use std::fmt;

use crate::peer_connection::sdp::sdp_type::RTCSdpType;
use shared::error::{Error, Result};

#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum StateChangeOp {
    #[default]
    SetLocal,
    SetRemote,
}

impl fmt::Display for StateChangeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            StateChangeOp::SetLocal => write!(f, "SetLocal"),
            StateChangeOp::SetRemote => write!(f, "SetRemote"),
        }
    }
}

/// Indicates the state of the offer/answer exchange (RFC 3264).
///
/// ```text
/// offerer:  Stable -> SetLocal(offer) -> HaveLocalOffer -> SetRemote(answer) -> Stable
/// answerer: Stable -> SetRemote(offer) -> HaveRemoteOffer -> SetLocal(answer) -> Stable
/// ```
///
/// Provisional answers pass through `HaveLocalPranswer` or
/// `HaveRemotePranswer`; a rollback returns to `Stable` from any state an
/// offer led to.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum RTCSignalingState {
    Unspecified = 0,

    /// No offer/answer exchange is in progress.
    #[default]
    Stable,

    /// A local offer was applied.
    HaveLocalOffer,

    /// A remote offer was applied.
    HaveRemoteOffer,

    /// A remote offer and a local pranswer were applied.
    HaveLocalPranswer,

    /// A local offer and a remote pranswer were applied.
    HaveRemotePranswer,

    /// The peer connection is closed.
    Closed,
}

const SIGNALING_STATE_STABLE_STR: &str = "stable";
const SIGNALING_STATE_HAVE_LOCAL_OFFER_STR: &str = "have-local-offer";
const SIGNALING_STATE_HAVE_REMOTE_OFFER_STR: &str = "have-remote-offer";
const SIGNALING_STATE_HAVE_LOCAL_PRANSWER_STR: &str = "have-local-pranswer";
const SIGNALING_STATE_HAVE_REMOTE_PRANSWER_STR: &str = "have-remote-pranswer";
const SIGNALING_STATE_CLOSED_STR: &str = "closed";

impl From<&str> for RTCSignalingState {
    fn from(raw: &str) -> Self {
        match raw {
            SIGNALING_STATE_STABLE_STR => RTCSignalingState::Stable,
            SIGNALING_STATE_HAVE_LOCAL_OFFER_STR => RTCSignalingState::HaveLocalOffer,
            SIGNALING_STATE_HAVE_REMOTE_OFFER_STR => RTCSignalingState::HaveRemoteOffer,
            SIGNALING_STATE_HAVE_LOCAL_PRANSWER_STR => RTCSignalingState::HaveLocalPranswer,
            SIGNALING_STATE_HAVE_REMOTE_PRANSWER_STR => RTCSignalingState::HaveRemotePranswer,
            SIGNALING_STATE_CLOSED_STR => RTCSignalingState::Closed,
            _ => RTCSignalingState::Unspecified,
        }
    }
}

impl fmt::Display for RTCSignalingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            RTCSignalingState::Stable => SIGNALING_STATE_STABLE_STR,
            RTCSignalingState::HaveLocalOffer => SIGNALING_STATE_HAVE_LOCAL_OFFER_STR,
            RTCSignalingState::HaveRemoteOffer => SIGNALING_STATE_HAVE_REMOTE_OFFER_STR,
            RTCSignalingState::HaveLocalPranswer => SIGNALING_STATE_HAVE_LOCAL_PRANSWER_STR,
            RTCSignalingState::HaveRemotePranswer => SIGNALING_STATE_HAVE_REMOTE_PRANSWER_STR,
            RTCSignalingState::Closed => SIGNALING_STATE_CLOSED_STR,
            _ => crate::peer_connection::configuration::UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

/// The state reached by applying a description of `sdp_type` through `op`
/// in state `cur`.
pub(crate) fn next_signaling_state(
    cur: RTCSignalingState,
    op: StateChangeOp,
    sdp_type: RTCSdpType,
) -> Result<RTCSignalingState> {
    let next = match (sdp_type, op) {
        (RTCSdpType::Offer, StateChangeOp::SetLocal) => RTCSignalingState::HaveLocalOffer,
        (RTCSdpType::Offer, StateChangeOp::SetRemote) => RTCSignalingState::HaveRemoteOffer,
        (RTCSdpType::Pranswer, StateChangeOp::SetLocal) => RTCSignalingState::HaveLocalPranswer,
        (RTCSdpType::Pranswer, StateChangeOp::SetRemote) => RTCSignalingState::HaveRemotePranswer,
        (RTCSdpType::Answer, _) | (RTCSdpType::Rollback, _) => RTCSignalingState::Stable,
        (RTCSdpType::Unspecified, _) => return Err(Error::ErrPeerConnSDPTypeInvalidValue),
    };
    check_next_signaling_state(cur, next, op, sdp_type)
}

pub(crate) fn check_next_signaling_state(
    cur: RTCSignalingState,
    next: RTCSignalingState,
    op: StateChangeOp,
    sdp_type: RTCSdpType,
) -> Result<RTCSignalingState> {
    if sdp_type == RTCSdpType::Rollback {
        return match (cur, op) {
            (RTCSignalingState::Stable, _) => Err(Error::ErrSignalingStateCannotRollback),
            // a rollback undoes the offer of the same side
            (RTCSignalingState::HaveLocalOffer, StateChangeOp::SetLocal)
            | (RTCSignalingState::HaveRemoteOffer, StateChangeOp::SetRemote)
            | (RTCSignalingState::HaveLocalPranswer, StateChangeOp::SetRemote)
            | (RTCSignalingState::HaveRemotePranswer, StateChangeOp::SetLocal)
                if next == RTCSignalingState::Stable =>
            {
                Ok(next)
            }
            _ => Err(invalid_transition(cur, op, sdp_type)),
        };
    }

    // 4.3.1 valid state transitions
    let valid = match (cur, op, sdp_type) {
        // stable->SetLocal(offer)->have-local-offer
        (RTCSignalingState::Stable, StateChangeOp::SetLocal, RTCSdpType::Offer) => {
            next == RTCSignalingState::HaveLocalOffer
        }
        // stable->SetRemote(offer)->have-remote-offer
        (RTCSignalingState::Stable, StateChangeOp::SetRemote, RTCSdpType::Offer) => {
            next == RTCSignalingState::HaveRemoteOffer
        }
        // have-local-offer->SetLocal(offer)->have-local-offer
        (RTCSignalingState::HaveLocalOffer, StateChangeOp::SetLocal, RTCSdpType::Offer) => {
            next == RTCSignalingState::HaveLocalOffer
        }
        // have-local-offer->SetRemote(answer)->stable
        (RTCSignalingState::HaveLocalOffer, StateChangeOp::SetRemote, RTCSdpType::Answer) => {
            next == RTCSignalingState::Stable
        }
        // have-local-offer->SetRemote(pranswer)->have-remote-pranswer
        (RTCSignalingState::HaveLocalOffer, StateChangeOp::SetRemote, RTCSdpType::Pranswer) => {
            next == RTCSignalingState::HaveRemotePranswer
        }
        // have-remote-pranswer->SetRemote(pranswer|answer)
        (RTCSignalingState::HaveRemotePranswer, StateChangeOp::SetRemote, RTCSdpType::Pranswer) => {
            next == RTCSignalingState::HaveRemotePranswer
        }
        (RTCSignalingState::HaveRemotePranswer, StateChangeOp::SetRemote, RTCSdpType::Answer) => {
            next == RTCSignalingState::Stable
        }
        // have-remote-offer->SetLocal(answer)->stable
        (RTCSignalingState::HaveRemoteOffer, StateChangeOp::SetLocal, RTCSdpType::Answer) => {
            next == RTCSignalingState::Stable
        }
        // have-remote-offer->SetLocal(pranswer)->have-local-pranswer
        (RTCSignalingState::HaveRemoteOffer, StateChangeOp::SetLocal, RTCSdpType::Pranswer) => {
            next == RTCSignalingState::HaveLocalPranswer
        }
        // have-local-pranswer->SetLocal(pranswer|answer)
        (RTCSignalingState::HaveLocalPranswer, StateChangeOp::SetLocal, RTCSdpType::Pranswer) => {
            next == RTCSignalingState::HaveLocalPranswer
        }
        (RTCSignalingState::HaveLocalPranswer, StateChangeOp::SetLocal, RTCSdpType::Answer) => {
            next == RTCSignalingState::Stable
        }
        _ => false,
    };

    if valid {
        Ok(next)
    } else {
        Err(invalid_transition(cur, op, sdp_type))
    }
}

fn invalid_transition(cur: RTCSignalingState, op: StateChangeOp, sdp_type: RTCSdpType) -> Error {
    Error::ErrSignalingStateProposedTransitionInvalid(format!(
        "from {cur} applying {op}({sdp_type})"
    ))
}
