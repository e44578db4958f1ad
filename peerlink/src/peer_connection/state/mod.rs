pub(crate) mod signaling_state;

pub use signaling_state::RTCSignalingState;
pub use crate::peer_connection::transport::dtls::state::RTCDtlsTransportState;
