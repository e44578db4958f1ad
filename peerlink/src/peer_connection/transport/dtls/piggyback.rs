use std::collections::VecDeque;
use std::fmt;

use crc::{CRC_32_ISO_HDLC, Crc};
use log::{debug, trace};
use stun::dtls_in_stun::MAX_DTLS_IN_STUN_ACKS;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Progress of carrying the DTLS handshake inside STUN connectivity checks.
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
pub enum DtlsStunPiggybackState {
    /// Enabled locally and offered by the peer, but no check carrying the
    /// attributes has been seen yet.
    #[default]
    Tentative,
    /// The peer's checks carry the attributes.
    Confirmed,
    /// The local handshake finished as DTLS server; the final flight may
    /// still need to reach the client.
    Pending,
    /// The handshake finished for both sides.
    Complete,
    /// Not negotiated, or the peer sent checks without the attributes.
    Off,
}

impl fmt::Display for DtlsStunPiggybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            DtlsStunPiggybackState::Tentative => "tentative",
            DtlsStunPiggybackState::Confirmed => "confirmed",
            DtlsStunPiggybackState::Pending => "pending",
            DtlsStunPiggybackState::Complete => "complete",
            DtlsStunPiggybackState::Off => "off",
        };
        write!(f, "{s}")
    }
}

/// Decides what DTLS data and acks ride on outgoing checks, and what
/// piggybacked data from the peer is handed to the DTLS connection.
#[derive(Debug)]
pub struct DtlsStunPiggybackController {
    state: DtlsStunPiggybackState,
    pending_packet: Option<Vec<u8>>,
    pending_crc: u32,
    received_crcs: VecDeque<u32>,
}

impl DtlsStunPiggybackController {
    pub fn new(enabled: bool) -> Self {
        Self {
            state: if enabled {
                DtlsStunPiggybackState::Tentative
            } else {
                DtlsStunPiggybackState::Off
            },
            pending_packet: None,
            pending_crc: 0,
            received_crcs: VecDeque::new(),
        }
    }

    pub fn state(&self) -> DtlsStunPiggybackState {
        self.state
    }

    /// Whether checks still carry handshake data or acks.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            DtlsStunPiggybackState::Tentative
                | DtlsStunPiggybackState::Confirmed
                | DtlsStunPiggybackState::Pending
        )
    }

    /// Whether the peer took part in piggybacking.
    pub fn is_supported_by_peer(&self) -> bool {
        self.state != DtlsStunPiggybackState::Off
    }

    pub fn disable(&mut self) {
        self.set_state(DtlsStunPiggybackState::Off);
    }

    /// Replaces the flight offered to the peer.
    pub fn set_data_to_piggyback(&mut self, data: Vec<u8>) {
        if !self.is_active() {
            return;
        }
        self.pending_crc = CRC32.checksum(&data);
        trace!(
            "[piggyback] pending {} bytes, crc {:08x}",
            data.len(),
            self.pending_crc
        );
        self.pending_packet = Some(data);
    }

    pub fn data_to_piggyback(&self) -> Option<Vec<u8>> {
        if !self.is_active() {
            return None;
        }
        self.pending_packet.clone()
    }

    /// Acks for the peer. While active the attribute is always sent, empty
    /// when nothing was received, so the peer learns the feature is on.
    pub fn ack_to_piggyback(&self) -> Option<Vec<u32>> {
        if !self.is_active() {
            return None;
        }
        Some(self.received_crcs.iter().copied().collect())
    }

    /// Records the handshake outcome. A client has received the final
    /// flight; a server still has to get its final flight across.
    pub fn set_handshake_complete(&mut self, is_client: bool) {
        if !self.is_active() {
            return;
        }
        if is_client {
            self.pending_packet = None;
            self.set_state(DtlsStunPiggybackState::Complete);
        } else {
            self.set_state(DtlsStunPiggybackState::Pending);
        }
    }

    /// Processes the DTLS-in-STUN attributes of a received check, `None`
    /// meaning the attribute was absent. Returns data not seen before, to
    /// be fed to the DTLS connection.
    pub fn report_data_piggybacked(
        &mut self,
        data: Option<&[u8]>,
        ack: Option<&[u32]>,
    ) -> Option<Vec<u8>> {
        if !self.is_active() {
            return None;
        }

        if data.is_none() && ack.is_none() {
            match self.state {
                DtlsStunPiggybackState::Tentative => {
                    self.set_state(DtlsStunPiggybackState::Off);
                }
                DtlsStunPiggybackState::Confirmed | DtlsStunPiggybackState::Pending => {
                    self.pending_packet = None;
                    self.set_state(DtlsStunPiggybackState::Complete);
                }
                _ => {}
            }
            return None;
        }

        if self.state == DtlsStunPiggybackState::Tentative {
            self.set_state(DtlsStunPiggybackState::Confirmed);
        }

        if let Some(ack) = ack
            && self.pending_packet.is_some()
            && ack.contains(&self.pending_crc)
        {
            trace!("[piggyback] crc {:08x} acked", self.pending_crc);
            self.pending_packet = None;
        }

        let data = data.filter(|d| !d.is_empty())?;
        let crc = CRC32.checksum(data);
        if self.received_crcs.contains(&crc) {
            return None;
        }
        if self.received_crcs.len() == MAX_DTLS_IN_STUN_ACKS {
            self.received_crcs.pop_front();
        }
        self.received_crcs.push_back(crc);
        Some(data.to_vec())
    }

    fn set_state(&mut self, state: DtlsStunPiggybackState) {
        if self.state != state {
            debug!("[piggyback] {} -> {}", self.state, state);
            self.state = state;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_piggyback_disabled() {
        let mut c = DtlsStunPiggybackController::new(false);
        assert_eq!(c.state(), DtlsStunPiggybackState::Off);
        assert!(!c.is_supported_by_peer());

        c.set_data_to_piggyback(vec![1, 2, 3]);
        assert_eq!(c.data_to_piggyback(), None);
        assert_eq!(c.ack_to_piggyback(), None);
        assert_eq!(c.report_data_piggybacked(Some(&[1u8][..]), Some(&[][..])), None);
        assert_eq!(c.state(), DtlsStunPiggybackState::Off);
    }

    #[test]
    fn test_piggyback_peer_without_attributes() {
        let mut c = DtlsStunPiggybackController::new(true);
        assert_eq!(c.ack_to_piggyback(), Some(vec![]));

        assert_eq!(c.report_data_piggybacked(None, None), None);
        assert_eq!(c.state(), DtlsStunPiggybackState::Off);
        assert!(!c.is_supported_by_peer());
        assert_eq!(c.ack_to_piggyback(), None);
    }

    #[test]
    fn test_piggyback_exchange() {
        let mut client = DtlsStunPiggybackController::new(true);
        let mut server = DtlsStunPiggybackController::new(true);

        client.set_data_to_piggyback(b"client hello".to_vec());
        let data = client.data_to_piggyback();
        let ack = client.ack_to_piggyback();
        let fed = server.report_data_piggybacked(data.as_deref(), ack.as_deref());
        assert_eq!(fed.as_deref(), Some(&b"client hello"[..]));
        assert_eq!(server.state(), DtlsStunPiggybackState::Confirmed);

        // the same flight again is not fed twice
        assert_eq!(
            server.report_data_piggybacked(data.as_deref(), ack.as_deref()),
            None
        );

        server.set_data_to_piggyback(b"server hello".to_vec());
        let data = server.data_to_piggyback();
        let ack = server.ack_to_piggyback();
        assert_eq!(ack.as_ref().map(|a| a.len()), Some(1));
        let fed = client.report_data_piggybacked(data.as_deref(), ack.as_deref());
        assert_eq!(fed.as_deref(), Some(&b"server hello"[..]));
        assert_eq!(client.state(), DtlsStunPiggybackState::Confirmed);
        assert_eq!(client.data_to_piggyback(), None, "acked flight is dropped");

        server.set_handshake_complete(false);
        assert_eq!(server.state(), DtlsStunPiggybackState::Pending);
        client.set_handshake_complete(true);
        assert_eq!(client.state(), DtlsStunPiggybackState::Complete);
        assert_eq!(client.ack_to_piggyback(), None);

        // the client stopped sending attributes
        assert_eq!(server.report_data_piggybacked(None, None), None);
        assert_eq!(server.state(), DtlsStunPiggybackState::Complete);
        assert!(server.is_supported_by_peer());
        assert!(client.is_supported_by_peer());
    }

    #[test]
    fn test_piggyback_ack_window() {
        let mut c = DtlsStunPiggybackController::new(true);
        for i in 0..6u8 {
            assert!(c.report_data_piggybacked(Some(&[i][..]), Some(&[][..])).is_some());
        }
        let acks = c.ack_to_piggyback().unwrap_or_default();
        assert_eq!(acks.len(), MAX_DTLS_IN_STUN_ACKS);
        assert_eq!(acks[MAX_DTLS_IN_STUN_ACKS - 1], CRC32.checksum(&[5]));
        assert!(!acks.contains(&CRC32.checksum(&[0])));
    }
}
