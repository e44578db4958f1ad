#[cfg(test)]
mod conn_test;

use crate::alert::*;
use crate::application_data::*;
use crate::config::*;
use crate::content::*;
use crate::curve::named_curve::NamedCurve;
use crate::extension::extension_use_srtp::*;
use crate::flight::*;
use crate::fragment_buffer::*;
use crate::handshake::handshake_cache::*;
use crate::handshake::handshake_header::HandshakeHeader;
use crate::handshake::*;
use crate::handshaker::*;
use crate::record_layer::record_layer_header::*;
use crate::record_layer::*;
use crate::state::*;
use shared::crypto::KeyingMaterialExporter;
use shared::{TaggedBytesMut, error::*, replay_detector::*};

use bytes::BytesMut;
use log::*;
use std::collections::VecDeque;
use std::io::{BufReader, BufWriter};
use std::time::Instant;

pub(crate) const COOKIE_LENGTH: usize = 20;
pub(crate) const DEFAULT_NAMED_CURVE: NamedCurve = NamedCurve::X25519;

/// Events surfaced through `poll_event`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtlsEvent {
    /// Both Finished messages verified; keys can be exported.
    HandshakeComplete,
    /// An alert received from the peer.
    Alert(Alert),
}

/// A sans-IO DTLS 1.2 endpoint. Datagrams go in through `handle_read`,
/// records to send come out of `poll_write`, and the retransmission timer is
/// driven by `poll_timeout`/`handle_timeout`.
pub struct DTLSConn {
    is_client: bool,
    maximum_transmission_unit: usize,
    replay_protection_window: usize,
    replay_detector: Vec<Box<dyn ReplayDetector + Send>>,
    incoming_decrypted_packets: VecDeque<BytesMut>,
    incoming_encrypted_packets: VecDeque<Vec<u8>>,
    fragment_buffer: FragmentBuffer,
    pub(crate) cache: HandshakeCache,
    pub(crate) outgoing_packets: VecDeque<Packet>,
    outgoing_queued_packets: VecDeque<Packet>,
    outgoing_compacted_raw_packets: VecDeque<BytesMut>,
    events: VecDeque<DtlsEvent>,

    pub(crate) state: State,

    handshake_completed: bool,
    closed: bool,

    pub(crate) current_handshake_state: HandshakeState,
    pub(crate) current_retransmit_timer: Option<Instant>,
    pub(crate) retransmit_schedule: RetransmitSchedule,

    pub(crate) current_flight: Flight,
    pub(crate) flights: Option<Vec<Packet>>,
    pub(crate) handshake_config: HandshakeConfig,
    pub(crate) handshake_rx: Option<()>,
}

impl DTLSConn {
    pub fn new(handshake_config: HandshakeConfig, is_client: bool) -> Self {
        let retransmit_schedule = RetransmitSchedule::new(
            handshake_config.initial_retransmit_interval,
            handshake_config.maximum_retransmit_interval,
            handshake_config.maximum_retransmit_number,
        );

        Self {
            is_client,
            maximum_transmission_unit: handshake_config.maximum_transmission_unit,
            replay_protection_window: handshake_config.replay_protection_window,
            replay_detector: vec![],
            incoming_decrypted_packets: VecDeque::new(),
            incoming_encrypted_packets: VecDeque::new(),
            fragment_buffer: FragmentBuffer::new(),
            cache: HandshakeCache::new(),
            outgoing_packets: VecDeque::new(),
            outgoing_queued_packets: VecDeque::new(),
            outgoing_compacted_raw_packets: VecDeque::new(),
            events: VecDeque::new(),

            state: State {
                is_client,
                ..Default::default()
            },

            handshake_completed: false,
            closed: false,

            current_handshake_state: HandshakeState::Preparing,
            current_retransmit_timer: None,
            retransmit_schedule,

            current_flight: Flight::initial(is_client),
            flights: None,
            handshake_config,
            handshake_rx: None,
        }
    }

    /// Starts the handshake: a client sends its first ClientHello, a server
    /// starts waiting for one.
    pub fn start(&mut self, now: Instant) -> Result<()> {
        if self.current_handshake_state != HandshakeState::Preparing
            || self.current_flight != Flight::initial(self.is_client)
        {
            return Err(Error::ErrInvalidFsmTransition);
        }
        self.handshake(now)
    }

    /// connection_state returns basic DTLS details about the connection.
    pub fn connection_state(&self) -> &State {
        &self.state
    }

    /// selected_srtp_protection_profile returns the negotiated SRTP profile,
    /// Unsupported when use_srtp was not negotiated.
    pub fn selected_srtp_protection_profile(&self) -> SrtpProtectionProfile {
        self.state.srtp_protection_profile
    }

    pub fn is_handshake_completed(&self) -> bool {
        self.handshake_completed
    }

    pub(crate) fn set_handshake_completed(&mut self) {
        self.handshake_completed = true;
        self.events.push_back(DtlsEvent::HandshakeComplete);
    }

    /// Queues application data. Data written before the handshake completes
    /// is sent right after it.
    pub fn write(&mut self, p: &[u8]) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnClosed);
        }

        let pkt = Packet::encrypted(RecordLayer::new(
            PROTOCOL_VERSION1_2,
            self.get_local_epoch(),
            Content::ApplicationData(ApplicationData {
                data: BytesMut::from(p),
            }),
        ));

        if self.is_handshake_completed() {
            self.write_packets(vec![pkt]);
        } else {
            self.outgoing_queued_packets.push_back(pkt);
        }

        Ok(())
    }

    pub(crate) fn notify(&mut self, level: AlertLevel, desc: AlertDescription) {
        let should_encrypt = self.is_handshake_completed();
        self.write_packets(vec![Packet {
            record: RecordLayer::new(
                PROTOCOL_VERSION1_2,
                self.get_local_epoch(),
                Content::Alert(Alert::new(level, desc)),
            ),
            should_encrypt,
        }]);
    }

    pub(crate) fn write_packets(&mut self, pkts: Vec<Packet>) {
        for pkt in pkts {
            self.outgoing_packets.push_back(pkt);
        }
    }

    fn outgoing_raw_packet(&mut self) -> Option<BytesMut> {
        if let Err(err) = self.handle_outgoing_packets() {
            warn!(
                "handle_outgoing_packets [{}] with error {}",
                srv_cli_str(self.is_client),
                err
            );
        }
        self.outgoing_compacted_raw_packets.pop_front()
    }

    fn handle_outgoing_packets(&mut self) -> Result<()> {
        if self.is_handshake_completed() {
            while let Some(mut pkt) = self.outgoing_queued_packets.pop_front() {
                pkt.record.record_layer_header.epoch = self.get_local_epoch();
                self.write_packets(vec![pkt]);
            }
        }

        let mut raw_packets = vec![];
        while let Some(p) = self.outgoing_packets.pop_front() {
            if let Content::Handshake(h) = &p.record.content {
                let mut handshake_raw = vec![];
                {
                    let mut writer = BufWriter::<&mut Vec<u8>>::new(handshake_raw.as_mut());
                    p.record.marshal(&mut writer)?;
                }
                debug!(
                    "Send [handshake:{}] -> {} (epoch: {}, seq: {})",
                    srv_cli_str(self.is_client),
                    h.handshake_header.handshake_type,
                    p.record.record_layer_header.epoch,
                    h.handshake_header.message_sequence
                );
                self.cache.push(
                    handshake_raw[RECORD_LAYER_HEADER_SIZE..].to_vec(),
                    p.record.record_layer_header.epoch,
                    h.handshake_header.message_sequence,
                    h.handshake_header.handshake_type,
                    self.is_client,
                );

                let raw_handshake_packets = self.process_handshake_packet(&p, h)?;
                raw_packets.extend(raw_handshake_packets);
            } else {
                let raw_packet = self.process_packet(p)?;
                raw_packets.push(raw_packet);
            }
        }

        if !raw_packets.is_empty() {
            for compacted in compact_raw_packets(&raw_packets, self.maximum_transmission_unit) {
                self.outgoing_compacted_raw_packets.push_back(compacted);
            }
        }

        Ok(())
    }

    fn next_sequence_number(&mut self, epoch: usize) -> Result<u64> {
        while self.state.local_sequence_number.len() <= epoch {
            self.state.local_sequence_number.push(0);
        }

        let seq = self.state.local_sequence_number[epoch];
        if seq > MAX_SEQUENCE_NUMBER {
            // RFC 6347 Section 4.1.0
            // The implementation must either abandon an association or rehandshake
            // prior to allowing the sequence number to wrap.
            return Err(Error::ErrSequenceNumberOverflow);
        }
        self.state.local_sequence_number[epoch] += 1;
        Ok(seq)
    }

    fn process_packet(&mut self, mut p: Packet) -> Result<Vec<u8>> {
        let epoch = p.record.record_layer_header.epoch as usize;
        p.record.record_layer_header.sequence_number = self.next_sequence_number(epoch)?;

        let mut raw_packet = vec![];
        {
            let mut writer = BufWriter::<&mut Vec<u8>>::new(raw_packet.as_mut());
            p.record.marshal(&mut writer)?;
        }

        if p.should_encrypt {
            let Some(cipher_suite) = &self.state.cipher_suite else {
                return Err(Error::ErrInvalidCipherSuite);
            };
            raw_packet = cipher_suite.encrypt(&p.record.record_layer_header, &raw_packet)?;
        }

        Ok(raw_packet)
    }

    fn process_handshake_packet(&mut self, p: &Packet, h: &Handshake) -> Result<Vec<Vec<u8>>> {
        let mut raw_packets = vec![];

        let handshake_fragments = fragment_handshake(self.maximum_transmission_unit, h)?;

        let epoch = p.record.record_layer_header.epoch as usize;
        for handshake_fragment in &handshake_fragments {
            let record_layer_header = RecordLayerHeader {
                protocol_version: p.record.record_layer_header.protocol_version,
                content_type: p.record.record_layer_header.content_type,
                content_len: handshake_fragment.len() as u16,
                epoch: p.record.record_layer_header.epoch,
                sequence_number: self.next_sequence_number(epoch)?,
            };

            let mut raw_packet = vec![];
            {
                let mut writer = BufWriter::<&mut Vec<u8>>::new(raw_packet.as_mut());
                record_layer_header.marshal(&mut writer)?;
            }
            raw_packet.extend_from_slice(handshake_fragment);

            if p.should_encrypt {
                let Some(cipher_suite) = &self.state.cipher_suite else {
                    return Err(Error::ErrInvalidCipherSuite);
                };
                raw_packet = cipher_suite.encrypt(&record_layer_header, &raw_packet)?;
            }

            raw_packets.push(raw_packet);
        }

        Ok(raw_packets)
    }

    /// Feeds one received datagram, which may carry several records.
    pub(crate) fn read(&mut self, buf: &[u8], now: Instant) -> Result<()> {
        if self.closed {
            return Err(Error::ErrConnClosed);
        }

        for pkt in unpack_datagram(buf)? {
            self.handle_incoming(pkt, true)?;
        }

        self.drive_handshake(now)
    }

    /// Runs the handshake until neither a new message nor a queued record
    /// of the next epoch can make progress.
    fn drive_handshake(&mut self, now: Instant) -> Result<()> {
        loop {
            self.handshake(now)?;
            if !self.handle_incoming_queued_packets()? {
                return Ok(());
            }
        }
    }

    /// Replays records that arrived before their epoch keys existed.
    /// Returns true when one of them was a handshake message.
    fn handle_incoming_queued_packets(&mut self) -> Result<bool> {
        let cipher_suite_initialized = self
            .state
            .cipher_suite
            .as_ref()
            .is_some_and(|cs| cs.is_initialized());
        if !cipher_suite_initialized || self.incoming_encrypted_packets.is_empty() {
            return Ok(false);
        }

        let queued: Vec<Vec<u8>> = self.incoming_encrypted_packets.drain(..).collect();
        for p in queued {
            // don't re-enqueue
            self.handle_incoming(p, false)?;
        }

        Ok(self.handshake_rx.is_some())
    }

    fn handle_incoming(&mut self, pkt: Vec<u8>, enqueue: bool) -> Result<()> {
        let (hs, alert, err) = self.handle_incoming_packet(pkt, enqueue);
        if let Some(alert) = alert {
            self.notify(alert.alert_level, alert.alert_description);
            if alert.alert_level == AlertLevel::Fatal
                || alert.alert_description == AlertDescription::CloseNotify
            {
                self.closed = true;
                return Err(err.unwrap_or(Error::ErrAlertFatalOrClose));
            }
        }

        if let Some(err) = err {
            return Err(err);
        }

        if hs {
            self.handshake_rx = Some(());
        }

        Ok(())
    }

    fn handle_incoming_packet(
        &mut self,
        mut pkt: Vec<u8>,
        enqueue: bool,
    ) -> (bool, Option<Alert>, Option<Error>) {
        let mut reader = BufReader::new(pkt.as_slice());
        let h = match RecordLayerHeader::unmarshal(&mut reader) {
            Ok(h) => h,
            Err(err) => {
                // Decode error must be silently discarded
                // [RFC6347 Section-4.1.2.7]
                debug!(
                    "{}: discarded broken packet: {}",
                    srv_cli_str(self.is_client),
                    err
                );
                return (false, None, None);
            }
        };

        // Validate epoch
        let epoch = self.state.remote_epoch;
        if h.epoch > epoch {
            if h.epoch > epoch + 1 {
                debug!(
                    "{}: discarded future packet (epoch: {}, seq: {})",
                    srv_cli_str(self.is_client),
                    h.epoch,
                    h.sequence_number,
                );
                return (false, None, None);
            }
            if enqueue {
                debug!(
                    "{}: received packet of next epoch, queuing packet",
                    srv_cli_str(self.is_client)
                );
                self.incoming_encrypted_packets.push_back(pkt);
            }
            return (false, None, None);
        }

        // Anti-replay protection
        while self.replay_detector.len() <= h.epoch as usize {
            self.replay_detector
                .push(Box::new(SlidingWindowDetector::new(
                    self.replay_protection_window,
                    MAX_SEQUENCE_NUMBER,
                )));
        }

        let ok = self.replay_detector[h.epoch as usize].check(h.sequence_number);
        if !ok {
            debug!(
                "{}: discarded duplicated packet (epoch: {}, seq: {})",
                srv_cli_str(self.is_client),
                h.epoch,
                h.sequence_number,
            );
            return (false, None, None);
        }

        // Decrypt
        if h.epoch != 0 {
            let Some(cipher_suite) = self
                .state
                .cipher_suite
                .as_ref()
                .filter(|cs| cs.is_initialized())
            else {
                if enqueue {
                    debug!(
                        "{}: handshake not finished, queuing packet",
                        srv_cli_str(self.is_client)
                    );
                    self.incoming_encrypted_packets.push_back(pkt);
                }
                return (false, None, None);
            };

            pkt = match cipher_suite.decrypt(&pkt) {
                Ok(pkt) => pkt,
                Err(err) => {
                    debug!("{}: decrypt failed: {}", srv_cli_str(self.is_client), err);
                    return (false, None, None);
                }
            };
        }

        let is_handshake = match self.fragment_buffer.push(&pkt) {
            Ok(is_handshake) => is_handshake,
            Err(err) => {
                // Decode error must be silently discarded
                // [RFC6347 Section-4.1.2.7]
                debug!(
                    "{}: defragment failed: {}",
                    srv_cli_str(self.is_client),
                    err
                );
                return (false, None, None);
            }
        };
        if is_handshake {
            self.replay_detector[h.epoch as usize].accept();
            while let Some((out, epoch)) = self.fragment_buffer.pop() {
                let mut reader = BufReader::new(out.as_slice());
                let raw_handshake = match Handshake::unmarshal(&mut reader) {
                    Ok(rh) => {
                        debug!(
                            "Recv [handshake:{}] -> {} (epoch: {}, seq: {})",
                            srv_cli_str(self.is_client),
                            rh.handshake_header.handshake_type,
                            h.epoch,
                            rh.handshake_header.message_sequence
                        );
                        rh
                    }
                    Err(err) => {
                        debug!(
                            "{}: handshake parse failed: {}",
                            srv_cli_str(self.is_client),
                            err
                        );
                        continue;
                    }
                };

                self.cache.push(
                    out,
                    epoch,
                    raw_handshake.handshake_header.message_sequence,
                    raw_handshake.handshake_header.handshake_type,
                    !self.is_client,
                );
            }

            return (true, None, None);
        }

        let mut reader = BufReader::new(pkt.as_slice());
        let r = match RecordLayer::unmarshal(&mut reader) {
            Ok(r) => r,
            Err(err) => {
                return (
                    false,
                    Some(Alert::fatal(AlertDescription::DecodeError)),
                    Some(err),
                );
            }
        };

        match r.content {
            Content::Alert(a) => {
                debug!("{}: <- {}", srv_cli_str(self.is_client), a);
                self.replay_detector[h.epoch as usize].accept();
                self.events.push_back(DtlsEvent::Alert(a));
                if a.alert_description == AlertDescription::CloseNotify {
                    // Respond with a close_notify [RFC5246 Section 7.2.1]
                    return (
                        false,
                        Some(Alert::new(
                            AlertLevel::Warning,
                            AlertDescription::CloseNotify,
                        )),
                        Some(Error::ErrAlertFatalOrClose),
                    );
                }
                if a.alert_level == AlertLevel::Fatal {
                    self.closed = true;
                    return (false, None, Some(Error::ErrAlertFatalOrClose));
                }
            }
            Content::ChangeCipherSpec(_) => {
                let cipher_suite_initialized = self
                    .state
                    .cipher_suite
                    .as_ref()
                    .is_some_and(|cs| cs.is_initialized());
                if !cipher_suite_initialized {
                    if enqueue {
                        debug!(
                            "{}: CipherSuite not initialized, queuing packet",
                            srv_cli_str(self.is_client)
                        );
                        self.incoming_encrypted_packets.push_back(pkt);
                    }
                    return (false, None, None);
                }

                let new_remote_epoch = h.epoch + 1;
                debug!(
                    "{}: <- ChangeCipherSpec (epoch: {})",
                    srv_cli_str(self.is_client),
                    new_remote_epoch
                );

                if epoch + 1 == new_remote_epoch {
                    self.state.remote_epoch = new_remote_epoch;
                    self.replay_detector[h.epoch as usize].accept();
                }
            }
            Content::ApplicationData(a) => {
                if h.epoch == 0 {
                    warn!(
                        "{}: <- Unexpected ApplicationData Message",
                        srv_cli_str(self.is_client),
                    );
                    return (
                        false,
                        Some(Alert::fatal(AlertDescription::UnexpectedMessage)),
                        Some(Error::ErrApplicationDataEpochZero),
                    );
                }

                self.replay_detector[h.epoch as usize].accept();
                self.incoming_decrypted_packets.push_back(a.data);
            }
            Content::Handshake(_) => {
                warn!(
                    "{}: <- Unexpected Handshake Message",
                    srv_cli_str(self.is_client),
                );
                return (
                    false,
                    Some(Alert::fatal(AlertDescription::UnexpectedMessage)),
                    Some(Error::ErrUnhandledContextType),
                );
            }
        };

        (false, None, None)
    }

    pub(crate) fn set_local_epoch(&mut self, epoch: u16) {
        self.state.local_epoch = epoch;
    }

    pub(crate) fn get_local_epoch(&self) -> u16 {
        self.state.local_epoch
    }
}

impl KeyingMaterialExporter for DTLSConn {
    fn export_keying_material(
        &self,
        label: &str,
        context: &[u8],
        length: usize,
    ) -> Result<Vec<u8>> {
        if !self.is_handshake_completed() {
            return Err(Error::HandshakeInProgress);
        }
        self.state.export_keying_material(label, context, length)
    }
}

impl sansio::Protocol<TaggedBytesMut, BytesMut, ()> for DTLSConn {
    type Rout = BytesMut;
    type Wout = BytesMut;
    type Eout = DtlsEvent;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        self.read(&msg.message, msg.now)
    }

    /// Decrypted application data, available once the handshake completed.
    fn poll_read(&mut self) -> Option<Self::Rout> {
        if !self.is_handshake_completed() {
            return None;
        }
        self.incoming_decrypted_packets.pop_front()
    }

    fn handle_write(&mut self, msg: BytesMut) -> Result<()> {
        self.write(&msg)
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.outgoing_raw_packet()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.events.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        match self.current_retransmit_timer {
            Some(timer) if timer <= now => self.handshake_timeout(now),
            _ => Ok(()),
        }
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        self.current_retransmit_timer
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.current_retransmit_timer = None;
            self.notify(AlertLevel::Warning, AlertDescription::CloseNotify);
        }
        Ok(())
    }
}

fn fragment_handshake(maximum_transmission_unit: usize, h: &Handshake) -> Result<Vec<Vec<u8>>> {
    let mut content = vec![];
    {
        let mut writer = BufWriter::<&mut Vec<u8>>::new(content.as_mut());
        h.handshake_message.marshal(&mut writer)?;
    }

    let mut fragmented_handshakes = vec![];

    let mut content_fragments = split_bytes(&content, maximum_transmission_unit);
    if content_fragments.is_empty() {
        content_fragments = vec![vec![]];
    }

    let mut offset = 0;
    for content_fragment in &content_fragments {
        let content_fragment_len = content_fragment.len();

        let handshake_header_fragment = HandshakeHeader {
            handshake_type: h.handshake_header.handshake_type,
            length: content.len() as u32,
            message_sequence: h.handshake_header.message_sequence,
            fragment_offset: offset as u32,
            fragment_length: content_fragment_len as u32,
        };

        offset += content_fragment_len;

        let mut fragmented_handshake = vec![];
        {
            let mut writer = BufWriter::<&mut Vec<u8>>::new(fragmented_handshake.as_mut());
            handshake_header_fragment.marshal(&mut writer)?;
        }
        fragmented_handshake.extend_from_slice(content_fragment);

        fragmented_handshakes.push(fragmented_handshake);
    }

    Ok(fragmented_handshakes)
}

fn compact_raw_packets(raw_packets: &[Vec<u8>], maximum_transmission_unit: usize) -> Vec<BytesMut> {
    let mut combined_raw_packets = vec![];
    let mut current_combined_raw_packet = BytesMut::new();

    for raw_packet in raw_packets {
        if !current_combined_raw_packet.is_empty()
            && current_combined_raw_packet.len() + raw_packet.len() >= maximum_transmission_unit
        {
            combined_raw_packets.push(current_combined_raw_packet);
            current_combined_raw_packet = BytesMut::new();
        }
        current_combined_raw_packet.extend_from_slice(raw_packet);
    }

    if !current_combined_raw_packet.is_empty() {
        combined_raw_packets.push(current_combined_raw_packet);
    }

    combined_raw_packets
}

fn split_bytes(bytes: &[u8], split_len: usize) -> Vec<Vec<u8>> {
    bytes.chunks(split_len.max(1)).map(|c| c.to_vec()).collect()
}
