//! DTLS transport layered over a packet channel.
//!
//! [`RTCDtlsTransport`] owns the channel its records travel on (an ICE
//! transport or a fixed UDP 4-tuple), demultiplexes every inbound datagram,
//! runs the DTLS handshake and verifies the peer certificate against the
//! fingerprint asserted in the remote description. With an ICE channel the
//! handshake flights can also ride inside STUN connectivity checks, see
//! [`piggyback`].


pub mod channel;
pub mod fingerprint;
pub mod parameters;
pub mod piggyback;
pub mod role;
pub mod state;

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant, SystemTime};

use bytes::BytesMut;
use dtls::DTLSConn;
use dtls::DtlsEvent;
use dtls::alert::{AlertDescription, AlertLevel};
use dtls::config::{ConfigBuilder, ExtendedMasterSecretType};
use dtls::extension::extension_use_srtp::SrtpProtectionProfile;
use ice::channel::PacketChannel;
use ice::transport::{IceTransport, IceTransportEvent};
use log::{debug, error, trace, warn};
use sansio::Protocol;
use sha2::{Digest, Sha256};
use shared::crypto::KeyingMaterialExporter;
use shared::error::{Error, Result};
use shared::util::{match_dtls, match_srtp_or_srtcp, match_stun};
use shared::{TaggedBytesMut, TransportContext};

use crate::peer_connection::certificate::RTCCertificate;
use channel::DtlsChannel;
use parameters::DTLSParameters;
use piggyback::{DtlsStunPiggybackController, DtlsStunPiggybackState};
use role::RTCDtlsRole;
use state::RTCDtlsTransportState;

/// RFC 5764 section 4.2 label for the SRTP master keys.
pub(crate) const SRTP_KEYING_MATERIAL_LABEL: &str = "EXTRACTOR-dtls_srtp";

/// Datagrams kept while the channel is not writable or the connection does
/// not exist yet.
const MAX_BUFFERED_PACKETS: usize = 64;

pub(crate) fn default_srtp_protection_profiles() -> Vec<SrtpProtectionProfile> {
    vec![
        SrtpProtectionProfile::Srtp_Aead_Aes_128_Gcm,
        SrtpProtectionProfile::Srtp_Aead_Aes_256_Gcm,
        SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_80,
        SrtpProtectionProfile::Srtp_Aes128_Cm_Hmac_Sha1_32,
    ]
}

/// Knobs of the DTLS connection and of piggybacking.
#[derive(Default, Clone, Debug)]
pub struct DtlsTransportConfig {
    /// Defaults to every profile the transport knows when empty.
    pub srtp_protection_profiles: Vec<SrtpProtectionProfile>,
    pub initial_retransmit_interval: Option<Duration>,
    pub maximum_retransmit_interval: Option<Duration>,
    pub maximum_retransmit_number: Option<usize>,
    pub mtu: Option<usize>,
    pub replay_protection_window: Option<usize>,
    /// Offer DTLS 1.3 in supported_versions; the handshake stays DTLS 1.2.
    pub enable_dtls13_advertisement: bool,
    /// Carry handshake flights inside STUN checks. Only takes effect on an
    /// ICE channel.
    pub enable_piggyback: bool,
}

/// Events produced by an `RTCDtlsTransport`.
#[derive(Debug, Clone)]
pub enum DtlsTransportEvent {
    StateChange(RTCDtlsTransportState),
    /// An SRTP or SRTCP packet, delivered as received.
    SrtpPacket { packet: BytesMut, decrypted: bool },
    /// A datagram that is neither STUN nor DTLS, received before DTLS is
    /// active.
    RawPacket(BytesMut),
    /// An event of the underlying ICE transport.
    Ice(IceTransportEvent),
}

/// RTCDtlsTransport allows an application access to information about the
/// DTLS transport over which RTP and RTCP packets are sent and received.
pub struct RTCDtlsTransport {
    channel: DtlsChannel,
    config: DtlsTransportConfig,

    state: RTCDtlsTransportState,
    certificate: Option<RTCCertificate>,
    dtls_role: RTCDtlsRole,
    remote_parameters: DTLSParameters,
    fingerprint_verified: bool,

    conn: Option<DTLSConn>,
    piggyback: DtlsStunPiggybackController,

    transport_hint: TransportContext,
    last_now: Option<Instant>,
    early_packets: VecDeque<BytesMut>,
    unsent: VecDeque<BytesMut>,
    reads: VecDeque<BytesMut>,
    events: VecDeque<DtlsTransportEvent>,
}

impl RTCDtlsTransport {
    pub fn new(channel: DtlsChannel, config: DtlsTransportConfig) -> Self {
        let piggyback_enabled = config.enable_piggyback && channel.ice().is_some();
        let unspecified = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);

        let mut t = Self {
            channel,
            config,
            state: RTCDtlsTransportState::New,
            certificate: None,
            dtls_role: RTCDtlsRole::Auto,
            remote_parameters: DTLSParameters::default(),
            fingerprint_verified: false,
            conn: None,
            piggyback: DtlsStunPiggybackController::new(piggyback_enabled),
            transport_hint: TransportContext::udp(unspecified, unspecified),
            last_now: None,
            early_packets: VecDeque::new(),
            unsent: VecDeque::new(),
            reads: VecDeque::new(),
            events: VecDeque::new(),
        };
        t.sync_piggyback();
        t
    }

    pub fn state(&self) -> RTCDtlsTransportState {
        self.state
    }

    pub fn role(&self) -> RTCDtlsRole {
        self.dtls_role
    }

    pub fn channel(&self) -> &DtlsChannel {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut DtlsChannel {
        &mut self.channel
    }

    pub fn ice(&self) -> Option<&IceTransport> {
        self.channel.ice()
    }

    pub fn ice_mut(&mut self) -> Option<&mut IceTransport> {
        self.channel.ice_mut()
    }

    pub fn remote_parameters(&self) -> &DTLSParameters {
        &self.remote_parameters
    }

    pub fn piggyback_state(&self) -> DtlsStunPiggybackState {
        self.piggyback.state()
    }

    /// Whether the peer carried DTLS inside STUN. False when either side
    /// did not enable it.
    pub fn is_dtls_piggyback_supported_by_peer(&self) -> bool {
        self.piggyback.is_supported_by_peer()
    }

    /// Basic DTLS details of the connection, once the handshake started.
    pub fn connection_state(&self) -> Option<&dtls::state::State> {
        self.conn.as_ref().map(|c| c.connection_state())
    }

    /// The SRTP profile selected through use_srtp, once connected.
    pub fn srtp_protection_profile(&self) -> Option<SrtpProtectionProfile> {
        self.conn
            .as_ref()
            .filter(|c| c.is_handshake_completed())
            .map(|c| c.selected_srtp_protection_profile())
            .filter(|p| *p != SrtpProtectionProfile::Unsupported)
    }

    /// Sets the certificate presented to the peer. It cannot change once
    /// the handshake started.
    pub fn set_local_certificate(&mut self, certificate: RTCCertificate) -> Result<()> {
        if certificate.expires().duration_since(SystemTime::now()).is_err() {
            return Err(Error::ErrCertificateExpired);
        }
        if self.conn.is_some() {
            if self.certificate.as_ref() == Some(&certificate) {
                return Ok(());
            }
            return Err(Error::ErrInvalidDTLSStart);
        }
        self.certificate = Some(certificate);
        Ok(())
    }

    /// Sets the local DTLS role. Setting the same role again is a no-op, a
    /// different role once the handshake started is an error.
    pub fn set_dtls_role(&mut self, role: RTCDtlsRole) -> Result<()> {
        self.check_dtls_role(role)?;
        if self.dtls_role == role {
            return Ok(());
        }
        debug!("[dtls] role {}", role);
        self.dtls_role = role;
        Ok(())
    }

    /// Sets what the remote description asserts. Fingerprints may arrive
    /// before or after the handshake; a connected transport is verified
    /// retroactively.
    pub fn set_remote_parameters(&mut self, parameters: DTLSParameters) -> Result<()> {
        self.check_remote_parameters(&parameters)?;
        if parameters == self.remote_parameters {
            trace!("[dtls] remote parameters unchanged");
            return Ok(());
        }

        if parameters.fingerprints != self.remote_parameters.fingerprints {
            self.fingerprint_verified = false;
        }
        self.remote_parameters = parameters;

        if self
            .conn
            .as_ref()
            .is_some_and(|c| c.is_handshake_completed())
        {
            self.verify_and_connect();
        }
        Ok(())
    }

    /// Fails exactly when `set_dtls_role(role)` followed by
    /// `set_remote_parameters(parameters)` would, without changing anything.
    pub fn check_negotiated(&self, role: RTCDtlsRole, parameters: &DTLSParameters) -> Result<()> {
        self.check_dtls_role(role)?;
        self.check_remote_parameters(parameters)
    }

    fn check_dtls_role(&self, role: RTCDtlsRole) -> Result<()> {
        if !role.is_explicit() {
            return Err(Error::ErrInvalidDtlsRole);
        }
        if self.dtls_role != role && self.conn.is_some() {
            return Err(Error::ErrInvalidDTLSStart);
        }
        Ok(())
    }

    fn check_remote_parameters(&self, parameters: &DTLSParameters) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::ErrConnectionClosed);
        }
        for fp in &parameters.fingerprints {
            if !fp.is_supported() {
                return Err(Error::ErrUnsupportedFingerprintAlgorithm);
            }
            fp.digest()?;
        }
        Ok(())
    }

    /// Stops carrying DTLS inside STUN, e.g. when the peer did not offer it.
    pub fn disable_piggyback(&mut self) {
        self.piggyback.disable();
        self.sync_piggyback();
    }

    /// Derives the SRTP master keys and salts of both directions, laid out
    /// as client key, server key, client salt, server salt.
    pub fn export_srtp_keying_material(&self) -> Result<Vec<u8>> {
        if self.state != RTCDtlsTransportState::Connected {
            return Err(Error::ErrDtlsTransportNotStarted);
        }
        let conn = self.conn.as_ref().ok_or(Error::ErrDtlsTransportNotStarted)?;

        let profile = conn.selected_srtp_protection_profile();
        if profile == SrtpProtectionProfile::Unsupported {
            return Err(Error::ErrNoSRTPProtectionProfile);
        }

        let len = 2 * (profile.key_len() + profile.salt_len());
        conn.export_keying_material(SRTP_KEYING_MATERIAL_LABEL, &[], len)
            .map_err(|err| {
                warn!("[dtls] keying material export failed: {err}");
                Error::ErrDtlsKeyExtractionFailed
            })
    }

    /// Sends close_notify, closes the channel and cancels every timer.
    pub fn stop(&mut self) -> Result<()> {
        let mut errs = vec![];
        if let Some(conn) = &mut self.conn {
            if let Err(err) = conn.close() {
                errs.push(err);
            }
        }
        if let Some(now) = self.last_now {
            self.flush(now);
        }
        self.conn = None;
        self.early_packets.clear();
        self.unsent.clear();

        match &mut self.channel {
            DtlsChannel::Ice(ice) => {
                if let Err(err) = ice.close() {
                    errs.push(err);
                }
            }
            DtlsChannel::Raw(raw) => raw.close(),
        }
        self.drain_channel_events();
        self.set_state(RTCDtlsTransportState::Closed);

        shared::error::flatten_errs(errs)
    }

    fn ready_to_start(&self) -> bool {
        self.state == RTCDtlsTransportState::New
            && self.conn.is_none()
            && self.certificate.is_some()
            && self.dtls_role.is_explicit()
            && (self.channel.writable() || self.piggyback.is_active())
    }

    fn maybe_start(&mut self, now: Instant) {
        if !self.ready_to_start() {
            return;
        }
        if let Err(err) = self.start(now) {
            error!("[dtls] failed to start handshake: {err}");
            self.fail();
        }
    }

    fn start(&mut self, now: Instant) -> Result<()> {
        let certificate = self
            .certificate
            .as_ref()
            .ok_or(Error::ErrNonCertificate)?
            .dtls_certificate
            .clone();

        let profiles = if self.config.srtp_protection_profiles.is_empty() {
            default_srtp_protection_profiles()
        } else {
            self.config.srtp_protection_profiles.clone()
        };
        let mut builder = ConfigBuilder::default()
            .with_certificates(vec![certificate])
            .with_srtp_protection_profiles(profiles)
            .with_extended_master_secret(ExtendedMasterSecretType::Require)
            .with_dtls13_advertisement(self.config.enable_dtls13_advertisement);
        if let Some(interval) = self.config.initial_retransmit_interval {
            builder = builder.with_initial_retransmit_interval(interval);
        }
        if let Some(interval) = self.config.maximum_retransmit_interval {
            builder = builder.with_maximum_retransmit_interval(interval);
        }
        if let Some(n) = self.config.maximum_retransmit_number {
            builder = builder.with_maximum_retransmit_number(n);
        }
        if let Some(mtu) = self.config.mtu {
            builder = builder.with_mtu(mtu);
        }
        if let Some(window) = self.config.replay_protection_window {
            builder = builder.with_replay_protection_window(window);
        }

        let is_client = self.dtls_role == RTCDtlsRole::Client;
        debug!(
            "[dtls] starting handshake as {}, piggyback {}",
            self.dtls_role,
            self.piggyback.state()
        );
        let mut conn = DTLSConn::new(builder.build()?, is_client);
        conn.start(now)?;
        self.conn = Some(conn);
        self.set_state(RTCDtlsTransportState::Connecting);

        let early: Vec<BytesMut> = self.early_packets.drain(..).collect();
        for packet in early {
            self.feed_conn(now, packet);
        }
        self.flush(now);
        self.process_conn_events();
        Ok(())
    }

    /// Hands one datagram to the DTLS connection, or keeps it until the
    /// connection exists.
    fn feed_conn(&mut self, now: Instant, packet: BytesMut) {
        if self.state.is_terminal() {
            return;
        }
        let Some(conn) = &mut self.conn else {
            if self.early_packets.len() == MAX_BUFFERED_PACKETS {
                self.early_packets.pop_front();
            }
            self.early_packets.push_back(packet);
            return;
        };

        let result = conn.handle_read(TaggedBytesMut {
            now,
            transport: self.transport_hint,
            message: packet,
        });
        self.flush(now);
        self.process_conn_events();
        if let Err(err) = result {
            self.handle_conn_error(err);
        }
        self.drain_conn_reads();
    }

    fn drain_conn_reads(&mut self) {
        if let Some(conn) = &mut self.conn {
            while let Some(data) = conn.poll_read() {
                self.reads.push_back(data);
            }
        }
    }

    /// Moves datagrams produced by the connection to the channel, and into
    /// the next checks while the handshake is piggybacked.
    fn flush(&mut self, now: Instant) {
        let Some(conn) = &mut self.conn else {
            return;
        };
        let mut batch = vec![];
        while let Some(packet) = conn.poll_write() {
            batch.push(packet);
        }
        if batch.is_empty() {
            return;
        }

        let piggybacking =
            self.state == RTCDtlsTransportState::Connecting && self.piggyback.is_active();
        if piggybacking {
            let flight: Vec<u8> = batch.iter().flat_map(|p| p.iter().copied()).collect();
            self.piggyback.set_data_to_piggyback(flight);
            self.sync_piggyback();
        }

        if self.channel.writable() {
            for packet in batch {
                if let Err(err) = self.channel.send(now, &packet) {
                    warn!("[dtls] failed to send {} bytes: {err}", packet.len());
                }
            }
        } else {
            if piggybacking {
                // a later flight supersedes the buffered one
                self.unsent.clear();
            }
            for packet in batch {
                if self.unsent.len() == MAX_BUFFERED_PACKETS {
                    self.unsent.pop_front();
                }
                self.unsent.push_back(packet);
            }
        }
    }

    fn flush_unsent(&mut self, now: Instant) {
        while self.channel.writable() {
            let Some(packet) = self.unsent.pop_front() else {
                break;
            };
            if let Err(err) = self.channel.send(now, &packet) {
                warn!("[dtls] failed to send buffered packet: {err}");
            }
        }
    }

    fn process_conn_events(&mut self) {
        let mut conn_events = vec![];
        if let Some(conn) = &mut self.conn {
            while let Some(ev) = conn.poll_event() {
                conn_events.push(ev);
            }
        }

        for ev in conn_events {
            match ev {
                DtlsEvent::HandshakeComplete => {
                    let is_client = self.dtls_role == RTCDtlsRole::Client;
                    self.piggyback.set_handshake_complete(is_client);
                    self.sync_piggyback();
                    self.verify_and_connect();
                }
                DtlsEvent::Alert(alert) => {
                    debug!("[dtls] received alert {alert}");
                    if alert.alert_description == AlertDescription::CloseNotify {
                        self.conn = None;
                        self.set_state(RTCDtlsTransportState::Closed);
                    } else if alert.alert_level == AlertLevel::Fatal {
                        self.fail();
                    }
                }
            }
        }
    }

    fn handle_conn_error(&mut self, err: Error) {
        if self.state.is_terminal() {
            return;
        }
        let completed = self
            .conn
            .as_ref()
            .is_some_and(|c| c.is_handshake_completed());
        if completed {
            warn!("[dtls] dropped record: {err}");
        } else {
            error!("[dtls] handshake failed: {err}");
            self.fail();
        }
    }

    /// Checks the peer certificate once both it and the asserted fingerprint
    /// exist. Without a fingerprint the transport connects and verification
    /// waits for `set_remote_parameters`.
    fn verify_and_connect(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if self.fingerprint_verified {
            self.set_state(RTCDtlsTransportState::Connected);
            return;
        }
        if self.remote_parameters.fingerprints.is_empty() {
            debug!("[dtls] connected, remote fingerprint not known yet");
            self.set_state(RTCDtlsTransportState::Connected);
            return;
        }

        match self.verify_peer_certificate() {
            Ok(()) => {
                self.fingerprint_verified = true;
                self.set_state(RTCDtlsTransportState::Connected);
            }
            Err(err) => {
                error!("[dtls] peer certificate rejected: {err}");
                self.fail();
            }
        }
    }

    fn verify_peer_certificate(&self) -> Result<()> {
        let conn = self.conn.as_ref().ok_or(Error::ErrDtlsTransportNotStarted)?;
        let certs = conn.connection_state().peer_certificates();
        let Some(leaf) = certs.first() else {
            return Err(Error::ErrNoRemoteCertificate);
        };
        let computed = Sha256::digest(leaf);

        for fp in &self.remote_parameters.fingerprints {
            if !fp.is_supported() {
                return Err(Error::ErrUnsupportedFingerprintAlgorithm);
            }
            if fp.digest()?.as_slice() == computed.as_slice() {
                return Ok(());
            }
        }

        Err(Error::ErrNoMatchingCertificateFingerprint)
    }

    fn fail(&mut self) {
        self.conn = None;
        self.early_packets.clear();
        self.unsent.clear();
        if self.piggyback.is_active() {
            self.piggyback.disable();
            self.sync_piggyback();
        }
        self.set_state(RTCDtlsTransportState::Failed);
    }

    fn set_state(&mut self, state: RTCDtlsTransportState) {
        if self.state == state || self.state.is_terminal() {
            return;
        }
        debug!("[dtls] state {} -> {}", self.state, state);
        self.state = state;
        self.events.push_back(DtlsTransportEvent::StateChange(state));
    }

    fn sync_piggyback(&mut self) {
        let data = self.piggyback.data_to_piggyback();
        let ack = self.piggyback.ack_to_piggyback();
        let reporting = self.piggyback.is_active();
        if let Some(ice) = self.channel.ice_mut() {
            ice.set_piggyback_reporting(reporting);
            ice.set_piggyback_payload(data, ack);
        }
    }

    /// Sorts a datagram that made it past the channel by its first byte.
    fn demux(&mut self, now: Instant, packet: BytesMut) {
        if match_dtls(&packet) {
            self.feed_conn(now, packet);
        } else if match_srtp_or_srtcp(&packet) {
            self.events.push_back(DtlsTransportEvent::SrtpPacket {
                packet,
                decrypted: false,
            });
        } else if self.state != RTCDtlsTransportState::Connected {
            self.events.push_back(DtlsTransportEvent::RawPacket(packet));
        } else {
            trace!("[dtls] dropped unknown {} byte datagram", packet.len());
        }
    }

    /// Processes what the ICE transport produced: application datagrams,
    /// piggybacked flights and writability.
    fn drain_channel(&mut self, now: Instant) {
        let mut packets = vec![];
        if let Some(ice) = self.channel.ice_mut() {
            while let Some(msg) = ice.poll_read() {
                packets.push(msg.message);
            }
        }
        for packet in packets {
            self.demux(now, packet);
        }

        for ev in self.drain_channel_events() {
            match ev {
                IceTransportEvent::PiggybackReceived { data, ack } => {
                    let fed = self
                        .piggyback
                        .report_data_piggybacked(data.as_deref(), ack.as_deref());
                    self.sync_piggyback();
                    if let Some(flight) = fed {
                        trace!("[dtls] {} bytes piggybacked by peer", flight.len());
                        self.maybe_start(now);
                        self.feed_conn(now, BytesMut::from(&flight[..]));
                    }
                }
                IceTransportEvent::WritableChange(writable) => {
                    if writable {
                        self.flush_unsent(now);
                        self.maybe_start(now);
                    }
                    self.events
                        .push_back(DtlsTransportEvent::Ice(IceTransportEvent::WritableChange(
                            writable,
                        )));
                }
                ev => self.events.push_back(DtlsTransportEvent::Ice(ev)),
            }
        }
    }

    fn drain_channel_events(&mut self) -> Vec<IceTransportEvent> {
        let mut evs = vec![];
        if let Some(ice) = self.channel.ice_mut() {
            while let Some(ev) = ice.poll_event() {
                evs.push(ev);
            }
        }
        evs
    }
}

impl Protocol<TaggedBytesMut, BytesMut, ()> for RTCDtlsTransport {
    type Rout = BytesMut;
    type Wout = TaggedBytesMut;
    type Eout = DtlsTransportEvent;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if self.state == RTCDtlsTransportState::Closed {
            trace!("[dtls] dropped {} bytes after close", msg.message.len());
            return Ok(());
        }
        let now = msg.now;
        self.last_now = Some(now);
        self.transport_hint = msg.transport;
        if msg.message.is_empty() {
            return Ok(());
        }

        match &mut self.channel {
            DtlsChannel::Ice(ice) => {
                let result = ice.handle_read(msg);
                self.drain_channel(now);
                result?;
            }
            DtlsChannel::Raw(raw) => {
                if match_stun(&msg.message) {
                    trace!("[dtls] dropped STUN on raw channel");
                } else if msg.transport.peer_addr == raw.transport().peer_addr {
                    self.demux(now, msg.message);
                } else {
                    warn!(
                        "[dtls] dropped datagram from unknown peer {}",
                        msg.transport.peer_addr
                    );
                }
            }
        }
        self.maybe_start(now);
        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.reads.pop_front()
    }

    /// Queues application data; it is sent once the handshake completed.
    fn handle_write(&mut self, msg: BytesMut) -> Result<()> {
        if self.state == RTCDtlsTransportState::Closed {
            return Err(Error::ErrConnectionClosed);
        }
        let Some(conn) = &mut self.conn else {
            return Err(Error::ErrDtlsTransportNotStarted);
        };
        conn.write(&msg)?;
        if let Some(now) = self.last_now {
            self.flush(now);
        }
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.channel.poll_transmit()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.events.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        if self.state == RTCDtlsTransportState::Closed {
            return Ok(());
        }
        self.last_now = Some(now);

        if let Some(ice) = self.channel.ice_mut() {
            let result = ice.handle_timeout(now);
            self.drain_channel(now);
            result?;
        }
        self.maybe_start(now);

        if let Some(conn) = &mut self.conn {
            let result = conn.handle_timeout(now);
            self.flush(now);
            self.process_conn_events();
            if let Err(err) = result {
                self.handle_conn_error(err);
            }
        }
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        let mut next = self.channel.ice_mut().and_then(|ice| ice.poll_timeout());
        if let Some(conn) = &mut self.conn
            && let Some(t) = conn.poll_timeout()
        {
            next = Some(next.map_or(t, |n| n.min(t)));
        }
        if self.ready_to_start()
            && let Some(now) = self.last_now
        {
            next = Some(next.map_or(now, |n| n.min(now)));
        }
        next
    }

    fn close(&mut self) -> Result<()> {
        self.stop()
    }
}
