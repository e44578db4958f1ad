//! The offer/answer driver tying the SDP engine to the transports.

pub mod certificate;
pub mod configuration;
pub mod event;
pub mod sdp;
pub mod state;
pub mod transport;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ::sdp::SessionDescription;
use ::sdp::direction::Direction;
use bytes::BytesMut;
use ice::attributes::control::IceRole;
use ice::gatherer::{Gatherer, GathererConfig};
use ice::resolver::ThreadResolverFactory;
use ice::state::{ConnectionState, GatheringState};
use ice::transport::{IceTransport, IceTransportConfig, IceTransportEvent};
use log::{debug, info, trace, warn};
use sansio::Protocol;
use shared::TaggedBytesMut;
use shared::error::{Error, Result};
use shared::util::math_rand_alpha_number;

use certificate::RTCCertificate;
use configuration::RTCConfiguration;
use configuration::media_engine::MediaKind;
use event::RTCPeerConnectionEvent;
use self::sdp::negotiation::{
    LocalMediaSection, LocalTransportParameters, MediaSource, produce_answer, produce_offer,
};
use self::sdp::validation::{DescriptionSource, ValidationReport, validate_session_description};
use self::sdp::{
    RTCSdpType, RTCSessionDescription, SdpSessionContext, extract_dtls_parameters,
    extract_ice_details, offers_dtls_piggyback,
};
use state::RTCSignalingState;
use state::signaling_state::{StateChangeOp, next_signaling_state};
use transport::dtls::channel::DtlsChannel;
use transport::dtls::piggyback::DtlsStunPiggybackState;
use transport::dtls::role::{DEFAULT_DTLS_ROLE_OFFER, RTCDtlsRole, derive_role};
use transport::dtls::{DtlsTransportEvent, RTCDtlsTransport};
use transport::ice::RTCIceCandidateInit;

/// How often pending host name lookups are polled while gathering.
const RESOLVER_POLL_INTERVAL: Duration = Duration::from_millis(50);

const CNAME_LEN: usize = 16;

/// PeerConnection negotiates sessions with one remote peer and drives the
/// ICE and DTLS transports that carry them.
///
/// Candidate gathering starts on the first `handle_timeout` after a local
/// description was applied, and connectivity checks once both descriptions
/// are known.
pub struct RTCPeerConnection {
    configuration: RTCConfiguration,
    certificate: RTCCertificate,
    dtls_transport: RTCDtlsTransport,

    session: SdpSessionContext,
    cname: String,
    stream_id: String,
    local_sections: Vec<LocalMediaSection>,

    signaling_state: RTCSignalingState,
    current_local_description: Option<RTCSessionDescription>,
    pending_local_description: Option<RTCSessionDescription>,
    current_remote_description: Option<RTCSessionDescription>,
    pending_remote_description: Option<RTCSessionDescription>,
    last_offer: String,
    last_answer: String,
    last_validation: Option<ValidationReport>,

    remote_ice_credentials: Option<(String, String)>,
    gather_pending: bool,
    checks_pending: bool,

    last_now: Option<Instant>,
    events: VecDeque<RTCPeerConnectionEvent>,
}

impl RTCPeerConnection {
    /// Creates a PeerConnection with one gatherer per configured local
    /// address.
    pub fn new(configuration: RTCConfiguration) -> Result<Self> {
        let setting_engine = configuration.setting_engine();
        let certificate = match configuration.certificates().first() {
            Some(certificate) => certificate.clone(),
            None => RTCCertificate::generate()?,
        };

        let mut ice = IceTransport::new(IceTransportConfig {
            role: IceRole::Controlled,
            local_ufrag: setting_engine.candidates.username_fragment.clone(),
            local_pwd: setting_engine.candidates.password.clone(),
            check_interval: setting_engine.timeout.ice_check_interval,
            keepalive_interval: setting_engine.timeout.ice_keepalive_interval,
            multicast_dns_mode: setting_engine.candidates.multicast_dns_mode,
            ..Default::default()
        })?;

        let stun_servers = configuration.get_stun_servers();
        for local_addr in configuration.local_addrs() {
            let gatherer = Gatherer::new(GathererConfig {
                local_addr: *local_addr,
                stun_servers: stun_servers.clone(),
                keepalive_delay: setting_engine.timeout.stun_keepalive_delay,
                network_adapter_type: setting_engine.candidates.network_adapter_type,
                multicast_dns_mode: setting_engine.candidates.multicast_dns_mode,
                ..Default::default()
            })?;
            let gatherer = match &setting_engine.resolver_factory {
                Some(factory) => gatherer.with_resolver_factory(Box::new(factory.clone())),
                None => gatherer.with_resolver_factory(Box::new(ThreadResolverFactory)),
            };
            ice.add_gatherer(gatherer);
        }

        let mut dtls_transport = RTCDtlsTransport::new(
            DtlsChannel::Ice(Box::new(ice)),
            setting_engine.dtls_transport_config(),
        );
        dtls_transport.set_local_certificate(certificate.clone())?;

        Ok(Self {
            configuration,
            certificate,
            dtls_transport,
            session: SdpSessionContext::new(),
            cname: math_rand_alpha_number(CNAME_LEN),
            stream_id: math_rand_alpha_number(CNAME_LEN),
            local_sections: vec![],
            signaling_state: RTCSignalingState::Stable,
            current_local_description: None,
            pending_local_description: None,
            current_remote_description: None,
            pending_remote_description: None,
            last_offer: String::new(),
            last_answer: String::new(),
            last_validation: None,
            remote_ice_credentials: None,
            gather_pending: false,
            checks_pending: false,
            last_now: None,
            events: VecDeque::new(),
        })
    }

    /// Adds a section to the next offer and returns its mid. Sending audio
    /// and video sections get a fresh SSRC.
    pub fn add_media_section(&mut self, kind: MediaKind, direction: Direction) -> Result<String> {
        self.ensure_open()?;
        if kind == MediaKind::Application
            && self
                .local_sections
                .iter()
                .any(|s| s.kind == MediaKind::Application)
        {
            return Err(Error::ErrInvalidParameter(
                "only one application section is negotiated".to_owned(),
            ));
        }

        let taken: Vec<&str> = self.local_sections.iter().map(|s| s.mid.as_str()).collect();
        let mid = self.session.next_mid(&taken);

        let sending = matches!(direction, Direction::Sendrecv | Direction::Sendonly);
        let source = (kind != MediaKind::Application && sending).then(|| MediaSource {
            ssrc: self.unused_ssrc(),
            cname: self.cname.clone(),
            stream_id: self.stream_id.clone(),
            track_id: format!("{kind}-{mid}"),
        });

        debug!("[peer_connection] added {kind} section {mid}");
        self.local_sections.push(LocalMediaSection {
            mid: mid.clone(),
            kind,
            direction,
            source,
        });
        Ok(mid)
    }

    fn unused_ssrc(&self) -> u32 {
        loop {
            let ssrc = rand::random::<u32>();
            let used = self
                .local_sections
                .iter()
                .filter_map(|s| s.source.as_ref())
                .any(|s| s.ssrc == ssrc);
            if ssrc != 0 && !used {
                return ssrc;
            }
        }
    }

    /// Creates an offer covering every local section. Without any, an
    /// application section is added when data channels are supported.
    pub fn create_offer(&mut self) -> Result<RTCSessionDescription> {
        self.ensure_open()?;
        if self.local_sections.is_empty() && self.configuration.media_engine().supports_data_channels()
        {
            self.add_media_section(MediaKind::Application, Direction::Sendrecv)?;
        }

        let stable = self.signaling_state == RTCSignalingState::Stable;
        let ice = self.ice_mut()?;
        if stable && ice.connection_state() == ConnectionState::New {
            ice.set_role(IceRole::Controlling);
        }

        let transport = self.local_transport_parameters(DEFAULT_DTLS_ROLE_OFFER)?;
        let parsed = produce_offer(
            &self.local_sections,
            self.configuration.media_engine(),
            &transport,
        )?;
        let offer = RTCSessionDescription::from_parsed(RTCSdpType::Offer, parsed);
        self.last_offer.clone_from(&offer.sdp);
        Ok(offer)
    }

    /// Creates an answer to the pending remote offer.
    pub fn create_answer(&mut self) -> Result<RTCSessionDescription> {
        self.ensure_open()?;
        let offer = match (&self.pending_remote_description, self.signaling_state) {
            (None, _) => return Err(Error::ErrNoRemoteDescription),
            (
                Some(offer),
                RTCSignalingState::HaveRemoteOffer | RTCSignalingState::HaveLocalPranswer,
            ) => parsed_description(offer)?,
            _ => return Err(Error::ErrIncorrectSignalingState),
        };

        let transport = self.local_transport_parameters(self.dtls_transport.role())?;
        let parsed = produce_answer(&offer, self.configuration.media_engine(), &transport)?;
        let answer = RTCSessionDescription::from_parsed(RTCSdpType::Answer, parsed);
        self.last_answer.clone_from(&answer.sdp);
        Ok(answer)
    }

    fn local_transport_parameters(
        &self,
        dtls_role: RTCDtlsRole,
    ) -> Result<LocalTransportParameters> {
        let ice = self.ice()?;
        let (ice_ufrag, ice_pwd) = ice.local_credentials();
        Ok(LocalTransportParameters {
            ice_ufrag: ice_ufrag.to_owned(),
            ice_pwd: ice_pwd.to_owned(),
            fingerprints: self.certificate.get_fingerprints(),
            dtls_role,
            candidates: ice.local_candidates().iter().map(|c| c.marshal()).collect(),
            dtls_piggyback: self.configuration.setting_engine().enable_dtls_piggyback
                && self.dtls_transport.piggyback_state() != DtlsStunPiggybackState::Off,
        })
    }

    /// Applies a local description. An empty description of type offer or
    /// answer stands for the last one created.
    ///
    /// Hand-edited descriptions are accepted as long as they stay
    /// consistent; reusing an SSRC fails with `ErrDuplicateLocalSsrc`.
    pub fn set_local_description(&mut self, mut description: RTCSessionDescription) -> Result<()> {
        self.ensure_open()?;

        if description.sdp.is_empty() {
            match description.sdp_type {
                RTCSdpType::Answer | RTCSdpType::Pranswer => {
                    description.sdp.clone_from(&self.last_answer);
                }
                RTCSdpType::Offer => description.sdp.clone_from(&self.last_offer),
                RTCSdpType::Rollback => {}
                RTCSdpType::Unspecified => return Err(Error::ErrPeerConnSDPTypeInvalidValue),
            }
        }
        if description.sdp_type == RTCSdpType::Rollback {
            return self.set_description(&description, StateChangeOp::SetLocal);
        }

        let parsed = description.unmarshal()?;
        validate_session_description(
            &parsed,
            DescriptionSource::Local,
            self.configuration.setting_engine().bundle_payload_type_policy,
        )?;
        if description.sdp != self.last_offer && description.sdp != self.last_answer {
            debug!("[peer_connection] applying a modified local {}", description.sdp_type);
        }
        let mids: Vec<String> = parsed
            .media_descriptions
            .iter()
            .filter_map(|m| m.mid().map(str::to_owned))
            .collect();
        description.parsed = Some(parsed);
        self.set_description(&description, StateChangeOp::SetLocal)?;
        for mid in &mids {
            self.session.observe_mid(mid);
        }

        if description.sdp_type == RTCSdpType::Answer
            && let Some(parsed) = &description.parsed
        {
            self.adopt_answered_sections(parsed);
        }
        if matches!(
            description.sdp_type,
            RTCSdpType::Answer | RTCSdpType::Pranswer
        ) && self.remote_ice_credentials.is_some()
        {
            self.checks_pending = true;
        }
        if !self.configuration.local_addrs().is_empty()
            && self.ice()?.gathering_state() == GatheringState::New
        {
            self.gather_pending = true;
        }
        Ok(())
    }

    /// Remembers the sections of an applied answer so later offers of this
    /// side carry them too.
    fn adopt_answered_sections(&mut self, answer: &SessionDescription) {
        for m in &answer.media_descriptions {
            if m.is_rejected() {
                continue;
            }
            let (Some(mid), Some(kind)) = (m.mid(), MediaKind::from_media(&m.media_name.media))
            else {
                continue;
            };
            if self.local_sections.iter().any(|s| s.mid == mid) {
                continue;
            }
            self.local_sections.push(LocalMediaSection {
                mid: mid.to_owned(),
                kind,
                direction: m.direction(),
                source: None,
            });
        }
    }

    /// Applies a remote description. Sections without a mid get one from
    /// the session counter before the description is validated.
    ///
    /// Nothing changes unless the whole description is accepted.
    pub fn set_remote_description(&mut self, mut description: RTCSessionDescription) -> Result<()> {
        self.ensure_open()?;
        if description.sdp_type == RTCSdpType::Rollback {
            return self.set_description(&description, StateChangeOp::SetRemote);
        }
        next_signaling_state(
            self.signaling_state,
            StateChangeOp::SetRemote,
            description.sdp_type,
        )?;

        let mut parsed = description.unmarshal()?;
        let mut session = self.session.clone();
        if session.backfill_mids(&mut parsed) > 0 {
            description = RTCSessionDescription::from_parsed(description.sdp_type, parsed.clone());
        }
        for m in &parsed.media_descriptions {
            if let Some(mid) = m.mid() {
                session.observe_mid(mid);
            }
        }

        let report = validate_session_description(
            &parsed,
            DescriptionSource::Remote,
            self.configuration.setting_engine().bundle_payload_type_policy,
        )?;
        let (remote_ufrag, remote_pwd, candidates) = extract_ice_details(&parsed)?;
        let dtls_parameters = extract_dtls_parameters(&parsed)?;
        let remote_piggyback = offers_dtls_piggyback(&parsed);

        let is_offer = description.sdp_type == RTCSdpType::Offer;
        let ice = self.ice()?;
        let ice_role = if is_offer && ice.connection_state() == ConnectionState::New {
            IceRole::Controlled
        } else {
            ice.role()
        };

        // a role negotiated before survives renegotiations that leave it open
        let current_role = self.dtls_transport.role();
        let role = if current_role.is_explicit() && !dtls_parameters.role.is_explicit() {
            current_role
        } else {
            derive_role(
                dtls_parameters.role,
                self.configuration.setting_engine().answering_dtls_role,
                ice_role,
            )
        };
        self.dtls_transport.check_negotiated(role, &dtls_parameters)?;

        description.parsed = Some(parsed);
        self.set_description(&description, StateChangeOp::SetRemote)?;
        self.session = session;
        self.last_validation = Some(report);

        if !remote_piggyback {
            self.dtls_transport.disable_piggyback();
        }
        let ice = self.ice_mut()?;
        if ice.role() != ice_role {
            ice.set_role(ice_role);
        }
        self.dtls_transport.set_dtls_role(role)?;
        self.dtls_transport.set_remote_parameters(dtls_parameters)?;

        let ice = self.ice_mut()?;
        ice.set_remote_credentials(remote_ufrag.clone(), remote_pwd.clone())?;
        for c in candidates {
            if let Err(err) = ice.add_remote_candidate(c) {
                warn!("[peer_connection] skipped remote candidate: {err}");
            }
        }
        self.remote_ice_credentials = Some((remote_ufrag, remote_pwd));

        if matches!(
            description.sdp_type,
            RTCSdpType::Answer | RTCSdpType::Pranswer
        ) {
            self.checks_pending = true;
        }
        Ok(())
    }

    fn set_description(&mut self, desc: &RTCSessionDescription, op: StateChangeOp) -> Result<()> {
        let cur = self.signaling_state;
        let next = next_signaling_state(cur, op, desc.sdp_type)?;

        match (op, desc.sdp_type) {
            (StateChangeOp::SetLocal, RTCSdpType::Offer | RTCSdpType::Pranswer) => {
                self.pending_local_description = Some(desc.clone());
            }
            (StateChangeOp::SetRemote, RTCSdpType::Offer | RTCSdpType::Pranswer) => {
                self.pending_remote_description = Some(desc.clone());
            }
            (StateChangeOp::SetLocal, RTCSdpType::Answer) => {
                self.current_remote_description = self.pending_remote_description.take();
                self.pending_local_description = None;
                self.current_local_description = Some(desc.clone());
            }
            (StateChangeOp::SetRemote, RTCSdpType::Answer) => {
                self.current_local_description = self.pending_local_description.take();
                self.pending_remote_description = None;
                self.current_remote_description = Some(desc.clone());
            }
            (_, RTCSdpType::Rollback) => {
                self.pending_local_description = None;
                self.pending_remote_description = None;
            }
            (_, RTCSdpType::Unspecified) => return Err(Error::ErrPeerConnSDPTypeInvalidValue),
        }

        if next != cur {
            info!("[peer_connection] signaling state changed: {cur} -> {next}");
            self.signaling_state = next;
            self.events
                .push_back(RTCPeerConnectionEvent::OnSignalingStateChangeEvent(next));
        }
        Ok(())
    }

    /// Adds a candidate trickled by the peer. An empty candidate marks the
    /// end of the peer's candidates.
    pub fn add_ice_candidate(&mut self, candidate: RTCIceCandidateInit) -> Result<()> {
        self.ensure_open()?;
        if self.remote_description().is_none() {
            return Err(Error::ErrNoRemoteDescription);
        }
        if candidate.is_end_of_candidates() {
            debug!("[peer_connection] remote end of candidates");
            return Ok(());
        }
        if let (Some(ufrag), Some((remote_ufrag, _))) =
            (&candidate.username_fragment, &self.remote_ice_credentials)
            && ufrag != remote_ufrag
        {
            warn!("[peer_connection] dropped candidate of ufrag {ufrag}");
            return Ok(());
        }

        let c = candidate.to_candidate()?;
        self.ice_mut()?.add_remote_candidate(c)
    }

    /// Local candidates gathered so far, ready to be signaled.
    pub fn local_candidates(&self) -> Vec<RTCIceCandidateInit> {
        let Ok(ice) = self.ice() else {
            return vec![];
        };
        let (ufrag, _) = ice.local_credentials();
        let mid = self.first_local_mid();
        ice.local_candidates()
            .iter()
            .map(|c| RTCIceCandidateInit::from_candidate(c, mid.clone(), Some(ufrag.to_owned())))
            .collect()
    }

    fn first_local_mid(&self) -> Option<String> {
        if let Some(local) = self.local_description().and_then(|d| d.parsed.as_ref()) {
            return local
                .media_descriptions
                .iter()
                .filter(|m| !m.is_rejected())
                .find_map(|m| m.mid().map(str::to_owned));
        }
        self.local_sections.first().map(|s| s.mid.clone())
    }

    pub fn signaling_state(&self) -> RTCSignalingState {
        self.signaling_state
    }

    /// The pending local description if any, else the current one.
    pub fn local_description(&self) -> Option<&RTCSessionDescription> {
        self.pending_local_description
            .as_ref()
            .or(self.current_local_description.as_ref())
    }

    /// The pending remote description if any, else the current one.
    pub fn remote_description(&self) -> Option<&RTCSessionDescription> {
        self.pending_remote_description
            .as_ref()
            .or(self.current_remote_description.as_ref())
    }

    pub fn current_local_description(&self) -> Option<&RTCSessionDescription> {
        self.current_local_description.as_ref()
    }

    pub fn pending_local_description(&self) -> Option<&RTCSessionDescription> {
        self.pending_local_description.as_ref()
    }

    pub fn current_remote_description(&self) -> Option<&RTCSessionDescription> {
        self.current_remote_description.as_ref()
    }

    pub fn pending_remote_description(&self) -> Option<&RTCSessionDescription> {
        self.pending_remote_description.as_ref()
    }

    /// What the validation of the last remote description tolerated.
    pub fn validation_report(&self) -> Option<&ValidationReport> {
        self.last_validation.as_ref()
    }

    pub fn local_media_sections(&self) -> &[LocalMediaSection] {
        &self.local_sections
    }

    pub fn configuration(&self) -> &RTCConfiguration {
        &self.configuration
    }

    pub fn certificate(&self) -> &RTCCertificate {
        &self.certificate
    }

    pub fn dtls_transport(&self) -> &RTCDtlsTransport {
        &self.dtls_transport
    }

    pub fn is_dtls_piggyback_supported_by_peer(&self) -> bool {
        self.dtls_transport.is_dtls_piggyback_supported_by_peer()
    }

    /// See [`RTCDtlsTransport::export_srtp_keying_material`].
    pub fn export_srtp_keying_material(&self) -> Result<Vec<u8>> {
        self.dtls_transport.export_srtp_keying_material()
    }

    pub fn ice_connection_state(&self) -> ConnectionState {
        self.ice()
            .map_or(ConnectionState::Closed, |ice| ice.connection_state())
    }

    pub fn ice_gathering_state(&self) -> GatheringState {
        self.ice()
            .map_or(GatheringState::Complete, |ice| ice.gathering_state())
    }

    fn ice(&self) -> Result<&IceTransport> {
        self.dtls_transport
            .ice()
            .ok_or(Error::ErrIceTransportNotExists)
    }

    fn ice_mut(&mut self) -> Result<&mut IceTransport> {
        self.dtls_transport
            .ice_mut()
            .ok_or(Error::ErrIceTransportNotExists)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.signaling_state == RTCSignalingState::Closed {
            return Err(Error::ErrConnectionClosed);
        }
        Ok(())
    }

    fn is_gathering(&self) -> bool {
        self.ice_gathering_state() == GatheringState::Gathering
    }

    fn drain_transport_events(&mut self) {
        while let Some(ev) = self.dtls_transport.poll_event() {
            match ev {
                DtlsTransportEvent::StateChange(state) => {
                    self.events
                        .push_back(RTCPeerConnectionEvent::OnDtlsStateChangeEvent(state));
                }
                DtlsTransportEvent::SrtpPacket { packet, decrypted } => {
                    self.events
                        .push_back(RTCPeerConnectionEvent::OnSrtpPacket { packet, decrypted });
                }
                DtlsTransportEvent::RawPacket(packet) => {
                    self.events
                        .push_back(RTCPeerConnectionEvent::OnRawPacket(packet));
                }
                DtlsTransportEvent::Ice(ev) => self.handle_ice_event(ev),
            }
        }
    }

    fn handle_ice_event(&mut self, ev: IceTransportEvent) {
        let event = match ev {
            IceTransportEvent::LocalCandidate(c) => {
                let ufrag = self.ice().ok().map(|ice| ice.local_credentials().0.to_owned());
                RTCPeerConnectionEvent::OnIceCandidateEvent(RTCIceCandidateInit::from_candidate(
                    &c,
                    self.first_local_mid(),
                    ufrag,
                ))
            }
            IceTransportEvent::GatheringStateChange(state) => {
                if state == GatheringState::Complete {
                    self.events.push_back(RTCPeerConnectionEvent::OnIceCandidateEvent(
                        RTCIceCandidateInit::default(),
                    ));
                }
                RTCPeerConnectionEvent::OnIceGatheringStateChangeEvent(state)
            }
            IceTransportEvent::ServerError {
                url,
                address,
                reason,
            } => RTCPeerConnectionEvent::OnIceCandidateErrorEvent {
                url,
                address,
                reason,
            },
            IceTransportEvent::ConnectionStateChange(state) => {
                info!("[peer_connection] ICE connection state changed: {state}");
                RTCPeerConnectionEvent::OnIceConnectionStateChangeEvent(state)
            }
            IceTransportEvent::WritableChange(writable) => {
                RTCPeerConnectionEvent::OnWritableChangeEvent(writable)
            }
            IceTransportEvent::SelectedCandidatePairChange { local, remote } => {
                RTCPeerConnectionEvent::OnSelectedCandidatePairChangeEvent { local, remote }
            }
            IceTransportEvent::PiggybackReceived { .. } => {
                trace!("[peer_connection] piggyback report left to the DTLS transport");
                return;
            }
        };
        self.events.push_back(event);
    }
}

fn parsed_description(desc: &RTCSessionDescription) -> Result<SessionDescription> {
    match &desc.parsed {
        Some(parsed) => Ok(parsed.clone()),
        None => desc.unmarshal(),
    }
}

impl Protocol<TaggedBytesMut, BytesMut, ()> for RTCPeerConnection {
    type Rout = BytesMut;
    type Wout = TaggedBytesMut;
    type Eout = RTCPeerConnectionEvent;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if self.signaling_state == RTCSignalingState::Closed {
            trace!("[peer_connection] dropped {} bytes after close", msg.message.len());
            return Ok(());
        }
        self.last_now = Some(msg.now);
        let result = self.dtls_transport.handle_read(msg);
        self.drain_transport_events();
        result
    }

    /// Decrypted application data.
    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.dtls_transport.poll_read()
    }

    fn handle_write(&mut self, msg: BytesMut) -> Result<()> {
        self.ensure_open()?;
        self.dtls_transport.handle_write(msg)
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.dtls_transport.poll_write()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.events.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        if self.signaling_state == RTCSignalingState::Closed {
            return Ok(());
        }
        self.last_now = Some(now);

        if self.gather_pending {
            self.gather_pending = false;
            self.ice_mut()?.gather_candidates(now)?;
        }
        if self.is_gathering() {
            self.ice_mut()?.on_resolve_complete(now);
        }

        // a DTLS client that piggybacks has its hello ready before the
        // first check goes out
        let result = self.dtls_transport.handle_timeout(now);

        if self.checks_pending
            && let Some((ufrag, pwd)) = self.remote_ice_credentials.clone()
        {
            self.checks_pending = false;
            self.ice_mut()?.start_connectivity_checks(now, ufrag, pwd)?;
        }

        self.drain_transport_events();
        result
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        if self.signaling_state == RTCSignalingState::Closed {
            return None;
        }
        if self.gather_pending || self.checks_pending {
            return Some(self.last_now.unwrap_or_else(Instant::now));
        }

        let mut next = self.dtls_transport.poll_timeout();
        if self.is_gathering()
            && let Some(now) = self.last_now
        {
            let resolve = now + RESOLVER_POLL_INTERVAL;
            next = Some(next.map_or(resolve, |n| n.min(resolve)));
        }
        next
    }

    fn close(&mut self) -> Result<()> {
        if self.signaling_state == RTCSignalingState::Closed {
            return Ok(());
        }
        info!("[peer_connection] closing");
        self.signaling_state = RTCSignalingState::Closed;
        let result = self.dtls_transport.stop();
        self.drain_transport_events();
        result
    }
}
