
mod transport_proto;
mod transport_selector;

pub mod transport_config;

use bytes::BytesMut;
use log::{debug, trace, warn};
use sansio::Protocol;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use stun::attributes::*;
use stun::message::*;
use stun::textattrs::*;

use crate::attributes::control::IceRole;
use crate::candidate::{candidate_pair::*, *};
use crate::channel::PacketChannel;
use crate::gatherer::{Gatherer, GathererEvent, NetworkAdapterType};
use crate::mdns::MulticastDnsMode;
use crate::rand::*;
use crate::state::*;
use shared::error::*;
use shared::{TaggedBytesMut, TransportContext};
pub use transport_config::*;

#[derive(Debug, Clone)]
pub(crate) struct BindingRequest {
    pub(crate) timestamp: Instant,
    pub(crate) transaction_id: TransactionId,
    pub(crate) destination: SocketAddr,
    pub(crate) is_use_candidate: bool,
}

#[derive(Default)]
pub(crate) struct UfragPwd {
    pub(crate) local_ufrag: String,
    pub(crate) local_pwd: String,
    pub(crate) remote_ufrag: String,
    pub(crate) remote_pwd: String,
}

/// Events produced by an `IceTransport`.
#[derive(Debug, Clone)]
pub enum IceTransportEvent {
    /// A local candidate to signal to the peer.
    LocalCandidate(Candidate),
    GatheringStateChange(GatheringState),
    /// A STUN server used by one of the gatherers failed.
    ServerError {
        url: String,
        address: Option<SocketAddr>,
        reason: String,
    },
    ConnectionStateChange(ConnectionState),
    WritableChange(bool),
    SelectedCandidatePairChange {
        local: Box<Candidate>,
        remote: Box<Candidate>,
    },
    /// DTLS-in-STUN attributes of a received check; `None` when absent.
    PiggybackReceived {
        data: Option<Vec<u8>>,
        ack: Option<Vec<u32>>,
    },
}

/// IceTransport aggregates the candidates of one or more gatherers, runs
/// connectivity checks against the remote candidates and exposes the selected
/// pair as a packet channel.
pub struct IceTransport {
    pub(crate) role: IceRole,
    pub(crate) tie_breaker: u64,
    pub(crate) ufrag_pwd: UfragPwd,

    pub(crate) connection_state: ConnectionState,
    pub(crate) gathering_state: GatheringState,
    pub(crate) checking: bool,
    pub(crate) last_checking_time: Option<Instant>,

    pub(crate) gatherers: Vec<Gatherer>,
    pub(crate) local_candidates: Vec<Candidate>,
    pub(crate) remote_candidates: Vec<Candidate>,
    /// Remote `.local` host candidates; never paired, peer reflexive
    /// discovery finds their real address.
    pub(crate) remote_multicast_dns_candidates: Vec<Candidate>,
    pub(crate) candidate_pairs: Vec<CandidatePair>,
    pub(crate) selected_pair: Option<usize>,

    // LRU of outbound Binding request Transaction IDs
    pub(crate) pending_binding_requests: Vec<BindingRequest>,

    pub(crate) check_interval: Duration,
    pub(crate) keepalive_interval: Duration,
    pub(crate) max_binding_requests: u16,
    pub(crate) multicast_dns_mode: MulticastDnsMode,

    pub(crate) piggyback_reporting: bool,
    pub(crate) piggyback_data: Option<Vec<u8>>,
    pub(crate) piggyback_ack: Option<Vec<u32>>,

    pub(crate) transmits: VecDeque<TaggedBytesMut>,
    pub(crate) reads: VecDeque<TaggedBytesMut>,
    pub(crate) events: VecDeque<IceTransportEvent>,
}

impl IceTransport {
    /// Creates a new IceTransport.
    pub fn new(config: IceTransportConfig) -> Result<Self> {
        let local_ufrag = if config.local_ufrag.is_empty() {
            generate_ufrag()
        } else {
            config.local_ufrag
        };
        let local_pwd = if config.local_pwd.is_empty() {
            generate_pwd()
        } else {
            config.local_pwd
        };

        if local_ufrag.len() * 8 < 24 {
            return Err(Error::ErrLocalUfragInsufficientBits);
        }
        if local_pwd.len() * 8 < 128 {
            return Err(Error::ErrLocalPwdInsufficientBits);
        }

        Ok(Self {
            role: config.role,
            tie_breaker: config.tie_breaker.unwrap_or_else(rand::random::<u64>),
            ufrag_pwd: UfragPwd {
                local_ufrag,
                local_pwd,
                ..Default::default()
            },

            connection_state: ConnectionState::New,
            gathering_state: GatheringState::New,
            checking: false,
            last_checking_time: None,

            gatherers: vec![],
            local_candidates: vec![],
            remote_candidates: vec![],
            remote_multicast_dns_candidates: vec![],
            candidate_pairs: vec![],
            selected_pair: None,

            pending_binding_requests: vec![],

            check_interval: config.check_interval.unwrap_or(DEFAULT_CHECK_INTERVAL),
            keepalive_interval: config
                .keepalive_interval
                .unwrap_or(DEFAULT_KEEPALIVE_INTERVAL),
            max_binding_requests: config
                .max_binding_requests
                .unwrap_or(DEFAULT_MAX_BINDING_REQUESTS),
            multicast_dns_mode: config.multicast_dns_mode,

            piggyback_reporting: config.piggyback_reporting,
            piggyback_data: None,
            piggyback_ack: None,

            transmits: VecDeque::new(),
            reads: VecDeque::new(),
            events: VecDeque::new(),
        })
    }

    pub fn role(&self) -> IceRole {
        self.role
    }

    /// Changes the ICE role. Existing pairs are re-prioritized.
    pub fn set_role(&mut self, role: IceRole) {
        if self.role == role {
            return;
        }
        debug!("[ice:{}] switching role to {}", self.get_name(), role);
        self.role = role;
        let controlling = self.is_controlling();
        for p in &mut self.candidate_pairs {
            p.ice_role_controlling = controlling;
        }
    }

    pub fn tie_breaker(&self) -> u64 {
        self.tie_breaker
    }

    /// Returns the local user credentials.
    pub fn local_credentials(&self) -> (&str, &str) {
        (&self.ufrag_pwd.local_ufrag, &self.ufrag_pwd.local_pwd)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection_state
    }

    pub fn gathering_state(&self) -> GatheringState {
        self.gathering_state
    }

    pub fn local_candidates(&self) -> &[Candidate] {
        &self.local_candidates
    }

    pub fn remote_candidates(&self) -> &[Candidate] {
        &self.remote_candidates
    }

    /// Local and remote candidate of the selected pair.
    pub fn selected_candidate_pair(&self) -> Option<(&Candidate, &Candidate)> {
        let p = &self.candidate_pairs[self.selected_pair?];
        Some((
            &self.local_candidates[p.local_index],
            &self.remote_candidates[p.remote_index],
        ))
    }

    /// Attaches DTLS-in-STUN attributes to every outgoing check request and
    /// response. `None` leaves the attribute out.
    pub fn set_piggyback_payload(&mut self, data: Option<Vec<u8>>, ack: Option<Vec<u32>>) {
        self.piggyback_data = data;
        self.piggyback_ack = ack;
    }

    pub fn piggyback_reporting(&self) -> bool {
        self.piggyback_reporting
    }

    pub fn set_piggyback_reporting(&mut self, enabled: bool) {
        self.piggyback_reporting = enabled;
    }

    /// Adds a gatherer whose candidates and traffic this transport takes over.
    pub fn add_gatherer(&mut self, gatherer: Gatherer) {
        self.gatherers.push(gatherer);
        self.drain_gatherers();
    }

    /// Starts gathering on every gatherer that has not started yet.
    pub fn gather_candidates(&mut self, now: Instant) -> Result<()> {
        if self.connection_state == ConnectionState::Closed {
            return Err(Error::ErrClosed);
        }
        if self.gatherers.is_empty() {
            return Err(Error::ErrGatherNotStarted);
        }

        self.update_gathering_state(GatheringState::Gathering);
        for g in &mut self.gatherers {
            if g.gathering_state() == GatheringState::New {
                g.prepare_address(now)?;
            }
        }
        self.drain_gatherers();

        Ok(())
    }

    /// Forwards a finished DNS lookup to the gatherers.
    pub fn on_resolve_complete(&mut self, now: Instant) {
        for g in &mut self.gatherers {
            g.on_resolve_complete(now);
        }
        self.drain_gatherers();
    }

    /// Updates the adapter type of every gatherer.
    pub fn set_network_adapter_type(&mut self, network_adapter_type: NetworkAdapterType) {
        for g in &mut self.gatherers {
            g.set_network_adapter_type(network_adapter_type);
        }
    }

    /// Sets the credentials used to sign and verify checks.
    pub fn set_remote_credentials(&mut self, remote_ufrag: String, remote_pwd: String) -> Result<()> {
        if remote_ufrag.is_empty() {
            return Err(Error::ErrRemoteUfragEmpty);
        } else if remote_pwd.is_empty() {
            return Err(Error::ErrRemotePwdEmpty);
        }

        if self.ufrag_pwd.remote_ufrag != remote_ufrag || self.ufrag_pwd.remote_pwd != remote_pwd {
            debug!(
                "[ice:{}] remote credentials set, ufrag {}",
                self.get_name(),
                remote_ufrag
            );
            self.ufrag_pwd.remote_ufrag = remote_ufrag;
            self.ufrag_pwd.remote_pwd = remote_pwd;
        }
        Ok(())
    }

    /// Sets the remote credentials and starts checking. Calling it again
    /// with the same credentials is a no-op.
    pub fn start_connectivity_checks(
        &mut self,
        now: Instant,
        remote_ufrag: String,
        remote_pwd: String,
    ) -> Result<()> {
        if self.connection_state == ConnectionState::Closed {
            return Err(Error::ErrClosed);
        }
        let unchanged =
            self.ufrag_pwd.remote_ufrag == remote_ufrag && self.ufrag_pwd.remote_pwd == remote_pwd;
        self.set_remote_credentials(remote_ufrag, remote_pwd)?;
        if self.checking && unchanged {
            trace!("[ice:{}] checks already running", self.get_name());
            return Ok(());
        }

        self.checking = true;
        if self.selected_pair.is_none() {
            self.update_connection_state(ConnectionState::Checking);
        }
        self.contact(now);

        Ok(())
    }

    /// Adds a new local candidate.
    pub fn add_local_candidate(&mut self, c: Candidate) -> Result<()> {
        if self.local_candidates.iter().any(|cand| cand.equal(&c)) {
            return Ok(());
        }

        self.local_candidates.push(c);
        let local_index = self.local_candidates.len() - 1;
        for remote_index in 0..self.remote_candidates.len() {
            self.add_pair(local_index, remote_index);
        }

        Ok(())
    }

    /// Adds a new remote candidate.
    pub fn add_remote_candidate(&mut self, c: Candidate) -> Result<()> {
        if c.candidate_type() == CandidateType::Host && c.is_multicast_dns() {
            if self.multicast_dns_mode == MulticastDnsMode::Disabled {
                warn!(
                    "[ice:{}] remote mDNS candidate added, but mDNS is disabled: ({})",
                    self.get_name(),
                    c.address()
                );
                return Err(Error::ErrMulticastDnsNotSupported);
            }
            debug!(
                "[ice:{}] keeping remote mDNS candidate {} for peer reflexive discovery",
                self.get_name(),
                c.address()
            );
            self.remote_multicast_dns_candidates.push(c);
            return Ok(());
        }

        self.add_remote_candidate_internal(c);
        Ok(())
    }

    pub(crate) fn add_remote_candidate_internal(&mut self, c: Candidate) -> usize {
        if let Some(index) = self.remote_candidates.iter().position(|cand| cand.equal(&c)) {
            return index;
        }

        self.remote_candidates.push(c);
        let remote_index = self.remote_candidates.len() - 1;
        for local_index in 0..self.local_candidates.len() {
            self.add_pair(local_index, remote_index);
        }
        remote_index
    }

    fn drain_gatherers(&mut self) {
        let mut gathered = vec![];
        for g in &mut self.gatherers {
            while let Some(t) = g.poll_write() {
                self.transmits.push_back(t);
            }
            while let Some(ev) = g.poll_event() {
                gathered.push(ev);
            }
        }

        for ev in gathered {
            match ev {
                GathererEvent::CandidateGathered(c) => {
                    if let Err(err) = self.add_local_candidate(c.clone()) {
                        warn!("[ice:{}] failed to add local candidate: {}", self.get_name(), err);
                        continue;
                    }
                    self.events.push_back(IceTransportEvent::LocalCandidate(c));
                }
                GathererEvent::ServerError {
                    url,
                    address,
                    reason,
                } => self.events.push_back(IceTransportEvent::ServerError {
                    url,
                    address,
                    reason,
                }),
                GathererEvent::Complete | GathererEvent::Failed => {}
            }
        }

        if self.gathering_state == GatheringState::Gathering
            && self
                .gatherers
                .iter()
                .all(|g| g.gathering_state() == GatheringState::Complete)
        {
            self.update_gathering_state(GatheringState::Complete);
        }
    }

    pub(crate) fn update_gathering_state(&mut self, new_state: GatheringState) {
        if self.gathering_state != new_state {
            debug!(
                "[ice:{}] gathering state {} -> {}",
                self.get_name(),
                self.gathering_state,
                new_state
            );
            self.gathering_state = new_state;
            self.events
                .push_back(IceTransportEvent::GatheringStateChange(new_state));
        }
    }

    pub(crate) fn update_connection_state(&mut self, new_state: ConnectionState) {
        if self.connection_state != new_state {
            debug!(
                "[ice:{}] setting new connection state: {}",
                self.get_name(),
                new_state
            );
            self.connection_state = new_state;
            self.events
                .push_back(IceTransportEvent::ConnectionStateChange(new_state));
        }
    }

    pub(crate) fn is_controlling(&self) -> bool {
        self.role == IceRole::Controlling
    }

    pub(crate) fn get_name(&self) -> &str {
        if self.is_controlling() {
            "controlling"
        } else {
            "controlled"
        }
    }

    fn get_timeout_interval(&self) -> Duration {
        if self.selected_pair.is_some() {
            self.keepalive_interval
        } else {
            self.check_interval
        }
    }

    pub(crate) fn contact(&mut self, now: Instant) {
        if matches!(
            self.connection_state,
            ConnectionState::Failed | ConnectionState::Closed
        ) {
            return;
        }
        self.last_checking_time = Some(now);
        self.contact_candidates(now);
    }

    /// Whether a pair of these two candidates can carry checks. Only host
    /// and peer reflexive local candidates own a socket of their own.
    fn can_pair(&self, local_index: usize, remote_index: usize) -> bool {
        let local = &self.local_candidates[local_index];
        let remote = &self.remote_candidates[remote_index];
        matches!(
            local.candidate_type(),
            CandidateType::Host | CandidateType::PeerReflexive
        ) && local.component() == remote.component()
            && local.addr().is_ipv4() == remote.addr().is_ipv4()
    }

    pub(crate) fn add_pair(&mut self, local_index: usize, remote_index: usize) {
        if !self.can_pair(local_index, remote_index)
            || self.find_pair(local_index, remote_index).is_some()
        {
            return;
        }

        let p = CandidatePair::new(
            local_index,
            remote_index,
            self.local_candidates[local_index].priority(),
            self.remote_candidates[remote_index].priority(),
            self.is_controlling(),
        );
        trace!("[ice:{}] new candidate pair {}", self.get_name(), p);
        self.candidate_pairs.push(p);
    }

    pub(crate) fn find_pair(&self, local_index: usize, remote_index: usize) -> Option<usize> {
        self.candidate_pairs
            .iter()
            .position(|p| p.local_index == local_index && p.remote_index == remote_index)
    }

    pub(crate) fn find_local_candidate(&self, addr: SocketAddr) -> Option<usize> {
        self.local_candidates.iter().position(|c| {
            matches!(
                c.candidate_type(),
                CandidateType::Host | CandidateType::PeerReflexive
            ) && c.base_addr() == addr
        })
    }

    pub(crate) fn find_remote_candidate(&self, addr: SocketAddr) -> Option<usize> {
        self.remote_candidates.iter().position(|c| c.addr() == addr)
    }

    pub(crate) fn send_stun(
        &mut self,
        now: Instant,
        msg: &Message,
        local_index: usize,
        remote_index: usize,
    ) {
        let local_addr = self.local_candidates[local_index].base_addr();
        let peer_addr = self.remote_candidates[remote_index].addr();

        self.transmits.push_back(TaggedBytesMut {
            now,
            transport: TransportContext::udp(local_addr, peer_addr),
            message: BytesMut::from(&msg.raw[..]),
        });

        self.local_candidates[local_index].seen(true, now);
    }

    pub(crate) fn username_for_request(&self) -> Username {
        Username::new(
            ATTR_USERNAME,
            self.ufrag_pwd.remote_ufrag.clone() + ":" + self.ufrag_pwd.local_ufrag.as_str(),
        )
    }
}

impl PacketChannel for IceTransport {
    fn send(&mut self, now: Instant, buf: &[u8]) -> Result<usize> {
        if self.connection_state == ConnectionState::Closed {
            return Err(Error::ErrClosed);
        }
        let Some(index) = self.selected_pair else {
            return Err(Error::ErrNoSelectedCandidatePair);
        };

        let (local_index, remote_index) = {
            let p = &self.candidate_pairs[index];
            (p.local_index, p.remote_index)
        };
        self.transmits.push_back(TaggedBytesMut {
            now,
            transport: TransportContext::udp(
                self.local_candidates[local_index].base_addr(),
                self.remote_candidates[remote_index].addr(),
            ),
            message: BytesMut::from(buf),
        });
        self.local_candidates[local_index].seen(true, now);

        Ok(buf.len())
    }

    fn writable(&self) -> bool {
        self.selected_pair.is_some() && self.connection_state == ConnectionState::Connected
    }

    fn poll_transmit(&mut self) -> Option<TaggedBytesMut> {
        self.transmits.pop_front()
    }
}
