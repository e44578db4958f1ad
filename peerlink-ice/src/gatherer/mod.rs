
pub mod gatherer_config;

use log::{debug, trace, warn};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use stun::addr::MappedAddress;
use stun::attributes::{ATTR_MAPPED_ADDRESS, ATTR_SOFTWARE};
use stun::error_code::ErrorCodeAttribute;
use stun::fingerprint::FINGERPRINT;
use stun::message::*;
use stun::textattrs::Software;
use stun::transaction::{TransactionEvent, TransactionMap};
use stun::uri::Uri;
use stun::xoraddr::XorMappedAddress;

use crate::candidate::candidate_host::CandidateHostConfig;
use crate::candidate::candidate_server_reflexive::CandidateServerReflexiveConfig;
use crate::candidate::{Candidate, CandidateConfig};
use crate::mdns::generate_multicast_dns_name;
use crate::network_type::UDP;
use crate::resolver::{AddressFamily, AsyncDnsResolver, AsyncDnsResolverFactory};
use crate::state::GatheringState;
pub use gatherer_config::*;
use shared::error::*;
use shared::{TaggedBytesMut, TransportContext};

/// Events produced by a `Gatherer`.
#[derive(Debug, Clone)]
pub enum GathererEvent {
    /// A new local candidate. Host first, then one per unique mapped address.
    CandidateGathered(Candidate),
    /// A STUN server could not be used. Other servers are unaffected.
    ServerError {
        url: String,
        address: Option<SocketAddr>,
        reason: String,
    },
    /// Every server has answered or given up and at least one succeeded.
    Complete,
    /// Every server has answered or given up and none succeeded.
    Failed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum RequestKind {
    Binding,
    Keepalive,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ServerState {
    New,
    Resolving,
    Requesting,
    Succeeded,
    Failed,
    /// Address family differs from the local socket.
    Skipped,
}

impl ServerState {
    fn is_done(self) -> bool {
        matches!(
            self,
            ServerState::Succeeded | ServerState::Failed | ServerState::Skipped
        )
    }
}

struct StunServer {
    url: String,
    uri: Uri,
    address: Option<SocketAddr>,
    state: ServerState,
    resolver: Option<Box<dyn AsyncDnsResolver>>,
    first_request: Option<Instant>,
    next_keepalive: Option<Instant>,
}

/// Gatherer discovers the host and server reflexive candidates of one local
/// UDP socket and keeps the NAT bindings alive.
pub struct Gatherer {
    local_addr: SocketAddr,
    component: u16,
    keepalive_delay: Duration,
    network_adapter_type: NetworkAdapterType,
    multicast_dns_mode: crate::mdns::MulticastDnsMode,
    multicast_dns_name: String,
    software: Option<String>,

    servers: Vec<StunServer>,
    resolver_factory: Option<Box<dyn AsyncDnsResolverFactory>>,
    transactions: TransactionMap<(usize, RequestKind)>,

    host_candidate: Option<Candidate>,
    srflx_candidates: Vec<Candidate>,

    state: GatheringState,
    closed: bool,
    events: VecDeque<GathererEvent>,
}

impl Gatherer {
    /// Creates a new Gatherer. Every STUN server URI is validated up front.
    pub fn new(config: GathererConfig) -> Result<Self> {
        let mut servers = vec![];
        for url in &config.stun_servers {
            let uri = Uri::parse_uri(url)?;
            servers.push(StunServer {
                url: url.clone(),
                address: uri.socket_addr(),
                uri,
                state: ServerState::New,
                resolver: None,
                first_request: None,
                next_keepalive: None,
            });
        }

        Ok(Self {
            local_addr: config.local_addr,
            component: config.component,
            keepalive_delay: config.keepalive_delay.unwrap_or(DEFAULT_KEEPALIVE_DELAY),
            network_adapter_type: config.network_adapter_type,
            multicast_dns_mode: config.multicast_dns_mode,
            multicast_dns_name: generate_multicast_dns_name(),
            software: config.software,

            servers,
            resolver_factory: None,
            transactions: TransactionMap::new(config.rtx_policy.unwrap_or_default()),

            host_candidate: None,
            srflx_candidates: vec![],

            state: GatheringState::New,
            closed: false,
            events: VecDeque::new(),
        })
    }

    /// Sets the resolver used for STUN servers given by host name.
    pub fn with_resolver_factory(mut self, factory: Box<dyn AsyncDnsResolverFactory>) -> Self {
        self.resolver_factory = Some(factory);
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn gathering_state(&self) -> GatheringState {
        self.state
    }

    pub fn network_adapter_type(&self) -> NetworkAdapterType {
        self.network_adapter_type
    }

    /// Changes the adapter type. Later keepalives use the new lifetime; no
    /// gathering is restarted.
    pub fn set_network_adapter_type(&mut self, network_adapter_type: NetworkAdapterType) {
        if self.network_adapter_type != network_adapter_type {
            debug!(
                "[gatherer {}] network adapter type {} -> {}",
                self.local_addr, self.network_adapter_type, network_adapter_type
            );
            self.network_adapter_type = network_adapter_type;
        }
    }

    /// Lifetime of keepalives for the current adapter type. `None` is infinite.
    pub fn keepalive_lifetime(&self) -> Option<Duration> {
        self.network_adapter_type.keepalive_lifetime()
    }

    /// Candidates gathered so far, host first.
    pub fn candidates(&self) -> Vec<Candidate> {
        self.host_candidate
            .iter()
            .chain(self.srflx_candidates.iter())
            .cloned()
            .collect()
    }

    /// Emits the host candidate and starts binding every configured server.
    /// A gatherer gathers once; a second call fails.
    pub fn prepare_address(&mut self, now: Instant) -> Result<()> {
        if self.closed {
            return Err(Error::ErrGathererClosed);
        }
        if self.state != GatheringState::New {
            return Err(Error::ErrMultipleGatherAttempted);
        }
        self.state = GatheringState::Gathering;

        let host = self.new_host_candidate()?;
        self.host_candidate = Some(host.clone());
        self.events.push_back(GathererEvent::CandidateGathered(host));

        let family = AddressFamily::of(&self.local_addr.ip());
        for index in 0..self.servers.len() {
            if let Some(address) = self.servers[index].address {
                self.send_binding_request(now, index, address);
                continue;
            }

            let Some(factory) = &self.resolver_factory else {
                self.fail_server(index, "no resolver for host name".to_owned());
                continue;
            };

            let mut resolver = factory.create();
            trace!(
                "[gatherer {}] resolving {} ({})",
                self.local_addr, self.servers[index].uri.host, family
            );
            resolver.start(&self.servers[index].uri.host, family);
            self.servers[index].resolver = Some(resolver);
            self.servers[index].state = ServerState::Resolving;
        }

        // Resolvers that answer synchronously are picked up right away.
        self.check_resolvers(now);
        self.maybe_complete();

        Ok(())
    }

    /// Picks up answers from resolvers. Called by the owner when a lookup
    /// finishes; does nothing once the gatherer is closed.
    pub fn on_resolve_complete(&mut self, now: Instant) {
        if self.closed {
            trace!("[gatherer {}] resolve completed after close", self.local_addr);
            return;
        }
        self.check_resolvers(now);
        self.maybe_complete();
    }

    /// Whether a datagram is a STUN response to one of our transactions.
    pub fn matches_transaction(&self, buf: &[u8]) -> bool {
        if !is_message(buf) || buf.len() < MESSAGE_HEADER_SIZE {
            return false;
        }
        let mut id = TransactionId::default();
        id.0.copy_from_slice(&buf[8..MESSAGE_HEADER_SIZE]);
        self.transactions.contains(&id)
    }

    fn new_host_candidate(&self) -> Result<Candidate> {
        let address = if self.multicast_dns_mode.obfuscates_host() {
            self.multicast_dns_name.clone()
        } else {
            self.local_addr.ip().to_string()
        };

        CandidateHostConfig {
            base_config: CandidateConfig {
                network: UDP.to_owned(),
                address,
                port: self.local_addr.port(),
                component: self.component,
                base_address: Some(self.local_addr),
                ..CandidateConfig::default()
            },
        }
        .new_candidate_host()
    }

    fn check_resolvers(&mut self, now: Instant) {
        for index in 0..self.servers.len() {
            if self.servers[index].state != ServerState::Resolving {
                continue;
            }
            let Some(answer) = self.servers[index]
                .resolver
                .as_mut()
                .and_then(|resolver| resolver.result())
            else {
                continue;
            };
            self.servers[index].resolver = None;

            match answer {
                Ok(ip) => {
                    let address = SocketAddr::new(ip, self.servers[index].uri.port_or_default());
                    self.servers[index].address = Some(address);
                    self.send_binding_request(now, index, address);
                }
                Err(err) => self.fail_server(index, err.to_string()),
            }
        }
    }

    fn send_binding_request(&mut self, now: Instant, index: usize, address: SocketAddr) {
        if address.is_ipv4() != self.local_addr.is_ipv4() {
            debug!(
                "[gatherer {}] skipping {}: address family mismatch",
                self.local_addr, self.servers[index].url
            );
            self.servers[index].state = ServerState::Skipped;
            return;
        }

        if let Err(err) = self.start_transaction(now, index, address, RequestKind::Binding) {
            self.fail_server(index, err.to_string());
            return;
        }
        self.servers[index].state = ServerState::Requesting;
        if self.servers[index].first_request.is_none() {
            self.servers[index].first_request = Some(now);
        }
    }

    fn start_transaction(
        &mut self,
        now: Instant,
        index: usize,
        address: SocketAddr,
        kind: RequestKind,
    ) -> Result<()> {
        let mut setters: Vec<Box<dyn Setter>> =
            vec![Box::new(BINDING_REQUEST), Box::new(TransactionId::new())];
        if let Some(software) = &self.software {
            setters.push(Box::new(Software::new(ATTR_SOFTWARE, software.clone())));
        }
        setters.push(Box::new(FINGERPRINT));

        let mut m = Message::new();
        m.build(&setters)?;

        trace!(
            "[gatherer {}] {:?} request {} to {}",
            self.local_addr, kind, m.transaction_id, address
        );
        self.transactions.start(
            now,
            m.transaction_id,
            (index, kind),
            &m.raw,
            TransportContext::udp(self.local_addr, address),
        )
    }

    fn fail_server(&mut self, index: usize, reason: String) {
        let server = &mut self.servers[index];
        warn!(
            "[gatherer {}] STUN server {} ({:?}) failed: {}",
            self.local_addr, server.url, server.address, reason
        );
        server.state = ServerState::Failed;
        server.next_keepalive = None;
        self.events.push_back(GathererEvent::ServerError {
            url: server.url.clone(),
            address: server.address,
            reason,
        });
    }

    fn maybe_complete(&mut self) {
        if self.state != GatheringState::Gathering
            || !self.servers.iter().all(|s| s.state.is_done())
        {
            return;
        }

        self.state = GatheringState::Complete;
        let succeeded = self
            .servers
            .iter()
            .any(|s| s.state == ServerState::Succeeded);
        if succeeded || self.servers.is_empty() {
            debug!(
                "[gatherer {}] complete with {} srflx candidates",
                self.local_addr,
                self.srflx_candidates.len()
            );
            self.events.push_back(GathererEvent::Complete);
        } else {
            debug!("[gatherer {}] failed, no server answered", self.local_addr);
            self.events.push_back(GathererEvent::Failed);
        }
    }

    fn keepalive_expired(&self, index: usize, now: Instant) -> bool {
        match (self.keepalive_lifetime(), self.servers[index].first_request) {
            (Some(lifetime), Some(first)) => now >= first + lifetime,
            _ => false,
        }
    }

    fn schedule_keepalive(&mut self, index: usize, now: Instant) {
        if self.keepalive_expired(index, now) {
            debug!(
                "[gatherer {}] keepalive lifetime for {} elapsed",
                self.local_addr, self.servers[index].url
            );
            self.servers[index].next_keepalive = None;
        } else {
            self.servers[index].next_keepalive = Some(now + self.keepalive_delay);
        }
    }

    fn handle_response(&mut self, now: Instant, m: &Message, index: usize, kind: RequestKind) {
        if m.typ.class == CLASS_ERROR_RESPONSE {
            let mut code = ErrorCodeAttribute::default();
            let reason = match code.get_from(m) {
                Ok(()) => Error::ErrStunErrorResponse {
                    code: code.code.0,
                    reason: String::from_utf8_lossy(&code.reason).into_owned(),
                }
                .to_string(),
                Err(_) => "error response without ERROR-CODE".to_owned(),
            };
            match kind {
                RequestKind::Binding => self.fail_server(index, reason),
                RequestKind::Keepalive => {
                    warn!(
                        "[gatherer {}] keepalive to {} rejected: {}",
                        self.local_addr, self.servers[index].url, reason
                    );
                    self.servers[index].next_keepalive = None;
                }
            }
            return;
        }

        let mapped = {
            let mut xor = XorMappedAddress::default();
            if xor.get_from(m).is_ok() {
                Some(xor.socket_addr())
            } else {
                let mut plain = MappedAddress::default();
                plain
                    .get_from_as(m, ATTR_MAPPED_ADDRESS)
                    .ok()
                    .map(|_| plain.socket_addr())
            }
        };
        let Some(mapped) = mapped else {
            if kind == RequestKind::Binding {
                self.fail_server(index, "response without mapped address".to_owned());
            }
            return;
        };

        if kind == RequestKind::Binding {
            self.servers[index].state = ServerState::Succeeded;
        }
        self.add_srflx_candidate(index, mapped);
        self.schedule_keepalive(index, now);
    }

    fn add_srflx_candidate(&mut self, index: usize, mapped: SocketAddr) {
        if self.srflx_candidates.iter().any(|c| c.addr() == mapped) {
            trace!(
                "[gatherer {}] mapped address {} from {} already known",
                self.local_addr, mapped, self.servers[index].url
            );
            return;
        }

        // Obfuscated hosts must not leak the local IP through raddr.
        let (rel_addr, rel_port) = if self.multicast_dns_mode.obfuscates_host() {
            ("0.0.0.0".to_owned(), 0)
        } else {
            (self.local_addr.ip().to_string(), self.local_addr.port())
        };

        let result = CandidateServerReflexiveConfig {
            base_config: CandidateConfig {
                network: UDP.to_owned(),
                address: mapped.ip().to_string(),
                port: mapped.port(),
                component: self.component,
                base_address: Some(self.local_addr),
                ..CandidateConfig::default()
            },
            rel_addr,
            rel_port,
            url: Some(self.servers[index].url.clone()),
        }
        .new_candidate_server_reflexive();

        match result {
            Ok(candidate) => {
                debug!(
                    "[gatherer {}] srflx candidate {} via {}",
                    self.local_addr, mapped, self.servers[index].url
                );
                self.srflx_candidates.push(candidate.clone());
                self.events
                    .push_back(GathererEvent::CandidateGathered(candidate));
            }
            Err(err) => warn!(
                "[gatherer {}] failed to create srflx candidate {}: {}",
                self.local_addr, mapped, err
            ),
        }
    }

    fn handle_transaction_events(&mut self, now: Instant) {
        while let Some(TransactionEvent::Timeout(id, (index, kind))) = self.transactions.poll_event()
        {
            match kind {
                RequestKind::Binding => {
                    trace!("[gatherer {}] transaction {} timed out", self.local_addr, id);
                    self.fail_server(index, Error::ErrTransactionTimeOut.to_string());
                }
                RequestKind::Keepalive => {
                    debug!(
                        "[gatherer {}] keepalive to {} timed out",
                        self.local_addr, self.servers[index].url
                    );
                    self.schedule_keepalive(index, now);
                }
            }
        }
        self.maybe_complete();
    }
}

impl sansio::Protocol<TaggedBytesMut, (), ()> for Gatherer {
    type Rout = ();
    type Wout = TaggedBytesMut;
    type Eout = GathererEvent;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedBytesMut) -> Result<()> {
        if self.closed {
            return Err(Error::ErrGathererClosed);
        }

        let mut m = Message::new();
        m.unmarshal_binary(&msg.message)?;
        if m.typ.class != CLASS_SUCCESS_RESPONSE && m.typ.class != CLASS_ERROR_RESPONSE {
            return Err(Error::ErrUnexpectedStunrequestMessage);
        }

        let Some(tr) = self.transactions.finish(&m.transaction_id) else {
            debug!(
                "[gatherer {}] no transaction {} from {}",
                self.local_addr, m.transaction_id, msg.transport.peer_addr
            );
            return Ok(());
        };
        let (index, kind) = tr.tag;
        self.handle_response(msg.now, &m, index, kind);
        self.maybe_complete();

        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        None
    }

    fn handle_write(&mut self, _msg: ()) -> Result<()> {
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.transactions.poll_transmit()
    }

    fn handle_event(&mut self, _evt: ()) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.events.pop_front()
    }

    fn handle_timeout(&mut self, now: Instant) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        // Past the lifetime nothing is retransmitted or started.
        for index in 0..self.servers.len() {
            if self.keepalive_expired(index, now) {
                let cancelled = self
                    .transactions
                    .cancel_if(|tr| tr.tag == (index, RequestKind::Keepalive));
                if cancelled > 0 || self.servers[index].next_keepalive.is_some() {
                    debug!(
                        "[gatherer {}] stopping keepalives to {}",
                        self.local_addr, self.servers[index].url
                    );
                }
                self.servers[index].next_keepalive = None;
            }
        }

        self.transactions.handle_timeout(now);
        self.handle_transaction_events(now);

        for index in 0..self.servers.len() {
            let (Some(deadline), Some(address)) =
                (self.servers[index].next_keepalive, self.servers[index].address)
            else {
                continue;
            };
            if deadline > now {
                continue;
            }
            self.servers[index].next_keepalive = None;
            if let Err(err) = self.start_transaction(now, index, address, RequestKind::Keepalive) {
                warn!(
                    "[gatherer {}] keepalive to {} failed: {}",
                    self.local_addr, self.servers[index].url, err
                );
            }
        }

        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Instant> {
        if self.closed {
            return None;
        }

        let mut next = self.transactions.poll_timeout();
        for (index, server) in self.servers.iter().enumerate() {
            let deadline = server.next_keepalive.or_else(|| {
                // Outstanding keepalives are cut off when the lifetime ends.
                let lifetime = self.keepalive_lifetime()?;
                let first = server.first_request?;
                let outstanding = self
                    .transactions
                    .any(|tr| tr.tag == (index, RequestKind::Keepalive));
                outstanding.then_some(first + lifetime)
            });
            next = match (next, deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        next
    }

    /// Cancels every timer, transaction and pending lookup.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.transactions.delete_all();
        for server in &mut self.servers {
            server.resolver = None;
            server.next_keepalive = None;
        }
        debug!("[gatherer {}] closed", self.local_addr);
        Ok(())
    }
}
