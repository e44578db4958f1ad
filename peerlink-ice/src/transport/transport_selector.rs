use super::*;
use stun::dtls_in_stun::{DtlsInStun, DtlsInStunAck};
use stun::fingerprint::*;
use stun::integrity::*;
use stun::xoraddr::*;

use crate::attributes::{control::*, priority::*, use_candidate::*};
use crate::candidate::candidate_peer_reflexive::CandidatePeerReflexiveConfig;
use crate::network_type::UDP;

fn assert_inbound_username(m: &Message, expected_username: &str) -> Result<()> {
    let username = Username::get_from_as(m, ATTR_USERNAME)?;

    // Before the remote ufrag is known only our own half can be verified.
    let matches = if let Some(prefix) = expected_username.strip_suffix(':') {
        username
            .text
            .split_once(':')
            .is_some_and(|(local, _)| local == prefix)
    } else {
        username.text == expected_username
    };

    if !matches {
        return Err(Error::Other(format!(
            "{:?} expected({}) actual({})",
            Error::ErrMismatchUsername,
            expected_username,
            username,
        )));
    }

    Ok(())
}

fn assert_inbound_message_integrity(m: &mut Message, key: &[u8]) -> Result<()> {
    let message_integrity_attr = MessageIntegrity(key.to_vec());
    message_integrity_attr.check(m)
}

/// PRIORITY sent in checks: the priority a peer reflexive candidate learned
/// from this check would get.
fn peer_reflexive_priority(component: u16) -> u32 {
    (1 << 24) * u32::from(CandidateType::PeerReflexive.preference())
        + (1 << 8) * u32::from(DEFAULT_LOCAL_PREFERENCE)
        + (256 - u32::from(component))
}

impl IceTransport {
    pub(crate) fn contact_candidates(&mut self, now: Instant) {
        if self.selected_pair.is_some() {
            trace!("[ice:{}] checking keepalive", self.get_name());
            self.check_keepalive(now);
        } else {
            self.ping_all_candidates(now);
        }
    }

    pub(crate) fn ping_all_candidates(&mut self, now: Instant) {
        trace!("[ice:{}] pinging all candidates", self.get_name());

        if self.candidate_pairs.is_empty() {
            debug!(
                "[ice:{}] no candidate pairs, connection is not possible yet",
                self.get_name()
            );
            return;
        }

        let mut pairs: Vec<(usize, usize)> = vec![];
        {
            let name = self.get_name().to_owned();
            for p in &mut self.candidate_pairs {
                if p.state == CandidatePairState::Waiting {
                    p.state = CandidatePairState::InProgress;
                } else if p.state != CandidatePairState::InProgress {
                    continue;
                }

                if p.binding_request_count > self.max_binding_requests {
                    trace!(
                        "[ice:{}] max requests reached for pair {}, marking it as failed",
                        name, *p
                    );
                    p.state = CandidatePairState::Failed;
                } else {
                    p.binding_request_count += 1;
                    pairs.push((p.local_index, p.remote_index));
                }
            }
        }

        for (local, remote) in pairs {
            self.ping_candidate(now, local, remote);
        }

        if self
            .candidate_pairs
            .iter()
            .all(|p| p.state == CandidatePairState::Failed)
        {
            warn!("[ice:{}] all candidate pairs failed", self.get_name());
            self.update_connection_state(ConnectionState::Failed);
        }
    }

    /// Sends a check on the selected pair if nothing was sent or received
    /// on it within the keepalive interval.
    pub(crate) fn check_keepalive(&mut self, now: Instant) {
        let Some(index) = self.selected_pair else {
            return;
        };
        let (local_index, remote_index) = {
            let p = &self.candidate_pairs[index];
            (p.local_index, p.remote_index)
        };

        let stale = |t: Option<Instant>| {
            t.is_none_or(|t| now.saturating_duration_since(t) >= self.keepalive_interval)
        };
        if stale(self.local_candidates[local_index].last_sent())
            || stale(self.remote_candidates[remote_index].last_received())
        {
            // Binding requests rather than indications so consent is refreshed.
            self.ping_candidate(now, local_index, remote_index);
        }
    }

    fn piggyback_setters(&self) -> Vec<Box<dyn Setter>> {
        let mut setters: Vec<Box<dyn Setter>> = vec![];
        if let Some(data) = &self.piggyback_data {
            setters.push(Box::new(DtlsInStun(data.clone())));
        }
        if let Some(ack) = &self.piggyback_ack {
            setters.push(Box::new(DtlsInStunAck(ack.clone())));
        }
        setters
    }

    /// Sends a check. The controlling side nominates aggressively, so every
    /// one of its checks carries USE-CANDIDATE.
    pub(crate) fn ping_candidate(&mut self, now: Instant, local: usize, remote: usize) {
        if self.ufrag_pwd.remote_pwd.is_empty() {
            trace!("[ice:{}] no remote credentials, not pinging", self.get_name());
            return;
        }

        let component = self.local_candidates[local].component();
        let mut setters: Vec<Box<dyn Setter>> = vec![
            Box::new(BINDING_REQUEST),
            Box::new(TransactionId::new()),
            Box::new(self.username_for_request()),
        ];
        if self.is_controlling() {
            setters.push(Box::new(AttrControlling(self.tie_breaker)));
            setters.push(Box::new(UseCandidateAttr::new()));
        } else {
            setters.push(Box::new(AttrControlled(self.tie_breaker)));
        }
        setters.push(Box::new(PriorityAttr(peer_reflexive_priority(component))));
        setters.extend(self.piggyback_setters());
        setters.push(Box::new(MessageIntegrity::new_short_term_integrity(
            self.ufrag_pwd.remote_pwd.clone(),
        )));
        setters.push(Box::new(FINGERPRINT));

        let mut msg = Message::new();
        if let Err(err) = msg.build(&setters) {
            log::error!("[ice:{}] failed to build check: {}", self.get_name(), err);
            return;
        }
        self.send_binding_request(now, &msg, local, remote);
    }

    pub(crate) fn send_binding_request(
        &mut self,
        now: Instant,
        m: &Message,
        local_index: usize,
        remote_index: usize,
    ) {
        trace!(
            "[ice:{}] ping STUN from {} to {}",
            self.get_name(),
            self.local_candidates[local_index].addr(),
            self.remote_candidates[remote_index].addr(),
        );

        self.invalidate_pending_binding_requests(now);
        self.pending_binding_requests.push(BindingRequest {
            timestamp: now,
            transaction_id: m.transaction_id,
            destination: self.remote_candidates[remote_index].addr(),
            is_use_candidate: m.contains(ATTR_USE_CANDIDATE),
        });

        self.send_stun(now, m, local_index, remote_index);
    }

    pub(crate) fn send_binding_success(
        &mut self,
        now: Instant,
        m: &Message,
        local_index: usize,
        remote_index: usize,
    ) {
        let addr = self.remote_candidates[remote_index].addr();
        let (ip, port) = (addr.ip(), addr.port());

        let mut setters: Vec<Box<dyn Setter>> = vec![
            Box::new(m.clone()),
            Box::new(BINDING_SUCCESS),
            Box::new(XorMappedAddress { ip, port }),
        ];
        setters.extend(self.piggyback_setters());
        setters.push(Box::new(MessageIntegrity::new_short_term_integrity(
            self.ufrag_pwd.local_pwd.clone(),
        )));
        setters.push(Box::new(FINGERPRINT));

        let mut out = Message::new();
        if let Err(err) = out.build(&setters) {
            warn!(
                "[ice:{}] failed to handle inbound ICE from {} error: {}",
                self.get_name(),
                addr,
                err
            );
        } else {
            self.send_stun(now, &out, local_index, remote_index);
        }
    }

    /// Removes pending binding requests that are over `MAX_BINDING_REQUEST_TIMEOUT` old.
    ///
    /// reference: (IETF ref-8445)[https://tools.ietf.org/html/rfc8445#appendix-B.1].
    pub(crate) fn invalidate_pending_binding_requests(&mut self, filter_time: Instant) {
        let initial_size = self.pending_binding_requests.len();
        self.pending_binding_requests.retain(|binding_request| {
            filter_time
                .checked_duration_since(binding_request.timestamp)
                .map(|duration| duration < MAX_BINDING_REQUEST_TIMEOUT)
                .unwrap_or(true)
        });

        let bind_requests_removed = initial_size - self.pending_binding_requests.len();
        if bind_requests_removed > 0 {
            trace!(
                "[ice:{}] discarded {} binding requests because they expired",
                self.get_name(),
                bind_requests_removed
            );
        }
    }

    /// Removes and returns the pending request with this transaction id.
    pub(crate) fn handle_inbound_binding_success(
        &mut self,
        now: Instant,
        id: TransactionId,
    ) -> Option<BindingRequest> {
        self.invalidate_pending_binding_requests(now);

        let index = self
            .pending_binding_requests
            .iter()
            .position(|r| r.transaction_id == id)?;
        Some(self.pending_binding_requests.remove(index))
    }

    pub(crate) fn set_selected_pair(&mut self, now: Instant, index: usize) {
        let p = &mut self.candidate_pairs[index];
        p.nominated = true;
        let (local_index, remote_index) = (p.local_index, p.remote_index);
        debug!(
            "[ice:{}] selected candidate pair {} <-> {}",
            self.get_name(),
            self.local_candidates[local_index].addr(),
            self.remote_candidates[remote_index].addr()
        );

        self.selected_pair = Some(index);
        self.last_checking_time = Some(now);
        self.update_connection_state(ConnectionState::Connected);
        self.events.push_back(IceTransportEvent::WritableChange(true));
        self.events
            .push_back(IceTransportEvent::SelectedCandidatePairChange {
                local: Box::new(self.local_candidates[local_index].clone()),
                remote: Box::new(self.remote_candidates[remote_index].clone()),
            });
    }

    fn report_piggyback(&mut self, m: &Message) {
        if !self.piggyback_reporting {
            return;
        }

        let mut data = DtlsInStun::default();
        let data = data.get_from(m).ok().map(|_| data.0);
        let mut ack = DtlsInStunAck::default();
        let ack = match ack.get_from(m) {
            Ok(()) => Some(ack.0),
            Err(Error::ErrAttributeNotFound) => None,
            Err(err) => {
                warn!("[ice:{}] bad DTLS-in-STUN ack: {}", self.get_name(), err);
                None
            }
        };
        self.events
            .push_back(IceTransportEvent::PiggybackReceived { data, ack });
    }

    /// Processes STUN traffic from a remote candidate.
    pub(crate) fn handle_inbound(
        &mut self,
        now: Instant,
        m: &mut Message,
        local_index: usize,
        remote_addr: SocketAddr,
    ) {
        if m.typ.method != METHOD_BINDING
            || !(m.typ.class == CLASS_SUCCESS_RESPONSE
                || m.typ.class == CLASS_REQUEST
                || m.typ.class == CLASS_INDICATION)
        {
            trace!(
                "[ice:{}] unhandled STUN from {} class({}) method({})",
                self.get_name(),
                remote_addr,
                m.typ.class,
                m.typ.method
            );
            return;
        }

        if self.is_controlling() {
            if m.contains(ATTR_ICE_CONTROLLING) {
                debug!(
                    "[ice:{}] inbound isControlling && a.isControlling == true",
                    self.get_name()
                );
                return;
            } else if m.contains(ATTR_USE_CANDIDATE) {
                debug!(
                    "[ice:{}] useCandidate && a.isControlling == true",
                    self.get_name()
                );
                return;
            }
        } else if m.contains(ATTR_ICE_CONTROLLED) {
            debug!(
                "[ice:{}] inbound isControlled && a.isControlling == false",
                self.get_name()
            );
            return;
        }

        if let Err(err) = FINGERPRINT.check(m) {
            warn!(
                "[ice:{}] discard message from ({}), {}",
                self.get_name(),
                remote_addr,
                err
            );
            return;
        }

        let mut remote_candidate_index = self.find_remote_candidate(remote_addr);
        if m.typ.class == CLASS_SUCCESS_RESPONSE {
            if let Err(err) =
                assert_inbound_message_integrity(m, self.ufrag_pwd.remote_pwd.as_bytes())
            {
                warn!(
                    "[ice:{}] discard message from ({}), {}",
                    self.get_name(),
                    remote_addr,
                    err
                );
                return;
            }

            let Some(remote_index) = remote_candidate_index else {
                warn!(
                    "[ice:{}] discard success message from ({}), no such remote",
                    self.get_name(),
                    remote_addr
                );
                return;
            };
            self.report_piggyback(m);
            self.handle_success_response(now, m, local_index, remote_index, remote_addr);
        } else if m.typ.class == CLASS_REQUEST {
            let username = self.ufrag_pwd.local_ufrag.clone() + ":" + &self.ufrag_pwd.remote_ufrag;
            if let Err(err) = assert_inbound_username(m, &username) {
                warn!(
                    "[ice:{}] discard message from ({}), {}",
                    self.get_name(),
                    remote_addr,
                    err
                );
                return;
            } else if let Err(err) =
                assert_inbound_message_integrity(m, self.ufrag_pwd.local_pwd.as_bytes())
            {
                warn!(
                    "[ice:{}] discard message from ({}), {}",
                    self.get_name(),
                    remote_addr,
                    err
                );
                return;
            }

            if remote_candidate_index.is_none() {
                let mut priority = PriorityAttr::default();
                if priority.get_from(m).is_err() {
                    priority.0 = 0;
                }
                let prflx_candidate_config = CandidatePeerReflexiveConfig {
                    base_config: CandidateConfig {
                        network: UDP.to_owned(),
                        address: remote_addr.ip().to_string(),
                        port: remote_addr.port(),
                        component: self.local_candidates[local_index].component(),
                        priority: priority.0,
                        ..CandidateConfig::default()
                    },
                    rel_addr: String::new(),
                    rel_port: 0,
                };

                match prflx_candidate_config.new_candidate_peer_reflexive() {
                    Ok(prflx_candidate) => {
                        debug!(
                            "[ice:{}] adding a new peer-reflexive candidate: {}",
                            self.get_name(),
                            remote_addr
                        );
                        remote_candidate_index =
                            Some(self.add_remote_candidate_internal(prflx_candidate));
                    }
                    Err(err) => {
                        log::error!(
                            "[ice:{}] failed to create new remote prflx candidate ({})",
                            self.get_name(),
                            err
                        );
                        return;
                    }
                }
            }

            trace!(
                "[ice:{}] inbound STUN (Request) from {}",
                self.get_name(),
                remote_addr
            );

            if let Some(remote_index) = remote_candidate_index {
                self.report_piggyback(m);
                self.handle_binding_request(now, m, local_index, remote_index);
            }
        }

        if let Some(remote_index) = remote_candidate_index {
            self.remote_candidates[remote_index].seen(false, now);
        }
    }

    fn handle_success_response(
        &mut self,
        now: Instant,
        m: &Message,
        local: usize,
        remote: usize,
        remote_addr: SocketAddr,
    ) {
        let Some(pending_request) = self.handle_inbound_binding_success(now, m.transaction_id)
        else {
            warn!(
                "[ice:{}] discard message from ({}), unknown TransactionID 0x{}",
                self.get_name(),
                remote_addr,
                m.transaction_id
            );
            return;
        };

        // Assert that NAT is not symmetric
        // https://tools.ietf.org/html/rfc8445#section-7.2.5.2.1
        if pending_request.destination != remote_addr {
            debug!(
                "[ice:{}] discard message: transaction source and destination does not match expected({}), actual({})",
                self.get_name(),
                pending_request.destination,
                remote_addr
            );
            return;
        }

        let Some(index) = self.find_pair(local, remote) else {
            log::error!("[ice:{}] success response from invalid candidate pair", self.get_name());
            return;
        };

        let p = &mut self.candidate_pairs[index];
        p.state = CandidatePairState::Succeeded;
        let nominate = if self.role == IceRole::Controlling {
            pending_request.is_use_candidate
        } else {
            p.nominate_on_success
        };
        trace!(
            "[ice:{}] found valid candidate pair: {}, nominate: {}",
            self.get_name(),
            self.candidate_pairs[index],
            nominate
        );

        if nominate && self.selected_pair.is_none() {
            self.set_selected_pair(now, index);
        }
    }

    fn handle_binding_request(&mut self, now: Instant, m: &Message, local: usize, remote: usize) {
        self.add_pair(local, remote);
        let Some(index) = self.find_pair(local, remote) else {
            // Family or component mismatch; answer anyway so the peer learns its mapping.
            self.send_binding_success(now, m, local, remote);
            return;
        };

        self.send_binding_success(now, m, local, remote);

        let succeeded = self.candidate_pairs[index].state == CandidatePairState::Succeeded;
        if self.is_controlling() {
            if !succeeded {
                self.ping_candidate(now, local, remote);
            }
            return;
        }

        if UseCandidateAttr::is_set(m) {
            // https://tools.ietf.org/html/rfc8445#section-7.3.1.5
            if succeeded {
                if self.selected_pair.is_none() {
                    self.set_selected_pair(now, index);
                }
            } else {
                self.candidate_pairs[index].nominate_on_success = true;
                self.ping_candidate(now, local, remote);
            }
        } else if !succeeded {
            self.ping_candidate(now, local, remote);
        }
    }
}
