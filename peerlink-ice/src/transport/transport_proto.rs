use super::*;

impl sansio::Protocol<TaggedBytesMut, (), ()> for IceTransport {
    type Rout = TaggedBytesMut;
    type Wout = TaggedBytesMut;
    type Eout = IceTransportEvent;
    type Error = Error;
    type Time = Instant;

    fn handle_read(&mut self, msg: TaggedBytesMut) -> std::result::Result<(), Self::Error> {
        if self.connection_state == ConnectionState::Closed {
            return Err(Error::ErrClosed);
        }

        if is_message(&msg.message) {
            if let Some(g) = self
                .gatherers
                .iter_mut()
                .find(|g| g.matches_transaction(&msg.message))
            {
                let result = g.handle_read(msg);
                self.drain_gatherers();
                return result;
            }

            let Some(local_index) = self.find_local_candidate(msg.transport.local_addr) else {
                warn!(
                    "[ice:{}] discarded message, not a valid local candidate {}",
                    self.get_name(),
                    msg.transport.local_addr,
                );
                return Err(Error::ErrUnhandledStunpacket);
            };

            let mut m = Message::new();
            if let Err(err) = m.unmarshal_binary(&msg.message) {
                warn!(
                    "[ice:{}] failed to decode STUN from {}: {}",
                    self.get_name(),
                    msg.transport.peer_addr,
                    err
                );
                return Ok(());
            }
            self.handle_inbound(msg.now, &mut m, local_index, msg.transport.peer_addr);
        } else if let Some(remote_index) = self.find_remote_candidate(msg.transport.peer_addr) {
            self.remote_candidates[remote_index].seen(false, msg.now);
            self.reads.push_back(msg);
        } else {
            warn!(
                "[ice:{}] discarded message from {}, not a valid remote candidate",
                self.get_name(),
                msg.transport.peer_addr
            );
        }

        Ok(())
    }

    fn poll_read(&mut self) -> Option<Self::Rout> {
        self.reads.pop_front()
    }

    fn handle_write(&mut self, _msg: ()) -> std::result::Result<(), Self::Error> {
        Ok(())
    }

    fn poll_write(&mut self) -> Option<Self::Wout> {
        self.transmits.pop_front()
    }

    fn handle_event(&mut self, _evt: ()) -> std::result::Result<(), Self::Error> {
        Ok(())
    }

    fn poll_event(&mut self) -> Option<Self::Eout> {
        self.events.pop_front()
    }

    fn handle_timeout(&mut self, now: Self::Time) -> std::result::Result<(), Self::Error> {
        if self.connection_state == ConnectionState::Closed {
            return Ok(());
        }

        for g in &mut self.gatherers {
            g.handle_timeout(now)?;
        }
        self.drain_gatherers();

        if self.checking
            && self
                .last_checking_time
                .is_none_or(|last| last + self.get_timeout_interval() <= now)
        {
            self.contact(now);
        }
        Ok(())
    }

    fn poll_timeout(&mut self) -> Option<Self::Time> {
        let mut next = self
            .gatherers
            .iter_mut()
            .filter_map(|g| g.poll_timeout())
            .min();

        let active = self.checking
            && !matches!(
                self.connection_state,
                ConnectionState::Failed | ConnectionState::Closed
            );
        if let (true, Some(last)) = (active, self.last_checking_time) {
            let check = last + self.get_timeout_interval();
            next = Some(next.map_or(check, |n| n.min(check)));
        }
        next
    }

    fn close(&mut self) -> std::result::Result<(), Self::Error> {
        if self.connection_state == ConnectionState::Closed {
            return Ok(());
        }

        let mut errs = vec![];
        for g in &mut self.gatherers {
            if let Err(err) = g.close() {
                errs.push(err);
            }
        }

        let was_writable = self.writable();
        self.selected_pair = None;
        self.checking = false;
        self.candidate_pairs.clear();
        self.pending_binding_requests.clear();
        self.remote_candidates.clear();
        self.remote_multicast_dns_candidates.clear();
        self.transmits.clear();
        self.reads.clear();

        if was_writable {
            self.events.push_back(IceTransportEvent::WritableChange(false));
        }
        self.update_connection_state(ConnectionState::Closed);

        flatten_errs(errs)
    }
}
