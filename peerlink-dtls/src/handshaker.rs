
use crate::conn::*;
use crate::content::*;
use crate::flight::*;
use shared::error::*;

use log::*;
use std::fmt;
use std::time::{Duration, Instant};

// [RFC6347 Section-4.2.4]
//                      +-----------+
//                +---> | PREPARING | <--------------------+
//                |     +-----------+                      |
//                |           |                            |
//                |           | Buffer next flight         |
//                |           |                            |
//                |          \|/                           |
//                |     +-----------+                      |
//                |     |  SENDING  |<------------------+  | Send
//                |     +-----------+                   |  | HelloRequest
//        Receive |           |                         |  |
//           next |           | Send flight             |  | or
//         flight |  +--------+                         |  |
//                |  |        | Set retransmit timer    |  | Receive
//                |  |       \|/                        |  | HelloRequest
//                |  |  +-----------+                   |  | Send
//                +--)--|  WAITING  |-------------------+  | ClientHello
//                |  |  +-----------+   Timer expires   |  |
//                |  |         |                        |  |
//                |  |         +------------------------+  |
//        Receive |  | Send           Read retransmit      |
//           last |  | last                                |
//         flight |  | flight                              |
//                |  |                                     |
//               \|/\|/                                    |
//            +-----------+                                |
//            | FINISHED  | -------------------------------+
//            +-----------+
//                 |  /|\
//                 |   |
//                 +---+
//              Read retransmit
//           Retransmit last flight

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum HandshakeState {
    Errored,
    Preparing,
    Sending,
    Waiting,
    Finished,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HandshakeState::Errored => write!(f, "Errored"),
            HandshakeState::Preparing => write!(f, "Preparing"),
            HandshakeState::Sending => write!(f, "Sending"),
            HandshakeState::Waiting => write!(f, "Waiting"),
            HandshakeState::Finished => write!(f, "Finished"),
        }
    }
}

pub(crate) fn srv_cli_str(is_client: bool) -> String {
    if is_client {
        return "client".to_owned();
    }
    "server".to_owned()
}

/// Retransmission timer of one flight (RFC 6347 section 4.2.4.1): the
/// interval starts at `initial`, doubles on every expiry up to `maximum`,
/// and the handshake fails on the expiry after `limit` retransmissions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct RetransmitSchedule {
    initial: Duration,
    maximum: Duration,
    limit: usize,
    interval: Duration,
    count: usize,
}

impl RetransmitSchedule {
    pub(crate) fn new(initial: Duration, maximum: Duration, limit: usize) -> Self {
        RetransmitSchedule {
            initial,
            maximum,
            limit,
            interval: initial,
            count: 0,
        }
    }

    /// Restarts the schedule for a new flight.
    pub(crate) fn reset(&mut self) {
        self.interval = self.initial;
        self.count = 0;
    }

    /// Time to wait for an answer to the last transmission.
    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    pub(crate) fn count(&self) -> usize {
        self.count
    }

    /// Records an expiry. Returns the interval to arm after retransmitting,
    /// or None once the retransmissions are exhausted.
    pub(crate) fn on_timeout(&mut self) -> Option<Duration> {
        self.count += 1;
        if self.count > self.limit {
            return None;
        }
        self.interval = (self.interval * 2).min(self.maximum);
        Some(self.interval)
    }
}

impl DTLSConn {
    pub(crate) fn handshake(&mut self, now: Instant) -> Result<()> {
        loop {
            trace!(
                "[handshake:{}] {}: {}",
                srv_cli_str(self.state.is_client),
                self.current_flight,
                self.current_handshake_state
            );

            if self.current_handshake_state == HandshakeState::Finished
                && !self.is_handshake_completed()
            {
                self.set_handshake_completed();
                debug!(
                    "[handshake:{}] is completed",
                    srv_cli_str(self.state.is_client),
                );
                return Ok(());
            }

            let previous_handshake_state = self.current_handshake_state;
            self.current_handshake_state = match previous_handshake_state {
                HandshakeState::Preparing => self.prepare()?,
                HandshakeState::Sending => self.send(now),
                HandshakeState::Waiting => self.wait()?,
                HandshakeState::Finished => self.finish()?,
                HandshakeState::Errored => return Err(Error::ErrInvalidFsmTransition),
            };

            if previous_handshake_state == self.current_handshake_state
                && matches!(
                    previous_handshake_state,
                    HandshakeState::Waiting | HandshakeState::Finished
                )
            {
                // wait for timeout or incoming packet
                return Ok(());
            }
        }
    }

    fn prepare(&mut self) -> Result<HandshakeState> {
        self.flights = None;
        self.retransmit_schedule.reset();

        let result =
            self.current_flight
                .generate(&mut self.state, &self.cache, &self.handshake_config);
        let mut pkts = match result {
            Ok(pkts) => pkts,
            Err(flight_err) => return Err(self.flight_error(flight_err)),
        };

        let epoch = self.handshake_config.initial_epoch;
        let mut next_epoch = epoch;
        for p in &mut pkts {
            p.record.record_layer_header.epoch += epoch;
            if p.record.record_layer_header.epoch > next_epoch {
                next_epoch = p.record.record_layer_header.epoch;
            }
            if let Content::Handshake(h) = &mut p.record.content {
                h.handshake_header.message_sequence = self.state.handshake_send_sequence as u16;
                self.state.handshake_send_sequence += 1;
            }
        }
        if epoch != next_epoch {
            debug!(
                "[handshake:{}] -> changeCipherSpec (epoch: {})",
                srv_cli_str(self.state.is_client),
                next_epoch
            );
            self.set_local_epoch(next_epoch);
        }
        self.flights = Some(pkts);

        Ok(HandshakeState::Sending)
    }

    fn send(&mut self, now: Instant) -> HandshakeState {
        if let Some(pkts) = self.flights.clone() {
            self.write_packets(pkts);
        }

        if self.current_flight.is_last_send_flight() {
            self.current_retransmit_timer = None;
            HandshakeState::Finished
        } else {
            self.current_retransmit_timer = if self.current_flight.has_retransmit() {
                Some(now + self.retransmit_schedule.interval())
            } else {
                None
            };
            HandshakeState::Waiting
        }
    }

    fn wait(&mut self) -> Result<HandshakeState> {
        if self.handshake_rx.take().is_none() {
            return Ok(HandshakeState::Waiting);
        }

        trace!(
            "[handshake:{}] {} received handshake packets",
            srv_cli_str(self.state.is_client),
            self.current_flight
        );
        let result =
            self.current_flight
                .parse(&mut self.state, &self.cache, &self.handshake_config);
        match result {
            Err(flight_err) => {
                if flight_err.0.is_some() || flight_err.1.is_some() {
                    debug!(
                        "[handshake:{}] {} result alert:{:?}, err:{:?}",
                        srv_cli_str(self.state.is_client),
                        self.current_flight,
                        flight_err.0,
                        flight_err.1
                    );
                    return Err(self.flight_error(flight_err));
                }
                Ok(HandshakeState::Waiting)
            }
            Ok(next_flight) => {
                debug!(
                    "[handshake:{}] {} -> {}",
                    srv_cli_str(self.state.is_client),
                    self.current_flight,
                    next_flight
                );
                if next_flight == self.current_flight {
                    if next_flight.is_last_recv_flight() {
                        self.current_retransmit_timer = None;
                        return Ok(HandshakeState::Finished);
                    }
                    // the peer repeated its flight and ours carries no timer
                    return Ok(HandshakeState::Sending);
                }
                self.current_retransmit_timer = None;
                self.current_flight = next_flight;
                Ok(HandshakeState::Preparing)
            }
        }
    }

    fn finish(&mut self) -> Result<HandshakeState> {
        if self.handshake_rx.take().is_none() {
            return Ok(HandshakeState::Finished);
        }

        let result =
            self.current_flight
                .parse(&mut self.state, &self.cache, &self.handshake_config);
        match result {
            Err((None, None)) => Ok(HandshakeState::Finished),
            Err(flight_err) => Err(self.flight_error(flight_err)),
            Ok(_) if self.current_flight.is_last_send_flight() => {
                debug!(
                    "[handshake:{}] {} retransmit last flight",
                    srv_cli_str(self.state.is_client),
                    self.current_flight
                );
                Ok(HandshakeState::Sending)
            }
            Ok(_) => Ok(HandshakeState::Finished),
        }
    }

    /// Sends the alert of a failed flight and turns the failure into the
    /// error surfaced to the caller.
    fn flight_error(&mut self, (alert, err): FlightError) -> Error {
        self.current_handshake_state = HandshakeState::Errored;
        self.current_retransmit_timer = None;
        if let Some(alert) = alert {
            self.notify(alert.alert_level, alert.alert_description);
        }
        err.unwrap_or(Error::ErrAlertFatalOrClose)
    }

    pub(crate) fn handshake_timeout(&mut self, now: Instant) -> Result<()> {
        if self.current_handshake_state != HandshakeState::Waiting {
            return Ok(());
        }

        match self.retransmit_schedule.on_timeout() {
            Some(interval) => {
                debug!(
                    "[handshake:{}] {} retransmit {}/{}, next in {:?}",
                    srv_cli_str(self.state.is_client),
                    self.current_flight,
                    self.retransmit_schedule.count(),
                    self.handshake_config.maximum_retransmit_number,
                    interval,
                );
                self.current_handshake_state = HandshakeState::Sending;
                self.handshake(now)
            }
            None => {
                warn!(
                    "[handshake:{}] {} unanswered after {} retransmissions",
                    srv_cli_str(self.state.is_client),
                    self.current_flight,
                    self.handshake_config.maximum_retransmit_number,
                );
                self.current_handshake_state = HandshakeState::Errored;
                self.current_retransmit_timer = None;
                Err(Error::ErrHandshakeTimeout)
            }
        }
    }
}
