#[cfg(test)]
mod transaction_test;

use bytes::BytesMut;
use log::trace;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use crate::message::TransactionId;
use shared::error::{Error, Result};
use shared::{TaggedBytesMut, TransportContext};

/// Initial retransmission timeout (RTO) for STUN over UDP.
pub const DEFAULT_RTO: Duration = Duration::from_millis(250);
/// Ceiling of the doubling retransmission interval.
pub const DEFAULT_MAX_RTO: Duration = Duration::from_millis(8000);
/// Retransmissions after the initial send; 9 requests in total.
pub const DEFAULT_MAX_RETRANSMITS: u16 = 8;

/// RtxPolicy describes the retransmission envelope of a client transaction.
///
/// With the defaults a transaction sends at 0, 250, 750, 1750, 3750, 7750,
/// 15750, 23750 and 31750 ms and times out at 39750 ms.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RtxPolicy {
    pub rto: Duration,
    pub max_rto: Duration,
    pub max_retransmits: u16,
}

impl Default for RtxPolicy {
    fn default() -> Self {
        Self {
            rto: DEFAULT_RTO,
            max_rto: DEFAULT_MAX_RTO,
            max_retransmits: DEFAULT_MAX_RETRANSMITS,
        }
    }
}

impl RtxPolicy {
    /// total_timeout is the time from the first send until the transaction times out.
    pub fn total_timeout(&self) -> Duration {
        let mut total = Duration::ZERO;
        let mut interval = self.rto;
        for _ in 0..=self.max_retransmits {
            total += interval;
            interval = std::cmp::min(interval * 2, self.max_rto);
        }
        total
    }
}

/// Transaction is an outstanding client request awaiting its response.
pub struct Transaction<T> {
    pub transaction_id: TransactionId,
    pub tag: T,
    pub transport: TransportContext,
    pub started: Instant,
    raw: BytesMut,
    n_rtx: u16,
    interval: Duration,
    timeout: Instant,
}

impl<T> Transaction<T> {
    // retries returns the number of retransmission it has made
    pub fn retries(&self) -> u16 {
        self.n_rtx
    }
}

/// TransactionEvent reports transactions that exhausted their envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionEvent<T> {
    Timeout(TransactionId, T),
}

/// TransactionMap tracks client transactions, their retransmissions and timeouts.
/// The tag carries caller bookkeeping (e.g. which server a request went to).
pub struct TransactionMap<T> {
    policy: RtxPolicy,
    tr_map: HashMap<TransactionId, Transaction<T>>,
    transmits: VecDeque<TaggedBytesMut>,
    events: VecDeque<TransactionEvent<T>>,
}

impl<T: Clone> TransactionMap<T> {
    pub fn new(policy: RtxPolicy) -> Self {
        Self {
            policy,
            tr_map: HashMap::new(),
            transmits: VecDeque::new(),
            events: VecDeque::new(),
        }
    }

    pub fn policy(&self) -> RtxPolicy {
        self.policy
    }

    /// start registers a transaction and queues its first transmission.
    pub fn start(
        &mut self,
        now: Instant,
        transaction_id: TransactionId,
        tag: T,
        raw: &[u8],
        transport: TransportContext,
    ) -> Result<()> {
        if self.tr_map.contains_key(&transaction_id) {
            return Err(Error::ErrTransactionExists);
        }

        let raw = BytesMut::from(raw);
        self.transmits.push_back(TaggedBytesMut {
            now,
            transport,
            message: raw.clone(),
        });
        self.tr_map.insert(
            transaction_id,
            Transaction {
                transaction_id,
                tag,
                transport,
                started: now,
                raw,
                n_rtx: 0,
                interval: self.policy.rto,
                timeout: now + self.policy.rto,
            },
        );
        Ok(())
    }

    /// finish removes the transaction matching a received response.
    pub fn finish(&mut self, transaction_id: &TransactionId) -> Option<Transaction<T>> {
        self.tr_map.remove(transaction_id)
    }

    pub fn contains(&self, transaction_id: &TransactionId) -> bool {
        self.tr_map.contains_key(transaction_id)
    }

    /// cancel drops every transaction matching the predicate without a timeout event.
    pub fn cancel_if(&mut self, mut f: impl FnMut(&Transaction<T>) -> bool) -> usize {
        let before = self.tr_map.len();
        self.tr_map.retain(|_, tr| !f(tr));
        before - self.tr_map.len()
    }

    /// any reports whether an outstanding transaction matches the predicate.
    pub fn any(&self, mut f: impl FnMut(&Transaction<T>) -> bool) -> bool {
        self.tr_map.values().any(|tr| f(tr))
    }

    // delete_all deletes all transactions
    pub fn delete_all(&mut self) {
        self.tr_map.clear();
        self.transmits.clear();
    }

    pub fn size(&self) -> usize {
        self.tr_map.len()
    }

    pub fn poll_timeout(&self) -> Option<Instant> {
        self.tr_map.values().map(|tr| tr.timeout).min()
    }

    pub fn handle_timeout(&mut self, now: Instant) {
        let mut expired = vec![];
        for (id, tr) in self.tr_map.iter_mut() {
            if tr.timeout > now {
                continue;
            }
            if tr.n_rtx >= self.policy.max_retransmits {
                expired.push(*id);
                continue;
            }

            tr.n_rtx += 1;
            tr.interval = std::cmp::min(tr.interval * 2, self.policy.max_rto);
            tr.timeout = now + tr.interval;

            trace!(
                "retransmitting transaction {} to {} (n_rtx={})",
                id, tr.transport.peer_addr, tr.n_rtx
            );
            self.transmits.push_back(TaggedBytesMut {
                now,
                transport: tr.transport,
                message: tr.raw.clone(),
            });
        }

        for id in expired {
            if let Some(tr) = self.tr_map.remove(&id) {
                self.events
                    .push_back(TransactionEvent::Timeout(tr.transaction_id, tr.tag));
            }
        }
    }

    pub fn poll_transmit(&mut self) -> Option<TaggedBytesMut> {
        self.transmits.pop_front()
    }

    pub fn poll_event(&mut self) -> Option<TransactionEvent<T>> {
        self.events.pop_front()
    }
}
