use super::*;

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::BufReader;

#[derive(Clone, Debug)]
pub(crate) struct HandshakeCacheItem {
    typ: HandshakeType,
    is_client: bool,
    epoch: u16,
    message_sequence: u16,
    data: Vec<u8>,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct HandshakeCachePullRule {
    pub(crate) typ: HandshakeType,
    pub(crate) epoch: u16,
    pub(crate) is_client: bool,
    pub(crate) optional: bool,
}

impl HandshakeCachePullRule {
    pub(crate) fn new(typ: HandshakeType, epoch: u16, is_client: bool, optional: bool) -> Self {
        HandshakeCachePullRule {
            typ,
            epoch,
            is_client,
            optional,
        }
    }
}

/// Every complete handshake message sent or received, kept in wire form
/// for transcript hashing and Finished computation.
#[derive(Debug, Default)]
pub(crate) struct HandshakeCache {
    cache: Vec<HandshakeCacheItem>,
}

impl HandshakeCache {
    pub(crate) fn new() -> Self {
        HandshakeCache { cache: vec![] }
    }

    /// Returns false when a message with the same sender and sequence is cached.
    pub(crate) fn push(
        &mut self,
        data: Vec<u8>,
        epoch: u16,
        message_sequence: u16,
        typ: HandshakeType,
        is_client: bool,
    ) -> bool {
        if self
            .cache
            .iter()
            .any(|i| i.is_client == is_client && i.message_sequence == message_sequence)
        {
            return false;
        }

        self.cache.push(HandshakeCacheItem {
            typ,
            is_client,
            epoch,
            message_sequence,
            data,
        });

        true
    }

    /// Returns a list handshakes that match the requested rules.
    /// The list will contain null values for rules that have no match.
    pub(crate) fn pull(&self, rules: &[HandshakeCachePullRule]) -> Vec<Option<HandshakeCacheItem>> {
        let mut out = vec![];
        for r in rules {
            let mut item: Option<HandshakeCacheItem> = None;
            for c in &self.cache {
                if c.typ == r.typ && c.is_client == r.is_client && c.epoch == r.epoch {
                    match &item {
                        Some(x) if x.message_sequence >= c.message_sequence => {}
                        _ => item = Some(c.clone()),
                    }
                }
            }

            out.push(item);
        }

        out
    }

    /// Pulls and parses the messages matching `rules`. Messages must form
    /// a contiguous sequence starting after `start_seq`.
    pub(crate) fn full_pull_map(
        &self,
        start_seq: isize,
        rules: &[HandshakeCachePullRule],
    ) -> Result<(isize, HashMap<HandshakeType, HandshakeMessage>)> {
        let mut ci = HashMap::new();
        for r in rules {
            let mut item: Option<&HandshakeCacheItem> = None;
            for c in &self.cache {
                if c.typ == r.typ && c.is_client == r.is_client && c.epoch == r.epoch {
                    match item {
                        Some(x) if x.message_sequence >= c.message_sequence => {}
                        _ => item = Some(c),
                    }
                }
            }

            match item {
                Some(c) => {
                    ci.insert(r.typ, c);
                }
                None if r.optional => {}
                None => return Err(Error::ErrHandshakeMessageMissing),
            }
        }

        let mut out = HashMap::new();
        let mut seq = start_seq;
        for r in rules {
            let t = r.typ;
            if let Some(i) = ci.get(&t) {
                let mut reader = BufReader::new(i.data.as_slice());
                let raw_handshake = Handshake::unmarshal(&mut reader)?;
                if seq + 1 != raw_handshake.handshake_header.message_sequence as isize {
                    return Err(Error::ErrHandshakeMessageMissing);
                }
                seq += 1;
                out.insert(t, raw_handshake.handshake_message);
            }
        }

        Ok((seq, out))
    }

    /// Concatenates the wire form of every message matching `rules`.
    pub(crate) fn pull_and_merge(&self, rules: &[HandshakeCachePullRule]) -> Vec<u8> {
        let mut merged = vec![];

        for p in self.pull(rules).into_iter().flatten() {
            merged.extend_from_slice(&p.data);
        }

        merged
    }

    /// Transcript hash for the extended master secret. The cache supplies
    /// everything up to ServerHelloDone; `additional` carries the client's
    /// Certificate and ClientKeyExchange in wire form.
    /// <https://tools.ietf.org/html/rfc7627#section-4>
    pub(crate) fn session_hash(&self, epoch: u16, additional: &[u8]) -> Result<Vec<u8>> {
        let rules = [
            HandshakeCachePullRule::new(HandshakeType::ClientHello, epoch, true, false),
            HandshakeCachePullRule::new(HandshakeType::ServerHello, epoch, false, false),
            HandshakeCachePullRule::new(HandshakeType::Certificate, epoch, false, false),
            HandshakeCachePullRule::new(HandshakeType::ServerKeyExchange, epoch, false, false),
            HandshakeCachePullRule::new(HandshakeType::CertificateRequest, epoch, false, true),
            HandshakeCachePullRule::new(HandshakeType::ServerHelloDone, epoch, false, false),
        ];

        let mut merged = vec![];
        for (rule, item) in rules.iter().zip(self.pull(&rules)) {
            match item {
                Some(item) => merged.extend_from_slice(&item.data),
                None if rule.optional => {}
                None => return Err(Error::ErrHandshakeMessageMissing),
            }
        }
        merged.extend_from_slice(additional);

        let mut hasher = Sha256::new();
        hasher.update(&merged);
        Ok(hasher.finalize().to_vec())
    }
}
