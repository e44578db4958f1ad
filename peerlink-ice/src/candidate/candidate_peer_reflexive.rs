use super::*;
use crate::rand::generate_cand_id;

/// The config required to create a new peer reflexive candidate.
#[derive(Default)]
pub struct CandidatePeerReflexiveConfig {
    pub base_config: CandidateConfig,

    pub rel_addr: String,
    pub rel_port: u16,
}

impl CandidatePeerReflexiveConfig {
    /// Creates a new peer reflexive candidate.
    pub fn new_candidate_peer_reflexive(self) -> Result<Candidate> {
        let mut candidate_id = self.base_config.candidate_id;
        if candidate_id.is_empty() {
            candidate_id = generate_cand_id();
        }

        let (ip, network_type) =
            resolve_network_type(&self.base_config.network, &self.base_config.address)?;
        let resolved_addr = SocketAddr::new(ip, self.base_config.port);

        let related_address = if self.rel_addr.is_empty() {
            None
        } else {
            Some(CandidateRelatedAddress {
                address: self.rel_addr,
                port: self.rel_port,
            })
        };

        Ok(Candidate {
            id: candidate_id,
            network_type,
            candidate_type: CandidateType::PeerReflexive,
            address: self.base_config.address,
            port: self.base_config.port,
            resolved_addr,
            base_addr: self.base_config.base_address.unwrap_or(resolved_addr),
            component: self.base_config.component,
            foundation_override: self.base_config.foundation,
            priority_override: self.base_config.priority,
            network: self.base_config.network,
            related_address,
            ..Candidate::default()
        })
    }
}
