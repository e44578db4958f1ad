use super::*;
use crate::rand::generate_cand_id;

/// The config required to create a new relay candidate. Relay candidates are
/// only ever learned from the remote description; no TURN allocation is made.
#[derive(Default)]
pub struct CandidateRelayConfig {
    pub base_config: CandidateConfig,

    pub rel_addr: String,
    pub rel_port: u16,

    pub url: Option<String>,
}

impl CandidateRelayConfig {
    /// Creates a new relay candidate.
    pub fn new_candidate_relay(self) -> Result<Candidate> {
        let mut candidate_id = self.base_config.candidate_id;
        if candidate_id.is_empty() {
            candidate_id = generate_cand_id();
        }

        let (ip, network_type) =
            resolve_network_type(&self.base_config.network, &self.base_config.address)?;
        let resolved_addr = SocketAddr::new(ip, self.base_config.port);

        Ok(Candidate {
            id: candidate_id,
            network_type,
            candidate_type: CandidateType::Relay,
            address: self.base_config.address,
            port: self.base_config.port,
            resolved_addr,
            base_addr: self.base_config.base_address.unwrap_or(resolved_addr),
            component: self.base_config.component,
            foundation_override: self.base_config.foundation,
            priority_override: self.base_config.priority,
            network: self.base_config.network,
            related_address: Some(CandidateRelatedAddress {
                address: self.rel_addr,
                port: self.rel_port,
            }),
            url: self.url,
            ..Candidate::default()
        })
    }
}
