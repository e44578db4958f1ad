use super::*;
use crate::rand::generate_cand_id;

/// The config required to create a new server reflexive candidate.
#[derive(Default)]
pub struct CandidateServerReflexiveConfig {
    pub base_config: CandidateConfig,

    pub rel_addr: String,
    pub rel_port: u16,

    /// URL of the STUN server the mapping was learned from.
    pub url: Option<String>,
}

impl CandidateServerReflexiveConfig {
    /// Creates a new server reflexive candidate.
    pub fn new_candidate_server_reflexive(self) -> Result<Candidate> {
        let mut candidate_id = self.base_config.candidate_id;
        if candidate_id.is_empty() {
            candidate_id = generate_cand_id();
        }

        let (ip, network_type) =
            resolve_network_type(&self.base_config.network, &self.base_config.address)?;
        let resolved_addr = SocketAddr::new(ip, self.base_config.port);
        let base_addr = match self.base_config.base_address {
            Some(base) => base,
            None => self
                .rel_addr
                .parse::<IpAddr>()
                .map(|rel_ip| SocketAddr::new(rel_ip, self.rel_port))
                .unwrap_or(resolved_addr),
        };

        Ok(Candidate {
            id: candidate_id,
            network_type,
            candidate_type: CandidateType::ServerReflexive,
            address: self.base_config.address,
            port: self.base_config.port,
            resolved_addr,
            base_addr,
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
