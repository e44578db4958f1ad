use super::*;
use crate::rand::generate_cand_id;

/// The config required to create a new host candidate.
#[derive(Default)]
pub struct CandidateHostConfig {
    pub base_config: CandidateConfig,
}

impl CandidateHostConfig {
    /// Creates a new host candidate. The address may be an mDNS `.local`
    /// name, in which case `base_address` carries the real socket address.
    pub fn new_candidate_host(self) -> Result<Candidate> {
        let mut candidate_id = self.base_config.candidate_id;
        if candidate_id.is_empty() {
            candidate_id = generate_cand_id();
        }

        let mut c = Candidate {
            id: candidate_id,
            address: self.base_config.address.clone(),
            candidate_type: CandidateType::Host,
            component: self.base_config.component,
            port: self.base_config.port,
            foundation_override: self.base_config.foundation,
            priority_override: self.base_config.priority,
            network: self.base_config.network.clone(),
            network_type: NetworkType::Udp4,
            ..Candidate::default()
        };

        if is_multicast_dns_name(&self.base_config.address) {
            if let Some(base) = self.base_config.base_address {
                c.network_type = determine_network_type(&self.base_config.network, &base.ip())?;
                c.resolved_addr = base;
                c.base_addr = base;
            }
        } else {
            let (ip, network_type) =
                resolve_network_type(&self.base_config.network, &self.base_config.address)?;
            c.network_type = network_type;
            c.resolved_addr = SocketAddr::new(ip, self.base_config.port);
            c.base_addr = self.base_config.base_address.unwrap_or(c.resolved_addr);
        }

        Ok(c)
    }
}
