//! Consistency checks applied to every description before it is used.
//!
//! Hard failures come back as [`Error::ErrInvalidParameter`] (or
//! [`Error::ErrDuplicateLocalSsrc`] for local munging). Everything that is
//! tolerated lands in the [`ValidationReport`].

use std::collections::HashMap;
use std::ops::RangeInclusive;

use log::{debug, warn};
use sdp::util::{
    SEMANTIC_TOKEN_BUNDLE, SEMANTIC_TOKEN_FLOW_IDENTIFICATION,
    SEMANTIC_TOKEN_FORWARD_ERROR_CORRECTION_FRAMEWORK, SEMANTIC_TOKEN_SIMULCAST,
};
use sdp::{MediaDescription, SessionDescription};
use shared::error::{Error, Result};

use crate::peer_connection::configuration::bundle_policy::BundlePayloadTypePolicy;

/// Longest mid accepted.
pub const MAX_MID_LENGTH: usize = 16;

/// Largest number of SSRCs in one `SIM` group.
pub const MAX_SIMULCAST_LAYERS: usize = 4;

/// Payload types that clash with RTCP packet types once RTP and RTCP share
/// a port (RFC 5761 4).
pub const RTCP_MUX_RESERVED_PAYLOAD_TYPES: RangeInclusive<u8> = 64..=95;

/// Which side produced the description under validation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DescriptionSource {
    Local,
    Remote,
}

/// Two sections of one BUNDLE group mapping a payload type to different
/// formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadTypeCollision {
    pub payload_type: u8,
    pub first_mid: String,
    pub second_mid: String,
    /// At least one of the sections is rejected.
    pub tolerated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub rejected_mids: Vec<String>,
    /// False once two active bundled sections collide on a payload type.
    pub valid_bundled_payload_types: bool,
    pub payload_type_collisions: Vec<PayloadTypeCollision>,
    /// BUNDLE members naming no section.
    pub unknown_bundle_mids: Vec<String>,
    /// (mid, payload type) pairs inside the rtcp-mux reserved range.
    pub rtcp_mux_payload_type_conflicts: Vec<(String, u8)>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        ValidationReport {
            rejected_mids: vec![],
            valid_bundled_payload_types: true,
            payload_type_collisions: vec![],
            unknown_bundle_mids: vec![],
            rtcp_mux_payload_type_conflicts: vec![],
        }
    }
}

fn label(index: usize, m: &MediaDescription) -> String {
    m.mid()
        .map(str::to_owned)
        .unwrap_or_else(|| format!("#{index}"))
}

fn invalid(reason: String) -> Error {
    Error::ErrInvalidParameter(reason)
}

/// Validates `desc` and reports what was tolerated.
pub fn validate_session_description(
    desc: &SessionDescription,
    source: DescriptionSource,
    policy: BundlePayloadTypePolicy,
) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();

    for (index, m) in desc.media_descriptions.iter().enumerate() {
        if let Some(mid) = m.mid()
            && mid.len() > MAX_MID_LENGTH
        {
            return Err(invalid(format!(
                "mid {mid} is longer than {MAX_MID_LENGTH} characters"
            )));
        }

        if m.is_rejected() {
            report.rejected_mids.push(label(index, m));
            continue;
        }

        validate_ssrc_groups(m, &label(index, m))?;

        if m.is_rtcp_mux() {
            for pt in m
                .media_name
                .formats
                .iter()
                .filter_map(|f| f.parse::<u8>().ok())
                .filter(|pt| RTCP_MUX_RESERVED_PAYLOAD_TYPES.contains(pt))
            {
                warn!(
                    "[sdp] payload type {} of section {} is reserved with rtcp-mux",
                    pt,
                    label(index, m)
                );
                report
                    .rtcp_mux_payload_type_conflicts
                    .push((label(index, m), pt));
            }
        }
    }

    if source == DescriptionSource::Local {
        validate_local_ssrcs(desc)?;
    }

    for (semantics, mids) in desc.groups() {
        if semantics != SEMANTIC_TOKEN_BUNDLE {
            continue;
        }

        let mut sections = vec![];
        for mid in mids {
            match desc
                .media_descriptions
                .iter()
                .position(|m| m.mid() == Some(mid))
            {
                Some(index) => sections.push(index),
                None => {
                    debug!("[sdp] BUNDLE names unknown mid {mid}");
                    report.unknown_bundle_mids.push(mid.to_owned());
                }
            }
        }

        validate_bundle(desc, &sections, policy, &mut report)?;
    }

    Ok(report)
}

fn validate_ssrc_groups(m: &MediaDescription, mid: &str) -> Result<()> {
    let ssrcs = m.ssrcs()?;
    for group in m.ssrc_groups()? {
        let semantics = group.semantics.as_str();
        match semantics {
            SEMANTIC_TOKEN_FLOW_IDENTIFICATION | SEMANTIC_TOKEN_FORWARD_ERROR_CORRECTION_FRAMEWORK => {
                if group.ssrcs.len() != 2 {
                    return Err(invalid(format!(
                        "{semantics} group of section {mid} has {} ssrcs, expected 2",
                        group.ssrcs.len()
                    )));
                }
            }
            SEMANTIC_TOKEN_SIMULCAST => {
                if group.ssrcs.len() > MAX_SIMULCAST_LAYERS {
                    return Err(invalid(format!(
                        "SIM group of section {mid} has {} ssrcs, at most {MAX_SIMULCAST_LAYERS} allowed",
                        group.ssrcs.len()
                    )));
                }
            }
            _ => continue,
        }

        if let Some(missing) = group.ssrcs.iter().find(|s| !ssrcs.contains(s)) {
            return Err(invalid(format!(
                "{semantics} group of section {mid} names unknown ssrc {missing}"
            )));
        }
    }
    Ok(())
}

/// Primary SSRCs may appear once per section and in one section only.
fn validate_local_ssrcs(desc: &SessionDescription) -> Result<()> {
    let mut owners: HashMap<u32, usize> = HashMap::new();
    for (index, m) in desc.media_descriptions.iter().enumerate() {
        if m.is_rejected() {
            continue;
        }
        for ssrc in m.primary_ssrcs()? {
            if owners.insert(ssrc, index).is_some() {
                warn!("[sdp] local description reuses ssrc {ssrc}");
                return Err(Error::ErrDuplicateLocalSsrc(ssrc));
            }
        }
    }
    Ok(())
}

fn validate_bundle(
    desc: &SessionDescription,
    sections: &[usize],
    policy: BundlePayloadTypePolicy,
    report: &mut ValidationReport,
) -> Result<()> {
    let mut ssrc_owner: HashMap<u32, String> = HashMap::new();
    let mut extmap_uris: HashMap<isize, String> = HashMap::new();

    for &index in sections {
        let m = &desc.media_descriptions[index];
        if m.is_rejected() {
            continue;
        }
        let mid = label(index, m);

        for ssrc in m.ssrcs()? {
            if let Some(owner) = ssrc_owner.insert(ssrc, mid.clone()) {
                return Err(invalid(format!(
                    "ssrc {ssrc} is used by bundled sections {owner} and {mid}"
                )));
            }
        }

        for extmap in m.extmaps()? {
            let uri = extmap.uri_str().to_owned();
            match extmap_uris.get(&extmap.value) {
                Some(bound) if *bound != uri => {
                    return Err(invalid(format!(
                        "extmap id {} is bound to {bound} and {uri} in one BUNDLE group",
                        extmap.value
                    )));
                }
                Some(_) => {}
                None => {
                    extmap_uris.insert(extmap.value, uri);
                }
            }
        }
    }

    for (i, &first) in sections.iter().enumerate() {
        for &second in &sections[i + 1..] {
            check_payload_types(desc, first, second, policy, report)?;
        }
    }
    Ok(())
}

fn check_payload_types(
    desc: &SessionDescription,
    first: usize,
    second: usize,
    policy: BundlePayloadTypePolicy,
    report: &mut ValidationReport,
) -> Result<()> {
    let (a, b) = (
        &desc.media_descriptions[first],
        &desc.media_descriptions[second],
    );
    let tolerated = a.is_rejected() || b.is_rejected();

    // a rejected section's codecs are never used, so a malformed list there
    // only drops it from the diagnostic
    let codecs = |m: &MediaDescription| -> Result<Vec<sdp::util::Codec>> {
        match m.codecs() {
            Ok(codecs) => Ok(codecs),
            Err(_) if m.is_rejected() => Ok(vec![]),
            Err(err) => Err(err),
        }
    };
    let (codecs_a, codecs_b) = (codecs(a)?, codecs(b)?);

    for ca in &codecs_a {
        let Some(cb) = codecs_b.iter().find(|c| c.payload_type == ca.payload_type) else {
            continue;
        };
        if ca.same_format(cb) {
            continue;
        }

        let collision = PayloadTypeCollision {
            payload_type: ca.payload_type,
            first_mid: label(first, a),
            second_mid: label(second, b),
            tolerated,
        };
        if tolerated {
            debug!("[sdp] tolerated payload type collision {collision:?}");
        } else {
            warn!("[sdp] payload type collision {collision:?}");
            if policy == BundlePayloadTypePolicy::Reject {
                return Err(invalid(format!(
                    "payload type {} maps to {} in {} and {} in {}",
                    ca.payload_type, ca.name, collision.first_mid, cb.name, collision.second_mid
                )));
            }
            report.valid_bundled_payload_types = false;
        }
        report.payload_type_collisions.push(collision);
    }
    Ok(())
}
