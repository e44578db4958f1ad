//! Session descriptions: the signaling wrapper, validation and answer
//! generation, plus helpers that pull transport parameters out of a parsed
//! description.

#[cfg(test)]
mod negotiation_test;

pub mod negotiation;
pub mod sdp_type;
pub mod session_description;
pub mod validation;

use ice::candidate::{Candidate, unmarshal_candidate};
use log::{debug, warn};
use sdp::description::common::Attribute;
use sdp::description::session::{ATTR_KEY_FINGERPRINT, ATTR_KEY_MID, ICE_OPTION_DTLS_IN_STUN};
use sdp::{MediaDescription, SessionDescription};
use shared::error::{Error, Result};

use crate::peer_connection::transport::dtls::fingerprint::RTCDtlsFingerprint;
use crate::peer_connection::transport::dtls::parameters::DTLSParameters;
use crate::peer_connection::transport::dtls::role::RTCDtlsRole;
pub use sdp_type::RTCSdpType;
pub use session_description::RTCSessionDescription;

/// Negotiation state shared by every description of one session.
///
/// Sections arriving without `a=mid` are numbered from a counter that only
/// ever grows, so a later renegotiation never reuses an earlier mid.
#[derive(Default, Debug, Clone)]
pub struct SdpSessionContext {
    next_mid: usize,
}

impl SdpSessionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next mid not in `taken`.
    pub fn next_mid(&mut self, taken: &[&str]) -> String {
        loop {
            let mid = self.next_mid.to_string();
            self.next_mid += 1;
            if !taken.contains(&mid.as_str()) {
                return mid;
            }
        }
    }

    /// Keeps the counter ahead of a numeric mid this session already uses.
    pub fn observe_mid(&mut self, mid: &str) {
        if let Ok(n) = mid.parse::<usize>()
            && n >= self.next_mid
        {
            self.next_mid = n + 1;
        }
    }

    /// Assigns a mid to every section that lacks one and returns how many
    /// were assigned. BUNDLE group membership is left untouched.
    pub fn backfill_mids(&mut self, desc: &mut SessionDescription) -> usize {
        let taken: Vec<String> = desc
            .media_descriptions
            .iter()
            .filter_map(|m| m.mid().map(str::to_owned))
            .collect();
        let taken_refs: Vec<&str> = taken.iter().map(String::as_str).collect();

        let mut assigned = 0;
        for m in &mut desc.media_descriptions {
            if m.mid().is_some() {
                continue;
            }
            let mid = self.next_mid(&taken_refs);
            debug!("[sdp] backfilled mid {} for {} section", mid, m.media_name.media);
            set_mid(m, mid);
            assigned += 1;
        }
        assigned
    }
}

fn set_mid(m: &mut MediaDescription, mid: String) {
    m.attributes
        .insert(0, Attribute::new(ATTR_KEY_MID.to_owned(), Some(mid)));
}

/// Fingerprints asserted at session level and by every section that was not
/// rejected, without duplicates. Two different digests for one algorithm
/// are a conflict.
pub(crate) fn extract_fingerprints(desc: &SessionDescription) -> Result<Vec<RTCDtlsFingerprint>> {
    let session = desc
        .attributes
        .iter()
        .filter(|a| a.key == ATTR_KEY_FINGERPRINT)
        .filter_map(|a| a.value.as_deref());
    let media = desc
        .media_descriptions
        .iter()
        .filter(|m| !m.is_rejected())
        .flat_map(|m| m.fingerprints());

    let mut fingerprints: Vec<RTCDtlsFingerprint> = vec![];
    for value in session.chain(media) {
        let fp = RTCDtlsFingerprint::unmarshal(value)?;
        let same_algorithm = fingerprints.iter().find(|f| f.algorithm == fp.algorithm);
        match same_algorithm {
            Some(existing) if existing.digest()? == fp.digest()? => {}
            Some(_) => return Err(Error::ErrSessionDescriptionConflictingFingerprints),
            None => fingerprints.push(fp),
        }
    }

    if fingerprints.is_empty() {
        return Err(Error::ErrSessionDescriptionNoFingerprint);
    }
    Ok(fingerprints)
}

/// Role and fingerprints a remote description asserts.
pub(crate) fn extract_dtls_parameters(desc: &SessionDescription) -> Result<DTLSParameters> {
    Ok(DTLSParameters {
        role: RTCDtlsRole::from(desc),
        fingerprints: extract_fingerprints(desc)?,
    })
}

/// Remote ICE credentials and candidates. Candidates of rejected sections
/// are ignored, unparsable ones are skipped.
pub(crate) fn extract_ice_details(
    desc: &SessionDescription,
) -> Result<(String, String, Vec<Candidate>)> {
    let (ufrag, pwd) = desc.ice_credentials();
    let ufrag = ufrag
        .filter(|u| !u.is_empty())
        .ok_or(Error::ErrSessionDescriptionMissingIceUfrag)?;
    let pwd = pwd
        .filter(|p| !p.is_empty())
        .ok_or(Error::ErrSessionDescriptionMissingIcePwd)?;

    let mut candidates = vec![];
    for (index, value) in desc.candidates() {
        if desc.media_descriptions[index].is_rejected() {
            continue;
        }
        match unmarshal_candidate(value) {
            Ok(c) => candidates.push(c),
            Err(err) => warn!("[sdp] skipped candidate {value}: {err}"),
        }
    }

    Ok((ufrag.to_owned(), pwd.to_owned(), candidates))
}

/// Whether the description offers carrying DTLS inside STUN checks.
pub(crate) fn offers_dtls_piggyback(desc: &SessionDescription) -> bool {
    desc.has_ice_option(ICE_OPTION_DTLS_IN_STUN)
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;

    const FP_A: &str = "sha-256 AA:BB:CC";
    const FP_B: &str = "sha-256 AA:BB:CD";

    fn parse(s: &str) -> Result<SessionDescription> {
        SessionDescription::unmarshal(&mut Cursor::new(s.as_bytes()))
    }

    fn two_sections(fp1: &str, fp2: &str, second_port: u16) -> String {
        format!(
            "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n\
             a=ice-options:trickle dtls-in-stun\r\n\
             m=audio 9 UDP/TLS/RTP/SAVPF 111\r\na=ice-ufrag:uf\r\na=ice-pwd:pw\r\n\
             a=fingerprint:{fp1}\r\n\
             a=candidate:1 1 udp 2130706431 10.0.0.1 5000 typ host\r\n\
             m=video {second_port} UDP/TLS/RTP/SAVPF 96\r\na=fingerprint:{fp2}\r\n\
             a=candidate:2 1 udp 2130706431 10.0.0.2 5000 typ host\r\n"
        )
    }

    #[test]
    fn test_backfill_mids() -> Result<()> {
        let mut ctx = SdpSessionContext::new();
        let mut desc = parse(&two_sections(FP_A, FP_A, 9))?;
        assert_eq!(ctx.backfill_mids(&mut desc), 2);
        assert_eq!(desc.media_descriptions[0].mid(), Some("0"));
        assert_eq!(desc.media_descriptions[1].mid(), Some("1"));

        // a later description of the same session continues the count
        let mut desc = parse(&two_sections(FP_A, FP_A, 9))?;
        ctx.backfill_mids(&mut desc);
        assert_eq!(desc.media_descriptions[0].mid(), Some("2"));

        // mids already present are skipped by the counter
        let mut ctx = SdpSessionContext::new();
        let mut desc = parse(&two_sections(FP_A, FP_A, 9))?;
        set_mid(&mut desc.media_descriptions[1], "0".to_owned());
        assert_eq!(ctx.backfill_mids(&mut desc), 1);
        assert_eq!(desc.media_descriptions[0].mid(), Some("1"));

        ctx.observe_mid("7");
        assert_eq!(ctx.next_mid(&[]), "8");
        ctx.observe_mid("audio");
        assert_eq!(ctx.next_mid(&[]), "9");

        Ok(())
    }

    #[test]
    fn test_extract_fingerprints() -> Result<()> {
        let desc = parse(&two_sections(FP_A, "SHA-256 aa:bb:cc", 9))?;
        let fps = extract_fingerprints(&desc)?;
        assert_eq!(fps.len(), 1);
        assert_eq!(fps[0].algorithm, "sha-256");

        let desc = parse(&two_sections(FP_A, FP_B, 9))?;
        assert_eq!(
            extract_fingerprints(&desc),
            Err(Error::ErrSessionDescriptionConflictingFingerprints)
        );

        // a rejected section does not take part
        let desc = parse(&two_sections(FP_A, FP_B, 0))?;
        assert_eq!(extract_fingerprints(&desc)?.len(), 1);

        let desc = parse("v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 0\r\n")?;
        assert_eq!(
            extract_fingerprints(&desc),
            Err(Error::ErrSessionDescriptionNoFingerprint)
        );
        Ok(())
    }

    #[test]
    fn test_extract_ice_details() -> Result<()> {
        let desc = parse(&two_sections(FP_A, FP_A, 9))?;
        let (ufrag, pwd, candidates) = extract_ice_details(&desc)?;
        assert_eq!(ufrag, "uf");
        assert_eq!(pwd, "pw");
        assert_eq!(candidates.len(), 2);
        assert!(offers_dtls_piggyback(&desc));

        let desc = parse(&two_sections(FP_A, FP_A, 0))?;
        let (_, _, candidates) = extract_ice_details(&desc)?;
        assert_eq!(candidates.len(), 1);

        let desc = parse("v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\nm=audio 9 UDP/TLS/RTP/SAVPF 0\r\na=ice-pwd:pw\r\n")?;
        assert_eq!(
            extract_ice_details(&desc).map(|_| ()),
            Err(Error::ErrSessionDescriptionMissingIceUfrag)
        );
        assert!(!offers_dtls_piggyback(&desc));
        Ok(())
    }
}
