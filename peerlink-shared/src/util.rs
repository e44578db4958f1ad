use rand::{Rng, rng};

// match_range is a MatchFunc that accepts packets with the first byte in [lower..upper]
fn match_range(lower: u8, upper: u8) -> impl Fn(&[u8]) -> bool {
    move |buf: &[u8]| -> bool {
        if buf.is_empty() {
            return false;
        }
        let b = buf[0];
        b >= lower && b <= upper
    }
}

/// MatchFuncs as described in RFC7983
/// <https://tools.ietf.org/html/rfc7983>
///              +----------------+
///              |        [0..3] -+--> forward to STUN
///              |                |
///              |      [20..63] -+--> forward to DTLS
///              |                |
///              |    [128..191] -+--> forward to SRTP/SRTCP
///              +----------------+
/// match_stun accepts packets with the first byte in [0..3]
pub fn match_stun(b: &[u8]) -> bool {
    match_range(0, 3)(b)
}

/// match_dtls accepts packets with the first byte in [20..63]
pub fn match_dtls(b: &[u8]) -> bool {
    match_range(20, 63)(b)
}

// match_srtp_or_srtcp accepts packets with the first byte in [128..191],
// i.e. the RTP version 2 bit pattern
pub fn match_srtp_or_srtcp(b: &[u8]) -> bool {
    match_range(128, 191)(b)
}

pub fn is_rtcp(buf: &[u8]) -> bool {
    // Not long enough to determine RTP/RTCP
    if buf.len() < 4 {
        return false;
    }

    let rtcp_packet_type = buf[1];
    (192..=223).contains(&rtcp_packet_type)
}

/// match_srtp only matches SRTP and not SRTCP
pub fn match_srtp(buf: &[u8]) -> bool {
    match_srtp_or_srtcp(buf) && !is_rtcp(buf)
}

/// match_srtcp only matches SRTCP and not SRTP
pub fn match_srtcp(buf: &[u8]) -> bool {
    match_srtp_or_srtcp(buf) && is_rtcp(buf)
}

const RUNES_ALPHA: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const RUNES_ALPHA_NUMBER: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// math_rand_alpha generates a random alphabet sequence of the requested length.
pub fn math_rand_alpha(n: usize) -> String {
    generate_crypto_random_string(n, RUNES_ALPHA)
}

/// math_rand_alpha_number generates a random alphanumeric sequence of the requested length.
pub fn math_rand_alpha_number(n: usize) -> String {
    generate_crypto_random_string(n, RUNES_ALPHA_NUMBER)
}

/// generate_crypto_random_string draws n runes from the thread-local CSPRNG.
pub fn generate_crypto_random_string(n: usize, runes: &[u8]) -> String {
    let mut rng = rng();

    (0..n)
        .map(|_| {
            let idx = rng.random_range(0..runes.len());
            runes[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rfc7983_ranges() {
        let stun = [0x00u8, 0x01, 0x00, 0x00];
        let dtls = [22u8, 0xfe, 0xfd];
        let rtp = [0x80u8, 96, 0, 1];
        let rtcp = [0x80u8, 200, 0, 1];

        assert!(match_stun(&stun));
        assert!(!match_dtls(&stun));
        assert!(match_dtls(&dtls));
        assert!(!match_stun(&dtls));
        assert!(match_srtp(&rtp));
        assert!(!match_srtcp(&rtp));
        assert!(match_srtcp(&rtcp));
        assert!(!match_stun(&[]));
    }

    #[test]
    fn test_random_string_alphabet() {
        let s = math_rand_alpha_number(64);
        assert_eq!(s.len(), 64);
        assert!(s.bytes().all(|b| RUNES_ALPHA_NUMBER.contains(&b)));
    }
}
