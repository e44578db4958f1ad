use serde::{Deserialize, Serialize};

use super::fingerprint::*;
use super::role::*;

/// What the remote description asserts about its DTLS endpoint.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DTLSParameters {
    pub role: RTCDtlsRole,
    pub fingerprints: Vec<RTCDtlsFingerprint>,
}
