use std::fmt;

use serde::{Deserialize, Serialize};

/// What validation does when two active sections of one BUNDLE group map
/// the same payload type to different codecs.
///
/// Demultiplexing a bundled transport by payload type is ambiguous in that
/// case. Many deployed endpoints still produce such offers, so the default
/// only records the collision.
#[derive(Default, Debug, PartialEq, Eq, Copy, Clone, Serialize, Deserialize)]
pub enum BundlePayloadTypePolicy {
    /// Keep the description and report the collision.
    #[default]
    #[serde(rename = "record")]
    Record,

    /// Refuse the description with an invalid-parameter error.
    #[serde(rename = "reject")]
    Reject,
}

const BUNDLE_PAYLOAD_TYPE_POLICY_RECORD_STR: &str = "record";
const BUNDLE_PAYLOAD_TYPE_POLICY_REJECT_STR: &str = "reject";

impl From<&str> for BundlePayloadTypePolicy {
    fn from(raw: &str) -> Self {
        match raw {
            BUNDLE_PAYLOAD_TYPE_POLICY_REJECT_STR => BundlePayloadTypePolicy::Reject,
            _ => BundlePayloadTypePolicy::Record,
        }
    }
}

impl fmt::Display for BundlePayloadTypePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match *self {
            BundlePayloadTypePolicy::Record => BUNDLE_PAYLOAD_TYPE_POLICY_RECORD_STR,
            BundlePayloadTypePolicy::Reject => BUNDLE_PAYLOAD_TYPE_POLICY_REJECT_STR,
        };
        write!(f, "{s}")
    }
}
