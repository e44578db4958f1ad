use stun::attributes::ATTR_USE_CANDIDATE;
use stun::message::*;

use shared::error::*;

/// Represents USE-CANDIDATE attribute.
#[derive(Default, PartialEq, Eq, Debug, Copy, Clone)]
pub struct UseCandidateAttr;

impl Setter for UseCandidateAttr {
    /// Adds USE-CANDIDATE attribute to message.
    fn add_to(&self, m: &mut Message) -> Result<()> {
        m.add(ATTR_USE_CANDIDATE, &[]);
        Ok(())
    }
}

impl UseCandidateAttr {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Returns true if USE-CANDIDATE attribute is set.
    #[must_use]
    pub fn is_set(m: &Message) -> bool {
        m.contains(ATTR_USE_CANDIDATE)
    }
}
