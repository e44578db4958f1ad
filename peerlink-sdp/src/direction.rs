use std::fmt;

/// Direction is a marker for transmission direction of an endpoint
#[derive(Default, Debug, PartialEq, Eq, Clone, Copy)]
pub enum Direction {
    #[default]
    Unspecified = 0,
    /// Direction::Sendrecv is for bidirectional communication
    Sendrecv = 1,
    /// Direction::Sendonly is for outgoing communication
    Sendonly = 2,
    /// Direction::Recvonly is for incoming communication
    Recvonly = 3,
    /// Direction::Inactive is for no communication
    Inactive = 4,
}

const DIRECTION_SEND_RECV_STR: &str = "sendrecv";
const DIRECTION_SEND_ONLY_STR: &str = "sendonly";
const DIRECTION_RECV_ONLY_STR: &str = "recvonly";
const DIRECTION_INACTIVE_STR: &str = "inactive";
const DIRECTION_UNSPECIFIED_STR: &str = "Unspecified";

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Sendrecv => DIRECTION_SEND_RECV_STR,
            Direction::Sendonly => DIRECTION_SEND_ONLY_STR,
            Direction::Recvonly => DIRECTION_RECV_ONLY_STR,
            Direction::Inactive => DIRECTION_INACTIVE_STR,
            _ => DIRECTION_UNSPECIFIED_STR,
        };
        write!(f, "{s}")
    }
}

impl Direction {
    /// new defines a procedure for creating a new direction from a raw string.
    pub fn new(raw: &str) -> Self {
        match raw {
            DIRECTION_SEND_RECV_STR => Direction::Sendrecv,
            DIRECTION_SEND_ONLY_STR => Direction::Sendonly,
            DIRECTION_RECV_ONLY_STR => Direction::Recvonly,
            DIRECTION_INACTIVE_STR => Direction::Inactive,
            _ => Direction::Unspecified,
        }
    }

    /// The direction an answerer uses for an offered direction (RFC 3264 6.1).
    pub fn reverse(self) -> Self {
        match self {
            Direction::Sendonly => Direction::Recvonly,
            Direction::Recvonly => Direction::Sendonly,
            d => d,
        }
    }
}
