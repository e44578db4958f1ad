pub mod candidate;

pub use candidate::RTCIceCandidateInit;
