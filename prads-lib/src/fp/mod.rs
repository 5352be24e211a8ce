//! Fingerprint primitives shared by the TCP, ICMP and UDP matchers: the
//! quirk bitset, TTL normalization, and window-size normalization.

mod quirks;
mod ttl;
mod wss;

pub use quirks::Quirks;
pub use ttl::normalize_ttl;
pub use wss::normalize_wss;
