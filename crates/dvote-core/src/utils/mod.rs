//! Small leaf utilities shared by the gateway clients and discovery.
//!
//! - [`random`]: OS-seeded random bytes, hex identifiers, scores and shuffling
//! - [`timeout`]: deadline wrapper producing a distinguished [`TimedOut`] failure
//! - [`hex`]: `0x`-prefixed hex parsing and formatting for chain values

pub mod hex;
pub mod random;
pub mod timeout;

pub use self::hex::{format_hex, parse_hex_array, parse_hex_bytes, parse_hex_u64};
pub use random::{random_bytes, random_hex, random_index, random_score, shuffle};
pub use timeout::{with_deadline, TimedOut};
