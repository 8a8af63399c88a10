//! Quantum Oracle: quantum random byte acquisition with ordered source fallback,
//! and the mapping from a random byte to a coin side or Magic 8 Ball answer.

pub mod acquirer;
pub mod fetch;
pub mod outcome;
pub mod parse;
pub mod types;

pub use acquirer::{ExhaustionPolicy, RandomByteAcquirer, RateLimitPolicy};
pub use fetch::{FetchResponse, Fetcher, HttpFetcher, USER_AGENT};
pub use outcome::{magic_answer, CoinSide, FlipHistory, FlipStats, HISTORY_CAPACITY, MAGIC_ANSWERS};
pub use parse::{
    parse_binary_digits, parse_decimal_array, parse_envelope, parse_hex_byte, parse_lfd_hex,
    parse_payload,
};
pub use types::*;
