//! Core data types for random sources, acquisitions and their failures.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry hint used when a rate-limited source does not send `Retry-After`.
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Upper bound on any retry hint taken from an upstream `Retry-After`.
pub const MAX_RETRY_AFTER_SECS: u64 = 3600;

/// Body fragment the ANU JSON API returns (with HTTP 500) when throttling.
pub const ANU_RATE_LIMIT_MARKER: &str = "1 requests per minute";

/// Path of the local relay route.
pub const RELAY_PATH: &str = "/api/quantum-random";

/// Envelope `type` tag for bytes relayed from LfD.
pub const RELAY_TYPE_LFD: &str = "uint8_lfd";

/// Envelope `type` tag for locally generated substitute bytes.
pub const RELAY_TYPE_PSEUDO: &str = "uint8_pseudo";

/// A remote provider of random bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomSource {
    /// ANU binary stream: one byte as eight `0`/`1` characters.
    AnuBinary,
    /// ANU JSON API: `{"success": true, "data": [N]}`.
    AnuJson,
    /// LfD QRNG called directly: `{"qrn": "hh", "length": 1}`.
    Lfd,
    /// LfD QRNG reached through the local relay route.
    LfdProxy,
}

impl RandomSource {
    pub const ALL: [RandomSource; 4] = [
        RandomSource::AnuBinary,
        RandomSource::AnuJson,
        RandomSource::Lfd,
        RandomSource::LfdProxy,
    ];

    /// Stable identifier used in configuration and on the command line.
    pub fn id(&self) -> &'static str {
        match self {
            RandomSource::AnuBinary => "anu_binary",
            RandomSource::AnuJson => "anu_json",
            RandomSource::Lfd => "lfd",
            RandomSource::LfdProxy => "lfd_proxy",
        }
    }

    /// Human-readable provenance label.
    pub fn label(&self) -> &'static str {
        match self {
            RandomSource::AnuBinary => "ANU Binary Stream",
            RandomSource::AnuJson => "ANU QRNG",
            RandomSource::Lfd => "LfD QRNG",
            RandomSource::LfdProxy => "LfD QRNG (proxy)",
        }
    }

    pub fn format(&self) -> ResponseFormat {
        match self {
            RandomSource::AnuBinary => ResponseFormat::BinaryDigits,
            RandomSource::AnuJson => ResponseFormat::DecimalArray,
            RandomSource::Lfd => ResponseFormat::HexJson,
            RandomSource::LfdProxy => ResponseFormat::Envelope,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        match self {
            RandomSource::AnuBinary | RandomSource::AnuJson => Duration::from_secs(8),
            RandomSource::Lfd => Duration::from_secs(10),
            // Wraps the 10s upstream call made by the relay.
            RandomSource::LfdProxy => Duration::from_secs(15),
        }
    }

    /// Public endpoint for the source. The relay has no fixed address.
    pub fn default_url(&self) -> Option<&'static str> {
        match self {
            RandomSource::AnuBinary => {
                Some("https://qrng.anu.edu.au/wp-content/plugins/colours-plugin/get_one_binary.php")
            }
            RandomSource::AnuJson => Some("https://qrng.anu.edu.au/API/jsonI.php?length=1&type=uint8"),
            RandomSource::Lfd => Some("https://lfdr.de/qrng_api/qrng?length=1&format=HEX"),
            RandomSource::LfdProxy => None,
        }
    }
}

impl fmt::Display for RandomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for RandomSource {
    type Err = UnknownSource;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        RandomSource::ALL
            .into_iter()
            .find(|source| source.id() == normalized)
            .ok_or_else(|| UnknownSource(s.to_string()))
    }
}

/// Error returned when a source identifier is not recognized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown random source '{0}' (expected one of: anu_binary, anu_json, lfd, lfd_proxy)")]
pub struct UnknownSource(pub String);

/// How a source encodes its byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// Plain text, exactly eight `0`/`1` characters.
    BinaryDigits,
    /// JSON `{"success": true, "data": [N]}`.
    DecimalArray,
    /// JSON `{"qrn": "hh", "length": 1}`.
    HexJson,
    /// Relay envelope, same shape as [`ResponseFormat::DecimalArray`].
    Envelope,
}

/// Where and how to query one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEndpoint {
    pub source: RandomSource,
    pub url: String,
    pub format: ResponseFormat,
    pub timeout: Duration,
}

impl SourceEndpoint {
    /// Endpoint at `url` with the source's own format and timeout.
    pub fn new(source: RandomSource, url: impl Into<String>) -> Self {
        Self {
            source,
            url: url.into(),
            format: source.format(),
            timeout: source.default_timeout(),
        }
    }

    /// Endpoint at the source's public URL, if it has one.
    pub fn default_for(source: RandomSource) -> Option<Self> {
        source.default_url().map(|url| Self::new(source, url))
    }

    /// Relay endpoint under the given server base URL.
    pub fn relay(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self::new(RandomSource::LfdProxy, format!("{base}{RELAY_PATH}?source=lfd"))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Where an acquired byte came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "source")]
pub enum Provenance {
    Remote(RandomSource),
    /// Locally generated substitute after every source failed.
    PseudoRandom,
}

impl Provenance {
    pub fn label(&self) -> &'static str {
        match self {
            Provenance::Remote(source) => source.label(),
            Provenance::PseudoRandom => "Pseudo-random fallback",
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Provenance::PseudoRandom)
    }
}

/// A successfully acquired random byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acquisition {
    pub value: u8,
    pub provenance: Provenance,
}

impl Acquisition {
    pub fn label(&self) -> &'static str {
        self.provenance.label()
    }
}

/// Why a single source did not yield a byte.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed payload: {0}")]
    Malformed(String),

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
}

impl SourceError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SourceError::RateLimited { .. })
    }
}

/// One failed attempt within an acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    pub source: RandomSource,
    pub error: SourceError,
}

impl fmt::Display for SourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source.label(), self.error)
    }
}

/// Terminal outcome of an acquisition that produced no byte.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    #[error("no random sources configured")]
    NoSources,

    #[error("{origin} rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited {
        origin: RandomSource,
        retry_after_secs: u64,
    },

    #[error("all quantum random sources are unavailable")]
    Exhausted { failures: Vec<SourceFailure> },
}

impl AcquireError {
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            AcquireError::RateLimited {
                retry_after_secs, ..
            } => Some(*retry_after_secs),
            _ => None,
        }
    }

    /// Per-source failures recorded before giving up.
    pub fn failures(&self) -> &[SourceFailure] {
        match self {
            AcquireError::Exhausted { failures } => failures,
            _ => &[],
        }
    }
}

pub type AcquireResult<T> = Result<T, AcquireError>;

/// Successful body of the relay route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    pub success: bool,
    pub data: Vec<u8>,
    pub length: usize,
    #[serde(rename = "type")]
    pub kind: String,
}

impl RelayEnvelope {
    pub fn single(value: u8, kind: &str) -> Self {
        Self {
            success: true,
            data: vec![value],
            length: 1,
            kind: kind.to_string(),
        }
    }
}

/// Error body shared by the relay and the game endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(rename = "retryAfter")]
    pub retry_after: Option<u64>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>, retry_after: Option<u64>) -> Self {
        Self {
            success: false,
            error: error.into(),
            retry_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_ids_round_trip_through_from_str() {
        for source in RandomSource::ALL {
            assert_eq!(source.id().parse::<RandomSource>().unwrap(), source);
        }
    }

    #[test]
    fn test_source_from_str_is_lenient() {
        assert_eq!("ANU-JSON".parse::<RandomSource>().unwrap(), RandomSource::AnuJson);
        assert_eq!(" lfd ".parse::<RandomSource>().unwrap(), RandomSource::Lfd);
        assert!("random.org".parse::<RandomSource>().is_err());
    }

    #[test]
    fn test_timeouts_within_bounds() {
        for source in RandomSource::ALL {
            let secs = source.default_timeout().as_secs();
            assert!((8..=15).contains(&secs), "{source} timeout {secs}s");
        }
    }

    #[test]
    fn test_relay_endpoint_url() {
        let endpoint = SourceEndpoint::relay("http://127.0.0.1:3000/");
        assert_eq!(
            endpoint.url,
            "http://127.0.0.1:3000/api/quantum-random?source=lfd"
        );
        assert_eq!(endpoint.format, ResponseFormat::Envelope);
        assert!(SourceEndpoint::default_for(RandomSource::LfdProxy).is_none());
    }

    #[test]
    fn test_envelope_serializes_type_field() {
        let json = serde_json::to_value(RelayEnvelope::single(42, RELAY_TYPE_LFD)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "data": [42], "length": 1, "type": "uint8_lfd"})
        );
    }

    #[test]
    fn test_error_body_uses_camel_case_retry() {
        let json = serde_json::to_value(ErrorBody::new("boom", None)).unwrap();
        assert_eq!(json["retryAfter"], serde_json::Value::Null);
        assert_eq!(json["success"], false);
    }
}
