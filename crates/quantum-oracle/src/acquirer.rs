//! Ordered-fallback acquisition of a single random byte.
//!
//! Sources are tried strictly one after another. The first source whose
//! response parses wins; the rest are never contacted.

use std::sync::Arc;

use crate::fetch::{FetchResponse, Fetcher};
use crate::parse::parse_payload;
use crate::types::{
    AcquireError, AcquireResult, Acquisition, Provenance, RandomSource, SourceEndpoint,
    SourceError, SourceFailure, ANU_RATE_LIMIT_MARKER, DEFAULT_RETRY_AFTER_SECS,
    MAX_RETRY_AFTER_SECS,
};

/// What to do when a source signals that it is rate limiting us.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitPolicy {
    /// Stop immediately and report [`AcquireError::RateLimited`].
    #[default]
    Abort,
    /// Treat it like any other failure and try the next source.
    FallThrough,
}

/// What to do when every source failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExhaustionPolicy {
    /// Report [`AcquireError::Exhausted`].
    #[default]
    Fail,
    /// Substitute a locally generated byte tagged [`Provenance::PseudoRandom`].
    PseudoRandom,
}

/// Obtains one byte of remote randomness from a prioritized list of sources.
#[derive(Clone)]
pub struct RandomByteAcquirer {
    fetcher: Arc<dyn Fetcher>,
    sources: Vec<SourceEndpoint>,
    rate_limit: RateLimitPolicy,
    exhaustion: ExhaustionPolicy,
}

impl RandomByteAcquirer {
    pub fn new(fetcher: Arc<dyn Fetcher>, sources: Vec<SourceEndpoint>) -> Self {
        Self {
            fetcher,
            sources,
            rate_limit: RateLimitPolicy::default(),
            exhaustion: ExhaustionPolicy::default(),
        }
    }

    pub fn with_rate_limit_policy(mut self, policy: RateLimitPolicy) -> Self {
        self.rate_limit = policy;
        self
    }

    pub fn with_exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.exhaustion = policy;
        self
    }

    pub fn sources(&self) -> &[SourceEndpoint] {
        &self.sources
    }

    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        self.rate_limit
    }

    pub fn exhaustion_policy(&self) -> ExhaustionPolicy {
        self.exhaustion
    }

    /// Try each source in order and return the first byte obtained.
    pub async fn acquire(&self) -> AcquireResult<Acquisition> {
        if self.sources.is_empty() {
            return Err(AcquireError::NoSources);
        }

        let mut failures = Vec::with_capacity(self.sources.len());

        for endpoint in &self.sources {
            tracing::debug!(source = %endpoint.source, url = %endpoint.url, "querying random source");

            match self.attempt(endpoint).await {
                Ok(value) => {
                    tracing::info!(
                        source = %endpoint.source,
                        "quantum byte generated using {}",
                        endpoint.source.label()
                    );
                    return Ok(Acquisition {
                        value,
                        provenance: Provenance::Remote(endpoint.source),
                    });
                }
                Err(SourceError::RateLimited { retry_after_secs })
                    if self.rate_limit == RateLimitPolicy::Abort =>
                {
                    tracing::warn!(
                        source = %endpoint.source,
                        retry_after_secs,
                        "source rate limited, aborting fallback chain"
                    );
                    return Err(AcquireError::RateLimited {
                        origin: endpoint.source,
                        retry_after_secs,
                    });
                }
                Err(error) => {
                    tracing::warn!(source = %endpoint.source, "random source failed: {error}");
                    failures.push(SourceFailure {
                        source: endpoint.source,
                        error,
                    });
                }
            }
        }

        match self.exhaustion {
            ExhaustionPolicy::Fail => {
                tracing::error!(attempts = failures.len(), "all random sources failed");
                Err(AcquireError::Exhausted { failures })
            }
            ExhaustionPolicy::PseudoRandom => {
                tracing::warn!(
                    attempts = failures.len(),
                    "all random sources failed, substituting pseudo-random byte"
                );
                Ok(Acquisition {
                    value: rand::random::<u8>(),
                    provenance: Provenance::PseudoRandom,
                })
            }
        }
    }

    async fn attempt(&self, endpoint: &SourceEndpoint) -> Result<u8, SourceError> {
        let response = self.fetcher.get(&endpoint.url, endpoint.timeout).await?;
        interpret(endpoint, &response)
    }
}

/// Turn a raw response into a byte or the reason this source failed.
pub fn interpret(endpoint: &SourceEndpoint, response: &FetchResponse) -> Result<u8, SourceError> {
    if let Some(retry_after_secs) = rate_limit_signal(endpoint.source, response) {
        return Err(SourceError::RateLimited { retry_after_secs });
    }

    if !response.is_success() {
        return Err(SourceError::Status(response.status));
    }

    parse_payload(endpoint.format, &response.body)
}

fn rate_limit_signal(source: RandomSource, response: &FetchResponse) -> Option<u64> {
    let retry = response
        .retry_after
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
        .min(MAX_RETRY_AFTER_SECS);
    if response.status == 429 {
        return Some(retry);
    }
    // ANU reports its per-minute quota as a plain 500.
    if source == RandomSource::AnuJson
        && response.status == 500
        && response.body.contains(ANU_RATE_LIMIT_MARKER)
    {
        return Some(retry);
    }
    None
}
