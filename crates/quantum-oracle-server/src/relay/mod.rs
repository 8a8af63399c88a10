//! Server-side relay for providers that browsers cannot call directly.
//!
//! LfD does not send CORS headers, so front-ends fetch it through
//! `GET /api/quantum-random?source=lfd`, which answers with the same JSON
//! envelope the ANU API uses.

use std::sync::Arc;

use serde_json::Value;

use quantum_oracle::{
    AcquireError, ErrorBody, ExhaustionPolicy, Fetcher, RandomByteAcquirer, RateLimitPolicy,
    RelayEnvelope, SourceEndpoint, DEFAULT_RETRY_AFTER_SECS, RELAY_TYPE_LFD, RELAY_TYPE_PSEUDO,
};

use crate::types::error::status_codes;

/// The only source the relay serves.
pub const RELAY_SOURCE: &str = "lfd";

/// Status and JSON body to send back, independent of the HTTP framework.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayReply {
    pub status: u16,
    pub body: Value,
    /// Set when the byte is a local substitute rather than LfD output.
    pub fallback: bool,
}

impl RelayReply {
    fn json<T: serde::Serialize>(status: u16, body: &T, fallback: bool) -> Self {
        Self {
            status,
            body: serde_json::to_value(body).unwrap_or(Value::Null),
            fallback,
        }
    }
}

/// Calls LfD on behalf of a client and reshapes the answer.
pub struct Relay {
    upstream: RandomByteAcquirer,
}

impl Relay {
    /// With `fallback`, an unreachable or throttled LfD yields a flagged
    /// pseudo-random byte instead of a 503.
    pub fn new(fetcher: Arc<dyn Fetcher>, upstream: SourceEndpoint, fallback: bool) -> Self {
        let (rate_limit, exhaustion) = if fallback {
            (RateLimitPolicy::FallThrough, ExhaustionPolicy::PseudoRandom)
        } else {
            (RateLimitPolicy::Abort, ExhaustionPolicy::Fail)
        };
        Self {
            upstream: RandomByteAcquirer::new(fetcher, vec![upstream])
                .with_rate_limit_policy(rate_limit)
                .with_exhaustion_policy(exhaustion),
        }
    }

    pub fn upstream(&self) -> &SourceEndpoint {
        &self.upstream.sources()[0]
    }

    /// Handle one relay request. A missing or empty `source` means `lfd`.
    pub async fn handle(&self, source: Option<&str>) -> RelayReply {
        let source = source.filter(|s| !s.is_empty()).unwrap_or(RELAY_SOURCE);
        if source != RELAY_SOURCE {
            tracing::debug!(source, "relay asked for unsupported source");
            return RelayReply::json(
                status_codes::BAD_REQUEST,
                &ErrorBody::new("Use client-side calls for this source", None),
                false,
            );
        }

        match self.upstream.acquire().await {
            Ok(acquisition) if acquisition.provenance.is_fallback() => {
                tracing::warn!(value = acquisition.value, "relay serving pseudo-random substitute");
                RelayReply::json(
                    200,
                    &RelayEnvelope::single(acquisition.value, RELAY_TYPE_PSEUDO),
                    true,
                )
            }
            Ok(acquisition) => RelayReply::json(
                200,
                &RelayEnvelope::single(acquisition.value, RELAY_TYPE_LFD),
                false,
            ),
            Err(e) => {
                tracing::error!("Error fetching quantum random number: {e}");
                let (message, retry_after) = describe_failure(&e);
                RelayReply::json(
                    status_codes::SERVICE_UNAVAILABLE,
                    &ErrorBody::new(message, retry_after),
                    false,
                )
            }
        }
    }
}

fn describe_failure(e: &AcquireError) -> (String, Option<u64>) {
    match e {
        AcquireError::RateLimited { .. } => (
            format!("LfD API {e}"),
            Some(DEFAULT_RETRY_AFTER_SECS),
        ),
        AcquireError::Exhausted { failures } => {
            let message = failures
                .first()
                .map(|f| format!("LfD API failed: {}", f.error))
                .unwrap_or_else(|| e.to_string());
            (message, None)
        }
        AcquireError::NoSources => (e.to_string(), None),
    }
}
