//! Configuration loading and resolution.
//!
//! Every setting resolves in the same order: explicit CLI value, then the
//! `QUANTUM_ORACLE_*` environment variable, then the built-in default.

use std::collections::HashMap;
use std::time::Duration;

use quantum_oracle::{
    ExhaustionPolicy, RandomSource, RateLimitPolicy, SourceEndpoint, UnknownSource,
};

use crate::types::{OracleError, OracleResult};

/// Direct LfD timeout inside the coin chain. The relay keeps the 10s default.
pub const COIN_LFD_TIMEOUT: Duration = Duration::from_secs(8);

pub const ENV_ADDR: &str = "QUANTUM_ORACLE_ADDR";
pub const ENV_PROXY_URL: &str = "QUANTUM_ORACLE_PROXY_URL";
pub const ENV_COIN_SOURCES: &str = "QUANTUM_ORACLE_COIN_SOURCES";
pub const ENV_BALL_SOURCES: &str = "QUANTUM_ORACLE_BALL_SOURCES";
pub const ENV_FALLBACK: &str = "QUANTUM_ORACLE_FALLBACK";
pub const ENV_RATE_LIMIT: &str = "QUANTUM_ORACLE_RATE_LIMIT";
pub const ENV_RELAY_FALLBACK: &str = "QUANTUM_ORACLE_RELAY_FALLBACK";

pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Resolve the HTTP listen address.
pub fn resolve_addr(explicit: Option<&str>) -> String {
    if let Some(addr) = explicit {
        return addr.to_string();
    }

    if let Ok(env_addr) = std::env::var(ENV_ADDR) {
        return env_addr;
    }

    DEFAULT_ADDR.to_string()
}

/// Environment variable overriding a source's URL.
pub fn url_env_var(source: RandomSource) -> Option<&'static str> {
    match source {
        RandomSource::AnuBinary => Some("QUANTUM_ORACLE_ANU_BINARY_URL"),
        RandomSource::AnuJson => Some("QUANTUM_ORACLE_ANU_JSON_URL"),
        RandomSource::Lfd => Some("QUANTUM_ORACLE_LFD_URL"),
        RandomSource::LfdProxy => None,
    }
}

/// Parse a comma-separated list of source identifiers.
pub fn parse_source_list(s: &str) -> Result<Vec<RandomSource>, UnknownSource> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::parse)
        .collect()
}

pub fn parse_exhaustion_policy(s: &str) -> OracleResult<ExhaustionPolicy> {
    match s.trim().to_ascii_lowercase().as_str() {
        "fail" | "none" | "off" => Ok(ExhaustionPolicy::Fail),
        "pseudo" | "pseudo_random" | "prng" | "on" => Ok(ExhaustionPolicy::PseudoRandom),
        other => Err(OracleError::Config(format!(
            "unknown fallback policy '{other}' (expected 'fail' or 'pseudo')"
        ))),
    }
}

pub fn parse_rate_limit_policy(s: &str) -> OracleResult<RateLimitPolicy> {
    match s.trim().to_ascii_lowercase().as_str() {
        "abort" | "stop" => Ok(RateLimitPolicy::Abort),
        "continue" | "fall_through" | "fallthrough" => Ok(RateLimitPolicy::FallThrough),
        other => Err(OracleError::Config(format!(
            "unknown rate limit policy '{other}' (expected 'abort' or 'continue')"
        ))),
    }
}

fn parse_bool(key: &str, s: &str) -> OracleResult<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(OracleError::Config(format!("{key}: expected a boolean, got '{other}'"))),
    }
}

/// Settings for both source chains and the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleConfig {
    /// Base URL of a relay server. Without one, `lfd_proxy` resolves to `lfd`.
    pub proxy_url: Option<String>,
    pub coin_sources: Vec<RandomSource>,
    pub ball_sources: Vec<RandomSource>,
    pub coin_rate_limit: RateLimitPolicy,
    pub ball_rate_limit: RateLimitPolicy,
    pub exhaustion: ExhaustionPolicy,
    /// Serve a pseudo-random byte from the relay when LfD is unreachable.
    pub relay_fallback: bool,
    pub url_overrides: HashMap<RandomSource, String>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            coin_sources: vec![RandomSource::AnuJson, RandomSource::Lfd],
            ball_sources: vec![RandomSource::AnuBinary, RandomSource::LfdProxy],
            coin_rate_limit: RateLimitPolicy::Abort,
            ball_rate_limit: RateLimitPolicy::FallThrough,
            exhaustion: ExhaustionPolicy::Fail,
            relay_fallback: false,
            url_overrides: HashMap::new(),
        }
    }
}

impl OracleConfig {
    /// Load from the process environment.
    pub fn from_env() -> OracleResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to read variables.
    pub fn from_lookup<F>(lookup: F) -> OracleResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_PROXY_URL).filter(|u| !u.trim().is_empty()) {
            config.proxy_url = Some(url);
        }
        if let Some(list) = lookup(ENV_COIN_SOURCES) {
            config.coin_sources = parse_source_list(&list)?;
        }
        if let Some(list) = lookup(ENV_BALL_SOURCES) {
            config.ball_sources = parse_source_list(&list)?;
        }
        if let Some(policy) = lookup(ENV_FALLBACK) {
            config.exhaustion = parse_exhaustion_policy(&policy)?;
        }
        if let Some(policy) = lookup(ENV_RATE_LIMIT) {
            let policy = parse_rate_limit_policy(&policy)?;
            config.coin_rate_limit = policy;
            config.ball_rate_limit = policy;
        }
        if let Some(flag) = lookup(ENV_RELAY_FALLBACK) {
            config.relay_fallback = parse_bool(ENV_RELAY_FALLBACK, &flag)?;
        }
        for source in RandomSource::ALL {
            if let Some(url) = url_env_var(source).and_then(&lookup) {
                config.url_overrides.insert(source, url);
            }
        }

        Ok(config)
    }

    /// Resolve one source to an endpoint.
    ///
    /// `lfd_proxy` needs a relay base URL; without one it degrades to a direct
    /// LfD call, which a native client can make without a relay.
    pub fn endpoint(&self, source: RandomSource) -> SourceEndpoint {
        if source == RandomSource::LfdProxy {
            return match &self.proxy_url {
                Some(base) => SourceEndpoint::relay(base),
                None => self.endpoint(RandomSource::Lfd),
            };
        }

        let url = self
            .url_overrides
            .get(&source)
            .map(String::as_str)
            .or_else(|| source.default_url())
            .unwrap_or_default();
        SourceEndpoint::new(source, url)
    }

    fn chain(&self, sources: &[RandomSource]) -> Vec<SourceEndpoint> {
        let mut chain: Vec<SourceEndpoint> = Vec::with_capacity(sources.len());
        for source in sources {
            let endpoint = self.endpoint(*source);
            if !chain.iter().any(|e| e.url == endpoint.url) {
                chain.push(endpoint);
            }
        }
        chain
    }

    pub fn coin_chain(&self) -> Vec<SourceEndpoint> {
        self.chain(&self.coin_sources)
            .into_iter()
            .map(|e| match e.source {
                RandomSource::Lfd => e.with_timeout(COIN_LFD_TIMEOUT),
                _ => e,
            })
            .collect()
    }

    pub fn ball_chain(&self) -> Vec<SourceEndpoint> {
        self.chain(&self.ball_sources)
    }

    /// The LfD endpoint the relay calls server-side.
    pub fn relay_upstream(&self) -> SourceEndpoint {
        self.endpoint(RandomSource::Lfd)
    }
}
