//! The coin flip and Magic 8 Ball, driven by quantum random bytes.

pub mod gate;

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use quantum_oracle::{
    magic_answer, AcquireError, Acquisition, CoinSide, Fetcher, FlipHistory, FlipStats,
    RandomByteAcquirer,
};

use crate::config::OracleConfig;
use crate::types::{OracleError, OracleResult};

pub use gate::{BusyFlag, BusyGuard, Cooldown};

/// Result of one coin flip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlipOutcome {
    pub side: CoinSide,
    pub value: u8,
    pub source: String,
    pub fallback: bool,
    pub at: DateTime<Utc>,
    pub stats: FlipStats,
}

/// Result of one Magic 8 Ball question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerOutcome {
    pub question: Option<String>,
    pub answer: String,
    pub value: u8,
    pub source: String,
    pub fallback: bool,
    pub at: DateTime<Utc>,
}

/// Runs user actions against two source chains, one action at a time.
pub struct Oracle {
    coin: RandomByteAcquirer,
    ball: RandomByteAcquirer,
    busy: BusyFlag,
    cooldown: Cooldown,
    history: Mutex<FlipHistory>,
}

impl Oracle {
    pub fn new(coin: RandomByteAcquirer, ball: RandomByteAcquirer) -> Self {
        Self {
            coin,
            ball,
            busy: BusyFlag::new(),
            cooldown: Cooldown::new(),
            history: Mutex::new(FlipHistory::new()),
        }
    }

    pub fn from_config(config: &OracleConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        let coin = RandomByteAcquirer::new(fetcher.clone(), config.coin_chain())
            .with_rate_limit_policy(config.coin_rate_limit)
            .with_exhaustion_policy(config.exhaustion);
        let ball = RandomByteAcquirer::new(fetcher, config.ball_chain())
            .with_rate_limit_policy(config.ball_rate_limit)
            .with_exhaustion_policy(config.exhaustion);
        Self::new(coin, ball)
    }

    pub fn coin_acquirer(&self) -> &RandomByteAcquirer {
        &self.coin
    }

    pub fn ball_acquirer(&self) -> &RandomByteAcquirer {
        &self.ball
    }

    /// Flip the coin: even byte is heads, odd is tails.
    pub async fn flip(&self) -> OracleResult<FlipOutcome> {
        let acquisition = self.draw(&self.coin).await?;
        let side = CoinSide::from_byte(acquisition.value);

        let stats = {
            let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
            history.record(side);
            history.stats()
        };

        tracing::info!(%side, value = acquisition.value, source = acquisition.label(), "coin flipped");

        Ok(FlipOutcome {
            side,
            value: acquisition.value,
            source: acquisition.label().to_string(),
            fallback: acquisition.provenance.is_fallback(),
            at: Utc::now(),
            stats,
        })
    }

    /// Shake the Magic 8 Ball.
    pub async fn ask(&self, question: Option<&str>) -> OracleResult<AnswerOutcome> {
        let acquisition = self.draw(&self.ball).await?;
        let answer = magic_answer(acquisition.value);

        tracing::info!(value = acquisition.value, source = acquisition.label(), "magic 8 ball answered");

        Ok(AnswerOutcome {
            question: question
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_string),
            answer: answer.to_string(),
            value: acquisition.value,
            source: acquisition.label().to_string(),
            fallback: acquisition.provenance.is_fallback(),
            at: Utc::now(),
        })
    }

    async fn draw(&self, acquirer: &RandomByteAcquirer) -> OracleResult<Acquisition> {
        if let Some(remaining_secs) = self.cooldown.remaining_secs() {
            return Err(OracleError::CoolingDown { remaining_secs });
        }

        let _guard = self.busy.try_acquire().ok_or(OracleError::Busy)?;

        match acquirer.acquire().await {
            Ok(acquisition) => Ok(acquisition),
            Err(e) => {
                if let AcquireError::RateLimited {
                    retry_after_secs, ..
                } = &e
                {
                    self.cooldown.start(*retry_after_secs);
                }
                Err(e.into())
            }
        }
    }

    /// Recent flips, newest first.
    pub fn history(&self) -> Vec<CoinSide> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .recent()
    }

    pub fn stats(&self) -> FlipStats {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .stats()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    pub fn cooldown_remaining(&self) -> Option<u64> {
        self.cooldown.remaining_secs()
    }
}
