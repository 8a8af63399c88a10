//! Mapping a random byte to something a user sees.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of most recent flips kept in [`FlipHistory`].
pub const HISTORY_CAPACITY: usize = 10;

/// Magic 8 Ball answers. The first ten are affirmative.
pub const MAGIC_ANSWERS: [&str; 20] = [
    "Yes, definitely",
    "Without a doubt",
    "Yes",
    "Most likely",
    "Quite possibly",
    "Signs point to yes",
    "Yes, try again",
    "My answer is yes",
    "You may rely on it",
    "Yes, in due time",
    "I don't think so",
    "Very doubtful",
    "Don't count on it",
    "Better not tell you now",
    "Cannot predict now",
    "Concentrate and ask again",
    "My sources say no",
    "Outlook not so good",
    "No",
    "Definitely not",
];

/// Pick the Magic 8 Ball answer for a byte.
pub fn magic_answer(value: u8) -> &'static str {
    MAGIC_ANSWERS[value as usize % MAGIC_ANSWERS.len()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoinSide {
    Heads,
    Tails,
}

impl CoinSide {
    /// Even bytes are heads, odd bytes tails.
    pub fn from_byte(value: u8) -> Self {
        if value % 2 == 0 {
            CoinSide::Heads
        } else {
            CoinSide::Tails
        }
    }
}

impl fmt::Display for CoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoinSide::Heads => f.write_str("heads"),
            CoinSide::Tails => f.write_str("tails"),
        }
    }
}

/// Counts over the recorded flips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlipStats {
    pub heads: usize,
    pub tails: usize,
    pub total: usize,
}

/// The most recent flips, newest first.
#[derive(Debug, Clone, Default)]
pub struct FlipHistory {
    flips: VecDeque<CoinSide>,
}

impl FlipHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a flip, dropping the oldest once the capacity is reached.
    pub fn record(&mut self, side: CoinSide) {
        self.flips.push_front(side);
        self.flips.truncate(HISTORY_CAPACITY);
    }

    pub fn recent(&self) -> Vec<CoinSide> {
        self.flips.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.flips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flips.is_empty()
    }

    pub fn stats(&self) -> FlipStats {
        let heads = self.flips.iter().filter(|s| **s == CoinSide::Heads).count();
        FlipStats {
            heads,
            tails: self.flips.len() - heads,
            total: self.flips.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coin_parity() {
        assert_eq!(CoinSide::from_byte(0), CoinSide::Heads);
        assert_eq!(CoinSide::from_byte(1), CoinSide::Tails);
        assert_eq!(CoinSide::from_byte(254), CoinSide::Heads);
        assert_eq!(CoinSide::from_byte(255), CoinSide::Tails);
    }

    #[test]
    fn test_magic_answer_wraps() {
        assert_eq!(magic_answer(0), "Yes, definitely");
        assert_eq!(magic_answer(19), "Definitely not");
        assert_eq!(magic_answer(20), magic_answer(0));
        assert_eq!(magic_answer(255), MAGIC_ANSWERS[15]);
    }

    #[test]
    fn test_history_keeps_newest_ten() {
        let mut history = FlipHistory::new();
        history.record(CoinSide::Tails);
        for _ in 0..HISTORY_CAPACITY {
            history.record(CoinSide::Heads);
        }

        assert_eq!(history.len(), HISTORY_CAPACITY);
        assert!(history.recent().iter().all(|s| *s == CoinSide::Heads));
    }

    #[test]
    fn test_history_newest_first_and_stats() {
        let mut history = FlipHistory::new();
        history.record(CoinSide::Heads);
        history.record(CoinSide::Tails);
        history.record(CoinSide::Tails);

        assert_eq!(history.recent()[0], CoinSide::Tails);
        assert_eq!(history.recent()[2], CoinSide::Heads);
        assert_eq!(
            history.stats(),
            FlipStats {
                heads: 1,
                tails: 2,
                total: 3
            }
        );
    }

    #[test]
    fn test_coin_side_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&CoinSide::Heads).unwrap(), "\"heads\"");
    }
}
