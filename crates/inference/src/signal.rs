use serde::{Deserialize, Serialize};
use std::fmt;

/// Trading signal derived from a probability-like prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Signal {
    Buy,
    Sell,
}

impl Signal {
    pub fn from_prediction(p: f64) -> Self {
        if p > 0.5 {
            Signal::Buy
        } else {
            Signal::Sell
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signal::Buy => write!(f, "BUY"),
            Signal::Sell => write!(f, "SELL"),
        }
    }
}
