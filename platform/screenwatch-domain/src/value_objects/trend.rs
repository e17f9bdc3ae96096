use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StockTrend {
    Bullish,
    Bearish,
    #[default]
    Unknown,
}

impl StockTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockTrend::Bullish => "bullish",
            StockTrend::Bearish => "bearish",
            StockTrend::Unknown => "unknown",
        }
    }
}

impl fmt::Display for StockTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
