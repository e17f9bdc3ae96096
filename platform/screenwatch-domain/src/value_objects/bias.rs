use crate::value_objects::trend::StockTrend;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketBias {
    Bullish,
    Bearish,
    Neutral,
    #[default]
    Unknown,
}

impl MarketBias {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketBias::Bullish => "bullish",
            MarketBias::Bearish => "bearish",
            MarketBias::Neutral => "neutral",
            MarketBias::Unknown => "unknown",
        }
    }

    /// The stock trend a directional bias requires; `None` for neutral and unknown.
    pub fn required_trend(&self) -> Option<StockTrend> {
        match self {
            MarketBias::Bullish => Some(StockTrend::Bullish),
            MarketBias::Bearish => Some(StockTrend::Bearish),
            MarketBias::Neutral | MarketBias::Unknown => None,
        }
    }

    pub fn mirrored(&self) -> Self {
        match self {
            MarketBias::Bullish => MarketBias::Bearish,
            MarketBias::Bearish => MarketBias::Bullish,
            other => *other,
        }
    }
}

impl fmt::Display for MarketBias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketBias {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "bullish" => Ok(MarketBias::Bullish),
            "bearish" => Ok(MarketBias::Bearish),
            "neutral" => Ok(MarketBias::Neutral),
            "unknown" | "" => Ok(MarketBias::Unknown),
            _ => Err(format!("unsupported market bias: {value}")),
        }
    }
}
