use crate::value_objects::bias::MarketBias;
use crate::value_objects::trend::StockTrend;
use serde::{Deserialize, Serialize};

/// One result row as produced by the extraction collaborator, still in source formatting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub symbol: String,
    pub price: String,
    pub change: String,
    pub volume: String,
}

impl RawRecord {
    pub fn new(
        symbol: impl Into<String>,
        price: impl Into<String>,
        change: impl Into<String>,
        volume: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            price: price.into(),
            change: change.into(),
            volume: volume.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockObservation {
    pub symbol: String,
    #[serde(default)]
    pub price: f64,
    #[serde(rename = "change", alias = "change_pct", default)]
    pub change_pct: f64,
    #[serde(default)]
    pub volume: u64,
    #[serde(rename = "stock_trend", alias = "trend", default)]
    pub trend: StockTrend,
    #[serde(rename = "screener_type", alias = "source_id", default)]
    pub source_id: String,
    #[serde(default)]
    pub market_bias: MarketBias,
}

impl StockObservation {
    pub fn with_market_bias(&self, bias: MarketBias) -> Self {
        Self {
            market_bias: bias,
            ..self.clone()
        }
    }
}
