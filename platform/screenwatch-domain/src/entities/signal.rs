use crate::value_objects::bias::MarketBias;
use crate::value_objects::trend::StockTrend;
use serde::{Deserialize, Serialize};

/// A symbol confirmed by two or more sources in the same cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedSignal {
    pub symbol: String,
    #[serde(default)]
    pub price: f64,
    #[serde(rename = "change", alias = "change_pct", default)]
    pub change_pct: f64,
    #[serde(default)]
    pub volume: u64,
    #[serde(rename = "stock_trend", alias = "trend", default)]
    pub trend: StockTrend,
    #[serde(default)]
    pub market_bias: MarketBias,
    #[serde(rename = "screeners_found_in", alias = "sources_matched", default)]
    pub sources_matched: Vec<String>,
    #[serde(default)]
    pub match_count: usize,
}
