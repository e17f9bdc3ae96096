use crate::value_objects::bias::MarketBias;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSnapshot {
    pub timestamp: String,
    pub market_bias: MarketBias,
    pub bullish_indices: Vec<String>,
    pub bearish_indices: Vec<String>,
}

impl MarketSnapshot {
    pub fn new(
        timestamp: impl Into<String>,
        market_bias: MarketBias,
        bullish_indices: Vec<String>,
        bearish_indices: Vec<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            market_bias,
            bullish_indices: dedup_preserving_order(bullish_indices),
            bearish_indices: dedup_preserving_order(bearish_indices),
        }
    }
}

fn dedup_preserving_order(symbols: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if !out.contains(&symbol) {
            out.push(symbol);
        }
    }
    out
}
