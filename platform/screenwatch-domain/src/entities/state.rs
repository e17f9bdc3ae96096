use crate::entities::per_source::PerSource;
use crate::entities::signal::CombinedSignal;
use crate::value_objects::bias::MarketBias;
use serde::{Deserialize, Serialize};

/// The persisted root written once per cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationState {
    pub last_update: String,
    pub market_bias: MarketBias,
    #[serde(rename = "screeners", alias = "per_source")]
    pub per_source: PerSource,
    #[serde(rename = "combined_stocks", alias = "combined")]
    pub combined: Vec<CombinedSignal>,
}

impl AggregationState {
    pub fn empty<S: AsRef<str>>(source_ids: &[S]) -> Self {
        Self {
            last_update: String::new(),
            market_bias: MarketBias::Unknown,
            per_source: PerSource::with_sources(source_ids.iter().map(|id| id.as_ref())),
            combined: Vec::new(),
        }
    }

    pub fn normalized<S: AsRef<str>>(self, source_ids: &[S]) -> Self {
        Self {
            per_source: self.per_source.normalized(source_ids),
            ..self
        }
    }

    pub fn combined_symbols(&self) -> Vec<&str> {
        self.combined.iter().map(|s| s.symbol.as_str()).collect()
    }
}
