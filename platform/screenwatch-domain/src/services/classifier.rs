use crate::value_objects::bias::MarketBias;
use crate::value_objects::trend::StockTrend;

/// Strictly positive change is bullish; zero and below are bearish.
pub fn classify_stock(change_pct: f64) -> StockTrend {
    if change_pct.is_nan() {
        StockTrend::Unknown
    } else if change_pct > 0.0 {
        StockTrend::Bullish
    } else {
        StockTrend::Bearish
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexTally {
    pub bullish: usize,
    pub bearish: usize,
}

pub fn tally_key_indices<B, R, K>(bullish: &[B], bearish: &[R], key_indices: &[K]) -> IndexTally
where
    B: AsRef<str>,
    R: AsRef<str>,
    K: AsRef<str>,
{
    let contains = |set: &[&str], key: &str| set.iter().any(|symbol| *symbol == key);
    let bullish: Vec<&str> = bullish.iter().map(|s| s.as_ref()).collect();
    let bearish: Vec<&str> = bearish.iter().map(|s| s.as_ref()).collect();

    let mut tally = IndexTally::default();
    for key in key_indices {
        let key = key.as_ref();
        if contains(&bullish, key) {
            tally.bullish += 1;
        }
        if contains(&bearish, key) {
            tally.bearish += 1;
        }
    }
    tally
}

/// Never yields `Unknown`; a failed detection is reported by the caller instead.
pub fn classify_market<B, R, K>(bullish: &[B], bearish: &[R], key_indices: &[K]) -> MarketBias
where
    B: AsRef<str>,
    R: AsRef<str>,
    K: AsRef<str>,
{
    let tally = tally_key_indices(bullish, bearish, key_indices);
    if tally.bullish > tally.bearish {
        MarketBias::Bullish
    } else if tally.bearish > tally.bullish {
        MarketBias::Bearish
    } else {
        MarketBias::Neutral
    }
}
