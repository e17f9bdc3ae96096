use crate::value_objects::bias::MarketBias;
use crate::value_objects::observation::StockObservation;

/// Keeps the observations whose trend agrees with `bias`, stamped with that bias.
///
/// Neutral keeps everything. Unknown keeps nothing: without a market read no
/// observation is treated as aligned.
pub fn filter_by_bias(observations: &[StockObservation], bias: MarketBias) -> Vec<StockObservation> {
    match bias {
        MarketBias::Unknown => Vec::new(),
        MarketBias::Neutral => observations
            .iter()
            .map(|obs| obs.with_market_bias(bias))
            .collect(),
        MarketBias::Bullish | MarketBias::Bearish => {
            let required = bias.required_trend();
            observations
                .iter()
                .filter(|obs| Some(obs.trend) == required)
                .map(|obs| obs.with_market_bias(bias))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::filter_by_bias;
    use crate::value_objects::bias::MarketBias;
    use crate::value_objects::observation::StockObservation;
    use crate::value_objects::trend::StockTrend;

    fn obs(symbol: &str, trend: StockTrend) -> StockObservation {
        StockObservation {
            symbol: symbol.to_string(),
            price: 100.0,
            change_pct: match trend {
                StockTrend::Bullish => 1.0,
                _ => -1.0,
            },
            volume: 10,
            trend,
            source_id: "s1".to_string(),
            market_bias: MarketBias::Unknown,
        }
    }

    fn batch() -> Vec<StockObservation> {
        vec![
            obs("AAA", StockTrend::Bullish),
            obs("BBB", StockTrend::Bearish),
            obs("CCC", StockTrend::Unknown),
        ]
    }

    #[test]
    fn bullish_keeps_bullish_only() {
        let kept = filter_by_bias(&batch(), MarketBias::Bullish);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].symbol, "AAA");
        assert_eq!(kept[0].market_bias, MarketBias::Bullish);
    }

    #[test]
    fn bearish_keeps_bearish_only() {
        let kept = filter_by_bias(&batch(), MarketBias::Bearish);
        let symbols: Vec<&str> = kept.iter().map(|o| o.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["BBB"]);
        assert!(kept.iter().all(|o| o.market_bias == MarketBias::Bearish));
    }

    #[test]
    fn neutral_keeps_all_and_stamps() {
        let input = batch();
        let kept = filter_by_bias(&input, MarketBias::Neutral);
        assert_eq!(kept.len(), input.len());
        assert!(kept.iter().all(|o| o.market_bias == MarketBias::Neutral));
        assert!(input.iter().all(|o| o.market_bias == MarketBias::Unknown));
    }

    #[test]
    fn unknown_fails_closed() {
        assert!(filter_by_bias(&batch(), MarketBias::Unknown).is_empty());
    }
}
