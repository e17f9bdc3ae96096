use crate::entities::per_source::PerSource;
use crate::entities::signal::CombinedSignal;
use crate::value_objects::observation::StockObservation;
use std::collections::HashMap;

/// Symbols grouped by the exact combination of sources that reported them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapGroup {
    pub sources: Vec<String>,
    pub symbols: Vec<String>,
}

struct Sightings<'a> {
    order: Vec<&'a str>,
    by_symbol: HashMap<&'a str, Vec<(&'a str, &'a StockObservation)>>,
}

// First occurrence per (symbol, source) wins; symbols are kept in discovery order.
fn collect_sightings(per_source: &PerSource) -> Sightings<'_> {
    let mut order: Vec<&str> = Vec::new();
    let mut by_symbol: HashMap<&str, Vec<(&str, &StockObservation)>> = HashMap::new();

    for (source_id, observations) in per_source.iter() {
        for obs in observations {
            let symbol = obs.symbol.as_str();
            let seen = by_symbol.entry(symbol).or_insert_with(|| {
                order.push(symbol);
                Vec::new()
            });
            if seen.iter().any(|(seen_source, _)| *seen_source == source_id) {
                continue;
            }
            seen.push((source_id, obs));
        }
    }

    Sightings { order, by_symbol }
}

/// Builds one combined signal per symbol reported by at least two sources.
///
/// Base fields come from the first sighting in source order. Output is ranked by
/// match count (descending) and then by discovery order.
pub fn aggregate(per_source: &PerSource) -> Vec<CombinedSignal> {
    let sightings = collect_sightings(per_source);

    let mut combined: Vec<CombinedSignal> = Vec::new();
    for symbol in &sightings.order {
        let Some(seen) = sightings.by_symbol.get(symbol) else {
            continue;
        };
        if seen.len() < 2 {
            continue;
        }
        let base = seen[0].1;
        let sources_matched: Vec<String> = seen.iter().map(|(src, _)| src.to_string()).collect();
        combined.push(CombinedSignal {
            symbol: symbol.to_string(),
            price: base.price,
            change_pct: base.change_pct,
            volume: base.volume,
            trend: base.trend,
            market_bias: base.market_bias,
            match_count: sources_matched.len(),
            sources_matched,
        });
    }

    combined.sort_by(|a, b| b.match_count.cmp(&a.match_count));
    combined
}

pub fn overlap_groups(per_source: &PerSource) -> Vec<OverlapGroup> {
    let sightings = collect_sightings(per_source);

    let mut groups: Vec<OverlapGroup> = Vec::new();
    for symbol in &sightings.order {
        let Some(seen) = sightings.by_symbol.get(symbol) else {
            continue;
        };
        if seen.len() < 2 {
            continue;
        }
        let sources: Vec<String> = seen.iter().map(|(src, _)| src.to_string()).collect();
        match groups.iter_mut().find(|g| g.sources == sources) {
            Some(group) => group.symbols.push(symbol.to_string()),
            None => groups.push(OverlapGroup {
                sources,
                symbols: vec![symbol.to_string()],
            }),
        }
    }

    groups.sort_by(|a, b| b.sources.len().cmp(&a.sources.len()));
    groups
}

#[cfg(test)]
mod tests {
    use super::{aggregate, overlap_groups};
    use crate::entities::per_source::PerSource;
    use crate::value_objects::bias::MarketBias;
    use crate::value_objects::observation::StockObservation;
    use crate::value_objects::trend::StockTrend;

    fn obs(symbol: &str, source: &str, price: f64) -> StockObservation {
        StockObservation {
            symbol: symbol.to_string(),
            price,
            change_pct: 0.5,
            volume: 1_000,
            trend: StockTrend::Bullish,
            source_id: source.to_string(),
            market_bias: MarketBias::Bullish,
        }
    }

    fn sources(lists: [(&str, Vec<StockObservation>); 3]) -> PerSource {
        let mut per_source = PerSource::with_sources(lists.iter().map(|(id, _)| *id));
        for (id, list) in lists {
            per_source.replace(id, list);
        }
        per_source
    }

    #[test]
    fn base_fields_come_from_first_source() {
        let per_source = sources([
            ("s1", vec![obs("AAA", "s1", 10.0)]),
            ("s2", vec![obs("AAA", "s2", 11.0)]),
            ("s3", vec![]),
        ]);
        let combined = aggregate(&per_source);
        assert_eq!(combined.len(), 1);
        assert_eq!(combined[0].price, 10.0);
        assert_eq!(combined[0].sources_matched, vec!["s1", "s2"]);
    }

    #[test]
    fn repeats_within_one_source_count_once() {
        let per_source = sources([
            ("s1", vec![obs("AAA", "s1", 10.0), obs("AAA", "s1", 12.0)]),
            ("s2", vec![]),
            ("s3", vec![obs("BBB", "s3", 1.0)]),
        ]);
        assert!(aggregate(&per_source).is_empty());

        let per_source = sources([
            ("s1", vec![obs("AAA", "s1", 10.0), obs("AAA", "s1", 12.0)]),
            ("s2", vec![obs("AAA", "s2", 9.0)]),
            ("s3", vec![]),
        ]);
        let combined = aggregate(&per_source);
        assert_eq!(combined[0].match_count, 2);
        assert_eq!(combined[0].price, 10.0);
    }

    #[test]
    fn ranks_triple_matches_first() {
        let per_source = sources([
            ("s1", vec![obs("PAIR", "s1", 1.0), obs("TRIPLE", "s1", 1.0)]),
            ("s2", vec![obs("PAIR", "s2", 1.0), obs("TRIPLE", "s2", 1.0)]),
            ("s3", vec![obs("TRIPLE", "s3", 1.0)]),
        ]);
        let combined = aggregate(&per_source);
        assert_eq!(combined[0].symbol, "TRIPLE");
        assert_eq!(combined[0].match_count, 3);
        assert_eq!(combined[1].symbol, "PAIR");
    }

    #[test]
    fn all_empty_sources_yield_nothing() {
        let per_source = PerSource::with_sources(["s1", "s2", "s3"]);
        assert!(aggregate(&per_source).is_empty());
        assert!(overlap_groups(&per_source).is_empty());
    }

    #[test]
    fn overlap_groups_split_by_exact_combination() {
        let per_source = sources([
            ("s1", vec![obs("A1", "s1", 1.0), obs("ALL", "s1", 1.0)]),
            ("s2", vec![obs("A1", "s2", 1.0), obs("ALL", "s2", 1.0), obs("B1", "s2", 1.0)]),
            ("s3", vec![obs("ALL", "s3", 1.0), obs("B1", "s3", 1.0), obs("B2", "s3", 1.0)]),
        ]);
        let groups = overlap_groups(&per_source);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].sources, vec!["s1", "s2", "s3"]);
        assert_eq!(groups[0].symbols, vec!["ALL"]);
        assert!(groups
            .iter()
            .any(|g| g.sources == vec!["s1", "s2"] && g.symbols == vec!["A1"]));
        assert!(groups
            .iter()
            .any(|g| g.sources == vec!["s2", "s3"] && g.symbols == vec!["B1"]));
    }
}
