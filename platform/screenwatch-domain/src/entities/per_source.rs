use crate::value_objects::observation::StockObservation;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Observations keyed by source id, kept in source iteration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerSource {
    entries: Vec<(String, Vec<StockObservation>)>,
}

impl PerSource {
    pub fn with_sources<I, S>(source_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut per_source = Self::default();
        for id in source_ids {
            let id = id.into();
            if per_source.position(&id).is_none() {
                per_source.entries.push((id, Vec::new()));
            }
        }
        per_source
    }

    fn position(&self, source_id: &str) -> Option<usize> {
        self.entries.iter().position(|(id, _)| id == source_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn source_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn get(&self, source_id: &str) -> Option<&[StockObservation]> {
        self.position(source_id)
            .map(|idx| self.entries[idx].1.as_slice())
    }

    /// Replaces the list of a configured source. Unknown source ids are rejected so the key set
    /// never changes after construction.
    pub fn replace(&mut self, source_id: &str, observations: Vec<StockObservation>) -> bool {
        match self.position(source_id) {
            Some(idx) => {
                self.entries[idx].1 = observations;
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[StockObservation])> {
        self.entries
            .iter()
            .map(|(id, observations)| (id.as_str(), observations.as_slice()))
    }

    pub fn total_observations(&self) -> usize {
        self.entries.iter().map(|(_, obs)| obs.len()).sum()
    }

    /// Re-keys to exactly `source_ids`, in that order: known lists are kept, missing ones are
    /// added empty and anything else is dropped.
    pub fn normalized<S: AsRef<str>>(mut self, source_ids: &[S]) -> Self {
        let mut entries: Vec<(String, Vec<StockObservation>)> =
            Vec::with_capacity(source_ids.len());
        for id in source_ids {
            let id = id.as_ref();
            if entries.iter().any(|(existing, _)| existing == id) {
                continue;
            }
            let observations = match self.position(id) {
                Some(idx) => std::mem::take(&mut self.entries[idx].1),
                None => Vec::new(),
            };
            entries.push((id.to_string(), observations));
        }
        Self { entries }
    }
}

impl Serialize for PerSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, observations) in &self.entries {
            map.serialize_entry(id, observations)?;
        }
        map.end()
    }
}

struct PerSourceVisitor;

impl<'de> Visitor<'de> for PerSourceVisitor {
    type Value = PerSource;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of source id to observation list")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut per_source = PerSource::default();
        while let Some((id, observations)) =
            access.next_entry::<String, Vec<StockObservation>>()?
        {
            match per_source.position(&id) {
                Some(idx) => per_source.entries[idx].1 = observations,
                None => per_source.entries.push((id, observations)),
            }
        }
        Ok(per_source)
    }
}

impl<'de> Deserialize<'de> for PerSource {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PerSourceVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::PerSource;
    use crate::value_objects::bias::MarketBias;
    use crate::value_objects::observation::StockObservation;
    use crate::value_objects::trend::StockTrend;

    fn obs(symbol: &str, source: &str) -> StockObservation {
        StockObservation {
            symbol: symbol.to_string(),
            price: 10.0,
            change_pct: 1.0,
            volume: 100,
            trend: StockTrend::Bullish,
            source_id: source.to_string(),
            market_bias: MarketBias::Bullish,
        }
    }

    #[test]
    fn replace_rejects_unconfigured_source() {
        let mut per_source = PerSource::with_sources(["a", "b"]);
        assert!(per_source.replace("a", vec![obs("AAA", "a")]));
        assert!(!per_source.replace("z", vec![obs("ZZZ", "z")]));
        assert_eq!(per_source.len(), 2);
        assert_eq!(per_source.get("a").map(|o| o.len()), Some(1));
        assert!(per_source.get("z").is_none());
    }

    #[test]
    fn serializes_in_configured_order() {
        let per_source = PerSource::with_sources(["zeta", "alpha", "mid"]);
        let json = serde_json::to_string(&per_source).expect("json");
        assert_eq!(json, r#"{"zeta":[],"alpha":[],"mid":[]}"#);

        let parsed: PerSource = serde_json::from_str(&json).expect("parse");
        let ids: Vec<&str> = parsed.source_ids().collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn normalized_fills_missing_and_drops_unknown() {
        let mut loaded = PerSource::with_sources(["b", "legacy"]);
        loaded.replace("b", vec![obs("BBB", "b")]);

        let normalized = loaded.normalized(&["a", "b", "c"]);
        let ids: Vec<&str> = normalized.source_ids().collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(normalized.get("a").map(|o| o.len()), Some(0));
        assert_eq!(normalized.get("b").map(|o| o.len()), Some(1));
        assert!(normalized.get("legacy").is_none());
    }
}
