use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub scanner: ScannerConfig,
    pub market: MarketConfig,
    pub sources: Vec<SourceConfig>,
    pub trading_window: TradingWindowConfig,
    pub session: SessionConfig,
    pub paths: PathsConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct ScannerConfig {
    pub scan_interval_secs: u64,
    pub off_hours_interval_secs: u64,
    pub settle_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MarketConfig {
    pub bullish_probe_url: String,
    pub bearish_probe_url: String,
    pub key_indices: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TradingWindowConfig {
    pub timezone: String,
    pub open: String,
    pub close: String,
    pub weekdays: Option<Vec<String>>,
    pub holidays: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    pub renderer_url: String,
    pub name: Option<String>,
    pub headless: Option<bool>,
    pub page_load_timeout_ms: u64,
    pub scan_click_timeout_ms: u64,
    pub scan_complete_timeout_ms: u64,
    pub read_timeout_ms: Option<u64>,
    pub retries: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    pub results_file: String,
    pub market_trend_file: String,
    pub log_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
}

impl Config {
    pub fn source_ids(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.id.clone()).collect()
    }

    pub fn log_level(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }

    pub fn log_format(&self) -> &str {
        self.logging
            .as_ref()
            .and_then(|l| l.format.as_deref())
            .unwrap_or("text")
    }
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    let mut config: Config = toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))?;
    normalize_source_ids(&mut config);
    validate_config(&config)
        .map_err(|err| format!("invalid config {}: {}", path.display(), err))?;
    Ok(config)
}

/// Source ids key the persisted per-source lists, so every consumer must see the same string.
pub fn normalize_source_ids(config: &mut Config) {
    for source in &mut config.sources {
        let trimmed = source.id.trim();
        if trimmed.len() != source.id.len() {
            source.id = trimmed.to_string();
        }
    }
}

pub fn validate_config(config: &Config) -> Result<(), String> {
    if config.sources.len() < 2 {
        return Err(format!(
            "at least two [[sources]] are required, got {}",
            config.sources.len()
        ));
    }
    let mut seen = HashSet::new();
    for source in &config.sources {
        let id = source.id.as_str();
        if id.trim().is_empty() {
            return Err("source id must not be empty".to_string());
        }
        if id.trim() != id {
            return Err(format!("source id {id:?} has surrounding whitespace"));
        }
        if !seen.insert(id) {
            return Err(format!("duplicate source id: {id}"));
        }
        if source.url.trim().is_empty() {
            return Err(format!("source {id} has an empty url"));
        }
    }

    if config.market.key_indices.is_empty() {
        return Err("market.key_indices must not be empty".to_string());
    }
    if config.market.bullish_probe_url.trim().is_empty()
        || config.market.bearish_probe_url.trim().is_empty()
    {
        return Err("market probe urls must not be empty".to_string());
    }

    if config.scanner.scan_interval_secs == 0 {
        return Err("scanner.scan_interval_secs must be > 0".to_string());
    }
    if config.scanner.off_hours_interval_secs == 0 {
        return Err("scanner.off_hours_interval_secs must be > 0".to_string());
    }

    for (name, value) in [
        ("page_load_timeout_ms", config.session.page_load_timeout_ms),
        ("scan_click_timeout_ms", config.session.scan_click_timeout_ms),
        ("scan_complete_timeout_ms", config.session.scan_complete_timeout_ms),
    ] {
        if value == 0 {
            return Err(format!("session.{name} must be > 0"));
        }
    }
    if config.session.read_timeout_ms == Some(0) {
        return Err("session.read_timeout_ms must be > 0".to_string());
    }

    crate::market_hours::TradingWindow::from_config(&config.trading_window)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{load_config, validate_config, Config};

    const SAMPLE: &str = include_str!("../../../ops/configs/screenwatch.toml");

    fn parse_config(toml_str: &str) -> Config {
        toml::from_str(toml_str).expect("config should parse")
    }

    #[test]
    fn sample_config_is_valid() {
        let config = parse_config(SAMPLE);
        validate_config(&config).expect("sample validates");
        assert_eq!(
            config.source_ids(),
            vec!["price_crossover_200", "one_hour_rsi", "five_min_rsi"]
        );
        assert_eq!(
            config.market.key_indices,
            vec!["NIFTY", "BANKNIFTY", "NIFTYFINSERVICE"]
        );
        assert_eq!(config.trading_window.timezone, "Asia/Kolkata");
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn parse_config_rejects_malformed_toml() {
        let err = toml::from_str::<Config>("[scanner\nscan_interval_secs = 1").expect_err("malformed");
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn parse_config_rejects_unknown_fields() {
        let toml_str = SAMPLE.replace(
            "[scanner]",
            "[scanner]\nunknown_field = 123",
        );
        let err = toml::from_str::<Config>(&toml_str).expect_err("unknown field should fail");
        assert!(err.to_string().to_lowercase().contains("unknown field"));
    }

    #[test]
    fn rejects_duplicate_source_ids() {
        let mut config = parse_config(SAMPLE);
        config.sources[1].id = config.sources[0].id.clone();
        let err = validate_config(&config).expect_err("duplicate ids");
        assert!(err.contains("duplicate source id"));
    }

    #[test]
    fn padded_source_ids_are_trimmed_on_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("screenwatch.toml");
        let padded = SAMPLE.replace("id = \"one_hour_rsi\"", "id = \" one_hour_rsi \"");
        assert_ne!(padded, SAMPLE);
        std::fs::write(&path, padded).expect("write config");

        let config = load_config(&path).expect("padded ids load");
        assert_eq!(
            config.source_ids(),
            vec!["price_crossover_200", "one_hour_rsi", "five_min_rsi"]
        );
        assert_eq!(
            crate::scanning::ScanPlan::from_config(&config).source_ids(),
            config.source_ids()
        );
    }

    #[test]
    fn validation_rejects_untrimmed_source_ids() {
        let mut config = parse_config(SAMPLE);
        config.sources[1].id = "one_hour_rsi ".to_string();
        let err = validate_config(&config).expect_err("padded id");
        assert!(err.contains("whitespace"));

        config.sources[1].id = "   ".to_string();
        let err = validate_config(&config).expect_err("blank id");
        assert!(err.contains("must not be empty"));
    }

    #[test]
    fn rejects_single_source_and_empty_key_indices() {
        let mut config = parse_config(SAMPLE);
        config.sources.truncate(1);
        assert!(validate_config(&config).is_err());

        let mut config = parse_config(SAMPLE);
        config.market.key_indices.clear();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_bad_trading_window() {
        let mut config = parse_config(SAMPLE);
        config.trading_window.timezone = "Mars/Olympus".to_string();
        assert!(validate_config(&config).is_err());

        let mut config = parse_config(SAMPLE);
        config.trading_window.open = "16:00".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_zero_intervals() {
        let mut config = parse_config(SAMPLE);
        config.scanner.scan_interval_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn read_timeout_is_optional_but_not_zero() {
        let config = parse_config(SAMPLE);
        assert_eq!(config.session.read_timeout_ms, Some(30_000));

        let config = parse_config(&SAMPLE.replace("read_timeout_ms = 30000\n", ""));
        assert_eq!(config.session.read_timeout_ms, None);
        validate_config(&config).expect("default read timeout");

        let mut config = parse_config(SAMPLE);
        config.session.read_timeout_ms = Some(0);
        let err = validate_config(&config).expect_err("zero read timeout");
        assert!(err.contains("read_timeout_ms"));
    }
}
