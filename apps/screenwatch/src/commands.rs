use screenwatch_application::config::{load_config, Config};
use screenwatch_application::control::StopSignal;
use screenwatch_application::market_hours::TradingWindow;
use screenwatch_application::scanning::lease::SessionLease;
use screenwatch_application::scanning::report::LoopSummary;
use screenwatch_application::scanning::{ScanOrchestrator, ScanPlan};
use screenwatch_domain::repositories::screener_session::ScreenerSession;
use screenwatch_infrastructure::persistence::json_state::JsonStateStore;
use screenwatch_infrastructure::sessions::http::{
    HttpRenderSession, HttpSessionSettings, DEFAULT_READ_TIMEOUT_MS, DEFAULT_REQUEST_MARGIN_MS,
};
use screenwatch_infrastructure::sessions::replay::ReplaySession;
use serde_json::json;
use std::path::{Path, PathBuf};

const CONFIG_ENV: &str = "SCREENWATCH_CONFIG";

pub type BoxedSession = Box<dyn ScreenerSession + Send>;

pub fn resolve_config_path(cli_path: Option<PathBuf>) -> Result<PathBuf, String> {
    cli_path
        .or_else(|| {
            std::env::var(CONFIG_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
        })
        .ok_or_else(|| format!("missing --config and env {CONFIG_ENV} is not set"))
}

pub fn check_config(path: &Path) -> Result<serde_json::Value, String> {
    let config = load_config(path)?;
    Ok(json!({
        "status": "ok",
        "config": path.display().to_string(),
        "sources": config.source_ids(),
        "key_indices": config.market.key_indices,
        "timezone": config.trading_window.timezone,
        "trading_window": format!("{}-{}", config.trading_window.open, config.trading_window.close),
        "scan_interval_secs": config.scanner.scan_interval_secs,
        "results_file": config.paths.results_file,
        "market_trend_file": config.paths.market_trend_file,
    }))
}

fn build_store(config: &Config) -> JsonStateStore {
    JsonStateStore::new(
        &config.paths.results_file,
        &config.paths.market_trend_file,
        config.source_ids(),
    )
}

pub fn show(config: &Config) -> Result<serde_json::Value, String> {
    let store = build_store(config);
    let state = store
        .read_state()
        .map_err(|err| format!("cannot read results: {err}"))?;
    let snapshot = store
        .read_snapshot()
        .map_err(|err| format!("cannot read market snapshot: {err}"))?;

    let Some(state) = state else {
        return Ok(json!({
            "status": "empty",
            "results_file": store.results_path().display().to_string(),
        }));
    };

    let sources: serde_json::Map<String, serde_json::Value> = state
        .per_source
        .iter()
        .map(|(id, observations)| {
            let symbols: Vec<&str> = observations.iter().map(|o| o.symbol.as_str()).collect();
            (id.to_string(), json!(symbols))
        })
        .collect();
    let combined: Vec<serde_json::Value> = state
        .combined
        .iter()
        .map(|c| {
            json!({
                "symbol": c.symbol,
                "match_count": c.match_count,
                "screeners_found_in": c.sources_matched,
            })
        })
        .collect();

    Ok(json!({
        "status": "ok",
        "last_update": state.last_update,
        "market_bias": state.market_bias,
        "sources": sources,
        "combined": combined,
        "snapshot": snapshot,
    }))
}

pub fn open_session(config: &Config, replay: Option<&Path>) -> Result<BoxedSession, String> {
    match replay {
        Some(path) => {
            metrics::counter!("screenwatch.app.sessions_opened_total", "kind" => "replay").increment(1);
            tracing::info!(fixture = %path.display(), "using replay session");
            Ok(Box::new(ReplaySession::from_path(path)?))
        }
        None => {
            let opened = HttpRenderSession::open(http_settings(config))
                .map_err(|err| format!("failed to open render session: {err}"))?;
            metrics::counter!("screenwatch.app.sessions_opened_total", "kind" => "http").increment(1);
            Ok(Box::new(opened))
        }
    }
}

pub fn http_settings(config: &Config) -> HttpSessionSettings {
    let session = &config.session;
    HttpSessionSettings {
        base_url: session.renderer_url.clone(),
        name: session_name(config),
        headless: session.headless.unwrap_or(true),
        page_load_timeout_ms: session.page_load_timeout_ms,
        scan_click_timeout_ms: session.scan_click_timeout_ms,
        scan_complete_timeout_ms: session.scan_complete_timeout_ms,
        read_timeout_ms: session.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS),
        request_margin_ms: DEFAULT_REQUEST_MARGIN_MS,
        retries: session.retries,
    }
}

fn session_name(config: &Config) -> String {
    config
        .session
        .name
        .clone()
        .unwrap_or_else(|| "screenwatch".to_string())
}

/// Runs a single cycle and returns its report. Outside the trading window nothing is
/// scanned unless `force` is set.
pub fn run_once(
    config: &Config,
    replay: Option<&Path>,
    force: bool,
) -> Result<serde_json::Value, String> {
    let window = TradingWindow::from_config(&config.trading_window)?;
    let now = chrono::Utc::now();
    if !force {
        if let Some(reason) = window.closed_reason(now) {
            return Ok(json!({
                "status": "skipped",
                "reason": reason.as_str(),
                "local_time": window.format_timestamp(now),
            }));
        }
    }

    let plan = ScanPlan::from_config(config);
    let store = build_store(config);
    let mut lease = SessionLease::new(session_name(config), open_session(config, replay)?);
    let orchestrator = ScanOrchestrator::new(plan, window, &store);
    let report = orchestrator.run_cycle(&mut *lease, &StopSignal::new(), now);
    lease
        .release()
        .map_err(|err| format!("failed to release session: {err}"))?;

    serde_json::to_value(&report).map_err(|err| format!("failed to encode cycle report: {err}"))
}

/// Scan loop until `stop` is requested. The session is released on return.
pub fn run_loop(
    config: &Config,
    replay: Option<&Path>,
    stop: &StopSignal,
) -> Result<LoopSummary, String> {
    let window = TradingWindow::from_config(&config.trading_window)?;
    let plan = ScanPlan::from_config(config);
    let store = build_store(config);
    store
        .initialize()
        .map_err(|err| format!("failed to initialize results file: {err}"))?;

    let mut lease = SessionLease::new(session_name(config), open_session(config, replay)?);
    let orchestrator = ScanOrchestrator::new(plan, window, &store);
    let summary = orchestrator.run(&mut *lease, stop);
    lease
        .release()
        .map_err(|err| format!("failed to release session: {err}"))?;
    Ok(summary)
}
