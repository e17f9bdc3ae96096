pub mod lease;
pub mod report;

use crate::config::Config;
use crate::control::StopSignal;
use crate::market_hours::TradingWindow;
use chrono::{DateTime, Utc};
use report::{CycleReport, LoopSummary, ProbeOutcome, SourceOutcome, SourceReport};
use screenwatch_domain::entities::per_source::PerSource;
use screenwatch_domain::entities::snapshot::MarketSnapshot;
use screenwatch_domain::entities::state::AggregationState;
use screenwatch_domain::repositories::screener_session::ScreenerSession;
use screenwatch_domain::repositories::state_store::StateStore;
use screenwatch_domain::services::aggregator::{aggregate, overlap_groups};
use screenwatch_domain::services::alignment::filter_by_bias;
use screenwatch_domain::services::classifier::classify_market;
use screenwatch_domain::services::validator::validate_record;
use screenwatch_domain::value_objects::bias::MarketBias;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

const DEFAULT_SETTLE_DELAY_MS: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTarget {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ScanPlan {
    pub sources: Vec<SourceTarget>,
    pub bullish_probe_url: String,
    pub bearish_probe_url: String,
    pub key_indices: Vec<String>,
    pub settle_delay: Duration,
    pub scan_interval: Duration,
    pub off_hours_interval: Duration,
}

impl ScanPlan {
    pub fn from_config(config: &Config) -> Self {
        Self {
            sources: config
                .sources
                .iter()
                .map(|s| SourceTarget {
                    id: s.id.clone(),
                    url: s.url.clone(),
                })
                .collect(),
            bullish_probe_url: config.market.bullish_probe_url.clone(),
            bearish_probe_url: config.market.bearish_probe_url.clone(),
            key_indices: config.market.key_indices.clone(),
            settle_delay: Duration::from_millis(
                config
                    .scanner
                    .settle_delay_ms
                    .unwrap_or(DEFAULT_SETTLE_DELAY_MS),
            ),
            scan_interval: Duration::from_secs(config.scanner.scan_interval_secs),
            off_hours_interval: Duration::from_secs(config.scanner.off_hours_interval_secs),
        }
    }

    pub fn source_ids(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.id.clone()).collect()
    }
}

pub struct ScanOrchestrator<'a> {
    plan: ScanPlan,
    window: TradingWindow,
    store: &'a dyn StateStore,
}

impl<'a> ScanOrchestrator<'a> {
    pub fn new(plan: ScanPlan, window: TradingWindow, store: &'a dyn StateStore) -> Self {
        Self {
            plan,
            window,
            store,
        }
    }

    pub fn plan(&self) -> &ScanPlan {
        &self.plan
    }

    pub fn window(&self) -> &TradingWindow {
        &self.window
    }

    /// Runs one full cycle: bias detection, per-source scans, aggregation and persistence.
    /// Failures are logged and reported; none of them abort the cycle. A stop request
    /// abandons the cycle at the next step boundary and leaves the stored state untouched.
    pub fn run_cycle(
        &self,
        session: &mut dyn ScreenerSession,
        stop: &StopSignal,
        now: DateTime<Utc>,
    ) -> CycleReport {
        let timestamp = self.window.format_timestamp(now);
        let span = tracing::info_span!("scan_cycle", timestamp = %timestamp);
        let _guard = span.enter();
        let started = Instant::now();
        metrics::counter!("screenwatch.scan.cycles_total").increment(1);

        let mut persistence_errors = Vec::new();

        let Some((snapshot, bullish_probe, bearish_probe)) =
            self.detect_market_bias(session, stop, &timestamp)
        else {
            metrics::counter!("screenwatch.scan.cycles_interrupted_total").increment(1);
            warn!("stop requested before market bias was known, cycle abandoned");
            return CycleReport::interrupted(timestamp);
        };
        let bias = snapshot.market_bias;
        let snapshot_persisted = match self.store.save_snapshot(&snapshot) {
            Ok(()) => true,
            Err(err) => {
                error!(critical = true, error = %err, "failed to persist market snapshot");
                persistence_errors.push(err.to_string());
                false
            }
        };

        let source_ids = self.plan.source_ids();
        let mut per_source = self.store.load_state().per_source.normalized(&source_ids);

        let mut sources = Vec::with_capacity(self.plan.sources.len());
        let mut interrupted = false;
        for target in &self.plan.sources {
            if stop.is_stopped() {
                interrupted = true;
                break;
            }
            let outcome = self.scan_source(session, stop, target, bias, &mut per_source);
            interrupted = outcome == SourceOutcome::Interrupted;
            metrics::counter!(
                "screenwatch.scan.source_outcomes_total",
                "source" => target.id.clone(),
                "outcome" => outcome.label()
            )
            .increment(1);
            sources.push(SourceReport {
                source_id: target.id.clone(),
                outcome,
            });
            if interrupted {
                break;
            }
        }

        if interrupted {
            metrics::counter!("screenwatch.scan.cycles_interrupted_total").increment(1);
            warn!(
                scanned = sources.len(),
                pending = self.plan.sources.len() - sources.len(),
                "stop requested mid-cycle, results not saved"
            );
            return CycleReport {
                timestamp,
                market_bias: bias,
                snapshot,
                bullish_probe,
                bearish_probe,
                sources,
                combined_symbols: Vec::new(),
                snapshot_persisted,
                state_persisted: false,
                interrupted: true,
                persistence_errors,
            };
        }

        let combined = aggregate(&per_source);
        for group in overlap_groups(&per_source) {
            info!(
                sources = %group.sources.join(" + "),
                symbols = %group.symbols.join(", "),
                "symbols found in multiple screeners"
            );
        }
        metrics::histogram!("screenwatch.scan.combined_signals").record(combined.len() as f64);
        let combined_symbols: Vec<String> = combined.iter().map(|c| c.symbol.clone()).collect();
        info!(
            bias = %bias,
            combined = combined_symbols.len(),
            "aggregation finished"
        );

        let state = AggregationState {
            last_update: timestamp.clone(),
            market_bias: bias,
            per_source,
            combined,
        };
        let state_persisted = match self.store.save_state(&state) {
            Ok(()) => true,
            Err(err) => {
                error!(critical = true, error = %err, "failed to persist aggregation state");
                persistence_errors.push(err.to_string());
                false
            }
        };

        metrics::histogram!("screenwatch.scan.cycle_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);

        CycleReport {
            timestamp,
            market_bias: bias,
            snapshot,
            bullish_probe,
            bearish_probe,
            sources,
            combined_symbols,
            snapshot_persisted,
            state_persisted,
            interrupted: false,
            persistence_errors,
        }
    }

    /// Reads both index screeners. `None` when a stop arrives before both were read.
    pub fn detect_market_bias(
        &self,
        session: &mut dyn ScreenerSession,
        stop: &StopSignal,
        timestamp: &str,
    ) -> Option<(MarketSnapshot, ProbeOutcome, ProbeOutcome)> {
        if stop.is_stopped() {
            return None;
        }
        let (bullish_probe, bullish) = read_probe(session, &self.plan.bullish_probe_url, "bullish");
        if stop.is_stopped() {
            return None;
        }
        let (bearish_probe, bearish) = read_probe(session, &self.plan.bearish_probe_url, "bearish");

        let bias = if bullish_probe.is_read() || bearish_probe.is_read() {
            classify_market(&bullish, &bearish, &self.plan.key_indices)
        } else {
            MarketBias::Unknown
        };
        if bias == MarketBias::Unknown {
            warn!("both market probes failed, market bias unknown");
        } else {
            info!(
                bias = %bias,
                bullish = bullish.len(),
                bearish = bearish.len(),
                "market bias detected"
            );
        }

        Some((
            MarketSnapshot::new(timestamp, bias, bullish, bearish),
            bullish_probe,
            bearish_probe,
        ))
    }

    fn scan_source(
        &self,
        session: &mut dyn ScreenerSession,
        stop: &StopSignal,
        target: &SourceTarget,
        bias: MarketBias,
        per_source: &mut PerSource,
    ) -> SourceOutcome {
        let span = tracing::info_span!("scan_source", source = %target.id);
        let _guard = span.enter();

        if !session.load_page(&target.url) {
            warn!(url = %target.url, "page load timed out, keeping previous results");
            return SourceOutcome::PageLoadFailed;
        }
        if !session.trigger_scan() {
            warn!("scan did not complete, keeping previous results");
            return SourceOutcome::ScanFailed;
        }
        if stop.wait(self.plan.settle_delay) {
            info!("stop requested while the table settled, keeping previous results");
            return SourceOutcome::Interrupted;
        }

        let records = match session.extract_records(&target.id) {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "extraction failed, clearing results");
                per_source.replace(&target.id, Vec::new());
                return SourceOutcome::ExtractionFailed {
                    error: err.to_string(),
                };
            }
        };

        let mut valid = Vec::with_capacity(records.len());
        let mut rejected = 0usize;
        for record in &records {
            match validate_record(&target.id, record) {
                Ok(observation) => valid.push(observation),
                Err(err) => {
                    rejected += 1;
                    warn!(symbol = %record.symbol, error = %err, "dropping invalid record");
                }
            }
        }

        let kept = filter_by_bias(&valid, bias);
        info!(
            extracted = records.len(),
            valid = valid.len(),
            kept = kept.len(),
            bias = %bias,
            "source scanned"
        );
        let kept_len = kept.len();
        per_source.replace(&target.id, kept);

        SourceOutcome::Updated {
            extracted: records.len(),
            rejected,
            kept: kept_len,
        }
    }

    pub fn run(&self, session: &mut dyn ScreenerSession, stop: &StopSignal) -> LoopSummary {
        self.run_with_clock(session, stop, &Utc::now)
    }

    /// Scan loop driven by `clock`. Off-hours iterations only wait; a panicking cycle
    /// is logged and the loop carries on with the next one.
    pub fn run_with_clock(
        &self,
        session: &mut dyn ScreenerSession,
        stop: &StopSignal,
        clock: &dyn Fn() -> DateTime<Utc>,
    ) -> LoopSummary {
        let mut summary = LoopSummary::default();
        info!(
            sources = self.plan.sources.len(),
            interval_secs = self.plan.scan_interval.as_secs(),
            "scan loop started"
        );

        while !stop.is_stopped() {
            let now = clock();
            if let Some(reason) = self.window.closed_reason(now) {
                summary.off_hours_checks += 1;
                info!(
                    reason = reason.as_str(),
                    local_time = %self.window.format_timestamp(now),
                    "market closed, waiting"
                );
                if stop.wait(self.plan.off_hours_interval) {
                    break;
                }
                continue;
            }

            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| self.run_cycle(&mut *session, stop, now)));
            match outcome {
                Ok(report) if report.interrupted => {
                    summary.interrupted_cycles += 1;
                    break;
                }
                Ok(report) => {
                    summary.cycles += 1;
                    info!(
                        bias = %report.market_bias,
                        combined = report.combined_symbols.len(),
                        state_persisted = report.state_persisted,
                        "scan cycle finished"
                    );
                }
                Err(payload) => {
                    summary.failed_cycles += 1;
                    metrics::counter!("screenwatch.scan.cycle_panics_total").increment(1);
                    error!(
                        critical = true,
                        error = %panic_message(payload.as_ref()),
                        "scan cycle aborted"
                    );
                }
            }

            if stop.wait(self.plan.scan_interval) {
                break;
            }
        }

        info!(
            cycles = summary.cycles,
            failed = summary.failed_cycles,
            "scan loop stopped"
        );
        summary
    }
}

fn read_probe(
    session: &mut dyn ScreenerSession,
    url: &str,
    side: &'static str,
) -> (ProbeOutcome, Vec<String>) {
    if !session.load_page(url) {
        warn!(probe = side, url, "probe page load timed out");
        return (ProbeOutcome::PageLoadFailed, Vec::new());
    }
    if !session.trigger_scan() {
        warn!(probe = side, "probe scan did not complete");
        return (ProbeOutcome::ScanFailed, Vec::new());
    }
    match session.extract_index_symbols() {
        Ok(symbols) => (ProbeOutcome::Read, symbols),
        Err(err) => {
            warn!(probe = side, error = %err, "probe extraction failed");
            (ProbeOutcome::ExtractionFailed, Vec::new())
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
