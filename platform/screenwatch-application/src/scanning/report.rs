use screenwatch_domain::entities::snapshot::MarketSnapshot;
use screenwatch_domain::value_objects::bias::MarketBias;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeOutcome {
    Read,
    PageLoadFailed,
    ScanFailed,
    ExtractionFailed,
    /// Not attempted because a stop was requested.
    Skipped,
}

impl ProbeOutcome {
    pub fn is_read(&self) -> bool {
        matches!(self, ProbeOutcome::Read)
    }
}

/// What happened to one source during a cycle. Load and scan failures keep the
/// source's previous list; an extraction failure empties it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SourceOutcome {
    Updated {
        extracted: usize,
        rejected: usize,
        kept: usize,
    },
    PageLoadFailed,
    ScanFailed,
    ExtractionFailed {
        error: String,
    },
    Interrupted,
}

impl SourceOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            SourceOutcome::Updated { .. } => "updated",
            SourceOutcome::PageLoadFailed => "page_load_failed",
            SourceOutcome::ScanFailed => "scan_failed",
            SourceOutcome::ExtractionFailed { .. } => "extraction_failed",
            SourceOutcome::Interrupted => "interrupted",
        }
    }

    pub fn kept_previous(&self) -> bool {
        matches!(
            self,
            SourceOutcome::PageLoadFailed | SourceOutcome::ScanFailed | SourceOutcome::Interrupted
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceReport {
    pub source_id: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub timestamp: String,
    pub market_bias: MarketBias,
    pub snapshot: MarketSnapshot,
    pub bullish_probe: ProbeOutcome,
    pub bearish_probe: ProbeOutcome,
    pub sources: Vec<SourceReport>,
    pub combined_symbols: Vec<String>,
    pub snapshot_persisted: bool,
    pub state_persisted: bool,
    pub interrupted: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub persistence_errors: Vec<String>,
}

impl CycleReport {
    pub fn interrupted(timestamp: String) -> Self {
        Self {
            snapshot: MarketSnapshot::new(&timestamp, MarketBias::Unknown, Vec::new(), Vec::new()),
            timestamp,
            market_bias: MarketBias::Unknown,
            bullish_probe: ProbeOutcome::Skipped,
            bearish_probe: ProbeOutcome::Skipped,
            sources: Vec::new(),
            combined_symbols: Vec::new(),
            snapshot_persisted: false,
            state_persisted: false,
            interrupted: true,
            persistence_errors: Vec::new(),
        }
    }

    pub fn source(&self, source_id: &str) -> Option<&SourceOutcome> {
        self.sources
            .iter()
            .find(|r| r.source_id == source_id)
            .map(|r| &r.outcome)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopSummary {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub interrupted_cycles: u64,
    pub off_hours_checks: u64,
}
