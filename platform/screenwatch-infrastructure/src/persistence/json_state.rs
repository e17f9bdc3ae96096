use screenwatch_domain::entities::snapshot::MarketSnapshot;
use screenwatch_domain::entities::state::AggregationState;
use screenwatch_domain::repositories::state_store::{PersistenceError, StateStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// JSON files on the local filesystem. Every write goes through a sibling temp file and a
/// rename, so readers only ever see a complete document.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    results_path: PathBuf,
    snapshot_path: PathBuf,
    source_ids: Vec<String>,
}

impl JsonStateStore {
    pub fn new(
        results_path: impl Into<PathBuf>,
        snapshot_path: impl Into<PathBuf>,
        source_ids: Vec<String>,
    ) -> Self {
        Self {
            results_path: results_path.into(),
            snapshot_path: snapshot_path.into(),
            source_ids,
        }
    }

    pub fn results_path(&self) -> &Path {
        &self.results_path
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    pub fn read_state(&self) -> Result<Option<AggregationState>, PersistenceError> {
        let start = Instant::now();
        let result = read_json::<AggregationState>(&self.results_path)
            .map(|state| state.map(|s| s.normalized(&self.source_ids)));
        record_metrics("state", "read", start, result.is_ok());
        result
    }

    pub fn read_snapshot(&self) -> Result<Option<MarketSnapshot>, PersistenceError> {
        let start = Instant::now();
        let result = read_json::<MarketSnapshot>(&self.snapshot_path);
        record_metrics("snapshot", "read", start, result.is_ok());
        result
    }

    /// Writes an empty state when no results file exists yet. Returns whether a file was created.
    pub fn initialize(&self) -> Result<bool, PersistenceError> {
        if self.results_path.exists() {
            return Ok(false);
        }
        self.save_state(&AggregationState::empty(&self.source_ids))?;
        tracing::info!(path = %self.results_path.display(), "initialized empty results file");
        Ok(true)
    }
}

impl StateStore for JsonStateStore {
    fn load_state(&self) -> AggregationState {
        match self.read_state() {
            Ok(Some(state)) => state,
            Ok(None) => AggregationState::empty(&self.source_ids),
            Err(err) => {
                tracing::error!(error = %err, "failed to load previous results, starting empty");
                AggregationState::empty(&self.source_ids)
            }
        }
    }

    fn save_state(&self, state: &AggregationState) -> Result<(), PersistenceError> {
        let start = Instant::now();
        let result = write_json_atomic(&self.results_path, state);
        record_metrics("state", "write", start, result.is_ok());
        if result.is_ok() {
            tracing::debug!(
                path = %self.results_path.display(),
                combined = state.combined.len(),
                "results saved"
            );
        }
        result
    }

    fn save_snapshot(&self, snapshot: &MarketSnapshot) -> Result<(), PersistenceError> {
        let start = Instant::now();
        let result = write_json_atomic(&self.snapshot_path, snapshot);
        record_metrics("snapshot", "write", start, result.is_ok());
        result
    }
}

fn record_metrics(kind: &'static str, op: &'static str, start: Instant, ok: bool) {
    let result_label = if ok { "ok" } else { "err" };
    metrics::counter!(
        "screenwatch.infra.store.calls_total",
        "kind" => kind,
        "op" => op,
        "result" => result_label
    )
    .increment(1);
    metrics::histogram!("screenwatch.infra.store.call_ms", "kind" => kind, "op" => op)
        .record(start.elapsed().as_millis() as f64);
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, PersistenceError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(PersistenceError::Io {
                path: path.to_path_buf(),
                message: err.to_string(),
            })
        }
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|err| PersistenceError::Corrupt {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let json = serde_json::to_string_pretty(value).map_err(|err| PersistenceError::Encode {
        message: err.to_string(),
    })?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| PersistenceError::Io {
            path: parent.to_path_buf(),
            message: err.to_string(),
        })?;
    }

    let tmp = temp_path_for(path);
    let result = write_and_sync(&tmp, json.as_bytes()).and_then(|()| {
        fs::rename(&tmp, path).map_err(|err| PersistenceError::Replace {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    });
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_and_sync(path: &Path, bytes: &[u8]) -> Result<(), PersistenceError> {
    let io_err = |err: std::io::Error| PersistenceError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    let mut file = File::create(path).map_err(io_err)?;
    file.write_all(bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)
}
