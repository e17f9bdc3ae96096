use crate::entities::snapshot::MarketSnapshot;
use crate::entities::state::AggregationState;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    Io { path: PathBuf, message: String },
    Encode { message: String },
    Corrupt { path: PathBuf, message: String },
    Replace { path: PathBuf, message: String },
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Io { path, message } => {
                write!(f, "io error on {}: {message}", path.display())
            }
            PersistenceError::Encode { message } => write!(f, "failed to encode json: {message}"),
            PersistenceError::Corrupt { path, message } => {
                write!(f, "corrupt state file {}: {message}", path.display())
            }
            PersistenceError::Replace { path, message } => {
                write!(f, "failed to replace {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for PersistenceError {}

pub trait StateStore {
    /// Last persisted state normalized to the configured sources; an empty state when nothing
    /// usable is stored.
    fn load_state(&self) -> AggregationState;
    fn save_state(&self, state: &AggregationState) -> Result<(), PersistenceError>;
    fn save_snapshot(&self, snapshot: &MarketSnapshot) -> Result<(), PersistenceError>;
}
