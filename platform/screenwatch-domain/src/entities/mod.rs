pub mod per_source;
pub mod signal;
pub mod snapshot;
pub mod state;
