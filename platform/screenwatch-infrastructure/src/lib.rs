pub mod persistence;
pub mod sessions;
