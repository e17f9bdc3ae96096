pub mod config;
pub mod control;
pub mod market_hours;
pub mod scanning;
