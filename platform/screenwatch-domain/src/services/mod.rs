pub mod aggregator;
pub mod alignment;
pub mod classifier;
pub mod validator;
