pub mod bias;
pub mod observation;
pub mod trend;
