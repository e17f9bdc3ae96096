pub mod json_state;
