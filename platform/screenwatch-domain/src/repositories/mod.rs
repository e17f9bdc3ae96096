pub mod screener_session;
pub mod state_store;
