pub mod http;
pub mod replay;
