use crate::value_objects::observation::RawRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    Transport(String),
    Protocol(String),
    Closed,
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Transport(msg) => write!(f, "transport: {msg}"),
            SessionError::Protocol(msg) => write!(f, "protocol: {msg}"),
            SessionError::Closed => write!(f, "session closed"),
        }
    }
}

impl std::error::Error for SessionError {}

/// A page-rendering session able to open a screener page, run its scan and read the result table.
///
/// `load_page` and `trigger_scan` report expected failures (timeouts) as `false`.
/// `SessionError` is kept for conditions the caller cannot anticipate.
pub trait ScreenerSession {
    fn load_page(&mut self, url: &str) -> bool;
    fn trigger_scan(&mut self) -> bool;
    fn extract_records(&mut self, source_id: &str) -> Result<Vec<RawRecord>, SessionError>;
    fn extract_index_symbols(&mut self) -> Result<Vec<String>, SessionError>;
    fn close(&mut self) -> Result<(), SessionError>;
}

impl<S: ScreenerSession + ?Sized> ScreenerSession for Box<S> {
    fn load_page(&mut self, url: &str) -> bool {
        (**self).load_page(url)
    }

    fn trigger_scan(&mut self) -> bool {
        (**self).trigger_scan()
    }

    fn extract_records(&mut self, source_id: &str) -> Result<Vec<RawRecord>, SessionError> {
        (**self).extract_records(source_id)
    }

    fn extract_index_symbols(&mut self) -> Result<Vec<String>, SessionError> {
        (**self).extract_index_symbols()
    }

    fn close(&mut self) -> Result<(), SessionError> {
        (**self).close()
    }
}
