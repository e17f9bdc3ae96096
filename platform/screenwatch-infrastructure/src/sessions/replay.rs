use screenwatch_domain::repositories::screener_session::{ScreenerSession, SessionError};
use screenwatch_domain::value_objects::observation::RawRecord;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReplayPage {
    #[serde(default = "yes")]
    pub ready: bool,
    #[serde(default = "yes")]
    pub settled: bool,
    #[serde(default)]
    pub rows: Vec<RawRecord>,
    #[serde(default)]
    pub symbols: Vec<String>,
    /// Makes extraction fail with this message.
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ReplayFixture {
    pages: HashMap<String, ReplayPage>,
}

/// Serves canned pages keyed by URL. Unknown URLs behave like a page-load timeout.
#[derive(Debug, Clone)]
pub struct ReplaySession {
    pages: HashMap<String, ReplayPage>,
    current: Option<String>,
    visited: Vec<String>,
    closed: bool,
}

impl ReplaySession {
    pub fn from_path(path: &Path) -> Result<Self, String> {
        let contents = fs::read_to_string(path)
            .map_err(|err| format!("failed to read replay fixture {}: {}", path.display(), err))?;
        Self::from_json(&contents)
            .map_err(|err| format!("invalid replay fixture {}: {}", path.display(), err))
    }

    pub fn from_json(contents: &str) -> Result<Self, String> {
        let fixture: ReplayFixture = serde_json::from_str(contents).map_err(|err| err.to_string())?;
        Ok(Self {
            pages: fixture.pages,
            current: None,
            visited: Vec::new(),
            closed: false,
        })
    }

    pub fn visited(&self) -> &[String] {
        &self.visited
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn current_page(&self) -> Result<&ReplayPage, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .ok_or_else(|| SessionError::Protocol("no page loaded".to_string()))
    }
}

impl ScreenerSession for ReplaySession {
    fn load_page(&mut self, url: &str) -> bool {
        if self.closed {
            return false;
        }
        self.visited.push(url.to_string());
        match self.pages.get(url) {
            Some(page) if page.ready => {
                self.current = Some(url.to_string());
                true
            }
            _ => {
                self.current = None;
                false
            }
        }
    }

    fn trigger_scan(&mut self) -> bool {
        self.current_page().map(|p| p.settled).unwrap_or(false)
    }

    fn extract_records(&mut self, _source_id: &str) -> Result<Vec<RawRecord>, SessionError> {
        let page = self.current_page()?;
        match &page.error {
            Some(message) => Err(SessionError::Protocol(message.clone())),
            None => Ok(page.rows.clone()),
        }
    }

    fn extract_index_symbols(&mut self) -> Result<Vec<String>, SessionError> {
        let page = self.current_page()?;
        match &page.error {
            Some(message) => Err(SessionError::Protocol(message.clone())),
            None => Ok(page.symbols.clone()),
        }
    }

    fn close(&mut self) -> Result<(), SessionError> {
        self.closed = true;
        self.current = None;
        Ok(())
    }
}
