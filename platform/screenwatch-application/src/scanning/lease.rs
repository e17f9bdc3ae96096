use screenwatch_domain::repositories::screener_session::{ScreenerSession, SessionError};
use std::ops::{Deref, DerefMut};
use tracing::{info, warn};

/// Owns a session for the lifetime of the scan loop and closes it exactly once,
/// either through `release` or on drop (including unwinding).
pub struct SessionLease<S: ScreenerSession> {
    name: String,
    session: S,
    released: bool,
}

impl<S: ScreenerSession> SessionLease<S> {
    pub fn new(name: impl Into<String>, session: S) -> Self {
        let name = name.into();
        info!(session = %name, "session acquired");
        Self {
            name,
            session,
            released: false,
        }
    }

    pub fn release(mut self) -> Result<(), SessionError> {
        self.close_once()
    }

    fn close_once(&mut self) -> Result<(), SessionError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let result = self.session.close();
        match &result {
            Ok(()) => info!(session = %self.name, "session released"),
            Err(err) => warn!(session = %self.name, error = %err, "session close failed"),
        }
        result
    }
}

impl<S: ScreenerSession> Deref for SessionLease<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: ScreenerSession> DerefMut for SessionLease<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: ScreenerSession> Drop for SessionLease<S> {
    fn drop(&mut self) {
        let _ = self.close_once();
    }
}
