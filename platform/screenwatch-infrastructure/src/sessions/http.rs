use reqwest::blocking::{Client, Response};
use reqwest::Method;
use screenwatch_domain::repositories::screener_session::{ScreenerSession, SessionError};
use screenwatch_domain::value_objects::observation::RawRecord;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};

pub const DEFAULT_REQUEST_MARGIN_MS: u64 = 5_000;
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 30_000;
const CONTROL_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct HttpSessionSettings {
    pub base_url: String,
    pub name: String,
    pub headless: bool,
    pub page_load_timeout_ms: u64,
    pub scan_click_timeout_ms: u64,
    pub scan_complete_timeout_ms: u64,
    /// Budget for reading the result table or index list of a loaded page.
    pub read_timeout_ms: u64,
    /// Added to every operation timeout so the renderer can answer before the client gives up.
    pub request_margin_ms: u64,
    pub retries: u32,
}

/// Transport failures and 5xx responses are retried. Timeouts are retried only when
/// `on_timeout` is set: a load or scan that timed out has already used its full budget.
#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    retries: u32,
    on_timeout: bool,
}

impl RetryPolicy {
    fn all(retries: u32) -> Self {
        Self {
            retries,
            on_timeout: true,
        }
    }

    fn except_timeouts(retries: u32) -> Self {
        Self {
            retries,
            on_timeout: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenResponse {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct LoadResponse {
    ready: bool,
}

#[derive(Debug, Deserialize)]
struct ScanResponse {
    settled: bool,
}

#[derive(Debug, Deserialize)]
struct RecordsResponse {
    #[serde(default)]
    rows: Vec<RawRecord>,
}

#[derive(Debug, Deserialize)]
struct SymbolsResponse {
    #[serde(default)]
    symbols: Vec<String>,
}

/// Browser session hosted by a page-rendering sidecar, driven over JSON/HTTP.
pub struct HttpRenderSession {
    settings: HttpSessionSettings,
    session_url: String,
    session_id: String,
    client: Client,
    closed: bool,
}

impl HttpRenderSession {
    pub fn open(settings: HttpSessionSettings) -> Result<Self, SessionError> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|err| SessionError::Transport(format!("failed to build http client: {err}")))?;

        let base = settings.base_url.trim_end_matches('/').to_string();
        let endpoint = format!("{base}/v1/sessions");
        let body = json!({ "name": settings.name, "headless": settings.headless });
        let opened: OpenResponse = decode(
            "open",
            send(
                &client,
                RetryPolicy::all(settings.retries),
                "open",
                Method::POST,
                &endpoint,
                Some(&body),
                Duration::from_millis(CONTROL_TIMEOUT_MS),
            )?,
        )?;
        if opened.session_id.trim().is_empty() {
            return Err(SessionError::Protocol("renderer returned an empty session id".to_string()));
        }

        tracing::info!(
            renderer = %base,
            session_id = %opened.session_id,
            name = %settings.name,
            "render session opened"
        );
        Ok(Self {
            session_url: format!("{endpoint}/{}", opened.session_id),
            session_id: opened.session_id,
            settings,
            client,
            closed: false,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn request<T: DeserializeOwned>(
        &self,
        op: &'static str,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        timeout_ms: u64,
        retry_timeouts: bool,
    ) -> Result<T, SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        let url = format!("{}/{path}", self.session_url);
        let policy = if retry_timeouts {
            RetryPolicy::all(self.settings.retries)
        } else {
            RetryPolicy::except_timeouts(self.settings.retries)
        };
        let response = send(
            &self.client,
            policy,
            op,
            method,
            &url,
            body,
            Duration::from_millis(timeout_ms.saturating_add(self.settings.request_margin_ms)),
        )?;
        decode(op, response)
    }
}

impl ScreenerSession for HttpRenderSession {
    fn load_page(&mut self, url: &str) -> bool {
        let timeout_ms = self.settings.page_load_timeout_ms;
        let body = json!({ "url": url, "timeout_ms": timeout_ms });
        let loaded =
            self.request::<LoadResponse>("load", Method::POST, "load", Some(&body), timeout_ms, false);
        match loaded {
            Ok(resp) => resp.ready,
            Err(err) => {
                tracing::warn!(url, error = %err, "load request failed");
                false
            }
        }
    }

    fn trigger_scan(&mut self) -> bool {
        let click = self.settings.scan_click_timeout_ms;
        let complete = self.settings.scan_complete_timeout_ms;
        let body = json!({ "click_timeout_ms": click, "complete_timeout_ms": complete });
        match self.request::<ScanResponse>(
            "scan",
            Method::POST,
            "scan",
            Some(&body),
            click.saturating_add(complete),
            false,
        ) {
            Ok(resp) => resp.settled,
            Err(err) => {
                tracing::warn!(error = %err, "scan request failed");
                false
            }
        }
    }

    fn extract_records(&mut self, source_id: &str) -> Result<Vec<RawRecord>, SessionError> {
        let resp: RecordsResponse = self.request(
            "records",
            Method::GET,
            "records",
            None,
            self.settings.read_timeout_ms,
            true,
        )?;
        tracing::debug!(source = source_id, rows = resp.rows.len(), "records extracted");
        Ok(resp.rows)
    }

    fn extract_index_symbols(&mut self) -> Result<Vec<String>, SessionError> {
        let resp: SymbolsResponse = self.request(
            "index_symbols",
            Method::GET,
            "index-symbols",
            None,
            self.settings.read_timeout_ms,
            true,
        )?;
        Ok(resp.symbols)
    }

    fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        send(
            &self.client,
            RetryPolicy::all(self.settings.retries),
            "close",
            Method::DELETE,
            &self.session_url,
            None,
            Duration::from_millis(CONTROL_TIMEOUT_MS),
        )?;
        tracing::info!(session_id = %self.session_id, "render session closed");
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(op: &'static str, response: Response) -> Result<T, SessionError> {
    response
        .json::<T>()
        .map_err(|err| SessionError::Protocol(format!("failed to decode {op} response: {err}")))
}

/// Sends one request, retrying per `policy` up to `policy.retries` extra attempts.
fn send(
    client: &Client,
    policy: RetryPolicy,
    op: &'static str,
    method: Method,
    url: &str,
    body: Option<&serde_json::Value>,
    timeout: Duration,
) -> Result<Response, SessionError> {
    let span = tracing::info_span!(
        "infra.session.request",
        op,
        url = %url,
        timeout_ms = timeout.as_millis() as u64,
        retries = policy.retries
    );
    let _enter = span.enter();

    let start = Instant::now();
    let mut attempts = 0u32;
    let mut last_error: Option<SessionError> = None;
    let mut last_error_kind: &'static str = "unknown";

    while attempts <= policy.retries {
        attempts += 1;
        if attempts > 1 {
            metrics::counter!("screenwatch.infra.session.retries_total", "op" => op).increment(1);
            tracing::debug!(attempt = attempts, "retrying render session request");
        }
        metrics::counter!("screenwatch.infra.session.requests_total", "op" => op).increment(1);

        let attempt_start = Instant::now();
        let mut builder = client.request(method.clone(), url).timeout(timeout);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        match builder.send() {
            Ok(resp) => {
                let status = resp.status();
                metrics::histogram!(
                    "screenwatch.infra.session.attempt_ms",
                    "op" => op,
                    "status" => status.as_u16().to_string()
                )
                .record(attempt_start.elapsed().as_millis() as f64);

                if status.is_success() {
                    metrics::histogram!("screenwatch.infra.session.call_ms", "op" => op, "result" => "ok")
                        .record(start.elapsed().as_millis() as f64);
                    return Ok(resp);
                }
                last_error = Some(SessionError::Protocol(format!(
                    "{op} http error: status {}",
                    status.as_u16()
                )));
                last_error_kind = "http_status";
                if status.is_server_error() {
                    continue;
                }
                break;
            }
            Err(err) => {
                metrics::histogram!(
                    "screenwatch.infra.session.attempt_ms",
                    "op" => op,
                    "status" => "err"
                )
                .record(attempt_start.elapsed().as_millis() as f64);
                last_error_kind = if err.is_timeout() { "timeout" } else { "transport" };
                last_error = Some(SessionError::Transport(format!("{op} request failed: {err}")));
                if err.is_timeout() && !policy.on_timeout {
                    break;
                }
            }
        }
    }

    metrics::counter!(
        "screenwatch.infra.session.errors_total",
        "op" => op,
        "kind" => last_error_kind
    )
    .increment(1);
    metrics::histogram!("screenwatch.infra.session.call_ms", "op" => op, "result" => "err")
        .record(start.elapsed().as_millis() as f64);
    tracing::warn!(attempts, kind = last_error_kind, "render session request failed");

    Err(last_error
        .unwrap_or_else(|| SessionError::Transport(format!("{op} request failed after retries"))))
}

#[cfg(test)]
mod tests {
    use super::{HttpRenderSession, HttpSessionSettings, DEFAULT_REQUEST_MARGIN_MS};
    use screenwatch_domain::repositories::screener_session::{ScreenerSession, SessionError};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    const OPENED: &str = r#"{"session_id":"s-1"}"#;

    fn http_response(status: u16, reason: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn ok(body: &str) -> String {
        http_response(200, "OK", body)
    }

    fn try_spawn_server(responses: Vec<String>) -> Option<String> {
        let listener = TcpListener::bind("127.0.0.1:0").ok()?;
        let addr = listener.local_addr().ok()?;

        thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().expect("accept");
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                stream
                    .write_all(response.as_bytes())
                    .expect("write response");
            }
        });

        Some(format!("http://{}", addr))
    }

    fn settings(base_url: String, retries: u32) -> HttpSessionSettings {
        HttpSessionSettings {
            base_url,
            name: "screenwatch-test".to_string(),
            headless: true,
            page_load_timeout_ms: 500,
            scan_click_timeout_ms: 500,
            scan_complete_timeout_ms: 500,
            read_timeout_ms: 500,
            request_margin_ms: DEFAULT_REQUEST_MARGIN_MS,
            retries,
        }
    }

    /// Answers the session open, then accepts every later connection without ever replying.
    /// Returns the base url and the number of stalled connections accepted so far.
    fn try_spawn_stalling_server() -> Option<(String, Arc<AtomicUsize>)> {
        let listener = TcpListener::bind("127.0.0.1:0").ok()?;
        let addr = listener.local_addr().ok()?;
        let stalled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&stalled);

        thread::spawn(move || {
            for (index, stream) in listener.incoming().enumerate() {
                let Ok(mut stream) = stream else { break };
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                if index == 0 {
                    let _ = stream.write_all(ok(OPENED).as_bytes());
                    continue;
                }
                counter.fetch_add(1, Ordering::SeqCst);
                thread::spawn(move || {
                    thread::sleep(Duration::from_secs(3));
                    drop(stream);
                });
            }
        });

        Some((format!("http://{addr}"), stalled))
    }

    #[test]
    fn load_retries_on_server_error_then_succeeds() {
        let Some(base_url) = try_spawn_server(vec![
            ok(OPENED),
            http_response(502, "Bad Gateway", "{}"),
            ok(r#"{"ready":true}"#),
        ]) else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };

        let mut session = HttpRenderSession::open(settings(base_url, 2)).expect("open");
        assert_eq!(session.session_id(), "s-1");
        assert!(session.load_page("https://screener.test/a"));
    }

    #[test]
    fn timeouts_are_reported_as_false() {
        let Some(base_url) = try_spawn_server(vec![
            ok(OPENED),
            ok(r#"{"ready":false}"#),
            ok(r#"{"settled":false}"#),
        ]) else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };

        let mut session = HttpRenderSession::open(settings(base_url, 0)).expect("open");
        assert!(!session.load_page("https://screener.test/a"));
        assert!(!session.trigger_scan());
    }

    #[test]
    fn timed_out_load_and_scan_are_not_retried() {
        let Some((base_url, stalled)) = try_spawn_stalling_server() else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };
        let mut config = settings(base_url, 2);
        config.page_load_timeout_ms = 200;
        config.scan_click_timeout_ms = 100;
        config.scan_complete_timeout_ms = 100;
        config.request_margin_ms = 0;

        let mut session = HttpRenderSession::open(config).expect("open");
        assert!(!session.load_page("https://screener.test/a"));
        thread::sleep(Duration::from_millis(300));
        assert_eq!(stalled.load(Ordering::SeqCst), 1);

        assert!(!session.trigger_scan());
        thread::sleep(Duration::from_millis(300));
        assert_eq!(stalled.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn reads_use_the_configured_timeout_and_retry() {
        let Some((base_url, stalled)) = try_spawn_stalling_server() else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };
        let mut config = settings(base_url, 2);
        config.read_timeout_ms = 150;
        config.request_margin_ms = 0;

        let mut session = HttpRenderSession::open(config).expect("open");
        let started = Instant::now();
        let err = session.extract_records("one_hour_rsi").expect_err("stalled read");
        assert!(matches!(err, SessionError::Transport(_)));
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(stalled.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn records_and_index_symbols_are_decoded() {
        let Some(base_url) = try_spawn_server(vec![
            ok(OPENED),
            ok(r#"{"rows":[{"symbol":"RELIANCE","price":"2,950.10","change":"1.25%","volume":"1,20,000"}]}"#),
            ok(r#"{"symbols":["NIFTY","BANKNIFTY"]}"#),
        ]) else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };

        let mut session = HttpRenderSession::open(settings(base_url, 0)).expect("open");
        let rows = session.extract_records("one_hour_rsi").expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].symbol, "RELIANCE");
        assert_eq!(rows[0].change, "1.25%");
        assert_eq!(
            session.extract_index_symbols().expect("symbols"),
            vec!["NIFTY", "BANKNIFTY"]
        );
    }

    #[test]
    fn client_errors_are_not_retried() {
        let Some(base_url) = try_spawn_server(vec![
            ok(OPENED),
            http_response(404, "Not Found", r#"{"error":"no table"}"#),
            ok(r#"{"rows":[]}"#),
        ]) else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };

        let mut session = HttpRenderSession::open(settings(base_url, 3)).expect("open");
        let err = session.extract_records("s1").expect_err("404");
        assert!(matches!(err, SessionError::Protocol(ref msg) if msg.contains("404")));
    }

    #[test]
    fn closed_session_rejects_further_calls() {
        let Some(base_url) = try_spawn_server(vec![ok(OPENED), http_response(200, "OK", "")]) else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };

        let mut session = HttpRenderSession::open(settings(base_url, 0)).expect("open");
        session.close().expect("close");
        session.close().expect("second close is a no-op");
        assert!(!session.load_page("https://screener.test/a"));
        assert_eq!(session.extract_records("s1"), Err(SessionError::Closed));
    }

    #[test]
    fn open_fails_when_renderer_is_unreachable() {
        let Ok(listener) = TcpListener::bind("127.0.0.1:0") else {
            eprintln!("skipping: cannot bind local test server");
            return;
        };
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let result = HttpRenderSession::open(settings(format!("http://{addr}"), 1));
        assert!(matches!(result, Err(SessionError::Transport(_))));
    }
}
