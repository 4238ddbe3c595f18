//! Local HTTP callback listener for the OAuth redirect.
//!
//! During setup the authorization server redirects the user's browser to
//! `http://localhost:{port}/callback?code=...&state=...`. This module binds
//! a transient TCP server to the loopback interface, waits for exactly one
//! valid callback, and settles exactly once:
//!
//! ```text
//! idle ──bind──> listening ──┬──> succeeded   (code + state captured)
//!                            ├──> failed      (provider error, bad request,
//!                            │                 state mismatch)
//!                            └──> timed_out   (no valid callback in time)
//! ```
//!
//! Requests to any other path are answered 404 and do not affect the
//! listener state. After settling, the listener keeps the socket open for a
//! short grace window so the browser can render the response and any
//! racing duplicate callback gets a harmless "already completed" answer,
//! then tears down.
//!
//! No HTTP framework is used — the listener serves exactly one flow, so a
//! raw [`tokio::net::TcpListener`] with request-line parsing is enough.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::error::{AuthError, Result};

/// Candidate callback ports, probed in ascending order.
pub const DEFAULT_PORT_RANGE: RangeInclusive<u16> = 8080..=8089;

/// How long to wait for the browser redirect (5 minutes).
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

/// Grace window after settlement, letting the browser finish rendering and
/// absorbing straggler requests.
const TEARDOWN_GRACE: Duration = Duration::from_secs(1);

/// Only one callback listener may exist per process at a time.
static LISTENER_ACTIVE: AtomicBool = AtomicBool::new(false);

/// The HTML page returned to the browser after a successful callback.
const SUCCESS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Device Setup Approved</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
            background: #f5f5f5;
            color: #333;
        }
        .card {
            text-align: center;
            padding: 3rem;
            background: white;
            border-radius: 12px;
            box-shadow: 0 2px 10px rgba(0,0,0,0.08);
        }
        h1 { color: #22c55e; margin-bottom: 0.5rem; }
        p { color: #666; }
    </style>
</head>
<body>
    <div class="card">
        <h1>Device Setup Approved</h1>
        <p>You can close this tab and return to the terminal to finish setup.</p>
    </div>
</body>
</html>"#;

/// The HTML page returned when the callback is rejected. `{reason}` is
/// replaced with an HTML-escaped description.
const FAILURE_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Device Setup Failed</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            display: flex;
            justify-content: center;
            align-items: center;
            height: 100vh;
            margin: 0;
            background: #f5f5f5;
            color: #333;
        }
        .card {
            text-align: center;
            padding: 3rem;
            background: white;
            border-radius: 12px;
            box-shadow: 0 2px 10px rgba(0,0,0,0.08);
        }
        h1 { color: #ef4444; margin-bottom: 0.5rem; }
        p { color: #666; }
    </style>
</head>
<body>
    <div class="card">
        <h1>Device Setup Failed</h1>
        <p>{reason}</p>
        <p>Close this tab and re-run setup from the terminal.</p>
    </div>
</body>
</html>"#;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The validated outcome of a successful callback.
#[derive(Debug, Clone)]
pub struct CallbackResult {
    /// The single-use authorization code.
    pub code: String,
    /// The echoed state value (always equal to the expected state).
    pub state: String,
}

/// A bound, not-yet-listening callback server.
///
/// Binding and waiting are split so the caller can learn the claimed port
/// (and build the redirect URI from it) before the authorization URL is
/// shown to the user.
pub struct CallbackListener {
    listener: TcpListener,
    port: u16,
}

// ---------------------------------------------------------------------------
// Internal state machine
// ---------------------------------------------------------------------------

/// Terminal states of the listener.
enum Settlement {
    Succeeded(CallbackResult),
    Failed(AuthError),
}

/// What to send back for one request, and whether it settles the listener.
struct Evaluation {
    status: &'static str,
    body: Body,
    settlement: Option<Settlement>,
}

enum Body {
    Html(String),
    Plain(&'static str),
}

// ---------------------------------------------------------------------------
// CallbackListener
// ---------------------------------------------------------------------------

impl CallbackListener {
    /// Probe `ports` in ascending order and bind the first free one on the
    /// loopback interface. The listener never binds a wildcard address.
    ///
    /// # Errors
    ///
    /// - [`AuthError::ListenerBusy`] if another listener is active in this
    ///   process.
    /// - [`AuthError::PortsExhausted`] if every candidate port is taken.
    pub async fn bind(ports: RangeInclusive<u16>) -> Result<Self> {
        if LISTENER_ACTIVE.swap(true, Ordering::SeqCst) {
            return Err(AuthError::ListenerBusy);
        }

        let (start, end) = (*ports.start(), *ports.end());
        for port in ports {
            match TcpListener::bind(("127.0.0.1", port)).await {
                Ok(listener) => {
                    // Port 0 means "OS-assigned" — report the real port.
                    let port = match listener.local_addr() {
                        Ok(addr) => addr.port(),
                        Err(err) => {
                            LISTENER_ACTIVE.store(false, Ordering::SeqCst);
                            return Err(err.into());
                        }
                    };
                    tracing::debug!(port, "callback listener bound");
                    return Ok(Self { listener, port });
                }
                Err(err) => {
                    tracing::debug!(port, %err, "callback port unavailable, trying next");
                }
            }
        }

        LISTENER_ACTIVE.store(false, Ordering::SeqCst);
        Err(AuthError::PortsExhausted { start, end })
    }

    /// The port this listener claimed.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The redirect URI to register in the authorization request.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}/callback", self.port)
    }

    /// Serve until one valid callback arrives, a rejection settles the
    /// attempt, or `timeout` elapses. Settles exactly once: the first
    /// terminal request wins, stragglers inside the grace window get a
    /// generic "already completed" answer and trigger nothing downstream.
    ///
    /// # Errors
    ///
    /// - [`AuthError::CallbackTimeout`] if no valid callback arrives.
    /// - [`AuthError::Provider`] if the provider redirected with `error`.
    /// - [`AuthError::InvalidCallback`] if `code` or `state` is missing.
    /// - [`AuthError::StateMismatch`] on a CSRF state mismatch.
    pub async fn wait_for_callback(
        self,
        expected_state: &str,
        timeout: Duration,
    ) -> Result<CallbackResult> {
        let deadline = tokio::time::Instant::now() + timeout;

        tracing::info!(port = self.port, "waiting for OAuth redirect");

        let settlement = loop {
            let accepted = tokio::time::timeout_at(deadline, self.listener.accept()).await;
            let (stream, peer) = match accepted {
                Err(_) => {
                    tracing::info!(port = self.port, "callback listener timed out");
                    return Err(AuthError::CallbackTimeout {
                        timeout_secs: timeout.as_secs(),
                    });
                }
                Ok(Err(err)) => return Err(err.into()),
                Ok(Ok(conn)) => conn,
            };

            tracing::debug!(peer = %peer, "accepted callback connection");

            match Self::serve_one(stream, expected_state).await {
                Ok(Some(settlement)) => break settlement,
                // Stray request (404) or unparseable noise — keep listening.
                Ok(None) => continue,
                Err(err) => {
                    tracing::debug!(%err, "error on callback connection, ignoring");
                    continue;
                }
            }
        };

        self.drain_stragglers().await;

        match settlement {
            Settlement::Succeeded(result) => {
                tracing::info!("authorization code received");
                Ok(result)
            }
            Settlement::Failed(err) => Err(err),
        }
    }

    /// Handle a single connection. Returns the settlement it produced, if
    /// any.
    async fn serve_one(
        mut stream: TcpStream,
        expected_state: &str,
    ) -> Result<Option<Settlement>> {
        // OAuth redirects are small GET requests; 4KB is more than enough.
        let mut buf = [0u8; 4096];
        let n = stream.read(&mut buf).await?;
        let request = String::from_utf8_lossy(&buf[..n]);

        let evaluation = evaluate_request(&request, expected_state);
        Self::respond(&mut stream, evaluation.status, &evaluation.body).await?;

        Ok(evaluation.settlement)
    }

    /// Keep answering connections for a short window after settlement so
    /// the browser can render and racing duplicates get a clean answer.
    async fn drain_stragglers(&self) {
        let grace_end = tokio::time::Instant::now() + TEARDOWN_GRACE;

        loop {
            let accepted = tokio::time::timeout_at(grace_end, self.listener.accept()).await;
            let Ok(Ok((mut stream, _))) = accepted else {
                break;
            };

            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let _ = Self::respond(
                &mut stream,
                "409 Conflict",
                &Body::Plain("authorization already completed"),
            )
            .await;
        }
    }

    /// Write a minimal HTTP/1.1 response.
    async fn respond(stream: &mut TcpStream, status: &str, body: &Body) -> Result<()> {
        let (content_type, text) = match body {
            Body::Html(html) => ("text/html; charset=utf-8", html.as_str()),
            Body::Plain(text) => ("text/plain; charset=utf-8", *text),
        };

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{text}",
            text.len(),
        );

        stream.write_all(response.as_bytes()).await?;
        stream.flush().await?;
        Ok(())
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        LISTENER_ACTIVE.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Request evaluation (pure)
// ---------------------------------------------------------------------------

/// Evaluate one raw HTTP request against the expected state.
fn evaluate_request(request: &str, expected_state: &str) -> Evaluation {
    let Some((path, query)) = parse_request_target(request) else {
        return Evaluation {
            status: "400 Bad Request",
            body: Body::Plain("malformed request"),
            settlement: None,
        };
    };

    // Only the callback path participates in the protocol.
    if path != "/callback" {
        return Evaluation {
            status: "404 Not Found",
            body: Body::Plain("not found"),
            settlement: None,
        };
    }

    let params = parse_query(query);
    let get = |key: &str| params.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str());

    // The provider reports user denial and misconfiguration via `error`.
    if let Some(error) = get("error") {
        let reason = match get("error_description") {
            Some(desc) => format!("{error} ({desc})"),
            None => error.to_string(),
        };
        return Evaluation {
            status: "400 Bad Request",
            body: Body::Html(failure_page(&reason)),
            settlement: Some(Settlement::Failed(AuthError::Provider { reason })),
        };
    }

    let (Some(code), Some(state)) = (get("code"), get("state")) else {
        return Evaluation {
            status: "400 Bad Request",
            body: Body::Html(failure_page("the callback request was incomplete")),
            settlement: Some(Settlement::Failed(AuthError::InvalidCallback {
                reason: "missing code or state parameter".to_string(),
            })),
        };
    };

    // Exact-match comparison; prefix or fuzzy matches are not acceptable.
    if state != expected_state {
        return Evaluation {
            status: "400 Bad Request",
            body: Body::Html(failure_page("state verification failed")),
            settlement: Some(Settlement::Failed(AuthError::StateMismatch)),
        };
    }

    Evaluation {
        status: "200 OK",
        body: Body::Html(SUCCESS_HTML.to_string()),
        settlement: Some(Settlement::Succeeded(CallbackResult {
            code: code.to_string(),
            state: state.to_string(),
        })),
    }
}

/// Extract `(path, query)` from the request line of an HTTP GET.
///
/// Expected shape: `GET /callback?code=xxx&state=yyy HTTP/1.1`.
fn parse_request_target(request: &str) -> Option<(&str, &str)> {
    let request_line = request.lines().next()?;
    let mut parts = request_line.split_whitespace();

    let method = parts.next()?;
    let target = parts.next()?;
    if method != "GET" {
        return None;
    }

    Some(match target.split_once('?') {
        Some((path, query)) => (path, query),
        None => (target, ""),
    })
}

/// Parse a query string into decoded key/value pairs.
fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter_map(|param| {
            let (key, value) = param.split_once('=')?;
            Some((percent_decode(key), percent_decode(value)))
        })
        .collect()
}

/// Minimal percent-decoding for query parameter values.
///
/// Handles `%XX` sequences and `+` as space.
fn percent_decode(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut bytes = input.bytes();

    while let Some(b) = bytes.next() {
        match b {
            b'%' => {
                let hi = bytes.next();
                let lo = bytes.next();
                if let (Some(h), Some(l)) = (hi, lo) {
                    let hex = [h, l];
                    if let Ok(s) = std::str::from_utf8(&hex)
                        && let Ok(byte) = u8::from_str_radix(s, 16)
                    {
                        output.push(byte as char);
                        continue;
                    }
                    // Undecodable sequence: keep the literal characters.
                    output.push('%');
                    output.push(h as char);
                    output.push(l as char);
                }
            }
            b'+' => output.push(' '),
            _ => output.push(b as char),
        }
    }

    output
}

/// Render the failure page with an HTML-escaped reason.
fn failure_page(reason: &str) -> String {
    let escaped: String = reason
        .chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            other => other.to_string(),
        })
        .collect();
    FAILURE_HTML.replace("{reason}", &escaped)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
