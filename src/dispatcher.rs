use std::sync::{Mutex, TryLockError};
use std::time::Duration;

use chrono::Utc;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::secret_store::StorageError;
use crate::storage::{Command, DispatchOutcome, HistoryEntry};
use crate::store_manager::HistoryStore;

/// Secret-store key holding the dispatch endpoint URL.
pub const ENDPOINT_KEY: &str = "discord_webhook";

/// Where dispatches go. Resolved by the caller and passed in per dispatch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    pub endpoint: Option<String>,
}

impl TransportConfig {
    pub fn new(endpoint: Option<String>) -> Self {
        // Blank is the same as unset
        let endpoint = endpoint
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty());
        Self { endpoint }
    }

    /// Host part of the endpoint, safe to show or log.
    pub fn endpoint_host(&self) -> Option<String> {
        let endpoint = self.endpoint.as_deref()?;
        reqwest::Url::parse(endpoint)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }
}

/// Connection-level failure; the message is recorded verbatim.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Sends one JSON POST and reports the HTTP status.
pub trait Transport: Send + Sync {
    fn post_json(&self, url: &str, body: &Value) -> Result<u16, TransportError>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// `None` leaves the request without a timeout.
    pub fn new(timeout: Option<Duration>) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError(e.to_string()))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &str, body: &Value) -> Result<u16, TransportError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError("timeout".to_string())
                } else {
                    // The URL is a credential; keep it out of messages
                    TransportError(e.without_url().to_string())
                }
            })?;
        Ok(response.status().as_u16())
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no dispatch endpoint configured")]
    MissingEndpoint,
    #[error("another dispatch is already in flight")]
    Busy,
    /// The request went out; only recording it failed.
    #[error("command dispatched but history write failed: {source}")]
    HistoryWrite {
        entry: Box<HistoryEntry>,
        #[source]
        source: StorageError,
    },
}

/// Fixed parts of every dispatch message.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub username: String,
    pub success_note: String,
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Turns a command into exactly one HTTP attempt and one history record.
///
/// Holds at most one dispatch in flight; a concurrent call is rejected with
/// `DispatchError::Busy` before any side effect.
pub struct Dispatcher<'a> {
    transport: &'a dyn Transport,
    history: HistoryStore<'a>,
    settings: DispatchSettings,
    in_flight: Mutex<()>,
    clock: fn() -> i64,
}

impl<'a> Dispatcher<'a> {
    pub fn new(transport: &'a dyn Transport, history: HistoryStore<'a>, settings: DispatchSettings) -> Self {
        Self {
            transport,
            history,
            settings,
            in_flight: Mutex::new(()),
            clock: now_millis,
        }
    }

    #[cfg(test)]
    fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    #[cfg(test)]
    pub fn history(&self) -> &HistoryStore<'a> {
        &self.history
    }

    pub fn dispatch(&self, command: &Command, config: &TransportConfig) -> Result<HistoryEntry, DispatchError> {
        let _guard = match self.in_flight.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                warn!(command = %command.id, "dispatch rejected, another one is in flight");
                return Err(DispatchError::Busy);
            }
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let start_time = (self.clock)();
        let endpoint = config.endpoint.as_deref().ok_or(DispatchError::MissingEndpoint)?;

        let body = json!({
            "content": format!("/{}", command.id),
            "username": self.settings.username,
        });
        debug!(
            command = %command.id,
            host = config.endpoint_host().as_deref().unwrap_or("?"),
            "dispatching"
        );

        let outcome = DispatchOutcome::classify(self.transport.post_json(endpoint, &body).map_err(|e| e.0));
        let end_time = (self.clock)();

        let entry = HistoryEntry::from_outcome(command, &outcome, &self.settings.success_note, start_time, end_time);
        match &outcome {
            DispatchOutcome::Success => info!(command = %command.id, duration_ms = entry.duration, "dispatch succeeded"),
            DispatchOutcome::Failure(reason) => warn!(command = %command.id, reason = %reason, "dispatch failed"),
        }

        if let Err(source) = self.history.append(entry.clone()) {
            warn!(command = %command.id, error = %source, "history write failed");
            return Err(DispatchError::HistoryWrite {
                entry: Box::new(entry),
                source,
            });
        }

        Ok(entry)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::secret_store::MemoryStore;
    use crate::storage::EntryStatus;
    use crate::store_manager::tests::ReadOnlyStore;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::Barrier;
    use std::thread;

    /// Records every request and answers with a canned result.
    pub(crate) struct FakeTransport {
        pub response: Result<u16, TransportError>,
        pub calls: Mutex<Vec<(String, Value)>>,
    }

    impl FakeTransport {
        pub fn status(status: u16) -> Self {
            Self {
                response: Ok(status),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                response: Err(TransportError(message.to_string())),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Transport for FakeTransport {
        fn post_json(&self, url: &str, body: &Value) -> Result<u16, TransportError> {
            self.calls.lock().unwrap().push((url.to_string(), body.clone()));
            self.response.clone()
        }
    }

    pub(crate) fn settings() -> DispatchSettings {
        DispatchSettings {
            username: "MaxBot Controller".to_string(),
            success_note: "Sent to Discord webhook".to_string(),
        }
    }

    pub(crate) fn command(id: &str, dangerous: bool) -> Command {
        Command {
            id: id.to_string(),
            name: format!("{} command", id),
            description: String::new(),
            icon: String::new(),
            category: String::new(),
            parameters: Vec::new(),
            dangerous,
            requires_confirmation: false,
        }
    }

    fn endpoint() -> TransportConfig {
        TransportConfig::new(Some("https://hooks.example.com/api/webhooks/1/secret".to_string()))
    }

    fn ticking_clock() -> i64 {
        use std::sync::atomic::{AtomicI64, Ordering};
        static NOW: AtomicI64 = AtomicI64::new(10_000);
        NOW.fetch_add(120, Ordering::SeqCst)
    }

    #[test]
    fn test_success_on_2xx() {
        let store = MemoryStore::new();
        let transport = FakeTransport::status(204);
        let dispatcher = Dispatcher::new(&transport, HistoryStore::new(&store), settings());

        let entry = dispatcher.dispatch(&command("status", false), &endpoint()).unwrap();
        assert_eq!(entry.status, EntryStatus::Success);
        assert!(entry.error.is_none());
        assert_eq!(entry.output.as_deref(), Some("Sent to Discord webhook"));

        let calls = transport.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "https://hooks.example.com/api/webhooks/1/secret");
        assert_eq!(calls[0].1["content"], "/status");
        assert_eq!(calls[0].1["username"], "MaxBot Controller");
    }

    #[test]
    fn test_error_on_non_2xx() {
        let store = MemoryStore::new();
        let transport = FakeTransport::status(500);
        let dispatcher = Dispatcher::new(&transport, HistoryStore::new(&store), settings())
            .with_clock(ticking_clock);

        let entry = dispatcher.dispatch(&command("status", false), &endpoint()).unwrap();
        assert_eq!(entry.status, EntryStatus::Error);
        assert_eq!(entry.error.as_deref(), Some("HTTP 500"));
        assert!(entry.output.is_none());
        assert!(entry.duration > 0);
        assert_eq!(entry.duration, entry.end_time - entry.start_time);
    }

    #[test]
    fn test_transport_failure_recorded_with_zero_duration() {
        let store = MemoryStore::new();
        let transport = FakeTransport::failing("timeout");
        let dispatcher = Dispatcher::new(&transport, HistoryStore::new(&store), settings())
            .with_clock(ticking_clock);

        let entry = dispatcher.dispatch(&command("status", false), &endpoint()).unwrap();
        assert_eq!(entry.status, EntryStatus::Error);
        assert_eq!(entry.error.as_deref(), Some("timeout"));
        assert_eq!(entry.duration, 0);

        let history = dispatcher.history().read();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], entry);
    }

    #[test]
    fn test_missing_endpoint_short_circuits() {
        let store = MemoryStore::new();
        let transport = FakeTransport::status(200);
        let dispatcher = Dispatcher::new(&transport, HistoryStore::new(&store), settings());

        for config in [TransportConfig::default(), TransportConfig::new(Some("   ".to_string()))] {
            let result = dispatcher.dispatch(&command("status", false), &config);
            assert!(matches!(result, Err(DispatchError::MissingEndpoint)));
        }
        assert_eq!(transport.call_count(), 0);
        assert!(dispatcher.history().read().is_empty());
    }

    #[test]
    fn test_history_write_failure_still_reports_entry() {
        let transport = FakeTransport::status(200);
        let dispatcher = Dispatcher::new(&transport, HistoryStore::new(&ReadOnlyStore), settings());

        match dispatcher.dispatch(&command("status", false), &endpoint()) {
            Err(DispatchError::HistoryWrite { entry, .. }) => {
                assert_eq!(entry.status, EntryStatus::Success);
                assert_eq!(entry.command_id, "status");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(transport.call_count(), 1);
    }

    /// Blocks inside the request until released.
    struct BlockingTransport {
        entered: Barrier,
        release: Barrier,
    }

    impl Transport for BlockingTransport {
        fn post_json(&self, _url: &str, _body: &Value) -> Result<u16, TransportError> {
            self.entered.wait();
            self.release.wait();
            Ok(200)
        }
    }

    #[test]
    fn test_second_dispatch_rejected_while_in_flight() {
        let store = MemoryStore::new();
        let transport = BlockingTransport {
            entered: Barrier::new(2),
            release: Barrier::new(2),
        };
        let dispatcher = Dispatcher::new(&transport, HistoryStore::new(&store), settings());
        let config = endpoint();

        thread::scope(|s| {
            let first = s.spawn(|| dispatcher.dispatch(&command("deploy", false), &config));
            transport.entered.wait();

            let second = dispatcher.dispatch(&command("status", false), &config);
            assert!(matches!(second, Err(DispatchError::Busy)));

            transport.release.wait();
            assert!(first.join().unwrap().is_ok());
        });

        let history = dispatcher.history().read();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].command_id, "deploy");
    }

    #[test]
    fn test_endpoint_host() {
        assert_eq!(endpoint().endpoint_host().as_deref(), Some("hooks.example.com"));
        assert_eq!(TransportConfig::default().endpoint_host(), None);
    }

    /// One-shot HTTP server: answers a single request with `status` and hands
    /// back the raw request head and body.
    pub(crate) fn mock_server(status: u16) -> (String, thread::JoinHandle<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/api/webhooks/1/token", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                let lower = line.to_ascii_lowercase();
                if let Some(value) = lower.strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
                head.push_str(&line);
            }

            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();

            let response = format!("HTTP/1.1 {} Status\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status);
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();

            (head, String::from_utf8(body).unwrap())
        });

        (url, handle)
    }

    #[test]
    fn test_http_transport_posts_json() {
        let (url, server) = mock_server(204);
        let transport = HttpTransport::new(Some(Duration::from_secs(5))).unwrap();

        let status = transport
            .post_json(&url, &json!({"content": "/ping", "username": "bot"}))
            .unwrap();
        assert_eq!(status, 204);

        let (head, body) = server.join().unwrap();
        assert!(head.starts_with("POST /api/webhooks/1/token"));
        assert!(head.to_ascii_lowercase().contains("content-type: application/json"));
        let body: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["content"], "/ping");
    }

    #[test]
    fn test_http_transport_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let transport = HttpTransport::new(Some(Duration::from_secs(5))).unwrap();

        let err = transport
            .post_json(&format!("http://127.0.0.1:{}/hook", port), &json!({}))
            .unwrap_err();
        assert!(!err.0.is_empty());
        assert!(!err.0.contains("/hook"));
    }
}
