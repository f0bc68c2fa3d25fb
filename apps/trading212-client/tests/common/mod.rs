//! Shared helpers for integration tests.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;

use trading212_client::observability::key_value_layer;
use trading212_client::{
    BrokerClient, BrokerError, ClientConfig, Environment, HttpRequest, HttpResponse,
    HttpTransport,
};

/// API key used by every scripted client.
pub const TEST_KEY: &str = "test-key-0001";

// =============================================================================
// Log capture
// =============================================================================

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl CapturedLogs {
    /// Subscriber writing `key=value` lines into this buffer.
    pub fn subscriber(&self) -> impl Subscriber + Send + Sync + use<> {
        tracing_subscriber::registry().with(key_value_layer(self.clone()))
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    /// Written lines.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    /// Lines at `level`.
    pub fn lines_at(&self, level: &str) -> Vec<String> {
        let token = format!("level={level} ");
        self.lines()
            .into_iter()
            .filter(|line| line.contains(&token))
            .collect()
    }
}

/// Run `f` with a capturing subscriber and return the output.
pub fn capture(f: impl FnOnce()) -> CapturedLogs {
    let logs = CapturedLogs::default();
    tracing::subscriber::with_default(logs.subscriber(), f);
    logs
}

// =============================================================================
// Scripted transport
// =============================================================================

/// Transport replaying canned responses and recording every request.
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    /// Transport answering with `responses` in order.
    pub fn new(responses: impl IntoIterator<Item = HttpResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Number of requests received.
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Requests received, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, BrokerError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| BrokerError::Transport("no scripted response left".to_string()))
    }
}

/// Demo client on top of `transport`.
pub fn client(transport: &Arc<ScriptedTransport>) -> BrokerClient {
    let config = ClientConfig::new(TEST_KEY, Environment::Demo);
    BrokerClient::with_transport(&config, transport.clone())
}
