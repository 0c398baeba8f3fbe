// Copyright (c) The Armature Project Authors.
// Licensed under the MIT License.

//! Shared test support: a scripted transport and a log capture.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use armature::transport::{Transport, TransportError, TransportRequest, TransportResponse};

/// One scripted attempt outcome.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Answer with this status, headers, and body.
    Status(u16, Vec<(&'static str, &'static str)>, &'static str),
    /// Fail the attempt with a timeout.
    Timeout,
    /// Fail the attempt with a connection error.
    Connect,
    /// Fail the attempt with an unclassified transport error.
    Other,
}

/// A transport that replays a fixed script, one entry per attempt.
///
/// Running past the end of the script panics, so tests catch both extra and missing
/// attempts.
pub struct FakeTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: AtomicUsize,
    requests: Mutex<Vec<TransportRequest>>,
}

impl FakeTransport {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Returns how many attempts reached the transport.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the attempts that reached the transport.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().expect("poisoned").push(request);

        let next = self
            .script
            .lock()
            .expect("poisoned")
            .pop_front()
            .expect("transport script exhausted");

        match next {
            Scripted::Status(code, headers, body) => {
                let mut header_map = HeaderMap::new();
                for (name, value) in headers {
                    header_map.insert(
                        name.parse::<HeaderName>().expect("valid header name"),
                        value.parse::<HeaderValue>().expect("valid header value"),
                    );
                }
                Ok(TransportResponse {
                    status: StatusCode::from_u16(code).expect("valid status"),
                    headers: header_map,
                    body: Bytes::from_static(body.as_bytes()),
                })
            }
            Scripted::Timeout => Err(TransportError::Timeout(None)),
            Scripted::Connect => Err(TransportError::Connect(None)),
            Scripted::Other => Err(TransportError::Other("scripted failure".into())),
        }
    }
}

/// Captures everything emitted through `tracing` for content assertions.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("poisoned")).into_owned()
    }

    /// Installs a subscriber writing into this capture; keep the guard alive for the
    /// duration of the test.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_writer(self.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }
}

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("poisoned").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
