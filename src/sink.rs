use crate::error::SubmitError;
use crate::identity::Identity;
use crate::level::{Level, TestDuration};
use crate::result::TestResult;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on one save attempt
pub const SUBMIT_TIMEOUT: Duration = Duration::from_secs(15);

/// Body sent to the persistence endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub wpm: u32,
    pub accuracy: u32,
    pub error_count: usize,
    pub test_level: String,
    pub duration: u64,
}

impl From<&TestResult> for SubmissionPayload {
    fn from(r: &TestResult) -> Self {
        Self {
            wpm: r.wpm,
            accuracy: r.accuracy,
            error_count: r.mistakes,
            test_level: r.level.to_string(),
            duration: r.duration.as_secs(),
        }
    }
}

impl SubmissionPayload {
    /// Back to a typed result, if level and duration are ones we know
    pub fn to_result(&self) -> Option<TestResult> {
        Some(TestResult {
            wpm: self.wpm,
            accuracy: self.accuracy,
            mistakes: self.error_count,
            duration: TestDuration::try_from(self.duration).ok()?,
            level: Level::from_wire(&self.test_level)?,
        })
    }
}

/// Somewhere a finished result can be durably recorded for an identity
pub trait ResultSink: Send + Sync {
    fn name(&self) -> &str;
    fn submit(&self, identity: &Identity, payload: &SubmissionPayload) -> Result<(), SubmitError>;
}

/// Saves results by POSTing JSON to a remote endpoint
pub struct HttpResultSink {
    client: reqwest::blocking::Client,
    url: String,
    timeout: Duration,
}

impl HttpResultSink {
    pub fn new(url: impl Into<String>) -> Result<Self, SubmitError> {
        Self::with_timeout(url, SUBMIT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, SubmitError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("gemtype/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SubmitError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn transport_error(&self, e: reqwest::Error) -> SubmitError {
        if e.is_timeout() {
            SubmitError::Timeout(self.timeout)
        } else {
            SubmitError::Network(e.to_string())
        }
    }
}

impl ResultSink for HttpResultSink {
    fn name(&self) -> &str {
        "remote"
    }

    fn submit(&self, identity: &Identity, payload: &SubmissionPayload) -> Result<(), SubmitError> {
        let mut request = self.client.post(&self.url).json(payload);
        if let Some(token) = &identity.token {
            request = request.bearer_auth(token);
        }
        debug!("POST {} for {}", self.url, identity.user_id);

        let response = request.send().map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().map_err(|e| self.transport_error(e))?;

        // the endpoint always answers JSON, on success and on error
        if let Err(e) = serde_json::from_str::<serde_json::Value>(&body) {
            warn!("unparsable response from {} ({status}): {e}", self.url);
            return Err(SubmitError::MalformedResponse(e.to_string()));
        }

        if !status.is_success() {
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn result() -> TestResult {
        TestResult {
            wpm: 55,
            accuracy: 96,
            mistakes: 4,
            duration: TestDuration::Sixty,
            level: Level::Advanced,
        }
    }

    fn identity() -> Identity {
        Identity {
            user_id: "u-1".into(),
            email: None,
            token: Some("secret".into()),
        }
    }

    /// Serve exactly one HTTP response and hand back the raw request
    fn serve_once(status_line: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/api/save-result", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = vec![0u8; 8192];
            let mut request = Vec::new();
            // read until headers and the JSON body have arrived
            loop {
                let n = stream.read(&mut buf).unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if n == 0 || (text.contains("\r\n\r\n") && text.trim_end().ends_with('}')) {
                    break;
                }
            }
            let response = format!(
                "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&request).into_owned()
        });
        (url, handle)
    }

    #[test]
    fn payload_uses_wire_field_names() {
        let json = serde_json::to_value(SubmissionPayload::from(&result())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "wpm": 55,
                "accuracy": 96,
                "errorCount": 4,
                "testLevel": "Advanced",
                "duration": 60
            })
        );
    }

    #[test]
    fn payload_roundtrips_to_result() {
        let payload = SubmissionPayload::from(&result());
        assert_eq!(payload.to_result(), Some(result()));

        let bad = SubmissionPayload {
            test_level: "Expert".into(),
            ..payload
        };
        assert_eq!(bad.to_result(), None);
    }

    #[test]
    fn http_sink_success() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", r#"{"success":true}"#);
        let sink = HttpResultSink::new(url).unwrap();

        sink.submit(&identity(), &SubmissionPayload::from(&result()))
            .unwrap();

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /api/save-result"));
        assert!(request.to_lowercase().contains("authorization: bearer secret"));
        assert!(request.contains(r#""errorCount":4"#));
    }

    #[test]
    fn http_sink_rejected() {
        let (url, server) = serve_once("HTTP/1.1 401 Unauthorized", r#"{"error":"Unauthorized"}"#);
        let sink = HttpResultSink::new(url).unwrap();

        let err = sink
            .submit(&identity(), &SubmissionPayload::from(&result()))
            .unwrap_err();

        assert_matches!(err, SubmitError::Rejected { status: 401, .. });
        server.join().unwrap();
    }

    #[test]
    fn http_sink_malformed_body() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", "<html>oops</html>");
        let sink = HttpResultSink::new(url).unwrap();

        let err = sink
            .submit(&identity(), &SubmissionPayload::from(&result()))
            .unwrap_err();

        assert_matches!(err, SubmitError::MalformedResponse(_));
        server.join().unwrap();
    }

    #[test]
    fn http_sink_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/", listener.local_addr().unwrap());
        drop(listener);
        let sink = HttpResultSink::with_timeout(url, Duration::from_secs(2)).unwrap();

        let err = sink
            .submit(&identity(), &SubmissionPayload::from(&result()))
            .unwrap_err();

        assert_matches!(err, SubmitError::Network(_) | SubmitError::Timeout(_));
    }

    #[test]
    fn http_sink_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/api/save-result", listener.local_addr().unwrap());
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        // accept the connection and never answer
        let server = thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            let _ = done_rx.recv_timeout(Duration::from_secs(10));
        });
        let timeout = Duration::from_millis(300);
        let sink = HttpResultSink::with_timeout(url, timeout).unwrap();

        let err = sink
            .submit(&identity(), &SubmissionPayload::from(&result()))
            .unwrap_err();

        assert_matches!(err, SubmitError::Timeout(d) if d == timeout);
        done_tx.send(()).unwrap();
        server.join().unwrap();
    }
}
