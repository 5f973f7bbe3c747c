//! Scripted in-memory transport
//!
//! Replays queued responses in order and records every request it sees.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::transport::{HttpRequest, HttpResponse, Transport, TransportError};

#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: Result<HttpResponse, TransportError>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    pub fn push_json(&self, status: u16, body: serde_json::Value) {
        self.push_response(Ok(HttpResponse::new(status, body.to_string())));
    }

    pub fn push_text(&self, status: u16, body: &str) {
        self.push_response(Ok(HttpResponse::new(status, body)));
    }

    pub fn push_status(&self, status: u16) {
        self.push_response(Ok(HttpResponse::new(status, Vec::new())));
    }

    pub fn push_error(&self, err: TransportError) {
        self.push_response(Err(err));
    }

    /// Requests seen so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Responses still queued
    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }

        self.responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| {
                Err(TransportError::Other(format!(
                    "no scripted response for {} {}",
                    request.method, request.url
                )))
            })
    }
}
