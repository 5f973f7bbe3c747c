//! Retrying request client
//!
//! Issues one logical request, retrying transient failures with bounded
//! exponential backoff. Calls are strictly sequential.

use std::sync::Arc;
use std::time::Duration;

use super::retry::{classify, AttemptOutcome, RetryPolicy};
use super::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use crate::config::RetrySettings;
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct RequestClient {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RequestClient {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Production client: `reqwest` transport with the configured deadline
    pub fn from_settings(settings: &RetrySettings) -> Result<Self> {
        let transport = ReqwestTransport::new(Duration::from_secs(settings.timeout_secs))?;
        Ok(Self::new(Arc::new(transport), settings.policy()))
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send `request`, retrying on 429/5xx-class statuses and network failures.
    ///
    /// Any other error status fails immediately with [`Error::Fatal`]. When
    /// the attempt budget runs out the last transient failure is reported in
    /// [`Error::RetriesExhausted`].
    pub async fn request(&self, request: HttpRequest) -> Result<HttpResponse> {
        let attempts = self.policy.attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let outcome = classify(self.transport.send(&request).await);

            match outcome {
                AttemptOutcome::Success(response) => return Ok(response),
                AttemptOutcome::Terminal(err) => return Err(err),
                AttemptOutcome::Retryable(failure) => {
                    last_error = failure.to_string();
                    if attempt == attempts {
                        break;
                    }

                    let wait = self.policy.backoff_for(attempt - 1);
                    log::warn!(
                        "[client] {} {} failed ({}), retrying in {:.1}s (attempt {}/{})",
                        request.method,
                        request.url,
                        failure,
                        wait.as_secs_f64(),
                        attempt,
                        attempts
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }

        log::error!(
            "[client] {} {} gave up after {} attempts: {}",
            request.method,
            request.url,
            attempts,
            last_error
        );
        Err(Error::RetriesExhausted {
            attempts,
            last_error,
        })
    }

    /// Send and decode a JSON body
    pub async fn request_json<T: serde::de::DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        self.request(request).await?.json()
    }
}
