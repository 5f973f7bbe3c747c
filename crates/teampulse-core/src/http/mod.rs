//! HTTP plumbing: transport seam, retry policy, request client, auth headers

pub mod auth;
pub mod client;
pub mod mock;
pub mod retry;
pub mod transport;

pub use auth::{mask_secret, ApiAuth, JiraAuthType};
pub use client::RequestClient;
pub use retry::{RetryPolicy, TransientFailure};
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport, TransportError};
