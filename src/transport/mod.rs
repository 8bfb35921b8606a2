//! Transport
//!
//! The network boundary of the client. The query core hands a JSON body to a
//! [`Transport`] and gets the engine's JSON response back; retry, timeout and
//! connection policy all live behind this trait.

mod http;
#[cfg(test)]
pub(crate) mod mock;

pub use http::{HttpTransport, TransportError};

use async_trait::async_trait;
use serde_json::Value;

/// Result type for transport calls
pub type TransportResult<T> = Result<T, TransportError>;

/// Sends query bodies to a Druid endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST a JSON body to the query endpoint and decode the JSON response
    async fn post_json(&self, body: &Value) -> TransportResult<Value>;

    /// GET a path relative to the endpoint
    async fn get_json(&self, path: &str) -> TransportResult<Value>;

    /// DELETE a path relative to the endpoint
    async fn delete(&self, path: &str) -> TransportResult<()>;

    /// Base URL requests are sent to
    fn endpoint(&self) -> &str;
}

/// Join a relative path onto an endpoint URL
pub(crate) fn join_url(endpoint: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return endpoint.to_string();
    }
    format!("{}/{}", endpoint.trim_end_matches('/'), path)
}
