//! Remote data gateway.
//!
//! [`RemoteGateway`] owns the request policy (bearer token, 401 handling,
//! status mapping); the wire itself sits behind the [`Transport`] trait so the
//! facade can be driven by [`HttpTransport`] in production and by scripted
//! transports in tests.

use std::time::Duration;

use log::{debug, warn};
use reqwest::blocking::Client;
use serde_json::Value as JsonValue;

use crate::error::GatewayError;
use crate::local_store::LocalStore;
use crate::session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<JsonValue>,
    pub bearer: Option<String>,
}

/// Raw answer: any status, body parsed as JSON (`Null` when empty or not JSON).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiReply {
    pub status: u16,
    pub data: JsonValue,
}

pub trait Transport: Send {
    fn send(&self, request: &ApiRequest) -> Result<ApiReply, GatewayError>;
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiReply, GatewayError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Put => self.client.put(&url),
            Method::Delete => self.client.delete(&url),
        };

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send()?;
        let status = response.status().as_u16();
        let text = response.text()?;
        let data = serde_json::from_str(&text).unwrap_or(JsonValue::Null);

        Ok(ApiReply { status, data })
    }
}

pub struct RemoteGateway {
    transport: Box<dyn Transport>,
}

impl RemoteGateway {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Sends one request and returns the body of a 2xx answer.
    ///
    /// A 401 tears the stored session down before returning
    /// [`GatewayError::Unauthorized`]: any rejected token is treated as a dead
    /// session, not as a per-call refusal.
    pub fn request(
        &self,
        store: &LocalStore,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<JsonValue, GatewayError> {
        let bearer = match store.get(session::TOKEN_KEY) {
            Ok(token) => token,
            Err(e) => {
                warn!("Could not read stored token, sending unauthenticated: {e}");
                None
            }
        };

        let request = ApiRequest {
            method,
            path: path.to_string(),
            body,
            bearer,
        };
        debug!("{:?} {}", request.method, request.path);

        let reply = self.transport.send(&request)?;

        if reply.status == 401 {
            warn!("Server rejected session on {path}; clearing local session");
            if let Err(e) = session::clear(store) {
                warn!("Failed to clear session after 401: {e}");
            }
            return Err(GatewayError::Unauthorized(error_message(&reply.data)));
        }

        if !(200..300).contains(&reply.status) {
            return Err(GatewayError::Status {
                status: reply.status,
                message: error_message(&reply.data),
            });
        }

        Ok(reply.data)
    }
}

fn error_message(data: &JsonValue) -> String {
    data.get("message")
        .or_else(|| data.get("error"))
        .and_then(JsonValue::as_str)
        .unwrap_or("no message")
        .to_string()
}
