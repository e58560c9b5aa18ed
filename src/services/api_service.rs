use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::AppConfig;
use crate::domain::{ApiFailure, BusEvent};
use crate::error::TransportError;
use crate::event_bus::EventBus;

pub const CONNECTION_ERROR_MESSAGE: &str = "Error de conexión. Por favor, intenta nuevamente.";

const CSRF_HEADER: &str = "X-CSRF-TOKEN";
const AJAX_HEADER: &str = "X-Requested-With";
const AJAX_MARKER: &str = "XMLHttpRequest";

/// Uniform result of every API call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<Value>,
    pub message: Option<String>,
    pub errors: Option<BTreeMap<String, Vec<String>>>,
    /// HTTP status, `None` when no response arrived.
    pub status: Option<u16>,
}

impl ApiResponse {
    fn connection_error() -> Self {
        Self {
            success: false,
            message: Some(CONNECTION_ERROR_MESSAGE.to_string()),
            ..Self::default()
        }
    }

    /// The failure this envelope describes, if it is one.
    pub fn failure(&self) -> Option<ApiFailure> {
        if self.success {
            return None;
        }
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| CONNECTION_ERROR_MESSAGE.to_string());
        let errors = self.errors.clone().unwrap_or_default();
        Some(ApiFailure::new(self.status, message).with_errors(errors))
    }
}

/// Body shape the server answers with, success or not.
#[derive(Debug, Default, Deserialize)]
struct ServerBody {
    success: Option<bool>,
    data: Option<Value>,
    #[serde(alias = "mensaje")]
    message: Option<String>,
    errors: Option<BTreeMap<String, Vec<String>>>,
}

/// Thin HTTP wrapper that turns every outcome into an [`ApiResponse`].
///
/// Failures are also published on the bus as `api:error`.
pub struct ApiService {
    client: reqwest::Client,
    base_url: String,
    csrf_token: String,
    bus: Arc<EventBus>,
}

impl std::fmt::Debug for ApiService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiService")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiService {
    pub fn new(config: &AppConfig, bus: Arc<EventBus>) -> Self {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        });

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            csrf_token: config.csrf_token.clone(),
            bus,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn get(&self, path: &str) -> ApiResponse {
        self.request(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> ApiResponse {
        self.request_with_body(Method::POST, path, body).await
    }

    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> ApiResponse {
        self.request_with_body(Method::PUT, path, body).await
    }

    pub async fn delete(&self, path: &str) -> ApiResponse {
        self.request(Method::DELETE, path, None).await
    }

    async fn request_with_body<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> ApiResponse {
        match serde_json::to_value(body) {
            Ok(body) => self.request(method, path, Some(body)).await,
            Err(e) => self.fail(method, path, TransportError::from(e)),
        }
    }

    #[instrument(skip(self, body))]
    async fn request(&self, method: Method, path: &str, body: Option<Value>) -> ApiResponse {
        debug!("Sending request");
        match self.send(method.clone(), path, body).await {
            Ok(response) => {
                if let Some(failure) = response.failure() {
                    warn!(status = ?failure.status, message = %failure.message, "Request failed");
                    self.bus.emit(BusEvent::ApiError(failure));
                }
                response
            }
            Err(e) => self.fail(method, path, e),
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<ApiResponse, TransportError> {
        let mut request = self
            .client
            .request(method, self.url(path))
            .header(CSRF_HEADER, &self.csrf_token)
            .header(AJAX_HEADER, AJAX_MARKER)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        normalize(status, &text)
    }

    fn fail(&self, method: Method, path: &str, error: TransportError) -> ApiResponse {
        warn!(%method, path, error = %error, "Request did not complete");
        let response = ApiResponse::connection_error();
        if let Some(failure) = response.failure() {
            self.bus.emit(BusEvent::ApiError(failure));
        }
        response
    }
}

/// Maps a status and raw body to the envelope.
///
/// A 2xx body must be valid JSON (or empty); anything else is a transport
/// failure. Non-2xx bodies are best-effort.
fn normalize(status: StatusCode, text: &str) -> Result<ApiResponse, TransportError> {
    let code = Some(status.as_u16());

    if status.is_success() {
        let body: ServerBody = if text.trim().is_empty() {
            ServerBody::default()
        } else {
            serde_json::from_str(text)?
        };
        return Ok(ApiResponse {
            success: body.success.unwrap_or(true),
            data: body.data,
            message: body.message,
            errors: body.errors,
            status: code,
        });
    }

    let body: ServerBody = serde_json::from_str(text).unwrap_or_default();
    Ok(ApiResponse {
        success: false,
        data: body.data,
        message: Some(
            body.message
                .unwrap_or_else(|| format!("HTTP Error: {}", status.as_u16())),
        ),
        errors: body.errors,
        status: code,
    })
}
