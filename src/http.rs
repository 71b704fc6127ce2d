//! HTTP collaborator: the transport boundary of the executor.
//!
//! The executor talks to a [`HttpClient`] trait object, so tests can
//! substitute a scripted transport. [`ReqwestClient`] is the real
//! implementation. Timeouts live here and only here.

use crate::error::HttpError;
use crate::model::{HttpMethod, RequestInfo, ScenarioConfig};
use async_trait::async_trait;
use reqwest::Method as ReqMethod;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// A fully resolved request: placeholders substituted, token
/// injected, ready to put on the wire.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub method: HttpMethod,
    pub path: String,
    pub service: Option<String>,
    pub headers: HashMap<String, String>,
    pub data: Option<Value>,
}

/// Response surface the core consumes.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl HttpResponse {
    /// Parse the body as JSON.
    pub fn json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(
        &self,
        request: &ResolvedRequest,
        config: &ScenarioConfig,
    ) -> Result<(HttpResponse, RequestInfo), HttpError>;
}

/// Pick the base URL for a step: its named service, falling back to
/// the `default` service and then `base_url`, with a warning when a
/// named service is missing from the map.
fn base_url_for<'a>(
    service: Option<&str>,
    config: &'a ScenarioConfig,
) -> Result<&'a str, HttpError> {
    let default = config
        .services
        .get("default")
        .or(config.base_url.as_ref())
        .map(String::as_str);

    match service {
        Some(name) => match config.services.get(name) {
            Some(url) => Ok(url),
            None => {
                warn!("no base URL for service '{}', using default", name);
                default.ok_or_else(|| HttpError::UnknownService {
                    service: name.to_string(),
                })
            }
        },
        None => default.ok_or_else(|| HttpError::UnknownService {
            service: "default".to_string(),
        }),
    }
}

/// Join a step path onto its base URL. Paths that already carry a
/// scheme are used verbatim.
pub fn resolve_url(
    path: &str,
    service: Option<&str>,
    config: &ScenarioConfig,
) -> Result<String, HttpError> {
    if path.contains("://") {
        return Ok(path.to_string());
    }

    let base_url = base_url_for(service, config)?;
    let base = url::Url::parse(base_url).map_err(|e| HttpError::InvalidUrl {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;

    let joined = if path.is_empty() {
        base
    } else {
        base.join(path.trim_start_matches('/'))
            .map_err(|e| HttpError::InvalidUrl {
                url: format!("{base_url}{path}"),
                reason: e.to_string(),
            })?
    };
    Ok(joined.to_string())
}

/// Flatten a JSON object into query-string pairs for GET requests.
fn query_pairs(data: &Value) -> Vec<(String, String)> {
    match data {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let rendered = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), rendered)
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn convert_method(method: &HttpMethod) -> ReqMethod {
    match method {
        HttpMethod::Get => ReqMethod::GET,
        HttpMethod::Post => ReqMethod::POST,
        HttpMethod::Put => ReqMethod::PUT,
        HttpMethod::Delete => ReqMethod::DELETE,
        HttpMethod::Patch => ReqMethod::PATCH,
        HttpMethod::Head => ReqMethod::HEAD,
        HttpMethod::Options => ReqMethod::OPTIONS,
    }
}

/// Real transport on `reqwest`.
#[derive(Debug, Default)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(
        &self,
        request: &ResolvedRequest,
        config: &ScenarioConfig,
    ) -> Result<(HttpResponse, RequestInfo), HttpError> {
        let url = resolve_url(&request.path, request.service.as_deref(), config)?;

        // Scenario-level headers sit under the step's own.
        let mut headers = request.headers.clone();
        for (key, value) in &config.headers {
            headers
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }

        let mut builder = self
            .client
            .request(convert_method(&request.method), &url)
            .timeout(Duration::from_secs(config.timeout));

        for (name, value) in &headers {
            builder = builder.header(name, value);
        }

        let mut body_str = None;
        if let Some(data) = &request.data {
            if matches!(request.method, HttpMethod::Get) {
                builder = builder.query(&query_pairs(data));
            } else {
                let body = data.to_string();
                body_str = Some(body.clone());
                builder = builder
                    .header("Content-Type", "application/json")
                    .body(body);
            }
        }

        let request_info = RequestInfo {
            method: request.method.to_string(),
            url: url.clone(),
            headers: headers.clone(),
            body: body_str,
        };

        debug!("Sending {} {}", request.method, url);
        let response = builder.send().await?;
        let status = response.status().as_u16();
        debug!("Received response with status {}", status);

        let response_headers: HashMap<String, String> = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or("").to_string(),
                )
            })
            .collect();

        let body = response.text().await?;

        Ok((
            HttpResponse {
                status,
                headers: response_headers,
                body,
            },
            request_info,
        ))
    }
}
