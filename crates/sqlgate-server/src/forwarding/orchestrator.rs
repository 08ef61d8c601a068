//! Resolves where a generation goes, builds the outbound request and sends it.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use sqlgate_core::{Generation, InputType};
use tracing::{debug, info, instrument, warn};

use super::registry::ForwardingTables;
use super::transformer::{TransformContext, TransformError, TransformSpec};
use crate::config::{ForwardingConfig, TimeoutConfig};

/// Outcome of one forward, merged into the HTTP response as `forwarded`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardResult {
    pub success: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_url: Option<String>,
    /// Requests actually sent; zero when nothing reached the network.
    #[serde(skip_serializing_if = "is_zero")]
    pub attempts: u32,
}

fn is_zero(n: &u32) -> bool {
    *n == 0
}

impl ForwardResult {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            skipped: true,
            reason: Some(reason.into()),
            status: None,
            data: None,
            error: None,
            destination_url: None,
            attempts: 0,
        }
    }

    pub fn delivered(url: impl Into<String>, status: u16, data: Value) -> Self {
        Self {
            success: true,
            skipped: false,
            reason: None,
            status: Some(status),
            data: Some(data),
            error: None,
            destination_url: Some(url.into()),
            attempts: 1,
        }
    }

    /// The destination answered with a non-2xx status.
    pub fn rejected(url: impl Into<String>, status: u16, data: Value) -> Self {
        Self {
            success: false,
            status: Some(status),
            data: Some(data),
            error: Some(format!("destination responded with HTTP {status}")),
            ..Self::delivered(url, status, Value::Null)
        }
    }

    /// The request never produced a response.
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            skipped: false,
            reason: None,
            status: None,
            data: None,
            error: Some(error.into()),
            destination_url: Some(url.into()),
            attempts: 1,
        }
    }

    fn transform_failed(url: impl Into<String>, error: &TransformError) -> Self {
        Self {
            attempts: 0,
            ..Self::failed(url, format!("SQL generation failed: {error}"))
        }
    }

    /// Network failures and 5xx answers may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        if self.success || self.skipped || self.attempts == 0 {
            return false;
        }
        self.status.is_none_or(|s| s >= 500)
    }
}

/// What to forward: the route key, the original body and its SQL.
#[derive(Debug, Clone, Copy)]
pub struct ForwardRequest<'a> {
    pub path: &'a str,
    pub payload: &'a Value,
    pub generation: &'a Generation,
}

/// A fully resolved outbound request.
#[derive(Debug, Clone)]
pub struct ForwardPlan {
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Value,
    pub timeout: Duration,
}

/// Transform failure for a resolved destination; nothing is sent.
#[derive(Debug)]
pub struct PlanError {
    pub destination_url: String,
    pub error: TransformError,
}

pub struct ForwardingOrchestrator {
    tables: ArcSwap<ForwardingTables>,
    client: reqwest::Client,
    timeouts: TimeoutConfig,
    source: String,
}

impl ForwardingOrchestrator {
    pub fn new(
        tables: ForwardingTables,
        config: &ForwardingConfig,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sqlgate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(tables, config, client))
    }

    pub fn with_client(
        tables: ForwardingTables,
        config: &ForwardingConfig,
        client: reqwest::Client,
    ) -> Self {
        Self {
            tables: ArcSwap::from_pointee(tables),
            client,
            timeouts: config.timeouts.clone(),
            source: config.source.clone(),
        }
    }

    /// Snapshot of the active routing tables.
    pub fn tables(&self) -> Arc<ForwardingTables> {
        self.tables.load_full()
    }

    /// Atomically installs new tables; in-flight forwards keep the old ones.
    pub fn replace_tables(&self, tables: ForwardingTables) {
        info!(
            routes = tables.routes.len(),
            transformers = tables.transformers.len(),
            "forwarding tables replaced"
        );
        self.tables.store(Arc::new(tables));
    }

    /// Resolves destination and transformer and builds the body.
    ///
    /// `Ok(None)` means no destination is configured for the path.
    pub fn plan(&self, request: &ForwardRequest<'_>) -> Result<Option<ForwardPlan>, PlanError> {
        let tables = self.tables.load();

        let destination = match tables.routes.resolve(request.path) {
            Some(entry) => {
                debug!(path = request.path, pattern = %entry.pattern, "destination route matched");
                &entry.value
            }
            None => match &tables.default_destination {
                Some(dest) => dest,
                None => return Ok(None),
            },
        };

        let rule = tables.transformers.resolve(&destination.url);
        if let Some(entry) = rule {
            debug!(url = %destination.url, pattern = %entry.pattern, "transformer matched");
        }
        let default_spec = TransformSpec::default();
        let spec = rule
            .map(|e| &e.value.transform)
            .or(tables.default_transformer.as_ref())
            .unwrap_or(&default_spec);

        let ctx = TransformContext::new(request.generation, request.payload, &self.source);
        let body = spec.apply(&ctx).map_err(|error| PlanError {
            destination_url: destination.url.clone(),
            error,
        })?;

        let mut headers = destination.headers.clone();
        if let Some(entry) = rule {
            for (name, value) in &entry.value.headers {
                headers.insert(name.clone(), value.clone());
            }
        }
        if !headers.contains_key(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        let method = rule
            .and_then(|e| e.value.method.clone())
            .unwrap_or_else(|| destination.method.clone());
        let timeout = destination
            .timeout
            .unwrap_or_else(|| self.timeout_for(&method, request.generation.input_type()));

        Ok(Some(ForwardPlan {
            url: destination.url.clone(),
            method,
            headers,
            body,
            timeout,
        }))
    }

    /// Forwards one generation. Never fails: every outcome is a [`ForwardResult`].
    #[instrument(skip(self, request), fields(path = request.path))]
    pub async fn forward(&self, request: ForwardRequest<'_>) -> ForwardResult {
        let plan = match self.plan(&request) {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                debug!("no destination configured; forwarding skipped");
                return ForwardResult::skipped(format!(
                    "no destination configured for {}",
                    request.path
                ));
            }
            Err(PlanError {
                destination_url,
                error,
            }) => {
                warn!(
                    target_url = %destination_url,
                    error = %error,
                    "transform failed; nothing sent"
                );
                return ForwardResult::transform_failed(destination_url, &error);
            }
        };
        self.send(plan).await
    }

    /// One HTTP call, no retry.
    pub async fn send(&self, plan: ForwardPlan) -> ForwardResult {
        info!(
            target_url = %plan.url,
            method = %plan.method,
            timeout_ms = plan.timeout.as_millis() as u64,
            "forwarding request"
        );

        let mut builder = self
            .client
            .request(plan.method.clone(), &plan.url)
            .headers(plan.headers)
            .timeout(plan.timeout);
        if plan.method != Method::GET && plan.method != Method::HEAD {
            let bytes = match serde_json::to_vec(&plan.body) {
                Ok(bytes) => bytes,
                Err(e) => {
                    return ForwardResult::failed(&plan.url, format!("failed to encode body: {e}"));
                }
            };
            builder = builder.body(bytes);
        }

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let message = if e.is_timeout() {
                    format!("request timed out after {} ms", plan.timeout.as_millis())
                } else if e.is_connect() {
                    format!("failed to connect to destination: {e}")
                } else {
                    format!("request failed: {e}")
                };
                warn!(target_url = %plan.url, error = %message, "forward failed");
                return ForwardResult::failed(plan.url, message);
            }
        };

        let status = response.status();
        let data = match response.text().await {
            Ok(text) => parse_body(text),
            Err(e) => {
                let message = format!("failed to read response body: {e}");
                return ForwardResult::failed(plan.url, message);
            }
        };

        if status.is_success() {
            info!(target_url = %plan.url, status = status.as_u16(), "forward completed");
            ForwardResult::delivered(plan.url, status.as_u16(), data)
        } else {
            warn!(target_url = %plan.url, status = status.as_u16(), "destination rejected request");
            ForwardResult::rejected(plan.url, status.as_u16(), data)
        }
    }

    fn timeout_for(&self, method: &Method, input_type: InputType) -> Duration {
        let ms = if *method == Method::GET || *method == Method::HEAD {
            self.timeouts.check_ms
        } else if matches!(
            input_type,
            InputType::Procedure | InputType::MultipleProcedures
        ) {
            self.timeouts.procedure_ms
        } else {
            self.timeouts.standard_ms
        };
        Duration::from_millis(ms)
    }
}

fn parse_body(text: String) -> Value {
    if text.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}
