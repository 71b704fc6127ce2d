//! Step and scenario execution.
//!
//! The executor composes the resolver, store, token manager,
//! assertion engine and HTTP collaborator into the per-step
//! pipeline: refresh token if required, resolve placeholders, inject
//! the credential, send, capture variables, assert, and update the
//! credential after the login step. Scenarios run strictly
//! sequentially over one shared store/token context; the first
//! failed step aborts the rest unless `continue_on_failure` is set.

use crate::assertions;
use crate::error::{PathError, StepError};
use crate::http::{HttpClient, ReqwestClient, ResolvedRequest};
use crate::model::{
    AuthConfig, RequestInfo, ResponseInfo, Scenario, ScenarioResult, Step,
    StepResult,
};
use crate::path;
use crate::resolver;
use crate::store::{MemoryStore, VariableStore};
use crate::token::TokenManager;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Scenario runner interface.
#[async_trait]
pub trait Runner: Send {
    async fn run(&mut self, scenario: &Scenario) -> Result<ScenarioResult>;
}

/// Runs scenarios over one shared variable store and token manager.
///
/// The store and token manager are confined to this executor: one
/// execution context per run, single writer.
pub struct ScenarioExecutor {
    client: Box<dyn HttpClient>,
    store: Box<dyn VariableStore>,
    token: Option<TokenManager>,
}

impl ScenarioExecutor {
    pub fn new(client: Box<dyn HttpClient>, store: Box<dyn VariableStore>) -> Self {
        Self {
            client,
            store,
            token: None,
        }
    }

    /// Real transport, in-memory variables.
    pub fn with_defaults() -> Self {
        Self::new(
            Box::new(ReqwestClient::new()),
            Box::new(MemoryStore::new()),
        )
    }

    fn token_manager(&mut self, auth: &AuthConfig) -> &mut TokenManager {
        self.token.get_or_insert_with(|| {
            TokenManager::new(
                Duration::seconds(auth.refresh_skew),
                Duration::seconds(auth.default_lifetime),
            )
        })
    }

    /// Refresh the credential by executing the designated login step
    /// when the current one is absent or stale.
    // Returns a concrete boxed `Send` future rather than an `async fn`
    // so the mutual recursion with `execute_step` type-checks: an
    // opaque `async fn` here would make each function's `Send`-ness
    // depend circularly on the other's hidden type.
    fn ensure_token<'a>(
        &'a mut self,
        scenario: &'a Scenario,
        auth: &'a AuthConfig,
    ) -> Pin<Box<dyn Future<Output = Result<(), StepError>> + Send + 'a>> {
        Box::pin(async move {
            if self.token.as_ref().is_some_and(|t| t.is_valid()) {
                return Ok(());
            }

            let login = scenario.step(&auth.login_step).ok_or_else(|| {
                StepError::TokenRefresh {
                    step: auth.login_step.clone(),
                    reason: "login step not found in scenario".to_string(),
                }
            })?;

            info!(
                "credential absent or stale, executing login step '{}'",
                login.name
            );

            // The login step runs with refresh disabled so it can never
            // recurse into itself.
            let result: Pin<Box<dyn Future<Output = StepResult> + Send + '_>> =
                Box::pin(self.execute_step(login, scenario, false));
            let result = result.await;

            if result.success {
                Ok(())
            } else {
                Err(StepError::TokenRefresh {
                    step: auth.login_step.clone(),
                    reason: result
                        .error
                        .unwrap_or_else(|| "login step failed".to_string()),
                })
            }
        })
    }

    /// Substitute the reserved `${token}` header placeholder with the
    /// live credential; when no header mentions it, set the configured
    /// auth header.
    fn inject_token(
        headers: &mut HashMap<String, String>,
        auth: &AuthConfig,
        token: &str,
    ) {
        let mut mentioned = false;
        for value in headers.values_mut() {
            if value.contains("${token}") {
                *value = value.replace("${token}", token);
                mentioned = true;
            }
        }
        if !mentioned && !headers.contains_key(&auth.header) {
            headers.insert(auth.header.clone(), format!("{} {}", auth.scheme, token));
        }
    }

    /// Persist each declared capture from the response body.
    ///
    /// A well-formed path that matches nothing is a lenient miss: the
    /// variable is skipped with a warning and later steps see the
    /// literal placeholder. A malformed path is a config bug and
    /// fails the step.
    fn save_variables(
        &mut self,
        step: &Step,
        body: Option<&Value>,
    ) -> Result<(), StepError> {
        if step.save_variables.is_empty() {
            return Ok(());
        }

        let Some(body) = body else {
            warn!(
                "step '{}' declares captures but the response is not JSON",
                step.name
            );
            return Ok(());
        };

        for (name, path_expr) in &step.save_variables {
            match path::extract_first(body, path_expr) {
                Ok(value) => {
                    self.store.set(name, value.clone())?;
                }
                Err(err @ PathError::Syntax { .. }) => {
                    return Err(StepError::Capture {
                        name: name.clone(),
                        path: path_expr.clone(),
                        source: err,
                    });
                }
                Err(PathError::NoMatch { path }) => {
                    warn!(
                        "capture '{}' skipped: path '{}' matched nothing",
                        name, path
                    );
                }
            }
        }
        Ok(())
    }

    /// Update the token manager from the credential-issuing step's
    /// response body.
    fn update_token(&mut self, auth: &AuthConfig, body: Option<&Value>) {
        let Some(body) = body else {
            warn!("login response is not JSON, credential not updated");
            return;
        };

        match path::extract_first(body, &auth.token_path) {
            Ok(value) => {
                let token = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                let expires_at = auth
                    .expire_path
                    .as_deref()
                    .and_then(|expr| path::extract_first(body, expr).ok())
                    .and_then(parse_expiry);
                self.token_manager(auth).set_token(token, expires_at);
                info!("credential updated from login response");
            }
            Err(err) => {
                warn!("login response carried no token: {}", err);
            }
        }
    }

    async fn execute_step(
        &mut self,
        step: &Step,
        scenario: &Scenario,
        allow_refresh: bool,
    ) -> StepResult {
        let step_start = Instant::now();

        let failed = |error: String, request: RequestInfo, started: Instant| StepResult {
            name: step.name.clone(),
            success: false,
            error: Some(error),
            request,
            response: None,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        let placeholder_request = || RequestInfo {
            method: step.method.to_string(),
            url: step.path.clone(),
            headers: HashMap::new(),
            body: None,
        };

        // 1. Token refresh for auth-requiring steps.
        let auth = scenario.config.auth.clone();
        if step.auth {
            let Some(ref auth) = auth else {
                return failed(
                    "step requires auth but the scenario declares no auth section"
                        .to_string(),
                    placeholder_request(),
                    step_start,
                );
            };
            if allow_refresh {
                if let Err(err) = self.ensure_token(scenario, auth).await {
                    return failed(err.to_string(), placeholder_request(), step_start);
                }
            }
        }

        // 2. Resolve placeholders into a fresh copy; the template
        //    step stays untouched.
        let resolved_path = resolver::resolve_str(&step.path, self.store.as_ref());
        let mut resolved_headers: HashMap<String, String> = step
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), resolver::resolve_str(v, self.store.as_ref())))
            .collect();
        let resolved_data = step
            .data
            .as_ref()
            .map(|data| resolver::resolve(data, self.store.as_ref()));

        // 3. Credential injection.
        if step.auth {
            if let Some(ref auth) = auth {
                match self.token.as_ref().and_then(|t| t.value()).map(String::from) {
                    Some(token) => {
                        Self::inject_token(&mut resolved_headers, auth, &token)
                    }
                    None => warn!(
                        "no credential available for auth step '{}'",
                        step.name
                    ),
                }
            }
        }

        let request = ResolvedRequest {
            method: step.method.clone(),
            path: resolved_path,
            service: step.service.clone(),
            headers: resolved_headers,
            data: resolved_data,
        };

        // 4. Transport.
        let (response, request_info) =
            match self.client.send(&request, &scenario.config).await {
                Ok(sent) => sent,
                Err(err) => {
                    return failed(
                        StepError::Transport(err).to_string(),
                        placeholder_request(),
                        step_start,
                    );
                }
            };

        let response_info = ResponseInfo {
            status: response.status,
            headers: response.headers.clone(),
            body: Some(response.body.clone()),
        };
        let body_json = response.json().ok();

        // 5. Captures, only for success-status responses.
        if response.is_success() {
            if let Err(err) = self.save_variables(step, body_json.as_ref()) {
                return StepResult {
                    name: step.name.clone(),
                    success: false,
                    error: Some(err.to_string()),
                    request: request_info,
                    response: Some(response_info),
                    duration_ms: step_start.elapsed().as_millis() as u64,
                };
            }
        }

        // 6. Assertions: independent kinds evaluated as guarded
        //    calls, all failures reported together.
        let failures =
            assertions::evaluate(&step.expected, response.status, body_json.as_ref());
        let success = failures.is_empty();
        let error = if success {
            debug!("step '{}' assertions passed", step.name);
            None
        } else {
            Some(StepError::Assertions(failures).to_string())
        };

        // 7. Credential update after a successful login step.
        if let Some(ref auth) = auth {
            if step.name == auth.login_step && success && response.is_success() {
                self.update_token(auth, body_json.as_ref());
            }
        }

        StepResult {
            name: step.name.clone(),
            success,
            error,
            request: request_info,
            response: Some(response_info),
            duration_ms: step_start.elapsed().as_millis() as u64,
        }
    }
}

#[async_trait]
impl Runner for ScenarioExecutor {
    #[instrument(skip(self, scenario), fields(name = %scenario.name))]
    async fn run(&mut self, scenario: &Scenario) -> Result<ScenarioResult> {
        let start_time = Instant::now();
        let mut scenario_success = true;
        let mut step_results = Vec::new();

        // Seed declared initial variables.
        for (name, value) in &scenario.vars {
            self.store.set(name, value.clone())?;
        }

        info!("Starting scenario: {}", scenario.name);

        for (idx, step) in scenario.steps.iter().enumerate() {
            info!(
                "Running step {}/{}: {}",
                idx + 1,
                scenario.steps.len(),
                step.name
            );

            let result = self.execute_step(step, scenario, true).await;
            let step_failed = !result.success;
            step_results.push(result);

            if step_failed {
                scenario_success = false;
                if !scenario.config.continue_on_failure {
                    info!("Stopping scenario after failed step");
                    break;
                }
            }
        }

        let result = ScenarioResult {
            name: scenario.name.clone(),
            success: scenario_success,
            error: if scenario_success {
                None
            } else {
                Some("one or more steps failed".to_string())
            },
            steps: step_results,
            duration_ms: start_time.elapsed().as_millis() as u64,
        };

        info!(
            "Scenario finished: {} ({} ms) - success: {}",
            scenario.name, result.duration_ms, result.success
        );

        Ok(result)
    }
}

fn parse_expiry(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
            .or_else(|| {
                s.parse::<i64>()
                    .ok()
                    .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            }),
        _ => None,
    }
}
