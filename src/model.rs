//! Scenario, step and expectation data model.
//!
//! Scenarios are declared in YAML and immutable once loaded; the
//! executor resolves placeholders into a fresh copy per run, never
//! mutating the template.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// An ordered chain of steps sharing one variable/token context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Tags for filtering and grouping scenarios.
    #[serde(default)]
    pub tags: Vec<String>,
    pub steps: Vec<Step>,
    /// Initial variables seeded into the store before the first step.
    #[serde(default)]
    pub vars: HashMap<String, Value>,
    #[serde(default)]
    pub config: ScenarioConfig,
}

/// A single declarative test case: one HTTP call, optional variable
/// captures, and an assertion set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub method: HttpMethod,
    /// Request path; may contain `${name}` placeholders.
    pub path: String,
    /// Named service from the scenario's service map; `default`
    /// otherwise.
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Request payload. Sent as query parameters for GET, as a JSON
    /// body otherwise.
    #[serde(default)]
    pub data: Option<Value>,
    /// Step requires a valid bearer token before it runs.
    #[serde(default)]
    pub auth: bool,
    /// Variable name → path expression into the response body.
    #[serde(default)]
    pub save_variables: HashMap<String, String>,
    #[serde(default)]
    pub expected: Expected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        };
        f.write_str(name)
    }
}

/// Declarative assertion set evaluated against one response.
///
/// Every declared kind must pass. All kinds are optional; an empty
/// set asserts nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Expected {
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Dotted field paths that must exist in the response body.
    #[serde(default)]
    pub contains_fields: Vec<String>,
    /// Path expression → expected value (structural subset compare
    /// for mapping/sequence expectations).
    #[serde(default)]
    pub field_values: HashMap<String, Value>,
    /// Path expression → expected kind tag.
    #[serde(default)]
    pub field_types: HashMap<String, KindTag>,
    /// Path expression → array rule.
    #[serde(default)]
    pub array_assertions: HashMap<String, ArrayAssertion>,
    /// Partial structure the whole response body must contain.
    #[serde(default)]
    pub response_body: Option<Value>,
}

impl Expected {
    pub fn is_empty(&self) -> bool {
        self.status_code.is_none()
            && self.contains_fields.is_empty()
            && self.field_values.is_empty()
            && self.field_types.is_empty()
            && self.array_assertions.is_empty()
            && self.response_body.is_none()
    }
}

/// Cardinality / containment / predicate rules for one array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArrayAssertion {
    #[serde(default)]
    pub length: Option<usize>,
    /// Items that must be contained: scalars by direct membership,
    /// objects by partial (subset) match.
    #[serde(default)]
    pub contains: Vec<Value>,
    /// At least one element must carry `field == value`.
    #[serde(default, rename = "match")]
    pub match_rule: Option<MatchRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRule {
    pub field: String,
    pub value: Value,
}

/// Closed set of runtime shapes a field-type assertion can name.
///
/// Compared structurally against the extracted value, never against
/// a host-language type object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindTag {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Null,
}

impl KindTag {
    /// The kind tag of a JSON value.
    pub fn of(value: &Value) -> KindTag {
        match value {
            Value::String(_) => KindTag::String,
            Value::Number(_) => KindTag::Number,
            Value::Bool(_) => KindTag::Boolean,
            Value::Array(_) => KindTag::Array,
            Value::Object(_) => KindTag::Object,
            Value::Null => KindTag::Null,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KindTag::String => "string",
            KindTag::Number => "number",
            KindTag::Boolean => "boolean",
            KindTag::Array => "array",
            KindTag::Object => "object",
            KindTag::Null => "null",
        }
    }
}

impl fmt::Display for KindTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared per-scenario execution settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScenarioConfig {
    /// Base URL for steps without a `service` (alias for the
    /// `default` service).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Service name → base URL.
    #[serde(default)]
    pub services: HashMap<String, String>,
    /// Default headers merged under each step's own headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Keep running the remaining steps after a failure.
    #[serde(default)]
    pub continue_on_failure: bool,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
}

/// Where the bearer credential comes from and how it is presented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Name of the credential-issuing step within the scenario.
    pub login_step: String,
    /// Path to the token in the login response body.
    #[serde(default = "default_token_path")]
    pub token_path: String,
    /// Path to the expiry in the login response body (epoch seconds
    /// or RFC 3339). Absent means the default lifetime applies.
    #[serde(default)]
    pub expire_path: Option<String>,
    #[serde(default = "default_auth_header")]
    pub header: String,
    #[serde(default = "default_auth_scheme")]
    pub scheme: String,
    /// Seconds before expiry at which the token counts as stale.
    #[serde(default = "default_refresh_skew")]
    pub refresh_skew: i64,
    /// Lifetime in seconds applied when the login response carries
    /// no expiry.
    #[serde(default = "default_token_lifetime")]
    pub default_lifetime: i64,
}

fn default_timeout() -> u64 {
    30
}

fn default_token_path() -> String {
    "$.token".to_string()
}

fn default_auth_header() -> String {
    "Authorization".to_string()
}

fn default_auth_scheme() -> String {
    "Bearer".to_string()
}

fn default_refresh_skew() -> i64 {
    30
}

fn default_token_lifetime() -> i64 {
    3600
}

impl Scenario {
    /// Deserialize a scenario from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize the scenario to a YAML string.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Find a step by name.
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }
}

/// Result of running a single scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub error: Option<String>,
    pub steps: Vec<StepResult>,
    pub duration_ms: u64,
}

/// Result of running a single step within a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub name: String,
    pub success: bool,
    pub error: Option<String>,
    pub request: RequestInfo,
    pub response: Option<ResponseInfo>,
    pub duration_ms: u64,
}

/// Captured HTTP request information for a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

/// Captured HTTP response information for a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseInfo {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}
