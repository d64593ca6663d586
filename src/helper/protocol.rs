//! Wire format between the parent and a helper process
//!
//! stdin: `{"function": "...", "args": [...]}`
//! stdout: `{"result": ...}` or `{"error": "...", "error_class": "...", "trace": [...]}`

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The single request written to a helper's stdin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelperRequest {
    pub function: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl HelperRequest {
    pub fn new(function: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            function: function.into(),
            args,
        }
    }
}

/// The single response a helper writes to stdout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HelperResponse {
    Failure {
        error: String,
        #[serde(default)]
        error_class: String,
        #[serde(default)]
        trace: Vec<String>,
    },
    Success {
        result: Value,
    },
}

impl HelperResponse {
    pub fn success(result: Value) -> Self {
        HelperResponse::Success { result }
    }

    pub fn failure(
        error: impl Into<String>,
        error_class: impl Into<String>,
        trace: Vec<String>,
    ) -> Self {
        HelperResponse::Failure {
            error: error.into(),
            error_class: error_class.into(),
            trace,
        }
    }

    /// Parse helper output. Tools that print noise before the response are
    /// handled by falling back to the last non-empty line.
    pub fn parse(output: &str) -> Option<Self> {
        if let Ok(response) = serde_json::from_str(output.trim()) {
            return Some(response);
        }
        output
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .and_then(|line| serde_json::from_str(line.trim()).ok())
    }
}
