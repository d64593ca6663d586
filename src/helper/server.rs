//! Child side of the helper protocol, for helpers written in Rust
//!
//! [`serve`] reads one request, dispatches it through [`HelperFunctions`],
//! writes one response and returns the process exit code. Long-running
//! functions poll a [`Deadline`] so that a timeout is reported with a trace
//! instead of ending in the parent's kill.

use super::protocol::{HelperRequest, HelperResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Error class reported when the deadline passes
pub const TIMEOUT_ERROR_CLASS: &str = "HelperTimeout";

/// Time a function gets past its deadline to notice it
const CUTOFF_GRACE: Duration = Duration::from_millis(100);

/// A function-level failure reported back to the parent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperFailure {
    pub message: String,
    pub error_class: String,
    pub trace: Vec<String>,
}

impl HelperFailure {
    pub fn new(message: impl Into<String>, error_class: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_class: error_class.into(),
            trace: Vec::new(),
        }
    }

    /// Appends a trace frame (builder pattern)
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.trace.push(frame.into());
        self
    }
}

/// Cooperative time budget for one helper call
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Instant>,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Some(Instant::now() + budget),
        }
    }

    pub fn none() -> Self {
        Self { expires_at: None }
    }

    pub fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }

    /// Fail with a timeout naming `location` once the budget is spent
    pub fn check(&self, location: &str) -> Result<(), HelperFailure> {
        if self.expired() {
            return Err(
                HelperFailure::new("helper deadline exceeded", TIMEOUT_ERROR_CLASS)
                    .with_frame(location),
            );
        }
        Ok(())
    }

    fn remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }
}

/// The functions a helper binary exposes
#[async_trait]
pub trait HelperFunctions: Send + Sync {
    async fn call(
        &self,
        function: &str,
        args: Vec<Value>,
        deadline: &Deadline,
    ) -> Result<Value, HelperFailure>;
}

/// Handle one request from `input`, writing the response to `output`.
/// Returns 0 on success and 1 on any failure.
pub async fn serve<R, W>(
    mut input: R,
    mut output: W,
    functions: &dyn HelperFunctions,
    timeout: Option<Duration>,
) -> i32
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let response = handle(&mut input, functions, timeout).await;
    let code = match response {
        HelperResponse::Success { .. } => 0,
        HelperResponse::Failure { .. } => 1,
    };

    let mut body = match serde_json::to_vec(&response) {
        Ok(body) => body,
        Err(_) => return 1,
    };
    body.push(b'\n');
    if output.write_all(&body).await.is_err() || output.flush().await.is_err() {
        return 1;
    }
    code
}

async fn handle<R: AsyncRead + Unpin>(
    input: &mut R,
    functions: &dyn HelperFunctions,
    timeout: Option<Duration>,
) -> HelperResponse {
    let mut raw = Vec::new();
    if let Err(e) = input.read_to_end(&mut raw).await {
        return HelperResponse::failure(e.to_string(), "IOError", Vec::new());
    }
    let request: HelperRequest = match serde_json::from_slice(&raw) {
        Ok(request) => request,
        Err(e) => return HelperResponse::failure(e.to_string(), "InvalidRequest", Vec::new()),
    };

    let deadline = timeout.map_or_else(Deadline::none, Deadline::after);
    debug!("Dispatching {}", request.function);
    let call = functions.call(&request.function, request.args, &deadline);

    // Functions that never poll the deadline are cut off here.
    let result = match deadline.remaining() {
        Some(remaining) => match tokio::time::timeout(remaining + CUTOFF_GRACE, call).await {
            Ok(result) => result,
            Err(_) => Err(
                HelperFailure::new("helper deadline exceeded", TIMEOUT_ERROR_CLASS)
                    .with_frame(request.function.as_str()),
            ),
        },
        None => call.await,
    };

    match result {
        Ok(value) => HelperResponse::success(value),
        Err(failure) => {
            HelperResponse::failure(failure.message, failure.error_class, failure.trace)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Functions;

    #[async_trait]
    impl HelperFunctions for Functions {
        async fn call(
            &self,
            function: &str,
            args: Vec<Value>,
            deadline: &Deadline,
        ) -> Result<Value, HelperFailure> {
            match function {
                "echo" => Ok(Value::Array(args)),
                "fail" => Err(HelperFailure::new("cannot resolve", "ResolutionError")
                    .with_frame("resolver.rs:10")),
                "spin" => loop {
                    deadline.check("spin loop")?;
                    tokio::time::sleep(Duration::from_millis(5)).await;
                },
                "hang" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(Value::Null)
                }
                other => Err(HelperFailure::new(
                    format!("unknown function {}", other),
                    "UnknownFunction",
                )),
            }
        }
    }

    async fn run(input: &str, timeout: Option<Duration>) -> (i32, Value) {
        let mut output = Vec::new();
        let code = serve(input.as_bytes(), &mut output, &Functions, timeout).await;
        (code, serde_json::from_slice(&output).unwrap())
    }

    #[tokio::test]
    async fn test_success() {
        let (code, response) = run(r#"{"function":"echo","args":[1,"a"]}"#, None).await;
        assert_eq!(code, 0);
        assert_eq!(response, json!({"result": [1, "a"]}));
    }

    #[tokio::test]
    async fn test_function_error() {
        let (code, response) = run(r#"{"function":"fail","args":[]}"#, None).await;
        assert_eq!(code, 1);
        assert_eq!(response["error"], "cannot resolve");
        assert_eq!(response["error_class"], "ResolutionError");
        assert_eq!(response["trace"], json!(["resolver.rs:10"]));
    }

    #[tokio::test]
    async fn test_invalid_request() {
        let (code, response) = run("not json", None).await;
        assert_eq!(code, 1);
        assert_eq!(response["error_class"], "InvalidRequest");
    }

    #[tokio::test]
    async fn test_cooperative_deadline() {
        let (code, response) =
            run(r#"{"function":"spin","args":[]}"#, Some(Duration::from_millis(20))).await;
        assert_eq!(code, 1);
        assert_eq!(response["error_class"], TIMEOUT_ERROR_CLASS);
        assert_eq!(response["trace"], json!(["spin loop"]));
    }

    #[tokio::test]
    async fn test_deadline_cuts_off_non_polling_function() {
        let (code, response) =
            run(r#"{"function":"hang","args":[]}"#, Some(Duration::from_millis(20))).await;
        assert_eq!(code, 1);
        assert_eq!(response["error_class"], TIMEOUT_ERROR_CLASS);
        assert_eq!(response["trace"], json!(["hang"]));
    }

    #[test]
    fn test_deadline() {
        assert!(!Deadline::none().expired());
        assert!(Deadline::none().check("x").is_ok());
        assert!(Deadline::after(Duration::ZERO).expired());
        assert!(!Deadline::after(Duration::from_secs(60)).expired());
    }
}
