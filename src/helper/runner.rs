//! Parent side of the helper protocol: spawning, timeouts and classification

use super::protocol::{HelperRequest, HelperResponse};
use crate::config::HelperSettings;
use crate::domain::{DependencyFile, FileType};
use crate::error::{ErrorContext, HelperError};
use serde_json::Value;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Prefix of every helper temp dir
const TMP_DIR_PREFIX: &str = "depcore-helper";

/// A helper program and how to run it
#[derive(Debug, Clone)]
pub struct HelperCommand {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    timeout: Option<Duration>,
    stderr_to_stdout: bool,
    ecosystem: Option<String>,
}

impl HelperCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: None,
            stderr_to_stdout: false,
            ecosystem: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Override the runner's default timeout for this command
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Prepend stderr to stdout before reading the response
    pub fn stderr_to_stdout(mut self) -> Self {
        self.stderr_to_stdout = true;
        self
    }

    /// Name the ecosystem this helper serves, recorded in error context
    pub fn ecosystem(mut self, ecosystem: impl Into<String>) -> Self {
        self.ecosystem = Some(ecosystem.into());
        self
    }

    /// Shell-style rendering for logs and error context
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Raw result of one child run
struct Captured {
    status: ExitStatus,
    stdout: String,
    stderr: String,
}

/// Runs helper processes, each in its own temporary directory
#[derive(Debug, Clone, Default)]
pub struct HelperRunner {
    settings: HelperSettings,
}

impl HelperRunner {
    pub fn new(settings: HelperSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &HelperSettings {
        &self.settings
    }

    /// Send `function(args)` to the helper and return its result
    pub async fn run(
        &self,
        command: &HelperCommand,
        function: &str,
        args: Vec<Value>,
    ) -> Result<Value, HelperError> {
        self.run_with_files(command, function, args, &[]).await
    }

    /// Like [`run`](Self::run), with `files` written into the helper's
    /// working directory first
    pub async fn run_with_files(
        &self,
        command: &HelperCommand,
        function: &str,
        args: Vec<Value>,
        files: &[DependencyFile],
    ) -> Result<Value, HelperError> {
        let dir = self.temp_dir()?;
        write_files(dir.path(), files).await?;

        let request = HelperRequest::new(function, args);
        let payload = serde_json::to_vec(&request).map_err(std::io::Error::from)?;
        if self.settings.debug_helpers {
            debug!(
                "Reproduce with: cd {} && echo '{}' | {}",
                dir.path().display(),
                String::from_utf8_lossy(&payload),
                command.display()
            );
        }

        let mut context = ErrorContext {
            ecosystem: command.ecosystem.clone(),
            command: command.display(),
            function: function.to_string(),
            args: request.args,
            ..ErrorContext::default()
        };
        let captured = self.spawn(command, dir.path(), &payload, &mut context).await?;
        // `dir` is dropped (and removed) on every return path from here on.

        let output = if command.stderr_to_stdout {
            format!("{}\n{}", captured.stderr, captured.stdout)
        } else {
            captured.stdout
        };

        match HelperResponse::parse(&output) {
            Some(HelperResponse::Success { result }) if captured.status.success() => Ok(result),
            Some(HelperResponse::Success { .. }) => Err(HelperError::Application {
                message: format!("helper exited with {}", captured.status),
                error_class: String::new(),
                trace: Vec::new(),
                context: Box::new(context),
            }),
            Some(HelperResponse::Failure {
                error,
                error_class,
                trace,
            }) => Err(HelperError::Application {
                message: error,
                error_class,
                trace,
                context: Box::new(context),
            }),
            None => Err(HelperError::UnparsableOutput {
                message: if output.trim().is_empty() {
                    "No output from command".to_string()
                } else {
                    output
                },
                context: Box::new(context),
            }),
        }
    }

    /// Run a plain command in `dir` and return its output; a nonzero exit is
    /// an application error carrying that output
    pub async fn run_shell_command(
        &self,
        command: &HelperCommand,
        dir: &Path,
    ) -> Result<String, HelperError> {
        let mut context = ErrorContext {
            ecosystem: command.ecosystem.clone(),
            command: command.display(),
            ..ErrorContext::default()
        };
        let captured = self.spawn(command, dir, &[], &mut context).await?;

        let output = if command.stderr_to_stdout {
            format!("{}{}", captured.stderr, captured.stdout)
        } else {
            captured.stdout
        };
        if captured.status.success() {
            return Ok(output);
        }
        Err(HelperError::Application {
            message: output,
            error_class: "ShellCommandFailed".to_string(),
            trace: Vec::new(),
            context: Box::new(context),
        })
    }

    /// Fresh, exclusively owned directory removed when dropped
    pub fn temp_dir(&self) -> Result<TempDir, HelperError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TMP_DIR_PREFIX);
        let dir = match &self.settings.tmp_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    async fn spawn(
        &self,
        command: &HelperCommand,
        dir: &Path,
        payload: &[u8],
        context: &mut ErrorContext,
    ) -> Result<Captured, HelperError> {
        let timeout = command.timeout.unwrap_or(self.settings.timeout);
        let start = Instant::now();

        let mut process = Command::new(&command.program);
        process
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group, so a timeout can take down everything it forked.
        #[cfg(unix)]
        process.process_group(0);

        let mut child = process.spawn().map_err(|source| HelperError::Spawn {
            program: command.program.clone(),
            source,
        })?;

        let outcome = tokio::time::timeout(timeout, communicate(&mut child, payload)).await;
        context.time_taken = start.elapsed();

        let (status, stdout, stderr) = match outcome {
            Ok(result) => result?,
            Err(_) => {
                self.reap(&mut child).await;
                context.time_taken = start.elapsed();
                warn!("Helper {} timed out after {:?}", command.display(), timeout);
                return Err(HelperError::Timeout {
                    timeout,
                    context: Box::new(context.clone()),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();
        context.stderr_output = truncate(&stderr, self.settings.max_stderr_bytes).to_string();
        context.exit_code = status.code();
        context.termsig = termination_signal(&status);

        debug!(
            "Helper {} ({}) finished in {:?}: {}",
            command.display(),
            context.function,
            context.time_taken,
            status
        );
        if self.settings.debug_helpers {
            debug!("stdout: {}", stdout);
            debug!("stderr: {}", stderr);
        }

        if let Some(signal) = context.termsig {
            return Err(HelperError::Signaled {
                signal,
                context: Box::new(context.clone()),
            });
        }

        Ok(Captured {
            status,
            stdout,
            stderr,
        })
    }

    /// Kill the child's process group and wait for the child within the
    /// grace period
    async fn reap(&self, child: &mut Child) {
        if let Some(pid) = child.id() {
            kill_process_group(pid);
        }
        if let Err(e) = child.start_kill() {
            debug!("Failed to kill helper: {}", e);
        }
        if tokio::time::timeout(self.settings.grace_period, child.wait())
            .await
            .is_err()
        {
            warn!(
                "Helper did not exit within {:?} of being killed",
                self.settings.grace_period
            );
        }
    }
}

async fn read_all<R: AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut reader) = reader {
        reader.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Write the request, close stdin, then collect output until exit
async fn communicate(
    child: &mut Child,
    payload: &[u8],
) -> std::io::Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    if let Some(mut stdin) = child.stdin.take() {
        // A helper that exits without reading its input is not an IO failure.
        match stdin.write_all(payload).await {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
            _ => {}
        }
    }

    let (status, stdout, stderr) = tokio::join!(child.wait(), read_all(stdout), read_all(stderr));
    Ok((status?, stdout?, stderr?))
}

async fn write_files(dir: &Path, files: &[DependencyFile]) -> Result<(), HelperError> {
    for file in files {
        if file.is_deleted() || file.file_type() != FileType::File {
            continue;
        }
        let path = dir.join(file.path());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, file.content().as_bytes()).await?;
    }
    Ok(())
}

/// Longest prefix of `text` within `max` bytes, on a char boundary
fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(unix)]
fn kill_process_group(pgid: u32) {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return;
    };
    // SAFETY: kill(2) takes plain integers; a negative pid addresses the group.
    if unsafe { libc::kill(-pgid, libc::SIGKILL) } != 0 {
        debug!(
            "Failed to kill helper process group {}: {}",
            pgid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: u32) {}

#[cfg(unix)]
fn termination_signal(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn termination_signal(_status: &ExitStatus) -> Option<i32> {
    None
}
