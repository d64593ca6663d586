//! Integration tests for the sandboxed helper protocol
//!
//! Helpers are small `sh` scripts, so these only run on unix.

#![cfg(unix)]

use depcore::config::HelperSettings;
use depcore::domain::DependencyFile;
use depcore::error::{CoreError, HelperError};
use depcore::helper::{HelperCommand, HelperRunner};
use serde_json::json;
use std::time::Duration;

fn script(body: &str) -> HelperCommand {
    HelperCommand::new("sh").arg("-c").arg(body)
}

fn runner_in(root: &std::path::Path) -> HelperRunner {
    HelperRunner::new(HelperSettings {
        tmp_root: Some(root.to_path_buf()),
        grace_period: Duration::from_secs(1),
        ..HelperSettings::default()
    })
}

mod responses {
    use super::*;

    #[tokio::test]
    async fn test_success_returns_result() {
        let root = tempfile::tempdir().unwrap();
        let command = script(r#"printf '{"result": %s}' "$(cat)""#);
        let result = runner_in(root.path())
            .run(&command, "echo_request", vec![json!(1), json!("two")])
            .await
            .unwrap();
        assert_eq!(result, json!({"function": "echo_request", "args": [1, "two"]}));
    }

    #[tokio::test]
    async fn test_application_error_fields() {
        let root = tempfile::tempdir().unwrap();
        let command = script(
            r#"cat >/dev/null; echo 'resolving' >&2; echo '{"error": "no version of rack satisfies ~> 9.0", "error_class": "VersionConflict", "trace": ["resolver.rb:42"]}'; exit 1"#,
        )
        .ecosystem("bundler");
        let err = runner_in(root.path())
            .run(&command, "resolve", vec![json!("rack")])
            .await
            .unwrap_err();

        match &err {
            HelperError::Application {
                message,
                error_class,
                trace,
                context,
            } => {
                assert_eq!(message, "no version of rack satisfies ~> 9.0");
                assert_eq!(error_class, "VersionConflict");
                assert_eq!(trace, &vec!["resolver.rb:42".to_string()]);
                assert_eq!(context.ecosystem.as_deref(), Some("bundler"));
                assert_eq!(context.function, "resolve");
                assert_eq!(context.args, vec![json!("rack")]);
                assert!(context.command.starts_with("sh -c "));
                assert_eq!(context.stderr_output, "resolving\n");
                assert_eq!(context.exit_code, Some(1));
                assert_eq!(context.termsig, None);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(CoreError::from(err).error_type(), "helper_subprocess_failed");
    }

    #[tokio::test]
    async fn test_success_shape_with_failed_exit() {
        let root = tempfile::tempdir().unwrap();
        let command = script(r#"cat >/dev/null; echo '{"result": true}'; exit 4"#);
        let err = runner_in(root.path())
            .run(&command, "check", vec![])
            .await
            .unwrap_err();
        match err {
            HelperError::Application { context, .. } => assert_eq!(context.exit_code, Some(4)),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unparsable_output() {
        let root = tempfile::tempdir().unwrap();
        let command = script("cat >/dev/null; echo 'bundler crashed' >&2; echo 'not json'; exit 3");
        let err = runner_in(root.path())
            .run(&command, "parse", vec![])
            .await
            .unwrap_err();
        match &err {
            HelperError::UnparsableOutput { message, context } => {
                assert!(message.contains("not json"));
                assert_eq!(context.ecosystem, None);
                assert_eq!(context.stderr_output, "bundler crashed\n");
                assert_eq!(context.exit_code, Some(3));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(CoreError::from(err).error_type(), "helper_output_unparsable");
    }

    #[tokio::test]
    async fn test_no_output() {
        let root = tempfile::tempdir().unwrap();
        let err = runner_in(root.path())
            .run(&script("cat >/dev/null; exit 1"), "parse", vec![])
            .await
            .unwrap_err();
        match err {
            HelperError::UnparsableOutput { message, .. } => {
                assert_eq!(message, "No output from command");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stderr_is_truncated() {
        let root = tempfile::tempdir().unwrap();
        let runner = HelperRunner::new(HelperSettings {
            tmp_root: Some(root.path().to_path_buf()),
            max_stderr_bytes: 10,
            ..HelperSettings::default()
        });
        let command = script("cat >/dev/null; printf '%0100d' 0 >&2; exit 1");
        let err = runner.run(&command, "noisy", vec![]).await.unwrap_err();
        match err {
            HelperError::UnparsableOutput { context, .. } => {
                assert_eq!(context.stderr_output, "0000000000");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stderr_prepended_when_merged() {
        let root = tempfile::tempdir().unwrap();
        let command =
            script(r#"cat >/dev/null; echo 'warning: deprecated' >&2; echo '{"result": 1}'"#)
                .stderr_to_stdout();
        let result = runner_in(root.path())
            .run(&command, "check", vec![])
            .await
            .unwrap();
        assert_eq!(result, json!(1));
    }
}

mod process_control {
    use super::*;

    #[tokio::test]
    async fn test_signal_kill_is_detected() {
        let root = tempfile::tempdir().unwrap();
        let err = runner_in(root.path())
            .run(&script("kill -9 $$"), "resolve", vec![])
            .await
            .unwrap_err();

        assert!(!err.is_retryable());
        match &err {
            HelperError::Signaled { signal, context } => {
                assert_eq!(*signal, 9);
                assert_eq!(context.termsig, Some(9));
                assert_eq!(context.exit_code, None);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(CoreError::from(err).error_type(), "helper_killed");
    }

    #[tokio::test]
    async fn test_timeout_kills_child_and_cleans_up() {
        let root = tempfile::tempdir().unwrap();
        let command = script("exec sleep 5").timeout(Duration::from_millis(200));
        let err = runner_in(root.path())
            .run(&command, "resolve", vec![])
            .await
            .unwrap_err();

        match &err {
            HelperError::Timeout { timeout, context } => {
                assert_eq!(*timeout, Duration::from_millis(200));
                assert!(context.time_taken >= Duration::from_millis(200));
                assert!(context.time_taken < Duration::from_secs(5));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.is_retryable());

        let leftovers: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    /// Alive and not a zombie, according to `ps`
    fn is_running(pid: &str) -> bool {
        let output = std::process::Command::new("ps")
            .args(["-o", "stat=", "-p", pid])
            .output()
            .unwrap();
        let stat = String::from_utf8_lossy(&output.stdout);
        output.status.success() && !stat.trim().is_empty() && !stat.trim().starts_with('Z')
    }

    #[tokio::test]
    async fn test_timeout_kills_forked_descendants() {
        let root = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let pid_file = scratch.path().join("sleeper.pid");
        let command = script(&format!(
            "sleep 30 & echo $! > '{}'; wait; echo done",
            pid_file.display()
        ))
        .timeout(Duration::from_millis(300));

        let err = runner_in(root.path())
            .run(&command, "resolve", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, HelperError::Timeout { .. }));

        let pid = std::fs::read_to_string(&pid_file).unwrap();
        let pid = pid.trim();
        let mut alive = true;
        for _ in 0..40 {
            alive = is_running(pid);
            if !alive {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(!alive, "forked sleep {} outlived the helper", pid);
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let root = tempfile::tempdir().unwrap();
        let command = HelperCommand::new("/nonexistent/depcore-helper");
        let err = runner_in(root.path())
            .run(&command, "resolve", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, HelperError::Spawn { .. }));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }
}

mod files {
    use super::*;

    #[tokio::test]
    async fn test_files_are_written_to_working_directory() {
        let root = tempfile::tempdir().unwrap();
        let files = vec![
            DependencyFile::new("deps.txt", "rack 1.2.0"),
            DependencyFile::new("nested.txt", "inner").in_directory("/sub"),
        ];
        let command = script(
            r#"cat >/dev/null; printf '{"result": ["%s", "%s"]}' "$(cat deps.txt)" "$(cat sub/nested.txt)""#,
        );
        let result = runner_in(root.path())
            .run_with_files(&command, "read", vec![], &files)
            .await
            .unwrap();
        assert_eq!(result, json!(["rack 1.2.0", "inner"]));
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_run_shell_command() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dummyfile"), "rack").unwrap();
        let runner = HelperRunner::default();

        let output = runner
            .run_shell_command(
                &script("cat Dummyfile; echo ' ok' >&2").stderr_to_stdout(),
                dir.path(),
            )
            .await
            .unwrap();
        assert_eq!(output, " ok\nrack");

        let err = runner
            .run_shell_command(&script("echo 'lock failed'; exit 2"), dir.path())
            .await
            .unwrap_err();
        match err {
            HelperError::Application {
                message,
                error_class,
                context,
                ..
            } => {
                assert_eq!(message, "lock failed\n");
                assert_eq!(error_class, "ShellCommandFailed");
                assert_eq!(context.exit_code, Some(2));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
