//! Out-of-process handlers.
//!
//! # Responsibilities
//! - Locate handler module files under a code location
//! - Run one child process per invocation and speak the stdin/stdout protocol
//! - Forward handler stderr to the gateway log
//!
//! # Design Decisions
//! - Each child leads its own process group; the group is killed as soon as
//!   the invocation is dropped, so a timed-out handler and anything it
//!   started never outlive the request
//! - The handler environment overlay is applied to the child only
//! - Code locations are made absolute before use, since the child runs with
//!   the code location as its working directory
//! - Startup checks load the module and look the entry point up without
//!   invoking it; per-request runs report the same failures as exit codes

use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, Stdio};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::config::environment::HandlerEnvironment;
use crate::invocation::error::{HandlerError, InvocationError, ResolutionError};
use crate::invocation::handler::{HandlerResolver, Invocable, InvocationContext};
use crate::invocation::runtime::{Runtime, EXIT_ENTRY_POINT_NOT_FOUND, EXIT_IMPORT_FAILED};
use crate::routing::HandlerRef;

/// Resolves handler references to script or executable files on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessResolver;

impl ProcessResolver {
    pub fn new() -> Self {
        Self
    }

    fn locate(&self, code_location: &Path, handler: &HandlerRef) -> Result<ProcessHandler, ResolutionError> {
        let code_location = anchored(code_location);
        let Some((runtime, file)) = Runtime::locate(&code_location, handler) else {
            let tried = Runtime::candidates(&code_location, handler)
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ResolutionError::ModuleNotFound {
                handler: handler.to_string(),
                code_location,
                tried,
            });
        };

        tracing::debug!(
            handler = %handler,
            runtime = runtime.name(),
            file = %file.display(),
            "Resolved handler module"
        );

        Ok(ProcessHandler {
            runtime,
            file,
            code_location,
            handler: handler.clone(),
        })
    }
}

impl HandlerResolver for ProcessResolver {
    fn resolve(&self, code_location: &Path, handler: &HandlerRef) -> Result<Arc<dyn Invocable>, ResolutionError> {
        Ok(Arc::new(self.locate(code_location, handler)?))
    }

    fn check(
        &self,
        code_location: &Path,
        handler: &HandlerRef,
        environment: &HandlerEnvironment,
    ) -> Result<(), ResolutionError> {
        self.locate(code_location, handler)?.check(environment)
    }
}

/// `code_location` anchored at the gateway's working directory.
fn anchored(code_location: &Path) -> PathBuf {
    std::path::absolute(code_location).unwrap_or_else(|_| code_location.to_path_buf())
}

/// One handler module file and the runtime that executes it.
#[derive(Debug, Clone)]
pub struct ProcessHandler {
    runtime: Runtime,
    file: PathBuf,
    code_location: PathBuf,
    handler: HandlerRef,
}

impl ProcessHandler {
    fn prepare(&self, command: &mut StdCommand, environment: &HandlerEnvironment) {
        command
            .current_dir(&self.code_location)
            .envs(environment.iter())
            .env("_HANDLER", self.handler.to_string())
            .env("LAMBDA_TASK_ROOT", &self.code_location);
    }

    /// Load the module and look up the entry point without invoking it.
    fn check(&self, environment: &HandlerEnvironment) -> Result<(), ResolutionError> {
        let Some(mut command) = self.runtime.check_command(&self.file, self.handler.entry_point()) else {
            return Ok(());
        };
        self.prepare(&mut command, environment);

        let output = command
            .stdin(Stdio::null())
            .output()
            .map_err(|err| ResolutionError::ImportFailed {
                module: self.handler.module().to_string(),
                detail: format!("cannot run {}: {err}", self.runtime.name()),
            })?;

        match output.status.code() {
            Some(0) => Ok(()),
            Some(EXIT_ENTRY_POINT_NOT_FOUND) => Err(ResolutionError::EntryPointNotFound {
                module: self.handler.module().to_string(),
                entry_point: self.handler.entry_point().to_string(),
            }),
            _ => Err(ResolutionError::ImportFailed {
                module: self.handler.module().to_string(),
                detail: last_line(&String::from_utf8_lossy(&output.stderr)),
            }),
        }
    }
}

impl Invocable for ProcessHandler {
    fn invoke(&self, event: Value, context: InvocationContext) -> BoxFuture<'static, Result<Value, InvocationError>> {
        let mut command = self.runtime.command(&self.file, self.handler.entry_point());
        self.prepare(&mut command, &context.environment);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        lead_own_group(&mut command);

        let mut command = tokio::process::Command::from(command);
        command.kill_on_drop(true);

        let handler = self.handler.clone();
        let input = format!("{}\n{}\n", event, context.to_json());

        Box::pin(async move {
            let mut child = command.spawn().map_err(HandlerError::Spawn)?;
            let mut group = ProcessGroup::new(child.id());
            let stdin = child.stdin.take();

            let feed = async move {
                if let Some(mut stdin) = stdin {
                    // A child that exits without reading closes the pipe early.
                    let _ = stdin.write_all(input.as_bytes()).await;
                    let _ = stdin.shutdown().await;
                }
            };
            let ((), output) = tokio::join!(feed, child.wait_with_output());
            group.release();
            let output = output.map_err(HandlerError::Spawn)?;

            let stderr = String::from_utf8_lossy(&output.stderr);
            for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
                tracing::info!(handler = %handler, "{}", line);
            }
            let last_stderr_line = last_line(&stderr);

            match output.status.code() {
                Some(0) => Ok(parse_output(&output.stdout)?),
                Some(EXIT_ENTRY_POINT_NOT_FOUND) => Err(ResolutionError::EntryPointNotFound {
                    module: handler.module().to_string(),
                    entry_point: handler.entry_point().to_string(),
                }
                .into()),
                Some(EXIT_IMPORT_FAILED) => Err(ResolutionError::ImportFailed {
                    module: handler.module().to_string(),
                    detail: last_stderr_line,
                }
                .into()),
                code => Err(HandlerError::Exited {
                    code,
                    stderr: last_stderr_line,
                }
                .into()),
            }
        })
    }
}

/// Process group led by a handler child, killed on drop unless released.
struct ProcessGroup {
    leader: Option<u32>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self { leader }
    }

    /// The child finished on its own; leave the group alone.
    fn release(&mut self) {
        self.leader.take();
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(leader) = self.leader.take() {
            kill_group(leader);
        }
    }
}

#[cfg(unix)]
fn lead_own_group(command: &mut StdCommand) {
    use std::os::unix::process::CommandExt;
    command.process_group(0);
}

#[cfg(not(unix))]
fn lead_own_group(_command: &mut StdCommand) {}

#[cfg(unix)]
fn kill_group(leader: u32) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Err(err) = killpg(Pid::from_raw(leader as i32), Signal::SIGKILL) {
        tracing::debug!(pgid = leader, error = %err, "Process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_group(_leader: u32) {}

fn last_line(text: &str) -> String {
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_default()
        .to_string()
}

/// The whole of stdout as JSON, else its last non-empty line.
fn parse_output(stdout: &[u8]) -> Result<Value, HandlerError> {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(trimmed).or_else(|err| {
        trimmed
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .and_then(|line| serde_json::from_str(line).ok())
            .ok_or(HandlerError::InvalidOutput(err))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_whole_output() {
        assert_eq!(
            parse_output(b"{\n  \"statusCode\": 200\n}\n").unwrap(),
            json!({"statusCode": 200})
        );
    }

    #[test]
    fn test_parse_last_line_after_noise() {
        assert_eq!(
            parse_output(b"starting up\n{\"body\":\"ok\"}\n\n").unwrap(),
            json!({"body": "ok"})
        );
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(parse_output(b"not json"), Err(HandlerError::InvalidOutput(_))));
        assert_eq!(parse_output(b"  \n").unwrap(), Value::Null);
    }

    #[test]
    fn test_missing_module_lists_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let handler: HandlerRef = "app.handler".parse().unwrap();
        match ProcessResolver::new().resolve(dir.path(), &handler) {
            Err(ResolutionError::ModuleNotFound { tried, .. }) => assert!(tried.contains("app.py")),
            Err(other) => panic!("unexpected error {other}"),
            Ok(_) => panic!("expected resolution to fail"),
        }
    }

    fn python3_available() -> bool {
        StdCommand::new("python3")
            .arg("--version")
            .output()
            .is_ok_and(|output| output.status.success())
    }

    #[test]
    fn test_check_loads_python_module_and_entry_point() {
        if !python3_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("app.py"),
            "import os\n\ndef handler(event, context):\n    return {'statusCode': 200}\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.py"), "raise RuntimeError('no config')\n").unwrap();

        let resolver = ProcessResolver::new();
        let env = HandlerEnvironment::new();
        let check = |reference: &str| resolver.check(dir.path(), &reference.parse().unwrap(), &env);

        assert!(check("app.handler").is_ok());
        assert!(matches!(
            check("app.handlr"),
            Err(ResolutionError::EntryPointNotFound { ref entry_point, .. }) if entry_point == "handlr"
        ));
        match check("broken.handler") {
            Err(ResolutionError::ImportFailed { detail, .. }) => assert!(detail.contains("no config")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use crate::resilience::CancelSource;
        use std::time::Duration;

        const SCRIPT: &str = r#"
case "$1" in
  handler)
    read -r event
    read -r context
    echo "processing" >&2
    printf '{"statusCode":200,"headers":{"x-table":"%s"},"body":%s}\n' "$TABLE" "$(printf '%s' "$event" | sed 's/.*"body":\("[^"]*"\).*/\1/')"
    ;;
  boom)
    echo "kaboom" >&2
    exit 3
    ;;
  *)
    exit 64
    ;;
esac
"#;

        fn context(env: HandlerEnvironment) -> InvocationContext {
            InvocationContext {
                request_id: "req-1".into(),
                function_name: "app.handler".into(),
                deadline: None,
                environment: Arc::new(env),
                cancel: CancelSource::new().token(),
            }
        }

        fn resolve(dir: &Path, reference: &str) -> Arc<dyn Invocable> {
            let handler: HandlerRef = reference.parse().unwrap();
            ProcessResolver::new().resolve(dir, &handler).unwrap()
        }

        #[tokio::test]
        async fn test_shell_handler_round_trip() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("app.sh"), SCRIPT).unwrap();
            let mut env = HandlerEnvironment::new();
            env.set("TABLE", "items");

            let result = resolve(dir.path(), "app.handler")
                .invoke(json!({"body": "hello"}), context(env))
                .await
                .unwrap();
            assert_eq!(
                result,
                json!({"statusCode": 200, "headers": {"x-table": "items"}, "body": "hello"})
            );
        }

        #[tokio::test]
        async fn test_relative_code_location() {
            let dir = tempfile::Builder::new().tempdir_in(".").unwrap();
            std::fs::write(dir.path().join("app.sh"), SCRIPT).unwrap();
            let relative = Path::new(".").join(dir.path().file_name().unwrap());
            assert!(relative.is_relative());

            let result = resolve(&relative, "app.handler")
                .invoke(json!({"body": "relative"}), context(HandlerEnvironment::new()))
                .await
                .unwrap();
            assert_eq!(result["body"], "relative");
        }

        #[test]
        fn test_check_catches_shell_syntax_errors() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("app.sh"), SCRIPT).unwrap();
            std::fs::write(dir.path().join("broken.sh"), "if [ \"$1\" = x ]; then\n  echo\n").unwrap();

            let resolver = ProcessResolver::new();
            let env = HandlerEnvironment::new();
            assert!(resolver.check(dir.path(), &"app.handler".parse().unwrap(), &env).is_ok());
            assert!(matches!(
                resolver.check(dir.path(), &"broken.handler".parse().unwrap(), &env),
                Err(ResolutionError::ImportFailed { .. })
            ));
        }

        #[cfg(target_os = "linux")]
        #[tokio::test]
        async fn test_dropped_invocation_kills_process_group() {
            let dir = tempfile::tempdir().unwrap();
            let pid_file = dir.path().join("sleep.pid");
            std::fs::write(dir.path().join("app.sh"), "sleep 30 &\necho $! > \"$PID_FILE\"\nwait\n").unwrap();
            let mut env = HandlerEnvironment::new();
            env.set("PID_FILE", pid_file.to_string_lossy().into_owned());

            let invocation = resolve(dir.path(), "app.handler").invoke(json!({}), context(env));
            assert!(tokio::time::timeout(Duration::from_millis(500), invocation).await.is_err());
            tokio::time::sleep(Duration::from_millis(200)).await;

            let pid = std::fs::read_to_string(&pid_file).unwrap();
            let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid.trim()));
            // Gone, or a zombie waiting to be reaped.
            let running = stat.is_ok_and(|stat| {
                stat.rsplit_once(')')
                    .is_some_and(|(_, rest)| !matches!(rest.trim_start().chars().next(), Some('Z' | 'X')))
            });
            assert!(!running, "background child outlived its handler");
        }

        #[tokio::test]
        async fn test_missing_entry_point_is_resolution_error() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("app.sh"), SCRIPT).unwrap();
            let err = resolve(dir.path(), "app.nope")
                .invoke(json!({}), context(HandlerEnvironment::new()))
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                InvocationError::Resolution(ResolutionError::EntryPointNotFound { .. })
            ));
        }

        #[tokio::test]
        async fn test_failing_handler_is_handler_error() {
            let dir = tempfile::tempdir().unwrap();
            std::fs::write(dir.path().join("app.sh"), SCRIPT).unwrap();
            let err = resolve(dir.path(), "app.boom")
                .invoke(json!({}), context(HandlerEnvironment::new()))
                .await
                .unwrap_err();
            match err {
                InvocationError::Handler(HandlerError::Exited { code, stderr }) => {
                    assert_eq!(code, Some(3));
                    assert_eq!(stderr, "kaboom");
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
