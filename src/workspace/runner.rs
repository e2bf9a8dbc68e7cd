// Subprocess run executor: interprets a workspace file under a wall-clock timeout

use std::path::Path;
use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tracing::{error, info};

use super::Workspace;
use crate::error::{CommandError, ExecutionResult};

/// Supported extensions and the interpreter each one runs under
const INTERPRETERS: &[(&str, &str)] = &[(".py", "python3"), (".sh", "bash"), (".js", "node")];

/// Lowercased extension with its leading dot, or "" when there is none
fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

fn interpreter_for(extension: &str) -> Option<&'static str> {
    INTERPRETERS
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, interpreter)| *interpreter)
}

impl Workspace {
    /// Run a file with the interpreter matching its extension.
    ///
    /// The process runs in its own process group with the workspace root as
    /// its working directory. On timeout the whole group is killed and reaped
    /// before this returns.
    pub async fn run_file(&self, filepath: &str) -> ExecutionResult {
        match self.try_run(filepath).await {
            Ok(result) => result,
            Err(e) => e.into(),
        }
    }

    async fn try_run(&self, filepath: &str) -> Result<ExecutionResult, CommandError> {
        let path = self.sandbox.resolve(filepath)?;

        let metadata = match tokio::fs::metadata(path.as_path()).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CommandError::NotFound(filepath.to_string()));
            }
            Err(e) => return Err(CommandError::io("executing")(e)),
        };
        if !metadata.is_file() {
            return Err(CommandError::NotAFile(filepath.to_string()));
        }

        let extension = dotted_extension(path.as_path());
        let interpreter =
            interpreter_for(&extension).ok_or(CommandError::UnsupportedFileType(extension))?;

        let mut command = Command::new(interpreter);
        command
            .arg(path.as_path())
            .current_dir(self.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(CommandError::io("executing"))?;
        // Taken now: once tokio reaps the child, id() is None but the group may live on
        let pgid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let outcome = tokio::time::timeout(self.run_timeout, async {
            tokio::join!(child.wait(), read_stream(stdout), read_stream(stderr))
        })
        .await;

        let (status, stdout, stderr) = match outcome {
            Ok((Ok(status), stdout, stderr)) => (status, stdout, stderr),
            Ok((Err(e), _, _)) => return Err(CommandError::io("executing")(e)),
            Err(_) => {
                error!("Execution timeout: {}", filepath);
                terminate_process_group(&mut child, pgid).await;
                return Err(CommandError::ExecutionTimeout(self.run_timeout.as_secs()));
            }
        };

        let code = return_code(status);
        info!("Executed file: {} (return code: {})", filepath, code);

        let message = if !stdout.is_empty() {
            stdout
        } else if !stderr.is_empty() {
            stderr
        } else {
            format!("Execution completed with return code: {}", code)
        };

        Ok(ExecutionResult {
            success: status.success(),
            message,
        })
    }
}

/// Exit code, or the negated signal number when the process was killed by one
fn return_code(status: ExitStatus) -> i32 {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    status.code().unwrap_or(-1)
}

async fn read_stream<R: AsyncRead + Unpin>(stream: Option<R>) -> String {
    let mut buffer = Vec::new();
    if let Some(mut stream) = stream {
        // A read error just truncates the captured output
        let _ = stream.read_to_end(&mut buffer).await;
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Kill the child's whole process group, then reap the child.
///
/// `pgid` is the child's pid recorded at spawn; with `process_group(0)` it
/// names the group even after the child itself has exited.
async fn terminate_process_group(child: &mut Child, pgid: Option<u32>) {
    #[cfg(unix)]
    if let Some(pgid) = pgid {
        // SAFETY: killpg has no memory-safety preconditions
        let rc = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
        if rc == -1 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                error!("Failed to kill process group {}: {}", pgid, err);
            }
        }
    }
    #[cfg(not(unix))]
    let _ = pgid;

    let _ = child.start_kill();
    if let Err(e) = child.wait().await {
        error!("Failed to reap timed out process: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn has_interpreter(name: &str) -> bool {
        std::process::Command::new(name)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
    }

    /// Live and not a zombie. A killed process reparented to init can linger
    /// as a zombie until init reaps it.
    #[cfg(unix)]
    fn still_running(pid: libc::pid_t) -> bool {
        if unsafe { libc::kill(pid, 0) } != 0 {
            return false;
        }
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => !stat
                .rsplit(')')
                .next()
                .is_some_and(|rest| rest.trim_start().starts_with('Z')),
            Err(_) => true,
        }
    }

    #[cfg(unix)]
    async fn gone_within(pid: libc::pid_t, limit: Duration) -> bool {
        let started = Instant::now();
        while started.elapsed() < limit {
            if !still_running(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        !still_running(pid)
    }

    #[cfg(unix)]
    fn read_pid(ws: &Workspace) -> libc::pid_t {
        std::fs::read_to_string(ws.root().join("pid.txt"))
            .unwrap()
            .trim()
            .parse()
            .unwrap()
    }

    fn workspace() -> (TempDir, Workspace) {
        let temp = TempDir::new().unwrap();
        let workspace = Workspace::open(temp.path()).unwrap();
        (temp, workspace)
    }

    #[test]
    fn test_interpreter_table() {
        assert_eq!(interpreter_for(".py"), Some("python3"));
        assert_eq!(interpreter_for(".sh"), Some("bash"));
        assert_eq!(interpreter_for(".js"), Some("node"));
        assert_eq!(interpreter_for(".rb"), None);
        assert_eq!(interpreter_for(""), None);

        assert_eq!(dotted_extension(Path::new("/w/RUN.SH")), ".sh");
        assert_eq!(dotted_extension(Path::new("/w/Makefile")), "");
    }

    #[tokio::test]
    async fn test_unsupported_extension_spawns_nothing() {
        let (_temp, ws) = workspace();
        std::fs::write(ws.root().join("payload.txt"), "touch marker").unwrap();

        let result = ws.run_file("payload.txt").await;
        assert_eq!(result, ExecutionResult::failed("Unsupported file type: .txt"));
        assert!(!ws.root().join("marker").exists());
    }

    #[tokio::test]
    async fn test_missing_and_directory_targets() {
        let (_temp, ws) = workspace();
        std::fs::create_dir(ws.root().join("pkg.py")).unwrap();

        assert_eq!(ws.run_file("nope.py").await, ExecutionResult::failed("File not found: nope.py"));
        assert_eq!(ws.run_file("pkg.py").await, ExecutionResult::failed("Not a file: pkg.py"));
    }

    #[tokio::test]
    async fn test_run_shell_script_output() {
        if !has_interpreter("bash") {
            return;
        }
        let (_temp, ws) = workspace();
        std::fs::write(ws.root().join("hello.sh"), "echo hello\n").unwrap();
        std::fs::write(ws.root().join("LOUD.SH"), "echo loud\n").unwrap();

        assert_eq!(ws.run_file("hello.sh").await, ExecutionResult::ok("hello\n"));
        assert_eq!(ws.run_file("LOUD.SH").await, ExecutionResult::ok("loud\n"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr_or_code() {
        if !has_interpreter("bash") {
            return;
        }
        let (_temp, ws) = workspace();
        std::fs::write(ws.root().join("fail.sh"), "echo oops >&2\nexit 3\n").unwrap();
        std::fs::write(ws.root().join("quiet.sh"), "exit 4\n").unwrap();
        std::fs::write(ws.root().join("silent_ok.sh"), "true\n").unwrap();

        assert_eq!(ws.run_file("fail.sh").await, ExecutionResult::failed("oops\n"));
        assert_eq!(
            ws.run_file("quiet.sh").await,
            ExecutionResult::failed("Execution completed with return code: 4")
        );
        assert_eq!(
            ws.run_file("silent_ok.sh").await,
            ExecutionResult::ok("Execution completed with return code: 0")
        );
    }

    #[tokio::test]
    async fn test_runs_from_workspace_root() {
        if !has_interpreter("bash") {
            return;
        }
        let (_temp, ws) = workspace();
        std::fs::create_dir(ws.root().join("scripts")).unwrap();
        std::fs::write(ws.root().join("scripts/where.sh"), "pwd -P\n").unwrap();

        let result = ws.run_file("scripts/where.sh").await;
        assert!(result.success);
        assert_eq!(result.message.trim_end(), ws.root().to_string_lossy());
    }

    #[tokio::test]
    async fn test_python_script() {
        if !has_interpreter("python3") {
            return;
        }
        let (_temp, ws) = workspace();
        std::fs::write(ws.root().join("script.py"), "import sys\nsys.stdout.write('hello')\n")
            .unwrap();

        assert_eq!(ws.run_file("script.py").await, ExecutionResult::ok("hello"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_process() {
        if !has_interpreter("bash") {
            return;
        }
        let temp = TempDir::new().unwrap();
        let ws = Workspace::open(temp.path())
            .unwrap()
            .with_run_timeout(Duration::from_secs(1));
        std::fs::write(
            ws.root().join("spin.sh"),
            "echo $$ > pid.txt\nwhile true; do sleep 0.1; done\n",
        )
        .unwrap();

        let started = Instant::now();
        let result = ws.run_file("spin.sh").await;
        assert_eq!(result, ExecutionResult::failed("Execution timeout (1s limit)"));
        assert!(started.elapsed() < Duration::from_secs(10));

        let pid = read_pid(&ws);
        assert!(
            gone_within(pid, Duration::from_secs(2)).await,
            "process {pid} still running after timeout"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_background_process_after_child_exits() {
        if !has_interpreter("bash") {
            return;
        }
        let temp = TempDir::new().unwrap();
        let ws = Workspace::open(temp.path())
            .unwrap()
            .with_run_timeout(Duration::from_secs(1));
        // The backgrounded sleep keeps stdout open after bash exits
        std::fs::write(
            ws.root().join("bg.sh"),
            "sleep 30 &\necho $! > pid.txt\nexit 0\n",
        )
        .unwrap();

        let result = ws.run_file("bg.sh").await;
        assert_eq!(result, ExecutionResult::failed("Execution timeout (1s limit)"));

        let pid = read_pid(&ws);
        assert!(
            gone_within(pid, Duration::from_secs(2)).await,
            "background process {pid} survived the timeout"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_signal_exit_reports_negative_code() {
        if !has_interpreter("bash") {
            return;
        }
        let (_temp, ws) = workspace();
        std::fs::write(ws.root().join("self_kill.sh"), "kill -9 $$\n").unwrap();

        assert_eq!(
            ws.run_file("self_kill.sh").await,
            ExecutionResult::failed("Execution completed with return code: -9")
        );
    }

    #[tokio::test]
    async fn test_node_script() {
        if !has_interpreter("node") {
            return;
        }
        let (_temp, ws) = workspace();
        std::fs::write(ws.root().join("app.js"), "process.stdout.write('from node');\n").unwrap();

        assert_eq!(ws.run_file("app.js").await, ExecutionResult::ok("from node"));
    }
}
