//! Child process ownership
//!
//! A [`ProcessHandle`] owns one spawned child until it has been reaped.
//! Every wait carries a deadline, and a handle dropped before its child was
//! reaped kills the child.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::common::{Error, Result};

/// Signals the harness sends to children
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Graceful shutdown request (SIGTERM)
    Terminate,
    /// Forced kill (SIGKILL)
    Kill,
}

#[cfg(unix)]
impl Signal {
    fn as_raw(self) -> libc::c_int {
        match self {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        }
    }
}

/// A spawned child process owned by a single test case
#[derive(Debug)]
pub struct ProcessHandle {
    label: String,
    pid: u32,
    child: Child,
    status: Option<i32>,
}

impl ProcessHandle {
    /// Spawn `program` with `args` in the harness's working directory
    ///
    /// Bare program names are looked up on `PATH`. stdin is closed, stdout
    /// and stderr are piped and left for the caller to take or drain.
    pub fn spawn(label: &str, program: &Path, args: &[String]) -> Result<Self> {
        Self::spawn_in(label, program, args, None)
    }

    /// Spawn `program` with `args`, running it in `cwd` when given
    pub fn spawn_in(
        label: &str,
        program: &Path,
        args: &[String],
        cwd: Option<&Path>,
    ) -> Result<Self> {
        let program = resolve_program(program)?;

        let mut command = Command::new(&program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let child = command
            .spawn()
            .map_err(|e| Error::launch(program.display(), e))?;

        let pid = child.id().ok_or_else(|| {
            Error::Unexpected(format!("{} exited before its pid could be read", label))
        })?;

        tracing::debug!(
            label,
            pid,
            program = %program.display(),
            cwd = ?cwd,
            ?args,
            "spawned"
        );

        Ok(Self {
            label: label.to_string(),
            pid,
            child,
            status: None,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Exit status, once the child has been reaped
    pub fn status(&self) -> Option<i32> {
        self.status
    }

    /// Take the child's stdout stream
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take the child's stderr stream
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Read stdout to EOF in the background
    pub fn drain_stdout(&mut self) -> OutputDrain {
        OutputDrain::spawn(self.take_stdout())
    }

    /// Read stderr to EOF in the background
    pub fn drain_stderr(&mut self) -> OutputDrain {
        OutputDrain::spawn(self.take_stderr())
    }

    /// Forward both output streams to the debug log, line by line
    pub fn log_output(&mut self) {
        forward_lines(self.take_stdout(), self.label.clone(), "stdout");
        forward_lines(self.take_stderr(), self.label.clone(), "stderr");
    }

    /// Check for exit without blocking
    pub fn try_status(&mut self) -> Result<Option<i32>> {
        if self.status.is_some() {
            return Ok(self.status);
        }
        Ok(self.child.try_wait()?.map(|status| self.record(status)))
    }

    /// Wait for the child to exit
    ///
    /// If it is still running at `deadline` it is killed and reaped, and a
    /// timeout error is returned.
    pub async fn wait(&mut self, deadline: Duration) -> Result<i32> {
        if let Some(code) = self.wait_until(deadline).await? {
            return Ok(code);
        }

        tracing::warn!(label = %self.label, pid = self.pid, "still running at deadline, killing");
        self.kill().await?;
        Err(Error::timeout(format!("waiting for {}", self.label), deadline))
    }

    /// Send a signal to a still-running child
    ///
    /// Best effort: a child that already exited is not an error.
    pub fn signal(&mut self, signal: Signal) -> Result<()> {
        if self.try_status()?.is_some() {
            return Ok(());
        }

        tracing::debug!(label = %self.label, pid = self.pid, ?signal, "signaling");

        #[cfg(unix)]
        {
            // The child is unreaped here, so the pid cannot have been reused.
            let ret = unsafe { libc::kill(self.pid as libc::pid_t, signal.as_raw()) };
            if ret != 0 {
                let err = io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::ESRCH) {
                    return Ok(());
                }
                return Err(Error::Signal {
                    pid: self.pid,
                    source: err,
                });
            }
        }

        #[cfg(not(unix))]
        {
            let _ = signal;
            self.child.start_kill().map_err(|source| Error::Signal {
                pid: self.pid,
                source,
            })?;
        }

        Ok(())
    }

    /// Ask the child to stop, escalating to a kill after `grace`
    pub async fn terminate(&mut self, grace: Duration) -> Result<i32> {
        self.signal(Signal::Terminate)?;

        if let Some(code) = self.wait_until(grace).await? {
            return Ok(code);
        }

        tracing::warn!(
            label = %self.label,
            pid = self.pid,
            grace_ms = grace.as_millis() as u64,
            "ignored termination request, killing"
        );
        self.kill().await
    }

    /// Kill and reap the child
    pub async fn kill(&mut self) -> Result<i32> {
        if let Some(code) = self.status {
            return Ok(code);
        }
        self.signal(Signal::Kill)?;
        let status = self.child.wait().await?;
        Ok(self.record(status))
    }

    async fn wait_until(&mut self, deadline: Duration) -> Result<Option<i32>> {
        if self.status.is_some() {
            return Ok(self.status);
        }
        match timeout(deadline, self.child.wait()).await {
            Ok(status) => Ok(Some(self.record(status?))),
            Err(_) => Ok(None),
        }
    }

    fn record(&mut self, status: ExitStatus) -> i32 {
        let code = exit_code(status);
        tracing::debug!(label = %self.label, pid = self.pid, code, "exited");
        self.status = Some(code);
        code
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        // Best-effort since we can't await in drop; tokio reaps orphans
        if self.status.is_none() {
            tracing::warn!(label = %self.label, pid = self.pid, "dropped while running, killing");
            let _ = self.child.start_kill();
        }
    }
}

/// Numeric exit status; a child killed by signal N reports 128 + N
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    -1
}

/// Resolve a program path, searching `PATH` for bare names
pub fn resolve_program(program: &Path) -> Result<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return Ok(program.to_path_buf());
    }
    which::which(program).map_err(|e| Error::launch(program.display(), e))
}

/// Output collected by a background reader task
#[derive(Debug)]
pub struct OutputDrain {
    task: Option<JoinHandle<io::Result<Vec<u8>>>>,
}

impl OutputDrain {
    fn spawn<R>(stream: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let task = stream.map(|mut stream| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                stream.read_to_end(&mut buf).await?;
                Ok(buf)
            })
        });
        Self { task }
    }

    /// Wait for EOF and return the text read
    ///
    /// A grandchild can hold the pipe open after the child exits, so the
    /// read is bounded by `deadline`.
    pub async fn collect(self, deadline: Duration) -> Result<String> {
        let Some(mut task) = self.task else {
            return Ok(String::new());
        };

        match timeout(deadline, &mut task).await {
            Ok(Ok(read)) => Ok(String::from_utf8_lossy(&read?).into_owned()),
            Ok(Err(join)) => Err(Error::Unexpected(format!("output reader failed: {}", join))),
            Err(_) => {
                task.abort();
                Err(Error::timeout("reading child output", deadline))
            }
        }
    }
}

fn forward_lines<R>(stream: Option<R>, label: String, name: &'static str)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let Some(stream) = stream else {
        return;
    };
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::debug!(label = %label, stream = name, "{}", line);
        }
    });
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> ProcessHandle {
        ProcessHandle::spawn(
            "sh",
            Path::new("sh"),
            &["-c".to_string(), script.to_string()],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_wait_reports_exit_status() {
        let mut child = sh("exit 3");
        assert_eq!(child.wait(Duration::from_secs(10)).await.unwrap(), 3);
        assert_eq!(child.status(), Some(3));
    }

    #[tokio::test]
    async fn test_missing_program_is_launch_error() {
        let err = ProcessHandle::spawn("ghost", Path::new("/nonexistent/ghost-binary"), &[])
            .unwrap_err();
        assert!(matches!(err, Error::Launch { .. }));

        let err = ProcessHandle::spawn("ghost", Path::new("no-such-program-on-path"), &[])
            .unwrap_err();
        assert!(matches!(err, Error::Launch { .. }));
    }

    #[tokio::test]
    async fn test_drains_output() {
        let mut child = sh("echo out; echo err >&2");
        let stdout = child.drain_stdout();
        let stderr = child.drain_stderr();
        assert_eq!(child.wait(Duration::from_secs(10)).await.unwrap(), 0);
        assert_eq!(stdout.collect(Duration::from_secs(5)).await.unwrap(), "out\n");
        assert_eq!(stderr.collect(Duration::from_secs(5)).await.unwrap(), "err\n");
    }

    #[tokio::test]
    async fn test_wait_deadline_kills_child() {
        let mut child = sh("exec sleep 30");
        let err = child.wait(Duration::from_millis(200)).await.unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert_eq!(child.status(), Some(128 + libc::SIGKILL));
    }

    #[tokio::test]
    async fn test_terminate_sends_sigterm() {
        let mut child = sh("exec sleep 30");
        let code = child.terminate(Duration::from_secs(5)).await.unwrap();
        assert_eq!(code, 128 + libc::SIGTERM);
    }

    #[tokio::test]
    async fn test_terminate_escalates_when_ignored() {
        let mut child = sh("trap '' TERM; echo ready; while :; do sleep 0.05; done");
        let mut ready = String::new();
        BufReader::new(child.take_stdout().unwrap())
            .read_line(&mut ready)
            .await
            .unwrap();
        assert_eq!(ready, "ready\n");

        let code = child.terminate(Duration::from_millis(300)).await.unwrap();
        assert_eq!(code, 128 + libc::SIGKILL);
    }

    #[tokio::test]
    async fn test_kill_delivers_sigkill() {
        let mut child = sh("trap '' TERM; echo ready; exec sleep 30");
        let mut ready = String::new();
        BufReader::new(child.take_stdout().unwrap())
            .read_line(&mut ready)
            .await
            .unwrap();

        assert_eq!(child.kill().await.unwrap(), 128 + libc::SIGKILL);
        assert_eq!(child.status(), Some(128 + libc::SIGKILL));
    }

    #[tokio::test]
    async fn test_spawn_in_sets_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let dir = dir.path().canonicalize().unwrap();
        let mut child = ProcessHandle::spawn_in(
            "sh",
            Path::new("sh"),
            &["-c".to_string(), "pwd -P".to_string()],
            Some(&dir),
        )
        .unwrap();
        let stdout = child.drain_stdout();

        assert_eq!(child.wait(Duration::from_secs(10)).await.unwrap(), 0);
        let printed = stdout.collect(Duration::from_secs(5)).await.unwrap();
        assert_eq!(PathBuf::from(printed.trim_end()), dir);
    }

    #[tokio::test]
    async fn test_signal_after_exit_is_noop() {
        let mut child = sh("exit 0");
        child.wait(Duration::from_secs(10)).await.unwrap();
        child.signal(Signal::Terminate).unwrap();
        assert_eq!(child.terminate(Duration::from_secs(1)).await.unwrap(), 0);
    }
}
