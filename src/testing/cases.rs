//! Acceptance test cases
//!
//! Each case drives the client (and for streaming, the server) through the
//! process controller and reports success or a typed error.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::report;
use crate::common::config::{CaseKind, ClientConfig, Config, ServerConfig, Timing};
use crate::common::{expect_exit, Error, Result};
use crate::process::{wait_for_listener, OutputDrain, ProcessHandle};

/// A named unit of acceptance work
#[async_trait]
pub trait TestCase: Send + Sync {
    /// Identifier used in log lines
    fn name(&self) -> &str;

    /// Extra context printed when the case starts
    fn detail(&self) -> Option<String> {
        None
    }

    /// Execute the case once
    async fn run(&self) -> Result<()>;
}

/// Build the configured cases in order
pub fn build_cases(config: &Config) -> Vec<Box<dyn TestCase>> {
    config
        .cases
        .iter()
        .map(|kind| -> Box<dyn TestCase> {
            match kind {
                CaseKind::Help => Box::new(HelpCheck::new(config)),
                CaseKind::Stream => Box::new(StreamCheck::new(config)),
                CaseKind::Version => Box::new(VersionCheck::new(config)),
                CaseKind::Usage => Box::new(UsageCheck::new(config)),
            }
        })
        .collect()
}

/// Output of a single client invocation
#[derive(Debug)]
struct ClientRun {
    status: i32,
    stdout: String,
    stderr: String,
}

/// Run the client once and capture what it printed
///
/// Only launching and waiting can fail; unreadable output is logged and
/// treated as empty, so the verdict rests on the exit status.
async fn run_client(
    client: &ClientConfig,
    args: &[String],
    timing: &Timing,
    cwd: Option<&Path>,
) -> Result<ClientRun> {
    let mut process = ProcessHandle::spawn_in("client", &client.path, args, cwd)?;
    let stdout = process.drain_stdout();
    let stderr = process.drain_stderr();

    let status = process.wait(timing.wait_timeout()).await?;

    Ok(ClientRun {
        status,
        stdout: collect_or_empty(stdout, "stdout", timing).await,
        stderr: collect_or_empty(stderr, "stderr", timing).await,
    })
}

async fn collect_or_empty(drain: OutputDrain, stream: &str, timing: &Timing) -> String {
    drain
        .collect(timing.shutdown_timeout())
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(stream, error = %e, "client output unavailable");
            String::new()
        })
}

/// The client's help flag must exit cleanly
pub struct HelpCheck {
    client: ClientConfig,
    timing: Timing,
    working_dir: Option<PathBuf>,
}

impl HelpCheck {
    pub fn new(config: &Config) -> Self {
        Self {
            client: config.client.clone(),
            timing: config.timing.clone(),
            working_dir: config.working_dir.clone(),
        }
    }
}

#[async_trait]
impl TestCase for HelpCheck {
    fn name(&self) -> &str {
        CaseKind::Help.id()
    }

    async fn run(&self) -> Result<()> {
        let run = run_client(
            &self.client,
            &[self.client.help_flag.clone()],
            &self.timing,
            self.working_dir.as_deref(),
        )
        .await?;
        tracing::trace!(stdout = %run.stdout, stderr = %run.stderr, "help output");
        expect_exit(0, run.status)
    }
}

/// The client's version flag must exit cleanly and print something
pub struct VersionCheck {
    client: ClientConfig,
    timing: Timing,
    working_dir: Option<PathBuf>,
}

impl VersionCheck {
    pub fn new(config: &Config) -> Self {
        Self {
            client: config.client.clone(),
            timing: config.timing.clone(),
            working_dir: config.working_dir.clone(),
        }
    }
}

#[async_trait]
impl TestCase for VersionCheck {
    fn name(&self) -> &str {
        CaseKind::Version.id()
    }

    async fn run(&self) -> Result<()> {
        let run = run_client(
            &self.client,
            &[self.client.version_flag.clone()],
            &self.timing,
            self.working_dir.as_deref(),
        )
        .await?;
        expect_exit(0, run.status)?;

        let version = run.stdout.lines().next().unwrap_or("").trim();
        if version.is_empty() {
            return Err(Error::Unexpected(format!(
                "'{}' printed no version on stdout",
                self.client.version_flag
            )));
        }
        tracing::info!(version, "client version");
        Ok(())
    }
}

/// Running the client without arguments must fail with the usage status
pub struct UsageCheck {
    client: ClientConfig,
    timing: Timing,
    working_dir: Option<PathBuf>,
}

impl UsageCheck {
    pub fn new(config: &Config) -> Self {
        Self {
            client: config.client.clone(),
            timing: config.timing.clone(),
            working_dir: config.working_dir.clone(),
        }
    }
}

#[async_trait]
impl TestCase for UsageCheck {
    fn name(&self) -> &str {
        CaseKind::Usage.id()
    }

    async fn run(&self) -> Result<()> {
        let run = run_client(&self.client, &[], &self.timing, self.working_dir.as_deref()).await?;
        tracing::trace!(stderr = %run.stderr, "usage output");
        expect_exit(self.client.usage_status, run.status)
    }
}

/// The client streams into a live server and exits cleanly
///
/// The server is started first and stays up until the client has finished.
/// It is terminated on every path once spawned.
pub struct StreamCheck {
    client: ClientConfig,
    server: ServerConfig,
    timing: Timing,
    working_dir: Option<PathBuf>,
}

impl StreamCheck {
    pub fn new(config: &Config) -> Self {
        Self {
            client: config.client.clone(),
            server: config.server.clone(),
            timing: config.timing.clone(),
            working_dir: config.working_dir.clone(),
        }
    }

    /// Wait until the server can take a connection
    async fn await_server(&self, server: &mut ProcessHandle) -> Result<()> {
        match &self.server.listen {
            Some(addr) => {
                wait_for_listener(
                    addr,
                    self.timing.ready_timeout(),
                    self.timing.ready_poll(),
                    Some(server),
                )
                .await
            }
            None => {
                tokio::time::sleep(self.timing.warmup()).await;
                match server.try_status()? {
                    Some(code) => Err(Error::Unexpected(format!(
                        "server exited with status {} during warm-up",
                        code
                    ))),
                    None => Ok(()),
                }
            }
        }
    }

    /// Run the client session and return the accumulated exit status
    async fn stream_session(&self, server: &mut ProcessHandle) -> Result<i32> {
        self.await_server(server).await?;

        let mut exit_sum = 0;
        let mut client = ProcessHandle::spawn_in(
            "client",
            &self.client.path,
            &self.client.stream_args(),
            self.working_dir.as_deref(),
        )?;
        let stdout = client.drain_stdout();
        let stderr = client.drain_stderr();

        let waited = client.wait(self.timing.wait_timeout()).await;

        // Diagnostics are relayed whether or not the session succeeded
        match stderr.collect(self.timing.shutdown_timeout()).await {
            Ok(text) => report::child_output("client", &text),
            Err(e) => tracing::warn!(error = %e, "client stderr unavailable"),
        }
        if let Ok(text) = stdout.collect(self.timing.shutdown_timeout()).await {
            tracing::debug!(stdout = %text.trim_end(), "client stdout");
        }

        exit_sum += waited?;
        Ok(exit_sum)
    }
}

#[async_trait]
impl TestCase for StreamCheck {
    fn name(&self) -> &str {
        CaseKind::Stream.id()
    }

    fn detail(&self) -> Option<String> {
        let config = self.client.stream_config.display();
        Some(match &self.server.listen {
            Some(addr) => format!("{} via {}", config, addr),
            None => config.to_string(),
        })
    }

    async fn run(&self) -> Result<()> {
        let mut server = ProcessHandle::spawn_in(
            "server",
            &self.server.path,
            &self.server.args(),
            self.working_dir.as_deref(),
        )?;
        server.log_output();
        tracing::debug!(pid = server.pid(), "server started");

        let session = self.stream_session(&mut server).await;

        tokio::time::sleep(self.timing.settle()).await;
        let teardown = server.terminate(self.timing.shutdown_timeout()).await;

        match (session, teardown) {
            (Ok(exit_sum), Ok(code)) => {
                tracing::debug!(code, "server stopped");
                expect_exit(0, exit_sum)
            }
            (Ok(_), Err(e)) => Err(e),
            (Err(e), teardown) => {
                if let Err(teardown) = teardown {
                    tracing::warn!(error = %teardown, "server teardown failed");
                }
                Err(e)
            }
        }
    }
}
