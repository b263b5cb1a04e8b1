//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::{config_path, LOCAL_CONFIG_FILE};
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Test cases to run, in order
    #[serde(default = "default_cases")]
    pub cases: Vec<CaseKind>,

    /// Client under test
    #[serde(default)]
    pub client: ClientConfig,

    /// Media server the client streams into
    #[serde(default)]
    pub server: ServerConfig,

    /// Delays and deadlines
    #[serde(default)]
    pub timing: Timing,

    /// Directory the client and server run in, so relative paths in their
    /// arguments resolve there. Defaults to the configuration file's directory.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cases: default_cases(),
            client: ClientConfig::default(),
            server: ServerConfig::default(),
            timing: Timing::default(),
            working_dir: None,
        }
    }
}

/// Registered test case identifiers
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CaseKind {
    /// Client help flag exits cleanly
    Help,
    /// Client streams into a live server
    Stream,
    /// Client version flag exits cleanly
    Version,
    /// Client without arguments exits with the usage status
    Usage,
}

impl CaseKind {
    /// All known case identifiers
    pub const ALL: [CaseKind; 4] = [
        CaseKind::Help,
        CaseKind::Stream,
        CaseKind::Version,
        CaseKind::Usage,
    ];

    /// Identifier used in configuration and on the command line
    pub fn id(self) -> &'static str {
        match self {
            CaseKind::Help => "help",
            CaseKind::Stream => "stream",
            CaseKind::Version => "version",
            CaseKind::Usage => "usage",
        }
    }

    /// Look up a case by identifier
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.id() == id)
    }
}

fn default_cases() -> Vec<CaseKind> {
    vec![CaseKind::Help, CaseKind::Stream]
}

/// Streaming-source client settings
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// Path to the client executable
    #[serde(default = "default_client_path")]
    pub path: PathBuf,

    #[serde(default = "default_help_flag")]
    pub help_flag: String,

    #[serde(default = "default_version_flag")]
    pub version_flag: String,

    #[serde(default = "default_verbose_flag")]
    pub verbose_flag: String,

    /// How many times the verbose flag is repeated for the stream session
    #[serde(default = "default_verbosity")]
    pub verbosity: usize,

    #[serde(default = "default_config_flag")]
    pub config_flag: String,

    /// Stream configuration handed to the client
    #[serde(default = "default_stream_config")]
    pub stream_config: PathBuf,

    /// Exit status the client uses for bad invocations
    #[serde(default = "default_usage_status")]
    pub usage_status: i32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            path: default_client_path(),
            help_flag: default_help_flag(),
            version_flag: default_version_flag(),
            verbose_flag: default_verbose_flag(),
            verbosity: default_verbosity(),
            config_flag: default_config_flag(),
            stream_config: default_stream_config(),
            usage_status: default_usage_status(),
        }
    }
}

impl ClientConfig {
    /// Arguments for a streaming session
    pub fn stream_args(&self) -> Vec<String> {
        let mut args = vec![self.verbose_flag.clone(); self.verbosity];
        args.push(self.config_flag.clone());
        args.push(self.stream_config.display().to_string());
        args
    }
}

fn default_client_path() -> PathBuf {
    PathBuf::from("../../src/ezstream")
}
fn default_help_flag() -> String {
    "-h".to_string()
}
fn default_version_flag() -> String {
    "-V".to_string()
}
fn default_verbose_flag() -> String {
    "-v".to_string()
}
fn default_verbosity() -> usize {
    3
}
fn default_config_flag() -> String {
    "-c".to_string()
}
fn default_stream_config() -> PathBuf {
    PathBuf::from("ezcfg-test1.xml")
}
fn default_usage_status() -> i32 {
    2
}

/// Media server settings
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Path to the server executable
    #[serde(default = "default_server_path")]
    pub path: PathBuf,

    #[serde(default = "default_config_flag")]
    pub config_flag: String,

    /// Server configuration file
    #[serde(default = "default_server_config")]
    pub config: PathBuf,

    /// Address polled for readiness. Without it the warm-up delay is used.
    #[serde(default)]
    pub listen: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            path: default_server_path(),
            config_flag: default_config_flag(),
            config: default_server_config(),
            listen: None,
        }
    }
}

impl ServerConfig {
    pub fn args(&self) -> Vec<String> {
        vec![self.config_flag.clone(), self.config.display().to_string()]
    }
}

fn default_server_path() -> PathBuf {
    PathBuf::from("icecast2")
}
fn default_server_config() -> PathBuf {
    PathBuf::from("icecast.xml")
}

/// Delays and deadlines in milliseconds
#[derive(Debug, Deserialize, Clone)]
pub struct Timing {
    /// Fixed boot grace period when no listen address is configured
    #[serde(default = "default_warmup")]
    pub warmup_ms: u64,

    /// Pause between client exit and server termination
    #[serde(default = "default_settle")]
    pub settle_ms: u64,

    /// Overall deadline for the readiness wait
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_ms: u64,

    /// Interval between readiness attempts
    #[serde(default = "default_ready_poll")]
    pub ready_poll_ms: u64,

    /// Deadline for any single child process wait
    #[serde(default = "default_wait_timeout")]
    pub wait_timeout_ms: u64,

    /// Grace period between SIGTERM and SIGKILL
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            warmup_ms: default_warmup(),
            settle_ms: default_settle(),
            ready_timeout_ms: default_ready_timeout(),
            ready_poll_ms: default_ready_poll(),
            wait_timeout_ms: default_wait_timeout(),
            shutdown_timeout_ms: default_shutdown_timeout(),
        }
    }
}

impl Timing {
    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }
    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.ready_poll_ms.max(1))
    }
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

fn default_warmup() -> u64 {
    2000
}
fn default_settle() -> u64 {
    1000
}
fn default_ready_timeout() -> u64 {
    10_000
}
fn default_ready_poll() -> u64 {
    100
}
fn default_wait_timeout() -> u64 {
    60_000
}
fn default_shutdown_timeout() -> u64 {
    5000
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Otherwise `./stream-acceptance.toml` and
    /// then the user config file are tried, falling back to defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            return Self::from_file(&local);
        }

        if let Some(path) = config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    ///
    /// Relative executable paths and `working_dir` are resolved against the
    /// file's directory, which is also the default working directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let mut config = Self::parse(&content)?;

        // Children may run elsewhere, so anchor at an absolute directory
        let base = path
            .canonicalize()
            .map_err(|e| Error::FileRead {
                path: path.display().to_string(),
                error: e.to_string(),
            })?
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.resolve_relative_to(&base);
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.cases.is_empty() {
            return Err(Error::Config("no test cases configured".to_string()));
        }
        if let Some(listen) = &self.server.listen {
            validate_listen(listen)?;
        }
        Ok(())
    }

    /// Anchor executable paths that contain a directory component at `base`
    ///
    /// The working directory defaults to `base`; a relative one is joined to it.
    fn resolve_relative_to(&mut self, base: &Path) {
        for path in [&mut self.client.path, &mut self.server.path] {
            if path.is_relative() && path.components().count() > 1 {
                *path = base.join(&*path);
            }
        }
        self.working_dir = Some(match self.working_dir.take() {
            Some(dir) if dir.is_relative() => base.join(dir),
            Some(dir) => dir,
            None => base.to_path_buf(),
        });
    }

    /// Replace the configured case list from command-line identifiers
    pub fn select_cases(&mut self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let cases = ids
            .iter()
            .map(|id| {
                CaseKind::from_id(id).ok_or_else(|| {
                    let known: Vec<_> = CaseKind::ALL.iter().map(|k| k.id()).collect();
                    Error::Config(format!(
                        "unknown test case '{}'. Known cases: {}",
                        id,
                        known.join(", ")
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        self.cases = cases;
        Ok(())
    }
}

/// Require `host:port` with a numeric port
fn validate_listen(listen: &str) -> Result<()> {
    let invalid = |reason: &str| {
        Error::Config(format!(
            "server.listen '{}' is not a host:port address: {}",
            listen, reason
        ))
    };

    let (host, port) = listen
        .trim()
        .rsplit_once(':')
        .ok_or_else(|| invalid("missing port"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(invalid("missing host"));
    }
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(invalid("port must be 1-65535")),
        Ok(_) => Ok(()),
    }
}
