//! Configuration paths and harness identity

use std::path::{Path, PathBuf};

/// Name used for the configuration directory
const APP_NAME: &str = "stream-acceptance";

/// Configuration file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "stream-acceptance.toml";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/stream-acceptance/`
/// - macOS: `~/Library/Application Support/stream-acceptance/`
/// - Windows: `%APPDATA%\stream-acceptance\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the user configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Name the harness was invoked as, used to tag log lines
pub fn program_name() -> String {
    std::env::args_os()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| APP_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_is_toml() {
        if let Some(path) = config_path() {
            assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
        }
    }

    #[test]
    fn test_program_name_not_empty() {
        assert!(!program_name().is_empty());
    }
}
