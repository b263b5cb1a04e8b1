//! CLI command handling
//!
//! Loads the configuration and dispatches to the driver.

use std::path::PathBuf;

use crate::commands::Commands;
use crate::common::config::{CaseKind, Config};
use crate::common::Result;
use crate::testing::Driver;

/// Options shared by every command
#[derive(Debug, Default, Clone)]
pub struct Options {
    /// Explicit configuration file
    pub config: Option<PathBuf>,
    /// Case identifiers overriding the configured list
    pub cases: Vec<String>,
}

impl Options {
    fn load_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;
        config.select_cases(&self.cases)?;
        Ok(config)
    }
}

/// Dispatch a CLI command, returning the process exit code
pub async fn dispatch(command: Commands, options: &Options) -> Result<i32> {
    let config = options.load_config()?;

    match command {
        Commands::Run => {
            tracing::debug!(
                client = %config.client.path.display(),
                server = %config.server.path.display(),
                "loaded configuration"
            );
            let summary = Driver::from_config(&config).run().await;
            Ok(summary.exit_code())
        }

        Commands::List => {
            for kind in CaseKind::ALL {
                let marker = if config.cases.contains(&kind) { "*" } else { " " };
                println!("{} {}", marker, kind.id());
            }
            Ok(0)
        }
    }
}
