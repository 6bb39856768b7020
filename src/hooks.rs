//! Executables run when a timeout makes progress or settles.
//!
//! Hooks live in the configured hooks directory and are named after the
//! event. Missing hooks are skipped.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use log::{debug, info};

/// Number of fires so far
pub const COUNT_VAR: &str = "POSTPONE_COUNT";
/// The timer's payload, space-separated
pub const PAYLOAD_VAR: &str = "POSTPONE_PAYLOAD";
/// Why the timer was rejected
pub const REASON_VAR: &str = "POSTPONE_REASON";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hook {
    Progress,
    Resolved,
    Rejected,
}

impl Hook {
    pub fn file_name(&self) -> &'static str {
        match *self {
            Self::Progress => "progress",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }

    /// Run the hook, if it exists, with `env` added to its environment
    pub fn run(&self, hooks_directory: &Path, env: &[(&str, String)]) -> Result<()> {
        let hook_path = hooks_directory.join(self.file_name());

        if !hook_path.exists() {
            debug!("No {} hook at {}", self.file_name(), hook_path.display());
            return Ok(());
        }

        info!(
            "Executing hook at {}",
            hook_path.display().to_string().cyan()
        );

        let output = std::process::Command::new(&hook_path)
            .envs(env.iter().map(|(key, value)| (*key, value)))
            .output()
            .with_context(|| format!("Failed to execute hook {}", hook_path.display()))?;

        if !output.status.success() {
            info!(
                "Hook {} exited with {}",
                hook_path.display().to_string().cyan(),
                output.status.to_string().red()
            );
        }

        Ok(())
    }
}
