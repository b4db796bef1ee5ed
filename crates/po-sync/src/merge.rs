//! Merging of two gettext catalogs through an external tool.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::Result;
use tracing::debug;

use crate::error::CoreError;

const DEFAULT_MSGCAT: &str = "msgcat";

/// Combines a freshly exported catalog with an existing one.
pub trait CatalogMerger {
    /// Merge `newer` and `existing` into `output`. Entries of `newer` win on conflict.
    fn merge(&self, newer: &Path, existing: &Path, output: &Path) -> Result<()>;
}

/// GNU gettext `msgcat`, run as `msgcat --use-first <newer> <existing> -o <output>`.
#[derive(Debug, Clone)]
pub struct Msgcat {
    program: PathBuf,
}

impl Default for Msgcat {
    fn default() -> Self {
        Self { program: PathBuf::from(DEFAULT_MSGCAT) }
    }
}

impl Msgcat {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, newer: &Path, existing: &Path, output: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command.arg("--use-first").arg(newer).arg(existing).arg("-o").arg(output);
        command
    }
}

impl CatalogMerger for Msgcat {
    fn merge(&self, newer: &Path, existing: &Path, output: &Path) -> Result<()> {
        debug!(
            program = %self.program.display(),
            newer = %newer.display(),
            existing = %existing.display(),
            "merging catalogs"
        );
        let status = self
            .command(newer, existing, output)
            .status()
            .map_err(|source| CoreError::MergeSpawn { program: self.program.clone(), source })?;
        if !status.success() {
            return Err(CoreError::MergeFailed {
                program: self.program.clone(),
                path: output.to_path_buf(),
                status: status.to_string(),
            }
            .into());
        }
        Ok(())
    }
}
