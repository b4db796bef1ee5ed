//! Filesystem layout helpers for po-sync.

use std::{
    env,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

const CATALOG_EXTENSION: &str = "po";
const DEFAULT_RULES_FILENAME: &str = "poeditor_fixes.toml";
const DEFAULT_TOKEN_FILENAME: &str = ".poeditor_apitoken";

/// Descriptor for the on-disk translation tree of one project.
///
/// ```text
/// <root>/
///   .poeditor_apitoken
///   poeditor_fixes.toml
///   <project>/
///     <local_code>/<project>.po
/// ```
#[derive(Clone, Debug)]
pub struct Layout {
    root: PathBuf,
    project_name: String,
    language_root: PathBuf,
}

impl Layout {
    /// Construct a new layout without touching the filesystem.
    pub fn new(root: PathBuf, project_name: &str) -> Self {
        let language_root = root.join(project_name);
        Self { root, project_name: project_name.to_string(), language_root }
    }

    /// Build a layout rooted at the current working directory.
    pub fn current_dir(project_name: &str) -> Result<Self> {
        let root = env::current_dir().context("failed to resolve the current directory")?;
        Ok(Self::new(root, project_name))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Directory holding one subdirectory per local language.
    pub fn language_root(&self) -> &Path {
        &self.language_root
    }

    /// Reconciliation rules used when `--fixed` is not given.
    pub fn default_rules_path(&self) -> PathBuf {
        self.root.join(DEFAULT_RULES_FILENAME)
    }

    /// Token file used when neither `--token` nor the environment provide one.
    pub fn default_token_path(&self) -> PathBuf {
        self.root.join(DEFAULT_TOKEN_FILENAME)
    }
}

/// Path of the catalog for `local_code` below `language_root`.
pub fn catalog_path(language_root: &Path, local_code: &str, project_name: &str) -> PathBuf {
    language_root.join(local_code).join(format!("{project_name}.{CATALOG_EXTENSION}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_lives_in_language_directory() {
        let layout = Layout::new(PathBuf::from("/data"), "subdownloader");
        assert_eq!(layout.language_root(), Path::new("/data/subdownloader"));
        assert_eq!(
            catalog_path(layout.language_root(), "pt_BR", layout.project_name()),
            PathBuf::from("/data/subdownloader/pt_BR/subdownloader.po")
        );
        assert_eq!(layout.default_token_path(), PathBuf::from("/data/.poeditor_apitoken"));
    }

    #[test]
    fn dotted_project_names_keep_their_suffix() {
        let path = catalog_path(Path::new("/l10n"), "fr", "app.core");
        assert_eq!(path, PathBuf::from("/l10n/fr/app.core.po"));
    }
}
