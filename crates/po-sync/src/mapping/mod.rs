//! Per-language sync state and the operations that move catalogs around.

use std::{
    fs, mem,
    path::{Path, PathBuf},
};

use anyhow::Result;
use thiserror::Error;
use time::{OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};
use tracing::{debug, error, warn};

use crate::{
    config::ReconciliationRules,
    error::CoreError,
    merge::CatalogMerger,
    paths::catalog_path,
    remote::{FileType, ProjectId, ProjectLanguage, TranslationService},
};

pub mod codes;
pub mod collection;

pub use collection::{
    BatchOutcome, BatchReport, Confirmation, Failure, MappingCollection, Selection, SortKey,
    SortSpec,
};

const TABLE_TIME_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// What the service knows about one language of the project.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteLanguage {
    pub code: String,
    pub name: String,
    pub completion: Option<f64>,
    pub updated_at: Option<OffsetDateTime>,
}

impl RemoteLanguage {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self { code: code.into(), name: name.into(), completion: None, updated_at: None }
    }
}

impl From<ProjectLanguage> for RemoteLanguage {
    fn from(language: ProjectLanguage) -> Self {
        Self {
            code: language.code,
            name: language.name,
            completion: language.percentage,
            updated_at: language.updated,
        }
    }
}

/// Which sides of a language currently exist.
#[derive(Debug, Clone, PartialEq)]
pub enum MappingState {
    LocalOnly { local: String },
    RemoteOnly { remote: RemoteLanguage },
    Matched { local: String, remote: RemoteLanguage },
    /// Remote-only language deleted from the service during this run.
    Removed { code: String },
}

/// Result of a per-language operation that did not hit a hard fault.
#[derive(Debug, Clone, PartialEq)]
pub enum LanguageOutcome {
    Synced,
    Failed(FailureReason),
}

impl LanguageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, LanguageOutcome::Synced)
    }
}

/// Expected conditions that make one language fail without stopping a batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("language is not on the server")]
    NotOnServer,
    #[error("catalog {} is missing", path.display())]
    CatalogMissing { path: PathBuf },
    #[error("server rejected language code '{code}': {message}")]
    RemoteRejected { code: String, message: String },
    #[error("server does not know language code '{code}'")]
    UnknownToService { code: String },
    /// A service call, the merge tool or the file system failed for this
    /// language only.
    #[error("{message}")]
    Aborted { message: String },
}

/// Everything a per-language operation needs besides the mapping itself.
pub struct SyncContext<'a> {
    pub remote: &'a dyn TranslationService,
    pub project_id: ProjectId,
    pub project_name: &'a str,
    pub language_root: &'a Path,
    pub rules: &'a ReconciliationRules,
}

impl SyncContext<'_> {
    fn catalog_path(&self, local_code: &str) -> PathBuf {
        catalog_path(self.language_root, local_code, self.project_name)
    }
}

/// Reconciled record linking a local directory, a remote language, or both.
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageMapping {
    state: MappingState,
}

impl LanguageMapping {
    pub fn local(code: impl Into<String>) -> Self {
        Self { state: MappingState::LocalOnly { local: code.into() } }
    }

    pub fn remote(remote: RemoteLanguage) -> Self {
        Self { state: MappingState::RemoteOnly { remote } }
    }

    pub fn state(&self) -> &MappingState {
        &self.state
    }

    pub fn local_code(&self) -> Option<&str> {
        match &self.state {
            MappingState::LocalOnly { local } | MappingState::Matched { local, .. } => Some(local),
            MappingState::RemoteOnly { .. } | MappingState::Removed { .. } => None,
        }
    }

    pub fn remote_language(&self) -> Option<&RemoteLanguage> {
        match &self.state {
            MappingState::RemoteOnly { remote } | MappingState::Matched { remote, .. } => {
                Some(remote)
            }
            MappingState::LocalOnly { .. } | MappingState::Removed { .. } => None,
        }
    }

    pub fn remote_code(&self) -> Option<&str> {
        self.remote_language().map(|remote| remote.code.as_str())
    }

    pub fn display_name(&self) -> Option<&str> {
        self.remote_language().map(|remote| remote.name.as_str())
    }

    pub fn completion(&self) -> Option<f64> {
        self.remote_language().and_then(|remote| remote.completion)
    }

    pub fn updated_at(&self) -> Option<OffsetDateTime> {
        self.remote_language().and_then(|remote| remote.updated_at)
    }

    pub fn is_matched(&self) -> bool {
        matches!(self.state, MappingState::Matched { .. })
    }

    /// Code used to name this language in reports: local first, then remote.
    pub fn label(&self) -> &str {
        match &self.state {
            MappingState::LocalOnly { local } | MappingState::Matched { local, .. } => local,
            MappingState::RemoteOnly { remote } => &remote.code,
            MappingState::Removed { code } => code,
        }
    }

    fn take_state(&mut self) -> MappingState {
        mem::replace(&mut self.state, MappingState::Removed { code: String::new() })
    }

    pub(crate) fn attach_local(&mut self, local: String) {
        self.state = match self.take_state() {
            MappingState::RemoteOnly { remote } | MappingState::Matched { remote, .. } => {
                MappingState::Matched { local, remote }
            }
            MappingState::LocalOnly { .. } | MappingState::Removed { .. } => {
                MappingState::LocalOnly { local }
            }
        };
    }

    pub(crate) fn attach_remote(&mut self, remote: RemoteLanguage) {
        self.state = match self.take_state() {
            MappingState::LocalOnly { local } | MappingState::Matched { local, .. } => {
                MappingState::Matched { local, remote }
            }
            MappingState::RemoteOnly { .. } | MappingState::Removed { .. } => {
                MappingState::RemoteOnly { remote }
            }
        };
    }

    pub(crate) fn detach_remote(&mut self) {
        self.state = match self.take_state() {
            MappingState::Matched { local, .. } => MappingState::LocalOnly { local },
            MappingState::RemoteOnly { remote } => MappingState::Removed { code: remote.code },
            other => other,
        };
    }

    /// Whether `code` names this language on either side, ignoring case and
    /// `-`/`_` differences.
    pub fn matches_code(&self, code: &str) -> bool {
        let local_hit = self
            .local_code()
            .is_some_and(|local| local.to_lowercase() == codes::normalize_local(code));
        let remote_hit = self
            .remote_code()
            .is_some_and(|remote| remote.to_lowercase() == codes::normalize_remote(code));
        local_hit || remote_hit
    }

    pub fn local_to_remote_code(&self, rules: &ReconciliationRules) -> Option<String> {
        self.local_code().map(|local| codes::local_to_remote(rules, local))
    }

    pub fn remote_to_local_code(&self, rules: &ReconciliationRules) -> Option<String> {
        self.remote_code().map(|remote| codes::remote_to_local(rules, remote))
    }

    /// Download the catalog from the service and install or merge it locally.
    pub fn sync_from_server(
        &mut self,
        ctx: &SyncContext<'_>,
        merger: &dyn CatalogMerger,
    ) -> Result<LanguageOutcome> {
        debug!(remote = ?self.remote_code(), "sync from server");
        let Some(remote_code) = self.remote_code().map(str::to_owned) else {
            error!(language = self.label(), "cannot sync from server, language is not remote");
            return Ok(LanguageOutcome::Failed(FailureReason::NotOnServer));
        };

        debug!("fetching translations from server");
        let exported = ctx.remote.export(ctx.project_id, &remote_code, FileType::Po)?;

        let placed = self.place_export(ctx, merger, &remote_code, &exported.path);
        if exported.path.exists() {
            if let Err(err) = fs::remove_file(&exported.path) {
                warn!(path = %exported.path.display(), error = %err, "failed to remove export");
            }
        }
        placed?;
        Ok(LanguageOutcome::Synced)
    }

    /// Install `export` as the local catalog, or merge it into the one
    /// already there. `export` may be left behind on either path.
    fn place_export(
        &mut self,
        ctx: &SyncContext<'_>,
        merger: &dyn CatalogMerger,
        remote_code: &str,
        export: &Path,
    ) -> Result<()> {
        let local = match self.local_code() {
            Some(local) => local.to_owned(),
            None => codes::remote_to_local(ctx.rules, remote_code),
        };
        let catalog = ctx.catalog_path(&local);
        debug!(path = %catalog.display(), "local catalog");

        if catalog.exists() {
            debug!(remote = %remote_code, "language is already local, merging translations");
            return merger.merge(export, &catalog, &catalog);
        }

        debug!(remote = %remote_code, "language is not local yet, installing catalog");
        if let Some(parent) = catalog.parent() {
            fs::create_dir_all(parent).map_err(|source| CoreError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        install_catalog(export, &catalog)?;
        self.attach_local(local);
        Ok(())
    }

    /// Upload the local catalog, creating the language on the service first
    /// when it is missing there.
    pub fn sync_to_server(&mut self, ctx: &SyncContext<'_>) -> Result<LanguageOutcome> {
        debug!(local = ?self.local_code(), "sync to server");
        let Some(local) = self.local_code().map(str::to_owned) else {
            return Err(CoreError::LanguageNotLocal { code: self.label().to_string() }.into());
        };
        let catalog = ctx.catalog_path(&local);
        if !catalog.is_file() {
            warn!(path = %catalog.display(), "no local catalog to upload");
            return Ok(LanguageOutcome::Failed(FailureReason::CatalogMissing { path: catalog }));
        }

        let remote_code = match self.remote_code() {
            Some(code) => code.to_owned(),
            None => {
                let code = codes::local_to_remote(ctx.rules, &local);
                debug!(local = %local, remote = %code, "language is not remote yet, creating it");
                match ctx.remote.add_language_to_project(ctx.project_id, &code) {
                    Ok(()) => {}
                    Err(err) if err.is_rejection() => {
                        error!(
                            remote = %code,
                            error = %err,
                            "neither the server nor the rules know this language"
                        );
                        return Ok(LanguageOutcome::Failed(FailureReason::RemoteRejected {
                            code,
                            message: err.to_string(),
                        }));
                    }
                    Err(err) => return Err(err.into()),
                }

                let available = ctx.remote.available_languages()?;
                let name = available
                    .iter()
                    .find(|(_, known)| **known == code)
                    .map(|(name, _)| name.clone());
                let Some(name) = name else {
                    warn!(remote = %code, "server does not know about this language");
                    return Ok(LanguageOutcome::Failed(FailureReason::UnknownToService { code }));
                };
                debug!(remote = %code, name = %name, "language created on server");
                self.attach_remote(RemoteLanguage::new(code.clone(), name));
                code
            }
        };

        debug!(remote = %remote_code, "uploading translations");
        let summary = ctx.remote.update_terms_definitions(
            ctx.project_id,
            &remote_code,
            &catalog,
            true,
            true,
        )?;
        debug!(
            remote = %remote_code,
            terms_added = summary.terms_added,
            terms_deleted = summary.terms_deleted,
            translations_updated = summary.translations_updated,
            "upload finished"
        );
        Ok(LanguageOutcome::Synced)
    }

    /// Remove this language from the remote project.
    pub fn delete_on_server(&mut self, ctx: &SyncContext<'_>) -> Result<LanguageOutcome> {
        debug!(remote = ?self.remote_code(), "delete on server");
        let Some(code) = self.remote_code().map(str::to_owned) else {
            return Ok(LanguageOutcome::Failed(FailureReason::NotOnServer));
        };
        ctx.remote.delete_language_from_project(ctx.project_id, &code)?;
        debug!(remote = %code, "delete done");
        self.detach_remote();
        Ok(LanguageOutcome::Synced)
    }

    pub fn table_header() -> String {
        format_row("local", "L", "S", "remote", "name", "%", "updated")
    }

    pub fn table_row(&self) -> String {
        let local = self.local_code().unwrap_or_default();
        let remote = match &self.state {
            MappingState::Removed { code } => code.as_str(),
            _ => self.remote_code().unwrap_or_default(),
        };
        let local_flag = if self.local_code().is_some() { "x" } else { " " };
        let remote_flag = if self.remote_code().is_some() { "x" } else { " " };
        let completed = format!("{:.1}", self.completion().unwrap_or(0.0));
        let updated = self
            .updated_at()
            .and_then(|updated| updated.format(TABLE_TIME_FORMAT).ok())
            .unwrap_or_default();
        format_row(
            local,
            local_flag,
            remote_flag,
            remote,
            self.display_name().unwrap_or_default(),
            &completed,
            &updated,
        )
    }
}

fn format_row(
    local: &str,
    local_flag: &str,
    remote_flag: &str,
    remote: &str,
    name: &str,
    completed: &str,
    updated: &str,
) -> String {
    format!(
        "{local:>8} {local_flag:>1} {remote_flag:>1} {remote:<7} {name:<21} {completed:>5} {updated}"
    )
}

/// Move `from` to `to`, copying when they live on different filesystems.
fn install_catalog(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|source| CoreError::InstallCatalog {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    })?;
    if let Err(err) = fs::remove_file(from) {
        warn!(path = %from.display(), error = %err, "failed to remove exported catalog");
    }
    Ok(())
}
