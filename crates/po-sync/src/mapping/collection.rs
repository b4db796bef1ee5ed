use std::{
    fmt, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::Result;
use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use super::{
    FailureReason, LanguageMapping, LanguageOutcome, RemoteLanguage, SyncContext, codes,
};
use crate::{
    config::ReconciliationRules,
    error::CoreError,
    merge::CatalogMerger,
    remote::{ProjectId, TranslationService},
};

/// Column a status table or batch run is ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Local,
    Remote,
    Name,
    Completion,
    Updated,
}

impl SortKey {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'l' => Some(SortKey::Local),
            's' => Some(SortKey::Remote),
            'n' => Some(SortKey::Name),
            'p' => Some(SortKey::Completion),
            't' => Some(SortKey::Updated),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            SortKey::Local => 'l',
            SortKey::Remote => 's',
            SortKey::Name => 'n',
            SortKey::Completion => 'p',
            SortKey::Updated => 't',
        }
    }
}

/// Optional sort column plus direction, written as e.g. `"p"` or `"rl"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub key: Option<SortKey>,
    pub reverse: bool,
}

impl SortSpec {
    pub fn by(key: SortKey) -> Self {
        Self { key: Some(key), reverse: false }
    }

    pub fn reversed(mut self) -> Self {
        self.reverse = !self.reverse;
        self
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reverse {
            f.write_str("r")?;
        }
        if let Some(key) = self.key {
            write!(f, "{}", key.as_char())?;
        }
        Ok(())
    }
}

impl FromStr for SortSpec {
    type Err = CoreError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidSortSpec { spec: spec.to_string() };
        let mut parsed = SortSpec::default();
        for c in spec.chars() {
            if c == 'r' {
                if parsed.reverse {
                    return Err(invalid());
                }
                parsed.reverse = true;
                continue;
            }
            let key = SortKey::from_char(c).ok_or_else(invalid)?;
            if parsed.key.is_some() {
                return Err(invalid());
            }
            parsed.key = Some(key);
        }
        Ok(parsed)
    }
}

/// Which mappings a bulk operation touches, and in which order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Codes to keep; `None` or an empty list selects everything.
    pub languages: Option<Vec<String>>,
    pub sort: SortSpec,
}

impl Selection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = Some(languages.into_iter().map(Into::into).collect());
        self
    }

    pub fn sorted(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }
}

/// A language that did not make it through a bulk operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub mapping: LanguageMapping,
    pub reason: FailureReason,
}

/// Tally of one bulk operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub attempted: usize,
    pub failed: Vec<Failure>,
}

impl BatchReport {
    fn record(&mut self, mapping: &LanguageMapping, outcome: LanguageOutcome) {
        self.attempted += 1;
        if let LanguageOutcome::Failed(reason) = outcome {
            self.failed.push(Failure { mapping: mapping.clone(), reason });
        }
    }

    /// Record a per-language result. Errors caused by that language alone
    /// become failures; misuse of the mapping is passed back to the caller.
    fn record_result(
        &mut self,
        mapping: &LanguageMapping,
        result: Result<LanguageOutcome>,
    ) -> Result<()> {
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) if is_contract_violation(&err) => return Err(err),
            Err(err) => {
                let message = format!("{err:#}");
                error!(language = mapping.label(), error = %message, "language failed");
                LanguageOutcome::Failed(FailureReason::Aborted { message })
            }
        };
        self.record(mapping, outcome);
        Ok(())
    }

    pub fn succeeded(&self) -> usize {
        self.attempted - self.failed.len()
    }

    /// Labels of the failed languages joined with `,`.
    pub fn failed_codes(&self) -> String {
        self.failed
            .iter()
            .map(|failure| failure.mapping.label())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Completed(BatchReport),
    /// The operator did not confirm; nothing was sent to the service.
    Cancelled,
}

impl BatchOutcome {
    pub fn attempted(&self) -> usize {
        match self {
            BatchOutcome::Completed(report) => report.attempted,
            BatchOutcome::Cancelled => 0,
        }
    }

    pub fn report(&self) -> Option<&BatchReport> {
        match self {
            BatchOutcome::Completed(report) => Some(report),
            BatchOutcome::Cancelled => None,
        }
    }
}

/// Asks the operator to type the project name before a destructive run.
pub trait Confirmation {
    /// Returns whatever the operator typed.
    fn ask_project_name(&mut self, project_name: &str) -> Result<String>;
}

impl<F> Confirmation for F
where
    F: FnMut(&str) -> Result<String>,
{
    fn ask_project_name(&mut self, project_name: &str) -> Result<String> {
        self(project_name)
    }
}

/// All languages of one project, local and remote, reconciled.
#[derive(Debug, Clone)]
pub struct MappingCollection {
    project_name: String,
    project_id: ProjectId,
    language_root: PathBuf,
    rules: ReconciliationRules,
    mappings: Vec<LanguageMapping>,
}

impl MappingCollection {
    pub fn new(
        project_name: impl Into<String>,
        project_id: ProjectId,
        language_root: impl Into<PathBuf>,
        rules: ReconciliationRules,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            project_id,
            language_root: language_root.into(),
            rules,
            mappings: Vec::new(),
        }
    }

    /// Resolve the project on the service, scan the language root and pair
    /// every remote language with a local directory where one matches.
    pub fn build(
        remote: &dyn TranslationService,
        project_name: &str,
        language_root: impl Into<PathBuf>,
        rules: ReconciliationRules,
    ) -> Result<Self> {
        let project_id = resolve_project_id(remote, project_name)?;
        let mut collection = Self::new(project_name, project_id, language_root, rules);

        for local in scan_local_languages(&collection.language_root)? {
            debug!(local = %local, "found local language");
            collection.mappings.push(LanguageMapping::local(local));
        }

        for language in remote.list_project_languages(project_id)? {
            let language = RemoteLanguage::from(language);
            match collection.position_with_aliases(&language.code) {
                Some(index) if collection.mappings[index].remote_code().is_none() => {
                    debug!(
                        remote = %language.code,
                        local = collection.mappings[index].label(),
                        "matched remote language"
                    );
                    collection.mappings[index].attach_remote(language);
                }
                Some(index) => {
                    warn!(
                        remote = %language.code,
                        taken_by = ?collection.mappings[index].remote_code(),
                        "local language already matched, keeping remote language separate"
                    );
                    collection.mappings.push(LanguageMapping::remote(language));
                }
                None => {
                    debug!(remote = %language.code, "found remote-only language");
                    collection.mappings.push(LanguageMapping::remote(language));
                }
            }
        }

        info!(
            project = %collection.project_name,
            id = %project_id,
            languages = collection.mappings.len(),
            "languages reconciled"
        );
        Ok(collection)
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn language_root(&self) -> &Path {
        &self.language_root
    }

    pub fn rules(&self) -> &ReconciliationRules {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LanguageMapping> {
        self.mappings.iter()
    }

    pub fn push(&mut self, mapping: LanguageMapping) {
        self.mappings.push(mapping);
    }

    fn position(&self, code: &str) -> Option<usize> {
        self.mappings.iter().position(|mapping| mapping.matches_code(code))
    }

    fn position_with_aliases(&self, code: &str) -> Option<usize> {
        self.position(code).or_else(|| {
            codes::rule_aliases(&self.rules, code).find_map(|alias| self.position(alias))
        })
    }

    /// First mapping matching `code` on either side, falling back to the
    /// local side of any rule that mentions `code`.
    pub fn find(&self, code: &str) -> Result<&LanguageMapping> {
        let index = self
            .position_with_aliases(code)
            .ok_or_else(|| CoreError::LanguageNotFound { code: code.to_string() })?;
        Ok(&self.mappings[index])
    }

    pub fn find_mut(&mut self, code: &str) -> Result<&mut LanguageMapping> {
        let index = self
            .position_with_aliases(code)
            .ok_or_else(|| CoreError::LanguageNotFound { code: code.to_string() })?;
        Ok(&mut self.mappings[index])
    }

    /// Mappings picked by `selection`, in its order.
    pub fn select(&self, selection: &Selection) -> Vec<&LanguageMapping> {
        self.selected_indices(selection).into_iter().map(|index| &self.mappings[index]).collect()
    }

    fn selected_indices(&self, selection: &Selection) -> Vec<usize> {
        let mut indices: Vec<usize> = match selection.languages.as_deref() {
            Some(codes) if !codes.is_empty() => (0..self.mappings.len())
                .filter(|&index| codes.iter().any(|code| self.mappings[index].matches_code(code)))
                .collect(),
            _ => (0..self.mappings.len()).collect(),
        };

        let mappings = &self.mappings;
        match selection.sort.key {
            Some(SortKey::Local) => {
                indices.sort_by(|&a, &b| {
                    let key = |i: usize| mappings[i].local_code().unwrap_or_default();
                    key(a).cmp(key(b))
                });
            }
            Some(SortKey::Remote) => {
                indices.sort_by(|&a, &b| {
                    let key = |i: usize| mappings[i].remote_code().unwrap_or_default();
                    key(a).cmp(key(b))
                });
            }
            Some(SortKey::Name) => {
                indices.sort_by(|&a, &b| {
                    let key = |i: usize| mappings[i].display_name().unwrap_or_default();
                    key(a).cmp(key(b))
                });
            }
            Some(SortKey::Completion) => {
                indices.sort_by(|&a, &b| {
                    let key = |i: usize| mappings[i].completion().unwrap_or(0.0);
                    key(a).total_cmp(&key(b))
                });
            }
            Some(SortKey::Updated) => {
                indices.sort_by_key(|&i| {
                    mappings[i].updated_at().unwrap_or(OffsetDateTime::UNIX_EPOCH)
                });
            }
            None => {}
        }
        if selection.sort.reverse {
            indices.reverse();
        }
        indices
    }

    /// Write the header and one row per selected mapping to `out`.
    pub fn report_status<W: Write>(
        &self,
        selection: &Selection,
        out: &mut W,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        writeln!(out, "{}", LanguageMapping::table_header())?;
        for mapping in self.select(selection) {
            writeln!(out, "{}", mapping.table_row())?;
            report.record(mapping, LanguageOutcome::Synced);
        }
        Ok(report)
    }

    pub fn sync_all_from_server(
        &mut self,
        remote: &dyn TranslationService,
        merger: &dyn CatalogMerger,
        selection: &Selection,
    ) -> Result<BatchReport> {
        self.run_batch(remote, selection, |mapping, ctx| mapping.sync_from_server(ctx, merger))
    }

    /// Upload every selected language that exists locally; remote-only
    /// languages are skipped without counting.
    pub fn sync_all_to_server(
        &mut self,
        remote: &dyn TranslationService,
        selection: &Selection,
    ) -> Result<BatchReport> {
        let mut report = BatchReport::default();
        let indices = self.selected_indices(selection);
        let ctx = SyncContext {
            remote,
            project_id: self.project_id,
            project_name: &self.project_name,
            language_root: &self.language_root,
            rules: &self.rules,
        };
        for index in indices {
            let mapping = &mut self.mappings[index];
            if mapping.local_code().is_none() {
                debug!(remote = ?mapping.remote_code(), "skipping language without local catalog");
                continue;
            }
            let result = mapping.sync_to_server(&ctx);
            report.record_result(mapping, result)?;
        }
        Ok(report)
    }

    /// Delete the selected languages from the service once the operator
    /// typed the project name.
    pub fn delete_all_on_server(
        &mut self,
        remote: &dyn TranslationService,
        selection: &Selection,
        confirmation: &mut dyn Confirmation,
    ) -> Result<BatchOutcome> {
        let answer = confirmation.ask_project_name(&self.project_name)?;
        if answer.trim().to_lowercase() != self.project_name.to_lowercase() {
            info!(project = %self.project_name, "deletion not confirmed");
            return Ok(BatchOutcome::Cancelled);
        }
        let report =
            self.run_batch(remote, selection, |mapping, ctx| mapping.delete_on_server(ctx))?;
        Ok(BatchOutcome::Completed(report))
    }

    fn run_batch<F>(
        &mut self,
        remote: &dyn TranslationService,
        selection: &Selection,
        mut op: F,
    ) -> Result<BatchReport>
    where
        F: FnMut(&mut LanguageMapping, &SyncContext<'_>) -> Result<LanguageOutcome>,
    {
        let mut report = BatchReport::default();
        let indices = self.selected_indices(selection);
        let ctx = SyncContext {
            remote,
            project_id: self.project_id,
            project_name: &self.project_name,
            language_root: &self.language_root,
            rules: &self.rules,
        };
        for index in indices {
            let mapping = &mut self.mappings[index];
            let result = op(mapping, &ctx);
            report.record_result(mapping, result)?;
        }
        Ok(report)
    }
}

fn is_contract_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<CoreError>(),
        Some(CoreError::LanguageNotLocal { .. } | CoreError::LanguageNotFound { .. })
    )
}

fn resolve_project_id(remote: &dyn TranslationService, project_name: &str) -> Result<ProjectId> {
    let wanted = project_name.to_lowercase();
    let projects = remote.list_projects()?;
    match projects.into_iter().find(|project| project.name.to_lowercase() == wanted) {
        Some(project) => {
            debug!(project = %project.name, id = %project.id, "project found");
            Ok(project.id)
        }
        None => {
            error!(project = %project_name, "project not found on the server");
            Err(CoreError::ProjectNotFound { name: project_name.to_string() }.into())
        }
    }
}

/// Names of the immediate subdirectories of `root`, sorted.
fn scan_local_languages(root: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            warn!(path = %root.display(), "language root does not exist, no local languages");
            return Ok(Vec::new());
        }
        Err(source) => {
            return Err(CoreError::ReadDirectory { path: root.to_path_buf(), source }.into());
        }
    };

    let mut languages = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|source| CoreError::ReadDirectory { path: root.to_path_buf(), source })?;
        let file_type = entry
            .file_type()
            .map_err(|source| CoreError::ReadDirectory { path: entry.path(), source })?;
        if !file_type.is_dir() {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) => languages.push(name),
            Err(name) => warn!(name = ?name, "skipping directory with non UTF-8 name"),
        }
    }
    languages.sort();
    Ok(languages)
}
