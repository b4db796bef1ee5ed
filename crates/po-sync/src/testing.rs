//! In-memory stand-ins for the translation service and the catalog merger.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, BTreeSet, HashMap},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Result, bail};
use time::OffsetDateTime;

use crate::{
    merge::CatalogMerger,
    remote::{
        ExportedCatalog, FileType, Project, ProjectId, ProjectLanguage, RemoteError,
        TranslationService, UploadSummary,
    },
};

#[derive(Default)]
struct FakeState {
    languages: Vec<ProjectLanguage>,
    available: BTreeMap<String, String>,
    rejected: BTreeSet<String>,
    rejected_uploads: BTreeSet<String>,
    exports: HashMap<String, Vec<u8>>,
    calls: Vec<String>,
}

/// Single-project service that records every call it receives.
pub(crate) struct FakeService {
    export_dir: PathBuf,
    state: RefCell<FakeState>,
    export_counter: Cell<u32>,
}

impl FakeService {
    pub(crate) const PROJECT_ID: ProjectId = ProjectId::new(7);
    pub(crate) const PROJECT_NAME: &'static str = "App";

    pub(crate) fn new(export_dir: PathBuf) -> Self {
        Self { export_dir, state: RefCell::default(), export_counter: Cell::new(0) }
    }

    pub(crate) fn add_remote_language(&self, code: &str, name: &str) {
        self.add_remote_language_with(code, name, None, None);
    }

    pub(crate) fn add_remote_language_with(
        &self,
        code: &str,
        name: &str,
        percentage: Option<f64>,
        updated: Option<OffsetDateTime>,
    ) {
        let mut state = self.state.borrow_mut();
        state.available.insert(name.to_string(), code.to_string());
        state.languages.push(ProjectLanguage {
            code: code.to_string(),
            name: name.to_string(),
            percentage,
            updated,
        });
    }

    pub(crate) fn add_available_language(&self, name: &str, code: &str) {
        self.state.borrow_mut().available.insert(name.to_string(), code.to_string());
    }

    pub(crate) fn reject_code(&self, code: &str) {
        self.state.borrow_mut().rejected.insert(code.to_string());
    }

    pub(crate) fn reject_upload(&self, code: &str) {
        self.state.borrow_mut().rejected_uploads.insert(code.to_string());
    }

    pub(crate) fn set_export(&self, code: &str, content: &str) {
        self.state.borrow_mut().exports.insert(code.to_string(), content.as_bytes().to_vec());
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub(crate) fn remote_codes(&self) -> Vec<String> {
        self.state.borrow().languages.iter().map(|language| language.code.clone()).collect()
    }

    fn record(&self, call: String) {
        self.state.borrow_mut().calls.push(call);
    }
}

impl TranslationService for FakeService {
    fn list_projects(&self) -> Result<Vec<Project>, RemoteError> {
        self.record("list_projects".to_string());
        Ok(vec![Project { id: Self::PROJECT_ID, name: Self::PROJECT_NAME.to_string() }])
    }

    fn list_project_languages(
        &self,
        _project_id: ProjectId,
    ) -> Result<Vec<ProjectLanguage>, RemoteError> {
        self.record("list_project_languages".to_string());
        Ok(self.state.borrow().languages.clone())
    }

    fn available_languages(&self) -> Result<BTreeMap<String, String>, RemoteError> {
        self.record("available_languages".to_string());
        Ok(self.state.borrow().available.clone())
    }

    fn export(
        &self,
        _project_id: ProjectId,
        language_code: &str,
        file_type: FileType,
    ) -> Result<ExportedCatalog, RemoteError> {
        self.record(format!("export {language_code}"));
        let content = self.state.borrow().exports.get(language_code).cloned().unwrap_or_default();
        let io_error =
            |source| RemoteError::Io { context: "writing fake export".to_string(), source };
        fs::create_dir_all(&self.export_dir).map_err(io_error)?;
        let counter = self.export_counter.get() + 1;
        self.export_counter.set(counter);
        let path =
            self.export_dir.join(format!("{language_code}-{counter}.{}", file_type.as_str()));
        fs::write(&path, content).map_err(io_error)?;
        Ok(ExportedCatalog { url: format!("fake://{}", path.display()), path })
    }

    fn update_terms_definitions(
        &self,
        _project_id: ProjectId,
        language_code: &str,
        file_path: &Path,
        _overwrite: bool,
        _sync_terms: bool,
    ) -> Result<UploadSummary, RemoteError> {
        self.record(format!("update_terms_definitions {language_code}"));
        if self.state.borrow().rejected_uploads.contains(language_code) {
            return Err(RemoteError::Rejected {
                endpoint: "projects/upload".to_string(),
                code: "4048".to_string(),
                message: "Upload failed".to_string(),
            });
        }
        let content = fs::read(file_path)
            .map_err(|source| RemoteError::Io { context: "reading upload".to_string(), source })?;
        self.state.borrow_mut().exports.insert(language_code.to_string(), content);
        Ok(UploadSummary::default())
    }

    fn add_language_to_project(
        &self,
        _project_id: ProjectId,
        language_code: &str,
    ) -> Result<(), RemoteError> {
        self.record(format!("add_language_to_project {language_code}"));
        let mut state = self.state.borrow_mut();
        if state.rejected.contains(language_code) {
            return Err(RemoteError::Rejected {
                endpoint: "languages/add".to_string(),
                code: "4101".to_string(),
                message: "Invalid language code".to_string(),
            });
        }
        let name = state
            .available
            .iter()
            .find(|(_, code)| code.as_str() == language_code)
            .map(|(name, _)| name.clone())
            .unwrap_or_default();
        state.languages.push(ProjectLanguage {
            code: language_code.to_string(),
            name,
            percentage: Some(0.0),
            updated: None,
        });
        Ok(())
    }

    fn delete_language_from_project(
        &self,
        _project_id: ProjectId,
        language_code: &str,
    ) -> Result<(), RemoteError> {
        self.record(format!("delete_language_from_project {language_code}"));
        self.state.borrow_mut().languages.retain(|language| language.code != language_code);
        Ok(())
    }
}

/// Merger that writes `newer` followed by `existing`, or only `newer` when
/// both carry the same content.
#[derive(Default)]
pub(crate) struct FakeMerger {
    use_first: bool,
    fail_first: bool,
    calls: Cell<usize>,
}

impl FakeMerger {
    pub(crate) fn use_first() -> Self {
        Self { use_first: true, ..Self::default() }
    }

    /// Exits with an error on its first call, then merges normally.
    pub(crate) fn failing_once() -> Self {
        Self { fail_first: true, ..Self::default() }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl CatalogMerger for FakeMerger {
    fn merge(&self, newer: &Path, existing: &Path, output: &Path) -> Result<()> {
        self.calls.set(self.calls.get() + 1);
        if self.fail_first && self.calls.get() == 1 {
            bail!("msgcat exited with status 1");
        }
        let newer = fs::read(newer)?;
        let existing = fs::read(existing)?;
        let merged = if self.use_first && newer == existing {
            newer
        } else {
            [newer, existing].concat()
        };
        fs::write(output, merged)?;
        Ok(())
    }
}
