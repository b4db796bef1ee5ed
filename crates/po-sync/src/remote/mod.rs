//! Remote translation service contract and its POEditor implementation.

use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

pub mod poeditor;

pub use poeditor::{ClientConfig, PoEditorClient};

/// Numeric identifier of a project on the translation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(u64);

impl ProjectId {
    pub const fn new(raw: u64) -> Self {
        ProjectId(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
}

/// A language as listed for one project.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectLanguage {
    pub code: String,
    pub name: String,
    /// Completion percentage in `[0, 100]`.
    pub percentage: Option<f64>,
    pub updated: Option<OffsetDateTime>,
}

/// Export formats understood by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Po,
    Pot,
    Mo,
    Xliff,
}

impl FileType {
    pub fn as_str(self) -> &'static str {
        match self {
            FileType::Po => "po",
            FileType::Pot => "pot",
            FileType::Mo => "mo",
            FileType::Xliff => "xliff",
        }
    }
}

/// Catalog downloaded from the service into a temporary file owned by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedCatalog {
    pub url: String,
    pub path: PathBuf,
}

/// Counters reported by the service after an upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub terms_parsed: u64,
    pub terms_added: u64,
    pub terms_deleted: u64,
    pub translations_parsed: u64,
    pub translations_added: u64,
    pub translations_updated: u64,
}

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The service answered but refused the request.
    #[error("{endpoint} rejected by the service ({code}): {message}")]
    Rejected { endpoint: String, code: String, message: String },

    #[error("request to {endpoint} failed")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} answered with HTTP {status}: {body}")]
    Status { endpoint: String, status: u16, body: String },

    #[error("unexpected response from {endpoint}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("response from {endpoint} has no result")]
    MissingResult { endpoint: String },

    #[error("invalid endpoint url for {endpoint}")]
    Url {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl RemoteError {
    pub fn is_rejection(&self) -> bool {
        matches!(self, RemoteError::Rejected { .. })
    }
}

/// Operations the sync core needs from the translation service.
///
/// Every call blocks until the service answered; timeouts belong to the
/// implementation.
pub trait TranslationService {
    fn list_projects(&self) -> Result<Vec<Project>, RemoteError>;

    fn list_project_languages(
        &self,
        project_id: ProjectId,
    ) -> Result<Vec<ProjectLanguage>, RemoteError>;

    /// Service-wide language catalog, display name to code.
    fn available_languages(&self) -> Result<BTreeMap<String, String>, RemoteError>;

    fn export(
        &self,
        project_id: ProjectId,
        language_code: &str,
        file_type: FileType,
    ) -> Result<ExportedCatalog, RemoteError>;

    fn update_terms_definitions(
        &self,
        project_id: ProjectId,
        language_code: &str,
        file_path: &Path,
        overwrite: bool,
        sync_terms: bool,
    ) -> Result<UploadSummary, RemoteError>;

    fn add_language_to_project(
        &self,
        project_id: ProjectId,
        language_code: &str,
    ) -> Result<(), RemoteError>;

    fn delete_language_from_project(
        &self,
        project_id: ProjectId,
        language_code: &str,
    ) -> Result<(), RemoteError>;
}
