use std::{
    io,
    path::{Path, PathBuf},
};

use serde_json::Error as JsonError;
use thiserror::Error;
use toml_edit::TomlError;
use url::ParseError as UrlParseError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("project '{name}' not found on the server")]
    ProjectNotFound { name: String },

    #[error("language code '{code}' unknown")]
    LanguageNotFound { code: String },

    #[error("cannot sync language '{code}' to the server: it is not local")]
    LanguageNotLocal { code: String },

    #[error("invalid sort specification '{spec}'")]
    InvalidSortSpec { spec: String },

    #[error("failed to create directory {path}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read directory {path}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to install catalog {from} as {to}")]
    InstallCatalog {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read reconciliation rules {path}")]
    ReadRules {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse TOML reconciliation rules at {path}")]
    ParseRulesToml {
        path: PathBuf,
        #[source]
        source: TomlError,
    },

    #[error("failed to parse JSON reconciliation rules at {path}")]
    ParseRulesJson {
        path: PathBuf,
        #[source]
        source: JsonError,
    },

    #[error("reconciliation rule '{key}' in {path} must map to a string")]
    InvalidRule { path: PathBuf, key: String },

    #[error("failed to read API token file {path}")]
    ReadToken {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no API token given (use --token, POEDITOR_API_TOKEN or {path})")]
    TokenMissing { path: PathBuf },

    #[error("API token is empty")]
    TokenEmpty,

    #[error("invalid API url '{url}'")]
    InvalidApiUrl {
        url: String,
        #[source]
        source: UrlParseError,
    },

    #[error("failed to run merge tool {program}")]
    MergeSpawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("merge tool {program} failed on {path} ({status})")]
    MergeFailed { program: PathBuf, path: PathBuf, status: String },
}

impl CoreError {
    pub fn message_key(&self) -> &'static str {
        match self {
            CoreError::ProjectNotFound { .. } => "core.project_not_found",
            CoreError::LanguageNotFound { .. } => "core.language_not_found",
            CoreError::LanguageNotLocal { .. } => "core.language_not_local",
            CoreError::InvalidSortSpec { .. } => "core.invalid_sort_spec",
            CoreError::CreateDirectory { .. } => "core.create_dir_failed",
            CoreError::ReadDirectory { .. } => "core.read_dir_failed",
            CoreError::InstallCatalog { .. } => "core.install_catalog_failed",
            CoreError::ReadRules { .. } => "core.read_rules_failed",
            CoreError::ParseRulesToml { .. } => "core.parse_rules_toml_failed",
            CoreError::ParseRulesJson { .. } => "core.parse_rules_json_failed",
            CoreError::InvalidRule { .. } => "core.invalid_rule",
            CoreError::ReadToken { .. } => "core.read_token_failed",
            CoreError::TokenMissing { .. } => "core.token_missing",
            CoreError::TokenEmpty => "core.token_empty",
            CoreError::InvalidApiUrl { .. } => "core.invalid_api_url",
            CoreError::MergeSpawn { .. } => "core.merge_spawn_failed",
            CoreError::MergeFailed { .. } => "core.merge_failed",
        }
    }

    pub fn placeholders(&self) -> Vec<(&'static str, String)> {
        match self {
            CoreError::ProjectNotFound { name } => vec![("name", name.clone())],
            CoreError::LanguageNotFound { code } | CoreError::LanguageNotLocal { code } => {
                vec![("code", code.clone())]
            }
            CoreError::InvalidSortSpec { spec } => vec![("spec", spec.clone())],
            CoreError::CreateDirectory { path, source }
            | CoreError::ReadDirectory { path, source }
            | CoreError::ReadRules { path, source }
            | CoreError::ReadToken { path, source } => {
                vec![("path", display_path(path)), ("error", source.to_string())]
            }
            CoreError::InstallCatalog { from, to, source } => vec![
                ("from", display_path(from)),
                ("to", display_path(to)),
                ("error", source.to_string()),
            ],
            CoreError::ParseRulesToml { path, source } => {
                vec![("path", display_path(path)), ("error", source.to_string())]
            }
            CoreError::ParseRulesJson { path, source } => {
                vec![("path", display_path(path)), ("error", source.to_string())]
            }
            CoreError::InvalidRule { path, key } => {
                vec![("path", display_path(path)), ("key", key.clone())]
            }
            CoreError::TokenMissing { path } => vec![("path", display_path(path))],
            CoreError::TokenEmpty => Vec::new(),
            CoreError::InvalidApiUrl { url, source } => {
                vec![("url", url.clone()), ("error", source.to_string())]
            }
            CoreError::MergeSpawn { program, source } => {
                vec![("program", display_path(program)), ("error", source.to_string())]
            }
            CoreError::MergeFailed { program, path, status } => vec![
                ("program", display_path(program)),
                ("path", display_path(path)),
                ("status", status.clone()),
            ],
        }
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
