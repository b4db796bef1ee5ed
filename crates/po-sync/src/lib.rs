//! Keep gettext catalogs of a local tree in sync with a POEditor project.

pub mod config;
pub mod error;
pub mod logging;
pub mod mapping;
pub mod merge;
pub mod paths;
pub mod remote;

pub use config::{ApiToken, ReconciliationRules, Rule};
pub use error::CoreError;
pub use mapping::{
    BatchOutcome, BatchReport, Confirmation, FailureReason, LanguageMapping, LanguageOutcome,
    MappingCollection, MappingState, RemoteLanguage, Selection, SortKey, SortSpec, SyncContext,
};
pub use merge::{CatalogMerger, Msgcat};
pub use paths::Layout;
pub use remote::{ClientConfig, PoEditorClient, ProjectId, RemoteError, TranslationService};

// CLI 模块
#[path = "cli/i18n.rs"]
pub mod cli_i18n;

#[cfg(test)]
pub(crate) mod testing;
