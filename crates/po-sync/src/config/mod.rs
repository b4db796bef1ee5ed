//! User-supplied configuration: reconciliation rules and credentials.

pub mod credentials;
pub mod rules;

pub use credentials::ApiToken;
pub use rules::{ReconciliationRules, Rule};
