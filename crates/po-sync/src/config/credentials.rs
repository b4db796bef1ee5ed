use std::{fmt, fs, io, path::Path};

use anyhow::Result;

use crate::error::CoreError;

/// Environment variable consulted when no token is passed on the command line.
pub const TOKEN_ENV_KEY: &str = "POEDITOR_API_TOKEN";

/// POEditor API token, loaded once at the boundary and passed inward.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::TokenEmpty.into());
        }
        Ok(ApiToken(trimmed.to_string()))
    }

    /// Resolve the token from, in order: the explicit value, the environment
    /// value, the token file.
    pub fn resolve(
        explicit: Option<String>,
        from_env: Option<String>,
        token_file: &Path,
    ) -> Result<Self> {
        if let Some(token) = explicit {
            return Self::new(token);
        }
        if let Some(token) = from_env.filter(|value| !value.trim().is_empty()) {
            return Self::new(token);
        }
        match fs::read_to_string(token_file) {
            Ok(content) => Self::new(content),
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                Err(CoreError::TokenMissing { path: token_file.to_path_buf() }.into())
            }
            Err(source) => {
                Err(CoreError::ReadToken { path: token_file.to_path_buf(), source }.into())
            }
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn explicit_token_wins() {
        let dir = tempdir().unwrap();
        let file = dir.path().join(".poeditor_apitoken");
        fs::write(&file, "from-file").unwrap();

        let token =
            ApiToken::resolve(Some("flag".into()), Some("from-env".into()), &file).unwrap();
        assert_eq!(token.expose(), "flag");
    }

    #[test]
    fn environment_beats_file() {
        let dir = tempdir().unwrap();
        let file = dir.path().join(".poeditor_apitoken");
        fs::write(&file, "from-file").unwrap();

        let token = ApiToken::resolve(None, Some("from-env".into()), &file).unwrap();
        assert_eq!(token.expose(), "from-env");
    }

    #[test]
    fn file_content_is_trimmed() {
        let dir = tempdir().unwrap();
        let file = dir.path().join(".poeditor_apitoken");
        fs::write(&file, "  abc123\n").unwrap();

        let token = ApiToken::resolve(None, None, &file).unwrap();
        assert_eq!(token.expose(), "abc123");
    }

    #[test]
    fn missing_file_reports_token_missing() {
        let dir = tempdir().unwrap();
        let err = ApiToken::resolve(None, None, &dir.path().join("nope")).unwrap_err();
        assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::TokenMissing { .. })));
    }

    #[test]
    fn debug_output_is_redacted() {
        let token = ApiToken::new("secret").unwrap();
        assert_eq!(format!("{token:?}"), "ApiToken(***)");
        assert!(matches!(
            ApiToken::new("   ").unwrap_err().downcast_ref::<CoreError>(),
            Some(CoreError::TokenEmpty)
        ));
    }
}
