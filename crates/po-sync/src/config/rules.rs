use std::{fs, path::Path};

use anyhow::Result;
use serde_json::Value as JsonValue;
use toml_edit::{DocumentMut, Item, Table};

use crate::error::CoreError;

/// One exceptional pairing between a local directory name and a remote code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub local: String,
    pub remote: String,
}

/// Ordered table of local↔remote code exceptions.
///
/// Rules are consulted in file order and in both directions before the
/// default naming transform is applied. A rules file is either TOML:
///
/// ```toml
/// [rules]
/// pt_BR = "pt-br"
/// zh_TW = "zh-Hant"
/// ```
///
/// (the `[rules]` header is optional) or a JSON object with the same pairs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationRules {
    rules: Vec<Rule>,
}

impl ReconciliationRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, L, R>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (L, R)>,
        L: Into<String>,
        R: Into<String>,
    {
        let rules = pairs
            .into_iter()
            .map(|(local, remote)| Rule { local: local.into(), remote: remote.into() })
            .collect();
        Self { rules }
    }

    /// Load rules from a TOML or JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|source| CoreError::ReadRules { path: path.to_path_buf(), source })?;
        if is_json_path(path) {
            parse_json(path, &content)
        } else {
            parse_toml(path, &content)
        }
    }

    /// Load rules from `path` when it exists, otherwise return an empty table.
    pub fn from_optional_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.is_file() { Self::from_file(path) } else { Ok(Self::default()) }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn parse_toml(path: &Path, content: &str) -> Result<ReconciliationRules> {
    let document = content
        .parse::<DocumentMut>()
        .map_err(|source| CoreError::ParseRulesToml { path: path.to_path_buf(), source })?;

    let table: &Table = match document.get("rules").and_then(Item::as_table) {
        Some(table) => table,
        None => document.as_table(),
    };

    let mut rules = Vec::with_capacity(table.len());
    for (key, item) in table.iter() {
        let remote = item.as_str().ok_or_else(|| CoreError::InvalidRule {
            path: path.to_path_buf(),
            key: key.to_string(),
        })?;
        rules.push(Rule { local: key.to_string(), remote: remote.to_string() });
    }
    Ok(ReconciliationRules { rules })
}

fn parse_json(path: &Path, content: &str) -> Result<ReconciliationRules> {
    let value: JsonValue = serde_json::from_str(content)
        .map_err(|source| CoreError::ParseRulesJson { path: path.to_path_buf(), source })?;
    let object = match value {
        JsonValue::Object(object) => object,
        _ => {
            return Err(
                CoreError::InvalidRule { path: path.to_path_buf(), key: "<root>".into() }.into()
            );
        }
    };

    let mut rules = Vec::with_capacity(object.len());
    for (key, value) in object {
        let JsonValue::String(remote) = value else {
            return Err(CoreError::InvalidRule { path: path.to_path_buf(), key }.into());
        };
        rules.push(Rule { local: key, remote });
    }
    Ok(ReconciliationRules { rules })
}

fn is_json_path(path: &Path) -> bool {
    matches!(path.extension().and_then(|s| s.to_str()), Some("json"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn parses_rules_table_in_file_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("poeditor_fixes.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[rules]
zh_TW = "zh-Hant"
pt_BR = "pt-br"
ca = "ca-es"
"#
        )
        .unwrap();

        let rules = ReconciliationRules::from_file(&path).unwrap();
        let locals: Vec<&str> = rules.iter().map(|rule| rule.local.as_str()).collect();
        assert_eq!(locals, ["zh_TW", "pt_BR", "ca"]);
        assert_eq!(rules.iter().next().unwrap().remote, "zh-Hant");
    }

    #[test]
    fn accepts_top_level_pairs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fixes.toml");
        fs::write(&path, "sr_Latn = \"sr-latn\"\n").unwrap();

        let rules = ReconciliationRules::from_file(&path).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(
            rules.iter().next().unwrap(),
            &Rule { local: "sr_Latn".into(), remote: "sr-latn".into() }
        );
    }

    #[test]
    fn parses_json_object_in_file_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fixes.json");
        fs::write(&path, r#"{"zh_CN": "zh-Hans", "nb_NO": "nb"}"#).unwrap();

        let rules = ReconciliationRules::from_file(&path).unwrap();
        let pairs: Vec<(&str, &str)> =
            rules.iter().map(|rule| (rule.local.as_str(), rule.remote.as_str())).collect();
        assert_eq!(pairs, [("zh_CN", "zh-Hans"), ("nb_NO", "nb")]);
    }

    #[test]
    fn rejects_non_string_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fixes.toml");
        fs::write(&path, "pt_BR = 3\n").unwrap();

        let err = ReconciliationRules::from_file(&path).unwrap_err();
        match err.downcast_ref::<CoreError>() {
            Some(CoreError::InvalidRule { key, .. }) => assert_eq!(key, "pt_BR"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_optional_file_yields_empty_rules() {
        let dir = tempdir().unwrap();
        let rules = ReconciliationRules::from_optional_file(dir.path().join("absent.toml")).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = ReconciliationRules::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err.downcast_ref::<CoreError>(), Some(CoreError::ReadRules { .. })));
    }
}
