//! Translation between local directory codes (`pt_BR`) and remote codes (`pt-br`).

use crate::config::ReconciliationRules;

/// Lower-cased local form of `code`: hyphens become underscores.
pub fn normalize_local(code: &str) -> String {
    code.replace('-', "_").to_lowercase()
}

/// Lower-cased remote form of `code`: underscores become hyphens.
pub fn normalize_remote(code: &str) -> String {
    code.replace('_', "-").to_lowercase()
}

/// Default transform from a local code to the service's convention.
pub fn default_local_to_remote(local: &str) -> String {
    normalize_remote(local)
}

/// Default transform from a remote code to the local directory convention.
///
/// Every hyphen-separated segment after the first is upper-cased. This only
/// holds for two-segment codes: `zh-hant-tw` yields `zh_HANT_TW`.
pub fn default_remote_to_local(remote: &str) -> String {
    let mut parts = remote.split('-');
    let mut local = parts.next().unwrap_or_default().to_string();
    for part in parts {
        local.push('_');
        local.push_str(&part.to_uppercase());
    }
    local
}

/// Remote code for `local`, consulting `rules` in both directions first.
pub fn local_to_remote(rules: &ReconciliationRules, local: &str) -> String {
    rules
        .iter()
        .find(|rule| rule.local == local || rule.remote == local)
        .map(|rule| rule.remote.clone())
        .unwrap_or_else(|| default_local_to_remote(local))
}

/// Local code for `remote`, consulting `rules` in both directions first.
pub fn remote_to_local(rules: &ReconciliationRules, remote: &str) -> String {
    rules
        .iter()
        .find(|rule| rule.local == remote || rule.remote == remote)
        .map(|rule| rule.local.clone())
        .unwrap_or_else(|| default_remote_to_local(remote))
}

/// Local sides of the rules that mention `code` on either side, ignoring case.
pub fn rule_aliases<'a>(
    rules: &'a ReconciliationRules,
    code: &str,
) -> impl Iterator<Item = &'a str> + use<'a> {
    let code = code.to_lowercase();
    rules
        .iter()
        .filter(move |rule| rule.local.to_lowercase() == code || rule.remote.to_lowercase() == code)
        .map(|rule| rule.local.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_transforms_are_inverse_for_two_segments() {
        assert_eq!(default_local_to_remote("pt_BR"), "pt-br");
        assert_eq!(default_remote_to_local("pt-br"), "pt_BR");
        assert_eq!(default_remote_to_local(&default_local_to_remote("zh_CN")), "zh_CN");
        assert_eq!(default_local_to_remote("fr"), "fr");
        assert_eq!(default_remote_to_local("fr"), "fr");
    }

    #[test]
    fn remote_to_local_is_intentionally_narrow() {
        // Script subtags are upper-cased whole, not title-cased.
        assert_eq!(default_remote_to_local("zh-hant-tw"), "zh_HANT_TW");
        assert_eq!(default_remote_to_local("sr-Latn"), "sr_LATN");
        assert_ne!(default_remote_to_local(&default_local_to_remote("sr_Latn")), "sr_Latn");
    }

    #[test]
    fn rules_win_in_both_directions() {
        let rules = ReconciliationRules::from_pairs([("zh_TW", "zh-Hant"), ("nb_NO", "nb")]);
        assert_eq!(local_to_remote(&rules, "zh_TW"), "zh-Hant");
        assert_eq!(local_to_remote(&rules, "zh-Hant"), "zh-Hant");
        assert_eq!(remote_to_local(&rules, "nb"), "nb_NO");
        assert_eq!(remote_to_local(&rules, "nb_NO"), "nb_NO");
        assert_eq!(remote_to_local(&rules, "pt-br"), "pt_BR");
    }

    #[test]
    fn aliases_ignore_case() {
        let rules = ReconciliationRules::from_pairs([("zh_TW", "zh-Hant"), ("nb_NO", "nb")]);
        let aliases: Vec<&str> = rule_aliases(&rules, "ZH-HANT").collect();
        assert_eq!(aliases, ["zh_TW"]);
        assert_eq!(rule_aliases(&rules, "de").count(), 0);
    }

    #[test]
    fn normalization_folds_case_and_separator() {
        assert_eq!(normalize_local("PT-br"), "pt_br");
        assert_eq!(normalize_remote("pt_BR"), "pt-br");
    }
}
