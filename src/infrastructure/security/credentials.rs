use crate::domain::llm_config::ApiCredential;

/// Picks the credential for one request: the session value wins, the
/// environment fallback is used otherwise. Blank values count as absent.
pub fn resolve_api_key(
    session_value: Option<&str>,
    env_fallback: Option<&ApiCredential>,
) -> Option<ApiCredential> {
    session_value
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(ApiCredential::new)
        .or_else(|| env_fallback.filter(|key| !key.is_blank()).cloned())
}

/// Short form of a key for log lines, e.g. `sk-...9f2c`.
pub fn mask_key(credential: &ApiCredential) -> String {
    let key = credential.expose();
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "***".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_value_wins_over_env() {
        let env = ApiCredential::new("sk-env");
        let resolved = resolve_api_key(Some("sk-session"), Some(&env));
        assert_eq!(resolved, Some(ApiCredential::new("sk-session")));
    }

    #[test]
    fn test_blank_session_falls_back_to_env() {
        let env = ApiCredential::new("sk-env");
        assert_eq!(resolve_api_key(Some("  "), Some(&env)), Some(env.clone()));
        assert_eq!(resolve_api_key(None, Some(&env)), Some(env));
    }

    #[test]
    fn test_nothing_configured_resolves_to_none() {
        assert_eq!(resolve_api_key(None, None), None);
        let blank = ApiCredential::new("");
        assert_eq!(resolve_api_key(None, Some(&blank)), None);
    }

    #[test]
    fn test_mask_key_keeps_prefix_and_suffix() {
        assert_eq!(mask_key(&ApiCredential::new("sk-abcdefgh1234")), "sk-...1234");
        assert_eq!(mask_key(&ApiCredential::new("short")), "***");
    }
}
