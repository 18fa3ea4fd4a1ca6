use log::warn;

use crate::config::RevealConfig;

/// Who may call the manual reveal trigger.
pub enum RevealAuth {
    /// digest of the shared bearer key
    Key(blake3::Hash),
    TrustAll,
    /// no key configured and no opt-in: nobody
    Deny,
}

impl RevealAuth {
    pub fn from_config(config: &RevealConfig) -> Self {
        match config.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => RevealAuth::Key(blake3::hash(key.as_bytes())),
            _ if config.trust_all_callers => {
                warn!("Manual reveal accepts any caller, no api key configured");
                RevealAuth::TrustAll
            }
            _ => {
                warn!("No reveal api key configured, manual reveal is disabled");
                RevealAuth::Deny
            }
        }
    }

    /// Checks the raw `Authorization` header value
    pub fn allows(&self, authorization: Option<&str>) -> bool {
        match self {
            RevealAuth::TrustAll => true,
            RevealAuth::Deny => false,
            RevealAuth::Key(expected) => authorization
                .and_then(|value| value.strip_prefix("Bearer "))
                .map(|key| blake3::hash(key.trim().as_bytes()) == *expected)
                .unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(api_key: Option<&str>, trust_all_callers: bool) -> RevealConfig {
        RevealConfig {
            api_key: api_key.map(str::to_string),
            trust_all_callers,
            ..Default::default()
        }
    }

    #[test]
    fn test_key_must_match() {
        let auth = RevealAuth::from_config(&config(Some("hunter2"), false));

        assert!(auth.allows(Some("Bearer hunter2")));
        assert!(!auth.allows(Some("Bearer hunter3")));
        assert!(!auth.allows(Some("hunter2")));
        assert!(!auth.allows(Some("Basic hunter2")));
        assert!(!auth.allows(None));
    }

    #[test]
    fn test_fails_closed_without_key() {
        let auth = RevealAuth::from_config(&config(None, false));
        assert!(!auth.allows(None));
        assert!(!auth.allows(Some("Bearer anything")));

        let blank = RevealAuth::from_config(&config(Some("  "), false));
        assert!(!blank.allows(Some("Bearer ")));
    }

    #[test]
    fn test_trust_all_is_opt_in() {
        let auth = RevealAuth::from_config(&config(None, true));
        assert!(auth.allows(None));
    }

    #[test]
    fn test_key_wins_over_trust_all() {
        let auth = RevealAuth::from_config(&config(Some("hunter2"), true));
        assert!(!auth.allows(None));
        assert!(auth.allows(Some("Bearer hunter2")));
    }
}
