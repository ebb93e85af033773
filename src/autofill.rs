//! Autofill: opening the credential suggested for the current site
//!
//! The suggestion payload comes from the extension's background script and
//! carries the sealed entries matching the page's domain. Only the first
//! exact match is used.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::error::Result;
use crate::secretcrypt::SealedSecret;

/// `{ domain, exact: [...], near: [...] }` as delivered to the content script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionPayload {
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub exact: Vec<Suggestion>,
    #[serde(default)]
    pub near: Vec<Suggestion>,
}

/// One suggested entry. Fields other than the login and the sealed triple
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(flatten)]
    pub secret: SealedSecret,
}

/// The opened credential, ready to be filled into a login form.
pub struct AutofillCredential {
    pub login: Option<String>,
    pub password: Zeroizing<String>,
}

impl std::fmt::Debug for AutofillCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutofillCredential")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Open the first exact suggestion with `passphrase`.
///
/// Returns `Ok(None)` when there is no exact suggestion. A failure to open
/// is reported as-is; the caller must not fill anything in that case.
pub fn resolve_autofill(
    payload: &SuggestionPayload,
    passphrase: &str,
) -> Result<Option<AutofillCredential>> {
    let Some(entry) = payload.exact.first() else {
        debug!(domain = ?payload.domain, "no exact suggestion");
        return Ok(None);
    };

    let password = entry.secret.open(passphrase).inspect_err(|e| {
        warn!(domain = ?payload.domain, error = %e, "autofill decrypt failed");
    })?;

    Ok(Some(AutofillCredential {
        login: entry.login.clone(),
        password,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::secretcrypt::seal;

    fn payload_with(login: Option<&str>, secret: SealedSecret) -> SuggestionPayload {
        SuggestionPayload {
            domain: Some("example.com".to_string()),
            exact: vec![Suggestion {
                login: login.map(str::to_string),
                secret,
            }],
            near: Vec::new(),
        }
    }

    #[test]
    fn test_resolves_first_exact_match() {
        let mut payload = payload_with(
            Some("alice@example.com"),
            seal("s3cr3t", "ext-pass").unwrap(),
        );
        payload.exact.push(Suggestion {
            login: Some("bob@example.com".to_string()),
            secret: seal("other", "ext-pass").unwrap(),
        });

        let credential = resolve_autofill(&payload, "ext-pass").unwrap().unwrap();
        assert_eq!(credential.login.as_deref(), Some("alice@example.com"));
        assert_eq!(credential.password.as_str(), "s3cr3t");
    }

    #[test]
    fn test_no_exact_match() {
        let payload = SuggestionPayload {
            domain: Some("example.com".to_string()),
            exact: Vec::new(),
            near: vec![Suggestion {
                login: None,
                secret: seal("near", "ext-pass").unwrap(),
            }],
        };
        assert!(resolve_autofill(&payload, "ext-pass").unwrap().is_none());
    }

    #[test]
    fn test_wrong_passphrase_fills_nothing() {
        let payload = payload_with(None, seal("s3cr3t", "ext-pass").unwrap());
        let err = resolve_autofill(&payload, "not-it").expect_err("must not resolve");
        assert_eq!(err.kind, Some(ErrorKind::Decryption));
    }

    #[test]
    fn test_payload_ignores_extra_fields() {
        let payload: SuggestionPayload = serde_json::from_str(
            r#"{
                "domain": "example.com",
                "exact": [{
                    "id": "65f0c0ffee",
                    "label": "Example",
                    "login": "alice@example.com",
                    "salt": "c2FsdA==",
                    "iv": "aXY=",
                    "ciphertext": "Y3Q="
                }]
            }"#,
        )
        .unwrap();

        assert!(payload.near.is_empty());
        assert_eq!(payload.exact[0].login.as_deref(), Some("alice@example.com"));
        assert_eq!(payload.exact[0].secret.ciphertext, "Y3Q=");
    }

    #[test]
    fn test_debug_redacts_password() {
        let credential = AutofillCredential {
            login: Some("alice".to_string()),
            password: Zeroizing::new("hunter2".to_string()),
        };
        let debug = format!("{:?}", credential);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("alice"));
    }
}
