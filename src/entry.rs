//! Vault entry payloads and the seal/reveal calls made around them
//!
//! These types mirror the JSON exchanged with the vault REST API
//! (`POST /api/vault/`, `PUT /api/vault/{id}`, `GET /api/vault/`). Only the
//! password is sealed; label, login and url travel in the clear.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{ErrorCategory, ErrorKind, Result, VaultError};
use crate::passphrase::PassphraseSession;
use crate::secretcrypt::{self, SealedSecret};

/// The unencrypted part of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMetadata {
    pub label: String,
    pub login: Option<String>,
    pub url: Option<String>,
}

impl EntryMetadata {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    pub fn login(mut self, login: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Body of `POST /api/vault/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntryRequest {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub secret: SealedSecret,
}

impl NewEntryRequest {
    /// Seal `password` under the session passphrase and build the request.
    ///
    /// Prompts for the passphrase if the session has none cached yet.
    pub fn seal(
        metadata: EntryMetadata,
        password: &str,
        session: &PassphraseSession,
    ) -> Result<Self> {
        if metadata.label.trim().is_empty() {
            return Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::RecordFormat,
                "entry label must not be blank",
            ));
        }

        let passphrase = session.passphrase()?;
        let secret = secretcrypt::seal(password, &passphrase)?;
        Ok(Self {
            label: metadata.label,
            login: metadata.login,
            url: metadata.url,
            secret,
        })
    }
}

/// Body of `PUT /api/vault/{id}`.
///
/// Absent fields are left unchanged by the backend. The sealed fields are
/// either all present (a new password, sealed with a fresh salt and iv) or
/// all absent (keep the stored secret); a partial triple fails to
/// deserialize.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "UpdateEntryWire")]
pub struct UpdateEntryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub secret: Option<SealedSecret>,
}

impl UpdateEntryRequest {
    pub fn new(metadata: EntryMetadata) -> Self {
        Self {
            label: Some(metadata.label),
            login: metadata.login,
            url: metadata.url,
            secret: None,
        }
    }

    /// Replace the stored password.
    ///
    /// A blank `new_password` keeps the current secret and does not touch
    /// the session. Anything else is sealed into a whole new triple.
    pub fn with_new_password(
        mut self,
        new_password: &str,
        session: &PassphraseSession,
    ) -> Result<Self> {
        if new_password.trim().is_empty() {
            return Ok(self);
        }

        let passphrase = session.passphrase()?;
        self.secret = Some(secretcrypt::seal(new_password, &passphrase)?);
        Ok(self)
    }
}

#[derive(Deserialize)]
struct UpdateEntryWire {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    salt: Option<String>,
    #[serde(default)]
    iv: Option<String>,
    #[serde(default)]
    ciphertext: Option<String>,
}

impl TryFrom<UpdateEntryWire> for UpdateEntryRequest {
    type Error = VaultError;

    fn try_from(wire: UpdateEntryWire) -> Result<Self> {
        let secret = match (wire.salt, wire.iv, wire.ciphertext) {
            (Some(salt), Some(iv), Some(ciphertext)) => Some(SealedSecret {
                salt,
                iv,
                ciphertext,
            }),
            (None, None, None) => None,
            _ => {
                return Err(VaultError::with_kind(
                    ErrorCategory::User,
                    ErrorKind::RecordFormat,
                    "update must carry all of salt, iv and ciphertext or none of them",
                ));
            }
        };

        Ok(Self {
            label: wire.label,
            login: wire.login,
            url: wire.url,
            secret,
        })
    }
}

/// One entry as returned by `GET /api/vault/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEntry {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub favicon_url: Option<String>,
    #[serde(default)]
    pub salt: Option<String>,
    #[serde(default)]
    pub iv: Option<String>,
    #[serde(default)]
    pub ciphertext: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl StoredEntry {
    /// The sealed triple of this entry, if the backend returned all of it.
    pub fn sealed_secret(&self) -> Result<SealedSecret> {
        match (&self.salt, &self.iv, &self.ciphertext) {
            (Some(salt), Some(iv), Some(ciphertext)) => Ok(SealedSecret {
                salt: salt.clone(),
                iv: iv.clone(),
                ciphertext: ciphertext.clone(),
            }),
            _ => Err(VaultError::with_kind(
                ErrorCategory::User,
                ErrorKind::RecordFormat,
                format!("entry {} is missing salt, iv or ciphertext", self.id),
            )),
        }
    }

    /// Open the stored password, e.g. for copying to the clipboard.
    pub fn reveal(&self, session: &PassphraseSession) -> Result<Zeroizing<String>> {
        let secret = self.sealed_secret()?;
        let passphrase = session.passphrase()?;
        secret
            .open(&passphrase)
            .map_err(|e| e.with_context(format!("failed to reveal entry {}", self.id)))
    }
}

/// Response of `GET /api/vault/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultListing {
    #[serde(default)]
    pub entries: Vec<StoredEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passphrase::ConstantPassphraseReader;

    fn session(passphrase: &str) -> PassphraseSession {
        PassphraseSession::new(Box::new(ConstantPassphraseReader::new(passphrase)))
    }

    fn stored_from(id: &str, request: &NewEntryRequest) -> StoredEntry {
        StoredEntry {
            id: id.to_string(),
            label: Some(request.label.clone()),
            login: request.login.clone(),
            url: request.url.clone(),
            salt: Some(request.secret.salt.clone()),
            iv: Some(request.secret.iv.clone()),
            ciphertext: Some(request.secret.ciphertext.clone()),
            ..StoredEntry::default()
        }
    }

    #[test]
    fn test_add_then_reveal() {
        let session = session("vault-pass-1");
        let metadata = EntryMetadata::new("Example")
            .login("alice@example.com")
            .url("https://example.com");
        let request =
            NewEntryRequest::seal(metadata, "CorrectHorseBatteryStaple", &session).unwrap();
        assert_eq!(request.label, "Example");

        let stored = stored_from("abc123", &request);
        assert_eq!(
            stored.reveal(&session).unwrap().as_str(),
            "CorrectHorseBatteryStaple"
        );
    }

    #[test]
    fn test_reveal_with_wrong_passphrase() {
        let request = NewEntryRequest::seal(
            EntryMetadata::new("Example"),
            "CorrectHorseBatteryStaple",
            &session("vault-pass-1"),
        )
        .unwrap();
        let stored = stored_from("abc123", &request);

        let err = stored
            .reveal(&session("vault-pass-2"))
            .expect_err("wrong passphrase must not reveal");
        assert_eq!(err.kind, Some(ErrorKind::Decryption));
        assert_eq!(err.to_string(), "failed to reveal entry abc123");
    }

    #[test]
    fn test_blank_label_rejected() {
        let err = NewEntryRequest::seal(EntryMetadata::new("  "), "pw", &session("p"))
            .expect_err("blank label must be rejected");
        assert_eq!(err.kind, Some(ErrorKind::RecordFormat));
    }

    #[test]
    fn test_new_entry_json_shape() {
        let request = NewEntryRequest {
            label: "Example".to_string(),
            login: Some("alice".to_string()),
            url: None,
            secret: SealedSecret {
                salt: "c2FsdA==".to_string(),
                iv: "aXY=".to_string(),
                ciphertext: "Y3Q=".to_string(),
            },
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "label": "Example",
                "login": "alice",
                "salt": "c2FsdA==",
                "iv": "aXY=",
                "ciphertext": "Y3Q=",
            })
        );
    }

    #[test]
    fn test_update_with_blank_password_keeps_secret() {
        struct NeverPrompt;

        impl crate::passphrase::PassphraseReader for NeverPrompt {
            fn read_passphrase(&mut self) -> Result<Zeroizing<String>> {
                panic!("blank password must not prompt");
            }
        }

        let session = PassphraseSession::new(Box::new(NeverPrompt));
        let update = UpdateEntryRequest::new(EntryMetadata::new("Renamed"))
            .with_new_password("   ", &session)
            .unwrap();

        assert_eq!(update.secret, None);
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            serde_json::json!({ "label": "Renamed" })
        );
    }

    #[test]
    fn test_update_with_new_password_replaces_triple() {
        let session = session("vault-pass-1");
        let original =
            NewEntryRequest::seal(EntryMetadata::new("Example"), "old-password", &session)
                .unwrap();

        let update = UpdateEntryRequest::new(EntryMetadata::new("Example"))
            .with_new_password("new-password", &session)
            .unwrap();
        let secret = update.secret.clone().expect("new password must be sealed");

        assert_ne!(secret.salt, original.secret.salt);
        assert_ne!(secret.iv, original.secret.iv);
        assert_eq!(secret.open("vault-pass-1").unwrap().as_str(), "new-password");

        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["salt"], secret.salt.as_str());
        assert_eq!(json["iv"], secret.iv.as_str());
        assert_eq!(json["ciphertext"], secret.ciphertext.as_str());
    }

    #[test]
    fn test_update_deserializes_optional_triple() {
        let without: UpdateEntryRequest =
            serde_json::from_str(r#"{"label":"Example"}"#).unwrap();
        assert_eq!(without.secret, None);

        let with: UpdateEntryRequest =
            serde_json::from_str(r#"{"salt":"c2FsdA==","iv":"aXY=","ciphertext":"Y3Q="}"#)
                .unwrap();
        assert_eq!(with.secret.unwrap().ciphertext, "Y3Q=");
    }

    #[test]
    fn test_update_partial_triple_rejected() {
        for body in [
            r#"{"label":"x","salt":"c2FsdA==","ciphertext":"Y3Q="}"#,
            r#"{"label":"x","iv":"aXY="}"#,
            r#"{"salt":"c2FsdA==","iv":"aXY="}"#,
        ] {
            let err = serde_json::from_str::<UpdateEntryRequest>(body)
                .expect_err("partial triple must not deserialize");
            assert!(
                err.to_string().contains("all of salt, iv and ciphertext"),
                "{}: {}",
                body,
                err
            );
        }

        let err = UpdateEntryRequest::try_from(UpdateEntryWire {
            label: Some("x".to_string()),
            login: None,
            url: None,
            salt: Some("c2FsdA==".to_string()),
            iv: None,
            ciphertext: Some("Y3Q=".to_string()),
        })
        .expect_err("partial triple must be rejected");
        assert_eq!(err.kind, Some(ErrorKind::RecordFormat));
    }

    #[test]
    fn test_listing_deserializes_backend_shape() {
        let listing: VaultListing = serde_json::from_str(
            r#"{
                "entries": [{
                    "id": "65f0c0ffee",
                    "label": "Example",
                    "login": "alice@example.com",
                    "url": "https://example.com",
                    "domain": "example.com",
                    "faviconUrl": "https://icons.example/example.com.ico",
                    "salt": "c2FsdA==",
                    "iv": "aXY=",
                    "ciphertext": "Y3Q=",
                    "createdAt": "2025-01-01T00:00:00Z",
                    "updatedAt": null
                }]
            }"#,
        )
        .unwrap();

        let entry = &listing.entries[0];
        assert_eq!(entry.domain.as_deref(), Some("example.com"));
        assert_eq!(
            entry.favicon_url.as_deref(),
            Some("https://icons.example/example.com.ico")
        );
        assert_eq!(entry.updated_at, None);
        assert_eq!(entry.sealed_secret().unwrap().iv, "aXY=");
    }

    #[test]
    fn test_entry_without_triple_cannot_be_revealed() {
        let entry = StoredEntry {
            id: "abc123".to_string(),
            salt: Some("c2FsdA==".to_string()),
            ..StoredEntry::default()
        };
        let err = entry
            .reveal(&session("p"))
            .expect_err("partial triple must not be opened");
        assert_eq!(err.kind, Some(ErrorKind::RecordFormat));
    }
}
