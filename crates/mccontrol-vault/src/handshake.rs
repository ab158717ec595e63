//! Key-exchange protocol.
//!
//! 1. The client fetches the server public key (`CredentialStore::handshake_offer`).
//! 2. It encrypts the shared API key with that key (PKCS#1 v1.5) and sends the
//!    base64 ciphertext with a session identifier of its choosing.
//! 3. `authenticate` decrypts, compares with the stored key in constant time
//!    and, on a match only, issues a fresh 256-bit session key.

use crate::credential::CredentialStore;
use crate::error::{VaultError, VaultResult};
use crate::session::{SessionKey, SessionRegistry};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use tracing::{info, warn};

/// Verify an encrypted API key and register a session for `session_id`.
///
/// Any failure leaves the session registry untouched.
pub fn authenticate(
    store: &CredentialStore,
    sessions: &SessionRegistry,
    encrypted_api_key: &str,
    session_id: &str,
) -> VaultResult<SessionKey> {
    if session_id.trim().is_empty() {
        return Err(VaultError::Malformed("sessionId is required".into()));
    }

    let ciphertext = STANDARD
        .decode(encrypted_api_key.trim())
        .map_err(|_| VaultError::Malformed("apiKey must be base64".into()))?;

    let plaintext = match store.decrypt(&ciphertext) {
        Ok(p) => p,
        Err(e) => {
            warn!(session_id = %session_id, error = %e, "auth rejected: api key did not decrypt");
            return Err(VaultError::Rejected);
        }
    };

    if !store.api_key_matches(&plaintext) {
        warn!(session_id = %session_id, "auth rejected: api key mismatch");
        return Err(VaultError::Rejected);
    }

    let key = sessions.issue(session_id)?;
    info!(session_id = %session_id, "session established");
    Ok(key)
}

/// Client side of step 2: encrypt `api_key` for the server whose
/// base64 SubjectPublicKeyInfo is `public_key_b64`.
pub fn seal_api_key(public_key_b64: &str, api_key: &str) -> VaultResult<String> {
    let der = STANDARD
        .decode(public_key_b64.trim())
        .map_err(|_| VaultError::Malformed("public key must be base64".into()))?;
    let public_key = RsaPublicKey::from_public_key_der(&der)
        .map_err(|e| VaultError::Key(format!("invalid public key: {}", e)))?;
    let ciphertext = public_key
        .encrypt(&mut OsRng, Pkcs1v15Encrypt, api_key.as_bytes())
        .map_err(|e| VaultError::Key(format!("encryption failed: {}", e)))?;
    Ok(STANDARD.encode(ciphertext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::tests::shared_key;

    fn store() -> CredentialStore {
        CredentialStore::from_parts("the-api-key", shared_key()).unwrap()
    }

    #[test]
    fn test_authenticate_success() {
        let store = store();
        let sessions = SessionRegistry::default();
        let sealed = seal_api_key(&store.public_key_base64(), "the-api-key").unwrap();

        let key = authenticate(&store, &sessions, &sealed, "panel").unwrap();
        assert_eq!(sessions.get("panel").unwrap(), Some(key));
    }

    #[test]
    fn test_wrong_key_is_rejected_without_session() {
        let store = store();
        let sessions = SessionRegistry::default();
        let sealed = seal_api_key(&store.public_key_base64(), "not-the-key").unwrap();

        let err = authenticate(&store, &sessions, &sealed, "panel").unwrap_err();
        assert!(matches!(err, VaultError::Rejected));
        assert_eq!(sessions.active_sessions().unwrap(), 0);
    }

    #[test]
    fn test_undecryptable_ciphertext_is_rejected() {
        let store = store();
        let sessions = SessionRegistry::default();
        let junk = STANDARD.encode([7u8; 256]);

        let err = authenticate(&store, &sessions, &junk, "panel").unwrap_err();
        assert!(matches!(err, VaultError::Rejected));
        assert_eq!(sessions.active_sessions().unwrap(), 0);
    }

    #[test]
    fn test_bad_base64_is_malformed() {
        let store = store();
        let sessions = SessionRegistry::default();
        let err = authenticate(&store, &sessions, "%%%", "panel").unwrap_err();
        assert!(matches!(err, VaultError::Malformed(_)));
    }

    #[test]
    fn test_empty_session_id_is_malformed() {
        let store = store();
        let sessions = SessionRegistry::default();
        let sealed = seal_api_key(&store.public_key_base64(), "the-api-key").unwrap();
        let err = authenticate(&store, &sessions, &sealed, "  ").unwrap_err();
        assert!(matches!(err, VaultError::Malformed(_)));
        assert_eq!(sessions.active_sessions().unwrap(), 0);
    }

    #[test]
    fn test_prefix_of_key_is_rejected() {
        let store = store();
        let sessions = SessionRegistry::default();
        let sealed = seal_api_key(&store.public_key_base64(), "the-api").unwrap();
        assert!(authenticate(&store, &sessions, &sealed, "panel").is_err());
    }

    #[test]
    fn test_distinct_sessions_get_distinct_keys() {
        let store = store();
        let sessions = SessionRegistry::default();
        let a = authenticate(
            &store,
            &sessions,
            &seal_api_key(&store.public_key_base64(), "the-api-key").unwrap(),
            "a",
        )
        .unwrap();
        let b = authenticate(
            &store,
            &sessions,
            &seal_api_key(&store.public_key_base64(), "the-api-key").unwrap(),
            "b",
        )
        .unwrap();
        assert_ne!(a, b);
    }
}
