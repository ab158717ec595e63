//! Session registry.
//!
//! Maps a client-chosen session identifier to the 256-bit symmetric key
//! negotiated during `auth`. Re-authenticating with an existing identifier
//! replaces its key (last writer wins).
//!
//! Eviction is an explicit policy. With the default policy sessions live
//! until the process exits and the map is unbounded; a TTL and a cap on the
//! number of sessions can each be configured.

use crate::error::{VaultError, VaultResult};
use base64::{engine::general_purpose::STANDARD, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionPolicy {
    /// Sessions older than this are treated as absent and purged.
    pub ttl: Option<Duration>,
    /// When exceeded, the oldest sessions are evicted first.
    pub max_sessions: Option<usize>,
}

impl SessionPolicy {
    pub fn unbounded() -> Self {
        Self::default()
    }
}

/// A 256-bit session key. Zeroed on drop; `Debug` never prints the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey(Zeroizing<[u8; 32]>);

impl SessionKey {
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut *bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(*self.0)
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

struct SessionRecord {
    key: SessionKey,
    issued_at: Instant,
}

impl SessionRecord {
    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.map(|ttl| self.issued_at.elapsed() >= ttl).unwrap_or(false)
    }
}

pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionRecord>>,
    policy: SessionPolicy,
}

impl SessionRegistry {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Generate a fresh key for `session_id`, replacing any previous one.
    pub fn issue(&self, session_id: &str) -> VaultResult<SessionKey> {
        let key = SessionKey::generate();
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| VaultError::Session(format!("lock poisoned: {}", e)))?;

        let ttl = self.policy.ttl;
        sessions.retain(|_, record| !record.is_expired(ttl));
        sessions.insert(
            session_id.to_string(),
            SessionRecord {
                key: key.clone(),
                issued_at: Instant::now(),
            },
        );

        if let Some(max) = self.policy.max_sessions {
            while sessions.len() > max {
                let oldest = sessions
                    .iter()
                    .filter(|(id, _)| id.as_str() != session_id)
                    .min_by_key(|(_, record)| record.issued_at)
                    .map(|(id, _)| id.clone());
                match oldest {
                    Some(id) => {
                        sessions.remove(&id);
                    }
                    None => break,
                }
            }
        }

        Ok(key)
    }

    /// Look up the key for a session, honouring the TTL.
    pub fn get(&self, session_id: &str) -> VaultResult<Option<SessionKey>> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| VaultError::Session(format!("lock poisoned: {}", e)))?;

        let expired = match sessions.get(session_id) {
            None => return Ok(None),
            Some(record) => record.is_expired(self.policy.ttl),
        };
        if expired {
            sessions.remove(session_id);
            return Ok(None);
        }
        Ok(sessions.get(session_id).map(|r| r.key.clone()))
    }

    pub fn contains(&self, session_id: &str) -> VaultResult<bool> {
        Ok(self.get(session_id)?.is_some())
    }

    /// Remove a session. Returns whether it existed.
    pub fn revoke(&self, session_id: &str) -> VaultResult<bool> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| VaultError::Session(format!("lock poisoned: {}", e)))?;
        Ok(sessions.remove(session_id).is_some())
    }

    /// Number of live (unexpired) sessions.
    pub fn active_sessions(&self) -> VaultResult<usize> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|e| VaultError::Session(format!("lock poisoned: {}", e)))?;
        let ttl = self.policy.ttl;
        Ok(sessions.values().filter(|r| !r.is_expired(ttl)).count())
    }

    /// Drop expired sessions. Returns how many were removed.
    pub fn cleanup_expired(&self) -> VaultResult<usize> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|e| VaultError::Session(format!("lock poisoned: {}", e)))?;
        let before = sessions.len();
        let ttl = self.policy.ttl;
        sessions.retain(|_, record| !record.is_expired(ttl));
        Ok(before - sessions.len())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionPolicy::unbounded())
    }
}
