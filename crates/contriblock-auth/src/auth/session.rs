/*
[INPUT]:  Issued session tokens and the wallet they belong to
[OUTPUT]: Session save/load/clear for the bearer credential
[POS]:    Auth layer - session lifecycle storage
[UPDATE]: When adding store backends or changing what a session carries
*/

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::wallet::normalize_address;
use crate::http::Result;

/// Authenticated session created by a successful verification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Lowercase, 0x-prefixed
    pub wallet_address: String,
    pub session_token: String,
    pub issued_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        wallet_address: &str,
        session_token: impl Into<String>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            wallet_address: normalize_address(wallet_address),
            session_token: session_token.into(),
            issued_at,
        }
    }
}

/// Persistence for the single current session
///
/// Every outgoing API request reads the token from here, and every 401
/// clears it.
pub trait SessionStore: Send + Sync + fmt::Debug {
    fn save(&self, session: &Session) -> Result<()>;

    fn load(&self) -> Option<Session>;

    fn clear(&self) -> Result<()>;

    fn load_token(&self) -> Option<String> {
        self.load().map(|session| session.session_token)
    }
}

/// Thread-safe in-process session store
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    data: Arc<RwLock<Option<Session>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `session`
    pub fn with_session(session: Session) -> Self {
        Self {
            data: Arc::new(RwLock::new(Some(session))),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn save(&self, session: &Session) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(session.clone());
        Ok(())
    }

    fn load(&self) -> Option<Session> {
        let guard = self.data.read().unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        *guard = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new("0xABCdef", "test_token", Utc::now())
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = MemorySessionStore::new();
        assert!(store.load().is_none());
        assert!(store.load_token().is_none());
    }

    #[test]
    fn test_save_and_load_session() {
        let store = MemorySessionStore::new();
        store.save(&session()).unwrap();

        assert_eq!(store.load_token(), Some("test_token".to_string()));
        assert_eq!(store.load().unwrap().wallet_address, "0xabcdef");
    }

    #[test]
    fn test_clear_session() {
        let store = MemorySessionStore::with_session(session());
        let shared = store.clone();

        shared.clear().unwrap();
        assert!(store.load().is_none());
    }
}
