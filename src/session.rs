//! Bundle sessions and their wallets
//!
//! A session owns a fixed set of wallets created in bulk and a status that
//! only the bundle engine moves. The store is in-memory; every mutation of
//! a session happens under its map entry lock.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::wallet::{Address, Keypair};

/// Execution status, ordered left to right
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Created,
    Funded,
    Buying,
    Bought,
    Selling,
    Sold,
}

impl SessionStatus {
    /// Forward moves (or staying put) are always allowed; repeated cycles
    /// may step back from `bought` to `buying` and from `sold` to `selling`
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        next >= self
            || matches!(
                (self, next),
                (SessionStatus::Bought, SessionStatus::Buying)
                    | (SessionStatus::Sold, SessionStatus::Selling)
            )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Created => "created",
            SessionStatus::Funded => "funded",
            SessionStatus::Buying => "buying",
            SessionStatus::Bought => "bought",
            SessionStatus::Selling => "selling",
            SessionStatus::Sold => "sold",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },
}

/// One generated wallet, owned by exactly one session
#[derive(Clone)]
pub struct WalletRecord {
    pub index: usize,
    keypair: Keypair,
}

impl WalletRecord {
    pub fn new(index: usize, keypair: Keypair) -> Self {
        Self { index, keypair }
    }

    pub fn public_key(&self) -> Address {
        self.keypair.address()
    }

    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl fmt::Debug for WalletRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletRecord")
            .field("index", &self.index)
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub target_asset: Option<Address>,
    pub funding_wallet: Option<Address>,
    /// Never mutated after creation
    pub wallets: Arc<Vec<WalletRecord>>,
}

impl Session {
    pub fn new(wallets: Vec<WalletRecord>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            status: SessionStatus::Created,
            target_asset: None,
            funding_wallet: None,
            wallets: Arc::new(wallets),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            created_at: self.created_at,
            status: self.status,
            target_asset: self.target_asset,
            funding_wallet: self.funding_wallet,
            wallets: self
                .wallets
                .iter()
                .map(|w| WalletSummary {
                    index: w.index,
                    public_key: w.public_key(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub index: usize,
    pub public_key: Address,
}

/// Read-only view of a session, free of secret material
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub target_asset: Option<Address>,
    pub funding_wallet: Option<Address>,
    pub wallets: Vec<WalletSummary>,
}

/// In-memory session registry
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<Uuid, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) -> Uuid {
        let id = session.id;
        self.sessions.insert(id, session);
        id
    }

    pub fn wallets(&self, id: &Uuid) -> Result<Arc<Vec<WalletRecord>>, SessionError> {
        self.sessions
            .get(id)
            .map(|s| Arc::clone(&s.wallets))
            .ok_or(SessionError::NotFound(*id))
    }

    pub fn status(&self, id: &Uuid) -> Result<SessionStatus, SessionError> {
        self.sessions
            .get(id)
            .map(|s| s.status)
            .ok_or(SessionError::NotFound(*id))
    }

    pub fn target_asset(&self, id: &Uuid) -> Result<Option<Address>, SessionError> {
        self.sessions
            .get(id)
            .map(|s| s.target_asset)
            .ok_or(SessionError::NotFound(*id))
    }

    /// Check-and-set the status under the entry lock
    pub fn transition(&self, id: &Uuid, next: SessionStatus) -> Result<SessionStatus, SessionError> {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or(SessionError::NotFound(*id))?;

        let current = session.status;
        if !current.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                from: current,
                to: next,
            });
        }
        session.status = next;
        Ok(current)
    }

    /// Apply `f` to the session under its entry lock
    pub fn update<F>(&self, id: &Uuid, f: F) -> Result<(), SessionError>
    where
        F: FnOnce(&mut Session),
    {
        let mut session = self
            .sessions
            .get_mut(id)
            .ok_or(SessionError::NotFound(*id))?;
        f(&mut session);
        Ok(())
    }

    pub fn snapshot(&self, id: &Uuid) -> Result<SessionSnapshot, SessionError> {
        self.sessions
            .get(id)
            .map(|s| s.snapshot())
            .ok_or(SessionError::NotFound(*id))
    }

    /// Newest first, at most `limit` entries
    pub fn list(&self, limit: usize) -> Vec<SessionSnapshot> {
        let mut snapshots: Vec<SessionSnapshot> =
            self.sessions.iter().map(|entry| entry.snapshot()).collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots.truncate(limit);
        snapshots
    }
}
