//! Presence-only registry of issued sessions and nonces.
//!
//! A nonce is handed to a client, signed by an attendee, and consumed exactly once; consuming
//! removes it, so a signed nonce cannot be replayed. Sessions are only ever added.
//!
//! Persisting the sessions only keeps a restarted service from handing out a token twice. The
//! registry does not know which attendee a session belongs to, so it cannot bring a session
//! back to life on its own.
//!
//! The registry file is `{ "Sessions": [<base64>...], "Nonces": [<base64>...] }`.

use super::ActionLedger;
use crate::{persist, Error};
use pop_crypto::{base64_bytes, Rng};
use serde::*;
use std::{
    collections::BTreeSet,
    fmt,
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};
use tracing::{debug, warn};

/// Length in bytes of a freshly issued token.
pub const TOKEN_LEN: usize = 32;

/// An opaque session or nonce value.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(#[serde(with = "base64_bytes")] Vec<u8>);

impl Token {
    /// Wrap raw token bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Token(bytes.into())
    }

    fn random(rng: &mut impl Rng) -> Self {
        let mut bytes = vec![0; TOKEN_LEN];
        rng.fill_bytes(&mut bytes);
        Token(bytes)
    }

    /// The raw token bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encode as standard base64 text.
    pub fn to_base64(&self) -> String {
        base64::encode(&self.0)
    }

    /// Decode from standard base64 text.
    pub fn from_base64(text: &str) -> Result<Self, Error> {
        base64::decode(text.trim())
            .map(Token)
            .map_err(|e| Error::Parse {
                what: "token",
                reason: e.to_string(),
            })
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.to_base64())
    }
}

/// Which set of the registry a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// An established session.
    Session,
    /// An outstanding nonce.
    Nonce,
}

/// The persisted form of a [`SessionRegistry`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SessionStore {
    /// Established sessions, in byte order.
    #[serde(default)]
    pub sessions: Vec<Token>,
    /// Outstanding nonces, in byte order.
    #[serde(default)]
    pub nonces: Vec<Token>,
}

#[derive(Debug, Default)]
struct Sets {
    sessions: BTreeSet<Token>,
    nonces: BTreeSet<Token>,
}

impl Sets {
    fn store(&self) -> SessionStore {
        SessionStore {
            sessions: self.sessions.iter().cloned().collect(),
            nonces: self.nonces.iter().cloned().collect(),
        }
    }

    fn write(&self, path: &Path) -> Result<(), Error> {
        persist::save_json(path, &self.store())?;
        Ok(())
    }

    fn issue(&mut self, rng: &mut impl Rng, kind: TokenKind) -> Token {
        let set = self.get_mut(kind);
        loop {
            let token = Token::random(rng);
            if set.insert(token.clone()) {
                debug!(?kind, "issued token");
                return token;
            }
        }
    }

    fn get_mut(&mut self, kind: TokenKind) -> &mut BTreeSet<Token> {
        match kind {
            TokenKind::Session => &mut self.sessions,
            TokenKind::Nonce => &mut self.nonces,
        }
    }
}

/// Registry of issued sessions and outstanding nonces.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sets: Mutex<Sets>,
}

impl SessionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Sets> {
        self.sets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a fresh token of `kind` and register it.
    pub fn issue(&self, rng: &mut impl Rng, kind: TokenKind) -> Token {
        self.lock().issue(rng, kind)
    }

    /**
    Issue a fresh token of `kind` and save the registry to `path` before releasing the lock.

    If the save fails the token is withdrawn, so it is never handed out without being on disk.
    */
    pub fn issue_persisted(
        &self,
        rng: &mut impl Rng,
        kind: TokenKind,
        path: &Path,
    ) -> Result<Token, Error> {
        let mut sets = self.lock();
        let token = sets.issue(rng, kind);
        if let Err(e) = sets.write(path) {
            let _ = sets.get_mut(kind).remove(&token);
            warn!(?kind, "withdrew a token that could not be saved");
            return Err(e);
        }
        Ok(token)
    }

    /// Issue a fresh nonce and register it as outstanding.
    pub fn issue_nonce(&self, rng: &mut impl Rng) -> Token {
        self.issue(rng, TokenKind::Nonce)
    }

    /// Issue a fresh session and register it.
    pub fn issue_session(&self, rng: &mut impl Rng) -> Token {
        self.issue(rng, TokenKind::Session)
    }

    /// Consume an outstanding nonce. Fails with [`Error::UnknownNonce`] if it was never issued
    /// or was already consumed.
    pub fn consume_nonce(&self, nonce: &Token) -> Result<(), Error> {
        if self.lock().nonces.remove(nonce) {
            Ok(())
        } else {
            Err(Error::UnknownNonce)
        }
    }

    /// Whether `session` has been issued.
    pub fn has_session(&self, session: &Token) -> bool {
        self.lock().sessions.contains(session)
    }

    /// Both sets, each in byte order.
    pub fn snapshot(&self) -> SessionStore {
        self.lock().store()
    }
}

impl ActionLedger for SessionRegistry {
    type Key = Token;
    type Action = TokenKind;

    /// Register an externally produced token. Fails with [`Error::AlreadyRecorded`] if it is
    /// already present.
    fn record(&self, token: Token, kind: TokenKind) -> Result<(), Error> {
        if self.lock().get_mut(kind).insert(token) {
            Ok(())
        } else {
            Err(Error::AlreadyRecorded)
        }
    }

    fn save(&self, path: &Path) -> Result<(), Error> {
        self.lock().write(path)
    }

    fn load(&self, path: &Path) -> Result<(), Error> {
        let mut sets = self.lock();
        let store: SessionStore = persist::load_json(path)?;
        *sets = Sets {
            sessions: store.sessions.into_iter().collect(),
            nonces: store.nonces.into_iter().collect(),
        };
        Ok(())
    }
}
