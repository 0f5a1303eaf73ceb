/*!
The boundary to the collective authority that hosts parties.

Organizers talk to the authority through the [`Authority`] trait: they pin their public key with
a PIN the authority prints to its log, store the party description, and finally ask the
authority to seal the final statement. Calls are blocking and are not retried.

[`LocalAuthority`] implements the trait in-process, for single-host deployments and tests.
*/

use crate::{description::PartyDescription, statement::FinalStatement};
use pop_crypto::{AttendeeSet, KeyPair, PublicKey, Rng};
use std::{
    collections::{HashMap, HashSet},
    convert::TryFrom,
    net::SocketAddr,
    sync::{Mutex, PoisonError},
};
use thiserror::*;
use tracing::{info, warn};

/// Error types that may arise from requests to the collective authority.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// The PIN did not match the one in the authority's log.
    #[error("wrong PIN")]
    WrongPin,
    /// The organizer's key was never pinned.
    #[error("organizer key is not pinned")]
    NotPinned,
    /// Finalizing a description that was never stored.
    #[error("no such party description stored")]
    UnknownDescription,
    /// The authority could not be reached at the given address.
    #[error("unreachable: {0}")]
    Unreachable(String),
    /// The authority refused a malformed request.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// The requests an organizer makes to the collective authority.
pub trait Authority {
    /// Register `organizer` with the authority at `address`.
    fn pin(&self, address: &SocketAddr, pin: &str, organizer: &PublicKey)
        -> Result<(), AuthorityError>;

    /// Store a party description.
    fn store_config(
        &self,
        address: &SocketAddr,
        desc: &PartyDescription,
    ) -> Result<(), AuthorityError>;

    /// Seal the final statement for a stored description and its attendees.
    ///
    /// The authority may reorder the attendees; callers must use the returned set.
    fn finalize(
        &self,
        address: &SocketAddr,
        desc: &PartyDescription,
        attendees: &AttendeeSet,
    ) -> Result<FinalStatement, AuthorityError>;
}

#[derive(Debug, Default)]
struct AuthorityState {
    pinned: HashSet<PublicKey>,
    descriptions: HashMap<[u8; 32], PartyDescription>,
    finals: HashMap<[u8; 32], FinalStatement>,
}

/// An in-process collective authority with a single signing key.
#[derive(Debug)]
pub struct LocalAuthority {
    address: SocketAddr,
    pin: String,
    keys: KeyPair,
    state: Mutex<AuthorityState>,
}

impl LocalAuthority {
    /// Create an authority listening at `address` with a fresh key pair and a random
    /// six-digit PIN, which is written to the log.
    pub fn new(rng: &mut impl Rng, address: SocketAddr) -> Self {
        let pin = format!("{:06}", rng.next_u32() % 1_000_000);
        info!(%address, %pin, "authority PIN");
        Self::with_pin(rng, address, pin)
    }

    /// Create an authority with a known PIN.
    pub fn with_pin(rng: &mut impl Rng, address: SocketAddr, pin: impl Into<String>) -> Self {
        Self {
            address,
            pin: pin.into(),
            keys: KeyPair::new(rng),
            state: Mutex::default(),
        }
    }

    /// The key that seals final statements.
    pub fn public_key(&self) -> &PublicKey {
        self.keys.public_key()
    }

    /// The address the authority answers on.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    fn check_address(&self, address: &SocketAddr) -> Result<(), AuthorityError> {
        if *address == self.address {
            Ok(())
        } else {
            Err(AuthorityError::Unreachable(address.to_string()))
        }
    }
}

impl Authority for LocalAuthority {
    fn pin(
        &self,
        address: &SocketAddr,
        pin: &str,
        organizer: &PublicKey,
    ) -> Result<(), AuthorityError> {
        self.check_address(address)?;
        if pin != self.pin {
            warn!(%organizer, "wrong PIN - read it in the authority log");
            return Err(AuthorityError::WrongPin);
        }
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = state.pinned.insert(*organizer);
        info!(%organizer, "pinned organizer");
        Ok(())
    }

    fn store_config(
        &self,
        address: &SocketAddr,
        desc: &PartyDescription,
    ) -> Result<(), AuthorityError> {
        self.check_address(address)?;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.pinned.is_empty() {
            return Err(AuthorityError::NotPinned);
        }
        let _ = state.descriptions.insert(desc.hash(), desc.clone());
        Ok(())
    }

    fn finalize(
        &self,
        address: &SocketAddr,
        desc: &PartyDescription,
        attendees: &AttendeeSet,
    ) -> Result<FinalStatement, AuthorityError> {
        self.check_address(address)?;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let hash = desc.hash();
        let stored = state
            .descriptions
            .get(&hash)
            .cloned()
            .ok_or(AuthorityError::UnknownDescription)?;
        if let Some(existing) = state.finals.get(&hash) {
            return Ok(existing.clone());
        }

        // Attendees are sealed in byte order, not arrival order.
        let mut keys: Vec<PublicKey> = attendees.iter().copied().collect();
        keys.sort_by_key(|k| k.to_bytes());
        let ordered = AttendeeSet::try_from(keys)
            .map_err(|e| AuthorityError::Rejected(e.to_string()))?;

        let mut statement = FinalStatement {
            desc: Some(stored),
            attendees: ordered,
            signature: None,
        };
        statement.signature = Some(self.keys.sign(&mut rand::thread_rng(), &statement.hash()));
        let _ = state.finals.insert(hash, statement.clone());
        info!(attendees = statement.attendees.len(), "sealed final statement");
        Ok(statement)
    }
}
