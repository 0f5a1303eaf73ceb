/*!
Ledgers that record at most one action per anonymous linkage tag.

Both ledgers guard their state with a single mutex. Every mutation, snapshot, save and load
takes that lock, so operations are linearized and a save never observes a half-applied
mutation. Persistence goes through [`crate::persist`].

- [`VoteLedger`] keeps one boolean vote per (track, tag) with toggle semantics.
- [`SessionRegistry`] keeps presence-only sets of issued sessions and nonces.
*/

pub mod session;
pub mod vote;

pub use session::{SessionRegistry, SessionStore, Token, TokenKind};
pub use vote::{Track, TrackEntry, TrackSummary, VoteLedger, VoteRecord};

use crate::Error;
use std::path::Path;

/// Identifier of a track on the schedule.
pub type TrackId = i64;

/// A ledger that records one action per key and can be persisted.
pub trait ActionLedger {
    /// What identifies the actor.
    type Key;
    /// What the actor did.
    type Action;

    /// Record `action` for `key`, enforcing the ledger's at-most-once rule.
    fn record(&self, key: Self::Key, action: Self::Action) -> Result<(), Error>;

    /// Write the whole ledger to `path`.
    fn save(&self, path: &Path) -> Result<(), Error>;

    /// Replace the whole ledger with the contents of `path`.
    fn load(&self, path: &Path) -> Result<(), Error>;
}
