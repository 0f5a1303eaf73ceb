//! Errors returned by party, ledger and service operations.
//!
//! Every variant renders as a single line suitable for a CLI caller. Service callers use
//! [`Error::status`] to pick a client or server error response.

use crate::{authority::AuthorityError, ledger::TrackId, persist::PersistError};
use std::path::PathBuf;
use thiserror::*;

/// Error types that may arise from party, ledger and service operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A vote named a track that is not on the schedule.
    #[error("invalid entry id {0}")]
    UnknownTrack(TrackId),
    /// A tag re-submitted the vote it already has on a track.
    #[error("user already voted the same way on track {0}")]
    DuplicateIdenticalVote(TrackId),
    /// A session or nonce was recorded twice.
    #[error("identifier was already recorded")]
    AlreadyRecorded,
    /// A nonce that was never issued, or was already consumed.
    #[error("unknown or already used nonce")]
    UnknownNonce,
    /// A session that this process never established.
    #[error("unknown session - please log in again")]
    UnknownSession,
    /// A signature over an action did not verify against the attendee set.
    #[error("signature rejected")]
    SignatureRejected,

    /// Describing the party before linking to an authority.
    #[error("no address found - please link first")]
    NoAddress,
    /// Finalizing without a linked authority.
    #[error("not linked")]
    NotLinked,
    /// Adding attendees or finalizing before the party is described.
    #[error("no party description stored - please configure the party first")]
    NoDescription,
    /// A party description whose server roster is empty.
    #[error("empty roster in group definition")]
    EmptyRoster,
    /// Finalizing with an empty attendee set.
    #[error("no attendees stored - first store at least one")]
    NoAttendees,
    /// Adding a public key that is already an attendee.
    #[error("this key already exists")]
    DuplicateKey,
    /// A public key that is not valid base64 of a compressed G1 point.
    #[error("couldn't parse public key: {0}")]
    InvalidPublicKey(String),
    /// Joining a party whose final statement does not list our key.
    #[error("didn't find our public key in the final statement")]
    KeyNotFound,
    /// Signing or verifying without having joined a party.
    #[error("no public key stored - please join a party first")]
    NotAttendee,
    /// An address that does not resolve to a socket address.
    #[error("couldn't resolve address {0}")]
    InvalidAddress(String),
    /// Modifying a party whose statement is already sealed.
    #[error("the party is already finalized")]
    AlreadyFinalized,
    /// A final statement that is unsealed, malformed, or does not match the party.
    #[error("invalid final statement: {0}")]
    InvalidStatement(String),
    /// A party description or settings file that does not parse.
    #[error("couldn't parse {what}: {reason}")]
    Parse {
        /// What was being parsed.
        what: &'static str,
        /// The parser's explanation.
        reason: String,
    },
    /// A lower-level cryptographic failure, such as a signer index out of range.
    #[error(transparent)]
    Crypto(#[from] pop_crypto::Error),

    /// Reading or writing durable storage failed.
    #[error(transparent)]
    Persist(#[from] PersistError),
    /// The stored party configuration is unreadable.
    #[error("couldn't read {} - please remove it", .path.display())]
    CorruptConfig {
        /// The configuration file.
        path: PathBuf,
        /// What went wrong while decoding it.
        #[source]
        source: PersistError,
    },

    /// The collective authority refused or failed a request.
    #[error("authority: {0}")]
    Authority(#[from] AuthorityError),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller asked for something the current state does not allow.
    Precondition,
    /// The request was well-formed but redundant; the system stays usable.
    State,
    /// Durable storage failed.
    Io,
    /// Durable storage holds data that cannot be decoded.
    Corrupt,
    /// The collective authority failed.
    Remote,
}

/// The response class a service should answer an [`Error`] with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// The client should not retry the same request.
    BadRequest,
    /// The server failed; the request may be retried later.
    ServerError,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        use Error::*;
        match self {
            DuplicateIdenticalVote(_) | AlreadyRecorded | AlreadyFinalized => ErrorKind::State,
            Persist(PersistError::Decode { .. }) | CorruptConfig { .. } => ErrorKind::Corrupt,
            Persist(_) => ErrorKind::Io,
            Authority(AuthorityError::WrongPin) => ErrorKind::Precondition,
            Authority(_) => ErrorKind::Remote,
            _ => ErrorKind::Precondition,
        }
    }

    /// The response class for this error.
    pub fn status(&self) -> Status {
        match self.kind() {
            ErrorKind::Precondition | ErrorKind::State => Status::BadRequest,
            ErrorKind::Io | ErrorKind::Corrupt | ErrorKind::Remote => Status::ServerError,
        }
    }
}
