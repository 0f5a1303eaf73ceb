/*!
This crate runs proof-of-personhood parties on top of the primitives in `pop-crypto`.

An organizer links to a collective authority, describes the party, collects the attendees'
public keys and has the authority seal a final statement; see [`config`]. Attendees then act
anonymously as members of the sealed attendee set: every signature carries a linkage tag that
is the same for the same attendee within one context. Ledgers keyed by that tag allow each
attendee a single action, whether a vote per track or a login per nonce; see [`ledger`].

A voting service ties the pieces together in [`service::VotingService`].
*/
#![warn(missing_docs)]
#![warn(missing_copy_implementations, missing_debug_implementations)]
#![warn(unused_qualifications, unused_results)]
#![warn(future_incompatible)]
#![warn(unused)]
#![forbid(rustdoc::broken_intra_doc_links)]
pub mod authority;
pub mod config;
pub mod description;
pub mod ledger;
pub mod logging;
pub mod persist;
pub mod service;
pub mod settings;
pub mod statement;

mod error;

pub use authority::{Authority, AuthorityError, LocalAuthority};
pub use config::{Finalization, LinkOutcome, PartyConfig, Stage};
pub use description::{PartyDescription, Roster, ServerIdentity};
pub use error::{Error, ErrorKind, Status};
pub use ledger::{ActionLedger, SessionRegistry, TrackId, VoteLedger};
pub use service::VotingService;
pub use settings::Settings;
pub use statement::FinalStatement;

pub use pop_crypto::{
    AttendeeSet, AttendeeTagSigner, KeyPair, LinkableRingSigner, PublicKey, Rng, SecretKey,
    Signature, Tag, Verification,
};
