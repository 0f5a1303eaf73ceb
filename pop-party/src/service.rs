/*!
The context object of a voting service.

A [`VotingService`] owns everything a request handler needs: the signer, the sealed attendee
set, the signing context, the vote ledger and the session registry. Handlers share one
service per process, usually behind an `Arc`; every method takes `&self`.

A client votes in three steps:

1. It asks for a nonce with [`issue_nonce()`](VotingService::issue_nonce()).
2. It signs the nonce bytes as an attendee and calls [`login()`](VotingService::login()),
   which consumes the nonce and returns a session bound to the signature's tag.
3. It calls [`vote()`](VotingService::vote()) and [`tracks()`](VotingService::tracks()) with
   that session as often as it likes.

Logins and votes share the signing context, so an attendee gets the same tag on every login
and keeps a single vote per track. Session bindings live in memory only; after a restart
clients log in again. The saved session registry only keeps a restarted service from issuing
a token twice.

Each tag keeps at most [`SESSIONS_PER_TAG`] live sessions. Logging in again beyond that
retires the oldest one, so the bindings grow with the attendee set and not with the number of
logins.

With files configured, a vote or an issued token is saved before the call returns. A save
that fails undoes the change and reports the error, so a client may simply retry.
*/

use crate::{
    ledger::{ActionLedger, SessionRegistry, Token, TokenKind, TrackId, TrackSummary, VoteLedger},
    settings::Settings,
    statement::FinalStatement,
    Error,
};
use pop_crypto::{AttendeeSet, AttendeeTagSigner, Rng, Signature, Tag};
use std::{
    collections::{HashMap, VecDeque},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};
use tracing::{debug, info};

/// How many sessions one attendee may hold at once.
pub const SESSIONS_PER_TAG: usize = 4;

/// Which tag each live session speaks for.
#[derive(Debug, Default)]
struct Bindings {
    tags: HashMap<Token, Tag>,
    sessions: HashMap<Tag, VecDeque<Token>>,
}

impl Bindings {
    fn bind(&mut self, session: Token, tag: Tag) {
        let held = self.sessions.entry(tag.clone()).or_default();
        held.push_back(session.clone());
        if held.len() > SESSIONS_PER_TAG {
            if let Some(retired) = held.pop_front() {
                let _ = self.tags.remove(&retired);
                debug!("retired the oldest session of a tag");
            }
        }
        let _ = self.tags.insert(session, tag);
    }

    fn tag(&self, session: &Token) -> Option<&Tag> {
        self.tags.get(session)
    }
}

/// Request handling for anonymous track voting.
#[derive(Debug)]
pub struct VotingService<S> {
    signer: S,
    attendees: AttendeeSet,
    context: Vec<u8>,
    ledger: VoteLedger,
    sessions: SessionRegistry,
    bound: Mutex<Bindings>,
    votes_file: Option<PathBuf>,
    sessions_file: Option<PathBuf>,
}

impl<S: AttendeeTagSigner> VotingService<S> {
    /// Serve votes on `ledger` from the attendees of `statement`, which must be sealed.
    pub fn new(
        signer: S,
        statement: &FinalStatement,
        context: impl Into<Vec<u8>>,
        ledger: VoteLedger,
    ) -> Result<Self, Error> {
        if !statement.is_sealed() {
            return Err(Error::InvalidStatement("the statement is not signed".into()));
        }
        Ok(Self {
            signer,
            attendees: statement.attendees.clone(),
            context: context.into(),
            ledger,
            sessions: SessionRegistry::new(),
            bound: Mutex::default(),
            votes_file: None,
            sessions_file: None,
        })
    }

    /// Save the ledger to `votes_file` and the registry to `sessions_file` after every change.
    pub fn persist_to(mut self, votes_file: PathBuf, sessions_file: PathBuf) -> Self {
        self.votes_file = Some(votes_file);
        self.sessions_file = Some(sessions_file);
        self
    }

    /**
    Build a service from `settings`: the ledger comes from the schedule file, and votes and
    sessions saved by an earlier run are loaded if their files exist.
    */
    pub fn from_settings(
        signer: S,
        statement: &FinalStatement,
        settings: &Settings,
    ) -> Result<Self, Error> {
        let ledger = VoteLedger::from_schedule_file(&settings.schedule_file())?;
        let service = Self::new(signer, statement, settings.vote_context.as_bytes(), ledger)?
            .persist_to(settings.votes_file(), settings.sessions_file());

        if let Some(path) = &service.votes_file {
            load_if_present(&service.ledger, path)?;
        }
        if let Some(path) = &service.sessions_file {
            load_if_present(&service.sessions, path)?;
        }
        Ok(service)
    }

    /// The vote ledger.
    pub fn ledger(&self) -> &VoteLedger {
        &self.ledger
    }

    /// The session registry.
    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    fn save_sessions(&self) -> Result<(), Error> {
        match &self.sessions_file {
            Some(path) => self.sessions.save(path),
            None => Ok(()),
        }
    }

    fn issue(&self, rng: &mut impl Rng, kind: TokenKind) -> Result<Token, Error> {
        match &self.sessions_file {
            Some(path) => self.sessions.issue_persisted(rng, kind, path),
            None => Ok(self.sessions.issue(rng, kind)),
        }
    }

    /// Issue a nonce for a client to sign.
    pub fn issue_nonce(&self, rng: &mut impl Rng) -> Result<Token, Error> {
        self.issue(rng, TokenKind::Nonce)
    }

    /**
    Exchange a signed nonce for a session.

    The nonce is consumed before the signature is checked, so it cannot be retried. Fails with
    [`Error::UnknownNonce`] for a nonce that is not outstanding and with
    [`Error::SignatureRejected`] if `signature` is not an attendee's signature over the nonce.
    */
    pub fn login(
        &self,
        rng: &mut impl Rng,
        nonce: &Token,
        signature: &Signature,
    ) -> Result<Token, Error> {
        self.sessions.consume_nonce(nonce)?;
        let (tag, verification) =
            self.signer
                .verify(&self.attendees, &self.context, nonce.as_bytes(), signature);
        if !verification.is_verified() {
            self.save_sessions()?;
            return Err(Error::SignatureRejected);
        }

        let session = self.issue(rng, TokenKind::Session)?;
        self.bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .bind(session.clone(), tag);
        info!("attendee logged in");
        Ok(session)
    }

    fn tag_of(&self, session: &Token) -> Result<Tag, Error> {
        self.bound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .tag(session)
            .cloned()
            .ok_or(Error::UnknownSession)
    }

    /// Cast or flip the vote of the attendee behind `session` on `track`.
    pub fn vote(&self, session: &Token, track: TrackId, up: bool) -> Result<(), Error> {
        let tag = self.tag_of(session)?;
        match &self.votes_file {
            Some(path) => self.ledger.record_vote_persisted(track, &tag, up, path),
            None => self.ledger.record_vote(track, &tag, up),
        }
    }

    /// Every track with its tallies, as seen by the attendee behind `session`.
    pub fn tracks(&self, session: &Token) -> Result<Vec<TrackSummary>, Error> {
        let tag = self.tag_of(session)?;
        Ok(self.ledger.snapshot(&tag))
    }
}

fn load_if_present<L: ActionLedger>(ledger: &L, path: &Path) -> Result<(), Error> {
    match ledger.load(path) {
        Err(Error::Persist(e)) if e.is_not_found() => {
            debug!(path = %path.display(), "nothing saved yet");
            Ok(())
        }
        other => other,
    }
}
