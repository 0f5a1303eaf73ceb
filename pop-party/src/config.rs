/*!
The party configuration of one identity, organizer or attendee.

## Organizer

An organizer's configuration moves through the following [`Stage`]s:

- [`New`](Stage::New). A fresh key pair and nothing else; see [`PartyConfig::new()`].
- [`Linked`](Stage::Linked). The organizer links to a collective authority with
  [`link()`](PartyConfig::link()), proving knowledge of the PIN printed in the authority's
  log. Linking with an empty PIN only asks the authority to print one.
- [`DescriptionSet`](Stage::DescriptionSet). The organizer describes the party with
  [`set_description()`](PartyConfig::set_description()), which stores the description with
  the authority and resets the attendee list.
- [`AttendeesCollected`](Stage::AttendeesCollected). The organizer adds public keys, one at a
  time with [`add_attendee()`](PartyConfig::add_attendee()) or as a list with
  [`add_attendees()`](PartyConfig::add_attendees()).
- [`Finalized`](Stage::Finalized). The authority seals the [`FinalStatement`] on
  [`finalize()`](PartyConfig::finalize()). This stage is terminal: finalizing again returns
  the existing statement without asking the authority to sign again, and every mutation fails
  with [`Error::AlreadyFinalized`].

## Attendee

An attendee joins a party with [`join()`](PartyConfig::join()), given the sealed final
statement and their secret key, which resolves their index in the attendee set. From then on
they may [`sign()`](PartyConfig::sign()) and [`verify()`](PartyConfig::verify()) any number of times.

The configuration is stored as one binary file per identity; see
[`PartyConfig::load_or_new()`] and [`PartyConfig::save()`].
*/

use crate::{
    authority::{Authority, AuthorityError},
    description::PartyDescription,
    persist::{self, PersistError},
    statement::FinalStatement,
    Error,
};
use pop_crypto::{
    AttendeeSet, AttendeeTagSigner, KeyPair, PublicKey, Rng, SecretKey, Signature, Tag,
    Verification,
};
use serde::*;
use std::{
    net::{SocketAddr, ToSocketAddrs},
    path::Path,
};
use tracing::{debug, info, warn};

/// Where an organizer's configuration is in the party lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// No authority linked.
    New,
    /// Linked to an authority, no description yet.
    Linked,
    /// Description stored, no attendees yet.
    DescriptionSet,
    /// At least one attendee.
    AttendeesCollected,
    /// Sealed by the authority.
    Finalized,
}

/// The result of [`PartyConfig::link()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The organizer key is pinned with the authority at this address.
    Linked(SocketAddr),
    /// No PIN was given; the authority printed one to its log. The configuration is unchanged.
    PinRequested,
}

/// The result of [`PartyConfig::finalize()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Finalization {
    /// The authority sealed the statement just now.
    Sealed(FinalStatement),
    /// The statement was already sealed; the authority was not contacted.
    AlreadySealed(FinalStatement),
}

impl Finalization {
    /// The sealed statement.
    pub fn statement(&self) -> &FinalStatement {
        match self {
            Finalization::Sealed(fs) | Finalization::AlreadySealed(fs) => fs,
        }
    }
}

/// Keys, authority link and final statement of one identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyConfig {
    key_pair: KeyPair,
    index: Option<usize>,
    address: Option<SocketAddr>,
    final_statement: FinalStatement,
}

impl PartyConfig {
    /// A configuration with a fresh key pair and nothing else.
    pub fn new(rng: &mut impl Rng) -> Self {
        Self {
            key_pair: KeyPair::new(rng),
            index: None,
            address: None,
            final_statement: FinalStatement::default(),
        }
    }

    /// Read the configuration at `path`, or create a fresh one if there is none.
    ///
    /// A file that exists but does not decode is [`Error::CorruptConfig`].
    pub fn load_or_new(path: &Path, rng: &mut impl Rng) -> Result<Self, Error> {
        match persist::load_bincode::<Self>(path) {
            Ok(config) => {
                debug!(path = %path.display(), stage = ?config.stage(), "read config file");
                Ok(config)
            }
            Err(e) if e.is_not_found() => Ok(Self::new(rng)),
            Err(source @ PersistError::Decode { .. }) => Err(Error::CorruptConfig {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the configuration to `path`.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        persist::save_bincode(path, self)?;
        Ok(())
    }

    /// The current lifecycle stage.
    pub fn stage(&self) -> Stage {
        let fs = &self.final_statement;
        if fs.is_sealed() {
            Stage::Finalized
        } else if fs.desc.is_some() && !fs.attendees.is_empty() {
            Stage::AttendeesCollected
        } else if fs.desc.is_some() {
            Stage::DescriptionSet
        } else if self.address.is_some() {
            Stage::Linked
        } else {
            Stage::New
        }
    }

    /// Our public key.
    pub fn public_key(&self) -> &PublicKey {
        self.key_pair.public_key()
    }

    /// Our key pair.
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Our index in the attendee set, once joined.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// The linked authority.
    pub fn address(&self) -> Option<SocketAddr> {
        self.address
    }

    /// The final statement, sealed or in progress.
    pub fn final_statement(&self) -> &FinalStatement {
        &self.final_statement
    }

    fn ensure_open(&self) -> Result<(), Error> {
        if self.final_statement.is_sealed() {
            Err(Error::AlreadyFinalized)
        } else {
            Ok(())
        }
    }

    /**
    Link to the authority at `address` (`host:port`) with `pin`.

    Linking starts the configuration over with a new key pair, which is the key pinned with
    the authority. When `pin` is empty and the authority answers [`AuthorityError::WrongPin`],
    the outcome is [`LinkOutcome::PinRequested`] and nothing changes.
    */
    pub fn link(
        &mut self,
        authority: &impl Authority,
        address: &str,
        pin: &str,
        rng: &mut impl Rng,
    ) -> Result<LinkOutcome, Error> {
        self.ensure_open()?;
        let addr = address
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| Error::InvalidAddress(address.to_string()))?;

        let fresh = Self::new(rng);
        match authority.pin(&addr, pin, fresh.public_key()) {
            Ok(()) => {
                *self = Self {
                    address: Some(addr),
                    ..fresh
                };
                info!(address = %addr, "successfully linked");
                Ok(LinkOutcome::Linked(addr))
            }
            Err(AuthorityError::WrongPin) if pin.is_empty() => {
                info!(address = %addr, "please read the PIN in the server log");
                Ok(LinkOutcome::PinRequested)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Store `desc` with the linked authority and start a new attendee list. Returns the
    /// description hash.
    pub fn set_description(
        &mut self,
        authority: &impl Authority,
        desc: PartyDescription,
    ) -> Result<[u8; 32], Error> {
        self.ensure_open()?;
        let addr = self.address.ok_or(Error::NoAddress)?;
        if desc.roster.is_empty() {
            return Err(Error::EmptyRoster);
        }

        authority.store_config(&addr, &desc)?;
        info!(hash = %desc.hash_base64(), "stored party description");
        let hash = desc.hash();
        self.final_statement = FinalStatement::new(desc);
        Ok(hash)
    }

    fn open_attendees(&self) -> Result<&AttendeeSet, Error> {
        self.ensure_open()?;
        match self.final_statement.desc {
            Some(_) => Ok(&self.final_statement.attendees),
            None => Err(Error::NoDescription),
        }
    }

    /// Append one attendee and return their index.
    pub fn add_attendee(&mut self, key: PublicKey) -> Result<usize, Error> {
        let _ = self.open_attendees()?;
        let index = self
            .final_statement
            .attendees
            .push(key)
            .map_err(|_| Error::DuplicateKey)?;
        info!(%key, index, "added attendee");
        Ok(index)
    }

    /**
    Append every key of a loosely formatted list and return how many were added.

    Keys are base64 and separated by commas; quotes, brackets and backslashes are ignored, so
    both `a,b` and `["a","b"]` are accepted. Either every key is added or none is: a key that
    does not parse is [`Error::InvalidPublicKey`], and a key that is already an attendee or
    repeats within the list is [`Error::DuplicateKey`].
    */
    pub fn add_attendees(&mut self, list: &str) -> Result<usize, Error> {
        let mut attendees = self.open_attendees()?.clone();
        let keys = parse_key_list(list)?;
        for key in &keys {
            let _ = attendees.push(*key).map_err(|_| Error::DuplicateKey)?;
        }
        self.final_statement.attendees = attendees;
        info!(added = keys.len(), total = self.final_statement.attendees.len(), "added attendees");
        Ok(keys.len())
    }

    /**
    Have the authority seal the final statement.

    Fails with [`Error::NoAttendees`] before any attendee is added and with
    [`Error::NotLinked`] without an authority. Once sealed, returns
    [`Finalization::AlreadySealed`] with the stored statement.

    The authority's statement must carry a signature, the stored description and exactly the
    collected attendees, possibly reordered; otherwise it is [`Error::InvalidStatement`].
    */
    pub fn finalize(&mut self, authority: &impl Authority) -> Result<Finalization, Error> {
        if self.final_statement.attendees.is_empty() {
            return Err(Error::NoAttendees);
        }
        let addr = self.address.ok_or(Error::NotLinked)?;
        if self.final_statement.is_sealed() {
            info!("final statement already sealed");
            return Ok(Finalization::AlreadySealed(self.final_statement.clone()));
        }
        let desc = self
            .final_statement
            .desc
            .as_ref()
            .ok_or(Error::NoDescription)?;

        let sealed = authority.finalize(&addr, desc, &self.final_statement.attendees)?;
        if !sealed.is_sealed() {
            return Err(Error::InvalidStatement("the statement is not signed".into()));
        }
        if sealed.desc.as_ref() != Some(desc) {
            return Err(Error::InvalidStatement("the description differs".into()));
        }
        let ours = &self.final_statement.attendees;
        if sealed.attendees.len() != ours.len() || !ours.iter().all(|k| sealed.attendees.contains(k))
        {
            return Err(Error::InvalidStatement("the attendees differ".into()));
        }

        self.index = sealed.attendees.position(self.key_pair.public_key());
        self.final_statement = sealed.clone();
        info!(attendees = sealed.attendees.len(), "created final statement");
        Ok(Finalization::Sealed(sealed))
    }

    /**
    Join the party sealed by `statement` with `secret`, and return our index.

    The statement must be sealed and must list the public key of `secret`; otherwise this
    fails with [`Error::InvalidStatement`] or [`Error::KeyNotFound`] and nothing changes.
    */
    pub fn join(&mut self, statement: FinalStatement, secret: SecretKey) -> Result<usize, Error> {
        if !statement.is_sealed() {
            return Err(Error::InvalidStatement("the statement is not signed".into()));
        }
        let key_pair = KeyPair::from_secret_key(secret);
        let index = statement
            .attendees
            .position(key_pair.public_key())
            .ok_or(Error::KeyNotFound)?;

        info!(index, "found public key");
        self.key_pair = key_pair;
        self.index = Some(index);
        self.final_statement = statement;
        Ok(index)
    }

    fn attendee_index(&self) -> Result<usize, Error> {
        self.index.ok_or(Error::NotAttendee)
    }

    /// Sign `message` under `context` as our attendee index.
    pub fn sign<S: AttendeeTagSigner>(
        &self,
        signer: &S,
        rng: &mut impl Rng,
        message: &[u8],
        context: &[u8],
    ) -> Result<(Signature, Tag), Error> {
        let index = self.attendee_index()?;
        Ok(signer.sign(
            rng,
            &self.final_statement.attendees,
            context,
            message,
            index,
            self.key_pair.secret_key(),
        )?)
    }

    /// Verify `signature` on `message` under `context` and check that it carries `expected`.
    ///
    /// Only a configuration that never joined a party is an error.
    pub fn verify<S: AttendeeTagSigner>(
        &self,
        signer: &S,
        message: &[u8],
        context: &[u8],
        signature: &Signature,
        expected: &Tag,
    ) -> Result<Verification, Error> {
        let _ = self.attendee_index()?;
        let (tag, verification) =
            signer.verify(&self.final_statement.attendees, context, message, signature);
        if !verification.is_verified() {
            warn!("signature did not verify");
            return Ok(Verification::Failed);
        }
        if &tag != expected {
            warn!(expected = %expected.to_base64(), computed = %tag.to_base64(), "tag and computed tag differ");
            return Ok(Verification::Failed);
        }
        info!("successfully verified signature and tag");
        Ok(Verification::Verified)
    }
}

fn parse_key_list(list: &str) -> Result<Vec<PublicKey>, Error> {
    let cleaned: String = list
        .chars()
        .filter(|c| !matches!(c, '"' | '[' | ']' | '\\'))
        .collect();
    let keys = cleaned
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(|k| PublicKey::from_base64(k).map_err(|_| Error::InvalidPublicKey(k.to_string())))
        .collect::<Result<Vec<_>, _>>()?;
    if keys.is_empty() {
        return Err(Error::InvalidPublicKey(list.to_string()));
    }
    Ok(keys)
}
