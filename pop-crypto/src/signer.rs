/*!
The anonymous-signature capability as consumed by the rest of the system.

[`AttendeeTagSigner`] is the seam between the ledgers and the cryptography: ledgers only ever
see opaque [`Tag`]s, and services only ever hold some `S: AttendeeTagSigner`. The production
implementation, [`LinkableRingSigner`], is backed by [`RingSignature`]; tests may substitute
any deterministic stand-in with the same guarantees.
*/

use crate::{
    base64_bytes,
    common::*,
    keys::SecretKey,
    ring::{AttendeeSet, LinkageTag, RingSignature},
};
use serde::*;
use std::fmt;

/// An opaque linkage tag.
///
/// Equal tags under the same context mean "the same attendee"; nothing else can be learned from
/// a tag.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(#[serde(with = "base64_bytes")] Vec<u8>);

impl Tag {
    /// Wrap raw tag bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Tag(bytes.into())
    }

    /// The raw tag bytes.
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
            .map(Tag)
            .map_err(|_| Error::InvalidEncoding("tag"))
    }
}

impl From<LinkageTag> for Tag {
    fn from(tag: LinkageTag) -> Self {
        Tag(tag.to_bytes().to_vec())
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({})", self.to_base64())
    }
}

/// An opaque encoded signature, as produced by an [`AttendeeTagSigner`].
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(#[serde(with = "base64_bytes")] Vec<u8>);

impl Signature {
    /// Wrap raw signature bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Signature(bytes.into())
    }

    /// The raw signature bytes.
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
            .map(Signature)
            .map_err(|_| Error::InvalidEncoding("signature"))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({} bytes)", self.0.len())
    }
}

/**
Sign and verify on behalf of an anonymous member of an attendee set.

Implementations must uphold the following:

- Signing twice with the same attendee set, context, index and key yields the same [`Tag`],
  whatever the messages; signing with a different index yields a different tag.
- [`verify`](AttendeeTagSigner::verify) succeeds iff the signature was produced by
  [`sign`](AttendeeTagSigner::sign) over the same attendee set, context and message, and it
  reveals nothing about the index.
- Malformed signatures fail verification; they never panic.
- Both operations are pure and safe to call concurrently.
*/
pub trait AttendeeTagSigner: Send + Sync {
    /// Sign `message` under `context` as the attendee at `index`.
    fn sign(
        &self,
        rng: &mut impl Rng,
        attendees: &AttendeeSet,
        context: &[u8],
        message: &[u8],
        index: usize,
        key: &SecretKey,
    ) -> Result<(Signature, Tag), Error>;

    /// Recover the tag of `signature` and check it against the attendee set, context and
    /// message. The returned tag must only be trusted when the result is
    /// [`Verification::Verified`]; for unparsable signatures it is empty.
    fn verify(
        &self,
        attendees: &AttendeeSet,
        context: &[u8],
        message: &[u8],
        signature: &Signature,
    ) -> (Tag, Verification);
}

/// The [`AttendeeTagSigner`] backed by linkable ring signatures over BLS12-381.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkableRingSigner;

impl AttendeeTagSigner for LinkableRingSigner {
    fn sign(
        &self,
        rng: &mut impl Rng,
        attendees: &AttendeeSet,
        context: &[u8],
        message: &[u8],
        index: usize,
        key: &SecretKey,
    ) -> Result<(Signature, Tag), Error> {
        let sig = RingSignature::sign(rng, attendees, context, message, index, key)?;
        Ok((Signature(sig.to_bytes()), Tag::from(*sig.tag())))
    }

    fn verify(
        &self,
        attendees: &AttendeeSet,
        context: &[u8],
        message: &[u8],
        signature: &Signature,
    ) -> (Tag, Verification) {
        match RingSignature::from_bytes(signature.as_bytes()) {
            Some(sig) => (
                Tag::from(*sig.tag()),
                sig.verify(attendees, context, message),
            ),
            None => (Tag::default(), Verification::Failed),
        }
    }
}
