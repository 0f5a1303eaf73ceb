/*!
Linkable ring signatures over an ordered attendee set.

A signature proves that its author holds the secret key of *some* member of an
[`AttendeeSet`] without revealing which one. Each signature also carries a [`LinkageTag`],
computed as `x * H(context)` where `x` is the signer's secret key and `H` hashes the context
onto G1. The tag has two properties the rest of the system relies on:

*Linkability*: two signatures by the same attendee under the same context carry the same tag,
whatever messages they sign.

*Context separation*: tags computed under different contexts are unrelated, so an action in
one context (a vote) cannot be linked to an action in another (a login).

The construction follows the LSAG ring (Liu, Wei and Wong, "Linkable Spontaneous Anonymous
Group Signature for Ad Hoc Groups", 2004): starting after the real signer, each member's
challenge is derived from the previous member's response, and the real signer closes the ring
with their secret key.
*/

use crate::{challenge::ChallengeBuilder, common::*, keys::*, SerializeElement};
use serde::*;
use sha3::{Digest, Sha3_384};
use std::{
    convert::{TryFrom, TryInto},
    iter,
};

const LINKAGE_BASE_DOMAIN: &[u8] = b"pop linkage base v1";
/// The effective G1 cofactor `1 - z` for the BLS12-381 parameter `z`.
const G1_COFACTOR: u64 = 0xd201_0000_0001_0001;
const RING_ROUND_DOMAIN: &[u8] = b"pop ring signature round";

const SCALAR_LEN: usize = 32;
const POINT_LEN: usize = 48;

/// An ordered set of attendee public keys.
///
/// The order is significant: a signer is identified by their index into the set. A set never
/// contains the same key twice; this is checked on construction and on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PublicKey>", into = "Vec<PublicKey>")]
pub struct AttendeeSet(Vec<PublicKey>);

impl AttendeeSet {
    /// Create an empty attendee set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a key at the end of the set and return its index.
    ///
    /// Fails with [`Error::DuplicateKey`] if the key is already present.
    pub fn push(&mut self, key: PublicKey) -> Result<usize, Error> {
        if self.contains(&key) {
            return Err(Error::DuplicateKey);
        }
        self.0.push(key);
        Ok(self.0.len() - 1)
    }

    /// The index of `key` in the set, if it is a member.
    pub fn position(&self, key: &PublicKey) -> Option<usize> {
        self.0.iter().position(|k| k == key)
    }

    /// Whether `key` is a member of the set.
    pub fn contains(&self, key: &PublicKey) -> bool {
        self.position(key).is_some()
    }

    /// The key at `index`.
    pub fn get(&self, index: usize) -> Option<&PublicKey> {
        self.0.get(index)
    }

    /// The number of attendees.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set has no attendees.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the keys in order.
    pub fn iter(&self) -> impl Iterator<Item = &PublicKey> {
        self.0.iter()
    }

    /// View the keys as a slice.
    pub fn as_slice(&self) -> &[PublicKey] {
        &self.0
    }
}

impl TryFrom<Vec<PublicKey>> for AttendeeSet {
    type Error = Error;

    fn try_from(keys: Vec<PublicKey>) -> Result<Self, Self::Error> {
        let mut set = AttendeeSet(Vec::with_capacity(keys.len()));
        for key in keys {
            let _ = set.push(key)?;
        }
        Ok(set)
    }
}

impl From<AttendeeSet> for Vec<PublicKey> {
    fn from(set: AttendeeSet) -> Self {
        set.0
    }
}

/// The linkage tag of a ring signature: `x * H(context)` for the signer's secret `x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkageTag(#[serde(with = "SerializeElement")] pub(crate) G1Affine);

impl LinkageTag {
    fn derive(sk: &SecretKey, context: &[u8]) -> Self {
        LinkageTag((linkage_base(context) * sk.to_scalar()).to_affine())
    }

    /// Encode the tag in its 48-byte compressed form.
    pub fn to_bytes(&self) -> [u8; 48] {
        self.0.to_compressed()
    }

    /// Decode a tag from its 48-byte compressed form. The identity is never a valid tag.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes = <[u8; POINT_LEN]>::try_from(bytes).ok()?;
        let point: Option<G1Affine> = G1Affine::from_compressed(&bytes).into();
        point
            .filter(|p| !bool::from(p.is_identity()))
            .map(LinkageTag)
    }
}

/**
Hash a context onto G1. Nobody knows the discrete logarithm of the result, which is what
keeps tags from revealing the public key they belong to.

This is try-and-increment: each candidate is a SHA3-384 digest of the domain, the context and
a counter, read as a compressed x-coordinate. The first candidate on the curve is multiplied
by the cofactor to land in the prime-order subgroup. Roughly two in five candidates succeed.
*/
fn linkage_base(context: &[u8]) -> G1Projective {
    let cofactor = Scalar::from(G1_COFACTOR);
    let mut counter: u64 = 0;
    loop {
        if let Some(point) = linkage_candidate(context, counter) {
            let point = G1Projective::from(point) * cofactor;
            if !bool::from(point.is_identity()) {
                return point;
            }
        }
        counter = counter.wrapping_add(1);
    }
}

fn linkage_candidate(context: &[u8], counter: u64) -> Option<G1Affine> {
    let digest = Sha3_384::new()
        .chain((LINKAGE_BASE_DOMAIN.len() as u64).to_le_bytes())
        .chain(LINKAGE_BASE_DOMAIN)
        .chain((context.len() as u64).to_le_bytes())
        .chain(context)
        .chain(counter.to_le_bytes())
        .finalize();
    let mut bytes = [0u8; POINT_LEN];
    bytes.copy_from_slice(&digest);
    // Compressed, not infinity; the sign bit stays as hashed.
    bytes[0] = (bytes[0] & 0x3f) | 0x80;
    G1Affine::from_compressed_unchecked(&bytes).into()
}

/// A linkable ring signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RingSignature {
    /// The challenge entering the ring at index 0.
    #[serde(with = "SerializeElement")]
    challenge: Scalar,
    /// One response per attendee, in attendee order.
    #[serde(with = "SerializeElement")]
    responses: Vec<Scalar>,
    /// The signer's linkage tag for the signed context.
    tag: LinkageTag,
}

/// The public inputs shared by every round of one signature.
struct RingTranscript<'a> {
    attendees: &'a AttendeeSet,
    context: &'a [u8],
    message: &'a [u8],
    tag: &'a LinkageTag,
}

impl RingTranscript<'_> {
    fn round(&self, l: &G1Projective, r: &G1Projective) -> Scalar {
        ChallengeBuilder::new(RING_ROUND_DOMAIN)
            .with(self.attendees)
            .with_framed(self.context)
            .with_framed(self.message)
            .with(self.tag)
            .with(l)
            .with(r)
            .finish()
            .to_scalar()
    }
}

impl RingSignature {
    /**
    Sign `message` under `context` as the attendee at `index`.

    Fails with [`Error::InvalidIndex`] if `index` is outside the set, and with
    [`Error::KeyMismatch`] if `sk` is not the secret key of the attendee at `index`.
    */
    pub fn sign(
        rng: &mut impl Rng,
        attendees: &AttendeeSet,
        context: &[u8],
        message: &[u8],
        index: usize,
        sk: &SecretKey,
    ) -> Result<Self, Error> {
        let size = attendees.len();
        let signer = attendees.get(index).ok_or(Error::InvalidIndex {
            index,
            len: size,
        })?;
        if *signer != PublicKey::from(sk) {
            return Err(Error::KeyMismatch(index));
        }

        let g = G1Projective::generator();
        let h = linkage_base(context);
        let tag = LinkageTag::derive(sk, context);
        let tag_point = G1Projective::from(tag.0);
        let transcript = RingTranscript {
            attendees,
            context,
            message,
            tag: &tag,
        };

        // Responses for everybody but the signer are chosen at random.
        let mut responses: Vec<Scalar> = iter::repeat_with(|| random_nonzero_scalar(&mut *rng))
            .take(size)
            .collect();
        let mut challenges = vec![Scalar::zero(); size];

        let alpha = random_nonzero_scalar(&mut *rng);
        challenges[(index + 1) % size] = transcript.round(&(g * alpha), &(h * alpha));

        // Go around the ring from index + 1 back to index.
        for n in 1..size {
            let i = (index + n) % size;
            let c = challenges[i];
            let s = responses[i];
            let l = g * s + attendees.as_slice()[i].to_projective() * c;
            let r = h * s + tag_point * c;
            challenges[(i + 1) % size] = transcript.round(&l, &r);
        }

        // Close the ring: s = alpha - c * x.
        responses[index] = alpha - challenges[index] * sk.to_scalar();

        Ok(RingSignature {
            challenge: challenges[0],
            responses,
            tag,
        })
    }

    /**
    Verify the signature against an attendee set, context and message.

    Never panics: a signature of the wrong size for the set simply fails to verify.
    */
    pub fn verify(&self, attendees: &AttendeeSet, context: &[u8], message: &[u8]) -> Verification {
        if attendees.is_empty() || self.responses.len() != attendees.len() {
            return Verification::Failed;
        }

        let g = G1Projective::generator();
        let h = linkage_base(context);
        let tag_point = G1Projective::from(self.tag.0);
        let transcript = RingTranscript {
            attendees,
            context,
            message,
            tag: &self.tag,
        };

        let mut c = self.challenge;
        for (key, s) in attendees.iter().zip(&self.responses) {
            let l = g * s + key.to_projective() * c;
            let r = h * s + tag_point * c;
            c = transcript.round(&l, &r);
        }

        Verification::from(c == self.challenge)
    }

    /// The signer's linkage tag.
    pub fn tag(&self) -> &LinkageTag {
        &self.tag
    }

    /// Encode as `challenge || responses || tag`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(SCALAR_LEN * (self.responses.len() + 1) + POINT_LEN);
        bytes.extend_from_slice(&self.challenge.to_bytes());
        for s in &self.responses {
            bytes.extend_from_slice(&s.to_bytes());
        }
        bytes.extend_from_slice(&self.tag.to_bytes());
        bytes
    }

    /// Decode from the [`RingSignature::to_bytes`] format. Returns `None` on any malformed
    /// input: a wrong length, a non-canonical scalar, or an invalid tag.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 2 * SCALAR_LEN + POINT_LEN
            || (bytes.len() - POINT_LEN) % SCALAR_LEN != 0
        {
            return None;
        }
        let (scalars, tag) = bytes.split_at(bytes.len() - POINT_LEN);
        let tag = LinkageTag::from_bytes(tag)?;

        let mut scalars = scalars.chunks_exact(SCALAR_LEN).map(|chunk| {
            let chunk: [u8; SCALAR_LEN] = chunk.try_into().ok()?;
            Option::<Scalar>::from(Scalar::from_bytes(&chunk))
        });
        let challenge = scalars.next()??;
        let responses = scalars.collect::<Option<Vec<_>>>()?;

        Some(RingSignature {
            challenge,
            responses,
            tag,
        })
    }
}
