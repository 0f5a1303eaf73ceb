/*!
Functionality for building challenge scalars.

Supports the per-round challenges of linkable ring signatures and the single challenge of a
Schnorr signature. Every challenge starts from a domain separator so that a hash computed for
one scheme can never be replayed as a challenge for another.
*/

use crate::{
    common::*,
    keys::PublicKey,
    ring::{AttendeeSet, LinkageTag},
};
use sha3::{Digest, Sha3_256};

/// A trait implemented by types which can feed their public components into a
/// [`ChallengeBuilder`].
pub trait ChallengeDigest {
    /// Incorporate public components of this type into a [`ChallengeBuilder`].
    fn digest(&self, builder: &mut ChallengeBuilder);
}

impl<'a, T: ChallengeDigest> ChallengeDigest for &'a T {
    fn digest(&self, builder: &mut ChallengeBuilder) {
        (**self).digest(builder);
    }
}

impl ChallengeDigest for Scalar {
    fn digest(&self, builder: &mut ChallengeBuilder) {
        builder.digest_bytes(self.to_bytes());
    }
}

impl ChallengeDigest for G1Affine {
    fn digest(&self, builder: &mut ChallengeBuilder) {
        builder.digest_bytes(self.to_compressed());
    }
}

impl ChallengeDigest for G1Projective {
    fn digest(&self, builder: &mut ChallengeBuilder) {
        builder.digest_bytes(self.to_bytes());
    }
}

impl ChallengeDigest for PublicKey {
    fn digest(&self, builder: &mut ChallengeBuilder) {
        builder.digest(&self.0);
    }
}

impl ChallengeDigest for LinkageTag {
    fn digest(&self, builder: &mut ChallengeBuilder) {
        builder.digest(&self.0);
    }
}

impl ChallengeDigest for AttendeeSet {
    fn digest(&self, builder: &mut ChallengeBuilder) {
        // Length prefix keeps sets of different sizes from sharing a prefix encoding.
        builder.digest_bytes((self.len() as u64).to_le_bytes());
        for key in self.iter() {
            builder.digest(key);
        }
    }
}

/// A challenge scalar for use in a Schnorr-style proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Challenge(Scalar);

impl Challenge {
    /// Retrieve the internal scalar value.
    pub fn to_scalar(self) -> Scalar {
        self.0
    }
}

/// Holds state used when building a [`Challenge`] using the Fiat-Shamir heuristic, as in a
/// non-interactive Schnorr proof.
#[derive(Debug, Clone)]
#[allow(missing_copy_implementations)]
pub struct ChallengeBuilder {
    hasher: Sha3_256,
}

impl ChallengeBuilder {
    /// Initialize a new challenge bound to the given domain separator.
    pub fn new(domain: &'static [u8]) -> Self {
        let mut builder = Self {
            hasher: Sha3_256::new(),
        };
        builder.digest_framed(domain);
        builder
    }

    /// Incorporate public data from some given type into the challenge.
    pub fn digest<T: ChallengeDigest>(&mut self, object: &T) {
        object.digest(self);
    }

    /// A conveniently chainable variant of [`ChallengeBuilder::digest`].
    pub fn with<T: ChallengeDigest>(mut self, object: &T) -> Self {
        object.digest(&mut self);
        self
    }

    /// Incorporate arbitrary bytes into the challenge.
    pub fn digest_bytes(&mut self, bytes: impl AsRef<[u8]>) {
        self.hasher.update(bytes);
    }

    /// A conveniently chainable variant of [`ChallengeBuilder::digest_bytes`].
    pub fn with_bytes(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.digest_bytes(bytes);
        self
    }

    /// Incorporate variable-length bytes, prefixed with their length so that adjacent fields
    /// cannot be confused with each other.
    pub fn digest_framed(&mut self, bytes: impl AsRef<[u8]>) {
        let bytes = bytes.as_ref();
        self.digest_bytes((bytes.len() as u64).to_le_bytes());
        self.digest_bytes(bytes);
    }

    /// A conveniently chainable variant of [`ChallengeBuilder::digest_framed`].
    pub fn with_framed(mut self, bytes: impl AsRef<[u8]>) -> Self {
        self.digest_framed(bytes);
        self
    }

    /// Consume the builder and generate a [`Challenge`] from the accumulated data.
    pub fn finish(self) -> Challenge {
        let mut digested = [0; 32];
        digested.copy_from_slice(self.hasher.finalize().as_ref());
        let limb = |i: usize| {
            let mut bytes = [0; 8];
            bytes.copy_from_slice(&digested[i * 8..(i + 1) * 8]);
            u64::from_le_bytes(bytes)
        };
        Challenge(Scalar::from_raw([limb(0), limb(1), limb(2), limb(3)]))
    }
}
