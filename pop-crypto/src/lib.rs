//! This crate includes the cryptographic primitives behind proof-of-personhood parties,
//! instantiated over the pairing-friendly curve BLS12-381:
//! - Attendee key pairs in G1, with base64 text encodings.
//! - Linkable ring signatures over an ordered attendee set, producing a context-scoped
//!   linkage tag that recognizes repeat signers without revealing them.
//! - Schnorr signatures used by the collective authority to seal a party's final statement.
//! - A Fiat-Shamir challenge builder shared by both signature schemes.
//!
//! Consumers should depend on the [`AttendeeTagSigner`] trait rather than on
//! [`ring::RingSignature`] directly, so that the signing capability can be replaced.

#![warn(missing_docs)]
#![warn(missing_copy_implementations, missing_debug_implementations)]
#![warn(unused_qualifications, unused_results)]
#![warn(future_incompatible)]
#![warn(unused)]
#![forbid(rustdoc::broken_intra_doc_links)]

pub mod challenge;
pub mod keys;
pub mod ring;
pub mod schnorr;
pub mod signer;

mod serde;

pub use crate::{
    keys::{KeyPair, PublicKey, SecretKey},
    ring::{AttendeeSet, LinkageTag},
    serde::{base64_bytes, SerializeElement},
    signer::{AttendeeTagSigner, LinkableRingSigner, Signature, Tag},
};

use thiserror::*;

/// Error types that may arise from cryptographic operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Caused by signing with an index that does not point into the attendee set.
    #[error("signer index {index} is outside the attendee set of size {len}")]
    InvalidIndex {
        /// The requested signer index.
        index: usize,
        /// The size of the attendee set.
        len: usize,
    },
    /// Caused by signing with a key whose public key is not the attendee at the given index.
    #[error("the signing key does not belong to the attendee at index {0}")]
    KeyMismatch(usize),
    /// Caused by adding a public key that is already part of an attendee set.
    #[error("this key already exists in the attendee set")]
    DuplicateKey,
    /// Caused by text or bytes that do not decode to the expected element.
    #[error("could not decode {0}")]
    InvalidEncoding(&'static str),
}

/// The result of a verification of some property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "the result of a verification should always be checked"]
pub enum Verification {
    /// A verification succeeded.
    Verified,
    /// A verification failed.
    Failed,
}

impl Verification {
    /// Whether this is [`Verification::Verified`].
    pub fn is_verified(self) -> bool {
        matches!(self, Verification::Verified)
    }
}

impl From<bool> for Verification {
    fn from(b: bool) -> Self {
        if b {
            Verification::Verified
        } else {
            Verification::Failed
        }
    }
}

pub use common::Rng;

mod common {
    //! Common types used internally.

    pub use crate::{Error, Verification};
    pub use bls12_381::{G1Affine, G1Projective, Scalar};
    pub use group::{Curve, Group, GroupEncoding};

    /// A trait synonym for a cryptographically secure random number generator. This trait is
    /// blanket-implemented for all valid types and will never need to be implemented by-hand.
    pub trait Rng: rand::CryptoRng + rand::RngCore {}
    impl<T: rand::CryptoRng + rand::RngCore> Rng for T {}

    /// Select a non-zero scalar uniformly at random.
    pub fn random_nonzero_scalar(rng: &mut impl Rng) -> Scalar {
        use ff::Field;
        loop {
            let r = Scalar::random(&mut *rng);
            if !bool::from(r.is_zero()) {
                return r;
            }
        }
    }
}
